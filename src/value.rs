//! Fact values recorded in a dialogue.
//!
//! A fact is answered with a string, a number, a boolean, or the
//! distinguished UNKNOWN value meaning the user declined to answer.
//! UNKNOWN never matches or contradicts any rule.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Wire token for the UNKNOWN value.
pub const UNKNOWN_TOKEN: &str = "__UNKNOWN__";

/// Strings (after trim + lowercase) that mean "the user does not know".
const UNKNOWN_ALIASES: [&str; 5] = ["__unknown__", "unknown", "?", "n/a", "na"];

/// A value a fact can take.
///
/// Deserialization accepts bare JSON/YAML scalars and normalizes them, so
/// `"yes"`, `3`, `true`, `"TRUE"`, `"n/a"` and `null` all load as expected.
///
/// # Examples
///
/// ```
/// use waterline::FactValue;
///
/// assert_eq!(FactValue::normalize("True"), FactValue::Bool(true));
/// assert!(FactValue::normalize("n/a").is_unknown());
/// assert_eq!(FactValue::normalize("yes"), FactValue::from("yes"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum FactValue {
    String(String),
    Number(f64),
    Bool(bool),
    Unknown,
}

impl FactValue {
    /// Normalizes a raw string answer.
    ///
    /// `"true"`/`"false"` become booleans and the unknown aliases become
    /// [`FactValue::Unknown`]; any other string is kept verbatim.
    #[must_use]
    pub fn normalize(raw: &str) -> Self {
        let folded = raw.trim().to_lowercase();
        match folded.as_str() {
            "true" => Self::Bool(true),
            "false" => Self::Bool(false),
            s if UNKNOWN_ALIASES.contains(&s) => Self::Unknown,
            _ => Self::String(raw.to_string()),
        }
    }

    /// Re-applies normalization to an already-typed value.
    ///
    /// Only string values can change; numbers and booleans pass through.
    #[must_use]
    pub fn normalized(self) -> Self {
        match self {
            Self::String(s) => Self::normalize(&s),
            other => other,
        }
    }

    pub const fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// Returns a human-readable type name.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Number(_) => "number",
            Self::Bool(_) => "bool",
            Self::Unknown => "unknown",
        }
    }

    /// Returns true if `self` equals any entry of `list`.
    ///
    /// UNKNOWN never matches, even against a list that contains UNKNOWN.
    #[must_use]
    pub fn matches_any(&self, list: &[Self]) -> bool {
        !self.is_unknown() && list.contains(self)
    }
}

impl Default for FactValue {
    fn default() -> Self {
        Self::Unknown
    }
}

impl fmt::Display for FactValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(v) => write!(f, "{v}"),
            // Integral numbers print without a trailing ".0" so labels read naturally.
            Self::Number(v) if v.fract() == 0.0 && v.abs() < 1e15 => write!(f, "{}", *v as i64),
            Self::Number(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Unknown => write!(f, "{UNKNOWN_TOKEN}"),
        }
    }
}

impl Serialize for FactValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::String(v) => serializer.serialize_str(v),
            Self::Number(v) => serializer.serialize_f64(*v),
            Self::Bool(v) => serializer.serialize_bool(*v),
            Self::Unknown => serializer.serialize_str(UNKNOWN_TOKEN),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawScalar {
    Bool(bool),
    Number(f64),
    String(String),
}

impl<'de> Deserialize<'de> for FactValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<RawScalar>::deserialize(deserializer)?;
        Ok(match raw {
            Some(RawScalar::Bool(v)) => Self::Bool(v),
            Some(RawScalar::Number(v)) => Self::Number(v),
            Some(RawScalar::String(s)) => Self::normalize(&s),
            None => Self::Unknown,
        })
    }
}

impl From<bool> for FactValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for FactValue {
    fn from(v: i32) -> Self {
        Self::Number(f64::from(v))
    }
}

impl From<f64> for FactValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<&str> for FactValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for FactValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}
