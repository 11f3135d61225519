//! Cluster rules: the diagnostic hypotheses the engine discriminates between.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::value::FactValue;

/// Stable identifier of a damage cluster.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterId(String);

impl ClusterId {
    /// Creates a cluster id from any string-like value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ClusterId {
    fn from(v: &str) -> Self {
        Self::new(v)
    }
}

/// Fact id -> list of values, as used by `requires`, `excludes` and `indicates`.
pub type RuleMap = BTreeMap<String, Vec<FactValue>>;

/// A rule value list as written in a knowledge document.
///
/// Authors sometimes write a single scalar instead of a one-element list;
/// both shapes load to the same list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleValues {
    Many(Vec<FactValue>),
    One(FactValue),
}

impl RuleValues {
    /// Flattens into a list of normalized values.
    #[must_use]
    pub fn into_values(self) -> Vec<FactValue> {
        match self {
            Self::Many(values) => values.into_iter().map(FactValue::normalized).collect(),
            Self::One(value) => vec![value.normalized()],
        }
    }
}

impl From<Vec<FactValue>> for RuleValues {
    fn from(v: Vec<FactValue>) -> Self {
        Self::Many(v)
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<BTreeMap<String, RuleValues>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<BTreeMap<String, RuleValues>>::deserialize(deserializer)?.unwrap_or_default())
}

/// A cluster rule exactly as the loader hands it over.
///
/// Every field is optional on the wire; [`ClusterRule::from_doc`] decides
/// whether the entry is usable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterRuleDoc {
    #[serde(default)]
    pub cluster_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_type: Option<String>,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub requires: BTreeMap<String, RuleValues>,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub excludes: BTreeMap<String, RuleValues>,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub indicates: BTreeMap<String, RuleValues>,
}

impl ClusterRuleDoc {
    /// Starts a document for the given cluster id.
    #[must_use]
    pub fn new(cluster_id: impl Into<String>) -> Self {
        Self {
            cluster_id: Some(cluster_id.into()),
            ..Self::default()
        }
    }

    /// Restricts the rule to one room type.
    #[must_use]
    pub fn with_room(mut self, room_type: impl Into<String>) -> Self {
        self.room_type = Some(room_type.into());
        self
    }

    /// Adds a hard `requires` constraint.
    #[must_use]
    pub fn with_requires<V: Into<FactValue>>(
        mut self,
        fact_id: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.requires.insert(fact_id.into(), collect_values(values));
        self
    }

    /// Adds a hard `excludes` constraint.
    #[must_use]
    pub fn with_excludes<V: Into<FactValue>>(
        mut self,
        fact_id: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.excludes.insert(fact_id.into(), collect_values(values));
        self
    }

    /// Adds soft `indicates` evidence.
    #[must_use]
    pub fn with_indicates<V: Into<FactValue>>(
        mut self,
        fact_id: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.indicates.insert(fact_id.into(), collect_values(values));
        self
    }
}

fn collect_values<V: Into<FactValue>>(values: impl IntoIterator<Item = V>) -> RuleValues {
    RuleValues::Many(values.into_iter().map(Into::into).collect())
}

fn into_rule_map(raw: BTreeMap<String, RuleValues>) -> RuleMap {
    raw.into_iter()
        .map(|(fact_id, values)| (fact_id, values.into_values()))
        .collect()
}

/// Why a document did not become a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// `cluster_id` absent or blank.
    MissingId,
    /// `indicates` is empty, so questioning can never separate this cluster.
    NoIndicates,
}

/// A validated cluster rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterRule {
    pub id: ClusterId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_type: Option<String>,
    pub requires: RuleMap,
    pub excludes: RuleMap,
    pub indicates: RuleMap,
}

impl ClusterRule {
    /// Validates a loader document.
    ///
    /// # Errors
    ///
    /// Returns the [`RejectReason`] when the id is missing or blank, or when
    /// the rule carries no `indicates` evidence.
    pub fn from_doc(doc: ClusterRuleDoc) -> Result<Self, RejectReason> {
        let id = match doc.cluster_id {
            Some(id) if !id.trim().is_empty() => ClusterId::new(id),
            _ => return Err(RejectReason::MissingId),
        };
        if doc.indicates.is_empty() {
            return Err(RejectReason::NoIndicates);
        }

        Ok(Self {
            id,
            room_type: doc.room_type.filter(|rt| !rt.trim().is_empty()),
            requires: into_rule_map(doc.requires),
            excludes: into_rule_map(doc.excludes),
            indicates: into_rule_map(doc.indicates),
        })
    }

    /// Returns true if the rule participates in sessions for `room`.
    ///
    /// Rules without a room type apply everywhere; an empty session room
    /// admits every rule. Comparison is case-insensitive.
    #[must_use]
    pub fn applies_to_room(&self, room: &str) -> bool {
        let room = room.trim();
        if room.is_empty() {
            return true;
        }
        match &self.room_type {
            None => true,
            Some(rt) => rt.trim().eq_ignore_ascii_case(room),
        }
    }

    /// Values listed under `indicates` for a fact, if the fact is mentioned.
    #[must_use]
    pub fn indicated_values(&self, fact_id: &str) -> Option<&[FactValue]> {
        self.indicates.get(fact_id).map(Vec::as_slice)
    }

    /// Checks the hard constraints against a set of known facts.
    ///
    /// A known value outside a `requires` list, or inside an `excludes`
    /// list, rules the cluster out. UNKNOWN answers never rule anything out.
    #[must_use]
    pub fn is_compatible(&self, facts: &BTreeMap<String, FactValue>) -> bool {
        let violates_requires = self.requires.iter().any(|(fact_id, allowed)| {
            facts
                .get(fact_id)
                .is_some_and(|value| !value.is_unknown() && !allowed.contains(value))
        });
        if violates_requires {
            return false;
        }

        !self.excludes.iter().any(|(fact_id, banned)| {
            facts
                .get(fact_id)
                .is_some_and(|value| value.matches_any(banned))
        })
    }
}
