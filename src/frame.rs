//! Snapshot types handed to the presentation layer.
//!
//! An [`EngineState`] is an immutable value: candidates with probabilities,
//! evidence and bands, the next question, the stop decision and metrics.
//! Nothing in here refers back to the engine.

use std::fmt;

use blake3::Hasher;
use serde::{Deserialize, Serialize};

use crate::band::ConfidenceBand;
use crate::inference::StopDecision;
use crate::knowledge::{ClusterId, ClusterRule, QuestionKind};
use crate::session::Answer;
use crate::value::FactValue;

/// A selectable answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionOption {
    /// Text shown to the user.
    pub label: String,
    /// Value submitted back when the option is picked.
    pub value: FactValue,
}

/// Where the next question came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionOrigin {
    /// Forced by a carrier must-ask list.
    Carrier,
    /// Chosen by entropy ranking.
    Normal,
}

/// The question the host should ask next.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NextQuestion {
    pub fact_id: String,
    /// Bank prompt, or the fact id when the bank has none.
    pub prompt: String,
    /// Schema options when configured, otherwise inferred from candidates.
    pub options: Vec<QuestionOption>,
    pub origin: QuestionOrigin,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<QuestionKind>,
}

/// How the last answer relates to one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Evidence {
    /// The answer matches the cluster's `indicates` list.
    #[serde(rename = "+")]
    Supports,
    /// The cluster indicates the fact but the answer does not match.
    #[serde(rename = "-")]
    Contradicts,
    /// The answer was UNKNOWN.
    #[serde(rename = "?")]
    Unknown,
    /// The cluster does not indicate the fact.
    #[serde(rename = "·")]
    Irrelevant,
}

impl Evidence {
    /// Display symbol.
    #[must_use]
    pub const fn symbol(self) -> char {
        match self {
            Self::Supports => '+',
            Self::Contradicts => '-',
            Self::Unknown => '?',
            Self::Irrelevant => '·',
        }
    }

    /// Classifies an answer against one cluster rule.
    ///
    /// The answer value is normalized first, so raw host input such as
    /// `"TRUE"` or `"n/a"` classifies the same as through [`Answer::new`].
    #[must_use]
    pub fn for_answer(rule: &ClusterRule, answer: &Answer) -> Self {
        let value = answer.value.clone().normalized();
        if value.is_unknown() {
            return Self::Unknown;
        }
        match rule.indicated_values(&answer.fact_id) {
            None => Self::Irrelevant,
            Some(values) if value.matches_any(values) => Self::Supports,
            Some(_) => Self::Contradicts,
        }
    }
}

impl fmt::Display for Evidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// One ranked candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Cluster this row describes.
    pub id: ClusterId,
    /// Posterior renormalized over the current candidates.
    pub probability: f64,
    /// Relation to the answer the snapshot was taken against, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<Evidence>,
    /// Elbow band within the ranked list.
    pub band: ConfidenceBand,
}

/// Summary numbers for the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// Mass of the leading `top_k` candidates; `None` when `top_k` is 0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k_mass: Option<f64>,
    /// Number of surviving candidates.
    pub candidates_count: usize,
}

/// Immutable snapshot of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineState {
    /// Candidates by descending probability, ties by ascending id.
    pub candidates: Vec<Candidate>,

    /// Answer the evidence column was computed against.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_answer: Option<Answer>,

    /// `None` when nothing left can be asked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_question: Option<NextQuestion>,

    pub stop: StopDecision,

    pub metrics: Metrics,
}

impl EngineState {
    /// The leading candidate, if any.
    #[must_use]
    pub fn top(&self) -> Option<&Candidate> {
        self.candidates.first()
    }

    /// Shorthand for `stop.should_stop`.
    #[must_use]
    pub fn should_stop(&self) -> bool {
        self.stop.should_stop
    }

    /// Stable blake3 digest of the snapshot contents, hex encoded.
    ///
    /// Probabilities are hashed by bit pattern, so two snapshots share a
    /// fingerprint only if they are bit-identical.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Hasher::new();

        for candidate in &self.candidates {
            hash_str(&mut hasher, candidate.id.as_str());
            hasher.update(&candidate.probability.to_bits().to_le_bytes());
            let symbol = candidate.evidence.map_or(' ', Evidence::symbol);
            hash_str(&mut hasher, symbol.encode_utf8(&mut [0; 4]));
            hash_str(&mut hasher, candidate.band.as_str());
        }

        match &self.last_answer {
            Some(answer) => {
                hasher.update(&[1]);
                hash_str(&mut hasher, &answer.fact_id);
                hash_value(&mut hasher, &answer.value);
            }
            None => {
                hasher.update(&[0]);
            }
        }

        match &self.next_question {
            Some(q) => {
                hasher.update(&[1]);
                hash_str(&mut hasher, &q.fact_id);
                hash_str(&mut hasher, &q.prompt);
                hasher.update(&[u8::from(q.origin == QuestionOrigin::Carrier)]);
                for option in &q.options {
                    hash_str(&mut hasher, &option.label);
                    hash_value(&mut hasher, &option.value);
                }
            }
            None => {
                hasher.update(&[0]);
            }
        }

        hasher.update(&[u8::from(self.stop.should_stop)]);
        let reason = self.stop.reason.map(|r| r.to_string()).unwrap_or_default();
        hash_str(&mut hasher, &reason);

        if let Some(mass) = self.metrics.top_k_mass {
            hasher.update(&mass.to_bits().to_le_bytes());
        }
        hasher.update(&(self.metrics.candidates_count as u64).to_le_bytes());

        hasher.finalize().to_hex().to_string()
    }
}

fn hash_str(hasher: &mut Hasher, s: &str) {
    hasher.update(&(s.len() as u64).to_le_bytes());
    hasher.update(s.as_bytes());
}

fn hash_value(hasher: &mut Hasher, value: &FactValue) {
    hash_str(hasher, value.type_name());
    match value {
        FactValue::Number(n) => {
            hasher.update(&n.to_bits().to_le_bytes());
        }
        other => hash_str(hasher, &other.to_string()),
    }
}
