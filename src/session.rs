//! Session state: the mutable part of a dialogue.
//!
//! Everything here is plain data. The inference functions take a
//! `&SessionState` (or `&mut` for updates) together with the immutable
//! knowledge base, so a state can be snapshotted, serialized and restored
//! without touching the engine.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::knowledge::ClusterId;
use crate::value::FactValue;

/// One answer given by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub fact_id: String,
    /// Normalized when built through [`Answer::new`].
    pub value: FactValue,
}

impl Answer {
    /// Creates an answer; the value is normalized.
    #[must_use]
    pub fn new(fact_id: impl Into<String>, value: impl Into<FactValue>) -> Self {
        Self {
            fact_id: fact_id.into(),
            value: value.into().normalized(),
        }
    }
}

/// An answer as recorded in the transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub answer: Answer,
    /// Replayed unchanged on undo.
    pub answered_at: DateTime<Utc>,
}

/// Mutable dialogue state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    /// Known facts. Entries are only added, except by a full reset.
    pub facts_known: BTreeMap<String, FactValue>,

    /// Asked fact ids in first-asked order, without duplicates.
    pub questions_asked: Vec<String>,

    /// Surviving clusters, in knowledge-base order.
    pub candidates: Vec<ClusterId>,

    /// Belief over the full cluster universe; sums to 1.
    pub posterior: BTreeMap<ClusterId, f64>,
}

impl SessionState {
    /// Creates the state every dialogue starts from.
    #[must_use]
    pub fn fresh(candidates: Vec<ClusterId>, prior: BTreeMap<ClusterId, f64>) -> Self {
        Self {
            facts_known: BTreeMap::new(),
            questions_asked: Vec::new(),
            candidates,
            posterior: prior,
        }
    }

    /// Records an answer in `facts_known` and `questions_asked`.
    pub fn record(&mut self, answer: &Answer) {
        self.facts_known
            .insert(answer.fact_id.clone(), answer.value.clone());
        if !self.questions_asked.iter().any(|f| f == &answer.fact_id) {
            self.questions_asked.push(answer.fact_id.clone());
        }
    }

    /// Returns true if the fact was answered or asked.
    #[must_use]
    pub fn is_settled(&self, fact_id: &str) -> bool {
        self.facts_known.contains_key(fact_id) || self.questions_asked.iter().any(|f| f == fact_id)
    }

    /// Posterior of one cluster; 0.0 when absent.
    #[must_use]
    pub fn probability(&self, id: &ClusterId) -> f64 {
        self.posterior.get(id).copied().unwrap_or(0.0)
    }
}
