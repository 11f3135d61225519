//! Question bank: prompts and option lists per fact.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::value::FactValue;

/// How a question is meant to be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    SingleChoice,
    /// Yes/no question.
    Boolean,
}

/// Presentation spec for one fact.
///
/// When `options` is empty the engine infers the value set at query time
/// from the `indicates` lists of the surviving clusters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestionSpec {
    /// Usually omitted on the wire; the bank key is authoritative.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fact_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,

    /// Fixed value set; empty means infer.
    #[serde(default)]
    pub options: Vec<FactValue>,

    /// Display strings, parallel to `options`.
    #[serde(default)]
    pub option_labels: Vec<String>,

    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<QuestionKind>,
}

impl QuestionSpec {
    /// Creates a spec with a prompt and no fixed options.
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: Some(prompt.into()),
            ..Self::default()
        }
    }

    /// Adds a labelled option.
    #[must_use]
    pub fn with_option(mut self, value: impl Into<FactValue>, label: impl Into<String>) -> Self {
        self.options.push(value.into());
        self.option_labels.push(label.into());
        self
    }

    /// Sets the presentation kind.
    #[must_use]
    pub fn with_kind(mut self, kind: QuestionKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Label for the option at `index`, if one was provided and is non-empty.
    #[must_use]
    pub fn label_at(&self, index: usize) -> Option<&str> {
        self.option_labels
            .get(index)
            .map(String::as_str)
            .filter(|label| !label.is_empty())
    }
}

/// All question specs, keyed by fact id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestionBank {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taxonomy: Option<String>,

    #[serde(default)]
    pub questions: BTreeMap<String, QuestionSpec>,
}

impl QuestionBank {
    /// Creates an empty bank.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the spec for a fact.
    #[must_use]
    pub fn with_question(mut self, fact_id: impl Into<String>, spec: QuestionSpec) -> Self {
        self.questions.insert(fact_id.into(), spec);
        self
    }

    #[must_use]
    pub fn get(&self, fact_id: &str) -> Option<&QuestionSpec> {
        self.questions.get(fact_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}
