//! Loader boundary.
//!
//! Fetching and parsing the knowledge documents belongs to the host. The
//! engine only sees a [`KnowledgeBundle`] delivered through a
//! [`KnowledgeLoader`], which is the single asynchronous step of a session.

use std::future::Future;

use serde::{Deserialize, Serialize};

use super::cluster::ClusterRuleDoc;
use super::policy::{PolicyShims, RoomPriors};
use super::question::QuestionBank;
use crate::error::LoadError;

/// Everything the engine needs to start a session, in loader shapes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeBundle {
    /// Cluster rule documents, unfiltered.
    #[serde(default)]
    pub clusters: Vec<ClusterRuleDoc>,

    /// Question bank keyed by fact id.
    #[serde(default)]
    pub questions: QuestionBank,

    /// Optional carrier must-ask lists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_shims: Option<PolicyShims>,

    /// Optional per-room prior weights.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_priors: Option<RoomPriors>,
}

impl KnowledgeBundle {
    /// Creates a bundle from cluster documents and a question bank.
    #[must_use]
    pub fn new(clusters: Vec<ClusterRuleDoc>, questions: QuestionBank) -> Self {
        Self {
            clusters,
            questions,
            policy_shims: None,
            room_priors: None,
        }
    }

    /// Attaches carrier policy shims.
    #[must_use]
    pub fn with_policy_shims(mut self, shims: PolicyShims) -> Self {
        self.policy_shims = Some(shims);
        self
    }

    /// Attaches per-room priors.
    #[must_use]
    pub fn with_room_priors(mut self, priors: RoomPriors) -> Self {
        self.room_priors = Some(priors);
        self
    }

    /// Parses the two mandatory documents from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::Malformed`] if either document does not parse,
    /// or if the cluster document is not a list.
    pub fn from_json(clusters_json: &str, questions_json: &str) -> Result<Self, LoadError> {
        let clusters: serde_json::Value = serde_json::from_str(clusters_json)?;
        if !clusters.is_array() {
            return Err(LoadError::malformed("cluster rules", "document must be a list"));
        }
        let clusters: Vec<ClusterRuleDoc> = serde_json::from_value(clusters)?;
        let questions: QuestionBank = serde_json::from_str(questions_json)?;
        Ok(Self::new(clusters, questions))
    }
}

/// Source of knowledge bundles.
///
/// Implementations fetch and parse documents however the host likes (files,
/// HTTP, embedded assets). Failures are reported as [`LoadError`] and are
/// surfaced unchanged by `Engine::initialize`; the engine never retries.
pub trait KnowledgeLoader: Send + Sync {
    /// Loads a complete bundle.
    fn load(&self) -> impl Future<Output = Result<KnowledgeBundle, LoadError>> + Send;
}

/// Loader over an in-memory bundle.
#[derive(Debug, Clone, Default)]
pub struct StaticLoader {
    bundle: KnowledgeBundle,
}

impl StaticLoader {
    #[must_use]
    pub fn new(bundle: KnowledgeBundle) -> Self {
        Self { bundle }
    }
}

impl KnowledgeLoader for StaticLoader {
    fn load(&self) -> impl Future<Output = Result<KnowledgeBundle, LoadError>> + Send {
        let bundle = self.bundle.clone();
        async move { Ok(bundle) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_parses_documents() {
        let bundle = KnowledgeBundle::from_json(
            r#"[{"cluster_id": "A", "indicates": {"f1": "yes"}}, {"indicates": {"f1": "no"}}]"#,
            r#"{"questions": {"f1": {"prompt": "Leak?"}}}"#,
        )
        .unwrap();

        assert_eq!(bundle.clusters.len(), 2);
        assert_eq!(bundle.clusters[1].cluster_id, None);
        assert_eq!(bundle.questions.len(), 1);
    }

    #[test]
    fn test_from_json_rejects_non_list_clusters() {
        let err = KnowledgeBundle::from_json(r#"{"cluster_id": "A"}"#, "{}").unwrap_err();
        assert!(matches!(err, LoadError::Malformed { .. }));
    }

    #[tokio::test]
    async fn test_static_loader_returns_bundle() {
        let bundle = KnowledgeBundle::new(vec![ClusterRuleDoc::new("A")], QuestionBank::new());
        let loaded = StaticLoader::new(bundle.clone()).load().await.unwrap();
        assert_eq!(loaded, bundle);
    }
}
