//! Knowledge base model.
//!
//! A [`KnowledgeBase`] is the immutable, room-scoped view of the loaded
//! rules for one session: the usable clusters, the question bank, the
//! optional policy and prior tables, and the fact index.

mod cluster;
mod fact_index;
mod loader;
mod policy;
mod question;

use std::collections::{BTreeMap, HashSet};

use tracing::{info, trace, warn};

pub use cluster::{ClusterId, ClusterRule, ClusterRuleDoc, RejectReason, RuleMap, RuleValues};
pub use fact_index::{FactIndex, FactPhase, FactRefs};
pub use loader::{KnowledgeBundle, KnowledgeLoader, StaticLoader};
pub use policy::{CarrierKey, MustAskEntry, PolicyShims, PolicyTable, RoomPriors};
pub use question::{QuestionBank, QuestionKind, QuestionSpec};

/// Counts of what happened to the cluster documents while building.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Rules admitted into the knowledge base.
    pub kept: usize,
    /// Documents without a usable `cluster_id`.
    pub missing_id: usize,
    /// Rules scoped to a different room.
    pub other_room: usize,
    /// Rules with an empty `indicates` map.
    pub no_indicates: usize,
    /// Later definitions of an id already kept.
    pub duplicates: usize,
}

impl BuildReport {
    /// Total number of documents that did not become rules.
    #[must_use]
    pub const fn dropped(&self) -> usize {
        self.missing_id + self.other_room + self.no_indicates + self.duplicates
    }
}

/// Room-scoped knowledge for one session.
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    room: String,
    clusters: Vec<ClusterRule>,
    questions: QuestionBank,
    policy: Option<PolicyTable>,
    room_prior: Option<BTreeMap<String, f64>>,
    index: FactIndex,
}

impl KnowledgeBase {
    /// Builds the knowledge base for `room` from a loader bundle.
    ///
    /// Documents without a cluster id, rules for other rooms, rules with no
    /// `indicates` evidence, and repeated cluster ids (first one wins) are
    /// dropped without failing.
    #[must_use]
    pub fn build(bundle: KnowledgeBundle, room: &str) -> (Self, BuildReport) {
        let mut report = BuildReport::default();
        let mut seen: HashSet<ClusterId> = HashSet::new();
        let mut clusters = Vec::with_capacity(bundle.clusters.len());

        for doc in bundle.clusters {
            let rule = match ClusterRule::from_doc(doc) {
                Ok(rule) => rule,
                Err(RejectReason::MissingId) => {
                    trace!("dropping cluster rule without cluster_id");
                    report.missing_id += 1;
                    continue;
                }
                Err(RejectReason::NoIndicates) => {
                    trace!("dropping cluster rule without indicates");
                    report.no_indicates += 1;
                    continue;
                }
            };
            if !rule.applies_to_room(room) {
                trace!(cluster = %rule.id, "dropping cluster rule for another room");
                report.other_room += 1;
                continue;
            }
            if !seen.insert(rule.id.clone()) {
                warn!(cluster = %rule.id, "duplicate cluster id, keeping first definition");
                report.duplicates += 1;
                continue;
            }
            clusters.push(rule);
        }
        report.kept = clusters.len();

        let index = FactIndex::build(&clusters);
        let room_prior = bundle
            .room_priors
            .as_ref()
            .and_then(|priors| priors.for_room(room))
            .cloned();
        let policy = bundle.policy_shims.map(PolicyTable::from_shims);

        info!(
            room,
            kept = report.kept,
            dropped = report.dropped(),
            facts = index.len(),
            "knowledge base built"
        );

        let kb = Self {
            room: room.to_string(),
            clusters,
            questions: bundle.questions,
            policy,
            room_prior,
            index,
        };
        (kb, report)
    }

    /// Rebuilds the fact index from the current cluster set.
    pub fn rebuild_index(&mut self) {
        self.index = FactIndex::build(&self.clusters);
    }

    #[must_use]
    pub fn room(&self) -> &str {
        &self.room
    }

    /// Clusters in load order; this order is the universe order everywhere.
    #[must_use]
    pub fn clusters(&self) -> &[ClusterRule] {
        &self.clusters
    }

    #[must_use]
    pub fn cluster(&self, id: &ClusterId) -> Option<&ClusterRule> {
        self.clusters.iter().find(|rule| &rule.id == id)
    }

    /// All cluster ids, in load order.
    #[must_use]
    pub fn cluster_ids(&self) -> Vec<ClusterId> {
        self.clusters.iter().map(|rule| rule.id.clone()).collect()
    }

    #[must_use]
    pub fn questions(&self) -> &QuestionBank {
        &self.questions
    }

    #[must_use]
    pub fn policy(&self) -> Option<&PolicyTable> {
        self.policy.as_ref()
    }

    /// Prior weights configured for this room, if any.
    #[must_use]
    pub fn room_prior(&self) -> Option<&BTreeMap<String, f64>> {
        self.room_prior.as_ref()
    }

    #[must_use]
    pub fn index(&self) -> &FactIndex {
        &self.index
    }
}
