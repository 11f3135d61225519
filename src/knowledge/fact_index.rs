//! Reverse index from fact ids to the clusters that reference them.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::cluster::{ClusterId, ClusterRule};

/// Clusters referencing one fact, split by the rule section that mentions it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactRefs {
    pub requires: BTreeSet<ClusterId>,
    pub excludes: BTreeSet<ClusterId>,
    pub indicates: BTreeSet<ClusterId>,
}

impl FactRefs {
    /// Returns true if any of `clusters` references the fact in any section.
    #[must_use]
    pub fn mentioned_by_any(&self, clusters: &BTreeSet<&ClusterId>) -> bool {
        [&self.requires, &self.excludes, &self.indicates]
            .into_iter()
            .any(|section| section.iter().any(|id| clusters.contains(id)))
    }
}

/// Role a fact plays in the knowledge base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactPhase {
    /// Used by `requires`/`excludes`: answering it can rule clusters out.
    Screening,
    /// Only used by `indicates`: answering it shifts belief between clusters.
    Discriminating,
}

/// Fact id -> [`FactRefs`], built once per knowledge base.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactIndex {
    by_fact: BTreeMap<String, FactRefs>,
}

impl FactIndex {
    /// Builds the index over every fact mentioned anywhere in `clusters`.
    #[must_use]
    pub fn build(clusters: &[ClusterRule]) -> Self {
        let mut by_fact: BTreeMap<String, FactRefs> = BTreeMap::new();
        for rule in clusters {
            for fact_id in rule.requires.keys() {
                by_fact.entry(fact_id.clone()).or_default().requires.insert(rule.id.clone());
            }
            for fact_id in rule.excludes.keys() {
                by_fact.entry(fact_id.clone()).or_default().excludes.insert(rule.id.clone());
            }
            for fact_id in rule.indicates.keys() {
                by_fact.entry(fact_id.clone()).or_default().indicates.insert(rule.id.clone());
            }
        }
        Self { by_fact }
    }

    #[must_use]
    pub fn get(&self, fact_id: &str) -> Option<&FactRefs> {
        self.by_fact.get(fact_id)
    }

    /// Iterates facts in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &FactRefs)> {
        self.by_fact.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_fact.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_fact.is_empty()
    }

    /// Classifies a fact; `None` if no cluster references it.
    #[must_use]
    pub fn phase(&self, fact_id: &str) -> Option<FactPhase> {
        let refs = self.by_fact.get(fact_id)?;
        if !refs.requires.is_empty() || !refs.excludes.is_empty() {
            Some(FactPhase::Screening)
        } else if !refs.indicates.is_empty() {
            Some(FactPhase::Discriminating)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::cluster::ClusterRuleDoc;

    fn rules() -> Vec<ClusterRule> {
        vec![
            ClusterRule::from_doc(
                ClusterRuleDoc::new("A")
                    .with_requires("source", ["pipe"])
                    .with_indicates("stain", ["yes"]),
            )
            .unwrap(),
            ClusterRule::from_doc(
                ClusterRuleDoc::new("B")
                    .with_excludes("source", ["roof"])
                    .with_indicates("stain", ["no"])
                    .with_indicates("odor", ["musty"]),
            )
            .unwrap(),
        ]
    }

    #[test]
    fn test_build_splits_sections() {
        let index = FactIndex::build(&rules());
        assert_eq!(index.len(), 3);

        let source = index.get("source").unwrap();
        assert!(source.requires.contains(&ClusterId::from("A")));
        assert!(source.excludes.contains(&ClusterId::from("B")));
        assert!(source.indicates.is_empty());

        let stain = index.get("stain").unwrap();
        assert_eq!(stain.indicates.len(), 2);
    }

    #[test]
    fn test_phase() {
        let index = FactIndex::build(&rules());
        assert_eq!(index.phase("source"), Some(FactPhase::Screening));
        assert_eq!(index.phase("odor"), Some(FactPhase::Discriminating));
        assert_eq!(index.phase("missing"), None);
    }

    #[test]
    fn test_mentioned_by_any() {
        let index = FactIndex::build(&rules());
        let a = ClusterId::from("A");
        let only_a: BTreeSet<&ClusterId> = [&a].into_iter().collect();

        assert!(index.get("stain").unwrap().mentioned_by_any(&only_a));
        assert!(!index.get("odor").unwrap().mentioned_by_any(&only_a));
    }
}
