use std::collections::BTreeMap;

use crate::knowledge::{ClusterId, KnowledgeBase};
use crate::value::FactValue;

/// Recomputes the surviving clusters from the complete set of known facts.
///
/// Pure: the result depends only on `facts`, never on the order the answers
/// arrived in. Survivors are returned in knowledge-base order.
#[must_use]
pub fn recompute_candidates(kb: &KnowledgeBase, facts: &BTreeMap<String, FactValue>) -> Vec<ClusterId> {
    kb.clusters()
        .iter()
        .filter(|rule| rule.is_compatible(facts))
        .map(|rule| rule.id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::{ClusterRuleDoc, KnowledgeBundle, QuestionBank};

    fn kb() -> KnowledgeBase {
        let bundle = KnowledgeBundle::new(
            vec![
                ClusterRuleDoc::new("A")
                    .with_requires("source", ["pipe", "fixture"])
                    .with_indicates("stain", ["yes"]),
                ClusterRuleDoc::new("B")
                    .with_excludes("source", ["pipe"])
                    .with_indicates("stain", ["no"]),
                ClusterRuleDoc::new("C")
                    .with_requires("floor", ["wet"])
                    .with_indicates("stain", ["yes"]),
            ],
            QuestionBank::new(),
        );
        KnowledgeBase::build(bundle, "").0
    }

    fn facts(pairs: &[(&str, FactValue)]) -> BTreeMap<String, FactValue> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_no_facts_keeps_everything() {
        assert_eq!(recompute_candidates(&kb(), &BTreeMap::new()).len(), 3);
    }

    #[test]
    fn test_requires_and_excludes_eliminate() {
        let kb = kb();
        let survivors = recompute_candidates(&kb, &facts(&[("source", "pipe".into())]));
        assert_eq!(survivors, vec![ClusterId::from("A"), ClusterId::from("C")]);

        let survivors = recompute_candidates(&kb, &facts(&[("floor", "dry".into())]));
        assert_eq!(survivors, vec![ClusterId::from("A"), ClusterId::from("B")]);
    }

    #[test]
    fn test_unknown_eliminates_nothing() {
        let kb = kb();
        let known = facts(&[("source", FactValue::Unknown), ("floor", FactValue::Unknown)]);
        assert_eq!(recompute_candidates(&kb, &known).len(), 3);
    }

    #[test]
    fn test_order_independent() {
        let kb = kb();
        let mut forward = BTreeMap::new();
        forward.insert("source".to_string(), FactValue::from("fixture"));
        forward.insert("floor".to_string(), FactValue::from("dry"));

        let mut backward = BTreeMap::new();
        backward.insert("floor".to_string(), FactValue::from("dry"));
        backward.insert("source".to_string(), FactValue::from("fixture"));

        assert_eq!(
            recompute_candidates(&kb, &forward),
            recompute_candidates(&kb, &backward)
        );
    }
}
