use std::collections::BTreeMap;

use tracing::warn;

use crate::knowledge::{ClusterId, ClusterRule, KnowledgeBase};
use crate::session::SessionState;
use crate::value::FactValue;

/// Likelihood ratio when the answer matches an `indicates` entry.
pub const LR_POS: f64 = 3.0;

/// Likelihood ratio when the fact is indicated but the answer does not match.
pub const LR_NEG: f64 = 0.6;

/// Likelihood ratio for an UNKNOWN answer.
pub const LR_UNKNOWN: f64 = 1.0;

/// Minimum absolute posterior a candidate needs to survive pruning.
pub const ABS_THRESH: f64 = 1e-4;

/// Minimum posterior relative to the leading candidate to survive pruning.
pub const REL_THRESH: f64 = 0.05;

/// What one Bayesian update did to the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// The posterior collapsed and was reset to the initial prior.
    pub degenerate: bool,
    /// Candidates removed by soft pruning.
    pub pruned: usize,
}

/// Initial belief over the full cluster universe.
///
/// Uses the room's prior weights when present and non-degenerate (finite,
/// positive weights summing above zero); clusters without a weight get 0.0.
/// Falls back to uniform otherwise.
#[must_use]
pub fn initial_prior(kb: &KnowledgeBase) -> BTreeMap<ClusterId, f64> {
    let ids = kb.cluster_ids();

    if let Some(weights) = kb.room_prior() {
        let weighted: Vec<(ClusterId, f64)> = ids
            .iter()
            .map(|id| {
                let w = weights
                    .get(id.as_str())
                    .copied()
                    .filter(|w| w.is_finite() && *w > 0.0)
                    .unwrap_or(0.0);
                (id.clone(), w)
            })
            .collect();
        let total: f64 = weighted.iter().map(|(_, w)| w).sum();
        if total > 0.0 && total.is_finite() {
            return weighted.into_iter().map(|(id, w)| (id, w / total)).collect();
        }
    }

    #[allow(clippy::cast_precision_loss)]
    let uniform = 1.0 / ids.len().max(1) as f64;
    ids.into_iter().map(|id| (id, uniform)).collect()
}

/// Likelihood ratio of one answer for one cluster.
#[must_use]
pub fn likelihood_ratio(rule: &ClusterRule, fact_id: &str, value: &FactValue) -> f64 {
    if value.is_unknown() {
        return LR_UNKNOWN;
    }
    match rule.indicated_values(fact_id) {
        None => 1.0,
        Some(indicated) if value.matches_any(indicated) => LR_POS,
        Some(_) => LR_NEG,
    }
}

/// Multiplies every cluster's belief by its likelihood ratio, renormalizes,
/// then prunes low-mass candidates.
///
/// The update runs over the full universe, not just the survivors. If the
/// total mass collapses the posterior is reset to [`initial_prior`] and no
/// pruning happens.
pub fn apply_bayes_update(
    kb: &KnowledgeBase,
    state: &mut SessionState,
    fact_id: &str,
    value: &FactValue,
) -> UpdateOutcome {
    for rule in kb.clusters() {
        let lr = likelihood_ratio(rule, fact_id, value);
        let p = state.posterior.entry(rule.id.clone()).or_insert(0.0);
        *p *= lr;
    }

    let total: f64 = state.posterior.values().sum();
    if !(total > 0.0 && total.is_finite()) {
        warn!(fact = fact_id, total, "posterior collapsed, resetting to initial prior");
        state.posterior = initial_prior(kb);
        return UpdateOutcome {
            degenerate: true,
            pruned: 0,
        };
    }
    for p in state.posterior.values_mut() {
        *p /= total;
    }

    UpdateOutcome {
        degenerate: false,
        pruned: prune_candidates(state),
    }
}

/// Drops candidates whose belief is negligible, absolutely or relative to
/// the leading candidate. Returns how many were removed.
///
/// The candidate set is only replaced when the kept set is non-empty and
/// strictly smaller.
pub fn prune_candidates(state: &mut SessionState) -> usize {
    let max_p = state
        .candidates
        .iter()
        .map(|id| state.probability(id))
        .fold(0.0_f64, f64::max);

    let kept: Vec<ClusterId> = state
        .candidates
        .iter()
        .filter(|id| {
            let p = state.probability(id);
            p >= ABS_THRESH && (max_p <= 0.0 || p / max_p >= REL_THRESH)
        })
        .cloned()
        .collect();

    if kept.is_empty() || kept.len() >= state.candidates.len() {
        return 0;
    }
    let removed = state.candidates.len() - kept.len();
    state.candidates = kept;
    removed
}

/// Posterior restricted to the current candidates and renormalized, in
/// candidate order.
///
/// Uniform over the candidates when their total mass is zero.
#[must_use]
pub fn candidate_distribution(state: &SessionState) -> Vec<(ClusterId, f64)> {
    let total: f64 = state.candidates.iter().map(|id| state.probability(id)).sum();
    if total > 0.0 && total.is_finite() {
        return state
            .candidates
            .iter()
            .map(|id| (id.clone(), state.probability(id) / total))
            .collect();
    }

    #[allow(clippy::cast_precision_loss)]
    let uniform = 1.0 / state.candidates.len().max(1) as f64;
    state
        .candidates
        .iter()
        .map(|id| (id.clone(), uniform))
        .collect()
}

/// Sum of the `k` largest probabilities in a distribution.
#[must_use]
pub fn top_k_mass(distribution: &[(ClusterId, f64)], k: usize) -> f64 {
    let mut probs: Vec<f64> = distribution.iter().map(|(_, p)| *p).collect();
    probs.sort_by(|a, b| b.total_cmp(a));
    probs.into_iter().take(k).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::recompute_candidates;
    use crate::knowledge::{ClusterRuleDoc, KnowledgeBundle, QuestionBank, RoomPriors};

    fn bundle() -> KnowledgeBundle {
        KnowledgeBundle::new(
            vec![
                ClusterRuleDoc::new("A").with_indicates("f1", ["yes"]),
                ClusterRuleDoc::new("B").with_indicates("f1", ["no"]),
            ],
            QuestionBank::new(),
        )
    }

    fn priors(weights: &[(&str, f64)]) -> RoomPriors {
        let room = weights
            .iter()
            .map(|(id, w)| ((*id).to_string(), *w))
            .collect();
        RoomPriors([("BATHROOM".to_string(), room)].into_iter().collect())
    }

    fn fresh(kb: &KnowledgeBase) -> SessionState {
        SessionState::fresh(kb.cluster_ids(), initial_prior(kb))
    }

    #[test]
    fn test_initial_prior_uniform() {
        let (kb, _) = KnowledgeBase::build(bundle(), "BATHROOM");
        let prior = initial_prior(&kb);
        assert!((prior[&ClusterId::from("A")] - 0.5).abs() < 1e-12);
        assert!((prior[&ClusterId::from("B")] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_initial_prior_room_weights() {
        let (kb, _) = KnowledgeBase::build(
            bundle().with_room_priors(priors(&[("A", 3.0), ("B", 1.0), ("Z", 5.0)])),
            "BATHROOM",
        );
        let prior = initial_prior(&kb);
        assert_eq!(prior.len(), 2);
        assert!((prior[&ClusterId::from("A")] - 0.75).abs() < 1e-12);
        assert!((prior[&ClusterId::from("B")] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_initial_prior_degenerate_weights_fall_back() {
        let (kb, _) = KnowledgeBase::build(
            bundle().with_room_priors(priors(&[("A", 0.0), ("B", -2.0)])),
            "BATHROOM",
        );
        let prior = initial_prior(&kb);
        assert!((prior[&ClusterId::from("A")] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_likelihood_ratios() {
        let (kb, _) = KnowledgeBase::build(bundle(), "");
        let a = &kb.clusters()[0];
        assert!((likelihood_ratio(a, "f1", &"yes".into()) - LR_POS).abs() < f64::EPSILON);
        assert!((likelihood_ratio(a, "f1", &"no".into()) - LR_NEG).abs() < f64::EPSILON);
        assert!((likelihood_ratio(a, "f1", &FactValue::Unknown) - LR_UNKNOWN).abs() < f64::EPSILON);
        assert!((likelihood_ratio(a, "other", &"no".into()) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_update_matches_worked_example() {
        let (kb, _) = KnowledgeBase::build(bundle(), "BATHROOM");
        let mut state = fresh(&kb);

        let outcome = apply_bayes_update(&kb, &mut state, "f1", &"yes".into());

        assert!(!outcome.degenerate);
        assert_eq!(outcome.pruned, 0);
        assert!((state.probability(&ClusterId::from("A")) - 1.5 / 1.8).abs() < 1e-9);
        assert!((state.probability(&ClusterId::from("B")) - 0.3 / 1.8).abs() < 1e-9);
    }

    #[test]
    fn test_update_prunes_relative_outlier() {
        let (kb, _) = KnowledgeBase::build(
            bundle().with_room_priors(priors(&[("A", 0.9), ("B", 0.1)])),
            "BATHROOM",
        );
        let mut state = fresh(&kb);

        let outcome = apply_bayes_update(&kb, &mut state, "f1", &"yes".into());

        assert_eq!(outcome.pruned, 1);
        assert_eq!(state.candidates, vec![ClusterId::from("A")]);
        // Pruned clusters keep their posterior entry.
        assert!(state.probability(&ClusterId::from("B")) > 0.0);
    }

    #[test]
    fn test_collapsed_posterior_resets() {
        let (kb, _) = KnowledgeBase::build(bundle(), "BATHROOM");
        let mut state = fresh(&kb);
        for p in state.posterior.values_mut() {
            *p = 0.0;
        }

        let outcome = apply_bayes_update(&kb, &mut state, "f1", &"yes".into());

        assert!(outcome.degenerate);
        assert_eq!(state.posterior, initial_prior(&kb));
    }

    #[test]
    fn test_prune_never_empties() {
        let mut state = SessionState::fresh(
            vec![ClusterId::from("A"), ClusterId::from("B")],
            [(ClusterId::from("A"), 0.0), (ClusterId::from("B"), 0.0)]
                .into_iter()
                .collect(),
        );
        assert_eq!(prune_candidates(&mut state), 0);
        assert_eq!(state.candidates.len(), 2);
    }

    #[test]
    fn test_candidate_distribution_renormalizes() {
        let (kb, _) = KnowledgeBase::build(
            KnowledgeBundle::new(
                vec![
                    ClusterRuleDoc::new("A").with_indicates("f1", ["yes"]),
                    ClusterRuleDoc::new("B").with_indicates("f1", ["no"]),
                    ClusterRuleDoc::new("C")
                        .with_requires("f2", ["x"])
                        .with_indicates("f1", ["yes"]),
                ],
                QuestionBank::new(),
            ),
            "",
        );
        let mut state = fresh(&kb);
        state.record(&crate::session::Answer::new("f2", "y"));
        state.candidates = recompute_candidates(&kb, &state.facts_known);

        let dist = candidate_distribution(&state);
        assert_eq!(dist.len(), 2);
        let total: f64 = dist.iter().map(|(_, p)| p).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_top_k_mass() {
        let dist = vec![
            (ClusterId::from("A"), 0.2),
            (ClusterId::from("B"), 0.5),
            (ClusterId::from("C"), 0.3),
        ];
        assert!((top_k_mass(&dist, 1) - 0.5).abs() < 1e-12);
        assert!((top_k_mass(&dist, 2) - 0.8).abs() < 1e-12);
        assert!((top_k_mass(&dist, 10) - 1.0).abs() < 1e-12);
        assert!(top_k_mass(&dist, 0).abs() < 1e-12);
    }
}
