use std::collections::BTreeSet;

use tracing::debug;

use super::posterior::candidate_distribution;
use crate::config::EngineConfig;
use crate::frame::{NextQuestion, QuestionOption, QuestionOrigin};
use crate::knowledge::{ClusterId, ClusterRule, KnowledgeBase};
use crate::session::SessionState;
use crate::value::FactValue;

/// Entropy differences below this are treated as ties.
pub const ENTROPY_TIE_EPSILON: f64 = 1e-12;

/// Where a fact's option values came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionSource {
    /// Fixed list from the question bank.
    Schema,
    /// Union of the surviving clusters' `indicates` values.
    Inferred,
}

/// Facts still able to discriminate: referenced by at least one candidate,
/// neither known nor asked. Ascending by fact id.
#[must_use]
pub fn frontier(kb: &KnowledgeBase, state: &SessionState) -> BTreeSet<String> {
    let survivors: BTreeSet<&ClusterId> = state.candidates.iter().collect();
    kb.index()
        .iter()
        .filter(|(fact_id, refs)| !state.is_settled(fact_id) && refs.mentioned_by_any(&survivors))
        .map(|(fact_id, _)| fact_id.clone())
        .collect()
}

/// Resolves the option values for a fact.
///
/// The question bank's fixed list wins. Otherwise the values are inferred
/// from the candidates' `indicates` lists, in cluster order, deduplicated.
/// An empty list means no question can be built for the fact.
#[must_use]
pub fn resolve_options(
    kb: &KnowledgeBase,
    candidates: &[ClusterId],
    fact_id: &str,
) -> (OptionSource, Vec<FactValue>) {
    if let Some(spec) = kb.questions().get(fact_id) {
        if !spec.options.is_empty() {
            return (OptionSource::Schema, spec.options.clone());
        }
    }

    let mut values: Vec<FactValue> = Vec::new();
    for rule in kb.clusters().iter().filter(|r| candidates.contains(&r.id)) {
        for value in rule.indicated_values(fact_id).unwrap_or(&[]) {
            if !values.contains(value) {
                values.push(value.clone());
            }
        }
    }
    (OptionSource::Inferred, values)
}

/// Builds the presentable question for a fact, or `None` if it has no options.
#[must_use]
pub fn build_question(
    kb: &KnowledgeBase,
    candidates: &[ClusterId],
    fact_id: &str,
    origin: QuestionOrigin,
) -> Option<NextQuestion> {
    let (source, values) = resolve_options(kb, candidates, fact_id);
    if values.is_empty() {
        return None;
    }
    let spec = kb.questions().get(fact_id);

    let options = values
        .into_iter()
        .enumerate()
        .map(|(i, value)| {
            let label = match source {
                OptionSource::Schema => spec.and_then(|s| s.label_at(i)).map(str::to_string),
                OptionSource::Inferred => None,
            }
            .unwrap_or_else(|| value.to_string());
            QuestionOption { label, value }
        })
        .collect();

    let prompt = spec
        .and_then(|s| s.prompt.as_deref())
        .filter(|p| !p.trim().is_empty())
        .unwrap_or(fact_id)
        .to_string();

    Some(NextQuestion {
        fact_id: fact_id.to_string(),
        prompt,
        options,
        origin,
        kind: spec.and_then(|s| s.kind),
    })
}

/// Shannon entropy in bits. Zero entries contribute nothing.
#[must_use]
pub fn entropy(probs: &[f64]) -> f64 {
    probs
        .iter()
        .filter(|p| **p > 0.0)
        .map(|p| -p * p.log2())
        .sum()
}

/// Probability of each option value under the candidates' beliefs.
///
/// A value's mass is the summed probability of the candidates indicating
/// it. The result is normalized, or uniform when no candidate indicates any
/// of the values.
fn option_distribution(weighted: &[(&ClusterRule, f64)], fact_id: &str, values: &[FactValue]) -> Vec<f64> {
    let mut probs: Vec<f64> = values
        .iter()
        .map(|value| {
            weighted
                .iter()
                .filter(|(rule, _)| {
                    rule.indicated_values(fact_id)
                        .is_some_and(|indicated| value.matches_any(indicated))
                })
                .map(|(_, p)| p)
                .sum::<f64>()
        })
        .collect();

    let total: f64 = probs.iter().sum();
    if total > 0.0 {
        for p in &mut probs {
            *p /= total;
        }
    } else {
        #[allow(clippy::cast_precision_loss)]
        let uniform = 1.0 / probs.len().max(1) as f64;
        probs.fill(uniform);
    }
    probs
}

/// First must-ask fact for the configured carrier that is still open.
fn carrier_override(
    kb: &KnowledgeBase,
    state: &SessionState,
    config: &EngineConfig,
    frontier: &BTreeSet<String>,
) -> Option<NextQuestion> {
    let carrier = config.carrier_group?;
    let policy = kb.policy()?;

    policy
        .must_asks(carrier, config.province, kb.room())
        .iter()
        .filter(|fact_id| frontier.contains(fact_id.as_str()) && !state.is_settled(fact_id))
        .find_map(|fact_id| build_question(kb, &state.candidates, fact_id, QuestionOrigin::Carrier))
}

/// Picks the next question.
///
/// Carrier must-asks short-circuit the general algorithm. Otherwise every
/// frontier fact with buildable options is scored by the entropy of its
/// answer distribution; the highest wins, ties going to the smaller fact id.
/// Returns `None` when the frontier is empty or nothing in it is buildable.
#[must_use]
pub fn select_next_question(
    kb: &KnowledgeBase,
    state: &SessionState,
    config: &EngineConfig,
) -> Option<NextQuestion> {
    let frontier = frontier(kb, state);
    if frontier.is_empty() {
        return None;
    }

    if let Some(question) = carrier_override(kb, state, config, &frontier) {
        debug!(fact = %question.fact_id, origin = "carrier", "selected question");
        return Some(question);
    }

    let distribution = candidate_distribution(state);
    let weighted: Vec<(&ClusterRule, f64)> = distribution
        .iter()
        .filter_map(|(id, p)| kb.cluster(id).map(|rule| (rule, *p)))
        .collect();

    let mut best: Option<(&str, f64)> = None;
    for fact_id in &frontier {
        let (_, values) = resolve_options(kb, &state.candidates, fact_id);
        if values.is_empty() {
            continue;
        }
        let score = entropy(&option_distribution(&weighted, fact_id, &values));
        match best {
            Some((_, best_score)) if score <= best_score + ENTROPY_TIE_EPSILON => {}
            _ => best = Some((fact_id.as_str(), score)),
        }
    }

    let (fact_id, score) = best?;
    debug!(fact = fact_id, entropy = score, origin = "normal", "selected question");
    build_question(kb, &state.candidates, fact_id, QuestionOrigin::Normal)
}
