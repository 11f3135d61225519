use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::posterior::{candidate_distribution, top_k_mass};
use super::selector::frontier;
use crate::config::EngineConfig;
use crate::knowledge::KnowledgeBase;
use crate::session::SessionState;

/// Why a dialogue stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopReason {
    /// Few enough candidates survive.
    Count,
    /// The leading candidates hold enough probability mass.
    Mass,
    /// No fact can discriminate further.
    Exhausted,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Count => "count",
            Self::Mass => "mass",
            Self::Exhausted => "exhausted",
        };
        f.write_str(s)
    }
}

/// Result of a stop check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopDecision {
    /// Whether the dialogue should end now.
    pub should_stop: bool,
    /// Which rule fired; `None` while the dialogue continues.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<StopReason>,
}

impl StopDecision {
    /// Keep asking.
    #[must_use]
    pub const fn proceed() -> Self {
        Self {
            should_stop: false,
            reason: None,
        }
    }

    /// Stop for the given reason.
    #[must_use]
    pub const fn stop(reason: StopReason) -> Self {
        Self {
            should_stop: true,
            reason: Some(reason),
        }
    }
}

/// Evaluates the stop conditions in priority order: count, mass, exhausted.
#[must_use]
pub fn check_stop(kb: &KnowledgeBase, state: &SessionState, config: &EngineConfig) -> StopDecision {
    let decision = evaluate(kb, state, config);
    debug!(
        candidates = state.candidates.len(),
        should_stop = decision.should_stop,
        reason = ?decision.reason,
        "stop check"
    );
    decision
}

fn evaluate(kb: &KnowledgeBase, state: &SessionState, config: &EngineConfig) -> StopDecision {
    if state.candidates.len() <= config.stop_at {
        return StopDecision::stop(StopReason::Count);
    }

    if config.mass_check_enabled() {
        let mass = top_k_mass(&candidate_distribution(state), config.top_k);
        if mass >= config.tau {
            return StopDecision::stop(StopReason::Mass);
        }
    }

    if frontier(kb, state).is_empty() {
        return StopDecision::stop(StopReason::Exhausted);
    }

    StopDecision::proceed()
}
