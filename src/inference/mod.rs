//! Inference primitives.
//!
//! Pure functions over a [`KnowledgeBase`](crate::knowledge::KnowledgeBase)
//! and a [`SessionState`](crate::session::SessionState): hard filtering,
//! the Bayesian update with pruning, question selection and the stop check.
//! The engine composes them; hosts that keep their own state can call them
//! directly.

mod filter;
mod posterior;
mod selector;
mod stop;

pub use filter::recompute_candidates;
pub use posterior::{
    apply_bayes_update, candidate_distribution, initial_prior, likelihood_ratio, prune_candidates,
    top_k_mass, UpdateOutcome, ABS_THRESH, LR_NEG, LR_POS, LR_UNKNOWN, REL_THRESH,
};
pub use selector::{
    build_question, entropy, frontier, resolve_options, select_next_question, OptionSource,
    ENTROPY_TIE_EPSILON,
};
pub use stop::{check_stop, StopDecision, StopReason};
