//! # Waterline - Adaptive Questioning for Water-Damage Diagnosis
//!
//! Waterline narrows a set of candidate damage clusters (diagnostic
//! hypotheses) down to the one that best explains a room, by asking as few
//! questions as possible.
//!
//! ## Core Concepts
//!
//! - **Cluster**: a diagnostic hypothesis with hard constraints (`requires`,
//!   `excludes`) and soft evidence (`indicates`)
//! - **Fact**: a question topic, answered with a [`FactValue`]
//! - **Posterior**: belief over every cluster, updated by fixed likelihood ratios
//! - **Frontier**: facts that can still separate the surviving clusters
//! - **Snapshot**: an immutable [`EngineState`] for the presentation layer
//!
//! ## Usage
//!
//! ```rust
//! use waterline::{
//!     ClusterRuleDoc, Engine, EngineConfig, KnowledgeBundle, QuestionBank, StaticLoader,
//! };
//!
//! # async fn run() -> waterline::WaterlineResult<()> {
//! let loader = StaticLoader::new(KnowledgeBundle::new(
//!     vec![
//!         ClusterRuleDoc::new("supply-line").with_indicates("ceiling_stain", ["yes"]),
//!         ClusterRuleDoc::new("groundwater").with_indicates("ceiling_stain", ["no"]),
//!     ],
//!     QuestionBank::new(),
//! ));
//!
//! let mut engine = Engine::new(EngineConfig::new("BATHROOM"))?;
//! engine.initialize(&loader).await?;
//!
//! while let Some(question) = engine.next_question()? {
//!     engine.update_with_answer(&question.fact_id, "yes")?;
//!     if engine.check_stop()?.should_stop {
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types
pub mod band;
pub mod config;
pub mod error;
pub mod frame;
pub mod session;
pub mod value;

// Knowledge and inference
pub mod inference;
pub mod knowledge;

// Facade
pub mod engine;
pub mod registry;

// Re-export primary types at crate root for convenience
pub use band::ConfidenceBand;
pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{ExecutionError, LoadError, ValidationError, WaterlineError, WaterlineResult};
pub use frame::{Candidate, EngineState, Evidence, Metrics, NextQuestion, QuestionOption, QuestionOrigin};
pub use inference::{StopDecision, StopReason, UpdateOutcome};
pub use knowledge::{
    BuildReport, ClusterId, ClusterRule, ClusterRuleDoc, FactPhase, KnowledgeBase, KnowledgeBundle,
    KnowledgeLoader, MustAskEntry, PolicyShims, QuestionBank, QuestionKind, QuestionSpec,
    RoomPriors, StaticLoader,
};
pub use registry::{SessionId, SessionRegistry};
pub use session::{Answer, AnswerRecord, SessionState};
pub use value::FactValue;
