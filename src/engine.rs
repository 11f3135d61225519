//! Session engine.
//!
//! [`Engine`] owns one dialogue: the room-scoped knowledge base, the
//! mutable [`SessionState`] and the answer transcript. Loading is the only
//! asynchronous step; every other call is synchronous and deterministic.
//!
//! # Example
//!
//! ```
//! use waterline::{ClusterRuleDoc, Engine, EngineConfig, KnowledgeBundle, QuestionBank};
//!
//! let bundle = KnowledgeBundle::new(
//!     vec![
//!         ClusterRuleDoc::new("A").with_indicates("f1", ["yes"]),
//!         ClusterRuleDoc::new("B").with_indicates("f1", ["no"]),
//!     ],
//!     QuestionBank::new(),
//! );
//!
//! let mut engine = Engine::new(EngineConfig::new("BATHROOM")).unwrap();
//! engine.initialize_with(bundle);
//! engine.update_with_answer("f1", "yes").unwrap();
//!
//! let state = engine.state_after_last().unwrap();
//! assert_eq!(state.candidates[0].id.as_str(), "A");
//! ```

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::band::elbow_bands;
use crate::config::EngineConfig;
use crate::error::{ExecutionError, ValidationError, WaterlineError, WaterlineResult};
use crate::frame::{Candidate, EngineState, Evidence, Metrics, NextQuestion};
use crate::inference::{
    apply_bayes_update, candidate_distribution, check_stop, initial_prior, recompute_candidates,
    select_next_question, top_k_mass, StopDecision, UpdateOutcome,
};
use crate::knowledge::{BuildReport, FactPhase, KnowledgeBase, KnowledgeBundle, KnowledgeLoader};
use crate::session::{Answer, AnswerRecord, SessionState};
use crate::value::FactValue;

#[derive(Debug, Clone)]
struct LoadedSession {
    kb: KnowledgeBase,
    state: SessionState,
    transcript: Vec<AnswerRecord>,
}

impl LoadedSession {
    fn new(kb: KnowledgeBase) -> Self {
        let state = SessionState::fresh(kb.cluster_ids(), initial_prior(&kb));
        Self {
            kb,
            state,
            transcript: Vec::new(),
        }
    }

    fn reset(&mut self) {
        self.kb.rebuild_index();
        self.state = SessionState::fresh(self.kb.cluster_ids(), initial_prior(&self.kb));
        self.transcript.clear();
    }

    /// Records the answer, recomputes survivors from all known facts, then
    /// runs the Bayesian update.
    fn apply(&mut self, record: AnswerRecord) -> UpdateOutcome {
        let answer = &record.answer;
        self.state.record(answer);

        let before = self.state.candidates.len();
        self.state.candidates = recompute_candidates(&self.kb, &self.state.facts_known);
        let filtered = self.state.candidates.len();
        let outcome = apply_bayes_update(&self.kb, &mut self.state, &answer.fact_id, &answer.value);

        debug!(
            fact = %answer.fact_id,
            value = %answer.value,
            before,
            after_filter = filtered,
            after_prune = self.state.candidates.len(),
            degenerate = outcome.degenerate,
            "answer applied"
        );
        self.transcript.push(record);
        outcome
    }
}

/// One diagnostic dialogue.
///
/// Not internally synchronized: a host serving many users keeps one engine
/// per session and serializes access to it (see
/// [`SessionRegistry`](crate::registry::SessionRegistry)).
#[derive(Debug, Clone)]
pub struct Engine {
    config: EngineConfig,
    session: Option<LoadedSession>,
}

impl Engine {
    /// Creates an engine that still needs [`initialize`](Self::initialize).
    ///
    /// # Errors
    ///
    /// Returns a validation error if the configuration is out of range.
    pub fn new(config: EngineConfig) -> WaterlineResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            session: None,
        })
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Loads knowledge through `loader` and starts a fresh dialogue.
    ///
    /// Replaces any previous session. On failure the previous session, if
    /// any, is left untouched.
    ///
    /// # Errors
    ///
    /// Returns the loader's [`LoadError`](crate::error::LoadError) unchanged.
    /// No retries are attempted.
    pub async fn initialize<L: KnowledgeLoader>(&mut self, loader: &L) -> WaterlineResult<BuildReport> {
        let bundle = loader.load().await?;
        Ok(self.initialize_with(bundle))
    }

    /// Starts a fresh dialogue from an already loaded bundle.
    pub fn initialize_with(&mut self, bundle: KnowledgeBundle) -> BuildReport {
        let (kb, report) = KnowledgeBase::build(bundle, &self.config.room);
        info!(
            room = %self.config.room,
            clusters = report.kept,
            carrier = ?self.config.carrier_group,
            "session initialized"
        );
        self.session = Some(LoadedSession::new(kb));
        report
    }

    /// Whether a knowledge base has been loaded.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.session.is_some()
    }

    fn session(&self) -> WaterlineResult<&LoadedSession> {
        self.session
            .as_ref()
            .ok_or(WaterlineError::Execution(ExecutionError::NotInitialized))
    }

    fn session_mut(&mut self) -> WaterlineResult<&mut LoadedSession> {
        self.session
            .as_mut()
            .ok_or(WaterlineError::Execution(ExecutionError::NotInitialized))
    }

    /// Applies one answer.
    ///
    /// The value is normalized first (`"true"` becomes a boolean, `"unknown"`
    /// becomes UNKNOWN, and so on).
    ///
    /// # Errors
    ///
    /// Returns `EmptyFactId` for a blank fact id and `NotInitialized`
    /// before [`initialize`](Self::initialize).
    pub fn update_with_answer(
        &mut self,
        fact_id: &str,
        value: impl Into<FactValue>,
    ) -> WaterlineResult<UpdateOutcome> {
        self.update_at(fact_id, value, Utc::now())
    }

    /// Like [`update_with_answer`](Self::update_with_answer) with an explicit
    /// transcript timestamp.
    ///
    /// # Errors
    ///
    /// Same as [`update_with_answer`](Self::update_with_answer).
    pub fn update_at(
        &mut self,
        fact_id: &str,
        value: impl Into<FactValue>,
        answered_at: DateTime<Utc>,
    ) -> WaterlineResult<UpdateOutcome> {
        let fact_id = fact_id.trim();
        if fact_id.is_empty() {
            return Err(ValidationError::EmptyFactId.into());
        }
        let session = self.session_mut()?;
        let record = AnswerRecord {
            answer: Answer::new(fact_id, value),
            answered_at,
        };
        Ok(session.apply(record))
    }

    /// Snapshot of the dialogue, with evidence relative to `last_answer`.
    ///
    /// Pure read: two calls without an update in between return equal
    /// snapshots.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` before [`initialize`](Self::initialize).
    pub fn state(&self, last_answer: Option<&Answer>) -> WaterlineResult<EngineState> {
        let session = self.session()?;
        let kb = &session.kb;

        let mut ranked = candidate_distribution(&session.state);
        let mass = (self.config.top_k > 0).then(|| top_k_mass(&ranked, self.config.top_k));
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let probs: Vec<f64> = ranked.iter().map(|(_, p)| *p).collect();
        let bands = elbow_bands(&probs);

        let candidates: Vec<Candidate> = ranked
            .into_iter()
            .zip(bands)
            .map(|((id, probability), band)| {
                let evidence = last_answer
                    .and_then(|answer| kb.cluster(&id).map(|rule| Evidence::for_answer(rule, answer)));
                Candidate {
                    id,
                    probability,
                    evidence,
                    band,
                }
            })
            .collect();

        Ok(EngineState {
            metrics: Metrics {
                top_k_mass: mass,
                candidates_count: candidates.len(),
            },
            candidates,
            last_answer: last_answer.cloned(),
            next_question: select_next_question(kb, &session.state, &self.config),
            stop: check_stop(kb, &session.state, &self.config),
        })
    }

    /// Snapshot annotated against the most recent answer.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` before [`initialize`](Self::initialize).
    pub fn state_after_last(&self) -> WaterlineResult<EngineState> {
        let last = self.session()?.transcript.last().map(|r| &r.answer);
        self.state(last)
    }

    /// The question to ask next, if any.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` before [`initialize`](Self::initialize).
    pub fn next_question(&self) -> WaterlineResult<Option<NextQuestion>> {
        let session = self.session()?;
        Ok(select_next_question(&session.kb, &session.state, &self.config))
    }

    /// Evaluates the stop conditions.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` before [`initialize`](Self::initialize).
    pub fn check_stop(&self) -> WaterlineResult<StopDecision> {
        let session = self.session()?;
        Ok(check_stop(&session.kb, &session.state, &self.config))
    }

    /// Back to the initial prior with no facts, history or transcript.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` before [`initialize`](Self::initialize).
    pub fn reset(&mut self) -> WaterlineResult<()> {
        self.session_mut()?.reset();
        debug!("session reset");
        Ok(())
    }

    /// Retracts the most recent answer by resetting and replaying the rest
    /// of the transcript in order. Returns the retracted answer.
    ///
    /// Replayed records keep their original timestamps, so the resulting
    /// state is identical to the one held before that answer was given.
    ///
    /// # Errors
    ///
    /// Returns `NothingToUndo` on an empty transcript and `NotInitialized`
    /// before [`initialize`](Self::initialize).
    pub fn undo_last(&mut self) -> WaterlineResult<Answer> {
        let session = self.session_mut()?;
        let mut remaining = std::mem::take(&mut session.transcript);
        let Some(undone) = remaining.pop() else {
            return Err(ExecutionError::NothingToUndo.into());
        };

        session.reset();
        let replayed = remaining.len();
        for record in remaining {
            session.apply(record);
        }
        debug!(fact = %undone.answer.fact_id, replayed, "undid last answer");
        Ok(undone.answer)
    }

    /// Current raw session state.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` before [`initialize`](Self::initialize).
    pub fn session_state(&self) -> WaterlineResult<&SessionState> {
        Ok(&self.session()?.state)
    }

    /// Answers given so far, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` before [`initialize`](Self::initialize).
    pub fn transcript(&self) -> WaterlineResult<&[AnswerRecord]> {
        Ok(&self.session()?.transcript)
    }

    /// Role a fact plays in the loaded knowledge base.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` before [`initialize`](Self::initialize).
    pub fn fact_phase(&self, fact_id: &str) -> WaterlineResult<Option<FactPhase>> {
        Ok(self.session()?.kb.index().phase(fact_id))
    }

    /// The loaded knowledge base.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` before [`initialize`](Self::initialize).
    pub fn knowledge(&self) -> WaterlineResult<&KnowledgeBase> {
        Ok(&self.session()?.kb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::{ClusterRuleDoc, QuestionBank};

    fn bundle() -> KnowledgeBundle {
        KnowledgeBundle::new(
            vec![
                ClusterRuleDoc::new("A")
                    .with_room("BATHROOM")
                    .with_indicates("f1", ["yes"]),
                ClusterRuleDoc::new("B")
                    .with_room("BATHROOM")
                    .with_indicates("f1", ["no"]),
                ClusterRuleDoc::new("C")
                    .with_requires("f2", ["x"])
                    .with_indicates("f1", ["yes"]),
            ],
            QuestionBank::new(),
        )
    }

    fn engine() -> Engine {
        let mut engine = Engine::new(EngineConfig::new("BATHROOM")).unwrap();
        engine.initialize_with(bundle());
        engine
    }

    #[test]
    fn test_new_rejects_bad_config() {
        let err = Engine::new(EngineConfig::new("X").with_tau(2.0)).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_queries_fail_before_initialize() {
        let mut engine = Engine::new(EngineConfig::default()).unwrap();
        assert!(!engine.is_initialized());
        assert!(matches!(
            engine.state(None),
            Err(WaterlineError::Execution(ExecutionError::NotInitialized))
        ));
        assert!(engine.next_question().is_err());
        assert!(engine.check_stop().is_err());
        assert!(engine.update_with_answer("f1", "yes").is_err());
        assert!(engine.reset().is_err());
        assert!(engine.undo_last().is_err());
    }

    #[test]
    fn test_empty_fact_id_rejected() {
        let mut engine = engine();
        let err = engine.update_with_answer("  ", "yes").unwrap_err();
        assert!(matches!(err, WaterlineError::Validation(ValidationError::EmptyFactId)));
    }

    #[test]
    fn test_update_records_and_filters() {
        let mut engine = engine();
        engine.update_with_answer("f2", "y").unwrap();

        let state = engine.session_state().unwrap();
        assert_eq!(state.questions_asked, vec!["f2".to_string()]);
        assert!(!state.candidates.iter().any(|id| id.as_str() == "C"));
        assert_eq!(engine.transcript().unwrap().len(), 1);
    }

    #[test]
    fn test_state_marks_evidence() {
        let mut engine = engine();
        engine.update_with_answer("f1", "yes").unwrap();
        let snapshot = engine.state_after_last().unwrap();

        assert_eq!(snapshot.candidates.len(), 3);
        let b = snapshot
            .candidates
            .iter()
            .find(|c| c.id.as_str() == "B")
            .unwrap();
        assert_eq!(b.evidence, Some(Evidence::Contradicts));
        assert_eq!(snapshot.candidates[0].evidence, Some(Evidence::Supports));
        // A and C tie; the smaller id sorts first.
        assert_eq!(snapshot.candidates[0].id.as_str(), "A");
        assert_eq!(snapshot.candidates[1].id.as_str(), "C");
    }

    #[test]
    fn test_reset_restores_fresh_state() {
        let mut engine = engine();
        let fresh = engine.session_state().unwrap().clone();
        engine.update_with_answer("f1", "no").unwrap();
        engine.reset().unwrap();

        assert_eq!(engine.session_state().unwrap(), &fresh);
        assert!(engine.transcript().unwrap().is_empty());
    }

    #[test]
    fn test_undo_on_empty_transcript() {
        let mut engine = engine();
        assert!(matches!(
            engine.undo_last(),
            Err(WaterlineError::Execution(ExecutionError::NothingToUndo))
        ));
    }

    #[test]
    fn test_fact_phase() {
        let engine = engine();
        assert_eq!(engine.fact_phase("f2").unwrap(), Some(FactPhase::Screening));
        assert_eq!(engine.fact_phase("f1").unwrap(), Some(FactPhase::Discriminating));
    }
}
