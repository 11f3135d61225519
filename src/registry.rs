//! Session registry.
//!
//! An [`Engine`] is not synchronized, so a host serving many users keeps
//! one engine per session. [`SessionRegistry`] holds them behind
//! per-session mutexes: calls for the same session run one at a time, in
//! the order they acquire the lock, while different sessions proceed
//! independently.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, RwLock};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::Engine;
use crate::error::{ExecutionError, WaterlineError, WaterlineResult};

/// Default cap on concurrently open sessions.
pub const DEFAULT_MAX_SESSIONS: usize = 4096;

/// Unique identifier of a dialogue session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(uuid::Uuid);

impl SessionId {
    /// Creates a new random session ID.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Parses the hyphenated string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        uuid::Uuid::parse_str(s).ok().map(Self)
    }

    /// The underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Engines keyed by session id.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Arc<Mutex<Engine>>>>,
    max_sessions: usize,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    /// Creates a registry capped at [`DEFAULT_MAX_SESSIONS`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_SESSIONS)
    }

    /// Creates a registry capped at `max_sessions`.
    #[must_use]
    pub fn with_capacity(max_sessions: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_sessions,
        }
    }

    /// Maximum number of open sessions.
    #[must_use]
    pub const fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    /// Registers an engine under a fresh id.
    ///
    /// # Errors
    ///
    /// Returns `SessionLimitExceeded` when the registry is full.
    pub fn insert(&self, engine: Engine) -> WaterlineResult<SessionId> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| WaterlineError::internal("session registry lock poisoned"))?;
        if sessions.len() >= self.max_sessions {
            return Err(ExecutionError::SessionLimitExceeded {
                max: self.max_sessions,
            }
            .into());
        }

        let id = SessionId::new();
        sessions.insert(id, Arc::new(Mutex::new(engine)));
        debug!(session = %id, open = sessions.len(), "session opened");
        Ok(id)
    }

    /// Runs `f` with exclusive access to one session's engine.
    ///
    /// # Errors
    ///
    /// Returns `SessionNotFound` for an unknown id, or an internal error if
    /// a lock was poisoned.
    pub fn with_session<R>(&self, id: SessionId, f: impl FnOnce(&mut Engine) -> R) -> WaterlineResult<R> {
        let engine = {
            let sessions = self
                .sessions
                .read()
                .map_err(|_| WaterlineError::internal("session registry lock poisoned"))?;
            sessions
                .get(&id)
                .cloned()
                .ok_or(WaterlineError::Execution(ExecutionError::SessionNotFound { id }))?
        };

        let mut guard = engine
            .lock()
            .map_err(|_| WaterlineError::internal(format!("session {id} lock poisoned")))?;
        Ok(f(&mut guard))
    }

    /// Closes a session, returning whether it existed.
    ///
    /// # Errors
    ///
    /// Returns an internal error if the registry lock was poisoned.
    pub fn remove(&self, id: SessionId) -> WaterlineResult<bool> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| WaterlineError::internal("session registry lock poisoned"))?;
        let removed = sessions.remove(&id).is_some();
        if removed {
            debug!(session = %id, open = sessions.len(), "session closed");
        }
        Ok(removed)
    }

    /// # Errors
    ///
    /// Returns an internal error if the registry lock was poisoned.
    pub fn contains(&self, id: SessionId) -> WaterlineResult<bool> {
        let sessions = self
            .sessions
            .read()
            .map_err(|_| WaterlineError::internal("session registry lock poisoned"))?;
        Ok(sessions.contains_key(&id))
    }

    /// Number of open sessions.
    ///
    /// # Errors
    ///
    /// Returns an internal error if the registry lock was poisoned.
    pub fn len(&self) -> WaterlineResult<usize> {
        let sessions = self
            .sessions
            .read()
            .map_err(|_| WaterlineError::internal("session registry lock poisoned"))?;
        Ok(sessions.len())
    }

    /// # Errors
    ///
    /// Returns an internal error if the registry lock was poisoned.
    pub fn is_empty(&self) -> WaterlineResult<bool> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn engine() -> Engine {
        Engine::new(EngineConfig::new("KITCHEN")).unwrap()
    }

    #[test]
    fn test_session_id_display_and_parse() {
        let id = SessionId::new();
        assert_eq!(SessionId::parse(&id.to_string()), Some(id));
        assert_eq!(SessionId::parse("not-a-uuid"), None);
    }

    #[test]
    fn test_insert_and_access() {
        let registry = SessionRegistry::new();
        let id = registry.insert(engine()).unwrap();

        assert!(registry.contains(id).unwrap());
        let room = registry
            .with_session(id, |engine| engine.config().room.clone())
            .unwrap();
        assert_eq!(room, "KITCHEN");
    }

    #[test]
    fn test_unknown_session() {
        let registry = SessionRegistry::new();
        let err = registry.with_session(SessionId::new(), |_| ()).unwrap_err();
        assert!(matches!(
            err,
            WaterlineError::Execution(ExecutionError::SessionNotFound { .. })
        ));
    }

    #[test]
    fn test_capacity_enforced() {
        let registry = SessionRegistry::with_capacity(1);
        let first = registry.insert(engine()).unwrap();
        let err = registry.insert(engine()).unwrap_err();
        assert!(matches!(
            err,
            WaterlineError::Execution(ExecutionError::SessionLimitExceeded { max: 1 })
        ));

        assert!(registry.remove(first).unwrap());
        assert!(!registry.remove(first).unwrap());
        assert!(registry.is_empty().unwrap());
        assert!(registry.insert(engine()).is_ok());
    }
}
