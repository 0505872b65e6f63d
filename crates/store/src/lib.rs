//! Call session store
//!
//! Keyed state for every call in progress or recently completed. The map
//! itself sits behind a read/write lock; each session carries its own
//! mutex, so callbacks for unrelated calls never serialize against each
//! other and a read-modify-write for one call is a single atomic
//! transition.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use thiserror::Error;

use please_hold_core::CallSession;

/// Store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Session not found: {0}")]
    NotFound(String),
}

/// Handle to one session's state
///
/// All reads and writes go through the inner mutex, so concurrent
/// callbacks for the same call serialize and a snapshot never observes a
/// half-applied transition.
pub struct SessionHandle {
    state: Mutex<CallSession>,
}

impl SessionHandle {
    fn new(session: CallSession) -> Self {
        Self {
            state: Mutex::new(session),
        }
    }

    /// Run a read-only closure against the session
    pub fn read<R>(&self, f: impl FnOnce(&CallSession) -> R) -> R {
        f(&self.state.lock())
    }

    /// Apply a single atomic state transition
    pub fn update<R>(&self, f: impl FnOnce(&mut CallSession) -> R) -> R {
        f(&mut self.state.lock())
    }

    /// Copy of the session as of now
    pub fn snapshot(&self) -> CallSession {
        self.state.lock().clone()
    }
}

/// In-memory session store
///
/// Lookup by session id stays O(1) amortized regardless of how many
/// historical sessions accumulate; retention/eviction is an external
/// concern.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<SessionHandle>>>,
}

impl SessionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a session, lazily creating it on first contact
    ///
    /// Idempotent: a concurrent duplicate callback for a new id gets the
    /// same handle, never a second session.
    pub fn get_or_create(&self, session_id: &str, caller_id: Option<&str>) -> Arc<SessionHandle> {
        if let Some(handle) = self.get(session_id) {
            return handle;
        }

        let mut sessions = self.sessions.write();
        // Re-check under the write lock: another callback may have won.
        Arc::clone(sessions.entry(session_id.to_string()).or_insert_with(|| {
            tracing::info!("Created session: {}", session_id);
            Arc::new(SessionHandle::new(CallSession::new(session_id, caller_id)))
        }))
    }

    /// Get a session by id
    pub fn get(&self, session_id: &str) -> Option<Arc<SessionHandle>> {
        self.sessions.read().get(session_id).cloned()
    }

    /// Apply a single atomic transition to a known session
    pub fn update<R>(
        &self,
        session_id: &str,
        f: impl FnOnce(&mut CallSession) -> R,
    ) -> Result<R, StoreError> {
        let handle = self
            .get(session_id)
            .ok_or_else(|| StoreError::NotFound(session_id.to_string()))?;
        Ok(handle.update(f))
    }

    /// Point-in-time copy of every session, for aggregation
    ///
    /// Handles are collected under the map read lock, then each session
    /// is cloned under its own mutex; a session mid-update is observed
    /// either fully before or fully after its transition.
    pub fn snapshot(&self) -> Vec<CallSession> {
        let handles: Vec<Arc<SessionHandle>> =
            self.sessions.read().values().cloned().collect();
        handles.iter().map(|h| h.snapshot()).collect()
    }

    /// Total session count, live and completed
    pub fn count(&self) -> usize {
        self.sessions.read().len()
    }

    /// Sessions still in progress
    pub fn active_count(&self) -> usize {
        let handles: Vec<Arc<SessionHandle>> =
            self.sessions.read().values().cloned().collect();
        handles
            .iter()
            .filter(|h| h.read(|s| !s.is_terminal()))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use please_hold_core::CallOutcome;

    #[test]
    fn test_get_or_create_is_idempotent() {
        let store = SessionStore::new();

        let first = store.get_or_create("CA1", Some("+15550100"));
        let second = store.get_or_create("CA1", Some("+15559999"));

        // Same underlying session; the second caller id is ignored
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.read(|s| s.caller_id.clone()), "+15550100");
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn test_get_unknown_session() {
        let store = SessionStore::new();
        assert!(store.get("CA404").is_none());
    }

    #[test]
    fn test_update_unknown_session_signals_not_found() {
        let store = SessionStore::new();
        let result = store.update("CA404", |s| s.turn_count += 1);
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_update_applies_transition() {
        let store = SessionStore::new();
        store.get_or_create("CA1", None);

        store.update("CA1", |s| s.turn_count += 1).unwrap();
        store.update("CA1", |s| s.turn_count += 1).unwrap();

        let handle = store.get("CA1").unwrap();
        assert_eq!(handle.read(|s| s.turn_count), 2);
    }

    #[test]
    fn test_snapshot_copies_all_sessions() {
        let store = SessionStore::new();
        store.get_or_create("CA1", None);
        store.get_or_create("CA2", None);
        store
            .update("CA2", |s| {
                s.mark_terminated(CallOutcome::CallerHangup, "Bye.", chrono::Utc::now());
            })
            .unwrap();

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(store.active_count(), 1);

        // The snapshot is a copy; mutating the store afterwards does not
        // retroactively change it
        store.update("CA1", |s| s.turn_count = 99).unwrap();
        let copied = snapshot.iter().find(|s| s.session_id == "CA1").unwrap();
        assert_eq!(copied.turn_count, 0);
    }

    #[test]
    fn test_concurrent_updates_serialize_per_session() {
        let store = Arc::new(SessionStore::new());
        store.get_or_create("CA1", None);

        let mut threads = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            threads.push(std::thread::spawn(move || {
                for _ in 0..100 {
                    store.update("CA1", |s| s.turn_count += 1).unwrap();
                }
            }));
        }
        for t in threads {
            t.join().unwrap();
        }

        let handle = store.get("CA1").unwrap();
        assert_eq!(handle.read(|s| s.turn_count), 800);
    }

    #[test]
    fn test_snapshot_never_observes_torn_state() {
        // Writers flip outcome and end_time together; a torn read would
        // show one without the other.
        let store = Arc::new(SessionStore::new());
        for i in 0..16 {
            store.get_or_create(&format!("CA{}", i), None);
        }

        let writer = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for i in 0..16 {
                    store
                        .update(&format!("CA{}", i), |s| {
                            s.turn_count += 1;
                            s.mark_terminated(
                                CallOutcome::SilenceTimeout,
                                "Goodbye.",
                                chrono::Utc::now(),
                            );
                        })
                        .unwrap();
                }
            })
        };

        for _ in 0..50 {
            for session in store.snapshot() {
                assert_eq!(
                    session.end_time.is_some(),
                    session.is_terminal(),
                    "end_time and outcome must flip together"
                );
            }
        }
        writer.join().unwrap();
    }
}
