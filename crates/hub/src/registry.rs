// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registry of active sessions, keyed by agent id.
//!
//! Readers get a cheap immutable snapshot (an `Arc` of the map); writers
//! swap in a modified copy. Lookups and broadcasts never hold the lock
//! while doing I/O.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use polychat_core::AgentId;
use tracing::{debug, info};

use crate::session::{CloseReason, Session};

/// Immutable view of the registry at one instant
pub type Snapshot = Arc<BTreeMap<AgentId, Arc<Session>>>;

/// Shared handle to the session table
#[derive(Clone, Default)]
pub struct Registry {
    sessions: Arc<RwLock<Snapshot>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `session` the live session for its agent.
    ///
    /// A previous session for the same agent is closed as superseded.
    pub fn register(&self, session: Arc<Session>) {
        let agent = session.agent().clone();
        let previous = {
            let mut sessions = self.sessions.write();
            Arc::make_mut(&mut *sessions).insert(agent.clone(), Arc::clone(&session))
        };

        match previous {
            Some(previous) if !Arc::ptr_eq(&previous, &session) => {
                info!(
                    agent = %agent,
                    session = session.id(),
                    superseded = previous.id(),
                    "agent reconnected, closing previous session"
                );
                previous.close(CloseReason::Superseded);
            }
            _ => info!(agent = %agent, session = session.id(), "agent registered"),
        }
    }

    /// Remove `session` if it is still the one registered for `agent`.
    ///
    /// Returns false when a newer session has already taken its place.
    pub fn unregister(&self, agent: &AgentId, session: &Session) -> bool {
        let mut sessions = self.sessions.write();
        let is_current = sessions
            .get(agent)
            .is_some_and(|current| current.id() == session.id());
        if !is_current {
            debug!(agent = %agent, session = session.id(), "stale session, registry unchanged");
            return false;
        }
        Arc::make_mut(&mut *sessions).remove(agent);
        drop(sessions);
        info!(agent = %agent, session = session.id(), "agent unregistered");
        true
    }

    pub fn lookup(&self, agent: &AgentId) -> Option<Arc<Session>> {
        self.sessions.read().get(agent).cloned()
    }

    /// Sessions registered right now; later changes are not reflected.
    pub fn snapshot(&self) -> Snapshot {
        self.sessions.read().clone()
    }

    pub fn agents(&self) -> Vec<AgentId> {
        self.snapshot().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Ask every registered session to close; returns the sessions asked.
    pub fn close_all(&self, reason: CloseReason) -> Vec<Arc<Session>> {
        let sessions: Vec<_> = self.snapshot().values().cloned().collect();
        for session in &sessions {
            session.close(reason.clone());
        }
        sessions
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("agents", &self.agents())
            .finish()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
