//! Session registry.
//!
//! # Responsibilities
//! - Map identity ids and connection ids to the single live session
//! - Supersede an identity's previous session when it reconnects
//! - Hand out point-in-time snapshots for fan-out
//!
//! # Design Decisions
//! - `by_identity` is authoritative; `by_connection` mirrors it
//! - Every mutation runs while holding the identity's shard lock, and the
//!   connection map is only ever locked after it. Unrelated identities land
//!   on other shards and proceed in parallel.
//! - Lock order is always identity → connection, so the pair cannot deadlock

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::connection::{CloseReason, ConnectionHandle};
use super::identity::{Identity, IdentityId};
use crate::net::connection::ConnectionId;
use crate::observability::metrics;

/// A live pairing of an identity with one connection.
#[derive(Clone)]
pub struct Session {
    pub identity: Arc<Identity>,
    pub connection: Arc<dyn ConnectionHandle>,
    pub connected_at: DateTime<Utc>,
}

impl Session {
    fn new(identity: Identity, connection: Arc<dyn ConnectionHandle>) -> Self {
        Self {
            identity: Arc::new(identity),
            connection,
            connected_at: Utc::now(),
        }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection.id()
    }

    pub fn is_live(&self) -> bool {
        self.connection.is_open()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("identity_id", &self.identity.id)
            .field("connection_id", &self.connection_id())
            .field("connected_at", &self.connected_at)
            .finish()
    }
}

/// Authoritative table of live sessions.
#[derive(Default)]
pub struct SessionRegistry {
    by_identity: DashMap<IdentityId, Session>,
    by_connection: DashMap<ConnectionId, IdentityId>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a session for `identity`, superseding any existing one.
    ///
    /// The superseded session is removed from both indexes and its connection
    /// is asked to close before the new session becomes visible. A failing
    /// close is logged and ignored. Returns the superseded session.
    pub fn register(
        &self,
        identity: Identity,
        connection: Arc<dyn ConnectionHandle>,
    ) -> Option<Session> {
        let connection_id = connection.id();
        let identity_id = identity.id.clone();
        let session = Session::new(identity, connection);

        let superseded = match self.by_identity.entry(identity_id.clone()) {
            Entry::Occupied(mut entry) => {
                let old = entry.insert(session);
                self.by_connection.remove(&old.connection_id());
                self.by_connection.insert(connection_id, identity_id.clone());

                tracing::info!(
                    identity_id = %identity_id,
                    old_connection_id = %old.connection_id(),
                    connection_id = %connection_id,
                    "Identity reconnected, closing previous session"
                );
                if let Err(e) = old.connection.close(CloseReason::superseded()) {
                    tracing::debug!(
                        connection_id = %old.connection_id(),
                        error = %e,
                        "Failed to close superseded connection"
                    );
                }
                Some(old)
            }
            Entry::Vacant(entry) => {
                entry.insert(session);
                self.by_connection.insert(connection_id, identity_id.clone());
                None
            }
        };

        let online = self.count();
        metrics::set_active_sessions(online);
        tracing::info!(
            identity_id = %identity_id,
            connection_id = %connection_id,
            online,
            "Session registered"
        );
        superseded
    }

    /// Remove the session owned by `connection_id`.
    ///
    /// Idempotent. A connection that was already superseded maps to nothing
    /// and leaves the newer session untouched.
    pub fn unregister(&self, connection_id: ConnectionId) -> Option<Session> {
        let identity_id = self.by_connection.get(&connection_id)?.value().clone();

        let removed = match self.by_identity.entry(identity_id) {
            Entry::Occupied(entry) if entry.get().connection_id() == connection_id => {
                self.by_connection.remove(&connection_id);
                Some(entry.remove())
            }
            _ => None,
        };

        if let Some(session) = &removed {
            let online = self.count();
            metrics::set_active_sessions(online);
            tracing::info!(
                identity_id = %session.identity.id,
                connection_id = %connection_id,
                online,
                "Session removed"
            );
        }
        removed
    }

    pub fn lookup_by_identity(&self, identity_id: &IdentityId) -> Option<Session> {
        self.by_identity.get(identity_id).map(|r| r.value().clone())
    }

    /// True iff a session exists for the identity and its connection is open.
    pub fn is_live(&self, identity_id: &IdentityId) -> bool {
        self.by_identity
            .get(identity_id)
            .map(|r| r.value().is_live())
            .unwrap_or(false)
    }

    /// Copy of every registered session. Later registry changes are not
    /// reflected in the returned vector.
    pub fn all_sessions(&self) -> Vec<Session> {
        self.by_identity.iter().map(|r| r.value().clone()).collect()
    }

    pub fn contains_connection(&self, connection_id: ConnectionId) -> bool {
        self.by_connection.contains_key(&connection_id)
    }

    /// Number of registered sessions, not necessarily all live.
    pub fn count(&self) -> usize {
        self.by_identity.len()
    }

    /// Close every session and empty the registry.
    pub fn close_all(&self, reason: CloseReason) -> usize {
        let sessions = self.all_sessions();
        for session in &sessions {
            let _ = session.connection.close(reason.clone());
            self.unregister(session.connection_id());
        }
        sessions.len()
    }
}
