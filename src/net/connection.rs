//! Connection identity and lifecycle state.
//!
//! # Responsibilities
//! - Generate unique connection IDs for registry keys and tracing
//! - Track connection state (Open → Closing → Closed)

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

/// Ids are process-unique, never reused.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Identifies one WebSocket for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Where a connection is in its close sequence.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Frames can be sent.
    Open = 0,
    /// Close requested, close frame not yet written.
    Closing = 1,
    /// Transport is gone.
    Closed = 2,
}

impl From<u8> for ConnectionState {
    fn from(val: u8) -> Self {
        match val {
            0 => ConnectionState::Open,
            1 => ConnectionState::Closing,
            _ => ConnectionState::Closed,
        }
    }
}

/// Lock-free cell holding a [`ConnectionState`].
///
/// Transitions only move forward; a closed connection never reopens.
#[derive(Debug)]
pub struct StateCell(AtomicU8);

impl StateCell {
    pub fn new() -> Self {
        Self(AtomicU8::new(ConnectionState::Open as u8))
    }

    pub fn get(&self) -> ConnectionState {
        ConnectionState::from(self.0.load(Ordering::Acquire))
    }

    /// Move to `next` if it is later than the current state.
    /// Returns the previous state.
    pub fn advance(&self, next: ConnectionState) -> ConnectionState {
        ConnectionState::from(self.0.fetch_max(next as u8, Ordering::AcqRel))
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}
