//! Transport-agnostic connection handle.
//!
//! The registry, admission and delivery code never touch transport frames;
//! they talk to a connection through [`ConnectionHandle`]. The WebSocket
//! implementation lives in `http::websocket`.

use std::borrow::Cow;
use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use crate::net::connection::ConnectionId;

/// Close codes (RFC 6455 §7.4.1).
pub mod close_code {
    pub const NORMAL: u16 = 1000;
    pub const GOING_AWAY: u16 = 1001;
    pub const NOT_ACCEPTABLE: u16 = 1003;
    pub const BAD_DATA: u16 = 1007;
    pub const SERVER_ERROR: u16 = 1011;
}

/// Close code plus human readable reason sent to the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    pub code: u16,
    pub reason: Cow<'static, str>,
}

impl CloseReason {
    pub const fn new(code: u16, reason: &'static str) -> Self {
        Self {
            code,
            reason: Cow::Borrowed(reason),
        }
    }

    /// Sent to a session replaced by a newer connection of the same identity.
    pub const fn superseded() -> Self {
        Self::new(close_code::NORMAL, "Replaced by new connection")
    }

    /// Sent to every live session when the gateway shuts down.
    pub const fn going_away() -> Self {
        Self::new(close_code::GOING_AWAY, "Server shutting down")
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.reason, self.code)
    }
}

/// Errors raised by a connection handle.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// The connection is closed or closing.
    #[error("Connection closed")]
    Closed,

    /// The send did not complete within the configured deadline.
    #[error("Send timed out after {0} ms")]
    Timeout(u64),

    /// The transport rejected the frame.
    #[error("Transport error: {0}")]
    Transport(String),
}

/// One duplex persistent connection.
#[async_trait]
pub trait ConnectionHandle: Send + Sync + 'static {
    /// Stable identifier used as the registry's connection key.
    fn id(&self) -> ConnectionId;

    /// Send one text frame.
    async fn send(&self, text: String) -> Result<(), ConnectionError>;

    /// Request the connection to close. Never blocks.
    fn close(&self, reason: CloseReason) -> Result<(), ConnectionError>;

    fn is_open(&self) -> bool;
}
