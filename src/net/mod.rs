//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → tls.rs (optional TLS handshake)
//!     → HTTP layer (admin API, WebSocket upgrade)
//!     → connection.rs (id + lifecycle state per WebSocket)
//!
//! Connection States:
//!     Open → Closing → Closed
//! ```

pub mod connection;
pub mod tls;
