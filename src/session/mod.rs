//! Session management subsystem.
//!
//! # Data Flow
//! ```text
//! admission (identity + connection)
//!     → registry.rs register (supersedes any previous session)
//!     → delivery engine reads snapshots / lookups
//!     → transport close notification → registry.rs unregister
//! ```

pub mod connection;
pub mod identity;
pub mod registry;

#[cfg(test)]
pub(crate) mod testing;

pub use connection::{close_code, CloseReason, ConnectionError, ConnectionHandle};
pub use identity::{Identity, IdentityId};
pub use registry::{Session, SessionRegistry};
