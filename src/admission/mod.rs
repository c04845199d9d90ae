//! Admission subsystem.
//!
//! # Data Flow
//! ```text
//! WebSocket upgraded (token from query string)
//!     → machine.rs (credential → authenticator → role policy)
//!     → session registry (register, supersede previous session)
//!     → welcome envelope
//! ```
//!
//! # Design Decisions
//! - Admission always terminates: admitted and registered, or closed
//! - Client-facing close reasons never include the underlying cause
//! - Policy (prefix, roles, timeout) is hot-swappable

pub mod machine;

pub use machine::{AdmissionController, AdmissionOutcome, AdmissionPolicy, AdmissionState, Rejection};
