//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Per-recipient send / authenticator call:
//!     → timeouts.rs (enforce deadline, map elapsed to the caller's error)
//!
//! Authority key bootstrap:
//!     → backoff.rs (exponential delay between retry attempts)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every call that can block on a peer has a deadline
//! - Retries only at startup; delivery is best-effort and never retried

pub mod backoff;
pub mod timeouts;
