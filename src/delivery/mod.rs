//! Delivery subsystem.
//!
//! # Data Flow
//! ```text
//! admin request (payload + targets)
//!     → engine.rs (resolve targets against the session registry)
//!     → envelope.rs (fresh envelope per recipient)
//!     → connection handle send, bounded by timeout
//!     → aggregate counts back to the caller
//! ```

pub mod engine;
pub mod envelope;

pub use engine::{BroadcastReport, DeliveryEngine, DeliverySettings};
pub use envelope::{Envelope, EnvelopeKind};
