//! Observability subsystem.
//!
//! ```text
//! registry, admission, delivery, admin
//!     → logging.rs  tracing events with connection_id / identity_id fields
//!     → metrics.rs  admissions, deliveries, active sessions, admin calls
//!
//! stdout (pretty or JSON)        Prometheus scrape endpoint
//! ```

pub mod logging;
pub mod metrics;
