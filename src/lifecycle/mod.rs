//! Process lifecycle.
//!
//! ```text
//! startup.rs   key bootstrap → authenticator → registry, admission, delivery
//! signals.rs   SIGINT / SIGTERM → Shutdown::trigger
//! shutdown.rs  stop accepting → close sessions ("going away") → drain
//! ```
//!
//! Startup failures are fatal. The drain after shutdown is bounded; clients
//! that never acknowledge their close frame do not hold the process open.

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{bootstrap, StartupError};
