//! Timeout enforcement.
//!
//! # Responsibilities
//! - Bound per-recipient sends so one slow peer cannot stall a fan-out
//! - Bound upstream authenticator calls during admission
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - The caller chooses the error that represents an elapsed deadline, so
//!   timeouts surface through the operation's own error type

use std::future::Future;
use std::time::Duration;

/// Run `fut`, returning `on_elapsed` if it does not finish within `limit`.
pub async fn bounded<F, T, E>(limit: Duration, fut: F, on_elapsed: E) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(on_elapsed),
    }
}
