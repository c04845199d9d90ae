//! Authentication subsystem.
//!
//! # Data Flow
//! ```text
//! startup:
//!     keys.rs (ensure local key, sync with authority)
//!     → jwt.rs (JwtAuthenticator built from key material)
//!
//! per connection:
//!     admission → Authenticator::authenticate(token) → Identity | AuthError
//! ```

pub mod error;
pub mod jwt;
pub mod keys;

use async_trait::async_trait;

pub use error::AuthError;
pub use jwt::JwtAuthenticator;
pub use keys::{KeyBootstrap, KeyError};

use crate::session::Identity;

/// Validates a bearer credential and yields the identity it names.
#[async_trait]
pub trait Authenticator: Send + Sync + 'static {
    async fn authenticate(&self, token: &str) -> Result<Identity, AuthError>;
}
