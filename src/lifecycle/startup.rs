//! Startup orchestration.
//!
//! # Responsibilities
//! - Secure the token verification key (local file or authority)
//! - Build the authenticator and the shared application state
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The key is in place before the listener accepts anything

use std::sync::Arc;

use thiserror::Error;

use crate::auth::{AuthError, JwtAuthenticator, KeyBootstrap, KeyError};
use crate::config::GatewayConfig;
use crate::http::AppState;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Failed to obtain verification key: {0}")]
    Key(#[from] KeyError),

    #[error("Verification key rejected: {0}")]
    Authenticator(#[from] AuthError),
}

/// Run key bootstrap and assemble the gateway core.
pub async fn bootstrap(config: &GatewayConfig) -> Result<AppState, StartupError> {
    let key = KeyBootstrap::new(&config.auth)?.ensure().await?;
    let authenticator = JwtAuthenticator::from_key_material(&key, &config.auth)?;
    tracing::info!(algorithm = %config.auth.algorithm, "Token verifier ready");

    Ok(AppState::new(config, Arc::new(authenticator)))
}
