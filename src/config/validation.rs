//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check the admission policy can admit anyone at all
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use std::str::FromStr;

use jsonwebtoken::Algorithm;
use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check every semantic constraint, collecting all failures.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new("listener.max_connections", "must be greater than 0"));
    }
    if let Some(tls) = &config.listener.tls {
        if tls.cert_path.is_empty() || tls.key_path.is_empty() {
            errors.push(ValidationError::new("listener.tls", "cert_path and key_path are required"));
        }
    }

    let ws = &config.websocket;
    if !ws.path.starts_with('/') {
        errors.push(ValidationError::new("websocket.path", "must start with '/'"));
    }
    if ws.token_param.trim().is_empty() {
        errors.push(ValidationError::new("websocket.token_param", "must not be empty"));
    }
    if ws.allowed_roles.iter().all(|r| r.trim().is_empty()) {
        errors.push(ValidationError::new("websocket.allowed_roles", "at least one role is required"));
    }
    if ws.handshake_timeout_ms == 0 {
        errors.push(ValidationError::new("websocket.handshake_timeout_ms", "must be greater than 0"));
    }
    if ws.outbound_buffer == 0 {
        errors.push(ValidationError::new("websocket.outbound_buffer", "must be greater than 0"));
    }
    if ws.close_grace_ms == 0 {
        errors.push(ValidationError::new("websocket.close_grace_ms", "must be greater than 0"));
    }

    if config.delivery.send_timeout_ms == 0 {
        errors.push(ValidationError::new("delivery.send_timeout_ms", "must be greater than 0"));
    }
    if config.delivery.concurrency == 0 {
        errors.push(ValidationError::new("delivery.concurrency", "must be greater than 0"));
    }

    let auth = &config.auth;
    if auth.public_key_path.trim().is_empty() {
        errors.push(ValidationError::new("auth.public_key_path", "must not be empty"));
    }
    if Algorithm::from_str(&auth.algorithm).is_err() {
        errors.push(ValidationError::new(
            "auth.algorithm",
            format!("unknown algorithm '{}'", auth.algorithm),
        ));
    }
    if let Some(url) = &auth.authority_url {
        if Url::parse(url).is_err() {
            errors.push(ValidationError::new("auth.authority_url", format!("'{}' is not a URL", url)));
        }
    }
    if auth.fetch_attempts == 0 {
        errors.push(ValidationError::new("auth.fetch_attempts", "must be greater than 0"));
    }
    if auth.request_timeout_secs == 0 {
        errors.push(ValidationError::new("auth.request_timeout_secs", "must be greater than 0"));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    if let Some(key) = &config.admin.api_key {
        if key.trim().is_empty() {
            errors.push(ValidationError::new("admin.api_key", "must not be blank when set"));
        }
    }
    if let Some(addr) = &config.admin.bind_address {
        if addr.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new(
                "admin.bind_address",
                format!("'{}' is not a socket address", addr),
            ));
        }
    }

    let obs = &config.observability;
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", obs.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
