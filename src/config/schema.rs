//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the push gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// WebSocket endpoint and admission policy.
    pub websocket: WebSocketConfig,

    /// Fan-out tuning.
    pub delivery: DeliveryConfig,

    /// Token verification and key bootstrap.
    pub auth: AuthConfig,

    /// Timeout configuration for HTTP requests.
    pub timeouts: TimeoutConfig,

    /// Administrative push API.
    pub admin: AdminConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,

    /// Maximum concurrent WebSocket connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
            max_connections: 10_000,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// WebSocket endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct WebSocketConfig {
    /// Upgrade path clients connect to.
    pub path: String,

    /// Query parameter carrying the bearer token.
    pub token_param: String,

    /// Prefix stripped from the token when present.
    pub token_prefix: String,

    /// A connection is admitted if its identity holds at least one of these roles.
    pub allowed_roles: Vec<String>,

    /// Upper bound on credential validation, in milliseconds.
    pub handshake_timeout_ms: u64,

    /// Frames queued per connection before sends start waiting.
    pub outbound_buffer: usize,

    /// How long a server-initiated close waits for the peer's close frame
    /// before the connection is dropped, in milliseconds.
    pub close_grace_ms: u64,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            path: "/ws/alert".to_string(),
            token_param: "token".to_string(),
            token_prefix: "Bearer ".to_string(),
            allowed_roles: vec!["ROLE_admin".to_string(), "ROLE_operator".to_string()],
            handshake_timeout_ms: 5_000,
            outbound_buffer: 256,
            close_grace_ms: 5_000,
        }
    }
}

impl WebSocketConfig {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn close_grace(&self) -> Duration {
        Duration::from_millis(self.close_grace_ms)
    }
}

/// Delivery configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Per-recipient send deadline in milliseconds.
    pub send_timeout_ms: u64,

    /// Maximum sends in flight during one fan-out.
    pub concurrency: usize,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            send_timeout_ms: 5_000,
            concurrency: 64,
        }
    }
}

/// Token verification and public key bootstrap.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AuthConfig {
    /// Local copy of the verification key (PEM, or the shared secret for HS*).
    pub public_key_path: String,

    /// JWT algorithm name (e.g., "RS256").
    pub algorithm: String,

    /// Expected `iss` claim, if any.
    pub issuer: Option<String>,

    /// Clock skew tolerance in seconds.
    pub leeway_secs: u64,

    /// Base URL of the authority service. Without it the local key must exist.
    pub authority_url: Option<String>,

    /// Response code the authority uses for success.
    pub success_code: String,

    /// Authority request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Attempts per authority call before startup fails.
    pub fetch_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub fetch_base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub fetch_max_delay_ms: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            public_key_path: "config/keys/public.pem".to_string(),
            algorithm: "RS256".to_string(),
            issuer: None,
            leeway_secs: 60,
            authority_url: None,
            success_code: "0000".to_string(),
            request_timeout_secs: 10,
            fetch_attempts: 3,
            fetch_base_delay_ms: 200,
            fetch_max_delay_ms: 2_000,
        }
    }
}

/// Timeout configuration for HTTP requests.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Admin request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Administrative API configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AdminConfig {
    /// Serve the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token). No key means no auth check,
    /// which is only appropriate on an internal-only bind address.
    pub api_key: Option<String>,

    /// Separate bind address for the admin API. When unset the admin routes
    /// share the main listener.
    pub bind_address: Option<String>,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: None,
            bind_address: None,
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}
