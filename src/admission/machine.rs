//! Connection admission state machine.
//!
//! ```text
//! AwaitingCredential ──token──▶ Validating ──ok + role──▶ Admitted
//!         │                        │
//!         └──────── missing ───────┴── invalid / denied / error ──▶ Rejected
//! ```
//!
//! Every path ends Admitted (registered, welcome sent) or Rejected (closed
//! with a reason, nothing left in the registry).

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;

use crate::auth::{AuthError, Authenticator};
use crate::config::WebSocketConfig;
use crate::delivery::Envelope;
use crate::net::connection::ConnectionId;
use crate::observability::metrics;
use crate::resilience::timeouts::bounded;
use crate::session::{
    close_code, CloseReason, ConnectionError, ConnectionHandle, Identity, SessionRegistry,
};

/// Why a connection was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    CredentialRequired,
    AuthenticationFailed,
    PermissionDenied,
    ServerError,
}

impl Rejection {
    /// Close frame sent to the client. Carries no diagnostic detail.
    pub fn close_reason(&self) -> CloseReason {
        match self {
            Rejection::CredentialRequired => CloseReason::new(close_code::BAD_DATA, "Token is required"),
            Rejection::AuthenticationFailed => {
                CloseReason::new(close_code::SERVER_ERROR, "Authentication failed")
            }
            Rejection::PermissionDenied => CloseReason::new(close_code::NOT_ACCEPTABLE, "Permission denied"),
            Rejection::ServerError => CloseReason::new(close_code::SERVER_ERROR, "Server error"),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Rejection::CredentialRequired => "credential_required",
            Rejection::AuthenticationFailed => "authentication_failed",
            Rejection::PermissionDenied => "permission_denied",
            Rejection::ServerError => "server_error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionState {
    AwaitingCredential,
    Validating,
    Admitted,
    Rejected(Rejection),
}

impl AdmissionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AdmissionState::Admitted | AdmissionState::Rejected(_))
    }
}

/// Final result of one admission attempt.
#[derive(Debug)]
pub enum AdmissionOutcome {
    Admitted(Identity),
    Rejected {
        reason: Rejection,
        /// Internal diagnostic; never sent to the client.
        cause: Option<AuthError>,
    },
}

impl AdmissionOutcome {
    pub fn state(&self) -> AdmissionState {
        match self {
            AdmissionOutcome::Admitted(_) => AdmissionState::Admitted,
            AdmissionOutcome::Rejected { reason, .. } => AdmissionState::Rejected(*reason),
        }
    }
}

/// Runtime-reloadable admission rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionPolicy {
    pub token_prefix: String,
    pub allowed_roles: Vec<String>,
    pub handshake_timeout: Duration,
}

impl From<&WebSocketConfig> for AdmissionPolicy {
    fn from(config: &WebSocketConfig) -> Self {
        Self {
            token_prefix: config.token_prefix.clone(),
            allowed_roles: config.allowed_roles.clone(),
            handshake_timeout: config.handshake_timeout(),
        }
    }
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        Self::from(&WebSocketConfig::default())
    }
}

/// Tracks one connection through the state diagram.
struct Admission {
    connection_id: ConnectionId,
    state: AdmissionState,
}

impl Admission {
    fn new(connection_id: ConnectionId) -> Self {
        Self {
            connection_id,
            state: AdmissionState::AwaitingCredential,
        }
    }

    fn transition(&mut self, next: AdmissionState) {
        debug_assert!(
            !self.state.is_terminal(),
            "admission already finished in {:?}",
            self.state
        );
        tracing::trace!(
            connection_id = %self.connection_id,
            from = ?self.state,
            to = ?next,
            "Admission transition"
        );
        self.state = next;
    }
}

type RejectedWith = (Rejection, Option<AuthError>);

/// Decides whether a new connection becomes a session.
pub struct AdmissionController {
    authenticator: Arc<dyn Authenticator>,
    registry: Arc<SessionRegistry>,
    policy: ArcSwap<AdmissionPolicy>,
}

impl AdmissionController {
    pub fn new(
        authenticator: Arc<dyn Authenticator>,
        registry: Arc<SessionRegistry>,
        policy: AdmissionPolicy,
    ) -> Self {
        Self {
            authenticator,
            registry,
            policy: ArcSwap::from_pointee(policy),
        }
    }

    pub fn update_policy(&self, policy: AdmissionPolicy) {
        self.policy.store(Arc::new(policy));
    }

    pub fn policy(&self) -> Arc<AdmissionPolicy> {
        self.policy.load_full()
    }

    /// Run the full admission sequence for `connection`.
    ///
    /// On rejection the connection has already been asked to close and no
    /// registry entry remains.
    pub async fn admit(
        &self,
        credential: Option<&str>,
        connection: Arc<dyn ConnectionHandle>,
    ) -> AdmissionOutcome {
        let policy = self.policy.load_full();
        let mut admission = Admission::new(connection.id());

        let outcome = match self.run(&policy, credential, &connection, &mut admission).await {
            Ok(identity) => {
                admission.transition(AdmissionState::Admitted);
                tracing::info!(
                    connection_id = %connection.id(),
                    identity_id = %identity.id,
                    username = %identity.display_name,
                    "Connection admitted"
                );
                AdmissionOutcome::Admitted(identity)
            }
            Err((reason, cause)) => {
                admission.transition(AdmissionState::Rejected(reason));
                match &cause {
                    Some(e) => tracing::warn!(
                        connection_id = %connection.id(),
                        reason = reason.as_str(),
                        error = %e,
                        "Connection rejected"
                    ),
                    None => tracing::warn!(
                        connection_id = %connection.id(),
                        reason = reason.as_str(),
                        "Connection rejected"
                    ),
                }
                if let Err(e) = connection.close(reason.close_reason()) {
                    tracing::debug!(connection_id = %connection.id(), error = %e, "Close after rejection failed");
                }
                AdmissionOutcome::Rejected { reason, cause }
            }
        };

        metrics::record_admission(match &outcome {
            AdmissionOutcome::Admitted(_) => "admitted",
            AdmissionOutcome::Rejected { reason, .. } => reason.as_str(),
        });
        outcome
    }

    async fn run(
        &self,
        policy: &AdmissionPolicy,
        credential: Option<&str>,
        connection: &Arc<dyn ConnectionHandle>,
        admission: &mut Admission,
    ) -> Result<Identity, RejectedWith> {
        let token = credential
            .and_then(|raw| bare_token(raw, &policy.token_prefix))
            .ok_or((Rejection::CredentialRequired, None))?;

        admission.transition(AdmissionState::Validating);
        let timeout = policy.handshake_timeout;
        let identity = bounded(
            timeout,
            self.authenticator.authenticate(token),
            AuthError::Timeout(timeout.as_millis() as u64),
        )
        .await
        .map_err(|e| (Rejection::AuthenticationFailed, Some(e)))?;

        if !identity.has_any_role(&policy.allowed_roles) {
            tracing::debug!(
                identity_id = %identity.id,
                roles = ?identity.roles,
                "Identity lacks an allowed role"
            );
            return Err((Rejection::PermissionDenied, None));
        }

        if !connection.is_open() {
            return Err((Rejection::ServerError, None));
        }

        self.registry.register(identity.clone(), connection.clone());

        if let Err(e) = self.send_welcome(&identity, connection, timeout).await {
            tracing::error!(
                connection_id = %connection.id(),
                identity_id = %identity.id,
                error = %e,
                "Welcome send failed, dropping session"
            );
            self.registry.unregister(connection.id());
            return Err((Rejection::ServerError, None));
        }

        Ok(identity)
    }

    async fn send_welcome(
        &self,
        identity: &Identity,
        connection: &Arc<dyn ConnectionHandle>,
        timeout: Duration,
    ) -> Result<(), ConnectionError> {
        let text = Envelope::welcome(identity)
            .to_json()
            .map_err(|e| ConnectionError::Transport(e.to_string()))?;
        bounded(
            timeout,
            connection.send(text),
            ConnectionError::Timeout(timeout.as_millis() as u64),
        )
        .await
    }
}

/// Strip surrounding whitespace and the scheme prefix. A value that is only
/// the prefix (with or without its trailing space) carries no token.
fn bare_token<'a>(raw: &'a str, prefix: &str) -> Option<&'a str> {
    let trimmed = raw.trim();
    let scheme = prefix.trim_end();
    if !scheme.is_empty() && trimmed == scheme {
        return None;
    }
    let token = raw
        .trim_start()
        .strip_prefix(prefix)
        .unwrap_or(trimmed)
        .trim();
    (!token.is_empty()).then_some(token)
}
