//! Fan-out of envelopes to registered sessions.
//!
//! # Responsibilities
//! - Broadcast to every session in a registry snapshot
//! - Targeted push to one identity or a list of identities
//! - Isolate per-recipient failures; report only aggregate counts
//!
//! # Design Decisions
//! - Envelopes are built per recipient, at send time
//! - Each send is bounded by `send_timeout`; fan-out runs up to
//!   `concurrency` sends at once so a stalled peer holds one slot only
//! - Duplicate ids in `push_to_many` are each delivered; callers that
//!   want set semantics de-duplicate before calling

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::Value;

use super::envelope::Envelope;
use crate::config::DeliveryConfig;
use crate::observability::metrics;
use crate::resilience::timeouts::bounded;
use crate::session::{ConnectionError, IdentityId, Session, SessionRegistry};

/// Runtime-tunable delivery parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliverySettings {
    pub send_timeout: Duration,
    pub concurrency: usize,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            send_timeout: Duration::from_secs(5),
            concurrency: 64,
        }
    }
}

impl From<&DeliveryConfig> for DeliverySettings {
    fn from(config: &DeliveryConfig) -> Self {
        Self {
            send_timeout: Duration::from_millis(config.send_timeout_ms),
            concurrency: config.concurrency.max(1),
        }
    }
}

/// Aggregate result of a broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastReport {
    pub success_count: usize,
    pub fail_count: usize,
}

impl BroadcastReport {
    pub fn total(&self) -> usize {
        self.success_count + self.fail_count
    }
}

pub struct DeliveryEngine {
    registry: Arc<SessionRegistry>,
    settings: ArcSwap<DeliverySettings>,
}

impl DeliveryEngine {
    pub fn new(registry: Arc<SessionRegistry>, settings: DeliverySettings) -> Self {
        Self {
            registry,
            settings: ArcSwap::from_pointee(settings),
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Replace delivery settings; in-flight calls keep the old values.
    pub fn update_settings(&self, settings: DeliverySettings) {
        self.settings.store(Arc::new(settings));
    }

    pub fn settings(&self) -> Arc<DeliverySettings> {
        self.settings.load_full()
    }

    /// Send `payload` to every registered session.
    pub async fn broadcast(&self, payload: &Value) -> BroadcastReport {
        let settings = self.settings.load_full();
        let sessions = self.registry.all_sessions();

        let report = stream::iter(sessions)
            .map(|session| self.deliver(session, payload, settings.send_timeout))
            .buffer_unordered(settings.concurrency.max(1))
            .fold(BroadcastReport::default(), |mut report, delivered| async move {
                if delivered {
                    report.success_count += 1;
                } else {
                    report.fail_count += 1;
                }
                report
            })
            .await;

        tracing::info!(
            success = report.success_count,
            failed = report.fail_count,
            total = report.total(),
            "Broadcast complete"
        );
        report
    }

    /// Send `payload` to one identity. Returns true only if the send succeeded.
    pub async fn push_to_one(&self, identity_id: &IdentityId, payload: &Value) -> bool {
        let session = match self.registry.lookup_by_identity(identity_id) {
            Some(session) if session.is_live() => session,
            _ => {
                tracing::warn!(identity_id = %identity_id, "Identity not online, push skipped");
                metrics::record_delivery("offline");
                return false;
            }
        };

        let send_timeout = self.settings.load().send_timeout;
        self.deliver(session, payload, send_timeout).await
    }

    /// Send `payload` to each id in `identity_ids`; returns the success count.
    pub async fn push_to_many(&self, identity_ids: &[IdentityId], payload: &Value) -> usize {
        let concurrency = self.settings.load().concurrency.max(1);

        let delivered = stream::iter(identity_ids.iter().cloned())
            .map(|id| async move { self.push_to_one(&id, payload).await })
            .buffer_unordered(concurrency)
            .fold(0usize, |count, ok| async move { count + usize::from(ok) })
            .await;

        tracing::info!(
            success = delivered,
            total = identity_ids.len(),
            "Targeted push complete"
        );
        delivered
    }

    async fn deliver(&self, session: Session, payload: &Value, send_timeout: Duration) -> bool {
        let text = match Envelope::alert(payload).to_json() {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize envelope");
                metrics::record_delivery("failed");
                return false;
            }
        };

        let elapsed = ConnectionError::Timeout(send_timeout.as_millis() as u64);
        match bounded(send_timeout, session.connection.send(text), elapsed).await {
            Ok(()) => {
                tracing::debug!(
                    identity_id = %session.identity.id,
                    connection_id = %session.connection_id(),
                    "Envelope delivered"
                );
                metrics::record_delivery("delivered");
                true
            }
            Err(e) => {
                tracing::warn!(
                    identity_id = %session.identity.id,
                    username = %session.identity.display_name,
                    connection_id = %session.connection_id(),
                    error = %e,
                    "Failed to deliver envelope"
                );
                metrics::record_delivery("failed");
                false
            }
        }
    }
}
