//! Wire envelope sent to connected clients.
//!
//! ```text
//! { "type": "welcome", "timestamp": 1732500000000, "message": "...", "userId": "42", "username": "ops" }
//! { "type": "alert",   "timestamp": 1732500000123, "data": { ...caller payload... } }
//! { "type": "pong",    "timestamp": 1732500000456 }
//! ```

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use crate::session::{Identity, IdentityId};

/// Welcome text sent after a successful admission.
pub const WELCOME_MESSAGE: &str = "WebSocket connection established";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeKind {
    Welcome,
    Alert,
    Pong,
}

impl EnvelopeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvelopeKind::Welcome => "welcome",
            EnvelopeKind::Alert => "alert",
            EnvelopeKind::Pong => "pong",
        }
    }
}

/// Tagged, timestamped delivery unit. Built fresh for every send.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope<'a> {
    #[serde(rename = "type")]
    pub kind: EnvelopeKind,
    /// Server time in epoch milliseconds at construction.
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    #[serde(rename = "userId", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<&'a IdentityId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<&'a str>,
    /// Caller payload, forwarded untouched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<&'a Value>,
}

impl<'a> Envelope<'a> {
    fn stamped(kind: EnvelopeKind) -> Self {
        Self {
            kind,
            timestamp: Utc::now().timestamp_millis(),
            message: None,
            user_id: None,
            username: None,
            data: None,
        }
    }

    pub fn welcome(identity: &'a Identity) -> Self {
        Self {
            message: Some(WELCOME_MESSAGE),
            user_id: Some(&identity.id),
            username: Some(&identity.display_name),
            ..Self::stamped(EnvelopeKind::Welcome)
        }
    }

    pub fn alert(payload: &'a Value) -> Self {
        Self {
            data: Some(payload),
            ..Self::stamped(EnvelopeKind::Alert)
        }
    }

    pub fn pong() -> Self {
        Self::stamped(EnvelopeKind::Pong)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_welcome_shape() {
        let identity = Identity::new("42", "ops", ["ROLE_admin"]);
        let value: Value = serde_json::from_str(&Envelope::welcome(&identity).to_json().unwrap()).unwrap();

        assert_eq!(value["type"], "welcome");
        assert_eq!(value["userId"], "42");
        assert_eq!(value["username"], "ops");
        assert_eq!(value["message"], WELCOME_MESSAGE);
        assert!(value["timestamp"].as_i64().unwrap() > 0);
        assert!(value.get("data").is_none());
    }

    #[test]
    fn test_alert_carries_payload_opaquely() {
        let payload = json!({ "level": "critical", "nested": { "list": [1, 2, 3] } });
        let value: Value = serde_json::from_str(&Envelope::alert(&payload).to_json().unwrap()).unwrap();

        assert_eq!(value["type"], "alert");
        assert_eq!(value["data"], payload);
        assert!(value.get("userId").is_none());
    }

    #[test]
    fn test_pong_has_only_type_and_timestamp() {
        let value: Value = serde_json::from_str(&Envelope::pong().to_json().unwrap()).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 2);
        assert_eq!(value["type"], EnvelopeKind::Pong.as_str());
    }
}
