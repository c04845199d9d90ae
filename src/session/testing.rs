//! In-memory connection handle for unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::connection::{CloseReason, ConnectionError, ConnectionHandle};
use crate::net::connection::{ConnectionId, ConnectionState, StateCell};

pub struct MockConnection {
    id: ConnectionId,
    state: StateCell,
    fail_sends: AtomicBool,
    send_delay: Option<Duration>,
    pub sent: Mutex<Vec<String>>,
    pub closes: Mutex<Vec<CloseReason>>,
}

impl MockConnection {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::build(None))
    }

    /// A connection whose sends stall for `delay` before succeeding.
    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self::build(Some(delay)))
    }

    /// A connection that reports open but fails every send.
    pub fn failing() -> Arc<Self> {
        let conn = Self::build(None);
        conn.fail_sends.store(true, Ordering::SeqCst);
        Arc::new(conn)
    }

    fn build(send_delay: Option<Duration>) -> Self {
        Self {
            id: ConnectionId::new(),
            state: StateCell::new(),
            fail_sends: AtomicBool::new(false),
            send_delay,
            sent: Mutex::new(Vec::new()),
            closes: Mutex::new(Vec::new()),
        }
    }

    /// Simulate the peer going away without a close request.
    pub fn drop_transport(&self) {
        self.state.advance(ConnectionState::Closed);
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_json(&self) -> Vec<serde_json::Value> {
        self.sent()
            .iter()
            .map(|s| serde_json::from_str(s).unwrap())
            .collect()
    }

    pub fn closes(&self) -> Vec<CloseReason> {
        self.closes.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConnectionHandle for MockConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    async fn send(&self, text: String) -> Result<(), ConnectionError> {
        if let Some(delay) = self.send_delay {
            tokio::time::sleep(delay).await;
        }
        if self.state.get() != ConnectionState::Open {
            return Err(ConnectionError::Closed);
        }
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(ConnectionError::Transport("broken pipe".into()));
        }
        self.sent.lock().unwrap().push(text);
        Ok(())
    }

    fn close(&self, reason: CloseReason) -> Result<(), ConnectionError> {
        self.closes.lock().unwrap().push(reason);
        match self.state.advance(ConnectionState::Closed) {
            ConnectionState::Open => Ok(()),
            _ => Err(ConnectionError::Closed),
        }
    }

    fn is_open(&self) -> bool {
        self.state.get() == ConnectionState::Open
    }
}
