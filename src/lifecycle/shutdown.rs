//! Shutdown coordination for the gateway.

use std::time::Duration;

use tokio::sync::{broadcast, Semaphore};

/// Fans one stop request out to the server, the admin listener and tests.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Wait until every connection slot has been returned, or the deadline passes.
///
/// Returns `true` if all connections finished in time.
pub async fn wait_for_connections(slots: &Semaphore, total: usize, deadline: Duration) -> bool {
    let total = u32::try_from(total).unwrap_or(u32::MAX);
    matches!(
        tokio::time::timeout(deadline, slots.acquire_many(total)).await,
        Ok(Ok(_))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_trigger_reaches_every_subscriber() {
        let shutdown = Shutdown::new();
        let mut a = shutdown.subscribe();
        let mut b = shutdown.subscribe();
        shutdown.trigger();
        assert!(a.recv().await.is_ok());
        assert!(b.recv().await.is_ok());
    }

    #[tokio::test]
    async fn test_drain_waits_for_released_slots() {
        let slots = Arc::new(Semaphore::new(2));
        let held = slots.clone().acquire_owned().await.unwrap();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            drop(held);
        });
        assert!(wait_for_connections(&slots, 2, Duration::from_secs(1)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_gives_up_at_deadline() {
        let slots = Semaphore::new(1);
        let _held = slots.acquire().await.unwrap();
        assert!(!wait_for_connections(&slots, 1, Duration::from_millis(50)).await);
    }
}
