//! Hot reload of the configuration file.
//!
//! The parent directory is watched rather than the file itself, so editors
//! that save by writing a temp file and renaming it over the original are
//! still picked up. A reload is forwarded only when it parses, validates and
//! differs from the last configuration forwarded.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::GatewayConfig;

pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<GatewayConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and a receiver for validated configuration updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<GatewayConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        (Self { path, update_tx }, update_rx)
    }

    /// Start watching. The returned watcher must be kept alive for updates
    /// to keep flowing.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let Self { path, update_tx } = self;
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let target = path.clone();
        let last = Mutex::new(load_config(&path).ok());
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if touches(&event, &target) => reload(&target, &last, &update_tx),
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = %path.display(), "Config watcher started");
        Ok(watcher)
    }
}

fn touches(event: &Event, target: &Path) -> bool {
    matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_))
        && event.paths.iter().any(|p| p == target || p.file_name() == target.file_name())
}

fn reload(
    path: &Path,
    last: &Mutex<Option<GatewayConfig>>,
    update_tx: &mpsc::UnboundedSender<GatewayConfig>,
) {
    // Mid-write truncation; the follow-up event carries the content.
    if std::fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true) {
        return;
    }
    let config = match load_config(path) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Config reload rejected, keeping current configuration");
            return;
        }
    };

    let Ok(mut last) = last.lock() else {
        return;
    };
    if last.as_ref() == Some(&config) {
        return;
    }
    tracing::info!(path = %path.display(), "Config file changed");
    *last = Some(config.clone());
    let _ = update_tx.send(config);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_change_is_forwarded_once_valid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.toml");
        std::fs::write(&path, "[delivery]\nconcurrency = 8\n").unwrap();

        let (watcher, mut updates) = ConfigWatcher::new(&path);
        let _guard = watcher.run().unwrap();

        std::fs::write(&path, "[delivery]\nconcurrency = 0\n").unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        std::fs::write(&path, "[delivery]\nconcurrency = 16\n").unwrap();

        let concurrency = tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                let config = updates.recv().await.unwrap();
                assert_ne!(config.delivery.concurrency, 0);
                if config.delivery.concurrency == 16 {
                    return config.delivery.concurrency;
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(concurrency, 16);
    }
}
