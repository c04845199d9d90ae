//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the shared application state (registry, admission, delivery)
//! - Create the Axum router: WebSocket endpoint plus admin API
//! - Wire up middleware (tracing, request ID)
//! - Bind to the listener, optionally behind TLS
//! - Apply hot-reloaded configuration
//! - Close every session on shutdown

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc, Semaphore};
use tower_http::trace::TraceLayer;

use crate::admin::setup_admin_router;
use crate::admission::{AdmissionController, AdmissionPolicy};
use crate::auth::Authenticator;
use crate::config::{GatewayConfig, WebSocketConfig};
use crate::config::schema::TlsConfig;
use crate::delivery::{DeliveryEngine, DeliverySettings};
use crate::http::request::{make_request_span, propagate_request_id_layer, set_request_id_layer};
use crate::http::websocket::ws_handler;
use crate::lifecycle::shutdown::wait_for_connections;
use crate::net::tls::load_tls_config;
use crate::session::{CloseReason, SessionRegistry};

/// How long shutdown waits for clients to acknowledge their close frames.
const SHUTDOWN_DRAIN: Duration = Duration::from_secs(5);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub admission: Arc<AdmissionController>,
    pub delivery: Arc<DeliveryEngine>,
    pub websocket: Arc<ArcSwap<WebSocketConfig>>,
    pub connection_slots: Arc<Semaphore>,
    pub admin_api_key: Option<Arc<str>>,
}

impl AppState {
    pub fn new(config: &GatewayConfig, authenticator: Arc<dyn Authenticator>) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let admission = Arc::new(AdmissionController::new(
            authenticator,
            registry.clone(),
            AdmissionPolicy::from(&config.websocket),
        ));
        let delivery = Arc::new(DeliveryEngine::new(
            registry.clone(),
            DeliverySettings::from(&config.delivery),
        ));

        Self {
            registry,
            admission,
            delivery,
            websocket: Arc::new(ArcSwap::from_pointee(config.websocket.clone())),
            connection_slots: Arc::new(Semaphore::new(config.listener.max_connections)),
            admin_api_key: config.admin.api_key.as_deref().map(Arc::from),
        }
    }

    /// Swap in the reloadable parts of a new configuration.
    pub fn apply_reload(&self, config: &GatewayConfig) {
        self.admission.update_policy(AdmissionPolicy::from(&config.websocket));
        self.delivery.update_settings(DeliverySettings::from(&config.delivery));
        self.websocket.store(Arc::new(config.websocket.clone()));
        tracing::info!(
            allowed_roles = ?config.websocket.allowed_roles,
            send_timeout_ms = config.delivery.send_timeout_ms,
            concurrency = config.delivery.concurrency,
            "Configuration reloaded"
        );
    }
}

/// HTTP server for the push gateway.
pub struct HttpServer {
    router: Router,
    admin_router: Option<Router>,
    config: GatewayConfig,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: GatewayConfig, state: AppState) -> Self {
        let admin = config
            .admin
            .enabled
            .then(|| setup_admin_router(&config, state.clone()));

        let mut router = Router::new()
            .route(&config.websocket.path, get(ws_handler))
            .with_state(state.clone());

        let admin_router = match (admin, &config.admin.bind_address) {
            (Some(admin), Some(_)) => Some(Self::with_middleware(admin)),
            (Some(admin), None) => {
                router = router.merge(admin);
                None
            }
            (None, _) => None,
        };

        Self {
            router: Self::with_middleware(router),
            admin_router,
            config,
            state,
        }
    }

    fn with_middleware(router: Router) -> Router {
        router
            .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
            .layer(propagate_request_id_layer())
            .layer(set_request_id_layer())
    }

    /// Run the server until `shutdown` fires, then close every session.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        let Self {
            router,
            admin_router,
            config,
            state,
        } = self;

        let reload_state = state.clone();
        let mut active = config.clone();
        tokio::spawn(async move {
            while let Some(next) = config_updates.recv().await {
                warn_on_restart_only_changes(&active, &next);
                reload_state.apply_reload(&next);
                active = next;
            }
        });

        let admin_task = match (admin_router, &config.admin.bind_address) {
            (Some(admin), Some(bind)) => {
                let admin_listener = TcpListener::bind(bind).await?;
                tracing::info!(address = %admin_listener.local_addr()?, "Admin API listening");
                let mut admin_shutdown = shutdown.resubscribe();
                Some(tokio::spawn(async move {
                    axum::serve(admin_listener, admin)
                        .with_graceful_shutdown(async move {
                            let _ = admin_shutdown.recv().await;
                        })
                        .await
                }))
            }
            _ => None,
        };

        let registry = state.registry.clone();
        let signal = async move {
            let _ = shutdown.recv().await;
            let closed = registry.close_all(CloseReason::going_away());
            tracing::info!(sessions = closed, "Shutdown signal received, closing sessions");
        };

        tracing::info!(
            address = %addr,
            path = %config.websocket.path,
            tls = config.listener.tls.is_some(),
            "Push gateway listening"
        );

        match &config.listener.tls {
            Some(tls) => serve_tls(listener, router, tls, signal).await?,
            None => axum::serve(listener, router).with_graceful_shutdown(signal).await?,
        }

        if !wait_for_connections(
            &state.connection_slots,
            config.listener.max_connections,
            SHUTDOWN_DRAIN,
        )
        .await
        {
            tracing::warn!("Some connections did not close before the drain deadline");
        }

        if let Some(task) = admin_task {
            match task.await {
                Ok(Err(e)) => tracing::error!(error = %e, "Admin API server failed"),
                Err(e) => tracing::error!(error = %e, "Admin API task panicked"),
                Ok(Ok(())) => {}
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }
}

async fn serve_tls(
    listener: TcpListener,
    router: Router,
    tls: &TlsConfig,
    signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), std::io::Error> {
    let rustls = load_tls_config(Path::new(&tls.cert_path), Path::new(&tls.key_path)).await?;
    let handle = axum_server::Handle::new();
    let shutdown_handle = handle.clone();
    tokio::spawn(async move {
        signal.await;
        shutdown_handle.graceful_shutdown(Some(SHUTDOWN_DRAIN));
    });

    let listener = listener.into_std()?;
    axum_server::from_tcp_rustls(listener, rustls)
        .handle(handle)
        .serve(router.into_make_service())
        .await
}

/// Settings that only take effect on restart.
fn warn_on_restart_only_changes(active: &GatewayConfig, next: &GatewayConfig) {
    if active.listener != next.listener {
        tracing::warn!("Listener changes require a restart");
    }
    if active.websocket.path != next.websocket.path {
        tracing::warn!("WebSocket path changes require a restart");
    }
    if active.auth != next.auth {
        tracing::warn!("Auth changes require a restart");
    }
    if active.admin != next.admin || active.timeouts != next.timeouts {
        tracing::warn!("Admin API changes require a restart");
    }
}
