//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use push_gateway::config::GatewayConfig;
use push_gateway::http::{AppState, HttpServer};
use push_gateway::lifecycle::{bootstrap, Shutdown};

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const ADMIN_KEY: &str = "test-admin-key";
const PRIVATE_PEM: &str = include_str!("../fixtures/rsa_private.pem");
const PUBLIC_KEY_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/rsa_public.pem");
const WAIT: Duration = Duration::from_secs(5);

pub struct TestGateway {
    pub addr: SocketAddr,
    pub state: AppState,
    pub shutdown: Shutdown,
    pub config_updates: mpsc::UnboundedSender<GatewayConfig>,
    pub server: JoinHandle<Result<(), std::io::Error>>,
}

impl TestGateway {
    pub fn ws_url(&self, token: Option<&str>) -> String {
        match token {
            Some(token) => format!("ws://{}/ws/alert?token={}", self.addr, token),
            None => format!("ws://{}/ws/alert", self.addr),
        }
    }

    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Base configuration: fixture key, admin key set, short timeouts.
pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.auth.public_key_path = PUBLIC_KEY_PATH.into();
    config.admin.api_key = Some(ADMIN_KEY.into());
    config.delivery.send_timeout_ms = 1_000;
    config
}

pub async fn start_gateway(config: GatewayConfig) -> TestGateway {
    let state = bootstrap(&config).await.unwrap();
    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let (config_updates, updates_rx) = mpsc::unbounded_channel();
    let server = HttpServer::new(config, state.clone());
    let server_shutdown = shutdown.subscribe();
    let server = tokio::spawn(async move { server.run(listener, updates_rx, server_shutdown).await });

    TestGateway {
        addr,
        state,
        shutdown,
        config_updates,
        server,
    }
}

/// Sign a one-hour token for `user_id` with the given roles.
pub fn token(user_id: u64, username: &str, roles: &[&str]) -> String {
    let claims = json!({
        "sub": user_id.to_string(),
        "userId": user_id,
        "username": username,
        "roles": roles,
        "exp": chrono::Utc::now().timestamp() + 3600,
    });
    let key = EncodingKey::from_rsa_pem(PRIVATE_PEM.as_bytes()).unwrap();
    encode(&Header::new(Algorithm::RS256), &claims, &key).unwrap()
}

pub async fn connect(url: &str) -> Client {
    let (client, _) = connect_async(url).await.unwrap();
    client
}

/// Connect with an admin token and consume the welcome envelope.
pub async fn connect_admitted(gateway: &TestGateway, user_id: u64, username: &str) -> Client {
    let mut client = connect(&gateway.ws_url(Some(&token(user_id, username, &["ROLE_admin"])))).await;
    let welcome = next_json(&mut client).await;
    assert_eq!(welcome["type"], "welcome");
    client
}

pub async fn send_text(client: &mut Client, text: &str) {
    client.send(Message::Text(text.into())).await.unwrap();
}

/// Next text frame; panics on close or timeout.
pub async fn next_text(client: &mut Client) -> String {
    let read = async {
        loop {
            match client.next().await {
                Some(Ok(Message::Text(text))) => return text.as_str().to_owned(),
                Some(Ok(Message::Close(frame))) => panic!("unexpected close: {:?}", frame),
                Some(Ok(_)) => continue,
                Some(Err(e)) => panic!("read error: {}", e),
                None => panic!("stream ended"),
            }
        }
    };
    tokio::time::timeout(WAIT, read).await.expect("timed out waiting for text")
}

pub async fn next_json(client: &mut Client) -> Value {
    serde_json::from_str(&next_text(client).await).unwrap()
}

/// Read until a close frame arrives; returns its code and reason.
pub async fn expect_close(client: &mut Client) -> (u16, String) {
    let read = async {
        loop {
            match client.next().await {
                Some(Ok(Message::Close(Some(frame)))) => {
                    return (u16::from(frame.code), frame.reason.as_str().to_owned())
                }
                Some(Ok(Message::Close(None))) => panic!("close without frame"),
                Some(Ok(_)) => continue,
                other => panic!("expected close frame, got {:?}", other),
            }
        }
    };
    tokio::time::timeout(WAIT, read).await.expect("timed out waiting for close")
}

/// Poll `check` until it holds or the wait expires.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + WAIT;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}

pub fn admin_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
