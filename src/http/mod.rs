//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, middleware, shutdown)
//!     → request.rs (request ID, tracing span)
//!     → websocket.rs (upgrade, admission, heartbeats)   or   admin API
//! ```

pub mod request;
pub mod server;
pub mod websocket;

pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer};
pub use websocket::WsConnection;
