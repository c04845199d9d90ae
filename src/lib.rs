//! Real-time push gateway library.

pub mod admin;
pub mod admission;
pub mod auth;
pub mod config;
pub mod delivery;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod resilience;
pub mod session;

pub use config::schema::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
