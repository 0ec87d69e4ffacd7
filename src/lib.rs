//! Portfolio resource gateway.
//!
//! Forwards `/api/<service>/...` requests to the configured backends. The
//! typed client that talks to it lives in the `portfolio-sdk` crate.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;

pub use config::schema::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
