//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, trace span)
//!     → [routing resolves /api/<service> to a backend]
//!     → request.rs (select headers, choose body mode)
//!     → hyper client over http or https (single attempt; deadline.rs bounds
//!       the response head and buffered reads, pushed back by upload progress)
//!     → response.rs (strip hop-by-hop, relay cookies, re-encode JSON)
//!     → Send to client
//!
//! Failures at any step:
//!     → error.rs (ProxyError → status + JSON body)
//! ```

pub mod deadline;
pub mod error;
pub mod request;
pub mod response;
pub mod server;

pub use error::ProxyError;
pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer};
