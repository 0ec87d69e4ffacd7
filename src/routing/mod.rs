//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request path /api/<service>/<...rest>?<query>
//!     → target.rs (split raw path into segments)
//!     → router.rs (resolve <service> to a backend)
//!     → target.rs (rebuild <base_url>/<service>/<...rest>?<query>)
//!
//! Table compilation (startup and reload):
//!     ServiceConfig[]
//!     → resolve base URLs (env or literal)
//!     → freeze as immutable ServiceMap
//! ```

pub mod router;
pub mod target;

pub use router::{ServiceMap, ServiceRoute};
pub use target::{slug_segments, target_url, API_PREFIX};
