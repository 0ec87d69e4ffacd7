//! Typed client for the portfolio backend resources.
//!
//! Every admin and public screen talks to the backend through the same small
//! surface: a [`ResourceClient`] bound to `/api/<resource>`, obtained from an
//! [`ApiClient`] that is either public (anonymous) or private (bearer token
//! plus session cookies).
//!
//! ```no_run
//! # async fn run() -> Result<(), portfolio_sdk::ClientError> {
//! use portfolio_sdk::{ApiClient, ListQuery, SortSpec};
//!
//! let api = ApiClient::public("http://localhost:3000")?;
//! let projects = api.resource::<serde_json::Value>("projects");
//! let page = projects
//!     .get_all(&ListQuery::new(0, 10).sort_by(SortSpec::desc("createdAt")))
//!     .await?;
//! println!("{} projects", page.data.total_elements);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod envelope;
pub mod error;
pub mod multipart;
pub mod query;

/// Backend primary keys are numeric.
pub type ResourceId = i64;

pub use auth::{Access, SessionToken, StaticToken, TokenSource};
pub use client::{ApiClient, ExportedFile, ResourceClient, DEFAULT_TIMEOUT};
pub use envelope::{Acknowledged, ExceptionMessage, PagedResponse, ResponseData};
pub use error::{ApiError, ClientError, ClientResult};
pub use multipart::MultipartForm;
pub use query::{ColumnFilter, ListQuery, SortSpec};
