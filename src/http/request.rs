//! Request handling and transformation.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4)
//! - Select the inbound headers that reach the backend
//! - Decide how the request body is forwarded
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Allow-list, never deny-list: anything not named here is dropped
//! - Every value of a repeated header is forwarded, in order
//! - `content-length` is never copied; hyper recomputes it for the new body

use axum::http::{
    header::{self, HeaderName, HeaderValue},
    HeaderMap, Method, Request,
};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

const X_CSRF_TOKEN: HeaderName = HeaderName::from_static("x-csrf-token");

/// Inbound headers copied verbatim to the backend.
pub const FORWARDED_HEADERS: [HeaderName; 6] = [
    header::COOKIE,
    header::AUTHORIZATION,
    header::USER_AGENT,
    header::ACCEPT,
    header::ACCEPT_LANGUAGE,
    X_CSRF_TOKEN,
];

/// Issues a fresh UUID v4 for every request without one.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// The request ID set by the request-id layer, for log fields.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

pub fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.trim_start().to_ascii_lowercase().starts_with("multipart/"))
        .unwrap_or(false)
}

/// Build the header set sent upstream.
///
/// Multipart requests keep their original `content-type` (it carries the
/// boundary); everything else is declared as JSON.
pub fn forwarded_headers(inbound: &HeaderMap, extra: &[HeaderName]) -> HeaderMap {
    let mut out = HeaderMap::new();

    for name in FORWARDED_HEADERS.iter().chain(extra) {
        if out.contains_key(name) {
            continue;
        }
        for value in inbound.get_all(name) {
            out.append(name.clone(), value.clone());
        }
    }

    match inbound.get(header::CONTENT_TYPE) {
        Some(content_type) if is_multipart(inbound) => {
            out.insert(header::CONTENT_TYPE, content_type.clone());
        }
        _ => {
            out.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
        }
    }

    if let Some(id) = inbound.get(X_REQUEST_ID) {
        out.insert(X_REQUEST_ID, id.clone());
    }

    out
}

/// How the inbound body travels upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyMode {
    /// No body is sent.
    Empty,
    /// Piped chunk by chunk, unbounded.
    Stream,
    /// Collected first, subject to the buffered-body limit.
    Buffered,
}

pub fn body_mode(method: &Method, headers: &HeaderMap) -> BodyMode {
    if method == Method::GET || method == Method::HEAD {
        BodyMode::Empty
    } else if is_multipart(headers) {
        BodyMode::Stream
    } else {
        BodyMode::Buffered
    }
}
