//! Target URL construction.
//!
//! # Responsibilities
//! - Split the raw request path below `/api` into segments
//! - Rebuild the backend URL from base URL, path and original query
//!
//! # Design Decisions
//! - Works on the raw (still percent-encoded) path so encoded characters
//!   reach the backend exactly as the caller sent them
//! - Empty segments (`//`) are dropped
//! - The service segment is kept unless the service strips it

use crate::routing::router::ServiceRoute;

/// Mount point of the proxy.
pub const API_PREFIX: &str = "/api";

/// Path segments after `/api`, or `None` when the path is outside the mount.
pub fn slug_segments(path: &str) -> Option<Vec<&str>> {
    let rest = path.strip_prefix(API_PREFIX)?;
    if !(rest.is_empty() || rest.starts_with('/')) {
        return None;
    }
    Some(rest.split('/').filter(|s| !s.is_empty()).collect())
}

/// `<base_url>/<joined path><?query>`.
pub fn target_url(route: &ServiceRoute, segments: &[&str], query: Option<&str>) -> String {
    let segments = if route.strip_service_segment {
        segments.get(1..).unwrap_or_default()
    } else {
        segments
    };

    let mut url = format!("{}/{}", route.base_url, segments.join("/"));
    if let Some(query) = query.filter(|q| !q.is_empty()) {
        url.push('?');
        url.push_str(query);
    }
    url
}
