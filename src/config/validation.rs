//! Configuration validation.
//!
//! Serde handles syntax; this module checks semantics and returns every
//! problem found, not just the first.

use std::collections::HashSet;
use std::net::SocketAddr;

use axum::http::HeaderName;
use url::Url;

use crate::config::schema::{GatewayConfig, ServiceConfig};

/// Headers the gateway manages itself and will not forward from config.
const UNFORWARDABLE: [&str; 6] = [
    "host",
    "content-length",
    "transfer-encoding",
    "connection",
    "upgrade",
    "te",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("listener.bind_address '{0}' is not a socket address")]
    BindAddress(String),

    #[error("observability.metrics_address '{0}' is not a socket address")]
    MetricsAddress(String),

    #[error("no services configured")]
    NoServices,

    #[error("service #{0} has an empty name")]
    EmptyServiceName(usize),

    #[error("service name '{0}' must be a single path segment")]
    InvalidServiceName(String),

    #[error("service '{0}' is declared more than once")]
    DuplicateService(String),

    #[error("service '{0}' has no base URL (set base_url or base_url_env)")]
    MissingBaseUrl(String),

    #[error("service '{service}' base URL '{url}' is invalid: {reason}")]
    InvalidBaseUrl {
        service: String,
        url: String,
        reason: String,
    },

    #[error("timeouts.{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("limits.{0} must be greater than zero")]
    ZeroLimit(&'static str),

    #[error("forwarding.extra_headers entry '{0}' is not a forwardable header")]
    InvalidHeader(String),
}

/// Validate a configuration, collecting all errors.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if config.services.is_empty() {
        errors.push(ValidationError::NoServices);
    }

    let mut seen = HashSet::new();
    for (index, service) in config.services.iter().enumerate() {
        if service.name.is_empty() {
            errors.push(ValidationError::EmptyServiceName(index));
            continue;
        }
        if service.name.contains('/') || service.name.contains('?') {
            errors.push(ValidationError::InvalidServiceName(service.name.clone()));
        }
        if !seen.insert(service.name.as_str()) {
            errors.push(ValidationError::DuplicateService(service.name.clone()));
        }
        if let Err(e) = resolve_base_url(service) {
            errors.push(e);
        }
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("connect_secs"));
    }
    if config.timeouts.upstream_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("upstream_secs"));
    }
    if config.limits.max_body_bytes == 0 {
        errors.push(ValidationError::ZeroLimit("max_body_bytes"));
    }
    if config.limits.max_json_response_bytes == 0 {
        errors.push(ValidationError::ZeroLimit("max_json_response_bytes"));
    }

    for header in &config.forwarding.extra_headers {
        if parse_forward_header(header).is_none() {
            errors.push(ValidationError::InvalidHeader(header.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Resolve and check a service's base URL.
///
/// Only `http` and `https` URLs with a host are accepted. The returned URL
/// has no trailing slash.
pub fn resolve_base_url(service: &ServiceConfig) -> Result<String, ValidationError> {
    let raw = service
        .effective_base_url()
        .ok_or_else(|| ValidationError::MissingBaseUrl(service.name.clone()))?;

    let invalid = |reason: &str| ValidationError::InvalidBaseUrl {
        service: service.name.clone(),
        url: raw.clone(),
        reason: reason.to_string(),
    };

    let url = Url::parse(raw.trim()).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host"));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(invalid("must not carry a query or fragment"));
    }

    Ok(raw.trim().trim_end_matches('/').to_string())
}

/// Parse a configured extra header name, rejecting ones the gateway owns.
pub fn parse_forward_header(name: &str) -> Option<HeaderName> {
    let header = HeaderName::from_bytes(name.trim().as_bytes()).ok()?;
    if UNFORWARDABLE.contains(&header.as_str()) {
        return None;
    }
    Some(header)
}
