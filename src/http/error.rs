//! Proxy failures and their client-facing responses.

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("invalid service name")]
    InvalidService,

    #[error("invalid target url {url}: {source}")]
    InvalidTarget {
        url: String,
        #[source]
        source: axum::http::uri::InvalidUri,
    },

    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("failed to read request body: {0}")]
    RequestBody(BoxError),

    #[error("upstream request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),

    #[error("upstream did not respond within {0:?}")]
    Timeout(Duration),

    #[error("failed to read upstream body: {0}")]
    UpstreamBody(BoxError),

    #[error("failed to build request: {0}")]
    Build(#[from] axum::http::Error),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidService => StatusCode::BAD_REQUEST,
            Self::RequestBody(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::InvalidTarget { .. } | Self::Upstream(_) | Self::UpstreamBody(_) | Self::Build(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidService => "invalid_service",
            Self::InvalidTarget { .. } => "invalid_target",
            Self::PayloadTooLarge { .. } => "payload_too_large",
            Self::RequestBody(_) => "request_body",
            Self::Upstream(_) => "transport",
            Self::Timeout(_) => "timeout",
            Self::UpstreamBody(_) => "upstream_body",
            Self::Build(_) => "build",
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::InvalidService => json!({ "message": "Invalid service name" }),
            other => json!({
                "message": status.canonical_reason().unwrap_or("Error"),
                "error": other.to_string(),
            }),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_invalid_service_body() {
        let response = ProxyError::InvalidService.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await, json!({ "message": "Invalid service name" }));
    }

    #[tokio::test]
    async fn test_timeout_body() {
        let response = ProxyError::Timeout(Duration::from_secs(30)).into_response();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Gateway Timeout");
        assert!(body["error"].as_str().unwrap().contains("30s"));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ProxyError::PayloadTooLarge { limit: 10 }.status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            ProxyError::RequestBody("reset".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ProxyError::UpstreamBody("reset".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(ProxyError::Timeout(Duration::from_secs(1)).kind(), "timeout");
    }
}
