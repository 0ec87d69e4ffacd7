//! Client error taxonomy.

use std::fmt;
use std::path::PathBuf;

use reqwest::StatusCode;

use crate::envelope::ExceptionMessage;

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid url '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The backend answered with a non-2xx status.
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("invalid multipart field '{field}': {source}")]
    Multipart {
        field: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ClientError {
    /// HTTP status of an API failure, if the backend answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Api(err) => Some(err.status),
            ClientError::Transport { source, .. } => source.status(),
            _ => None,
        }
    }

    pub fn api(&self) -> Option<&ApiError> {
        match self {
            ClientError::Api(err) => Some(err),
            _ => None,
        }
    }

    /// The session was rejected; callers should send the user back to login.
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }
}

/// A non-2xx response, with the backend's structured payload when it sent one.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub status: StatusCode,
    pub payload: Option<ExceptionMessage>,
    pub body: String,
}

impl ApiError {
    pub fn from_body(status: StatusCode, body: String) -> Self {
        let payload = serde_json::from_str::<ExceptionMessage>(&body)
            .ok()
            .filter(|p| !p.message.is_empty() || !p.error.is_empty() || p.status.is_some());
        Self {
            status,
            payload,
            body,
        }
    }

    /// User-facing message: the backend's `message`, else its `error`, else
    /// the status reason.
    pub fn message(&self) -> &str {
        self.payload
            .as_ref()
            .and_then(|p| {
                if !p.message.is_empty() {
                    Some(p.message.as_str())
                } else if !p.error.is_empty() {
                    Some(p.error.as_str())
                } else {
                    None
                }
            })
            .or_else(|| self.status.canonical_reason())
            .unwrap_or("request failed")
    }

    pub fn field_errors(&self) -> impl Iterator<Item = (&str, &str)> {
        self.payload
            .iter()
            .filter_map(|p| p.field_errors.as_ref())
            .flat_map(|errors| errors.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    pub fn general_errors(&self) -> &[String] {
        self.payload
            .as_ref()
            .and_then(|p| p.general_errors.as_deref())
            .unwrap_or(&[])
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.message())
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_payload_is_preserved() {
        let err = ApiError::from_body(
            StatusCode::NOT_FOUND,
            r#"{"status":404,"error":"Not Found","message":"x"}"#.to_string(),
        );
        let payload = err.payload.as_ref().unwrap();
        assert_eq!(payload.status, Some(404));
        assert_eq!(payload.error, "Not Found");
        assert_eq!(payload.message, "x");
        assert_eq!(err.message(), "x");
        assert_eq!(err.to_string(), "404 Not Found: x");
    }

    #[test]
    fn test_plain_body_keeps_raw_text() {
        let err = ApiError::from_body(StatusCode::BAD_GATEWAY, "upstream down".to_string());
        assert!(err.payload.is_none());
        assert_eq!(err.body, "upstream down");
        assert_eq!(err.message(), "Bad Gateway");
    }

    #[test]
    fn test_field_and_general_errors() {
        let err = ApiError::from_body(
            StatusCode::BAD_REQUEST,
            r#"{"status":400,"error":"Bad Request","message":"invalid","fieldErrors":{"email":"taken"},"generalErrors":["retry later"]}"#
                .to_string(),
        );
        let fields: Vec<_> = err.field_errors().collect();
        assert_eq!(fields, vec![("email", "taken")]);
        assert_eq!(err.general_errors(), ["retry later".to_string()]);
    }

    #[test]
    fn test_unauthorized_detection() {
        let err = ClientError::from(ApiError::from_body(StatusCode::UNAUTHORIZED, String::new()));
        assert!(err.is_unauthorized());
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
    }
}
