//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Service prefixes the portfolio backend exposes.
pub const DEFAULT_SERVICES: [&str; 9] = [
    "users",
    "skills",
    "experiences",
    "educations",
    "auth",
    "portfolio",
    "projects",
    "messages",
    "home",
];

/// Environment variable holding the backend base URL.
pub const DEFAULT_BASE_URL_ENV: &str = "AUTH_API_URL";

/// Used when the environment variable is unset.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Service prefixes and the backends they map to.
    pub services: Vec<ServiceConfig>,

    /// Request header forwarding.
    pub forwarding: ForwardingConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Body size limits.
    pub limits: LimitsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            services: DEFAULT_SERVICES
                .iter()
                .map(|name| ServiceConfig::from_env(*name, DEFAULT_BASE_URL_ENV, DEFAULT_BASE_URL))
                .collect(),
            forwarding: ForwardingConfig::default(),
            timeouts: TimeoutConfig::default(),
            limits: LimitsConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

/// A service prefix (`/api/<name>/...`) and where it is forwarded.
///
/// The base URL is taken from `base_url_env` when that variable is set and
/// non-empty, otherwise from `base_url`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ServiceConfig {
    /// First path segment after `/api`.
    pub name: String,

    /// Literal base URL (e.g., "http://backend:8080").
    #[serde(default)]
    pub base_url: Option<String>,

    /// Environment variable to read the base URL from.
    #[serde(default)]
    pub base_url_env: Option<String>,

    /// Drop the service segment from the forwarded path.
    #[serde(default)]
    pub strip_service_segment: bool,
}

impl ServiceConfig {
    /// Service with a fixed base URL.
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: Some(base_url.into()),
            base_url_env: None,
            strip_service_segment: false,
        }
    }

    /// Service whose base URL comes from `env`, with a fallback.
    pub fn from_env(name: impl Into<String>, env: impl Into<String>, fallback: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: Some(fallback.into()),
            base_url_env: Some(env.into()),
            strip_service_segment: false,
        }
    }

    /// The effective base URL, before validation.
    pub fn effective_base_url(&self) -> Option<String> {
        self.base_url_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|v| !v.trim().is_empty())
            .or_else(|| self.base_url.clone())
    }
}

/// Request header forwarding.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ForwardingConfig {
    /// Headers forwarded in addition to the built-in allow-list.
    pub extra_headers: Vec<String>,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Time allowed for the backend to answer, in seconds.
    pub upstream_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            upstream_secs: 30,
        }
    }
}

/// Body size limits. Multipart uploads are streamed and not subject to
/// `max_body_bytes`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Largest non-multipart request body buffered for forwarding.
    pub max_body_bytes: usize,

    /// Largest JSON response decoded before relaying.
    pub max_json_response_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 10 * 1024 * 1024,           // 10MB
            max_json_response_bytes: 32 * 1024 * 1024, // 32MB
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_services() {
        let config = GatewayConfig::default();
        let names: Vec<_> = config.services.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, DEFAULT_SERVICES);
        assert!(config
            .services
            .iter()
            .all(|s| s.base_url_env.as_deref() == Some(DEFAULT_BASE_URL_ENV)));
    }

    #[test]
    fn test_env_overrides_literal_base_url() {
        let service = ServiceConfig::from_env("users", "PORTFOLIO_GATEWAY_TEST_USERS_URL", "http://fallback:1");
        assert_eq!(service.effective_base_url().as_deref(), Some("http://fallback:1"));

        std::env::set_var("PORTFOLIO_GATEWAY_TEST_USERS_URL", "http://from-env:2");
        assert_eq!(service.effective_base_url().as_deref(), Some("http://from-env:2"));

        std::env::set_var("PORTFOLIO_GATEWAY_TEST_USERS_URL", "  ");
        assert_eq!(service.effective_base_url().as_deref(), Some("http://fallback:1"));
        std::env::remove_var("PORTFOLIO_GATEWAY_TEST_USERS_URL");
    }

    #[test]
    fn test_log_format_parses_lowercase() {
        let config: ObservabilityConfig = toml::from_str("log_format = \"json\"").unwrap();
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.log_level, "info");
    }
}
