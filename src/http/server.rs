//! HTTP server setup and request forwarding.
//!
//! # Responsibilities
//! - Create the Axum router (`/healthz`, `/api/{*slug}`)
//! - Wire up middleware (request ID, tracing)
//! - Resolve the service segment and forward to its backend (`http` or `https`)
//! - Swap routing state when a new config arrives
//! - Observability (metrics, correlation IDs)

use std::sync::{Arc, Once};
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::{header::HeaderName, Request, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use futures_util::TryStreamExt;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::validation::{parse_forward_header, validate_config};
use crate::config::{ConfigError, GatewayConfig, LimitsConfig};
use crate::http::deadline::Deadline;
use crate::http::error::ProxyError;
use crate::http::request::{body_mode, forwarded_headers, request_id, BodyMode, UuidRequestId, X_REQUEST_ID};
use crate::http::response::relay;
use crate::observability::metrics;
use crate::routing::{slug_segments, target_url, ServiceMap, ServiceRoute};

/// Routing state swapped as a whole on reload.
#[derive(Debug)]
pub struct InnerState {
    pub services: ServiceMap,
    pub extra_headers: Vec<HeaderName>,
    pub limits: LimitsConfig,
    pub upstream_timeout: Duration,
}

impl InnerState {
    pub fn from_config(config: &GatewayConfig) -> Result<Self, ConfigError> {
        validate_config(config).map_err(ConfigError::Validation)?;
        let services =
            ServiceMap::from_config(&config.services).map_err(|e| ConfigError::Validation(vec![e]))?;

        Ok(Self {
            services,
            extra_headers: config
                .forwarding
                .extra_headers
                .iter()
                .filter_map(|h| parse_forward_header(h))
                .collect(),
            limits: config.limits.clone(),
            upstream_timeout: Duration::from_secs(config.timeouts.upstream_secs),
        })
    }
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<ArcSwap<InnerState>>,
    client: Client<HttpsConnector<HttpConnector>, Body>,
}

impl AppState {
    pub fn new(config: &GatewayConfig) -> Result<Self, ConfigError> {
        let inner = InnerState::from_config(config)?;

        let mut connector = HttpConnector::new();
        connector.enforce_http(false);
        connector.set_connect_timeout(Some(Duration::from_secs(config.timeouts.connect_secs)));
        let client = Client::builder(TokioExecutor::new()).build(https_connector(connector));

        Ok(Self {
            inner: Arc::new(ArcSwap::from_pointee(inner)),
            client,
        })
    }

    /// Current routing state.
    pub fn snapshot(&self) -> Arc<InnerState> {
        self.inner.load_full()
    }

    /// Replace the routing state. The connect timeout is fixed at startup.
    pub fn reload(&self, config: &GatewayConfig) -> Result<(), ConfigError> {
        let next = InnerState::from_config(config)?;
        tracing::info!(services = ?next.services.names(), "Routing state reloaded");
        self.inner.store(Arc::new(next));
        Ok(())
    }
}

/// Wrap `http` so backends may be `http://` or `https://`, trusting the
/// platform roots. With no usable roots, `https` backends fail per request.
fn https_connector(http: HttpConnector) -> HttpsConnector<HttpConnector> {
    static CRYPTO_PROVIDER: Once = Once::new();
    CRYPTO_PROVIDER.call_once(|| {
        // Err only when a provider is already installed.
        let _ = rustls::crypto::ring::default_provider().install_default();
    });

    let builder = match HttpsConnectorBuilder::new().with_native_roots() {
        Ok(builder) => builder,
        Err(e) => {
            tracing::warn!(error = %e, "No native TLS roots; https backends will be unreachable");
            HttpsConnectorBuilder::new().with_tls_config(
                rustls::ClientConfig::builder()
                    .with_root_certificates(rustls::RootCertStore::empty())
                    .with_no_client_auth(),
            )
        }
    };
    builder
        .https_or_http()
        .enable_http1()
        .enable_http2()
        .wrap_connector(http)
}

/// HTTP server for the gateway.
pub struct HttpServer {
    state: AppState,
    config: GatewayConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: GatewayConfig) -> Result<Self, ConfigError> {
        let state = AppState::new(&config)?;
        Ok(Self { state, config })
    }

    /// The Axum router, for embedding or in-process tests.
    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Run the server until `shutdown` fires, applying config updates as
    /// they arrive.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            services = ?self.state.snapshot().services.names(),
            "HTTP server starting"
        );

        let reload_state = self.state.clone();
        let reloader = tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                if let Err(e) = reload_state.reload(&config) {
                    tracing::error!(error = %e, "Config update rejected");
                }
            }
        });

        let app = build_router(self.state);
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        reloader.abort();
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// Build the Axum router with all middleware layers.
fn build_router(state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(X_REQUEST_ID, UuidRequestId))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
            tracing::info_span!(
                "request",
                method = %request.method(),
                path = %request.uri().path(),
                request_id = %request_id(request.headers()),
            )
        }))
        .layer(PropagateRequestIdLayer::new(X_REQUEST_ID));

    Router::new()
        .route("/healthz", get(health_handler))
        .route("/api", any(proxy_handler))
        .route("/api/{*slug}", any(proxy_handler))
        .fallback(proxy_handler)
        .with_state(state)
        .layer(middleware)
}

async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

/// Main proxy handler.
/// Resolves the service segment and forwards the request once.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let request_id = request_id(request.headers()).to_string();
    let inner = state.snapshot();

    let (route, target) = {
        let path = request.uri().path();
        let Some(segments) = slug_segments(path) else {
            metrics::record_request(method.as_str(), 404, "none", start);
            return (StatusCode::NOT_FOUND, Json(json!({ "message": "Not Found" }))).into_response();
        };

        let route = match segments.first().and_then(|name| inner.services.resolve(name)) {
            Some(route) => route.clone(),
            None => {
                tracing::warn!(request_id = %request_id, path = %path, "Invalid service name");
                metrics::record_request(method.as_str(), 400, "none", start);
                return ProxyError::InvalidService.into_response();
            }
        };
        let target = target_url(&route, &segments, request.uri().query());
        (route, target)
    };

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        service = %route.name,
        target = %target,
        "Proxying request"
    );

    match forward(&state, &inner, &route, target, request).await {
        Ok(response) => {
            metrics::record_request(method.as_str(), response.status().as_u16(), &route.name, start);
            response
        }
        Err(e) => {
            tracing::error!(
                request_id = %request_id,
                service = %route.name,
                kind = e.kind(),
                error = %e,
                "Forwarding failed"
            );
            metrics::record_upstream_error(&route.name, e.kind());
            metrics::record_request(method.as_str(), e.status().as_u16(), &route.name, start);
            e.into_response()
        }
    }
}

async fn forward(
    state: &AppState,
    inner: &InnerState,
    route: &ServiceRoute,
    target: String,
    request: Request<Body>,
) -> Result<Response, ProxyError> {
    let uri: Uri = target
        .parse()
        .map_err(|source| ProxyError::InvalidTarget { url: target.clone(), source })?;

    let (parts, body) = request.into_parts();
    let mode = body_mode(&parts.method, &parts.headers);
    let deadline = Deadline::new(inner.upstream_timeout);

    let body = match mode {
        BodyMode::Empty => Body::empty(),
        BodyMode::Stream => {
            let service = route.name.clone();
            let progress = deadline.clone();
            Body::from_stream(body.into_data_stream().inspect_ok(move |chunk| {
                progress.touch();
                metrics::record_streamed_bytes(&service, chunk.len() as u64);
            }))
        }
        BodyMode::Buffered => {
            let limit = inner.limits.max_body_bytes;
            let collected = Limited::new(body, limit).collect().await.map_err(|e| {
                if e.downcast_ref::<LengthLimitError>().is_some() {
                    ProxyError::PayloadTooLarge { limit }
                } else {
                    ProxyError::RequestBody(e)
                }
            })?;
            deadline.touch();
            Body::from(collected.to_bytes())
        }
    };

    let mut builder = Request::builder().method(parts.method).uri(uri);
    if let Some(headers) = builder.headers_mut() {
        *headers = forwarded_headers(&parts.headers, &inner.extra_headers);
    }
    let upstream_request = builder.body(body)?;

    let upstream = deadline.run(state.client.request(upstream_request)).await??;

    tracing::debug!(service = %route.name, status = %upstream.status(), mode = ?mode, "Upstream responded");
    deadline
        .run(relay(upstream, inner.limits.max_json_response_bytes))
        .await?
}
