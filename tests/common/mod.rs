//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{HeaderMap, Request},
    response::Response,
    Router,
};
use portfolio_gateway::config::schema::DEFAULT_SERVICES;
use portfolio_gateway::config::{GatewayConfig, ServiceConfig};
use portfolio_gateway::{HttpServer, Shutdown};
use tokio::net::TcpListener;
use futures_util::StreamExt;
use tokio::sync::{mpsc, oneshot};

/// One request as the backend received it.
#[derive(Debug, Clone)]
pub struct Captured {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Captured {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// A running mock backend and everything it has seen.
#[derive(Clone)]
pub struct Backend {
    pub addr: SocketAddr,
    captured: Arc<Mutex<Vec<Captured>>>,
}

impl Backend {
    pub fn requests(&self) -> Vec<Captured> {
        self.captured.lock().unwrap().clone()
    }

    pub fn last(&self) -> Captured {
        self.requests().pop().expect("backend received no request")
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

type BoxResponse = Pin<Box<dyn Future<Output = Response> + Send>>;
type Responder = Arc<dyn Fn(Captured) -> BoxResponse + Send + Sync>;

#[derive(Clone)]
struct BackendState {
    captured: Arc<Mutex<Vec<Captured>>>,
    respond: Responder,
}

async fn record(State(state): State<BackendState>, request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();
    let captured = Captured {
        method: parts.method.to_string(),
        path: parts.uri.path().to_string(),
        query: parts.uri.query().map(str::to_string),
        headers: parts.headers,
        body,
    };
    state.captured.lock().unwrap().push(captured.clone());
    (state.respond)(captured).await
}

/// Start a programmable backend on an ephemeral port that records every
/// request before answering it.
pub async fn start_programmable_backend<F, Fut>(f: F) -> Backend
where
    F: Fn(Captured) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    let captured = Arc::new(Mutex::new(Vec::new()));
    let respond: Responder = Arc::new(move |c: Captured| -> BoxResponse { Box::pin(f(c)) });
    let app = Router::new().fallback(record).with_state(BackendState {
        captured: captured.clone(),
        respond,
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Backend { addr, captured }
}

/// Backend answering every request with the same JSON body.
pub async fn start_json_backend(status: u16, body: &'static str) -> Backend {
    start_programmable_backend(move |_| async move { json_response(status, body) }).await
}

pub fn json_response(status: u16, body: &str) -> Response {
    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Backend that reads the request body frame by frame. The receiver fires
/// with the size of the first chunk as soon as it arrives; the response
/// reports the total byte count.
pub async fn start_streaming_backend() -> (Backend, oneshot::Receiver<usize>) {
    let (first_tx, first_rx) = oneshot::channel();
    let first_tx = Arc::new(Mutex::new(Some(first_tx)));
    let captured = Arc::new(Mutex::new(Vec::new()));
    let seen = captured.clone();

    let app = Router::new().fallback(move |request: Request<Body>| {
        let first_tx = first_tx.clone();
        let seen = seen.clone();
        async move {
            let (parts, body) = request.into_parts();
            let mut stream = body.into_data_stream();
            let mut received = Vec::new();
            while let Some(Ok(chunk)) = stream.next().await {
                if !chunk.is_empty() {
                    if let Some(tx) = first_tx.lock().unwrap().take() {
                        let _ = tx.send(chunk.len());
                    }
                }
                received.extend_from_slice(&chunk);
            }
            let total = received.len();
            seen.lock().unwrap().push(Captured {
                method: parts.method.to_string(),
                path: parts.uri.path().to_string(),
                query: parts.uri.query().map(str::to_string),
                headers: parts.headers,
                body: Bytes::from(received),
            });
            json_response(200, &format!(r#"{{"received":{total}}}"#))
        }
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    (Backend { addr, captured }, first_rx)
}

/// Request body fed chunk by chunk from the returned sender.
pub fn chunked_body() -> (mpsc::Sender<Vec<u8>>, reqwest::Body) {
    let (tx, rx) = mpsc::channel::<Vec<u8>>(8);
    let stream = futures_util::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|chunk| (Ok::<_, std::io::Error>(chunk), rx))
    });
    (tx, reqwest::Body::wrap_stream(stream))
}

/// Send `chunks` with `gap` between them, then close the body.
pub async fn send_chunks(tx: mpsc::Sender<Vec<u8>>, chunks: Vec<Vec<u8>>, gap: Duration) {
    for (i, chunk) in chunks.into_iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(gap).await;
        }
        tx.send(chunk).await.unwrap();
    }
}

/// A `multipart/form-data` body with one JSON part and one file part.
pub fn multipart_body(boundary: &str, file: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Disposition: form-data; name=\"project\"\r\n");
    body.extend_from_slice(b"Content-Type: application/json\r\n\r\n");
    body.extend_from_slice(br#"{"title":"Upload"}"#);
    body.extend_from_slice(format!("\r\n--{boundary}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Disposition: form-data; name=\"file\"; filename=\"cover.bin\"\r\n");
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(file);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

/// Every default service pointed at `backend`, with metrics off.
pub fn gateway_config(backend: &str) -> GatewayConfig {
    let mut config = GatewayConfig {
        services: DEFAULT_SERVICES
            .iter()
            .map(|name| ServiceConfig::new(*name, backend))
            .collect(),
        ..GatewayConfig::default()
    };
    config.listener.bind_address = "127.0.0.1:0".into();
    config.observability.metrics_enabled = false;
    config
}

/// Start the gateway on an ephemeral port.
pub async fn start_gateway(config: GatewayConfig) -> (SocketAddr, Shutdown) {
    let (addr, shutdown, _updates) = start_gateway_with_updates(config).await;
    (addr, shutdown)
}

/// Start the gateway and keep the config update channel open.
pub async fn start_gateway_with_updates(
    config: GatewayConfig,
) -> (SocketAddr, Shutdown, mpsc::UnboundedSender<GatewayConfig>) {
    let server = HttpServer::new(config).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let (updates_tx, updates_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let _ = server.run(listener, updates_rx, server_shutdown).await;
    });

    (addr, shutdown, updates_tx)
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
