//! Response handling and transformation.
//!
//! # Responsibilities
//! - Copy backend status and headers to the client response
//! - Re-encode JSON bodies, stream everything else
//!
//! # Design Decisions
//! - Hop-by-hop headers stripped; hyper sets framing for the new body
//! - `set-cookie` values appended one by one, never folded
//! - Invalid JSON falls back to the raw bytes instead of failing the request
//! - JSON larger than the decode limit is streamed unchanged, never rejected

use axum::{
    body::{Body, Bytes},
    http::{
        header::{self, HeaderName},
        HeaderMap,
    },
    response::Response,
};
use futures_util::{stream, StreamExt};
use http_body_util::BodyExt;
use hyper::body::Incoming;

use crate::http::error::ProxyError;

/// Headers describing the upstream connection or encoding, not the payload.
pub const HOP_BY_HOP: [HeaderName; 9] = [
    header::CONTENT_ENCODING,
    header::CONTENT_LENGTH,
    header::TRANSFER_ENCODING,
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    HeaderName::from_static("proxy-connection"),
    header::TE,
    header::TRAILER,
    header::UPGRADE,
];

pub fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(name)
}

/// Copy end-to-end headers into `out`. Returns the number of `set-cookie`
/// values relayed.
pub fn relay_headers(upstream: &HeaderMap, out: &mut HeaderMap) -> usize {
    let mut cookies = 0;
    for (name, value) in upstream {
        if is_hop_by_hop(name) {
            continue;
        }
        if name == header::SET_COOKIE {
            cookies += 1;
        }
        out.append(name.clone(), value.clone());
    }
    cookies
}

pub fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| {
            let essence = ct.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
            essence == "application/json" || essence.ends_with("+json")
        })
        .unwrap_or(false)
}

/// Turn the backend response into the client response.
pub async fn relay(upstream: hyper::Response<Incoming>, json_limit: usize) -> Result<Response, ProxyError> {
    let (parts, mut body) = upstream.into_parts();

    let mut response = Response::builder().status(parts.status);
    if let Some(headers) = response.headers_mut() {
        let cookies = relay_headers(&parts.headers, headers);
        if cookies > 0 {
            tracing::debug!(count = cookies, "Relaying set-cookie headers");
        }
    }

    if !is_json(&parts.headers) {
        return Ok(response.body(Body::new(body))?);
    }
    if declared_length(&parts.headers).is_some_and(|len| len > json_limit) {
        tracing::debug!(limit = json_limit, "JSON response over decode limit, streaming unchanged");
        return Ok(response.body(Body::new(body))?);
    }

    let mut buffered = Vec::new();
    loop {
        let Some(frame) = body.frame().await else { break };
        let frame = frame.map_err(|e| ProxyError::UpstreamBody(e.into()))?;
        let Ok(data) = frame.into_data() else { continue };
        buffered.extend_from_slice(&data);

        if buffered.len() > json_limit {
            tracing::debug!(limit = json_limit, "JSON response over decode limit, streaming unchanged");
            let head = stream::once(async move { Ok::<_, hyper::Error>(Bytes::from(buffered)) });
            return Ok(response.body(Body::from_stream(head.chain(body.into_data_stream())))?);
        }
    }

    Ok(response.body(Body::from(reencode_json(Bytes::from(buffered))))?)
}

fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

/// Decode and re-encode a JSON payload, keeping the raw bytes when they are
/// not valid JSON.
fn reencode_json(bytes: Bytes) -> Bytes {
    match serde_json::from_slice::<serde_json::Value>(&bytes) {
        Ok(value) => serde_json::to_vec(&value).map(Bytes::from).unwrap_or(bytes),
        Err(e) => {
            if !bytes.is_empty() {
                tracing::debug!(error = %e, "Upstream JSON did not parse, relaying raw bytes");
            }
            bytes
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_strips_hop_by_hop_and_keeps_cookies() {
        let mut upstream = HeaderMap::new();
        upstream.append(header::SET_COOKIE, HeaderValue::from_static("session=abc; HttpOnly"));
        upstream.append(header::SET_COOKIE, HeaderValue::from_static("theme=dark"));
        upstream.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        upstream.insert(header::CONTENT_LENGTH, HeaderValue::from_static("12"));
        upstream.insert(header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        upstream.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        upstream.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        upstream.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        upstream.insert("x-total-count", HeaderValue::from_static("3"));

        let mut out = HeaderMap::new();
        let cookies = relay_headers(&upstream, &mut out);

        assert_eq!(cookies, 2);
        let relayed: Vec<_> = out.get_all(header::SET_COOKIE).iter().collect();
        assert_eq!(relayed, vec!["session=abc; HttpOnly", "theme=dark"]);
        assert_eq!(out["x-total-count"], "3");
        assert_eq!(out[header::CONTENT_TYPE], "application/json");
        for name in &HOP_BY_HOP {
            assert!(!out.contains_key(name), "{name} should be stripped");
        }
    }

    #[test]
    fn test_is_json() {
        let mut headers = HeaderMap::new();
        assert!(!is_json(&headers));

        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json; charset=utf-8"));
        assert!(is_json(&headers));

        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/problem+json"));
        assert!(is_json(&headers));

        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/pdf"));
        assert!(!is_json(&headers));
    }

    #[test]
    fn test_reencode_json() {
        let compacted = reencode_json(Bytes::from_static(b"{ \"data\" : [1, 2] }"));
        assert_eq!(&compacted[..], br#"{"data":[1,2]}"#);

        let raw = reencode_json(Bytes::from_static(b"not json"));
        assert_eq!(&raw[..], b"not json");

        assert!(reencode_json(Bytes::new()).is_empty());

        let ordered = reencode_json(Bytes::from_static(br#"{"status":404,"error":"Not Found","message":"x"}"#));
        assert_eq!(&ordered[..], br#"{"status":404,"error":"Not Found","message":"x"}"#);
    }

    #[test]
    fn test_declared_length() {
        let mut headers = HeaderMap::new();
        assert_eq!(declared_length(&headers), None);
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("4096"));
        assert_eq!(declared_length(&headers), Some(4096));
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("lots"));
        assert_eq!(declared_length(&headers), None);
    }
}
