//! Request inspection and rewriting.
//!
//! # Responsibilities
//! - Extract routing-relevant information (host, peer address)
//! - Rewrite the request for the local backend (URI, forwarding headers)
//! - Strip hop-by-hop headers before forwarding
//!
//! # Design Decisions
//! - The Host header is forwarded untouched so backends see the virtual host
//! - The body is moved, never buffered

use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Request, Uri};

/// Header carrying the per-request correlation ID.
pub const X_REQUEST_ID: &str = "x-request-id";

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Headers that apply to a single connection and must not be forwarded.
const HOP_BY_HOP: [HeaderName; 6] = [
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::UPGRADE,
];

/// The raw Host header value, if present and valid UTF-8.
pub fn host_header(request: &Request<Body>) -> Option<&str> {
    request
        .headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
}

/// The peer address recorded by the server, if any.
pub fn remote_addr(request: &Request<Body>) -> Option<SocketAddr> {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
}

/// Rewrite `request` to target `127.0.0.1:<port>`, keeping method, headers and body.
pub fn into_upstream(
    request: Request<Body>,
    port: u16,
    client: Option<SocketAddr>,
) -> Result<Request<Body>, axum::http::Error> {
    let (mut parts, body) = request.into_parts();

    let path = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_owned())
        .unwrap_or_else(|| "/".to_owned());
    parts.uri = Uri::builder()
        .scheme("http")
        .authority(format!("127.0.0.1:{port}"))
        .path_and_query(path)
        .build()?;

    strip_hop_by_hop(&mut parts.headers);
    if let Some(client) = client {
        append_forwarded_for(&mut parts.headers, client);
    }

    Ok(Request::from_parts(parts, body))
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    // Connection may name additional per-hop headers.
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in named.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
    headers.remove("keep-alive");
    headers.remove("proxy-connection");
}

fn append_forwarded_for(headers: &mut HeaderMap, client: SocketAddr) {
    let ip = client.ip().to_canonical().to_string();
    let value = match headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(existing) => format!("{existing}, {ip}"),
        None => ip,
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}
