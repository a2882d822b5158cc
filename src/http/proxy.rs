//! Forwarding to local backends.
//!
//! # Responsibilities
//! - Send the rewritten request to `127.0.0.1:<port>`
//! - Stream the backend response back unchanged
//! - Classify failures: refused connection vs. anything else
//!
//! # Design Decisions
//! - No retries: a refused connection means the service is not running
//! - Refused → 503 with the expected domain/port; other failures → 500

use std::error::Error as StdError;
use std::io;
use std::net::SocketAddr;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use hyper::body::Incoming;
use hyper_util::client::legacy::{connect::HttpConnector, Client};

use crate::http::request::into_upstream;
use crate::http::response::{error_page, html, not_started_page};
use crate::registry::RegistryError;
use crate::routing::Target;

/// HTTP client used for every proxied exchange.
pub type ProxyClient = Client<HttpConnector, Body>;

/// Failures while serving a virtual-host request.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// Nothing is listening on the registered port.
    #[error("{domain} expects a listener on port {port}")]
    ConnectionRefused {
        domain: String,
        port: u16,
        directory_url: String,
    },

    /// The backend exchange failed for another reason.
    #[error("upstream request to port {port} failed: {detail}")]
    Upstream { port: u16, detail: String },

    /// The request could not be rewritten for the backend.
    #[error("invalid upstream request: {0}")]
    Request(#[from] axum::http::Error),

    /// The registry could not be listed for the directory page.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::ConnectionRefused { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ProxyError::Upstream { .. } | ProxyError::Request(_) | ProxyError::Registry(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ProxyError::ConnectionRefused {
                domain,
                port,
                directory_url,
            } => html(status, &not_started_page(domain, *port, directory_url)),
            ProxyError::Upstream { .. } | ProxyError::Request(_) | ProxyError::Registry(_) => {
                html(status, &error_page(&diagnostic(&self)))
            }
        }
    }
}

/// Forward `request` to `target` and stream the response back.
pub async fn forward(
    client: &ProxyClient,
    request: Request<Body>,
    target: &Target,
    peer: Option<SocketAddr>,
    directory_url: &str,
) -> Result<Response, ProxyError> {
    let upstream_request = into_upstream(request, target.port, peer)?;

    match client.request(upstream_request).await {
        Ok(response) => {
            let (parts, body): (_, Incoming) = response.into_parts();
            Ok(Response::from_parts(parts, Body::new(body)))
        }
        Err(e) if is_connection_refused(&e) => Err(ProxyError::ConnectionRefused {
            domain: target.domain.clone(),
            port: target.port,
            directory_url: directory_url.to_string(),
        }),
        Err(e) => Err(ProxyError::Upstream {
            port: target.port,
            detail: diagnostic(&e),
        }),
    }
}

/// Walk the error chain looking for a refused TCP connection.
pub fn is_connection_refused(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            if io_err.kind() == io::ErrorKind::ConnectionRefused {
                return true;
            }
        }
        current = e.source();
    }
    false
}

/// Full error chain, one cause per line.
fn diagnostic(err: &(dyn StdError + 'static)) -> String {
    let mut out = err.to_string();
    let mut current = err.source();
    while let Some(e) = current {
        out.push_str("\ncaused by: ");
        out.push_str(&e.to_string());
        current = e.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Wrapper(io::Error);

    impl std::fmt::Display for Wrapper {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "client error (Connect)")
        }
    }

    impl StdError for Wrapper {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn detects_nested_refusal() {
        let refused = Wrapper(io::Error::from(io::ErrorKind::ConnectionRefused));
        let reset = Wrapper(io::Error::from(io::ErrorKind::ConnectionReset));

        assert!(is_connection_refused(&refused));
        assert!(!is_connection_refused(&reset));
    }

    #[test]
    fn refused_maps_to_503() {
        let err = ProxyError::ConnectionRefused {
            domain: "a.localhost".into(),
            port: 3000,
            directory_url: "http://localhost".into(),
        };
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()["content-type"], "text/html");
    }

    #[test]
    fn diagnostic_includes_causes() {
        let err = Wrapper(io::Error::new(io::ErrorKind::Other, "boom"));
        let text = diagnostic(&err);
        assert!(text.contains("client error (Connect)"));
        assert!(text.contains("caused by: boom"));
    }
}
