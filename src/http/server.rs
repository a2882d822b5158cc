//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the single virtual-host handler
//! - Wire up middleware (tracing, request ID, panic page)
//! - Bind server to listener and stop on the shutdown broadcast
//! - Dispatch requests: proxy matched hosts, list services otherwise

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::http::proxy::{self, ProxyClient, ProxyError};
use crate::http::request::{host_header, remote_addr, X_REQUEST_ID};
use crate::http::response::{directory_page, html, internal_error};
use crate::observability::metrics;
use crate::registry::DomainSource;
use crate::routing::Router as HostRouter;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<HostRouter>,
    pub client: ProxyClient,
    pub directory_url: Arc<str>,
    pub upstream_timeout: Option<Duration>,
}

/// HTTP virtual-host proxy.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server answering for `config.root_domain`.
    pub fn new(config: &ProxyConfig, source: Arc<dyn DomainSource>) -> Self {
        let client: ProxyClient = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        let state = AppState {
            router: Arc::new(HostRouter::new(source, config.root_suffix())),
            client,
            directory_url: format!("http://{}", config.root_domain).into(),
            upstream_timeout: config.http.upstream_timeout_secs.map(Duration::from_secs),
        };

        let router = Self::build_router(state);
        Self { router }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Every error a client can see is rendered by the handler as HTML, so no
    /// layer here produces a response of its own except the panic page.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .fallback(vhost_handler)
            .with_state(state)
            .layer(CatchPanicLayer::custom(handle_panic))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The assembled router, for driving requests in-process.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires, then finish in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server received shutdown signal, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Proxy requests for registered hosts; show the service directory for everything else.
async fn vhost_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let peer = remote_addr(&request);
    let host = host_header(&request).map(str::to_owned);
    let target = match (host, peer) {
        (Some(host), Some(_)) => state.router.resolve(&host).await,
        _ => None,
    };

    let Some(target) = target else {
        let response = match directory(&state).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(request_id = %request_id, error = %e, "Failed to list services");
                e.into_response()
            }
        };
        metrics::record_http_request("directory", response.status().as_u16(), start_time);
        return response;
    };

    tracing::debug!(
        request_id = %request_id,
        domain = %target.domain,
        port = target.port,
        method = %request.method(),
        path = %request.uri().path(),
        "Proxying request"
    );

    let forwarded = proxy::forward(&state.client, request, &target, peer, &state.directory_url);
    let result = match state.upstream_timeout {
        Some(limit) => match tokio::time::timeout(limit, forwarded).await {
            Ok(result) => result,
            Err(_) => Err(ProxyError::Upstream {
                port: target.port,
                detail: format!("no response within {}s", limit.as_secs()),
            }),
        },
        None => forwarded.await,
    };

    match result {
        Ok(response) => {
            metrics::record_http_request("proxied", response.status().as_u16(), start_time);
            response
        }
        Err(e) => {
            match &e {
                ProxyError::ConnectionRefused { .. } => {
                    tracing::info!(request_id = %request_id, domain = %target.domain, port = target.port, "Service not started");
                }
                _ => {
                    tracing::error!(request_id = %request_id, domain = %target.domain, error = %e, "Upstream error");
                }
            }
            let outcome = match e {
                ProxyError::ConnectionRefused { .. } => "refused",
                _ => "error",
            };
            metrics::record_http_request(outcome, e.status().as_u16(), start_time);
            e.into_response()
        }
    }
}

async fn directory(state: &AppState) -> Result<Response, ProxyError> {
    let source = state.router.source();
    let domains: Vec<String> = source.list_domains().await?.into_iter().collect();
    let location = source.location().display().to_string();
    Ok(html(StatusCode::OK, &directory_page(&domains, &location)))
}

/// Last-resort 500 page for a handler that panicked.
fn handle_panic(err: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "handler panicked".to_string()
    };
    tracing::error!(detail = %detail, "Request handler panicked");
    internal_error(&detail)
}
