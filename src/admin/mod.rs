//! Admin API: read-only view of the running proxy.
//!
//! Every route requires `Authorization: Bearer <admin.api_key>`.

pub mod auth;
pub mod handlers;

use std::sync::Arc;
use std::time::Instant;

use axum::{middleware, routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::config::ProxyConfig;
use crate::lifecycle::InFlightTracker;
use crate::registry::DomainSource;

/// State shared by the admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub source: Arc<dyn DomainSource>,
    pub api_key: Arc<str>,
    pub root_domain: Arc<str>,
    pub dns_in_flight: InFlightTracker,
    pub started_at: Instant,
}

impl AdminState {
    pub fn new(config: &ProxyConfig, source: Arc<dyn DomainSource>, dns_in_flight: InFlightTracker) -> Self {
        Self {
            source,
            api_key: config.admin.api_key.as_str().into(),
            root_domain: config.root_domain.as_str().into(),
            dns_in_flight,
            started_at: Instant::now(),
        }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/domains", get(get_domains))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}

/// Serve the admin API until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    state: AdminState,
    mut shutdown: broadcast::Receiver<()>,
) -> std::io::Result<()> {
    tracing::info!(address = %listener.local_addr()?, "Admin API starting");
    axum::serve(listener, setup_admin_router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await
}
