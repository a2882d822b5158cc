use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::admin::AdminState;
use crate::registry::RegistryEntry;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub root_domain: String,
    pub registry_dir: String,
    pub uptime_secs: u64,
    pub dns_in_flight: u64,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        root_domain: state.root_domain.to_string(),
        registry_dir: state.source.location().display().to_string(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        dns_in_flight: state.dns_in_flight.active_count(),
    })
}

/// Registered domains with a valid port.
pub async fn get_domains(
    State(state): State<AdminState>,
) -> Result<Json<Vec<RegistryEntry>>, (StatusCode, String)> {
    state
        .source
        .entries()
        .await
        .map(Json)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::admin::{setup_admin_router, AdminState};
    use crate::config::ProxyConfig;
    use crate::lifecycle::InFlightTracker;
    use crate::registry::DirectoryRegistry;

    fn state(dir: &std::path::Path) -> AdminState {
        let mut config = ProxyConfig::default();
        config.admin.api_key = "secret".to_string();
        AdminState::new(&config, Arc::new(DirectoryRegistry::new(dir)), InFlightTracker::new())
    }

    #[tokio::test]
    async fn rejects_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let response = setup_admin_router(state(dir.path()))
            .oneshot(Request::get("/admin/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), 401);
    }

    #[tokio::test]
    async fn lists_domains_with_key() {
        let dir = tempfile::tempdir().unwrap();
        let registry = DirectoryRegistry::new(dir.path());
        registry.register("a.localhost", 3000).await.unwrap();

        let response = setup_admin_router(state(dir.path()))
            .oneshot(
                Request::get("/admin/domains")
                    .header("Authorization", "Bearer secret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), 200);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json[0]["domain"], "a.localhost");
        assert_eq!(json[0]["port"], 3000);
    }
}
