//! Process supervisor.
//!
//! # Responsibilities
//! - Bind the DNS sockets (UDP and TCP), HTTP listener and optional admin/metrics endpoints
//! - Run every server loop on its own task
//! - On shutdown: stop accepting, drain in-flight work, release sockets
//!
//! # Design Decisions
//! - Fail fast: any bind error is fatal before traffic is accepted
//! - One drain deadline shared by every server

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, UdpSocket};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::admin::{self, AdminState};
use crate::config::ProxyConfig;
use crate::dns::{DnsServer, InterfaceSource, Responder, SystemInterfaces};
use crate::http::HttpServer;
use crate::lifecycle::{signals, InFlightTracker, Shutdown};
use crate::observability::metrics;
use crate::registry::{build_source, DomainSource};

/// Errors that prevent the proxy from starting.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("failed to bind {what} on {address}: {source}")]
    Bind {
        what: &'static str,
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid {what} address {address}")]
    Address { what: &'static str, address: String },

    #[error("failed to start metrics exporter: {0}")]
    Metrics(String),

    #[error("failed to install signal handler: {0}")]
    Signal(#[source] io::Error),
}

type ServerTask = JoinHandle<io::Result<()>>;

/// Builds and starts every listener from one configuration.
pub struct Supervisor {
    config: ProxyConfig,
    source: Arc<dyn DomainSource>,
    interfaces: Arc<dyn InterfaceSource>,
}

impl Supervisor {
    pub fn new(config: ProxyConfig) -> Self {
        let source = build_source(&config.registry);
        Self {
            config,
            source,
            interfaces: Arc::new(SystemInterfaces),
        }
    }

    /// Replace the interface table (tests pin it to a known layout).
    pub fn with_interfaces(mut self, interfaces: Arc<dyn InterfaceSource>) -> Self {
        self.interfaces = interfaces;
        self
    }

    /// Bind every socket and spawn the server loops.
    pub async fn start(self) -> Result<Running, LifecycleError> {
        let Supervisor {
            config,
            source,
            interfaces,
        } = self;

        if config.observability.metrics_enabled {
            let addr = parse_addr("metrics", &config.observability.metrics_address)?;
            metrics::init_metrics(addr).map_err(|e| LifecycleError::Metrics(e.to_string()))?;
        }

        let udp = UdpSocket::bind(&config.dns.bind_address)
            .await
            .map_err(bind_error("DNS", &config.dns.bind_address))?;
        let dns_addr = udp
            .local_addr()
            .map_err(bind_error("DNS", &config.dns.bind_address))?;
        let dns_tcp = TcpListener::bind(dns_addr)
            .await
            .map_err(bind_error("DNS (TCP)", &dns_addr.to_string()))?;

        let tcp = TcpListener::bind(&config.http.bind_address)
            .await
            .map_err(bind_error("HTTP", &config.http.bind_address))?;
        let http_addr = tcp
            .local_addr()
            .map_err(bind_error("HTTP", &config.http.bind_address))?;

        let admin_listener = if config.admin.enabled {
            let listener = TcpListener::bind(&config.admin.bind_address)
                .await
                .map_err(bind_error("admin API", &config.admin.bind_address))?;
            Some(listener)
        } else {
            None
        };

        let shutdown = Shutdown::new();
        let tracker = InFlightTracker::new();

        let responder = Arc::new(Responder::new(
            source.clone(),
            interfaces,
            config.dns.clone(),
        ));
        let drain_timeout = Duration::from_secs(config.shutdown.drain_timeout_secs);
        let dns_server = DnsServer::new(responder, tracker.clone(), drain_timeout);
        let dns_task = tokio::spawn(dns_server.run(udp, dns_tcp, shutdown.subscribe()));

        let http_server = HttpServer::new(&config, source.clone());
        let http_task = tokio::spawn(http_server.run(tcp, shutdown.subscribe()));

        let mut admin_addr = None;
        let admin_task = match admin_listener {
            Some(listener) => {
                admin_addr = listener.local_addr().ok();
                let state = AdminState::new(&config, source, tracker.clone());
                Some(tokio::spawn(admin::serve(listener, state, shutdown.subscribe())))
            }
            None => None,
        };

        tracing::info!(
            root_domain = %config.root_domain,
            registry = %config.registry.dir.display(),
            dns = %dns_addr,
            http = %http_addr,
            "Proxy started"
        );

        Ok(Running {
            dns_addr,
            http_addr,
            admin_addr,
            shutdown,
            tracker,
            drain_timeout,
            dns_task,
            http_task,
            admin_task,
        })
    }

    /// Start, wait for SIGINT/SIGTERM, then shut down gracefully.
    pub async fn run(self) -> Result<(), LifecycleError> {
        let running = self.start().await?;
        let waited = signals::wait_for_shutdown().await;
        running.stop().await;
        waited.map_err(LifecycleError::Signal)
    }
}

/// Handle to a started proxy.
pub struct Running {
    dns_addr: SocketAddr,
    http_addr: SocketAddr,
    admin_addr: Option<SocketAddr>,
    shutdown: Shutdown,
    tracker: InFlightTracker,
    drain_timeout: Duration,
    dns_task: ServerTask,
    http_task: ServerTask,
    admin_task: Option<ServerTask>,
}

impl Running {
    pub fn dns_addr(&self) -> SocketAddr {
        self.dns_addr
    }

    pub fn http_addr(&self) -> SocketAddr {
        self.http_addr
    }

    pub fn admin_addr(&self) -> Option<SocketAddr> {
        self.admin_addr
    }

    /// Stop accepting, drain in-flight work up to the deadline, release sockets.
    pub async fn stop(self) {
        tracing::info!(drain_timeout = ?self.drain_timeout, "Shutting down");
        self.shutdown.trigger();
        let deadline = Instant::now() + self.drain_timeout;

        // The DNS server drains and aborts its own per-message tasks.
        finish(self.dns_task, "dns", deadline + Duration::from_secs(1)).await;
        if self.tracker.active_count() > 0 {
            tracing::warn!(in_flight = self.tracker.active_count(), "DNS tasks outlived shutdown");
        }

        finish(self.http_task, "http", deadline).await;
        if let Some(task) = self.admin_task {
            finish(task, "admin", deadline).await;
        }

        tracing::info!("Shutdown complete");
    }
}

async fn finish(mut task: ServerTask, server: &'static str, deadline: Instant) {
    match tokio::time::timeout_at(deadline, &mut task).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => tracing::error!(server, error = %e, "Server exited with error"),
        Ok(Err(e)) => tracing::error!(server, error = %e, "Server task failed"),
        Err(_) => {
            tracing::warn!(server, "Drain deadline reached, closing remaining connections");
            task.abort();
        }
    }
}

fn bind_error(what: &'static str, address: &str) -> impl FnOnce(io::Error) -> LifecycleError {
    let address = address.to_string();
    move |source| LifecycleError::Bind {
        what,
        address,
        source,
    }
}

fn parse_addr(what: &'static str, address: &str) -> Result<SocketAddr, LifecycleError> {
    address.parse().map_err(|_| LifecycleError::Address {
        what,
        address: address.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::StaticInterfaces;

    fn local_config(dir: &std::path::Path) -> ProxyConfig {
        let mut config = ProxyConfig::default();
        config.registry.dir = dir.to_path_buf();
        config.dns.bind_address = "127.0.0.1:0".to_string();
        config.http.bind_address = "127.0.0.1:0".to_string();
        config.shutdown.drain_timeout_secs = 1;
        config
    }

    #[tokio::test]
    async fn start_and_stop_release_sockets() {
        let dir = tempfile::tempdir().unwrap();
        let running = Supervisor::new(local_config(dir.path()))
            .with_interfaces(Arc::new(StaticInterfaces(Vec::new())))
            .start()
            .await
            .unwrap();

        let http_addr = running.http_addr();
        assert_ne!(http_addr.port(), 0);
        assert_ne!(running.dns_addr().port(), 0);
        assert!(running.admin_addr().is_none());

        let dns_addr = running.dns_addr();
        running.stop().await;
        assert!(std::net::TcpListener::bind(http_addr).is_ok());
        assert!(std::net::TcpListener::bind(dns_addr).is_ok());
    }

    #[tokio::test]
    async fn bind_failure_names_listener() {
        let dir = tempfile::tempdir().unwrap();
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let mut config = local_config(dir.path());
        config.http.bind_address = taken.local_addr().unwrap().to_string();

        let err = match Supervisor::new(config).start().await {
            Ok(_) => panic!("bind should fail"),
            Err(e) => e,
        };
        assert!(matches!(err, LifecycleError::Bind { what: "HTTP", .. }));
    }
}
