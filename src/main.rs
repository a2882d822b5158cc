//! vhost-proxy daemon.
//!
//! ```text
//!     DNS query for svc.localhost ──▶ dns::Responder ──▶ A record (local interface)
//!                                          │
//!                                          ├── registry (port files)
//!                                          │
//!     HTTP Host: svc.localhost ─────▶ http::HttpServer ──▶ 127.0.0.1:<port>
//! ```

use std::path::PathBuf;

use clap::Parser;

use vhost_proxy::config::loader::load_or_default;
use vhost_proxy::observability::logging;
use vhost_proxy::Supervisor;

#[derive(Parser)]
#[command(name = "vhost-proxy")]
#[command(about = "DNS and HTTP virtual hosts for local development services", long_about = None)]
struct Cli {
    /// TOML configuration file; defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();
    let config = load_or_default(cli.config.as_deref())?;

    logging::init(&config.observability)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        root_domain = %config.root_domain,
        registry = %config.registry.dir.display(),
        registry_mode = ?config.registry.mode,
        dns = %config.dns.bind_address,
        http = %config.http.bind_address,
        "vhost-proxy starting"
    );

    Supervisor::new(config).run().await?;
    Ok(())
}
