use std::path::PathBuf;

use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

use vhost_proxy::config::loader::load_or_default;
use vhost_proxy::registry::{DirectoryRegistry, DomainSource};

#[derive(Parser)]
#[command(name = "vhost-cli")]
#[command(about = "Manage vhost-proxy domain registrations", long_about = None)]
struct Cli {
    /// Proxy configuration file (registry directory, admin API settings).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Registry directory; overrides the configuration.
    #[arg(short, long)]
    dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a domain on a local port
    Add { domain: String, port: u16 },
    /// Remove a domain registration
    Remove { domain: String },
    /// List registered domains
    List {
        #[arg(long)]
        json: bool,
    },
    /// Query the running proxy's admin API
    Status {
        /// Admin API base URL; defaults to the configured bind address.
        #[arg(short, long)]
        url: Option<String>,

        /// Admin API key; defaults to the configured key.
        #[arg(short, long)]
        key: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_or_default(cli.config.as_deref())?;
    let dir = cli.dir.unwrap_or_else(|| config.registry.dir.clone());
    let registry = DirectoryRegistry::new(dir);

    match cli.command {
        Commands::Add { domain, port } => {
            registry.register(&domain, port).await?;
            println!("{domain} → 127.0.0.1:{port}");
        }
        Commands::Remove { domain } => {
            registry.unregister(&domain).await?;
            println!("Removed {domain}");
        }
        Commands::List { json } => {
            let entries = registry.entries().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else if entries.is_empty() {
                println!("No domains registered in {}", registry.location().display());
            } else {
                for entry in entries {
                    println!("{:<40} {}", entry.domain, entry.port);
                }
            }
        }
        Commands::Status { url, key } => {
            let url = url.unwrap_or_else(|| format!("http://{}", config.admin.bind_address));
            let key = key.unwrap_or(config.admin.api_key);

            let mut headers = HeaderMap::new();
            headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {key}"))?);

            let res = reqwest::Client::new()
                .get(format!("{url}/admin/status"))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
