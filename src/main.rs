//! Proxit reverse proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──▶ listener (HTTP, or HTTPS in ACME mode)
//!                  │
//!                  ▼
//!              http::server ── middleware (trace, timeout, request id,
//!                  │             Server header, gzip, panic recovery)
//!                  ▼
//!              routing::Router ── first host label → ServiceRoute
//!                  │
//!        ┌─────────┼──────────────┐
//!        ▼         ▼              ▼
//!   forward.rs  dashboard       404 page
//!        │
//!        ▼
//!     Backend (plain HTTP/1.1)
//!
//!   certs: plaintext | ACME (challenge listener on :80, renewal task)
//!   config: services.yml, hot-reloaded into the routing table
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use proxit::certs::{select_provisioner, CertificateError, ServingMode};
use proxit::config::{load_config, ConfigWatcher};
use proxit::lifecycle::{signals, startup, Shutdown};
use proxit::observability::{logging, metrics};
use proxit::{HttpServer, ProxyError};

/// Host-based reverse proxy with automatic TLS.
#[derive(Debug, Parser)]
#[command(name = "proxit", version, about)]
struct Args {
    /// Service file (YAML, or TOML with a .toml extension).
    #[arg(short, long, env = "PROXIT_CONFIG", default_value = "services.yml")]
    config: PathBuf,

    /// Log level; overrides the configured one. RUST_LOG wins over both.
    #[arg(short, long)]
    log_level: Option<String>,

    /// Validate the configuration, print the routes and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let loaded = load_config(&args.config);
    let level = args
        .log_level
        .clone()
        .or_else(|| loaded.as_ref().ok().map(|c| c.observability.log_level.clone()))
        .unwrap_or_else(|| "info".to_string());
    logging::init_logging(&level);

    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(path = %args.config.display(), error = %e, "Failed to load configuration");
            return Err(e.into());
        }
    };

    if args.check {
        print!("{}", startup::describe(&config));
        return Ok(());
    }

    startup::log_banner(&config);

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    let (watcher, config_updates) = ConfigWatcher::new(&args.config);
    let _watcher = match watcher.run() {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            tracing::warn!(error = %e, "Config hot reload disabled");
            None
        }
    };

    let provisioner = select_provisioner(&config);
    tracing::info!(provisioner = provisioner.name(), "Provisioning certificates");
    let mode = match provisioner.provision(&shutdown).await {
        Ok(mode) => mode,
        Err(e) => fatal(e),
    };

    let server = HttpServer::new(config.clone());
    match mode {
        ServingMode::Plaintext => {
            let listener = TcpListener::bind(&config.listener.http_address).await?;
            server
                .run(listener, config_updates, shutdown.subscribe())
                .await?;
        }
        ServingMode::Tls(tls) => {
            let addr: SocketAddr = match config.listener.https_address.parse() {
                Ok(addr) => addr,
                Err(e) => fatal(CertificateError::Tls(format!(
                    "invalid https_address {:?}: {}",
                    config.listener.https_address, e
                ))),
            };
            if let Err(source) = server
                .run_tls(addr, tls, config_updates, shutdown.subscribe())
                .await
            {
                fatal(CertificateError::Bind {
                    address: addr.to_string(),
                    source,
                });
            }
        }
    }

    shutdown.trigger();
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Certificate bootstrap failed: log and exit with status 1.
fn fatal(error: CertificateError) -> ! {
    let error = ProxyError::from(error);
    tracing::error!(error = %error, "Cannot serve HTTPS, exiting");
    std::process::exit(1);
}
