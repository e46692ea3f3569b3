//! Certificate provisioning subsystem.
//!
//! # Data Flow
//! ```text
//! ProxyConfig (tls.mode resolved once at startup)
//!     → plaintext: noop.rs → ServingMode::Plaintext
//!     → acme:      acme.rs
//!                    → challenge.rs (HTTP-01 tokens + https redirect on :80)
//!                    → storage.rs (cached cert/key/account)
//!                    → client.rs (order, authorize, finalize)
//!                    → ServingMode::Tls(RustlsConfig)
//!                    → renewal.rs (periodic re-issue, hot reload)
//! ```
//!
//! # Design Decisions
//! - The mode is chosen once; configuration reloads never switch it
//! - Bootstrap failures are fatal to the caller, renewal failures are not
//! - One certificate covers the root domain and every service subdomain

pub mod acme;
pub mod backoff;
pub mod challenge;
pub mod client;
pub mod noop;
pub mod renewal;
pub mod storage;

use async_trait::async_trait;
use axum_server::tls_rustls::RustlsConfig;
use thiserror::Error;

use crate::config::{ProxyConfig, TlsMode};
use crate::lifecycle::Shutdown;

pub use acme::AcmeProvisioner;
pub use challenge::ChallengeStore;
pub use client::AcmeClient;
pub use noop::NoopProvisioner;
pub use renewal::RenewalScheduler;
pub use storage::CertificateStorage;

/// Errors raised while obtaining or loading certificates.
#[derive(Debug, Error)]
pub enum CertificateError {
    #[error("ACME protocol error: {0}")]
    Acme(#[from] instant_acme::Error),

    #[error("failed to build certificate request: {0}")]
    Csr(#[from] rcgen::Error),

    #[error("certificate storage: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("order failed: {0}")]
    Order(String),

    #[error("TLS configuration: {0}")]
    Tls(String),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
}

/// How the proxy listener is served.
#[derive(Clone)]
pub enum ServingMode {
    /// Plain HTTP on `listener.http_address`.
    Plaintext,
    /// HTTPS on `listener.https_address` with this (reloadable) config.
    Tls(RustlsConfig),
}

impl std::fmt::Debug for ServingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServingMode::Plaintext => write!(f, "Plaintext"),
            ServingMode::Tls(_) => write!(f, "Tls"),
        }
    }
}

/// Produces the serving mode for the proxy listener.
///
/// Implementations may start background tasks (challenge listener, renewal)
/// that live until `shutdown` fires.
#[async_trait]
pub trait CertificateProvisioner: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    async fn provision(&self, shutdown: &Shutdown) -> Result<ServingMode, CertificateError>;
}

/// Pick the provisioner for the configured TLS mode.
pub fn select_provisioner(config: &ProxyConfig) -> Box<dyn CertificateProvisioner> {
    match config.effective_tls_mode() {
        TlsMode::Acme => Box::new(AcmeProvisioner::new(config.clone())),
        TlsMode::Plaintext | TlsMode::Auto => Box::new(NoopProvisioner),
    }
}

/// Names the certificate must cover: the root domain, then one
/// `label.domain` per service in configuration order, without duplicates.
/// Apex-label services are covered by the root domain.
pub fn certificate_domains(config: &ProxyConfig) -> Vec<String> {
    let mut domains = vec![config.domain.clone()];
    for service in &config.services {
        if service.subdomain == config.routing.apex_label {
            continue;
        }
        let name = format!("{}.{}", service.subdomain, config.domain);
        if !domains.contains(&name) {
            domains.push(name);
        }
    }
    domains
}
