//! Automatic certificates over ACME (HTTP-01).
//!
//! # Bootstrap order
//! 1. Bind the challenge listener on `listener.http_address`
//! 2. Load or register the ACME account
//! 3. Reuse the cached certificate if it covers the current names and is
//!    not due, otherwise issue a new one
//! 4. Build the rustls config (ALPN h2 + http/1.1)
//! 5. Start the renewal scheduler
//!
//! Any error in 1-4 is returned to the caller and is fatal there.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;

use crate::certs::challenge::{challenge_router, ChallengeStore};
use crate::certs::client::{AcmeClient, LETS_ENCRYPT_PRODUCTION};
use crate::certs::renewal::RenewalScheduler;
use crate::certs::storage::{now_unix, CertificateStorage, StoredCertificate};
use crate::certs::{certificate_domains, CertificateError, CertificateProvisioner, ServingMode};
use crate::config::ProxyConfig;
use crate::lifecycle::Shutdown;

const DAY_SECS: u64 = 24 * 60 * 60;

pub struct AcmeProvisioner {
    config: ProxyConfig,
}

impl AcmeProvisioner {
    pub fn new(config: ProxyConfig) -> Self {
        Self { config }
    }

    fn directory_url(&self) -> &str {
        self.config
            .tls
            .directory_url
            .as_deref()
            .unwrap_or(LETS_ENCRYPT_PRODUCTION)
    }

    fn renew_before(&self) -> Duration {
        Duration::from_secs(self.config.tls.renew_before_days * DAY_SECS)
    }

    async fn start_challenge_listener(
        &self,
        store: ChallengeStore,
        shutdown: &Shutdown,
    ) -> Result<(), CertificateError> {
        let address = self.config.listener.http_address.clone();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| CertificateError::Bind {
                address: address.clone(),
                source,
            })?;

        tracing::info!(address = %address, "ACME challenge listener started");

        let mut stop = shutdown.subscribe();
        tokio::spawn(async move {
            let served = axum::serve(listener, challenge_router(store))
                .with_graceful_shutdown(async move {
                    let _ = stop.recv().await;
                })
                .await;
            if let Err(e) = served {
                tracing::error!(error = %e, "ACME challenge listener failed");
            }
        });
        Ok(())
    }

    async fn current_certificate(
        &self,
        client: &AcmeClient,
        storage: &CertificateStorage,
        domains: &[String],
    ) -> Result<StoredCertificate, CertificateError> {
        if let Some(cached) = storage.load_certificate()? {
            if cached.meta.covers(domains)
                && !cached.meta.renewal_due(now_unix(), self.renew_before())
            {
                tracing::info!(
                    dir = %storage.dir().display(),
                    "Using cached certificate"
                );
                return Ok(cached);
            }
            tracing::info!("Cached certificate is stale or covers other names");
        }

        let issued = client.issue(domains).await?;
        storage.save_certificate(&issued)?;
        Ok(issued)
    }
}

#[async_trait]
impl CertificateProvisioner for AcmeProvisioner {
    fn name(&self) -> &'static str {
        "acme"
    }

    async fn provision(&self, shutdown: &Shutdown) -> Result<ServingMode, CertificateError> {
        let domains = certificate_domains(&self.config);
        tracing::info!(
            domains = ?domains,
            directory = %self.directory_url(),
            "Starting certificate automation"
        );

        let store = ChallengeStore::new();
        self.start_challenge_listener(store.clone(), shutdown).await?;

        let storage = CertificateStorage::open(&self.config.tls.storage_dir)?;
        let client = Arc::new(
            AcmeClient::connect(&storage, &self.config.email, self.directory_url(), store).await?,
        );

        let certificate = self.current_certificate(&client, &storage, &domains).await?;

        install_crypto_provider();
        let tls = RustlsConfig::from_pem(
            certificate.cert_pem.into_bytes(),
            certificate.key_pem.into_bytes(),
        )
        .await
        .map_err(|e| CertificateError::Tls(e.to_string()))?;

        let scheduler = RenewalScheduler::new(
            client,
            storage,
            tls.clone(),
            domains,
            self.renew_before(),
            Duration::from_secs(self.config.tls.check_interval_secs),
        );
        tokio::spawn(scheduler.run(shutdown.subscribe()));

        Ok(ServingMode::Tls(tls))
    }
}

/// Select ring as the process-wide rustls provider. A provider installed
/// earlier is kept.
fn install_crypto_provider() {
    let _ = rustls::crypto::ring::default_provider().install_default();
}
