//! Background certificate renewal.

use std::sync::Arc;
use std::time::Duration;

use axum_server::tls_rustls::RustlsConfig;
use tokio::sync::broadcast;

use crate::certs::client::AcmeClient;
use crate::certs::storage::{now_unix, CertificateStorage};
use crate::certs::CertificateError;

/// What a renewal check did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenewalOutcome {
    NotDue,
    Renewed,
}

/// Re-issues the certificate ahead of expiry and hot-swaps it into the
/// running listener.
pub struct RenewalScheduler {
    client: Arc<AcmeClient>,
    storage: CertificateStorage,
    tls: RustlsConfig,
    domains: Vec<String>,
    renew_before: Duration,
    check_interval: Duration,
}

impl RenewalScheduler {
    pub fn new(
        client: Arc<AcmeClient>,
        storage: CertificateStorage,
        tls: RustlsConfig,
        domains: Vec<String>,
        renew_before: Duration,
        check_interval: Duration,
    ) -> Self {
        Self {
            client,
            storage,
            tls,
            domains,
            renew_before,
            check_interval,
        }
    }

    /// Check on every interval until shutdown. Failures are logged and
    /// retried on the next tick.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.check_interval);
        // The first tick completes immediately; startup already issued.
        ticker.tick().await;

        tracing::info!(
            interval_secs = self.check_interval.as_secs(),
            "Certificate renewal scheduler started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.check().await {
                        Ok(RenewalOutcome::Renewed) => {
                            tracing::info!(domains = ?self.domains, "Certificate renewed");
                        }
                        Ok(RenewalOutcome::NotDue) => {
                            tracing::debug!("Certificate not due for renewal");
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Certificate renewal failed, will retry");
                        }
                    }
                }
                _ = shutdown.recv() => {
                    tracing::debug!("Renewal scheduler stopping");
                    break;
                }
            }
        }
    }

    /// Renew now if the cached certificate is due or missing.
    pub async fn check(&self) -> Result<RenewalOutcome, CertificateError> {
        if let Some(current) = self.storage.load_certificate()? {
            if current.meta.covers(&self.domains)
                && !current.meta.renewal_due(now_unix(), self.renew_before)
            {
                return Ok(RenewalOutcome::NotDue);
            }
        }

        let issued = self.client.issue(&self.domains).await?;
        self.storage.save_certificate(&issued)?;
        self.tls
            .reload_from_pem(issued.cert_pem.into_bytes(), issued.key_pem.into_bytes())
            .await
            .map_err(|e| CertificateError::Tls(e.to_string()))?;
        Ok(RenewalOutcome::Renewed)
    }
}
