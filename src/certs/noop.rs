//! Plaintext serving, no certificate automation.

use async_trait::async_trait;

use crate::certs::{CertificateError, CertificateProvisioner, ServingMode};
use crate::lifecycle::Shutdown;

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProvisioner;

#[async_trait]
impl CertificateProvisioner for NoopProvisioner {
    fn name(&self) -> &'static str {
        "plaintext"
    }

    async fn provision(&self, _shutdown: &Shutdown) -> Result<ServingMode, CertificateError> {
        tracing::info!("TLS disabled, serving plain HTTP");
        Ok(ServingMode::Plaintext)
    }
}
