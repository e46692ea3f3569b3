//! ACME protocol client.
//!
//! # Responsibilities
//! - Load or register the ACME account
//! - Run one HTTP-01 order for a set of names
//! - Generate the key pair and CSR, download the chain
//!
//! # Design Decisions
//! - Terms of service are accepted programmatically
//! - Challenge tokens are published in the shared [`ChallengeStore`] and
//!   removed again once the order is settled, whatever the outcome
//! - Polling uses capped exponential backoff and gives up after a fixed
//!   number of attempts

use instant_acme::{
    Account, AuthorizationStatus, ChallengeType, Identifier, NewAccount, NewOrder, Order,
    OrderStatus,
};
use rcgen::{CertificateParams, DistinguishedName, KeyPair};

use crate::certs::backoff::{poll_delay, MAX_POLLS};
use crate::certs::challenge::ChallengeStore;
use crate::certs::storage::{CertificateMeta, CertificateStorage, StoredCertificate};
use crate::certs::CertificateError;

/// Production Let's Encrypt directory.
pub const LETS_ENCRYPT_PRODUCTION: &str = "https://acme-v02.api.letsencrypt.org/directory";

/// An ACME account bound to a directory.
pub struct AcmeClient {
    account: Account,
    challenges: ChallengeStore,
}

impl AcmeClient {
    /// Reuse the stored account or register a new one.
    pub async fn connect(
        storage: &CertificateStorage,
        email: &str,
        directory_url: &str,
        challenges: ChallengeStore,
    ) -> Result<Self, CertificateError> {
        let account = match storage.load_account()? {
            Some(credentials) => {
                tracing::debug!("Using stored ACME account");
                Account::from_credentials(credentials).await?
            }
            None => {
                let contact = format!("mailto:{}", email);
                let (account, credentials) = Account::create(
                    &NewAccount {
                        contact: &[&contact],
                        terms_of_service_agreed: true,
                        only_return_existing: false,
                    },
                    directory_url,
                    None,
                )
                .await?;
                storage.save_account(&credentials)?;
                tracing::info!(directory = %directory_url, email = %email, "Registered ACME account");
                account
            }
        };

        Ok(Self {
            account,
            challenges,
        })
    }

    /// Obtain a certificate covering `domains`.
    pub async fn issue(&self, domains: &[String]) -> Result<StoredCertificate, CertificateError> {
        tracing::info!(domains = ?domains, "Requesting certificate");

        let identifiers: Vec<Identifier> = domains
            .iter()
            .map(|name| Identifier::Dns(name.clone()))
            .collect();
        let mut order = self
            .account
            .new_order(&NewOrder {
                identifiers: &identifiers,
            })
            .await?;

        let mut tokens = Vec::new();
        let result = self.authorize_and_finalize(&mut order, domains, &mut tokens).await;

        for token in &tokens {
            self.challenges.remove(token);
        }
        result
    }

    async fn authorize_and_finalize(
        &self,
        order: &mut Order,
        domains: &[String],
        tokens: &mut Vec<String>,
    ) -> Result<StoredCertificate, CertificateError> {
        let authorizations = order.authorizations().await?;
        let mut ready = Vec::new();

        for authorization in &authorizations {
            match &authorization.status {
                AuthorizationStatus::Pending => {}
                AuthorizationStatus::Valid => continue,
                status => {
                    return Err(CertificateError::Order(format!(
                        "authorization in unexpected state {:?}",
                        status
                    )))
                }
            }

            let challenge = authorization
                .challenges
                .iter()
                .find(|c| c.r#type == ChallengeType::Http01)
                .ok_or_else(|| CertificateError::Order("CA offered no http-01 challenge".into()))?;

            let key_authorization = order.key_authorization(challenge);
            self.challenges
                .insert(&challenge.token, key_authorization.as_str());
            tokens.push(challenge.token.clone());
            ready.push(challenge.url.clone());
        }

        for url in &ready {
            order.set_challenge_ready(url).await?;
        }

        self.wait_until_ready(order).await?;

        let key_pair = KeyPair::generate()?;
        let mut params = CertificateParams::new(domains.to_vec())?;
        params.distinguished_name = DistinguishedName::new();
        let csr = params.serialize_request(&key_pair)?;

        order.finalize(csr.der()).await?;

        let chain = self.wait_for_certificate(order).await?;
        tracing::info!(domains = ?domains, "Certificate issued");

        Ok(StoredCertificate {
            cert_pem: chain,
            key_pem: key_pair.serialize_pem(),
            meta: CertificateMeta::new(domains.to_vec()),
        })
    }

    async fn wait_until_ready(&self, order: &mut Order) -> Result<(), CertificateError> {
        for attempt in 1..=MAX_POLLS {
            tokio::time::sleep(poll_delay(attempt)).await;
            let state = order.refresh().await?;
            match &state.status {
                OrderStatus::Ready | OrderStatus::Valid => return Ok(()),
                OrderStatus::Invalid => {
                    return Err(CertificateError::Order(
                        "order became invalid; challenge validation failed".into(),
                    ))
                }
                status => tracing::debug!(attempt, status = ?status, "Order not ready"),
            }
        }
        Err(CertificateError::Order(format!(
            "order not ready after {} polls",
            MAX_POLLS
        )))
    }

    async fn wait_for_certificate(&self, order: &mut Order) -> Result<String, CertificateError> {
        for attempt in 1..=MAX_POLLS {
            if let Some(chain) = order.certificate().await? {
                return Ok(chain);
            }
            tokio::time::sleep(poll_delay(attempt)).await;
        }
        Err(CertificateError::Order(format!(
            "certificate not available after {} polls",
            MAX_POLLS
        )))
    }
}
