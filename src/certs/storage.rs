//! On-disk cache for the issued certificate and the ACME account.
//!
//! Layout under `tls.storage_dir`:
//! - `cert.pem`: full chain as returned by the CA
//! - `key.pem`: private key (mode 0600 on unix)
//! - `meta.json`: issuance time and covered names
//! - `account.json`: ACME account credentials

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use instant_acme::AccountCredentials;
use serde::{Deserialize, Serialize};

use crate::certs::CertificateError;

/// Validity period of certificates issued by Let's Encrypt.
pub const CERTIFICATE_LIFETIME: Duration = Duration::from_secs(90 * 24 * 60 * 60);

const CERT_FILE: &str = "cert.pem";
const KEY_FILE: &str = "key.pem";
const META_FILE: &str = "meta.json";
const ACCOUNT_FILE: &str = "account.json";

/// Issuance metadata kept next to the certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateMeta {
    pub issued_at_unix: u64,
    pub domains: Vec<String>,
}

impl CertificateMeta {
    pub fn new(domains: Vec<String>) -> Self {
        Self {
            issued_at_unix: now_unix(),
            domains,
        }
    }

    /// True when this certificate covers exactly `domains` (order ignored).
    pub fn covers(&self, domains: &[String]) -> bool {
        let mut ours = self.domains.clone();
        let mut wanted = domains.to_vec();
        ours.sort();
        ours.dedup();
        wanted.sort();
        wanted.dedup();
        ours == wanted
    }

    /// Unix time after which the certificate should be re-issued.
    pub fn renew_at_unix(&self, renew_before: Duration) -> u64 {
        (self.issued_at_unix + CERTIFICATE_LIFETIME.as_secs()).saturating_sub(renew_before.as_secs())
    }

    pub fn renewal_due(&self, now_unix: u64, renew_before: Duration) -> bool {
        now_unix >= self.renew_at_unix(renew_before)
    }
}

/// Certificate chain and key as PEM text.
#[derive(Debug, Clone)]
pub struct StoredCertificate {
    pub cert_pem: String,
    pub key_pem: String,
    pub meta: CertificateMeta,
}

/// File-backed certificate and account storage.
#[derive(Debug, Clone)]
pub struct CertificateStorage {
    dir: PathBuf,
}

impl CertificateStorage {
    /// Open (and create if needed) the storage directory.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, CertificateError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load the cached certificate. `None` when nothing has been issued yet.
    pub fn load_certificate(&self) -> Result<Option<StoredCertificate>, CertificateError> {
        let cert_path = self.dir.join(CERT_FILE);
        let key_path = self.dir.join(KEY_FILE);
        let meta_path = self.dir.join(META_FILE);
        if !cert_path.exists() || !key_path.exists() || !meta_path.exists() {
            return Ok(None);
        }

        let cert_pem = fs::read_to_string(&cert_path)?;
        let key_pem = fs::read_to_string(&key_path)?;
        let meta: CertificateMeta = serde_json::from_str(&fs::read_to_string(&meta_path)?)
            .map_err(|e| CertificateError::Storage(format!("{}: {}", meta_path.display(), e)))?;

        validate_pem(&cert_pem, &key_pem)?;

        Ok(Some(StoredCertificate {
            cert_pem,
            key_pem,
            meta,
        }))
    }

    pub fn save_certificate(&self, certificate: &StoredCertificate) -> Result<(), CertificateError> {
        validate_pem(&certificate.cert_pem, &certificate.key_pem)?;

        let meta = serde_json::to_string_pretty(&certificate.meta)
            .map_err(|e| CertificateError::Storage(e.to_string()))?;

        fs::write(self.dir.join(CERT_FILE), &certificate.cert_pem)?;
        write_private(&self.dir.join(KEY_FILE), &certificate.key_pem)?;
        fs::write(self.dir.join(META_FILE), meta)?;

        tracing::info!(
            dir = %self.dir.display(),
            domains = ?certificate.meta.domains,
            "Certificate stored"
        );
        Ok(())
    }

    pub fn load_account(&self) -> Result<Option<AccountCredentials>, CertificateError> {
        let path = self.dir.join(ACCOUNT_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| CertificateError::Storage(format!("{}: {}", path.display(), e)))
    }

    pub fn save_account(&self, credentials: &AccountCredentials) -> Result<(), CertificateError> {
        let content = serde_json::to_string_pretty(credentials)
            .map_err(|e| CertificateError::Storage(e.to_string()))?;
        write_private(&self.dir.join(ACCOUNT_FILE), &content)
    }
}

/// Check that the chain holds at least one certificate and the key parses.
pub fn validate_pem(cert_pem: &str, key_pem: &str) -> Result<(), CertificateError> {
    let certs = rustls_pemfile::certs(&mut cert_pem.as_bytes())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| CertificateError::Storage(format!("invalid certificate PEM: {}", e)))?;
    if certs.is_empty() {
        return Err(CertificateError::Storage("no certificate in PEM".into()));
    }

    match rustls_pemfile::private_key(&mut key_pem.as_bytes()) {
        Ok(Some(_)) => Ok(()),
        Ok(None) => Err(CertificateError::Storage("no private key in PEM".into())),
        Err(e) => Err(CertificateError::Storage(format!("invalid key PEM: {}", e))),
    }
}

pub fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn write_private(path: &Path, content: &str) -> Result<(), CertificateError> {
    fs::write(path, content)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}
