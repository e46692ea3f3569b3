//! Configuration schema definitions.
//!
//! The three top-level fields `email`, `domain` and `services` form the
//! service file format. Everything else is optional and defaulted so that a
//! bare service file keeps working.

use serde::{Deserialize, Serialize};

/// Root domain value that selects plaintext serving in `auto` TLS mode.
pub const LOCALHOST_DOMAIN: &str = "localhost";

/// Root configuration for the proxy.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ProxyConfig {
    /// Contact address registered with the certificate authority.
    pub email: String,

    /// Root domain. Service `subdomain` labels hang off this.
    pub domain: String,

    /// Backend services, in precedence order.
    pub services: Vec<ServiceConfig>,

    /// Certificate provisioning.
    pub tls: TlsConfig,

    /// Listener addresses and timeouts.
    pub listener: ListenerConfig,

    /// Backend timeouts.
    pub timeouts: TimeoutConfig,

    /// Host matching options.
    pub routing: RoutingConfig,

    /// Error page options.
    pub errors: ErrorPageConfig,

    /// Gzip responses for clients that accept it.
    pub compression: bool,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            email: String::new(),
            domain: LOCALHOST_DOMAIN.to_string(),
            services: Vec::new(),
            tls: TlsConfig::default(),
            listener: ListenerConfig::default(),
            timeouts: TimeoutConfig::default(),
            routing: RoutingConfig::default(),
            errors: ErrorPageConfig::default(),
            compression: true,
            observability: ObservabilityConfig::default(),
        }
    }
}

impl ProxyConfig {
    /// Serving mode after resolving `auto`.
    pub fn effective_tls_mode(&self) -> TlsMode {
        match self.tls.mode {
            TlsMode::Auto if self.domain == LOCALHOST_DOMAIN => TlsMode::Plaintext,
            TlsMode::Auto => TlsMode::Acme,
            mode => mode,
        }
    }
}

/// One backend service.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Backend host name or address.
    pub host: String,

    /// Backend port.
    pub port: u16,

    /// First host label routed here, or the apex label.
    pub subdomain: String,
}

/// How certificates are provisioned.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TlsMode {
    /// Plaintext for `domain: localhost`, ACME for anything else.
    #[default]
    Auto,
    /// Plain HTTP only, no certificate automation.
    Plaintext,
    /// HTTPS with certificates issued over ACME.
    Acme,
}

impl std::fmt::Display for TlsMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TlsMode::Auto => write!(f, "auto"),
            TlsMode::Plaintext => write!(f, "plaintext"),
            TlsMode::Acme => write!(f, "acme"),
        }
    }
}

/// Certificate provisioning configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TlsConfig {
    pub mode: TlsMode,

    /// Directory holding issued certificates and account credentials.
    pub storage_dir: String,

    /// ACME directory URL. Production Let's Encrypt when unset.
    pub directory_url: Option<String>,

    /// Re-issue once the certificate is this close to expiry.
    pub renew_before_days: u64,

    /// How often the renewal task checks the certificate.
    pub check_interval_secs: u64,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            mode: TlsMode::Auto,
            storage_dir: "./certs".to_string(),
            directory_url: None,
            renew_before_days: 30,
            check_interval_secs: 12 * 60 * 60,
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Plaintext listener, also the ACME challenge listener in TLS mode.
    pub http_address: String,

    /// HTTPS listener.
    pub https_address: String,

    /// Read, write, header and idle deadline in seconds.
    pub timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            http_address: "0.0.0.0:80".to_string(),
            https_address: "0.0.0.0:443".to_string(),
            timeout_secs: 90,
        }
    }
}

/// Timeout configuration for backend connections.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { connect_secs: 30 }
    }
}

/// Host matching options.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RoutingConfig {
    /// Service label that marks the apex route.
    pub apex_label: String,

    /// Treat hosts that are IP addresses as having no subdomain.
    pub ip_hosts_as_apex: bool,

    /// Drop one trailing `.` from the host name before splitting.
    pub strip_trailing_dot: bool,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            apex_label: "/".to_string(),
            ip_hosts_as_apex: false,
            strip_trailing_dot: false,
        }
    }
}

/// Error page configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ErrorPageConfig {
    /// Show the raw backend transport error on 503 pages.
    pub expose_backend_errors: bool,
}

impl Default for ErrorPageConfig {
    fn default() -> Self {
        Self {
            expose_backend_errors: true,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus endpoint.
    pub metrics_enabled: bool,

    /// Prometheus endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
