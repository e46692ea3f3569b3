//! A single backend route.

use crate::config::ServiceConfig;

/// Association between a subdomain label and a backend `host:port`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceRoute {
    pub host: String,
    pub port: u16,
    pub subdomain_label: String,
}

impl ServiceRoute {
    pub fn new(host: impl Into<String>, port: u16, subdomain_label: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            subdomain_label: subdomain_label.into(),
        }
    }

    pub fn from_config(service: &ServiceConfig) -> Self {
        Self::new(service.host.clone(), service.port, service.subdomain.clone())
    }

    /// Backend authority, `host:port`. IPv6 literals are bracketed.
    pub fn authority(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Backend base URL. Backends are always spoken to over plain HTTP.
    pub fn target(&self) -> String {
        format!("http://{}", self.authority())
    }
}

impl std::fmt::Display for ServiceRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.subdomain_label, self.target())
    }
}
