//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ports valid)
//! - Check that every service forms a usable backend URL
//! - Report duplicate subdomain labels
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Duplicate labels are legal: the first one in file order wins, so they
//!   are reported as warnings rather than errors

use std::collections::HashSet;
use thiserror::Error;
use url::Url;

use crate::config::schema::{ProxyConfig, ServiceConfig, TlsMode};

/// A single semantic problem in a configuration file.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("domain must not be empty")]
    EmptyDomain,

    #[error("email is required when certificates are issued over ACME")]
    MissingEmail,

    #[error("service #{index}: host must not be empty")]
    EmptyHost { index: usize },

    #[error("service #{index}: port must be between 1 and 65535")]
    InvalidPort { index: usize },

    #[error("service #{index}: subdomain must not be empty")]
    EmptySubdomain { index: usize },

    #[error("service #{index}: subdomain {label:?} must be a single label")]
    DottedSubdomain { index: usize, label: String },

    #[error("service #{index}: http://{host}:{port} is not a valid backend URL")]
    InvalidBackend { index: usize, host: String, port: u16 },

    #[error("{field} must be greater than zero")]
    ZeroTimeout { field: &'static str },
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.domain.trim().is_empty() {
        errors.push(ValidationError::EmptyDomain);
    }

    if config.effective_tls_mode() == TlsMode::Acme && config.email.trim().is_empty() {
        errors.push(ValidationError::MissingEmail);
    }

    for (index, service) in config.services.iter().enumerate() {
        validate_service(index, service, &config.routing.apex_label, &mut errors);
    }

    if config.listener.timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout { field: "listener.timeout_secs" });
    }
    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::ZeroTimeout { field: "timeouts.connect_secs" });
    }
    if config.tls.check_interval_secs == 0 {
        errors.push(ValidationError::ZeroTimeout { field: "tls.check_interval_secs" });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_service(
    index: usize,
    service: &ServiceConfig,
    apex_label: &str,
    errors: &mut Vec<ValidationError>,
) {
    if service.host.trim().is_empty() {
        errors.push(ValidationError::EmptyHost { index });
    } else if Url::parse(&format!("http://{}:{}", service.host, service.port)).is_err() {
        errors.push(ValidationError::InvalidBackend {
            index,
            host: service.host.clone(),
            port: service.port,
        });
    }

    if service.port == 0 {
        errors.push(ValidationError::InvalidPort { index });
    }

    if service.subdomain.is_empty() {
        errors.push(ValidationError::EmptySubdomain { index });
    } else if service.subdomain != apex_label && service.subdomain.contains('.') {
        errors.push(ValidationError::DottedSubdomain {
            index,
            label: service.subdomain.clone(),
        });
    }
}

/// Labels that appear on more than one service, in first-seen order.
pub fn duplicate_labels(config: &ProxyConfig) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    let mut duplicates = Vec::new();
    for service in &config.services {
        if !seen.insert(service.subdomain.as_str()) && reported.insert(service.subdomain.as_str()) {
            duplicates.push(service.subdomain.clone());
        }
    }
    duplicates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(host: &str, port: u16, subdomain: &str) -> ServiceConfig {
        ServiceConfig {
            host: host.into(),
            port,
            subdomain: subdomain.into(),
        }
    }

    #[test]
    fn accepts_minimal_localhost_config() {
        let config = ProxyConfig {
            domain: "localhost".into(),
            services: vec![service("127.0.0.1", 9000, "api")],
            ..Default::default()
        };
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn collects_every_error() {
        let config = ProxyConfig {
            domain: "example.com".into(),
            services: vec![service("", 0, ""), service("10.0.0.1", 80, "a.b")],
            ..Default::default()
        };
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::MissingEmail,
                ValidationError::EmptyHost { index: 0 },
                ValidationError::InvalidPort { index: 0 },
                ValidationError::EmptySubdomain { index: 0 },
                ValidationError::DottedSubdomain { index: 1, label: "a.b".into() },
            ]
        );
    }

    #[test]
    fn apex_label_is_not_a_dotted_label() {
        let mut config = ProxyConfig {
            domain: "localhost".into(),
            services: vec![service("127.0.0.1", 9000, ".")],
            ..Default::default()
        };
        config.routing.apex_label = ".".into();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn rejects_unparseable_backend() {
        let config = ProxyConfig {
            domain: "localhost".into(),
            services: vec![service("bad host", 80, "api")],
            ..Default::default()
        };
        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(errors[0], ValidationError::InvalidBackend { index: 0, .. }));
    }

    #[test]
    fn reports_duplicates_once() {
        let config = ProxyConfig {
            services: vec![
                service("127.0.0.1", 1, "api"),
                service("127.0.0.1", 2, "api"),
                service("127.0.0.1", 3, "api"),
                service("127.0.0.1", 4, "web"),
            ],
            ..Default::default()
        };
        assert_eq!(duplicate_labels(&config), vec!["api".to_string()]);
    }
}
