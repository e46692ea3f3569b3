//! Error taxonomy for the request path and startup.
//!
//! # Design Decisions
//! - Each subsystem owns its error enum; this module holds the ones that
//!   cross subsystem boundaries
//! - No variant is ever retried: a proxied request makes one attempt and
//!   certificate bootstrap runs once

use axum::http::StatusCode;
use thiserror::Error;

use crate::certs::CertificateError;

/// Errors surfaced while serving a request or starting the proxy.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// No configured service matches the request host.
    #[error("no service configured for host {host:?}")]
    RouteNotFound { host: String },

    /// The resolved backend could not be reached.
    #[error("backend {backend} unavailable: {message}")]
    BackendUnavailable { backend: String, message: String },

    /// TLS listener or ACME automation could not start. Always fatal.
    #[error("certificate bootstrap failed: {0}")]
    CertificateBootstrap(#[from] CertificateError),
}

impl ProxyError {
    /// Status code of the page rendered for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            ProxyError::BackendUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ProxyError::CertificateBootstrap(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Render an error and its full source chain on one line.
///
/// Client errors from hyper only say "client error (Connect)" at the top
/// level; the useful part ("connection refused") lives in the sources.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        let text = inner.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = inner.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[derive(Debug)]
    struct Outer(std::io::Error);

    impl fmt::Display for Outer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "client error (Connect)")
        }
    }

    impl std::error::Error for Outer {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn chain_includes_sources() {
        let err = Outer(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "connection refused",
        ));
        assert_eq!(error_chain(&err), "client error (Connect): connection refused");
    }

    #[test]
    fn status_mapping() {
        let not_found = ProxyError::RouteNotFound { host: "x.localhost".into() };
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let unavailable = ProxyError::BackendUnavailable {
            backend: "127.0.0.1:9000".into(),
            message: "refused".into(),
        };
        assert_eq!(unavailable.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
