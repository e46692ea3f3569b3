//! Startup orchestration helpers.
//!
//! # Design Decisions
//! - Fail fast: configuration and certificate errors are fatal
//! - Listeners start last (traffic only when ready)

use std::fmt::Write;

use crate::certs::certificate_domains;
use crate::config::{ProxyConfig, TlsMode};
use crate::routing::RoutingTable;

/// Log the startup banner: main domain, service count and serving mode.
pub fn log_banner(config: &ProxyConfig) {
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        domain = %config.domain,
        services = config.services.len(),
        mode = %config.effective_tls_mode(),
        "Proxit starting"
    );
}

/// Address the proxy itself listens on for the given mode.
pub fn proxy_address(config: &ProxyConfig) -> &str {
    match config.effective_tls_mode() {
        TlsMode::Acme => &config.listener.https_address,
        TlsMode::Plaintext | TlsMode::Auto => &config.listener.http_address,
    }
}

/// Human-readable summary printed by `--check`.
pub fn describe(config: &ProxyConfig) -> String {
    let table = RoutingTable::from_config(config);
    let mode = config.effective_tls_mode();
    let mut out = String::new();

    let _ = writeln!(out, "domain:  {}", config.domain);
    let _ = writeln!(out, "mode:    {}", mode);
    let _ = writeln!(out, "listen:  {}", proxy_address(config));
    let _ = writeln!(out, "routes:");

    match table.apex() {
        Some(route) => {
            let _ = writeln!(out, "  {} -> {}", config.domain, route.target());
        }
        None => {
            let _ = writeln!(out, "  {} -> dashboard", config.domain);
        }
    }
    for route in table.routes() {
        if route.subdomain_label == config.routing.apex_label {
            continue;
        }
        let owner = table.lookup(&route.subdomain_label);
        let shadowed = owner.map_or(false, |first| !std::ptr::eq(first, route));
        let _ = writeln!(
            out,
            "  {}.{} -> {}{}",
            route.subdomain_label,
            config.domain,
            route.target(),
            if shadowed { " (shadowed)" } else { "" }
        );
    }

    if mode == TlsMode::Acme {
        let _ = writeln!(out, "certificate names:");
        for name in certificate_domains(config) {
            let _ = writeln!(out, "  {}", name);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;

    fn service(port: u16, subdomain: &str) -> ServiceConfig {
        ServiceConfig {
            host: "127.0.0.1".into(),
            port,
            subdomain: subdomain.into(),
        }
    }

    #[test]
    fn plaintext_summary() {
        let config = ProxyConfig {
            services: vec![service(9000, "api"), service(9001, "api")],
            ..Default::default()
        };
        let text = describe(&config);

        assert!(text.contains("mode:    plaintext"));
        assert!(text.contains("listen:  0.0.0.0:80"));
        assert!(text.contains("localhost -> dashboard"));
        assert!(text.contains("api.localhost -> http://127.0.0.1:9000\n"));
        assert!(text.contains("api.localhost -> http://127.0.0.1:9001 (shadowed)"));
        assert!(!text.contains("certificate names"));
    }

    #[test]
    fn acme_summary_lists_names() {
        let config = ProxyConfig {
            domain: "example.com".into(),
            email: "ops@example.com".into(),
            services: vec![service(9000, "/"), service(9001, "web")],
            ..Default::default()
        };
        let text = describe(&config);

        assert!(text.contains("mode:    acme"));
        assert!(text.contains("listen:  0.0.0.0:443"));
        assert!(text.contains("  example.com -> http://127.0.0.1:9000"));
        assert!(text.contains("certificate names:\n  example.com\n  web.example.com\n"));
    }
}
