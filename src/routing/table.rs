//! Compiled routing table.
//!
//! # Design Decisions
//! - Built once per configuration load, never per request
//! - Label index gives O(1) lookup; the first service with a given label
//!   owns the index slot, so configuration order decides ties
//! - The apex route has its own slot, again first-wins

use std::borrow::Cow;
use std::collections::HashMap;

use crate::config::{ProxyConfig, RoutingConfig};
use crate::routing::host;
use crate::routing::route::ServiceRoute;

/// Result of resolving a host against the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Forward to this backend.
    Matched(ServiceRoute),
    /// Host has no subdomain and no apex route exists: show the dashboard.
    Dashboard,
    /// No service handles this host.
    NotFound,
}

/// Ordered routes plus the lookup structures derived from them.
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    routes: Vec<ServiceRoute>,
    by_label: HashMap<String, usize>,
    apex: Option<usize>,
    options: RoutingConfig,
}

impl RoutingTable {
    /// Build a table from routes in precedence order.
    pub fn new(routes: Vec<ServiceRoute>, options: RoutingConfig) -> Self {
        let mut by_label = HashMap::with_capacity(routes.len());
        let mut apex = None;

        for (idx, route) in routes.iter().enumerate() {
            by_label.entry(route.subdomain_label.clone()).or_insert(idx);
            if apex.is_none() && route.subdomain_label == options.apex_label {
                apex = Some(idx);
            }
        }

        Self {
            routes,
            by_label,
            apex,
            options,
        }
    }

    pub fn from_config(config: &ProxyConfig) -> Self {
        let routes = config.services.iter().map(ServiceRoute::from_config).collect();
        Self::new(routes, config.routing.clone())
    }

    /// Routes in configuration order.
    pub fn routes(&self) -> &[ServiceRoute] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// The route serving hosts without a subdomain, if any.
    pub fn apex(&self) -> Option<&ServiceRoute> {
        self.apex.map(|idx| &self.routes[idx])
    }

    /// First route configured with this exact label.
    pub fn lookup(&self, label: &str) -> Option<&ServiceRoute> {
        self.by_label.get(label).map(|&idx| &self.routes[idx])
    }

    pub fn options(&self) -> &RoutingConfig {
        &self.options
    }

    /// Resolve a request host.
    ///
    /// The host is split on `.`. Fewer than two labels selects the apex
    /// route, or the dashboard when there is none. Otherwise the first label
    /// is compared exactly against the configured labels.
    pub fn resolve(&self, raw_host: &str) -> RouteOutcome {
        let candidate: Cow<'_, str> = if self.options.strip_trailing_dot {
            match host::strip_trailing_dot(raw_host) {
                Some(stripped) => Cow::Owned(stripped),
                None => Cow::Borrowed(raw_host),
            }
        } else {
            Cow::Borrowed(raw_host)
        };

        if self.options.ip_hosts_as_apex && host::is_ip_literal(host::split_port(&candidate).0) {
            return self.resolve_apex();
        }

        let mut labels = candidate.split('.');
        let first = labels.next().unwrap_or_default();
        if labels.next().is_none() {
            return self.resolve_apex();
        }

        match self.lookup(first) {
            Some(route) => RouteOutcome::Matched(route.clone()),
            None => RouteOutcome::NotFound,
        }
    }

    fn resolve_apex(&self) -> RouteOutcome {
        match self.apex() {
            Some(route) => RouteOutcome::Matched(route.clone()),
            None => RouteOutcome::Dashboard,
        }
    }
}
