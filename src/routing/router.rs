//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Hold the current routing table snapshot
//! - Resolve a request host to a route, the dashboard, or no match
//! - Swap in a new table when configuration reloads
//!
//! # Design Decisions
//! - Readers load the snapshot lock-free; a reload replaces it atomically
//! - In-flight requests keep the snapshot they started with
//! - Explicit NotFound rather than silent default

use std::sync::Arc;
use arc_swap::ArcSwap;

use crate::config::ProxyConfig;
use crate::routing::table::{RouteOutcome, RoutingTable};

/// Shared, reloadable router.
#[derive(Debug)]
pub struct Router {
    table: ArcSwap<RoutingTable>,
}

impl Router {
    pub fn new(table: RoutingTable) -> Self {
        Self {
            table: ArcSwap::from_pointee(table),
        }
    }

    /// Compile a router from configuration.
    pub fn from_config(config: &ProxyConfig) -> Self {
        Self::new(RoutingTable::from_config(config))
    }

    /// Current table snapshot.
    pub fn table(&self) -> Arc<RoutingTable> {
        self.table.load_full()
    }

    /// Resolve a host against the current snapshot.
    pub fn resolve(&self, host: &str) -> RouteOutcome {
        self.table.load().resolve(host)
    }

    /// Replace the table with one built from `config`.
    pub fn reload(&self, config: &ProxyConfig) {
        let table = RoutingTable::from_config(config);
        tracing::info!(services = table.len(), "Routing table reloaded");
        self.table.store(Arc::new(table));
    }
}
