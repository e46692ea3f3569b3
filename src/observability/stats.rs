//! Process-wide request counters shown on the dashboard.
//!
//! # Design Decisions
//! - Counters only ever increase; there is no reset
//! - Atomic increments, so concurrent requests never lose an update
//! - Relaxed ordering: the two counters are read independently

use std::sync::atomic::{AtomicU64, Ordering};

use crate::observability::metrics;

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestStats {
    pub successful: u64,
    pub errored: u64,
}

impl RequestStats {
    pub fn total(&self) -> u64 {
        self.successful + self.errored
    }
}

/// Successful / errored request counters.
#[derive(Debug, Default)]
pub struct StatsCounter {
    successful: AtomicU64,
    errored: AtomicU64,
}

impl StatsCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self) {
        self.successful.fetch_add(1, Ordering::Relaxed);
        metrics::record_success();
    }

    pub fn record_error(&self) {
        self.errored.fetch_add(1, Ordering::Relaxed);
        metrics::record_error();
    }

    pub fn snapshot(&self) -> RequestStats {
        RequestStats {
            successful: self.successful.load(Ordering::Relaxed),
            errored: self.errored.load(Ordering::Relaxed),
        }
    }
}
