//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Request path produces:
//!     → stats.rs (dashboard counters)
//!     → metrics.rs (counters, histograms)
//!     → logging.rs (structured log events, request spans)
//!
//! Consumers:
//!     → Dashboard page (stats snapshot)
//!     → Metrics endpoint (Prometheus scrape)
//!     → stdout
//! ```

pub mod logging;
pub mod metrics;
pub mod stats;

pub use stats::{RequestStats, StatsCounter};
