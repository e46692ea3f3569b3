//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (Host header)
//!     → router.rs (load current snapshot)
//!     → table.rs (split host on '.', look up first label)
//!     → Return: Matched route, Dashboard, or NotFound
//!
//! Route Compilation (startup and every reload):
//!     ServiceConfig[]
//!     → ServiceRoute[] in file order
//!     → label index + apex slot
//!     → swapped into Router
//! ```
//!
//! # Design Decisions
//! - Exact string comparison, no case folding
//! - First match wins in configuration order
//! - Hosts with fewer than two labels never 404 on their own: they go to the
//!   apex route or the dashboard

pub mod host;
pub mod route;
pub mod router;
pub mod table;

pub use route::ServiceRoute;
pub use router::Router;
pub use table::{RouteOutcome, RoutingTable};
