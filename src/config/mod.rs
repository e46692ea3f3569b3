//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! services.yml (YAML, or TOML by extension)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → RoutingTable snapshot built once
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → new RoutingTable swapped in atomically
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields except the service list have defaults
//! - Serving mode is chosen once at startup; reloads only touch routes

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError, ConfigFormat};
pub use schema::{
    ErrorPageConfig, ListenerConfig, ObservabilityConfig, ProxyConfig, RoutingConfig,
    ServiceConfig, TimeoutConfig, TlsConfig, TlsMode, LOCALHOST_DOMAIN,
};
pub use validation::ValidationError;
pub use watcher::ConfigWatcher;
