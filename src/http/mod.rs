//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, middleware, dispatch)
//!     → request.rs (request ID, host extraction)
//!     → routing layer resolves the host
//!     → forward.rs (rewrite, relay to backend)  or  pages.rs (404 / dashboard)
//!     → headers.rs (hop-by-hop, forwarding, Server)
//!     → Send to client
//! ```

pub mod forward;
pub mod headers;
pub mod pages;
pub mod request;
pub mod server;

pub use forward::ProxyForwarder;
pub use pages::{HtmlPresenter, PageData, PageKind, PagePresenter};
pub use request::X_REQUEST_ID;
pub use server::HttpServer;
