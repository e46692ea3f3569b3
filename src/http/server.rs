//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the catch-all proxy handler
//! - Wire up middleware (tracing, timeout, request ID, Server header,
//!   compression, panic recovery)
//! - Serve on a plaintext listener or behind rustls
//! - Dispatch requests to the routing engine
//! - Apply configuration reloads to the routing table

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, HeaderValue, Request, StatusCode},
    middleware::map_request,
    response::Response,
    routing::any,
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use hyper_util::rt::TokioTimer;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{
    catch_panic::CatchPanicLayer,
    compression::CompressionLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    timeout::{ResponseBodyTimeoutLayer, TimeoutLayer},
    trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::http::forward::{build_client, ProxyForwarder};
use crate::http::headers::SERVER_NAME;
use crate::http::pages::{
    page_response, HtmlPresenter, PageData, PageKind, PagePresenter, NOT_FOUND_MESSAGE,
};
use crate::http::request::{
    mark_generated_request_id, request_host, request_id, request_id_header, UuidRequestId,
};
use crate::observability::{metrics, StatsCounter};
use crate::routing::{RouteOutcome, Router as ProxyRouter};

/// Grace period for in-flight requests once shutdown starts.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<ProxyRouter>,
    pub stats: Arc<StatsCounter>,
    pub forwarder: ProxyForwarder,
    pub presenter: Arc<dyn PagePresenter>,
}

/// HTTP server for the reverse proxy.
pub struct HttpServer {
    app: Router,
    config: ProxyConfig,
    router: Arc<ProxyRouter>,
    stats: Arc<StatsCounter>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ProxyConfig) -> Self {
        Self::with_presenter(config, Arc::new(HtmlPresenter))
    }

    /// Create a server that renders pages with a custom presenter.
    pub fn with_presenter(config: ProxyConfig, presenter: Arc<dyn PagePresenter>) -> Self {
        let router = Arc::new(ProxyRouter::from_config(&config));
        let stats = Arc::new(StatsCounter::new());

        let client = build_client(Duration::from_secs(config.timeouts.connect_secs));
        let forwarder = ProxyForwarder::new(
            client,
            stats.clone(),
            presenter.clone(),
            config.errors.expose_backend_errors,
        );

        let state = AppState {
            router: router.clone(),
            stats: stats.clone(),
            forwarder,
            presenter,
        };

        let app = Self::build_router(&config, state);
        Self {
            app,
            config,
            router,
            stats,
        }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// `listener.timeout_secs` bounds the wait for response headers and,
    /// separately, any stall between two response body frames.
    #[allow(deprecated)]
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        let timeout = Duration::from_secs(config.listener.timeout_secs);
        let app = Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(CatchPanicLayer::new())
            .layer(ResponseBodyTimeoutLayer::new(timeout))
            .layer(TimeoutLayer::new(timeout))
            .layer(SetResponseHeaderLayer::overriding(
                header::SERVER,
                HeaderValue::from_static(SERVER_NAME),
            ))
            .layer(PropagateRequestIdLayer::new(request_id_header()))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(request_id_header(), UuidRequestId))
            .layer(map_request(mark_generated_request_id));

        if config.compression {
            app.layer(CompressionLayer::new())
        } else {
            app
        }
    }

    /// Shared request counters.
    pub fn stats(&self) -> Arc<StatsCounter> {
        self.stats.clone()
    }

    /// Shared routing engine.
    pub fn router(&self) -> Arc<ProxyRouter> {
        self.router.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Serve plain HTTP on `listener` until a shutdown signal arrives.
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: mpsc::UnboundedReceiver<ProxyConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, tls = false, "HTTP server starting");

        spawn_reloader(self.router.clone(), self.config.clone(), config_updates);

        let app = self.app.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Serve HTTPS on `addr` with `tls` until a shutdown signal arrives.
    ///
    /// `tls` may be reloaded by the caller while the server runs.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
        config_updates: mpsc::UnboundedReceiver<ProxyConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), io::Error> {
        tracing::info!(address = %addr, tls = true, "HTTPS server starting");

        spawn_reloader(self.router.clone(), self.config.clone(), config_updates);

        let handle = axum_server::Handle::new();
        let drain = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            tracing::info!("Shutdown signal received");
            drain.graceful_shutdown(Some(DRAIN_TIMEOUT));
        });

        let timeout = Duration::from_secs(self.config.listener.timeout_secs);
        let mut server = axum_server::bind_rustls(addr, tls).handle(handle);
        let builder = server.http_builder();
        builder
            .http1()
            .timer(TokioTimer::new())
            .header_read_timeout(timeout);
        // hyper has no HTTP/2 idle timeout; unanswered pings close the
        // connection instead.
        builder
            .http2()
            .timer(TokioTimer::new())
            .keep_alive_interval(Some(timeout))
            .keep_alive_timeout(timeout);

        let app = self.app.into_make_service_with_connect_info::<SocketAddr>();
        server.serve(app).await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }
}

/// Apply configuration updates to the routing table until the sender drops.
fn spawn_reloader(
    router: Arc<ProxyRouter>,
    initial: ProxyConfig,
    mut updates: mpsc::UnboundedReceiver<ProxyConfig>,
) {
    tokio::spawn(async move {
        while let Some(config) = updates.recv().await {
            if config.domain != initial.domain || config.tls != initial.tls {
                tracing::warn!(
                    domain = %config.domain,
                    "Domain or TLS settings changed; restart to apply them"
                );
            }
            router.reload(&config);
        }
    });
}

/// Main proxy handler.
/// Resolves the host, then forwards, shows the dashboard or returns 404.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let host = request_host(&request);
    let request_id = request_id(&request);
    let client_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    match state.router.resolve(&host) {
        RouteOutcome::Matched(route) => {
            tracing::debug!(
                request_id = %request_id,
                host = %host,
                backend = %route,
                method = %request.method(),
                path = %request.uri().path(),
                "Proxying request"
            );
            let response = state.forwarder.forward(&route, request, client_addr).await;
            metrics::record_request("forwarded", response.status().as_u16(), start);
            response
        }
        RouteOutcome::Dashboard => {
            let data = PageData::dashboard(state.stats.snapshot());
            metrics::record_request("dashboard", StatusCode::OK.as_u16(), start);
            page_response(state.presenter.as_ref(), PageKind::Dashboard, &data)
        }
        RouteOutcome::NotFound => {
            let error = ProxyError::RouteNotFound { host };
            tracing::warn!(request_id = %request_id, error = %error, "No route matched");
            state.stats.record_error();
            metrics::record_request("not_found", error.status().as_u16(), start);
            page_response(
                state.presenter.as_ref(),
                PageKind::Error,
                &PageData::error(error.status(), NOT_FOUND_MESSAGE),
            )
        }
    }
}
