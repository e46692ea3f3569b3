//! Request/response relay to a resolved backend.
//!
//! # Responsibilities
//! - Rewrite the request to `http://host:port` of the route
//! - Add forwarding headers, strip hop-by-hop headers
//! - Stream the backend response back with the Server header replaced
//! - Turn transport failures into a 503 page
//! - Tunnel upgraded connections (`101 Switching Protocols`) byte for byte
//! - Update the dashboard counters
//!
//! # Design Decisions
//! - Backends are always spoken to over plaintext HTTP/1.1
//! - Exactly one attempt per request; no retries
//! - Bodies are streamed both ways. When the client goes away the response
//!   body is dropped, which drops the backend connection with it
//! - `Connection: upgrade` and `Upgrade` survive hop-by-hop stripping only
//!   when the client asked for a protocol switch. After a 101 the two
//!   upgraded streams are joined with `copy_bidirectional`; the proxy does
//!   not look at the frames
//! - A request ID generated by the proxy stays on the client leg only
//! - A completed forward counts as successful unless the final status is
//!   exactly 500 or 404. The synthesized 503 is a completed forward too, so
//!   a backend failure bumps both the error and the success counter

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, uri::PathAndQuery, HeaderValue, Request, StatusCode, Uri, Version};
use axum::response::Response;
use hyper::body::Incoming;
use hyper::upgrade::OnUpgrade;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::{TokioExecutor, TokioIo},
};

use crate::error::{error_chain, ProxyError};
use crate::http::headers::{
    append_forwarded_for, restore_upgrade, set_server, strip_hop_by_hop, upgrade_protocol,
    X_FORWARDED_HOST, X_ORIGIN_HOST,
};
use crate::http::pages::{page_response, PageData, PageKind, PagePresenter, UNAVAILABLE_MESSAGE};
use crate::http::request::{request_host, GeneratedRequestId, X_REQUEST_ID};
use crate::observability::StatsCounter;
use crate::routing::ServiceRoute;

/// Client used for every backend request.
pub type BackendClient = Client<HttpConnector, Body>;

/// Build the backend client with a connect deadline.
pub fn build_client(connect_timeout: Duration) -> BackendClient {
    let mut connector = HttpConnector::new();
    connector.set_connect_timeout(Some(connect_timeout));
    connector.set_nodelay(true);
    Client::builder(TokioExecutor::new()).build(connector)
}

/// Whether a completed forward with this final status counts as successful.
pub fn counts_as_success(status: StatusCode) -> bool {
    status != StatusCode::INTERNAL_SERVER_ERROR && status != StatusCode::NOT_FOUND
}

/// Absolute backend URI for an inbound request URI.
pub fn backend_uri(route: &ServiceRoute, inbound: &Uri) -> Result<Uri, axum::http::Error> {
    let path_and_query = inbound
        .path_and_query()
        .cloned()
        .unwrap_or_else(|| PathAndQuery::from_static("/"));
    Uri::builder()
        .scheme("http")
        .authority(route.authority().as_str())
        .path_and_query(path_and_query)
        .build()
}

/// Forwards requests to backends and relays their responses.
#[derive(Clone)]
pub struct ProxyForwarder {
    client: BackendClient,
    stats: Arc<StatsCounter>,
    presenter: Arc<dyn PagePresenter>,
    expose_backend_errors: bool,
}

impl ProxyForwarder {
    pub fn new(
        client: BackendClient,
        stats: Arc<StatsCounter>,
        presenter: Arc<dyn PagePresenter>,
        expose_backend_errors: bool,
    ) -> Self {
        Self {
            client,
            stats,
            presenter,
            expose_backend_errors,
        }
    }

    /// Forward `request` to `route` and return the response for the client.
    pub async fn forward(
        &self,
        route: &ServiceRoute,
        mut request: Request<Body>,
        client_addr: Option<SocketAddr>,
    ) -> Response {
        let client_upgrade = upgrade_protocol(request.headers())
            .map(|_| hyper::upgrade::on(&mut request));

        let response = match self.prepare(route, request, client_addr) {
            Ok(outbound) => match self.client.request(outbound).await {
                Ok(mut response) => {
                    if let Some(client) = client_upgrade {
                        if response.status() == StatusCode::SWITCHING_PROTOCOLS {
                            let upstream = hyper::upgrade::on(&mut response);
                            spawn_tunnel(route.authority(), client, upstream);
                        }
                    }
                    relay(response)
                }
                Err(e) => self.backend_unavailable(route, error_chain(&e)),
            },
            Err(e) => self.backend_unavailable(route, e.to_string()),
        };

        if counts_as_success(response.status()) {
            self.stats.record_success();
        }
        response
    }

    fn prepare(
        &self,
        route: &ServiceRoute,
        request: Request<Body>,
        client_addr: Option<SocketAddr>,
    ) -> Result<Request<Body>, axum::http::Error> {
        let client_host = request_host(&request);
        let (mut parts, body) = request.into_parts();

        parts.uri = backend_uri(route, &parts.uri)?;
        parts.version = Version::HTTP_11;

        let upgrade = upgrade_protocol(&parts.headers);
        strip_hop_by_hop(&mut parts.headers);
        if let Some(protocol) = upgrade {
            restore_upgrade(&mut parts.headers, protocol);
        }
        if parts.extensions.get::<GeneratedRequestId>().is_some() {
            parts.headers.remove(X_REQUEST_ID);
        }

        if let Ok(value) = HeaderValue::from_str(&client_host) {
            if !client_host.is_empty() {
                // HTTP/2 clients send :authority instead of Host.
                if !parts.headers.contains_key(header::HOST) {
                    parts.headers.insert(header::HOST, value.clone());
                }
                parts.headers.insert(X_FORWARDED_HOST.clone(), value);
            }
        }
        if let Ok(value) = HeaderValue::from_str(&route.authority()) {
            parts.headers.insert(X_ORIGIN_HOST.clone(), value);
        }
        if let Some(addr) = client_addr {
            append_forwarded_for(&mut parts.headers, addr.ip());
        }

        Ok(Request::from_parts(parts, body))
    }

    fn backend_unavailable(&self, route: &ServiceRoute, detail: String) -> Response {
        let error = ProxyError::BackendUnavailable {
            backend: route.authority(),
            message: detail,
        };
        tracing::warn!(error = %error, "Backend request failed");

        self.stats.record_error();

        let message = match (&error, self.expose_backend_errors) {
            (ProxyError::BackendUnavailable { message, .. }, true) => message.clone(),
            _ => UNAVAILABLE_MESSAGE.to_string(),
        };
        let mut response = page_response(
            self.presenter.as_ref(),
            PageKind::Error,
            &PageData::error(error.status(), message),
        );
        set_server(response.headers_mut());
        response
    }
}

fn relay(response: Response<Incoming>) -> Response {
    let (mut parts, body) = response.into_parts();
    let upgrade = if parts.status == StatusCode::SWITCHING_PROTOCOLS {
        upgrade_protocol(&parts.headers)
    } else {
        None
    };
    strip_hop_by_hop(&mut parts.headers);
    if let Some(protocol) = upgrade {
        restore_upgrade(&mut parts.headers, protocol);
    }
    set_server(&mut parts.headers);
    Response::from_parts(parts, Body::new(body))
}

/// Join the client and backend connections once both sides have switched.
fn spawn_tunnel(backend: String, client: OnUpgrade, upstream: OnUpgrade) {
    tokio::spawn(async move {
        let (client, upstream) = match tokio::try_join!(client, upstream) {
            Ok(pair) => pair,
            Err(e) => {
                tracing::warn!(backend = %backend, error = %e, "Connection upgrade failed");
                return;
            }
        };

        let mut client = TokioIo::new(client);
        let mut upstream = TokioIo::new(upstream);
        match tokio::io::copy_bidirectional(&mut client, &mut upstream).await {
            Ok((sent, received)) => {
                tracing::debug!(backend = %backend, sent, received, "Upgraded connection closed")
            }
            Err(e) => tracing::debug!(backend = %backend, error = %e, "Upgraded connection ended"),
        }
    });
}
