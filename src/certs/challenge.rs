//! HTTP-01 challenge responder and HTTPS redirect.
//!
//! While ACME mode is active the plaintext port serves two things only:
//! pending challenge tokens, and a permanent redirect to `https://` for
//! everything else.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use dashmap::DashMap;

use crate::http::headers::set_server;
use crate::http::request::request_host;
use crate::routing::host::split_port;

/// Pending HTTP-01 tokens mapped to their key authorizations.
#[derive(Debug, Clone, Default)]
pub struct ChallengeStore {
    tokens: Arc<DashMap<String, String>>,
}

impl ChallengeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, token: &str, key_authorization: &str) {
        self.tokens
            .insert(token.to_string(), key_authorization.to_string());
    }

    pub fn get(&self, token: &str) -> Option<String> {
        self.tokens.get(token).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, token: &str) {
        self.tokens.remove(token);
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Router for the plaintext port in ACME mode.
pub fn challenge_router(store: ChallengeStore) -> Router {
    Router::new()
        .route("/.well-known/acme-challenge/{token}", get(serve_challenge))
        .fallback(redirect_to_https)
        .with_state(store)
}

async fn serve_challenge(
    State(store): State<ChallengeStore>,
    Path(token): Path<String>,
) -> Response {
    let mut response = match store.get(&token) {
        Some(key_authorization) => {
            tracing::info!(token = %token, "Served ACME challenge");
            (StatusCode::OK, key_authorization).into_response()
        }
        None => {
            tracing::warn!(token = %token, "Unknown ACME challenge token");
            StatusCode::NOT_FOUND.into_response()
        }
    };
    set_server(response.headers_mut());
    response
}

async fn redirect_to_https(request: Request<Body>) -> Response {
    let mut response = match https_location(&request) {
        Some(location) => {
            let mut response = StatusCode::MOVED_PERMANENTLY.into_response();
            response.headers_mut().insert(header::LOCATION, location);
            response
        }
        None => StatusCode::BAD_REQUEST.into_response(),
    };
    set_server(response.headers_mut());
    response
}

/// `https://` URL for the same host (port dropped) and path.
pub fn https_location<B>(request: &Request<B>) -> Option<HeaderValue> {
    let host = request_host(request);
    let (name, _) = split_port(&host);
    if name.is_empty() {
        return None;
    }
    let path = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    HeaderValue::from_str(&format!("https://{}{}", name, path)).ok()
}
