//! Request inspection and request IDs.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) when the client sent none
//! - Remember which IDs were generated, so only client-sent ones reach
//!   the backend
//! - Extract the host used for routing
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Host comes from the `Host` header, falling back to the URI authority
//!   (HTTP/2 requests carry `:authority` instead)

use axum::body::Body;
use axum::http::{header, HeaderName, HeaderValue, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

/// Header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

pub fn request_id_header() -> HeaderName {
    HeaderName::from_static(X_REQUEST_ID)
}

/// Generates UUID v4 request IDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Extension set on requests whose ID was generated by the proxy.
#[derive(Debug, Clone, Copy)]
pub struct GeneratedRequestId;

/// Runs ahead of the request-id layer and tags requests that carry no ID.
pub async fn mark_generated_request_id(mut request: Request<Body>) -> Request<Body> {
    if !request.headers().contains_key(X_REQUEST_ID) {
        request.extensions_mut().insert(GeneratedRequestId);
    }
    request
}

/// Host the client asked for, exactly as sent. Empty when absent.
pub fn request_host<B>(request: &Request<B>) -> String {
    request
        .headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .or_else(|| request.uri().authority().map(|a| a.as_str().to_string()))
        .unwrap_or_default()
}

/// Request ID previously set by the request-id layer, for log fields.
pub fn request_id<B>(request: &Request<B>) -> String {
    request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_header_preferred() {
        let req = Request::builder()
            .uri("http://ignored.example.com/path")
            .header("Host", "api.localhost:8080")
            .body(Body::empty())
            .unwrap();
        assert_eq!(request_host(&req), "api.localhost:8080");
    }

    #[test]
    fn falls_back_to_authority() {
        let req = Request::builder()
            .uri("https://api.example.com/path")
            .body(Body::empty())
            .unwrap();
        assert_eq!(request_host(&req), "api.example.com");
    }

    #[test]
    fn missing_host_is_empty() {
        let req = Request::builder().uri("/path").body(Body::empty()).unwrap();
        assert_eq!(request_host(&req), "");
    }

    #[tokio::test]
    async fn only_missing_ids_are_tagged() {
        let bare = Request::builder().body(Body::empty()).unwrap();
        let bare = mark_generated_request_id(bare).await;
        assert!(bare.extensions().get::<GeneratedRequestId>().is_some());

        let supplied = Request::builder()
            .header(X_REQUEST_ID, "abc-123")
            .body(Body::empty())
            .unwrap();
        let supplied = mark_generated_request_id(supplied).await;
        assert!(supplied.extensions().get::<GeneratedRequestId>().is_none());
    }

    #[test]
    fn generates_uuid_ids() {
        let req = Request::builder().body(Body::empty()).unwrap();
        let id = UuidRequestId.make_request_id(&req).unwrap();
        let text = id.header_value().to_str().unwrap();
        assert!(Uuid::parse_str(text).is_ok());
    }
}
