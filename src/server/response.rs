//! Buffered response type passed between pipeline stages.

use axum::body::Body;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, ACCESS_CONTROL_ALLOW_ORIGIN, CACHE_CONTROL, CONTENT_TYPE};
use http::{HeaderMap, StatusCode};

/// A fully buffered HTTP response.
///
/// Handlers, the edge cache and the error responder all exchange this type
/// so that a response can be copied into the cache and annotated with CORS
/// headers without touching a streaming body.
#[derive(Debug, Clone)]
pub struct EdgeResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl EdgeResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// 200 with the given body.
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::new(StatusCode::OK).with_body(body)
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Set a header. Values that are not valid header text are dropped.
    pub fn with_header(mut self, name: HeaderName, value: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn with_content_type(self, content_type: &str) -> Self {
        self.with_header(CONTENT_TYPE, content_type)
    }

    pub fn with_cache_control(self, cache_control: &str) -> Self {
        self.with_header(CACHE_CONTROL, cache_control)
    }

    /// The Cache-Control header, if present and readable.
    pub fn cache_control(&self) -> Option<&str> {
        self.headers
            .get(CACHE_CONTROL)
            .and_then(|v| v.to_str().ok())
    }

    /// A copy of this response with every CORS header removed, suitable for
    /// a cache entry shared across origins.
    pub fn without_cors(&self) -> Self {
        let mut copy = self.clone();
        copy.headers.remove(ACCESS_CONTROL_ALLOW_ORIGIN);
        copy
    }
}

impl IntoResponse for EdgeResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}
