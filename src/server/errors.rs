//! Error responses.
//!
//! Maps a [`GatewayError`] to a status code, a cache lifetime and a body.
//!
//! | Kind             | Status | Cache-Control                 |
//! |------------------|--------|-------------------------------|
//! | BadRequest       | 400    | `public, max-age={error_max_age}` |
//! | OriginNotAllowed | 403    | `public, max-age={error_max_age}` |
//! | NotFound         | 404    | `public, max-age={error_max_age}` |
//! | RateLimited      | 429    | `no-store`                    |
//! | Internal         | 500    | `no-store`                    |
//!
//! A 404 for a client that prefers HTML gets the canned `static/404.html`
//! page when it exists in storage; everyone else gets plain text.

use std::sync::Arc;

use http::StatusCode;
use tracing::{debug, error, warn};

use super::response::EdgeResponse;
use crate::error::{ErrorKind, GatewayError};
use crate::store::ObjectStore;

/// Storage key of the HTML not-found page.
pub const NOT_FOUND_PAGE_KEY: &str = "static/404.html";

/// Default max-age in seconds for cacheable error responses.
pub const DEFAULT_ERROR_MAX_AGE: u32 = 60;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const TEXT_HTML: &str = "text/html; charset=utf-8";

/// HTTP status for an error kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
        ErrorKind::OriginNotAllowed => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Cache-Control value for an error kind.
pub fn cache_control_for(kind: ErrorKind, error_max_age: u32) -> String {
    match kind {
        ErrorKind::RateLimited | ErrorKind::Internal => "no-store".to_string(),
        _ => format!("public, max-age={}", error_max_age),
    }
}

/// Whether the Accept header ranks `text/html` at least as high as anything
/// else it lists.
pub fn prefers_html(accept: Option<&str>) -> bool {
    let Some(accept) = accept else {
        return false;
    };

    let mut html_q: Option<f32> = None;
    let mut best_q: f32 = 0.0;

    for range in accept.split(',') {
        let mut parts = range.split(';');
        let media = parts.next().unwrap_or("").trim().to_ascii_lowercase();
        if media.is_empty() {
            continue;
        }

        let q = parts
            .filter_map(|p| p.trim().strip_prefix("q="))
            .find_map(|v| v.trim().parse::<f32>().ok())
            .unwrap_or(1.0);

        if media == "text/html" {
            html_q = Some(html_q.map_or(q, |h| h.max(q)));
        }
        best_q = best_q.max(q);
    }

    matches!(html_q, Some(q) if q > 0.0 && q >= best_q)
}

/// Renders errors into responses.
#[derive(Clone)]
pub struct ErrorResponder {
    store: Arc<dyn ObjectStore>,
    error_max_age: u32,
}

impl ErrorResponder {
    pub fn new(store: Arc<dyn ObjectStore>, error_max_age: u32) -> Self {
        Self {
            store,
            error_max_age,
        }
    }

    /// Build the response for `err`, negotiating the 404 representation
    /// against `accept`.
    pub async fn respond(&self, err: &GatewayError, accept: Option<&str>) -> EdgeResponse {
        let kind = err.kind();
        let status = status_for(kind);
        let message = err.message();

        if status.is_server_error() {
            error!(
                error_type = kind.name(),
                status = status.as_u16(),
                "Server error: {}",
                message
            );
        } else if status == StatusCode::NOT_FOUND {
            debug!(
                error_type = kind.name(),
                status = status.as_u16(),
                "Resource not found: {}",
                message
            );
        } else {
            warn!(
                error_type = kind.name(),
                status = status.as_u16(),
                "Client error: {}",
                message
            );
        }

        let response = EdgeResponse::new(status)
            .with_cache_control(&cache_control_for(kind, self.error_max_age));

        if kind == ErrorKind::NotFound && prefers_html(accept) {
            match self.store.get(NOT_FOUND_PAGE_KEY, None, None).await {
                Ok(page) => {
                    return response.with_content_type(TEXT_HTML).with_body(page.data);
                }
                Err(e) => {
                    debug!("Not-found page unavailable: {}", e);
                }
            }
        }

        response
            .with_content_type(TEXT_PLAIN)
            .with_body(message.to_string())
    }
}
