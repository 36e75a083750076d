//! Per-request CORS annotation.

use http::header::{HeaderValue, ACCESS_CONTROL_ALLOW_ORIGIN, VARY};

use super::response::EdgeResponse;

/// Adds `Access-Control-Allow-Origin` (echoing the request's Origin) and
/// `Vary: Origin` to an outgoing response.
///
/// Only call this for requests whose Origin already passed access control.
pub fn annotate(mut response: EdgeResponse, origin: Option<&str>) -> EdgeResponse {
    if let Some(value) = origin.and_then(|o| HeaderValue::from_str(o).ok()) {
        response.headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, value);
    }
    response
        .headers
        .insert(VARY, HeaderValue::from_static("Origin"));
    response
}
