//! Response envelope shared by every HTTP handler.
//!
//! Success bodies are the serialized value; error bodies are
//! `{"error_msg": "..."}`. Both are pretty-printed with two-space
//! indentation and carry headers that disable caching.

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde::Serialize;
use std::fmt::Display;
use tracing::error;

use crate::types::{AppError, INTERNAL_ERROR_MESSAGE};

/// Content type for every JSON body.
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Content type for raw blob bodies.
pub const CONTENT_TYPE_BLOB: &str = "application/octet-stream";

fn no_cache_headers() -> [(HeaderName, HeaderValue); 4] {
    [
        (
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-cache, no-store, must-revalidate, private, max-age=0"),
        ),
        (
            header::EXPIRES,
            HeaderValue::from_static("Thu, 01 Jan 1970 00:00:00 UTC"),
        ),
        (header::PRAGMA, HeaderValue::from_static("no-cache")),
        (
            HeaderName::from_static("x-accel-expires"),
            HeaderValue::from_static("0"),
        ),
    ]
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error_msg: &'a str,
}

/// Serialize `value` as two-space-indented JSON followed by a newline.
pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<Vec<u8>> {
    let mut body = serde_json::to_vec_pretty(value)?;
    body.push(b'\n');
    Ok(body)
}

/// Assemble a response: headers first, then status, then body.
fn build(status: StatusCode, content_type: HeaderValue, body: Bytes) -> Response {
    let mut headers = HeaderMap::with_capacity(5);
    for (name, value) in no_cache_headers() {
        headers.insert(name, value);
    }
    headers.insert(header::CONTENT_TYPE, content_type);

    let mut response = Response::new(Body::from(body));
    *response.headers_mut() = headers;
    *response.status_mut() = status;
    response
}

/// Write `value` as the JSON body with the given status.
pub fn write_json<T: Serialize + ?Sized>(value: &T, status: StatusCode) -> Response {
    match to_pretty_json(value) {
        Ok(body) => build(
            status,
            HeaderValue::from_static(CONTENT_TYPE_JSON),
            Bytes::from(body),
        ),
        Err(e) => {
            error!("Failed to serialize response body: {}", e);
            write_error(&INTERNAL_ERROR_MESSAGE, StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Write an error message envelope with the given status.
pub fn write_error(err: &dyn Display, status: StatusCode) -> Response {
    let message = err.to_string();
    let body = match to_pretty_json(&ErrorBody { error_msg: &message }) {
        Ok(body) => body,
        // A struct holding one string cannot fail to serialize
        Err(_) => b"{\n  \"error_msg\": \"Internal server error\"\n}\n".to_vec(),
    };
    build(
        status,
        HeaderValue::from_static(CONTENT_TYPE_JSON),
        Bytes::from(body),
    )
}

/// 400 Bad Request.
pub fn write_bad_request(err: &dyn Display) -> Response {
    write_error(err, StatusCode::BAD_REQUEST)
}

/// 404 Not Found.
pub fn write_not_found(err: &dyn Display) -> Response {
    write_error(err, StatusCode::NOT_FOUND)
}

/// 500 Internal Server Error.
pub fn write_internal_error(err: &dyn Display) -> Response {
    write_error(err, StatusCode::INTERNAL_SERVER_ERROR)
}

/// Raw blob body with the same caching rules as JSON responses.
pub fn write_bytes(data: Bytes, status: StatusCode) -> Response {
    build(
        status,
        HeaderValue::from_static(CONTENT_TYPE_BLOB),
        data,
    )
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if let AppError::Internal(detail) = &self {
            error!("Request failed: {}", detail);
        }
        write_error(&self.public_message(), status)
    }
}
