//! HTTP surface
//!
//! - `POST /blob` / `GET /blob` - direct upload and download
//! - `POST /blob/link/upload` / `POST /blob/link/download` - signed links
//! - `PUT /blob/signed` / `GET /blob/signed` - redeem a signed link
//! - `GET /healthz` - health check
//!
//! Blob endpoints take `accountID`, `key` and an optional `snapshot` as query
//! parameters. The caller is expected to sit behind whatever authenticates
//! `accountID`.

pub mod blob;
pub mod health;
pub mod response;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::models::AppState;

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    info!("Creating application router");

    let max_upload_bytes = state.config.server.max_upload_bytes;

    Router::new()
        .merge(blob::router())
        .merge(health::router())
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
