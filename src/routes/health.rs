use axum::{extract::State, http::StatusCode, response::Response, routing::get, Router};

use super::response::write_json;
use crate::models::{AppState, HealthResponse};

pub fn router() -> Router<AppState> {
    Router::new().route("/healthz", get(health_check))
}

async fn health_check(State(state): State<AppState>) -> Response {
    let response = HealthResponse {
        status: "ok".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        storage: state.transfer.store_name().to_string(),
    };

    write_json(&response, StatusCode::OK)
}
