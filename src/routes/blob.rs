use axum::{
    body::Bytes,
    extract::{
        rejection::{BytesRejection, QueryRejection},
        Query, State,
    },
    http::{StatusCode, Uri},
    response::Response,
    routing::{get, post},
    Router,
};
use tracing::info;

use super::response::{write_bytes, write_json};
use crate::links::SIGNED_PATH;
use crate::models::{AppState, BlobParams, UploadResponse};
use crate::types::AppResult;

// Extractor rejections are routed through `AppError` so malformed requests
// get the same JSON envelope as every other failure.
type Params = Result<Query<BlobParams>, QueryRejection>;
type Body = Result<Bytes, BytesRejection>;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/blob", get(download).post(upload))
        .route("/blob/link/upload", post(upload_link))
        .route("/blob/link/download", post(download_link))
        .route(SIGNED_PATH, get(redeem_download).put(redeem_upload))
}

/// POST /blob - store the request body
async fn upload(
    State(state): State<AppState>,
    params: Params,
    body: Body,
) -> AppResult<Response> {
    let Query(params) = params?;
    let body = body?;
    let size = body.len();
    let key = state.transfer.upload(params.blob_ref()?, body).await?;
    Ok(write_json(&UploadResponse { key, size }, StatusCode::OK))
}

/// GET /blob - return the stored bytes
async fn download(
    State(state): State<AppState>,
    params: Params,
) -> AppResult<Response> {
    let Query(params) = params?;
    let data = state.transfer.download(params.blob_ref()?).await?;
    Ok(write_bytes(data, StatusCode::OK))
}

/// POST /blob/link/upload
async fn upload_link(
    State(state): State<AppState>,
    params: Params,
) -> AppResult<Response> {
    let Query(params) = params?;
    let link = state.transfer.upload_link(params.blob_ref()?, None)?;
    Ok(write_json(&link, StatusCode::OK))
}

/// POST /blob/link/download
async fn download_link(
    State(state): State<AppState>,
    params: Params,
) -> AppResult<Response> {
    let Query(params) = params?;
    let link = state.transfer.download_link(params.blob_ref()?, None)?;
    Ok(write_json(&link, StatusCode::OK))
}

/// PUT /blob/signed - store the body under the key a link authorises
async fn redeem_upload(
    State(state): State<AppState>,
    uri: Uri,
    body: Body,
) -> AppResult<Response> {
    info!("Signed upload request received");
    let body = body?;
    let size = body.len();
    let key = state
        .transfer
        .redeem_upload(uri.query().unwrap_or_default(), body)
        .await?;
    Ok(write_json(&UploadResponse { key, size }, StatusCode::OK))
}

/// GET /blob/signed
async fn redeem_download(State(state): State<AppState>, uri: Uri) -> AppResult<Response> {
    info!("Signed download request received");
    let data = state
        .transfer
        .redeem_download(uri.query().unwrap_or_default())
        .await?;
    Ok(write_bytes(data, StatusCode::OK))
}
