// Logstore - account-scoped log blob storage with signed access links

pub mod cli;
pub mod config;
pub mod links;
pub mod models;
pub mod routes;
pub mod storage;
pub mod transfer;
pub mod types;
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use models::AppState;
pub use transfer::{BlobRef, BlobTransfer};
pub use types::{AppError, AppResult};

pub fn create_router(state: AppState) -> axum::Router {
    routes::create_router(state)
}
