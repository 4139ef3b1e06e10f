mod config;
mod error;
pub mod filesystem;
pub mod request_handlers;
pub mod session;
mod upload_service;

pub use config::{ServerConfig, DEFAULT_MAX_BODY_BYTES};
pub use error::UploadError;
pub use filesystem::file_store::{FileEntry, FileStore, LocalFileStore, StoredFile};
pub use request_handlers::SharedFileStore;
pub use session::{RetryPolicy, SessionState, UploadSession};
pub use upload_service::{UploadLayer, UploadService};

use axum::{
    extract::{DefaultBodyLimit, Extension},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{services::ServeDir, trace::TraceLayer};

use request_handlers::{
    download_handler::{download_handler, download_query_handler},
    list_handler::list_handler,
    status_handler::status_handler,
    upload_handler::upload_handler,
};

/// Mounts the upload API on `app`:
///
/// - `POST /upload`: multipart chunk (`file`, `filename`, `start`)
/// - `GET /status?filename=`: persisted length as plain text
/// - `GET /list`: JSON array of `{ name, size }`
/// - `GET /download/:filename` and `GET /download?file=`: whole file as an attachment
pub fn setup_upload_routes(app: Router, file_store: SharedFileStore, body_limit: usize) -> Router {
    let api = Router::new()
        .route("/upload", post(upload_handler))
        .route("/status", get(status_handler))
        .route("/list", get(list_handler))
        .route("/download", get(download_query_handler))
        .route("/download/:filename", get(download_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(Extension(file_store))
        .layer(UploadLayer);

    app.merge(api)
}

/// Builds the full application for `config`, creating the storage directory if needed.
///
/// Anything outside the API is served from the static directory.
pub async fn build_app(config: &ServerConfig) -> Result<Router, UploadError> {
    let store = LocalFileStore::open(&config.storage_dir)
        .await?
        .with_strict_offsets(config.strict_offsets);

    let app = setup_upload_routes(Router::new(), Arc::new(store), config.max_body_bytes)
        .fallback_service(ServeDir::new(&config.static_dir))
        .layer(TraceLayer::new_for_http());

    Ok(app)
}
