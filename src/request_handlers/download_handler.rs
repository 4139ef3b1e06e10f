use axum::{
    body::StreamBody,
    extract::{Extension, Path, Query},
    http::header,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tokio::io::AsyncReadExt;
use tokio_util::io::ReaderStream;

use super::SharedFileStore;
use crate::{FileStore, StoredFile, UploadError};

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    file: Option<String>,
}

/// `GET /download/:filename`
pub async fn download_handler(
    Path(filename): Path<String>,
    Extension(file_store): Extension<SharedFileStore>,
) -> Result<Response, UploadError> {
    send_file(file_store.as_ref(), &filename).await
}

/// `GET /download?file=...`, the form used by the listing page.
pub async fn download_query_handler(
    Query(query): Query<DownloadQuery>,
    Extension(file_store): Extension<SharedFileStore>,
) -> Result<Response, UploadError> {
    let filename = query.file.ok_or(UploadError::MissingField("file"))?;

    send_file(file_store.as_ref(), &filename).await
}

async fn send_file(file_store: &dyn FileStore, filename: &str) -> Result<Response, UploadError> {
    let stored = file_store.open_file(filename).await?;

    Ok(file_response(stored))
}

// The body stops at the length advertised in Content-Length, even if a chunk write
// extends the file while the download is streaming.
fn file_response(stored: StoredFile) -> Response {
    let headers = [
        (header::CONTENT_TYPE, "application/octet-stream".to_string()),
        (header::CONTENT_LENGTH, stored.len.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", disposition_name(&stored.name)),
        ),
    ];

    let body = StreamBody::new(ReaderStream::new(stored.file.take(stored.len)));

    (headers, body).into_response()
}

// Keeps the quoted-string in Content-Disposition well formed.
fn disposition_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}
