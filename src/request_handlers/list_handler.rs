use axum::{extract::Extension, Json};

use super::SharedFileStore;
use crate::{filesystem::file_store::FileEntry, UploadError};

pub async fn list_handler(
    Extension(file_store): Extension<SharedFileStore>,
) -> Result<Json<Vec<FileEntry>>, UploadError> {
    let files = file_store.list_files().await?;

    Ok(Json(files))
}
