use axum::extract::{Extension, Query};
use serde::Deserialize;

use super::SharedFileStore;
use crate::UploadError;

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    filename: Option<String>,
}

/// Reports the resume point of `filename` as a plain decimal byte count.
///
/// A file that was never written reports `0`; only a failing stat is an error.
pub async fn status_handler(
    Query(query): Query<StatusQuery>,
    Extension(file_store): Extension<SharedFileStore>,
) -> Result<String, UploadError> {
    let filename = query.filename.ok_or(UploadError::MissingField("filename"))?;

    let length = file_store.current_length(&filename).await?;

    Ok(length.to_string())
}
