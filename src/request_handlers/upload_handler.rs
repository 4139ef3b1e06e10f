use axum::{
    async_trait,
    body::HttpBody,
    extract::{Extension, FromRequest, Multipart},
    http::{Request, StatusCode},
    BoxError,
};
use bytes::Bytes;

use super::SharedFileStore;
use crate::UploadError;

/// One chunk of a resumable upload, decoded from a `multipart/form-data` body.
///
/// Expected fields: `file` (the chunk bytes), `filename`, and `start` (decimal byte offset).
/// The whole body is read before anything touches the disk, so a client that disconnects
/// mid-chunk leaves the stored file untouched.
#[derive(Debug)]
pub struct UploadRequest {
    pub filename: String,
    pub start: u64,
    pub chunk: Bytes,
}

pub async fn upload_handler(
    Extension(file_store): Extension<SharedFileStore>,
    req: UploadRequest,
) -> Result<StatusCode, UploadError> {
    file_store
        .write_chunk(&req.filename, req.start, &req.chunk)
        .await?;

    Ok(StatusCode::OK)
}

#[async_trait]
impl<S, B> FromRequest<S, B> for UploadRequest
where
    B: HttpBody + Send + 'static,
    B::Data: Into<Bytes>,
    B::Error: Into<BoxError>,
    S: Send + Sync,
{
    type Rejection = UploadError;

    async fn from_request(req: Request<B>, state: &S) -> Result<Self, Self::Rejection> {
        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| UploadError::Form(e.to_string()))?;

        let mut filename = None;
        let mut start = None;
        let mut chunk = None;

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| UploadError::Form(e.to_string()))?
        {
            let name = field.name().map(str::to_owned);
            match name.as_deref() {
                Some("file") => {
                    chunk = Some(field.bytes().await.map_err(|e| UploadError::Form(e.to_string()))?)
                }
                Some("filename") => {
                    filename = Some(field.text().await.map_err(|e| UploadError::Form(e.to_string()))?)
                }
                Some("start") => {
                    start = Some(field.text().await.map_err(|e| UploadError::Form(e.to_string()))?)
                }
                _ => {}
            }
        }

        let filename = filename
            .filter(|name| !name.is_empty())
            .ok_or(UploadError::MissingField("filename"))?;

        let start = start
            .filter(|start| !start.is_empty())
            .ok_or(UploadError::MissingField("start"))?;
        let start = start
            .trim()
            .parse::<u64>()
            .map_err(|e| UploadError::InvalidField {
                field: "start",
                reason: format!("{start:?}: {e}"),
            })?;

        let chunk = chunk.ok_or(UploadError::MissingField("file"))?;

        Ok(UploadRequest {
            filename,
            start,
            chunk,
        })
    }
}
