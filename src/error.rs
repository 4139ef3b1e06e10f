use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::path::PathBuf;

/// Errors produced while resolving, writing or reading an upload target.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// The client supplied a file name that is empty or resolves to nothing.
    #[error("invalid file name: {0:?}")]
    InvalidName(String),

    #[error("missing form field `{0}`")]
    MissingField(&'static str),

    #[error("invalid form field `{field}`: {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// The request body could not be read as a multipart form.
    #[error("malformed form: {0}")]
    Form(String),

    #[error("file not found: {0}")]
    NotFound(String),

    /// Strict offsets only: the chunk would leave a hole after the current end of file.
    #[error("chunk starts at {start} but only {length} bytes are stored")]
    OffsetGap { start: u64, length: u64 },

    #[error("failed to {op} {}: {source}", path.display())]
    Storage {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl UploadError {
    pub(crate) fn storage(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Storage {
            op,
            path: path.into(),
            source,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidName(_)
            | Self::MissingField(_)
            | Self::InvalidField { .. }
            | Self::Form(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::OffsetGap { .. } => StatusCode::CONFLICT,
            Self::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether a client may re-send the same request and expect a different outcome.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage { .. })
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Storage details stay in the log; the client only learns the kind of failure.
        let body = match &self {
            Self::Storage { .. } => {
                tracing::error!(error = %self, "storage failure");
                "storage error".to_string()
            }
            other => {
                tracing::warn!(error = %other, "rejected request");
                other.to_string()
            }
        };

        (status, body).into_response()
    }
}
