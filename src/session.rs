//! Client side of the resumable upload protocol.
//!
//! A session asks the store how much of the file is already persisted, then sends the
//! remaining bytes in fixed-size chunks. A failed chunk is retried in place; the cursor
//! only advances once the store acknowledged the write.

use std::time::Duration;

use crate::{FileStore, UploadError};

/// Chunk size used by the bundled browser client.
pub const DEFAULT_CHUNK_SIZE: u64 = 512 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Querying,
    Transferring { cursor: u64 },
    Complete,
}

/// How often a single chunk is attempted before the session gives up.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(500),
        }
    }
}

pub struct UploadSession<'a, S: FileStore + ?Sized> {
    store: &'a S,
    filename: String,
    total: u64,
    chunk_size: u64,
    retry: RetryPolicy,
    state: SessionState,
}

impl<'a, S: FileStore + ?Sized> UploadSession<'a, S> {
    pub fn new(store: &'a S, filename: impl Into<String>, total: u64) -> Self {
        Self {
            store,
            filename: filename.into(),
            total,
            chunk_size: DEFAULT_CHUNK_SIZE,
            retry: RetryPolicy::default(),
            state: SessionState::Querying,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Fetches the resume point and leaves `Querying`.
    pub async fn query(&mut self) -> Result<u64, UploadError> {
        let persisted = self.store.current_length(&self.filename).await?;

        if persisted > self.total {
            return Err(UploadError::InvalidField {
                field: "start",
                reason: format!(
                    "{} already holds {persisted} bytes, more than the {} being uploaded",
                    self.filename, self.total
                ),
            });
        }

        self.state = if persisted == self.total {
            SessionState::Complete
        } else {
            SessionState::Transferring { cursor: persisted }
        };

        Ok(persisted)
    }

    /// Sends the next chunk of `data`, querying first if needed.
    pub async fn send_next(&mut self, data: &[u8]) -> Result<SessionState, UploadError> {
        if data.len() as u64 != self.total {
            return Err(UploadError::InvalidField {
                field: "file",
                reason: format!("expected {} bytes, got {}", self.total, data.len()),
            });
        }

        if self.state == SessionState::Querying {
            self.query().await?;
        }

        let cursor = match self.state {
            SessionState::Transferring { cursor } => cursor,
            state => return Ok(state),
        };

        let end = cursor.saturating_add(self.chunk_size).min(self.total);
        let chunk = &data[cursor as usize..end as usize];

        let mut attempt = 1;
        loop {
            match self.store.write_chunk(&self.filename, cursor, chunk).await {
                Ok(_) => break,
                Err(e) if e.is_retryable() && attempt < self.retry.max_attempts => {
                    tracing::warn!(
                        filename = %self.filename,
                        cursor,
                        attempt,
                        error = %e,
                        "chunk failed, retrying"
                    );
                    attempt += 1;
                    tokio::time::sleep(self.retry.backoff).await;
                }
                Err(e) => return Err(e),
            }
        }

        self.state = if end == self.total {
            SessionState::Complete
        } else {
            SessionState::Transferring { cursor: end }
        };

        Ok(self.state)
    }

    /// Drives the session to completion and returns the final length.
    pub async fn run(&mut self, data: &[u8]) -> Result<u64, UploadError> {
        while self.send_next(data).await? != SessionState::Complete {}

        Ok(self.total)
    }
}
