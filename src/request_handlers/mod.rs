pub mod download_handler;
pub mod list_handler;
pub mod status_handler;
pub mod upload_handler;

use std::sync::Arc;

use crate::FileStore;

/// The store every handler reaches through an [`axum::Extension`].
pub type SharedFileStore = Arc<dyn FileStore>;
