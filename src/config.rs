use clap::Parser;
use std::{net::SocketAddr, path::PathBuf};

/// Body limit for `POST /upload`, well above the 512 KiB chunks of the browser client.
pub const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Server settings, read from the command line with environment fallbacks.
#[derive(Parser, Debug, Clone)]
#[command(name = "axum-chunked-upload", version, about = "Resumable chunked file upload server")]
pub struct ServerConfig {
    #[arg(
        short = 's',
        long,
        env = "UPLOAD_STORAGE_DIR",
        default_value = "./uploads",
        help = "Directory that holds uploaded files"
    )]
    pub storage_dir: PathBuf,

    #[arg(
        long,
        env = "UPLOAD_STATIC_DIR",
        default_value = "./static",
        help = "Directory served for every path outside the API"
    )]
    pub static_dir: PathBuf,

    #[arg(
        short = 'b',
        long,
        env = "UPLOAD_BIND",
        default_value = "0.0.0.0:8080",
        help = "Address to listen on"
    )]
    pub bind: SocketAddr,

    #[arg(
        long,
        env = "UPLOAD_MAX_BODY_BYTES",
        default_value_t = DEFAULT_MAX_BODY_BYTES,
        help = "Largest accepted chunk upload request, in bytes"
    )]
    pub max_body_bytes: usize,

    #[arg(
        long,
        env = "UPLOAD_STRICT_OFFSETS",
        help = "Reject chunks that start beyond the stored length of their file"
    )]
    pub strict_offsets: bool,
}
