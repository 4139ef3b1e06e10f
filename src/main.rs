use anyhow::Context;
use axum_chunked_upload::{build_app, ServerConfig};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,axum_chunked_upload=debug,tower_http=debug")),
        )
        .init();

    let config = ServerConfig::parse();

    let app = build_app(&config)
        .await
        .context("failed to prepare storage directory")?;

    let server = axum::Server::try_bind(&config.bind)
        .with_context(|| format!("failed to bind {}", config.bind))?;

    tracing::info!(
        addr = %config.bind,
        storage = %config.storage_dir.display(),
        "server running"
    );

    server
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }

    tracing::info!("shutting down");
}
