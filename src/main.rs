use anyhow::{Context, Result};

use courier::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let path = Config::resolve_path(std::env::args().nth(1));
    let config = Config::load(&path).with_context(|| format!("failed to load config from {path}"))?;
    courier::logging::init(&config.log_level());

    let app = courier::app::build(config)?;
    let addr = courier::server::bind_address(&app.state())
        .with_context(|| format!("invalid bind address {}", app.config().server().bind()))?;
    app.start().await?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "http server listening");
    let served = axum::serve(listener, app.router())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %err, "failed to listen for shutdown signal");
            }
            tracing::info!("shutdown signal received");
        })
        .await
        .context("server failed");

    app.shutdown().await;
    served
}
