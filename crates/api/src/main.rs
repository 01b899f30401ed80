use std::sync::Arc;

use anyhow::Context;

use gigledger_api::app;
use gigledger_infra::AppConfig;
use gigledger_infra::config::LogFormat;
use gigledger_observability::Output;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    let output = match config.log.format {
        LogFormat::Json => Output::Json,
        LogFormat::Pretty => Output::Pretty,
    };
    gigledger_observability::init_with(&config.log.default_filter, output);

    let services = Arc::new(app::services::build_services(&config).await?);
    let router = app::build_app(services.clone());

    let listener = tokio::net::TcpListener::bind(config.http_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.http_addr))?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    services.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
