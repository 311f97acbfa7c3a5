use std::sync::Arc;

use deployd_server::{build_router, init_tracing, AppConfig, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().map_err(|e| anyhow::anyhow!(e.to_string()))?;
    init_tracing(config.dev);

    let state = Arc::new(
        AppState::bootstrap(&config)
            .await
            .map_err(|e| anyhow::anyhow!(e.to_string()))?,
    );

    let router = build_router(state);
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!(%addr, "deployd listening");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}
