use std::sync::Arc;

use anyhow::Context;

use rolegate_api::app::{build_app, services::AppServices};
use rolegate_infra::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rolegate_observability::init();

    let settings = Settings::from_env()?;
    tracing::info!(?settings, "starting");

    let services = Arc::new(AppServices::from_settings(&settings).await?);
    let app = build_app(services);

    let listener = tokio::net::TcpListener::bind(settings.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", settings.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
