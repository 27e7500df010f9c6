use std::sync::Arc;

use anyhow::Context;

use hotelstock_infra::LedgerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    hotelstock_observability::init();

    let config = LedgerConfig::from_env().context("invalid configuration")?;
    let services = hotelstock_api::app::build_services(&config)
        .await
        .context("failed to start ledger services")?;

    let app = hotelstock_api::app::build_app(Arc::new(services));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(
        addr = %listener.local_addr()?,
        report_offset = %config.report_offset,
        max_commit_retries = config.max_commit_retries,
        "listening"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
