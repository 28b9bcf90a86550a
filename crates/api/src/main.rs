use anyhow::Context;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    stockledger_observability::init();

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

    let services = stockledger_api::app::services::build_services();
    let maintenance = services
        .engine
        .maintenance_scheduler()
        .spawn()
        .context("failed to start maintenance scheduler")?;

    let app = stockledger_api::app::build_app(services);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await;

    tracing::info!(stats = ?maintenance.stats(), "stopping maintenance scheduler");
    tokio::task::spawn_blocking(move || maintenance.shutdown())
        .await
        .context("maintenance shutdown panicked")?;

    served.context("http server failed")
}
