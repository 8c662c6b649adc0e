use anyhow::Result;
use inbox_api::run as run_api;
use inbox_automation::run as run_automation;
use inbox_collab::consumer::run as run_dispatch;
use inbox_collab::sweeper::run as run_sweeper;
use inbox_core::Config;
use inbox_core::InboxContext;
use inbox_ingest::run as run_ingest;
use inbox_metrics::run as run_metrics;
use tokio;
use tracing;
use tracing_subscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Starting SocialDesk Inbox Server");

    // Load configuration
    let config = Config::from_env();
    let ctx = InboxContext::new(config).await?;

    tracing::info!("Inbox context initialized");

    // Spawn all modules as parallel tasks
    let ctx_clone = ctx.clone();
    tokio::spawn(async move {
        if let Err(e) = run_ingest(ctx_clone).await {
            tracing::error!("Ingestion consumer error: {}", e);
        }
    });

    let ctx_clone = ctx.clone();
    tokio::spawn(async move {
        if let Err(e) = run_automation(ctx_clone).await {
            tracing::error!("Automation consumer error: {}", e);
        }
    });

    let ctx_clone = ctx.clone();
    tokio::spawn(async move {
        if let Err(e) = run_dispatch(ctx_clone).await {
            tracing::error!("Reply dispatch consumer error: {}", e);
        }
    });

    let ctx_clone = ctx.clone();
    tokio::spawn(async move {
        if let Err(e) = run_metrics(ctx_clone).await {
            tracing::error!("Metrics consumer error: {}", e);
        }
    });

    let ctx_clone = ctx.clone();
    tokio::spawn(async move {
        if let Err(e) = run_sweeper(ctx_clone).await {
            tracing::error!("Archival sweeper error: {}", e);
        }
    });

    // API server runs in main task
    tracing::info!("Starting API server");
    run_api(ctx).await?;

    Ok(())
}
