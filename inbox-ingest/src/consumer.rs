use anyhow::{anyhow, Result};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use inbox_core::queue::TOPIC_RAW_EVENTS;
use inbox_core::schema::social_accounts;
use inbox_core::types::{Platform, SocialAccount};
use inbox_core::InboxContext;
use rdkafka::consumer::Consumer;
use rdkafka::Message;
use std::time::Duration;
use tracing;

use crate::adapters::AdapterRegistry;
use crate::pipeline::IngestionPipeline;

/// Drains poll-sourced platform payloads. Webhook deliveries take the
/// synchronous path through the API instead; both funnel into the same
/// pipeline.
pub async fn run(ctx: InboxContext) -> Result<()> {
    tracing::info!("Starting ingestion consumer");

    let consumer = ctx.create_consumer(Some("inbox-ingest"))?;
    let registry = AdapterRegistry::new();
    let pipeline = IngestionPipeline::new(ctx.clone());

    consumer.subscribe(&[TOPIC_RAW_EVENTS])?;

    tracing::info!("Subscribed to topic: {}", TOPIC_RAW_EVENTS);

    let mut error_count = 0u32;
    let mut last_error_log = std::time::Instant::now();

    loop {
        match consumer.recv().await {
            Ok(message) => {
                error_count = 0;
                if let Some(payload) = message.payload() {
                    match handle_raw_event(&ctx, &registry, &pipeline, payload).await {
                        Ok(_) => {
                            tracing::debug!("Processed raw platform event");
                        }
                        Err(e) => {
                            tracing::error!("Error processing raw platform event: {}", e);
                        }
                    }
                }
            }
            Err(e) => {
                error_count += 1;
                // Only log errors every 30 seconds to reduce log spam
                if last_error_log.elapsed().as_secs() >= 30 {
                    tracing::warn!(
                        "Error receiving message from queue (error count: {}): {}",
                        error_count,
                        e
                    );
                    last_error_log = std::time::Instant::now();
                }
                let backoff =
                    Duration::from_secs(1 << error_count.min(5)).min(Duration::from_secs(30));
                tokio::time::sleep(backoff).await;
            }
        }
    }
}

async fn handle_raw_event(
    ctx: &InboxContext,
    registry: &AdapterRegistry,
    pipeline: &IngestionPipeline,
    payload: &[u8],
) -> Result<()> {
    let envelope: serde_json::Value = serde_json::from_slice(payload)?;

    let platform_raw = envelope
        .get("platform")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow!("Missing platform"))?;
    let platform = Platform::parse(platform_raw)
        .ok_or_else(|| anyhow!("Unknown platform: {}", platform_raw))?;

    let body = envelope
        .get("payload")
        .ok_or_else(|| anyhow!("Missing payload"))?;

    // Malformed payloads are dropped, not retried; the raw body is in
    // the log for replay.
    let events = match registry.normalize(platform, body) {
        Ok(events) => events,
        Err(e) => {
            tracing::warn!("Dropping unparseable {} payload: {}", platform.as_str(), e);
            return Ok(());
        }
    };

    for event in events {
        let account =
            match find_account(ctx, platform, &event.external_account_id).await? {
                Some(account) => account,
                None => {
                    tracing::warn!(
                        "No {} account connected for external id {}",
                        platform.as_str(),
                        event.external_account_id
                    );
                    continue;
                }
            };

        if let Err(e) = pipeline.ingest(&account, &event).await {
            tracing::error!(
                "Failed to ingest item {} for account {}: {}",
                event.platform_item_id,
                account.id,
                e
            );
        }
    }

    Ok(())
}

async fn find_account(
    ctx: &InboxContext,
    platform: Platform,
    external_account_id: &str,
) -> Result<Option<SocialAccount>> {
    let mut conn = ctx.db_pool.get().await?;

    let account = social_accounts::table
        .filter(social_accounts::platform.eq(platform.as_str()))
        .filter(social_accounts::external_account_id.eq(external_account_id))
        .select(SocialAccount::as_select())
        .first(&mut conn)
        .await
        .optional()?;

    Ok(account)
}
