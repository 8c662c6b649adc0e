use anyhow::{anyhow, Result};
use inbox_core::queue::TOPIC_METRIC_SNAPSHOTS;
use inbox_core::InboxContext;
use rdkafka::consumer::Consumer;
use rdkafka::Message;
use std::time::Duration;
use tracing;

use crate::recorder::{record_snapshot, MetricsInput};

pub async fn run(ctx: InboxContext) -> Result<()> {
    tracing::info!("Starting metrics consumer");

    let consumer = ctx.create_consumer(Some("inbox-metrics"))?;

    consumer.subscribe(&[TOPIC_METRIC_SNAPSHOTS])?;

    tracing::info!("Subscribed to topic: {}", TOPIC_METRIC_SNAPSHOTS);

    let mut error_count = 0u32;
    let mut last_error_log = std::time::Instant::now();

    loop {
        match consumer.recv().await {
            Ok(message) => {
                error_count = 0;
                if let Some(payload) = message.payload() {
                    match handle_snapshot(&ctx, payload).await {
                        Ok(_) => {
                            tracing::debug!("Recorded metric snapshot");
                        }
                        Err(e) => {
                            tracing::error!("Error recording metric snapshot: {}", e);
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

async fn handle_snapshot(ctx: &InboxContext, payload: &[u8]) -> Result<()> {
    let job: serde_json::Value = serde_json::from_slice(payload)?;

    let workspace_id = job
        .get("workspace_id")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| anyhow!("Missing workspace_id"))?;
    let post_target_id = job
        .get("post_target_id")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| anyhow!("Missing post_target_id"))?;

    let metrics: MetricsInput = serde_json::from_value(
        job.get("metrics")
            .cloned()
            .ok_or_else(|| anyhow!("Missing metrics"))?,
    )?;

    if record_snapshot(ctx, workspace_id, post_target_id, &metrics)
        .await?
        .is_none()
    {
        tracing::warn!(
            "Dropping snapshot for unknown post target {} in workspace {}",
            post_target_id,
            workspace_id
        );
    }

    Ok(())
}
