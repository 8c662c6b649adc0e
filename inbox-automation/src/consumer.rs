use anyhow::{anyhow, Result};
use inbox_core::queue::TOPIC_ITEMS_CREATED;
use inbox_core::InboxContext;
use rdkafka::consumer::Consumer;
use rdkafka::Message;
use std::time::Duration;
use tracing;

use crate::engine::AutomationEngine;

pub async fn run(ctx: InboxContext) -> Result<()> {
    tracing::info!("Starting automation consumer");

    let consumer = ctx.create_consumer(Some("inbox-automation"))?;
    let engine = AutomationEngine::new(ctx.clone());

    consumer.subscribe(&[TOPIC_ITEMS_CREATED])?;

    tracing::info!("Subscribed to topic: {}", TOPIC_ITEMS_CREATED);

    let mut error_count = 0u32;
    let mut last_error_log = std::time::Instant::now();

    loop {
        match consumer.recv().await {
            Ok(message) => {
                error_count = 0;
                if let Some(payload) = message.payload() {
                    match handle_item_created(&engine, payload).await {
                        Ok(fired) => {
                            if !fired.is_empty() {
                                tracing::info!("Automation fired rules: {:?}", fired);
                            }
                        }
                        Err(e) => {
                            tracing::error!("Error evaluating automation rules: {}", e);
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

async fn handle_item_created(engine: &AutomationEngine, payload: &[u8]) -> Result<Vec<i64>> {
    let event: serde_json::Value = serde_json::from_slice(payload)?;

    let workspace_id = event
        .get("workspace_id")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| anyhow!("Missing workspace_id"))?;

    let item_id = event
        .get("item_id")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| anyhow!("Missing item_id"))?;

    engine.evaluate(workspace_id, item_id).await
}
