use anyhow::{anyhow, Result};
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use inbox_core::queue::TOPIC_REPLY_DISPATCH;
use inbox_core::schema::{inbox_items, inbox_replies, social_accounts};
use inbox_core::types::{InboxItem, InboxReply, SocialAccount};
use inbox_core::InboxContext;
use rdkafka::consumer::Consumer;
use rdkafka::Message;
use std::time::Duration;
use tracing;

use crate::outbound::{DispatchError, DispatcherRegistry};

/// Drains queued reply jobs and performs the platform calls. Replies are
/// dispatched here, off the request path, so webhook acknowledgment and
/// API latency never wait on a platform API.
pub async fn run(ctx: InboxContext) -> Result<()> {
    tracing::info!("Starting reply dispatch consumer");

    let consumer = ctx.create_consumer(Some("inbox-dispatch"))?;
    let registry = DispatcherRegistry::new(&ctx.config.dispatch)?;

    consumer.subscribe(&[TOPIC_REPLY_DISPATCH])?;

    tracing::info!("Subscribed to topic: {}", TOPIC_REPLY_DISPATCH);

    let mut error_count = 0u32;
    let mut last_error_log = std::time::Instant::now();

    loop {
        match consumer.recv().await {
            Ok(message) => {
                error_count = 0;
                if let Some(payload) = message.payload() {
                    match handle_dispatch(&ctx, &registry, payload).await {
                        Ok(_) => {
                            tracing::debug!("Processed reply dispatch job");
                        }
                        Err(e) => {
                            tracing::error!("Error processing reply dispatch job: {}", e);
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

async fn handle_dispatch(
    ctx: &InboxContext,
    registry: &DispatcherRegistry,
    payload: &[u8],
) -> Result<()> {
    let job: serde_json::Value = serde_json::from_slice(payload)?;

    let workspace_id = job
        .get("workspace_id")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| anyhow!("Missing workspace_id"))?;
    let reply_id = job
        .get("reply_id")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| anyhow!("Missing reply_id"))?;

    let mut conn = ctx.db_pool.get().await?;

    let Some(reply) = inbox_replies::table
        .filter(inbox_replies::id.eq(reply_id))
        .filter(inbox_replies::workspace_id.eq(workspace_id))
        .select(InboxReply::as_select())
        .first(&mut conn)
        .await
        .optional()?
    else {
        tracing::warn!("Dispatch job for unknown reply {}", reply_id);
        return Ok(());
    };

    // At-least-once delivery: a redelivered job for a finished reply is
    // a no-op.
    if reply.sent_at.is_some() || reply.failed_at.is_some() {
        tracing::debug!("Reply {} already dispatched, skipping", reply.id);
        return Ok(());
    }

    let item: InboxItem = inbox_items::table
        .filter(inbox_items::id.eq(reply.inbox_item_id))
        .select(InboxItem::as_select())
        .first(&mut conn)
        .await?;

    let account: SocialAccount = social_accounts::table
        .filter(social_accounts::id.eq(item.social_account_id))
        .select(SocialAccount::as_select())
        .first(&mut conn)
        .await?;

    let Some(platform) = account.platform_enum() else {
        mark_failed(&mut conn, reply.id, 0, "unknown platform").await?;
        return Ok(());
    };

    let Some(dispatcher) = registry.get(platform) else {
        mark_failed(&mut conn, reply.id, 0, "no dispatcher for platform").await?;
        return Ok(());
    };

    let timeout = Duration::from_secs(ctx.config.dispatch.reply_timeout_secs);
    let max_retries = ctx.config.dispatch.reply_max_retries;
    let mut attempts: u32 = 0;

    let outcome = loop {
        attempts += 1;

        // The hard timeout keeps a hung platform call from leaving the
        // reply in an unknown state; a timed-out attempt counts as failed.
        let result = tokio::time::timeout(
            timeout,
            dispatcher.send_reply(&account, &item.platform_item_id, &reply.content),
        )
        .await;

        let err = match result {
            Ok(Ok(external_id)) => break Ok(external_id),
            Ok(Err(e)) => e,
            Err(_) => DispatchError::TimedOut,
        };

        if !err.is_retryable() || attempts > max_retries {
            break Err(err);
        }

        tracing::warn!(
            "Reply {} dispatch attempt {} failed ({}), retrying",
            reply.id,
            attempts,
            err
        );
        let backoff = Duration::from_secs(1 << attempts.min(5));
        tokio::time::sleep(backoff).await;
    };

    match outcome {
        Ok(external_id) => {
            diesel::update(inbox_replies::table.filter(inbox_replies::id.eq(reply.id)))
                .set((
                    inbox_replies::platform_reply_id.eq(Some(external_id.as_str())),
                    inbox_replies::sent_at.eq(Some(Utc::now())),
                    inbox_replies::retry_count.eq((attempts - 1) as i32),
                ))
                .execute(&mut conn)
                .await?;

            tracing::info!("Reply {} sent as {}", reply.id, external_id);
        }
        Err(e) => {
            tracing::error!(
                "Reply {} permanently failed after {} attempts: {}",
                reply.id,
                attempts,
                e
            );
            mark_failed(&mut conn, reply.id, (attempts - 1) as i32, &e.to_string()).await?;
        }
    }

    Ok(())
}

async fn mark_failed(
    conn: &mut inbox_core::db::DbConnection,
    reply_id: i64,
    retry_count: i32,
    reason: &str,
) -> Result<()> {
    diesel::update(inbox_replies::table.filter(inbox_replies::id.eq(reply_id)))
        .set((
            inbox_replies::failed_at.eq(Some(Utc::now())),
            inbox_replies::failure_reason.eq(Some(reason)),
            inbox_replies::retry_count.eq(retry_count),
        ))
        .execute(conn)
        .await?;

    Ok(())
}
