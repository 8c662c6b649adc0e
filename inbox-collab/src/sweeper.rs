use anyhow::Result;
use chrono::{Duration as ChronoDuration, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use inbox_core::schema::inbox_items;
use inbox_core::status::ItemStatus;
use inbox_core::InboxContext;
use std::time::Duration;
use tracing;

const SWEEP_BATCH_SIZE: i64 = 500;

/// Periodically archives items that have sat in RESOLVED past the
/// retention window. Archival goes through the normal transition path,
/// not around it.
pub async fn run(ctx: InboxContext) -> Result<()> {
    tracing::info!(
        "Starting archival sweeper (archive after {} days)",
        ctx.config.sweeper.archive_after_days
    );

    let interval = Duration::from_secs(ctx.config.sweeper.interval_secs);

    loop {
        match sweep(&ctx).await {
            Ok(0) => {}
            Ok(archived) => {
                tracing::info!("Archived {} long-resolved items", archived);
            }
            Err(e) => {
                tracing::error!("Error in archival sweep: {}", e);
            }
        }

        tokio::time::sleep(interval).await;
    }
}

pub async fn sweep(ctx: &InboxContext) -> Result<usize> {
    let cutoff = Utc::now() - ChronoDuration::days(ctx.config.sweeper.archive_after_days);

    let candidates: Vec<(i64, i64)> = {
        let mut conn = ctx.db_pool.get().await?;
        inbox_items::table
            .filter(inbox_items::status.eq(ItemStatus::Resolved.as_str()))
            .filter(inbox_items::resolved_at.is_not_null())
            .filter(inbox_items::resolved_at.le(cutoff))
            .order(inbox_items::resolved_at.asc())
            .limit(SWEEP_BATCH_SIZE)
            .select((inbox_items::id, inbox_items::workspace_id))
            .load(&mut conn)
            .await?
    };

    let mut archived = 0;
    for (item_id, workspace_id) in candidates {
        match crate::items::apply_transition(ctx, workspace_id, item_id, ItemStatus::Archived, None)
            .await
        {
            Ok(Some(_)) => archived += 1,
            // Reopened or already archived since the scan; nothing to do.
            Ok(None) => {}
            Err(e) => {
                tracing::warn!("Failed to archive item {}: {}", item_id, e);
            }
        }
    }

    Ok(archived)
}
