use anyhow::Result;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use inbox_core::schema::{post_metric_snapshots, post_targets};
use inbox_core::types::PostMetricSnapshot;
use inbox_core::InboxContext;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsInput {
    pub likes: i32,
    pub comments: i32,
    pub shares: i32,
    pub impressions: i32,
    pub reach: i32,
    #[serde(default)]
    pub captured_at: Option<DateTime<Utc>>,
}

/// Interactions per impression, as a percentage. Posts with no
/// impressions yet have no rate rather than a zero one.
pub fn engagement_rate(likes: i32, comments: i32, shares: i32, impressions: i32) -> Option<f64> {
    if impressions <= 0 {
        return None;
    }
    let interactions = (likes + comments + shares) as f64;
    Some(interactions / impressions as f64 * 100.0)
}

/// Append one time-series row. Snapshots are never mutated after
/// insert. Returns None when the post target is not in the workspace.
pub async fn record_snapshot(
    ctx: &InboxContext,
    workspace_id: i64,
    post_target_id: i64,
    metrics: &MetricsInput,
) -> Result<Option<PostMetricSnapshot>> {
    let mut conn = ctx.db_pool.get().await?;

    let target_exists: Option<i64> = post_targets::table
        .filter(post_targets::id.eq(post_target_id))
        .filter(post_targets::workspace_id.eq(workspace_id))
        .select(post_targets::id)
        .first(&mut conn)
        .await
        .optional()?;

    if target_exists.is_none() {
        return Ok(None);
    }

    let captured_at = metrics.captured_at.unwrap_or_else(Utc::now);
    let rate = engagement_rate(
        metrics.likes,
        metrics.comments,
        metrics.shares,
        metrics.impressions,
    );

    let snapshot = diesel::insert_into(post_metric_snapshots::table)
        .values((
            post_metric_snapshots::workspace_id.eq(workspace_id),
            post_metric_snapshots::post_target_id.eq(post_target_id),
            post_metric_snapshots::likes.eq(metrics.likes),
            post_metric_snapshots::comments.eq(metrics.comments),
            post_metric_snapshots::shares.eq(metrics.shares),
            post_metric_snapshots::impressions.eq(metrics.impressions),
            post_metric_snapshots::reach.eq(metrics.reach),
            post_metric_snapshots::engagement_rate.eq(rate),
            post_metric_snapshots::captured_at.eq(captured_at),
        ))
        .returning(PostMetricSnapshot::as_returning())
        .get_result(&mut conn)
        .await?;

    Ok(Some(snapshot))
}

pub async fn list_snapshots(
    ctx: &InboxContext,
    workspace_id: i64,
    post_target_id: i64,
    limit: i64,
) -> Result<Vec<PostMetricSnapshot>> {
    let mut conn = ctx.db_pool.get().await?;

    let snapshots = post_metric_snapshots::table
        .filter(post_metric_snapshots::workspace_id.eq(workspace_id))
        .filter(post_metric_snapshots::post_target_id.eq(post_target_id))
        .order(post_metric_snapshots::captured_at.desc())
        .limit(limit)
        .select(PostMetricSnapshot::as_select())
        .load(&mut conn)
        .await?;

    Ok(snapshots)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engagement_rate() {
        assert_eq!(engagement_rate(10, 5, 5, 200), Some(10.0));
        assert_eq!(engagement_rate(0, 0, 0, 100), Some(0.0));
    }

    #[test]
    fn test_no_rate_without_impressions() {
        assert_eq!(engagement_rate(10, 5, 5, 0), None);
        assert_eq!(engagement_rate(10, 5, 5, -1), None);
    }
}
