use anyhow::Result;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use inbox_core::db::DbConnection;
use inbox_core::notifications::create_notification;
use inbox_core::redis::decrement_unread;
use inbox_core::schema::inbox_items;
use inbox_core::status::{can_transition, ItemStatus};
use inbox_core::types::InboxItem;
use inbox_core::InboxContext;
use tracing;

pub async fn get_item(
    ctx: &InboxContext,
    workspace_id: i64,
    item_id: i64,
) -> Result<Option<InboxItem>> {
    let mut conn = ctx.db_pool.get().await?;
    fetch(&mut conn, workspace_id, item_id).await
}

/// Apply a status transition if the table allows it. Illegal or raced
/// transitions return None without mutating anything; callers check the
/// result instead of catching errors. The compare-and-swap on the source
/// status makes the legality check and the race guard one artifact.
pub async fn apply_transition(
    ctx: &InboxContext,
    workspace_id: i64,
    item_id: i64,
    to: ItemStatus,
    actor_user_id: Option<i64>,
) -> Result<Option<InboxItem>> {
    let mut conn = ctx.db_pool.get().await?;

    let Some(item) = fetch(&mut conn, workspace_id, item_id).await? else {
        return Ok(None);
    };

    let Some(from) = item.status_enum() else {
        tracing::warn!("Item {} has unknown status {:?}", item_id, item.status);
        return Ok(None);
    };

    if !can_transition(from, to) {
        tracing::debug!(
            "Rejected transition {} -> {} for item {}",
            from.as_str(),
            to.as_str(),
            item_id
        );
        return Ok(None);
    }

    let now = Utc::now();
    let scope = inbox_items::table
        .filter(inbox_items::id.eq(item_id))
        .filter(inbox_items::workspace_id.eq(workspace_id))
        .filter(inbox_items::status.eq(from.as_str()));

    let updated = match (from, to) {
        // Reopening clears the resolution stamps.
        (ItemStatus::Resolved, ItemStatus::Read) => {
            diesel::update(scope)
                .set((
                    inbox_items::status.eq(to.as_str()),
                    inbox_items::resolved_at.eq(None::<DateTime<Utc>>),
                    inbox_items::resolved_by_user_id.eq(None::<i64>),
                    inbox_items::updated_at.eq(now),
                ))
                .execute(&mut conn)
                .await?
        }
        (_, ItemStatus::Resolved) => {
            diesel::update(scope)
                .set((
                    inbox_items::status.eq(to.as_str()),
                    inbox_items::resolved_at.eq(Some(now)),
                    inbox_items::resolved_by_user_id.eq(actor_user_id),
                    inbox_items::updated_at.eq(now),
                ))
                .execute(&mut conn)
                .await?
        }
        _ => {
            diesel::update(scope)
                .set((
                    inbox_items::status.eq(to.as_str()),
                    inbox_items::updated_at.eq(now),
                ))
                .execute(&mut conn)
                .await?
        }
    };

    if updated == 0 {
        // A concurrent transition moved the item first.
        return Ok(None);
    }

    if from == ItemStatus::Unread {
        if let Err(e) = decrement_unread(&ctx.redis_pool, workspace_id, item.social_account_id).await
        {
            tracing::warn!("Failed to decrement unread counters: {}", e);
        }
    }

    fetch(&mut conn, workspace_id, item_id).await
}

/// Assignment is orthogonal to status and is allowed in any state.
pub async fn assign(
    ctx: &InboxContext,
    workspace_id: i64,
    item_id: i64,
    assignee_user_id: i64,
    assigned_by: Option<i64>,
) -> Result<Option<InboxItem>> {
    let mut conn = ctx.db_pool.get().await?;
    let now = Utc::now();

    let updated = diesel::update(
        inbox_items::table
            .filter(inbox_items::id.eq(item_id))
            .filter(inbox_items::workspace_id.eq(workspace_id)),
    )
    .set((
        inbox_items::assigned_to_user_id.eq(Some(assignee_user_id)),
        inbox_items::assigned_at.eq(Some(now)),
        inbox_items::updated_at.eq(now),
    ))
    .execute(&mut conn)
    .await?;

    if updated == 0 {
        return Ok(None);
    }

    if assigned_by != Some(assignee_user_id) {
        let result = create_notification(
            &mut conn,
            workspace_id,
            assignee_user_id,
            "inbox.item_assigned",
            "Inbox item assigned",
            "An inbox item was assigned to you",
            Some(&serde_json::json!({"item_id": item_id})),
            None,
        )
        .await;
        if let Err(e) = result {
            tracing::warn!("Failed to record assignment notification: {}", e);
        }
    }

    fetch(&mut conn, workspace_id, item_id).await
}

pub async fn unassign(
    ctx: &InboxContext,
    workspace_id: i64,
    item_id: i64,
) -> Result<Option<InboxItem>> {
    let mut conn = ctx.db_pool.get().await?;
    let now = Utc::now();

    let updated = diesel::update(
        inbox_items::table
            .filter(inbox_items::id.eq(item_id))
            .filter(inbox_items::workspace_id.eq(workspace_id)),
    )
    .set((
        inbox_items::assigned_to_user_id.eq(None::<i64>),
        inbox_items::assigned_at.eq(None::<DateTime<Utc>>),
        inbox_items::updated_at.eq(now),
    ))
    .execute(&mut conn)
    .await?;

    if updated == 0 {
        return Ok(None);
    }

    fetch(&mut conn, workspace_id, item_id).await
}

/// Bulk operations run the same transition per id in one statement: the
/// source-status guard is the only legal source the table allows for the
/// target, so incompatible items fall out of the predicate instead of
/// erroring. The returned count reflects rows actually moved.
pub async fn bulk_mark_read(
    ctx: &InboxContext,
    workspace_id: i64,
    item_ids: &[i64],
) -> Result<usize> {
    let mut conn = ctx.db_pool.get().await?;
    let now = Utc::now();

    let accounts: Vec<i64> = diesel::update(
        inbox_items::table
            .filter(inbox_items::workspace_id.eq(workspace_id))
            .filter(inbox_items::id.eq_any(item_ids))
            .filter(inbox_items::status.eq(ItemStatus::Unread.as_str())),
    )
    .set((
        inbox_items::status.eq(ItemStatus::Read.as_str()),
        inbox_items::updated_at.eq(now),
    ))
    .returning(inbox_items::social_account_id)
    .get_results(&mut conn)
    .await?;

    for social_account_id in &accounts {
        if let Err(e) = decrement_unread(&ctx.redis_pool, workspace_id, *social_account_id).await {
            tracing::warn!("Failed to decrement unread counters: {}", e);
        }
    }

    Ok(accounts.len())
}

pub async fn bulk_resolve(
    ctx: &InboxContext,
    workspace_id: i64,
    item_ids: &[i64],
    actor_user_id: Option<i64>,
) -> Result<usize> {
    let mut conn = ctx.db_pool.get().await?;
    let now = Utc::now();

    let updated = diesel::update(
        inbox_items::table
            .filter(inbox_items::workspace_id.eq(workspace_id))
            .filter(inbox_items::id.eq_any(item_ids))
            .filter(inbox_items::status.eq(ItemStatus::Read.as_str())),
    )
    .set((
        inbox_items::status.eq(ItemStatus::Resolved.as_str()),
        inbox_items::resolved_at.eq(Some(now)),
        inbox_items::resolved_by_user_id.eq(actor_user_id),
        inbox_items::updated_at.eq(now),
    ))
    .execute(&mut conn)
    .await?;

    Ok(updated)
}

async fn fetch(
    conn: &mut DbConnection,
    workspace_id: i64,
    item_id: i64,
) -> Result<Option<InboxItem>> {
    let item = inbox_items::table
        .filter(inbox_items::id.eq(item_id))
        .filter(inbox_items::workspace_id.eq(workspace_id))
        .select(InboxItem::as_select())
        .first(conn)
        .await
        .optional()?;

    Ok(item)
}
