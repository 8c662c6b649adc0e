use anyhow::Result;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use inbox_core::schema::{inbox_item_tags, inbox_items, inbox_tags};
use inbox_core::types::InboxTag;
use inbox_core::InboxContext;

pub async fn create_tag(
    ctx: &InboxContext,
    workspace_id: i64,
    name: &str,
    color: Option<&str>,
) -> Result<InboxTag> {
    let mut conn = ctx.db_pool.get().await?;

    let tag = diesel::insert_into(inbox_tags::table)
        .values((
            inbox_tags::workspace_id.eq(workspace_id),
            inbox_tags::name.eq(name),
            inbox_tags::color.eq(color),
        ))
        .returning(InboxTag::as_returning())
        .get_result(&mut conn)
        .await?;

    Ok(tag)
}

pub async fn list_tags(ctx: &InboxContext, workspace_id: i64) -> Result<Vec<InboxTag>> {
    let mut conn = ctx.db_pool.get().await?;

    let tags = inbox_tags::table
        .filter(inbox_tags::workspace_id.eq(workspace_id))
        .order(inbox_tags::name.asc())
        .select(InboxTag::as_select())
        .load(&mut conn)
        .await?;

    Ok(tags)
}

pub async fn delete_tag(ctx: &InboxContext, workspace_id: i64, tag_id: i64) -> Result<bool> {
    let mut conn = ctx.db_pool.get().await?;

    let owned: Option<i64> = inbox_tags::table
        .filter(inbox_tags::id.eq(tag_id))
        .filter(inbox_tags::workspace_id.eq(workspace_id))
        .select(inbox_tags::id)
        .first(&mut conn)
        .await
        .optional()?;

    if owned.is_none() {
        return Ok(false);
    }

    diesel::delete(inbox_item_tags::table.filter(inbox_item_tags::tag_id.eq(tag_id)))
        .execute(&mut conn)
        .await?;
    diesel::delete(inbox_tags::table.filter(inbox_tags::id.eq(tag_id)))
        .execute(&mut conn)
        .await?;

    Ok(true)
}

/// Attach is idempotent: re-attaching an already attached tag is a
/// no-op success. Returns None when the item or tag is not in the
/// workspace, Some(newly_attached) otherwise.
pub async fn attach_tag(
    ctx: &InboxContext,
    workspace_id: i64,
    item_id: i64,
    tag_id: i64,
) -> Result<Option<bool>> {
    let mut conn = ctx.db_pool.get().await?;

    let item_exists: Option<i64> = inbox_items::table
        .filter(inbox_items::id.eq(item_id))
        .filter(inbox_items::workspace_id.eq(workspace_id))
        .select(inbox_items::id)
        .first(&mut conn)
        .await
        .optional()?;

    let tag_exists: Option<i64> = inbox_tags::table
        .filter(inbox_tags::id.eq(tag_id))
        .filter(inbox_tags::workspace_id.eq(workspace_id))
        .select(inbox_tags::id)
        .first(&mut conn)
        .await
        .optional()?;

    if item_exists.is_none() || tag_exists.is_none() {
        return Ok(None);
    }

    let inserted = diesel::insert_into(inbox_item_tags::table)
        .values((
            inbox_item_tags::inbox_item_id.eq(item_id),
            inbox_item_tags::tag_id.eq(tag_id),
        ))
        .on_conflict((inbox_item_tags::inbox_item_id, inbox_item_tags::tag_id))
        .do_nothing()
        .execute(&mut conn)
        .await?;

    Ok(Some(inserted > 0))
}

pub async fn detach_tag(
    ctx: &InboxContext,
    workspace_id: i64,
    item_id: i64,
    tag_id: i64,
) -> Result<bool> {
    let mut conn = ctx.db_pool.get().await?;

    let owned: Option<i64> = inbox_tags::table
        .filter(inbox_tags::id.eq(tag_id))
        .filter(inbox_tags::workspace_id.eq(workspace_id))
        .select(inbox_tags::id)
        .first(&mut conn)
        .await
        .optional()?;

    if owned.is_none() {
        return Ok(false);
    }

    let deleted = diesel::delete(
        inbox_item_tags::table
            .filter(inbox_item_tags::inbox_item_id.eq(item_id))
            .filter(inbox_item_tags::tag_id.eq(tag_id)),
    )
    .execute(&mut conn)
    .await?;

    Ok(deleted > 0)
}

pub async fn list_item_tags(
    ctx: &InboxContext,
    workspace_id: i64,
    item_id: i64,
) -> Result<Vec<InboxTag>> {
    let mut conn = ctx.db_pool.get().await?;

    let tags = inbox_item_tags::table
        .inner_join(inbox_tags::table)
        .filter(inbox_item_tags::inbox_item_id.eq(item_id))
        .filter(inbox_tags::workspace_id.eq(workspace_id))
        .order(inbox_tags::name.asc())
        .select(InboxTag::as_select())
        .load(&mut conn)
        .await?;

    Ok(tags)
}
