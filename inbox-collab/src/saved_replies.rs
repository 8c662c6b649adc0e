use anyhow::Result;
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use inbox_core::schema::saved_replies;
use inbox_core::types::SavedReply;
use inbox_core::InboxContext;

pub async fn create_saved_reply(
    ctx: &InboxContext,
    workspace_id: i64,
    title: &str,
    content: &str,
) -> Result<SavedReply> {
    let mut conn = ctx.db_pool.get().await?;

    let saved = diesel::insert_into(saved_replies::table)
        .values((
            saved_replies::workspace_id.eq(workspace_id),
            saved_replies::title.eq(title),
            saved_replies::content.eq(content),
            saved_replies::usage_count.eq(0),
        ))
        .returning(SavedReply::as_returning())
        .get_result(&mut conn)
        .await?;

    Ok(saved)
}

pub async fn list_saved_replies(ctx: &InboxContext, workspace_id: i64) -> Result<Vec<SavedReply>> {
    let mut conn = ctx.db_pool.get().await?;

    let saved = saved_replies::table
        .filter(saved_replies::workspace_id.eq(workspace_id))
        .order(saved_replies::title.asc())
        .select(SavedReply::as_select())
        .load(&mut conn)
        .await?;

    Ok(saved)
}

pub async fn delete_saved_reply(
    ctx: &InboxContext,
    workspace_id: i64,
    saved_reply_id: i64,
) -> Result<bool> {
    let mut conn = ctx.db_pool.get().await?;

    let deleted = diesel::delete(
        saved_replies::table
            .filter(saved_replies::id.eq(saved_reply_id))
            .filter(saved_replies::workspace_id.eq(workspace_id)),
    )
    .execute(&mut conn)
    .await?;

    Ok(deleted > 0)
}

/// Resolve a saved reply's content for an outgoing reply, counting the
/// use. Returns None when the id is not in the workspace.
pub async fn take_content(
    ctx: &InboxContext,
    workspace_id: i64,
    saved_reply_id: i64,
) -> Result<Option<String>> {
    let mut conn = ctx.db_pool.get().await?;

    let content: Option<String> = diesel::update(
        saved_replies::table
            .filter(saved_replies::id.eq(saved_reply_id))
            .filter(saved_replies::workspace_id.eq(workspace_id)),
    )
    .set((
        saved_replies::usage_count.eq(saved_replies::usage_count + 1),
        saved_replies::updated_at.eq(Utc::now()),
    ))
    .returning(saved_replies::content)
    .get_result(&mut conn)
    .await
    .optional()?;

    Ok(content)
}
