use anyhow::Result;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use inbox_core::schema::{inbox_internal_notes, inbox_items};
use inbox_core::types::InternalNote;
use inbox_core::InboxContext;

pub enum NoteDelete {
    Deleted,
    Forbidden,
    NotFound,
}

/// Notes are append-only and visible to workspace members only.
/// Returns None when the item is not in the workspace.
pub async fn add_note(
    ctx: &InboxContext,
    workspace_id: i64,
    item_id: i64,
    user_id: i64,
    content: &str,
) -> Result<Option<InternalNote>> {
    let mut conn = ctx.db_pool.get().await?;

    let item_exists: Option<i64> = inbox_items::table
        .filter(inbox_items::id.eq(item_id))
        .filter(inbox_items::workspace_id.eq(workspace_id))
        .select(inbox_items::id)
        .first(&mut conn)
        .await
        .optional()?;

    if item_exists.is_none() {
        return Ok(None);
    }

    let note = diesel::insert_into(inbox_internal_notes::table)
        .values((
            inbox_internal_notes::workspace_id.eq(workspace_id),
            inbox_internal_notes::inbox_item_id.eq(item_id),
            inbox_internal_notes::user_id.eq(user_id),
            inbox_internal_notes::content.eq(content),
        ))
        .returning(InternalNote::as_returning())
        .get_result(&mut conn)
        .await?;

    Ok(Some(note))
}

pub async fn list_notes(
    ctx: &InboxContext,
    workspace_id: i64,
    item_id: i64,
) -> Result<Vec<InternalNote>> {
    let mut conn = ctx.db_pool.get().await?;

    let notes = inbox_internal_notes::table
        .filter(inbox_internal_notes::workspace_id.eq(workspace_id))
        .filter(inbox_internal_notes::inbox_item_id.eq(item_id))
        .order(inbox_internal_notes::created_at.asc())
        .select(InternalNote::as_select())
        .load(&mut conn)
        .await?;

    Ok(notes)
}

/// Only the author or a workspace admin may remove a note; content is
/// otherwise immutable once written.
pub async fn delete_note(
    ctx: &InboxContext,
    workspace_id: i64,
    note_id: i64,
    user_id: i64,
    is_admin: bool,
) -> Result<NoteDelete> {
    let mut conn = ctx.db_pool.get().await?;

    let author: Option<i64> = inbox_internal_notes::table
        .filter(inbox_internal_notes::id.eq(note_id))
        .filter(inbox_internal_notes::workspace_id.eq(workspace_id))
        .select(inbox_internal_notes::user_id)
        .first(&mut conn)
        .await
        .optional()?;

    let Some(author) = author else {
        return Ok(NoteDelete::NotFound);
    };

    if author != user_id && !is_admin {
        return Ok(NoteDelete::Forbidden);
    }

    diesel::delete(
        inbox_internal_notes::table
            .filter(inbox_internal_notes::id.eq(note_id))
            .filter(inbox_internal_notes::workspace_id.eq(workspace_id)),
    )
    .execute(&mut conn)
    .await?;

    Ok(NoteDelete::Deleted)
}
