use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::Json,
};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use inbox_collab::notes::{self, NoteDelete};
use inbox_collab::replies::{CreateReplyRequest, ReplyError, ReplyService};
use inbox_collab::{items, tags};
use inbox_core::redis::get_unread_counts;
use inbox_core::schema::{inbox_conversations, inbox_items};
use inbox_core::status::ItemStatus;
use inbox_core::types::{InboxConversation, InboxItem, ItemType};
use inbox_core::InboxContext;
use serde::Deserialize;
use tracing;

use crate::auth::AuthenticatedUser;
use crate::tenancy::{is_admin, require_member};

#[derive(Deserialize)]
pub struct ItemsQuery {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub social_account_id: Option<i64>,
    #[serde(default)]
    pub assigned_to_user_id: Option<i64>,
    #[serde(default)]
    pub item_type: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

pub async fn list_items(
    Extension(ctx): Extension<InboxContext>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(workspace_id): Path<i64>,
    Query(params): Query<ItemsQuery>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    require_member(&ctx, workspace_id, user.user_id).await?;

    if let Some(status) = &params.status {
        if ItemStatus::parse(status).is_none() {
            return Err(StatusCode::BAD_REQUEST);
        }
    }
    if let Some(item_type) = &params.item_type {
        if ItemType::parse(item_type).is_none() {
            return Err(StatusCode::BAD_REQUEST);
        }
    }

    let limit = params.limit.unwrap_or(50).min(100);
    let offset = params.offset.unwrap_or(0);

    let mut conn = ctx
        .db_pool
        .get()
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let mut query = inbox_items::table
        .filter(inbox_items::workspace_id.eq(workspace_id))
        .order(inbox_items::platform_created_at.desc())
        .limit(limit)
        .offset(offset)
        .select(InboxItem::as_select())
        .into_boxed();

    if let Some(status) = &params.status {
        query = query.filter(inbox_items::status.eq(status.clone()));
    }
    if let Some(social_account_id) = params.social_account_id {
        query = query.filter(inbox_items::social_account_id.eq(social_account_id));
    }
    if let Some(assignee) = params.assigned_to_user_id {
        query = query.filter(inbox_items::assigned_to_user_id.eq(assignee));
    }
    if let Some(item_type) = &params.item_type {
        query = query.filter(inbox_items::item_type.eq(item_type.clone()));
    }

    let items: Vec<InboxItem> = query
        .load(&mut conn)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(serde_json::json!({"items": items})))
}

#[derive(Deserialize)]
pub struct CountsQuery {
    #[serde(default)]
    pub social_account_id: Option<i64>,
}

pub async fn get_item_counts(
    Extension(ctx): Extension<InboxContext>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(workspace_id): Path<i64>,
    Query(params): Query<CountsQuery>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    require_member(&ctx, workspace_id, user.user_id).await?;

    let (total, account) =
        get_unread_counts(&ctx.redis_pool, workspace_id, params.social_account_id)
            .await
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let mut result = serde_json::json!({"total_unread": total});
    if let Some(count) = account {
        result["account_unread"] = serde_json::json!(count);
    }

    Ok(Json(result))
}

pub async fn get_item_detail(
    Extension(ctx): Extension<InboxContext>,
    Extension(user): Extension<AuthenticatedUser>,
    Path((workspace_id, item_id)): Path<(i64, i64)>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    require_member(&ctx, workspace_id, user.user_id).await?;

    let item = items::get_item(&ctx, workspace_id, item_id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    let conversation: Option<InboxConversation> = match item.conversation_id {
        Some(conversation_id) => {
            let mut conn = ctx
                .db_pool
                .get()
                .await
                .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
            inbox_conversations::table
                .filter(inbox_conversations::id.eq(conversation_id))
                .filter(inbox_conversations::workspace_id.eq(workspace_id))
                .select(InboxConversation::as_select())
                .first(&mut conn)
                .await
                .optional()
                .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        }
        None => None,
    };

    let item_tags = tags::list_item_tags(&ctx, workspace_id, item_id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let item_notes = notes::list_notes(&ctx, workspace_id, item_id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let replies = ReplyService::new(ctx.clone())
        .list_replies(workspace_id, item_id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(serde_json::json!({
        "item": item,
        "conversation": conversation,
        "tags": item_tags,
        "notes": item_notes,
        "replies": replies,
    })))
}

/// Shared shape for the four transition endpoints. An illegal
/// transition is a 200 with `transitioned: false` and the unchanged
/// item, per the state machine contract; 404 is reserved for items the
/// workspace does not contain.
async fn transition(
    ctx: &InboxContext,
    workspace_id: i64,
    item_id: i64,
    to: ItemStatus,
    actor: Option<i64>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let current = items::get_item(ctx, workspace_id, item_id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    match items::apply_transition(ctx, workspace_id, item_id, to, actor).await {
        Ok(Some(updated)) => Ok(Json(
            serde_json::json!({"item": updated, "transitioned": true}),
        )),
        Ok(None) => Ok(Json(
            serde_json::json!({"item": current, "transitioned": false}),
        )),
        Err(e) => {
            tracing::error!("Transition failed for item {}: {}", item_id, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

pub async fn mark_read(
    Extension(ctx): Extension<InboxContext>,
    Extension(user): Extension<AuthenticatedUser>,
    Path((workspace_id, item_id)): Path<(i64, i64)>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    require_member(&ctx, workspace_id, user.user_id).await?;
    transition(&ctx, workspace_id, item_id, ItemStatus::Read, Some(user.user_id)).await
}

pub async fn resolve(
    Extension(ctx): Extension<InboxContext>,
    Extension(user): Extension<AuthenticatedUser>,
    Path((workspace_id, item_id)): Path<(i64, i64)>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    require_member(&ctx, workspace_id, user.user_id).await?;
    transition(
        &ctx,
        workspace_id,
        item_id,
        ItemStatus::Resolved,
        Some(user.user_id),
    )
    .await
}

/// Reopen is the RESOLVED -> READ edge; the transition table rejects it
/// from any other state.
pub async fn reopen(
    Extension(ctx): Extension<InboxContext>,
    Extension(user): Extension<AuthenticatedUser>,
    Path((workspace_id, item_id)): Path<(i64, i64)>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    require_member(&ctx, workspace_id, user.user_id).await?;
    transition(&ctx, workspace_id, item_id, ItemStatus::Read, Some(user.user_id)).await
}

pub async fn archive(
    Extension(ctx): Extension<InboxContext>,
    Extension(user): Extension<AuthenticatedUser>,
    Path((workspace_id, item_id)): Path<(i64, i64)>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    require_member(&ctx, workspace_id, user.user_id).await?;
    transition(
        &ctx,
        workspace_id,
        item_id,
        ItemStatus::Archived,
        Some(user.user_id),
    )
    .await
}

#[derive(Deserialize)]
pub struct AssignRequest {
    pub user_id: i64,
}

pub async fn assign(
    Extension(ctx): Extension<InboxContext>,
    Extension(user): Extension<AuthenticatedUser>,
    Path((workspace_id, item_id)): Path<(i64, i64)>,
    Json(req): Json<AssignRequest>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    require_member(&ctx, workspace_id, user.user_id).await?;

    // The assignee must belong to the workspace too.
    require_member(&ctx, workspace_id, req.user_id)
        .await
        .map_err(|_| StatusCode::UNPROCESSABLE_ENTITY)?;

    let item = items::assign(&ctx, workspace_id, item_id, req.user_id, Some(user.user_id))
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(serde_json::json!({"item": item})))
}

pub async fn unassign(
    Extension(ctx): Extension<InboxContext>,
    Extension(user): Extension<AuthenticatedUser>,
    Path((workspace_id, item_id)): Path<(i64, i64)>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    require_member(&ctx, workspace_id, user.user_id).await?;

    let item = items::unassign(&ctx, workspace_id, item_id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(serde_json::json!({"item": item})))
}

#[derive(Deserialize)]
pub struct BulkRequest {
    pub item_ids: Vec<i64>,
}

/// Bulk endpoints report the number of items actually moved; ids in a
/// state the transition table rejects are skipped, not errors.
pub async fn bulk_mark_read(
    Extension(ctx): Extension<InboxContext>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(workspace_id): Path<i64>,
    Json(req): Json<BulkRequest>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    require_member(&ctx, workspace_id, user.user_id).await?;

    let updated = items::bulk_mark_read(&ctx, workspace_id, &req.item_ids)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(serde_json::json!({"updated_count": updated})))
}

pub async fn bulk_resolve(
    Extension(ctx): Extension<InboxContext>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(workspace_id): Path<i64>,
    Json(req): Json<BulkRequest>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    require_member(&ctx, workspace_id, user.user_id).await?;

    let updated = items::bulk_resolve(&ctx, workspace_id, &req.item_ids, Some(user.user_id))
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(serde_json::json!({"updated_count": updated})))
}

#[derive(Deserialize)]
pub struct ReplyRequest {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub saved_reply_id: Option<i64>,
}

pub async fn create_reply(
    Extension(ctx): Extension<InboxContext>,
    Extension(user): Extension<AuthenticatedUser>,
    Path((workspace_id, item_id)): Path<(i64, i64)>,
    Json(req): Json<ReplyRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), StatusCode> {
    require_member(&ctx, workspace_id, user.user_id).await?;

    let request = CreateReplyRequest {
        content: req.content,
        saved_reply_id: req.saved_reply_id,
    };

    match ReplyService::new(ctx.clone())
        .create_reply(workspace_id, item_id, user.user_id, request)
        .await
    {
        Ok(reply) => Ok((StatusCode::CREATED, Json(serde_json::json!({"reply": reply})))),
        Err(ReplyError::ItemNotFound) => Err(StatusCode::NOT_FOUND),
        Err(ReplyError::NotReplyable)
        | Err(ReplyError::MissingCredential)
        | Err(ReplyError::EmptyContent) => Err(StatusCode::UNPROCESSABLE_ENTITY),
        Err(e) => {
            tracing::error!("Reply creation failed for item {}: {}", item_id, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

pub async fn list_replies(
    Extension(ctx): Extension<InboxContext>,
    Extension(user): Extension<AuthenticatedUser>,
    Path((workspace_id, item_id)): Path<(i64, i64)>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    require_member(&ctx, workspace_id, user.user_id).await?;

    let replies = ReplyService::new(ctx.clone())
        .list_replies(workspace_id, item_id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(serde_json::json!({"replies": replies})))
}

#[derive(Deserialize)]
pub struct NoteRequest {
    pub content: String,
}

pub async fn add_note(
    Extension(ctx): Extension<InboxContext>,
    Extension(user): Extension<AuthenticatedUser>,
    Path((workspace_id, item_id)): Path<(i64, i64)>,
    Json(req): Json<NoteRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), StatusCode> {
    require_member(&ctx, workspace_id, user.user_id).await?;

    if req.content.trim().is_empty() {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }

    let note = notes::add_note(&ctx, workspace_id, item_id, user.user_id, &req.content)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({"note": note}))))
}

pub async fn list_notes(
    Extension(ctx): Extension<InboxContext>,
    Extension(user): Extension<AuthenticatedUser>,
    Path((workspace_id, item_id)): Path<(i64, i64)>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    require_member(&ctx, workspace_id, user.user_id).await?;

    let item_notes = notes::list_notes(&ctx, workspace_id, item_id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(serde_json::json!({"notes": item_notes})))
}

pub async fn delete_note(
    Extension(ctx): Extension<InboxContext>,
    Extension(user): Extension<AuthenticatedUser>,
    Path((workspace_id, note_id)): Path<(i64, i64)>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let role = require_member(&ctx, workspace_id, user.user_id).await?;

    match notes::delete_note(&ctx, workspace_id, note_id, user.user_id, is_admin(&role))
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
    {
        NoteDelete::Deleted => Ok(Json(serde_json::json!({"status": "ok"}))),
        NoteDelete::Forbidden => Err(StatusCode::FORBIDDEN),
        NoteDelete::NotFound => Err(StatusCode::NOT_FOUND),
    }
}

pub async fn attach_tag(
    Extension(ctx): Extension<InboxContext>,
    Extension(user): Extension<AuthenticatedUser>,
    Path((workspace_id, item_id, tag_id)): Path<(i64, i64, i64)>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    require_member(&ctx, workspace_id, user.user_id).await?;

    let attached = tags::attach_tag(&ctx, workspace_id, item_id, tag_id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(serde_json::json!({"attached": attached})))
}

pub async fn detach_tag(
    Extension(ctx): Extension<InboxContext>,
    Extension(user): Extension<AuthenticatedUser>,
    Path((workspace_id, item_id, tag_id)): Path<(i64, i64, i64)>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    require_member(&ctx, workspace_id, user.user_id).await?;

    let detached = tags::detach_tag(&ctx, workspace_id, item_id, tag_id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    if !detached {
        return Err(StatusCode::NOT_FOUND);
    }

    Ok(Json(serde_json::json!({"status": "ok"})))
}

#[derive(Deserialize)]
pub struct ConversationsQuery {
    #[serde(default)]
    pub social_account_id: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

pub async fn list_conversations(
    Extension(ctx): Extension<InboxContext>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(workspace_id): Path<i64>,
    Query(params): Query<ConversationsQuery>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    require_member(&ctx, workspace_id, user.user_id).await?;

    let limit = params.limit.unwrap_or(50).min(100);
    let offset = params.offset.unwrap_or(0);

    let mut conn = ctx
        .db_pool
        .get()
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let mut query = inbox_conversations::table
        .filter(inbox_conversations::workspace_id.eq(workspace_id))
        .order(inbox_conversations::last_message_at.desc())
        .limit(limit)
        .offset(offset)
        .select(InboxConversation::as_select())
        .into_boxed();

    if let Some(social_account_id) = params.social_account_id {
        query = query.filter(inbox_conversations::social_account_id.eq(social_account_id));
    }
    if let Some(status) = &params.status {
        query = query.filter(inbox_conversations::status.eq(status.clone()));
    }

    let conversations: Vec<InboxConversation> = query
        .load(&mut conn)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(serde_json::json!({"conversations": conversations})))
}
