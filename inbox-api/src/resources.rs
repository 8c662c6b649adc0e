use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use inbox_automation::conditions::TriggerConditions;
use inbox_collab::{saved_replies, tags};
use inbox_core::schema::{inbox_automation_rules, inbox_contacts, notifications};
use inbox_core::types::{
    ActionType, AutomationRule, InboxContact, NotificationRecord, TriggerType,
};
use inbox_core::InboxContext;
use inbox_metrics::{record_snapshot, MetricsInput};
use serde::Deserialize;
use tracing;

use crate::auth::AuthenticatedUser;
use crate::tenancy::require_member;

fn default_true() -> bool {
    true
}

fn default_object() -> serde_json::Value {
    serde_json::json!({})
}

#[derive(Deserialize)]
pub struct RuleRequest {
    pub name: String,
    pub trigger_type: String,
    #[serde(default = "default_object")]
    pub trigger_conditions: serde_json::Value,
    pub action_type: String,
    #[serde(default = "default_object")]
    pub action_params: serde_json::Value,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn validate_rule(req: &RuleRequest) -> Result<(), StatusCode> {
    if req.name.trim().is_empty() {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }
    if TriggerType::parse(&req.trigger_type).is_none() {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }
    if ActionType::parse(&req.action_type).is_none() {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }
    // Conditions are stored as written; reject shapes the engine could
    // never evaluate rather than letting the rule silently never match.
    if serde_json::from_value::<TriggerConditions>(req.trigger_conditions.clone()).is_err() {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }
    Ok(())
}

pub async fn list_rules(
    Extension(ctx): Extension<InboxContext>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(workspace_id): Path<i64>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    require_member(&ctx, workspace_id, user.user_id).await?;

    let mut conn = ctx
        .db_pool
        .get()
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let rules: Vec<AutomationRule> = inbox_automation_rules::table
        .filter(inbox_automation_rules::workspace_id.eq(workspace_id))
        .order((
            inbox_automation_rules::priority.desc(),
            inbox_automation_rules::created_at.asc(),
        ))
        .select(AutomationRule::as_select())
        .load(&mut conn)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(serde_json::json!({"rules": rules})))
}

pub async fn create_rule(
    Extension(ctx): Extension<InboxContext>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(workspace_id): Path<i64>,
    Json(req): Json<RuleRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), StatusCode> {
    require_member(&ctx, workspace_id, user.user_id).await?;
    validate_rule(&req)?;

    let mut conn = ctx
        .db_pool
        .get()
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let rule: AutomationRule = diesel::insert_into(inbox_automation_rules::table)
        .values((
            inbox_automation_rules::workspace_id.eq(workspace_id),
            inbox_automation_rules::name.eq(&req.name),
            inbox_automation_rules::trigger_type.eq(&req.trigger_type),
            inbox_automation_rules::trigger_conditions.eq(&req.trigger_conditions),
            inbox_automation_rules::action_type.eq(&req.action_type),
            inbox_automation_rules::action_params.eq(&req.action_params),
            inbox_automation_rules::priority.eq(req.priority),
            inbox_automation_rules::is_active.eq(req.is_active),
            inbox_automation_rules::execution_count.eq(0),
        ))
        .returning(AutomationRule::as_returning())
        .get_result(&mut conn)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create rule: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({"rule": rule}))))
}

pub async fn update_rule(
    Extension(ctx): Extension<InboxContext>,
    Extension(user): Extension<AuthenticatedUser>,
    Path((workspace_id, rule_id)): Path<(i64, i64)>,
    Json(req): Json<RuleRequest>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    require_member(&ctx, workspace_id, user.user_id).await?;
    validate_rule(&req)?;

    let mut conn = ctx
        .db_pool
        .get()
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let rule: Option<AutomationRule> = diesel::update(
        inbox_automation_rules::table
            .filter(inbox_automation_rules::id.eq(rule_id))
            .filter(inbox_automation_rules::workspace_id.eq(workspace_id)),
    )
    .set((
        inbox_automation_rules::name.eq(&req.name),
        inbox_automation_rules::trigger_type.eq(&req.trigger_type),
        inbox_automation_rules::trigger_conditions.eq(&req.trigger_conditions),
        inbox_automation_rules::action_type.eq(&req.action_type),
        inbox_automation_rules::action_params.eq(&req.action_params),
        inbox_automation_rules::priority.eq(req.priority),
        inbox_automation_rules::is_active.eq(req.is_active),
        inbox_automation_rules::updated_at.eq(Utc::now()),
    ))
    .returning(AutomationRule::as_returning())
    .get_result(&mut conn)
    .await
    .optional()
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let rule = rule.ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(serde_json::json!({"rule": rule})))
}

async fn set_rule_active(
    ctx: &InboxContext,
    workspace_id: i64,
    rule_id: i64,
    active: bool,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let mut conn = ctx
        .db_pool
        .get()
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let updated = diesel::update(
        inbox_automation_rules::table
            .filter(inbox_automation_rules::id.eq(rule_id))
            .filter(inbox_automation_rules::workspace_id.eq(workspace_id)),
    )
    .set((
        inbox_automation_rules::is_active.eq(active),
        inbox_automation_rules::updated_at.eq(Utc::now()),
    ))
    .execute(&mut conn)
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    if updated == 0 {
        return Err(StatusCode::NOT_FOUND);
    }

    Ok(Json(serde_json::json!({"status": "ok", "is_active": active})))
}

pub async fn activate_rule(
    Extension(ctx): Extension<InboxContext>,
    Extension(user): Extension<AuthenticatedUser>,
    Path((workspace_id, rule_id)): Path<(i64, i64)>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    require_member(&ctx, workspace_id, user.user_id).await?;
    set_rule_active(&ctx, workspace_id, rule_id, true).await
}

pub async fn deactivate_rule(
    Extension(ctx): Extension<InboxContext>,
    Extension(user): Extension<AuthenticatedUser>,
    Path((workspace_id, rule_id)): Path<(i64, i64)>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    require_member(&ctx, workspace_id, user.user_id).await?;
    set_rule_active(&ctx, workspace_id, rule_id, false).await
}

pub async fn delete_rule(
    Extension(ctx): Extension<InboxContext>,
    Extension(user): Extension<AuthenticatedUser>,
    Path((workspace_id, rule_id)): Path<(i64, i64)>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    require_member(&ctx, workspace_id, user.user_id).await?;

    let mut conn = ctx
        .db_pool
        .get()
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let deleted = diesel::delete(
        inbox_automation_rules::table
            .filter(inbox_automation_rules::id.eq(rule_id))
            .filter(inbox_automation_rules::workspace_id.eq(workspace_id)),
    )
    .execute(&mut conn)
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    if deleted == 0 {
        return Err(StatusCode::NOT_FOUND);
    }

    Ok(Json(serde_json::json!({"status": "ok"})))
}

#[derive(Deserialize)]
pub struct TagRequest {
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

pub async fn list_tags(
    Extension(ctx): Extension<InboxContext>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(workspace_id): Path<i64>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    require_member(&ctx, workspace_id, user.user_id).await?;

    let workspace_tags = tags::list_tags(&ctx, workspace_id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(serde_json::json!({"tags": workspace_tags})))
}

pub async fn create_tag(
    Extension(ctx): Extension<InboxContext>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(workspace_id): Path<i64>,
    Json(req): Json<TagRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), StatusCode> {
    require_member(&ctx, workspace_id, user.user_id).await?;

    if req.name.trim().is_empty() {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }

    let tag = tags::create_tag(&ctx, workspace_id, &req.name, req.color.as_deref())
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({"tag": tag}))))
}

pub async fn delete_tag(
    Extension(ctx): Extension<InboxContext>,
    Extension(user): Extension<AuthenticatedUser>,
    Path((workspace_id, tag_id)): Path<(i64, i64)>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    require_member(&ctx, workspace_id, user.user_id).await?;

    let deleted = tags::delete_tag(&ctx, workspace_id, tag_id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    if !deleted {
        return Err(StatusCode::NOT_FOUND);
    }

    Ok(Json(serde_json::json!({"status": "ok"})))
}

#[derive(Deserialize)]
pub struct SavedReplyRequest {
    pub title: String,
    pub content: String,
}

pub async fn list_saved_replies(
    Extension(ctx): Extension<InboxContext>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(workspace_id): Path<i64>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    require_member(&ctx, workspace_id, user.user_id).await?;

    let saved = saved_replies::list_saved_replies(&ctx, workspace_id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(serde_json::json!({"saved_replies": saved})))
}

pub async fn create_saved_reply(
    Extension(ctx): Extension<InboxContext>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(workspace_id): Path<i64>,
    Json(req): Json<SavedReplyRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), StatusCode> {
    require_member(&ctx, workspace_id, user.user_id).await?;

    if req.title.trim().is_empty() || req.content.trim().is_empty() {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }

    let saved = saved_replies::create_saved_reply(&ctx, workspace_id, &req.title, &req.content)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({"saved_reply": saved})),
    ))
}

pub async fn delete_saved_reply(
    Extension(ctx): Extension<InboxContext>,
    Extension(user): Extension<AuthenticatedUser>,
    Path((workspace_id, saved_reply_id)): Path<(i64, i64)>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    require_member(&ctx, workspace_id, user.user_id).await?;

    let deleted = saved_replies::delete_saved_reply(&ctx, workspace_id, saved_reply_id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    if !deleted {
        return Err(StatusCode::NOT_FOUND);
    }

    Ok(Json(serde_json::json!({"status": "ok"})))
}

#[derive(Deserialize)]
pub struct ContactsQuery {
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

pub async fn list_contacts(
    Extension(ctx): Extension<InboxContext>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(workspace_id): Path<i64>,
    Query(params): Query<ContactsQuery>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    require_member(&ctx, workspace_id, user.user_id).await?;

    let limit = params.limit.unwrap_or(50).min(100);
    let offset = params.offset.unwrap_or(0);

    let mut conn = ctx
        .db_pool
        .get()
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let mut query = inbox_contacts::table
        .filter(inbox_contacts::workspace_id.eq(workspace_id))
        .order(inbox_contacts::last_seen_at.desc())
        .limit(limit)
        .offset(offset)
        .select(InboxContact::as_select())
        .into_boxed();

    if let Some(platform) = &params.platform {
        query = query.filter(inbox_contacts::platform.eq(platform.clone()));
    }

    let contacts: Vec<InboxContact> = query
        .load(&mut conn)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(serde_json::json!({"contacts": contacts})))
}

#[derive(Deserialize)]
pub struct SnapshotsQuery {
    #[serde(default)]
    pub limit: Option<i64>,
}

pub async fn list_metric_snapshots(
    Extension(ctx): Extension<InboxContext>,
    Extension(user): Extension<AuthenticatedUser>,
    Path((workspace_id, post_target_id)): Path<(i64, i64)>,
    Query(params): Query<SnapshotsQuery>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    require_member(&ctx, workspace_id, user.user_id).await?;

    let limit = params.limit.unwrap_or(100).min(500);

    let snapshots = inbox_metrics::recorder::list_snapshots(&ctx, workspace_id, post_target_id, limit)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(serde_json::json!({"snapshots": snapshots})))
}

pub async fn record_metric_snapshot(
    Extension(ctx): Extension<InboxContext>,
    Extension(user): Extension<AuthenticatedUser>,
    Path((workspace_id, post_target_id)): Path<(i64, i64)>,
    Json(metrics): Json<MetricsInput>,
) -> Result<(StatusCode, Json<serde_json::Value>), StatusCode> {
    require_member(&ctx, workspace_id, user.user_id).await?;

    let snapshot = record_snapshot(&ctx, workspace_id, post_target_id, &metrics)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({"snapshot": snapshot})),
    ))
}

#[derive(Deserialize)]
pub struct NotificationsQuery {
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
    #[serde(default)]
    pub unread_only: Option<bool>,
}

pub async fn list_notifications(
    Extension(ctx): Extension<InboxContext>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(workspace_id): Path<i64>,
    Query(params): Query<NotificationsQuery>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    require_member(&ctx, workspace_id, user.user_id).await?;

    let limit = params.limit.unwrap_or(50).min(100);
    let offset = params.offset.unwrap_or(0);

    let mut conn = ctx
        .db_pool
        .get()
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let mut query = notifications::table
        .filter(notifications::workspace_id.eq(workspace_id))
        .filter(notifications::user_id.eq(user.user_id))
        .order(notifications::created_at.desc())
        .limit(limit)
        .offset(offset)
        .select(NotificationRecord::as_select())
        .into_boxed();

    if params.unread_only.unwrap_or(false) {
        query = query.filter(notifications::read_at.is_null());
    }

    let records: Vec<NotificationRecord> = query
        .load(&mut conn)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(serde_json::json!({"notifications": records})))
}

pub async fn mark_notification_read(
    Extension(ctx): Extension<InboxContext>,
    Extension(user): Extension<AuthenticatedUser>,
    Path((workspace_id, notification_id)): Path<(i64, i64)>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    require_member(&ctx, workspace_id, user.user_id).await?;

    let mut conn = ctx
        .db_pool
        .get()
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let updated = diesel::update(
        notifications::table
            .filter(notifications::id.eq(notification_id))
            .filter(notifications::workspace_id.eq(workspace_id))
            .filter(notifications::user_id.eq(user.user_id))
            .filter(notifications::read_at.is_null()),
    )
    .set(notifications::read_at.eq(Some(Utc::now())))
    .execute(&mut conn)
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    if updated == 0 {
        // Either unknown to this user or already read; report which.
        let exists: Option<i64> = notifications::table
            .filter(notifications::id.eq(notification_id))
            .filter(notifications::workspace_id.eq(workspace_id))
            .filter(notifications::user_id.eq(user.user_id))
            .select(notifications::id)
            .first(&mut conn)
            .await
            .optional()
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        return match exists {
            Some(_) => Ok(Json(serde_json::json!({"status": "already_read"}))),
            None => Err(StatusCode::NOT_FOUND),
        };
    }

    Ok(Json(serde_json::json!({"status": "ok"})))
}
