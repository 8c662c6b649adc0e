use axum::{
    body::Bytes,
    extract::{Extension, Path, Query},
    http::{HeaderMap, StatusCode},
    response::Json,
};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use inbox_core::schema::social_accounts;
use inbox_core::signature::verify_webhook_signature;
use inbox_core::types::{Platform, SocialAccount};
use inbox_core::InboxContext;
use inbox_ingest::{AdapterRegistry, IngestionPipeline};
use std::collections::HashMap;
use tracing;

/// Subscription handshake used by the Graph API platforms: echo the
/// challenge when the verify token matches.
pub async fn verify_subscription(
    Extension(ctx): Extension<InboxContext>,
    Path(platform): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<String, StatusCode> {
    if Platform::parse(&platform).is_none() {
        return Err(StatusCode::NOT_FOUND);
    }

    let expected = ctx
        .config
        .webhooks
        .subscription_verify_token
        .as_deref()
        .ok_or(StatusCode::FORBIDDEN)?;

    let mode = params.get("hub.mode").map(String::as_str);
    let token = params.get("hub.verify_token").map(String::as_str);
    let challenge = params.get("hub.challenge");

    if mode == Some("subscribe") && token == Some(expected) {
        if let Some(challenge) = challenge {
            return Ok(challenge.clone());
        }
    }

    Err(StatusCode::FORBIDDEN)
}

/// Webhook ingress. The signature is verified against the raw body
/// before any parsing; an invalid signature is the only failure that
/// rejects the delivery. Malformed payloads are logged and dropped with
/// a 200 so the platform stops redelivering them.
pub async fn receive_webhook(
    Extension(ctx): Extension<InboxContext>,
    Path(platform): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let platform = Platform::parse(&platform).ok_or(StatusCode::NOT_FOUND)?;

    let secret = platform_secret(&ctx, platform).ok_or_else(|| {
        tracing::warn!("No webhook secret configured for {}", platform.as_str());
        StatusCode::FORBIDDEN
    })?;

    let provided = headers
        .get(signature_header(platform))
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::FORBIDDEN)?;

    if let Err(e) = verify_webhook_signature(&secret, &body, provided) {
        tracing::warn!("Rejected {} webhook: {}", platform.as_str(), e);
        return Err(StatusCode::FORBIDDEN);
    }

    let payload: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!("Dropping non-JSON {} webhook body: {}", platform.as_str(), e);
            return Ok(Json(serde_json::json!({"status": "dropped"})));
        }
    };

    let registry = AdapterRegistry::new();
    let events = match registry.normalize(platform, &payload) {
        Ok(events) => events,
        Err(e) => {
            tracing::warn!("Dropping unparseable {} payload: {}", platform.as_str(), e);
            return Ok(Json(serde_json::json!({"status": "dropped"})));
        }
    };

    let pipeline = IngestionPipeline::new(ctx.clone());
    let mut ingested = 0;
    let mut item_ids = Vec::new();

    for event in &events {
        let account = match find_account(&ctx, platform, &event.external_account_id).await {
            Ok(Some(account)) => account,
            Ok(None) => {
                tracing::warn!(
                    "No {} account connected for external id {}",
                    platform.as_str(),
                    event.external_account_id
                );
                continue;
            }
            Err(e) => {
                tracing::error!("Account lookup failed: {}", e);
                return Err(StatusCode::INTERNAL_SERVER_ERROR);
            }
        };

        match pipeline.ingest(&account, event).await {
            Ok(outcome) => {
                if outcome.created {
                    ingested += 1;
                }
                item_ids.push(outcome.item.id);
            }
            // One bad event must not fail the whole delivery; the rest
            // of the batch still lands.
            Err(e) => {
                tracing::error!(
                    "Failed to ingest item {} for account {}: {}",
                    event.platform_item_id,
                    account.id,
                    e
                );
            }
        }
    }

    Ok(Json(serde_json::json!({
        "status": "ok",
        "received": events.len(),
        "ingested": ingested,
        "item_ids": item_ids,
    })))
}

fn platform_secret(ctx: &InboxContext, platform: Platform) -> Option<String> {
    let webhooks = &ctx.config.webhooks;
    match platform {
        Platform::Facebook => webhooks.facebook_app_secret.clone(),
        Platform::Instagram => webhooks.instagram_app_secret.clone(),
        Platform::Twitter => webhooks.twitter_app_secret.clone(),
        Platform::Linkedin => webhooks.linkedin_app_secret.clone(),
    }
}

fn signature_header(platform: Platform) -> &'static str {
    match platform {
        Platform::Facebook | Platform::Instagram => "x-hub-signature-256",
        Platform::Twitter => "x-twitter-webhooks-signature",
        Platform::Linkedin => "x-li-signature",
    }
}

async fn find_account(
    ctx: &InboxContext,
    platform: Platform,
    external_account_id: &str,
) -> anyhow::Result<Option<SocialAccount>> {
    let mut conn = ctx.db_pool.get().await?;

    let account = social_accounts::table
        .filter(social_accounts::platform.eq(platform.as_str()))
        .filter(social_accounts::external_account_id.eq(external_account_id))
        .select(SocialAccount::as_select())
        .first(&mut conn)
        .await
        .optional()?;

    Ok(account)
}
