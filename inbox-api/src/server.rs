use anyhow::Result;
use axum::{
    extract::Extension,
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use inbox_core::InboxContext;
use std::env;
use std::net::SocketAddr;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing;

use crate::auth;
use crate::items;
use crate::resources;
use crate::webhooks;

async fn health() -> axum::response::Json<serde_json::Value> {
    axum::response::Json(serde_json::json!({
        "status": "ok",
        "service": "inbox-api"
    }))
}

pub async fn run(ctx: InboxContext) -> Result<()> {
    let api_port = ctx.config.server.api_port;
    let ctx_clone = ctx.clone();

    // Configure CORS - allow specific origins or all if CORS_ORIGINS not set
    let cors_layer = if let Ok(origins) = env::var("CORS_ORIGINS") {
        let origin_list: Vec<&str> = origins.split(',').map(|s| s.trim()).collect();
        let mut cors = CorsLayer::new();
        for origin in origin_list {
            if let Ok(parsed) = origin.parse::<axum::http::HeaderValue>() {
                cors = cors.allow_origin(parsed);
            }
        }
        cors.allow_methods(Any)
            .allow_headers(Any)
            .allow_credentials(true)
    } else {
        tracing::warn!("CORS_ORIGINS not set, using permissive CORS. Set CORS_ORIGINS for production!");
        CorsLayer::permissive()
    };

    let app = Router::new()
        .route("/health", get(health))
        .route("/webhooks/:platform", get(webhooks::verify_subscription))
        .route("/webhooks/:platform", post(webhooks::receive_webhook))
        .route(
            "/api/v1/workspaces/:workspace_id/items",
            get(items::list_items),
        )
        .route(
            "/api/v1/workspaces/:workspace_id/items/counts",
            get(items::get_item_counts),
        )
        .route(
            "/api/v1/workspaces/:workspace_id/items/bulk/read",
            post(items::bulk_mark_read),
        )
        .route(
            "/api/v1/workspaces/:workspace_id/items/bulk/resolve",
            post(items::bulk_resolve),
        )
        .route(
            "/api/v1/workspaces/:workspace_id/items/:item_id",
            get(items::get_item_detail),
        )
        .route(
            "/api/v1/workspaces/:workspace_id/items/:item_id/read",
            post(items::mark_read),
        )
        .route(
            "/api/v1/workspaces/:workspace_id/items/:item_id/resolve",
            post(items::resolve),
        )
        .route(
            "/api/v1/workspaces/:workspace_id/items/:item_id/reopen",
            post(items::reopen),
        )
        .route(
            "/api/v1/workspaces/:workspace_id/items/:item_id/archive",
            post(items::archive),
        )
        .route(
            "/api/v1/workspaces/:workspace_id/items/:item_id/assign",
            post(items::assign),
        )
        .route(
            "/api/v1/workspaces/:workspace_id/items/:item_id/unassign",
            post(items::unassign),
        )
        .route(
            "/api/v1/workspaces/:workspace_id/items/:item_id/replies",
            get(items::list_replies).post(items::create_reply),
        )
        .route(
            "/api/v1/workspaces/:workspace_id/items/:item_id/notes",
            get(items::list_notes).post(items::add_note),
        )
        .route(
            "/api/v1/workspaces/:workspace_id/notes/:note_id",
            delete(items::delete_note),
        )
        .route(
            "/api/v1/workspaces/:workspace_id/items/:item_id/tags/:tag_id",
            put(items::attach_tag).delete(items::detach_tag),
        )
        .route(
            "/api/v1/workspaces/:workspace_id/conversations",
            get(items::list_conversations),
        )
        .route(
            "/api/v1/workspaces/:workspace_id/rules",
            get(resources::list_rules).post(resources::create_rule),
        )
        .route(
            "/api/v1/workspaces/:workspace_id/rules/:rule_id",
            put(resources::update_rule).delete(resources::delete_rule),
        )
        .route(
            "/api/v1/workspaces/:workspace_id/rules/:rule_id/activate",
            post(resources::activate_rule),
        )
        .route(
            "/api/v1/workspaces/:workspace_id/rules/:rule_id/deactivate",
            post(resources::deactivate_rule),
        )
        .route(
            "/api/v1/workspaces/:workspace_id/tags",
            get(resources::list_tags).post(resources::create_tag),
        )
        .route(
            "/api/v1/workspaces/:workspace_id/tags/:tag_id",
            delete(resources::delete_tag),
        )
        .route(
            "/api/v1/workspaces/:workspace_id/saved-replies",
            get(resources::list_saved_replies).post(resources::create_saved_reply),
        )
        .route(
            "/api/v1/workspaces/:workspace_id/saved-replies/:saved_reply_id",
            delete(resources::delete_saved_reply),
        )
        .route(
            "/api/v1/workspaces/:workspace_id/contacts",
            get(resources::list_contacts),
        )
        .route(
            "/api/v1/workspaces/:workspace_id/post-targets/:post_target_id/metrics",
            get(resources::list_metric_snapshots).post(resources::record_metric_snapshot),
        )
        .route(
            "/api/v1/workspaces/:workspace_id/notifications",
            get(resources::list_notifications),
        )
        .route(
            "/api/v1/workspaces/:workspace_id/notifications/:notification_id/read",
            post(resources::mark_notification_read),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(Extension(ctx_clone))
                .layer(middleware::from_fn(auth::auth_middleware))
                .layer(cors_layer),
        );

    let addr = SocketAddr::from(([0, 0, 0, 0], api_port));
    tracing::info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
