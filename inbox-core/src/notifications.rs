use anyhow::Result;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde_json::Value;
use tracing;

use crate::db::DbConnection;
use crate::schema::notifications;

/// Record a notification for the delivery collaborator to pick up. This
/// core never renders or delivers notifications, it only writes the rows.
pub async fn create_notification(
    conn: &mut DbConnection,
    workspace_id: i64,
    user_id: i64,
    notification_type: &str,
    title: &str,
    message: &str,
    data: Option<&Value>,
    action_url: Option<&str>,
) -> Result<()> {
    diesel::insert_into(notifications::table)
        .values((
            notifications::workspace_id.eq(workspace_id),
            notifications::user_id.eq(user_id),
            notifications::notification_type.eq(notification_type),
            notifications::title.eq(title),
            notifications::message.eq(message),
            notifications::data.eq(data),
            notifications::action_url.eq(action_url),
        ))
        .execute(conn)
        .await?;

    tracing::debug!(
        "Notification {} recorded for user {} in workspace {}",
        notification_type,
        user_id,
        workspace_id
    );

    Ok(())
}
