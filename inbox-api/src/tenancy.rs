use axum::http::StatusCode;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use inbox_core::schema::workspace_members;
use inbox_core::InboxContext;
use tracing;

/// The tenancy disclosure contract: a caller who is not a member of the
/// workspace they addressed gets 403 regardless of whether the workspace
/// exists, and a resource id that is not in their workspace reads as 404
/// so cross-tenant probing cannot confirm existence.
pub async fn require_member(
    ctx: &InboxContext,
    workspace_id: i64,
    user_id: i64,
) -> Result<String, StatusCode> {
    let mut conn = ctx
        .db_pool
        .get()
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let role: Option<String> = workspace_members::table
        .filter(workspace_members::workspace_id.eq(workspace_id))
        .filter(workspace_members::user_id.eq(user_id))
        .select(workspace_members::role)
        .first(&mut conn)
        .await
        .optional()
        .map_err(|e| {
            tracing::error!("Membership lookup failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    role.ok_or(StatusCode::FORBIDDEN)
}

pub fn is_admin(role: &str) -> bool {
    role == "admin" || role == "owner"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_roles() {
        assert!(is_admin("admin"));
        assert!(is_admin("owner"));
        assert!(!is_admin("member"));
        assert!(!is_admin(""));
    }
}
