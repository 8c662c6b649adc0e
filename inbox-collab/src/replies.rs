use anyhow::anyhow;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use inbox_core::queue::{produce_message, TOPIC_REPLY_DISPATCH};
use inbox_core::schema::{inbox_items, inbox_replies, social_accounts};
use inbox_core::types::{InboxItem, InboxReply, SocialAccount};
use inbox_core::InboxContext;
use thiserror::Error;
use tracing;

use crate::saved_replies;

#[derive(Debug, Error)]
pub enum ReplyError {
    #[error("item not found")]
    ItemNotFound,
    #[error("item type does not support replies")]
    NotReplyable,
    #[error("social account has no usable access token")]
    MissingCredential,
    #[error("reply content is empty")]
    EmptyContent,
    #[error(transparent)]
    Database(#[from] diesel::result::Error),
    #[error(transparent)]
    Pool(#[from] diesel_async::pooled_connection::deadpool::PoolError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Default)]
pub struct CreateReplyRequest {
    pub content: Option<String>,
    pub saved_reply_id: Option<i64>,
}

pub struct ReplyService {
    ctx: InboxContext,
}

impl ReplyService {
    pub fn new(ctx: InboxContext) -> Self {
        Self { ctx }
    }

    /// Create a reply row and hand it to the dispatch consumer. The row
    /// is the audit record of the attempt and exists whether or not the
    /// platform call later succeeds; the gates here reject attempts that
    /// can never be dispatched.
    pub async fn create_reply(
        &self,
        workspace_id: i64,
        item_id: i64,
        user_id: i64,
        request: CreateReplyRequest,
    ) -> Result<InboxReply, ReplyError> {
        let mut conn = self.ctx.db_pool.get().await?;

        let item: InboxItem = inbox_items::table
            .filter(inbox_items::id.eq(item_id))
            .filter(inbox_items::workspace_id.eq(workspace_id))
            .select(InboxItem::as_select())
            .first(&mut conn)
            .await
            .optional()?
            .ok_or(ReplyError::ItemNotFound)?;

        let item_type = item
            .item_type_enum()
            .ok_or_else(|| anyhow!("item {} has unknown type {}", item.id, item.item_type))?;
        if !item_type.is_replyable() {
            return Err(ReplyError::NotReplyable);
        }

        let account: SocialAccount = social_accounts::table
            .filter(social_accounts::id.eq(item.social_account_id))
            .select(SocialAccount::as_select())
            .first(&mut conn)
            .await?;
        if !account.has_usable_credential() {
            return Err(ReplyError::MissingCredential);
        }

        let content = match request.saved_reply_id {
            Some(saved_reply_id) => {
                saved_replies::take_content(&self.ctx, workspace_id, saved_reply_id)
                    .await?
                    .ok_or_else(|| anyhow!("saved reply {} not found", saved_reply_id))?
            }
            None => request
                .content
                .filter(|c| !c.trim().is_empty())
                .ok_or(ReplyError::EmptyContent)?,
        };

        let reply: InboxReply = diesel::insert_into(inbox_replies::table)
            .values((
                inbox_replies::workspace_id.eq(workspace_id),
                inbox_replies::inbox_item_id.eq(item.id),
                inbox_replies::user_id.eq(user_id),
                inbox_replies::content.eq(&content),
                inbox_replies::retry_count.eq(0),
            ))
            .returning(InboxReply::as_returning())
            .get_result(&mut conn)
            .await?;

        self.enqueue_dispatch(&reply).await;

        Ok(reply)
    }

    pub async fn list_replies(
        &self,
        workspace_id: i64,
        item_id: i64,
    ) -> Result<Vec<InboxReply>, ReplyError> {
        let mut conn = self.ctx.db_pool.get().await?;

        let replies = inbox_replies::table
            .filter(inbox_replies::workspace_id.eq(workspace_id))
            .filter(inbox_replies::inbox_item_id.eq(item_id))
            .order(inbox_replies::created_at.asc())
            .select(InboxReply::as_select())
            .load(&mut conn)
            .await?;

        Ok(replies)
    }

    /// Dispatch is queued so the platform call never blocks the caller;
    /// a produce failure leaves the row pending and is logged for replay.
    async fn enqueue_dispatch(&self, reply: &InboxReply) {
        let payload = serde_json::json!({
            "workspace_id": reply.workspace_id,
            "reply_id": reply.id,
        });

        let key = reply.workspace_id.to_string();
        match serde_json::to_vec(&payload) {
            Ok(bytes) => {
                if let Err(e) =
                    produce_message(&self.ctx.producer, TOPIC_REPLY_DISPATCH, Some(&key), &bytes)
                        .await
                {
                    tracing::error!("Failed to enqueue dispatch for reply {}: {}", reply.id, e);
                }
            }
            Err(e) => {
                tracing::error!("Failed to serialize dispatch job: {}", e);
            }
        }
    }
}
