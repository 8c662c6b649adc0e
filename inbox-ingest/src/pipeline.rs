use anyhow::{anyhow, Result};
use chrono::Utc;
use diesel::prelude::*;
use diesel::sql_types::Timestamptz;
use diesel_async::RunQueryDsl;
use inbox_core::db::DbConnection;
use inbox_core::queue::{produce_message, TOPIC_ITEMS_CREATED};
use inbox_core::redis::increment_unread;
use inbox_core::schema::{inbox_contacts, inbox_conversations, inbox_items, post_targets};
use inbox_core::status::ItemStatus;
use inbox_core::types::{ConversationStatus, InboxItem, SocialAccount};
use inbox_core::InboxContext;
use tracing;

use crate::adapters::NormalizedEvent;

diesel::define_sql_function!(fn least(a: Timestamptz, b: Timestamptz) -> Timestamptz);
diesel::define_sql_function!(fn greatest(a: Timestamptz, b: Timestamptz) -> Timestamptz);

pub struct IngestOutcome {
    pub item: InboxItem,
    pub created: bool,
}

pub struct IngestionPipeline {
    ctx: InboxContext,
}

impl IngestionPipeline {
    pub fn new(ctx: InboxContext) -> Self {
        Self { ctx }
    }

    /// Persist one normalized event. Idempotent over the
    /// `(social_account_id, platform_item_id)` dedup key: redelivery
    /// returns the existing row untouched, and a concurrent race is
    /// settled by the unique constraint with losers reading back the
    /// winning row.
    pub async fn ingest(
        &self,
        account: &SocialAccount,
        event: &NormalizedEvent,
    ) -> Result<IngestOutcome> {
        let mut conn = self.ctx.db_pool.get().await?;

        if let Some(existing) = find_existing(&mut conn, account.id, &event.platform_item_id).await?
        {
            tracing::debug!(
                "Duplicate delivery of item {} for account {}",
                event.platform_item_id,
                account.id
            );
            return Ok(IngestOutcome {
                item: existing,
                created: false,
            });
        }

        let conversation_id = resolve_conversation(&mut conn, account, event).await?;

        let post_target_id = match &event.platform_post_id {
            Some(post_id) => {
                post_targets::table
                    .filter(post_targets::social_account_id.eq(account.id))
                    .filter(post_targets::platform_post_id.eq(post_id))
                    .select(post_targets::id)
                    .first::<i64>(&mut conn)
                    .await
                    .optional()?
            }
            None => None,
        };

        let inserted: Option<InboxItem> = diesel::insert_into(inbox_items::table)
            .values((
                inbox_items::workspace_id.eq(account.workspace_id),
                inbox_items::social_account_id.eq(account.id),
                inbox_items::conversation_id.eq(Some(conversation_id)),
                inbox_items::post_target_id.eq(post_target_id),
                inbox_items::item_type.eq(event.item_type.as_str()),
                inbox_items::status.eq(ItemStatus::Unread.as_str()),
                inbox_items::platform_item_id.eq(&event.platform_item_id),
                inbox_items::platform_post_id.eq(event.platform_post_id.as_deref()),
                inbox_items::platform_author_id.eq(&event.author.platform_author_id),
                inbox_items::author_name.eq(&event.author.name),
                inbox_items::author_username.eq(event.author.username.as_deref()),
                inbox_items::author_profile_url.eq(event.author.profile_url.as_deref()),
                inbox_items::content_text.eq(&event.content_text),
                inbox_items::platform_created_at.eq(event.occurred_at),
            ))
            .on_conflict((
                inbox_items::social_account_id,
                inbox_items::platform_item_id,
            ))
            .do_nothing()
            .returning(InboxItem::as_returning())
            .get_result(&mut conn)
            .await
            .optional()?;

        let item = match inserted {
            Some(item) => item,
            None => {
                // Lost the insert race to a concurrent delivery; the first
                // successful insert wins and we return its row.
                let winner = find_existing(&mut conn, account.id, &event.platform_item_id)
                    .await?
                    .ok_or_else(|| {
                        anyhow!(
                            "dedup conflict but no row found for item {}",
                            event.platform_item_id
                        )
                    })?;
                return Ok(IngestOutcome {
                    item: winner,
                    created: false,
                });
            }
        };

        bump_conversation(&mut conn, conversation_id, event).await?;
        upsert_contact(&mut conn, account, event).await?;

        if let Err(e) = increment_unread(&self.ctx.redis_pool, account.workspace_id, account.id).await
        {
            tracing::warn!("Failed to bump unread counters: {}", e);
        }

        self.emit_item_created(&item).await;

        Ok(IngestOutcome {
            item,
            created: true,
        })
    }

    /// Hand the new item to the automation engine through the queue.
    /// Ingestion never fails because automation is unavailable.
    async fn emit_item_created(&self, item: &InboxItem) {
        let payload = serde_json::json!({
            "workspace_id": item.workspace_id,
            "item_id": item.id,
            "social_account_id": item.social_account_id,
        });

        let key = item.workspace_id.to_string();
        match serde_json::to_vec(&payload) {
            Ok(bytes) => {
                if let Err(e) =
                    produce_message(&self.ctx.producer, TOPIC_ITEMS_CREATED, Some(&key), &bytes)
                        .await
                {
                    tracing::error!("Failed to emit item-created event for {}: {}", item.id, e);
                }
            }
            Err(e) => {
                tracing::error!("Failed to serialize item-created event: {}", e);
            }
        }
    }
}

async fn find_existing(
    conn: &mut DbConnection,
    social_account_id: i64,
    platform_item_id: &str,
) -> Result<Option<InboxItem>> {
    let item = inbox_items::table
        .filter(inbox_items::social_account_id.eq(social_account_id))
        .filter(inbox_items::platform_item_id.eq(platform_item_id))
        .select(InboxItem::as_select())
        .first(conn)
        .await
        .optional()?;

    Ok(item)
}

/// Find or lazily create the conversation for an event's thread key.
/// Creation races resolve through the unique key; both sides then read
/// the same row.
async fn resolve_conversation(
    conn: &mut DbConnection,
    account: &SocialAccount,
    event: &NormalizedEvent,
) -> Result<i64> {
    let existing: Option<i64> = inbox_conversations::table
        .filter(inbox_conversations::social_account_id.eq(account.id))
        .filter(inbox_conversations::conversation_key.eq(&event.conversation_key))
        .select(inbox_conversations::id)
        .first(conn)
        .await
        .optional()?;

    if let Some(id) = existing {
        return Ok(id);
    }

    diesel::insert_into(inbox_conversations::table)
        .values((
            inbox_conversations::workspace_id.eq(account.workspace_id),
            inbox_conversations::social_account_id.eq(account.id),
            inbox_conversations::conversation_key.eq(&event.conversation_key),
            inbox_conversations::participant_name.eq(&event.author.name),
            inbox_conversations::participant_username.eq(event.author.username.as_deref()),
            inbox_conversations::status.eq(ConversationStatus::Active.as_str()),
            inbox_conversations::message_count.eq(0),
            inbox_conversations::first_message_at.eq(event.occurred_at),
            inbox_conversations::last_message_at.eq(event.occurred_at),
        ))
        .on_conflict((
            inbox_conversations::social_account_id,
            inbox_conversations::conversation_key,
        ))
        .do_nothing()
        .execute(conn)
        .await?;

    let id = inbox_conversations::table
        .filter(inbox_conversations::social_account_id.eq(account.id))
        .filter(inbox_conversations::conversation_key.eq(&event.conversation_key))
        .select(inbox_conversations::id)
        .first(conn)
        .await?;

    Ok(id)
}

/// Aggregate maintenance runs in the database so concurrent appends to
/// one conversation cannot lose updates: the count is an in-place
/// increment and the window bounds use LEAST/GREATEST.
async fn bump_conversation(
    conn: &mut DbConnection,
    conversation_id: i64,
    event: &NormalizedEvent,
) -> Result<()> {
    diesel::update(
        inbox_conversations::table.filter(inbox_conversations::id.eq(conversation_id)),
    )
    .set((
        inbox_conversations::message_count.eq(inbox_conversations::message_count + 1),
        inbox_conversations::first_message_at.eq(least(
            inbox_conversations::first_message_at,
            event.occurred_at,
        )),
        inbox_conversations::last_message_at.eq(greatest(
            inbox_conversations::last_message_at,
            event.occurred_at,
        )),
        inbox_conversations::updated_at.eq(Utc::now()),
    ))
    .execute(conn)
    .await?;

    Ok(())
}

async fn upsert_contact(
    conn: &mut DbConnection,
    account: &SocialAccount,
    event: &NormalizedEvent,
) -> Result<()> {
    diesel::insert_into(inbox_contacts::table)
        .values((
            inbox_contacts::workspace_id.eq(account.workspace_id),
            inbox_contacts::platform.eq(&account.platform),
            inbox_contacts::platform_author_id.eq(&event.author.platform_author_id),
            inbox_contacts::name.eq(&event.author.name),
            inbox_contacts::username.eq(event.author.username.as_deref()),
            inbox_contacts::profile_url.eq(event.author.profile_url.as_deref()),
            inbox_contacts::interaction_count.eq(1),
            inbox_contacts::first_seen_at.eq(event.occurred_at),
            inbox_contacts::last_seen_at.eq(event.occurred_at),
        ))
        .on_conflict((
            inbox_contacts::workspace_id,
            inbox_contacts::platform,
            inbox_contacts::platform_author_id,
        ))
        .do_update()
        .set((
            inbox_contacts::name.eq(&event.author.name),
            inbox_contacts::username.eq(event.author.username.as_deref()),
            inbox_contacts::interaction_count.eq(inbox_contacts::interaction_count + 1),
            inbox_contacts::last_seen_at.eq(greatest(
                inbox_contacts::last_seen_at,
                event.occurred_at,
            )),
        ))
        .execute(conn)
        .await?;

    Ok(())
}
