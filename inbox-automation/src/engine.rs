use anyhow::{anyhow, Result};
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use inbox_collab::items;
use inbox_collab::replies::{CreateReplyRequest, ReplyService};
use inbox_core::notifications::create_notification;
use inbox_core::schema::{inbox_automation_rules, inbox_items, social_accounts};
use inbox_core::status::ItemStatus;
use inbox_core::types::{ActionType, AutomationRule, InboxItem, SocialAccount, TriggerType};
use inbox_core::InboxContext;
use tracing;

use crate::conditions::{rule_matches, ItemView, TriggerConditions};

pub struct AutomationEngine {
    ctx: InboxContext,
    replies: ReplyService,
}

impl AutomationEngine {
    pub fn new(ctx: InboxContext) -> Self {
        let replies = ReplyService::new(ctx.clone());
        Self { ctx, replies }
    }

    /// Evaluate every active rule in the workspace against one freshly
    /// ingested item. All matching rules fire, in deterministic order;
    /// priority governs execution order, not exclusivity. Returns the
    /// ids of the rules that fired.
    ///
    /// Actions mutate the item directly and never publish back to the
    /// items-created topic, so a pass can never retrigger itself.
    pub async fn evaluate(&self, workspace_id: i64, item_id: i64) -> Result<Vec<i64>> {
        let (item, account, rules) = {
            let mut conn = self.ctx.db_pool.get().await?;

            let Some(item) = inbox_items::table
                .filter(inbox_items::id.eq(item_id))
                .filter(inbox_items::workspace_id.eq(workspace_id))
                .select(InboxItem::as_select())
                .first(&mut conn)
                .await
                .optional()?
            else {
                tracing::warn!("Automation skipped: item {} not found", item_id);
                return Ok(Vec::new());
            };

            let account = social_accounts::table
                .filter(social_accounts::id.eq(item.social_account_id))
                .select(SocialAccount::as_select())
                .first(&mut conn)
                .await?;

            let mut rules: Vec<AutomationRule> = inbox_automation_rules::table
                .filter(inbox_automation_rules::workspace_id.eq(workspace_id))
                .filter(inbox_automation_rules::is_active.eq(true))
                .select(AutomationRule::as_select())
                .load(&mut conn)
                .await?;
            order_for_evaluation(&mut rules);

            (item, account, rules)
        };

        let mut current = item;
        let mut fired = Vec::new();

        for rule in &rules {
            if !rule_applies(rule, &current, &account) {
                continue;
            }

            match self.execute_action(rule, &current).await {
                Ok(updated) => {
                    if let Some(updated) = updated {
                        current = updated;
                    }
                    if let Err(e) = self.record_fire(rule.id).await {
                        tracing::warn!("Failed to bump execution count for rule {}: {}", rule.id, e);
                    }
                    fired.push(rule.id);
                }
                // One misconfigured rule must not block its siblings.
                Err(e) => {
                    tracing::error!(
                        "Automation rule {} ({}) failed on item {}: {}",
                        rule.id,
                        rule.name,
                        current.id,
                        e
                    );
                }
            }
        }

        Ok(fired)
    }

    async fn execute_action(
        &self,
        rule: &AutomationRule,
        item: &InboxItem,
    ) -> Result<Option<InboxItem>> {
        let action = ActionType::parse(&rule.action_type)
            .ok_or_else(|| anyhow!("unknown action type: {}", rule.action_type))?;

        match action {
            ActionType::Assign => {
                let user_id = param_i64(&rule.action_params, "user_id")?;
                let updated =
                    items::assign(&self.ctx, item.workspace_id, item.id, user_id, None).await?;
                Ok(updated)
            }
            ActionType::AddTag => {
                let tag_id = param_i64(&rule.action_params, "tag_id")?;
                let attached =
                    inbox_collab::tags::attach_tag(&self.ctx, item.workspace_id, item.id, tag_id)
                        .await?;
                if attached.is_none() {
                    return Err(anyhow!("tag {} not found in workspace", tag_id));
                }
                Ok(None)
            }
            ActionType::SendReply => {
                let user_id = param_i64(&rule.action_params, "user_id")?;
                let request = CreateReplyRequest {
                    content: rule
                        .action_params
                        .get("content")
                        .and_then(|v| v.as_str())
                        .map(|s| s.to_string()),
                    saved_reply_id: rule
                        .action_params
                        .get("saved_reply_id")
                        .and_then(|v| v.as_i64()),
                };
                self.replies
                    .create_reply(item.workspace_id, item.id, user_id, request)
                    .await
                    .map_err(|e| anyhow!("auto-reply failed: {}", e))?;
                Ok(None)
            }
            ActionType::Resolve => {
                let actor = rule.action_params.get("user_id").and_then(|v| v.as_i64());

                // Fresh items walk through READ first so resolution goes
                // through the transition table rather than around it.
                let mut current = item.clone();
                if current.status_enum() == Some(ItemStatus::Unread) {
                    if let Some(updated) = items::apply_transition(
                        &self.ctx,
                        current.workspace_id,
                        current.id,
                        ItemStatus::Read,
                        actor,
                    )
                    .await?
                    {
                        current = updated;
                    }
                }

                let resolved = items::apply_transition(
                    &self.ctx,
                    current.workspace_id,
                    current.id,
                    ItemStatus::Resolved,
                    actor,
                )
                .await?;

                match resolved {
                    Some(updated) => Ok(Some(updated)),
                    // Rejected transition (e.g. already archived) is a
                    // no-op for the item but still an action failure for
                    // the rule, so it is logged rather than counted.
                    None => Err(anyhow!("resolve transition rejected from status {}", current.status)),
                }
            }
            ActionType::Notify => {
                let user_id = param_i64(&rule.action_params, "user_id")?;
                let message = rule
                    .action_params
                    .get("message")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| {
                        format!("Automation rule \"{}\" matched an inbox item", rule.name)
                    });

                let mut conn = self.ctx.db_pool.get().await?;
                create_notification(
                    &mut conn,
                    item.workspace_id,
                    user_id,
                    "inbox.rule_matched",
                    "Inbox rule matched",
                    &message,
                    Some(&serde_json::json!({"item_id": item.id, "rule_id": rule.id})),
                    None,
                )
                .await?;
                Ok(None)
            }
        }
    }

    async fn record_fire(&self, rule_id: i64) -> Result<()> {
        let mut conn = self.ctx.db_pool.get().await?;

        diesel::update(inbox_automation_rules::table.filter(inbox_automation_rules::id.eq(rule_id)))
            .set((
                inbox_automation_rules::execution_count
                    .eq(inbox_automation_rules::execution_count + 1),
                inbox_automation_rules::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)
            .await?;

        Ok(())
    }
}

fn param_i64(params: &serde_json::Value, key: &str) -> Result<i64> {
    params
        .get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| anyhow!("action params missing {}", key))
}

/// Deterministic total order: priority descending, then creation order,
/// then id as the final stable tie-break.
pub fn order_for_evaluation(rules: &mut [AutomationRule]) {
    rules.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then(a.created_at.cmp(&b.created_at))
            .then(a.id.cmp(&b.id))
    });
}

fn rule_applies(rule: &AutomationRule, item: &InboxItem, account: &SocialAccount) -> bool {
    let Some(trigger) = TriggerType::parse(&rule.trigger_type) else {
        tracing::warn!("Rule {} has unknown trigger type {}", rule.id, rule.trigger_type);
        return false;
    };

    let conditions: TriggerConditions =
        match serde_json::from_value(rule.trigger_conditions.clone()) {
            Ok(spec) => spec,
            Err(e) => {
                tracing::warn!("Rule {} has unparseable conditions: {}", rule.id, e);
                return false;
            }
        };

    let sentiment = item
        .metadata
        .as_ref()
        .and_then(|m| m.get("sentiment"))
        .and_then(|v| v.as_str());

    let view = ItemView {
        content_text: &item.content_text,
        author_name: &item.author_name,
        author_username: item.author_username.as_deref(),
        item_type: &item.item_type,
        platform: &account.platform,
        sentiment,
    };

    rule_matches(trigger, &conditions, &view)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};

    fn rule(id: i64, priority: i32, created_offset_secs: i64) -> AutomationRule {
        let base: DateTime<Utc> = DateTime::from_timestamp(1_690_000_000, 0).unwrap();
        AutomationRule {
            id,
            workspace_id: 1,
            name: format!("rule-{}", id),
            trigger_type: "item_created".to_string(),
            trigger_conditions: serde_json::json!({}),
            action_type: "notify".to_string(),
            action_params: serde_json::json!({"user_id": 1}),
            priority,
            is_active: true,
            execution_count: 0,
            created_at: base + Duration::seconds(created_offset_secs),
            updated_at: base,
        }
    }

    #[test]
    fn test_priority_descending() {
        let mut rules = vec![rule(1, 5, 0), rule(2, 10, 0), rule(3, 1, 0)];
        order_for_evaluation(&mut rules);
        let ids: Vec<i64> = rules.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }

    #[test]
    fn test_creation_order_breaks_priority_ties() {
        let mut rules = vec![rule(7, 5, 30), rule(4, 5, 10), rule(9, 5, 20)];
        order_for_evaluation(&mut rules);
        let ids: Vec<i64> = rules.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![4, 9, 7]);
    }

    #[test]
    fn test_ordering_is_deterministic_across_runs() {
        let build = || vec![rule(3, 5, 0), rule(1, 10, 0), rule(2, 5, 0), rule(4, 1, 0)];

        let mut first = build();
        order_for_evaluation(&mut first);
        let first_ids: Vec<i64> = first.iter().map(|r| r.id).collect();

        for _ in 0..10 {
            let mut again = build();
            order_for_evaluation(&mut again);
            let ids: Vec<i64> = again.iter().map(|r| r.id).collect();
            assert_eq!(ids, first_ids);
        }

        assert_eq!(first_ids, vec![1, 2, 3, 4]);
    }
}
