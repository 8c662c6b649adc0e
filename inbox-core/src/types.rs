use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::status::ItemStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Facebook,
    Instagram,
    Twitter,
    Linkedin,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Facebook => "facebook",
            Platform::Instagram => "instagram",
            Platform::Twitter => "twitter",
            Platform::Linkedin => "linkedin",
        }
    }

    pub fn parse(s: &str) -> Option<Platform> {
        match s {
            "facebook" => Some(Platform::Facebook),
            "instagram" => Some(Platform::Instagram),
            "twitter" => Some(Platform::Twitter),
            "linkedin" => Some(Platform::Linkedin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Comment,
    Mention,
    Message,
    StoryMention,
    Review,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Comment => "comment",
            ItemType::Mention => "mention",
            ItemType::Message => "message",
            ItemType::StoryMention => "story_mention",
            ItemType::Review => "review",
        }
    }

    pub fn parse(s: &str) -> Option<ItemType> {
        match s {
            "comment" => Some(ItemType::Comment),
            "mention" => Some(ItemType::Mention),
            "message" => Some(ItemType::Message),
            "story_mention" => Some(ItemType::StoryMention),
            "review" => Some(ItemType::Review),
            _ => None,
        }
    }

    /// Story mentions and reviews have no reply edge on any platform API.
    pub fn is_replyable(&self) -> bool {
        matches!(self, ItemType::Comment | ItemType::Mention | ItemType::Message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connected,
    TokenExpired,
    Revoked,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::TokenExpired => "token_expired",
            ConnectionStatus::Revoked => "revoked",
        }
    }

    pub fn parse(s: &str) -> Option<ConnectionStatus> {
        match s {
            "connected" => Some(ConnectionStatus::Connected),
            "token_expired" => Some(ConnectionStatus::TokenExpired),
            "revoked" => Some(ConnectionStatus::Revoked),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    Active,
    Resolved,
    Archived,
}

impl ConversationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationStatus::Active => "active",
            ConversationStatus::Resolved => "resolved",
            ConversationStatus::Archived => "archived",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    ItemCreated,
    KeywordMatch,
    AuthorMatch,
    Sentiment,
}

impl TriggerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerType::ItemCreated => "item_created",
            TriggerType::KeywordMatch => "keyword_match",
            TriggerType::AuthorMatch => "author_match",
            TriggerType::Sentiment => "sentiment",
        }
    }

    pub fn parse(s: &str) -> Option<TriggerType> {
        match s {
            "item_created" => Some(TriggerType::ItemCreated),
            "keyword_match" => Some(TriggerType::KeywordMatch),
            "author_match" => Some(TriggerType::AuthorMatch),
            "sentiment" => Some(TriggerType::Sentiment),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Assign,
    AddTag,
    SendReply,
    Resolve,
    Notify,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Assign => "assign",
            ActionType::AddTag => "add_tag",
            ActionType::SendReply => "send_reply",
            ActionType::Resolve => "resolve",
            ActionType::Notify => "notify",
        }
    }

    pub fn parse(s: &str) -> Option<ActionType> {
        match s {
            "assign" => Some(ActionType::Assign),
            "add_tag" => Some(ActionType::AddTag),
            "send_reply" => Some(ActionType::SendReply),
            "resolve" => Some(ActionType::Resolve),
            "notify" => Some(ActionType::Notify),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Queryable, Selectable)]
#[diesel(table_name = crate::schema::social_accounts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SocialAccount {
    pub id: i64,
    pub workspace_id: i64,
    pub platform: String,
    pub external_account_id: String,
    pub display_name: String,
    pub status: String,
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SocialAccount {
    pub fn platform_enum(&self) -> Option<Platform> {
        Platform::parse(&self.platform)
    }

    /// A usable credential means a present token on a connected account.
    pub fn has_usable_credential(&self) -> bool {
        self.access_token.is_some()
            && ConnectionStatus::parse(&self.status) == Some(ConnectionStatus::Connected)
    }
}

#[derive(Debug, Clone, Serialize, Queryable, Selectable)]
#[diesel(table_name = crate::schema::post_targets)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PostTarget {
    pub id: i64,
    pub workspace_id: i64,
    pub social_account_id: i64,
    pub platform_post_id: String,
    pub content_summary: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Queryable, Selectable)]
#[diesel(table_name = crate::schema::inbox_conversations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct InboxConversation {
    pub id: i64,
    pub workspace_id: i64,
    pub social_account_id: i64,
    pub conversation_key: String,
    pub participant_name: String,
    pub participant_username: Option<String>,
    pub status: String,
    pub message_count: i32,
    pub first_message_at: DateTime<Utc>,
    pub last_message_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Queryable, Selectable)]
#[diesel(table_name = crate::schema::inbox_items)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct InboxItem {
    pub id: i64,
    pub workspace_id: i64,
    pub social_account_id: i64,
    pub conversation_id: Option<i64>,
    pub post_target_id: Option<i64>,
    pub item_type: String,
    pub status: String,
    pub platform_item_id: String,
    pub platform_post_id: Option<String>,
    pub platform_author_id: String,
    pub author_name: String,
    pub author_username: Option<String>,
    pub author_profile_url: Option<String>,
    pub content_text: String,
    pub platform_created_at: DateTime<Utc>,
    pub assigned_to_user_id: Option<i64>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by_user_id: Option<i64>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InboxItem {
    pub fn status_enum(&self) -> Option<ItemStatus> {
        ItemStatus::parse(&self.status)
    }

    pub fn item_type_enum(&self) -> Option<ItemType> {
        ItemType::parse(&self.item_type)
    }
}

#[derive(Debug, Clone, Serialize, Queryable, Selectable)]
#[diesel(table_name = crate::schema::inbox_automation_rules)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AutomationRule {
    pub id: i64,
    pub workspace_id: i64,
    pub name: String,
    pub trigger_type: String,
    pub trigger_conditions: serde_json::Value,
    pub action_type: String,
    pub action_params: serde_json::Value,
    pub priority: i32,
    pub is_active: bool,
    pub execution_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Queryable, Selectable)]
#[diesel(table_name = crate::schema::inbox_replies)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct InboxReply {
    pub id: i64,
    pub workspace_id: i64,
    pub inbox_item_id: i64,
    pub user_id: i64,
    pub content: String,
    pub platform_reply_id: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub retry_count: i32,
    pub created_at: DateTime<Utc>,
}

impl InboxReply {
    pub fn is_sent(&self) -> bool {
        self.platform_reply_id.is_some() && self.failed_at.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Queryable, Selectable)]
#[diesel(table_name = crate::schema::inbox_internal_notes)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct InternalNote {
    pub id: i64,
    pub workspace_id: i64,
    pub inbox_item_id: i64,
    pub user_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Queryable, Selectable)]
#[diesel(table_name = crate::schema::inbox_tags)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct InboxTag {
    pub id: i64,
    pub workspace_id: i64,
    pub name: String,
    pub color: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Queryable, Selectable)]
#[diesel(table_name = crate::schema::saved_replies)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SavedReply {
    pub id: i64,
    pub workspace_id: i64,
    pub title: String,
    pub content: String,
    pub usage_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Queryable, Selectable)]
#[diesel(table_name = crate::schema::inbox_contacts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct InboxContact {
    pub id: i64,
    pub workspace_id: i64,
    pub platform: String,
    pub platform_author_id: String,
    pub name: String,
    pub username: Option<String>,
    pub profile_url: Option<String>,
    pub interaction_count: i32,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Queryable, Selectable)]
#[diesel(table_name = crate::schema::post_metric_snapshots)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PostMetricSnapshot {
    pub id: i64,
    pub workspace_id: i64,
    pub post_target_id: i64,
    pub likes: i32,
    pub comments: i32,
    pub shares: i32,
    pub impressions: i32,
    pub reach: i32,
    pub engagement_rate: Option<f64>,
    pub captured_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Queryable, Selectable)]
#[diesel(table_name = crate::schema::notifications)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NotificationRecord {
    pub id: i64,
    pub workspace_id: i64,
    pub user_id: i64,
    pub notification_type: String,
    pub title: String,
    pub message: String,
    pub data: Option<serde_json::Value>,
    pub action_url: Option<String>,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_round_trip() {
        for platform in [
            Platform::Facebook,
            Platform::Instagram,
            Platform::Twitter,
            Platform::Linkedin,
        ] {
            assert_eq!(Platform::parse(platform.as_str()), Some(platform));
        }
        assert_eq!(Platform::parse("myspace"), None);
    }

    #[test]
    fn test_replyability_gate() {
        assert!(ItemType::Comment.is_replyable());
        assert!(ItemType::Mention.is_replyable());
        assert!(ItemType::Message.is_replyable());
        assert!(!ItemType::StoryMention.is_replyable());
        assert!(!ItemType::Review.is_replyable());
    }
}
