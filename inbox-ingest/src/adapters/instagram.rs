use inbox_core::types::{ItemType, Platform};
use serde_json::Value;
use tracing;

use super::{
    required_str, timestamp_from_millis, timestamp_from_secs, AdapterError, EventAuthor,
    NormalizedEvent, PlatformAdapter,
};

/// Instagram business webhooks share Facebook's `entry[].changes[]`
/// envelope but with different value field names (media, username).
pub struct InstagramAdapter;

impl PlatformAdapter for InstagramAdapter {
    fn platform(&self) -> Platform {
        Platform::Instagram
    }

    fn normalize(&self, payload: &Value) -> Result<Vec<NormalizedEvent>, AdapterError> {
        let entries = payload
            .get("entry")
            .and_then(|v| v.as_array())
            .ok_or_else(|| AdapterError::UnsupportedShape("missing entry array".to_string()))?;

        let mut events = Vec::new();

        for entry in entries {
            let account_id = required_str(entry, "id")?;
            let entry_time = entry
                .get("time")
                .and_then(|v| v.as_i64())
                .ok_or_else(|| AdapterError::UnsupportedShape("entry missing time".to_string()))?;

            if let Some(changes) = entry.get("changes").and_then(|v| v.as_array()) {
                for change in changes {
                    if let Some(event) = normalize_change(account_id, entry_time, change)? {
                        events.push(event);
                    }
                }
            }

            if let Some(messaging) = entry.get("messaging").and_then(|v| v.as_array()) {
                for message in messaging {
                    if let Some(event) = normalize_direct_message(account_id, message)? {
                        events.push(event);
                    }
                }
            }
        }

        Ok(events)
    }
}

fn normalize_change(
    account_id: &str,
    entry_time: i64,
    change: &Value,
) -> Result<Option<NormalizedEvent>, AdapterError> {
    let field = required_str(change, "field")?;
    let value = change
        .get("value")
        .filter(|v| v.is_object())
        .ok_or_else(|| AdapterError::UnsupportedShape("change missing value".to_string()))?;

    match field {
        "comments" => {
            let comment_id = required_str(value, "id")?;
            let media_id = value
                .get("media")
                .and_then(|m| m.get("id"))
                .and_then(|v| v.as_str())
                .ok_or_else(|| {
                    AdapterError::UnsupportedShape("comment missing media id".to_string())
                })?;
            let from = value
                .get("from")
                .ok_or_else(|| AdapterError::UnsupportedShape("comment missing from".to_string()))?;
            let author_id = required_str(from, "id")?;
            let username = required_str(from, "username")?;

            Ok(Some(NormalizedEvent {
                external_account_id: account_id.to_string(),
                platform_item_id: comment_id.to_string(),
                platform_post_id: Some(media_id.to_string()),
                conversation_key: format!("instagram:media:{}", media_id),
                item_type: ItemType::Comment,
                author: EventAuthor {
                    platform_author_id: author_id.to_string(),
                    name: username.to_string(),
                    username: Some(username.to_string()),
                    profile_url: None,
                },
                content_text: value
                    .get("text")
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string(),
                occurred_at: timestamp_from_secs(entry_time)?,
            }))
        }
        "mentions" => {
            let media_id = required_str(value, "media_id")?;
            let item_id = value
                .get("comment_id")
                .and_then(|v| v.as_str())
                .unwrap_or(media_id);
            let author_id = value
                .get("from")
                .and_then(|f| f.get("id"))
                .and_then(|v| v.as_str())
                .unwrap_or("unknown");
            let username = value
                .get("from")
                .and_then(|f| f.get("username"))
                .and_then(|v| v.as_str());

            Ok(Some(NormalizedEvent {
                external_account_id: account_id.to_string(),
                platform_item_id: item_id.to_string(),
                platform_post_id: Some(media_id.to_string()),
                conversation_key: format!("instagram:media:{}", media_id),
                item_type: ItemType::Mention,
                author: EventAuthor {
                    platform_author_id: author_id.to_string(),
                    name: username.unwrap_or(author_id).to_string(),
                    username: username.map(|u| u.to_string()),
                    profile_url: None,
                },
                content_text: value
                    .get("text")
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string(),
                occurred_at: timestamp_from_secs(entry_time)?,
            }))
        }
        "story_mentions" => {
            let media_id = required_str(value, "media_id")?;
            let author_id = value
                .get("from")
                .and_then(|f| f.get("id"))
                .and_then(|v| v.as_str())
                .unwrap_or("unknown");
            let username = value
                .get("from")
                .and_then(|f| f.get("username"))
                .and_then(|v| v.as_str());

            Ok(Some(NormalizedEvent {
                external_account_id: account_id.to_string(),
                platform_item_id: media_id.to_string(),
                platform_post_id: None,
                conversation_key: format!("instagram:story:{}", media_id),
                item_type: ItemType::StoryMention,
                author: EventAuthor {
                    platform_author_id: author_id.to_string(),
                    name: username.unwrap_or(author_id).to_string(),
                    username: username.map(|u| u.to_string()),
                    profile_url: None,
                },
                content_text: String::new(),
                occurred_at: timestamp_from_secs(entry_time)?,
            }))
        }
        other => {
            tracing::debug!("Skipping unsubscribed Instagram change field: {}", other);
            Ok(None)
        }
    }
}

fn normalize_direct_message(
    account_id: &str,
    messaging: &Value,
) -> Result<Option<NormalizedEvent>, AdapterError> {
    let Some(message) = messaging.get("message") else {
        return Ok(None);
    };

    let sender = messaging
        .get("sender")
        .ok_or_else(|| AdapterError::UnsupportedShape("messaging missing sender".to_string()))?;
    let sender_id = required_str(sender, "id")?;

    if sender_id == account_id {
        return Ok(None);
    }

    let mid = required_str(message, "mid")?;
    let timestamp = messaging
        .get("timestamp")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| AdapterError::UnsupportedShape("messaging missing timestamp".to_string()))?;

    Ok(Some(NormalizedEvent {
        external_account_id: account_id.to_string(),
        platform_item_id: mid.to_string(),
        platform_post_id: None,
        conversation_key: format!("instagram:dm:{}:{}", account_id, sender_id),
        item_type: ItemType::Message,
        author: EventAuthor {
            platform_author_id: sender_id.to_string(),
            name: sender_id.to_string(),
            username: None,
            profile_url: None,
        },
        content_text: message
            .get("text")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string(),
        occurred_at: timestamp_from_millis(timestamp)?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_comment() {
        let payload = json!({
            "object": "instagram",
            "entry": [{
                "id": "ig-acct-1",
                "time": 1690000000_i64,
                "changes": [{
                    "field": "comments",
                    "value": {
                        "id": "ig-c1",
                        "text": "nice shot",
                        "media": {"id": "media-1"},
                        "from": {"id": "u2", "username": "jane.doe"}
                    }
                }]
            }]
        });

        let events = InstagramAdapter.normalize(&payload).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].platform_item_id, "ig-c1");
        assert_eq!(events[0].conversation_key, "instagram:media:media-1");
        assert_eq!(events[0].author.username.as_deref(), Some("jane.doe"));
        assert_eq!(events[0].item_type, ItemType::Comment);
    }

    #[test]
    fn test_story_mention_is_not_replyable_type() {
        let payload = json!({
            "entry": [{
                "id": "ig-acct-1",
                "time": 1690000000_i64,
                "changes": [{
                    "field": "story_mentions",
                    "value": {
                        "media_id": "story-9",
                        "from": {"id": "u3", "username": "fan"}
                    }
                }]
            }]
        });

        let events = InstagramAdapter.normalize(&payload).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].item_type, ItemType::StoryMention);
        assert!(!events[0].item_type.is_replyable());
    }

    #[test]
    fn test_comment_without_media_is_unsupported() {
        let payload = json!({
            "entry": [{
                "id": "ig-acct-1",
                "time": 1690000000_i64,
                "changes": [{
                    "field": "comments",
                    "value": {
                        "id": "ig-c1",
                        "text": "orphan",
                        "from": {"id": "u2", "username": "jane.doe"}
                    }
                }]
            }]
        });

        let result = InstagramAdapter.normalize(&payload);
        assert!(matches!(result, Err(AdapterError::UnsupportedShape(_))));
    }
}
