use inbox_core::types::{ItemType, Platform};
use serde_json::Value;
use tracing;

use super::{
    required_str, timestamp_from_millis, timestamp_from_secs, AdapterError, EventAuthor,
    NormalizedEvent, PlatformAdapter,
};

/// Facebook page webhooks: `entry[].changes[].value` for feed activity
/// and `entry[].messaging[]` for page inbox messages.
pub struct FacebookAdapter;

impl PlatformAdapter for FacebookAdapter {
    fn platform(&self) -> Platform {
        Platform::Facebook
    }

    fn normalize(&self, payload: &Value) -> Result<Vec<NormalizedEvent>, AdapterError> {
        let entries = payload
            .get("entry")
            .and_then(|v| v.as_array())
            .ok_or_else(|| AdapterError::UnsupportedShape("missing entry array".to_string()))?;

        let mut events = Vec::new();

        for entry in entries {
            let page_id = required_str(entry, "id")?;

            if let Some(changes) = entry.get("changes").and_then(|v| v.as_array()) {
                for change in changes {
                    if let Some(event) = normalize_change(page_id, change)? {
                        events.push(event);
                    }
                }
            }

            if let Some(messaging) = entry.get("messaging").and_then(|v| v.as_array()) {
                for message in messaging {
                    if let Some(event) = normalize_message(page_id, message)? {
                        events.push(event);
                    }
                }
            }
        }

        Ok(events)
    }
}

fn normalize_change(
    page_id: &str,
    change: &Value,
) -> Result<Option<NormalizedEvent>, AdapterError> {
    let field = required_str(change, "field")?;
    let value = change
        .get("value")
        .filter(|v| v.is_object())
        .ok_or_else(|| AdapterError::UnsupportedShape("change missing value".to_string()))?;

    match field {
        "feed" => normalize_feed_change(page_id, value),
        "mention" => normalize_mention(page_id, value),
        "ratings" => normalize_rating(page_id, value),
        other => {
            tracing::debug!("Skipping unsubscribed Facebook change field: {}", other);
            Ok(None)
        }
    }
}

fn normalize_feed_change(
    page_id: &str,
    value: &Value,
) -> Result<Option<NormalizedEvent>, AdapterError> {
    let item = value.get("item").and_then(|v| v.as_str()).unwrap_or("");
    if item != "comment" {
        tracing::debug!("Skipping Facebook feed item kind: {}", item);
        return Ok(None);
    }

    // Deletes and hides are moderation events, not inbox traffic.
    let verb = value.get("verb").and_then(|v| v.as_str()).unwrap_or("add");
    if verb != "add" && verb != "edited" {
        tracing::debug!("Skipping Facebook comment verb: {}", verb);
        return Ok(None);
    }

    let comment_id = required_str(value, "comment_id")?;
    let post_id = required_str(value, "post_id")?;
    let created_time = value
        .get("created_time")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| AdapterError::UnsupportedShape("missing created_time".to_string()))?;
    let from = value
        .get("from")
        .ok_or_else(|| AdapterError::UnsupportedShape("missing from".to_string()))?;
    let author_id = required_str(from, "id")?;
    let author_name = required_str(from, "name")?;

    Ok(Some(NormalizedEvent {
        external_account_id: page_id.to_string(),
        platform_item_id: comment_id.to_string(),
        platform_post_id: Some(post_id.to_string()),
        conversation_key: format!("facebook:post:{}", post_id),
        item_type: ItemType::Comment,
        author: EventAuthor {
            platform_author_id: author_id.to_string(),
            name: author_name.to_string(),
            username: None,
            profile_url: None,
        },
        content_text: value
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string(),
        occurred_at: timestamp_from_secs(created_time)?,
    }))
}

fn normalize_mention(
    page_id: &str,
    value: &Value,
) -> Result<Option<NormalizedEvent>, AdapterError> {
    let post_id = required_str(value, "post_id")?;
    let item_id = value
        .get("comment_id")
        .and_then(|v| v.as_str())
        .unwrap_or(post_id);
    let created_time = value
        .get("created_time")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| AdapterError::UnsupportedShape("missing created_time".to_string()))?;
    let sender_id = required_str(value, "sender_id")?;
    let sender_name = required_str(value, "sender_name")?;

    Ok(Some(NormalizedEvent {
        external_account_id: page_id.to_string(),
        platform_item_id: item_id.to_string(),
        platform_post_id: Some(post_id.to_string()),
        conversation_key: format!("facebook:post:{}", post_id),
        item_type: ItemType::Mention,
        author: EventAuthor {
            platform_author_id: sender_id.to_string(),
            name: sender_name.to_string(),
            username: None,
            profile_url: None,
        },
        content_text: value
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string(),
        occurred_at: timestamp_from_secs(created_time)?,
    }))
}

fn normalize_rating(
    page_id: &str,
    value: &Value,
) -> Result<Option<NormalizedEvent>, AdapterError> {
    let story_id = required_str(value, "open_graph_story_id")?;
    let created_time = value
        .get("created_time")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| AdapterError::UnsupportedShape("missing created_time".to_string()))?;
    let reviewer_id = required_str(value, "reviewer_id")?;
    let reviewer_name = required_str(value, "reviewer_name")?;

    Ok(Some(NormalizedEvent {
        external_account_id: page_id.to_string(),
        platform_item_id: story_id.to_string(),
        platform_post_id: None,
        conversation_key: format!("facebook:reviews:{}", page_id),
        item_type: ItemType::Review,
        author: EventAuthor {
            platform_author_id: reviewer_id.to_string(),
            name: reviewer_name.to_string(),
            username: None,
            profile_url: None,
        },
        content_text: value
            .get("review_text")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string(),
        occurred_at: timestamp_from_secs(created_time)?,
    }))
}

fn normalize_message(
    page_id: &str,
    messaging: &Value,
) -> Result<Option<NormalizedEvent>, AdapterError> {
    // Delivery receipts and read events carry no message body.
    let Some(message) = messaging.get("message") else {
        return Ok(None);
    };

    let sender = messaging
        .get("sender")
        .ok_or_else(|| AdapterError::UnsupportedShape("messaging missing sender".to_string()))?;
    let sender_id = required_str(sender, "id")?;

    // The page's own outbound messages echo back through the webhook.
    if sender_id == page_id {
        return Ok(None);
    }

    let mid = required_str(message, "mid")?;
    let timestamp = messaging
        .get("timestamp")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| AdapterError::UnsupportedShape("messaging missing timestamp".to_string()))?;

    Ok(Some(NormalizedEvent {
        external_account_id: page_id.to_string(),
        platform_item_id: mid.to_string(),
        platform_post_id: None,
        conversation_key: format!("facebook:dm:{}:{}", page_id, sender_id),
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

    fn comment_payload() -> Value {
        json!({
            "object": "page",
            "entry": [{
                "id": "page-1",
                "time": 1690000100,
                "changes": [{
                    "field": "feed",
                    "value": {
                        "item": "comment",
                        "verb": "add",
                        "comment_id": "c1",
                        "post_id": "p1",
                        "message": "Love this product!",
                        "created_time": 1690000000_i64,
                        "from": {"id": "u1", "name": "Jane Doe"}
                    }
                }]
            }]
        })
    }

    #[test]
    fn test_normalize_comment() {
        let events = FacebookAdapter.normalize(&comment_payload()).unwrap();
        assert_eq!(events.len(), 1);

        let event = &events[0];
        assert_eq!(event.external_account_id, "page-1");
        assert_eq!(event.platform_item_id, "c1");
        assert_eq!(event.platform_post_id.as_deref(), Some("p1"));
        assert_eq!(event.conversation_key, "facebook:post:p1");
        assert_eq!(event.item_type, ItemType::Comment);
        assert_eq!(event.content_text, "Love this product!");
        assert_eq!(event.author.name, "Jane Doe");
        assert_eq!(event.occurred_at.timestamp(), 1690000000);
    }

    #[test]
    fn test_comment_delete_skipped() {
        let mut payload = comment_payload();
        payload["entry"][0]["changes"][0]["value"]["verb"] = json!("remove");
        let events = FacebookAdapter.normalize(&payload).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_missing_comment_id_is_unsupported() {
        let mut payload = comment_payload();
        payload["entry"][0]["changes"][0]["value"]
            .as_object_mut()
            .unwrap()
            .remove("comment_id");
        let result = FacebookAdapter.normalize(&payload);
        assert!(matches!(result, Err(AdapterError::UnsupportedShape(_))));
    }

    #[test]
    fn test_normalize_page_message() {
        let payload = json!({
            "object": "page",
            "entry": [{
                "id": "page-1",
                "messaging": [{
                    "sender": {"id": "u9"},
                    "recipient": {"id": "page-1"},
                    "timestamp": 1690000000000_i64,
                    "message": {"mid": "m1", "text": "hi there"}
                }]
            }]
        });

        let events = FacebookAdapter.normalize(&payload).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].item_type, ItemType::Message);
        assert_eq!(events[0].conversation_key, "facebook:dm:page-1:u9");
        assert_eq!(events[0].content_text, "hi there");
    }

    #[test]
    fn test_own_echo_message_skipped() {
        let payload = json!({
            "entry": [{
                "id": "page-1",
                "messaging": [{
                    "sender": {"id": "page-1"},
                    "recipient": {"id": "u9"},
                    "timestamp": 1690000000000_i64,
                    "message": {"mid": "m2", "text": "our reply"}
                }]
            }]
        });

        let events = FacebookAdapter.normalize(&payload).unwrap();
        assert!(events.is_empty());
    }
}
