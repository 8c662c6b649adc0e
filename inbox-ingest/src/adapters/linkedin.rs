use inbox_core::types::{ItemType, Platform};
use serde_json::Value;
use tracing;

use super::{
    required_str, timestamp_from_millis, AdapterError, EventAuthor, NormalizedEvent,
    PlatformAdapter,
};

/// LinkedIn organization social-action notifications: a flat `events[]`
/// list of comment/mention actions against organization posts.
pub struct LinkedinAdapter;

impl PlatformAdapter for LinkedinAdapter {
    fn platform(&self) -> Platform {
        Platform::Linkedin
    }

    fn normalize(&self, payload: &Value) -> Result<Vec<NormalizedEvent>, AdapterError> {
        let entries = payload
            .get("events")
            .and_then(|v| v.as_array())
            .ok_or_else(|| AdapterError::UnsupportedShape("missing events array".to_string()))?;

        let mut events = Vec::new();

        for entry in entries {
            if let Some(event) = normalize_action(entry)? {
                events.push(event);
            }
        }

        Ok(events)
    }
}

fn normalize_action(entry: &Value) -> Result<Option<NormalizedEvent>, AdapterError> {
    let action = required_str(entry, "eventType")?;

    let item_type = match action {
        "COMMENT" => ItemType::Comment,
        "MENTION" => ItemType::Mention,
        other => {
            tracing::debug!("Skipping LinkedIn event type: {}", other);
            return Ok(None);
        }
    };

    let organization = required_str(entry, "organizationUrn")?;
    let comment_urn = required_str(entry, "commentUrn")?;
    let activity_urn = required_str(entry, "activityUrn")?;
    let actor_urn = required_str(entry, "actorUrn")?;
    let actor_name = required_str(entry, "actorName")?;
    let created_at = entry
        .get("createdAt")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| AdapterError::UnsupportedShape("missing createdAt".to_string()))?;

    Ok(Some(NormalizedEvent {
        external_account_id: organization.to_string(),
        platform_item_id: comment_urn.to_string(),
        platform_post_id: Some(activity_urn.to_string()),
        conversation_key: format!("linkedin:activity:{}", activity_urn),
        item_type,
        author: EventAuthor {
            platform_author_id: actor_urn.to_string(),
            name: actor_name.to_string(),
            username: None,
            profile_url: None,
        },
        content_text: entry
            .get("text")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string(),
        occurred_at: timestamp_from_millis(created_at)?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_comment() {
        let payload = json!({
            "events": [{
                "eventType": "COMMENT",
                "organizationUrn": "urn:li:organization:123",
                "commentUrn": "urn:li:comment:(urn:li:activity:456,789)",
                "activityUrn": "urn:li:activity:456",
                "actorUrn": "urn:li:person:abc",
                "actorName": "Jane Doe",
                "text": "Insightful!",
                "createdAt": 1690000000000_i64
            }]
        });

        let events = LinkedinAdapter.normalize(&payload).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].external_account_id, "urn:li:organization:123");
        assert_eq!(events[0].conversation_key, "linkedin:activity:urn:li:activity:456");
        assert_eq!(events[0].item_type, ItemType::Comment);
        assert_eq!(events[0].occurred_at.timestamp(), 1690000000);
    }

    #[test]
    fn test_unknown_event_type_skipped() {
        let payload = json!({
            "events": [{
                "eventType": "SHARE",
                "organizationUrn": "urn:li:organization:123"
            }]
        });

        assert!(LinkedinAdapter.normalize(&payload).unwrap().is_empty());
    }

    #[test]
    fn test_missing_actor_is_unsupported() {
        let payload = json!({
            "events": [{
                "eventType": "COMMENT",
                "organizationUrn": "urn:li:organization:123",
                "commentUrn": "urn:li:comment:1",
                "activityUrn": "urn:li:activity:456",
                "createdAt": 1690000000000_i64
            }]
        });

        assert!(matches!(
            LinkedinAdapter.normalize(&payload),
            Err(AdapterError::UnsupportedShape(_))
        ));
    }
}
