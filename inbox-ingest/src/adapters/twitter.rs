use chrono::{DateTime, Utc};
use inbox_core::types::{ItemType, Platform};
use serde_json::Value;
use tracing;

use super::{
    required_str, timestamp_from_millis, AdapterError, EventAuthor, NormalizedEvent,
    PlatformAdapter,
};

const TWITTER_TIME_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// Twitter account-activity webhooks: `tweet_create_events[]` for
/// mentions and replies, `direct_message_events[]` for DMs.
pub struct TwitterAdapter;

impl PlatformAdapter for TwitterAdapter {
    fn platform(&self) -> Platform {
        Platform::Twitter
    }

    fn normalize(&self, payload: &Value) -> Result<Vec<NormalizedEvent>, AdapterError> {
        let account_id = required_str(payload, "for_user_id")?;

        let mut events = Vec::new();

        if let Some(tweets) = payload.get("tweet_create_events").and_then(|v| v.as_array()) {
            for tweet in tweets {
                if let Some(event) = normalize_tweet(account_id, tweet)? {
                    events.push(event);
                }
            }
        }

        if let Some(dms) = payload
            .get("direct_message_events")
            .and_then(|v| v.as_array())
        {
            let users = payload.get("users");
            for dm in dms {
                if let Some(event) = normalize_direct_message(account_id, dm, users)? {
                    events.push(event);
                }
            }
        }

        Ok(events)
    }
}

fn parse_created_at(raw: &str) -> Result<DateTime<Utc>, AdapterError> {
    DateTime::parse_from_str(raw, TWITTER_TIME_FORMAT)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| AdapterError::UnsupportedShape(format!("invalid created_at: {}", raw)))
}

fn normalize_tweet(
    account_id: &str,
    tweet: &Value,
) -> Result<Option<NormalizedEvent>, AdapterError> {
    let tweet_id = required_str(tweet, "id_str")?;
    let user = tweet
        .get("user")
        .ok_or_else(|| AdapterError::UnsupportedShape("tweet missing user".to_string()))?;
    let author_id = required_str(user, "id_str")?;

    // The account's own tweets come through the same event stream.
    if author_id == account_id {
        tracing::debug!("Skipping own tweet {}", tweet_id);
        return Ok(None);
    }

    let author_name = required_str(user, "name")?;
    let screen_name = required_str(user, "screen_name")?;
    let created_at = parse_created_at(required_str(tweet, "created_at")?)?;

    let in_reply_to = tweet
        .get("in_reply_to_status_id_str")
        .and_then(|v| v.as_str());

    // A reply to one of our tweets reads as a comment on that post; a
    // freestanding tweet naming the account is a mention.
    let (item_type, thread_root, platform_post_id) = match in_reply_to {
        Some(parent) => (ItemType::Comment, parent, Some(parent.to_string())),
        None => (ItemType::Mention, tweet_id, None),
    };

    Ok(Some(NormalizedEvent {
        external_account_id: account_id.to_string(),
        platform_item_id: tweet_id.to_string(),
        platform_post_id,
        conversation_key: format!("twitter:thread:{}", thread_root),
        item_type,
        author: EventAuthor {
            platform_author_id: author_id.to_string(),
            name: author_name.to_string(),
            username: Some(screen_name.to_string()),
            profile_url: Some(format!("https://twitter.com/{}", screen_name)),
        },
        content_text: tweet
            .get("text")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string(),
        occurred_at: created_at,
    }))
}

fn normalize_direct_message(
    account_id: &str,
    dm: &Value,
    users: Option<&Value>,
) -> Result<Option<NormalizedEvent>, AdapterError> {
    if dm.get("type").and_then(|v| v.as_str()) != Some("message_create") {
        return Ok(None);
    }

    let dm_id = required_str(dm, "id")?;
    let created_ms: i64 = required_str(dm, "created_timestamp")?
        .parse()
        .map_err(|_| AdapterError::UnsupportedShape("invalid created_timestamp".to_string()))?;

    let message_create = dm
        .get("message_create")
        .ok_or_else(|| AdapterError::UnsupportedShape("dm missing message_create".to_string()))?;
    let sender_id = required_str(message_create, "sender_id")?;

    if sender_id == account_id {
        return Ok(None);
    }

    let text = message_create
        .get("message_data")
        .and_then(|d| d.get("text"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    // The hydrated users map is optional; fall back to the raw id.
    let sender = users.and_then(|u| u.get(sender_id));
    let name = sender
        .and_then(|s| s.get("name"))
        .and_then(|v| v.as_str())
        .unwrap_or(sender_id);
    let screen_name = sender
        .and_then(|s| s.get("screen_name"))
        .and_then(|v| v.as_str());

    Ok(Some(NormalizedEvent {
        external_account_id: account_id.to_string(),
        platform_item_id: dm_id.to_string(),
        platform_post_id: None,
        conversation_key: format!("twitter:dm:{}:{}", account_id, sender_id),
        item_type: ItemType::Message,
        author: EventAuthor {
            platform_author_id: sender_id.to_string(),
            name: name.to_string(),
            username: screen_name.map(|s| s.to_string()),
            profile_url: screen_name.map(|s| format!("https://twitter.com/{}", s)),
        },
        content_text: text,
        occurred_at: timestamp_from_millis(created_ms)?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_reply_as_comment() {
        let payload = json!({
            "for_user_id": "acct-1",
            "tweet_create_events": [{
                "id_str": "t-100",
                "text": "@brand when does it ship?",
                "created_at": "Wed Oct 10 20:19:24 +0000 2018",
                "in_reply_to_status_id_str": "t-50",
                "user": {"id_str": "u7", "name": "Jane", "screen_name": "jane"}
            }]
        });

        let events = TwitterAdapter.normalize(&payload).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].item_type, ItemType::Comment);
        assert_eq!(events[0].platform_post_id.as_deref(), Some("t-50"));
        assert_eq!(events[0].conversation_key, "twitter:thread:t-50");
        assert_eq!(events[0].author.username.as_deref(), Some("jane"));
    }

    #[test]
    fn test_normalize_standalone_tweet_as_mention() {
        let payload = json!({
            "for_user_id": "acct-1",
            "tweet_create_events": [{
                "id_str": "t-101",
                "text": "shoutout to @brand",
                "created_at": "Wed Oct 10 20:19:24 +0000 2018",
                "user": {"id_str": "u7", "name": "Jane", "screen_name": "jane"}
            }]
        });

        let events = TwitterAdapter.normalize(&payload).unwrap();
        assert_eq!(events[0].item_type, ItemType::Mention);
        assert_eq!(events[0].conversation_key, "twitter:thread:t-101");
    }

    #[test]
    fn test_own_tweets_skipped() {
        let payload = json!({
            "for_user_id": "acct-1",
            "tweet_create_events": [{
                "id_str": "t-102",
                "text": "our announcement",
                "created_at": "Wed Oct 10 20:19:24 +0000 2018",
                "user": {"id_str": "acct-1", "name": "Brand", "screen_name": "brand"}
            }]
        });

        assert!(TwitterAdapter.normalize(&payload).unwrap().is_empty());
    }

    #[test]
    fn test_normalize_direct_message() {
        let payload = json!({
            "for_user_id": "acct-1",
            "direct_message_events": [{
                "type": "message_create",
                "id": "dm-1",
                "created_timestamp": "1690000000000",
                "message_create": {
                    "sender_id": "u7",
                    "target": {"recipient_id": "acct-1"},
                    "message_data": {"text": "hello"}
                }
            }],
            "users": {"u7": {"name": "Jane", "screen_name": "jane"}}
        });

        let events = TwitterAdapter.normalize(&payload).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].item_type, ItemType::Message);
        assert_eq!(events[0].author.name, "Jane");
        assert_eq!(events[0].occurred_at.timestamp(), 1690000000);
    }

    #[test]
    fn test_bad_created_at_is_unsupported() {
        let payload = json!({
            "for_user_id": "acct-1",
            "tweet_create_events": [{
                "id_str": "t-103",
                "text": "hi",
                "created_at": "2018-10-10T20:19:24Z",
                "user": {"id_str": "u7", "name": "Jane", "screen_name": "jane"}
            }]
        });

        assert!(matches!(
            TwitterAdapter.normalize(&payload),
            Err(AdapterError::UnsupportedShape(_))
        ));
    }
}
