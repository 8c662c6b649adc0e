use chrono::{DateTime, Utc};
use inbox_core::types::{ItemType, Platform};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

mod facebook;
mod instagram;
mod linkedin;
mod twitter;

pub use facebook::FacebookAdapter;
pub use instagram::InstagramAdapter;
pub use linkedin::LinkedinAdapter;
pub use twitter::TwitterAdapter;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("unsupported payload shape: {0}")]
    UnsupportedShape(String),
    #[error("no adapter registered for platform {0}")]
    UnknownPlatform(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventAuthor {
    pub platform_author_id: String,
    pub name: String,
    pub username: Option<String>,
    pub profile_url: Option<String>,
}

/// A platform interaction translated into the shape the ingestion
/// pipeline persists. `platform_item_id` is the dedup key half;
/// `conversation_key` groups items into threads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    pub external_account_id: String,
    pub platform_item_id: String,
    pub platform_post_id: Option<String>,
    pub conversation_key: String,
    pub item_type: ItemType,
    pub author: EventAuthor,
    pub content_text: String,
    pub occurred_at: DateTime<Utc>,
}

/// One adapter per platform. Adapters are pure payload translators;
/// anything stateful (account lookup, persistence) stays in the pipeline.
pub trait PlatformAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    /// Translate a raw webhook/poll payload into normalized events.
    /// A structurally broken payload fails with `UnsupportedShape`;
    /// entries for change types we do not subscribe to are skipped.
    fn normalize(&self, payload: &Value) -> Result<Vec<NormalizedEvent>, AdapterError>;
}

pub struct AdapterRegistry {
    adapters: HashMap<Platform, Box<dyn PlatformAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        let mut adapters: HashMap<Platform, Box<dyn PlatformAdapter>> = HashMap::new();
        adapters.insert(Platform::Facebook, Box::new(FacebookAdapter));
        adapters.insert(Platform::Instagram, Box::new(InstagramAdapter));
        adapters.insert(Platform::Twitter, Box::new(TwitterAdapter));
        adapters.insert(Platform::Linkedin, Box::new(LinkedinAdapter));
        Self { adapters }
    }

    pub fn get(&self, platform: Platform) -> Option<&dyn PlatformAdapter> {
        self.adapters.get(&platform).map(|a| a.as_ref())
    }

    pub fn normalize(
        &self,
        platform: Platform,
        payload: &Value,
    ) -> Result<Vec<NormalizedEvent>, AdapterError> {
        let adapter = self
            .get(platform)
            .ok_or_else(|| AdapterError::UnknownPlatform(platform.as_str().to_string()))?;
        adapter.normalize(payload)
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn required_str<'a>(value: &'a Value, field: &str) -> Result<&'a str, AdapterError> {
    value
        .get(field)
        .and_then(|v| v.as_str())
        .ok_or_else(|| AdapterError::UnsupportedShape(format!("missing field {}", field)))
}

pub(crate) fn timestamp_from_secs(secs: i64) -> Result<DateTime<Utc>, AdapterError> {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .ok_or_else(|| AdapterError::UnsupportedShape(format!("invalid timestamp {}", secs)))
}

pub(crate) fn timestamp_from_millis(millis: i64) -> Result<DateTime<Utc>, AdapterError> {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .ok_or_else(|| AdapterError::UnsupportedShape(format!("invalid timestamp {}", millis)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_covers_every_platform() {
        let registry = AdapterRegistry::new();
        for platform in [
            Platform::Facebook,
            Platform::Instagram,
            Platform::Twitter,
            Platform::Linkedin,
        ] {
            let adapter = registry.get(platform).expect("adapter registered");
            assert_eq!(adapter.platform(), platform);
        }
    }

    #[test]
    fn test_normalize_rejects_malformed_envelope() {
        let registry = AdapterRegistry::new();
        let result = registry.normalize(Platform::Facebook, &serde_json::json!({"object": "page"}));
        assert!(matches!(result, Err(AdapterError::UnsupportedShape(_))));
    }
}
