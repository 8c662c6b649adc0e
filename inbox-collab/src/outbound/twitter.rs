use async_trait::async_trait;
use inbox_core::types::{Platform, SocialAccount};
use reqwest::Client;
use tracing;

use super::{require_token, DispatchError, ReplyDispatcher};

/// Replies to tweets are new tweets threaded onto the original.
pub struct TwitterDispatcher {
    client: Client,
    api_base: String,
}

impl TwitterDispatcher {
    pub fn new(client: Client, api_base: String) -> Self {
        Self { client, api_base }
    }
}

#[async_trait]
impl ReplyDispatcher for TwitterDispatcher {
    fn platform(&self) -> Platform {
        Platform::Twitter
    }

    async fn send_reply(
        &self,
        account: &SocialAccount,
        external_item_id: &str,
        text: &str,
    ) -> Result<String, DispatchError> {
        let token = require_token(account)?;
        let url = format!("{}/tweets", self.api_base);

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&serde_json::json!({
                "text": text,
                "reply": {"in_reply_to_tweet_id": external_item_id},
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DispatchError::Rejected(format!("{}: {}", status, body)));
        }

        let body: serde_json::Value = response.json().await?;
        let reply_id = body
            .get("data")
            .and_then(|d| d.get("id"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| DispatchError::Rejected("response missing tweet id".to_string()))?;

        tracing::debug!("Twitter reply created: {}", reply_id);

        Ok(reply_id.to_string())
    }
}
