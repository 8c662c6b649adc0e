use async_trait::async_trait;
use inbox_core::types::{Platform, SocialAccount};
use reqwest::Client;
use tracing;

use super::{require_token, DispatchError, ReplyDispatcher};

/// Replies to page comments through the Graph API comments edge.
pub struct FacebookDispatcher {
    client: Client,
    graph_base: String,
}

impl FacebookDispatcher {
    pub fn new(client: Client, graph_base: String) -> Self {
        Self { client, graph_base }
    }
}

#[async_trait]
impl ReplyDispatcher for FacebookDispatcher {
    fn platform(&self) -> Platform {
        Platform::Facebook
    }

    async fn send_reply(
        &self,
        account: &SocialAccount,
        external_item_id: &str,
        text: &str,
    ) -> Result<String, DispatchError> {
        let token = require_token(account)?;
        let url = format!("{}/{}/comments", self.graph_base, external_item_id);

        let response = self
            .client
            .post(&url)
            .query(&[("access_token", token)])
            .json(&serde_json::json!({"message": text}))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DispatchError::Rejected(format!("{}: {}", status, body)));
        }

        let body: serde_json::Value = response.json().await?;
        let reply_id = body
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| DispatchError::Rejected("response missing reply id".to_string()))?;

        tracing::debug!("Facebook reply created: {}", reply_id);

        Ok(reply_id.to_string())
    }
}
