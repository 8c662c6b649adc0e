use async_trait::async_trait;
use inbox_core::types::{Platform, SocialAccount};
use reqwest::Client;
use tracing;

use super::{require_token, DispatchError, ReplyDispatcher};

/// Comments on organization activity through the socialActions edge.
pub struct LinkedinDispatcher {
    client: Client,
    api_base: String,
}

impl LinkedinDispatcher {
    pub fn new(client: Client, api_base: String) -> Self {
        Self { client, api_base }
    }
}

#[async_trait]
impl ReplyDispatcher for LinkedinDispatcher {
    fn platform(&self) -> Platform {
        Platform::Linkedin
    }

    async fn send_reply(
        &self,
        account: &SocialAccount,
        external_item_id: &str,
        text: &str,
    ) -> Result<String, DispatchError> {
        let token = require_token(account)?;
        let url = format!("{}/socialActions/{}/comments", self.api_base, external_item_id);

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&serde_json::json!({
                "actor": account.external_account_id,
                "message": {"text": text},
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DispatchError::Rejected(format!("{}: {}", status, body)));
        }

        // LinkedIn returns the created entity id in a RestLi header.
        if let Some(id) = response
            .headers()
            .get("x-restli-id")
            .and_then(|v| v.to_str().ok())
        {
            tracing::debug!("LinkedIn reply created: {}", id);
            return Ok(id.to_string());
        }

        let body: serde_json::Value = response.json().await?;
        let reply_id = body
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| DispatchError::Rejected("response missing comment id".to_string()))?;

        Ok(reply_id.to_string())
    }
}
