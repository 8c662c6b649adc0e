use async_trait::async_trait;
use inbox_core::config::DispatchConfig;
use inbox_core::types::{Platform, SocialAccount};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

mod facebook;
mod instagram;
mod linkedin;
mod twitter;

pub use facebook::FacebookDispatcher;
pub use instagram::InstagramDispatcher;
pub use linkedin::LinkedinDispatcher;
pub use twitter::TwitterDispatcher;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("platform rejected reply: {0}")]
    Rejected(String),
    #[error("platform request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("reply dispatch timed out")]
    TimedOut,
    #[error("account has no usable access token")]
    MissingCredential,
}

impl DispatchError {
    /// Transport hiccups and timeouts are worth another attempt; a
    /// platform rejection or a missing credential is not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DispatchError::Transport(_) | DispatchError::TimedOut)
    }
}

/// Outbound reply capability, one implementation per platform. Returns
/// the external reply id the platform assigned.
#[async_trait]
pub trait ReplyDispatcher: Send + Sync {
    fn platform(&self) -> Platform;

    async fn send_reply(
        &self,
        account: &SocialAccount,
        external_item_id: &str,
        text: &str,
    ) -> Result<String, DispatchError>;
}

pub struct DispatcherRegistry {
    dispatchers: HashMap<Platform, Box<dyn ReplyDispatcher>>,
}

impl DispatcherRegistry {
    pub fn new(config: &DispatchConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.reply_timeout_secs))
            .build()?;

        let mut dispatchers: HashMap<Platform, Box<dyn ReplyDispatcher>> = HashMap::new();
        dispatchers.insert(
            Platform::Facebook,
            Box::new(FacebookDispatcher::new(
                client.clone(),
                config.facebook_graph_base.clone(),
            )),
        );
        dispatchers.insert(
            Platform::Instagram,
            Box::new(InstagramDispatcher::new(
                client.clone(),
                config.facebook_graph_base.clone(),
            )),
        );
        dispatchers.insert(
            Platform::Twitter,
            Box::new(TwitterDispatcher::new(
                client.clone(),
                config.twitter_api_base.clone(),
            )),
        );
        dispatchers.insert(
            Platform::Linkedin,
            Box::new(LinkedinDispatcher::new(
                client,
                config.linkedin_api_base.clone(),
            )),
        );

        Ok(Self { dispatchers })
    }

    pub fn get(&self, platform: Platform) -> Option<&dyn ReplyDispatcher> {
        self.dispatchers.get(&platform).map(|d| d.as_ref())
    }
}

pub(crate) fn require_token(account: &SocialAccount) -> Result<&str, DispatchError> {
    account
        .access_token
        .as_deref()
        .ok_or(DispatchError::MissingCredential)
}
