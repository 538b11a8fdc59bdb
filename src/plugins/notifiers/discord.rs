use crate::config::DiscordConfig;
use crate::plugins::traits::{NotificationResult, NotifierPlugin};
use crate::utils::Result;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(15);

/// Split `text` into segments of at most `size` characters, never cutting
/// inside a character.
pub fn chunk_message(text: &str, size: usize) -> Vec<String> {
    let size = size.max(1);
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(size).map(|chunk| chunk.iter().collect()).collect()
}

pub struct DiscordNotifier {
    client: Client,
    config: DiscordConfig,
    chunk_size: usize,
}

impl DiscordNotifier {
    pub fn new(config: DiscordConfig, chunk_size: usize) -> Result<Self> {
        let client = Client::builder().timeout(WEBHOOK_TIMEOUT).build()?;
        Ok(DiscordNotifier {
            client,
            config,
            chunk_size,
        })
    }

    fn create_webhook_payload(&self, content: &str) -> serde_json::Value {
        let mut payload = json!({ "content": content });

        // Add webhook customization
        if let Some(username) = &self.config.username {
            payload["username"] = json!(username);
        }

        if let Some(avatar_url) = &self.config.avatar_url {
            payload["avatar_url"] = json!(avatar_url);
        }

        payload
    }

    /// Post one chunk. Returns whether Discord accepted it.
    async fn send_chunk(&self, webhook_url: &str, content: &str) -> bool {
        let payload = self.create_webhook_payload(content);
        match self.client.post(webhook_url).json(&payload).send().await {
            Ok(response) if matches!(response.status(), StatusCode::OK | StatusCode::NO_CONTENT) => true,
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                warn!("Discord webhook rejected message: {} {}", status, body);
                false
            }
            Err(e) => {
                warn!("Discord webhook request failed: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl NotifierPlugin for DiscordNotifier {
    fn name(&self) -> &'static str {
        "Discord Notifier"
    }

    fn plugin_type(&self) -> &'static str {
        "discord"
    }

    async fn notify(&self, text: &str) -> Result<NotificationResult> {
        let Some(webhook_url) = self.config.webhook_url.as_deref().filter(|u| !u.is_empty()) else {
            warn!("No Discord webhook configured, skipping notification");
            return Ok(NotificationResult::skipped());
        };

        let mut result = NotificationResult::default();
        for chunk in chunk_message(text, self.chunk_size) {
            if self.send_chunk(webhook_url, &chunk).await {
                result.chunks_sent += 1;
            } else {
                result.chunks_failed += 1;
            }
        }

        debug!(
            "Discord notification done: {} sent, {} failed",
            result.chunks_sent, result.chunks_failed
        );
        Ok(result)
    }
}
