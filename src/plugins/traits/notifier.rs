use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::utils::Result;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationResult {
    pub chunks_sent: usize,
    pub chunks_failed: usize,
    /// Nothing was sent because the notifier is not configured.
    pub skipped: bool,
}

impl NotificationResult {
    pub fn skipped() -> Self {
        Self {
            skipped: true,
            ..Default::default()
        }
    }

    pub fn success(&self) -> bool {
        !self.skipped && self.chunks_failed == 0
    }
}

/// Trait for implementing notification channels
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotifierPlugin: Send + Sync {
    /// Plugin metadata
    fn name(&self) -> &'static str;
    fn plugin_type(&self) -> &'static str;

    /// Deliver one plain-text message. Delivery problems are reported in the
    /// result rather than as errors.
    async fn notify(&self, text: &str) -> Result<NotificationResult>;
}
