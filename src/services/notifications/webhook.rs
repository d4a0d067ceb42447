use anyhow::Context;
use async_trait::async_trait;

use super::{ClientNotice, Notifier};

/// Hands notices to an external delivery service as JSON.
pub struct WebhookNotifier {
    url: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Self {
        Self {
            url,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, notice: &ClientNotice) -> anyhow::Result<()> {
        self.client
            .post(&self.url)
            .json(notice)
            .send()
            .await
            .context("failed to reach notification endpoint")?
            .error_for_status()
            .context("notification endpoint returned error")?;

        Ok(())
    }
}
