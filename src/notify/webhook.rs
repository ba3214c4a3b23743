use anyhow::{Result, bail};
use async_trait::async_trait;
use serde_json::json;

use super::{Notifier, RestockEvent};

/// Posts notifications to a Discord-compatible webhook URL. Plain
/// messages go out as `content`, restocks as a rich embed.
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

    async fn post(&self, payload: &serde_json::Value) -> Result<()> {
        let res = self.client.post(&self.url).json(payload).send().await?;
        if !res.status().is_success() {
            bail!("webhook endpoint returned {}", res.status());
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send_text(&self, text: &str) -> Result<()> {
        self.post(&json!({ "content": text })).await
    }

    async fn send_restock(&self, event: &RestockEvent) -> Result<()> {
        let payload = json!({
            "embeds": [{
                "title": "🚨 Product In Stock!",
                "description": format!("**{}**\nVariant: {}", event.title, event.variant_title),
                "url": event.product_url,
                "color": 0x2ECC71,
                "fields": [
                    { "name": "Variant ID", "value": event.variant_id.to_string(), "inline": true },
                    { "name": "Status", "value": "Available", "inline": true }
                ],
                "footer": { "text": format!("stockhawk • t={}", event.timestamp) }
            }]
        });
        self.post(&payload).await
    }
}
