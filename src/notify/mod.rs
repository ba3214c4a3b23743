//! Outbound user notifications. Delivery failures are reported to the
//! caller but must never stop a monitoring loop.

pub mod webhook;

use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

pub use webhook::WebhookNotifier;

/// A variant flipping from unavailable to available, with enough context
/// to act on it without another lookup.
#[derive(Debug, Clone, Serialize)]
pub struct RestockEvent {
    pub title: String,
    pub variant_title: String,
    pub variant_id: i64,
    pub product_url: String,
    pub timestamp: u64,
}

impl RestockEvent {
    pub fn new(title: &str, variant_title: &str, variant_id: i64, product_url: &str) -> Self {
        Self {
            title: title.to_string(),
            variant_title: variant_title.to_string(),
            variant_id,
            product_url: product_url.to_string(),
            timestamp: unix_now(),
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_text(&self, text: &str) -> Result<()>;
    async fn send_restock(&self, event: &RestockEvent) -> Result<()>;
}

/// Fallback sink when no webhook is configured: notifications land in the
/// log stream instead of being dropped.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_text(&self, text: &str) -> Result<()> {
        info!("{}", text);
        Ok(())
    }

    async fn send_restock(&self, event: &RestockEvent) -> Result<()> {
        info!(
            "RESTOCK: {} ({}) is back in stock: {}",
            event.title, event.variant_title, event.product_url
        );
        Ok(())
    }
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
