//! Background pollers: the stock monitor and the price watcher. Each one
//! owns its state, talks to the storefront through the [`Storefront`]
//! trait, and winds down cooperatively when its cancellation token fires.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::core::storefront::Storefront;
use crate::core::storefront::types::ProductSnapshot;
use crate::notify::{Notifier, RestockEvent};

/// Watches one product's availability through the public JSON feed.
///
/// The loop is fetch, diff against the last-known map, notify, sleep.
/// Fetch errors are logged and waited out; they never kill the loop.
pub struct StockMonitor {
    product_url: String,
    storefront: Arc<dyn Storefront>,
    notifier: Arc<dyn Notifier>,
    notify: bool,
    poll_interval: Duration,
    error_backoff: Duration,
    cancel: CancellationToken,
    stock_state: HashMap<i64, bool>,
}

impl StockMonitor {
    pub fn new(
        product_url: &str,
        storefront: Arc<dyn Storefront>,
        notifier: Arc<dyn Notifier>,
        notify: bool,
        poll_interval: Duration,
        error_backoff: Duration,
    ) -> Self {
        Self {
            product_url: product_url.to_string(),
            storefront,
            notifier,
            notify,
            poll_interval,
            error_backoff,
            cancel: CancellationToken::new(),
            stock_state: HashMap::new(),
        }
    }

    /// Token that stops this monitor. Cancellation is observed at the
    /// next loop boundary; an in-flight request is allowed to finish.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn run(mut self) {
        // Seed the availability map from the product page so the first
        // feed poll diffs against real state instead of reporting
        // everything as a flip.
        let initial = match self.storefront.page_snapshot(&self.product_url).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(
                    "could not fetch initial product info for {}: {}",
                    self.product_url, e
                );
                self.send_text(&format!(
                    "Failed to fetch initial product information for {}",
                    self.product_url
                ))
                .await;
                return;
            }
        };
        for variant in &initial.variants {
            self.stock_state.insert(variant.id, variant.available);
        }

        let title = if initial.title.is_empty() {
            "Unknown Product".to_string()
        } else {
            initial.title.clone()
        };
        info!("monitor started for {} ({})", title, self.product_url);
        self.send_text(&format!("Started monitoring: {}", title)).await;

        while !self.cancel.is_cancelled() {
            match self.storefront.product_snapshot(&self.product_url).await {
                Ok(snapshot) => {
                    self.observe(&snapshot).await;
                    self.sleep(self.poll_interval).await;
                }
                Err(e) => {
                    warn!("error while checking {}: {}", self.product_url, e);
                    self.sleep(self.error_backoff).await;
                }
            }
        }
        info!("monitor stopped for {}", self.product_url);
    }

    /// Compare one snapshot against the last-known map and report flips.
    /// The map always takes the latest observation, including ids seen
    /// for the first time (those seed silently).
    async fn observe(&mut self, snapshot: &ProductSnapshot) {
        for variant in &snapshot.variants {
            if let Some(&previous) = self.stock_state.get(&variant.id)
                && previous != variant.available
            {
                if variant.available {
                    if self.notify {
                        let event = RestockEvent::new(
                            &snapshot.title,
                            &variant.title,
                            variant.id,
                            &self.product_url,
                        );
                        if let Err(e) = self.notifier.send_restock(&event).await {
                            warn!("restock notification failed: {e}");
                        }
                    }
                    info!(
                        "{} ({}) flipped in stock [{}]",
                        snapshot.title, variant.title, variant.id
                    );
                } else if self.notify {
                    self.send_text(&format!(
                        "{} ({}) is now out of stock.",
                        snapshot.title, variant.title
                    ))
                    .await;
                }
            }
            self.stock_state.insert(variant.id, variant.available);
        }
    }

    async fn sleep(&self, duration: Duration) {
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = tokio::time::sleep(duration) => {}
        }
    }

    async fn send_text(&self, text: &str) {
        if let Err(e) = self.notifier.send_text(text).await {
            warn!("notification delivery failed: {e}");
        }
    }
}

/// Polls a product until its first variant's price drops to the target,
/// then fires one alert and ends. Returns true when the target was hit,
/// false when cancelled first.
pub struct PriceWatcher {
    product_url: String,
    target_price: f64,
    storefront: Arc<dyn Storefront>,
    notifier: Arc<dyn Notifier>,
    poll_interval: Duration,
    cancel: CancellationToken,
}

impl PriceWatcher {
    pub fn new(
        product_url: &str,
        target_price: f64,
        storefront: Arc<dyn Storefront>,
        notifier: Arc<dyn Notifier>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            product_url: product_url.to_string(),
            target_price,
            storefront,
            notifier,
            poll_interval,
            cancel: CancellationToken::new(),
        }
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn run(self) -> bool {
        info!(
            "price watch started for {} (target {:.2})",
            self.product_url, self.target_price
        );
        while !self.cancel.is_cancelled() {
            match self.storefront.product_snapshot(&self.product_url).await {
                Ok(snapshot) => {
                    if let Some(price) = first_variant_price(&snapshot)
                        && price <= self.target_price
                    {
                        let text = format!(
                            "Price alert: {} is now {:.2} (target {:.2})\n{}",
                            snapshot.title, price, self.target_price, self.product_url
                        );
                        if let Err(e) = self.notifier.send_text(&text).await {
                            warn!("price alert delivery failed: {e}");
                        }
                        return true;
                    }
                }
                Err(e) => {
                    warn!("price check failed for {}: {}", self.product_url, e);
                }
            }
            tokio::select! {
                _ = self.cancel.cancelled() => {}
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
        false
    }
}

fn first_variant_price(snapshot: &ProductSnapshot) -> Option<f64> {
    snapshot.variants.first().and_then(|v| v.price.parse().ok())
}
