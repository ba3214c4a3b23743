//! Polite repeated fetching of variant lists, with per-URL request
//! spacing and change detection across calls.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::warn;

use crate::core::diff::{VariantDiff, diff_variants};
use crate::core::storefront::{Storefront, extract};
use crate::core::storefront::types::Variant;

/// Fetches variant lists on demand, never letting two requests for the
/// same product land closer together than `min_spacing`. Keyed by the
/// normalized `.json` endpoint so the page URL and the feed URL share
/// one budget and one cache entry.
pub struct VariantTracker {
    storefront: Arc<dyn Storefront>,
    min_spacing: Duration,
    cooldown: Duration,
    variants_cache: HashMap<String, Vec<Variant>>,
    last_fetch: HashMap<String, Instant>,
}

impl VariantTracker {
    pub fn new(storefront: Arc<dyn Storefront>, min_spacing: Duration, cooldown: Duration) -> Self {
        Self {
            storefront,
            min_spacing,
            cooldown,
            variants_cache: HashMap::new(),
            last_fetch: HashMap::new(),
        }
    }

    /// Current variant list, after waiting out any remaining spacing for
    /// this URL. A 429 answer waits the cooldown and yields no data; all
    /// other failures just yield no data.
    pub async fn fetch_variants(&mut self, product_url: &str) -> Option<Vec<Variant>> {
        let key = extract::json_endpoint(product_url);

        if let Some(last) = self.last_fetch.get(&key) {
            let elapsed = last.elapsed();
            if elapsed < self.min_spacing {
                tokio::time::sleep(self.min_spacing - elapsed).await;
            }
        }

        match self.storefront.product_snapshot(product_url).await {
            Ok(snapshot) => {
                self.last_fetch.insert(key, Instant::now());
                Some(snapshot.variants)
            }
            Err(e) if e.is_rate_limited() => {
                warn!("rate limited on {product_url}, cooling down");
                self.last_fetch.insert(key, Instant::now());
                tokio::time::sleep(self.cooldown).await;
                None
            }
            Err(e) => {
                warn!("variant fetch failed for {product_url}: {e}");
                None
            }
        }
    }

    /// Fetch and diff against the previous observation of this URL.
    /// The diff runs against the cached list first; only then does the
    /// cache take the new list. Returns `None` for "nothing changed" and
    /// for fetch failures alike.
    pub async fn track_changes(&mut self, product_url: &str) -> Option<VariantDiff> {
        let key = extract::json_endpoint(product_url);
        let current = self.fetch_variants(product_url).await?;
        let previous = self.variants_cache.get(&key).cloned().unwrap_or_default();
        let changes = diff_variants(&previous, &current);
        self.variants_cache.insert(key, current);
        if changes.is_empty() { None } else { Some(changes) }
    }

    /// One variant's current state, or `None` when the product does not
    /// carry that id (or the fetch failed).
    pub async fn variant_details(&mut self, product_url: &str, variant_id: i64) -> Option<Variant> {
        let variants = self.fetch_variants(product_url).await?;
        variants.into_iter().find(|v| v.id == variant_id)
    }
}
