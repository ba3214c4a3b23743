//! HTTP access to Shopify-style storefronts: the read side (product
//! feeds, embedded page metadata) and the write side (cart and checkout
//! requests). Everything network-facing funnels through the [`Storefront`]
//! trait so polling loops and the checkout machine can run against a
//! scripted double in tests.

pub mod extract;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use serde_json::json;

use crate::core::error::StorefrontError;
use types::{ProductFeed, ProductSnapshot};

/// Storefronts serve bot-filtering responses to obvious non-browsers, so
/// every request carries a desktop browser identity.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// The pair of tokens needed to drive a checkout session: the session
/// token from the redirect URL and the CSRF token from the page body.
#[derive(Debug, Clone)]
pub struct CheckoutTokens {
    pub checkout_token: String,
    pub authenticity_token: String,
}

/// A `previous_step`/`step` pair naming one hop through the hosted
/// checkout's linear flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepTransition {
    pub previous_step: &'static str,
    pub step: &'static str,
}

pub const CONTACT_TO_SHIPPING: StepTransition = StepTransition {
    previous_step: "contact_information",
    step: "shipping_method",
};

pub const SHIPPING_TO_PAYMENT: StepTransition = StepTransition {
    previous_step: "shipping_method",
    step: "payment_method",
};

/// Network operations against one storefront.
#[async_trait]
pub trait Storefront: Send + Sync {
    /// Current product state from the public `.json` feed.
    async fn product_snapshot(&self, product_url: &str)
    -> Result<ProductSnapshot, StorefrontError>;

    /// Product state scraped from the HTML page's embedded metadata.
    /// Slower and lossier than the feed, but available on themes that
    /// block the feed; used once at monitor startup.
    async fn page_snapshot(&self, product_url: &str) -> Result<ProductSnapshot, StorefrontError>;

    /// Put `quantity` units of a variant into the session's cart.
    async fn add_to_cart(
        &self,
        domain: &str,
        variant_id: i64,
        quantity: u32,
    ) -> Result<(), StorefrontError>;

    /// Open a checkout for the current cart and harvest its tokens.
    async fn open_checkout(&self, domain: &str) -> Result<CheckoutTokens, StorefrontError>;

    /// Post one step transition with the storefront's method-override
    /// convention and return the response body for scraping.
    async fn submit_step(
        &self,
        domain: &str,
        tokens: &CheckoutTokens,
        transition: StepTransition,
        fields: &[(String, String)],
    ) -> Result<String, StorefrontError>;
}

/// Live implementation over a cookie-holding reqwest client.
///
/// One instance per monitor or checkout attempt: the cookie jar is what
/// ties the cart to the checkout session, so sharing a client across
/// concurrent checkouts would cross their carts.
pub struct HttpStorefront {
    client: reqwest::Client,
}

impl HttpStorefront {
    pub fn new(timeout: Duration) -> Result<Self, StorefrontError> {
        let client = reqwest::Client::builder()
            .default_headers(browser_headers())
            .cookie_store(true)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    fn checked_status(
        res: &reqwest::Response,
        url: &str,
    ) -> Result<(), StorefrontError> {
        let status = res.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(StorefrontError::Status {
                code: status.as_u16(),
                url: url.to_string(),
            })
        }
    }
}

fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_static("en-US,en;q=0.5"),
    );
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(
        HeaderName::from_static("upgrade-insecure-requests"),
        HeaderValue::from_static("1"),
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("max-age=0"),
    );
    headers
}

#[async_trait]
impl Storefront for HttpStorefront {
    async fn product_snapshot(
        &self,
        product_url: &str,
    ) -> Result<ProductSnapshot, StorefrontError> {
        let endpoint = extract::json_endpoint(product_url);
        let res = self.client.get(&endpoint).send().await?;
        Self::checked_status(&res, &endpoint)?;
        let feed: ProductFeed = res.json().await.map_err(|e| {
            StorefrontError::decode(format!("product feed at {endpoint} did not parse: {e}"))
        })?;
        Ok(ProductSnapshot::from_feed(feed, product_url))
    }

    async fn page_snapshot(&self, product_url: &str) -> Result<ProductSnapshot, StorefrontError> {
        let res = self.client.get(product_url).send().await?;
        Self::checked_status(&res, product_url)?;
        let html = res.text().await?;
        let raw = extract::page_meta(&html).ok_or_else(|| {
            StorefrontError::decode(format!("no embedded product metadata at {product_url}"))
        })?;
        let feed: ProductFeed = serde_json::from_str(raw).map_err(|e| {
            StorefrontError::decode(format!(
                "embedded metadata at {product_url} is not product JSON: {e}"
            ))
        })?;
        Ok(ProductSnapshot::from_feed(feed, product_url))
    }

    async fn add_to_cart(
        &self,
        domain: &str,
        variant_id: i64,
        quantity: u32,
    ) -> Result<(), StorefrontError> {
        let url = format!("https://{domain}/cart/add.js");
        let res = self
            .client
            .post(&url)
            .json(&json!({ "id": variant_id, "quantity": quantity }))
            .send()
            .await?;
        Self::checked_status(&res, &url)
    }

    async fn open_checkout(&self, domain: &str) -> Result<CheckoutTokens, StorefrontError> {
        let url = format!("https://{domain}/checkout");
        let res = self.client.get(&url).send().await?;
        Self::checked_status(&res, &url)?;

        // The storefront redirects to /checkouts/<token>; reqwest follows
        // redirects, so the final URL carries the session token.
        let final_url = res.url().to_string();
        let html = res.text().await?;

        let checkout_token = extract::checkout_token(&final_url).ok_or_else(|| {
            StorefrontError::decode(format!(
                "checkout did not redirect to a session URL (landed on {final_url})"
            ))
        })?;
        let authenticity_token = extract::authenticity_token(&html).ok_or_else(|| {
            StorefrontError::decode("checkout page has no authenticity_token input".to_string())
        })?;

        Ok(CheckoutTokens {
            checkout_token,
            authenticity_token,
        })
    }

    async fn submit_step(
        &self,
        domain: &str,
        tokens: &CheckoutTokens,
        transition: StepTransition,
        fields: &[(String, String)],
    ) -> Result<String, StorefrontError> {
        let url = format!("https://{domain}/checkout/{}", tokens.checkout_token);

        // Hosted checkouts expect a POST with `_method=patch` rather than a
        // real PATCH, and a trailing empty `button` field from the submit
        // control.
        let mut form: Vec<(String, String)> = vec![
            ("_method".to_string(), "patch".to_string()),
            (
                "authenticity_token".to_string(),
                tokens.authenticity_token.clone(),
            ),
            ("previous_step".to_string(), transition.previous_step.to_string()),
            ("step".to_string(), transition.step.to_string()),
        ];
        form.extend(fields.iter().cloned());
        form.push(("button".to_string(), String::new()));

        let res = self.client.post(&url).form(&form).send().await?;
        Self::checked_status(&res, &url)?;
        Ok(res.text().await?)
    }
}
