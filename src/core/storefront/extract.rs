//! URL normalization and the scraping half of the storefront client:
//! pulling structured data out of product pages and checkout HTML.

use regex::Regex;
use url::Url;

use crate::core::error::StorefrontError;

/// Normalize a product page URL to its `.json` feed endpoint.
///
/// Trailing slashes are stripped first so `/products/tee/` and
/// `/products/tee` map to the same endpoint (and the same cache key).
pub fn json_endpoint(product_url: &str) -> String {
    let trimmed = product_url.trim_end_matches('/');
    if trimmed.ends_with(".json") {
        trimmed.to_string()
    } else {
        format!("{}.json", trimmed)
    }
}

/// Host portion of a product URL, used to build cart and checkout endpoints.
pub fn store_domain(product_url: &str) -> Result<String, StorefrontError> {
    let parsed = Url::parse(product_url)
        .map_err(|e| StorefrontError::validation(format!("invalid URL {product_url:?}: {e}")))?;
    parsed
        .host_str()
        .map(str::to_string)
        .ok_or_else(|| StorefrontError::validation(format!("URL {product_url:?} has no host")))
}

/// Accept `*.myshopify.com` URLs and custom domains whose path contains a
/// `/products/` segment; reject everything else before any network traffic.
pub fn validate_product_url(product_url: &str) -> Result<(), StorefrontError> {
    let parsed = Url::parse(product_url)
        .map_err(|e| StorefrontError::validation(format!("invalid URL {product_url:?}: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(StorefrontError::validation(format!(
            "unsupported scheme {:?}, expected http or https",
            parsed.scheme()
        )));
    }
    let Some(host) = parsed.host_str() else {
        return Err(StorefrontError::validation(format!(
            "URL {product_url:?} has no host"
        )));
    };
    if host.ends_with(".myshopify.com") || parsed.path().contains("/products/") {
        return Ok(());
    }
    Err(StorefrontError::validation(format!(
        "{product_url} does not look like a storefront product URL \
         (expected a *.myshopify.com host or a /products/ path)"
    )))
}

/// Locate the `var meta = {...};` blob that storefront themes embed in
/// product pages. Returns the raw JSON text between `= ` and `;`.
pub fn page_meta(html: &str) -> Option<&str> {
    let re = Regex::new(r"var meta = (.*?);\n").unwrap();
    re.captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// CSRF token from a checkout page's hidden `authenticity_token` input.
/// Themes emit the attributes in either order.
pub fn authenticity_token(html: &str) -> Option<String> {
    let name_first =
        Regex::new(r#"name="authenticity_token"[^>]*value="([^"]+)""#).unwrap();
    let value_first =
        Regex::new(r#"value="([^"]+)"[^>]*name="authenticity_token""#).unwrap();
    name_first
        .captures(html)
        .or_else(|| value_first.captures(html))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Checkout session token from the URL the storefront redirected us to,
/// e.g. `https://shop.example.com/checkouts/0a1b2c3d`.
pub fn checkout_token(final_url: &str) -> Option<String> {
    let re = Regex::new(r"/checkouts/([a-zA-Z0-9]+)").unwrap();
    re.captures(final_url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// A shipping option offered on the shipping-method page. The `id` is the
/// opaque form value; `price` is parsed from its trailing segment when the
/// storefront encodes one (`shopify-Standard-4.90`).
#[derive(Debug, Clone, PartialEq)]
pub struct ShippingRate {
    pub id: String,
    pub price: Option<f64>,
}

impl ShippingRate {
    fn from_id(id: &str) -> Self {
        let price = id.rsplit('-').next().and_then(|tail| tail.parse().ok());
        Self {
            id: id.to_string(),
            price,
        }
    }
}

/// All shipping-rate radio inputs present in a checkout response body, in
/// document order with duplicates removed.
pub fn shipping_rates(html: &str) -> Vec<ShippingRate> {
    let name_first = Regex::new(
        r#"name="checkout\[shipping_rate\]\[id\]"[^>]*value="([^"]+)""#,
    )
    .unwrap();
    let value_first = Regex::new(
        r#"value="([^"]+)"[^>]*name="checkout\[shipping_rate\]\[id\]""#,
    )
    .unwrap();

    let mut rates: Vec<ShippingRate> = Vec::new();
    for caps in name_first.captures_iter(html).chain(value_first.captures_iter(html)) {
        if let Some(m) = caps.get(1) {
            if !rates.iter().any(|r| r.id == m.as_str()) {
                rates.push(ShippingRate::from_id(m.as_str()));
            }
        }
    }
    rates
}

/// Pick the cheapest offered rate. Rates without a parseable price sort
/// after priced ones, so they are only chosen when nothing better exists.
pub fn cheapest_rate(rates: &[ShippingRate]) -> Option<&ShippingRate> {
    rates.iter().min_by(|a, b| match (a.price, b.price) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_endpoint_appends_suffix() {
        assert_eq!(
            json_endpoint("https://shop.example.com/products/tee"),
            "https://shop.example.com/products/tee.json"
        );
    }

    #[test]
    fn json_endpoint_strips_trailing_slash() {
        assert_eq!(
            json_endpoint("https://shop.example.com/products/tee/"),
            "https://shop.example.com/products/tee.json"
        );
    }

    #[test]
    fn json_endpoint_is_idempotent() {
        let url = "https://shop.example.com/products/tee.json";
        assert_eq!(json_endpoint(url), url);
        assert_eq!(json_endpoint(&json_endpoint(url)), url);
    }

    #[test]
    fn plain_and_json_urls_share_an_endpoint() {
        assert_eq!(
            json_endpoint("https://shop.example.com/products/tee"),
            json_endpoint("https://shop.example.com/products/tee.json")
        );
    }

    #[test]
    fn store_domain_extracts_host() {
        assert_eq!(
            store_domain("https://kith.com/products/hoodie?variant=1").unwrap(),
            "kith.com"
        );
    }

    #[test]
    fn validate_accepts_myshopify_hosts() {
        validate_product_url("https://demo-store.myshopify.com/collections/all").unwrap();
    }

    #[test]
    fn validate_accepts_custom_domains_with_product_paths() {
        validate_product_url("https://kith.com/products/box-logo-tee").unwrap();
    }

    #[test]
    fn validate_rejects_non_product_urls() {
        assert!(validate_product_url("https://example.com/about").is_err());
        assert!(validate_product_url("ftp://shop.myshopify.com/products/x").is_err());
        assert!(validate_product_url("not a url").is_err());
    }

    #[test]
    fn page_meta_finds_embedded_blob() {
        let html = "<script>\nvar meta = {\"product\":{\"id\":1,\"variants\":[]}};\nvar other = 2;\n</script>";
        assert_eq!(page_meta(html), Some("{\"product\":{\"id\":1,\"variants\":[]}}"));
    }

    #[test]
    fn page_meta_absent_returns_none() {
        assert_eq!(page_meta("<html><body>no scripts here</body></html>"), None);
    }

    #[test]
    fn authenticity_token_handles_both_attribute_orders() {
        let name_first = r#"<input type="hidden" name="authenticity_token" value="abc123==" />"#;
        let value_first = r#"<input type="hidden" value="xyz789" name="authenticity_token" />"#;
        assert_eq!(authenticity_token(name_first).as_deref(), Some("abc123=="));
        assert_eq!(authenticity_token(value_first).as_deref(), Some("xyz789"));
        assert_eq!(authenticity_token("<form></form>"), None);
    }

    #[test]
    fn checkout_token_from_redirect_url() {
        assert_eq!(
            checkout_token("https://shop.example.com/checkouts/0a1B2c3D4e").as_deref(),
            Some("0a1B2c3D4e")
        );
        assert_eq!(checkout_token("https://shop.example.com/cart"), None);
    }

    #[test]
    fn shipping_rates_parse_trailing_price() {
        let html = r#"
            <input type="radio" name="checkout[shipping_rate][id]" value="shopify-Express-12.50" />
            <input type="radio" name="checkout[shipping_rate][id]" value="shopify-Standard-4.90" />
            <input type="radio" name="checkout[shipping_rate][id]" value="shopify-Standard-4.90" />
        "#;
        let rates = shipping_rates(html);
        assert_eq!(rates.len(), 2);
        assert_eq!(rates[0].price, Some(12.50));
        assert_eq!(rates[1].price, Some(4.90));
    }

    #[test]
    fn cheapest_rate_prefers_lowest_price() {
        let rates = shipping_rates(
            r#"<input name="checkout[shipping_rate][id]" value="shopify-Express-12.50">
               <input name="checkout[shipping_rate][id]" value="shopify-Standard-4.90">"#,
        );
        assert_eq!(cheapest_rate(&rates).unwrap().id, "shopify-Standard-4.90");
    }

    #[test]
    fn cheapest_rate_tolerates_unpriced_ids() {
        let rates = vec![
            ShippingRate::from_id("carrier-custom"),
            ShippingRate::from_id("shopify-Standard-4.90"),
        ];
        assert_eq!(cheapest_rate(&rates).unwrap().id, "shopify-Standard-4.90");

        let only_unpriced = vec![ShippingRate::from_id("carrier-custom")];
        assert_eq!(cheapest_rate(&only_unpriced).unwrap().id, "carrier-custom");
    }

    #[test]
    fn no_rates_in_body_yields_empty() {
        assert!(shipping_rates("<html><body>Calculating...</body></html>").is_empty());
        assert!(cheapest_rate(&[]).is_none());
    }
}
