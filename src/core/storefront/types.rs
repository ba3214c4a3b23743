use serde::{Deserialize, Deserializer, Serialize};

/// One purchasable variant of a product (a size, a colorway).
///
/// Prices stay as decimal strings end to end; they are display data and
/// comparison keys here, never arithmetic operands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default, deserialize_with = "price_as_string")]
    pub price: String,
    #[serde(default)]
    pub available: bool,
    #[serde(default)]
    pub option1: Option<String>,
    #[serde(default)]
    pub option2: Option<String>,
    #[serde(default)]
    pub option3: Option<String>,
}

/// The `{"product": {...}}` envelope returned by the public product feed
/// and embedded in product pages as `var meta = {...};`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductFeed {
    pub product: ProductBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductBody {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub handle: String,
    #[serde(default)]
    pub vendor: String,
    #[serde(default, alias = "type")]
    pub product_type: String,
    #[serde(default)]
    pub variants: Vec<Variant>,
}

/// A product observed at one point in time, tagged with the URL it was
/// fetched from.
#[derive(Debug, Clone, Serialize)]
pub struct ProductSnapshot {
    pub title: String,
    pub handle: String,
    pub vendor: String,
    pub product_type: String,
    pub url: String,
    pub variants: Vec<Variant>,
}

impl ProductSnapshot {
    pub fn from_feed(feed: ProductFeed, url: &str) -> Self {
        Self {
            title: feed.product.title,
            handle: feed.product.handle,
            vendor: feed.product.vendor,
            product_type: feed.product.product_type,
            url: url.to_string(),
            variants: feed.product.variants,
        }
    }

    /// The first variant currently marked purchasable, if any.
    pub fn first_available(&self) -> Option<&Variant> {
        self.variants.iter().find(|v| v.available)
    }

    pub fn any_available(&self) -> bool {
        self.variants.iter().any(|v| v.available)
    }
}

/// Storefront themes are inconsistent about prices: the feed sends
/// `"19.99"`, embedded page metadata often sends a bare number. Accept
/// either and keep the textual form.
fn price_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Price {
        Text(String),
        Number(f64),
    }

    Ok(match Option::<Price>::deserialize(deserializer)? {
        Some(Price::Text(s)) => s,
        Some(Price::Number(n)) => n.to_string(),
        None => String::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_product_feed_json() {
        let raw = r#"{
            "product": {
                "id": 632910392,
                "title": "IPod Nano - 8GB",
                "handle": "ipod-nano",
                "vendor": "Apple",
                "product_type": "Cult Products",
                "variants": [
                    {"id": 808950810, "title": "Pink", "price": "199.00", "available": true, "option1": "Pink"},
                    {"id": 808950811, "title": "Red", "price": "199.00", "available": false, "option1": "Red"}
                ]
            }
        }"#;
        let feed: ProductFeed = serde_json::from_str(raw).unwrap();
        let snapshot = ProductSnapshot::from_feed(feed, "https://shop.example.com/products/ipod-nano");
        assert_eq!(snapshot.title, "IPod Nano - 8GB");
        assert_eq!(snapshot.product_type, "Cult Products");
        assert_eq!(snapshot.variants.len(), 2);
        assert_eq!(snapshot.variants[0].price, "199.00");
        assert!(snapshot.any_available());
        assert_eq!(snapshot.first_available().unwrap().id, 808950810);
    }

    #[test]
    fn tolerates_sparse_page_metadata() {
        // Embedded `var meta` blobs use "type" instead of "product_type",
        // numeric prices, and omit availability entirely.
        let raw = r#"{
            "product": {
                "type": "Shoes",
                "variants": [
                    {"id": 1, "price": 8995}
                ]
            }
        }"#;
        let feed: ProductFeed = serde_json::from_str(raw).unwrap();
        assert_eq!(feed.product.product_type, "Shoes");
        assert_eq!(feed.product.title, "");
        let v = &feed.product.variants[0];
        assert_eq!(v.price, "8995");
        assert!(!v.available);
        assert!(v.option1.is_none());
    }

    #[test]
    fn missing_variants_key_means_empty_list() {
        let feed: ProductFeed = serde_json::from_str(r#"{"product": {"title": "Bare"}}"#).unwrap();
        assert!(feed.product.variants.is_empty());
        let snapshot = ProductSnapshot::from_feed(feed, "https://shop.example.com/products/bare");
        assert!(!snapshot.any_available());
        assert!(snapshot.first_available().is_none());
    }
}
