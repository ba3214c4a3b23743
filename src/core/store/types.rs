use serde::Serialize;

/// Shipping/contact details used to fill the checkout form. Deliberately
/// excludes payment fields; the engine never handles card data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Profile {
    pub id: String,
    pub name: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub address1: String,
    pub address2: Option<String>,
    pub city: String,
    pub zip: String,
    pub phone: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonitorRecord {
    pub id: String,
    pub product_url: String,
    pub notify: bool,
    pub active: bool,
    pub created_at: String,
}

/// A checkout task pins the profile by id at creation time, so a later
/// rename or edit of the profile cannot silently redirect an order.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutTaskRecord {
    pub id: String,
    pub product_url: String,
    pub profile_id: String,
    pub profile_name: String,
    pub quantity: u32,
    pub auto_checkout: bool,
    pub active: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PriceAlertRecord {
    pub id: String,
    pub product_url: String,
    pub target_price: f64,
    pub active: bool,
    pub created_at: String,
}
