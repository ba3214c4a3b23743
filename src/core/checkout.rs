//! The linear checkout flow: availability check, cart add, checkout
//! session, customer information, shipping method, and then a hard stop
//! at the payment boundary. No payment data is ever collected, parsed,
//! or transmitted; finishing the order is always a manual act.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::core::error::StorefrontError;
use crate::core::storefront::{
    CONTACT_TO_SHIPPING, SHIPPING_TO_PAYMENT, Storefront, extract,
};
use crate::core::store::types::Profile;
use crate::notify::Notifier;

/// States of one checkout attempt. The flow is strictly linear; there is
/// no retry-from-the-middle, a failed attempt starts over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutStep {
    Start,
    AvailabilityConfirmed,
    InCart,
    CheckoutOpened,
    ShippingSubmitted,
    ShippingMethodSelected,
    PaymentBoundary,
    Failed,
}

impl CheckoutStep {
    /// Terminal states have no outgoing transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, CheckoutStep::PaymentBoundary | CheckoutStep::Failed)
    }
}

impl fmt::Display for CheckoutStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CheckoutStep::Start => "start",
            CheckoutStep::AvailabilityConfirmed => "availability check",
            CheckoutStep::InCart => "cart",
            CheckoutStep::CheckoutOpened => "checkout session",
            CheckoutStep::ShippingSubmitted => "customer information",
            CheckoutStep::ShippingMethodSelected => "shipping method",
            CheckoutStep::PaymentBoundary => "payment boundary",
            CheckoutStep::Failed => "failed",
        };
        write!(f, "{}", label)
    }
}

/// Whether a step change is legal. Any non-terminal state may fall into
/// `Failed`; forward progress is single-step only.
pub fn can_transition(from: CheckoutStep, to: CheckoutStep) -> bool {
    use CheckoutStep::*;
    if to == Failed {
        return !from.is_terminal();
    }
    matches!(
        (from, to),
        (Start, AvailabilityConfirmed)
            | (AvailabilityConfirmed, InCart)
            | (InCart, CheckoutOpened)
            | (CheckoutOpened, ShippingSubmitted)
            | (ShippingSubmitted, ShippingMethodSelected)
            | (ShippingMethodSelected, PaymentBoundary)
    )
}

/// Why an attempt ended in `Failed`; `step` is the last state the machine
/// held before failing.
#[derive(Debug, Error)]
#[error("checkout failed during {step}: {reason}")]
pub struct CheckoutFailure {
    pub step: CheckoutStep,
    pub reason: String,
}

/// Drives one product through the checkout flow for one shipping profile.
///
/// Owns its storefront client; the cookie jar inside is the cart/session
/// state, so a runner must never be shared between products.
pub struct CheckoutRunner {
    product_url: String,
    domain: String,
    profile: Profile,
    quantity: u32,
    storefront: Arc<dyn Storefront>,
    notifier: Arc<dyn Notifier>,
    poll_interval: Duration,
    error_backoff: Duration,
    cancel: CancellationToken,
    step: CheckoutStep,
    variant_id: Option<i64>,
}

impl CheckoutRunner {
    /// Validates the product URL up front; a malformed URL is rejected
    /// here, before any polling starts.
    pub fn new(
        product_url: &str,
        profile: Profile,
        quantity: u32,
        storefront: Arc<dyn Storefront>,
        notifier: Arc<dyn Notifier>,
        poll_interval: Duration,
        error_backoff: Duration,
    ) -> Result<Self, StorefrontError> {
        extract::validate_product_url(product_url)?;
        let domain = extract::store_domain(product_url)?;
        Ok(Self {
            product_url: product_url.to_string(),
            domain,
            profile,
            quantity: quantity.max(1),
            storefront,
            notifier,
            poll_interval,
            error_backoff,
            cancel: CancellationToken::new(),
            step: CheckoutStep::Start,
            variant_id: None,
        })
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn step(&self) -> CheckoutStep {
        self.step
    }

    /// One full attempt. Runs to a terminal state: `Ok(())` means the
    /// machine reached the payment boundary, `Err` carries the step it
    /// failed from. Exactly one notification describes a failure.
    pub async fn run_once(&mut self) -> Result<(), CheckoutFailure> {
        self.step = CheckoutStep::Start;
        self.notify(&format!("Starting checkout for {}", self.product_url))
            .await;

        let variant_id = match self.variant_id {
            Some(id) => id,
            None => match self.first_available_variant().await {
                Ok(Some(id)) => id,
                Ok(None) => return Err(self.fail("product is not available".to_string()).await),
                Err(e) => {
                    return Err(self.fail(format!("availability check failed: {e}")).await);
                }
            },
        };
        self.variant_id = Some(variant_id);
        self.advance(CheckoutStep::AvailabilityConfirmed);

        if let Err(e) = self
            .storefront
            .add_to_cart(&self.domain, variant_id, self.quantity)
            .await
        {
            return Err(self.fail(format!("could not add to cart: {e}")).await);
        }
        self.advance(CheckoutStep::InCart);
        self.notify("Product added to cart.").await;

        let tokens = match self.storefront.open_checkout(&self.domain).await {
            Ok(tokens) => tokens,
            Err(e) => {
                return Err(self.fail(format!("could not open checkout: {e}")).await);
            }
        };
        self.advance(CheckoutStep::CheckoutOpened);
        self.notify("Checkout session opened.").await;

        let contact = contact_fields(&self.profile);
        let shipping_page = match self
            .storefront
            .submit_step(&self.domain, &tokens, CONTACT_TO_SHIPPING, &contact)
            .await
        {
            Ok(body) => body,
            Err(e) => {
                return Err(self
                    .fail(format!("could not submit customer information: {e}"))
                    .await);
            }
        };
        self.advance(CheckoutStep::ShippingSubmitted);
        self.notify("Customer information submitted.").await;

        // The shipping-method page advertises the rates valid for this
        // address; pick the cheapest rather than assuming any fixed id
        // exists on this storefront.
        let rates = extract::shipping_rates(&shipping_page);
        let rate = match extract::cheapest_rate(&rates) {
            Some(rate) => rate.id.clone(),
            None => {
                return Err(self
                    .fail("no shipping rates offered for this address".to_string())
                    .await);
            }
        };
        let fields = vec![("checkout[shipping_rate][id]".to_string(), rate.clone())];
        if let Err(e) = self
            .storefront
            .submit_step(&self.domain, &tokens, SHIPPING_TO_PAYMENT, &fields)
            .await
        {
            return Err(self.fail(format!("could not select shipping method: {e}")).await);
        }
        self.advance(CheckoutStep::ShippingMethodSelected);
        self.notify(&format!("Shipping method selected: {rate}")).await;

        // Hard stop. Nothing is sent past this point.
        self.advance(CheckoutStep::PaymentBoundary);
        info!(
            "checkout for {} reached the payment step",
            self.product_url
        );
        self.notify(
            "Checkout is ready at the payment step. Open the checkout in a browser and complete payment manually.",
        )
        .await;
        Ok(())
    }

    /// Watch the product until it comes in stock, then attempt checkout;
    /// keep watching after failed attempts. Returns true once an attempt
    /// reaches the payment boundary, false when cancelled first.
    pub async fn hunt(&mut self) -> bool {
        info!("hunt started for {}", self.product_url);
        self.notify(&format!(
            "Watching {} and will check out when available.",
            self.product_url
        ))
        .await;

        while !self.cancel.is_cancelled() {
            match self.first_available_variant().await {
                Ok(Some(id)) => {
                    self.variant_id = Some(id);
                    if self.run_once().await.is_ok() {
                        return true;
                    }
                    // The next attempt re-resolves availability; the
                    // variant that failed may be gone by then.
                    self.variant_id = None;
                    self.sleep(self.error_backoff).await;
                }
                Ok(None) => self.sleep(self.poll_interval).await,
                Err(e) if e.is_transient() => {
                    warn!("hunt poll failed for {}: {}", self.product_url, e);
                    self.sleep(self.error_backoff).await;
                }
                Err(e) => {
                    warn!("hunt for {} cannot continue: {}", self.product_url, e);
                    self.notify(&format!("Hunt stopped: {e}")).await;
                    return false;
                }
            }
        }
        info!("hunt stopped for {}", self.product_url);
        false
    }

    async fn first_available_variant(&self) -> Result<Option<i64>, StorefrontError> {
        let snapshot = self.storefront.product_snapshot(&self.product_url).await?;
        Ok(snapshot.first_available().map(|v| v.id))
    }

    fn advance(&mut self, to: CheckoutStep) {
        debug_assert!(can_transition(self.step, to), "{} -> {}", self.step, to);
        self.step = to;
    }

    async fn fail(&mut self, reason: String) -> CheckoutFailure {
        let failure = CheckoutFailure {
            step: self.step,
            reason,
        };
        self.step = CheckoutStep::Failed;
        warn!("{failure}");
        self.notify(&format!("Checkout failed: {}", failure.reason)).await;
        failure
    }

    async fn sleep(&self, duration: Duration) {
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = tokio::time::sleep(duration) => {}
        }
    }

    async fn notify(&self, text: &str) {
        if let Err(e) = self.notifier.send_text(text).await {
            warn!("notification delivery failed: {e}");
        }
    }
}

/// Map a shipping profile onto the checkout form's field names. Only
/// contact and address fields; there is deliberately no mapping for any
/// payment field.
pub fn contact_fields(profile: &Profile) -> Vec<(String, String)> {
    let pairs: [(&str, String); 9] = [
        ("checkout[email]", profile.email.clone()),
        (
            "checkout[shipping_address][first_name]",
            profile.first_name.clone(),
        ),
        (
            "checkout[shipping_address][last_name]",
            profile.last_name.clone(),
        ),
        (
            "checkout[shipping_address][address1]",
            profile.address1.clone(),
        ),
        (
            "checkout[shipping_address][address2]",
            profile.address2.clone().unwrap_or_default(),
        ),
        ("checkout[shipping_address][city]", profile.city.clone()),
        ("checkout[shipping_address][zip]", profile.zip.clone()),
        ("checkout[shipping_address][phone]", profile.phone.clone()),
        ("checkout[remember_me]", "0".to_string()),
    ];
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transitions_are_legal() {
        let path = [
            (CheckoutStep::Start, CheckoutStep::AvailabilityConfirmed),
            (CheckoutStep::AvailabilityConfirmed, CheckoutStep::InCart),
            (CheckoutStep::InCart, CheckoutStep::CheckoutOpened),
            (CheckoutStep::CheckoutOpened, CheckoutStep::ShippingSubmitted),
            (
                CheckoutStep::ShippingSubmitted,
                CheckoutStep::ShippingMethodSelected,
            ),
            (
                CheckoutStep::ShippingMethodSelected,
                CheckoutStep::PaymentBoundary,
            ),
        ];
        for (from, to) in path {
            assert!(can_transition(from, to), "{from} -> {to} should be legal");
        }
    }

    #[test]
    fn skipping_steps_is_illegal() {
        assert!(!can_transition(
            CheckoutStep::Start,
            CheckoutStep::InCart
        ));
        assert!(!can_transition(
            CheckoutStep::InCart,
            CheckoutStep::ShippingMethodSelected
        ));
        assert!(!can_transition(
            CheckoutStep::AvailabilityConfirmed,
            CheckoutStep::PaymentBoundary
        ));
    }

    #[test]
    fn backward_transitions_are_illegal() {
        assert!(!can_transition(
            CheckoutStep::InCart,
            CheckoutStep::AvailabilityConfirmed
        ));
        assert!(!can_transition(
            CheckoutStep::PaymentBoundary,
            CheckoutStep::Start
        ));
    }

    #[test]
    fn any_active_state_can_fail() {
        for from in [
            CheckoutStep::Start,
            CheckoutStep::AvailabilityConfirmed,
            CheckoutStep::InCart,
            CheckoutStep::CheckoutOpened,
            CheckoutStep::ShippingSubmitted,
            CheckoutStep::ShippingMethodSelected,
        ] {
            assert!(can_transition(from, CheckoutStep::Failed));
        }
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for from in [CheckoutStep::PaymentBoundary, CheckoutStep::Failed] {
            assert!(from.is_terminal());
            for to in [
                CheckoutStep::Start,
                CheckoutStep::AvailabilityConfirmed,
                CheckoutStep::InCart,
                CheckoutStep::CheckoutOpened,
                CheckoutStep::ShippingSubmitted,
                CheckoutStep::ShippingMethodSelected,
                CheckoutStep::PaymentBoundary,
                CheckoutStep::Failed,
            ] {
                assert!(!can_transition(from, to), "{from} -> {to} must be illegal");
            }
        }
    }

    #[test]
    fn contact_fields_carry_the_full_address() {
        let profile = Profile {
            id: "p-1".to_string(),
            name: "home".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            address1: "12 Analytical Way".to_string(),
            address2: Some("Flat 4".to_string()),
            city: "London".to_string(),
            zip: "N1 9GU".to_string(),
            phone: "+44 20 0000 0000".to_string(),
        };
        let fields = contact_fields(&profile);
        let get = |k: &str| {
            fields
                .iter()
                .find(|(key, _)| key == k)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("checkout[email]"), Some("ada@example.com"));
        assert_eq!(get("checkout[shipping_address][address2]"), Some("Flat 4"));
        assert_eq!(get("checkout[remember_me]"), Some("0"));
    }

    #[test]
    fn missing_address2_becomes_empty_field() {
        let profile = Profile {
            id: "p-1".to_string(),
            name: "home".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            address1: "12 Analytical Way".to_string(),
            address2: None,
            city: "London".to_string(),
            zip: "N1 9GU".to_string(),
            phone: "+44 20 0000 0000".to_string(),
        };
        let fields = contact_fields(&profile);
        let address2 = fields
            .iter()
            .find(|(k, _)| k == "checkout[shipping_address][address2]")
            .unwrap();
        assert_eq!(address2.1, "");
    }

    #[test]
    fn no_payment_fields_are_ever_mapped() {
        let profile = Profile {
            id: "p-1".to_string(),
            name: "home".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            address1: "12 Analytical Way".to_string(),
            address2: None,
            city: "London".to_string(),
            zip: "N1 9GU".to_string(),
            phone: "+44 20 0000 0000".to_string(),
        };
        for (key, _) in contact_fields(&profile) {
            let lowered = key.to_lowercase();
            assert!(!lowered.contains("card"));
            assert!(!lowered.contains("payment"));
            assert!(!lowered.contains("cvv"));
        }
    }
}
