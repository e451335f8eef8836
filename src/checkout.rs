//! Checkout hand-off to hosted payment pages.
//!
//! The storefront never sees a payment: checkout resolves the first line's
//! product to a pre-configured payment link and the client navigates there.
//! The cart itself is left untouched either way.

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::aggregates::Cart;
use crate::domain::pricing::{payment_line_items, PaymentLineItem};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentLink {
    pub product_id: String,
    pub url: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CheckoutConfig { links: Vec<PaymentLink> }

impl CheckoutConfig {
    pub fn new(links: Vec<PaymentLink>) -> Self { Self { links } }

    /// The single placeholder link the storefront ships with.
    pub fn placeholder() -> Self {
        Self::new(vec![PaymentLink {
            product_id: "chewy-protein-cookie".into(),
            url: "https://buy.stripe.com/XXXXXX".into(),
        }])
    }

    pub fn link_for(&self, product_id: &str) -> Option<&str> {
        self.links.iter().find(|l| l.product_id == product_id).map(|l| l.url.as_str())
    }

    pub fn links(&self) -> &[PaymentLink] { &self.links }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CheckoutHandoff {
    pub url: String,
    pub line_items: Vec<PaymentLineItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckoutError {
    #[error("cart is empty")]
    EmptyCart,
    #[error("checkout unavailable for {0}")]
    Unavailable(String),
}

pub fn checkout(config: &CheckoutConfig, cart: &Cart) -> Result<CheckoutHandoff, CheckoutError> {
    let primary = cart.items().first().ok_or(CheckoutError::EmptyCart)?;
    let Some(url) = config.link_for(primary.product_id()) else {
        warn!(product_id = primary.product_id(), "no payment link configured");
        return Err(CheckoutError::Unavailable(primary.product_id().to_string()));
    };
    info!(product_id = primary.product_id(), item_count = cart.item_count(), "checkout handed off");
    Ok(CheckoutHandoff { url: url.to_string(), line_items: payment_line_items(cart.items()) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::cart::tests::item;
    use crate::domain::aggregates::CartSnapshot;

    #[test]
    fn test_checkout_uses_first_item() {
        let cart = Cart::from_snapshot(CartSnapshot { items: vec![item("chewy-protein-cookie", 2), item("other", 1)] });
        let handoff = checkout(&CheckoutConfig::placeholder(), &cart).unwrap();
        assert_eq!(handoff.url, "https://buy.stripe.com/XXXXXX");
        assert_eq!(handoff.line_items.len(), 2);
    }

    #[test]
    fn test_checkout_unavailable_keeps_cart() {
        let cart = Cart::from_snapshot(CartSnapshot { items: vec![item("other", 1)] });
        assert_eq!(checkout(&CheckoutConfig::placeholder(), &cart), Err(CheckoutError::Unavailable("other".into())));
        assert_eq!(cart.len(), 1);
        assert_eq!(checkout(&CheckoutConfig::placeholder(), &Cart::new()), Err(CheckoutError::EmptyCart));
    }
}
