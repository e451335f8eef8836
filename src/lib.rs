//! Childlike Storefront Cart
//!
//! Cart state for a direct-to-consumer food storefront.
//!
//! ## Features
//! - Validated cart lines with bounded quantities and a line-item cap
//! - Device-local persistence with corruption recovery
//! - Per-account remote persistence (Postgres)
//! - Sign-in merge of the anonymous cart into the account cart
//! - Checkout hand-off to hosted payment links

pub mod api;
pub mod checkout;
pub mod config;
pub mod controller;
pub mod domain;
pub mod notify;
pub mod session;
pub mod store;
pub mod sync;

use thiserror::Error;

pub use checkout::{CheckoutConfig, CheckoutError};
pub use config::{Config, ConfigError};
pub use controller::{CartController, CartObserver};
pub use domain::aggregates::{Cart, CartError, CartSnapshot, LineItem, LineItemCandidate};
pub use domain::events::{CartEvent, SessionEvent};
pub use domain::value_objects::{AccountId, Quantity, Variant};
pub use session::{SessionHub, SessionNotifier};
pub use store::StoreError;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum StorefrontError {
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, StorefrontError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn add_then_checkout(config: &CheckoutConfig) -> Result<String> {
        let mut cart = Cart::new();
        cart.add_item(LineItem::validate(LineItemCandidate {
            product_id: "chewy-protein-cookie".into(), slug: "chewy-protein-cookie".into(), name: "Chewy Protein Cookie".into(),
            unit_price: 120.0, quantity: 1, variant_id: None, variant_name: None,
        })?)?;
        Ok(checkout::checkout(config, &cart)?.url)
    }

    #[test]
    fn test_errors_convert() {
        assert!(add_then_checkout(&CheckoutConfig::placeholder()).is_ok());
        let err = add_then_checkout(&CheckoutConfig::default()).unwrap_err();
        assert!(matches!(err, StorefrontError::Checkout(CheckoutError::Unavailable(_))));
    }
}
