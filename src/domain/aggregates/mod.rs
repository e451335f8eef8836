//! Aggregates module
pub mod cart;

pub use cart::{
    cap_items, sanitize_entries, Cart, CartError, CartSnapshot, LineItem, LineItemCandidate,
    QuantityUpdate, Sanitized, MAX_LINE_ITEMS,
};
