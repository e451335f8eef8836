//! Cart Aggregate

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

use crate::domain::pricing;
use crate::domain::value_objects::{Quantity, Variant};

/// Most distinct line items a cart may hold.
pub const MAX_LINE_ITEMS: usize = 50;

fn default_quantity() -> i64 { 1 }

/// Untrusted line-item shape, as it arrives from the UI or either store.
///
/// Legacy stored carts used `price`, `flavorId` and `flavorName`; those keys
/// are accepted as aliases.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LineItemCandidate {
    #[validate(length(min = 1))]
    pub product_id: String,
    #[serde(default)]
    pub slug: String,
    #[validate(length(min = 1))]
    pub name: String,
    #[serde(alias = "price")]
    pub unit_price: f64,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
    #[serde(default, alias = "flavorId", skip_serializing_if = "Option::is_none")]
    pub variant_id: Option<String>,
    #[serde(default, alias = "flavorName", skip_serializing_if = "Option::is_none")]
    pub variant_name: Option<String>,
}

/// A validated cart line. Only constructible through [`LineItem::validate`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "LineItemCandidate", into = "LineItemCandidate")]
pub struct LineItem {
    product_id: String,
    slug: String,
    name: String,
    variant: Option<Variant>,
    unit_price: f64,
    quantity: Quantity,
}

impl LineItem {
    /// Checks shape, identifiers, price and quantity; the variant id and
    /// name must be both present or both absent.
    pub fn validate(candidate: LineItemCandidate) -> Result<Self, CartError> {
        candidate.validate().map_err(|e| CartError::Invalid(e.to_string()))?;
        if !candidate.unit_price.is_finite() || candidate.unit_price <= 0.0 {
            return Err(CartError::Invalid(format!("unit price {} is not a positive amount", candidate.unit_price)));
        }
        let quantity = Quantity::new(candidate.quantity).ok_or(CartError::InvalidQuantity(candidate.quantity))?;
        let variant = match (candidate.variant_id, candidate.variant_name) {
            (Some(id), Some(name)) => Some(Variant { id, name }),
            (None, None) => None,
            _ => return Err(CartError::Invalid("variant id and name must be given together".into())),
        };
        Ok(Self {
            product_id: candidate.product_id, slug: candidate.slug, name: candidate.name,
            variant, unit_price: candidate.unit_price, quantity,
        })
    }

    pub fn product_id(&self) -> &str { &self.product_id }
    pub fn slug(&self) -> &str { &self.slug }
    pub fn name(&self) -> &str { &self.name }
    pub fn variant(&self) -> Option<&Variant> { self.variant.as_ref() }
    pub fn unit_price(&self) -> f64 { self.unit_price }
    pub fn quantity(&self) -> Quantity { self.quantity }
    pub fn line_total(&self) -> f64 { pricing::line_total(self.unit_price, self.quantity.value()) }

    pub fn with_quantity(mut self, quantity: Quantity) -> Self {
        self.quantity = quantity;
        self
    }
}

impl TryFrom<LineItemCandidate> for LineItem {
    type Error = CartError;
    fn try_from(candidate: LineItemCandidate) -> Result<Self, Self::Error> { Self::validate(candidate) }
}

impl From<LineItem> for LineItemCandidate {
    fn from(item: LineItem) -> Self {
        let (variant_id, variant_name) = match item.variant {
            Some(Variant { id, name }) => (Some(id), Some(name)),
            None => (None, None),
        };
        Self {
            product_id: item.product_id, slug: item.slug, name: item.name,
            unit_price: item.unit_price, quantity: i64::from(item.quantity.value()),
            variant_id, variant_name,
        }
    }
}

/// Serializable whole-cart aggregate; the value kept in both stores.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CartSnapshot {
    pub items: Vec<LineItem>,
}

impl CartSnapshot {
    pub fn empty() -> Self { Self::default() }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }
}

/// Result of running an untrusted sequence through validation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Sanitized {
    pub items: Vec<LineItem>,
    pub dropped: usize,
    pub truncated: usize,
}

/// Validates each entry, dropping malformed ones and repeated product ids
/// (first occurrence wins). Once [`MAX_LINE_ITEMS`] are kept, the remaining
/// entries are counted as truncated without being parsed.
pub fn sanitize_entries(entries: Vec<serde_json::Value>) -> Sanitized {
    let mut out = Sanitized::default();
    let mut seen = HashSet::new();
    let mut entries = entries.into_iter();
    for entry in entries.by_ref() {
        match serde_json::from_value::<LineItem>(entry) {
            Ok(item) if seen.insert(item.product_id.clone()) => out.items.push(item),
            _ => out.dropped += 1,
        }
        if out.items.len() == MAX_LINE_ITEMS { break; }
    }
    out.truncated = entries.len();
    out
}

/// Truncates to [`MAX_LINE_ITEMS`]; returns how many were cut.
pub fn cap_items(items: &mut Vec<LineItem>) -> usize {
    let excess = items.len().saturating_sub(MAX_LINE_ITEMS);
    items.truncate(MAX_LINE_ITEMS);
    excess
}

/// Outcome of [`Cart::update_quantity`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuantityUpdate { Updated(Quantity), Removed, Absent }

/// In-memory cart: the snapshot plus values derived from it.
///
/// Derived fields are recomputed on every change, so a reader never sees a
/// count or subtotal that belongs to a different item list.
#[derive(Clone, Debug)]
pub struct Cart {
    snapshot: CartSnapshot,
    item_count: u32,
    subtotal: f64,
    updated_at: DateTime<Utc>,
}

impl Default for Cart {
    fn default() -> Self { Self::new() }
}

impl Cart {
    pub fn new() -> Self { Self::from_snapshot(CartSnapshot::empty()) }

    pub fn from_snapshot(snapshot: CartSnapshot) -> Self {
        let mut cart = Self { snapshot, item_count: 0, subtotal: 0.0, updated_at: Utc::now() };
        cart.recalculate();
        cart
    }

    pub fn snapshot(&self) -> &CartSnapshot { &self.snapshot }
    pub fn items(&self) -> &[LineItem] { &self.snapshot.items }
    pub fn item_count(&self) -> u32 { self.item_count }
    pub fn subtotal(&self) -> f64 { self.subtotal }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }
    pub fn len(&self) -> usize { self.snapshot.items.len() }
    pub fn is_empty(&self) -> bool { self.snapshot.is_empty() }
    pub fn get(&self, product_id: &str) -> Option<&LineItem> {
        self.snapshot.items.iter().find(|i| i.product_id == product_id)
    }

    /// Adds to an existing line (capped at the max quantity) or appends a new one.
    pub fn add_item(&mut self, item: LineItem) -> Result<Quantity, CartError> {
        let quantity = if let Some(existing) = self.snapshot.items.iter_mut().find(|i| i.product_id == item.product_id) {
            existing.quantity = existing.quantity.saturating_add(item.quantity.value());
            existing.quantity
        } else {
            if self.snapshot.items.len() >= MAX_LINE_ITEMS { return Err(CartError::CartFull); }
            let quantity = item.quantity;
            self.snapshot.items.push(item);
            quantity
        };
        self.recalculate();
        Ok(quantity)
    }

    /// `quantity <= 0` removes the line; anything else is clamped into range.
    pub fn update_quantity(&mut self, product_id: &str, quantity: i64) -> QuantityUpdate {
        if quantity <= 0 {
            return if self.remove_item(product_id) { QuantityUpdate::Removed } else { QuantityUpdate::Absent };
        }
        let Some(item) = self.snapshot.items.iter_mut().find(|i| i.product_id == product_id) else {
            return QuantityUpdate::Absent;
        };
        item.quantity = Quantity::clamped(quantity);
        let quantity = item.quantity;
        self.recalculate();
        QuantityUpdate::Updated(quantity)
    }

    /// Returns whether a line was removed.
    pub fn remove_item(&mut self, product_id: &str) -> bool {
        let before = self.snapshot.items.len();
        self.snapshot.items.retain(|i| i.product_id != product_id);
        if self.snapshot.items.len() == before { return false; }
        self.recalculate();
        true
    }

    pub fn clear(&mut self) { self.snapshot.items.clear(); self.recalculate(); }

    pub fn replace(&mut self, items: Vec<LineItem>) { self.snapshot.items = items; self.recalculate(); }

    fn recalculate(&mut self) {
        self.item_count = pricing::compute_item_count(&self.snapshot.items);
        self.subtotal = pricing::compute_subtotal(&self.snapshot.items);
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CartError {
    #[error("invalid line item: {0}")]
    Invalid(String),
    #[error("invalid quantity: {0}")]
    InvalidQuantity(i64),
    #[error("cart already holds {MAX_LINE_ITEMS} distinct items")]
    CartFull,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) fn candidate(product_id: &str, unit_price: f64, quantity: i64) -> LineItemCandidate {
        LineItemCandidate {
            product_id: product_id.into(), slug: product_id.into(), name: "Chewy Protein Cookie".into(),
            unit_price, quantity, variant_id: None, variant_name: None,
        }
    }

    pub(crate) fn item(product_id: &str, quantity: i64) -> LineItem {
        LineItem::validate(candidate(product_id, 120.0, quantity)).unwrap()
    }

    #[test]
    fn test_validate_rejections() {
        assert!(LineItem::validate(candidate("", 120.0, 1)).is_err());
        assert!(LineItem::validate(LineItemCandidate { name: String::new(), ..candidate("p", 120.0, 1) }).is_err());
        assert!(LineItem::validate(candidate("p", 0.0, 1)).is_err());
        assert!(LineItem::validate(candidate("p", -5.0, 1)).is_err());
        assert!(LineItem::validate(candidate("p", f64::INFINITY, 1)).is_err());
        assert!(LineItem::validate(candidate("p", f64::NAN, 1)).is_err());
        assert!(LineItem::validate(candidate("p", 120.0, 0)).is_err());
        assert!(LineItem::validate(candidate("p", 120.0, 100)).is_err());
        assert!(LineItem::validate(LineItemCandidate { variant_id: Some("choc".into()), ..candidate("p", 120.0, 1) }).is_err());
        assert!(LineItem::validate(candidate("p", 120.0, 99)).is_ok());
    }

    #[test]
    fn test_wire_format() {
        let value = json!({"productId": "cookie-choc", "slug": "cookie", "name": "Cookie",
            "unitPrice": 120, "quantity": 2, "variantId": "choc", "variantName": "Chocolate"});
        let item: LineItem = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(item.variant().unwrap().name, "Chocolate");
        assert_eq!(serde_json::to_value(&item).unwrap()["unitPrice"], json!(120.0));

        let legacy = json!({"productId": "cookie-choc", "slug": "cookie", "name": "Cookie",
            "price": 120, "quantity": 2, "flavorId": "choc", "flavorName": "Chocolate"});
        assert_eq!(serde_json::from_value::<LineItem>(legacy).unwrap(), item);

        assert!(serde_json::from_value::<LineItem>(json!({"productId": "x", "name": "X", "unitPrice": 1, "quantity": 1.5})).is_err());
        assert!(serde_json::from_value::<LineItem>(json!("cookie")).is_err());
    }

    #[test]
    fn test_sanitize_entries() {
        let mut entries = vec![
            json!({"productId": "a", "name": "A", "unitPrice": 10, "quantity": 1}),
            json!({"productId": "a", "name": "A again", "unitPrice": 10, "quantity": 4}),
            json!({"productId": "", "name": "bad", "unitPrice": 10, "quantity": 1}),
            json!(42),
        ];
        for i in 0..55 {
            entries.push(json!({"productId": format!("p{i}"), "name": "P", "unitPrice": 1, "quantity": 1}));
        }
        let out = sanitize_entries(entries);
        assert_eq!(out.dropped, 3);
        assert_eq!(out.items.len(), MAX_LINE_ITEMS);
        assert_eq!(out.truncated, 6);
        assert_eq!(out.items[0].product_id(), "a");
        assert_eq!(out.items[0].quantity().value(), 1);
        assert_eq!(out.items[49].product_id(), "p48");
    }

    #[test]
    fn test_sanitize_large_input() {
        let entries: Vec<_> = (0..60_000)
            .map(|i| json!({"productId": format!("p{i}"), "name": "P", "unitPrice": 1, "quantity": 1}))
            .collect();
        let started = std::time::Instant::now();
        let out = sanitize_entries(entries);
        assert_eq!(out.items.len(), MAX_LINE_ITEMS);
        assert_eq!(out.truncated, 59_950);
        assert_eq!(out.dropped, 0);
        assert!(started.elapsed() < std::time::Duration::from_secs(2));
    }

    #[test]
    fn test_out_of_range_quantity_error() {
        assert_eq!(LineItem::validate(candidate("p", 120.0, 0)), Err(CartError::InvalidQuantity(0)));
        assert_eq!(LineItem::validate(candidate("p", 120.0, 100)), Err(CartError::InvalidQuantity(100)));
    }

    #[test]
    fn test_cart_operations() {
        let mut cart = Cart::new();
        cart.add_item(item("P1", 2)).unwrap();
        assert_eq!(cart.len(), 1);
        assert_eq!(cart.subtotal(), 240.0);
        cart.add_item(item("P1", 1)).unwrap();
        assert_eq!(cart.items()[0].quantity().value(), 3);
        assert_eq!(cart.item_count(), 3);
        cart.add_item(item("P1", 99)).unwrap();
        assert_eq!(cart.items()[0].quantity().value(), 99);
    }

    #[test]
    fn test_cart_full() {
        let mut cart = Cart::new();
        for i in 0..MAX_LINE_ITEMS {
            cart.add_item(item(&format!("p{i}"), 1)).unwrap();
        }
        assert_eq!(cart.add_item(item("one-too-many", 1)), Err(CartError::CartFull));
        assert_eq!(cart.len(), MAX_LINE_ITEMS);
        // existing lines still accept quantity
        assert!(cart.add_item(item("p0", 1)).is_ok());
    }

    #[test]
    fn test_update_and_remove() {
        let mut cart = Cart::new();
        cart.add_item(item("a", 2)).unwrap();
        cart.add_item(item("b", 1)).unwrap();
        assert_eq!(cart.update_quantity("a", 500), QuantityUpdate::Updated(Quantity::clamped(99)));
        assert_eq!(cart.update_quantity("missing", 3), QuantityUpdate::Absent);
        assert_eq!(cart.update_quantity("a", 0), QuantityUpdate::Removed);
        assert_eq!(cart.update_quantity("a", -1), QuantityUpdate::Absent);
        assert!(cart.remove_item("b"));
        assert!(!cart.remove_item("b"));
        assert!(cart.is_empty());
        assert_eq!(cart.item_count(), 0);
        assert_eq!(cart.subtotal(), 0.0);
    }
}
