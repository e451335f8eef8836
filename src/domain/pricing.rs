//! Pricing
//!
//! Every amount here is in major units (pesos). Rounding happens only when a
//! value is formatted or handed to the payment page, never mid-computation.

use serde::Serialize;

use crate::domain::aggregates::LineItem;
use crate::domain::value_objects::{Money, PHP};

pub fn line_total(unit_price: f64, quantity: u32) -> f64 { unit_price * f64::from(quantity) }

/// Sum of `unit_price * quantity`; `0.0` for an empty slice.
pub fn compute_subtotal(items: &[LineItem]) -> f64 {
    items.iter().map(LineItem::line_total).sum()
}

/// Sum of quantities. Zero exactly when `items` is empty, since every line holds at least one.
pub fn compute_item_count(items: &[LineItem]) -> u32 {
    items.iter().map(|i| i.quantity().value()).sum()
}

/// Order-level totals. Tax, shipping and discount are not computed by this
/// storefront and are always zero.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CartTotals {
    pub subtotal: f64,
    pub tax: f64,
    pub shipping: f64,
    pub discount: f64,
    pub total: f64,
}

impl CartTotals {
    pub fn for_items(items: &[LineItem]) -> Self {
        let subtotal = compute_subtotal(items);
        let (tax, shipping, discount) = (0.0, 0.0, 0.0);
        Self { subtotal, tax, shipping, discount, total: subtotal + tax + shipping - discount }
    }
}

pub fn format_price(amount: f64) -> String {
    Money::from_major(amount, PHP).map(|m| m.to_string()).unwrap_or_else(|| format!("{}-", PHP.symbol))
}

/// Line item in the shape hosted payment pages expect.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PaymentLineItem {
    pub price_data: PriceData,
    pub quantity: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PriceData {
    pub currency: String,
    pub product_data: ProductData,
    /// Minor units (centavos).
    pub unit_amount: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProductData {
    pub name: String,
    pub metadata: ProductMetadata,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProductMetadata {
    pub product_slug: String,
    pub variant_id: String,
    pub variant_name: String,
}

/// Builds payment line items; the variant name is folded into the product
/// name so fulfilment can tell flavors apart.
pub fn payment_line_items(items: &[LineItem]) -> Vec<PaymentLineItem> {
    items.iter().filter_map(|item| {
        let unit_amount = Money::from_major(item.unit_price(), PHP)?.minor_units()?;
        let name = match item.variant() {
            Some(v) => format!("{} - {}", item.name(), v.name),
            None => item.name().to_string(),
        };
        Some(PaymentLineItem {
            price_data: PriceData {
                currency: PHP.code.to_lowercase(),
                product_data: ProductData {
                    name,
                    metadata: ProductMetadata {
                        product_slug: item.slug().to_string(),
                        variant_id: item.variant().map(|v| v.id.clone()).unwrap_or_default(),
                        variant_name: item.variant().map(|v| v.name.clone()).unwrap_or_default(),
                    },
                },
                unit_amount,
            },
            quantity: item.quantity().value(),
        })
    }).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{LineItem, LineItemCandidate};

    fn line(product_id: &str, unit_price: f64, quantity: i64, variant: Option<(&str, &str)>) -> LineItem {
        LineItem::validate(LineItemCandidate {
            product_id: product_id.into(), slug: "chewy-protein-cookie".into(), name: "Chewy Protein Cookie".into(),
            unit_price, quantity,
            variant_id: variant.map(|v| v.0.to_string()), variant_name: variant.map(|v| v.1.to_string()),
        }).unwrap()
    }

    #[test]
    fn test_subtotal_and_count() {
        assert_eq!(compute_subtotal(&[]), 0.0);
        assert_eq!(compute_item_count(&[]), 0);
        let items = vec![line("a", 120.0, 3, None), line("b", 45.5, 2, None)];
        assert_eq!(compute_subtotal(&items), 451.0);
        assert_eq!(compute_item_count(&items), 5);
        let reversed: Vec<_> = items.iter().rev().cloned().collect();
        assert_eq!(compute_subtotal(&reversed), compute_subtotal(&items));
    }

    #[test]
    fn test_totals_have_no_tax_or_shipping() {
        let totals = CartTotals::for_items(&[line("a", 120.0, 3, None)]);
        assert_eq!(totals.total, 360.0);
        assert_eq!(totals.tax + totals.shipping + totals.discount, 0.0);
        assert_eq!(format_price(totals.total), "₱360.00");
    }

    #[test]
    fn test_payment_line_items() {
        let items = vec![line("cookie-choc", 120.0, 2, Some(("choc", "Chocolate Chip"))), line("cookie", 99.99, 1, None)];
        let out = payment_line_items(&items);
        assert_eq!(out[0].price_data.product_data.name, "Chewy Protein Cookie - Chocolate Chip");
        assert_eq!(out[0].price_data.unit_amount, 12000);
        assert_eq!(out[0].price_data.currency, "php");
        assert_eq!(out[0].quantity, 2);
        assert_eq!(out[1].price_data.product_data.name, "Chewy Protein Cookie");
        assert_eq!(out[1].price_data.unit_amount, 9999);
        assert_eq!(out[1].price_data.product_data.metadata.variant_id, "");
    }
}
