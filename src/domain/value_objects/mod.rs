//! Value Objects for the storefront cart

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque account identifier issued by the auth provider.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(value: impl Into<String>) -> Result<Self, AccountIdError> {
        let value = value.into().trim().to_string();
        if value.is_empty() { return Err(AccountIdError::Empty); }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum AccountIdError { Empty }
impl std::error::Error for AccountIdError {}
impl fmt::Display for AccountIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "Account id empty") }
}

/// Line quantity, always within `Quantity::MIN..=Quantity::MAX`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    pub const MIN: u32 = 1;
    pub const MAX: u32 = 99;

    pub fn new(value: i64) -> Option<Self> {
        if (Self::MIN as i64..=Self::MAX as i64).contains(&value) { Some(Self(value as u32)) } else { None }
    }

    /// Clamps into range. Callers handle `<= 0` as removal before reaching here.
    pub fn clamped(value: i64) -> Self {
        Self(value.clamp(Self::MIN as i64, Self::MAX as i64) as u32)
    }

    pub fn one() -> Self { Self(Self::MIN) }
    pub fn value(&self) -> u32 { self.0 }

    pub fn saturating_add(&self, other: u32) -> Self { Self(self.0.saturating_add(other).min(Self::MAX)) }

    pub fn can_increase(&self) -> bool { self.0 < Self::MAX }
    pub fn can_decrease(&self) -> bool { self.0 > Self::MIN }
    pub fn increment(&self) -> Self { if self.can_increase() { Self(self.0 + 1) } else { *self } }
    pub fn decrement(&self) -> Self { if self.can_decrease() { Self(self.0 - 1) } else { *self } }
}

impl TryFrom<i64> for Quantity {
    type Error = String;
    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("quantity {value} outside {}..={}", Self::MIN, Self::MAX))
    }
}

impl From<Quantity> for u32 {
    fn from(q: Quantity) -> Self { q.0 }
}

/// A product variant (flavor). Id and name travel together.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub id: String,
    pub name: String,
}

/// The single storefront currency.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Currency {
    pub code: &'static str,
    pub symbol: &'static str,
    pub decimal_places: u32,
}

pub const PHP: Currency = Currency { code: "PHP", symbol: "₱", decimal_places: 2 };

/// Money value object, used at display and hand-off time only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Money { amount: Decimal, currency: Currency }

impl Money {
    pub fn new(amount: Decimal, currency: Currency) -> Self { Self { amount, currency } }
    pub fn php(amount: Decimal) -> Self { Self::new(amount, PHP) }
    pub fn zero(currency: Currency) -> Self { Self::new(Decimal::ZERO, currency) }

    /// Converts a major-unit float; non-finite input yields `None`.
    pub fn from_major(amount: f64, currency: Currency) -> Option<Self> {
        Decimal::from_f64(amount).map(|amount| Self::new(amount, currency))
    }

    pub fn amount(&self) -> Decimal { self.amount }
    pub fn currency(&self) -> Currency { self.currency }

    /// Amount in minor units (centavos), rounded half away from zero.
    pub fn minor_units(&self) -> Option<i64> {
        let scale = Decimal::from(10_i64.pow(self.currency.decimal_places));
        (self.amount * scale).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero).to_i64()
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dp = self.currency.decimal_places as usize;
        let rounded = self.amount.round_dp_with_strategy(self.currency.decimal_places, RoundingStrategy::MidpointAwayFromZero);
        write!(f, "{}{:.*}", self.currency.symbol, dp, rounded)
    }
}
