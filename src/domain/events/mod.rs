//! Domain events
use serde::Serialize;

use crate::domain::value_objects::AccountId;

/// What changed in the in-memory cart.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CartEvent {
    ItemAdded { product_id: String, quantity: u32 },
    QuantityUpdated { product_id: String, quantity: u32 },
    ItemRemoved { product_id: String },
    Cleared,
    /// The whole snapshot was swapped after a session transition.
    Replaced { source: ReplaceSource },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplaceSource { Merge, Remote, SignOut }

/// Auth transition delivered by the session notifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn(AccountId),
    SignedOut,
}

impl SessionEvent {
    pub fn account(&self) -> Option<&AccountId> {
        match self { Self::SignedIn(a) => Some(a), Self::SignedOut => None }
    }
}
