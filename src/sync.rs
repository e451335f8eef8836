//! Sign-in merge of the device-local cart into the account's remote cart.
//!
//! Policy: union of both carts, and on a shared product id the local line
//! replaces the remote one outright (quantities are not summed). Remote order
//! is kept; local-only lines follow in local order.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::domain::aggregates::{cap_items, CartSnapshot, LineItem};
use crate::domain::value_objects::AccountId;
use crate::store::local::LocalCartStore;
use crate::store::remote::{fetch_items, load_items, RemoteCartStore};

pub fn merge_items(remote: Vec<LineItem>, local: Vec<LineItem>) -> Vec<LineItem> {
    let mut merged = remote;
    for item in local {
        match merged.iter_mut().find(|i| i.product_id() == item.product_id()) {
            Some(existing) => *existing = item,
            None => merged.push(item),
        }
    }
    merged
}

#[derive(Clone, Debug, PartialEq)]
pub struct MergeOutcome {
    /// The new authoritative items.
    pub items: Vec<LineItem>,
    /// The result was written to the remote store.
    pub persisted: bool,
    /// The local slot was erased.
    pub local_cleared: bool,
}

#[derive(Clone)]
pub struct MergeEngine { remote: Arc<dyn RemoteCartStore> }

impl std::fmt::Debug for MergeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MergeEngine").finish_non_exhaustive()
    }
}

impl MergeEngine {
    pub fn new(remote: Arc<dyn RemoteCartStore>) -> Self { Self { remote } }

    /// Resolves one authoritative cart for `account`.
    ///
    /// The local slot is erased only once the merged cart is safely stored
    /// remotely. If the remote fetch or save fails, local data stays put and
    /// the same merge runs again at the next sign-in.
    pub async fn merge(&self, account: &AccountId, local: &CartSnapshot, local_store: &LocalCartStore) -> MergeOutcome {
        if local.is_empty() {
            let items = load_items(self.remote.as_ref(), account).await;
            info!(account_id = %account, items = items.len(), "restored remote cart");
            return MergeOutcome { items, persisted: false, local_cleared: false };
        }

        let remote = match fetch_items(self.remote.as_ref(), account).await {
            Ok(remote) => remote.unwrap_or_default(),
            Err(e) => {
                error!(account_id = %account, error = %e, "remote cart fetch failed, keeping local cart unmerged");
                return MergeOutcome { items: local.items.clone(), persisted: false, local_cleared: false };
            }
        };

        let remote_len = remote.len();
        let mut items = merge_items(remote, local.items.clone());
        let truncated = cap_items(&mut items);
        if truncated > 0 {
            warn!(account_id = %account, truncated, "merged cart over the line-item cap");
        }

        if let Err(e) = self.remote.upsert(account, &items).await {
            error!(account_id = %account, error = %e, "failed to persist merged cart, local cart kept for retry");
            return MergeOutcome { items, persisted: false, local_cleared: false };
        }

        let local_cleared = match local_store.clear() {
            Ok(()) => true,
            Err(e) => {
                warn!(account_id = %account, error = %e, "failed to erase local cart after merge");
                false
            }
        };
        info!(account_id = %account, remote = remote_len, local = local.items.len(), merged = items.len(), "merged carts on sign-in");
        MergeOutcome { items, persisted: true, local_cleared }
    }
}
