//! Cart Controller
//!
//! The single owner of the in-memory cart. Every mutation is validated, applied
//! to memory first, then persisted: always to the local slot, and to the remote
//! row when a session is signed in. Remote saves run as detached tasks that are
//! never joined; under rapid mutation several may be in flight and the last to
//! land wins. There is no cross-tab or cross-device ordering.

use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::aggregates::{Cart, CartError, CartSnapshot, LineItem, LineItemCandidate, QuantityUpdate};
use crate::domain::events::{CartEvent, ReplaceSource, SessionEvent};
use crate::domain::value_objects::{AccountId, Quantity};
use crate::session::SessionNotifier;
use crate::store::local::LocalCartStore;
use crate::store::remote::RemoteCartStore;
use crate::sync::MergeEngine;

/// Called after every change, once count and subtotal are already updated.
pub trait CartObserver: Send + Sync {
    fn on_change(&self, event: &CartEvent, cart: &Cart);
}

/// Logs each change with the derived totals.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingObserver;

impl CartObserver for TracingObserver {
    fn on_change(&self, event: &CartEvent, cart: &Cart) {
        debug!(?event, item_count = cart.item_count(), subtotal = cart.subtotal(), "cart changed");
    }
}

pub struct CartController {
    cart: Cart,
    local: LocalCartStore,
    remote: Arc<dyn RemoteCartStore>,
    merge: MergeEngine,
    account: Option<AccountId>,
    observers: Vec<Box<dyn CartObserver>>,
}

impl std::fmt::Debug for CartController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartController")
            .field("cart", &self.cart)
            .field("account", &self.account)
            .field("observers", &self.observers.len())
            .finish_non_exhaustive()
    }
}

impl CartController {
    /// Starts anonymous with whatever the local slot holds.
    pub fn new(local: LocalCartStore, remote: Arc<dyn RemoteCartStore>) -> Self {
        let loaded = local.load();
        info!(items = loaded.snapshot.items.len(), dropped = loaded.dropped, truncated = loaded.truncated, recovered = loaded.recovered, "local cart loaded");
        Self {
            cart: Cart::from_snapshot(loaded.snapshot),
            local,
            merge: MergeEngine::new(remote.clone()),
            remote,
            account: None,
            observers: Vec::new(),
        }
    }

    /// Like [`CartController::new`], then resolves an already-active session.
    pub async fn start(local: LocalCartStore, remote: Arc<dyn RemoteCartStore>, notifier: &dyn SessionNotifier) -> Self {
        let mut controller = Self::new(local, remote);
        if let Some(account) = notifier.current_session() {
            controller.sign_in(account).await;
        }
        controller
    }

    pub fn subscribe(&mut self, observer: impl CartObserver + 'static) { self.observers.push(Box::new(observer)); }

    pub fn cart(&self) -> &Cart { &self.cart }
    pub fn account(&self) -> Option<&AccountId> { self.account.as_ref() }

    pub fn add_item(&mut self, candidate: LineItemCandidate) -> Result<Quantity, CartError> {
        let product_id = candidate.product_id.clone();
        let quantity = LineItem::validate(candidate)
            .and_then(|item| self.cart.add_item(item))
            .map_err(|e| {
                warn!(product_id = %product_id, error = %e, "add to cart rejected");
                e
            })?;
        self.commit(CartEvent::ItemAdded { product_id, quantity: quantity.value() });
        Ok(quantity)
    }

    /// Removing an absent line is a no-op.
    pub fn remove_item(&mut self, product_id: &str) -> bool {
        let removed = self.cart.remove_item(product_id);
        if removed {
            self.commit(CartEvent::ItemRemoved { product_id: product_id.to_string() });
        }
        removed
    }

    pub fn update_quantity(&mut self, product_id: &str, quantity: i64) -> QuantityUpdate {
        let update = self.cart.update_quantity(product_id, quantity);
        match update {
            QuantityUpdate::Updated(q) => self.commit(CartEvent::QuantityUpdated { product_id: product_id.to_string(), quantity: q.value() }),
            QuantityUpdate::Removed => self.commit(CartEvent::ItemRemoved { product_id: product_id.to_string() }),
            QuantityUpdate::Absent => debug!(product_id, "quantity update for absent line ignored"),
        }
        update
    }

    /// One more of a line. At the maximum nothing is persisted or notified.
    pub fn increment(&mut self, product_id: &str) -> QuantityUpdate {
        match self.cart.get(product_id).map(LineItem::quantity) {
            Some(q) if q.can_increase() => self.update_quantity(product_id, i64::from(q.increment().value())),
            Some(q) => QuantityUpdate::Updated(q),
            None => QuantityUpdate::Absent,
        }
    }

    /// One fewer of a line, never dropping below one; removal is explicit.
    pub fn decrement(&mut self, product_id: &str) -> QuantityUpdate {
        match self.cart.get(product_id).map(LineItem::quantity) {
            Some(q) if q.can_decrease() => self.update_quantity(product_id, i64::from(q.decrement().value())),
            Some(q) => QuantityUpdate::Updated(q),
            None => QuantityUpdate::Absent,
        }
    }

    pub fn clear(&mut self) {
        self.cart.clear();
        self.commit(CartEvent::Cleared);
    }

    pub async fn handle_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::SignedIn(account) => self.sign_in(account).await,
            SessionEvent::SignedOut => self.sign_out(),
        }
    }

    /// Switching accounts goes through sign-out first, so the slot never
    /// carries one account's cart into another's row.
    async fn sign_in(&mut self, account: AccountId) {
        if self.account.as_ref().is_some_and(|prev| *prev != account) {
            self.sign_out();
        }
        let local = self.local.load().snapshot;
        let source = if local.is_empty() { ReplaceSource::Remote } else { ReplaceSource::Merge };
        let outcome = self.merge.merge(&account, &local, &self.local).await;
        self.account = Some(account);
        self.cart.replace(outcome.items);
        self.notify(&CartEvent::Replaced { source });
    }

    /// The departing account's remote row is left alone for its next sign-in.
    fn sign_out(&mut self) {
        if let Some(account) = self.account.take() {
            info!(account_id = %account, "clearing cart on sign-out");
        }
        self.cart.clear();
        if let Err(e) = self.local.clear() {
            warn!(error = %e, "failed to erase local cart on sign-out");
        }
        self.notify(&CartEvent::Replaced { source: ReplaceSource::SignOut });
    }

    fn commit(&mut self, event: CartEvent) {
        if let Err(e) = self.local.save(self.cart.snapshot()) {
            warn!(error = %e, "failed to save local cart");
        }
        if let Some(account) = &self.account {
            spawn_remote_save(self.remote.clone(), account.clone(), self.cart.snapshot().clone());
        }
        self.notify(&event);
    }

    fn notify(&self, event: &CartEvent) {
        for observer in &self.observers {
            observer.on_change(event, &self.cart);
        }
    }
}

/// Fire-and-forget upsert. Failures are logged; the next mutation tries again.
fn spawn_remote_save(remote: Arc<dyn RemoteCartStore>, account: AccountId, snapshot: CartSnapshot) {
    let Ok(handle) = tokio::runtime::Handle::try_current() else {
        warn!(account_id = %account, "no runtime for remote cart save, skipping");
        return;
    };
    handle.spawn(async move {
        match remote.upsert(&account, &snapshot.items).await {
            Ok(()) => debug!(account_id = %account, items = snapshot.items.len(), "remote cart saved"),
            Err(e) => warn!(account_id = %account, error = %e, "remote cart save failed"),
        }
    });
}

/// Feeds session transitions into the controller until the notifier goes away.
pub fn spawn_session_listener(controller: Arc<Mutex<CartController>>, mut events: broadcast::Receiver<SessionEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => controller.lock().await.handle_session_event(event).await,
                Err(broadcast::error::RecvError::Lagged(skipped)) => warn!(skipped, "session listener lagged"),
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
