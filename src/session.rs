//! Session notifications.
//!
//! The auth provider is opaque to the cart: all it needs is a way to ask who is
//! signed in right now and a stream of sign-in / sign-out transitions.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast;
use tracing::info;

use crate::domain::events::SessionEvent;
use crate::domain::value_objects::AccountId;

pub trait SessionNotifier: Send + Sync {
    /// One-shot query used at controller start.
    fn current_session(&self) -> Option<AccountId>;
    /// Every auth transition after the call.
    fn subscribe(&self) -> broadcast::Receiver<SessionEvent>;
}

/// In-process notifier fed by the sign-in / sign-out endpoints.
#[derive(Clone, Debug)]
pub struct SessionHub {
    current: Arc<Mutex<Option<AccountId>>>,
    tx: broadcast::Sender<SessionEvent>,
}

impl Default for SessionHub {
    fn default() -> Self { Self::new(16) }
}

impl SessionHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { current: Arc::new(Mutex::new(None)), tx }
    }

    pub fn sign_in(&self, account: AccountId) {
        info!(account_id = %account, "session signed in");
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(account.clone());
        // no subscribers is fine; the controller picks up the session at start
        let _ = self.tx.send(SessionEvent::SignedIn(account));
    }

    pub fn sign_out(&self) {
        let previous = self.current.lock().unwrap_or_else(PoisonError::into_inner).take();
        info!(account_id = ?previous.as_ref().map(AccountId::as_str), "session signed out");
        let _ = self.tx.send(SessionEvent::SignedOut);
    }
}

impl SessionNotifier for SessionHub {
    fn current_session(&self) -> Option<AccountId> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> { self.tx.subscribe() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hub_delivers_transitions() {
        let hub = SessionHub::default();
        let mut rx = hub.subscribe();
        let account = AccountId::new("acct-1").unwrap();
        hub.sign_in(account.clone());
        assert_eq!(hub.current_session(), Some(account.clone()));
        hub.sign_out();
        assert_eq!(hub.current_session(), None);
        assert_eq!(rx.recv().await.unwrap(), SessionEvent::SignedIn(account));
        assert_eq!(rx.recv().await.unwrap(), SessionEvent::SignedOut);
    }
}
