//! Cart-change events on NATS.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::controller::CartObserver;
use crate::domain::aggregates::Cart;
use crate::domain::events::CartEvent;

pub const CART_UPDATED_SUBJECT: &str = "storefront.cart.updated";

#[derive(Clone, Debug, Serialize)]
pub struct CartChanged {
    pub event_id: Uuid,
    pub event: CartEvent,
    pub item_count: u32,
    pub subtotal: f64,
    pub occurred_at: DateTime<Utc>,
}

impl CartChanged {
    pub fn new(event: &CartEvent, cart: &Cart) -> Self {
        Self { event_id: Uuid::now_v7(), event: event.clone(), item_count: cart.item_count(), subtotal: cart.subtotal(), occurred_at: Utc::now() }
    }
}

/// Publishes every change without waiting for the broker.
#[derive(Clone, Debug)]
pub struct NatsObserver { client: async_nats::Client, subject: String }

impl NatsObserver {
    pub fn new(client: async_nats::Client) -> Self { Self { client, subject: CART_UPDATED_SUBJECT.to_string() } }
}

impl CartObserver for NatsObserver {
    fn on_change(&self, event: &CartEvent, cart: &Cart) {
        let payload = match serde_json::to_vec(&CartChanged::new(event, cart)) {
            Ok(payload) => payload,
            Err(e) => { warn!(error = %e, "failed to encode cart event"); return; }
        };
        let (client, subject) = (self.client.clone(), self.subject.clone());
        tokio::spawn(async move {
            if let Err(e) = client.publish(subject, payload.into()).await {
                warn!(error = %e, "failed to publish cart event");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::cart::tests::item;
    use crate::domain::aggregates::CartSnapshot;
    use crate::domain::events::ReplaceSource;

    #[test]
    fn test_payload_shape() {
        let cart = Cart::from_snapshot(CartSnapshot { items: vec![item("a", 3)] });
        let value = serde_json::to_value(CartChanged::new(&CartEvent::Replaced { source: ReplaceSource::Merge }, &cart)).unwrap();
        assert_eq!(value["event"]["type"], "replaced");
        assert_eq!(value["event"]["source"], "merge");
        assert_eq!(value["item_count"], 3);
        assert_eq!(value["subtotal"], 360.0);
    }
}
