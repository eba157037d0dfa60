// ── Webhook routing ──
//
// Inbound cloud pushes carry `context.deviceMac`. The router maps that MAC
// to the engine that registered it and hands the context over a channel.

use std::sync::Arc;

use dashmap::DashMap;
use macaddr::MacAddr6;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::CoreError;

const WEBHOOK_CHANNEL_SIZE: usize = 16;

/// Where a webhook push ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// No engine registered for this MAC.
    Unrouted,
    /// The engine's queue is full or closed.
    Dropped,
}

/// Shared MAC → engine routing table.
#[derive(Debug, Clone, Default)]
pub struct WebhookRouter {
    routes: Arc<DashMap<String, mpsc::Sender<Value>>>,
}

/// Canonical key: uppercase hex, separators removed.
pub fn normalize_mac(raw: &str) -> String {
    raw.chars()
        .filter(char::is_ascii_hexdigit)
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

impl WebhookRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the keys a device answers to and get its event receiver.
    ///
    /// Both the cloud device id and the BLE address are registered; for
    /// physical devices they are the same MAC.
    pub fn register(&self, device_id: &str, address: Option<MacAddr6>) -> mpsc::Receiver<Value> {
        let (tx, rx) = mpsc::channel(WEBHOOK_CHANNEL_SIZE);
        for key in route_keys(device_id, address) {
            self.routes.insert(key, tx.clone());
        }
        rx
    }

    pub fn unregister(&self, device_id: &str, address: Option<MacAddr6>) {
        for key in route_keys(device_id, address) {
            self.routes.remove(&key);
        }
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Route one webhook body `{eventType, context: {deviceMac, ...}}`.
    pub fn dispatch(&self, body: &Value) -> Result<Delivery, CoreError> {
        let context = body
            .get("context")
            .filter(|c| c.is_object())
            .ok_or_else(|| CoreError::InvalidWebhook {
                reason: "body has no context object".into(),
            })?;
        let mac = context
            .get("deviceMac")
            .and_then(Value::as_str)
            .map(normalize_mac)
            .ok_or_else(|| CoreError::InvalidWebhook {
                reason: "context has no deviceMac".into(),
            })?;

        let Some(tx) = self.routes.get(&mac).map(|r| r.value().clone()) else {
            debug!(mac, "webhook for unknown device");
            return Ok(Delivery::Unrouted);
        };
        match tx.try_send(context.clone()) {
            Ok(()) => Ok(Delivery::Delivered),
            Err(e) => {
                warn!(mac, error = %e, "webhook dropped");
                Ok(Delivery::Dropped)
            }
        }
    }
}

fn route_keys(device_id: &str, address: Option<MacAddr6>) -> Vec<String> {
    let mut keys = vec![normalize_mac(device_id)];
    if let Some(addr) = address {
        let key = normalize_mac(&addr.to_string());
        if !keys.contains(&key) {
            keys.push(key);
        }
    }
    keys.retain(|k| !k.is_empty());
    keys
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn mac_normalization() {
        assert_eq!(normalize_mac("c0:ff:ee:00:00:01"), "C0FFEE000001");
        assert_eq!(normalize_mac("C0FFEE000001"), "C0FFEE000001");
    }

    #[tokio::test]
    async fn routes_by_device_mac() {
        let router = WebhookRouter::new();
        let mut rx = router.register("C0FFEE000001", None);

        let body = json!({
            "eventType": "changeReport",
            "eventVersion": "1",
            "context": { "deviceType": "WoLock", "deviceMac": "c0:ff:ee:00:00:01", "lockState": "LOCKED" }
        });
        assert_eq!(router.dispatch(&body).unwrap(), Delivery::Delivered);

        let ctx = rx.recv().await.unwrap();
        assert_eq!(ctx["lockState"], "LOCKED");
    }

    #[test]
    fn unknown_mac_is_unrouted() {
        let router = WebhookRouter::new();
        let body = json!({ "context": { "deviceMac": "AABBCCDDEEFF" } });
        assert_eq!(router.dispatch(&body).unwrap(), Delivery::Unrouted);
    }

    #[test]
    fn missing_context_is_an_error() {
        let router = WebhookRouter::new();
        assert!(router.dispatch(&json!({ "eventType": "changeReport" })).is_err());
    }

    #[test]
    fn unregister_removes_every_key() {
        let router = WebhookRouter::new();
        let addr = MacAddr6::new(0xC0, 0xFF, 0xEE, 0, 0, 2);
        let _rx = router.register("C0FFEE000001", Some(addr));
        assert_eq!(router.len(), 2);
        router.unregister("C0FFEE000001", Some(addr));
        assert!(router.is_empty());
    }
}
