//! HTTP-backed accessory host.
//!
//! Each device gets an [`HttpAccessory`] that records the characteristic
//! values the engine pushes. The [`Bridge`] owns every device's engine and
//! accessory and is what the HTTP server reads and writes through.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::Serialize;
use tracing::{debug, warn};

use sbbridge_core::{
    Accessory, ConnectionType, CoreError, DeviceConfig, DeviceEngine, DeviceKind, Field,
    FieldValue, Transports,
};

// ── Accessory ───────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct HttpAccessory {
    characteristics: Mutex<BTreeMap<Field, FieldValue>>,
    failure: Mutex<Option<String>>,
}

impl Accessory for HttpAccessory {
    fn update_characteristic(&self, field: Field, value: &FieldValue) {
        self.characteristics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(field, value.clone());
    }

    fn set_communication_failure(&self, failure: Option<&str>) {
        let mut current = self.failure.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(reason) = failure
            && current.as_deref() != Some(reason)
        {
            warn!(reason, "accessory marked unreachable");
        }
        *current = failure.map(str::to_owned);
    }
}

impl HttpAccessory {
    pub fn characteristics(&self) -> BTreeMap<Field, FieldValue> {
        self.characteristics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn failure(&self) -> Option<String> {
        self.failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

// ── Bridge ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct BridgedDevice {
    pub engine: DeviceEngine,
    pub accessory: Arc<HttpAccessory>,
}

/// JSON view of one accessory.
#[derive(Debug, Serialize)]
pub struct AccessoryView {
    pub id: String,
    pub name: String,
    pub kind: DeviceKind,
    pub connection: ConnectionType,
    pub characteristics: BTreeMap<Field, FieldValue>,
    pub failure: Option<String>,
    pub pending: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

impl BridgedDevice {
    pub fn view(&self) -> AccessoryView {
        let device = self.engine.device();
        AccessoryView {
            id: device.id.clone(),
            name: device.name.clone(),
            kind: device.kind,
            connection: device.transport.connection_type,
            characteristics: self.accessory.characteristics(),
            failure: self.accessory.failure(),
            pending: self.engine.has_pending(),
            updated_at: self.engine.snapshot().updated_at,
        }
    }
}

/// Every bridged device, keyed by device id. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct Bridge {
    devices: Arc<BTreeMap<String, BridgedDevice>>,
}

impl Bridge {
    /// Build one engine per device, all sharing `transports`.
    pub fn build(devices: Vec<DeviceConfig>, transports: &Transports) -> Result<Self, CoreError> {
        let mut map = BTreeMap::new();
        for device in devices {
            let accessory = Arc::new(HttpAccessory::default());
            let id = device.id.clone();
            let engine = DeviceEngine::new(device, transports.clone(), accessory.clone())?;

            // Show cached state before the first refresh lands.
            let seeded = engine.snapshot().state;
            if !seeded.is_empty() {
                engine.projector().push_all(&seeded);
            }
            map.insert(id, BridgedDevice { engine, accessory });
        }
        Ok(Self {
            devices: Arc::new(map),
        })
    }

    pub fn get(&self, id: &str) -> Option<&BridgedDevice> {
        self.devices.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BridgedDevice> {
        self.devices.values()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub async fn start(&self) {
        for device in self.iter() {
            device.engine.start().await;
        }
    }

    pub async fn shutdown(&self) {
        join_all(self.iter().map(|d| d.engine.shutdown())).await;
        debug!(devices = self.len(), "all engines stopped");
    }
}
