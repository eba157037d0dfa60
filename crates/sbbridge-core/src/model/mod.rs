// ── Domain model ──
//
// Canonical, transport-agnostic types shared by the decoder, the store,
// the engine and the projector.

pub mod hap;
mod kind;
mod state;

use serde::Serialize;
use serde_json::Value;
use strum::Display;

use sbbridge_api::ServiceData;

pub use kind::DeviceKind;
pub use state::{DeviceState, Field, FieldValue};

/// Where a payload or a command travelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Transport {
    Ble,
    Cloud,
    Webhook,
}

/// A raw status payload tagged with its origin.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Decoded BLE advertisement record.
    Ble(ServiceData),
    /// `body` of a cloud status response.
    Cloud(Value),
    /// `context` object of a webhook push.
    Webhook(Value),
}

impl Payload {
    pub fn transport(&self) -> Transport {
        match self {
            Self::Ble(_) => Transport::Ble,
            Self::Cloud(_) => Transport::Cloud,
            Self::Webhook(_) => Transport::Webhook,
        }
    }
}
