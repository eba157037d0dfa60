// ── Runtime device configuration ──
//
// These types describe *how* one device is reached and paced. They are
// resolved once by `sbbridge-config` and handed in; core never reads
// config files.

use std::time::Duration;

use macaddr::MacAddr6;
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::error::CoreError;
use crate::model::DeviceKind;

/// Which transports a device may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display)]
pub enum ConnectionType {
    #[serde(rename = "BLE")]
    #[strum(serialize = "BLE")]
    Ble,
    #[default]
    #[serde(rename = "OpenAPI")]
    #[strum(serialize = "OpenAPI")]
    OpenApi,
    /// BLE first, cloud as fallback.
    #[serde(rename = "BLE/OpenAPI")]
    #[strum(serialize = "BLE/OpenAPI")]
    BleOpenApi,
}

impl ConnectionType {
    pub fn uses_ble(self) -> bool {
        matches!(self, Self::Ble | Self::BleOpenApi)
    }

    pub fn uses_cloud(self) -> bool {
        matches!(self, Self::OpenApi | Self::BleOpenApi)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
    Kelvin,
}

impl TemperatureUnit {
    /// Convert a Celsius reading into this unit.
    pub fn from_celsius(self, c: f64) -> f64 {
        match self {
            Self::Celsius => c,
            Self::Fahrenheit => c * 9.0 / 5.0 + 32.0,
            Self::Kelvin => c + 273.15,
        }
    }
}

/// Per-device transport and pacing settings. Immutable after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportConfig {
    pub connection_type: ConnectionType,
    /// Interval between periodic refreshes.
    pub refresh_rate: Duration,
    /// Length of one BLE scan window.
    pub scan_duration: Duration,
    /// Debounce window for accessory writes.
    pub push_rate: Duration,
    /// BLE attempts after the first one fails.
    pub max_retries: u32,
    pub retry_delay: Duration,
    /// Delay before the refresh that follows every flush.
    pub follow_up_delay: Duration,
    /// Reset to neutral defaults when the vendor reports the device offline.
    pub offline: bool,
    /// Cloud access administratively disabled (quota protection).
    pub cloud_disabled: bool,
    pub temperature_unit: TemperatureUnit,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connection_type: ConnectionType::default(),
            refresh_rate: Duration::from_secs(300),
            scan_duration: Duration::from_secs(1),
            push_rate: Duration::from_secs(1),
            max_retries: 5,
            retry_delay: Duration::from_secs(3),
            follow_up_delay: Duration::from_secs(15),
            offline: false,
            cloud_disabled: false,
            temperature_unit: TemperatureUnit::default(),
        }
    }
}

impl TransportConfig {
    /// Cloud may be used for this device.
    pub fn cloud_enabled(&self) -> bool {
        self.connection_type.uses_cloud() && !self.cloud_disabled
    }

    pub fn ble_enabled(&self) -> bool {
        self.connection_type.uses_ble()
    }
}

/// How a Bot behaves when switched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BotMode {
    /// Momentary press; `On` falls back to off after the push.
    #[default]
    Press,
    /// Latching on/off.
    Switch,
}

/// Archetype-specific knobs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct DeviceOptions {
    pub bot_mode: BotMode,
    /// Customize command sent for "on" by `Others` remotes.
    pub custom_on: Option<String>,
    /// Customize command sent for "off" by `Others` remotes.
    pub custom_off: Option<String>,
}

/// Everything the engine needs to know about one device.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceConfig {
    /// Cloud device id.
    pub id: String,
    pub name: String,
    pub kind: DeviceKind,
    /// BLE address, required by BLE connection types.
    pub address: Option<MacAddr6>,
    pub transport: TransportConfig,
    pub options: DeviceOptions,
}

impl DeviceConfig {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: DeviceKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            address: None,
            transport: TransportConfig::default(),
            options: DeviceOptions::default(),
        }
    }

    /// Reject combinations the engine cannot honour.
    pub fn validate(&self) -> Result<(), CoreError> {
        let fail = |message: String| {
            Err(CoreError::Config {
                message: format!("device {}: {message}", self.id),
            })
        };

        if self.id.trim().is_empty() {
            return Err(CoreError::Config {
                message: "device id must not be empty".into(),
            });
        }
        let t = &self.transport;
        if t.connection_type.uses_ble() && self.address.is_none() {
            return fail(format!("connection type {} requires a BLE address", t.connection_type));
        }
        if t.connection_type.uses_ble() && self.kind.ble_models().is_empty() {
            return fail(format!("{} devices cannot be reached over BLE", self.kind));
        }
        if t.refresh_rate.is_zero() {
            return fail("refresh_rate must be non-zero".into());
        }
        if t.scan_duration.is_zero() {
            return fail("scan_duration must be non-zero".into());
        }
        if t.push_rate.is_zero() {
            return fail("push_rate must be non-zero".into());
        }
        Ok(())
    }
}
