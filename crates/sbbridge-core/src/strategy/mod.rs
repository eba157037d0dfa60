// ── Per-archetype strategies ──
//
// One engine drives every device; the differences between a lock, a
// meter and an IR air conditioner live here. Each archetype supplies how
// to decode status payloads, how to encode pending changes into vendor
// commands, and what to show when the vendor reports the device offline.

mod bot;
mod common;
mod ir;
mod lock;
mod plug;
mod sensor;
mod vacuum;

use serde_json::Value;

use sbbridge_api::{CommandRequest, ServiceData};

use crate::config::{DeviceConfig, TemperatureUnit};
use crate::error::CoreError;
use crate::model::{DeviceKind, DeviceState, Field, Payload};

/// One outbound command, in both wire forms.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub cloud: CommandRequest,
    /// Raw GATT frame, for archetypes that accept BLE commands.
    pub ble: Option<Vec<u8>>,
}

impl Dispatch {
    pub fn cloud(command: CommandRequest) -> Self {
        Self {
            cloud: command,
            ble: None,
        }
    }

    pub fn with_ble(mut self, frame: impl Into<Vec<u8>>) -> Self {
        self.ble = Some(frame.into());
        self
    }
}

/// Behaviour that varies by [`DeviceKind`].
pub trait Strategy: Send + Sync {
    /// Decode a cloud status body or webhook context.
    fn decode_json(&self, body: &Value, unit: TemperatureUnit) -> DeviceState;

    /// Decode a BLE service-data record.
    fn decode_ble(&self, data: &ServiceData, unit: TemperatureUnit)
    -> Result<DeviceState, CoreError>;

    /// Build the commands for `changes`. `current` is the full store state,
    /// for archetypes whose command carries every setting at once.
    fn encode(
        &self,
        device: &DeviceConfig,
        changes: &DeviceState,
        current: &DeviceState,
    ) -> Result<Vec<Dispatch>, CoreError>;

    /// Neutral values shown while the vendor reports the device offline.
    fn offline_default(&self) -> DeviceState;

    /// State to record once `pushed` was accepted. `current` is the store
    /// state before the push.
    fn settle(
        &self,
        _device: &DeviceConfig,
        pushed: &DeviceState,
        _current: &DeviceState,
    ) -> DeviceState {
        pushed.clone()
    }
}

/// Look up the strategy for an archetype.
pub fn strategy_for(kind: DeviceKind) -> &'static dyn Strategy {
    match kind {
        DeviceKind::Lock => &lock::LockStrategy,
        DeviceKind::Motion => &sensor::MotionStrategy,
        DeviceKind::Contact => &sensor::ContactStrategy,
        DeviceKind::Meter => &sensor::MeterStrategy,
        DeviceKind::Plug => &plug::PlugStrategy,
        DeviceKind::Bot => &bot::BotStrategy,
        DeviceKind::RobotVacuumCleaner => &vacuum::VacuumStrategy,
        DeviceKind::AirConditioner => &ir::AirConditionerStrategy,
        DeviceKind::Fan => &ir::FanStrategy,
        DeviceKind::Light => &ir::LightStrategy,
        DeviceKind::WaterHeater => &ir::WaterHeaterStrategy,
        DeviceKind::Others => &ir::OthersStrategy,
    }
}

/// Decode any payload for `kind`. Pure.
pub fn decode(
    kind: DeviceKind,
    payload: &Payload,
    unit: TemperatureUnit,
) -> Result<DeviceState, CoreError> {
    let strategy = strategy_for(kind);
    match payload {
        Payload::Cloud(body) | Payload::Webhook(body) => {
            if !body.is_object() {
                return Err(CoreError::DecodeMismatch {
                    kind,
                    reason: "status body is not an object".into(),
                });
            }
            let mut state = strategy.decode_json(body, unit);
            // Webhook contexts carry only what changed; a missing battery
            // is unknown, not full.
            let pushed = matches!(payload, Payload::Webhook(_));
            if pushed && common::number(body, &["battery"]).is_none() {
                state.remove(Field::BatteryLevel);
                state.remove(Field::StatusLowBattery);
            }
            Ok(state)
        }
        Payload::Ble(data) => strategy.decode_ble(data, unit),
    }
}

fn ble_mismatch(kind: DeviceKind, data: &ServiceData) -> CoreError {
    CoreError::DecodeMismatch {
        kind,
        reason: format!("unexpected BLE record {data:?}"),
    }
}
