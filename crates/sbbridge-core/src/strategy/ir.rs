// IR remotes. They never report status, so decoding yields nothing and the
// store keeps whatever was last pushed.

use serde_json::Value;

use sbbridge_api::{CommandRequest, ServiceData};

use super::{Dispatch, Strategy, ble_mismatch};
use crate::config::{DeviceConfig, TemperatureUnit};
use crate::error::CoreError;
use crate::model::{DeviceKind, DeviceState, Field, FieldValue, hap};

pub(super) struct AirConditionerStrategy;
pub(super) struct FanStrategy;
pub(super) struct LightStrategy;
pub(super) struct WaterHeaterStrategy;
pub(super) struct OthersStrategy;

const DEFAULT_AC_TEMPERATURE: i64 = 25;

fn power(on: bool) -> CommandRequest {
    CommandRequest::simple(if on { "turnOn" } else { "turnOff" })
}

fn int(state: &DeviceState, field: Field) -> Option<i64> {
    state.get(field).and_then(FieldValue::as_i64)
}

fn switch(state: &DeviceState, field: Field) -> Option<bool> {
    state.get(field).and_then(FieldValue::as_bool)
}

/// Shared `decode_*` for remotes without status.
macro_rules! no_status {
    ($kind:expr) => {
        fn decode_json(&self, _body: &Value, _unit: TemperatureUnit) -> DeviceState {
            DeviceState::new()
        }

        fn decode_ble(
            &self,
            data: &ServiceData,
            _unit: TemperatureUnit,
        ) -> Result<DeviceState, CoreError> {
            Err(ble_mismatch($kind, data))
        }
    };
}

// ── Air conditioner ──────────────────────────────────────────────────

/// `setAll` mode code for a target heater/cooler state.
fn ac_mode(target: i64) -> i64 {
    match target {
        hap::TARGET_COOL => 2,
        hap::TARGET_HEAT => 5,
        _ => 1,
    }
}

/// `setAll` fan code for a rotation-speed percentage. Zero means auto.
fn ac_fan(speed: i64) -> i64 {
    match speed {
        i64::MIN..=0 => 1,
        1..=33 => 2,
        34..=66 => 3,
        _ => 4,
    }
}

impl Strategy for AirConditionerStrategy {
    no_status!(DeviceKind::AirConditioner);

    fn encode(
        &self,
        _device: &DeviceConfig,
        changes: &DeviceState,
        current: &DeviceState,
    ) -> Result<Vec<Dispatch>, CoreError> {
        if changes.is_empty() {
            return Ok(Vec::new());
        }
        let merged = current.overlay(changes);

        let active = int(&merged, Field::Active).unwrap_or(hap::INACTIVE) == hap::ACTIVE;
        let mode = ac_mode(int(&merged, Field::TargetHeaterCoolerState).unwrap_or(hap::TARGET_AUTO));
        let temp = int(&merged, Field::CoolingThresholdTemperature).unwrap_or(DEFAULT_AC_TEMPERATURE);
        let fan = ac_fan(int(&merged, Field::RotationSpeed).unwrap_or(0));
        let power = if active { "on" } else { "off" };

        Ok(vec![Dispatch::cloud(CommandRequest::with_parameter(
            "setAll",
            format!("{temp},{mode},{fan},{power}"),
        ))])
    }

    fn offline_default(&self) -> DeviceState {
        DeviceState::new()
            .with(Field::Active, hap::INACTIVE)
            .with(Field::CurrentHeaterCoolerState, hap::CURRENT_INACTIVE)
    }

    fn settle(
        &self,
        _device: &DeviceConfig,
        pushed: &DeviceState,
        current: &DeviceState,
    ) -> DeviceState {
        let merged = current.overlay(pushed);
        let active = int(&merged, Field::Active).unwrap_or(hap::INACTIVE) == hap::ACTIVE;
        let heater_cooler = if !active {
            hap::CURRENT_INACTIVE
        } else {
            match int(&merged, Field::TargetHeaterCoolerState) {
                Some(hap::TARGET_COOL) => hap::CURRENT_COOLING,
                Some(hap::TARGET_HEAT) => hap::CURRENT_HEATING,
                _ => hap::CURRENT_IDLE,
            }
        };
        pushed
            .clone()
            .with(Field::CurrentHeaterCoolerState, heater_cooler)
    }
}

// ── Fan ──────────────────────────────────────────────────────────────

impl Strategy for FanStrategy {
    no_status!(DeviceKind::Fan);

    fn encode(
        &self,
        _device: &DeviceConfig,
        changes: &DeviceState,
        current: &DeviceState,
    ) -> Result<Vec<Dispatch>, CoreError> {
        let mut out = Vec::new();
        if let Some(active) = int(changes, Field::Active) {
            out.push(Dispatch::cloud(power(active == hap::ACTIVE)));
        }
        if let Some(speed) = int(changes, Field::RotationSpeed) {
            let command = match speed {
                i64::MIN..=33 => "lowSpeed",
                34..=66 => "middleSpeed",
                _ => "highSpeed",
            };
            out.push(Dispatch::cloud(CommandRequest::simple(command)));
        }
        // The remote only has a toggle.
        if let Some(swing) = int(changes, Field::SwingMode)
            && int(current, Field::SwingMode).unwrap_or(hap::SWING_DISABLED) != swing
        {
            out.push(Dispatch::cloud(CommandRequest::simple("swing")));
        }
        Ok(out)
    }

    fn offline_default(&self) -> DeviceState {
        DeviceState::new().with(Field::Active, hap::INACTIVE)
    }
}

// ── Light ────────────────────────────────────────────────────────────

impl Strategy for LightStrategy {
    no_status!(DeviceKind::Light);

    fn encode(
        &self,
        _device: &DeviceConfig,
        changes: &DeviceState,
        current: &DeviceState,
    ) -> Result<Vec<Dispatch>, CoreError> {
        let mut out = Vec::new();
        if let Some(on) = switch(changes, Field::On) {
            out.push(Dispatch::cloud(power(on)));
        }
        if let Some(level) = int(changes, Field::Brightness) {
            let previous = int(current, Field::Brightness).unwrap_or(100);
            if level != previous {
                let command = if level > previous {
                    "brightnessUp"
                } else {
                    "brightnessDown"
                };
                out.push(Dispatch::cloud(CommandRequest::simple(command)));
            }
        }
        Ok(out)
    }

    fn offline_default(&self) -> DeviceState {
        DeviceState::new().with(Field::On, false)
    }
}

// ── Water heater ─────────────────────────────────────────────────────

impl Strategy for WaterHeaterStrategy {
    no_status!(DeviceKind::WaterHeater);

    fn encode(
        &self,
        _device: &DeviceConfig,
        changes: &DeviceState,
        _current: &DeviceState,
    ) -> Result<Vec<Dispatch>, CoreError> {
        Ok(int(changes, Field::Active)
            .map(|active| Dispatch::cloud(power(active == hap::ACTIVE)))
            .into_iter()
            .collect())
    }

    fn offline_default(&self) -> DeviceState {
        DeviceState::new().with(Field::Active, hap::INACTIVE)
    }
}

// ── Others ───────────────────────────────────────────────────────────

impl Strategy for OthersStrategy {
    no_status!(DeviceKind::Others);

    fn encode(
        &self,
        device: &DeviceConfig,
        changes: &DeviceState,
        _current: &DeviceState,
    ) -> Result<Vec<Dispatch>, CoreError> {
        let Some(on) = switch(changes, Field::On) else {
            return Ok(Vec::new());
        };
        let custom = if on {
            device.options.custom_on.as_deref()
        } else {
            device.options.custom_off.as_deref()
        };
        let command = match custom {
            Some(button) => CommandRequest::customize(button),
            None => power(on),
        };
        Ok(vec![Dispatch::cloud(command)])
    }

    fn offline_default(&self) -> DeviceState {
        DeviceState::new().with(Field::On, false)
    }
}
