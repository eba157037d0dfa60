// Read-only sensors: motion, contact, meter.

use serde_json::Value;

use sbbridge_api::ble::{DoorState, LightLevel};
use sbbridge_api::ServiceData;

use super::common::{battery, battery_from_json, firmware, flag, lux, number, percent, text};
use super::{Dispatch, Strategy, ble_mismatch};
use crate::config::{DeviceConfig, TemperatureUnit};
use crate::error::CoreError;
use crate::model::{DeviceKind, DeviceState, Field, hap};

pub(super) struct MotionStrategy;
pub(super) struct ContactStrategy;
pub(super) struct MeterStrategy;

fn ble_lux(level: LightLevel) -> f64 {
    match level {
        LightLevel::Dark => hap::MIN_LUX,
        LightLevel::Bright => hap::MAX_LUX,
    }
}

fn movement(state: &mut DeviceState, body: &Value) {
    if let Some(moving) = flag(body, &["moveDetected", "movement", "detectionState"]) {
        state.set(Field::MotionDetected, moving);
    }
}

fn ambient_light(state: &mut DeviceState, body: &Value) {
    if let Some(lux) = lux(body) {
        state.set(Field::CurrentAmbientLightLevel, lux);
    }
}

fn no_commands(kind: DeviceKind, changes: &DeviceState) -> Result<Vec<Dispatch>, CoreError> {
    match changes.fields().next() {
        Some(field) => Err(CoreError::ReadOnly { field, kind }),
        None => Ok(Vec::new()),
    }
}

// ── Motion ───────────────────────────────────────────────────────────

impl Strategy for MotionStrategy {
    fn decode_json(&self, body: &Value, _unit: TemperatureUnit) -> DeviceState {
        let mut state = DeviceState::new();
        movement(&mut state, body);
        ambient_light(&mut state, body);
        battery_from_json(&mut state, body);
        firmware(&mut state, body);
        state
    }

    fn decode_ble(
        &self,
        data: &ServiceData,
        _unit: TemperatureUnit,
    ) -> Result<DeviceState, CoreError> {
        let ServiceData::Motion {
            movement,
            battery: level,
            light_level,
        } = data
        else {
            return Err(ble_mismatch(DeviceKind::Motion, data));
        };

        let mut state = DeviceState::new().with(Field::MotionDetected, *movement);
        battery(&mut state, level.map(f64::from));
        if let Some(level) = light_level {
            state.set(Field::CurrentAmbientLightLevel, ble_lux(*level));
        }
        Ok(state)
    }

    fn encode(
        &self,
        _device: &DeviceConfig,
        changes: &DeviceState,
        _current: &DeviceState,
    ) -> Result<Vec<Dispatch>, CoreError> {
        no_commands(DeviceKind::Motion, changes)
    }

    fn offline_default(&self) -> DeviceState {
        DeviceState::new()
            .with(Field::MotionDetected, false)
            .with(Field::CurrentAmbientLightLevel, hap::MIN_LUX)
    }
}

// ── Contact ──────────────────────────────────────────────────────────

impl Strategy for ContactStrategy {
    fn decode_json(&self, body: &Value, _unit: TemperatureUnit) -> DeviceState {
        let mut state = DeviceState::new();
        if let Some(open) = text(body, &["openState", "doorState"]) {
            let contact = match open.as_str() {
                "close" | "closed" => Some(hap::CONTACT_DETECTED),
                "open" | "opened" | "timeoutnotclose" => Some(hap::CONTACT_NOT_DETECTED),
                _ => None,
            };
            if let Some(contact) = contact {
                state.set(Field::ContactSensorState, contact);
            }
        }
        movement(&mut state, body);
        ambient_light(&mut state, body);
        battery_from_json(&mut state, body);
        firmware(&mut state, body);
        state
    }

    fn decode_ble(
        &self,
        data: &ServiceData,
        _unit: TemperatureUnit,
    ) -> Result<DeviceState, CoreError> {
        let ServiceData::Contact {
            movement,
            battery: level,
            door,
            light_level,
        } = data
        else {
            return Err(ble_mismatch(DeviceKind::Contact, data));
        };

        let contact = match door {
            DoorState::Closed => hap::CONTACT_DETECTED,
            DoorState::Open | DoorState::TimeoutNotClosed => hap::CONTACT_NOT_DETECTED,
        };
        let mut state = DeviceState::new()
            .with(Field::ContactSensorState, contact)
            .with(Field::MotionDetected, *movement)
            .with(Field::CurrentAmbientLightLevel, ble_lux(*light_level));
        battery(&mut state, level.map(f64::from));
        Ok(state)
    }

    fn encode(
        &self,
        _device: &DeviceConfig,
        changes: &DeviceState,
        _current: &DeviceState,
    ) -> Result<Vec<Dispatch>, CoreError> {
        no_commands(DeviceKind::Contact, changes)
    }

    fn offline_default(&self) -> DeviceState {
        DeviceState::new()
            .with(Field::ContactSensorState, hap::CONTACT_DETECTED)
            .with(Field::MotionDetected, false)
    }
}

// ── Meter ────────────────────────────────────────────────────────────

impl Strategy for MeterStrategy {
    fn decode_json(&self, body: &Value, unit: TemperatureUnit) -> DeviceState {
        let mut state = DeviceState::new();
        if let Some(c) = number(body, &["temperature"]) {
            state.set(Field::CurrentTemperature, unit.from_celsius(c));
        }
        if let Some(h) = number(body, &["humidity"]) {
            state.set(Field::CurrentRelativeHumidity, percent(h));
        }
        battery_from_json(&mut state, body);
        firmware(&mut state, body);
        state
    }

    fn decode_ble(
        &self,
        data: &ServiceData,
        unit: TemperatureUnit,
    ) -> Result<DeviceState, CoreError> {
        let ServiceData::Meter {
            temperature_c,
            humidity,
            battery: level,
        } = data
        else {
            return Err(ble_mismatch(DeviceKind::Meter, data));
        };

        let mut state = DeviceState::new()
            .with(Field::CurrentTemperature, unit.from_celsius(*temperature_c))
            .with(Field::CurrentRelativeHumidity, percent(f64::from(*humidity)));
        battery(&mut state, level.map(f64::from));
        Ok(state)
    }

    fn encode(
        &self,
        _device: &DeviceConfig,
        changes: &DeviceState,
        _current: &DeviceState,
    ) -> Result<Vec<Dispatch>, CoreError> {
        no_commands(DeviceKind::Meter, changes)
    }

    fn offline_default(&self) -> DeviceState {
        DeviceState::new()
            .with(Field::CurrentTemperature, 0.0)
            .with(Field::CurrentRelativeHumidity, 50_i64)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::FieldValue;
    use serde_json::json;

    #[test]
    fn webhook_detection_state() {
        let state = MotionStrategy.decode_json(
            &json!({ "detectionState": "NOT_DETECTED", "battery": 5 }),
            TemperatureUnit::Celsius,
        );
        assert_eq!(state.get(Field::MotionDetected), Some(&FieldValue::Bool(false)));
        assert_eq!(
            state.get(Field::StatusLowBattery),
            Some(&FieldValue::Int(hap::BATTERY_LOW))
        );
    }

    #[test]
    fn contact_timeout_counts_as_open() {
        let state = ContactStrategy.decode_json(
            &json!({ "openState": "timeOutNotClose", "moveDetected": false }),
            TemperatureUnit::Celsius,
        );
        assert_eq!(
            state.get(Field::ContactSensorState),
            Some(&FieldValue::Int(hap::CONTACT_NOT_DETECTED))
        );
    }

    #[test]
    fn meter_converts_and_clamps() {
        let state = MeterStrategy.decode_json(
            &json!({ "temperature": 20.0, "humidity": 104, "battery": 77 }),
            TemperatureUnit::Fahrenheit,
        );
        assert_eq!(state.get(Field::CurrentTemperature), Some(&FieldValue::Float(68.0)));
        assert_eq!(state.get(Field::CurrentRelativeHumidity), Some(&FieldValue::Int(100)));
    }

    #[test]
    fn meter_ble_without_battery_reads_full() {
        let data = ServiceData::Meter {
            temperature_c: -3.5,
            humidity: 40,
            battery: None,
        };
        let state = MeterStrategy.decode_ble(&data, TemperatureUnit::Celsius).unwrap();
        assert_eq!(state.get(Field::CurrentTemperature), Some(&FieldValue::Float(-3.5)));
        assert_eq!(state.get(Field::BatteryLevel), Some(&FieldValue::Int(100)));
    }

    #[test]
    fn sensors_reject_writes() {
        let changes = DeviceState::new().with(Field::MotionDetected, true);
        let device = DeviceConfig::new("M1", "Hall", DeviceKind::Motion);
        let err = MotionStrategy.encode(&device, &changes, &DeviceState::new());
        assert!(matches!(err, Err(CoreError::ReadOnly { .. })));
    }
}
