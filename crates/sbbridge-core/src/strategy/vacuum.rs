use serde_json::Value;

use sbbridge_api::{CommandRequest, ServiceData};

use super::common::{battery_from_json, firmware, text};
use super::{Dispatch, Strategy, ble_mismatch};
use crate::config::{DeviceConfig, TemperatureUnit};
use crate::error::CoreError;
use crate::model::{DeviceKind, DeviceState, Field, hap};

pub(super) struct VacuumStrategy;

/// Suction level `0..=3` for a rotation-speed percentage.
fn power_level(speed: i64) -> i64 {
    speed.clamp(0, 100) * 3 / 100
}

impl Strategy for VacuumStrategy {
    fn decode_json(&self, body: &Value, _unit: TemperatureUnit) -> DeviceState {
        let mut state = DeviceState::new();

        let online = text(body, &["onlineStatus"]).is_none_or(|s| s == "online");
        if let Some(status) = text(body, &["workingStatus"]) {
            let working = matches!(
                status.as_str(),
                "cleaning" | "clearing" | "inremotecontrol" | "industcollecting"
            );
            state.set(Field::On, online && working);
            state.set(
                Field::ChargingState,
                if status == "charging" {
                    hap::CHARGING
                } else {
                    hap::NOT_CHARGING
                },
            );
        } else if !online {
            state.set(Field::On, false);
        }

        battery_from_json(&mut state, body);
        firmware(&mut state, body);
        state
    }

    fn decode_ble(
        &self,
        data: &ServiceData,
        _unit: TemperatureUnit,
    ) -> Result<DeviceState, CoreError> {
        Err(ble_mismatch(DeviceKind::RobotVacuumCleaner, data))
    }

    fn encode(
        &self,
        _device: &DeviceConfig,
        changes: &DeviceState,
        _current: &DeviceState,
    ) -> Result<Vec<Dispatch>, CoreError> {
        let mut out = Vec::new();
        if let Some(speed) = changes.get(Field::RotationSpeed).and_then(|v| v.as_i64()) {
            out.push(Dispatch::cloud(CommandRequest::with_parameter(
                "PowLevel",
                power_level(speed),
            )));
        }
        if let Some(on) = changes.get(Field::On).and_then(|v| v.as_bool()) {
            let command = if on { "start" } else { "dock" };
            out.push(Dispatch::cloud(CommandRequest::simple(command)));
        }
        Ok(out)
    }

    fn offline_default(&self) -> DeviceState {
        DeviceState::new()
            .with(Field::On, false)
            .with(Field::ChargingState, hap::NOT_CHARGING)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::FieldValue;
    use serde_json::json;

    #[test]
    fn cleaning_is_on() {
        let state = VacuumStrategy.decode_json(
            &json!({ "workingStatus": "Clearing", "onlineStatus": "online", "battery": 64 }),
            TemperatureUnit::Celsius,
        );
        assert_eq!(state.get(Field::On), Some(&FieldValue::Bool(true)));
        assert_eq!(state.get(Field::ChargingState), Some(&FieldValue::Int(hap::NOT_CHARGING)));
    }

    #[test]
    fn charging_is_off_and_charging() {
        let state = VacuumStrategy.decode_json(
            &json!({ "workingStatus": "Charging" }),
            TemperatureUnit::Celsius,
        );
        assert_eq!(state.get(Field::On), Some(&FieldValue::Bool(false)));
        assert_eq!(state.get(Field::ChargingState), Some(&FieldValue::Int(hap::CHARGING)));
    }

    #[test]
    fn speed_then_start() {
        let device = DeviceConfig::new("V1", "Vacuum", DeviceKind::RobotVacuumCleaner);
        let changes = DeviceState::new()
            .with(Field::On, true)
            .with(Field::RotationSpeed, 100_i64);
        let out = VacuumStrategy
            .encode(&device, &changes, &DeviceState::new())
            .unwrap();
        assert_eq!(out[0].cloud, CommandRequest::with_parameter("PowLevel", 3));
        assert_eq!(out[1].cloud, CommandRequest::simple("start"));
    }
}
