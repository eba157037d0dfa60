use serde_json::Value;

use sbbridge_api::{CommandRequest, ServiceData};

use super::common::{firmware, flag, number};
use super::{Dispatch, Strategy, ble_mismatch};
use crate::config::{DeviceConfig, TemperatureUnit};
use crate::error::CoreError;
use crate::model::{DeviceKind, DeviceState, Field};

const FRAME_ON: [u8; 6] = [0x57, 0x0f, 0x50, 0x01, 0x01, 0x80];
const FRAME_OFF: [u8; 6] = [0x57, 0x0f, 0x50, 0x01, 0x01, 0x00];

pub(super) struct PlugStrategy;

impl Strategy for PlugStrategy {
    fn decode_json(&self, body: &Value, _unit: TemperatureUnit) -> DeviceState {
        let mut state = DeviceState::new();
        if let Some(on) = flag(body, &["power", "powerState"]) {
            state.set(Field::On, on);
        }
        if let Some(load) = number(body, &["electricCurrent", "weight"]) {
            state.set(Field::OutletInUse, load > 0.0);
        }
        firmware(&mut state, body);
        state
    }

    fn decode_ble(
        &self,
        data: &ServiceData,
        _unit: TemperatureUnit,
    ) -> Result<DeviceState, CoreError> {
        let ServiceData::PlugMini { on, power_watts } = data else {
            return Err(ble_mismatch(DeviceKind::Plug, data));
        };
        Ok(DeviceState::new()
            .with(Field::On, *on)
            .with(Field::OutletInUse, *power_watts > 0.0))
    }

    fn encode(
        &self,
        _device: &DeviceConfig,
        changes: &DeviceState,
        _current: &DeviceState,
    ) -> Result<Vec<Dispatch>, CoreError> {
        let Some(on) = changes.get(Field::On).and_then(|v| v.as_bool()) else {
            return Ok(Vec::new());
        };
        let dispatch = if on {
            Dispatch::cloud(CommandRequest::simple("turnOn")).with_ble(FRAME_ON)
        } else {
            Dispatch::cloud(CommandRequest::simple("turnOff")).with_ble(FRAME_OFF)
        };
        Ok(vec![dispatch])
    }

    fn offline_default(&self) -> DeviceState {
        DeviceState::new()
            .with(Field::On, false)
            .with(Field::OutletInUse, false)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::FieldValue;
    use serde_json::json;

    #[test]
    fn cloud_body() {
        let state = PlugStrategy.decode_json(
            &json!({ "power": "on", "voltage": 120.1, "weight": 0, "electricCurrent": 0.4 }),
            TemperatureUnit::Celsius,
        );
        assert_eq!(state.get(Field::On), Some(&FieldValue::Bool(true)));
        assert_eq!(state.get(Field::OutletInUse), Some(&FieldValue::Bool(true)));
        assert!(!state.contains(Field::BatteryLevel));
    }

    #[test]
    fn turn_off_carries_ble_frame() {
        let device = DeviceConfig::new("P1", "Lamp", DeviceKind::Plug);
        let changes = DeviceState::new().with(Field::On, false);
        let out = PlugStrategy.encode(&device, &changes, &DeviceState::new()).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].cloud.command, "turnOff");
        assert_eq!(out[0].ble.as_deref(), Some(&FRAME_OFF[..]));
    }
}
