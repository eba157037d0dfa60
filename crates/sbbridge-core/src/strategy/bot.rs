use serde_json::Value;

use sbbridge_api::{CommandRequest, ServiceData};

use super::common::{battery, battery_from_json, firmware, flag};
use super::{Dispatch, Strategy, ble_mismatch};
use crate::config::{BotMode, DeviceConfig, TemperatureUnit};
use crate::error::CoreError;
use crate::model::{DeviceKind, DeviceState, Field};

const FRAME_PRESS: [u8; 3] = [0x57, 0x01, 0x00];
const FRAME_ON: [u8; 3] = [0x57, 0x01, 0x01];
const FRAME_OFF: [u8; 3] = [0x57, 0x01, 0x02];

pub(super) struct BotStrategy;

impl Strategy for BotStrategy {
    fn decode_json(&self, body: &Value, _unit: TemperatureUnit) -> DeviceState {
        let mut state = DeviceState::new();
        if let Some(on) = flag(body, &["power", "powerState"]) {
            state.set(Field::On, on);
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
        let ServiceData::Bot {
            on,
            battery: level,
            ..
        } = data
        else {
            return Err(ble_mismatch(DeviceKind::Bot, data));
        };
        let mut state = DeviceState::new().with(Field::On, *on);
        battery(&mut state, level.map(f64::from));
        Ok(state)
    }

    fn encode(
        &self,
        device: &DeviceConfig,
        changes: &DeviceState,
        _current: &DeviceState,
    ) -> Result<Vec<Dispatch>, CoreError> {
        let Some(on) = changes.get(Field::On).and_then(|v| v.as_bool()) else {
            return Ok(Vec::new());
        };
        let dispatch = match (device.options.bot_mode, on) {
            // A press mode bot has nothing to do for "off".
            (BotMode::Press, false) => return Ok(Vec::new()),
            (BotMode::Press, true) => {
                Dispatch::cloud(CommandRequest::simple("press")).with_ble(FRAME_PRESS)
            }
            (BotMode::Switch, true) => {
                Dispatch::cloud(CommandRequest::simple("turnOn")).with_ble(FRAME_ON)
            }
            (BotMode::Switch, false) => {
                Dispatch::cloud(CommandRequest::simple("turnOff")).with_ble(FRAME_OFF)
            }
        };
        Ok(vec![dispatch])
    }

    fn offline_default(&self) -> DeviceState {
        DeviceState::new().with(Field::On, false)
    }

    fn settle(
        &self,
        device: &DeviceConfig,
        pushed: &DeviceState,
        _current: &DeviceState,
    ) -> DeviceState {
        let mut state = pushed.clone();
        if device.options.bot_mode == BotMode::Press {
            state.set(Field::On, false);
        }
        state
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::FieldValue;

    fn bot(mode: BotMode) -> DeviceConfig {
        let mut d = DeviceConfig::new("B1", "Kettle", DeviceKind::Bot);
        d.options.bot_mode = mode;
        d
    }

    #[test]
    fn press_mode_presses_and_springs_back() {
        let changes = DeviceState::new().with(Field::On, true);
        let out = BotStrategy
            .encode(&bot(BotMode::Press), &changes, &DeviceState::new())
            .unwrap();
        assert_eq!(out[0].cloud.command, "press");
        assert_eq!(out[0].ble.as_deref(), Some(&FRAME_PRESS[..]));

        let settled = BotStrategy.settle(&bot(BotMode::Press), &changes, &DeviceState::new());
        assert_eq!(settled.get(Field::On), Some(&FieldValue::Bool(false)));
    }

    #[test]
    fn press_mode_ignores_off() {
        let changes = DeviceState::new().with(Field::On, false);
        let out = BotStrategy
            .encode(&bot(BotMode::Press), &changes, &DeviceState::new())
            .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn switch_mode_turns_off() {
        let changes = DeviceState::new().with(Field::On, false);
        let out = BotStrategy
            .encode(&bot(BotMode::Switch), &changes, &DeviceState::new())
            .unwrap();
        assert_eq!(out[0].cloud.command, "turnOff");
        assert_eq!(out[0].ble.as_deref(), Some(&FRAME_OFF[..]));
    }
}
