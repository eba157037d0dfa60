use serde_json::Value;

use sbbridge_api::ble::BleLockState;
use sbbridge_api::{CommandRequest, ServiceData};

use super::common::{battery, battery_from_json, firmware, text};
use super::{Dispatch, Strategy, ble_mismatch};
use crate::config::{DeviceConfig, TemperatureUnit};
use crate::error::CoreError;
use crate::model::{DeviceKind, DeviceState, Field, hap};

pub(super) struct LockStrategy;

fn contact_from_door(door: &str) -> Option<i64> {
    match door {
        "open" | "opened" | "timeoutnotclose" => Some(hap::CONTACT_NOT_DETECTED),
        "close" | "closed" => Some(hap::CONTACT_DETECTED),
        _ => None,
    }
}

impl Strategy for LockStrategy {
    fn decode_json(&self, body: &Value, _unit: TemperatureUnit) -> DeviceState {
        let mut state = DeviceState::new();

        if let Some(lock) = text(body, &["lockState"]) {
            let (current, target) = match lock.as_str() {
                "locked" | "lock" => (hap::LOCK_SECURED, Some(hap::LOCK_SECURED)),
                "unlocked" | "unlock" => (hap::LOCK_UNSECURED, Some(hap::LOCK_UNSECURED)),
                "jammed" => (hap::LOCK_JAMMED, None),
                _ => (hap::LOCK_UNKNOWN, None),
            };
            state.set(Field::LockCurrentState, current);
            if let Some(target) = target {
                state.set(Field::LockTargetState, target);
            }
        }

        if let Some(contact) = text(body, &["doorState", "openState"])
            .as_deref()
            .and_then(contact_from_door)
        {
            state.set(Field::ContactSensorState, contact);
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
        let ServiceData::Lock {
            battery: level,
            state: lock,
            door_open,
            ..
        } = data
        else {
            return Err(ble_mismatch(DeviceKind::Lock, data));
        };

        let mut state = DeviceState::new();
        let (current, target) = match lock {
            BleLockState::Locked => (hap::LOCK_SECURED, hap::LOCK_SECURED),
            BleLockState::Unlocked => (hap::LOCK_UNSECURED, hap::LOCK_UNSECURED),
            BleLockState::Locking => (hap::LOCK_UNSECURED, hap::LOCK_SECURED),
            BleLockState::Unlocking => (hap::LOCK_SECURED, hap::LOCK_UNSECURED),
            BleLockState::LockingStop => (hap::LOCK_JAMMED, hap::LOCK_SECURED),
            BleLockState::UnlockingStop | BleLockState::NotFullyLocked => {
                (hap::LOCK_JAMMED, hap::LOCK_UNSECURED)
            }
        };
        state.set(Field::LockCurrentState, current);
        state.set(Field::LockTargetState, target);
        state.set(
            Field::ContactSensorState,
            if *door_open {
                hap::CONTACT_NOT_DETECTED
            } else {
                hap::CONTACT_DETECTED
            },
        );
        battery(&mut state, level.map(f64::from));
        Ok(state)
    }

    fn encode(
        &self,
        _device: &DeviceConfig,
        changes: &DeviceState,
        _current: &DeviceState,
    ) -> Result<Vec<Dispatch>, CoreError> {
        let Some(target) = changes.get(Field::LockTargetState) else {
            return Ok(Vec::new());
        };
        let command = match target.as_i64() {
            Some(hap::LOCK_SECURED) => "lock",
            Some(hap::LOCK_UNSECURED) => "unlock",
            _ => {
                return Err(CoreError::InvalidValue {
                    field: Field::LockTargetState,
                    reason: format!("{target:?} is neither secured nor unsecured"),
                });
            }
        };
        Ok(vec![Dispatch::cloud(CommandRequest::simple(command))])
    }

    fn offline_default(&self) -> DeviceState {
        DeviceState::new()
            .with(Field::LockCurrentState, hap::LOCK_UNSECURED)
            .with(Field::LockTargetState, hap::LOCK_UNSECURED)
    }

    fn settle(
        &self,
        _device: &DeviceConfig,
        pushed: &DeviceState,
        _current: &DeviceState,
    ) -> DeviceState {
        let mut state = pushed.clone();
        if let Some(target) = pushed.get(Field::LockTargetState) {
            state.set(Field::LockCurrentState, target.clone());
        }
        state
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::FieldValue;
    use serde_json::json;

    fn device() -> DeviceConfig {
        DeviceConfig::new("L1", "Front Door", DeviceKind::Lock)
    }

    #[test]
    fn webhook_states_are_case_insensitive() {
        let state = LockStrategy.decode_json(
            &json!({ "lockState": "UNLOCKED", "deviceMac": "C0FFEE000001" }),
            TemperatureUnit::Celsius,
        );
        assert_eq!(
            state.get(Field::LockCurrentState),
            Some(&FieldValue::Int(hap::LOCK_UNSECURED))
        );
    }

    #[test]
    fn jammed_leaves_target_alone() {
        let state = LockStrategy.decode_json(&json!({ "lockState": "jammed" }), TemperatureUnit::Celsius);
        assert_eq!(state.get(Field::LockCurrentState), Some(&FieldValue::Int(hap::LOCK_JAMMED)));
        assert!(!state.contains(Field::LockTargetState));
    }

    #[test]
    fn door_state_maps_to_contact() {
        let state = LockStrategy.decode_json(&json!({ "doorState": "opened" }), TemperatureUnit::Celsius);
        assert_eq!(
            state.get(Field::ContactSensorState),
            Some(&FieldValue::Int(hap::CONTACT_NOT_DETECTED))
        );
    }

    #[test]
    fn ble_locking_is_in_transit() {
        let data = ServiceData::Lock {
            battery: Some(80),
            calibrated: true,
            state: BleLockState::Locking,
            door_open: false,
        };
        let state = LockStrategy.decode_ble(&data, TemperatureUnit::Celsius).unwrap();
        assert_eq!(state.get(Field::LockTargetState), Some(&FieldValue::Int(hap::LOCK_SECURED)));
        assert_eq!(
            state.get(Field::LockCurrentState),
            Some(&FieldValue::Int(hap::LOCK_UNSECURED))
        );
    }

    #[test]
    fn encodes_lock_and_unlock() {
        let changes = DeviceState::new().with(Field::LockTargetState, hap::LOCK_UNSECURED);
        let out = LockStrategy.encode(&device(), &changes, &DeviceState::new()).unwrap();
        assert_eq!(out, vec![Dispatch::cloud(CommandRequest::simple("unlock"))]);
    }

    #[test]
    fn settle_moves_current_to_target() {
        let pushed = DeviceState::new().with(Field::LockTargetState, hap::LOCK_SECURED);
        let settled = LockStrategy.settle(&device(), &pushed, &DeviceState::new());
        assert_eq!(settled.get(Field::LockCurrentState), Some(&FieldValue::Int(hap::LOCK_SECURED)));
    }
}
