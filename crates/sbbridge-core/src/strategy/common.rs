// Decoding helpers shared by the archetypes.

use serde_json::Value;

use crate::model::{DeviceState, Field, hap};

/// First key of `keys` present in `body`.
pub(super) fn pick<'a>(body: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| body.get(*k)).filter(|v| !v.is_null())
}

/// String value, lowercased for case-insensitive matching.
pub(super) fn text(body: &Value, keys: &[&str]) -> Option<String> {
    pick(body, keys)
        .and_then(Value::as_str)
        .map(str::to_ascii_lowercase)
}

/// Number from a JSON number or a numeric string.
pub(super) fn number(body: &Value, keys: &[&str]) -> Option<f64> {
    let v = pick(body, keys)?;
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
}

pub(super) fn flag(body: &Value, keys: &[&str]) -> Option<bool> {
    match pick(body, keys)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "true" | "on" | "detected" | "1" => Some(true),
            "false" | "off" | "not_detected" | "0" => Some(false),
            _ => None,
        },
        Value::Number(n) => n.as_i64().map(|i| i != 0),
        _ => None,
    }
}

/// Clamp a percentage into `[0, 100]`.
#[allow(clippy::cast_possible_truncation)]
pub(super) fn percent(v: f64) -> i64 {
    v.round().clamp(0.0, 100.0) as i64
}

/// Set `BatteryLevel` and `StatusLowBattery`. Absent battery reads as full.
pub(super) fn battery(state: &mut DeviceState, level: Option<f64>) {
    let level = level.map_or(hap::DEFAULT_BATTERY_LEVEL, percent);
    state.set(Field::BatteryLevel, level);
    state.set(
        Field::StatusLowBattery,
        if level < hap::LOW_BATTERY_THRESHOLD {
            hap::BATTERY_LOW
        } else {
            hap::BATTERY_NORMAL
        },
    );
}

pub(super) fn battery_from_json(state: &mut DeviceState, body: &Value) {
    battery(state, number(body, &["battery"]));
}

pub(super) fn firmware(state: &mut DeviceState, body: &Value) {
    if let Some(v) = pick(body, &["version", "firmware"]) {
        let rev = match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        state.set(Field::FirmwareRevision, rev);
    }
}

/// Ambient light in lux from a vendor light reading.
///
/// Accepts `dark`/`dim`/`bright` or a numeric level 1-20, mapped linearly
/// onto the characteristic's range.
pub(super) fn lux(body: &Value) -> Option<f64> {
    let keys = ["brightness", "lightLevel"];
    if let Some(level) = text(body, &keys) {
        return match level.as_str() {
            "dark" | "dim" => Some(hap::MIN_LUX),
            "bright" => Some(hap::MAX_LUX),
            other => other.parse::<f64>().ok().map(level_to_lux),
        };
    }
    number(body, &keys).map(level_to_lux)
}

fn level_to_lux(level: f64) -> f64 {
    let level = level.clamp(1.0, 20.0);
    hap::MIN_LUX + (level - 1.0) / 19.0 * (hap::MAX_LUX - hap::MIN_LUX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FieldValue;
    use serde_json::json;

    #[test]
    fn battery_absent_or_garbage_reads_full() {
        for body in [json!({}), json!({ "battery": "n/a" }), json!({ "battery": null })] {
            let mut s = DeviceState::new();
            battery_from_json(&mut s, &body);
            assert_eq!(s.get(Field::BatteryLevel), Some(&FieldValue::Int(100)), "{body}");
            assert_eq!(
                s.get(Field::StatusLowBattery),
                Some(&FieldValue::Int(hap::BATTERY_NORMAL))
            );
        }
    }

    #[test]
    fn low_battery_boundary_is_normal() {
        let mut s = DeviceState::new();
        battery(&mut s, Some(10.0));
        assert_eq!(
            s.get(Field::StatusLowBattery),
            Some(&FieldValue::Int(hap::BATTERY_NORMAL))
        );

        battery(&mut s, Some(9.0));
        assert_eq!(s.get(Field::StatusLowBattery), Some(&FieldValue::Int(hap::BATTERY_LOW)));
    }

    #[test]
    fn battery_is_clamped() {
        let mut s = DeviceState::new();
        battery(&mut s, Some(130.0));
        assert_eq!(s.get(Field::BatteryLevel), Some(&FieldValue::Int(100)));
        battery(&mut s, Some(-4.0));
        assert_eq!(s.get(Field::BatteryLevel), Some(&FieldValue::Int(0)));
    }

    #[test]
    fn light_levels() {
        assert_eq!(lux(&json!({ "brightness": "dim" })), Some(hap::MIN_LUX));
        assert_eq!(lux(&json!({ "lightLevel": "BRIGHT" })), Some(hap::MAX_LUX));
        assert_eq!(lux(&json!({ "lightLevel": 20 })), Some(hap::MAX_LUX));
        assert_eq!(lux(&json!({ "lightLevel": 1 })), Some(hap::MIN_LUX));
        assert_eq!(lux(&json!({})), None);
    }

    #[test]
    fn numeric_strings_are_numbers() {
        assert_eq!(number(&json!({ "temperature": "21.5" }), &["temperature"]), Some(21.5));
        assert_eq!(flag(&json!({ "power": "ON" }), &["power"]), Some(true));
    }
}
