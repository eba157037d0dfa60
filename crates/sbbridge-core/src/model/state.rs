// ── Canonical device state ──
//
// A sparse map from characteristic-level field names to typed values.
// The same type carries full snapshots and partial updates.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

/// Observable attribute of a device, named after the characteristic it
/// drives on the accessory side.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
)]
pub enum Field {
    On,
    OutletInUse,
    Active,
    LockCurrentState,
    LockTargetState,
    ContactSensorState,
    MotionDetected,
    BatteryLevel,
    StatusLowBattery,
    ChargingState,
    CurrentTemperature,
    CurrentRelativeHumidity,
    CurrentAmbientLightLevel,
    RotationSpeed,
    SwingMode,
    TargetHeaterCoolerState,
    CurrentHeaterCoolerState,
    CoolingThresholdTemperature,
    Brightness,
    FirmwareRevision,
}

/// Typed value for a [`Field`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Int(i) => Some(*i != 0),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Bool(b) => Some(i64::from(*b)),
            #[allow(clippy::cast_possible_truncation)]
            Self::Float(f) if f.is_finite() => Some(f.round() as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            #[allow(clippy::cast_precision_loss)]
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u8> for FieldValue {
    fn from(v: u8) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// Sparse snapshot of a device's observable attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceState {
    fields: BTreeMap<Field, FieldValue>,
}

impl DeviceState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly for decoders and tests.
    pub fn with(mut self, field: Field, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(field, value.into());
        self
    }

    pub fn set(&mut self, field: Field, value: impl Into<FieldValue>) {
        self.fields.insert(field, value.into());
    }

    pub fn get(&self, field: Field) -> Option<&FieldValue> {
        self.fields.get(&field)
    }

    pub fn remove(&mut self, field: Field) -> Option<FieldValue> {
        self.fields.remove(&field)
    }

    pub fn contains(&self, field: Field) -> bool {
        self.fields.contains_key(&field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (*k, v))
    }

    pub fn fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.fields.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Overlay `other` on top of `self`; `other` wins on conflicts.
    pub fn overlay(&self, other: &DeviceState) -> DeviceState {
        let mut merged = self.clone();
        for (field, value) in other.iter() {
            merged.fields.insert(field, value.clone());
        }
        merged
    }
}

impl FromIterator<(Field, FieldValue)> for DeviceState {
    fn from_iter<I: IntoIterator<Item = (Field, FieldValue)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn field_names_round_trip_through_strings() {
        assert_eq!(Field::LockTargetState.to_string(), "LockTargetState");
        assert_eq!(Field::from_str("MotionDetected").unwrap(), Field::MotionDetected);
        assert!(Field::from_str("NotAField").is_err());
    }

    #[test]
    fn overlay_prefers_the_newer_value() {
        let base = DeviceState::new()
            .with(Field::On, true)
            .with(Field::BatteryLevel, 50_i64);
        let update = DeviceState::new().with(Field::On, false);

        let merged = base.overlay(&update);
        assert_eq!(merged.get(Field::On), Some(&FieldValue::Bool(false)));
        assert_eq!(merged.get(Field::BatteryLevel), Some(&FieldValue::Int(50)));
    }

    #[test]
    fn state_serializes_as_a_flat_map() {
        let state = DeviceState::new()
            .with(Field::CurrentTemperature, 21.5)
            .with(Field::FirmwareRevision, "V1.4");
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "CurrentTemperature": 21.5, "FirmwareRevision": "V1.4" })
        );

        let back: DeviceState = serde_json::from_value(json).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn numeric_coercions() {
        assert_eq!(FieldValue::Float(2.6).as_i64(), Some(3));
        assert_eq!(FieldValue::Int(1).as_bool(), Some(true));
        assert_eq!(FieldValue::Text("x".into()).as_f64(), None);
    }
}
