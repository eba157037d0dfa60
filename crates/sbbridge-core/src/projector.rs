// ── Characteristic projector ──
//
// Bridges the engine and the accessory host: pushes `DeviceState` fields
// out as characteristic values and turns characteristic writes into
// pending changes.

use std::str::FromStr;
use std::sync::Arc;

use tracing::debug;

use crate::engine::PendingQueue;
use crate::error::CoreError;
use crate::model::{DeviceKind, DeviceState, Field, FieldValue};

/// The accessory host side of one device.
pub trait Accessory: Send + Sync {
    /// Set one characteristic's value.
    fn update_characteristic(&self, field: Field, value: &FieldValue);

    /// Show (`Some`) or clear (`None`) a communication failure.
    fn set_communication_failure(&self, failure: Option<&str>);
}

/// Accessory that discards everything, for headless runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAccessory;

impl Accessory for NullAccessory {
    fn update_characteristic(&self, _field: Field, _value: &FieldValue) {}

    fn set_communication_failure(&self, _failure: Option<&str>) {}
}

#[derive(Clone)]
pub struct Projector {
    kind: DeviceKind,
    accessory: Arc<dyn Accessory>,
    pending: PendingQueue,
}

impl std::fmt::Debug for Projector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Projector")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl Projector {
    pub fn new(kind: DeviceKind, accessory: Arc<dyn Accessory>, pending: PendingQueue) -> Self {
        Self {
            kind,
            accessory,
            pending,
        }
    }

    /// Push every field present in `state` and clear any failure marker.
    pub fn push_all(&self, state: &DeviceState) {
        for (field, value) in state.iter() {
            self.accessory.update_characteristic(field, value);
        }
        self.accessory.set_communication_failure(None);
    }

    pub fn mark_failure(&self, error: &CoreError) {
        self.accessory
            .set_communication_failure(Some(&error.to_string()));
    }

    /// Accept a characteristic write from the accessory host.
    pub fn on_write(&self, characteristic: &str, value: FieldValue) -> Result<(), CoreError> {
        let field = Field::from_str(characteristic).map_err(|_| CoreError::UnknownCharacteristic {
            name: characteristic.to_owned(),
        })?;
        if !self.kind.writable_fields().contains(&field) {
            return Err(CoreError::ReadOnly {
                field,
                kind: self.kind,
            });
        }
        let value = normalize(field, value)?;
        debug!(%field, ?value, "characteristic write queued");
        self.pending.request_change(field, value);
        Ok(())
    }
}

/// Coerce a written value into the type the field carries, so that equal
/// values compare equal regardless of how the host encoded them.
fn normalize(field: Field, value: FieldValue) -> Result<FieldValue, CoreError> {
    let coerced = match field {
        Field::On | Field::OutletInUse | Field::MotionDetected => value.as_bool().map(FieldValue::Bool),
        Field::CurrentTemperature
        | Field::CoolingThresholdTemperature
        | Field::CurrentAmbientLightLevel => value.as_f64().map(FieldValue::Float),
        Field::FirmwareRevision => match value {
            FieldValue::Text(_) => Some(value.clone()),
            _ => None,
        },
        _ => value.as_i64().map(FieldValue::Int),
    };
    coerced.ok_or_else(|| CoreError::InvalidValue {
        field,
        reason: format!("cannot use {value:?}"),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::hap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        updates: Mutex<Vec<(Field, FieldValue)>>,
        failure: Mutex<Option<String>>,
    }

    impl Accessory for Recorder {
        fn update_characteristic(&self, field: Field, value: &FieldValue) {
            self.updates.lock().unwrap().push((field, value.clone()));
        }

        fn set_communication_failure(&self, failure: Option<&str>) {
            *self.failure.lock().unwrap() = failure.map(str::to_owned);
        }
    }

    fn projector(kind: DeviceKind) -> (Projector, Arc<Recorder>, PendingQueue) {
        let recorder = Arc::new(Recorder::default());
        let pending = PendingQueue::new();
        let projector = Projector::new(kind, recorder.clone(), pending.clone());
        (projector, recorder, pending)
    }

    #[test]
    fn push_all_only_touches_present_fields() {
        let (p, rec, _) = projector(DeviceKind::Meter);
        p.push_all(&DeviceState::new().with(Field::CurrentTemperature, 21.0));
        assert_eq!(
            *rec.updates.lock().unwrap(),
            vec![(Field::CurrentTemperature, FieldValue::Float(21.0))]
        );
    }

    #[test]
    fn push_clears_failure() {
        let (p, rec, _) = projector(DeviceKind::Lock);
        p.mark_failure(&CoreError::HubOffline);
        assert_eq!(rec.failure.lock().unwrap().as_deref(), Some("Hub is offline"));
        p.push_all(&DeviceState::new());
        assert!(rec.failure.lock().unwrap().is_none());
    }

    #[test]
    fn writes_are_queued_and_normalized() {
        let (p, _, pending) = projector(DeviceKind::Plug);
        p.on_write("On", FieldValue::Int(1)).unwrap();
        let batch = pending.take().unwrap();
        assert_eq!(batch.changes.get(Field::On), Some(&FieldValue::Bool(true)));
    }

    #[test]
    fn unknown_and_read_only_characteristics_are_rejected() {
        let (p, _, pending) = projector(DeviceKind::Lock);
        assert!(matches!(
            p.on_write("Hue", FieldValue::Int(3)),
            Err(CoreError::UnknownCharacteristic { .. })
        ));
        assert!(matches!(
            p.on_write("LockCurrentState", FieldValue::Int(hap::LOCK_SECURED)),
            Err(CoreError::ReadOnly { .. })
        ));
        assert!(pending.is_empty());
    }

    #[test]
    fn wrong_value_type_is_rejected() {
        let (p, _, _) = projector(DeviceKind::Lock);
        assert!(matches!(
            p.on_write("LockTargetState", FieldValue::Text("open".into())),
            Err(CoreError::InvalidValue { .. })
        ));
    }
}
