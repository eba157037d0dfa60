// ── Per-device state store ──
//
// Canonical `DeviceState` plus the values last accepted by the vendor.
// Every change is published on a `watch` channel so observers (HTTP
// surface, context cache) never need the engine's guard to read.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::model::{DeviceState, Field, FieldValue};

/// What observers see: the current state and when it last changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateSnapshot {
    pub state: DeviceState,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Single-writer store for one device. The engine serializes access.
#[derive(Debug)]
pub struct DeviceStore {
    state: DeviceState,
    last_pushed: DeviceState,
    tx: watch::Sender<StateSnapshot>,
}

impl Default for DeviceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceStore {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(StateSnapshot::default());
        Self {
            state: DeviceState::new(),
            last_pushed: DeviceState::new(),
            tx,
        }
    }

    /// Start from a persisted state. Cached values are not confirmed by
    /// the vendor, so nothing counts as pushed yet.
    pub fn seed(&mut self, state: DeviceState) {
        self.state = state;
        self.publish();
    }

    /// Merge `partial` into the canonical state and return the fields whose
    /// value actually changed.
    pub fn apply_update(&mut self, partial: &DeviceState) -> BTreeSet<Field> {
        let changed: BTreeSet<Field> = partial
            .iter()
            .filter(|(field, value)| self.state.get(*field) != Some(*value))
            .map(|(field, _)| field)
            .collect();

        if !changed.is_empty() {
            self.state = self.state.overlay(partial);
            self.publish();
        }
        changed
    }

    /// Copy of the full current state.
    pub fn snapshot_for_push(&self) -> DeviceState {
        self.state.clone()
    }

    /// Record the values the vendor accepted.
    pub fn mark_pushed(&mut self, pushed: &DeviceState) {
        self.last_pushed = self.last_pushed.overlay(pushed);
    }

    /// Adopt the vendor's reported values for `fields` as the push marker,
    /// so a write contradicting a device-side change is sent again.
    pub fn confirm(&mut self, reported: &DeviceState, fields: &[Field]) {
        for &field in fields {
            if let Some(value) = reported.get(field) {
                self.last_pushed.set(field, value.clone());
            }
        }
    }

    pub fn last_pushed(&self, field: Field) -> Option<&FieldValue> {
        self.last_pushed.get(field)
    }

    pub fn get(&self, field: Field) -> Option<&FieldValue> {
        self.state.get(field)
    }

    /// Receiver that yields every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<StateSnapshot> {
        self.tx.subscribe()
    }

    fn publish(&self) {
        let snapshot = StateSnapshot {
            state: self.state.clone(),
            updated_at: Some(Utc::now()),
        };
        self.tx.send_replace(snapshot);
    }
}
