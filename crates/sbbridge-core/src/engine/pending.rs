// ── Pending command queue ──
//
// Accessory writes land here without any I/O. The debounce task waits on
// the queue's `Notify`; every write re-arms the window.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tokio::time::Instant;

use crate::model::{DeviceState, Field, FieldValue};

/// Coalesced writes waiting for the debounce window to close.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingCommand {
    /// Desired value per field; the latest write wins.
    pub changes: DeviceState,
    pub last_write: Instant,
}

#[derive(Debug, Default)]
struct Inner {
    pending: Mutex<Option<PendingCommand>>,
    notify: Notify,
}

/// Cloneable handle to one device's pending batch.
#[derive(Debug, Clone, Default)]
pub struct PendingQueue {
    inner: Arc<Inner>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a desired value and restart the debounce window.
    pub fn request_change(&self, field: Field, value: FieldValue) {
        {
            let mut slot = self.lock();
            let now = Instant::now();
            match slot.as_mut() {
                Some(pending) => {
                    pending.changes.set(field, value);
                    pending.last_write = now;
                }
                None => {
                    *slot = Some(PendingCommand {
                        changes: DeviceState::new().with(field, value),
                        last_write: now,
                    });
                }
            }
        }
        self.inner.notify.notify_one();
    }

    /// Remove and return the whole batch.
    pub fn take(&self) -> Option<PendingCommand> {
        self.lock().take()
    }

    /// Drop the batch without sending it.
    pub fn clear(&self) {
        self.lock().take();
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_none()
    }

    /// Resolves on the next write (or immediately if one arrived since the
    /// last wait).
    pub async fn written(&self) {
        self.inner.notify.notified().await;
    }

    fn lock(&self) -> MutexGuard<'_, Option<PendingCommand>> {
        self.inner
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
