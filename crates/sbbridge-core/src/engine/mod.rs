// ── Reconciliation engine ──
//
// One engine per device. It owns the device's store behind a single async
// mutex, which doubles as the single-flight guard: a refresh, a flush or
// an event-driven ingest holds it for its whole duration, network I/O
// included.

mod pending;
mod tasks;

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::cache::ContextCache;
use crate::classify::{CommandResult, StatusClass};
use crate::config::DeviceConfig;
use crate::error::CoreError;
use crate::model::{DeviceState, Field, FieldValue, Payload, Transport};
use crate::projector::{Accessory, Projector};
use crate::store::{DeviceStore, StateSnapshot};
use crate::strategy::{self, Dispatch, Strategy};
use crate::transport::{BleApi, CloudApi};
use crate::webhook::WebhookRouter;

pub use pending::{PendingCommand, PendingQueue};

/// Shared handles injected into every engine.
#[derive(Clone, Default)]
pub struct Transports {
    pub cloud: Option<Arc<dyn CloudApi>>,
    pub ble: Option<Arc<dyn BleApi>>,
    pub webhook: Option<WebhookRouter>,
    pub cache: Option<Arc<ContextCache>>,
}

/// What a refresh or ingest did.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// A payload was decoded and applied.
    Updated {
        transport: Transport,
        changed: BTreeSet<Field>,
    },
    /// Nothing new to apply (no advertisement in the window, IR remote,
    /// undecodable payload).
    NothingNew,
    /// Cloud is administratively disabled and is the only transport.
    Disabled,
    /// Another refresh or flush held the guard.
    Busy,
    /// The vendor reported the device or its hub offline.
    Offline(StatusClass),
    /// No transport could be used.
    Unavailable,
    /// The attempt failed; the accessory shows a communication failure.
    Failed,
}

/// What a flush did.
#[derive(Debug, Clone, PartialEq)]
pub enum FlushOutcome {
    /// No pending batch.
    Empty,
    /// Every pending value equals what was last pushed.
    Suppressed,
    /// Commands were accepted.
    Pushed(Vec<CommandResult>),
    /// The vendor reported the device or its hub offline; the batch is dropped.
    Offline(StatusClass),
    /// Encoding or dispatch failed.
    Failed,
}

/// Reconciliation engine for one device. Cheap to clone.
#[derive(Clone)]
pub struct DeviceEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    device: DeviceConfig,
    strategy: &'static dyn Strategy,
    transports: Transports,
    guard: Mutex<DeviceStore>,
    snapshots: watch::Receiver<StateSnapshot>,
    pending: PendingQueue,
    projector: Projector,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
    follow_up: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for DeviceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceEngine")
            .field("device", &self.inner.device.id)
            .field("kind", &self.inner.device.kind)
            .finish_non_exhaustive()
    }
}

impl DeviceEngine {
    /// Validate `device` and build its engine. The store is seeded from the
    /// context cache when one is configured. Does not start any task.
    pub fn new(
        device: DeviceConfig,
        transports: Transports,
        accessory: Arc<dyn Accessory>,
    ) -> Result<Self, CoreError> {
        device.validate()?;

        let mut store = DeviceStore::new();
        if let Some(seed) = transports.cache.as_ref().and_then(|c| c.get(&device.id)) {
            debug!(device = %device.id, fields = seed.len(), "seeding state from context cache");
            // IR remotes never report back; their cached state is what was
            // last sent.
            if device.kind.is_ir() {
                store.mark_pushed(&seed);
            }
            store.seed(seed);
        }
        let snapshots = store.subscribe();

        let pending = PendingQueue::new();
        let projector = Projector::new(device.kind, accessory, pending.clone());

        Ok(Self {
            inner: Arc::new(EngineInner {
                strategy: strategy::strategy_for(device.kind),
                device,
                transports,
                guard: Mutex::new(store),
                snapshots,
                pending,
                projector,
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
                follow_up: std::sync::Mutex::new(None),
            }),
        })
    }

    pub fn device(&self) -> &DeviceConfig {
        &self.inner.device
    }

    pub fn projector(&self) -> &Projector {
        &self.inner.projector
    }

    /// Latest published state, without taking the guard.
    pub fn snapshot(&self) -> StateSnapshot {
        self.inner.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<StateSnapshot> {
        self.inner.snapshots.clone()
    }

    /// Whether a write is waiting for its debounce window to close.
    pub fn has_pending(&self) -> bool {
        !self.inner.pending.is_empty()
    }

    // ── Refresh ──────────────────────────────────────────────────────

    /// Pull the device's status, waiting for any in-flight work first.
    pub async fn refresh(&self) -> RefreshOutcome {
        let mut store = self.inner.guard.lock().await;
        self.refresh_locked(&mut store).await
    }

    /// Timer-driven refresh: skipped when the guard is held.
    pub async fn try_refresh(&self) -> RefreshOutcome {
        let Ok(mut store) = self.inner.guard.try_lock() else {
            debug!(device = %self.id(), "refresh skipped, device busy");
            return RefreshOutcome::Busy;
        };
        self.refresh_locked(&mut store).await
    }

    async fn refresh_locked(&self, store: &mut DeviceStore) -> RefreshOutcome {
        let device = &self.inner.device;
        let t = &device.transport;

        if device.kind.is_ir() {
            debug!(device = %self.id(), "IR remotes report no status");
            return RefreshOutcome::NothingNew;
        }
        if !t.connection_type.uses_ble() && t.cloud_disabled {
            info!(device = %self.id(), "cloud disabled, refresh skipped");
            return RefreshOutcome::Disabled;
        }

        let mut ble_error = None;
        if t.ble_enabled() {
            match self.ble_refresh(store).await {
                Ok(Some(outcome)) => return outcome,
                Ok(None) if !self.cloud_available() => {
                    debug!(device = %self.id(), "no advertisement in scan window");
                    return RefreshOutcome::NothingNew;
                }
                Ok(None) => {
                    debug!(device = %self.id(), "no advertisement in scan window, trying cloud");
                }
                Err(e) if self.cloud_available() => {
                    warn!(device = %self.id(), error = %e, "BLE refresh failed, trying cloud");
                }
                Err(e) => ble_error = Some(e),
            }
        }

        if self.cloud_available() {
            return self.cloud_refresh(store).await;
        }

        if let Some(e) = ble_error {
            error!(device = %self.id(), error = %e, "BLE refresh failed");
            self.inner.projector.mark_failure(&e);
            return RefreshOutcome::Failed;
        }

        warn!(device = %self.id(), "no transport available");
        let cause = CoreError::TransportUnavailable {
            reason: format!("connection type {}", t.connection_type),
        };
        self.apply_offline_policy(store, &cause);
        RefreshOutcome::Unavailable
    }

    /// `Ok(None)` when the scan window closed without a match.
    async fn ble_refresh(
        &self,
        store: &mut DeviceStore,
    ) -> Result<Option<RefreshOutcome>, CoreError> {
        let device = &self.inner.device;
        let (Some(ble), Some(address)) = (self.inner.transports.ble.as_ref(), device.address) else {
            return Err(CoreError::TransportUnavailable {
                reason: "BLE is not available on this host".into(),
            });
        };
        let models = device.kind.ble_models();
        let window = device.transport.scan_duration;

        let advertisement = self
            .with_ble_retry("scan", || ble.scan(address, models, window))
            .await?;
        let Some(ad) = advertisement else {
            return Ok(None);
        };
        debug!(device = %self.id(), rssi = ?ad.rssi, "advertisement received");
        Ok(Some(self.apply_payload(store, &Payload::Ble(ad.data))))
    }

    async fn cloud_refresh(&self, store: &mut DeviceStore) -> RefreshOutcome {
        let Some(cloud) = self.inner.transports.cloud.as_ref() else {
            return RefreshOutcome::Unavailable;
        };
        let response = match cloud.status(self.id()).await {
            Ok(r) => r,
            Err(e) => {
                CommandResult::from_error(Transport::Cloud, &e).log(self.id());
                self.inner.projector.mark_failure(&e);
                return RefreshOutcome::Failed;
            }
        };

        let result = CommandResult::new(Transport::Cloud, response.status_code, response.message);
        match result.class {
            StatusClass::Success => self.apply_payload(store, &Payload::Cloud(response.body)),
            class if class.is_offline() => {
                result.log(self.id());
                let err = offline_error(class);
                self.apply_offline_policy(store, &err);
                RefreshOutcome::Offline(class)
            }
            _ => {
                result.log(self.id());
                if let Err(e) = result.into_result() {
                    self.inner.projector.mark_failure(&e);
                }
                RefreshOutcome::Failed
            }
        }
    }

    // ── Event-driven updates ─────────────────────────────────────────

    /// Apply a pushed payload (webhook, BLE event) under the guard.
    pub async fn ingest(&self, payload: Payload) -> RefreshOutcome {
        let mut store = self.inner.guard.lock().await;
        self.apply_payload(&mut store, &payload)
    }

    fn apply_payload(&self, store: &mut DeviceStore, payload: &Payload) -> RefreshOutcome {
        let transport = payload.transport();
        let partial = match strategy::decode(
            self.inner.device.kind,
            payload,
            self.inner.device.transport.temperature_unit,
        ) {
            Ok(partial) => partial,
            Err(e) => {
                debug!(device = %self.id(), %transport, error = %e, "payload ignored");
                return RefreshOutcome::NothingNew;
            }
        };

        let changed = store.apply_update(&partial);
        store.confirm(&partial, self.inner.device.kind.writable_fields());
        if !changed.is_empty() {
            debug!(device = %self.id(), %transport, changed = ?changed, "state updated");
        }
        self.inner.projector.push_all(&store.snapshot_for_push());
        RefreshOutcome::Updated { transport, changed }
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// Queue a desired value. No I/O; the debounce task flushes it.
    pub fn request_change(&self, field: Field, value: impl Into<FieldValue>) {
        self.inner.pending.request_change(field, value.into());
    }

    /// Send the pending batch. Waits for any in-flight refresh.
    pub async fn flush_pending_command(&self) -> FlushOutcome {
        let mut store = self.inner.guard.lock().await;
        let Some(pending) = self.inner.pending.take() else {
            return FlushOutcome::Empty;
        };

        let changes: DeviceState = pending
            .changes
            .iter()
            .filter(|(field, value)| store.last_pushed(*field) != Some(*value))
            .map(|(field, value)| (field, value.clone()))
            .collect();
        if changes.is_empty() {
            debug!(device = %self.id(), "pending values already pushed, nothing to send");
            return FlushOutcome::Suppressed;
        }

        let outcome = self.push_locked(&mut store, &changes).await;
        drop(store);
        self.schedule_follow_up();
        outcome
    }

    async fn push_locked(&self, store: &mut DeviceStore, changes: &DeviceState) -> FlushOutcome {
        let device = &self.inner.device;
        let current = store.snapshot_for_push();

        let dispatches = match self.inner.strategy.encode(device, changes, &current) {
            Ok(d) => d,
            Err(e) => {
                error!(device = %self.id(), error = %e, "cannot encode command");
                self.inner.projector.mark_failure(&e);
                return FlushOutcome::Failed;
            }
        };

        let mut results = Vec::with_capacity(dispatches.len());
        for dispatch in &dispatches {
            let result = match self.dispatch(dispatch).await {
                Ok(r) => r,
                Err(e) => {
                    CommandResult::from_error(error_transport(&e), &e).log(self.id());
                    self.inner.projector.mark_failure(&e);
                    return FlushOutcome::Failed;
                }
            };
            result.log(self.id());

            match result.class {
                StatusClass::Success => results.push(result),
                class if class.is_offline() => {
                    self.apply_offline_policy(store, &offline_error(class));
                    return FlushOutcome::Offline(class);
                }
                _ => {
                    if let Err(e) = result.into_result() {
                        self.inner.projector.mark_failure(&e);
                    }
                    return FlushOutcome::Failed;
                }
            }
        }

        info!(
            device = %self.id(),
            fields = ?changes.fields().collect::<Vec<_>>(),
            commands = results.len(),
            "change pushed"
        );
        let settled = self.inner.strategy.settle(device, changes, &current);
        store.confirm(&settled, device.kind.writable_fields());
        store.apply_update(&settled);
        self.inner.projector.push_all(&store.snapshot_for_push());
        FlushOutcome::Pushed(results)
    }

    /// Send one command: BLE when configured and the archetype has a frame,
    /// cloud otherwise or as fallback.
    async fn dispatch(&self, dispatch: &Dispatch) -> Result<CommandResult, CoreError> {
        let device = &self.inner.device;

        if device.transport.ble_enabled()
            && let (Some(ble), Some(address), Some(frame)) = (
                self.inner.transports.ble.as_ref(),
                device.address,
                dispatch.ble.as_deref(),
            )
        {
            match self.with_ble_retry("write", || ble.write(address, frame)).await {
                Ok(_) => return Ok(CommandResult::ble_ok()),
                Err(e) if self.cloud_available() => {
                    warn!(device = %self.id(), error = %e, "BLE command failed, falling back to cloud");
                }
                Err(e) => return Err(e),
            }
        }

        let Some(cloud) = self.inner.transports.cloud.as_ref().filter(|_| self.cloud_available())
        else {
            return Err(CoreError::TransportUnavailable {
                reason: format!("no transport can send {}", dispatch.cloud.command),
            });
        };
        let response = cloud.command(self.id(), &dispatch.cloud).await?;
        Ok(CommandResult::new(
            Transport::Cloud,
            response.status_code,
            response.message,
        ))
    }

    // ── Policies ─────────────────────────────────────────────────────

    /// Retry retryable BLE failures up to `max_retries` times.
    async fn with_ble_retry<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, CoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let t = &self.inner.device.transport;
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_retryable() && attempt < t.max_retries => {
                    attempt += 1;
                    warn!(
                        device = %self.id(),
                        attempt,
                        max_retries = t.max_retries,
                        error = %e,
                        "BLE {what} failed, retrying"
                    );
                    tokio::time::sleep(t.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Reset to neutral defaults when configured; otherwise surface `cause`.
    fn apply_offline_policy(&self, store: &mut DeviceStore, cause: &CoreError) {
        if self.inner.device.transport.offline {
            let defaults = self.inner.strategy.offline_default();
            store.apply_update(&defaults);
            self.inner.projector.push_all(&store.snapshot_for_push());
            info!(device = %self.id(), "offline defaults applied");
        } else {
            self.inner.projector.mark_failure(cause);
        }
    }

    fn cloud_available(&self) -> bool {
        self.inner.device.transport.cloud_enabled() && self.inner.transports.cloud.is_some()
    }

    fn id(&self) -> &str {
        &self.inner.device.id
    }
}

fn offline_error(class: StatusClass) -> CoreError {
    if class == StatusClass::HubOffline {
        CoreError::HubOffline
    } else {
        CoreError::DeviceOffline
    }
}

fn error_transport(e: &CoreError) -> Transport {
    match e {
        CoreError::Transport { transport, .. } | CoreError::TransportTimeout { transport } => {
            *transport
        }
        _ => Transport::Cloud,
    }
}
