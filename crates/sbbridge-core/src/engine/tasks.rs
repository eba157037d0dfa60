// ── Background tasks ──
//
// `start()` spawns the periodic refresh, the debounce loop, the webhook
// consumer and the context-cache writer. All of them stop on the engine's
// cancellation token.

use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::{MissedTickBehavior, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{DeviceEngine, RefreshOutcome};
use crate::model::Payload;

impl DeviceEngine {
    /// Spawn the engine's background tasks. The first refresh runs at once.
    pub async fn start(&self) {
        let cancel = self.inner.cancel.clone();
        let mut handles = self.inner.task_handles.lock().await;

        handles.push(tokio::spawn(refresh_task(
            self.clone(),
            self.inner.device.transport.refresh_rate,
            cancel.clone(),
        )));
        handles.push(tokio::spawn(debounce_task(self.clone(), cancel.clone())));

        if let Some(router) = &self.inner.transports.webhook {
            let rx = router.register(&self.inner.device.id, self.inner.device.address);
            handles.push(tokio::spawn(webhook_task(self.clone(), rx, cancel.clone())));
        }
        if self.inner.transports.cache.is_some() {
            handles.push(tokio::spawn(cache_task(self.clone(), cancel)));
        }

        info!(
            device = %self.inner.device.id,
            kind = %self.inner.device.kind,
            connection = %self.inner.device.transport.connection_type,
            "device engine started"
        );
    }

    /// Stop every task and discard any pending command.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        self.inner.pending.clear();

        if let Some(router) = &self.inner.transports.webhook {
            router.unregister(&self.inner.device.id, self.inner.device.address);
        }
        if let Some(handle) = self.take_follow_up() {
            handle.abort();
        }

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        debug!(device = %self.inner.device.id, "device engine stopped");
    }

    /// Replace any scheduled follow-up refresh with a new one.
    pub(super) fn schedule_follow_up(&self) {
        let engine = self.clone();
        let cancel = self.inner.cancel.clone();
        let delay = self.inner.device.transport.follow_up_delay;

        let handle = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {}
                _ = sleep(delay) => {
                    debug!(device = %engine.inner.device.id, "follow-up refresh");
                    engine.refresh().await;
                }
            }
        });

        let previous = self
            .inner
            .follow_up
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    fn take_follow_up(&self) -> Option<tokio::task::JoinHandle<()>> {
        self.inner
            .follow_up
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take()
    }
}

/// Refresh now, then every `period`. Ticks that find the device busy are
/// skipped.
async fn refresh_task(engine: DeviceEngine, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                if engine.try_refresh().await == RefreshOutcome::Failed {
                    warn!(device = %engine.inner.device.id, "periodic refresh failed");
                }
            }
        }
    }
}

/// Wait for a write, then flush once `push_rate` passes without another.
async fn debounce_task(engine: DeviceEngine, cancel: CancellationToken) {
    let pending = engine.inner.pending.clone();
    let window = engine.inner.device.transport.push_rate;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = pending.written() => {}
        }

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                _ = pending.written() => continue,
                _ = sleep(window) => break,
            }
        }

        let outcome = engine.flush_pending_command().await;
        debug!(device = %engine.inner.device.id, ?outcome, "flush finished");
    }
}

async fn webhook_task(
    engine: DeviceEngine,
    mut rx: mpsc::Receiver<Value>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            context = rx.recv() => {
                let Some(context) = context else { break };
                engine.ingest(Payload::Webhook(context)).await;
            }
        }
    }
}

/// Persist every new snapshot to the context cache.
async fn cache_task(engine: DeviceEngine, cancel: CancellationToken) {
    let Some(cache) = engine.inner.transports.cache.clone() else {
        return;
    };
    let mut rx = engine.subscribe();

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = rx.borrow_and_update().state.clone();
                let (cache, id) = (cache.clone(), engine.inner.device.id.clone());
                match tokio::task::spawn_blocking(move || cache.store(&id, &state)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        warn!(device = %engine.inner.device.id, error = %e, "context cache write failed");
                    }
                    Err(e) => {
                        warn!(device = %engine.inner.device.id, error = %e, "context cache writer panicked");
                    }
                }
            }
        }
    }
}
