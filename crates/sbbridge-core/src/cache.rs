// ── Persisted device context ──
//
// A JSON file mapping device id → last known `DeviceState`. Read once at
// startup to seed each store, rewritten whenever a device's state changes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::error::CoreError;
use crate::model::DeviceState;

#[derive(Debug)]
pub struct ContextCache {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, DeviceState>>,
}

impl ContextCache {
    /// Open the cache at `path`. A missing file starts empty; an unreadable
    /// one is logged and ignored.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "discarding corrupt context cache");
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read context cache");
                BTreeMap::new()
            }
        };
        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, device_id: &str) -> Option<DeviceState> {
        self.lock().get(device_id).cloned()
    }

    /// Record `state` for `device_id` and rewrite the file. Blocking; the
    /// guard is held until the rename so concurrent writers never overwrite
    /// a newer map with an older one.
    pub fn store(&self, device_id: &str, state: &DeviceState) -> Result<(), CoreError> {
        let mut entries = self.lock();
        if entries.get(device_id) == Some(state) {
            return Ok(());
        }
        entries.insert(device_id.to_owned(), state.clone());
        let json =
            serde_json::to_string_pretty(&*entries).map_err(|e| CoreError::Cache(e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CoreError::Cache(e.to_string()))?;
        }
        // Write-then-rename so a crash never leaves a truncated file.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| CoreError::Cache(e.to_string()))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| CoreError::Cache(e.to_string()))?;
        drop(entries);

        debug!(device = device_id, path = %self.path.display(), "context cache written");
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, DeviceState>> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::Field;

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ContextCache::open(dir.path().join("context.json"));
        assert!(cache.get("L1").is_none());
    }

    #[test]
    fn store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("context.json");

        let cache = ContextCache::open(&path);
        let state = DeviceState::new()
            .with(Field::LockCurrentState, 1_i64)
            .with(Field::BatteryLevel, 88_i64);
        cache.store("L1", &state).unwrap();

        let reopened = ContextCache::open(&path);
        assert_eq!(reopened.get("L1"), Some(state));
    }

    #[test]
    fn concurrent_writers_keep_every_device() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("context.json");
        let cache = std::sync::Arc::new(ContextCache::open(&path));

        let writers: Vec<_> = (0..8_i64)
            .map(|i| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for level in 0..20_i64 {
                        let state = DeviceState::new().with(Field::BatteryLevel, i * 100 + level);
                        cache.store(&format!("D{i}"), &state).unwrap();
                    }
                })
            })
            .collect();
        for w in writers {
            w.join().unwrap();
        }

        let reopened = ContextCache::open(&path);
        for i in 0..8_i64 {
            assert_eq!(
                reopened.get(&format!("D{i}")),
                Some(DeviceState::new().with(Field::BatteryLevel, i * 100 + 19))
            );
        }
    }

    #[test]
    fn corrupt_file_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("context.json");
        std::fs::write(&path, "{ not json").unwrap();

        let cache = ContextCache::open(&path);
        assert!(cache.get("L1").is_none());
    }
}
