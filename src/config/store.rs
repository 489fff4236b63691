use super::backend::{ConfigBackend, JsonFileBackend, MemoryBackend};
use super::keys::Preferences;
use crate::error::ConfigError;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, watch};

/// Change feed over [`Preferences`].
///
/// Point lookups read the latest value; subscribers get a `watch`
/// receiver and always observe the newest state. Writes go to the
/// backend off the async executor, one at a time, so the last write
/// always carries the newest state.
#[derive(Clone)]
pub struct ConfigStore {
    tx: Arc<watch::Sender<Preferences>>,
    backend: Arc<dyn ConfigBackend>,
    save_lock: Arc<Mutex<()>>,
}

impl ConfigStore {
    pub fn open(backend: Arc<dyn ConfigBackend>) -> Self {
        let prefs = backend.load();
        let (tx, _rx) = watch::channel(prefs);
        Self {
            tx: Arc::new(tx),
            backend,
            save_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn json(data_dir: &Path) -> Self {
        Self::open(Arc::new(JsonFileBackend::new(data_dir)))
    }

    /// Store backed by memory; the returned backend exposes the writes.
    pub fn in_memory(initial: Preferences) -> (Self, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new(initial));
        (Self::open(backend.clone()), backend)
    }

    pub fn get(&self) -> Preferences {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Preferences> {
        self.tx.subscribe()
    }

    /// Applies `f` and persists the result if anything changed.
    ///
    /// Subscribers are only notified on a real change.
    pub async fn update(&self, f: impl FnOnce(&mut Preferences)) -> Result<bool, ConfigError> {
        let changed = self.tx.send_if_modified(|prefs| {
            let before = prefs.clone();
            f(prefs);
            *prefs != before
        });
        if !changed {
            return Ok(false);
        }

        let _saving = self.save_lock.lock().await;
        let prefs = self.get();
        let backend = Arc::clone(&self.backend);
        tokio::task::spawn_blocking(move || backend.save(&prefs)).await??;
        tracing::debug!("config persisted");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_update_notifies_and_persists_only_on_change() {
        let (store, backend) = ConfigStore::in_memory(Preferences::default());
        let mut rx = store.subscribe();

        let changed = store.update(|p| p.skip_silence = true).await.unwrap();
        assert!(changed);
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().skip_silence);

        let changed = store.update(|p| p.skip_silence = true).await.unwrap();
        assert!(!changed);
        assert!(!rx.has_changed().unwrap());
        assert_eq!(backend.writes().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_updates_leave_newest_state_saved() {
        let (store, backend) = ConfigStore::in_memory(Preferences::default());
        let tasks: Vec<_> = (1..=20u32)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .update(|p| p.player_volume = i as f32 / 20.0)
                        .await
                        .unwrap();
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(backend.writes().last(), Some(&store.get()));
    }

    #[tokio::test]
    async fn test_json_store_reloads_written_values() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ConfigStore::json(dir.path());
        store
            .update(|p| p.crossfade_duration_secs = 9)
            .await
            .expect("update");

        let reopened = ConfigStore::json(dir.path());
        assert_eq!(reopened.get().crossfade_duration_secs, 9);
    }
}
