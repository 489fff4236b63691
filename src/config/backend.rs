use super::keys::Preferences;
use crate::error::ConfigError;
use crate::fsutil::write_atomic;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const SETTINGS_FILE: &str = "settings.json";

/// Durable storage behind the configuration feed.
pub trait ConfigBackend: Send + Sync + 'static {
    /// Never fails: unreadable storage reads as defaults.
    fn load(&self) -> Preferences;
    fn save(&self, prefs: &Preferences) -> Result<(), ConfigError>;
}

/// Flat JSON object in `{data_dir}/settings.json`.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(SETTINGS_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigBackend for JsonFileBackend {
    fn load(&self) -> Preferences {
        let Ok(bytes) = fs::read(&self.path) else {
            return Preferences::default();
        };
        match serde_json::from_slice::<serde_json::Value>(&bytes) {
            Ok(v) => Preferences::from_value(&v),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), err = %e, "settings file unreadable, using defaults");
                Preferences::default()
            }
        }
    }

    fn save(&self, prefs: &Preferences) -> Result<(), ConfigError> {
        let bytes = serde_json::to_vec_pretty(&prefs.to_value())?;
        write_atomic(&self.path, &bytes)?;
        Ok(())
    }
}

/// Keeps preferences in memory and records every write.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    initial: Preferences,
    writes: Mutex<Vec<Preferences>>,
}

impl MemoryBackend {
    pub fn new(initial: Preferences) -> Self {
        Self {
            initial,
            writes: Mutex::new(Vec::new()),
        }
    }

    pub fn writes(&self) -> Vec<Preferences> {
        self.writes
            .lock()
            .map(|w| w.clone())
            .unwrap_or_default()
    }
}

impl ConfigBackend for MemoryBackend {
    fn load(&self) -> Preferences {
        self.writes
            .lock()
            .ok()
            .and_then(|w| w.last().cloned())
            .unwrap_or_else(|| self.initial.clone())
    }

    fn save(&self, prefs: &Preferences) -> Result<(), ConfigError> {
        self.writes
            .lock()
            .map_err(|_| ConfigError::Poisoned("memory backend"))?
            .push(prefs.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_backend_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let backend = JsonFileBackend::new(dir.path());

        let prefs = Preferences {
            crossfade_enabled: true,
            crossfade_duration_secs: 5,
            player_volume: 0.42,
            presence_token: Some("abc".to_owned()),
            ..Preferences::default()
        };
        backend.save(&prefs).expect("save");
        assert_eq!(backend.load(), prefs);
    }

    #[test]
    fn test_json_backend_corrupt_file_falls_back_to_default() {
        let dir = tempfile::tempdir().expect("tempdir");
        let backend = JsonFileBackend::new(dir.path());
        fs::write(backend.path(), b"{not-json").expect("write");
        assert_eq!(backend.load(), Preferences::default());
    }

    #[test]
    fn test_memory_backend_reports_poisoned_lock() {
        let backend = std::sync::Arc::new(MemoryBackend::new(Preferences::default()));
        let shared = std::sync::Arc::clone(&backend);
        let _ = std::thread::spawn(move || {
            let _guard = shared.writes.lock().unwrap();
            panic!("writer crashed");
        })
        .join();

        let err = backend.save(&Preferences::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Poisoned(_)));
    }

    #[test]
    fn test_memory_backend_records_writes() {
        let backend = MemoryBackend::new(Preferences::default());
        let mut p = Preferences::default();
        p.skip_silence = true;
        backend.save(&p).unwrap();
        assert_eq!(backend.writes().len(), 1);
        assert!(backend.load().skip_silence);
    }
}
