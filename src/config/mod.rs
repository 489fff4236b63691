//! Live key/value configuration feed.

mod backend;
mod keys;
mod store;

use directories::ProjectDirs;
use std::path::PathBuf;

pub use backend::{ConfigBackend, JsonFileBackend, MemoryBackend};
pub use keys::{ConfigKey, Preferences};
pub use store::ConfigStore;

/// Directory holding settings, queue snapshots and logs.
pub fn resolve_data_dir(explicit: Option<PathBuf>) -> PathBuf {
    explicit.unwrap_or_else(|| {
        ProjectDirs::from("dev", "playback", "playback-core")
            .map(|p| p.data_local_dir().to_path_buf())
            .unwrap_or_else(|| std::env::temp_dir().join("playback-core"))
    })
}
