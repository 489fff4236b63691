//! Audio engine seam.
//!
//! The core drives engines only through [`AudioEngine`]; new instances
//! come from an [`EngineFactory`] so the crossfade engine can build a
//! secondary player without knowing the backend.

mod null_engine;
mod rodio_engine;

use crate::domain::MediaItem;
use crate::error::EngineError;

pub use null_engine::{NullEngine, NullEngineFactory};
pub use rodio_engine::{RodioEngine, RodioEngineFactory};

/// One playback instance holding at most one media item.
pub trait AudioEngine: Send {
    /// Replaces the loaded item and rewinds to 0. Keeps the play/pause
    /// intent.
    fn load_item(&mut self, item: &MediaItem) -> Result<(), EngineError>;
    fn play(&mut self);
    fn pause(&mut self);
    fn seek(&mut self, position_ms: u64) -> Result<(), EngineError>;
    fn position_ms(&self) -> u64;
    /// `None` while unknown.
    fn duration_ms(&self) -> Option<u64>;
    /// True when playback is requested and the item has not ended.
    fn is_playing(&self) -> bool;
    fn has_ended(&self) -> bool;
    fn current_item(&self) -> Option<&MediaItem>;
    fn volume(&self) -> f32;
    /// Clamped to `[0, 1]`.
    fn set_volume(&mut self, volume: f32);
    fn set_skip_silence(&mut self, enabled: bool);
    /// Frees backend resources. Idempotent.
    fn release(&mut self);
}

pub trait EngineFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn AudioEngine>, EngineError>;
}
