use super::{AudioEngine, EngineFactory};
use crate::domain::MediaItem;
use crate::error::EngineError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::time::Instant;

#[derive(Debug, Default)]
struct Counters {
    created: AtomicUsize,
    live: AtomicUsize,
}

/// Builds [`NullEngine`]s and keeps instance counters.
///
/// Used for `--no-audio` runs and by tests.
#[derive(Debug, Default)]
pub struct NullEngineFactory {
    counters: Arc<Counters>,
    default_duration_ms: Option<u64>,
    fail_create: AtomicBool,
}

impl NullEngineFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Duration assumed for items that carry no duration hint.
    pub fn with_default_duration_ms(mut self, ms: u64) -> Self {
        self.default_duration_ms = Some(ms);
        self
    }

    /// Makes subsequent `create` calls fail.
    pub fn set_fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn created_instances(&self) -> usize {
        self.counters.created.load(Ordering::SeqCst)
    }

    /// Instances created and not yet released.
    pub fn live_instances(&self) -> usize {
        self.counters.live.load(Ordering::SeqCst)
    }

    /// Like [`EngineFactory::create`], without boxing.
    pub fn create_engine(&self) -> Result<NullEngine, EngineError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(EngineError::Init("null engine creation disabled".to_owned()));
        }
        self.counters.created.fetch_add(1, Ordering::SeqCst);
        self.counters.live.fetch_add(1, Ordering::SeqCst);
        Ok(NullEngine {
            counters: Arc::clone(&self.counters),
            default_duration_ms: self.default_duration_ms,
            item: None,
            duration_ms: None,
            play_when_ready: false,
            base_ms: 0,
            resumed_at: None,
            volume: 1.0,
            skip_silence: false,
            released: false,
        })
    }
}

impl EngineFactory for NullEngineFactory {
    fn create(&self) -> Result<Box<dyn AudioEngine>, EngineError> {
        Ok(Box::new(self.create_engine()?))
    }
}

/// Engine without output. Position follows the tokio clock, so paused
/// test time drives it deterministically.
#[derive(Debug)]
pub struct NullEngine {
    counters: Arc<Counters>,
    default_duration_ms: Option<u64>,
    item: Option<MediaItem>,
    duration_ms: Option<u64>,
    play_when_ready: bool,
    base_ms: u64,
    resumed_at: Option<Instant>,
    volume: f32,
    skip_silence: bool,
    released: bool,
}

impl NullEngine {
    pub fn skip_silence(&self) -> bool {
        self.skip_silence
    }

    fn raw_position_ms(&self) -> u64 {
        let running = self
            .resumed_at
            .map(|at| at.elapsed().as_millis() as u64)
            .unwrap_or(0);
        self.base_ms.saturating_add(running)
    }

    fn freeze(&mut self) {
        self.base_ms = self.position_ms();
        self.resumed_at = None;
    }
}

impl AudioEngine for NullEngine {
    fn load_item(&mut self, item: &MediaItem) -> Result<(), EngineError> {
        if self.released {
            return Err(EngineError::Released);
        }
        if item.uri.trim().is_empty() {
            return Err(EngineError::load(&item.id, "empty uri"));
        }
        self.item = Some(item.clone());
        self.duration_ms = item.duration_ms.or(self.default_duration_ms);
        self.base_ms = 0;
        self.resumed_at = self.play_when_ready.then(Instant::now);
        Ok(())
    }

    fn play(&mut self) {
        self.play_when_ready = true;
        if self.resumed_at.is_none() && self.item.is_some() {
            self.resumed_at = Some(Instant::now());
        }
    }

    fn pause(&mut self) {
        self.play_when_ready = false;
        self.freeze();
    }

    fn seek(&mut self, position_ms: u64) -> Result<(), EngineError> {
        if self.item.is_none() {
            return Err(EngineError::Seek {
                position_ms,
                reason: "nothing loaded".to_owned(),
            });
        }
        self.base_ms = match self.duration_ms {
            Some(d) => position_ms.min(d),
            None => position_ms,
        };
        self.resumed_at = self.play_when_ready.then(Instant::now);
        Ok(())
    }

    fn position_ms(&self) -> u64 {
        let pos = self.raw_position_ms();
        match self.duration_ms {
            Some(d) => pos.min(d),
            None => pos,
        }
    }

    fn duration_ms(&self) -> Option<u64> {
        self.duration_ms
    }

    fn is_playing(&self) -> bool {
        self.play_when_ready && self.item.is_some() && !self.has_ended()
    }

    fn has_ended(&self) -> bool {
        match (self.item.as_ref(), self.duration_ms) {
            (Some(_), Some(d)) => self.raw_position_ms() >= d,
            _ => false,
        }
    }

    fn current_item(&self) -> Option<&MediaItem> {
        self.item.as_ref()
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    fn set_skip_silence(&mut self, enabled: bool) {
        self.skip_silence = enabled;
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.item = None;
        self.resumed_at = None;
        self.counters.live.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Drop for NullEngine {
    fn drop(&mut self) {
        self.release();
    }
}
