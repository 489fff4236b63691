use super::{AudioEngine, EngineFactory};
use crate::domain::MediaItem;
use crate::error::EngineError;
use rodio::mixer::Mixer;
use rodio::{Decoder, Sink, Source};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::time::Duration;

/// Builds engines that play local files through a shared output mixer.
///
/// The output stream itself is owned by the caller and must outlive
/// every engine.
#[derive(Clone)]
pub struct RodioEngineFactory {
    mixer: Mixer,
}

impl RodioEngineFactory {
    pub fn new(mixer: Mixer) -> Self {
        Self { mixer }
    }
}

impl EngineFactory for RodioEngineFactory {
    fn create(&self) -> Result<Box<dyn AudioEngine>, EngineError> {
        Ok(Box::new(RodioEngine::new(self.mixer.clone())))
    }
}

pub struct RodioEngine {
    mixer: Mixer,
    sink: Option<Sink>,
    item: Option<MediaItem>,
    duration_ms: Option<u64>,
    play_when_ready: bool,
    volume: f32,
    skip_silence: bool,
    released: bool,
}

impl RodioEngine {
    fn new(mixer: Mixer) -> Self {
        Self {
            mixer,
            sink: None,
            item: None,
            duration_ms: None,
            play_when_ready: false,
            volume: 1.0,
            skip_silence: false,
            released: false,
        }
    }

    fn stop_current(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
    }
}

fn item_path(item: &MediaItem) -> PathBuf {
    PathBuf::from(item.uri.strip_prefix("file://").unwrap_or(&item.uri))
}

impl AudioEngine for RodioEngine {
    fn load_item(&mut self, item: &MediaItem) -> Result<(), EngineError> {
        if self.released {
            return Err(EngineError::Released);
        }
        self.stop_current();

        let path = item_path(item);
        let file = File::open(&path).map_err(|e| EngineError::load(&item.id, e))?;
        let decoder = Decoder::new(BufReader::new(file)).map_err(|e| EngineError::load(&item.id, e))?;
        let duration_ms = decoder
            .total_duration()
            .map(|d| d.as_millis() as u64)
            .or(item.duration_ms);

        let sink = Sink::connect_new(&self.mixer);
        sink.set_volume(self.volume);
        if !self.play_when_ready {
            sink.pause();
        }
        sink.append(decoder);

        tracing::debug!(item_id = %item.id, path = %path.display(), ?duration_ms, "rodio item loaded");
        self.sink = Some(sink);
        self.item = Some(item.clone());
        self.duration_ms = duration_ms;
        Ok(())
    }

    fn play(&mut self) {
        self.play_when_ready = true;
        if let Some(sink) = self.sink.as_ref() {
            sink.play();
        }
    }

    fn pause(&mut self) {
        self.play_when_ready = false;
        if let Some(sink) = self.sink.as_ref() {
            sink.pause();
        }
    }

    fn seek(&mut self, position_ms: u64) -> Result<(), EngineError> {
        let Some(sink) = self.sink.as_ref() else {
            return Err(EngineError::Seek {
                position_ms,
                reason: "nothing loaded".to_owned(),
            });
        };
        sink.try_seek(Duration::from_millis(position_ms))
            .map_err(|e| EngineError::Seek {
                position_ms,
                reason: e.to_string(),
            })
    }

    fn position_ms(&self) -> u64 {
        self.sink
            .as_ref()
            .map(|s| s.get_pos().as_millis() as u64)
            .unwrap_or(0)
    }

    fn duration_ms(&self) -> Option<u64> {
        self.duration_ms
    }

    fn is_playing(&self) -> bool {
        self.play_when_ready && !self.has_ended() && self.sink.is_some()
    }

    fn has_ended(&self) -> bool {
        self.sink.as_ref().is_some_and(|s| s.empty())
    }

    fn current_item(&self) -> Option<&MediaItem> {
        self.item.as_ref()
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        if let Some(sink) = self.sink.as_ref() {
            sink.set_volume(self.volume);
        }
    }

    fn set_skip_silence(&mut self, enabled: bool) {
        // rodio has no silence trimming; the flag is kept for reporting.
        if enabled && !self.skip_silence {
            tracing::debug!("skip_silence requested, not supported by the rodio backend");
        }
        self.skip_silence = enabled;
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.stop_current();
        self.item = None;
    }
}

impl Drop for RodioEngine {
    fn drop(&mut self) {
        self.release();
    }
}
