use crate::domain::{MediaItem, MediaMetadata, PlaybackQueue};
use crate::playback::CrossfadePolicy;
use tokio::sync::oneshot;

#[derive(Debug)]
pub enum PlayerCommand {
    PlayQueue {
        queue: PlaybackQueue,
        play_when_ready: bool,
    },
    Play,
    Pause,
    TogglePause,
    Stop,
    Next,
    Previous,
    SeekToMs(u64),
    SetVolume(f32),
    SetAutomix(Vec<MediaItem>),
    ToggleLike,
    ToggleLibrary,
    Snapshot(oneshot::Sender<PlayerSnapshot>),
    Shutdown(oneshot::Sender<()>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    NowPlaying {
        item: MediaItem,
        index: usize,
        duration_ms: Option<u64>,
    },
    Paused(bool),
    Stopped,
    Progress {
        position_ms: u64,
        duration_ms: Option<u64>,
    },
    MetadataChanged(MediaMetadata),
    CrossfadeStarted {
        next: MediaItem,
    },
    CrossfadeFinished {
        item: MediaItem,
    },
    /// Main queue and automix are exhausted.
    QueueEnded,
    LikeChanged {
        id: String,
        liked: bool,
    },
    LibraryChanged {
        id: String,
        in_library: bool,
    },
    Error(String),
}

/// Read-only view of the actor state.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSnapshot {
    pub queue: PlaybackQueue,
    pub automix: Vec<MediaItem>,
    pub current: Option<MediaItem>,
    pub metadata: Option<MediaMetadata>,
    pub position_ms: u64,
    pub duration_ms: Option<u64>,
    pub playing: bool,
    pub player_volume: f32,
    pub normalization_factor: f32,
    /// Volume the primary engine is at right now.
    pub engine_volume: f32,
    pub skip_silence: bool,
    pub crossfade: CrossfadePolicy,
    pub crossfading: bool,
}
