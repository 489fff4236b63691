use super::handle::OrchestratorHandle;
use super::messages::{PlayerCommand, PlayerEvent, PlayerSnapshot};
use crate::collab::Collaborators;
use crate::config::ConfigStore;
use crate::domain::{MediaItem, MediaMetadata, PlaybackQueue};
use crate::engine::{AudioEngine, EngineFactory};
use crate::error::{CollabError, EngineError};
use crate::persist::{PersistedQueueSnapshot, QueueStore};
use crate::playback::{CrossfadeEngine, CrossfadeOutcome, VolumePipeline};
use crate::sync::{BusTiming, LyricsPrefetcher, PresenceDriver, SettingsEffect, SettingsSyncBus};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::select;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// `previous` rewinds the current item instead when past this offset.
const RESTART_THRESHOLD_MS: u64 = 3_000;
const AUTOMIX_TITLE: &str = "Automix";

#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Where queue snapshots are kept.
    pub data_dir: PathBuf,
    pub poll_interval: Duration,
    pub persist_interval: Duration,
    pub bus: BusTiming,
    pub presence_track_delay: Duration,
}

impl OrchestratorOptions {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            poll_interval: Duration::from_millis(500),
            persist_interval: Duration::from_secs(30),
            bus: BusTiming::default(),
            presence_track_delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum LibraryToggle {
    Like,
    InLibrary,
}

/// Results of work done off the actor loop.
#[derive(Debug)]
enum Background {
    Metadata {
        id: String,
        metadata: Option<MediaMetadata>,
    },
    Library {
        id: String,
        toggle: LibraryToggle,
        result: Result<bool, CollabError>,
    },
}

/// Starts the playback actor on the current tokio runtime.
///
/// The persisted queue (if enabled) is restored paused before the first
/// command is handled.
pub fn spawn_orchestrator(
    factory: Arc<dyn EngineFactory>,
    config: ConfigStore,
    collab: Collaborators,
    options: OrchestratorOptions,
) -> Result<(OrchestratorHandle, mpsc::Receiver<PlayerEvent>), EngineError> {
    let primary = factory.create()?;
    let (tx_cmd, rx_cmd) = mpsc::channel::<PlayerCommand>(64);
    let (tx_evt, rx_evt) = mpsc::channel::<PlayerEvent>(256);

    let orchestrator = Orchestrator::new(primary, factory, config, collab, options, tx_evt, rx_cmd);
    tokio::spawn(orchestrator.run());
    Ok((OrchestratorHandle::new(tx_cmd), rx_evt))
}

struct Orchestrator {
    primary: Box<dyn AudioEngine>,
    crossfade: CrossfadeEngine,
    volume: VolumePipeline,
    volume_tx: watch::Sender<f32>,
    skip_silence: bool,

    queue: PlaybackQueue,
    automix: Vec<MediaItem>,
    metadata: Option<MediaMetadata>,
    /// Item id the current metadata belongs to.
    metadata_for: Option<String>,
    /// Set once `QueueEnded` was sent for the current item.
    ended_reported: bool,
    /// Item whose crossfade failed to start; not retried for it.
    crossfade_blocked: Option<String>,
    /// Set when the current item failed to load, holding the play intent
    /// it was loaded with. The next poll skips past it.
    failed_load: Option<bool>,

    config: ConfigStore,
    store: QueueStore,
    collab: Collaborators,
    bus: SettingsSyncBus,
    presence: PresenceDriver,
    lyrics: LyricsPrefetcher,
    options: OrchestratorOptions,

    tx_evt: mpsc::Sender<PlayerEvent>,
    rx_cmd: mpsc::Receiver<PlayerCommand>,
    rx_settings: mpsc::Receiver<SettingsEffect>,
    tx_bg: mpsc::Sender<Background>,
    rx_bg: mpsc::Receiver<Background>,

    metadata_job: Option<JoinHandle<()>>,
    library_jobs: Vec<JoinHandle<()>>,
    save_job: Option<JoinHandle<()>>,
}

impl Orchestrator {
    fn new(
        mut primary: Box<dyn AudioEngine>,
        factory: Arc<dyn EngineFactory>,
        config: ConfigStore,
        collab: Collaborators,
        options: OrchestratorOptions,
        tx_evt: mpsc::Sender<PlayerEvent>,
        rx_cmd: mpsc::Receiver<PlayerCommand>,
    ) -> Self {
        let prefs = config.get();

        let volume = VolumePipeline::new(prefs.player_volume, prefs.normalize_audio);
        let mut crossfade = CrossfadeEngine::new(factory);
        crossfade.update_settings(prefs.crossfade_enabled, prefs.crossfade_duration_secs);
        crossfade.set_level(volume.output(), primary.as_mut());
        primary.set_volume(volume.output());
        primary.set_skip_silence(prefs.skip_silence);

        let (volume_tx, volume_rx) = watch::channel(volume.player_volume());
        let (tx_settings, rx_settings) = mpsc::channel(32);
        let bus = SettingsSyncBus::spawn(&config, volume_rx, tx_settings, options.bus);
        let (tx_bg, rx_bg) = mpsc::channel(32);

        let presence = PresenceDriver::new(Arc::clone(&collab.presence), options.presence_track_delay);
        let mut lyrics = LyricsPrefetcher::new(Arc::clone(&collab.lyrics));
        lyrics.set_enabled(prefs.show_lyrics, None);

        Self {
            primary,
            crossfade,
            volume,
            volume_tx,
            skip_silence: prefs.skip_silence,
            queue: PlaybackQueue::default(),
            automix: Vec::new(),
            metadata: None,
            metadata_for: None,
            ended_reported: false,
            crossfade_blocked: None,
            failed_load: None,
            store: QueueStore::new(&options.data_dir),
            config,
            collab,
            bus,
            presence,
            lyrics,
            options,
            tx_evt,
            rx_cmd,
            rx_settings,
            tx_bg,
            rx_bg,
            metadata_job: None,
            library_jobs: Vec::new(),
            save_job: None,
        }
    }

    async fn run(mut self) {
        self.restore().await;

        let mut poll = tokio::time::interval(self.options.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let persist_every = self.options.persist_interval;
        let mut persist = tokio::time::interval_at(Instant::now() + persist_every, persist_every);
        persist.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let fade_at = self.crossfade.next_deadline();
            select! {
                biased;
                _ = tokio::time::sleep_until(fade_at.unwrap_or_else(Instant::now)), if fade_at.is_some() => {
                    self.step_crossfade();
                }
                Some(effect) = self.rx_settings.recv() => {
                    self.apply_settings(effect);
                }
                Some(msg) = self.rx_bg.recv() => {
                    self.handle_background(msg);
                }
                maybe_cmd = self.rx_cmd.recv() => {
                    match maybe_cmd {
                        Some(PlayerCommand::Shutdown(ack)) => {
                            self.shutdown().await;
                            let _ = ack.send(());
                            break;
                        }
                        Some(cmd) => self.handle_command(cmd),
                        None => {
                            self.shutdown().await;
                            break;
                        }
                    }
                }
                _ = poll.tick() => {
                    self.poll_engine();
                }
                _ = persist.tick() => {
                    self.persist_in_background();
                }
            }
        }
    }

    async fn restore(&mut self) {
        if !self.config.get().persistent_queue {
            tracing::debug!("persistent queue disabled, not restoring");
            return;
        }
        let restored = match self.store.restore_async().await {
            Ok(restored) => restored,
            Err(e) => {
                tracing::warn!(err = %e, "queue restore failed");
                return;
            }
        };
        if let Some(items) = restored.automix {
            tracing::info!(items = items.len(), "automix restored");
            self.automix = items;
        }
        if let Some(queue) = restored.main {
            tracing::info!(
                items = queue.len(),
                index = queue.current_index,
                position_ms = queue.position_ms,
                "queue restored"
            );
            self.play_queue(queue, false);
        }
    }

    fn handle_command(&mut self, cmd: PlayerCommand) {
        match cmd {
            PlayerCommand::PlayQueue {
                queue,
                play_when_ready,
            } => self.play_queue(queue, play_when_ready),
            PlayerCommand::Play => self.resume(),
            PlayerCommand::Pause => self.pause(),
            PlayerCommand::TogglePause => {
                if self.primary.is_playing() {
                    self.pause();
                } else {
                    self.resume();
                }
            }
            PlayerCommand::Stop => {
                self.cancel_crossfade();
                self.primary.pause();
                let _ = self.primary.seek(0);
                self.ended_reported = false;
                self.emit(PlayerEvent::Stopped);
            }
            PlayerCommand::Next => {
                self.cancel_crossfade();
                if self.commit_upcoming() {
                    self.load_current(true);
                } else {
                    tracing::debug!("next: nothing queued");
                }
            }
            PlayerCommand::Previous => {
                self.cancel_crossfade();
                if self.primary.position_ms() > RESTART_THRESHOLD_MS || self.queue.retreat().is_none() {
                    self.seek(0);
                } else {
                    self.load_current(true);
                }
            }
            PlayerCommand::SeekToMs(position_ms) => {
                self.cancel_crossfade();
                self.seek(position_ms);
            }
            PlayerCommand::SetVolume(volume) => self.set_player_volume(volume),
            PlayerCommand::SetAutomix(items) => {
                // A fade into the old automix head would land on a stale item.
                if !self.queue.has_next() {
                    self.cancel_crossfade();
                }
                tracing::debug!(items = items.len(), "automix replaced");
                self.automix = items;
            }
            PlayerCommand::ToggleLike => self.toggle_library(LibraryToggle::Like),
            PlayerCommand::ToggleLibrary => self.toggle_library(LibraryToggle::InLibrary),
            PlayerCommand::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
            PlayerCommand::Shutdown(_) => {}
        }
    }

    fn play_queue(&mut self, queue: PlaybackQueue, play_when_ready: bool) {
        self.cancel_crossfade();
        tracing::info!(
            title = ?queue.title,
            items = queue.len(),
            index = queue.current_index,
            play_when_ready,
            "queue replaced"
        );
        self.queue = queue;
        self.failed_load = None;
        if self.queue.is_empty() {
            self.primary.pause();
            self.emit(PlayerEvent::Stopped);
            self.refresh_metadata();
            return;
        }
        self.load_current(play_when_ready);
    }

    /// Loads the queue's current item at the queue's start offset.
    fn load_current(&mut self, play: bool) {
        let Some(item) = self.queue.current().cloned() else {
            return;
        };
        let start_ms = self.queue.position_ms;
        if !play {
            self.primary.pause();
        }
        let loaded = self.primary.load_item(&item).and_then(|()| {
            if start_ms > 0 {
                self.primary.seek(start_ms)
            } else {
                Ok(())
            }
        });
        self.primary.set_volume(self.crossfade.level());
        self.ended_reported = false;
        self.crossfade_blocked = None;
        self.failed_load = None;

        match loaded {
            Ok(()) => {
                if play {
                    self.primary.play();
                }
                tracing::info!(item_id = %item.id, title = %item.title, start_ms, play, "item loaded");
                self.emit_now_playing();
            }
            Err(e) => {
                self.primary.pause();
                self.failed_load = Some(play);
                tracing::warn!(item_id = %item.id, err = %e, "failed to load item");
                self.emit(PlayerEvent::Error(e.to_string()));
            }
        }
        self.refresh_metadata();
    }

    fn resume(&mut self) {
        if self.queue.current().is_none() {
            return;
        }
        self.primary.play();
        self.emit(PlayerEvent::Paused(false));
    }

    fn pause(&mut self) {
        self.cancel_crossfade();
        self.primary.pause();
        self.emit(PlayerEvent::Paused(true));
    }

    fn seek(&mut self, position_ms: u64) {
        match self.primary.seek(position_ms) {
            Ok(()) => self.ended_reported = false,
            Err(e) => {
                tracing::warn!(position_ms, err = %e, "seek failed");
                self.emit(PlayerEvent::Error(e.to_string()));
            }
        }
    }

    fn set_player_volume(&mut self, volume: f32) {
        let volume = volume.clamp(0.0, 1.0);
        self.volume_tx.send_if_modified(|current| {
            if *current == volume {
                return false;
            }
            *current = volume;
            true
        });
        if let Some(output) = self.volume.set_player_volume(volume) {
            self.apply_output(output);
        }
    }

    fn apply_output(&mut self, output: f32) {
        self.crossfade.set_level(output, self.primary.as_mut());
        if !self.crossfade.is_active() {
            self.primary.set_volume(output);
        }
    }

    fn cancel_crossfade(&mut self) {
        if self.crossfade.release(self.primary.as_mut()) {
            self.crossfade_blocked = None;
        }
    }

    /// Item that follows the current one: the next queue entry, or the
    /// automix head once the queue is on its last item.
    fn upcoming(&self) -> Option<&MediaItem> {
        self.queue.peek_next().or_else(|| self.automix.first())
    }

    /// Moves the queue cursor to [`Self::upcoming`], promoting automix to
    /// the queue when needed.
    fn commit_upcoming(&mut self) -> bool {
        if self.queue.advance().is_some() {
            return true;
        }
        if self.automix.is_empty() {
            return false;
        }
        let items = std::mem::take(&mut self.automix);
        tracing::info!(items = items.len(), "queue exhausted, continuing with automix");
        self.queue = PlaybackQueue::new(Some(AUTOMIX_TITLE.to_owned()), items);
        true
    }

    fn poll_engine(&mut self) {
        if self.queue.current().is_none() {
            return;
        }
        if let Some(play) = self.failed_load.take() {
            self.on_item_ended(play);
            return;
        }
        let position_ms = self.primary.position_ms();
        let duration_ms = self.primary.duration_ms();
        if self.primary.is_playing() {
            self.emit(PlayerEvent::Progress {
                position_ms,
                duration_ms,
            });
        }
        if self.crossfade.is_active() {
            return;
        }
        if self.primary.has_ended() {
            self.on_item_ended(true);
            return;
        }
        if self.primary.is_playing() {
            self.maybe_start_crossfade(position_ms, duration_ms);
        }
    }

    fn maybe_start_crossfade(&mut self, position_ms: u64, duration_ms: Option<u64>) {
        let Some(next) = self.upcoming().cloned() else {
            return;
        };
        let current_id = self.queue.current().map(|item| item.id.clone());
        if self.crossfade_blocked.is_some() && self.crossfade_blocked == current_id {
            return;
        }
        let position = i64::try_from(position_ms).unwrap_or(i64::MAX);
        let duration = duration_ms.and_then(|d| i64::try_from(d).ok()).unwrap_or(0);
        if !self.crossfade.should_start_crossfade(position, duration) {
            return;
        }
        match self.crossfade.start_crossfade(self.primary.as_mut(), &next) {
            Ok(true) => self.emit(PlayerEvent::CrossfadeStarted { next }),
            Ok(false) => {}
            // Already logged; the item ends with a hard cut.
            Err(_) => self.crossfade_blocked = current_id,
        }
    }

    fn on_item_ended(&mut self, play: bool) {
        if self.commit_upcoming() {
            self.load_current(play);
        } else if !self.ended_reported {
            self.ended_reported = true;
            tracing::info!("queue ended");
            self.emit(PlayerEvent::QueueEnded);
        }
    }

    fn step_crossfade(&mut self) {
        let Some(outcome) = self.crossfade.advance(self.primary.as_mut()) else {
            return;
        };
        match outcome {
            CrossfadeOutcome::Completed { item } => {
                self.commit_upcoming();
                self.ended_reported = false;
                self.crossfade_blocked = None;
                self.emit(PlayerEvent::CrossfadeFinished { item });
                self.emit_now_playing();
                self.refresh_metadata();
            }
            CrossfadeOutcome::HandoffFailed { item, error } => {
                tracing::warn!(item_id = %item.id, err = %error, "falling back to hard cut");
                self.emit(PlayerEvent::Error(error.to_string()));
                self.commit_upcoming();
                self.load_current(true);
            }
        }
    }

    fn apply_settings(&mut self, effect: SettingsEffect) {
        match effect {
            SettingsEffect::Crossfade {
                enabled,
                duration_secs,
            } => self.crossfade.update_settings(enabled, duration_secs),
            SettingsEffect::SkipSilence(enabled) => {
                if self.skip_silence != enabled {
                    tracing::debug!(enabled, "skip silence changed");
                    self.skip_silence = enabled;
                    self.primary.set_skip_silence(enabled);
                }
            }
            SettingsEffect::NormalizeAudio(enabled) => {
                if let Some(output) = self.volume.set_normalize(enabled) {
                    self.apply_output(output);
                }
            }
            SettingsEffect::Presence { token, enabled } => {
                self.presence.configure(token, enabled, self.metadata.clone());
            }
            SettingsEffect::ShowLyrics(enabled) => {
                self.lyrics.set_enabled(enabled, self.metadata.as_ref());
            }
        }
    }

    /// Starts a lookup when the current item id differs from the one the
    /// metadata belongs to. Until it answers, metadata is derived from the
    /// item alone.
    fn refresh_metadata(&mut self) {
        let current = self.queue.current().cloned();
        let id = current.as_ref().map(|item| item.id.clone());
        if id == self.metadata_for {
            return;
        }
        self.metadata_for = id;
        if let Some(job) = self.metadata_job.take() {
            job.abort();
        }
        self.metadata = current.as_ref().map(MediaMetadata::from_item);
        self.on_metadata_changed();

        let Some(item) = current else {
            return;
        };
        let lookup = Arc::clone(&self.collab.metadata);
        let tx = self.tx_bg.clone();
        self.metadata_job = Some(tokio::spawn(async move {
            let metadata = lookup.lookup(&item.id).await;
            let _ = tx
                .send(Background::Metadata {
                    id: item.id,
                    metadata,
                })
                .await;
        }));
    }

    fn on_metadata_changed(&mut self) {
        let loudness_db = self.metadata.as_ref().and_then(|m| m.loudness_db);
        if let Some(output) = self.volume.set_loudness(loudness_db) {
            self.apply_output(output);
        }
        self.presence.track_changed(self.metadata.clone());
        self.lyrics.refresh(self.metadata.as_ref());
        if let Some(metadata) = &self.metadata {
            self.emit(PlayerEvent::MetadataChanged(metadata.clone()));
        }
    }

    fn toggle_library(&mut self, toggle: LibraryToggle) {
        let Some(id) = self.queue.current().map(|item| item.id.clone()) else {
            return;
        };
        let library = Arc::clone(&self.collab.library);
        let tx = self.tx_bg.clone();
        self.library_jobs.retain(|job| !job.is_finished());
        self.library_jobs.push(tokio::spawn(async move {
            let result = match toggle {
                LibraryToggle::Like => library.toggle_like(&id).await,
                LibraryToggle::InLibrary => library.toggle_in_library(&id).await,
            };
            let _ = tx.send(Background::Library { id, toggle, result }).await;
        }));
    }

    fn handle_background(&mut self, msg: Background) {
        match msg {
            Background::Metadata { id, metadata } => {
                if self.metadata_for.as_deref() != Some(id.as_str()) {
                    tracing::debug!(item_id = %id, "dropping stale metadata");
                    return;
                }
                self.metadata_job = None;
                match metadata {
                    Some(metadata) => {
                        self.metadata = Some(metadata);
                        self.on_metadata_changed();
                    }
                    None => tracing::debug!(item_id = %id, "no metadata for item"),
                }
            }
            Background::Library { id, toggle, result } => {
                let value = match result {
                    Ok(value) => value,
                    Err(e) => {
                        tracing::warn!(item_id = %id, ?toggle, err = %e, "library update failed");
                        self.emit(PlayerEvent::Error(e.to_string()));
                        return;
                    }
                };
                if let Some(metadata) = self.metadata.as_mut().filter(|m| m.id == id) {
                    match toggle {
                        LibraryToggle::Like => metadata.liked = value,
                        LibraryToggle::InLibrary => metadata.in_library = value,
                    }
                }
                let evt = match toggle {
                    LibraryToggle::Like => PlayerEvent::LikeChanged { id, liked: value },
                    LibraryToggle::InLibrary => PlayerEvent::LibraryChanged {
                        id,
                        in_library: value,
                    },
                };
                self.emit(evt);
            }
        }
    }

    fn current_position_ms(&self) -> u64 {
        match (self.primary.current_item(), self.queue.current()) {
            (Some(loaded), Some(current)) if loaded.id == current.id => self.primary.position_ms(),
            _ => self.queue.position_ms,
        }
    }

    fn persisted_snapshots(&self) -> (PersistedQueueSnapshot, PersistedQueueSnapshot) {
        (
            PersistedQueueSnapshot::from_queue(&self.queue, self.current_position_ms()),
            PersistedQueueSnapshot::from_items(&self.automix),
        )
    }

    fn persist_in_background(&mut self) {
        if !self.config.get().persistent_queue {
            return;
        }
        if self.save_job.as_ref().is_some_and(|job| !job.is_finished()) {
            tracing::debug!("previous queue save still running");
            return;
        }
        let (main, automix) = self.persisted_snapshots();
        let store = self.store.clone();
        self.save_job = Some(tokio::spawn(async move {
            match store.save_all_async(main, automix).await {
                Ok(()) => tracing::debug!("queue saved"),
                Err(e) => tracing::warn!(err = %e, "queue save failed"),
            }
        }));
    }

    fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            queue: self.queue.clone(),
            automix: self.automix.clone(),
            current: self.queue.current().cloned(),
            metadata: self.metadata.clone(),
            position_ms: self.current_position_ms(),
            duration_ms: self.primary.duration_ms(),
            playing: self.primary.is_playing(),
            player_volume: self.volume.player_volume(),
            normalization_factor: self.volume.factor(),
            engine_volume: self.primary.volume(),
            skip_silence: self.skip_silence,
            crossfade: self.crossfade.policy(),
            crossfading: self.crossfade.is_active(),
        }
    }

    fn emit_now_playing(&self) {
        if let Some(item) = self.queue.current() {
            self.emit(PlayerEvent::NowPlaying {
                item: item.clone(),
                index: self.queue.current_index,
                duration_ms: self.primary.duration_ms(),
            });
        }
    }

    fn emit(&self, evt: PlayerEvent) {
        if let Err(mpsc::error::TrySendError::Full(evt)) = self.tx_evt.try_send(evt) {
            tracing::debug!(?evt, "event channel full, dropping event");
        }
    }

    async fn shutdown(&mut self) {
        tracing::info!("orchestrator shutting down");
        self.bus.shutdown();

        if let Some(job) = self.metadata_job.take() {
            job.abort();
        }
        self.lyrics.cancel();
        for job in self.library_jobs.drain(..) {
            job.abort();
        }

        self.cancel_crossfade();

        if let Some(job) = self.save_job.take() {
            let _ = job.await;
        }
        if self.config.get().persistent_queue {
            let (main, automix) = self.persisted_snapshots();
            match self.store.save_all_async(main, automix).await {
                Ok(()) => tracing::info!("queue saved on shutdown"),
                Err(e) => tracing::warn!(err = %e, "final queue save failed"),
            }
        }
        let volume = self.volume.player_volume();
        if let Err(e) = self.config.update(|p| p.player_volume = volume).await {
            tracing::warn!(err = %e, "failed to persist player volume");
        }

        self.presence.shutdown().await;
        self.primary.release();
        self.emit(PlayerEvent::Stopped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::{LocalPresence, MemoryCatalog, PresenceCall};
    use crate::config::Preferences;
    use crate::engine::NullEngineFactory;
    use crate::persist::QueueSlot;

    struct Harness {
        handle: OrchestratorHandle,
        events: mpsc::Receiver<PlayerEvent>,
        factory: Arc<NullEngineFactory>,
        catalog: Arc<MemoryCatalog>,
        presence: Arc<LocalPresence>,
        config: ConfigStore,
        _dir: tempfile::TempDir,
    }

    impl Harness {
        fn start(prefs: Preferences) -> Self {
            let dir = tempfile::tempdir().expect("tempdir");
            Self::start_in(prefs, dir)
        }

        fn start_in(prefs: Preferences, dir: tempfile::TempDir) -> Self {
            let factory = Arc::new(NullEngineFactory::new().with_default_duration_ms(10_000));
            let catalog = Arc::new(MemoryCatalog::new());
            let presence = Arc::new(LocalPresence::new());
            let (config, _backend) = ConfigStore::in_memory(prefs);
            let (handle, events) = spawn_orchestrator(
                factory.clone(),
                config.clone(),
                Collaborators::local(catalog.clone(), presence.clone()),
                OrchestratorOptions::new(dir.path()),
            )
            .expect("spawn");
            Self {
                handle,
                events,
                factory,
                catalog,
                presence,
                config,
                _dir: dir,
            }
        }

        fn drain(&mut self) -> Vec<PlayerEvent> {
            let mut out = Vec::new();
            while let Ok(evt) = self.events.try_recv() {
                out.push(evt);
            }
            out
        }
    }

    fn item(id: &str) -> MediaItem {
        MediaItem::new(id, format!("Song {id}"), format!("/music/{id}.ogg"))
    }

    fn queue(ids: &[&str]) -> PlaybackQueue {
        PlaybackQueue::new(Some("Test".to_owned()), ids.iter().map(|id| item(id)).collect())
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_queue_loads_current_item() {
        let mut h = Harness::start(Preferences::default());
        h.handle
            .play_queue(queue(&["a", "b"]).starting_at(1, 2_000), false)
            .await
            .unwrap();
        let snap = h.handle.snapshot().await.unwrap();
        assert_eq!(snap.current.map(|i| i.id), Some("b".to_owned()));
        assert_eq!(snap.position_ms, 2_000);
        assert!(!snap.playing);
        assert!(h.drain().iter().any(|e| matches!(e, PlayerEvent::NowPlaying { index: 1, .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hard_cut_advances_and_reports_queue_end() {
        let mut h = Harness::start(Preferences::default());
        h.handle.play_queue(queue(&["a", "b"]), true).await.unwrap();

        tokio::time::sleep(Duration::from_millis(10_600)).await;
        let snap = h.handle.snapshot().await.unwrap();
        assert_eq!(snap.current.map(|i| i.id), Some("b".to_owned()));
        assert!(snap.playing);

        tokio::time::sleep(Duration::from_millis(10_600)).await;
        let ended = h
            .drain()
            .into_iter()
            .filter(|e| *e == PlayerEvent::QueueEnded)
            .count();
        assert_eq!(ended, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unloadable_item_is_skipped() {
        let mut h = Harness::start(Preferences::default());
        let items = vec![MediaItem::new("bad", "bad", ""), item("b")];
        h.handle
            .play_queue(PlaybackQueue::new(None, items), true)
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(1_000)).await;
        let snap = h.handle.snapshot().await.unwrap();
        assert_eq!(snap.current.map(|i| i.id), Some("b".to_owned()));
        assert!(snap.playing);
        let events = h.drain();
        assert!(events.iter().any(|e| matches!(e, PlayerEvent::Error(_))));
        assert!(!events.contains(&PlayerEvent::QueueEnded));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unloadable_last_item_ends_queue() {
        let mut h = Harness::start(Preferences::default());
        let items = vec![MediaItem::new("bad", "bad", "")];
        h.handle
            .play_queue(PlaybackQueue::new(None, items), true)
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(3_000)).await;
        let ended = h
            .drain()
            .into_iter()
            .filter(|e| *e == PlayerEvent::QueueEnded)
            .count();
        assert_eq!(ended, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_crossfade_runs_near_track_end() {
        let prefs = Preferences {
            crossfade_enabled: true,
            crossfade_duration_secs: 2,
            ..Preferences::default()
        };
        let mut h = Harness::start(prefs);
        h.handle.play_queue(queue(&["a", "b"]), true).await.unwrap();

        tokio::time::sleep(Duration::from_millis(8_600)).await;
        let snap = h.handle.snapshot().await.unwrap();
        assert!(snap.crossfading);
        assert_eq!(h.factory.live_instances(), 2);

        tokio::time::sleep(Duration::from_millis(2_500)).await;
        let snap = h.handle.snapshot().await.unwrap();
        assert!(!snap.crossfading);
        assert_eq!(snap.current.map(|i| i.id), Some("b".to_owned()));
        assert!((snap.engine_volume - 1.0).abs() < 1e-6);
        assert_eq!(h.factory.live_instances(), 1);

        let events = h.drain();
        assert!(events.contains(&PlayerEvent::CrossfadeStarted { next: item("b") }));
        assert!(events.contains(&PlayerEvent::CrossfadeFinished { item: item("b") }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_seek_during_crossfade_aborts_it() {
        let prefs = Preferences {
            crossfade_enabled: true,
            ..Preferences::default()
        };
        let h = Harness::start(prefs);
        h.handle.play_queue(queue(&["a", "b"]), true).await.unwrap();
        tokio::time::sleep(Duration::from_millis(8_000)).await;
        assert!(h.handle.snapshot().await.unwrap().crossfading);

        h.handle.seek(1_000).await.unwrap();
        let snap = h.handle.snapshot().await.unwrap();
        assert!(!snap.crossfading);
        assert_eq!(snap.current.map(|i| i.id), Some("a".to_owned()));
        assert!((snap.engine_volume - 1.0).abs() < 1e-6);
        assert_eq!(h.factory.live_instances(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_secondary_falls_back_to_hard_cut() {
        let prefs = Preferences {
            crossfade_enabled: true,
            ..Preferences::default()
        };
        let h = Harness::start(prefs);
        h.factory.set_fail_create(true);
        h.handle.play_queue(queue(&["a", "b"]), true).await.unwrap();

        tokio::time::sleep(Duration::from_millis(9_000)).await;
        let snap = h.handle.snapshot().await.unwrap();
        assert!(!snap.crossfading);
        assert!((snap.engine_volume - 1.0).abs() < 1e-6);

        tokio::time::sleep(Duration::from_millis(1_600)).await;
        let snap = h.handle.snapshot().await.unwrap();
        assert_eq!(snap.current.map(|i| i.id), Some("b".to_owned()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_automix_is_promoted_when_queue_runs_out() {
        let mut h = Harness::start(Preferences::default());
        h.handle.play_queue(queue(&["a"]), true).await.unwrap();
        h.handle.set_automix(vec![item("x"), item("y")]).await.unwrap();

        tokio::time::sleep(Duration::from_millis(10_600)).await;
        let snap = h.handle.snapshot().await.unwrap();
        assert_eq!(snap.queue.title.as_deref(), Some(AUTOMIX_TITLE));
        assert_eq!(snap.current.map(|i| i.id), Some("x".to_owned()));
        assert!(snap.automix.is_empty());
        assert!(!h.drain().contains(&PlayerEvent::QueueEnded));
    }

    #[tokio::test(start_paused = true)]
    async fn test_normalization_follows_metadata_loudness() {
        let h = Harness::start(Preferences::default());
        h.catalog.insert(MediaMetadata {
            loudness_db: Some(6.0),
            ..MediaMetadata::from_item(&item("a"))
        });
        h.handle.play_queue(queue(&["a"]), true).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let snap = h.handle.snapshot().await.unwrap();
        assert!((snap.normalization_factor - 0.501).abs() < 0.001);
        assert!((snap.engine_volume - 0.501).abs() < 0.001);

        h.handle.set_volume(0.5).await.unwrap();
        let snap = h.handle.snapshot().await.unwrap();
        assert!((snap.engine_volume - 0.2506).abs() < 0.001);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settings_changes_reach_the_engine() {
        let h = Harness::start(Preferences::default());
        h.config.update(|p| p.skip_silence = true).await.unwrap();
        h.config
            .update(|p| {
                p.crossfade_enabled = true;
                p.crossfade_duration_secs = 5;
            })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let snap = h.handle.snapshot().await.unwrap();
        assert!(snap.skip_silence);
        assert!(snap.crossfade.enabled);
        assert_eq!(snap.crossfade.duration_secs, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_like_refreshes_metadata() {
        let mut h = Harness::start(Preferences::default());
        h.catalog.insert_items([&item("a")]);
        h.handle.play_queue(queue(&["a"]), false).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        h.handle.toggle_like().await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let snap = h.handle.snapshot().await.unwrap();
        assert!(snap.metadata.is_some_and(|m| m.liked));
        assert!(h.drain().contains(&PlayerEvent::LikeChanged {
            id: "a".to_owned(),
            liked: true
        }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_presence_follows_token_and_track() {
        let h = Harness::start(Preferences::default());
        h.handle.play_queue(queue(&["a"]), true).await.unwrap();
        h.config
            .update(|p| p.presence_token = Some("tok".to_owned()))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;

        let calls = h.presence.calls();
        assert_eq!(calls.first(), Some(&PresenceCall::Open("tok".to_owned())));
        assert!(calls.contains(&PresenceCall::Update("a".to_owned())));

        h.handle.shutdown().await.unwrap();
        assert_eq!(h.presence.calls().last(), Some(&PresenceCall::Close));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lyrics_prefetched_for_current_item_when_enabled() {
        let prefs = Preferences {
            show_lyrics: true,
            ..Preferences::default()
        };
        let h = Harness::start(prefs);
        h.handle.play_queue(queue(&["a", "b"]), true).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        h.handle.next().await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(h.catalog.lyrics_fetches(), vec!["a".to_owned(), "b".to_owned()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_persists_and_restore_is_paused() {
        let dir = tempfile::tempdir().expect("tempdir");
        let data_dir = dir.path().to_path_buf();
        let h = Harness::start_in(Preferences::default(), dir);
        h.handle
            .play_queue(queue(&["a", "b", "c"]).starting_at(1, 0), true)
            .await
            .unwrap();
        h.handle.set_automix(vec![item("x")]).await.unwrap();
        tokio::time::sleep(Duration::from_millis(4_000)).await;
        h.handle.shutdown().await.unwrap();
        assert_eq!(h.factory.live_instances(), 0);

        let store = QueueStore::new(&data_dir);
        let saved = store.load(QueueSlot::Main).expect("main slot");
        assert_eq!(saved.index, 1);
        assert_eq!(saved.position_ms, 4_000);

        let Harness { _dir, .. } = h;
        let h = Harness::start_in(Preferences::default(), _dir);
        let snap = h.handle.snapshot().await.unwrap();
        assert_eq!(snap.current.map(|i| i.id), Some("b".to_owned()));
        assert_eq!(snap.position_ms, 4_000);
        assert!(!snap.playing);
        assert_eq!(snap.automix, vec![item("x")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_during_crossfade_releases_both_engines() {
        let prefs = Preferences {
            crossfade_enabled: true,
            ..Preferences::default()
        };
        let h = Harness::start(prefs);
        h.handle.play_queue(queue(&["a", "b"]), true).await.unwrap();
        tokio::time::sleep(Duration::from_millis(8_000)).await;
        assert!(h.handle.snapshot().await.unwrap().crossfading);
        assert_eq!(h.factory.live_instances(), 2);

        h.handle.shutdown().await.unwrap();
        assert_eq!(h.factory.live_instances(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_queue_off_skips_restore() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = QueueStore::new(dir.path());
        store
            .save(
                QueueSlot::Main,
                &PersistedQueueSnapshot::from_queue(&queue(&["a"]), 0),
            )
            .expect("save");

        let prefs = Preferences {
            persistent_queue: false,
            ..Preferences::default()
        };
        let h = Harness::start_in(prefs, dir);
        let snap = h.handle.snapshot().await.unwrap();
        assert!(snap.queue.is_empty());
    }
}
