use super::messages::{PlayerCommand, PlayerSnapshot};
use crate::domain::{MediaItem, PlaybackQueue};
use crate::error::AppError;
use tokio::sync::{mpsc, oneshot};

/// Cloneable sender side of the playback actor.
#[derive(Debug, Clone)]
pub struct OrchestratorHandle {
    tx: mpsc::Sender<PlayerCommand>,
}

impl OrchestratorHandle {
    pub(super) fn new(tx: mpsc::Sender<PlayerCommand>) -> Self {
        Self { tx }
    }

    async fn send(&self, cmd: PlayerCommand) -> Result<(), AppError> {
        self.tx.send(cmd).await.map_err(|_| AppError::PlayerClosed)
    }

    /// Replaces the queue and loads its current item at its saved offset.
    pub async fn play_queue(&self, queue: PlaybackQueue, play_when_ready: bool) -> Result<(), AppError> {
        self.send(PlayerCommand::PlayQueue {
            queue,
            play_when_ready,
        })
        .await
    }

    pub async fn play(&self) -> Result<(), AppError> {
        self.send(PlayerCommand::Play).await
    }

    pub async fn pause(&self) -> Result<(), AppError> {
        self.send(PlayerCommand::Pause).await
    }

    pub async fn toggle_pause(&self) -> Result<(), AppError> {
        self.send(PlayerCommand::TogglePause).await
    }

    pub async fn stop(&self) -> Result<(), AppError> {
        self.send(PlayerCommand::Stop).await
    }

    pub async fn next(&self) -> Result<(), AppError> {
        self.send(PlayerCommand::Next).await
    }

    pub async fn previous(&self) -> Result<(), AppError> {
        self.send(PlayerCommand::Previous).await
    }

    pub async fn seek(&self, position_ms: u64) -> Result<(), AppError> {
        self.send(PlayerCommand::SeekToMs(position_ms)).await
    }

    /// Sets the runtime player volume; it is written back to the
    /// configuration once it stops changing.
    pub async fn set_volume(&self, volume: f32) -> Result<(), AppError> {
        self.send(PlayerCommand::SetVolume(volume)).await
    }

    pub async fn set_automix(&self, items: Vec<MediaItem>) -> Result<(), AppError> {
        self.send(PlayerCommand::SetAutomix(items)).await
    }

    pub async fn toggle_like(&self) -> Result<(), AppError> {
        self.send(PlayerCommand::ToggleLike).await
    }

    pub async fn toggle_library(&self) -> Result<(), AppError> {
        self.send(PlayerCommand::ToggleLibrary).await
    }

    pub async fn snapshot(&self) -> Result<PlayerSnapshot, AppError> {
        let (tx, rx) = oneshot::channel();
        self.send(PlayerCommand::Snapshot(tx)).await?;
        rx.await.map_err(|_| AppError::PlayerClosed)
    }

    /// Stops the actor after the final persistence write. Resolves once
    /// everything is released.
    pub async fn shutdown(&self) -> Result<(), AppError> {
        let (tx, rx) = oneshot::channel();
        self.send(PlayerCommand::Shutdown(tx)).await?;
        rx.await.map_err(|_| AppError::PlayerClosed)
    }
}
