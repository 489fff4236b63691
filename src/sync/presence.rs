//! Presence session lifecycle.
//!
//! Every change (settings or current track) supersedes the previous job:
//! the stale task is aborted and a new one reconciles the remote session
//! with the desired state. The open token lives behind an async mutex so
//! a new job always sees what the last completed one left behind.

use crate::collab::PresenceSession;
use crate::domain::MediaMetadata;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

pub struct PresenceDriver {
    session: Arc<dyn PresenceSession>,
    opened: Arc<Mutex<Option<String>>>,
    token: Option<String>,
    enabled: bool,
    track_delay: Duration,
    job: Option<JoinHandle<()>>,
}

impl PresenceDriver {
    pub fn new(session: Arc<dyn PresenceSession>, track_delay: Duration) -> Self {
        Self {
            session,
            opened: Arc::new(Mutex::new(None)),
            token: None,
            enabled: false,
            track_delay,
            job: None,
        }
    }

    /// Token the session should be open with, if any.
    pub fn desired_token(&self) -> Option<&str> {
        self.token.as_deref().filter(|_| self.enabled)
    }

    /// Applies new settings. Takes effect immediately; settings are
    /// already debounced upstream.
    pub fn configure(&mut self, token: Option<String>, enabled: bool, current: Option<MediaMetadata>) {
        if self.token == token && self.enabled == enabled {
            return;
        }
        self.token = token;
        self.enabled = enabled;
        tracing::debug!(enabled, has_token = self.token.is_some(), "presence settings changed");
        self.reconcile(current, Duration::ZERO);
    }

    /// Reports the current track after the track delay, unless another
    /// change comes first.
    pub fn track_changed(&mut self, current: Option<MediaMetadata>) {
        self.reconcile(current, self.track_delay);
    }

    fn reconcile(&mut self, current: Option<MediaMetadata>, delay: Duration) {
        if let Some(job) = self.job.take() {
            job.abort();
        }
        let desired = self.desired_token().map(str::to_owned);
        let session = Arc::clone(&self.session);
        let opened = Arc::clone(&self.opened);
        self.job = Some(tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let mut opened = opened.lock().await;
            let wanted = desired.filter(|_| current.is_some());
            if *opened != wanted {
                if opened.take().is_some() {
                    session.close().await;
                }
                if let Some(token) = wanted {
                    if let Err(e) = session.open(&token).await {
                        tracing::warn!(err = %e, "failed to open presence session");
                        return;
                    }
                    *opened = Some(token);
                }
            }
            if opened.is_some()
                && let Some(metadata) = current
                && let Err(e) = session.update_track(&metadata).await
            {
                tracing::warn!(item_id = %metadata.id, err = %e, "presence update failed");
            }
        }));
    }

    /// Cancels pending work and closes the session if it is open.
    pub async fn shutdown(&mut self) {
        if let Some(job) = self.job.take() {
            job.abort();
        }
        let mut opened = self.opened.lock().await;
        if opened.take().is_some() {
            self.session.close().await;
        }
    }
}

impl Drop for PresenceDriver {
    fn drop(&mut self) {
        if let Some(job) = self.job.take() {
            job.abort();
        }
    }
}
