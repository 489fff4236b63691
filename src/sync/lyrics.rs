use crate::collab::LyricsProvider;
use crate::domain::MediaMetadata;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Fetches lyrics for the current item while `show_lyrics` is on.
///
/// Keyed on (item id, enabled); a new key aborts the fetch for the old
/// one.
pub struct LyricsPrefetcher {
    provider: Arc<dyn LyricsProvider>,
    enabled: bool,
    key: Option<(String, bool)>,
    job: Option<JoinHandle<()>>,
}

impl LyricsPrefetcher {
    pub fn new(provider: Arc<dyn LyricsProvider>) -> Self {
        Self {
            provider,
            enabled: false,
            key: None,
            job: None,
        }
    }

    pub fn set_enabled(&mut self, enabled: bool, current: Option<&MediaMetadata>) {
        self.enabled = enabled;
        self.refresh(current);
    }

    pub fn refresh(&mut self, current: Option<&MediaMetadata>) {
        let key = current.map(|m| (m.id.clone(), self.enabled));
        if key == self.key {
            return;
        }
        self.key = key;
        self.cancel();

        let Some(metadata) = current.filter(|_| self.enabled).cloned() else {
            return;
        };
        let provider = Arc::clone(&self.provider);
        self.job = Some(tokio::spawn(async move {
            if provider.has_lyrics(&metadata.id).await {
                return;
            }
            match provider.fetch(&metadata).await {
                Ok(()) => tracing::debug!(item_id = %metadata.id, "lyrics fetched"),
                Err(e) => tracing::warn!(item_id = %metadata.id, err = %e, "lyrics fetch failed"),
            }
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(job) = self.job.take() {
            job.abort();
        }
    }
}

impl Drop for LyricsPrefetcher {
    fn drop(&mut self) {
        self.cancel();
    }
}
