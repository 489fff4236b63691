use super::{LyricsProvider, MetadataLookup, PresenceSession, SongLibrary};
use crate::domain::{MediaItem, MediaMetadata};
use crate::error::CollabError;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Song database kept in memory.
///
/// Unknown ids resolve to `None`; liking or shelving an unknown id
/// creates a bare entry.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    songs: Mutex<HashMap<String, MediaMetadata>>,
    lyrics: Mutex<HashSet<String>>,
    lyrics_fetches: Mutex<Vec<String>>,
    latency: Option<Duration>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay applied to every call, to mimic a remote database.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn insert(&self, metadata: MediaMetadata) {
        self.songs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(metadata.id.clone(), metadata);
    }

    /// Registers bare entries for queue items.
    pub fn insert_items<'a>(&self, items: impl IntoIterator<Item = &'a MediaItem>) {
        for item in items {
            self.insert(MediaMetadata::from_item(item));
        }
    }

    pub fn get(&self, id: &str) -> Option<MediaMetadata> {
        self.songs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Ids whose lyrics were fetched, in order.
    pub fn lyrics_fetches(&self) -> Vec<String> {
        self.lyrics_fetches
            .lock()
            .map(|v| v.clone())
            .unwrap_or_default()
    }

    async fn wait(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn toggle(&self, id: &str, f: impl FnOnce(&mut MediaMetadata) -> bool) -> Result<bool, CollabError> {
        let mut songs = self
            .songs
            .lock()
            .map_err(|_| CollabError::Library("catalog lock poisoned".to_owned()))?;
        let entry = songs.entry(id.to_owned()).or_insert_with(|| MediaMetadata {
            id: id.to_owned(),
            ..MediaMetadata::default()
        });
        Ok(f(entry))
    }
}

#[async_trait]
impl MetadataLookup for MemoryCatalog {
    async fn lookup(&self, id: &str) -> Option<MediaMetadata> {
        self.wait().await;
        self.get(id)
    }
}

#[async_trait]
impl LyricsProvider for MemoryCatalog {
    async fn has_lyrics(&self, id: &str) -> bool {
        self.lyrics.lock().is_ok_and(|l| l.contains(id))
    }

    async fn fetch(&self, metadata: &MediaMetadata) -> Result<(), CollabError> {
        self.wait().await;
        let mut lyrics = self
            .lyrics
            .lock()
            .map_err(|_| CollabError::Lyrics("lyrics lock poisoned".to_owned()))?;
        lyrics.insert(metadata.id.clone());
        self.lyrics_fetches
            .lock()
            .map_err(|_| CollabError::Lyrics("fetch log lock poisoned".to_owned()))?
            .push(metadata.id.clone());
        Ok(())
    }
}

#[async_trait]
impl SongLibrary for MemoryCatalog {
    async fn toggle_like(&self, id: &str) -> Result<bool, CollabError> {
        self.wait().await;
        self.toggle(id, |m| {
            m.liked = !m.liked;
            m.liked
        })
    }

    async fn toggle_in_library(&self, id: &str) -> Result<bool, CollabError> {
        self.wait().await;
        self.toggle(id, |m| {
            m.in_library = !m.in_library;
            m.in_library
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceCall {
    Open(String),
    Update(String),
    Close,
}

/// Presence session that logs and records what it was asked to do.
#[derive(Debug, Default)]
pub struct LocalPresence {
    calls: Mutex<Vec<PresenceCall>>,
}

impl LocalPresence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<PresenceCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: PresenceCall) -> Result<(), CollabError> {
        self.calls
            .lock()
            .map_err(|_| CollabError::Presence("call log lock poisoned".to_owned()))?
            .push(call);
        Ok(())
    }
}

#[async_trait]
impl PresenceSession for LocalPresence {
    async fn open(&self, token: &str) -> Result<(), CollabError> {
        tracing::info!(token_len = token.len(), "presence session opened");
        self.record(PresenceCall::Open(token.to_owned()))
    }

    async fn update_track(&self, metadata: &MediaMetadata) -> Result<(), CollabError> {
        tracing::info!(item_id = %metadata.id, title = %metadata.title, "presence track updated");
        self.record(PresenceCall::Update(metadata.id.clone()))
    }

    async fn close(&self) {
        tracing::info!("presence session closed");
        if let Err(e) = self.record(PresenceCall::Close) {
            tracing::warn!(err = %e, "presence close not recorded");
        }
    }
}
