//! Collaborators the core talks to but does not implement: song
//! database lookups, presence integration, lyrics, library state.
//!
//! All calls are async and may be slow; the orchestrator runs them in
//! background tasks and never awaits them on its own loop.

mod local;

use crate::domain::MediaMetadata;
use crate::error::CollabError;
use async_trait::async_trait;
use std::sync::Arc;

pub use local::{LocalPresence, MemoryCatalog, PresenceCall};

#[async_trait]
pub trait MetadataLookup: Send + Sync {
    async fn lookup(&self, id: &str) -> Option<MediaMetadata>;
}

/// External "now playing" presence integration.
#[async_trait]
pub trait PresenceSession: Send + Sync {
    async fn open(&self, token: &str) -> Result<(), CollabError>;
    async fn update_track(&self, metadata: &MediaMetadata) -> Result<(), CollabError>;
    async fn close(&self);
}

#[async_trait]
pub trait LyricsProvider: Send + Sync {
    async fn has_lyrics(&self, id: &str) -> bool;
    /// Fetches and stores lyrics for the item.
    async fn fetch(&self, metadata: &MediaMetadata) -> Result<(), CollabError>;
}

#[async_trait]
pub trait SongLibrary: Send + Sync {
    /// Returns the new liked state.
    async fn toggle_like(&self, id: &str) -> Result<bool, CollabError>;
    /// Returns the new in-library state.
    async fn toggle_in_library(&self, id: &str) -> Result<bool, CollabError>;
}

#[derive(Clone)]
pub struct Collaborators {
    pub metadata: Arc<dyn MetadataLookup>,
    pub presence: Arc<dyn PresenceSession>,
    pub lyrics: Arc<dyn LyricsProvider>,
    pub library: Arc<dyn SongLibrary>,
}

impl Collaborators {
    /// In-process catalog and a presence session that only logs.
    pub fn local(catalog: Arc<MemoryCatalog>, presence: Arc<LocalPresence>) -> Self {
        Self {
            metadata: catalog.clone(),
            presence,
            lyrics: catalog.clone(),
            library: catalog,
        }
    }
}
