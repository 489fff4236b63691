use serde::{Deserialize, Serialize};

/// Catalog reference placed in a queue.
///
/// Items are built by collaborators outside the core and never mutated
/// once queued. `uri` is whatever the engine needs to open the stream.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub duration_ms: Option<u64>,
}

impl MediaItem {
    pub fn new(id: impl Into<String>, title: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: String::new(),
            uri: uri.into(),
            duration_ms: None,
        }
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = artist.into();
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn label(&self) -> String {
        if self.artist.is_empty() {
            self.title.clone()
        } else {
            format!("{} - {}", self.title, self.artist)
        }
    }
}

/// Descriptor of the playing item as known by the song database.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub duration_ms: Option<u64>,
    /// Integrated loudness relative to the reference level, in dB.
    pub loudness_db: Option<f64>,
    pub explicit: bool,
    pub liked: bool,
    pub in_library: bool,
}

impl MediaMetadata {
    /// Minimal metadata derived from the item alone, used until the
    /// lookup answers.
    pub fn from_item(item: &MediaItem) -> Self {
        Self {
            id: item.id.clone(),
            title: item.title.clone(),
            artist: item.artist.clone(),
            duration_ms: item.duration_ms,
            ..Self::default()
        }
    }
}
