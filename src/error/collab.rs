//! Errors reported by external collaborators (presence, lyrics, library).

#[derive(Debug, thiserror::Error)]
pub enum CollabError {
    #[error("presence error: {0}")]
    Presence(String),

    #[error("lyrics error: {0}")]
    Lyrics(String),

    #[error("library error: {0}")]
    Library(String),
}
