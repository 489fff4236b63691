pub mod model;
pub mod queue;

pub use model::{MediaItem, MediaMetadata};
pub use queue::PlaybackQueue;
