use super::model::MediaItem;

/// The queue the orchestrator is playing from.
///
/// Replaced wholesale by `play_queue`; only the orchestrator moves the
/// cursor.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PlaybackQueue {
    pub title: Option<String>,
    pub items: Vec<MediaItem>,
    pub current_index: usize,
    /// Offset into the current item to start from, in milliseconds.
    pub position_ms: u64,
}

impl PlaybackQueue {
    pub fn new(title: Option<String>, items: Vec<MediaItem>) -> Self {
        Self {
            title,
            items,
            current_index: 0,
            position_ms: 0,
        }
    }

    pub fn starting_at(mut self, index: usize, position_ms: u64) -> Self {
        self.current_index = index;
        self.position_ms = position_ms;
        self.clamp_index();
        self
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn current(&self) -> Option<&MediaItem> {
        self.items.get(self.current_index)
    }

    pub fn peek_next(&self) -> Option<&MediaItem> {
        self.items.get(self.current_index + 1)
    }

    pub fn has_next(&self) -> bool {
        self.peek_next().is_some()
    }

    /// Moves to the next item and clears the start offset.
    pub fn advance(&mut self) -> Option<&MediaItem> {
        if !self.has_next() {
            return None;
        }
        self.current_index += 1;
        self.position_ms = 0;
        self.current()
    }

    pub fn retreat(&mut self) -> Option<&MediaItem> {
        if self.current_index == 0 || self.items.is_empty() {
            return None;
        }
        self.current_index -= 1;
        self.position_ms = 0;
        self.current()
    }

    fn clamp_index(&mut self) {
        if self.items.is_empty() {
            self.current_index = 0;
            self.position_ms = 0;
        } else if self.current_index >= self.items.len() {
            self.current_index = self.items.len() - 1;
            self.position_ms = 0;
        }
    }
}
