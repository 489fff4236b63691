//! Single-owner playback actor and its control surface.

mod actor;
mod handle;
mod messages;

pub use actor::{OrchestratorOptions, spawn_orchestrator};
pub use handle::OrchestratorHandle;
pub use messages::{PlayerCommand, PlayerEvent, PlayerSnapshot};
