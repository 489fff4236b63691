pub mod crossfade;
pub mod volume;

pub use crossfade::{CROSSFADE_STEPS, CrossfadeEngine, CrossfadeOutcome, CrossfadePolicy};
pub use volume::{VolumePipeline, normalization_factor};
