//! Settings sync bus and the latest-value-wins drivers it feeds.

mod bus;
mod debounce;
mod lyrics;
mod presence;

pub use bus::{BusTiming, SettingsEffect, SettingsSyncBus};
pub use debounce::settle;
pub use lyrics::LyricsPrefetcher;
pub use presence::PresenceDriver;
