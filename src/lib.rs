//! Playback orchestration core: crossfading between tracks, keeping
//! engine parameters in sync with live settings, and persisting the
//! queue across restarts.

pub mod cli;
pub mod collab;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod persist;
pub mod playback;
pub mod sync;

mod fsutil;
