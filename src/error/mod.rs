//! Error types for every concern of the crate.
//!
//! Background failures are logged and swallowed by their owners; only
//! `AppError` reaches `main`.

mod app;
mod collab;
mod config;
mod engine;
mod queue_store;

pub use app::AppError;
pub use collab::CollabError;
pub use config::ConfigError;
pub use engine::EngineError;
pub use queue_store::QueueStoreError;
