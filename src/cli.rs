use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "playback-core",
    version,
    about = "Headless player with crossfade, queue persistence and live settings",
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Files to play; shorthand for `play <FILES>`
    pub files: Vec<PathBuf>,

    /// Data directory (settings, saved queues, logs)
    #[arg(long, global = true, env = "PLAYBACK_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Log directory (default `{data_dir}/logs`)
    #[arg(long, global = true, env = "PLAYBACK_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Log filter, same syntax as RUST_LOG
    #[arg(long, global = true, env = "RUST_LOG")]
    pub log_filter: Option<String>,

    /// Use the silent engine instead of the sound card
    #[arg(long, global = true, env = "PLAYBACK_NO_AUDIO")]
    pub no_audio: bool,

    /// Keep settings in memory for this run only
    #[arg(long, global = true)]
    pub ephemeral: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Play files in order, then continue with the automix list
    Play {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Files to continue with once the queue runs out
        #[arg(long, value_delimiter = ',')]
        automix: Vec<PathBuf>,
    },

    /// Resume the saved queue
    Resume,

    /// Print the effective settings
    Config,

    /// Change one setting
    Set { key: String, value: String },
}
