use clap::Parser;
use playback_core::cli::{Cli, Command};
use playback_core::collab::{Collaborators, LocalPresence, MemoryCatalog};
use playback_core::config::{ConfigKey, ConfigStore, Preferences, resolve_data_dir};
use playback_core::domain::{MediaItem, PlaybackQueue};
use playback_core::engine::{EngineFactory, NullEngineFactory, RodioEngineFactory};
use playback_core::error::{AppError, ConfigError, EngineError};
use playback_core::logging;
use playback_core::orchestrator::{OrchestratorOptions, PlayerEvent, spawn_orchestrator};
use rodio::{OutputStream, OutputStreamBuilder};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Track length assumed by the silent engine.
const NO_AUDIO_TRACK_MS: u64 = 30_000;

struct StartQueue {
    files: Vec<PathBuf>,
    automix: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();
    let data_dir = resolve_data_dir(cli.data_dir.clone());

    let _log_guard = logging::init(
        &data_dir,
        logging::LogConfig {
            dir: cli.log_dir.clone(),
            filter: cli.log_filter.clone(),
        },
    );
    tracing::info!(data_dir = %data_dir.display(), "playback-core starting");

    let config = if cli.ephemeral {
        ConfigStore::in_memory(Preferences::default()).0
    } else {
        ConfigStore::json(&data_dir)
    };

    let command = match cli.command {
        Some(command) => command,
        None if !cli.files.is_empty() => Command::Play {
            files: cli.files.clone(),
            automix: Vec::new(),
        },
        None => Command::Resume,
    };

    match command {
        Command::Config => {
            let prefs = config.get();
            for key in ConfigKey::ALL {
                println!("{} = {}", key.as_str(), prefs.get_str(key));
            }
            Ok(())
        }
        Command::Set { key, value } => {
            let key = ConfigKey::parse(&key).ok_or_else(|| ConfigError::UnknownKey(key.clone()))?;
            let mut prefs = config.get();
            prefs.set_str(key, &value)?;
            config.update(|p| *p = prefs).await?;
            println!("{} = {}", key.as_str(), config.get().get_str(key));
            Ok(())
        }
        Command::Play { files, automix } => {
            run_player(&cli_backend(cli.no_audio)?, &data_dir, config, Some(StartQueue { files, automix })).await
        }
        Command::Resume => run_player(&cli_backend(cli.no_audio)?, &data_dir, config, None).await,
    }
}

/// Engine factory plus the output stream it renders into, which must
/// stay alive for as long as the factory is used.
struct Backend {
    factory: Arc<dyn EngineFactory>,
    _stream: Option<OutputStream>,
}

fn cli_backend(no_audio: bool) -> Result<Backend, AppError> {
    if no_audio {
        tracing::info!("audio backend: null");
        return Ok(Backend {
            factory: Arc::new(NullEngineFactory::new().with_default_duration_ms(NO_AUDIO_TRACK_MS)),
            _stream: None,
        });
    }
    let stream = OutputStreamBuilder::open_default_stream().map_err(|e| {
        tracing::error!(err = %e, "failed to open audio output");
        EngineError::Init(e.to_string())
    })?;
    tracing::info!("audio backend: rodio");
    Ok(Backend {
        factory: Arc::new(RodioEngineFactory::new(stream.mixer().clone())),
        _stream: Some(stream),
    })
}

fn item_from_path(path: &Path) -> MediaItem {
    let title = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let uri = path.display().to_string();
    MediaItem::new(uri.clone(), title, uri)
}

async fn run_player(
    backend: &Backend,
    data_dir: &Path,
    config: ConfigStore,
    start: Option<StartQueue>,
) -> Result<(), AppError> {
    let catalog = Arc::new(MemoryCatalog::new());
    let presence = Arc::new(LocalPresence::new());
    let (handle, mut events) = spawn_orchestrator(
        Arc::clone(&backend.factory),
        config,
        Collaborators::local(catalog.clone(), presence),
        OrchestratorOptions::new(data_dir),
    )?;

    match start {
        Some(StartQueue { files, automix }) => {
            let items: Vec<MediaItem> = files.iter().map(|p| item_from_path(p)).collect();
            let automix: Vec<MediaItem> = automix.iter().map(|p| item_from_path(p)).collect();
            catalog.insert_items(items.iter().chain(automix.iter()));
            handle.set_automix(automix).await?;
            handle.play_queue(PlaybackQueue::new(None, items), true).await?;
        }
        None => {
            let snapshot = handle.snapshot().await?;
            if snapshot.current.is_none() {
                println!("nothing to resume");
                handle.shutdown().await?;
                return Ok(());
            }
            catalog.insert_items(snapshot.queue.items.iter().chain(snapshot.automix.iter()));
            handle.play().await?;
        }
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                tracing::info!("interrupted");
                break;
            }
            maybe_evt = events.recv() => {
                let Some(evt) = maybe_evt else {
                    break;
                };
                if evt == PlayerEvent::QueueEnded {
                    println!("queue finished");
                    break;
                }
                print_event(&evt);
            }
        }
    }

    handle.shutdown().await?;
    tracing::info!("playback-core stopped");
    Ok(())
}

fn print_event(evt: &PlayerEvent) {
    match evt {
        PlayerEvent::NowPlaying { item, index, .. } => println!("▶ [{}] {}", index + 1, item.label()),
        PlayerEvent::Paused(true) => println!("paused"),
        PlayerEvent::Paused(false) => println!("resumed"),
        PlayerEvent::CrossfadeStarted { next } => println!("crossfading into {}", next.label()),
        PlayerEvent::Error(e) => eprintln!("error: {e}"),
        _ => {}
    }
}
