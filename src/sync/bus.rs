//! Per-key subscriptions over the configuration feed.
//!
//! Each subscription is its own task: it projects the preferences onto
//! the value it cares about, drops repeats, and forwards the rest to the
//! orchestrator as a [`SettingsEffect`]. Runtime volume changes travel
//! the other way and are written back to the config after a quiet
//! period.

use super::debounce::settle;
use crate::config::{ConfigStore, Preferences};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq)]
pub enum SettingsEffect {
    Crossfade { enabled: bool, duration_secs: u32 },
    SkipSilence(bool),
    NormalizeAudio(bool),
    Presence { token: Option<String>, enabled: bool },
    ShowLyrics(bool),
}

#[derive(Debug, Clone, Copy)]
pub struct BusTiming {
    pub volume_persist_delay: Duration,
    pub presence_debounce: Duration,
}

impl Default for BusTiming {
    fn default() -> Self {
        Self {
            volume_persist_delay: Duration::from_secs(1),
            presence_debounce: Duration::from_millis(300),
        }
    }
}

type Projection = fn(&Preferences) -> SettingsEffect;

fn crossfade(p: &Preferences) -> SettingsEffect {
    SettingsEffect::Crossfade {
        enabled: p.crossfade_enabled,
        duration_secs: p.crossfade_duration_secs,
    }
}

fn skip_silence(p: &Preferences) -> SettingsEffect {
    SettingsEffect::SkipSilence(p.skip_silence)
}

fn normalize_audio(p: &Preferences) -> SettingsEffect {
    SettingsEffect::NormalizeAudio(p.normalize_audio)
}

fn presence(p: &Preferences) -> SettingsEffect {
    SettingsEffect::Presence {
        token: p.presence_token.clone(),
        enabled: p.presence_enabled,
    }
}

fn show_lyrics(p: &Preferences) -> SettingsEffect {
    SettingsEffect::ShowLyrics(p.show_lyrics)
}

pub struct SettingsSyncBus {
    tasks: Vec<JoinHandle<()>>,
}

impl SettingsSyncBus {
    /// Starts every subscription. Each one emits its current value once,
    /// then only real changes.
    pub fn spawn(
        config: &ConfigStore,
        volume_rx: watch::Receiver<f32>,
        tx: mpsc::Sender<SettingsEffect>,
        timing: BusTiming,
    ) -> Self {
        let immediate: [Projection; 4] = [crossfade, skip_silence, normalize_audio, show_lyrics];
        let mut tasks: Vec<JoinHandle<()>> = immediate
            .into_iter()
            .map(|project| tokio::spawn(forward_distinct(config.subscribe(), project, tx.clone(), None)))
            .collect();
        tasks.push(tokio::spawn(forward_distinct(
            config.subscribe(),
            presence,
            tx,
            Some(timing.presence_debounce),
        )));
        tasks.push(tokio::spawn(persist_volume(
            volume_rx,
            config.clone(),
            timing.volume_persist_delay,
        )));
        Self { tasks }
    }

    /// Stops all subscriptions. Pending debounced writes are dropped.
    pub fn shutdown(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for SettingsSyncBus {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn forward_distinct(
    mut rx: watch::Receiver<Preferences>,
    project: Projection,
    tx: mpsc::Sender<SettingsEffect>,
    debounce: Option<Duration>,
) {
    let mut last: Option<SettingsEffect> = None;
    loop {
        if let Some(quiet) = debounce
            && !settle(&mut rx, quiet).await
        {
            break;
        }
        let effect = project(&rx.borrow_and_update());
        if last.as_ref() != Some(&effect) {
            last = Some(effect.clone());
            if tx.send(effect).await.is_err() {
                break;
            }
        }
        if rx.changed().await.is_err() {
            break;
        }
    }
}

async fn persist_volume(mut rx: watch::Receiver<f32>, config: ConfigStore, quiet: Duration) {
    rx.borrow_and_update();
    loop {
        if rx.changed().await.is_err() {
            break;
        }
        let open = settle(&mut rx, quiet).await;
        let volume = *rx.borrow_and_update();
        match config.update(|p| p.player_volume = volume).await {
            Ok(true) => tracing::debug!(volume, "player volume persisted"),
            Ok(false) => {}
            Err(e) => tracing::warn!(err = %e, "failed to persist player volume"),
        }
        if !open {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn drain(rx: &mut mpsc::Receiver<SettingsEffect>) -> Vec<SettingsEffect> {
        tokio::time::sleep(Duration::from_millis(10)).await;
        let mut out = Vec::new();
        while let Ok(effect) = rx.try_recv() {
            out.push(effect);
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_volume_changes_write_once() {
        let (config, backend) = ConfigStore::in_memory(Preferences::default());
        let (volume_tx, volume_rx) = watch::channel(1.0_f32);
        let (tx, _rx) = mpsc::channel(16);
        let _bus = SettingsSyncBus::spawn(&config, volume_rx, tx, BusTiming::default());

        for i in 1..=10 {
            volume_tx.send_replace(1.0 - i as f32 * 0.05);
            tokio::time::sleep(Duration::from_millis(90)).await;
        }
        assert!(backend.writes().is_empty());

        tokio::time::sleep(Duration::from_millis(1500)).await;
        let writes = backend.writes();
        assert_eq!(writes.len(), 1);
        assert!((writes[0].player_volume - 0.5).abs() < 1e-6);
        assert!((config.get().player_volume - 0.5).abs() < 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_effects_emit_initial_then_only_changes() {
        let (config, _backend) = ConfigStore::in_memory(Preferences::default());
        let (_volume_tx, volume_rx) = watch::channel(1.0_f32);
        let (tx, mut rx) = mpsc::channel(16);
        let _bus = SettingsSyncBus::spawn(&config, volume_rx, tx, BusTiming::default());

        let initial = drain(&mut rx).await;
        assert!(initial.contains(&SettingsEffect::Crossfade {
            enabled: false,
            duration_secs: 3
        }));
        assert!(initial.contains(&SettingsEffect::SkipSilence(false)));
        assert!(initial.contains(&SettingsEffect::NormalizeAudio(true)));
        assert!(initial.contains(&SettingsEffect::ShowLyrics(false)));

        config.update(|p| p.crossfade_enabled = true).await.unwrap();
        let effects = drain(&mut rx).await;
        assert_eq!(
            effects,
            vec![SettingsEffect::Crossfade {
                enabled: true,
                duration_secs: 3
            }]
        );

        // Unrelated key: crossfade projection unchanged, nothing repeated.
        config.update(|p| p.skip_silence = true).await.unwrap();
        let effects = drain(&mut rx).await;
        assert_eq!(effects, vec![SettingsEffect::SkipSilence(true)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_presence_settings_are_debounced() {
        let (config, _backend) = ConfigStore::in_memory(Preferences::default());
        let (_volume_tx, volume_rx) = watch::channel(1.0_f32);
        let (tx, mut rx) = mpsc::channel(16);
        let _bus = SettingsSyncBus::spawn(&config, volume_rx, tx, BusTiming::default());

        tokio::time::sleep(Duration::from_millis(400)).await;
        let initial = drain(&mut rx).await;
        assert!(initial.contains(&SettingsEffect::Presence {
            token: None,
            enabled: true
        }));

        for token in ["a", "ab", "abc"] {
            config
                .update(|p| p.presence_token = Some(token.to_owned()))
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(drain(&mut rx).await.is_empty());

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(
            drain(&mut rx).await,
            vec![SettingsEffect::Presence {
                token: Some("abc".to_owned()),
                enabled: true
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_forwarding() {
        let (config, backend) = ConfigStore::in_memory(Preferences::default());
        let (volume_tx, volume_rx) = watch::channel(1.0_f32);
        let (tx, mut rx) = mpsc::channel(16);
        let mut bus = SettingsSyncBus::spawn(&config, volume_rx, tx, BusTiming::default());
        drain(&mut rx).await;

        bus.shutdown();
        tokio::task::yield_now().await;
        config.update(|p| p.skip_silence = true).await.unwrap();
        volume_tx.send_replace(0.2);
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert!(drain(&mut rx).await.is_empty());
        assert_eq!(backend.writes().len(), 1);
    }
}
