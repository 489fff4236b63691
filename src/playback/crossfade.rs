//! Crossfade between the outgoing and the incoming track.
//!
//! The engine is a two-state machine: idle, or transitioning with exactly
//! one secondary engine. Ramp steps are not driven by a task of their
//! own; the owner polls [`CrossfadeEngine::next_deadline`] from its event
//! loop and calls [`CrossfadeEngine::advance`] when it elapses, so
//! cancelling a transition is just dropping the session.
//!
//! The ramp is linear (`1 - i/N` out, `i/N` in), not equal-power.

use crate::domain::MediaItem;
use crate::engine::{AudioEngine, EngineFactory};
use crate::error::EngineError;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

pub const CROSSFADE_STEPS: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrossfadePolicy {
    pub enabled: bool,
    pub duration_secs: u32,
}

impl Default for CrossfadePolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            duration_secs: 3,
        }
    }
}

impl CrossfadePolicy {
    fn window_ms(&self) -> i64 {
        i64::from(self.duration_secs) * 1000
    }
}

/// How a transition that ran to the end was settled.
#[derive(Debug)]
pub enum CrossfadeOutcome {
    /// The primary engine now plays `item` from where the secondary was.
    Completed { item: MediaItem },
    /// Moving `item` onto the primary failed. The primary is paused with
    /// its volume restored.
    HandoffFailed { item: MediaItem, error: EngineError },
}

struct CrossfadeSession {
    secondary: Box<dyn AudioEngine>,
    item: MediaItem,
    started_at: Instant,
    step_duration: Duration,
    step: u32,
    next_step_at: Instant,
}

pub struct CrossfadeEngine {
    factory: Arc<dyn EngineFactory>,
    policy: CrossfadePolicy,
    /// Volume-pipeline output; ramps are scaled by it and the primary is
    /// restored to it.
    level: f32,
    session: Option<CrossfadeSession>,
}

impl CrossfadeEngine {
    pub fn new(factory: Arc<dyn EngineFactory>) -> Self {
        Self {
            factory,
            policy: CrossfadePolicy::default(),
            level: 1.0,
            session: None,
        }
    }

    pub fn policy(&self) -> CrossfadePolicy {
        self.policy
    }

    /// Replaces the policy. A running transition keeps the duration it
    /// started with.
    pub fn update_settings(&mut self, enabled: bool, duration_secs: u32) {
        let policy = CrossfadePolicy {
            enabled,
            duration_secs,
        };
        if policy != self.policy {
            tracing::debug!(enabled, duration_secs, "crossfade policy updated");
            self.policy = policy;
        }
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Item being faded in, if a transition is running.
    pub fn incoming(&self) -> Option<&MediaItem> {
        self.session.as_ref().map(|s| &s.item)
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    /// Updates the reference level. During a transition the current step
    /// is re-applied at the new level.
    pub fn set_level(&mut self, level: f32, primary: &mut dyn AudioEngine) {
        self.level = level.clamp(0.0, 1.0);
        if let Some(session) = self.session.as_mut() {
            apply_step(self.level, session.step, primary, session.secondary.as_mut());
        }
    }

    pub fn should_start_crossfade(&self, position_ms: i64, duration_ms: i64) -> bool {
        if !self.policy.enabled || self.session.is_some() || duration_ms <= 0 {
            return false;
        }
        duration_ms
            .checked_sub(position_ms)
            .is_some_and(|remaining| remaining > 0 && remaining <= self.policy.window_ms())
    }

    /// Starts fading `next` in over the primary.
    ///
    /// Returns `Ok(false)` without side effects when disabled or when a
    /// transition is already running. On error no session exists and the
    /// primary is back at the reference level.
    pub fn start_crossfade(
        &mut self,
        primary: &mut dyn AudioEngine,
        next: &MediaItem,
    ) -> Result<bool, EngineError> {
        if !self.policy.enabled || self.policy.duration_secs == 0 || self.session.is_some() {
            return Ok(false);
        }

        let mut secondary = match self.factory.create() {
            Ok(engine) => engine,
            Err(e) => {
                primary.set_volume(self.level);
                tracing::warn!(item_id = %next.id, err = %e, "crossfade aborted: secondary engine unavailable");
                return Err(e);
            }
        };
        secondary.set_volume(0.0);
        if let Err(e) = secondary.load_item(next) {
            secondary.release();
            primary.set_volume(self.level);
            tracing::warn!(item_id = %next.id, err = %e, "crossfade aborted: load failed");
            return Err(e);
        }
        secondary.play();

        let duration = Duration::from_secs(u64::from(self.policy.duration_secs));
        let step_duration = duration / CROSSFADE_STEPS;
        let now = Instant::now();
        let mut session = CrossfadeSession {
            secondary,
            item: next.clone(),
            started_at: now,
            step_duration,
            step: 0,
            next_step_at: now + step_duration,
        };
        apply_step(self.level, 0, primary, session.secondary.as_mut());
        self.session = Some(session);

        tracing::info!(
            item_id = %next.id,
            duration_ms = duration.as_millis() as u64,
            steps = CROSSFADE_STEPS,
            "crossfade started"
        );
        Ok(true)
    }

    /// When the next ramp step is due.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.session.as_ref().map(|s| s.next_step_at)
    }

    /// Runs the step that is due. Returns the outcome once the last step
    /// has elapsed and the handoff happened.
    pub fn advance(&mut self, primary: &mut dyn AudioEngine) -> Option<CrossfadeOutcome> {
        let session = self.session.as_mut()?;
        session.step += 1;
        if session.step < CROSSFADE_STEPS {
            apply_step(self.level, session.step, primary, session.secondary.as_mut());
            session.next_step_at += session.step_duration;
            return None;
        }

        let session = self.session.take()?;
        Some(self.complete(primary, session))
    }

    /// Aborts a running transition without promoting the incoming item.
    /// Returns whether one was running.
    pub fn release(&mut self, primary: &mut dyn AudioEngine) -> bool {
        let Some(mut session) = self.session.take() else {
            return false;
        };
        session.secondary.release();
        primary.set_volume(self.level);
        tracing::info!(
            item_id = %session.item.id,
            step = session.step,
            elapsed_ms = session.started_at.elapsed().as_millis() as u64,
            "crossfade aborted"
        );
        true
    }

    fn complete(&self, primary: &mut dyn AudioEngine, session: CrossfadeSession) -> CrossfadeOutcome {
        let CrossfadeSession {
            mut secondary,
            item,
            started_at,
            ..
        } = session;

        primary.pause();
        let item = secondary.current_item().cloned().unwrap_or(item);
        let position_ms = secondary.position_ms();
        let handoff = primary
            .load_item(&item)
            .and_then(|()| primary.seek(position_ms));
        primary.set_volume(self.level);
        secondary.release();

        match handoff {
            Ok(()) => {
                primary.play();
                tracing::info!(
                    item_id = %item.id,
                    position_ms,
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    "crossfade completed"
                );
                CrossfadeOutcome::Completed { item }
            }
            Err(error) => {
                tracing::warn!(item_id = %item.id, err = %error, "crossfade handoff failed");
                CrossfadeOutcome::HandoffFailed { item, error }
            }
        }
    }
}

fn apply_step(level: f32, step: u32, primary: &mut dyn AudioEngine, secondary: &mut dyn AudioEngine) {
    let t = step as f32 / CROSSFADE_STEPS as f32;
    primary.set_volume(level * (1.0 - t));
    secondary.set_volume(level * t);
}
