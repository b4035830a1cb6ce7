//! Per-frame driver: advance instances, apply, draw, classify loops.

use log::trace;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::loops::{LoopClassifier, LoopEvent};
use crate::runtime::{Alignment, AnimationInstance, Artboard, Fit, Renderer};

/// Instances are applied at full weight; the engine mixes them additively.
pub const FULL_MIX: f32 = 1.0;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopState {
    Idle,
    Running,
}

/// One playing animation and its loop-counter slot.
pub struct ActiveAnimation {
    pub name: String,
    pub instance: Box<dyn AnimationInstance>,
    pub slot: usize,
}

/// Everything a controller owns once playback has been initialised.
pub struct PlaybackSession {
    pub artboard: Box<dyn Artboard>,
    pub renderer: Box<dyn Renderer>,
    pub animations: Vec<ActiveAnimation>,
    pub classifier: LoopClassifier,
}

impl PlaybackSession {
    pub fn new(artboard: Box<dyn Artboard>, renderer: Box<dyn Renderer>) -> Self {
        Self {
            artboard,
            renderer,
            animations: Vec::new(),
            classifier: LoopClassifier::new(),
        }
    }

    /// Register an instance in playback order.
    pub fn push(&mut self, name: String, loop_value: i32, instance: Box<dyn AnimationInstance>) {
        let slot = self.classifier.track(name.clone(), loop_value);
        self.animations.push(ActiveAnimation {
            name,
            instance,
            slot,
        });
    }

    pub fn animation_names(&self) -> Vec<String> {
        self.animations.iter().map(|a| a.name.clone()).collect()
    }
}

#[derive(Clone, Debug)]
pub struct PlaybackLoop {
    state: LoopState,
    last_timestamp: Option<f64>,
    frames: u64,
}

impl Default for PlaybackLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackLoop {
    pub fn new() -> Self {
        Self {
            state: LoopState::Idle,
            last_timestamp: None,
            frames: 0,
        }
    }

    #[inline]
    pub fn state(&self) -> LoopState {
        self.state
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.state == LoopState::Running
    }

    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Idle → running. Returns false if already running.
    pub fn start(&mut self) -> bool {
        if self.is_running() {
            return false;
        }
        self.state = LoopState::Running;
        true
    }

    /// Seconds since the previous tick (zero on the first one). `now` is in ms.
    pub fn elapsed(&mut self, now: f64) -> f64 {
        let elapsed = match self.last_timestamp {
            Some(previous) => (now - previous) / 1000.0,
            None => 0.0,
        };
        self.last_timestamp = Some(now);
        elapsed
    }

    /// Run one frame against the session and return loop completions to report.
    pub fn tick(
        &mut self,
        now: f64,
        session: &mut PlaybackSession,
    ) -> Result<Vec<LoopEvent>, EngineError> {
        let elapsed = self.elapsed(now);
        self.frames += 1;
        trace!("frame {} elapsed {elapsed:.4}s", self.frames);

        let PlaybackSession {
            artboard,
            renderer,
            animations,
            classifier,
        } = session;

        for active in animations.iter_mut() {
            active.instance.advance(elapsed)?;
            classifier.record(active.slot, active.instance.did_loop()?);
            active.instance.apply(&mut **artboard, FULL_MIX)?;
        }
        artboard.advance(elapsed)?;

        renderer.clear()?;
        renderer.save()?;
        let frame = renderer.frame_bounds()?;
        let content = artboard.bounds()?;
        renderer.align(Fit::Contain, Alignment::Center, frame, content)?;
        artboard.draw(&mut **renderer)?;
        renderer.restore()?;

        Ok(animations
            .iter()
            .filter_map(|active| classifier.take_event(active.slot))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_tick_has_zero_elapsed() {
        let mut pl = PlaybackLoop::new();
        assert_eq!(pl.elapsed(1_000.0), 0.0);
        assert!((pl.elapsed(1_016.0) - 0.016).abs() < 1e-9);
        assert!((pl.elapsed(1_516.0) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn start_transitions_once() {
        let mut pl = PlaybackLoop::new();
        assert_eq!(pl.state(), LoopState::Idle);
        assert!(pl.start());
        assert!(!pl.start());
        assert!(pl.is_running());
    }
}
