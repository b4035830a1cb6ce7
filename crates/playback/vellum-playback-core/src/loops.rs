//! Loop-completion classification.
//!
//! Engines report a raw "did loop" flag per instance per advance. A `loop`
//! animation completes a cycle on every wrap. A `pingPong` animation reports a
//! signal at each endpoint, so a completed cycle (back to the same direction of
//! travel) takes two signals. `oneShot` animations never report loop completion.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::PlaybackError;

/// Declared replay behaviour of an animation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LoopMode {
    OneShot,
    Loop,
    PingPong,
}

impl LoopMode {
    /// Raw signals needed before one completion is reported.
    #[inline]
    pub fn signals_per_cycle(&self) -> Option<u32> {
        match self {
            Self::OneShot => None,
            Self::Loop => Some(1),
            Self::PingPong => Some(2),
        }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::OneShot => "oneShot",
            Self::Loop => "loop",
            Self::PingPong => "pingPong",
        }
    }
}

impl TryFrom<i32> for LoopMode {
    type Error = PlaybackError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::OneShot),
            1 => Ok(Self::Loop),
            2 => Ok(Self::PingPong),
            value => Err(PlaybackError::InvalidLoopValue { value }),
        }
    }
}

/// Payload of a `loop` event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopEvent {
    pub animation_name: String,
    pub loop_mode: LoopMode,
}

impl LoopEvent {
    /// Build an event from the engine's raw loop index; unknown indices are rejected.
    pub fn new(animation_name: impl Into<String>, loop_value: i32) -> crate::Result<Self> {
        Ok(Self {
            animation_name: animation_name.into(),
            loop_mode: LoopMode::try_from(loop_value)?,
        })
    }
}

#[derive(Clone, Debug)]
struct LoopCounter {
    animation_name: String,
    loop_value: i32,
    count: u32,
}

/// Per-animation raw loop counters.
#[derive(Clone, Debug, Default)]
pub struct LoopClassifier {
    counters: Vec<LoopCounter>,
}

impl LoopClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an animation; returns its index.
    pub fn track(&mut self, animation_name: impl Into<String>, loop_value: i32) -> usize {
        self.counters.push(LoopCounter {
            animation_name: animation_name.into(),
            loop_value,
            count: 0,
        });
        self.counters.len() - 1
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    pub fn count(&self, index: usize) -> Option<u32> {
        self.counters.get(index).map(|c| c.count)
    }

    /// Count a raw signal from the engine.
    pub fn record(&mut self, index: usize, did_loop: bool) {
        if !did_loop {
            return;
        }
        if let Some(counter) = self.counters.get_mut(index) {
            counter.count = counter.count.saturating_add(1);
        }
    }

    /// Report a completed loop if enough raw signals have accumulated.
    pub fn take_event(&mut self, index: usize) -> Option<LoopEvent> {
        let counter = self.counters.get_mut(index)?;
        if counter.count == 0 {
            return None;
        }
        let event = match LoopEvent::new(counter.animation_name.as_str(), counter.loop_value) {
            Ok(event) => event,
            Err(err) => {
                warn!(
                    "suppressing loop event for {}: {err}",
                    counter.animation_name
                );
                counter.count = 0;
                return None;
            }
        };
        let threshold = event.loop_mode.signals_per_cycle()?;
        if counter.count < threshold {
            return None;
        }
        counter.count = 0;
        Some(event)
    }

    /// `record` followed by `take_event`.
    pub fn observe(&mut self, index: usize, did_loop: bool) -> Option<LoopEvent> {
        self.record(index, did_loop);
        self.take_event(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loop_emits_on_each_signal() {
        let mut c = LoopClassifier::new();
        let i = c.track("spin", 1);
        assert_eq!(c.observe(i, false), None);
        let ev = c.observe(i, true).expect("loop event");
        assert_eq!(ev.animation_name, "spin");
        assert_eq!(ev.loop_mode, LoopMode::Loop);
        assert_eq!(c.count(i), Some(0));
        assert!(c.observe(i, true).is_some());
    }

    #[test]
    fn ping_pong_needs_two_signals() {
        let mut c = LoopClassifier::new();
        let i = c.track("bounce", 2);
        assert_eq!(c.observe(i, true), None);
        assert_eq!(c.count(i), Some(1));
        assert_eq!(c.observe(i, false), None);
        let ev = c.observe(i, true).expect("cycle complete");
        assert_eq!(ev.loop_mode, LoopMode::PingPong);
        assert_eq!(c.count(i), Some(0));
    }

    #[test]
    fn one_shot_never_emits() {
        let mut c = LoopClassifier::new();
        let i = c.track("intro", 0);
        for _ in 0..5 {
            assert_eq!(c.observe(i, true), None);
        }
    }

    #[test]
    fn invalid_loop_value_is_suppressed_and_reset() {
        let mut c = LoopClassifier::new();
        let i = c.track("weird", 9);
        assert_eq!(c.observe(i, true), None);
        assert_eq!(c.count(i), Some(0));
        assert_eq!(
            LoopEvent::new("weird", 9),
            Err(PlaybackError::InvalidLoopValue { value: 9 })
        );
    }

    #[test]
    fn counters_are_independent() {
        let mut c = LoopClassifier::new();
        let a = c.track("a", 2);
        let b = c.track("b", 1);
        c.record(a, true);
        c.record(b, true);
        assert!(c.take_event(b).is_some());
        assert_eq!(c.count(a), Some(1));
        assert!(c.take_event(a).is_none());
    }

    #[test]
    fn loop_event_serializes_camel_case() {
        let ev = LoopEvent::new("idle", 2).unwrap();
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["animationName"], "idle");
        assert_eq!(json["loopMode"], "pingPong");
    }
}
