//! Lifecycle events and the per-controller listener registry.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::loops::LoopEvent;
use crate::runtime::Host;

/// Recognised lifecycle event names. Also used as task-queue milestones.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Load,
    LoadError,
    Play,
    Loop,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [Self::Load, Self::LoadError, Self::Play, Self::Loop];

    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::LoadError => "loaderror",
            Self::Play => "play",
            Self::Loop => "loop",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when an event name is not one of the recognised lifecycle events.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event name: {0}")]
pub struct UnknownEvent(pub String);

impl FromStr for EventKind {
    type Err = UnknownEvent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "load" => Ok(Self::Load),
            "loaderror" => Ok(Self::LoadError),
            "play" => Ok(Self::Play),
            "loop" => Ok(Self::Loop),
            other => Err(UnknownEvent(other.to_string())),
        }
    }
}

/// Payload delivered to listeners.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PlaybackEvent {
    Load,
    #[serde(rename = "loaderror")]
    LoadError {
        message: String,
    },
    Play,
    Loop(LoopEvent),
}

impl PlaybackEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Load => EventKind::Load,
            Self::LoadError { .. } => EventKind::LoadError,
            Self::Play => EventKind::Play,
            Self::Loop(_) => EventKind::Loop,
        }
    }
}

pub type Listener = Rc<dyn Fn(&PlaybackEvent)>;

/// Ordered listener lists keyed by event kind.
#[derive(Default)]
pub struct EventBus {
    listeners: RefCell<HashMap<EventKind, Vec<Listener>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a listener for `kind`.
    pub fn on(&self, kind: EventKind, listener: Listener) {
        self.listeners
            .borrow_mut()
            .entry(kind)
            .or_default()
            .push(listener);
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners
            .borrow()
            .get(&kind)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Schedule every listener registered for the event's kind as its own host
    /// task. No listener runs before `emit` returns. Returns how many were scheduled.
    pub fn emit(&self, host: &dyn Host, event: &PlaybackEvent) -> usize {
        let targets: Vec<Listener> = self
            .listeners
            .borrow()
            .get(&event.kind())
            .cloned()
            .unwrap_or_default();
        for listener in &targets {
            let listener = listener.clone();
            let payload = event.clone();
            host.spawn(Box::pin(async move { listener(&payload) }));
        }
        targets.len()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for kind in EventKind::ALL {
            map.entry(&kind.as_str(), &self.listener_count(kind));
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::LocalBoxFuture;

    /// Host that parks spawned tasks until the test drains them.
    #[derive(Default)]
    struct ParkingHost {
        parked: RefCell<Vec<LocalBoxFuture<'static, ()>>>,
    }

    impl ParkingHost {
        fn drain(&self) {
            let tasks: Vec<_> = self.parked.borrow_mut().drain(..).collect();
            for task in tasks {
                futures::executor::block_on(task);
            }
        }
    }

    impl Host for ParkingHost {
        fn spawn(&self, task: LocalBoxFuture<'static, ()>) {
            self.parked.borrow_mut().push(task);
        }
        fn request_frame(&self, _callback: Box<dyn FnOnce(f64)>) {}
    }

    #[test]
    fn event_names_round_trip() {
        for kind in EventKind::ALL {
            assert_eq!(kind.as_str().parse::<EventKind>().unwrap(), kind);
        }
        assert!("playerror".parse::<EventKind>().is_err());
    }

    #[test]
    fn emit_schedules_every_listener_once_and_defers_them() {
        let host = ParkingHost::default();
        let bus = EventBus::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        for i in 0..3 {
            let seen = seen.clone();
            bus.on(
                EventKind::Load,
                Rc::new(move |ev: &PlaybackEvent| seen.borrow_mut().push((i, ev.clone()))),
            );
        }
        let other = Rc::new(RefCell::new(0));
        {
            let other = other.clone();
            bus.on(EventKind::Play, Rc::new(move |_: &PlaybackEvent| *other.borrow_mut() += 1));
        }

        assert_eq!(bus.emit(&host, &PlaybackEvent::Load), 3);
        assert!(seen.borrow().is_empty(), "listeners must not run inside emit");

        host.drain();
        let mut got: Vec<_> = seen.borrow().iter().map(|(i, _)| *i).collect();
        got.sort();
        assert_eq!(got, vec![0, 1, 2]);
        assert!(seen.borrow().iter().all(|(_, ev)| *ev == PlaybackEvent::Load));
        assert_eq!(*other.borrow(), 0);
    }

    #[test]
    fn emit_without_listeners_is_noop() {
        let host = ParkingHost::default();
        let bus = EventBus::new();
        assert_eq!(bus.emit(&host, &PlaybackEvent::Play), 0);
        assert!(host.parked.borrow().is_empty());
    }

    #[test]
    fn load_error_payload_serializes_with_tag() {
        let ev = PlaybackEvent::LoadError {
            message: "boom".into(),
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "loaderror");
        assert_eq!(json["message"], "boom");
    }
}
