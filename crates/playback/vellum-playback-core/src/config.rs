//! Controller configuration.

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::engine::SharedEngine;
use crate::events::{EventKind, Listener, PlaybackEvent};
use crate::runtime::{AssetFetcher, CanvasTarget, Host};

/// One animation name or an ordered list of names.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnimationSelection {
    One(String),
    Many(Vec<String>),
}

impl AnimationSelection {
    pub fn names(&self) -> Vec<String> {
        match self {
            Self::One(name) => vec![name.clone()],
            Self::Many(names) => names.clone(),
        }
    }
}

impl From<&str> for AnimationSelection {
    fn from(name: &str) -> Self {
        Self::One(name.to_string())
    }
}

impl From<Vec<String>> for AnimationSelection {
    fn from(names: Vec<String>) -> Self {
        Self::Many(names)
    }
}

/// Serializable playback options.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackOptions {
    /// Animation asset locator. Required for a functional controller.
    #[serde(default)]
    pub src: Option<String>,
    /// Artboard name; the file's default artboard when absent.
    #[serde(default)]
    pub artboard: Option<String>,
    /// Animations to play; the artboard's first animation when absent.
    #[serde(default)]
    pub animations: Option<AnimationSelection>,
    #[serde(default)]
    pub autoplay: bool,
}

impl PlaybackOptions {
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            src: Some(src.into()),
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> crate::Result<Self> {
        serde_json::from_str(json).map_err(|e| crate::PlaybackError::InvalidOptions {
            reason: e.to_string(),
        })
    }

    /// The source, if present and not blank.
    pub fn source(&self) -> Option<&str> {
        self.src.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    /// Requested animation names, empty when the default should be used.
    pub fn animation_names(&self) -> Vec<String> {
        self.animations
            .as_ref()
            .map(AnimationSelection::names)
            .unwrap_or_default()
    }
}

/// Options plus the canvas and initial listeners for one controller.
pub struct ControllerConfig {
    pub options: PlaybackOptions,
    pub canvas: CanvasTarget,
    pub listeners: Vec<(EventKind, Listener)>,
}

impl ControllerConfig {
    pub fn new(options: PlaybackOptions, canvas: CanvasTarget) -> Self {
        Self {
            options,
            canvas,
            listeners: Vec::new(),
        }
    }

    pub fn listener(mut self, kind: EventKind, f: impl Fn(&PlaybackEvent) + 'static) -> Self {
        let listener: Listener = Rc::new(f);
        self.listeners.push((kind, listener));
        self
    }

    pub fn on_load(self, f: impl Fn(&PlaybackEvent) + 'static) -> Self {
        self.listener(EventKind::Load, f)
    }

    pub fn on_load_error(self, f: impl Fn(&PlaybackEvent) + 'static) -> Self {
        self.listener(EventKind::LoadError, f)
    }

    pub fn on_play(self, f: impl Fn(&PlaybackEvent) + 'static) -> Self {
        self.listener(EventKind::Play, f)
    }

    pub fn on_loop(self, f: impl Fn(&PlaybackEvent) + 'static) -> Self {
        self.listener(EventKind::Loop, f)
    }
}

impl fmt::Debug for ControllerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerConfig")
            .field("options", &self.options)
            .field("canvas", &self.canvas)
            .field(
                "listeners",
                &self.listeners.iter().map(|(k, _)| *k).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Collaborators shared by every controller on a host.
#[derive(Clone)]
pub struct Services {
    pub engine: SharedEngine,
    pub fetcher: Rc<dyn AssetFetcher>,
    pub host: Rc<dyn Host>,
}

impl Services {
    pub fn new(engine: SharedEngine, fetcher: Rc<dyn AssetFetcher>, host: Rc<dyn Host>) -> Self {
        Self {
            engine,
            fetcher,
            host,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_accept_single_or_list_animations() {
        let one = PlaybackOptions::from_json(r#"{"src":"a.riv","animations":"idle"}"#).unwrap();
        assert_eq!(one.animation_names(), vec!["idle".to_string()]);
        assert!(!one.autoplay);

        let many = PlaybackOptions::from_json(
            r#"{"src":"a.riv","artboard":"Main","animations":["idle","blink"],"autoplay":true}"#,
        )
        .unwrap();
        assert_eq!(many.animation_names(), vec!["idle", "blink"]);
        assert_eq!(many.artboard.as_deref(), Some("Main"));
        assert!(many.autoplay);
    }

    #[test]
    fn blank_source_is_treated_as_missing() {
        assert_eq!(PlaybackOptions::default().source(), None);
        assert_eq!(PlaybackOptions::new("   ").source(), None);
        assert_eq!(PlaybackOptions::new("x.riv").source(), Some("x.riv"));
    }

    #[test]
    fn config_collects_initial_listeners() {
        let cfg = ControllerConfig::new(PlaybackOptions::new("x.riv"), CanvasTarget::new(()))
            .on_load(|_| {})
            .on_loop(|_| {})
            .on_loop(|_| {});
        let kinds: Vec<_> = cfg.listeners.iter().map(|(k, _)| *k).collect();
        assert_eq!(kinds, vec![EventKind::Load, EventKind::Loop, EventKind::Loop]);
    }
}
