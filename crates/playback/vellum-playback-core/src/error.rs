//! Error types for the playback controller

use serde::{Deserialize, Serialize};

/// Comprehensive error type for playback operations.
///
/// Errors are `Clone` because a single load outcome is shared between every
/// caller awaiting [`crate::Controller::when_loaded`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum PlaybackError {
    /// No animation source was supplied
    #[error("Animation source is required")]
    MissingSource,

    /// Playback options could not be parsed
    #[error("Invalid playback options: {reason}")]
    InvalidOptions { reason: String },

    /// Engine bundle could not be obtained
    #[error("Engine failed to load: {reason}")]
    EngineLoad { reason: String },

    /// Animation asset could not be fetched
    #[error("Failed to fetch animation asset {src}: {reason}")]
    AssetFetch { src: String, reason: String },

    /// Animation asset was fetched but the engine rejected it
    #[error("Failed to parse animation asset {src}: {reason}")]
    AssetParse { src: String, reason: String },

    /// Requested artboard does not exist in the file
    #[error("Artboard not found: {name}")]
    ArtboardNotFound { name: String },

    /// Selected artboard defines no animations
    #[error("Artboard {artboard} has no animations")]
    NoAnimations { artboard: String },

    /// Requested animation does not exist on the artboard
    #[error("Animation {name} not found on artboard {artboard}")]
    AnimationNotFound { artboard: String, name: String },

    /// Loop mode index outside the recognised values
    #[error("Invalid loop value: {value}")]
    InvalidLoopValue { value: i32 },

    /// Error raised by the external engine
    #[error("Engine error: {reason}")]
    Engine { reason: String },
}

impl PlaybackError {
    /// Whether the error belongs to the load phase (engine, fetch, parse).
    #[inline]
    pub fn is_load_error(&self) -> bool {
        matches!(
            self,
            Self::EngineLoad { .. } | Self::AssetFetch { .. } | Self::AssetParse { .. }
        )
    }

    /// Get error category for logging
    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::MissingSource | Self::InvalidOptions { .. } => "config",
            Self::EngineLoad { .. } => "engine",
            Self::AssetFetch { .. } => "network",
            Self::AssetParse { .. } => "asset",
            Self::ArtboardNotFound { .. }
            | Self::NoAnimations { .. }
            | Self::AnimationNotFound { .. } => "setup",
            Self::InvalidLoopValue { .. } => "validation",
            Self::Engine { .. } => "runtime",
        }
    }
}

/// Error reported by an engine binding.
///
/// Engine calls are opaque, so only a message is carried across the seam.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct EngineError {
    pub message: String,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<EngineError> for PlaybackError {
    fn from(err: EngineError) -> Self {
        Self::Engine {
            reason: err.message,
        }
    }
}

/// The engine bundle could not be obtained.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct EngineLoadError {
    pub reason: String,
}

impl EngineLoadError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl From<EngineLoadError> for PlaybackError {
    fn from(err: EngineLoadError) -> Self {
        Self::EngineLoad { reason: err.reason }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_error_classification() {
        let fetch = PlaybackError::AssetFetch {
            src: "a.riv".into(),
            reason: "404".into(),
        };
        assert!(fetch.is_load_error());
        assert_eq!(fetch.category(), "network");

        let setup = PlaybackError::NoAnimations {
            artboard: "Main".into(),
        };
        assert!(!setup.is_load_error());
        assert_eq!(setup.category(), "setup");
    }

    #[test]
    fn test_engine_error_conversion() {
        let err: PlaybackError = EngineError::new("draw failed").into();
        assert_eq!(
            err,
            PlaybackError::Engine {
                reason: "draw failed".into()
            }
        );
        let err: PlaybackError = EngineLoadError::new("bundle 500").into();
        assert_eq!(err.to_string(), "Engine failed to load: bundle 500");
    }

    #[test]
    fn test_serialization() {
        let error = PlaybackError::InvalidLoopValue { value: 7 };
        let serialized = serde_json::to_string(&error).unwrap();
        let deserialized: PlaybackError = serde_json::from_str(&serialized).unwrap();
        assert_eq!(error, deserialized);
    }
}
