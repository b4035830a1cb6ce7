//! Vellum Playback Core (engine-agnostic)
//!
//! Orchestrates playback of vector animations rendered by an external engine:
//! asynchronous engine and asset loading, a milestone-gated task queue for
//! caller actions issued before load completes, lifecycle event dispatch, and a
//! per-frame update/render loop that reports semantic loop completions.
//!
//! The engine, the asset fetch and the host's scheduling primitives are
//! consumed through the traits in [`runtime`]; adapters (wasm, test fixtures)
//! provide the implementations.

pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod events;
pub mod frame;
pub mod loops;
pub mod runtime;
pub mod tasks;

// Re-exports for consumers (adapters)
pub use config::{AnimationSelection, ControllerConfig, PlaybackOptions, Services};
pub use controller::Controller;
pub use engine::{EngineHandle, EngineLoader, SharedEngine};
pub use error::{EngineError, EngineLoadError, PlaybackError};
pub use events::{EventBus, EventKind, Listener, PlaybackEvent, UnknownEvent};
pub use frame::{LoopState, PlaybackLoop, PlaybackSession};
pub use loops::{LoopClassifier, LoopEvent, LoopMode};
pub use runtime::{
    Alignment, Animation, AnimationFile, AnimationInstance, Artboard, AssetFetcher, Bounds,
    CanvasTarget, Fit, Host, Renderer, Runtime,
};
pub use tasks::{Task, TaskQueue};

/// Playback result type
pub type Result<T> = core::result::Result<T, PlaybackError>;
