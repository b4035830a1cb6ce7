//! Contracts for the external collaborators the controller drives.
//!
//! The animation engine (file decoding, artboards, instances, rendering), the
//! asset fetch and the host's task/frame scheduling are all black boxes. Adapters
//! (wasm, test fixtures) implement these traits; the core only orchestrates.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Axis-aligned rectangle in engine or canvas pixel space.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Bounds of a surface with the origin at zero.
    pub fn from_size(width: f64, height: f64) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

/// How artboard content is scaled into the canvas frame.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Fit {
    Fill,
    Contain,
    Cover,
    FitWidth,
    FitHeight,
    None,
    ScaleDown,
}

/// Where scaled content is placed inside the canvas frame.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Alignment {
    TopLeft,
    TopCenter,
    TopRight,
    CenterLeft,
    Center,
    CenterRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
}

/// Type-erased handle to the drawable surface a controller renders into.
///
/// The runtime that creates the renderer downcasts it to the surface type it
/// understands (an `HtmlCanvasElement` on the web, a recording surface in tests).
#[derive(Clone)]
pub struct CanvasTarget(Rc<dyn Any>);

impl CanvasTarget {
    pub fn new<T: Any>(surface: T) -> Self {
        Self(Rc::new(surface))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl fmt::Debug for CanvasTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CanvasTarget(..)")
    }
}

/// The loaded engine: factory for files, renderers and animation instances.
pub trait Runtime {
    /// Decode an animation asset.
    fn load_file(&self, bytes: &[u8]) -> Result<Box<dyn AnimationFile>, EngineError>;

    /// Create a renderer bound to the given surface.
    fn renderer(&self, canvas: &CanvasTarget) -> Result<Box<dyn Renderer>, EngineError>;

    /// Create a playback cursor for an animation definition.
    fn instantiate(&self, animation: &dyn Animation)
        -> Result<Box<dyn AnimationInstance>, EngineError>;
}

/// A parsed animation asset.
pub trait AnimationFile {
    fn default_artboard(&self) -> Result<Option<Box<dyn Artboard>>, EngineError>;
    fn artboard(&self, name: &str) -> Result<Option<Box<dyn Artboard>>, EngineError>;
}

/// Named container of animations within a file.
pub trait Artboard {
    fn name(&self) -> String;
    fn animation_count(&self) -> Result<usize, EngineError>;
    fn animation_by_name(&self, name: &str) -> Result<Option<Box<dyn Animation>>, EngineError>;
    fn animation_at(&self, index: usize) -> Result<Option<Box<dyn Animation>>, EngineError>;
    fn advance(&mut self, elapsed: f64) -> Result<(), EngineError>;
    fn draw(&mut self, renderer: &mut dyn Renderer) -> Result<(), EngineError>;
    fn bounds(&self) -> Result<Bounds, EngineError>;
    fn as_any(&self) -> &dyn Any;
}

/// Animation definition on an artboard.
pub trait Animation {
    fn name(&self) -> String;
    /// Raw loop index as declared by the engine (0 oneShot, 1 loop, 2 pingPong).
    fn loop_value(&self) -> i32;
    fn as_any(&self) -> &dyn Any;
}

/// Time-advancing playback cursor derived from an [`Animation`].
pub trait AnimationInstance {
    fn advance(&mut self, elapsed: f64) -> Result<(), EngineError>;
    /// Whether the last `advance` wrapped around or changed direction.
    fn did_loop(&self) -> Result<bool, EngineError>;
    fn apply(&mut self, artboard: &mut dyn Artboard, mix: f32) -> Result<(), EngineError>;
}

/// Drawing context targeting a canvas.
pub trait Renderer {
    /// Pixel bounds of the underlying canvas.
    fn frame_bounds(&self) -> Result<Bounds, EngineError>;
    fn clear(&mut self) -> Result<(), EngineError>;
    fn save(&mut self) -> Result<(), EngineError>;
    fn restore(&mut self) -> Result<(), EngineError>;
    fn align(
        &mut self,
        fit: Fit,
        alignment: Alignment,
        frame: Bounds,
        content: Bounds,
    ) -> Result<(), EngineError>;
    fn as_any(&self) -> &dyn Any;
}

/// Retrieves animation assets by locator.
pub trait AssetFetcher {
    fn fetch(&self, src: &str) -> LocalBoxFuture<'static, Result<Vec<u8>, String>>;
}

/// The host's cooperative scheduling primitives.
pub trait Host {
    /// Run a task independently of the caller, after the caller's synchronous work.
    fn spawn(&self, task: LocalBoxFuture<'static, ()>);

    /// Invoke `callback` once on the next display refresh with a millisecond timestamp.
    fn request_frame(&self, callback: Box<dyn FnOnce(f64)>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_size() {
        let b = Bounds::new(10.0, 20.0, 110.0, 70.0);
        assert_eq!(b.width(), 100.0);
        assert_eq!(b.height(), 50.0);
        assert_eq!(Bounds::from_size(4.0, 3.0).max_x, 4.0);
    }

    #[test]
    fn canvas_target_downcasts_to_its_surface() {
        let target = CanvasTarget::new(String::from("canvas#main"));
        assert_eq!(
            target.downcast_ref::<String>().map(String::as_str),
            Some("canvas#main")
        );
        assert!(target.downcast_ref::<u32>().is_none());
    }

    #[test]
    fn fit_serializes_camel_case() {
        assert_eq!(serde_json::to_string(&Fit::Contain).unwrap(), "\"contain\"");
        assert_eq!(
            serde_json::to_string(&Alignment::Center).unwrap(),
            "\"center\""
        );
    }
}
