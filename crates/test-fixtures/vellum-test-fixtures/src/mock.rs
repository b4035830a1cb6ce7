//! Scripted in-memory engine.
//!
//! Assets are JSON descriptions of artboards and animations. Every engine call is
//! written to a shared [`Journal`] so tests can assert call order, and any call can
//! be made to fail on demand.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use futures::future::{self, FutureExt, LocalBoxFuture};
use serde::Deserialize;

use vellum_playback::{
    Alignment, Animation, AnimationFile, AnimationInstance, Artboard, AssetFetcher, Bounds,
    CanvasTarget, EngineError, EngineHandle, EngineLoadError, EngineLoader, Fit, Renderer, Runtime,
};

#[derive(Clone, Debug, Deserialize)]
pub struct AssetDoc {
    pub artboards: Vec<ArtboardDoc>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ArtboardDoc {
    pub name: String,
    pub bounds: Bounds,
    #[serde(default)]
    pub animations: Vec<AnimationDoc>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AnimationDoc {
    pub name: String,
    /// Seconds.
    pub duration: f64,
    /// Raw engine loop index.
    #[serde(rename = "loop")]
    pub loop_value: i32,
}

/// Ordered record of engine calls, with optional failure injection.
#[derive(Clone, Debug, Default)]
pub struct Journal {
    entries: Rc<RefCell<Vec<String>>>,
    fail_on: Rc<RefCell<Option<String>>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call whose entry starts with `op` fail.
    pub fn fail_on(&self, op: &str) {
        *self.fail_on.borrow_mut() = Some(op.to_string());
    }

    pub fn record(&self, entry: String) -> Result<(), EngineError> {
        if let Some(op) = self.fail_on.borrow().as_deref() {
            if entry.starts_with(op) {
                return Err(EngineError::new(format!("injected failure: {entry}")));
            }
        }
        self.entries.borrow_mut().push(entry);
        Ok(())
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.borrow().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.entries
            .borrow()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .count()
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

/// Surface understood by [`MockRuntime::renderer`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MockCanvas {
    pub width: f64,
    pub height: f64,
}

impl MockCanvas {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn target(self) -> CanvasTarget {
        CanvasTarget::new(self)
    }
}

#[derive(Debug)]
pub struct MockRuntime {
    journal: Journal,
}

impl MockRuntime {
    pub fn new(journal: Journal) -> Self {
        Self { journal }
    }
}

impl Runtime for MockRuntime {
    fn load_file(&self, bytes: &[u8]) -> Result<Box<dyn AnimationFile>, EngineError> {
        let doc: AssetDoc = serde_json::from_slice(bytes)
            .map_err(|e| EngineError::new(format!("malformed asset: {e}")))?;
        self.journal.record("load_file".into())?;
        Ok(Box::new(MockFile {
            doc,
            journal: self.journal.clone(),
        }))
    }

    fn renderer(&self, canvas: &CanvasTarget) -> Result<Box<dyn Renderer>, EngineError> {
        let canvas = canvas
            .downcast_ref::<MockCanvas>()
            .ok_or_else(|| EngineError::new("unsupported canvas"))?;
        self.journal.record("renderer".into())?;
        Ok(Box::new(RecordingRenderer {
            canvas: *canvas,
            journal: self.journal.clone(),
        }))
    }

    fn instantiate(
        &self,
        animation: &dyn Animation,
    ) -> Result<Box<dyn AnimationInstance>, EngineError> {
        let doc = animation
            .as_any()
            .downcast_ref::<MockAnimation>()
            .ok_or_else(|| EngineError::new("foreign animation"))?
            .doc
            .clone();
        self.journal.record(format!("instantiate {}", doc.name))?;
        Ok(Box::new(MockInstance {
            doc,
            time: 0.0,
            direction: 1.0,
            did_loop: false,
            journal: self.journal.clone(),
        }))
    }
}

struct MockFile {
    doc: AssetDoc,
    journal: Journal,
}

impl MockFile {
    fn artboard_from(&self, doc: Option<&ArtboardDoc>) -> Option<Box<dyn Artboard>> {
        doc.map(|doc| {
            Box::new(MockArtboard {
                doc: doc.clone(),
                journal: self.journal.clone(),
            }) as Box<dyn Artboard>
        })
    }
}

impl AnimationFile for MockFile {
    fn default_artboard(&self) -> Result<Option<Box<dyn Artboard>>, EngineError> {
        Ok(self.artboard_from(self.doc.artboards.first()))
    }

    fn artboard(&self, name: &str) -> Result<Option<Box<dyn Artboard>>, EngineError> {
        Ok(self.artboard_from(self.doc.artboards.iter().find(|a| a.name == name)))
    }
}

pub struct MockArtboard {
    doc: ArtboardDoc,
    journal: Journal,
}

impl MockArtboard {
    fn animation(doc: Option<&AnimationDoc>) -> Option<Box<dyn Animation>> {
        doc.map(|doc| Box::new(MockAnimation { doc: doc.clone() }) as Box<dyn Animation>)
    }
}

impl Artboard for MockArtboard {
    fn name(&self) -> String {
        self.doc.name.clone()
    }

    fn animation_count(&self) -> Result<usize, EngineError> {
        Ok(self.doc.animations.len())
    }

    fn animation_by_name(&self, name: &str) -> Result<Option<Box<dyn Animation>>, EngineError> {
        Ok(Self::animation(
            self.doc.animations.iter().find(|a| a.name == name),
        ))
    }

    fn animation_at(&self, index: usize) -> Result<Option<Box<dyn Animation>>, EngineError> {
        Ok(Self::animation(self.doc.animations.get(index)))
    }

    fn advance(&mut self, elapsed: f64) -> Result<(), EngineError> {
        self.journal.record(format!("artboard.advance {elapsed:.3}"))
    }

    fn draw(&mut self, renderer: &mut dyn Renderer) -> Result<(), EngineError> {
        if renderer.as_any().downcast_ref::<RecordingRenderer>().is_none() {
            return Err(EngineError::new("foreign renderer"));
        }
        self.journal.record(format!("draw {}", self.doc.name))
    }

    fn bounds(&self) -> Result<Bounds, EngineError> {
        Ok(self.doc.bounds)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct MockAnimation {
    doc: AnimationDoc,
}

impl Animation for MockAnimation {
    fn name(&self) -> String {
        self.doc.name.clone()
    }

    fn loop_value(&self) -> i32 {
        self.doc.loop_value
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Time cursor with the usual wrap / reflect / clamp behaviour per loop index.
pub struct MockInstance {
    doc: AnimationDoc,
    time: f64,
    direction: f64,
    did_loop: bool,
    journal: Journal,
}

impl AnimationInstance for MockInstance {
    fn advance(&mut self, elapsed: f64) -> Result<(), EngineError> {
        self.journal
            .record(format!("advance {} {elapsed:.3}", self.doc.name))?;
        let duration = self.doc.duration;
        self.did_loop = false;
        if duration <= 0.0 {
            return Ok(());
        }
        match self.doc.loop_value {
            1 => {
                self.time += elapsed;
                if self.time >= duration {
                    self.time %= duration;
                    self.did_loop = true;
                }
            }
            2 => {
                self.time += elapsed * self.direction;
                if self.time >= duration {
                    self.time = 2.0 * duration - self.time;
                    self.direction = -1.0;
                    self.did_loop = true;
                } else if self.time <= 0.0 && self.direction < 0.0 {
                    self.time = -self.time;
                    self.direction = 1.0;
                    self.did_loop = true;
                }
            }
            _ => {
                let before = self.time;
                self.time = (self.time + elapsed).min(duration);
                self.did_loop = before < duration && self.time >= duration;
            }
        }
        Ok(())
    }

    fn did_loop(&self) -> Result<bool, EngineError> {
        Ok(self.did_loop)
    }

    fn apply(&mut self, artboard: &mut dyn Artboard, mix: f32) -> Result<(), EngineError> {
        let target = artboard
            .as_any()
            .downcast_ref::<MockArtboard>()
            .ok_or_else(|| EngineError::new("foreign artboard"))?;
        self.journal.record(format!(
            "apply {} {} {mix:.1}",
            self.doc.name, target.doc.name
        ))
    }
}

pub struct RecordingRenderer {
    canvas: MockCanvas,
    journal: Journal,
}

impl Renderer for RecordingRenderer {
    fn frame_bounds(&self) -> Result<Bounds, EngineError> {
        Ok(Bounds::from_size(self.canvas.width, self.canvas.height))
    }

    fn clear(&mut self) -> Result<(), EngineError> {
        self.journal.record("clear".into())
    }

    fn save(&mut self) -> Result<(), EngineError> {
        self.journal.record("save".into())
    }

    fn restore(&mut self) -> Result<(), EngineError> {
        self.journal.record("restore".into())
    }

    fn align(
        &mut self,
        fit: Fit,
        alignment: Alignment,
        frame: Bounds,
        content: Bounds,
    ) -> Result<(), EngineError> {
        self.journal.record(format!(
            "align {fit:?} {alignment:?} {}x{} {}x{}",
            frame.width(),
            frame.height(),
            content.width(),
            content.height()
        ))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Engine loader that counts loads and can be told to fail.
#[derive(Clone, Default)]
pub struct MockLoader {
    journal: Journal,
    calls: Rc<Cell<usize>>,
    failures: Rc<Cell<usize>>,
}

impl MockLoader {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            ..Self::default()
        }
    }

    /// Fail the next `n` loads.
    pub fn fail_next(&self, n: usize) {
        self.failures.set(n);
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl EngineLoader for MockLoader {
    fn load(&self) -> LocalBoxFuture<'static, Result<EngineHandle, EngineLoadError>> {
        self.calls.set(self.calls.get() + 1);
        if self.failures.get() > 0 {
            self.failures.set(self.failures.get() - 1);
            return future::ready(Err(EngineLoadError::new("engine bundle unavailable")))
                .boxed_local();
        }
        let runtime: EngineHandle = Rc::new(MockRuntime::new(self.journal.clone()));
        future::ready(Ok(runtime)).boxed_local()
    }
}

#[derive(Clone)]
enum FetchOutcome {
    Bytes(Vec<u8>),
    Fail(String),
    Hang,
}

/// Fetcher serving fixture bytes by locator.
#[derive(Default)]
pub struct MockFetcher {
    routes: RefCell<HashMap<String, FetchOutcome>>,
    calls: Cell<usize>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve every manifest asset as `<name>.riv`.
    pub fn with_fixtures() -> anyhow::Result<Self> {
        let fetcher = Self::new();
        for key in crate::assets::keys() {
            fetcher.serve(&format!("{key}.riv"), crate::assets::bytes(&key)?);
        }
        Ok(fetcher)
    }

    pub fn serve(&self, src: &str, bytes: Vec<u8>) {
        self.routes
            .borrow_mut()
            .insert(src.to_string(), FetchOutcome::Bytes(bytes));
    }

    pub fn fail(&self, src: &str, reason: &str) {
        self.routes
            .borrow_mut()
            .insert(src.to_string(), FetchOutcome::Fail(reason.to_string()));
    }

    /// Never resolve fetches for `src`.
    pub fn hang(&self, src: &str) {
        self.routes
            .borrow_mut()
            .insert(src.to_string(), FetchOutcome::Hang);
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl AssetFetcher for MockFetcher {
    fn fetch(&self, src: &str) -> LocalBoxFuture<'static, Result<Vec<u8>, String>> {
        self.calls.set(self.calls.get() + 1);
        let outcome = self
            .routes
            .borrow()
            .get(src)
            .cloned()
            .unwrap_or_else(|| FetchOutcome::Fail(format!("404 not found: {src}")));
        match outcome {
            FetchOutcome::Bytes(bytes) => future::ready(Ok(bytes)).boxed_local(),
            FetchOutcome::Fail(reason) => future::ready(Err(reason)).boxed_local(),
            FetchOutcome::Hang => future::pending().boxed_local(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(loop_value: i32, duration: f64) -> MockInstance {
        MockInstance {
            doc: AnimationDoc {
                name: "a".into(),
                duration,
                loop_value,
            },
            time: 0.0,
            direction: 1.0,
            did_loop: false,
            journal: Journal::new(),
        }
    }

    #[test]
    fn looping_instance_signals_on_wrap() {
        let mut inst = instance(1, 1.0);
        inst.advance(0.6).unwrap();
        assert!(!inst.did_loop().unwrap());
        inst.advance(0.6).unwrap();
        assert!(inst.did_loop().unwrap());
        assert!((inst.time - 0.2).abs() < 1e-9);
    }

    #[test]
    fn ping_pong_instance_signals_at_both_ends() {
        let mut inst = instance(2, 1.0);
        inst.advance(1.2).unwrap();
        assert!(inst.did_loop().unwrap());
        assert!(inst.direction < 0.0);
        inst.advance(0.5).unwrap();
        assert!(!inst.did_loop().unwrap());
        inst.advance(0.5).unwrap();
        assert!(inst.did_loop().unwrap());
        assert!(inst.direction > 0.0);
    }

    #[test]
    fn one_shot_signals_once_at_end() {
        let mut inst = instance(0, 1.0);
        inst.advance(1.5).unwrap();
        assert!(inst.did_loop().unwrap());
        inst.advance(1.0).unwrap();
        assert!(!inst.did_loop().unwrap());
    }

    #[test]
    fn journal_failure_injection() {
        let journal = Journal::new();
        journal.record("clear".into()).unwrap();
        journal.fail_on("draw");
        assert!(journal.record("draw Main".into()).is_err());
        assert!(journal.record("clear".into()).is_ok());
        assert_eq!(journal.count("clear"), 2);
    }
}
