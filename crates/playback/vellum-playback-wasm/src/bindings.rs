//! Core engine traits backed by a JavaScript vector-animation runtime.
//!
//! The runtime module is any object exposing `load(bytes)`, `CanvasRenderer`,
//! `LinearAnimationInstance`, and the `Fit` / `Alignment` lookup tables. Files,
//! artboards, animations and instances are opaque JS objects driven by method
//! name through `Reflect`.

use std::any::Any;
use std::rc::Rc;

use futures::future::{self, FutureExt, LocalBoxFuture};
use js_sys::{Array, Function, Promise, Reflect, Uint8Array};
use serde_wasm_bindgen as swb;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::HtmlCanvasElement;

use vellum_playback::{
    Alignment, Animation, AnimationFile, AnimationInstance, Artboard, Bounds, CanvasTarget,
    EngineError, EngineHandle, EngineLoadError, EngineLoader, Fit, Renderer, Runtime,
};

/// Readable message for a thrown JS value.
pub(crate) fn describe(value: &JsValue) -> String {
    if let Some(err) = value.dyn_ref::<js_sys::Error>() {
        return String::from(err.message());
    }
    value.as_string().unwrap_or_else(|| format!("{value:?}"))
}

fn js_err(op: &str, value: JsValue) -> EngineError {
    EngineError::new(format!("{op}: {}", describe(&value)))
}

fn get(target: &JsValue, key: &str) -> Result<JsValue, EngineError> {
    Reflect::get(target, &JsValue::from_str(key)).map_err(|e| js_err(key, e))
}

fn function(target: &JsValue, key: &str) -> Result<Function, EngineError> {
    get(target, key)?
        .dyn_into::<Function>()
        .map_err(|_| EngineError::new(format!("{key} is not a function")))
}

fn call(target: &JsValue, method: &str, args: &[JsValue]) -> Result<JsValue, EngineError> {
    let f = function(target, method)?;
    let args: Array = args.iter().collect();
    Reflect::apply(&f, target, &args).map_err(|e| js_err(method, e))
}

fn construct(module: &JsValue, class: &str, args: &[JsValue]) -> Result<JsValue, EngineError> {
    let ctor = function(module, class)?;
    let args: Array = args.iter().collect();
    Reflect::construct(&ctor, &args).map_err(|e| js_err(class, e))
}

fn optional(value: JsValue) -> Option<JsValue> {
    if value.is_undefined() || value.is_null() {
        None
    } else {
        Some(value)
    }
}

/// Resolves the engine module by calling a JS loader that returns it or a Promise of it.
pub struct JsEngineLoader {
    loader: Function,
}

impl JsEngineLoader {
    pub fn new(loader: Function) -> Self {
        Self { loader }
    }
}

impl EngineLoader for JsEngineLoader {
    fn load(&self) -> LocalBoxFuture<'static, Result<EngineHandle, EngineLoadError>> {
        let pending = match self.loader.call0(&JsValue::UNDEFINED) {
            Ok(value) => Promise::resolve(&value),
            Err(e) => return future::ready(Err(EngineLoadError::new(describe(&e)))).boxed_local(),
        };
        async move {
            let module = JsFuture::from(pending)
                .await
                .map_err(|e| EngineLoadError::new(describe(&e)))?;
            if optional(module.clone()).is_none() {
                return Err(EngineLoadError::new("engine loader resolved to nothing"));
            }
            let runtime: EngineHandle = Rc::new(JsRuntime { module });
            Ok(runtime)
        }
        .boxed_local()
    }
}

pub struct JsRuntime {
    module: JsValue,
}

impl Runtime for JsRuntime {
    fn load_file(&self, bytes: &[u8]) -> Result<Box<dyn AnimationFile>, EngineError> {
        let data = Uint8Array::from(bytes);
        let raw = optional(call(&self.module, "load", &[data.into()])?)
            .ok_or_else(|| EngineError::new("engine rejected the asset"))?;
        Ok(Box::new(JsFile { raw }))
    }

    fn renderer(&self, canvas: &CanvasTarget) -> Result<Box<dyn Renderer>, EngineError> {
        let canvas = canvas
            .downcast_ref::<HtmlCanvasElement>()
            .ok_or_else(|| EngineError::new("canvas is not an HTMLCanvasElement"))?
            .clone();
        let context = canvas
            .get_context("2d")
            .map_err(|e| js_err("getContext", e))?
            .ok_or_else(|| EngineError::new("2d context unavailable"))?;
        let raw = construct(&self.module, "CanvasRenderer", &[context.into()])?;
        Ok(Box::new(JsRenderer {
            raw,
            canvas,
            fits: get(&self.module, "Fit")?,
            alignments: get(&self.module, "Alignment")?,
        }))
    }

    fn instantiate(
        &self,
        animation: &dyn Animation,
    ) -> Result<Box<dyn AnimationInstance>, EngineError> {
        let animation = animation
            .as_any()
            .downcast_ref::<JsAnimation>()
            .ok_or_else(|| EngineError::new("animation does not belong to this engine"))?;
        let raw = construct(
            &self.module,
            "LinearAnimationInstance",
            &[animation.raw.clone()],
        )?;
        Ok(Box::new(JsInstance { raw }))
    }
}

struct JsFile {
    raw: JsValue,
}

impl JsFile {
    fn wrap(value: JsValue) -> Option<Box<dyn Artboard>> {
        optional(value).map(|raw| Box::new(JsArtboard { raw }) as Box<dyn Artboard>)
    }
}

impl AnimationFile for JsFile {
    fn default_artboard(&self) -> Result<Option<Box<dyn Artboard>>, EngineError> {
        Ok(Self::wrap(call(&self.raw, "defaultArtboard", &[])?))
    }

    fn artboard(&self, name: &str) -> Result<Option<Box<dyn Artboard>>, EngineError> {
        Ok(Self::wrap(call(
            &self.raw,
            "artboardByName",
            &[JsValue::from_str(name)],
        )?))
    }
}

struct JsArtboard {
    raw: JsValue,
}

impl JsArtboard {
    fn wrap(value: JsValue) -> Option<Box<dyn Animation>> {
        optional(value).map(|raw| Box::new(JsAnimation { raw }) as Box<dyn Animation>)
    }
}

impl Artboard for JsArtboard {
    fn name(&self) -> String {
        get(&self.raw, "name")
            .ok()
            .and_then(|v| v.as_string())
            .unwrap_or_default()
    }

    fn animation_count(&self) -> Result<usize, EngineError> {
        let count = call(&self.raw, "animationCount", &[])?;
        count
            .as_f64()
            .map(|n| n.max(0.0) as usize)
            .ok_or_else(|| EngineError::new("animationCount did not return a number"))
    }

    fn animation_by_name(&self, name: &str) -> Result<Option<Box<dyn Animation>>, EngineError> {
        Ok(Self::wrap(call(
            &self.raw,
            "animationByName",
            &[JsValue::from_str(name)],
        )?))
    }

    fn animation_at(&self, index: usize) -> Result<Option<Box<dyn Animation>>, EngineError> {
        Ok(Self::wrap(call(
            &self.raw,
            "animationByIndex",
            &[JsValue::from_f64(index as f64)],
        )?))
    }

    fn advance(&mut self, elapsed: f64) -> Result<(), EngineError> {
        call(&self.raw, "advance", &[JsValue::from_f64(elapsed)]).map(drop)
    }

    fn draw(&mut self, renderer: &mut dyn Renderer) -> Result<(), EngineError> {
        let renderer = renderer
            .as_any()
            .downcast_ref::<JsRenderer>()
            .ok_or_else(|| EngineError::new("renderer does not belong to this engine"))?;
        call(&self.raw, "draw", &[renderer.raw.clone()]).map(drop)
    }

    fn bounds(&self) -> Result<Bounds, EngineError> {
        let bounds = get(&self.raw, "bounds")?;
        swb::from_value(bounds).map_err(|e| EngineError::new(format!("bounds: {e}")))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct JsAnimation {
    raw: JsValue,
}

impl Animation for JsAnimation {
    fn name(&self) -> String {
        get(&self.raw, "name")
            .ok()
            .and_then(|v| v.as_string())
            .unwrap_or_default()
    }

    fn loop_value(&self) -> i32 {
        // missing values surface as an invalid loop mode
        get(&self.raw, "loopValue")
            .ok()
            .and_then(|v| v.as_f64())
            .map(|n| n as i32)
            .unwrap_or(-1)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct JsInstance {
    raw: JsValue,
}

impl AnimationInstance for JsInstance {
    fn advance(&mut self, elapsed: f64) -> Result<(), EngineError> {
        call(&self.raw, "advance", &[JsValue::from_f64(elapsed)]).map(drop)
    }

    fn did_loop(&self) -> Result<bool, EngineError> {
        Ok(get(&self.raw, "didLoop")?.is_truthy())
    }

    fn apply(&mut self, artboard: &mut dyn Artboard, mix: f32) -> Result<(), EngineError> {
        let artboard = artboard
            .as_any()
            .downcast_ref::<JsArtboard>()
            .ok_or_else(|| EngineError::new("artboard does not belong to this engine"))?;
        call(
            &self.raw,
            "apply",
            &[artboard.raw.clone(), JsValue::from_f64(f64::from(mix))],
        )
        .map(drop)
    }
}

struct JsRenderer {
    raw: JsValue,
    canvas: HtmlCanvasElement,
    fits: JsValue,
    alignments: JsValue,
}

/// Lookup key of an enum in the engine's tables, e.g. `Fit.contain`.
fn table_key<T: serde::Serialize>(value: T) -> Result<String, EngineError> {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(str::to_owned))
        .ok_or_else(|| EngineError::new("unnamed layout value"))
}

fn bounds_value(bounds: Bounds) -> Result<JsValue, EngineError> {
    swb::to_value(&bounds).map_err(|e| EngineError::new(format!("bounds: {e}")))
}

impl Renderer for JsRenderer {
    fn frame_bounds(&self) -> Result<Bounds, EngineError> {
        Ok(Bounds::from_size(
            f64::from(self.canvas.width()),
            f64::from(self.canvas.height()),
        ))
    }

    fn clear(&mut self) -> Result<(), EngineError> {
        call(&self.raw, "clear", &[]).map(drop)
    }

    fn save(&mut self) -> Result<(), EngineError> {
        call(&self.raw, "save", &[]).map(drop)
    }

    fn restore(&mut self) -> Result<(), EngineError> {
        call(&self.raw, "restore", &[]).map(drop)
    }

    fn align(
        &mut self,
        fit: Fit,
        alignment: Alignment,
        frame: Bounds,
        content: Bounds,
    ) -> Result<(), EngineError> {
        let fit = get(&self.fits, &table_key(fit)?)?;
        let alignment = get(&self.alignments, &table_key(alignment)?)?;
        call(
            &self.raw,
            "align",
            &[fit, alignment, bounds_value(frame)?, bounds_value(content)?],
        )
        .map(drop)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
