use std::cell::RefCell;
use std::rc::Rc;
use std::str::FromStr;
use std::sync::Once;

use js_sys::{Function, Promise, Reflect};
use log::{error, warn};
use serde_wasm_bindgen as swb;
use wasm_bindgen::prelude::*;
use web_sys::HtmlCanvasElement;

use vellum_playback::{
    CanvasTarget, Controller, ControllerConfig, EventKind, LoopState, PlaybackEvent,
    PlaybackOptions, Services, SharedEngine,
};

mod bindings;
mod host;

pub use bindings::{JsEngineLoader, JsRuntime};
pub use host::{FetchAssets, WebHost};

thread_local! {
    static ENGINE: RefCell<Option<SharedEngine>> = RefCell::new(None);
}

static LOGGING: Once = Once::new();

/// Route `log` records to the browser console and install the panic hook.
#[wasm_bindgen(js_name = initLogging)]
pub fn init_logging() {
    LOGGING.call_once(|| {
        wasm_logger::init(wasm_logger::Config::default());
        console_error_panic_hook::set_once();
    });
}

/// Install the engine loader shared by every player on this thread.
///
/// `loader()` must return the engine module or a Promise of it. Only the first
/// installed loader is used; returns false if one was already present.
#[wasm_bindgen(js_name = initEngine)]
pub fn init_engine(loader: Function) -> bool {
    init_logging();
    ENGINE.with(|slot| {
        let mut slot = slot.borrow_mut();
        if slot.is_some() {
            warn!("engine loader already installed; ignoring");
            return false;
        }
        *slot = Some(SharedEngine::new(JsEngineLoader::new(loader)));
        true
    })
}

fn shared_engine() -> Result<SharedEngine, JsError> {
    ENGINE
        .with(|slot| slot.borrow().clone())
        .ok_or_else(|| JsError::new("engine loader not installed; call initEngine first"))
}

fn jsvalue_is_undefined_or_null(v: &JsValue) -> bool {
    v.is_undefined() || v.is_null()
}

/// Listener payload: the loop details for `loop`, `{ type, .. }` otherwise.
fn event_payload(event: &PlaybackEvent) -> JsValue {
    let value = match event {
        PlaybackEvent::Loop(details) => swb::to_value(details),
        other => swb::to_value(other),
    };
    value.unwrap_or_else(|e| {
        error!("event payload error: {e}");
        JsValue::UNDEFINED
    })
}

fn js_listener(callback: Function) -> impl Fn(&PlaybackEvent) + 'static {
    move |event: &PlaybackEvent| {
        if let Err(e) = callback.call1(&JsValue::NULL, &event_payload(event)) {
            error!("{} listener threw: {}", event.kind(), bindings::describe(&e));
        }
    }
}

/// Plays one animation asset on one canvas.
///
/// ```javascript
/// initEngine(() => import("./engine.js"));
/// const player = new VellumPlayer({
///   src: "hero.riv",
///   canvas: document.querySelector("canvas"),
///   autoplay: true,
///   onloop: (e) => console.log(e.animationName, e.loopMode),
/// });
/// ```
#[wasm_bindgen]
pub struct VellumPlayer {
    controller: Controller,
}

#[wasm_bindgen]
impl VellumPlayer {
    /// Options: `src`, `canvas`, and optionally `artboard`, `animations`,
    /// `autoplay`, `onload`, `onloaderror`, `onplay`, `onloop`.
    #[wasm_bindgen(constructor)]
    pub fn new(options: JsValue) -> Result<VellumPlayer, JsError> {
        init_logging();
        if jsvalue_is_undefined_or_null(&options) {
            return Err(JsError::new("options are required"));
        }
        let parsed: PlaybackOptions = swb::from_value(options.clone())
            .map_err(|e| JsError::new(&format!("options error: {e}")))?;
        let canvas: HtmlCanvasElement = Reflect::get(&options, &JsValue::from_str("canvas"))
            .ok()
            .and_then(|c| c.dyn_into().ok())
            .ok_or_else(|| JsError::new("options.canvas must be an HTMLCanvasElement"))?;

        let mut config = ControllerConfig::new(parsed, CanvasTarget::new(canvas));
        for kind in EventKind::ALL {
            let key = JsValue::from_str(&format!("on{kind}"));
            if let Some(callback) = Reflect::get(&options, &key)
                .ok()
                .and_then(|v| v.dyn_into::<Function>().ok())
            {
                config = config.listener(kind, js_listener(callback));
            }
        }

        let services = Services::new(
            shared_engine()?,
            Rc::new(FetchAssets),
            Rc::new(WebHost),
        );
        Ok(VellumPlayer {
            controller: Controller::new(config, services),
        })
    }

    /// Start playback, or queue it until the asset has loaded.
    pub fn play(&self) -> Result<(), JsError> {
        self.controller
            .play()
            .map_err(|e| JsError::new(&e.to_string()))
    }

    pub fn pause(&self) {
        self.controller.pause();
    }

    /// Register a listener and return the player for chaining. Unknown event
    /// names and non-function callbacks are ignored.
    pub fn on(&self, event: &str, callback: JsValue) -> VellumPlayer {
        let chained = VellumPlayer {
            controller: self.controller.clone(),
        };
        let Ok(kind) = EventKind::from_str(event) else {
            warn!("ignoring listener for unknown event {event:?}");
            return chained;
        };
        let Ok(callback) = callback.dyn_into::<Function>() else {
            warn!("ignoring non-function {kind} listener");
            return chained;
        };
        self.controller.on(kind, js_listener(callback));
        chained
    }

    /// Listeners registered for `event`; zero for unknown names.
    #[wasm_bindgen(js_name = listenerCount)]
    pub fn listener_count(&self, event: &str) -> usize {
        EventKind::from_str(event)
            .map(|kind| self.controller.listener_count(kind))
            .unwrap_or(0)
    }

    #[wasm_bindgen(getter, js_name = isLoaded)]
    pub fn is_loaded(&self) -> bool {
        self.controller.is_loaded()
    }

    #[wasm_bindgen(getter, js_name = isPlaying)]
    pub fn is_playing(&self) -> bool {
        self.controller.playback_state() == LoopState::Running
    }

    /// Names of the animations currently playing.
    #[wasm_bindgen(getter)]
    pub fn animations(&self) -> Vec<String> {
        self.controller.animation_names()
    }

    #[wasm_bindgen(getter)]
    pub fn id(&self) -> String {
        self.controller.id().to_string()
    }

    /// Promise settled with the load outcome.
    pub fn loaded(&self) -> Promise {
        let load = self.controller.when_loaded();
        wasm_bindgen_futures::future_to_promise(async move {
            load.await
                .map(|_| JsValue::UNDEFINED)
                .map_err(|e| JsError::new(&e.to_string()).into())
        })
    }
}

/// Numeric ABI version for compatibility checks at init.
#[wasm_bindgen]
pub fn abi_version() -> u32 {
    1
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::*;
    use vellum_playback::LoopEvent;
    use wasm_bindgen_test::*;

    fn field(value: &JsValue, key: &str) -> JsValue {
        Reflect::get(value, &JsValue::from_str(key)).unwrap()
    }

    #[wasm_bindgen_test]
    fn loop_payload_is_the_bare_loop_details() {
        let event = PlaybackEvent::Loop(LoopEvent::new("bounce", 2).unwrap());
        let payload = event_payload(&event);
        assert_eq!(field(&payload, "animationName").as_string().as_deref(), Some("bounce"));
        assert_eq!(field(&payload, "loopMode").as_string().as_deref(), Some("pingPong"));
        assert!(field(&payload, "type").is_undefined());
    }

    #[wasm_bindgen_test]
    fn other_payloads_carry_their_type() {
        let payload = event_payload(&PlaybackEvent::LoadError {
            message: "Artboard not found: Main".into(),
        });
        assert_eq!(field(&payload, "type").as_string().as_deref(), Some("loaderror"));
        assert_eq!(
            field(&payload, "message").as_string().as_deref(),
            Some("Artboard not found: Main")
        );
        let play = event_payload(&PlaybackEvent::Play);
        assert_eq!(field(&play, "type").as_string().as_deref(), Some("play"));
    }
}
