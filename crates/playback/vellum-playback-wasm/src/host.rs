//! Browser scheduling and asset fetch.

use futures::future::{FutureExt, LocalBoxFuture};
use js_sys::Uint8Array;
use log::error;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{spawn_local, JsFuture};
use web_sys::Response;

use vellum_playback::{AssetFetcher, Host};

use crate::bindings::describe;

/// Microtask spawning and `requestAnimationFrame`.
#[derive(Debug, Default)]
pub struct WebHost;

impl Host for WebHost {
    fn spawn(&self, task: LocalBoxFuture<'static, ()>) {
        spawn_local(task);
    }

    fn request_frame(&self, callback: Box<dyn FnOnce(f64)>) {
        let Some(window) = web_sys::window() else {
            error!("requestAnimationFrame unavailable: no window");
            return;
        };
        let closure = Closure::once_into_js(move |now: f64| callback(now));
        if let Err(e) = window.request_animation_frame(closure.unchecked_ref()) {
            error!("requestAnimationFrame failed: {}", describe(&e));
        }
    }
}

/// `window.fetch` into an `ArrayBuffer`.
#[derive(Debug, Default)]
pub struct FetchAssets;

impl AssetFetcher for FetchAssets {
    fn fetch(&self, src: &str) -> LocalBoxFuture<'static, Result<Vec<u8>, String>> {
        let src = src.to_string();
        async move {
            let window = web_sys::window().ok_or_else(|| "fetch unavailable: no window".to_string())?;
            let response = JsFuture::from(window.fetch_with_str(&src))
                .await
                .map_err(|e| describe(&e))?;
            let response: Response = response
                .dyn_into()
                .map_err(|_| "fetch did not return a Response".to_string())?;
            if !response.ok() {
                return Err(format!("HTTP {} {}", response.status(), response.status_text()));
            }
            let buffer = response.array_buffer().map_err(|e| describe(&e))?;
            let buffer = JsFuture::from(buffer).await.map_err(|e| describe(&e))?;
            Ok(Uint8Array::new(&buffer).to_vec())
        }
        .boxed_local()
    }
}
