//! Browser bindings
//!
//! The page owns the animation loop and the canvas; it calls `frame` once
//! per `requestAnimationFrame` and draws from `render_snapshot`.

use wasm_bindgen::prelude::*;

use super::{
    events_json, has_seed, render_json, saturating_u32, settings_or_default, stats_json,
};
use crate::settings::PolicyMode;
use crate::sim::Viewport;
use crate::trainer::Sandbox;

fn to_js(err: serde_json::Error) -> JsValue {
    JsValue::from_str(&err.to_string())
}

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    // Fails only if a logger is already installed
    if console_log::init_with_level(log::Level::Info).is_ok() {
        log::info!("Arm Juggler starting...");
    }
}

#[wasm_bindgen]
pub struct WebSandbox {
    inner: Sandbox,
}

#[wasm_bindgen]
impl WebSandbox {
    /// `settings_json` may be omitted or partial; without a `seed` the clock seeds the run
    #[wasm_bindgen(constructor)]
    pub fn new(width: f32, height: f32, settings_json: Option<String>) -> WebSandbox {
        let json = settings_json.as_deref();
        let mut settings = settings_or_default(json);
        if !json.is_some_and(has_seed) {
            settings.seed = js_sys::Date::now() as u64;
        }
        WebSandbox {
            inner: Sandbox::new(settings, Viewport::new(width, height)),
        }
    }

    /// Advance by `dt` seconds; returns the finished episodes as a JSON array
    pub fn frame(&mut self, dt: f32) -> Result<String, JsValue> {
        let events = self.inner.frame(dt);
        events_json(&events).map_err(to_js)
    }

    pub fn render_snapshot(&self) -> Result<String, JsValue> {
        render_json(&self.inner).map_err(to_js)
    }

    pub fn stats(&self) -> Result<String, JsValue> {
        stats_json(&self.inner).map_err(to_js)
    }

    pub fn settings(&self) -> Result<String, JsValue> {
        self.inner.settings().to_json().map_err(to_js)
    }

    pub fn reset_episode(&mut self) {
        self.inner.reset_episode();
    }

    pub fn resize(&mut self, width: f32, height: f32) {
        self.inner.resize(width, height);
    }

    pub fn start_training(&mut self) {
        self.inner.start_training();
    }

    pub fn stop_training(&mut self) {
        self.inner.stop_training();
    }

    pub fn is_training(&self) -> bool {
        self.inner.is_training()
    }

    /// Accepts "ppo" or "pg"/"reinforce"; returns false for unknown names
    pub fn set_policy_mode(&mut self, mode: &str) -> bool {
        match PolicyMode::from_str(mode) {
            Some(mode) => {
                self.inner.set_policy_mode(mode);
                true
            }
            None => {
                log::warn!("Unknown policy mode: {}", mode);
                false
            }
        }
    }

    pub fn set_simulation_speed(&mut self, speed: f32) {
        self.inner.set_simulation_speed(speed);
    }

    pub fn score(&self) -> u32 {
        saturating_u32(self.inner.score())
    }
}
