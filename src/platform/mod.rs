//! Platform abstraction layer
//!
//! Hosts talk to the sandbox through JSON strings:
//! - Settings in (`Settings::from_json`, falling back to defaults)
//! - Render snapshots, stats and episode-end events out
//!
//! The browser bindings live in `web` (wasm32 only).

#[cfg(target_arch = "wasm32")]
pub mod web;

#[cfg(target_arch = "wasm32")]
pub use web::WebSandbox;

use crate::settings::Settings;
use crate::trainer::{EpisodeEnd, Sandbox};

/// Parse host-supplied settings, logging and falling back to defaults on error
pub fn settings_or_default(json: Option<&str>) -> Settings {
    match json.map(str::trim).filter(|s| !s.is_empty()) {
        None => Settings::default(),
        Some(json) => Settings::from_json(json).unwrap_or_else(|e| {
            log::warn!("Invalid settings JSON ({}), using defaults", e);
            Settings::default()
        }),
    }
}

/// True if the settings object sets `seed` explicitly
pub fn has_seed(json: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(json)
        .is_ok_and(|value| value.get("seed").is_some_and(|seed| seed.is_u64()))
}

/// Counter narrowed for JavaScript, pinned at `u32::MAX` instead of wrapping
pub fn saturating_u32(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

pub fn events_json(events: &[EpisodeEnd]) -> serde_json::Result<String> {
    serde_json::to_string(events)
}

pub fn render_json(sandbox: &Sandbox) -> serde_json::Result<String> {
    serde_json::to_string(&sandbox.render_snapshot())
}

pub fn stats_json(sandbox: &Sandbox) -> serde_json::Result<String> {
    serde_json::to_string(sandbox.stats())
}
