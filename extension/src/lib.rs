// Address Mapper browser extension
//
// One wasm module serves three contexts, each started by its own JS loader:
// the popup (`start_popup`), the content script (`start_content`) and the
// background service worker (the `handle_*` exports in `background`).

mod background;
mod chrome;
mod content;
mod services;

#[cfg(feature = "popup")]
mod components;
#[cfg(feature = "popup")]
pub mod icons;
#[cfg(feature = "popup")]
mod popup_context;

use mapper_core::MapperConfig;
use std::sync::OnceLock;
use wasm_bindgen::prelude::*;

static CONFIG: OnceLock<MapperConfig> = OnceLock::new();

/// Tunables bundled at build time from `mapper.toml`.
pub(crate) fn config() -> &'static MapperConfig {
    CONFIG.get_or_init(|| {
        MapperConfig::from_toml_str(include_str!("../mapper.toml")).unwrap_or_else(|e| {
            log::error!("Bundled config invalid, using defaults: {:#}", e);
            MapperConfig::default()
        })
    })
}

/// `Settings.debug` switches verbose logging on for the current context.
pub(crate) fn apply_log_level(debug: bool) {
    log::set_max_level(if debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    });
}

#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::new(log::Level::Debug));
    apply_log_level(false);
}

#[wasm_bindgen]
pub fn start_content() -> Result<(), JsValue> {
    content::start()
}

#[cfg(feature = "popup")]
#[wasm_bindgen]
pub fn start_popup() {
    log::info!("Address Mapper popup starting...");
    dioxus::launch(components::App);
}
