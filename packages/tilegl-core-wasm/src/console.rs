#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

// This allows us to access console.log from JS
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = console)]
    pub fn log(s: &str);
}

// Native builds and tests have no JS console; route through tracing instead.
#[cfg(not(target_arch = "wasm32"))]
pub fn log(s: &str) {
    tracing::debug!(target: "tilegl_core_wasm", "{}", s);
}

// Note: The console_log macro is defined in lib.rs to avoid duplication
