use js_sys::{Array, Object, Reflect, Uint8Array};
use serde::Serialize;
use wasm_bindgen::prelude::*;

// Create a console module for logging
pub mod console;
// Import our error types
pub mod error;
// Import our protobuf reader
pub mod pbf;
// Import our vector tile decoding module
pub mod vectortile;
// Import our packed buffer and element group modules
pub mod buffer;
pub mod element_groups;
// Import our layer schemas
pub mod schema;
// Import style layers, layout functions and filters
pub mod filter;
pub mod style;
// Import the per-layer-type buffer builders
pub mod bucket;
// Import the tile compiler
pub mod tile;
// Import our models
mod models;

#[cfg(test)]
mod test_util;

use models::{BufferInfo, TileLayerInfo};
use style::StyleLayer;
use tile::{compile_tile_bytes, CompileSettings};
use vectortile::{decompress, VectorTile};

// Use the macro from our console module
#[macro_export]
macro_rules! console_log {
    ($($t:tt)*) => (crate::console::log(&format!($($t)*)))
}

use std::sync::Once;
static INIT: Once = Once::new();

// This sets up the wasm_bindgen start functionality
#[wasm_bindgen(start)]
pub fn start() {
    INIT.call_once(|| {
        // Set the panic hook for better error messages
        #[cfg(feature = "console_error_panic_hook")]
        console_error_panic_hook::set_once();

        console_log!("WASM module initialized successfully");
    });
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    let serializer = serde_wasm_bindgen::Serializer::json_compatible();
    Ok(value.serialize(&serializer)?)
}

/// Compiles a tile for the given style layers.
///
/// Returns `{ buffers: { name: { type, itemSize, length, attributes, bytes } },
/// layers: [{ id, type, featureCount, groups, iconDependencies? }] }`.
#[wasm_bindgen]
pub fn compile_tile_js(bytes: &[u8], layers_json: &str, zoom: f64) -> Result<JsValue, JsValue> {
    let layers: Vec<StyleLayer> = serde_json::from_str(layers_json)
        .map_err(|e| JsValue::from_str(&format!("Failed to parse style layers: {}", e)))?;

    let compiled = compile_tile_bytes(bytes, &layers, CompileSettings::at_zoom(zoom))
        .map_err(|e| JsValue::from_str(&e.to_string()))?;

    let buffers = Object::new();
    for (name, buffer) in compiled.buffers.iter() {
        let info = to_js(&BufferInfo::of(buffer))?;
        Reflect::set(&info, &JsValue::from_str("bytes"), &Uint8Array::from(buffer.bytes()))?;
        Reflect::set(&buffers, &JsValue::from_str(name), &info)?;
    }

    let result = Object::new();
    Reflect::set(&result, &JsValue::from_str("buffers"), &buffers)?;
    Reflect::set(&result, &JsValue::from_str("layers"), &to_js(&compiled.layers)?)?;
    Ok(result.into())
}

/// Lists the layers of a tile with their feature counts.
#[wasm_bindgen]
pub fn tile_layer_names(bytes: &[u8]) -> Result<JsValue, JsValue> {
    let raw = decompress(bytes).map_err(|e| JsValue::from_str(&e.to_string()))?;
    let tile = VectorTile::parse(&raw).map_err(|e| JsValue::from_str(&e.to_string()))?;

    let layers = Array::new();
    for layer in &tile.layers {
        layers.push(&to_js(&TileLayerInfo::of(layer))?);
    }
    Ok(layers.into())
}
