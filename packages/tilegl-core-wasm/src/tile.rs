// Compiles every style layer of one tile into a shared buffer set.

use std::collections::{BTreeMap, HashMap};
use std::mem;

use serde::{Deserialize, Serialize};

use crate::bucket::{Bucket, BucketOptions};
use crate::buffer::BufferSet;
use crate::console_log;
use crate::element_groups::ElementGroup;
use crate::error::DecodeError;
use crate::style::StyleLayer;
use crate::vectortile::{decompress, TileFeature, VectorFeature, VectorTile};

fn default_overscaling() -> f64 {
    1.0
}

/// Build parameters shared by every layer of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileSettings {
    pub zoom: f64,
    #[serde(default = "default_overscaling")]
    pub overscaling: f64,
    #[serde(default)]
    pub collision_debug: bool,
}

impl CompileSettings {
    pub fn at_zoom(zoom: f64) -> Self {
        CompileSettings { zoom, overscaling: default_overscaling(), collision_debug: false }
    }
}

/// What one style layer contributed: its element groups per shader.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledLayer {
    pub id: String,
    #[serde(rename = "type")]
    pub layer_type: String,
    pub feature_count: usize,
    pub groups: BTreeMap<String, Vec<ElementGroup>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub icon_dependencies: Vec<String>,
}

/// Buffers for one tile and the layers that wrote into them, in style order.
#[derive(Debug, Clone)]
pub struct CompiledTile {
    pub buffers: BufferSet,
    pub layers: Vec<CompiledLayer>,
}

// Decodes a layer's features, skipping the ones that fail.
fn decode_layer<'a>(tile: &VectorTile<'a>, name: &str) -> Option<Vec<TileFeature<'a>>> {
    let layer = tile.layer(name)?;
    let mut features = Vec::with_capacity(layer.len());
    for i in 0..layer.len() {
        match layer.feature(i) {
            Some(Ok(feature)) => features.push(feature),
            Some(Err(e)) => console_log!("Layer {}: skipping undecodable feature {}: {}", name, i, e),
            None => {}
        }
    }
    Some(features)
}

/// Runs every applicable style layer over `tile`. Layers outside their zoom
/// range, hidden, of an unsupported type or without a source layer in this
/// tile are skipped.
pub fn compile_tile<'a>(tile: &VectorTile<'a>, layers: &[StyleLayer], settings: CompileSettings) -> CompiledTile {
    let mut buffers = BufferSet::new();
    let mut compiled = Vec::new();
    let mut decoded: HashMap<String, Option<Vec<TileFeature<'a>>>> = HashMap::new();

    for layer in layers {
        if !layer.in_zoom_range(settings.zoom) {
            continue;
        }
        let Some(source) = layer.source_layer.as_deref() else {
            console_log!("Layer {}: no source layer, skipping", layer.id);
            continue;
        };

        let options = BucketOptions {
            layer: layer.clone(),
            zoom: settings.zoom,
            overscaling: settings.overscaling,
            collision_debug: settings.collision_debug,
        };
        let mut bucket = match Bucket::create(options, BufferSet::new()) {
            Ok(bucket) => bucket,
            Err(e) => {
                console_log!("Layer {}: {}", layer.id, e);
                continue;
            }
        };
        if !bucket.builder().layout().is_visible() {
            continue;
        }

        let features = decoded
            .entry(source.to_string())
            .or_insert_with(|| decode_layer(tile, source));
        let Some(features) = features.as_ref() else {
            continue;
        };

        let filter = bucket.builder().filter().clone();
        let selected: Vec<&dyn VectorFeature> = features
            .iter()
            .map(|f| f as &dyn VectorFeature)
            .filter(|f| filter.evaluate(*f))
            .collect();
        let feature_count = selected.len();
        bucket.set_features(selected);
        bucket.reset_buffers(mem::take(&mut buffers));

        if let Err(e) = bucket.add_features() {
            console_log!("Layer {}: build aborted: {}", layer.id, e);
        }

        let groups = bucket
            .builder()
            .all_element_groups()
            .filter(|(_, groups)| !groups.is_empty())
            .map(|(shader, groups)| (shader.to_string(), groups.groups.clone()))
            .collect();
        let icon_dependencies = match &bucket {
            Bucket::Symbol(symbol) => symbol.icon_dependencies().into_iter().collect(),
            _ => Vec::new(),
        };
        compiled.push(CompiledLayer {
            id: layer.id.clone(),
            layer_type: layer.layer_type.clone(),
            feature_count,
            groups,
            icon_dependencies,
        });
        buffers = bucket.into_buffers();
    }

    console_log!("Compiled {} of {} style layers", compiled.len(), layers.len());
    CompiledTile { buffers, layers: compiled }
}

/// Decompresses and parses raw tile bytes, then compiles them.
pub fn compile_tile_bytes(
    bytes: &[u8],
    layers: &[StyleLayer],
    settings: CompileSettings,
) -> Result<CompiledTile, DecodeError> {
    let raw = decompress(bytes)?;
    let tile = VectorTile::parse(&raw)?;
    Ok(compile_tile(&tile, layers, settings))
}

/// Compiles independent tiles in parallel, each into its own buffer set.
#[cfg(not(target_arch = "wasm32"))]
pub fn compile_tiles(
    tiles: &[Vec<u8>],
    layers: &[StyleLayer],
    settings: CompileSettings,
) -> Vec<Result<CompiledTile, DecodeError>> {
    use rayon::prelude::*;

    tiles
        .par_iter()
        .map(|bytes| compile_tile_bytes(bytes, layers, settings))
        .collect()
}
