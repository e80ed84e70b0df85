// Shared data structures handed across the wasm boundary
use serde::Serialize;

use crate::buffer::{AttributeLayout, BufferType, PackedBuffer};
use crate::vectortile::TileLayer;

/// Layout of one finished buffer. The bytes travel separately as a
/// `Uint8Array`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferInfo {
    #[serde(rename = "type")]
    pub buffer_type: BufferType,
    pub item_size: usize,
    pub length: usize,
    pub attributes: Vec<AttributeLayout>,
}

impl BufferInfo {
    pub fn of(buffer: &PackedBuffer) -> Self {
        BufferInfo {
            buffer_type: buffer.buffer_type(),
            item_size: buffer.item_size(),
            length: buffer.len(),
            attributes: buffer.attributes().to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TileLayerInfo {
    pub name: String,
    pub version: u32,
    pub extent: u32,
    pub feature_count: usize,
}

impl TileLayerInfo {
    pub fn of(layer: &TileLayer<'_>) -> Self {
        TileLayerInfo {
            name: layer.name.clone(),
            version: layer.version,
            extent: layer.extent,
            feature_count: layer.len(),
        }
    }
}
