// Static per-layer-type buffer declarations.

use std::fmt;

use serde::Serialize;

use crate::buffer::Attribute;
use crate::bucket::{circle, fill, line, symbol};
use crate::error::BucketError;

/// One kind of renderable primitive: a vertex layout and up to two element
/// buffers indexing into it.
#[derive(Debug)]
pub struct Shader {
    pub name: &'static str,
    pub vertex_buffer: Option<&'static str>,
    pub attributes: &'static [Attribute],
    /// Number of arguments every add-vertex call passes.
    pub vertex_args: usize,
    pub element_buffer: Option<&'static str>,
    pub element_buffer_components: usize,
    pub second_element_buffer: Option<&'static str>,
    pub second_element_buffer_components: usize,
}

impl Shader {
    /// Shader with a vertex buffer and no element buffers.
    pub const fn vertex_only(
        name: &'static str,
        vertex_buffer: &'static str,
        attributes: &'static [Attribute],
        vertex_args: usize,
    ) -> Self {
        Shader {
            name,
            vertex_buffer: Some(vertex_buffer),
            attributes,
            vertex_args,
            element_buffer: None,
            element_buffer_components: 3,
            second_element_buffer: None,
            second_element_buffer_components: 3,
        }
    }

    pub const fn with_elements(mut self, element_buffer: &'static str) -> Self {
        self.element_buffer = Some(element_buffer);
        self
    }

    pub const fn with_second_elements(mut self, buffer: &'static str, components: usize) -> Self {
        self.second_element_buffer = Some(buffer);
        self.second_element_buffer_components = components;
        self
    }
}

#[derive(Debug)]
pub struct LayerSchema {
    pub shaders: &'static [Shader],
}

impl LayerSchema {
    pub fn shader(&self, name: &str) -> Option<&'static Shader> {
        self.shaders.iter().find(|s| s.name == name)
    }

    pub fn shader_index(&self, name: &str) -> Option<usize> {
        self.shaders.iter().position(|s| s.name == name)
    }
}

/// The layer kinds that produce buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerType {
    Fill,
    Line,
    Circle,
    Symbol,
}

impl LayerType {
    pub fn parse(name: &str) -> Result<Self, BucketError> {
        match name {
            "fill" => Ok(LayerType::Fill),
            "line" => Ok(LayerType::Line),
            "circle" => Ok(LayerType::Circle),
            "symbol" => Ok(LayerType::Symbol),
            other => Err(BucketError::UnsupportedLayerType(other.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LayerType::Fill => "fill",
            LayerType::Line => "line",
            LayerType::Circle => "circle",
            LayerType::Symbol => "symbol",
        }
    }

    pub fn schema(self) -> &'static LayerSchema {
        match self {
            LayerType::Fill => &fill::FILL_SCHEMA,
            LayerType::Line => &line::LINE_SCHEMA,
            LayerType::Circle => &circle::CIRCLE_SCHEMA,
            LayerType::Symbol => &symbol::SYMBOL_SCHEMA,
        }
    }
}

impl fmt::Display for LayerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
