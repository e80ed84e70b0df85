use std::collections::BTreeMap;

use serde::Serialize;

/// Bytes reserved by a buffer on first push.
const INITIAL_CAPACITY_BYTES: usize = 8192;
/// Vertex records and attribute offsets are aligned to this many bytes.
const VERTEX_ATTRIBUTE_ALIGNMENT: usize = 4;

/// Numeric storage type of one attribute component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttributeType {
    Byte,
    UnsignedByte,
    Short,
    UnsignedShort,
    Int,
    UnsignedInt,
    Float,
}

impl AttributeType {
    pub const fn size(self) -> usize {
        match self {
            AttributeType::Byte | AttributeType::UnsignedByte => 1,
            AttributeType::Short | AttributeType::UnsignedShort => 2,
            AttributeType::Int | AttributeType::UnsignedInt | AttributeType::Float => 4,
        }
    }

    // Integer types truncate toward zero, then wrap to their width.
    fn write(self, out: &mut [u8], value: f64) {
        let int = value as i64;
        match self {
            AttributeType::Byte => out[0] = int as i8 as u8,
            AttributeType::UnsignedByte => out[0] = int as u8,
            AttributeType::Short => out[..2].copy_from_slice(&(int as i16).to_le_bytes()),
            AttributeType::UnsignedShort => out[..2].copy_from_slice(&(int as u16).to_le_bytes()),
            AttributeType::Int => out[..4].copy_from_slice(&(int as i32).to_le_bytes()),
            AttributeType::UnsignedInt => out[..4].copy_from_slice(&(int as u32).to_le_bytes()),
            AttributeType::Float => out[..4].copy_from_slice(&(value as f32).to_le_bytes()),
        }
    }

    fn read(self, bytes: &[u8]) -> f64 {
        match self {
            AttributeType::Byte => f64::from(bytes[0] as i8),
            AttributeType::UnsignedByte => f64::from(bytes[0]),
            AttributeType::Short => f64::from(i16::from_le_bytes([bytes[0], bytes[1]])),
            AttributeType::UnsignedShort => f64::from(u16::from_le_bytes([bytes[0], bytes[1]])),
            AttributeType::Int => f64::from(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])),
            AttributeType::UnsignedInt => f64::from(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])),
            AttributeType::Float => f64::from(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])),
        }
    }
}

/// Maps the arguments of an `add vertex` call to up to four packed components.
/// It may index any argument below its shader's `vertex_args`.
pub type AttributeValueFn = fn(&[f64]) -> [f64; 4];

/// One vertex attribute as declared by a layer schema.
#[derive(Debug, Clone, Copy)]
pub struct Attribute {
    pub name: &'static str,
    pub components: usize,
    pub kind: AttributeType,
    pub value: AttributeValueFn,
}

impl Attribute {
    pub const fn new(name: &'static str, components: usize, kind: AttributeType, value: AttributeValueFn) -> Self {
        Attribute { name, components, kind, value }
    }

    /// One UNSIGNED_BYTE component, the schema default.
    pub const fn scalar(name: &'static str, value: AttributeValueFn) -> Self {
        Attribute::new(name, 1, AttributeType::UnsignedByte, value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BufferType {
    Vertex,
    Element,
}

/// Position of one attribute inside a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeLayout {
    pub name: &'static str,
    pub components: usize,
    #[serde(rename = "type")]
    pub kind: AttributeType,
    pub offset: usize,
}

/// Structured view of one record: attribute name to component values.
pub type Record = BTreeMap<&'static str, Vec<f64>>;

/// Growable array of fixed-width records.
///
/// Storage is a `Vec<u32>` so the byte view handed to the GPU is 4-byte
/// aligned. Capacity doubles when exhausted.
#[derive(Debug, Clone)]
pub struct PackedBuffer {
    buffer_type: BufferType,
    attributes: Vec<AttributeLayout>,
    item_size: usize,
    length: usize,
    words: Vec<u32>,
}

impl PackedBuffer {
    /// Vertex buffer whose record is the union of `attributes`.
    pub fn vertex(attributes: &[Attribute]) -> Self {
        let layout = attributes.iter().map(|a| (a.name, a.components, a.kind));
        PackedBuffer::with_layout(BufferType::Vertex, layout, VERTEX_ATTRIBUTE_ALIGNMENT)
    }

    /// Element buffer of `components` unsigned short indices per record.
    pub fn element(components: usize) -> Self {
        let layout = std::iter::once(("vertices", components, AttributeType::UnsignedShort));
        PackedBuffer::with_layout(BufferType::Element, layout, 1)
    }

    fn with_layout<I>(buffer_type: BufferType, layout: I, alignment: usize) -> Self
    where
        I: Iterator<Item = (&'static str, usize, AttributeType)>,
    {
        let mut item_size = 0;
        let mut attributes = Vec::new();
        for (name, components, kind) in layout {
            attributes.push(AttributeLayout { name, components, kind, offset: item_size });
            item_size = align(item_size + components * kind.size(), alignment);
        }
        PackedBuffer {
            buffer_type,
            attributes,
            item_size,
            length: 0,
            words: Vec::new(),
        }
    }

    pub fn buffer_type(&self) -> BufferType {
        self.buffer_type
    }

    pub fn attributes(&self) -> &[AttributeLayout] {
        &self.attributes
    }

    /// Record width in bytes.
    pub fn item_size(&self) -> usize {
        self.item_size
    }

    /// Number of records pushed so far.
    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Allocated capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.words.len() * 4
    }

    /// Appends one record from flattened component values, in attribute
    /// order. Missing trailing values are stored as zero. Returns the index
    /// of the new record.
    pub fn push(&mut self, values: &[f64]) -> usize {
        let starts: Vec<usize> = self
            .attributes
            .iter()
            .scan(0, |cursor, attribute| {
                let start = *cursor;
                *cursor += attribute.components;
                Some(start)
            })
            .collect();
        self.push_with(|i| {
            let mut out = [0.0; 4];
            for (c, slot) in out.iter_mut().enumerate() {
                if let Some(v) = values.get(starts[i] + c) {
                    *slot = *v;
                }
            }
            out
        })
    }

    /// Appends one record, asking `component_values(i)` for attribute `i`.
    pub fn push_with<F>(&mut self, component_values: F) -> usize
    where
        F: Fn(usize) -> [f64; 4],
    {
        let index = self.length;
        let start = index * self.item_size;
        self.grow_to(start + self.item_size);

        let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut self.words);
        for (i, attribute) in self.attributes.iter().enumerate() {
            let values = component_values(i);
            let size = attribute.kind.size();
            for (c, value) in values.iter().take(attribute.components).enumerate() {
                let at = start + attribute.offset + c * size;
                attribute.kind.write(&mut bytes[at..at + size], *value);
            }
        }
        self.length += 1;
        index
    }

    fn grow_to(&mut self, needed_bytes: usize) {
        let needed_words = (needed_bytes + 3) / 4;
        if needed_words > self.words.len() {
            let grown = (self.words.len() * 2)
                .max(needed_words)
                .max(INITIAL_CAPACITY_BYTES / 4);
            self.words.resize(grown, 0);
        }
    }

    /// Reads back record `index`, or `None` past the end.
    pub fn get(&self, index: usize) -> Option<Record> {
        if index >= self.length {
            return None;
        }
        let bytes = self.bytes();
        let start = index * self.item_size;
        let mut record = Record::new();
        for attribute in &self.attributes {
            let size = attribute.kind.size();
            let values = (0..attribute.components)
                .map(|c| {
                    let at = start + attribute.offset + c * size;
                    attribute.kind.read(&bytes[at..at + size])
                })
                .collect();
            record.insert(attribute.name, values);
        }
        Some(record)
    }

    /// Packed records, ready for upload.
    pub fn bytes(&self) -> &[u8] {
        let all: &[u8] = bytemuck::cast_slice(&self.words);
        &all[..self.length * self.item_size]
    }
}

fn align(value: usize, alignment: usize) -> usize {
    (value + alignment - 1) / alignment * alignment
}

/// Named buffers built for one tile. Buckets that declare the same buffer
/// name write into the same `PackedBuffer`.
#[derive(Debug, Clone, Default)]
pub struct BufferSet {
    buffers: BTreeMap<String, PackedBuffer>,
}

impl BufferSet {
    pub fn new() -> Self {
        BufferSet::default()
    }

    pub fn get(&self, name: &str) -> Option<&PackedBuffer> {
        self.buffers.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut PackedBuffer> {
        self.buffers.get_mut(name)
    }

    /// Creates the vertex buffer `name` unless it already exists.
    pub fn ensure_vertex(&mut self, name: &str, attributes: &[Attribute]) {
        if !self.buffers.contains_key(name) {
            self.buffers.insert(name.to_string(), PackedBuffer::vertex(attributes));
        }
    }

    /// Creates the element buffer `name` unless it already exists.
    pub fn ensure_element(&mut self, name: &str, components: usize) {
        if !self.buffers.contains_key(name) {
            self.buffers.insert(name.to_string(), PackedBuffer::element(components));
        }
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PackedBuffer)> {
        self.buffers.iter().map(|(k, v)| (k.as_str(), v))
    }
}
