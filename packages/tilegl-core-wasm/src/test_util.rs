// Protobuf writers used by the unit tests to build tiles by hand.

use std::collections::HashMap;

use crate::error::DecodeError;
use crate::vectortile::{FeatureType, PropertyValue, Ring, TilePoint, VectorFeature, DEFAULT_EXTENT};

#[derive(Default)]
pub(crate) struct PbfWriter {
    pub buf: Vec<u8>,
}

impl PbfWriter {
    pub fn new() -> Self {
        PbfWriter { buf: Vec::new() }
    }

    pub fn varint(&mut self, mut v: u64) -> &mut Self {
        while v >= 0x80 {
            self.buf.push((v as u8) | 0x80);
            v >>= 7;
        }
        self.buf.push(v as u8);
        self
    }

    pub fn tag(&mut self, field: u64, wire_type: u8) -> &mut Self {
        self.varint((field << 3) | u64::from(wire_type))
    }

    pub fn varint_field(&mut self, field: u64, v: u64) -> &mut Self {
        self.tag(field, 0).varint(v)
    }

    pub fn bytes_field(&mut self, field: u64, bytes: &[u8]) -> &mut Self {
        self.tag(field, 2).varint(bytes.len() as u64);
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn packed_field(&mut self, field: u64, values: &[u32]) -> &mut Self {
        let mut inner = PbfWriter::new();
        for &v in values {
            inner.varint(u64::from(v));
        }
        self.bytes_field(field, &inner.buf)
    }

    pub fn double_field(&mut self, field: u64, v: f64) -> &mut Self {
        self.tag(field, 1);
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn float_field(&mut self, field: u64, v: f32) -> &mut Self {
        self.tag(field, 5);
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }
}

pub(crate) fn zigzag(n: i64) -> u32 {
    ((n << 1) ^ (n >> 63)) as u32
}

pub(crate) fn command(id: u32, count: u32) -> u32 {
    (count << 3) | id
}

/// Encodes rings of absolute coordinates as MoveTo/LineTo(/ClosePath) commands.
pub(crate) fn encode_rings(rings: &[Vec<(i32, i32)>], close: bool) -> Vec<u32> {
    let mut out = Vec::new();
    let (mut x, mut y) = (0i32, 0i32);
    for ring in rings {
        for (i, &(px, py)) in ring.iter().enumerate() {
            if i == 0 {
                out.push(command(1, 1));
            } else if i == 1 {
                out.push(command(2, ring.len() as u32 - 1));
            }
            out.push(zigzag(i64::from(px - x)));
            out.push(zigzag(i64::from(py - y)));
            x = px;
            y = py;
        }
        if close {
            out.push(command(7, 1));
        }
    }
    out
}

/// Encodes points as one MoveTo with a repeat count.
pub(crate) fn encode_points(points: &[(i32, i32)]) -> Vec<u32> {
    let mut out = vec![command(1, points.len() as u32)];
    let (mut x, mut y) = (0i32, 0i32);
    for &(px, py) in points {
        out.push(zigzag(i64::from(px - x)));
        out.push(zigzag(i64::from(py - y)));
        x = px;
        y = py;
    }
    out
}

pub(crate) fn encode_feature(id: Option<u64>, tags: &[u32], geom_type: u64, geometry: &[u32]) -> Vec<u8> {
    let mut w = PbfWriter::new();
    if let Some(id) = id {
        w.varint_field(1, id);
    }
    if !tags.is_empty() {
        w.packed_field(2, tags);
    }
    w.varint_field(3, geom_type);
    w.packed_field(4, geometry);
    w.buf
}

pub(crate) fn encode_value(value: &PropertyValue) -> Vec<u8> {
    let mut w = PbfWriter::new();
    match value {
        PropertyValue::String(s) => {
            w.bytes_field(1, s.as_bytes());
        }
        PropertyValue::Double(d) => {
            w.double_field(3, *d);
        }
        PropertyValue::Int(i) => {
            w.varint_field(4, *i as u64);
        }
        PropertyValue::UInt(u) => {
            w.varint_field(5, *u);
        }
        PropertyValue::Bool(b) => {
            w.varint_field(7, u64::from(*b));
        }
        PropertyValue::Null => {}
    }
    w.buf
}

pub(crate) fn encode_layer(
    name: &str,
    extent: Option<u32>,
    keys: &[&str],
    values: &[PropertyValue],
    features: &[Vec<u8>],
) -> Vec<u8> {
    let mut w = PbfWriter::new();
    w.varint_field(15, 2);
    w.bytes_field(1, name.as_bytes());
    for f in features {
        w.bytes_field(2, f);
    }
    for k in keys {
        w.bytes_field(3, k.as_bytes());
    }
    for v in values {
        w.bytes_field(4, &encode_value(v));
    }
    if let Some(extent) = extent {
        w.varint_field(5, u64::from(extent));
    }
    w.buf
}

pub(crate) fn encode_tile(layers: &[Vec<u8>]) -> Vec<u8> {
    let mut w = PbfWriter::new();
    for l in layers {
        w.bytes_field(3, l);
    }
    w.buf
}

/// A feature with fixed geometry, for driving the bucket processors.
pub(crate) struct StubFeature {
    pub geom_type: FeatureType,
    pub rings: Vec<Ring>,
    pub extent: u32,
    pub properties: HashMap<String, PropertyValue>,
}

impl StubFeature {
    pub fn new(geom_type: FeatureType, rings: &[Vec<(i32, i32)>]) -> Self {
        StubFeature {
            geom_type,
            rings: rings
                .iter()
                .map(|r| r.iter().map(|&(x, y)| TilePoint::new(x, y)).collect())
                .collect(),
            extent: DEFAULT_EXTENT,
            properties: HashMap::new(),
        }
    }

    pub fn with_property(mut self, key: &str, value: PropertyValue) -> Self {
        self.properties.insert(key.to_string(), value);
        self
    }
}

impl VectorFeature for StubFeature {
    fn load_geometry(&self) -> Result<Vec<Ring>, DecodeError> {
        Ok(self.rings.clone())
    }

    fn geom_type(&self) -> FeatureType {
        self.geom_type
    }

    fn extent(&self) -> u32 {
        self.extent
    }

    fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }
}
