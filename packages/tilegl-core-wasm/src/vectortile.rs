use std::borrow::Cow;
use std::collections::HashMap;
use std::io::Read;

use flate2::read::GzDecoder;
use geo_types::Point;
use serde::{Deserialize, Serialize};

use crate::console_log;
use crate::error::DecodeError;
use crate::pbf::{Pbf, WIRE_BYTES, WIRE_FIXED32, WIRE_FIXED64, WIRE_VARINT};

/// Default tile coordinate extent when a layer does not declare one.
pub const DEFAULT_EXTENT: u32 = 4096;

const CMD_MOVE_TO: u32 = 1;
const CMD_LINE_TO: u32 = 2;
const CMD_CLOSE_PATH: u32 = 7;

/// A point in tile coordinates.
pub type TilePoint = Point<i32>;
/// One MoveTo-started run of points.
pub type Ring = Vec<TilePoint>;

// Feature geometry types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureType {
    Unknown,
    Point,
    LineString,
    Polygon,
}

impl FeatureType {
    pub fn from_raw(raw: u64) -> Self {
        match raw {
            1 => FeatureType::Point,
            2 => FeatureType::LineString,
            3 => FeatureType::Polygon,
            _ => FeatureType::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FeatureType::Unknown => "Unknown",
            FeatureType::Point => "Point",
            FeatureType::LineString => "LineString",
            FeatureType::Polygon => "Polygon",
        }
    }
}

/// A scalar value from a layer's shared value table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    String(String),
    Double(f64),
    Int(i64),
    UInt(u64),
    Bool(bool),
    Null,
}

impl PropertyValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Double(d) => Some(*d),
            PropertyValue::Int(i) => Some(*i as f64),
            PropertyValue::UInt(u) => Some(*u as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Text form used for `{token}` substitution.
    pub fn to_text(&self) -> String {
        match self {
            PropertyValue::String(s) => s.clone(),
            PropertyValue::Double(d) => format!("{}", d),
            PropertyValue::Int(i) => i.to_string(),
            PropertyValue::UInt(u) => u.to_string(),
            PropertyValue::Bool(b) => b.to_string(),
            PropertyValue::Null => String::new(),
        }
    }
}

/// What the bucket builders need from a feature. Only geometry loading is
/// mandatory so hand-built features can stand in for decoded ones.
pub trait VectorFeature {
    fn load_geometry(&self) -> Result<Vec<Ring>, DecodeError>;

    fn id(&self) -> Option<u64> {
        None
    }

    fn geom_type(&self) -> FeatureType {
        FeatureType::Unknown
    }

    fn extent(&self) -> u32 {
        DEFAULT_EXTENT
    }

    fn property(&self, _key: &str) -> Option<&PropertyValue> {
        None
    }
}

/// One decoded feature. Properties are read eagerly; the geometry command
/// stream is only located and is parsed on each `load_geometry` call.
#[derive(Debug, Clone)]
pub struct TileFeature<'a> {
    id: Option<u64>,
    geom_type: FeatureType,
    properties: HashMap<String, PropertyValue>,
    extent: u32,
    buf: &'a [u8],
    geometry: Option<usize>,
}

impl<'a> TileFeature<'a> {
    /// Reads the feature message occupying `buf[start..end]`.
    pub fn read(
        buf: &'a [u8],
        start: usize,
        end: usize,
        extent: u32,
        keys: &[String],
        values: &[PropertyValue],
    ) -> Result<Self, DecodeError> {
        if end > buf.len() {
            return Err(DecodeError::Truncated(buf.len()));
        }
        let mut feature = TileFeature {
            id: None,
            geom_type: FeatureType::Unknown,
            properties: HashMap::new(),
            extent,
            buf,
            geometry: None,
        };

        let mut pbf = Pbf::at(buf, start);
        while pbf.pos < end {
            let (field, wire_type) = pbf.read_tag()?;
            match (field, wire_type) {
                (1, WIRE_VARINT) => feature.id = Some(pbf.read_varint()?),
                (2, WIRE_BYTES) => {
                    let tags_end = pbf.read_len_end()?;
                    while pbf.pos < tags_end {
                        let key = pbf.read_varint()? as usize;
                        if pbf.pos >= tags_end {
                            return Err(DecodeError::UnpairedTag(pbf.pos));
                        }
                        let value = pbf.read_varint()? as usize;
                        if let (Some(key), Some(value)) = (keys.get(key), values.get(value)) {
                            feature.properties.insert(key.clone(), value.clone());
                        }
                    }
                    if pbf.pos != tags_end {
                        return Err(DecodeError::Truncated(tags_end));
                    }
                }
                (3, WIRE_VARINT) => feature.geom_type = FeatureType::from_raw(pbf.read_varint()?),
                (4, WIRE_BYTES) => {
                    feature.geometry = Some(pbf.pos);
                    pbf.skip(wire_type)?;
                }
                _ => pbf.skip(wire_type)?,
            }
        }
        if pbf.pos > end {
            return Err(DecodeError::Truncated(end));
        }
        Ok(feature)
    }

    pub fn properties(&self) -> &HashMap<String, PropertyValue> {
        &self.properties
    }

    /// Decodes the command stream into rings. Each call re-parses from the
    /// stored offset.
    pub fn load_geometry(&self) -> Result<Vec<Ring>, DecodeError> {
        let pos = self.geometry.ok_or(DecodeError::MissingGeometry)?;
        let mut pbf = Pbf::at(self.buf, pos);
        let end = pbf.read_len_end()?;

        let mut cmd = CMD_MOVE_TO;
        let mut length = 0u32;
        let (mut x, mut y) = (0i32, 0i32);

        let mut rings: Vec<Ring> = Vec::new();
        let mut ring: Option<Ring> = None;

        while pbf.pos < end {
            if length == 0 {
                let cmd_length = pbf.read_varint32()?;
                cmd = cmd_length & 0x7;
                length = cmd_length >> 3;
                if length == 0 {
                    continue;
                }
            }
            length -= 1;

            match cmd {
                CMD_MOVE_TO | CMD_LINE_TO => {
                    x = x.wrapping_add(pbf.read_svarint()? as i32);
                    y = y.wrapping_add(pbf.read_svarint()? as i32);

                    if cmd == CMD_MOVE_TO {
                        if let Some(done) = ring.take() {
                            rings.push(done);
                        }
                        ring = Some(Vec::new());
                    }
                    ring.as_mut()
                        .ok_or(DecodeError::LineToWithoutRing)?
                        .push(Point::new(x, y));
                }
                CMD_CLOSE_PATH => {
                    let current = ring
                        .as_mut()
                        .filter(|r| !r.is_empty())
                        .ok_or(DecodeError::ClosePathWithoutRing)?;
                    let first = current[0];
                    current.push(first);
                }
                other => return Err(DecodeError::UnknownCommand(other)),
            }
        }
        if pbf.pos > end {
            return Err(DecodeError::Truncated(end));
        }

        if let Some(done) = ring {
            rings.push(done);
        }
        Ok(rings)
    }
}

impl VectorFeature for TileFeature<'_> {
    fn load_geometry(&self) -> Result<Vec<Ring>, DecodeError> {
        TileFeature::load_geometry(self)
    }

    fn id(&self) -> Option<u64> {
        self.id
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

/// Decodes the features stored at `feature_ranges` (byte `start..end` of
/// each feature message). A malformed feature fails the whole call; use
/// `TileFeature::read` directly to skip individual bad features.
pub fn decode_features<'a>(
    bytes: &'a [u8],
    feature_ranges: &[(usize, usize)],
    extent: u32,
    keys: &[String],
    values: &[PropertyValue],
) -> Result<Vec<TileFeature<'a>>, DecodeError> {
    feature_ranges
        .iter()
        .map(|&(start, end)| TileFeature::read(bytes, start, end, extent, keys, values))
        .collect()
}

/// One layer of a tile. Features are located while reading the layer and
/// decoded on request, once the layer's extent and dictionaries are known.
#[derive(Debug, Clone)]
pub struct TileLayer<'a> {
    pub name: String,
    pub version: u32,
    pub extent: u32,
    keys: Vec<String>,
    values: Vec<PropertyValue>,
    feature_ranges: Vec<(usize, usize)>,
    buf: &'a [u8],
}

impl<'a> TileLayer<'a> {
    fn read(pbf: &mut Pbf<'a>, buf: &'a [u8], end: usize) -> Result<Self, DecodeError> {
        let mut layer = TileLayer {
            name: String::new(),
            version: 1,
            extent: DEFAULT_EXTENT,
            keys: Vec::new(),
            values: Vec::new(),
            feature_ranges: Vec::new(),
            buf,
        };

        while pbf.pos < end {
            let (field, wire_type) = pbf.read_tag()?;
            match (field, wire_type) {
                (15, WIRE_VARINT) => layer.version = pbf.read_varint32()?,
                (1, WIRE_BYTES) => layer.name = pbf.read_string()?,
                (2, WIRE_BYTES) => {
                    let feature_end = pbf.read_len_end()?;
                    layer.feature_ranges.push((pbf.pos, feature_end));
                    pbf.pos = feature_end;
                }
                (3, WIRE_BYTES) => layer.keys.push(pbf.read_string()?),
                (4, WIRE_BYTES) => {
                    let value_end = pbf.read_len_end()?;
                    layer.values.push(read_value(pbf, value_end)?);
                }
                (5, WIRE_VARINT) => layer.extent = pbf.read_varint32()?,
                _ => pbf.skip(wire_type)?,
            }
        }
        Ok(layer)
    }

    pub fn len(&self) -> usize {
        self.feature_ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feature_ranges.is_empty()
    }

    pub fn feature(&self, index: usize) -> Option<Result<TileFeature<'a>, DecodeError>> {
        let &(start, end) = self.feature_ranges.get(index)?;
        Some(TileFeature::read(self.buf, start, end, self.extent, &self.keys, &self.values))
    }

    pub fn features(&self) -> Result<Vec<TileFeature<'a>>, DecodeError> {
        decode_features(self.buf, &self.feature_ranges, self.extent, &self.keys, &self.values)
    }
}

fn read_value(pbf: &mut Pbf<'_>, end: usize) -> Result<PropertyValue, DecodeError> {
    let mut value = PropertyValue::Null;
    while pbf.pos < end {
        let (field, wire_type) = pbf.read_tag()?;
        value = match (field, wire_type) {
            (1, WIRE_BYTES) => PropertyValue::String(pbf.read_string()?),
            (2, WIRE_FIXED32) => PropertyValue::Double(f64::from(pbf.read_float()?)),
            (3, WIRE_FIXED64) => PropertyValue::Double(pbf.read_double()?),
            (4, WIRE_VARINT) => PropertyValue::Int(pbf.read_varint()? as i64),
            (5, WIRE_VARINT) => PropertyValue::UInt(pbf.read_varint()?),
            (6, WIRE_VARINT) => PropertyValue::Int(pbf.read_svarint()?),
            (7, WIRE_VARINT) => PropertyValue::Bool(pbf.read_varint()? != 0),
            _ => {
                pbf.skip(wire_type)?;
                continue;
            }
        };
    }
    Ok(value)
}

/// A parsed tile borrowing its bytes.
#[derive(Debug, Clone)]
pub struct VectorTile<'a> {
    pub layers: Vec<TileLayer<'a>>,
}

impl<'a> VectorTile<'a> {
    pub fn parse(bytes: &'a [u8]) -> Result<Self, DecodeError> {
        let mut pbf = Pbf::new(bytes);
        let mut layers = Vec::new();
        while pbf.pos < pbf.len() {
            let (field, wire_type) = pbf.read_tag()?;
            if field == 3 && wire_type == WIRE_BYTES {
                let end = pbf.read_len_end()?;
                layers.push(TileLayer::read(&mut pbf, bytes, end)?);
                pbf.pos = end;
            } else {
                pbf.skip(wire_type)?;
            }
        }
        Ok(VectorTile { layers })
    }

    pub fn layer(&self, name: &str) -> Option<&TileLayer<'a>> {
        self.layers.iter().find(|l| l.name == name)
    }
}

/// Returns raw tile bytes, gunzipping them first when they carry the gzip magic.
pub fn decompress(bytes: &[u8]) -> Result<Cow<'_, [u8]>, DecodeError> {
    if bytes.len() < 2 || bytes[0] != 0x1f || bytes[1] != 0x8b {
        return Ok(Cow::Borrowed(bytes));
    }
    let mut decoder = GzDecoder::new(bytes);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| DecodeError::Decompress(e.to_string()))?;
    console_log!("Decompressed tile: {} -> {} bytes", bytes.len(), out.len());
    Ok(Cow::Owned(out))
}
