// Symbol layers: glyph and icon quads around anchors, plus optional
// collision box outlines for debugging.
//
// Anchor placement, text shaping and the icon atlas live outside this crate;
// they are reached through `SymbolLayout`. `PointPlacement` is a minimal
// stand-in that needs neither glyph metrics nor an atlas.

use std::collections::BTreeSet;
use std::f64::consts::PI;

use geo_types::{coord, Coord};
use serde_json::Value;

use crate::buffer::{Attribute, AttributeType};
use crate::error::BucketError;
use crate::schema::{LayerSchema, Shader};
use crate::style::LayoutProperties;
use crate::vectortile::{FeatureType, Ring, TilePoint, VectorFeature};

use super::{BufferBuilder, GeometryProcessor, ShaderId};

/// Pixel offsets are stored with this many subdivisions per pixel.
const OFFSET_SCALE: f64 = 64.0;
/// Pixel size of a tile that is not overscaled.
const TILE_SIZE: f64 = 512.0;
/// Zoom values are stored in tenths.
const ZOOM_SCALE: f64 = 10.0;
/// Highest zoom a symbol vertex can encode.
const MAX_ENCODED_ZOOM: f64 = 25.0;

// args: x, y, offset x, offset y, tex x, tex y, min zoom, max zoom, label min zoom, angle
fn symbol_pos(args: &[f64]) -> [f64; 4] {
    [args[0], args[1], 0.0, 0.0]
}

fn symbol_offset(args: &[f64]) -> [f64; 4] {
    [(args[2] * OFFSET_SCALE).round(), (args[3] * OFFSET_SCALE).round(), 0.0, 0.0]
}

fn symbol_data1(args: &[f64]) -> [f64; 4] {
    [(args[4] / 4.0).floor(), (args[5] / 4.0).floor(), args[8] * ZOOM_SCALE, args[9]]
}

fn symbol_data2(args: &[f64]) -> [f64; 4] {
    [args[6] * ZOOM_SCALE, args[7].min(MAX_ENCODED_ZOOM) * ZOOM_SCALE, 0.0, 0.0]
}

static SYMBOL_ATTRIBUTES: [Attribute; 4] = [
    Attribute::new("pos", 2, AttributeType::Short, symbol_pos),
    Attribute::new("offset", 2, AttributeType::Short, symbol_offset),
    Attribute::new("data1", 4, AttributeType::UnsignedByte, symbol_data1),
    Attribute::new("data2", 2, AttributeType::UnsignedByte, symbol_data2),
];

// args: x, y, extrude x, extrude y, max zoom, placement zoom
fn collision_pos(args: &[f64]) -> [f64; 4] {
    [args[0], args[1], 0.0, 0.0]
}

fn collision_extrude(args: &[f64]) -> [f64; 4] {
    [args[2].round(), args[3].round(), 0.0, 0.0]
}

fn collision_data(args: &[f64]) -> [f64; 4] {
    [args[4].min(MAX_ENCODED_ZOOM) * ZOOM_SCALE, args[5] * ZOOM_SCALE, 0.0, 0.0]
}

static COLLISION_BOX_ATTRIBUTES: [Attribute; 3] = [
    Attribute::new("pos", 2, AttributeType::Short, collision_pos),
    Attribute::new("extrude", 2, AttributeType::Short, collision_extrude),
    Attribute::new("data", 2, AttributeType::UnsignedByte, collision_data),
];

static SYMBOL_SHADERS: [Shader; 3] = [
    Shader::vertex_only("glyph", "glyphVertex", &SYMBOL_ATTRIBUTES, 10).with_elements("glyphElement"),
    Shader::vertex_only("icon", "iconVertex", &SYMBOL_ATTRIBUTES, 10).with_elements("iconElement"),
    Shader::vertex_only("collisionBox", "collisionBoxVertex", &COLLISION_BOX_ATTRIBUTES, 6),
];

pub static SYMBOL_SCHEMA: LayerSchema = LayerSchema { shaders: &SYMBOL_SHADERS };

/// Where a label is placed, in tile coordinates. `angle` is in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    pub point: Coord<f64>,
    pub angle: f64,
}

/// One textured rectangle, as pixel offsets of its corners from the anchor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SymbolQuad {
    pub tl: Coord<f64>,
    pub tr: Coord<f64>,
    pub bl: Coord<f64>,
    pub br: Coord<f64>,
    /// Atlas rectangle: x, y, width, height.
    pub tex: [f64; 4],
    pub angle: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
}

impl SymbolQuad {
    /// Axis-aligned quad spanning `min..max`, visible at every zoom.
    pub fn rect(min: Coord<f64>, max: Coord<f64>, tex: [f64; 4]) -> Self {
        SymbolQuad {
            tl: min,
            tr: coord! { x: max.x, y: min.y },
            bl: coord! { x: min.x, y: max.y },
            br: max,
            tex,
            angle: 0.0,
            min_zoom: 0.0,
            max_zoom: MAX_ENCODED_ZOOM,
        }
    }

    fn corners(&self) -> [Coord<f64>; 4] {
        [self.tl, self.tr, self.bl, self.br]
    }
}

/// Anchor and quad producers for symbol layers.
pub trait SymbolLayout {
    fn anchors(&self, feature: &dyn VectorFeature, rings: &[Ring], layout: &LayoutProperties) -> Vec<Anchor>;

    fn glyph_quads(&self, feature: &dyn VectorFeature, anchor: &Anchor, layout: &LayoutProperties) -> Vec<SymbolQuad>;

    fn icon_quads(&self, feature: &dyn VectorFeature, anchor: &Anchor, layout: &LayoutProperties) -> Vec<SymbolQuad>;
}

/// Replaces each `{key}` in `template` with the feature's property text,
/// or nothing when the property is missing.
pub fn resolve_tokens(feature: &dyn VectorFeature, template: &str) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}') else {
            break;
        };
        out.push_str(&rest[..open]);
        let key = &rest[open + 1..open + close];
        if let Some(value) = feature.property(key) {
            out.push_str(&value.to_text());
        }
        rest = &rest[open + close + 1..];
    }
    out.push_str(rest);
    out
}

fn layout_offset(layout: &LayoutProperties, key: &str) -> Coord<f64> {
    let pair = layout.get(key).and_then(Value::as_array);
    let component = |i: usize| pair.and_then(|p| p.get(i)).and_then(Value::as_f64).unwrap_or(0.0);
    coord! { x: component(0), y: component(1) }
}

/// Places one anchor per point of point features and one at the middle
/// vertex of each line. Text is laid out on one line in fixed-width cells
/// and icons as square boxes, with empty atlas rectangles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointPlacement {
    /// Glyph cell width as a fraction of the text size.
    pub glyph_advance: f64,
    /// Icon edge length in pixels at `icon-size` 1.
    pub icon_box: f64,
}

impl Default for PointPlacement {
    fn default() -> Self {
        PointPlacement { glyph_advance: 0.6, icon_box: 16.0 }
    }
}

impl SymbolLayout for PointPlacement {
    fn anchors(&self, feature: &dyn VectorFeature, rings: &[Ring], _layout: &LayoutProperties) -> Vec<Anchor> {
        let extent = f64::from(feature.extent());
        let inside = |p: &Coord<f64>| p.x >= 0.0 && p.x < extent && p.y >= 0.0 && p.y < extent;
        let to_coord = |p: &TilePoint| coord! { x: f64::from(p.x()), y: f64::from(p.y()) };

        let anchors: Vec<Anchor> = match feature.geom_type() {
            FeatureType::Point => rings
                .iter()
                .flatten()
                .map(|p| Anchor { point: to_coord(p), angle: 0.0 })
                .collect(),
            FeatureType::LineString => rings
                .iter()
                .filter(|ring| !ring.is_empty())
                .map(|ring| {
                    let mid = ring.len() / 2;
                    let (a, b) = if mid + 1 < ring.len() { (mid, mid + 1) } else { (mid.saturating_sub(1), mid) };
                    let delta = to_coord(&ring[b]) - to_coord(&ring[a]);
                    let angle = if delta.x == 0.0 && delta.y == 0.0 { 0.0 } else { delta.y.atan2(delta.x) };
                    Anchor { point: to_coord(&ring[mid]), angle }
                })
                .collect(),
            _ => Vec::new(),
        };
        anchors.into_iter().filter(|a| inside(&a.point)).collect()
    }

    fn glyph_quads(&self, feature: &dyn VectorFeature, _anchor: &Anchor, layout: &LayoutProperties) -> Vec<SymbolQuad> {
        let field = layout.string("text-field").unwrap_or("");
        let mut text = resolve_tokens(feature, field);
        match layout.string("text-transform") {
            Some("uppercase") => text = text.to_uppercase(),
            Some("lowercase") => text = text.to_lowercase(),
            _ => {}
        }
        let size = layout.number("text-size").unwrap_or(16.0);
        let advance = size * self.glyph_advance;
        let count = text.chars().count() as f64;
        let offset = layout_offset(layout, "text-offset") * size;
        let origin = coord! { x: -advance * count / 2.0, y: -size / 2.0 } + offset;

        text.chars()
            .enumerate()
            .filter(|(_, c)| !c.is_whitespace())
            .map(|(i, _)| {
                let min = origin + coord! { x: advance * i as f64, y: 0.0 };
                SymbolQuad::rect(min, min + coord! { x: advance, y: size }, [0.0; 4])
            })
            .collect()
    }

    fn icon_quads(&self, feature: &dyn VectorFeature, _anchor: &Anchor, layout: &LayoutProperties) -> Vec<SymbolQuad> {
        let name = layout.string("icon-image").map(|t| resolve_tokens(feature, t)).unwrap_or_default();
        if name.is_empty() {
            return Vec::new();
        }
        let half = self.icon_box * layout.number("icon-size").unwrap_or(1.0) / 2.0;
        let center = layout_offset(layout, "icon-offset");
        let min = center - coord! { x: half, y: half };
        let max = center + coord! { x: half, y: half };
        vec![SymbolQuad::rect(min, max, [0.0; 4])]
    }
}

/// Labels and icons.
pub struct SymbolBucket<'f> {
    builder: BufferBuilder<'f>,
    glyph: ShaderId,
    icon: ShaderId,
    collision_box: ShaderId,
    placement: Box<dyn SymbolLayout>,
}

impl<'f> SymbolBucket<'f> {
    pub fn new(builder: BufferBuilder<'f>) -> Result<Self, BucketError> {
        Ok(SymbolBucket {
            glyph: builder.shader_id("glyph")?,
            icon: builder.shader_id("icon")?,
            collision_box: builder.shader_id("collisionBox")?,
            builder,
            placement: Box::new(PointPlacement::default()),
        })
    }

    /// Replaces the anchor and quad producers.
    pub fn with_layout(mut self, placement: Box<dyn SymbolLayout>) -> Self {
        self.placement = placement;
        self
    }

    pub fn into_builder(self) -> BufferBuilder<'f> {
        self.builder
    }

    /// Icon names the assigned features need, after token substitution.
    pub fn icon_dependencies(&self) -> BTreeSet<String> {
        let Some(template) = self.builder.layout().string("icon-image") else {
            return BTreeSet::new();
        };
        self.builder
            .features()
            .iter()
            .map(|f| resolve_tokens(*f, template))
            .filter(|name| !name.is_empty())
            .collect()
    }

    fn add_quads(&mut self, shader: ShaderId, anchor: &Anchor, quads: &[SymbolQuad]) -> Result<(), BucketError> {
        let label_min_zoom = self.builder.zoom();
        for quad in quads {
            self.builder.make_room_for(shader, 4)?;
            let mut add = self.builder.add(shader);
            let [tx, ty, tw, th] = quad.tex;
            let angle = (quad.angle * 128.0 / PI).round().rem_euclid(256.0);
            let corners = [(quad.tl, tx, ty), (quad.tr, tx + tw, ty), (quad.bl, tx, ty + th), (quad.br, tx + tw, ty + th)];

            let mut index = [0usize; 4];
            for (slot, (offset, u, v)) in index.iter_mut().zip(corners) {
                *slot = add.vertex(&[
                    anchor.point.x,
                    anchor.point.y,
                    offset.x,
                    offset.y,
                    u,
                    v,
                    quad.min_zoom,
                    quad.max_zoom,
                    label_min_zoom,
                    angle,
                ])?;
            }
            add.element([index[0], index[1], index[2]])?;
            add.element([index[1], index[2], index[3]])?;
        }
        Ok(())
    }

    // Tile units per screen pixel.
    fn tile_pixel_ratio(&self, extent: u32) -> f64 {
        f64::from(extent) / (TILE_SIZE * self.builder.overscaling().max(1.0))
    }

    // Outline of the anchor's combined quad bounds as four line segments,
    // extruded in tile units.
    fn add_collision_box(&mut self, anchor: &Anchor, quads: &[SymbolQuad], extent: u32) -> Result<(), BucketError> {
        let scale = self.tile_pixel_ratio(extent);
        let mut corners = quads.iter().flat_map(SymbolQuad::corners);
        let Some(first) = corners.next() else {
            return Ok(());
        };
        let (min, max) = corners.fold((first, first), |(min, max), c| {
            (coord! { x: min.x.min(c.x), y: min.y.min(c.y) }, coord! { x: max.x.max(c.x), y: max.y.max(c.y) })
        });
        let (min, max) = (min * scale, max * scale);
        let tl = min;
        let tr = coord! { x: max.x, y: min.y };
        let br = max;
        let bl = coord! { x: min.x, y: max.y };

        let max_zoom = quads.iter().map(|q| q.max_zoom).fold(0.0, f64::max);
        let placement_zoom = self.builder.zoom();
        self.builder.make_room_for(self.collision_box, 8)?;
        let mut add = self.builder.add(self.collision_box);
        for (a, b) in [(tl, tr), (tr, br), (br, bl), (bl, tl)] {
            for corner in [a, b] {
                add.vertex(&[anchor.point.x, anchor.point.y, corner.x, corner.y, max_zoom, placement_zoom])?;
            }
        }
        Ok(())
    }
}

impl<'f> GeometryProcessor<'f> for SymbolBucket<'f> {
    fn builder(&self) -> &BufferBuilder<'f> {
        &self.builder
    }

    fn builder_mut(&mut self) -> &mut BufferBuilder<'f> {
        &mut self.builder
    }

    fn add_feature(&mut self, feature: &dyn VectorFeature) -> Result<(), BucketError> {
        let rings = feature.load_geometry()?;
        let layout = self.builder.layout().clone();
        let anchors = self.placement.anchors(feature, &rings, &layout);

        for anchor in &anchors {
            let glyphs = self.placement.glyph_quads(feature, anchor, &layout);
            let icons = self.placement.icon_quads(feature, anchor, &layout);
            self.add_quads(self.glyph, anchor, &glyphs)?;
            self.add_quads(self.icon, anchor, &icons)?;

            if self.builder.collision_debug() {
                let all: Vec<SymbolQuad> = glyphs.into_iter().chain(icons).collect();
                self.add_collision_box(anchor, &all, feature.extent())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferSet;
    use crate::bucket::BucketOptions;
    use crate::style::StyleLayer;
    use crate::test_util::StubFeature;
    use crate::vectortile::PropertyValue;
    use serde_json::json;

    fn symbol_bucket<'f>(layer: StyleLayer, collision_debug: bool) -> SymbolBucket<'f> {
        let mut options = BucketOptions::new(layer, 12.0);
        options.collision_debug = collision_debug;
        SymbolBucket::new(BufferBuilder::new(options, BufferSet::new()).unwrap()).unwrap()
    }

    fn lengths(bucket: &SymbolBucket<'_>, vertex: &str, element: Option<&str>) -> (usize, usize) {
        let buffers = bucket.builder().buffers();
        (
            buffers.get(vertex).unwrap().len(),
            element.map_or(0, |e| buffers.get(e).unwrap().len()),
        )
    }

    fn city() -> StubFeature {
        StubFeature::new(FeatureType::Point, &[vec![(100, 200)]])
            .with_property("name", PropertyValue::String("Oslo".into()))
            .with_property("maki", PropertyValue::String("park".into()))
    }

    #[test]
    fn creates_all_symbol_buffers() {
        let bucket = symbol_bucket(StyleLayer::new("labels", "symbol"), false);
        let buffers = bucket.builder().buffers();
        for name in ["glyphVertex", "glyphElement", "iconVertex", "iconElement", "collisionBoxVertex"] {
            assert!(buffers.get(name).is_some(), "{}", name);
        }
        assert_eq!(buffers.len(), 5);
    }

    #[test]
    fn one_quad_per_visible_glyph() {
        let layer = StyleLayer::new("labels", "symbol").with_layout("text-field", json!("{name} X"));
        let feature = city();
        let mut bucket = symbol_bucket(layer, false);
        bucket.add_feature(&feature).unwrap();

        assert_eq!(lengths(&bucket, "glyphVertex", Some("glyphElement")), (20, 10));
        assert_eq!(lengths(&bucket, "iconVertex", Some("iconElement")), (0, 0));
        assert_eq!(lengths(&bucket, "collisionBoxVertex", None), (0, 0));

        let vertex = bucket.builder().buffers().get("glyphVertex").unwrap();
        let first = vertex.get(0).unwrap();
        assert_eq!(first["pos"], vec![100.0, 200.0]);
        let elements = bucket.builder().buffers().get("glyphElement").unwrap();
        assert_eq!(elements.get(1).unwrap()["vertices"], vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn glyphs_are_centered_on_the_anchor() {
        let layer = StyleLayer::new("labels", "symbol").with_layout("text-field", json!("ab"));
        let layout = LayoutProperties::resolve(&layer, crate::schema::LayerType::Symbol, 12.0);
        let feature = city();
        let anchor = Anchor { point: coord! { x: 0.0, y: 0.0 }, angle: 0.0 };
        let quads = PointPlacement::default().glyph_quads(&feature, &anchor, &layout);

        assert_eq!(quads.len(), 2);
        // Default text size 16, one cell is 9.6 pixels wide.
        assert!((quads[0].tl.x + 9.6).abs() < 1e-9);
        assert!((quads[1].br.x - 9.6).abs() < 1e-9);
        assert!((quads[0].tl.y + 8.0).abs() < 1e-9);
    }

    #[test]
    fn icons_and_dependencies_resolve_tokens() {
        let layer = StyleLayer::new("pois", "symbol").with_layout("icon-image", json!("{maki}-15"));
        let feature = city();
        let other = StubFeature::new(FeatureType::Point, &[vec![(1, 1)]]);
        let mut bucket = symbol_bucket(layer, false);
        bucket.builder_mut().set_features(vec![&feature as &dyn VectorFeature, &other]);

        let deps: Vec<String> = bucket.icon_dependencies().into_iter().collect();
        assert_eq!(deps, vec!["-15".to_string(), "park-15".to_string()]);

        bucket.add_features().unwrap();
        assert_eq!(lengths(&bucket, "iconVertex", Some("iconElement")), (8, 4));
    }

    #[test]
    fn no_icon_image_means_no_dependencies() {
        let feature = city();
        let mut bucket = symbol_bucket(StyleLayer::new("labels", "symbol"), false);
        bucket.builder_mut().set_features(vec![&feature as &dyn VectorFeature]);
        assert!(bucket.icon_dependencies().is_empty());
    }

    #[test]
    fn collision_debug_outlines_each_anchor() {
        let layer = StyleLayer::new("labels", "symbol")
            .with_layout("text-field", json!("{name}"))
            .with_layout("icon-image", json!("{maki}"));
        let feature = StubFeature::new(FeatureType::Point, &[vec![(10, 10), (20, 20)]])
            .with_property("name", PropertyValue::String("A".into()))
            .with_property("maki", PropertyValue::String("bus".into()));
        let mut bucket = symbol_bucket(layer, true);
        bucket.add_feature(&feature).unwrap();

        assert_eq!(lengths(&bucket, "collisionBoxVertex", None), (16, 0));
        let groups = bucket.builder().element_groups("collisionBox").unwrap();
        assert_eq!(groups.current().unwrap().vertex_length, 16);
        assert_eq!(groups.current().unwrap().element_length, 0);

        // Icon box is 16 pixels, wider than one 9.6 pixel glyph; 8 tile
        // units per pixel at extent 4096.
        let vertex = bucket.builder().buffers().get("collisionBoxVertex").unwrap();
        assert_eq!(vertex.get(0).unwrap()["extrude"], vec![-64.0, -64.0]);
    }

    #[test]
    fn collision_boxes_shrink_with_overscaling() {
        let layer = StyleLayer::new("labels", "symbol").with_layout("icon-image", json!("{maki}"));
        let feature = StubFeature::new(FeatureType::Point, &[vec![(10, 10)]])
            .with_property("maki", PropertyValue::String("bus".into()));
        let mut options = BucketOptions::new(layer, 12.0);
        options.collision_debug = true;
        options.overscaling = 2.0;
        let mut bucket = SymbolBucket::new(BufferBuilder::new(options, BufferSet::new()).unwrap()).unwrap();
        bucket.add_feature(&feature).unwrap();

        let vertex = bucket.builder().buffers().get("collisionBoxVertex").unwrap();
        assert_eq!(vertex.get(0).unwrap()["extrude"], vec![-32.0, -32.0]);
        assert_eq!(vertex.get(3).unwrap()["extrude"], vec![32.0, 32.0]);
    }

    #[test]
    fn line_anchor_sits_on_the_middle_vertex() {
        let feature = StubFeature::new(FeatureType::LineString, &[vec![(0, 0), (10, 0), (10, 10)]]);
        let rings = feature.load_geometry().unwrap();
        let anchors = PointPlacement::default().anchors(&feature, &rings, &LayoutProperties::default());
        assert_eq!(anchors.len(), 1);
        assert_eq!(anchors[0].point, coord! { x: 10.0, y: 0.0 });
        assert!((anchors[0].angle - PI / 2.0).abs() < 1e-9);
    }

    #[test]
    fn anchors_outside_the_tile_are_dropped() {
        let feature = StubFeature::new(FeatureType::Point, &[vec![(-1, 5), (5, 5), (5, 4096)]]);
        let rings = feature.load_geometry().unwrap();
        let anchors = PointPlacement::default().anchors(&feature, &rings, &LayoutProperties::default());
        assert_eq!(anchors.len(), 1);
    }

    #[test]
    fn missing_tokens_resolve_to_nothing() {
        let feature = city();
        assert_eq!(resolve_tokens(&feature, "{name} ({ref})"), "Oslo ()");
        assert_eq!(resolve_tokens(&feature, "plain"), "plain");
        assert_eq!(resolve_tokens(&feature, "{open"), "{open");
    }

    struct OneQuad;

    impl SymbolLayout for OneQuad {
        fn anchors(&self, _: &dyn VectorFeature, _: &[Ring], _: &LayoutProperties) -> Vec<Anchor> {
            vec![Anchor { point: coord! { x: 1.0, y: 2.0 }, angle: PI }]
        }

        fn glyph_quads(&self, _: &dyn VectorFeature, _: &Anchor, _: &LayoutProperties) -> Vec<SymbolQuad> {
            let mut quad = SymbolQuad::rect(coord! { x: -1.0, y: -1.0 }, coord! { x: 1.0, y: 1.0 }, [8.0, 16.0, 4.0, 4.0]);
            quad.angle = PI;
            quad.min_zoom = 2.0;
            vec![quad]
        }

        fn icon_quads(&self, _: &dyn VectorFeature, _: &Anchor, _: &LayoutProperties) -> Vec<SymbolQuad> {
            Vec::new()
        }
    }

    #[test]
    fn custom_layouts_drive_the_quads() {
        let feature = city();
        let mut bucket = symbol_bucket(StyleLayer::new("labels", "symbol"), false).with_layout(Box::new(OneQuad));
        bucket.add_feature(&feature).unwrap();

        let vertex = bucket.builder().buffers().get("glyphVertex").unwrap();
        assert_eq!(vertex.len(), 4);
        let br = vertex.get(3).unwrap();
        assert_eq!(br["pos"], vec![1.0, 2.0]);
        assert_eq!(br["offset"], vec![64.0, 64.0]);
        assert_eq!(br["data1"], vec![3.0, 5.0, 120.0, 128.0]);
        assert_eq!(br["data2"], vec![20.0, 250.0]);
    }

    #[test]
    fn text_size_is_read_one_zoom_ahead() {
        let layer = StyleLayer::new("labels", "symbol")
            .with_layout("text-field", json!("a"))
            .with_layout("text-size", json!({ "stops": [[12, 10], [14, 20]] }));
        let bucket = symbol_bucket(layer, false);
        assert_eq!(bucket.builder().layout().number("text-size"), Some(15.0));
        assert_eq!(bucket.builder().layout().number("text-max-size"), Some(20.0));
    }
}
