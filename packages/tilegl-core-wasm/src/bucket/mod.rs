// Per-layer buffer builders.
//
// Each layer type has its own processor which embeds a `BufferBuilder` and
// writes into it through the schema-driven `ShaderAdd` operations.

pub mod circle;
pub mod fill;
pub mod line;
pub mod symbol;

use std::mem;

use serde::Deserialize;

use crate::buffer::BufferSet;
use crate::console_log;
use crate::element_groups::{ElementGroup, ElementGroups, GroupOrigin, MAX_INDEX};
use crate::error::BucketError;
use crate::filter::FeatureFilter;
use crate::schema::{LayerSchema, LayerType, Shader};
use crate::style::{LayoutProperties, StyleLayer};
use crate::vectortile::VectorFeature;

pub use circle::CircleBucket;
pub use fill::FillBucket;
pub use line::LineBucket;
pub use symbol::{PointPlacement, SymbolBucket, SymbolLayout, SymbolQuad};

fn default_overscaling() -> f64 {
    1.0
}

// Struct to match the bucket options passed in from JavaScript
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketOptions {
    pub layer: StyleLayer,
    pub zoom: f64,
    #[serde(default = "default_overscaling")]
    pub overscaling: f64,
    #[serde(default)]
    pub collision_debug: bool,
}

impl BucketOptions {
    pub fn new(layer: StyleLayer, zoom: f64) -> Self {
        BucketOptions {
            layer,
            zoom,
            overscaling: default_overscaling(),
            collision_debug: false,
        }
    }
}

/// Index of a shader within the builder's schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderId(usize);

/// State shared by every layer-type processor: the buffers being written,
/// the element groups per shader, resolved layout and the layer's features.
pub struct BufferBuilder<'f> {
    layer: StyleLayer,
    layer_type: LayerType,
    zoom: f64,
    overscaling: f64,
    collision_debug: bool,
    layout: LayoutProperties,
    filter: FeatureFilter,
    features: Vec<&'f dyn VectorFeature>,
    schema: &'static LayerSchema,
    buffers: BufferSet,
    element_groups: Vec<ElementGroups>,
}

impl<'f> BufferBuilder<'f> {
    /// Builder for the schema of the layer's type.
    pub fn new(options: BucketOptions, buffers: BufferSet) -> Result<Self, BucketError> {
        let layer_type = LayerType::parse(&options.layer.layer_type)?;
        Ok(BufferBuilder::with_schema(options, layer_type, layer_type.schema(), buffers))
    }

    /// Builder writing through an explicit schema. Layout is still resolved
    /// for `layer_type`.
    pub fn with_schema(
        options: BucketOptions,
        layer_type: LayerType,
        schema: &'static LayerSchema,
        mut buffers: BufferSet,
    ) -> Self {
        let layout = LayoutProperties::resolve(&options.layer, layer_type, options.zoom);
        let filter = FeatureFilter::compile(options.layer.filter.as_ref());
        ensure_buffers(schema, &mut buffers);

        BufferBuilder {
            layer: options.layer,
            layer_type,
            zoom: options.zoom,
            overscaling: options.overscaling,
            collision_debug: options.collision_debug,
            layout,
            filter,
            features: Vec::new(),
            schema,
            buffers,
            element_groups: vec![ElementGroups::new(); schema.shaders.len()],
        }
    }

    pub fn layer(&self) -> &StyleLayer {
        &self.layer
    }

    pub fn layer_type(&self) -> LayerType {
        self.layer_type
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn overscaling(&self) -> f64 {
        self.overscaling
    }

    pub fn collision_debug(&self) -> bool {
        self.collision_debug
    }

    pub fn layout(&self) -> &LayoutProperties {
        &self.layout
    }

    pub fn filter(&self) -> &FeatureFilter {
        &self.filter
    }

    pub fn schema(&self) -> &'static LayerSchema {
        self.schema
    }

    pub fn features(&self) -> &[&'f dyn VectorFeature] {
        &self.features
    }

    /// Assigns the features this layer builds. They are expected to have
    /// passed `filter()` already.
    pub fn set_features(&mut self, features: Vec<&'f dyn VectorFeature>) {
        self.features = features;
    }

    pub fn buffers(&self) -> &BufferSet {
        &self.buffers
    }

    pub fn into_buffers(self) -> BufferSet {
        self.buffers
    }

    /// Rebinds to `buffers`, creating any missing schema buffers, and starts
    /// over with empty element groups. Returns the previous set.
    pub fn reset_buffers(&mut self, mut buffers: BufferSet) -> BufferSet {
        ensure_buffers(self.schema, &mut buffers);
        for groups in &mut self.element_groups {
            *groups = ElementGroups::new();
        }
        mem::replace(&mut self.buffers, buffers)
    }

    pub fn shader_id(&self, name: &str) -> Result<ShaderId, BucketError> {
        self.schema
            .shader_index(name)
            .map(ShaderId)
            .ok_or_else(|| BucketError::SchemaViolation(format!("no shader '{}' in layer schema", name)))
    }

    pub fn element_groups(&self, shader: &str) -> Option<&ElementGroups> {
        self.schema.shader_index(shader).map(|i| &self.element_groups[i])
    }

    /// Element groups of every shader, in schema order.
    pub fn all_element_groups(&self) -> impl Iterator<Item = (&'static str, &ElementGroups)> + '_ {
        self.schema
            .shaders
            .iter()
            .zip(self.element_groups.iter())
            .map(|(shader, groups)| (shader.name, groups))
    }

    /// Reserves room for `vertex_count` vertices on `shader`, opening a new
    /// element group when the current one would overflow the index range.
    pub fn make_room_for(&mut self, shader: ShaderId, vertex_count: usize) -> Result<(), BucketError> {
        let schema = self.schema;
        let definition = &schema.shaders[shader.0];
        if vertex_count > MAX_INDEX {
            return Err(BucketError::SchemaViolation(format!(
                "cannot reserve {} vertices on '{}', a group holds at most {}",
                vertex_count, definition.name, MAX_INDEX
            )));
        }
        let length = |name: Option<&str>| name.and_then(|n| self.buffers.get(n)).map_or(0, |b| b.len());
        let origin = GroupOrigin {
            vertex: length(definition.vertex_buffer),
            element: length(definition.element_buffer),
            second_element: length(definition.second_element_buffer),
        };

        let groups = &mut self.element_groups[shader.0];
        if groups.make_room_for(vertex_count, origin) && groups.len() > 1 {
            console_log!(
                "Layer {}: opened element group {} for shader '{}' at vertex {}",
                self.layer.id,
                groups.len(),
                definition.name,
                origin.vertex
            );
        }
        Ok(())
    }

    /// Write operations for one shader.
    pub fn add(&mut self, shader: ShaderId) -> ShaderAdd<'_> {
        let schema = self.schema;
        ShaderAdd {
            shader: &schema.shaders[shader.0],
            groups: &mut self.element_groups[shader.0],
            buffers: &mut self.buffers,
        }
    }
}

fn ensure_buffers(schema: &LayerSchema, buffers: &mut BufferSet) {
    for shader in schema.shaders {
        if let Some(name) = shader.vertex_buffer {
            buffers.ensure_vertex(name, shader.attributes);
        }
        if let Some(name) = shader.element_buffer {
            buffers.ensure_element(name, shader.element_buffer_components);
        }
        if let Some(name) = shader.second_element_buffer {
            buffers.ensure_element(name, shader.second_element_buffer_components);
        }
    }
}

/// The add-vertex / add-element operations of one shader.
pub struct ShaderAdd<'a> {
    shader: &'static Shader,
    groups: &'a mut ElementGroups,
    buffers: &'a mut BufferSet,
}

impl ShaderAdd<'_> {
    /// Packs `args` through each attribute's value function and appends the
    /// record. Returns the vertex index local to the current group.
    pub fn vertex(&mut self, args: &[f64]) -> Result<usize, BucketError> {
        let name = self.shader.vertex_buffer.ok_or_else(|| self.violation("has no vertex buffer"))?;
        if args.len() != self.shader.vertex_args {
            return Err(self.violation(&format!(
                "takes {} vertex arguments, got {}",
                self.shader.vertex_args,
                args.len()
            )));
        }
        if !self.groups.take_reserved() {
            return Err(self.violation("vertex pushed without reserved room"));
        }
        let buffer = self
            .buffers
            .get_mut(name)
            .ok_or_else(|| BucketError::SchemaViolation(format!("missing buffer '{}'", name)))?;
        let group = self
            .groups
            .current_mut()
            .ok_or_else(|| BucketError::SchemaViolation("no current element group".into()))?;

        let attributes = self.shader.attributes;
        let index = buffer.push_with(|i| attributes.get(i).map_or([0.0; 4], |a| (a.value)(args)));
        group.vertex_length += 1;
        Ok(index - group.vertex_start_index)
    }

    /// Appends one primary element record.
    pub fn element(&mut self, indices: [usize; 3]) -> Result<usize, BucketError> {
        let name = self.shader.element_buffer.ok_or_else(|| self.violation("has no element buffer"))?;
        let components = self.shader.element_buffer_components;
        self.push_element(name, &indices[..components.min(3)], |g| &mut g.element_length)
    }

    /// Appends one secondary element record.
    pub fn second_element(&mut self, indices: [usize; 2]) -> Result<usize, BucketError> {
        let name = self
            .shader
            .second_element_buffer
            .ok_or_else(|| self.violation("has no second element buffer"))?;
        let components = self.shader.second_element_buffer_components;
        self.push_element(name, &indices[..components.min(2)], |g| &mut g.second_element_length)
    }

    fn push_element<F>(&mut self, name: &str, indices: &[usize], counter: F) -> Result<usize, BucketError>
    where
        F: FnOnce(&mut ElementGroup) -> &mut usize,
    {
        let group = self
            .groups
            .current_mut()
            .ok_or_else(|| BucketError::SchemaViolation(format!("element pushed to '{}' before any reservation", name)))?;
        let buffer = self
            .buffers
            .get_mut(name)
            .ok_or_else(|| BucketError::SchemaViolation(format!("missing buffer '{}'", name)))?;
        let values: Vec<f64> = indices.iter().map(|&i| i as f64).collect();
        let index = buffer.push(&values);
        *counter(group) += 1;
        Ok(index)
    }

    fn violation(&self, what: &str) -> BucketError {
        BucketError::SchemaViolation(format!("shader '{}' {}", self.shader.name, what))
    }
}

/// Common interface of the per-layer-type processors.
pub trait GeometryProcessor<'f> {
    fn builder(&self) -> &BufferBuilder<'f>;

    fn builder_mut(&mut self) -> &mut BufferBuilder<'f>;

    /// Writes one feature. Either all of its geometry is written or, on a
    /// decode error, none of it.
    fn add_feature(&mut self, feature: &dyn VectorFeature) -> Result<(), BucketError>;

    /// Writes every assigned feature. Features that fail to decode are
    /// logged and skipped; contract violations abort.
    fn add_features(&mut self) -> Result<(), BucketError> {
        let count = self.builder().features().len();
        let mut skipped = 0;
        for i in 0..count {
            let feature = self.builder().features()[i];
            match self.add_feature(feature) {
                Ok(()) => {}
                Err(BucketError::Decode(e)) => {
                    skipped += 1;
                    console_log!("Layer {}: skipping feature {:?}: {}", self.builder().layer().id, feature.id(), e);
                }
                Err(e) => return Err(e),
            }
        }
        console_log!(
            "Layer {}: built {} of {} features",
            self.builder().layer().id,
            count - skipped,
            count
        );
        Ok(())
    }
}

/// A layer's processor, selected by its type.
pub enum Bucket<'f> {
    Fill(FillBucket<'f>),
    Line(LineBucket<'f>),
    Circle(CircleBucket<'f>),
    Symbol(SymbolBucket<'f>),
}

impl<'f> Bucket<'f> {
    /// Fails with `UnsupportedLayerType` for types that produce no buffers.
    pub fn create(options: BucketOptions, buffers: BufferSet) -> Result<Self, BucketError> {
        let builder = BufferBuilder::new(options, buffers)?;
        Ok(match builder.layer_type() {
            LayerType::Fill => Bucket::Fill(FillBucket::new(builder)?),
            LayerType::Line => Bucket::Line(LineBucket::new(builder)?),
            LayerType::Circle => Bucket::Circle(CircleBucket::new(builder)?),
            LayerType::Symbol => Bucket::Symbol(SymbolBucket::new(builder)?),
        })
    }

    fn processor(&self) -> &dyn GeometryProcessor<'f> {
        match self {
            Bucket::Fill(b) => b,
            Bucket::Line(b) => b,
            Bucket::Circle(b) => b,
            Bucket::Symbol(b) => b,
        }
    }

    fn processor_mut(&mut self) -> &mut dyn GeometryProcessor<'f> {
        match self {
            Bucket::Fill(b) => b,
            Bucket::Line(b) => b,
            Bucket::Circle(b) => b,
            Bucket::Symbol(b) => b,
        }
    }

    pub fn builder(&self) -> &BufferBuilder<'f> {
        self.processor().builder()
    }

    pub fn builder_mut(&mut self) -> &mut BufferBuilder<'f> {
        self.processor_mut().builder_mut()
    }

    pub fn add_feature(&mut self, feature: &dyn VectorFeature) -> Result<(), BucketError> {
        self.processor_mut().add_feature(feature)
    }

    pub fn add_features(&mut self) -> Result<(), BucketError> {
        self.processor_mut().add_features()
    }

    pub fn set_features(&mut self, features: Vec<&'f dyn VectorFeature>) {
        self.builder_mut().set_features(features);
    }

    pub fn reset_buffers(&mut self, buffers: BufferSet) -> BufferSet {
        self.builder_mut().reset_buffers(buffers)
    }

    pub fn into_buffers(self) -> BufferSet {
        match self {
            Bucket::Fill(b) => b.into_builder().into_buffers(),
            Bucket::Line(b) => b.into_builder().into_buffers(),
            Bucket::Circle(b) => b.into_builder().into_buffers(),
            Bucket::Symbol(b) => b.into_builder().into_buffers(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{Attribute, AttributeType, BufferType};
    use crate::error::DecodeError;
    use crate::vectortile::{Ring, TilePoint};

    fn map_value(args: &[f64]) -> [f64; 4] {
        [args[0], 0.0, 0.0, 0.0]
    }

    fn box_value(args: &[f64]) -> [f64; 4] {
        [args[0] * 2.0, args[1] * 2.0, 0.0, 0.0]
    }

    static TEST_ATTRIBUTES: [Attribute; 2] = [
        Attribute::scalar("map", map_value),
        Attribute::new("box", 2, AttributeType::Short, box_value),
    ];

    static TEST_SHADERS: [Shader; 1] = [Shader::vertex_only("test", "testVertex", &TEST_ATTRIBUTES, 2)
        .with_elements("testElement")
        .with_second_elements("testSecondElement", 2)];

    static TEST_SCHEMA: LayerSchema = LayerSchema { shaders: &TEST_SHADERS };

    struct TestProcessor<'f> {
        builder: BufferBuilder<'f>,
        test: ShaderId,
    }

    impl<'f> GeometryProcessor<'f> for TestProcessor<'f> {
        fn builder(&self) -> &BufferBuilder<'f> {
            &self.builder
        }

        fn builder_mut(&mut self) -> &mut BufferBuilder<'f> {
            &mut self.builder
        }

        fn add_feature(&mut self, feature: &dyn VectorFeature) -> Result<(), BucketError> {
            let rings = feature.load_geometry()?;
            let point = rings[0][0];
            self.builder.make_room_for(self.test, 1)?;
            let mut add = self.builder.add(self.test);
            add.vertex(&[f64::from(point.x()), f64::from(point.y())])?;
            add.element([1, 2, 3])?;
            add.second_element([point.x() as usize, point.y() as usize])?;
            Ok(())
        }
    }

    struct PointFeature(i32, i32);

    impl VectorFeature for PointFeature {
        fn load_geometry(&self) -> Result<Vec<Ring>, DecodeError> {
            Ok(vec![vec![TilePoint::new(self.0, self.1)]])
        }
    }

    struct BrokenFeature;

    impl VectorFeature for BrokenFeature {
        fn load_geometry(&self) -> Result<Vec<Ring>, DecodeError> {
            Err(DecodeError::UnknownCommand(4))
        }
    }

    fn create<'f>() -> TestProcessor<'f> {
        let options = BucketOptions::new(StyleLayer::new("test", "circle"), 0.0);
        let builder = BufferBuilder::with_schema(options, LayerType::Circle, &TEST_SCHEMA, BufferSet::new());
        let test = builder.shader_id("test").unwrap();
        TestProcessor { builder, test }
    }

    #[test]
    fn add_features() {
        let feature = PointFeature(17, 42);
        let mut processor = create();
        processor.builder_mut().set_features(vec![&feature as &dyn VectorFeature]);
        processor.add_features().unwrap();

        let buffers = processor.builder().buffers();
        let vertex = buffers.get("testVertex").unwrap();
        assert_eq!(vertex.buffer_type(), BufferType::Vertex);
        assert_eq!(vertex.len(), 1);
        let record = vertex.get(0).unwrap();
        assert_eq!(record["map"], vec![17.0]);
        assert_eq!(record["box"], vec![34.0, 84.0]);

        let element = buffers.get("testElement").unwrap();
        assert_eq!(element.buffer_type(), BufferType::Element);
        assert_eq!(element.len(), 1);
        assert_eq!(element.get(0).unwrap()["vertices"], vec![1.0, 2.0, 3.0]);

        let second = buffers.get("testSecondElement").unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second.get(0).unwrap()["vertices"], vec![17.0, 42.0]);

        let groups = processor.builder().element_groups("test").unwrap();
        assert_eq!(groups.len(), 1);
        let current = groups.current().unwrap();
        assert_eq!(current.vertex_length, 1);
        assert_eq!(current.element_length, 1);
        assert_eq!(current.second_element_length, 1);
    }

    #[test]
    fn reset_buffers() {
        let feature = PointFeature(17, 42);
        let mut processor = create();
        processor.builder_mut().set_features(vec![&feature as &dyn VectorFeature]);
        processor.add_features().unwrap();

        let old = processor.builder_mut().reset_buffers(BufferSet::new());
        assert_eq!(old.get("testVertex").unwrap().len(), 1);

        let buffers = processor.builder().buffers();
        assert_eq!(buffers.get("testElement").unwrap().len(), 0);
        assert_eq!(buffers.get("testSecondElement").unwrap().len(), 0);
        assert!(processor.builder().element_groups("test").unwrap().is_empty());
    }

    #[test]
    fn layout_properties() {
        let processor = create();
        assert_eq!(processor.builder().layout().string("visibility"), Some("visible"));
    }

    #[test]
    fn decode_failures_skip_only_that_feature() {
        let good = PointFeature(1, 2);
        let bad = BrokenFeature;
        let mut processor = create();
        processor.builder_mut().set_features(vec![&bad as &dyn VectorFeature, &good]);
        processor.add_features().unwrap();
        assert_eq!(processor.builder().buffers().get("testVertex").unwrap().len(), 1);
    }

    #[test]
    fn vertex_without_reservation_is_a_violation() {
        let mut processor = create();
        let test = processor.test;
        let err = processor.builder.add(test).vertex(&[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, BucketError::SchemaViolation(_)));

        processor.builder.make_room_for(test, 1).unwrap();
        let mut add = processor.builder.add(test);
        assert_eq!(add.vertex(&[1.0, 2.0]).unwrap(), 0);
        assert!(add.vertex(&[1.0, 2.0]).is_err());
    }

    fn buffer_lengths(builder: &BufferBuilder<'_>) -> Vec<(String, usize)> {
        builder.buffers().iter().map(|(name, buffer)| (name.to_string(), buffer.len())).collect()
    }

    #[test]
    fn elements_on_a_shader_without_element_buffers_are_violations() {
        let options = BucketOptions::new(StyleLayer::new("labels", "symbol"), 10.0);
        let mut builder = BufferBuilder::new(options, BufferSet::new()).unwrap();
        let collision = builder.shader_id("collisionBox").unwrap();
        builder.make_room_for(collision, 1).unwrap();
        let before = buffer_lengths(&builder);

        let mut add = builder.add(collision);
        let err = add.element([0, 1, 2]).unwrap_err();
        assert!(matches!(&err, BucketError::SchemaViolation(m) if m.contains("no element buffer")));
        let err = add.second_element([0, 1]).unwrap_err();
        assert!(matches!(&err, BucketError::SchemaViolation(m) if m.contains("no second element buffer")));

        assert_eq!(buffer_lengths(&builder), before);
        let group = *builder.element_groups("collisionBox").unwrap().current().unwrap();
        assert_eq!(group.element_length, 0);
        assert_eq!(group.second_element_length, 0);
    }

    #[test]
    fn vertex_argument_count_must_match_the_shader() {
        let mut processor = create();
        let test = processor.test;
        processor.builder.make_room_for(test, 1).unwrap();
        let before = buffer_lengths(&processor.builder);

        let mut add = processor.builder.add(test);
        assert!(matches!(add.vertex(&[1.0]), Err(BucketError::SchemaViolation(_))));
        assert!(matches!(add.vertex(&[1.0, 2.0, 3.0]), Err(BucketError::SchemaViolation(_))));
        assert_eq!(buffer_lengths(&processor.builder), before);

        // The reservation is still there for a well-formed call.
        assert_eq!(processor.builder.add(test).vertex(&[1.0, 2.0]).unwrap(), 0);
    }

    #[test]
    fn oversized_reservation_is_a_violation() {
        let mut processor = create();
        let test = processor.test;
        assert!(processor.builder.make_room_for(test, MAX_INDEX + 1).is_err());
        assert!(processor.builder.shader_id("fill").is_err());
    }

    #[test]
    fn splits_groups_before_the_index_limit() {
        let mut processor = create();
        let test = processor.test;
        let total = MAX_INDEX + 10;
        for _ in 0..total {
            processor.builder.make_room_for(test, 1).unwrap();
            let local = processor.builder.add(test).vertex(&[0.0, 0.0]).unwrap();
            assert!(local <= MAX_INDEX);
        }
        let groups = processor.builder.element_groups("test").unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups.groups[0].vertex_length, MAX_INDEX);
        assert_eq!(groups.groups[1].vertex_start_index, MAX_INDEX);
        assert_eq!(groups.groups[1].vertex_length, 10);
    }

    #[test]
    fn create_rejects_unknown_layer_types() {
        let options = BucketOptions::new(StyleLayer::new("bg", "background"), 0.0);
        let result = Bucket::create(options, BufferSet::new());
        assert!(matches!(result, Err(BucketError::UnsupportedLayerType(t)) if t == "background"));
    }

    #[test]
    fn buckets_share_buffers_by_name() {
        let feature = PointFeature(100, 100);
        let options = BucketOptions::new(StyleLayer::new("a", "circle"), 10.0);
        let mut first = Bucket::create(options, BufferSet::new()).unwrap();
        first.set_features(vec![&feature as &dyn VectorFeature]);
        first.add_features().unwrap();

        let options = BucketOptions::new(StyleLayer::new("b", "circle"), 10.0);
        let mut second = Bucket::create(options, first.into_buffers()).unwrap();
        second.set_features(vec![&feature as &dyn VectorFeature]);
        second.add_features().unwrap();

        let buffers = second.into_buffers();
        assert_eq!(buffers.get("circleVertex").unwrap().len(), 8);
        assert_eq!(buffers.get("circleElement").unwrap().len(), 4);
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: BucketOptions =
            serde_json::from_str(r#"{ "layer": { "id": "x", "type": "fill" }, "zoom": 3 }"#).unwrap();
        assert_eq!(options.overscaling, 1.0);
        assert!(!options.collision_debug);
    }
}
