use crate::buffer::{Attribute, AttributeType};
use crate::error::BucketError;
use crate::schema::{LayerSchema, Shader};
use crate::vectortile::VectorFeature;

use super::{BufferBuilder, GeometryProcessor, ShaderId};

// Position doubled, with the extrusion corner folded into the low bit.
fn pos(args: &[f64]) -> [f64; 4] {
    let (x, y, extrude_x, extrude_y) = (args[0], args[1], args[2], args[3]);
    [x * 2.0 + (extrude_x + 1.0) / 2.0, y * 2.0 + (extrude_y + 1.0) / 2.0, 0.0, 0.0]
}

static CIRCLE_ATTRIBUTES: [Attribute; 1] = [Attribute::new("pos", 2, AttributeType::Short, pos)];

static CIRCLE_SHADERS: [Shader; 1] =
    [Shader::vertex_only("circle", "circleVertex", &CIRCLE_ATTRIBUTES, 4).with_elements("circleElement")];

pub static CIRCLE_SCHEMA: LayerSchema = LayerSchema { shaders: &CIRCLE_SHADERS };

// Room reserved per point.
const VERTICES_PER_CIRCLE: usize = 6;

/// Circles: one screen-aligned quad per point.
pub struct CircleBucket<'f> {
    builder: BufferBuilder<'f>,
    circle: ShaderId,
}

impl<'f> CircleBucket<'f> {
    pub fn new(builder: BufferBuilder<'f>) -> Result<Self, BucketError> {
        let circle = builder.shader_id("circle")?;
        Ok(CircleBucket { builder, circle })
    }

    pub fn into_builder(self) -> BufferBuilder<'f> {
        self.builder
    }
}

impl<'f> GeometryProcessor<'f> for CircleBucket<'f> {
    fn builder(&self) -> &BufferBuilder<'f> {
        &self.builder
    }

    fn builder_mut(&mut self) -> &mut BufferBuilder<'f> {
        &mut self.builder
    }

    fn add_feature(&mut self, feature: &dyn VectorFeature) -> Result<(), BucketError> {
        let extent = i64::from(feature.extent());
        for point in feature.load_geometry()?.iter().flatten() {
            let (x, y) = (i64::from(point.x()), i64::from(point.y()));
            // Circles anchored outside the tile are drawn by the neighbouring tile.
            if x < 0 || x >= extent || y < 0 || y >= extent {
                continue;
            }

            self.builder.make_room_for(self.circle, VERTICES_PER_CIRCLE)?;
            let mut add = self.builder.add(self.circle);
            let (x, y) = (x as f64, y as f64);

            // 3 ─ 2
            // │   │
            // 0 ─ 1
            let v0 = add.vertex(&[x, y, -1.0, -1.0])?;
            let v1 = add.vertex(&[x, y, 1.0, -1.0])?;
            let v2 = add.vertex(&[x, y, 1.0, 1.0])?;
            let v3 = add.vertex(&[x, y, -1.0, 1.0])?;

            add.element([v0, v1, v2])?;
            add.element([v0, v3, v2])?;
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
    use crate::vectortile::FeatureType;

    fn circle_bucket<'f>() -> CircleBucket<'f> {
        let options = BucketOptions::new(StyleLayer::new("poi", "circle"), 14.0);
        CircleBucket::new(BufferBuilder::new(options, BufferSet::new()).unwrap()).unwrap()
    }

    fn lengths(bucket: &CircleBucket<'_>) -> (usize, usize) {
        let buffers = bucket.builder().buffers();
        (buffers.get("circleVertex").unwrap().len(), buffers.get("circleElement").unwrap().len())
    }

    #[test]
    fn emits_one_quad_per_point() {
        let feature = StubFeature::new(FeatureType::Point, &[vec![(10, 20), (30, 40)], vec![(50, 60)]]);
        let mut bucket = circle_bucket();
        bucket.add_feature(&feature).unwrap();
        assert_eq!(lengths(&bucket), (12, 6));

        let elements = bucket.builder().buffers().get("circleElement").unwrap();
        assert_eq!(elements.get(0).unwrap()["vertices"], vec![0.0, 1.0, 2.0]);
        assert_eq!(elements.get(1).unwrap()["vertices"], vec![0.0, 3.0, 2.0]);
        assert_eq!(elements.get(2).unwrap()["vertices"], vec![4.0, 5.0, 6.0]);
    }

    #[test]
    fn packs_extrusion_into_position() {
        let feature = StubFeature::new(FeatureType::Point, &[vec![(10, 20)]]);
        let mut bucket = circle_bucket();
        bucket.add_feature(&feature).unwrap();

        let vertex = bucket.builder().buffers().get("circleVertex").unwrap();
        assert_eq!(vertex.get(0).unwrap()["pos"], vec![20.0, 40.0]);
        assert_eq!(vertex.get(1).unwrap()["pos"], vec![21.0, 40.0]);
        assert_eq!(vertex.get(2).unwrap()["pos"], vec![21.0, 41.0]);
        assert_eq!(vertex.get(3).unwrap()["pos"], vec![20.0, 41.0]);
    }

    #[test]
    fn culls_points_outside_the_extent() {
        let feature = StubFeature::new(
            FeatureType::Point,
            &[vec![(-1, 10), (10, -1), (4096, 10), (10, 4096), (0, 0), (4095, 4095)]],
        );
        let mut bucket = circle_bucket();
        bucket.add_feature(&feature).unwrap();
        assert_eq!(lengths(&bucket), (8, 4));
    }

    #[test]
    fn culling_uses_the_feature_extent() {
        let mut feature = StubFeature::new(FeatureType::Point, &[vec![(300, 10), (100, 10)]]);
        feature.extent = 256;
        let mut bucket = circle_bucket();
        bucket.add_feature(&feature).unwrap();
        assert_eq!(lengths(&bucket), (4, 2));
    }

    #[test]
    fn all_outside_leaves_no_group() {
        let feature = StubFeature::new(FeatureType::Point, &[vec![(-5, -5)]]);
        let mut bucket = circle_bucket();
        bucket.add_feature(&feature).unwrap();
        assert_eq!(lengths(&bucket), (0, 0));
        assert!(bucket.builder().element_groups("circle").unwrap().is_empty());
    }

    #[test]
    fn group_counts_track_quads() {
        let feature = StubFeature::new(FeatureType::Point, &[vec![(1, 1), (2, 2)]]);
        let mut bucket = circle_bucket();
        bucket.add_feature(&feature).unwrap();
        let group = *bucket.builder().element_groups("circle").unwrap().current().unwrap();
        assert_eq!(group.vertex_length, 8);
        assert_eq!(group.element_length, 4);
        assert_eq!(group.second_element_length, 0);
    }
}
