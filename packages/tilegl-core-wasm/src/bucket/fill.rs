use earcutr::earcut;

use crate::buffer::{Attribute, AttributeType};
use crate::console_log;
use crate::element_groups::MAX_INDEX;
use crate::error::BucketError;
use crate::schema::{LayerSchema, Shader};
use crate::vectortile::{Ring, TilePoint, VectorFeature};

use super::{BufferBuilder, GeometryProcessor, ShaderId};

fn pos(args: &[f64]) -> [f64; 4] {
    [args[0], args[1], 0.0, 0.0]
}

static FILL_ATTRIBUTES: [Attribute; 1] = [Attribute::new("pos", 2, AttributeType::Short, pos)];

static FILL_SHADERS: [Shader; 1] = [Shader::vertex_only("fill", "fillVertex", &FILL_ATTRIBUTES, 2)
    .with_elements("fillElement")
    .with_second_elements("outlineElement", 2)];

pub static FILL_SCHEMA: LayerSchema = LayerSchema { shaders: &FILL_SHADERS };

/// Twice the signed area of a ring; the sign gives its winding.
pub fn signed_area(ring: &[TilePoint]) -> i64 {
    let mut sum = 0i64;
    let mut j = ring.len().wrapping_sub(1);
    for (i, p1) in ring.iter().enumerate() {
        let p2 = ring[j];
        sum += (i64::from(p2.x()) - i64::from(p1.x())) * (i64::from(p1.y()) + i64::from(p2.y()));
        j = i;
    }
    sum
}

/// Groups rings into polygons `[outer, holes...]`. The first ring with a
/// non-zero area fixes the outer winding; each later ring with the same
/// winding starts a new polygon, others become holes of the current one.
/// Zero-area rings join the current polygon, or stand alone when none is
/// open yet; they only ever contribute outline.
pub fn classify_rings(rings: Vec<Ring>) -> Vec<Vec<Ring>> {
    if rings.len() <= 1 {
        return vec![rings];
    }

    let mut polygons = Vec::new();
    let mut polygon: Option<Vec<Ring>> = None;
    let mut ccw: Option<bool> = None;

    for ring in rings {
        let area = signed_area(&ring);
        if area == 0 {
            match polygon.as_mut() {
                Some(current) => current.push(ring),
                None => polygons.push(vec![ring]),
            }
            continue;
        }
        let outer_winding = *ccw.get_or_insert(area < 0);
        if outer_winding == (area < 0) {
            if let Some(done) = polygon.take() {
                polygons.push(done);
            }
            polygon = Some(vec![ring]);
        } else if let Some(current) = polygon.as_mut() {
            current.push(ring);
        }
    }
    if let Some(done) = polygon {
        polygons.push(done);
    }
    polygons
}

/// Polygon fills: triangulated interiors plus outline segments.
pub struct FillBucket<'f> {
    builder: BufferBuilder<'f>,
    fill: ShaderId,
}

impl<'f> FillBucket<'f> {
    pub fn new(builder: BufferBuilder<'f>) -> Result<Self, BucketError> {
        let fill = builder.shader_id("fill")?;
        Ok(FillBucket { builder, fill })
    }

    pub fn into_builder(self) -> BufferBuilder<'f> {
        self.builder
    }

    fn add_polygon(&mut self, polygon: &[Ring]) -> Result<(), BucketError> {
        let vertex_count: usize = polygon.iter().map(Vec::len).sum();
        if vertex_count == 0 {
            return Ok(());
        }
        if vertex_count > MAX_INDEX {
            console_log!(
                "Layer {}: skipping polygon with {} vertices, more than one element group holds",
                self.builder.layer().id,
                vertex_count
            );
            return Ok(());
        }

        self.builder.make_room_for(self.fill, vertex_count)?;
        let mut add = self.builder.add(self.fill);

        // Area rings go first so earcut indices line up with vertex order.
        let (area_rings, outline_rings): (Vec<&Ring>, Vec<&Ring>) =
            polygon.iter().partition(|ring| signed_area(ring) != 0);
        let fill_count = area_rings.len();

        let mut flattened: Vec<f64> = Vec::with_capacity(vertex_count * 2);
        let mut hole_indices = Vec::new();
        let mut start_index = None;

        for (r, ring) in area_rings.into_iter().chain(outline_rings).enumerate() {
            let triangulated = r < fill_count;
            if triangulated && r > 0 {
                hole_indices.push(flattened.len() / 2);
            }
            let mut first_index = 0;
            let mut prev_index = 0;
            for (v, point) in ring.iter().enumerate() {
                let (x, y) = (f64::from(point.x()), f64::from(point.y()));
                let index = add.vertex(&[x, y])?;
                if v == 0 {
                    first_index = index;
                    start_index.get_or_insert(index);
                } else {
                    add.second_element([prev_index, index])?;
                }
                prev_index = index;
                if triangulated {
                    flattened.push(x);
                    flattened.push(y);
                }
            }
            let open = ring.len() >= 3 && ring.first() != ring.last();
            if open {
                add.second_element([prev_index, first_index])?;
            }
        }

        let start_index = start_index.unwrap_or(0);
        if flattened.len() < 6 {
            return Ok(());
        }
        match earcut(&flattened, &hole_indices, 2) {
            Ok(triangles) => {
                for t in triangles.chunks_exact(3) {
                    add.element([start_index + t[0], start_index + t[1], start_index + t[2]])?;
                }
            }
            Err(e) => {
                console_log!("Triangulation failed, keeping outline only: {:?}", e);
            }
        }
        Ok(())
    }
}

impl<'f> GeometryProcessor<'f> for FillBucket<'f> {
    fn builder(&self) -> &BufferBuilder<'f> {
        &self.builder
    }

    fn builder_mut(&mut self) -> &mut BufferBuilder<'f> {
        &mut self.builder
    }

    fn add_feature(&mut self, feature: &dyn VectorFeature) -> Result<(), BucketError> {
        let rings = feature.load_geometry()?;
        for polygon in classify_rings(rings) {
            self.add_polygon(&polygon)?;
        }
        Ok(())
    }
}
