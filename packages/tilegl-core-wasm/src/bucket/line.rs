use geo_types::{coord, Coord};

use crate::buffer::{Attribute, AttributeType};
use crate::console_log;
use crate::element_groups::MAX_INDEX;
use crate::error::BucketError;
use crate::schema::{LayerSchema, Shader};
use crate::vectortile::{TilePoint, VectorFeature};

use super::{BufferBuilder, GeometryProcessor, ShaderId};

/// Extrusion vectors are stored as `round(v * EXTRUDE_SCALE) + 128`.
const EXTRUDE_SCALE: f64 = 63.0;
/// Line distance is stored at half resolution.
const LINE_DISTANCE_SCALE: f64 = 0.5;
/// Upper bound of vertices emitted for one line vertex (a bevel pair plus a pair).
const MAX_VERTICES_PER_POINT: usize = 4;
/// Joins sharper than this are always beveled, whatever the miter limit.
const SHARP_CORNER_COS: f64 = 1e-6;

// args: x, y, extrude x, extrude y, round flag, up flag, direction, distance
fn pos(args: &[f64]) -> [f64; 4] {
    [args[0] * 2.0 + args[4], args[1] * 2.0 + args[5], 0.0, 0.0]
}

fn data(args: &[f64]) -> [f64; 4] {
    let distance = (args[7] * LINE_DISTANCE_SCALE).floor() as i64;
    let dir = args[6].signum() as i64 * i64::from(args[6] != 0.0);
    [
        (EXTRUDE_SCALE * args[2]).round() + 128.0,
        (EXTRUDE_SCALE * args[3]).round() + 128.0,
        ((dir + 1) | ((distance & 0x3f) << 2)) as f64,
        ((distance >> 6) & 0xff) as f64,
    ]
}

static LINE_ATTRIBUTES: [Attribute; 2] = [
    Attribute::new("pos", 2, AttributeType::Short, pos),
    Attribute::new("data", 4, AttributeType::UnsignedByte, data),
];

static LINE_SHADERS: [Shader; 1] =
    [Shader::vertex_only("line", "lineVertex", &LINE_ATTRIBUTES, 8).with_elements("lineElement")];

pub static LINE_SCHEMA: LayerSchema = LayerSchema { shaders: &LINE_SHADERS };

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineJoin {
    Miter,
    Bevel,
    Round,
}

impl LineJoin {
    fn parse(value: Option<&str>) -> Self {
        match value {
            Some("bevel") => LineJoin::Bevel,
            Some("round") => LineJoin::Round,
            _ => LineJoin::Miter,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineCap {
    Butt,
    Square,
    Round,
}

impl LineCap {
    fn parse(value: Option<&str>) -> Self {
        match value {
            Some("square") => LineCap::Square,
            Some("round") => LineCap::Round,
            _ => LineCap::Butt,
        }
    }
}

/// Layout values the line builder reads.
#[derive(Debug, Clone, Copy)]
struct LineStyle {
    join: LineJoin,
    cap: LineCap,
    miter_limit: f64,
    round_limit: f64,
}

fn unit(v: Coord<f64>) -> Coord<f64> {
    let length = v.x.hypot(v.y);
    if length == 0.0 {
        v
    } else {
        v / length
    }
}

fn perp(v: Coord<f64>) -> Coord<f64> {
    coord! { x: -v.y, y: v.x }
}

fn dot(a: Coord<f64>, b: Coord<f64>) -> f64 {
    a.x * b.x + a.y * b.y
}

fn to_coord(p: TilePoint) -> Coord<f64> {
    coord! { x: f64::from(p.x()), y: f64::from(p.y()) }
}

/// Lines: triangle strips extruded in the vertex shader, with joins and caps.
pub struct LineBucket<'f> {
    builder: BufferBuilder<'f>,
    line: ShaderId,
    style: LineStyle,
}

/// Strip state while one line is being written.
struct Strip {
    e1: Option<usize>,
    e2: Option<usize>,
}

impl<'f> LineBucket<'f> {
    pub fn new(builder: BufferBuilder<'f>) -> Result<Self, BucketError> {
        let line = builder.shader_id("line")?;
        let layout = builder.layout();
        let style = LineStyle {
            join: LineJoin::parse(layout.string("line-join")),
            cap: LineCap::parse(layout.string("line-cap")),
            miter_limit: layout.number("line-miter-limit").unwrap_or(2.0),
            round_limit: layout.number("line-round-limit").unwrap_or(1.05),
        };
        Ok(LineBucket { builder, line, style })
    }

    pub fn into_builder(self) -> BufferBuilder<'f> {
        self.builder
    }

    fn add_line(&mut self, vertices: &[TilePoint]) -> Result<(), BucketError> {
        let mut points: Vec<TilePoint> = Vec::with_capacity(vertices.len());
        for &p in vertices {
            if points.last() != Some(&p) {
                points.push(p);
            }
        }
        let len = points.len();
        if len < 2 {
            return Ok(());
        }

        let max_vertices = len * MAX_VERTICES_PER_POINT;
        if max_vertices > MAX_INDEX {
            console_log!(
                "Layer {}: skipping line with {} points, more than one element group holds",
                self.builder.layer().id,
                len
            );
            return Ok(());
        }

        let closed = len > 2 && points[0] == points[len - 1];
        let style = self.style;
        let coords: Vec<Coord<f64>> = points.into_iter().map(to_coord).collect();

        self.builder.make_room_for(self.line, max_vertices)?;
        let mut strip = Strip { e1: None, e2: None };
        let mut distance = 0.0;

        for i in 0..len {
            let current = coords[i];
            let prev = if i > 0 {
                Some(coords[i - 1])
            } else if closed {
                Some(coords[len - 2])
            } else {
                None
            };
            let next = if i + 1 < len {
                Some(coords[i + 1])
            } else if closed {
                Some(coords[1])
            } else {
                None
            };

            if i > 0 {
                let step = current - coords[i - 1];
                distance += step.x.hypot(step.y);
            }

            let prev_normal = prev.map(|p| perp(unit(current - p)));
            let next_normal = next.map(|n| perp(unit(n - current)));
            let (prev_normal, next_normal) = match (prev_normal, next_normal) {
                (Some(p), Some(n)) => (p, n),
                (Some(p), None) => (p, p),
                (None, Some(n)) => (n, n),
                (None, None) => return Ok(()),
            };

            let is_start = !closed && i == 0;
            let is_end = !closed && i == len - 1;
            if is_start || is_end {
                let (normal, dir) = if is_start { (next_normal, -1.0) } else { (prev_normal, 1.0) };
                self.add_cap(&mut strip, current, normal, dir, distance, style.cap)?;
                continue;
            }

            let sum = prev_normal + next_normal;
            let joined = sum.x != 0.0 || sum.y != 0.0;
            let join_normal = unit(sum);
            let cos_half_angle = dot(join_normal, next_normal);
            let miter_length = if joined && cos_half_angle > SHARP_CORNER_COS {
                1.0 / cos_half_angle
            } else {
                f64::INFINITY
            };

            let miter = match style.join {
                LineJoin::Miter => miter_length <= style.miter_limit,
                LineJoin::Round => miter_length < style.round_limit,
                LineJoin::Bevel => miter_length <= 1.0,
            };

            if miter {
                self.add_pair(&mut strip, current, join_normal * miter_length, 0.0, 0.0, distance)?;
            } else {
                let round = if style.join == LineJoin::Round { 1.0 } else { 0.0 };
                self.add_pair(&mut strip, current, prev_normal, round, 0.0, distance)?;
                self.add_pair(&mut strip, current, next_normal, round, 0.0, distance)?;
            }
        }
        Ok(())
    }

    fn add_cap(
        &mut self,
        strip: &mut Strip,
        at: Coord<f64>,
        normal: Coord<f64>,
        dir: f64,
        distance: f64,
        cap: LineCap,
    ) -> Result<(), BucketError> {
        match cap {
            LineCap::Butt => self.add_pair(strip, at, normal, 0.0, 0.0, distance),
            LineCap::Square | LineCap::Round => {
                // Direction of travel is the normal rotated back by 90 degrees.
                let along = coord! { x: normal.y, y: -normal.x } * dir;
                let round = if cap == LineCap::Round { 1.0 } else { 0.0 };
                self.add_vertex(strip, at, normal + along, round, 1.0, dir, distance)?;
                self.add_vertex(strip, at, -normal + along, round, 0.0, dir, distance)
            }
        }
    }

    fn add_pair(
        &mut self,
        strip: &mut Strip,
        at: Coord<f64>,
        extrude: Coord<f64>,
        round: f64,
        dir: f64,
        distance: f64,
    ) -> Result<(), BucketError> {
        self.add_vertex(strip, at, extrude, round, 1.0, dir, distance)?;
        self.add_vertex(strip, at, -extrude, round, 0.0, dir, distance)
    }

    #[allow(clippy::too_many_arguments)]
    fn add_vertex(
        &mut self,
        strip: &mut Strip,
        at: Coord<f64>,
        extrude: Coord<f64>,
        round: f64,
        up: f64,
        dir: f64,
        distance: f64,
    ) -> Result<(), BucketError> {
        let mut add = self.builder.add(self.line);
        let index = add.vertex(&[at.x, at.y, extrude.x, extrude.y, round, up, dir, distance])?;
        if let (Some(e1), Some(e2)) = (strip.e1, strip.e2) {
            add.element([e1, e2, index])?;
        }
        strip.e1 = strip.e2;
        strip.e2 = Some(index);
        Ok(())
    }
}

impl<'f> GeometryProcessor<'f> for LineBucket<'f> {
    fn builder(&self) -> &BufferBuilder<'f> {
        &self.builder
    }

    fn builder_mut(&mut self) -> &mut BufferBuilder<'f> {
        &mut self.builder
    }

    fn add_feature(&mut self, feature: &dyn VectorFeature) -> Result<(), BucketError> {
        for line in feature.load_geometry()? {
            self.add_line(&line)?;
        }
        Ok(())
    }
}
