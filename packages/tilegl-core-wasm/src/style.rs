use std::collections::{BTreeMap, HashMap};

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::schema::LayerType;

/// Zoom at which symbol `*-max-size` values are frozen.
const MAX_SIZE_ZOOM: f64 = 18.0;

// Struct to match a style layer from the style JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleLayer {
    pub id: String,
    #[serde(rename = "type")]
    pub layer_type: String,
    #[serde(rename = "source-layer", default)]
    pub source_layer: Option<String>,
    #[serde(default)]
    pub minzoom: Option<f64>,
    #[serde(default)]
    pub maxzoom: Option<f64>,
    #[serde(default)]
    pub filter: Option<Value>,
    #[serde(default)]
    pub layout: BTreeMap<String, Value>,
    #[serde(default)]
    pub interactive: bool,
}

impl StyleLayer {
    pub fn new(id: &str, layer_type: &str) -> Self {
        StyleLayer {
            id: id.to_string(),
            layer_type: layer_type.to_string(),
            source_layer: None,
            minzoom: None,
            maxzoom: None,
            filter: None,
            layout: BTreeMap::new(),
            interactive: false,
        }
    }

    pub fn with_source_layer(mut self, source_layer: &str) -> Self {
        self.source_layer = Some(source_layer.to_string());
        self
    }

    pub fn with_layout(mut self, key: &str, value: Value) -> Self {
        self.layout.insert(key.to_string(), value);
        self
    }

    pub fn with_filter(mut self, filter: Value) -> Self {
        self.filter = Some(filter);
        self
    }

    /// `minzoom` is inclusive, `maxzoom` exclusive.
    pub fn in_zoom_range(&self, zoom: f64) -> bool {
        self.minzoom.map_or(true, |min| zoom >= min) && self.maxzoom.map_or(true, |max| zoom < max)
    }
}

/// A layout value: either a constant or a function of zoom.
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutFunction {
    Constant(Value),
    Stops { base: f64, stops: Vec<(f64, Value)> },
}

impl LayoutFunction {
    pub fn from_json(value: &Value) -> Self {
        let stops = value.get("stops").and_then(Value::as_array);
        match stops {
            Some(stops) if !stops.is_empty() => {
                let base = value.get("base").and_then(Value::as_f64).unwrap_or(1.0);
                let stops = stops
                    .iter()
                    .filter_map(|stop| {
                        let pair = stop.as_array()?;
                        Some((pair.first()?.as_f64()?, pair.get(1)?.clone()))
                    })
                    .collect();
                LayoutFunction::Stops { base, stops }
            }
            _ => LayoutFunction::Constant(value.clone()),
        }
    }

    /// Numeric stops interpolate exponentially; anything else steps.
    pub fn evaluate(&self, zoom: f64) -> Value {
        let (base, stops) = match self {
            LayoutFunction::Constant(v) => return v.clone(),
            LayoutFunction::Stops { base, stops } => (*base, stops),
        };
        let Some(first) = stops.first() else {
            return Value::Null;
        };
        if zoom <= first.0 {
            return first.1.clone();
        }
        for pair in stops.windows(2) {
            let (z0, v0) = &pair[0];
            let (z1, v1) = &pair[1];
            if zoom >= *z0 && zoom < *z1 {
                return match (v0.as_f64(), v1.as_f64()) {
                    (Some(a), Some(b)) => {
                        let t = interpolation_factor(base, zoom - z0, z1 - z0);
                        json!(a + t * (b - a))
                    }
                    _ => v0.clone(),
                };
            }
        }
        stops.last().map(|(_, v)| v.clone()).unwrap_or(Value::Null)
    }
}

fn interpolation_factor(base: f64, progress: f64, range: f64) -> f64 {
    if range == 0.0 {
        0.0
    } else if base == 1.0 {
        progress / range
    } else {
        (base.powf(progress) - 1.0) / (base.powf(range) - 1.0)
    }
}

lazy_static! {
    static ref LAYOUT_DEFAULTS: HashMap<LayerType, Vec<(&'static str, Value)>> = {
        let mut defaults = HashMap::new();
        defaults.insert(LayerType::Fill, vec![("visibility", json!("visible"))]);
        defaults.insert(LayerType::Circle, vec![("visibility", json!("visible"))]);
        defaults.insert(
            LayerType::Line,
            vec![
                ("visibility", json!("visible")),
                ("line-cap", json!("butt")),
                ("line-join", json!("miter")),
                ("line-miter-limit", json!(2)),
                ("line-round-limit", json!(1.05)),
            ],
        );
        defaults.insert(
            LayerType::Symbol,
            vec![
                ("visibility", json!("visible")),
                ("symbol-placement", json!("point")),
                ("symbol-spacing", json!(250)),
                ("symbol-avoid-edges", json!(false)),
                ("icon-allow-overlap", json!(false)),
                ("icon-ignore-placement", json!(false)),
                ("icon-optional", json!(false)),
                ("icon-size", json!(1)),
                ("icon-rotate", json!(0)),
                ("icon-padding", json!(2)),
                ("icon-offset", json!([0, 0])),
                ("text-field", json!("")),
                ("text-size", json!(16)),
                ("text-max-width", json!(15)),
                ("text-line-height", json!(1.2)),
                ("text-letter-spacing", json!(0)),
                ("text-justify", json!("center")),
                ("text-anchor", json!("center")),
                ("text-max-angle", json!(45)),
                ("text-rotate", json!(0)),
                ("text-padding", json!(2)),
                ("text-keep-upright", json!(true)),
                ("text-transform", json!("none")),
                ("text-offset", json!([0, 0])),
                ("text-allow-overlap", json!(false)),
                ("text-ignore-placement", json!(false)),
                ("text-optional", json!(false)),
            ],
        );
        defaults
    };
}

/// Layout values resolved for one build zoom.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LayoutProperties {
    values: BTreeMap<String, Value>,
}

impl LayoutProperties {
    /// Type defaults overlaid with the layer's declared values, each
    /// evaluated at `zoom`. Symbol sizes are additionally frozen at zoom 18
    /// as `*-max-size` and evaluated one zoom ahead.
    pub fn resolve(layer: &StyleLayer, layer_type: LayerType, zoom: f64) -> Self {
        let mut values: BTreeMap<String, Value> = LAYOUT_DEFAULTS
            .get(&layer_type)
            .map(|d| d.iter().map(|(k, v)| (k.to_string(), v.clone())).collect())
            .unwrap_or_default();

        let declared: BTreeMap<&str, LayoutFunction> = layer
            .layout
            .iter()
            .map(|(k, v)| (k.as_str(), LayoutFunction::from_json(v)))
            .collect();
        for (key, function) in &declared {
            values.insert(key.to_string(), function.evaluate(zoom));
        }

        if layer_type == LayerType::Symbol {
            for (size, max_size) in [("text-size", "text-max-size"), ("icon-size", "icon-max-size")] {
                match declared.get(size) {
                    Some(function) => {
                        values.insert(max_size.to_string(), function.evaluate(MAX_SIZE_ZOOM));
                        values.insert(size.to_string(), function.evaluate(zoom + 1.0));
                    }
                    None => {
                        let default = values.get(size).cloned().unwrap_or(Value::Null);
                        values.insert(max_size.to_string(), default);
                    }
                }
            }
        }

        LayoutProperties { values }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        self.values.get(key).and_then(Value::as_f64)
    }

    pub fn string(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    pub fn boolean(&self, key: &str) -> Option<bool> {
        self.values.get(key).and_then(Value::as_bool)
    }

    pub fn is_visible(&self) -> bool {
        self.string("visibility") != Some("none")
    }
}
