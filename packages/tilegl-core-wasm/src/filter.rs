// Legacy style filter expressions compiled to a predicate over features.

use std::cmp::Ordering;

use serde_json::Value;

use crate::console_log;
use crate::error::FilterError;
use crate::vectortile::{PropertyValue, VectorFeature};

#[derive(Debug, Clone, PartialEq)]
enum Scalar {
    Number(f64),
    String(String),
    Bool(bool),
}

impl Scalar {
    fn from_json(value: &Value) -> Result<Self, FilterError> {
        match value {
            Value::Number(n) => n
                .as_f64()
                .map(Scalar::Number)
                .ok_or_else(|| FilterError(format!("unrepresentable number {}", n))),
            Value::String(s) => Ok(Scalar::String(s.clone())),
            Value::Bool(b) => Ok(Scalar::Bool(*b)),
            other => Err(FilterError(format!("expected a scalar, got {}", other))),
        }
    }

    fn from_property(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::String(s) => Some(Scalar::String(s.clone())),
            PropertyValue::Bool(b) => Some(Scalar::Bool(*b)),
            PropertyValue::Null => None,
            number => number.as_f64().map(Scalar::Number),
        }
    }

    // Mixed types never order.
    fn compare(&self, other: &Scalar) -> Option<Ordering> {
        match (self, other) {
            (Scalar::Number(a), Scalar::Number(b)) => a.partial_cmp(b),
            (Scalar::String(a), Scalar::String(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Key {
    Type,
    Id,
    Property(String),
}

impl Key {
    fn parse(value: Option<&Value>) -> Result<Self, FilterError> {
        match value.and_then(Value::as_str) {
            Some("$type") => Ok(Key::Type),
            Some("$id") => Ok(Key::Id),
            Some(name) => Ok(Key::Property(name.to_string())),
            None => Err(FilterError("filter key must be a string".into())),
        }
    }

    fn lookup(&self, feature: &dyn VectorFeature) -> Option<Scalar> {
        match self {
            Key::Type => Some(Scalar::String(feature.geom_type().as_str().to_string())),
            Key::Id => feature.id().map(|id| Scalar::Number(id as f64)),
            Key::Property(name) => feature.property(name).and_then(Scalar::from_property),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Comparison {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Const(bool),
    Compare { op: Comparison, key: Key, value: Scalar },
    In { key: Key, values: Vec<Scalar>, negate: bool },
    Has { key: Key, negate: bool },
    All(Vec<Expr>),
    Any(Vec<Expr>),
    None(Vec<Expr>),
}

impl Expr {
    fn parse(value: &Value) -> Result<Self, FilterError> {
        let items = value
            .as_array()
            .ok_or_else(|| FilterError(format!("expected an array, got {}", value)))?;
        let op = items
            .first()
            .and_then(Value::as_str)
            .ok_or_else(|| FilterError("missing filter operator".into()))?;
        let args = &items[1..];

        let comparison = match op {
            "==" => Some(Comparison::Eq),
            "!=" => Some(Comparison::Ne),
            "<" => Some(Comparison::Lt),
            "<=" => Some(Comparison::Le),
            ">" => Some(Comparison::Gt),
            ">=" => Some(Comparison::Ge),
            _ => None,
        };
        if let Some(op) = comparison {
            if args.len() != 2 {
                return Err(FilterError(format!("'{:?}' takes a key and a value", op)));
            }
            return Ok(Expr::Compare {
                op,
                key: Key::parse(args.first())?,
                value: Scalar::from_json(&args[1])?,
            });
        }

        match op {
            "in" | "!in" => Ok(Expr::In {
                key: Key::parse(args.first())?,
                values: args.iter().skip(1).map(Scalar::from_json).collect::<Result<_, _>>()?,
                negate: op == "!in",
            }),
            "has" | "!has" => Ok(Expr::Has {
                key: Key::parse(args.first())?,
                negate: op == "!has",
            }),
            "all" | "any" | "none" => {
                let children = args.iter().map(Expr::parse).collect::<Result<Vec<_>, _>>()?;
                Ok(match op {
                    "all" => Expr::All(children),
                    "any" => Expr::Any(children),
                    _ => Expr::None(children),
                })
            }
            other => Err(FilterError(format!("unknown operator '{}'", other))),
        }
    }

    fn evaluate(&self, feature: &dyn VectorFeature) -> bool {
        match self {
            Expr::Const(result) => *result,
            Expr::Compare { op, key, value } => {
                let actual = key.lookup(feature);
                match op {
                    Comparison::Eq => actual.as_ref() == Some(value),
                    Comparison::Ne => actual.as_ref() != Some(value),
                    _ => {
                        let ordering = actual.and_then(|a| a.compare(value));
                        match (op, ordering) {
                            (_, None) => false,
                            (Comparison::Lt, Some(o)) => o == Ordering::Less,
                            (Comparison::Le, Some(o)) => o != Ordering::Greater,
                            (Comparison::Gt, Some(o)) => o == Ordering::Greater,
                            (_, Some(o)) => o != Ordering::Less,
                        }
                    }
                }
            }
            Expr::In { key, values, negate } => {
                let found = key.lookup(feature).map_or(false, |a| values.contains(&a));
                found != *negate
            }
            Expr::Has { key, negate } => {
                let present = match key {
                    Key::Type => true,
                    Key::Id => feature.id().is_some(),
                    Key::Property(name) => feature.property(name).is_some(),
                };
                present != *negate
            }
            Expr::All(children) => children.iter().all(|c| c.evaluate(feature)),
            Expr::Any(children) => children.iter().any(|c| c.evaluate(feature)),
            Expr::None(children) => !children.iter().any(|c| c.evaluate(feature)),
        }
    }
}

/// A compiled layer filter.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFilter {
    expr: Expr,
}

impl Default for FeatureFilter {
    fn default() -> Self {
        FeatureFilter { expr: Expr::Const(true) }
    }
}

impl FeatureFilter {
    /// Compiles a filter, failing on malformed expressions.
    pub fn parse(value: &Value) -> Result<Self, FilterError> {
        if value.is_null() {
            return Ok(FeatureFilter::default());
        }
        Ok(FeatureFilter { expr: Expr::parse(value)? })
    }

    /// Compiles a layer's optional filter. A missing filter accepts every
    /// feature, an invalid one rejects every feature.
    pub fn compile(value: Option<&Value>) -> Self {
        match value.map(FeatureFilter::parse) {
            None => FeatureFilter::default(),
            Some(Ok(filter)) => filter,
            Some(Err(e)) => {
                console_log!("Ignoring layer filter, no features will match: {}", e);
                FeatureFilter { expr: Expr::Const(false) }
            }
        }
    }

    pub fn evaluate(&self, feature: &dyn VectorFeature) -> bool {
        self.expr.evaluate(feature)
    }
}
