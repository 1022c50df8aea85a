//! Paint property values and the trail selection rules

use serde_json::{Map, Value, json};
use std::borrow::Cow;

pub const TRAIL_HIGHLIGHT_COLOR: &str = "#FF9800";
pub const TRAIL_LINE_COLOR: &str = "black";
pub const TRAIL_LINE_WIDTH: f64 = 4.0;
pub const TRAIL_LINE_HIGHLIGHT_WIDTH: f64 = 6.0;
pub const TRAIL_BORDER_COLOR: &str = "rgba(200, 200, 200, 0.6)";
pub const TRAIL_BORDER_WIDTH: f64 = 10.0;
pub const TRAIL_BORDER_HIGHLIGHT_WIDTH: f64 = 8.0;

/// Value of one paint property
#[derive(Debug, Clone, PartialEq)]
pub enum PaintValue {
    Color(Cow<'static, str>),
    Number(f64),
    /// Two-way conditional on the feature `id` property.
    ///
    /// The property is compared in string form so numeric and string ids
    /// both match.
    MatchFeature {
        feature_id: String,
        matched: Box<PaintValue>,
        otherwise: Box<PaintValue>,
    },
    /// Engine expression passed through untouched
    Raw(Value),
}

impl PaintValue {
    pub const fn color(color: &'static str) -> Self {
        Self::Color(Cow::Borrowed(color))
    }

    pub fn match_feature(feature_id: impl Into<String>, matched: PaintValue, otherwise: PaintValue) -> Self {
        Self::MatchFeature {
            feature_id: feature_id.into(),
            matched: Box::new(matched),
            otherwise: Box::new(otherwise),
        }
    }

    /// Style-expression form understood by the engine
    pub fn to_expression(&self) -> Value {
        match self {
            Self::Color(color) => Value::String(color.to_string()),
            Self::Number(n) => json!(n),
            Self::MatchFeature {
                feature_id,
                matched,
                otherwise,
            } => json!([
                "case",
                ["==", ["to-string", ["get", "id"]], feature_id],
                matched.to_expression(),
                otherwise.to_expression()
            ]),
            Self::Raw(value) => value.clone(),
        }
    }

    /// Value a feature with `properties` is painted with.
    ///
    /// Raw expressions are not evaluated and come back unchanged.
    pub fn resolve_for(&self, properties: &Map<String, Value>) -> PaintValue {
        match self {
            Self::MatchFeature {
                feature_id,
                matched,
                otherwise,
            } => {
                let id = properties.get("id").map(|id| match id {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                });
                if id.as_deref() == Some(feature_id.as_str()) {
                    matched.resolve_for(properties)
                } else {
                    otherwise.resolve_for(properties)
                }
            }
            other => other.clone(),
        }
    }
}

impl From<f64> for PaintValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

/// `line-color` and `line-width` of the trail line for a selection
pub fn trail_line_paint(selected: Option<&str>) -> Vec<(&'static str, PaintValue)> {
    let color = PaintValue::color(TRAIL_LINE_COLOR);
    let width = PaintValue::Number(TRAIL_LINE_WIDTH);
    match selected {
        Some(id) => vec![
            (
                "line-color",
                PaintValue::match_feature(id, PaintValue::color(TRAIL_HIGHLIGHT_COLOR), color),
            ),
            (
                "line-width",
                PaintValue::match_feature(id, PaintValue::Number(TRAIL_LINE_HIGHLIGHT_WIDTH), width),
            ),
        ],
        None => vec![("line-color", color), ("line-width", width)],
    }
}

/// `line-color` and `line-width` of the trail border for a selection
pub fn trail_border_paint(selected: Option<&str>) -> Vec<(&'static str, PaintValue)> {
    let color = PaintValue::color(TRAIL_BORDER_COLOR);
    let width = PaintValue::Number(TRAIL_BORDER_WIDTH);
    match selected {
        Some(id) => vec![
            (
                "line-color",
                PaintValue::match_feature(id, PaintValue::color(TRAIL_HIGHLIGHT_COLOR), color),
            ),
            (
                "line-width",
                PaintValue::match_feature(id, PaintValue::Number(TRAIL_BORDER_HIGHLIGHT_WIDTH), width),
            ),
        ],
        None => vec![("line-color", color), ("line-width", width)],
    }
}
