//! The rendering engine seam
//!
//! The map renderer itself lives outside this crate. [`RenderingEngine`] lists the
//! capabilities the synchronizer and the application need from it; every
//! mutation goes through `&mut self`, so one owner drives the engine at a time.

use super::paint::PaintValue;
use super::registry::{LayerDefinition, SourceSpec};
use super::Visibility;
use crate::Result;
use crate::utils::Coordinate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// Map center used before anything else is known (Mount Mansfield)
pub const DEFAULT_CENTER: Coordinate = Coordinate::new(-72.8146, 44.5438);

/// Screen position in pixels, origin top-left
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraState {
    pub center: Coordinate,
    pub zoom: f64,
    pub pitch: f64,
    pub bearing: f64,
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            center: DEFAULT_CENTER,
            zoom: 13.0,
            pitch: 60.0,
            bearing: 0.0,
        }
    }
}

/// 3D terrain settings passed to the engine
#[derive(Debug, Clone, PartialEq)]
pub struct TerrainSpec {
    pub source: String,
    pub exaggeration: f64,
}

/// A feature returned by a hit-test
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedFeature {
    pub layer_id: String,
    pub properties: Map<String, Value>,
    /// Line geometry, empty for anything but line strings
    pub path: Vec<Coordinate>,
}

impl RenderedFeature {
    /// The `id` property as a string; numeric ids are formatted
    pub fn feature_id(&self) -> Option<String> {
        match self.properties.get("id")? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn string_property(&self, key: &str) -> Option<&str> {
        self.properties
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }
}

/// Engine notifications the host forwards to the application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapEvent {
    /// The current style finished loading
    StyleLoaded,
    /// Rendering settled, all pending work is done
    Idle,
}

pub trait RenderingEngine {
    fn add_source(&mut self, source: &SourceSpec) -> Result<()>;
    fn has_source(&self, id: &str) -> bool;

    fn add_layer(&mut self, layer: &LayerDefinition) -> Result<()>;
    fn has_layer(&self, id: &str) -> bool;

    fn set_visibility(&mut self, layer_id: &str, visibility: Visibility) -> Result<()>;
    fn set_paint_property(&mut self, layer_id: &str, property: &str, value: &PaintValue) -> Result<()>;

    /// Move `layer_id` directly below `before_id`, or to the top when `None`
    fn move_layer(&mut self, layer_id: &str, before_id: Option<&str>) -> Result<()>;

    /// Ids of all current layers, bottom first
    fn layer_order(&self) -> Vec<String>;

    fn set_terrain(&mut self, terrain: Option<TerrainSpec>) -> Result<()>;

    /// Replace the base style; every added source and layer is dropped
    fn set_style(&mut self, style_url: &str) -> Result<()>;
    fn is_style_loaded(&self) -> bool;

    fn query_rendered_features(&self, point: ScreenPoint, layer_ids: &[&str]) -> Vec<RenderedFeature>;

    fn camera(&self) -> CameraState;
    fn set_camera(&mut self, camera: CameraState) -> Result<()>;
    fn ease_to_pitch(&mut self, pitch: f64, duration: Duration) -> Result<()>;

    fn set_hover_marker(&mut self, position: Option<Coordinate>) -> Result<()>;
}
