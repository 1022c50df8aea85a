//! Headless rendering engine
//!
//! Keeps sources, layers, paint and camera in memory with the same rules a real
//! map engine applies: nothing can be added before the style has loaded, a style
//! swap drops every added source and layer, and unknown layers are rejected.
//! Layer creation can be made to lag behind `add_layer`, as it does on a busy
//! engine right after a style swap.
//! Hit-testing uses features placed at fixed screen positions.

use super::engine::{CameraState, RenderedFeature, RenderingEngine, ScreenPoint, TerrainSpec};
use super::paint::PaintValue;
use super::registry::{LayerDefinition, SourceSpec};
use super::Visibility;
use crate::utils::Coordinate;
use crate::{Result, TrailMapError};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Distance in pixels within which a placed feature counts as hit
const HIT_RADIUS_PX: f64 = 5.0;

#[derive(Debug, Clone)]
struct EngineLayer {
    definition: LayerDefinition,
    visibility: Visibility,
    paint: HashMap<String, PaintValue>,
    /// The layer is invisible to every query before this
    ready_at: Instant,
}

#[derive(Debug, Clone)]
struct HitTarget {
    source_id: String,
    at: ScreenPoint,
    feature: RenderedFeature,
}

#[derive(Debug, Clone)]
pub struct InMemoryEngine {
    style_url: Option<String>,
    /// When the current style counts as loaded; `None` while loading indefinitely
    loaded_at: Option<Instant>,
    style_load_delay: Option<Duration>,
    layer_creation_delay: Duration,
    sources: HashMap<String, SourceSpec>,
    /// Bottom first
    layers: Vec<EngineLayer>,
    terrain: Option<TerrainSpec>,
    camera: CameraState,
    hover_marker: Option<Coordinate>,
    hit_targets: Vec<HitTarget>,
    style_loads: usize,
}

impl Default for InMemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryEngine {
    /// Engine with no style; call [`set_style`](RenderingEngine::set_style) first
    pub fn new() -> Self {
        Self {
            style_url: None,
            loaded_at: None,
            style_load_delay: None,
            layer_creation_delay: Duration::ZERO,
            sources: HashMap::new(),
            layers: Vec::new(),
            terrain: None,
            camera: CameraState::default(),
            hover_marker: None,
            hit_targets: Vec::new(),
            style_loads: 0,
        }
    }

    /// Styles finish loading on their own after `delay`.
    ///
    /// Without a delay a style stays loading until [`finish_style_load`](Self::finish_style_load).
    pub fn with_style_load_delay(mut self, delay: Duration) -> Self {
        self.style_load_delay = Some(delay);
        self
    }

    /// Added layers only show up `delay` after their `add_layer` call
    pub fn with_layer_creation_delay(mut self, delay: Duration) -> Self {
        self.layer_creation_delay = delay;
        self
    }

    /// Mark the current style as loaded now
    pub fn finish_style_load(&mut self) {
        self.loaded_at = Some(Instant::now());
    }

    /// Place a feature of `source_id` at a screen position for hit-testing
    pub fn place_feature(&mut self, source_id: &str, at: ScreenPoint, feature: RenderedFeature) {
        self.hit_targets.push(HitTarget {
            source_id: source_id.to_string(),
            at,
            feature,
        });
    }

    pub fn style_url(&self) -> Option<&str> {
        self.style_url.as_deref()
    }

    /// Number of `set_style` calls so far
    pub fn style_loads(&self) -> usize {
        self.style_loads
    }

    pub fn visibility(&self, layer_id: &str) -> Option<Visibility> {
        self.layer(layer_id).map(|layer| layer.visibility)
    }

    pub fn paint(&self, layer_id: &str, property: &str) -> Option<&PaintValue> {
        self.layer(layer_id)?.paint.get(property)
    }

    pub fn definition(&self, layer_id: &str) -> Option<&LayerDefinition> {
        self.layer(layer_id).map(|layer| &layer.definition)
    }

    pub fn terrain(&self) -> Option<&TerrainSpec> {
        self.terrain.as_ref()
    }

    pub fn hover_marker(&self) -> Option<Coordinate> {
        self.hover_marker
    }

    /// Sources and layers as they stand now, in style document form.
    ///
    /// Layers are listed bottom first with their current visibility and paint.
    pub fn style_json(&self) -> Value {
        let now = Instant::now();
        let sources: Map<String, Value> = self
            .sources
            .iter()
            .map(|(id, spec)| (id.clone(), spec.to_style_json()))
            .collect();
        let layers: Vec<Value> = self
            .layers
            .iter()
            .filter(|layer| layer.is_ready(now))
            .map(|layer| layer.current_definition().to_style_json())
            .collect();
        json!({
            "sources": sources,
            "layers": layers,
        })
    }

    fn layer(&self, id: &str) -> Option<&EngineLayer> {
        let now = Instant::now();
        self.layers
            .iter()
            .find(|layer| layer.definition.id == id && layer.is_ready(now))
    }

    fn layer_mut(&mut self, id: &str) -> Result<&mut EngineLayer> {
        let now = Instant::now();
        self.layers
            .iter_mut()
            .find(|layer| layer.definition.id == id && layer.is_ready(now))
            .ok_or_else(|| TrailMapError::UnknownLayer(id.to_string()))
    }

    fn layer_index(&self, id: &str) -> Result<usize> {
        let now = Instant::now();
        self.layers
            .iter()
            .position(|layer| layer.definition.id == id && layer.is_ready(now))
            .ok_or_else(|| TrailMapError::UnknownLayer(id.to_string()))
    }

    fn is_pending(&self, id: &str) -> bool {
        let now = Instant::now();
        self.layers
            .iter()
            .any(|layer| layer.definition.id == id && !layer.is_ready(now))
    }

    fn ensure_loaded(&self) -> Result<()> {
        if self.is_style_loaded() {
            Ok(())
        } else {
            Err(TrailMapError::Engine("Style is not done loading".to_string()))
        }
    }
}

impl EngineLayer {
    fn is_ready(&self, now: Instant) -> bool {
        now >= self.ready_at
    }

    fn current_definition(&self) -> LayerDefinition {
        let mut paint: Vec<(String, PaintValue)> = self
            .paint
            .iter()
            .map(|(property, value)| (property.clone(), value.clone()))
            .collect();
        paint.sort_by(|a, b| a.0.cmp(&b.0));
        LayerDefinition {
            visibility: self.visibility,
            paint,
            ..self.definition.clone()
        }
    }
}

impl RenderingEngine for InMemoryEngine {
    fn add_source(&mut self, source: &SourceSpec) -> Result<()> {
        self.ensure_loaded()?;
        if self.sources.contains_key(source.id) {
            return Err(TrailMapError::Engine(format!(
                "There is already a source with id \"{}\"",
                source.id
            )));
        }
        self.sources.insert(source.id.to_string(), source.clone());
        Ok(())
    }

    fn has_source(&self, id: &str) -> bool {
        self.sources.contains_key(id)
    }

    fn add_layer(&mut self, layer: &LayerDefinition) -> Result<()> {
        self.ensure_loaded()?;
        if self.is_pending(&layer.id) {
            tracing::trace!(layer = %layer.id, "Layer already being created");
            return Ok(());
        }
        if self.has_layer(&layer.id) {
            return Err(TrailMapError::Engine(format!(
                "Layer with id \"{}\" already exists",
                layer.id
            )));
        }
        if !self.sources.contains_key(&layer.source_id) {
            return Err(TrailMapError::Engine(format!(
                "Source \"{}\" not found for layer \"{}\"",
                layer.source_id, layer.id
            )));
        }
        self.layers.push(EngineLayer {
            definition: layer.clone(),
            visibility: layer.visibility,
            paint: layer.paint.iter().cloned().collect(),
            ready_at: Instant::now() + self.layer_creation_delay,
        });
        Ok(())
    }

    fn has_layer(&self, id: &str) -> bool {
        self.layer(id).is_some()
    }

    fn set_visibility(&mut self, layer_id: &str, visibility: Visibility) -> Result<()> {
        self.layer_mut(layer_id)?.visibility = visibility;
        Ok(())
    }

    fn set_paint_property(&mut self, layer_id: &str, property: &str, value: &PaintValue) -> Result<()> {
        self.layer_mut(layer_id)?
            .paint
            .insert(property.to_string(), value.clone());
        Ok(())
    }

    fn move_layer(&mut self, layer_id: &str, before_id: Option<&str>) -> Result<()> {
        let from = self.layer_index(layer_id)?;
        if let Some(before) = before_id {
            self.layer_index(before)?;
        }
        let layer = self.layers.remove(from);
        let to = match before_id {
            Some(before) => self.layer_index(before)?,
            None => self.layers.len(),
        };
        self.layers.insert(to, layer);
        Ok(())
    }

    fn layer_order(&self) -> Vec<String> {
        let now = Instant::now();
        self.layers
            .iter()
            .filter(|layer| layer.is_ready(now))
            .map(|layer| layer.definition.id.clone())
            .collect()
    }

    fn set_terrain(&mut self, terrain: Option<TerrainSpec>) -> Result<()> {
        if let Some(spec) = &terrain {
            self.ensure_loaded()?;
            if !self.sources.contains_key(&spec.source) {
                return Err(TrailMapError::Engine(format!(
                    "Terrain source \"{}\" not found",
                    spec.source
                )));
            }
        }
        self.terrain = terrain;
        Ok(())
    }

    fn set_style(&mut self, style_url: &str) -> Result<()> {
        self.style_url = Some(style_url.to_string());
        self.loaded_at = self.style_load_delay.map(|delay| Instant::now() + delay);
        self.sources.clear();
        self.layers.clear();
        self.terrain = None;
        // A fresh style brings its own initial camera
        self.camera = CameraState::default();
        self.style_loads += 1;
        Ok(())
    }

    fn is_style_loaded(&self) -> bool {
        self.loaded_at.is_some_and(|at| Instant::now() >= at)
    }

    fn query_rendered_features(&self, point: ScreenPoint, layer_ids: &[&str]) -> Vec<RenderedFeature> {
        let now = Instant::now();
        let mut hits = Vec::new();
        // Topmost layer first
        for layer in self.layers.iter().rev() {
            let definition = &layer.definition;
            if !layer.is_ready(now) || !layer.visibility.is_visible() || !layer_ids.contains(&definition.id.as_str()) {
                continue;
            }
            for target in &self.hit_targets {
                let dx = target.at.x - point.x;
                let dy = target.at.y - point.y;
                if target.source_id == definition.source_id && dx.hypot(dy) <= HIT_RADIUS_PX {
                    let mut feature = target.feature.clone();
                    feature.layer_id = definition.id.clone();
                    hits.push(feature);
                }
            }
        }
        hits
    }

    fn camera(&self) -> CameraState {
        self.camera
    }

    fn set_camera(&mut self, camera: CameraState) -> Result<()> {
        self.camera = camera;
        Ok(())
    }

    fn ease_to_pitch(&mut self, pitch: f64, _duration: Duration) -> Result<()> {
        // No animation: the target pitch is reached immediately
        self.camera.pitch = pitch;
        Ok(())
    }

    fn set_hover_marker(&mut self, position: Option<Coordinate>) -> Result<()> {
        self.hover_marker = position;
        Ok(())
    }
}
