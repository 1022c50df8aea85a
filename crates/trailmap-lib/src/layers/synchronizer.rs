//! Layer synchronization state machine
//!
//! Every layer is either absent from the engine or present with some
//! visibility. The synchronizer moves through three phases:
//!
//! ```text
//!            begin_style_swap                 style loaded,
//!   Ready ───────────────────▶ AwaitingStyle ───────────────▶ Ready
//!     ▲                              │         layers present
//!     │                              │ style loaded,
//!     │      layers present          ▼ layers missing
//!     └──────────────────────── Restoring
//! ```
//!
//! What the user asked for (toggles, selection highlight, terrain) is recorded
//! here first and pushed to the engine whenever the target layer exists, so a
//! request never gets lost to a style that is still loading.

use super::engine::{CameraState, RenderingEngine, TerrainSpec};
use super::paint::{PaintValue, trail_border_paint, trail_line_paint};
use super::registry::{LayerDefinition, LayerRegistry, LayerSpec};
use super::{BasemapStyle, Visibility, ids};
use crate::{Result, TrailMapError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

pub const DEFAULT_TERRAIN_EXAGGERATION: f64 = 1.2;
pub const MIN_TERRAIN_EXAGGERATION: f64 = 1.0;
pub const MAX_TERRAIN_EXAGGERATION: f64 = 2.0;

/// Pitch eased to when 3D terrain is switched on
const TERRAIN_PITCH: f64 = 60.0;
const FLAT_PITCH: f64 = 0.0;
const PITCH_EASE: Duration = Duration::from_millis(1000);

/// How long restoration waits for layers after a style swap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(50),
            max_attempts: 100,
        }
    }
}

/// 3D terrain settings chosen by the user
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TerrainState {
    pub enabled: bool,
    pub exaggeration: f64,
}

impl Default for TerrainState {
    fn default() -> Self {
        Self {
            enabled: true,
            exaggeration: DEFAULT_TERRAIN_EXAGGERATION,
        }
    }
}

impl TerrainState {
    /// Exaggeration limited to the supported range
    pub fn clamp_exaggeration(value: f64) -> f64 {
        if value.is_nan() {
            return DEFAULT_TERRAIN_EXAGGERATION;
        }
        value.clamp(MIN_TERRAIN_EXAGGERATION, MAX_TERRAIN_EXAGGERATION)
    }

    fn spec(&self) -> Option<TerrainSpec> {
        self.enabled.then(|| TerrainSpec {
            source: ids::DEM_SOURCE.to_string(),
            exaggeration: self.exaggeration,
        })
    }
}

/// Recorded state of one layer
#[derive(Debug, Clone, PartialEq)]
pub struct LayerRuntimeState {
    pub visibility: Visibility,
    /// Paint that replaces the registry defaults (selection highlight)
    pub paint_overrides: BTreeMap<&'static str, PaintValue>,
}

impl LayerRuntimeState {
    fn from_spec(spec: &LayerSpec) -> Self {
        Self {
            visibility: spec.default_visibility,
            paint_overrides: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerState {
    Absent,
    Present(Visibility),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SyncPhase {
    /// Layers are in place and mirror the recorded state
    Ready,
    /// A style was requested and has not finished loading
    AwaitingStyle { camera: Option<CameraState> },
    /// The style loaded but some required layers are still missing
    Restoring { camera: Option<CameraState> },
}

/// Whether a request reached the engine or was recorded for later
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    Deferred,
}

/// Single owner of the map's layer state
#[derive(Debug)]
pub struct LayerSynchronizer {
    registry: LayerRegistry,
    runtime: HashMap<&'static str, LayerRuntimeState>,
    selection: Option<String>,
    basemap: BasemapStyle,
    terrain: TerrainState,
    phase: SyncPhase,
    retry: RetryPolicy,
}

impl LayerSynchronizer {
    pub fn new(registry: LayerRegistry, basemap: BasemapStyle) -> Self {
        let runtime = registry
            .layers()
            .iter()
            .map(|spec| (spec.id, LayerRuntimeState::from_spec(spec)))
            .collect();

        Self {
            registry,
            runtime,
            selection: None,
            basemap,
            terrain: TerrainState::default(),
            phase: SyncPhase::AwaitingStyle { camera: None },
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_terrain(mut self, terrain: TerrainState) -> Self {
        self.terrain = TerrainState {
            enabled: terrain.enabled,
            exaggeration: TerrainState::clamp_exaggeration(terrain.exaggeration),
        };
        self
    }

    #[inline]
    pub fn registry(&self) -> &LayerRegistry {
        &self.registry
    }

    #[inline]
    pub fn basemap(&self) -> BasemapStyle {
        self.basemap
    }

    #[inline]
    pub fn terrain(&self) -> TerrainState {
        self.terrain
    }

    #[inline]
    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    #[inline]
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub fn selection(&self) -> Option<&str> {
        self.selection.as_deref()
    }

    pub fn runtime_state(&self, layer_id: &str) -> Option<&LayerRuntimeState> {
        self.runtime.get(layer_id)
    }

    /// Recorded visibility, which the engine converges to
    pub fn is_visible(&self, layer_id: &str) -> bool {
        self.recorded_visibility(layer_id).is_visible()
    }

    pub fn layer_state<E: RenderingEngine>(&self, engine: &E, layer_id: &str) -> LayerState {
        if engine.has_layer(layer_id) {
            LayerState::Present(self.recorded_visibility(layer_id))
        } else {
            LayerState::Absent
        }
    }

    /// Load the current basemap into a fresh engine
    pub fn start<E: RenderingEngine>(&mut self, engine: &mut E) -> Result<()> {
        tracing::info!(basemap = %self.basemap, "Loading base style");
        engine.set_style(self.basemap.style_url())?;
        self.phase = SyncPhase::AwaitingStyle { camera: None };
        Ok(())
    }

    /// Create every missing source and layer, then enforce the stacking order.
    ///
    /// Layers are created with the recorded visibility and paint, not the registry
    /// defaults. Existing layers are left alone apart from the contour color, which
    /// follows the basemap. Deferred while the style is loading.
    pub fn ensure<E: RenderingEngine>(&self, engine: &mut E) -> Result<ApplyOutcome> {
        #[cfg(feature = "profiling")]
        profiling::scope!("layers::ensure");

        if !engine.is_style_loaded() {
            tracing::debug!("Style still loading, deferring layer setup");
            return Ok(ApplyOutcome::Deferred);
        }

        for source in self.registry.sources() {
            if !engine.has_source(source.id) {
                engine.add_source(source)?;
            }
        }

        let mut created = 0;
        for spec in self.registry.layers() {
            if engine.has_layer(spec.id) {
                if spec.id == ids::CONTOURS {
                    engine.set_paint_property(ids::CONTOURS, "line-color", &self.contour_color())?;
                }
                continue;
            }
            engine.add_layer(&self.definition(spec))?;
            created += 1;
        }

        if created > 0 {
            tracing::debug!(created, "Created map layers");
        }

        self.reorder(engine)?;
        Ok(ApplyOutcome::Applied)
    }

    /// Put the ranked layers that exist into stacking order.
    ///
    /// Each one is moved directly above its nearest existing predecessor, so any
    /// subset keeps its relative order. Unranked layers are not moved.
    pub fn reorder<E: RenderingEngine>(&self, engine: &mut E) -> Result<()> {
        let existing: Vec<&'static str> = self
            .registry
            .stack_order()
            .into_iter()
            .filter(|id| engine.has_layer(id))
            .collect();

        for pair in existing.windows(2) {
            let (below, layer) = (pair[0], pair[1]);
            let order = engine.layer_order();
            let Some(position) = order.iter().position(|id| id == below) else {
                continue;
            };
            if order.get(position + 1).map(String::as_str) == Some(layer) {
                continue;
            }
            let above = order[position + 1..]
                .iter()
                .find(|id| id.as_str() != layer)
                .map(String::as_str);
            engine.move_layer(layer, above)?;
        }
        Ok(())
    }

    /// Show or hide a layer.
    ///
    /// The choice is recorded even when the layer does not exist yet and is applied
    /// as soon as it is created.
    pub fn toggle<E: RenderingEngine>(
        &mut self,
        engine: &mut E,
        layer_id: &str,
        visible: bool,
    ) -> Result<ApplyOutcome> {
        let id = self
            .registry
            .layer(layer_id)
            .map(|spec| spec.id)
            .ok_or_else(|| TrailMapError::UnknownLayer(layer_id.to_string()))?;
        let visibility = Visibility::from(visible);
        self.runtime_mut(id).visibility = visibility;

        if !engine.has_layer(id) {
            tracing::debug!(layer = id, %visibility, "Layer not created yet, toggle deferred");
            return Ok(ApplyOutcome::Deferred);
        }

        engine.set_visibility(id, visibility)?;
        self.reorder(engine)?;
        Ok(ApplyOutcome::Applied)
    }

    /// Highlight one trail feature, or clear the highlight with `None`.
    ///
    /// The border keeps its recorded visibility either way.
    pub fn select<E: RenderingEngine>(
        &mut self,
        engine: &mut E,
        feature_id: Option<&str>,
    ) -> Result<ApplyOutcome> {
        self.selection = feature_id.map(str::to_string);
        match feature_id {
            Some(id) => tracing::info!(feature = id, "Trail selected"),
            None => tracing::info!("Trail selection cleared"),
        }

        let paints = [
            (ids::TRAILS_BORDER, trail_border_paint(feature_id)),
            (ids::TRAILS_LINE, trail_line_paint(feature_id)),
        ];

        let mut outcome = ApplyOutcome::Applied;
        for (layer, paint) in paints {
            let overrides = &mut self.runtime_mut(layer).paint_overrides;
            overrides.clear();
            overrides.extend(paint.iter().cloned());

            if !engine.has_layer(layer) {
                tracing::debug!(layer, "Layer not created yet, highlight deferred");
                outcome = ApplyOutcome::Deferred;
                continue;
            }
            for (property, value) in &paint {
                engine.set_paint_property(layer, property, value)?;
            }
        }

        if engine.has_layer(ids::TRAILS_BORDER) {
            engine.set_visibility(ids::TRAILS_BORDER, self.recorded_visibility(ids::TRAILS_BORDER))?;
        }
        Ok(outcome)
    }

    /// Replace the base style, remembering the camera so the swap is seamless
    pub fn begin_style_swap<E: RenderingEngine>(
        &mut self,
        engine: &mut E,
        basemap: BasemapStyle,
    ) -> Result<()> {
        let camera = match self.phase {
            SyncPhase::Ready => Some(engine.camera()),
            // The engine camera was already reset by the pending swap
            SyncPhase::AwaitingStyle { camera } | SyncPhase::Restoring { camera } => camera,
        };

        tracing::info!(from = %self.basemap, to = %basemap, "Swapping base style");
        self.basemap = basemap;
        engine.set_style(basemap.style_url())?;
        self.phase = SyncPhase::AwaitingStyle { camera };
        Ok(())
    }

    /// Bring the engine back to the recorded state after a style load.
    ///
    /// Recreates the layers, restores the captured camera and terrain, then
    /// re-applies visibility and paint to every layer. Deferred while the style is
    /// loading or required layers are missing; safe to call again.
    pub fn on_style_loaded<E: RenderingEngine>(&mut self, engine: &mut E) -> Result<ApplyOutcome> {
        let camera = match self.phase {
            SyncPhase::Ready => return self.ensure(engine),
            SyncPhase::AwaitingStyle { camera } | SyncPhase::Restoring { camera } => camera,
        };

        if self.ensure(engine)? == ApplyOutcome::Deferred {
            return Ok(ApplyOutcome::Deferred);
        }

        let missing = self.missing_layers(engine);
        if !missing.is_empty() {
            tracing::debug!(?missing, "Waiting for layers before restoring state");
            self.phase = SyncPhase::Restoring { camera };
            return Ok(ApplyOutcome::Deferred);
        }

        match camera {
            Some(camera) => engine.set_camera(camera)?,
            None if self.terrain.enabled => engine.ease_to_pitch(TERRAIN_PITCH, PITCH_EASE)?,
            None => {}
        }
        engine.set_terrain(self.terrain.spec())?;
        self.apply_recorded_state(engine)?;
        self.reorder(engine)?;

        self.phase = SyncPhase::Ready;
        tracing::info!(basemap = %self.basemap, "Map layers restored");
        Ok(ApplyOutcome::Applied)
    }

    /// Retry [`on_style_loaded`](Self::on_style_loaded) until it applies.
    ///
    /// Polls at the policy interval; gives up with
    /// [`TrailMapError::LayersNotReady`] after `max_attempts`.
    pub async fn restore_with_retry<E: RenderingEngine>(&mut self, engine: &mut E) -> Result<()> {
        let RetryPolicy {
            interval,
            max_attempts,
        } = self.retry;

        for attempt in 1..=max_attempts {
            if self.on_style_loaded(engine)? == ApplyOutcome::Applied {
                if attempt > 1 {
                    tracing::debug!(attempt, "Layer state restored after retrying");
                }
                return Ok(());
            }
            if attempt < max_attempts {
                tokio::time::sleep(interval).await;
            }
        }

        let missing: Vec<String> = self
            .missing_layers(engine)
            .into_iter()
            .map(str::to_string)
            .collect();
        tracing::warn!(?missing, attempts = max_attempts, "Gave up waiting for map layers");
        Err(TrailMapError::LayersNotReady {
            missing,
            attempts: max_attempts,
        })
    }

    /// Switch 3D terrain on or off, easing the pitch to match.
    ///
    /// During a style swap the pitch is written to the captured camera.
    pub fn set_terrain_enabled<E: RenderingEngine>(
        &mut self,
        engine: &mut E,
        enabled: bool,
    ) -> Result<ApplyOutcome> {
        self.terrain.enabled = enabled;
        let pitch = if enabled { TERRAIN_PITCH } else { FLAT_PITCH };
        if !self.is_live(engine) {
            // The pending swap restores this camera instead of the current one
            if let SyncPhase::AwaitingStyle { camera: Some(camera) }
            | SyncPhase::Restoring { camera: Some(camera) } = &mut self.phase
            {
                camera.pitch = pitch;
            }
            return Ok(ApplyOutcome::Deferred);
        }

        engine.set_terrain(self.terrain.spec())?;
        engine.ease_to_pitch(pitch, PITCH_EASE)?;
        Ok(ApplyOutcome::Applied)
    }

    /// Change the terrain exaggeration, clamped to the supported range
    pub fn set_terrain_exaggeration<E: RenderingEngine>(
        &mut self,
        engine: &mut E,
        exaggeration: f64,
    ) -> Result<ApplyOutcome> {
        self.terrain.exaggeration = TerrainState::clamp_exaggeration(exaggeration);
        if !self.terrain.enabled || !self.is_live(engine) {
            return Ok(ApplyOutcome::Deferred);
        }

        engine.set_terrain(self.terrain.spec())?;
        Ok(ApplyOutcome::Applied)
    }

    fn is_live<E: RenderingEngine>(&self, engine: &E) -> bool {
        self.phase == SyncPhase::Ready && engine.is_style_loaded()
    }

    fn missing_layers<E: RenderingEngine>(&self, engine: &E) -> Vec<&'static str> {
        self.registry
            .required_layers()
            .into_iter()
            .filter(|id| !engine.has_layer(id))
            .collect()
    }

    fn apply_recorded_state<E: RenderingEngine>(&self, engine: &mut E) -> Result<()> {
        for spec in self.registry.layers() {
            if !engine.has_layer(spec.id) {
                continue;
            }
            engine.set_visibility(spec.id, self.recorded_visibility(spec.id))?;
            for (property, value) in self.paint_for(spec) {
                engine.set_paint_property(spec.id, property, &value)?;
            }
        }
        Ok(())
    }

    fn definition(&self, spec: &LayerSpec) -> LayerDefinition {
        LayerDefinition {
            id: spec.id.to_string(),
            source_id: spec.source_id.to_string(),
            source_layer: spec.source_layer.map(str::to_string),
            kind: spec.kind,
            visibility: self.recorded_visibility(spec.id),
            paint: self
                .paint_for(spec)
                .into_iter()
                .map(|(property, value)| (property.to_string(), value))
                .collect(),
            layout: spec
                .layout
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    /// Registry defaults for the current basemap with recorded overrides on top
    fn paint_for(&self, spec: &LayerSpec) -> Vec<(&'static str, PaintValue)> {
        let mut paint = spec.default_paint(self.basemap);
        if let Some(state) = self.runtime.get(spec.id) {
            for (property, value) in &state.paint_overrides {
                match paint.iter_mut().find(|(p, _)| p == property) {
                    Some(slot) => slot.1 = value.clone(),
                    None => paint.push((*property, value.clone())),
                }
            }
        }
        paint
    }

    fn contour_color(&self) -> PaintValue {
        PaintValue::color(self.basemap.contour_color())
    }

    fn recorded_visibility(&self, layer_id: &str) -> Visibility {
        self.runtime
            .get(layer_id)
            .map_or(Visibility::Hidden, |state| state.visibility)
    }

    fn runtime_mut(&mut self, layer_id: &'static str) -> &mut LayerRuntimeState {
        self.runtime.entry(layer_id).or_insert_with(|| LayerRuntimeState {
            visibility: Visibility::Visible,
            paint_overrides: BTreeMap::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::paint::{TRAIL_BORDER_COLOR, TRAIL_HIGHLIGHT_COLOR};
    use crate::layers::{InMemoryEngine, RenderedFeature, ScreenPoint};
    use crate::utils::Coordinate;
    use serde_json::{Map, json};

    const STACK: [&str; 6] = [
        ids::TERRAIN_RASTER,
        ids::SNOW_PROBABILITY,
        ids::CLIFF_AREAS,
        ids::CONTOURS,
        ids::TRAILS_BORDER,
        ids::TRAILS_LINE,
    ];

    fn ranked_order(engine: &InMemoryEngine) -> Vec<String> {
        engine
            .layer_order()
            .into_iter()
            .filter(|id| STACK.contains(&id.as_str()))
            .collect()
    }

    fn loaded_map() -> (LayerSynchronizer, InMemoryEngine) {
        let mut sync = LayerSynchronizer::new(LayerRegistry::default(), BasemapStyle::Dark);
        let mut engine = InMemoryEngine::new();
        sync.start(&mut engine).unwrap();
        engine.finish_style_load();
        assert_eq!(sync.on_style_loaded(&mut engine).unwrap(), ApplyOutcome::Applied);
        (sync, engine)
    }

    fn feature_props(id: &str) -> Map<String, serde_json::Value> {
        let mut properties = Map::new();
        properties.insert("id".to_string(), json!(id));
        properties
    }

    #[test]
    fn test_initial_load_creates_stack_and_terrain() {
        let (sync, engine) = loaded_map();

        assert_eq!(ranked_order(&engine), STACK);
        assert!(engine.has_layer(ids::HILLSHADE));
        assert_eq!(engine.visibility(ids::TERRAIN_DEM), Some(Visibility::Hidden));
        assert_eq!(engine.visibility(ids::CONTOURS), Some(Visibility::Visible));
        assert_eq!(
            engine.terrain(),
            Some(&TerrainSpec {
                source: ids::DEM_SOURCE.to_string(),
                exaggeration: 1.2
            })
        );
        assert_eq!(engine.camera().pitch, 60.0);
        assert_eq!(sync.phase(), SyncPhase::Ready);
    }

    #[test]
    fn test_ensure_is_idempotent() {
        let (sync, mut engine) = loaded_map();
        let before = engine.layer_order();
        assert_eq!(sync.ensure(&mut engine).unwrap(), ApplyOutcome::Applied);
        assert_eq!(sync.ensure(&mut engine).unwrap(), ApplyOutcome::Applied);
        assert_eq!(engine.layer_order(), before);
    }

    #[test]
    fn test_ensure_defers_until_style_loaded() {
        let sync = LayerSynchronizer::new(LayerRegistry::default(), BasemapStyle::Dark);
        let mut engine = InMemoryEngine::new();
        engine.set_style(BasemapStyle::Dark.style_url()).unwrap();
        assert_eq!(sync.ensure(&mut engine).unwrap(), ApplyOutcome::Deferred);
        assert!(engine.layer_order().is_empty());
    }

    #[test]
    fn test_reorder_fixes_scrambled_stack() {
        let (sync, mut engine) = loaded_map();
        engine.move_layer(ids::TERRAIN_RASTER, None).unwrap();
        engine.move_layer(ids::CONTOURS, Some(ids::SNOW_PROBABILITY)).unwrap();
        engine.move_layer(ids::TRAILS_LINE, Some(ids::TRAILS_BORDER)).unwrap();
        assert_ne!(ranked_order(&engine), STACK);

        sync.reorder(&mut engine).unwrap();
        assert_eq!(ranked_order(&engine), STACK);
    }

    #[test]
    fn test_reorder_keeps_relative_order_of_subset() {
        let sync = LayerSynchronizer::new(LayerRegistry::default(), BasemapStyle::Dark);
        let registry = LayerRegistry::default();
        let mut engine = InMemoryEngine::new();
        engine.set_style(BasemapStyle::Dark.style_url()).unwrap();
        engine.finish_style_load();
        for source in registry.sources() {
            engine.add_source(source).unwrap();
        }
        // Only three ranked layers exist, added top-down
        for id in [ids::TRAILS_LINE, ids::HILLSHADE, ids::CONTOURS, ids::SNOW_PROBABILITY] {
            let spec = registry.layer(id).unwrap();
            engine.add_layer(&sync.definition(spec)).unwrap();
        }

        sync.reorder(&mut engine).unwrap();
        assert_eq!(
            ranked_order(&engine),
            vec![ids::SNOW_PROBABILITY, ids::CONTOURS, ids::TRAILS_LINE]
        );
        assert!(engine.has_layer(ids::HILLSHADE));
    }

    #[test]
    fn test_toggle_before_layer_exists_is_applied_on_creation() {
        let mut sync = LayerSynchronizer::new(LayerRegistry::default(), BasemapStyle::Dark);
        let mut engine = InMemoryEngine::new();
        sync.start(&mut engine).unwrap();

        assert_eq!(
            sync.toggle(&mut engine, ids::TRAILS_LINE, false).unwrap(),
            ApplyOutcome::Deferred
        );
        assert!(!sync.is_visible(ids::TRAILS_LINE));

        engine.finish_style_load();
        sync.on_style_loaded(&mut engine).unwrap();
        assert_eq!(engine.visibility(ids::TRAILS_LINE), Some(Visibility::Hidden));
        assert_eq!(engine.definition(ids::TRAILS_LINE).unwrap().visibility, Visibility::Hidden);
        assert_eq!(
            sync.layer_state(&engine, ids::TRAILS_LINE),
            LayerState::Present(Visibility::Hidden)
        );
    }

    #[test]
    fn test_toggle_unknown_layer() {
        let (mut sync, mut engine) = loaded_map();
        assert!(matches!(
            sync.toggle(&mut engine, "hiking-huts", true),
            Err(TrailMapError::UnknownLayer(_))
        ));
    }

    #[test]
    fn test_toggle_keeps_stack_order() {
        let (mut sync, mut engine) = loaded_map();
        assert_eq!(
            sync.toggle(&mut engine, ids::CLIFF_AREAS, false).unwrap(),
            ApplyOutcome::Applied
        );
        assert_eq!(engine.visibility(ids::CLIFF_AREAS), Some(Visibility::Hidden));
        assert_eq!(ranked_order(&engine), STACK);
    }

    #[test]
    fn test_select_then_deselect() {
        let (mut sync, mut engine) = loaded_map();

        sync.select(&mut engine, Some("7")).unwrap();
        assert_eq!(sync.selection(), Some("7"));
        let line_color = engine.paint(ids::TRAILS_LINE, "line-color").unwrap();
        assert_eq!(line_color.resolve_for(&feature_props("7")), PaintValue::color(TRAIL_HIGHLIGHT_COLOR));
        assert_eq!(line_color.resolve_for(&feature_props("8")), PaintValue::color("black"));
        let border_width = engine.paint(ids::TRAILS_BORDER, "line-width").unwrap();
        assert_eq!(border_width.resolve_for(&feature_props("7")), PaintValue::Number(8.0));

        sync.select(&mut engine, None).unwrap();
        assert_eq!(sync.selection(), None);
        assert_eq!(engine.paint(ids::TRAILS_LINE, "line-color"), Some(&PaintValue::color("black")));
        assert_eq!(engine.paint(ids::TRAILS_LINE, "line-width"), Some(&PaintValue::Number(4.0)));
        assert_eq!(
            engine.paint(ids::TRAILS_BORDER, "line-color"),
            Some(&PaintValue::color(TRAIL_BORDER_COLOR))
        );
        assert_eq!(engine.paint(ids::TRAILS_BORDER, "line-width"), Some(&PaintValue::Number(10.0)));
        assert_eq!(engine.visibility(ids::TRAILS_BORDER), Some(Visibility::Visible));
    }

    #[test]
    fn test_basemap_swap_restores_camera_contours_and_selection() {
        let (mut sync, mut engine) = loaded_map();
        let camera = CameraState {
            center: Coordinate::new(-72.79, 44.55),
            zoom: 14.25,
            pitch: 45.0,
            bearing: 30.0,
        };
        engine.set_camera(camera).unwrap();
        sync.toggle(&mut engine, ids::CONTOURS, true).unwrap();
        sync.toggle(&mut engine, ids::SNOW_PROBABILITY, false).unwrap();
        sync.select(&mut engine, Some("7")).unwrap();

        sync.begin_style_swap(&mut engine, BasemapStyle::Outdoors).unwrap();
        assert!(!engine.has_layer(ids::CONTOURS));
        assert_eq!(sync.on_style_loaded(&mut engine).unwrap(), ApplyOutcome::Deferred);

        engine.finish_style_load();
        assert_eq!(sync.on_style_loaded(&mut engine).unwrap(), ApplyOutcome::Applied);

        assert_eq!(engine.style_url(), Some(BasemapStyle::Outdoors.style_url()));
        assert_eq!(engine.camera(), camera);
        assert_eq!(engine.visibility(ids::CONTOURS), Some(Visibility::Visible));
        assert_eq!(engine.paint(ids::CONTOURS, "line-color"), Some(&PaintValue::color("#000")));
        assert_eq!(engine.visibility(ids::SNOW_PROBABILITY), Some(Visibility::Hidden));
        assert_eq!(
            engine
                .paint(ids::TRAILS_LINE, "line-color")
                .map(|paint| paint.resolve_for(&feature_props("7"))),
            Some(PaintValue::color(TRAIL_HIGHLIGHT_COLOR))
        );
        assert!(engine.terrain().is_some());
        assert_eq!(ranked_order(&engine), STACK);
    }

    #[test]
    fn test_double_swap_keeps_first_camera() {
        let (mut sync, mut engine) = loaded_map();
        let camera = CameraState {
            zoom: 16.0,
            ..CameraState::default()
        };
        engine.set_camera(camera).unwrap();

        sync.begin_style_swap(&mut engine, BasemapStyle::Satellite).unwrap();
        sync.begin_style_swap(&mut engine, BasemapStyle::Outdoors).unwrap();
        engine.finish_style_load();
        sync.on_style_loaded(&mut engine).unwrap();

        assert_eq!(engine.camera(), camera);
        assert_eq!(sync.basemap(), BasemapStyle::Outdoors);
    }

    #[test]
    fn test_selected_trail_hit_after_hidden_border_stays_hidden() {
        let (mut sync, mut engine) = loaded_map();
        sync.toggle(&mut engine, ids::TRAILS_BORDER, false).unwrap();
        engine.place_feature(
            ids::TRAILS_SOURCE,
            ScreenPoint::new(10.0, 10.0),
            RenderedFeature {
                layer_id: String::new(),
                properties: feature_props("7"),
                path: Vec::new(),
            },
        );

        sync.select(&mut engine, Some("7")).unwrap();
        assert_eq!(engine.visibility(ids::TRAILS_BORDER), Some(Visibility::Hidden));
        let hits = engine.query_rendered_features(ScreenPoint::new(10.0, 10.0), &ids::CLICKABLE_TRAILS);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].layer_id, ids::TRAILS_LINE);
    }

    #[test]
    fn test_terrain_controls() {
        let (mut sync, mut engine) = loaded_map();

        sync.set_terrain_exaggeration(&mut engine, 5.0).unwrap();
        assert_eq!(sync.terrain().exaggeration, MAX_TERRAIN_EXAGGERATION);
        assert_eq!(engine.terrain().map(|t| t.exaggeration), Some(2.0));

        sync.set_terrain_enabled(&mut engine, false).unwrap();
        assert!(engine.terrain().is_none());
        assert_eq!(engine.camera().pitch, 0.0);

        // Recorded while disabled, applied when switched back on
        assert_eq!(
            sync.set_terrain_exaggeration(&mut engine, 0.2).unwrap(),
            ApplyOutcome::Deferred
        );
        sync.set_terrain_enabled(&mut engine, true).unwrap();
        assert_eq!(engine.terrain().map(|t| t.exaggeration), Some(1.0));
        assert_eq!(engine.camera().pitch, 60.0);
    }

    #[test]
    fn test_disabled_terrain_survives_swap() {
        let (mut sync, mut engine) = loaded_map();
        sync.set_terrain_enabled(&mut engine, false).unwrap();
        sync.begin_style_swap(&mut engine, BasemapStyle::Satellite).unwrap();
        engine.finish_style_load();
        sync.on_style_loaded(&mut engine).unwrap();
        assert!(engine.terrain().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_waits_for_slow_style() {
        let mut sync = LayerSynchronizer::new(LayerRegistry::default(), BasemapStyle::Dark);
        let mut engine = InMemoryEngine::new().with_style_load_delay(Duration::from_millis(180));
        sync.start(&mut engine).unwrap();
        sync.toggle(&mut engine, ids::CONTOURS, false).unwrap();

        sync.restore_with_retry(&mut engine).await.unwrap();
        assert_eq!(sync.phase(), SyncPhase::Ready);
        assert_eq!(engine.visibility(ids::CONTOURS), Some(Visibility::Hidden));
        assert_eq!(ranked_order(&engine), STACK);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_gives_up_after_max_attempts() {
        let mut sync = LayerSynchronizer::new(LayerRegistry::default(), BasemapStyle::Dark)
            .with_retry_policy(RetryPolicy {
                interval: Duration::from_millis(50),
                max_attempts: 3,
            });
        let mut engine = InMemoryEngine::new();
        sync.start(&mut engine).unwrap();

        match sync.restore_with_retry(&mut engine).await {
            Err(TrailMapError::LayersNotReady { missing, attempts }) => {
                assert_eq!(attempts, 3);
                assert_eq!(missing, STACK.map(str::to_string).to_vec());
            }
            other => panic!("expected LayersNotReady, got {other:?}"),
        }

        // Restoration can be run again once the style is there
        engine.finish_style_load();
        sync.restore_with_retry(&mut engine).await.unwrap();
        assert_eq!(sync.phase(), SyncPhase::Ready);
    }

    #[test]
    fn test_terrain_disabled_during_swap_restores_flat() {
        let (mut sync, mut engine) = loaded_map();
        let camera = CameraState {
            zoom: 14.5,
            ..engine.camera()
        };
        engine.set_camera(camera).unwrap();
        assert_eq!(camera.pitch, 60.0);

        sync.begin_style_swap(&mut engine, BasemapStyle::Outdoors).unwrap();
        assert_eq!(
            sync.set_terrain_enabled(&mut engine, false).unwrap(),
            ApplyOutcome::Deferred
        );
        engine.finish_style_load();
        assert_eq!(sync.on_style_loaded(&mut engine).unwrap(), ApplyOutcome::Applied);

        assert!(engine.terrain().is_none());
        assert_eq!(engine.camera(), CameraState { pitch: 0.0, ..camera });
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_waits_for_lagging_layers() {
        let mut sync = LayerSynchronizer::new(LayerRegistry::default(), BasemapStyle::Dark);
        let mut engine = InMemoryEngine::new().with_layer_creation_delay(Duration::from_millis(120));
        sync.start(&mut engine).unwrap();
        engine.finish_style_load();
        sync.restore_with_retry(&mut engine).await.unwrap();
        assert_eq!(ranked_order(&engine), STACK);

        let camera = CameraState {
            center: Coordinate::new(-72.81, 44.54),
            zoom: 15.0,
            pitch: 60.0,
            bearing: -20.0,
        };
        engine.set_camera(camera).unwrap();
        sync.toggle(&mut engine, ids::CONTOURS, false).unwrap();
        sync.select(&mut engine, Some("7")).unwrap();

        sync.begin_style_swap(&mut engine, BasemapStyle::Satellite).unwrap();
        engine.finish_style_load();

        // Style is there, layers were requested but have not shown up
        assert_eq!(sync.on_style_loaded(&mut engine).unwrap(), ApplyOutcome::Deferred);
        assert!(matches!(sync.phase(), SyncPhase::Restoring { camera: Some(_) }));
        assert_eq!(engine.visibility(ids::CONTOURS), None);
        assert_eq!(engine.paint(ids::TRAILS_LINE, "line-color"), None);
        assert!(engine.terrain().is_none());
        assert_eq!(engine.camera(), CameraState::default());

        sync.restore_with_retry(&mut engine).await.unwrap();
        assert_eq!(sync.phase(), SyncPhase::Ready);
        assert_eq!(engine.camera(), camera);
        assert!(engine.terrain().is_some());
        assert_eq!(engine.visibility(ids::CONTOURS), Some(Visibility::Hidden));
        assert_eq!(
            engine
                .paint(ids::TRAILS_LINE, "line-color")
                .map(|paint| paint.resolve_for(&feature_props("7"))),
            Some(PaintValue::color(TRAIL_HIGHLIGHT_COLOR))
        );
        assert_eq!(ranked_order(&engine), STACK);
    }
}
