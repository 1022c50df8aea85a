pub mod presentation;
pub mod settings;
pub mod state;
pub mod storage;

pub use presentation::{JsonPresentation, Presentation, TrailDetails};
pub use settings::{Command, Settings};
pub use state::{MapToggle, UiState};
pub use storage::{FileStorage, StorageBackend, StorageError};

use std::sync::Arc;
use trailmap_lib::layers::{
    ApplyOutcome, LayerSynchronizer, MapEvent, RenderedFeature, RetryPolicy, ScreenPoint, ids,
};
use trailmap_lib::{
    BasemapStyle, Coordinate, DEFAULT_TRAIL_DESCRIPTION, ElevationSource, EpochTicket,
    LayerRegistry, ProfileBuilder, ProfileStats, RenderingEngine, Result, SelectionEpochs,
    TrailMapError, UNKNOWN_TRAIL_NAME,
};

/// Interactive trail map controller
///
/// Owns the rendering engine, the layer synchronizer and the user's control
/// state. Clicks select trails and hand back a [`ProfileJob`]; the host runs it
/// wherever it likes and passes the outcome to [`deliver`](Self::deliver), which
/// only shows it if the selection is still current.
pub struct TrailMapApp<S, E, P> {
    engine: E,
    sync: LayerSynchronizer,
    builder: Arc<ProfileBuilder<S>>,
    epochs: SelectionEpochs,
    state: UiState,
    storage: Option<Box<dyn StorageBackend>>,
    presentation: P,
    panel: Option<TrailDetails>,
}

/// Profile computation for one selection, detached from the controller
pub struct ProfileJob<S> {
    builder: Arc<ProfileBuilder<S>>,
    ticket: EpochTicket,
    feature_id: String,
    name: String,
    description: String,
    path: Vec<Coordinate>,
}

/// A finished profile, still tagged with the selection it belongs to
#[derive(Debug, Clone)]
pub struct CompletedProfile {
    ticket: EpochTicket,
    details: TrailDetails,
}

impl CompletedProfile {
    pub fn details(&self) -> &TrailDetails {
        &self.details
    }
}

impl<S: ElevationSource> ProfileJob<S> {
    pub fn feature_id(&self) -> &str {
        &self.feature_id
    }

    pub fn ticket(&self) -> &EpochTicket {
        &self.ticket
    }

    /// Build the profile and its statistics.
    ///
    /// Fails with [`TrailMapError::Superseded`] when another selection started
    /// before the profile was complete.
    pub async fn run(self) -> Result<CompletedProfile> {
        let profile = self.builder.build_for(&self.path, &self.ticket).await?;
        let stats = ProfileStats::from_profile(&profile);
        tracing::debug!(
            feature = %self.feature_id,
            samples = profile.len(),
            distance_km = stats.total_distance_km,
            "Profile complete"
        );

        Ok(CompletedProfile {
            ticket: self.ticket,
            details: TrailDetails {
                feature_id: self.feature_id,
                name: self.name,
                description: self.description,
                stats,
                profile,
            },
        })
    }
}

impl<S, E, P> TrailMapApp<S, E, P>
where
    S: ElevationSource,
    E: RenderingEngine,
    P: Presentation,
{
    pub fn new(engine: E, builder: ProfileBuilder<S>, state: UiState, presentation: P) -> Self {
        let sync = LayerSynchronizer::new(LayerRegistry::default(), state.basemap)
            .with_terrain(state.terrain);

        Self {
            engine,
            sync,
            builder: Arc::new(builder),
            epochs: SelectionEpochs::new(),
            state,
            storage: None,
            presentation,
            panel: None,
        }
    }

    /// Use a custom layer registry (e.g. a different trails tileset)
    pub fn with_registry(mut self, registry: LayerRegistry) -> Self {
        self.sync = LayerSynchronizer::new(registry, self.state.basemap)
            .with_terrain(self.state.terrain)
            .with_retry_policy(self.sync.retry_policy());
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.sync = self.sync.with_retry_policy(retry);
        self
    }

    /// Persist control changes to `storage`
    pub fn with_storage(mut self, storage: Box<dyn StorageBackend>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn synchronizer(&self) -> &LayerSynchronizer {
        &self.sync
    }

    pub fn state(&self) -> &UiState {
        &self.state
    }

    pub fn presentation(&self) -> &P {
        &self.presentation
    }

    /// Details of the trail currently shown, if any
    pub fn panel(&self) -> Option<&TrailDetails> {
        self.panel.as_ref()
    }

    pub fn selection(&self) -> Option<&str> {
        self.sync.selection()
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Record the user's toggles and start loading the base style
    pub fn load(&mut self) -> Result<()> {
        for toggle in MapToggle::ALL {
            self.apply_toggle(toggle, self.state.is_on(toggle))?;
        }
        self.sync.start(&mut self.engine)
    }

    /// Forward an engine notification
    pub fn handle_event(&mut self, event: MapEvent) -> Result<ApplyOutcome> {
        tracing::trace!(?event, "Map event");
        match event {
            MapEvent::StyleLoaded | MapEvent::Idle => self.sync.on_style_loaded(&mut self.engine),
        }
    }

    /// Wait for the current style and restore every layer
    pub async fn restore(&mut self) -> Result<()> {
        self.sync.restore_with_retry(&mut self.engine).await
    }

    // ========================================================================
    // Selection
    // ========================================================================

    /// Select the trail under `point`, or clear the selection on empty map.
    ///
    /// Returns the profile job for the new selection.
    pub fn click(&mut self, point: ScreenPoint) -> Result<Option<ProfileJob<S>>> {
        let hit = self
            .engine
            .query_rendered_features(point, &ids::CLICKABLE_TRAILS)
            .into_iter()
            .find(|feature| feature.feature_id().is_some());

        match hit {
            Some(feature) => self.select(&feature),
            None => {
                self.deselect()?;
                Ok(None)
            }
        }
    }

    /// Highlight `feature` and prepare its profile; `None` if it has no id
    pub fn select(&mut self, feature: &RenderedFeature) -> Result<Option<ProfileJob<S>>> {
        let Some(feature_id) = feature.feature_id() else {
            tracing::warn!(layer = %feature.layer_id, "Trail feature without id, ignoring");
            return Ok(None);
        };

        let ticket = self.epochs.begin();
        self.sync.select(&mut self.engine, Some(&feature_id))?;

        if feature.path.is_empty() {
            tracing::warn!(feature = %feature_id, "Selected trail has no line geometry");
        }

        Ok(Some(ProfileJob {
            builder: Arc::clone(&self.builder),
            ticket,
            name: feature
                .string_property("title")
                .unwrap_or(UNKNOWN_TRAIL_NAME)
                .to_string(),
            description: feature
                .string_property("description")
                .unwrap_or(DEFAULT_TRAIL_DESCRIPTION)
                .to_string(),
            feature_id,
            path: feature.path.clone(),
        }))
    }

    /// Show a finished profile if its selection is still current.
    ///
    /// Returns whether anything was shown.
    pub fn deliver(&mut self, completed: Result<CompletedProfile>) -> bool {
        match completed {
            Ok(done) if done.ticket.is_current() => {
                self.presentation.show_trail(&done.details);
                self.panel = Some(done.details);
                true
            }
            Ok(done) => {
                tracing::debug!(feature = %done.details.feature_id, "Discarding stale profile");
                false
            }
            Err(TrailMapError::Superseded) => {
                tracing::debug!("Profile superseded by a newer selection");
                false
            }
            Err(e) => {
                tracing::warn!("Failed to build elevation profile: {}", e);
                false
            }
        }
    }

    /// Clear the highlight and close the trail panel
    pub fn deselect(&mut self) -> Result<()> {
        self.epochs.invalidate();
        self.sync.select(&mut self.engine, None)?;
        self.clear_panel()
    }

    /// Close the trail panel; the highlight stays on the map
    pub fn close_panel(&mut self) -> Result<()> {
        self.epochs.invalidate();
        self.clear_panel()
    }

    fn clear_panel(&mut self) -> Result<()> {
        self.panel = None;
        self.presentation.clear_trail();
        self.engine.set_hover_marker(None)
    }

    /// Move the map marker to a point hovered on the chart
    pub fn hover(&mut self, position: Option<Coordinate>) -> Result<()> {
        self.engine.set_hover_marker(position)
    }

    /// Move the marker to the shown sample nearest to `distance_km`
    pub fn hover_distance(&mut self, distance_km: Option<f64>) -> Result<()> {
        let position = distance_km
            .and_then(|distance| self.panel.as_ref()?.profile.nearest_to_distance(distance))
            .map(|sample| sample.coordinates);
        self.hover(position)
    }

    // ========================================================================
    // Map controls
    // ========================================================================

    pub fn set_toggle(&mut self, toggle: MapToggle, on: bool) -> Result<()> {
        tracing::info!(%toggle, on, "Layer toggle");
        self.state.set(toggle, on);
        self.apply_toggle(toggle, on)?;
        self.persist();
        Ok(())
    }

    pub fn set_terrain_enabled(&mut self, enabled: bool) -> Result<ApplyOutcome> {
        let outcome = self.sync.set_terrain_enabled(&mut self.engine, enabled)?;
        self.state.terrain = self.sync.terrain();
        self.persist();
        Ok(outcome)
    }

    pub fn set_terrain_exaggeration(&mut self, exaggeration: f64) -> Result<ApplyOutcome> {
        let outcome = self.sync.set_terrain_exaggeration(&mut self.engine, exaggeration)?;
        self.state.terrain = self.sync.terrain();
        self.persist();
        Ok(outcome)
    }

    /// Swap the base style; layers come back on the next style load
    pub fn change_basemap(&mut self, basemap: BasemapStyle) -> Result<()> {
        self.sync.begin_style_swap(&mut self.engine, basemap)?;
        self.state.basemap = basemap;
        self.persist();
        Ok(())
    }

    fn apply_toggle(&mut self, toggle: MapToggle, on: bool) -> Result<()> {
        for layer in toggle.suppressed_layers() {
            self.sync.toggle(&mut self.engine, layer, false)?;
        }
        for layer in toggle.layers() {
            self.sync.toggle(&mut self.engine, layer, on)?;
        }
        Ok(())
    }

    fn persist(&self) {
        if let Some(storage) = &self.storage
            && let Err(e) = self.state.save(storage.as_ref())
        {
            tracing::warn!("Failed to persist UI state: {}", e);
        }
    }
}
