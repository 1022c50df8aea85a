//! Map layer management
//!
//! The map owns a fixed set of sources and layers declared in the
//! [`LayerRegistry`]. They live inside a rendering engine whose base style can be
//! replaced at any time, which wipes every layer this crate added. The
//! [`LayerSynchronizer`] is the single writer of layer state: it records what the
//! user asked for (visibility, selection highlight, terrain) and re-applies it
//! whenever the engine loses it.

mod basemap;
mod engine;
mod memory;
mod paint;
mod registry;
mod synchronizer;

pub use basemap::BasemapStyle;
pub use engine::{
    CameraState, DEFAULT_CENTER, MapEvent, RenderedFeature, RenderingEngine, ScreenPoint,
    TerrainSpec,
};
pub use memory::InMemoryEngine;
pub use paint::{PaintValue, trail_border_paint, trail_line_paint};
pub use registry::{
    DEFAULT_TRAILS_DATA_URL, LayerDefinition, LayerKind, LayerRegistry, LayerSpec, SourceKind,
    SourceSpec,
};
pub use synchronizer::{
    ApplyOutcome, LayerRuntimeState, LayerState, LayerSynchronizer, RetryPolicy, SyncPhase,
    TerrainState,
};

use serde::{Deserialize, Serialize};

/// Identifiers of the sources and layers in the registry
pub mod ids {
    pub const DEM_SOURCE: &str = "mapbox-dem";
    pub const TRAILS_SOURCE: &str = "backCountry";
    pub const CONTOURS_SOURCE: &str = "contours";
    pub const CLIFF_AREAS_SOURCE: &str = "cliff-areas-raster";
    pub const SNOW_PROBABILITY_SOURCE: &str = "snow-probability-raster";
    pub const TERRAIN_RASTER_SOURCE: &str = "terrain-raster";

    pub const HILLSHADE: &str = "hillshade";
    pub const TERRAIN_DEM: &str = "terrain-dem";
    pub const TERRAIN_RASTER: &str = "terrain-raster-layer";
    pub const SNOW_PROBABILITY: &str = "snow-probability-layer";
    pub const CLIFF_AREAS: &str = "cliff-areas-layer";
    pub const CONTOURS: &str = "contours";
    pub const TRAILS_BORDER: &str = "trails-line-border";
    pub const TRAILS_LINE: &str = "trails-line";

    /// Layers a click is hit-tested against
    pub const CLICKABLE_TRAILS: [&str; 2] = [TRAILS_LINE, TRAILS_BORDER];
}

/// Layout visibility of a layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Visibility {
    #[serde(rename = "visible")]
    Visible,
    #[serde(rename = "none")]
    Hidden,
}

impl Visibility {
    #[inline]
    pub fn is_visible(self) -> bool {
        self == Self::Visible
    }

    /// Value of the `visibility` layout property
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Visible => "visible",
            Self::Hidden => "none",
        }
    }
}

impl From<bool> for Visibility {
    fn from(visible: bool) -> Self {
        if visible { Self::Visible } else { Self::Hidden }
    }
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
