//! Trailmap Library - Elevation Profiles and Map Layer Synchronization
//!
//! This library holds the non-trivial parts of an interactive trail map: turning a
//! sparse trail polyline into a dense elevation profile, and keeping a fixed stack
//! of map layers ordered, visible and highlighted across basemap style swaps.
//!
//! # Architecture
//!
//! - **[`utils`]**: Great-circle math and the [`Coordinate`] value type
//! - **[`resample`]**: Densification of a polyline to a maximum segment length
//! - **[`elevation`]**: Robust per-point elevation lookup over an [`ElevationSource`]
//! - **[`ProfileBuilder`]**: Resample, fan out elevation requests, accumulate distance, dedup
//! - **[`TrailDataset`]**: Trail features loaded from GeoJSON (or a single GPX track)
//! - **[`layers`]**: Layer registry, rendering engine seam and the [`LayerSynchronizer`]
//!
//! # Failure model
//!
//! Nothing here is fatal to the map. Elevation lookups degrade to "no data" for the
//! affected sample, operations on layers that do not exist yet are deferred, and
//! malformed geometry yields an empty profile.

mod dataset;
pub mod elevation;
pub mod layers;
mod profile;
pub mod resample;
mod stats;
pub mod utils;

// Public API exports
pub use dataset::{
    DEFAULT_TRAIL_DESCRIPTION, TrailDataset, TrailFeature, UNKNOWN_TRAIL_NAME, path_from_gpx,
    read_gpx_path,
};
pub use elevation::{ElevationReading, ElevationSampler, ElevationSource, NoDataReason, SamplerConfig};
pub use layers::{BasemapStyle, LayerRegistry, LayerSynchronizer, RenderingEngine};
pub use profile::{
    ElevationProfile, ElevationSample, EpochTicket, ProfileBuilder, ProfileConfig, SelectionEpochs,
};
pub use stats::ProfileStats;
pub use utils::Coordinate;

/// Error types for the trail map core
#[derive(Debug, thiserror::Error)]
pub enum TrailMapError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Elevation service responded with status {0}")]
    HttpStatus(u16),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("GPX parsing error: {0}")]
    GpxParse(#[from] gpx::errors::GpxError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Rendering engine error: {0}")]
    Engine(String),

    #[error("Unknown layer: {0}")]
    UnknownLayer(String),

    #[error("Layers not ready after {attempts} attempts: {missing:?}")]
    LayersNotReady { missing: Vec<String>, attempts: u32 },

    #[error("Selection was superseded before the profile completed")]
    Superseded,

    #[error("Empty path")]
    EmptyPath,
}

impl TrailMapError {
    /// Whether the condition clears up on its own (retrying later may succeed)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::HttpStatus(_) | Self::LayersNotReady { .. } | Self::Superseded
        )
    }
}

pub type Result<T> = std::result::Result<T, TrailMapError>;
