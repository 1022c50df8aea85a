//! Trailmap - Application Library
//!
//! Wires the trail map core into an application: command-line settings, logging,
//! persisted layer toggles, and the [`TrailMapApp`] controller that turns clicks
//! into highlighted trails and elevation profiles.

pub mod app;
mod logging;
mod run;

pub use app::{Settings, TrailMapApp};
pub use logging::{LoggingGuard, setup_logging};
pub use run::run;

use app::StorageError;
use trailmap_lib::TrailMapError;

/// Errors that end a command-line session
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] TrailMapError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Unknown trail: {0}")]
    UnknownTrail(String),

    #[error("No trail dataset given (use --trails or --gpx)")]
    NoDataset,

    #[error("An elevation service token is required (use --token or TRAILMAP_TOKEN)")]
    MissingToken,

    #[error("Output error: {0}")]
    Output(#[from] std::io::Error),
}
