//! User-facing map controls and their persisted state

use super::storage::{StorageBackend, StorageResult, load_json_backend, save_json_backend};
use serde::{Deserialize, Serialize};
use trailmap_lib::layers::{BasemapStyle, TerrainState, ids};

/// One switch of the layer control panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum MapToggle {
    Trails,
    Hillshade,
    Contours,
    CliffAreas,
    SnowProbability,
}

impl MapToggle {
    pub const ALL: [MapToggle; 5] = [
        MapToggle::Trails,
        MapToggle::Hillshade,
        MapToggle::Contours,
        MapToggle::CliffAreas,
        MapToggle::SnowProbability,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Trails => "Trails",
            Self::Hillshade => "Hillshade",
            Self::Contours => "Contours",
            Self::CliffAreas => "Cliff Areas",
            Self::SnowProbability => "Snow Probability",
        }
    }

    /// Layers shown or hidden together with this switch
    pub fn layers(self) -> &'static [&'static str] {
        match self {
            Self::Trails => &[ids::TRAILS_LINE, ids::TRAILS_BORDER],
            Self::Hillshade => &[ids::TERRAIN_RASTER],
            Self::Contours => &[ids::CONTOURS],
            Self::CliffAreas => &[ids::CLIFF_AREAS],
            Self::SnowProbability => &[ids::SNOW_PROBABILITY],
        }
    }

    /// Layers forced hidden whenever this switch changes
    pub fn suppressed_layers(self) -> &'static [&'static str] {
        match self {
            Self::Hillshade => &[ids::TERRAIN_DEM],
            _ => &[],
        }
    }
}

impl std::fmt::Display for MapToggle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Everything the user can change from the control panel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiState {
    pub show_trails: bool,
    pub show_hillshade: bool,
    pub show_contours: bool,
    pub show_cliff_areas: bool,
    pub show_snow_probability: bool,
    pub terrain: TerrainState,
    pub basemap: BasemapStyle,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            show_trails: true,
            show_hillshade: true,
            show_contours: true,
            show_cliff_areas: true,
            show_snow_probability: true,
            terrain: TerrainState::default(),
            basemap: BasemapStyle::default(),
        }
    }
}

impl UiState {
    pub const STORAGE_KEY: &'static str = "ui_state";

    pub fn is_on(&self, toggle: MapToggle) -> bool {
        match toggle {
            MapToggle::Trails => self.show_trails,
            MapToggle::Hillshade => self.show_hillshade,
            MapToggle::Contours => self.show_contours,
            MapToggle::CliffAreas => self.show_cliff_areas,
            MapToggle::SnowProbability => self.show_snow_probability,
        }
    }

    pub fn set(&mut self, toggle: MapToggle, on: bool) {
        let slot = match toggle {
            MapToggle::Trails => &mut self.show_trails,
            MapToggle::Hillshade => &mut self.show_hillshade,
            MapToggle::Contours => &mut self.show_contours,
            MapToggle::CliffAreas => &mut self.show_cliff_areas,
            MapToggle::SnowProbability => &mut self.show_snow_probability,
        };
        *slot = on;
    }

    /// Load the persisted state, falling back to defaults when missing or unreadable
    pub fn load(backend: &dyn StorageBackend) -> Self {
        match load_json_backend::<UiState>(backend, Self::STORAGE_KEY) {
            Ok(Some(state)) => {
                tracing::debug!(?state, "Loaded persisted UI state");
                state
            }
            Ok(None) => Self::default(),
            Err(e) => {
                tracing::warn!("Ignoring persisted UI state: {}", e);
                Self::default()
            }
        }
    }

    pub fn save(&self, backend: &dyn StorageBackend) -> StorageResult<()> {
        save_json_backend(backend, Self::STORAGE_KEY, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::storage::FileStorage;

    #[test]
    fn test_toggle_layers() {
        assert_eq!(MapToggle::Trails.layers(), &[ids::TRAILS_LINE, ids::TRAILS_BORDER]);
        assert_eq!(MapToggle::Hillshade.layers(), &[ids::TERRAIN_RASTER]);
        assert_eq!(MapToggle::Hillshade.suppressed_layers(), &[ids::TERRAIN_DEM]);
        assert!(MapToggle::Contours.suppressed_layers().is_empty());
        assert_eq!(MapToggle::CliffAreas.to_string(), "Cliff Areas");
    }

    #[test]
    fn test_set_and_query() {
        let mut state = UiState::default();
        assert!(MapToggle::ALL.iter().all(|t| state.is_on(*t)));

        state.set(MapToggle::SnowProbability, false);
        assert!(!state.is_on(MapToggle::SnowProbability));
        assert!(state.is_on(MapToggle::CliffAreas));
    }

    #[test]
    fn test_persist_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new_with_path(Some(dir.path().join("s.json"))).unwrap();
        assert_eq!(UiState::load(&storage), UiState::default());

        let mut state = UiState::default();
        state.set(MapToggle::Contours, false);
        state.basemap = BasemapStyle::Satellite;
        state.terrain.exaggeration = 1.7;
        state.save(&storage).unwrap();

        assert_eq!(UiState::load(&storage), state);
    }

    #[test]
    fn test_partial_and_corrupt_state() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new_with_path(Some(dir.path().join("s.json"))).unwrap();

        storage
            .set_string(UiState::STORAGE_KEY, r#"{"show_contours": false}"#)
            .unwrap();
        let state = UiState::load(&storage);
        assert!(!state.show_contours);
        assert!(state.show_trails);
        assert_eq!(state.basemap, BasemapStyle::Dark);

        storage.set_string(UiState::STORAGE_KEY, "[]").unwrap();
        assert_eq!(UiState::load(&storage), UiState::default());
    }
}
