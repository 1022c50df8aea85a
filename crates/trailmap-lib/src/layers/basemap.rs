use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Swappable base style of the map
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BasemapStyle {
    Outdoors,
    Satellite,
    #[default]
    Dark,
}

impl BasemapStyle {
    pub const ALL: [BasemapStyle; 3] = [Self::Outdoors, Self::Satellite, Self::Dark];

    pub fn style_url(self) -> &'static str {
        match self {
            Self::Outdoors => "mapbox://styles/mapbox/outdoors-v12",
            Self::Satellite => "mapbox://styles/mapbox/satellite-streets-v12",
            Self::Dark => "mapbox://styles/mapbox/dark-v11",
        }
    }

    /// Contour stroke that stays readable on this style
    pub fn contour_color(self) -> &'static str {
        match self {
            Self::Outdoors => "#000",
            Self::Satellite | Self::Dark => "#FFF",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Outdoors => "outdoors",
            Self::Satellite => "satellite",
            Self::Dark => "dark",
        }
    }
}

impl fmt::Display for BasemapStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BasemapStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|style| style.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown basemap style '{s}' (expected outdoors, satellite or dark)"))
    }
}
