//! Trail dataset loading
//!
//! Trails come from a GeoJSON FeatureCollection whose line features are the
//! selectable trails. A single GPX file can also stand in for one trail path.

use crate::layers::RenderedFeature;
use crate::utils::Coordinate;
use crate::{Result, TrailMapError};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::Path;

/// Name shown when a feature carries no title
pub const UNKNOWN_TRAIL_NAME: &str = "Unknown Trail";

/// Description shown when a feature carries none
pub const DEFAULT_TRAIL_DESCRIPTION: &str = "A trail on Mount Mansfield";

#[derive(Debug, Deserialize)]
struct RawFeatureCollection {
    #[serde(default)]
    features: Vec<RawFeature>,
}

#[derive(Debug, Deserialize)]
struct RawFeature {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    properties: Option<Map<String, Value>>,
    geometry: Option<RawGeometry>,
}

#[derive(Debug, Deserialize)]
struct RawGeometry {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    coordinates: Value,
}

/// One selectable trail
#[derive(Debug, Clone, PartialEq)]
pub struct TrailFeature {
    pub id: String,
    pub name: String,
    pub description: String,
    pub path: Vec<Coordinate>,
    /// Original GeoJSON properties, handed to the engine as rendered attributes
    pub properties: Map<String, Value>,
}

impl TrailFeature {
    /// How this trail shows up in a hit-test against `layer_id`
    pub fn to_rendered(&self, layer_id: &str) -> RenderedFeature {
        let mut properties = self.properties.clone();
        // Keep the source's id type, the highlight expression compares against it
        if properties.get("id").and_then(id_string).is_none() {
            properties.insert("id".to_string(), Value::String(self.id.clone()));
        }
        properties.insert("title".to_string(), Value::String(self.name.clone()));
        properties.insert("description".to_string(), Value::String(self.description.clone()));
        RenderedFeature {
            layer_id: layer_id.to_string(),
            properties,
            path: self.path.clone(),
        }
    }
}

/// All trails of one dataset, in file order
#[derive(Debug, Clone, Default)]
pub struct TrailDataset {
    features: Vec<TrailFeature>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl TrailDataset {
    /// Parse a GeoJSON FeatureCollection.
    ///
    /// Features without line geometry are skipped.
    pub fn from_geojson_str(input: &str) -> Result<Self> {
        let collection: RawFeatureCollection = serde_json::from_str(input)?;
        let mut features = Vec::with_capacity(collection.features.len());

        for (index, raw) in collection.features.into_iter().enumerate() {
            let Some(geometry) = raw.geometry.as_ref() else {
                tracing::debug!(index, "Skipping feature without geometry");
                continue;
            };

            let path = match line_coordinates(geometry) {
                Ok(path) => path,
                Err(err) => {
                    tracing::debug!(index, kind = %geometry.kind, error = %err, "Skipping feature");
                    continue;
                }
            };

            let properties = raw.properties.unwrap_or_default();
            let id = properties
                .get("id")
                .and_then(id_string)
                .or_else(|| raw.id.as_ref().and_then(id_string))
                .unwrap_or_else(|| index.to_string());
            let name = string_property(&properties, "title")
                .or_else(|| string_property(&properties, "name"))
                .unwrap_or(UNKNOWN_TRAIL_NAME)
                .to_string();
            let description = string_property(&properties, "description")
                .unwrap_or(DEFAULT_TRAIL_DESCRIPTION)
                .to_string();

            features.push(TrailFeature {
                id,
                name,
                description,
                path,
                properties,
            });
        }

        tracing::info!(trails = features.len(), "Loaded trail dataset");
        Ok(Self { features })
    }

    pub fn from_geojson_file(path: impl AsRef<Path>) -> Result<Self> {
        let input = std::fs::read_to_string(path)?;
        Self::from_geojson_str(&input)
    }

    /// Wrap a single GPX track as a one-trail dataset
    pub fn from_gpx_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let trail_path = read_gpx_path(path)?;
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| UNKNOWN_TRAIL_NAME.to_string());

        Ok(Self {
            features: vec![TrailFeature {
                id: "0".to_string(),
                name,
                description: DEFAULT_TRAIL_DESCRIPTION.to_string(),
                path: trail_path,
                properties: Map::new(),
            }],
        })
    }

    pub fn get(&self, id: &str) -> Option<&TrailFeature> {
        self.features.iter().find(|f| f.id == id)
    }

    #[inline]
    pub fn features(&self) -> &[TrailFeature] {
        &self.features
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Concatenate every track segment of a GPX document into one path
pub fn path_from_gpx(gpx: &gpx::Gpx) -> Vec<Coordinate> {
    gpx.tracks
        .iter()
        .flat_map(|track| &track.segments)
        .flat_map(|segment| &segment.points)
        .map(|waypoint| Coordinate::from(waypoint.point()))
        .filter(Coordinate::is_valid)
        .collect()
}

/// Read a GPX file and flatten it into one path
pub fn read_gpx_path(path: impl AsRef<Path>) -> Result<Vec<Coordinate>> {
    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);
    let gpx = gpx::read(reader)?;
    let trail_path = path_from_gpx(&gpx);
    if trail_path.is_empty() {
        return Err(TrailMapError::EmptyPath);
    }
    Ok(trail_path)
}

/// Path of a `LineString`, or the concatenated parts of a `MultiLineString`
fn line_coordinates(geometry: &RawGeometry) -> Result<Vec<Coordinate>> {
    match geometry.kind.as_str() {
        "LineString" => positions(&geometry.coordinates),
        "MultiLineString" => {
            let parts = geometry.coordinates.as_array().ok_or_else(|| {
                TrailMapError::InvalidGeometry("MultiLineString without parts".to_string())
            })?;
            let mut path = Vec::new();
            for part in parts {
                path.extend(positions(part)?);
            }
            Ok(path)
        }
        other => Err(TrailMapError::InvalidGeometry(format!(
            "unsupported geometry type {other}"
        ))),
    }
}

/// GeoJSON positions; anything past longitude and latitude (altitude) is ignored
fn positions(value: &Value) -> Result<Vec<Coordinate>> {
    let array = value
        .as_array()
        .ok_or_else(|| TrailMapError::InvalidGeometry("expected a position array".to_string()))?;

    array
        .iter()
        .map(|position| match position.as_array().map(Vec::as_slice) {
            Some([lon, lat, ..]) => match (lon.as_f64(), lat.as_f64()) {
                (Some(lon), Some(lat)) => Ok(Coordinate::new(lon, lat)),
                _ => Err(TrailMapError::InvalidGeometry(format!(
                    "non-numeric position {position}"
                ))),
            },
            _ => Err(TrailMapError::InvalidGeometry(format!(
                "malformed position {position}"
            ))),
        })
        .collect()
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn string_property<'a>(properties: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    properties
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}
