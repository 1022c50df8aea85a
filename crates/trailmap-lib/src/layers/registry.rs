//! Declarative table of the sources and layers the map owns

use super::paint::{PaintValue, trail_border_paint, trail_line_paint};
use super::{BasemapStyle, Visibility, ids};
use serde_json::{Map, Value, json};

/// GeoJSON dataset with the selectable trails
pub const DEFAULT_TRAILS_DATA_URL: &str = "https://gist.githubusercontent.com/liampaus/db98df1f74962a1030ab5d858048c504/raw/7da27f7ae6bfe74f5b481fddc9fd43ab8a498f84/mansfieldTrails.geojson";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    RasterDem,
    Raster,
    Vector,
    GeoJson,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RasterDem => "raster-dem",
            Self::Raster => "raster",
            Self::Vector => "vector",
            Self::GeoJson => "geojson",
        }
    }
}

/// A data source layers draw from
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSpec {
    pub id: &'static str,
    pub kind: SourceKind,
    /// Tileset URL, or the data URL of a GeoJSON source
    pub url: String,
    pub tile_size: Option<u32>,
    pub max_zoom: Option<u32>,
}

impl SourceSpec {
    /// Source object as the engine's `addSource` expects it
    pub fn to_style_json(&self) -> Value {
        let mut spec = Map::new();
        spec.insert("type".into(), json!(self.kind.as_str()));
        let url_key = if self.kind == SourceKind::GeoJson { "data" } else { "url" };
        spec.insert(url_key.into(), json!(self.url));
        if let Some(tile_size) = self.tile_size {
            spec.insert("tileSize".into(), json!(tile_size));
        }
        if let Some(max_zoom) = self.max_zoom {
            spec.insert("maxzoom".into(), json!(max_zoom));
        }
        Value::Object(spec)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    Hillshade,
    Raster,
    Line,
}

impl LayerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hillshade => "hillshade",
            Self::Raster => "raster",
            Self::Line => "line",
        }
    }
}

type PaintFn = fn(BasemapStyle) -> Vec<(&'static str, PaintValue)>;

/// Static description of one layer
#[derive(Debug, Clone)]
pub struct LayerSpec {
    pub id: &'static str,
    pub source_id: &'static str,
    pub source_layer: Option<&'static str>,
    pub kind: LayerKind,
    pub default_visibility: Visibility,
    /// Position in the enforced stack, bottom first; `None` is left where it lands
    pub stack_rank: Option<usize>,
    /// Default paint, some of which depends on the basemap
    pub paint: PaintFn,
    pub layout: &'static [(&'static str, &'static str)],
}

impl LayerSpec {
    pub fn default_paint(&self, basemap: BasemapStyle) -> Vec<(&'static str, PaintValue)> {
        (self.paint)(basemap)
    }
}

/// Everything the engine needs to create a layer
#[derive(Debug, Clone, PartialEq)]
pub struct LayerDefinition {
    pub id: String,
    pub source_id: String,
    pub source_layer: Option<String>,
    pub kind: LayerKind,
    pub visibility: Visibility,
    pub paint: Vec<(String, PaintValue)>,
    pub layout: Vec<(String, String)>,
}

impl LayerDefinition {
    /// Layer object as the engine's `addLayer` expects it
    pub fn to_style_json(&self) -> Value {
        let mut layout: Map<String, Value> = self
            .layout
            .iter()
            .map(|(k, v)| (k.clone(), json!(v)))
            .collect();
        layout.insert("visibility".into(), json!(self.visibility.as_str()));

        let paint: Map<String, Value> = self
            .paint
            .iter()
            .map(|(k, v)| (k.clone(), v.to_expression()))
            .collect();

        let mut layer = json!({
            "id": self.id,
            "type": self.kind.as_str(),
            "source": self.source_id,
            "layout": layout,
            "paint": paint,
        });
        if let (Some(source_layer), Some(obj)) = (&self.source_layer, layer.as_object_mut()) {
            obj.insert("source-layer".into(), json!(source_layer));
        }
        layer
    }
}

const ROUND_LINE: &[(&str, &str)] = &[("line-join", "round"), ("line-cap", "round")];

fn hillshade_paint(_: BasemapStyle) -> Vec<(&'static str, PaintValue)> {
    vec![
        ("hillshade-exaggeration", PaintValue::Number(1.5)),
        ("hillshade-illumination-direction", PaintValue::Number(315.0)),
        ("hillshade-shadow-color", PaintValue::color("#000000")),
        ("hillshade-highlight-color", PaintValue::color("#ffffff")),
        ("hillshade-accent-color", PaintValue::color("#000000")),
    ]
}

fn terrain_dem_paint(_: BasemapStyle) -> Vec<(&'static str, PaintValue)> {
    vec![("hillshade-exaggeration", PaintValue::Number(0.5))]
}

fn terrain_raster_paint(_: BasemapStyle) -> Vec<(&'static str, PaintValue)> {
    vec![("raster-opacity", PaintValue::Number(1.0))]
}

fn snow_probability_paint(_: BasemapStyle) -> Vec<(&'static str, PaintValue)> {
    vec![("raster-opacity", PaintValue::Number(0.6))]
}

fn cliff_areas_paint(_: BasemapStyle) -> Vec<(&'static str, PaintValue)> {
    vec![("raster-opacity", PaintValue::Number(0.5))]
}

fn contours_paint(basemap: BasemapStyle) -> Vec<(&'static str, PaintValue)> {
    vec![
        ("line-color", PaintValue::color(basemap.contour_color())),
        (
            "line-width",
            PaintValue::Raw(json!(["match", ["get", "index"], [0, 5], 1, 0.5])),
        ),
        ("line-opacity", PaintValue::Number(0.5)),
    ]
}

fn trails_border_paint(_: BasemapStyle) -> Vec<(&'static str, PaintValue)> {
    trail_border_paint(None)
}

fn trails_line_paint(_: BasemapStyle) -> Vec<(&'static str, PaintValue)> {
    trail_line_paint(None)
}

/// Sources and layers of the map, in creation order
#[derive(Debug, Clone)]
pub struct LayerRegistry {
    sources: Vec<SourceSpec>,
    layers: Vec<LayerSpec>,
}

impl Default for LayerRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_TRAILS_DATA_URL)
    }
}

impl LayerRegistry {
    /// Standard registry with the trails source pointed at `trails_data_url`
    pub fn new(trails_data_url: impl Into<String>) -> Self {
        let raster = |id, url: &str| SourceSpec {
            id,
            kind: SourceKind::Raster,
            url: url.to_string(),
            tile_size: Some(256),
            max_zoom: None,
        };

        let sources = vec![
            SourceSpec {
                id: ids::DEM_SOURCE,
                kind: SourceKind::RasterDem,
                url: "mapbox://mapbox.mapbox-terrain-dem-v1".to_string(),
                tile_size: Some(512),
                max_zoom: Some(14),
            },
            SourceSpec {
                id: ids::TRAILS_SOURCE,
                kind: SourceKind::GeoJson,
                url: trails_data_url.into(),
                tile_size: None,
                max_zoom: None,
            },
            SourceSpec {
                id: ids::CONTOURS_SOURCE,
                kind: SourceKind::Vector,
                url: "mapbox://mapbox.mapbox-terrain-v2".to_string(),
                tile_size: None,
                max_zoom: None,
            },
            raster(ids::CLIFF_AREAS_SOURCE, "mapbox://onwaterllc.cw2k0ya8"),
            raster(ids::SNOW_PROBABILITY_SOURCE, "mapbox://onwaterllc.3ky3i0pc"),
            raster(ids::TERRAIN_RASTER_SOURCE, "mapbox://onwaterllc.3jn1vsji"),
        ];

        let layers = vec![
            LayerSpec {
                id: ids::HILLSHADE,
                source_id: ids::DEM_SOURCE,
                source_layer: None,
                kind: LayerKind::Hillshade,
                default_visibility: Visibility::Hidden,
                stack_rank: None,
                paint: hillshade_paint,
                layout: &[],
            },
            LayerSpec {
                id: ids::TERRAIN_DEM,
                source_id: ids::DEM_SOURCE,
                source_layer: None,
                kind: LayerKind::Hillshade,
                default_visibility: Visibility::Hidden,
                stack_rank: None,
                paint: terrain_dem_paint,
                layout: &[],
            },
            LayerSpec {
                id: ids::TERRAIN_RASTER,
                source_id: ids::TERRAIN_RASTER_SOURCE,
                source_layer: None,
                kind: LayerKind::Raster,
                default_visibility: Visibility::Visible,
                stack_rank: Some(0),
                paint: terrain_raster_paint,
                layout: &[],
            },
            LayerSpec {
                id: ids::SNOW_PROBABILITY,
                source_id: ids::SNOW_PROBABILITY_SOURCE,
                source_layer: None,
                kind: LayerKind::Raster,
                default_visibility: Visibility::Visible,
                stack_rank: Some(1),
                paint: snow_probability_paint,
                layout: &[],
            },
            LayerSpec {
                id: ids::CLIFF_AREAS,
                source_id: ids::CLIFF_AREAS_SOURCE,
                source_layer: None,
                kind: LayerKind::Raster,
                default_visibility: Visibility::Visible,
                stack_rank: Some(2),
                paint: cliff_areas_paint,
                layout: &[],
            },
            LayerSpec {
                id: ids::CONTOURS,
                source_id: ids::CONTOURS_SOURCE,
                source_layer: Some("contour"),
                kind: LayerKind::Line,
                default_visibility: Visibility::Visible,
                stack_rank: Some(3),
                paint: contours_paint,
                layout: ROUND_LINE,
            },
            LayerSpec {
                id: ids::TRAILS_BORDER,
                source_id: ids::TRAILS_SOURCE,
                source_layer: None,
                kind: LayerKind::Line,
                default_visibility: Visibility::Visible,
                stack_rank: Some(4),
                paint: trails_border_paint,
                layout: ROUND_LINE,
            },
            LayerSpec {
                id: ids::TRAILS_LINE,
                source_id: ids::TRAILS_SOURCE,
                source_layer: None,
                kind: LayerKind::Line,
                default_visibility: Visibility::Visible,
                stack_rank: Some(5),
                paint: trails_line_paint,
                layout: ROUND_LINE,
            },
        ];

        Self { sources, layers }
    }

    #[inline]
    pub fn sources(&self) -> &[SourceSpec] {
        &self.sources
    }

    #[inline]
    pub fn layers(&self) -> &[LayerSpec] {
        &self.layers
    }

    pub fn layer(&self, id: &str) -> Option<&LayerSpec> {
        self.layers.iter().find(|layer| layer.id == id)
    }

    pub fn source(&self, id: &str) -> Option<&SourceSpec> {
        self.sources.iter().find(|source| source.id == id)
    }

    /// Ranked layer ids, bottom first
    pub fn stack_order(&self) -> Vec<&'static str> {
        let mut ranked: Vec<(usize, &'static str)> = self
            .layers
            .iter()
            .filter_map(|layer| layer.stack_rank.map(|rank| (rank, layer.id)))
            .collect();
        ranked.sort_by_key(|(rank, _)| *rank);
        ranked.into_iter().map(|(_, id)| id).collect()
    }

    /// Layers that must exist before recorded state is restored after a style swap
    pub fn required_layers(&self) -> Vec<&'static str> {
        self.stack_order()
    }
}
