//! Elevation lookups against a vector-tile "tilequery" HTTP endpoint
//!
//! The endpoint returns the contour features intersecting a radius around the
//! queried point; each feature carries its elevation in the `ele` property.

use super::ElevationSource;
use crate::utils::Coordinate;
use crate::{Result, TrailMapError};
use serde::Deserialize;
use std::future::Future;

/// Tilequery endpoint of the terrain tileset holding the `contour` layer
pub const DEFAULT_TILEQUERY_URL: &str =
    "https://api.mapbox.com/v4/mapbox.mapbox-terrain-v2/tilequery";

/// Layer of the terrain tileset whose features carry elevations
const CONTOUR_LAYER: &str = "contour";

#[derive(Debug, Deserialize)]
struct TilequeryResponse {
    #[serde(default)]
    features: Vec<TilequeryFeature>,
}

#[derive(Debug, Deserialize)]
struct TilequeryFeature {
    #[serde(default)]
    properties: serde_json::Map<String, serde_json::Value>,
}

impl TilequeryResponse {
    /// Numeric `ele` values; features without one are skipped
    fn elevations(&self) -> Vec<f64> {
        self.features
            .iter()
            .filter_map(|feature| feature.properties.get("ele"))
            .filter_map(serde_json::Value::as_f64)
            .collect()
    }
}

/// Parse a tilequery response body into candidate elevations
pub(crate) fn parse_elevations(body: &str) -> Result<Vec<f64>> {
    let response: TilequeryResponse = serde_json::from_str(body)?;
    Ok(response.elevations())
}

/// HTTP-backed [`ElevationSource`] querying contour features around a point
#[derive(Debug, Clone)]
pub struct TilequeryElevationSource {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl TilequeryElevationSource {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: DEFAULT_TILEQUERY_URL.to_string(),
            access_token: access_token.into(),
        }
    }

    /// Point the source at a different tilequery endpoint (mirrors, test servers)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Reuse an existing HTTP client (connection pool, proxy settings)
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Full request URL for one lookup
    pub fn request_url(&self, coordinate: Coordinate, radius_m: f64, limit: usize) -> String {
        format!(
            "{}/{},{}.json?layers={}&limit={}&radius={}&access_token={}",
            self.base_url,
            coordinate.lon,
            coordinate.lat,
            CONTOUR_LAYER,
            limit,
            radius_m,
            self.access_token
        )
    }
}

impl ElevationSource for TilequeryElevationSource {
    fn candidates(
        &self,
        coordinate: Coordinate,
        radius_m: f64,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<f64>>> + Send {
        let url = self.request_url(coordinate, radius_m, limit);
        let client = self.client.clone();

        async move {
            let response = client.get(&url).send().await?;
            let status = response.status();
            if status != reqwest::StatusCode::OK {
                return Err(TrailMapError::HttpStatus(status.as_u16()));
            }
            let body = response.text().await?;
            parse_elevations(&body)
        }
    }
}
