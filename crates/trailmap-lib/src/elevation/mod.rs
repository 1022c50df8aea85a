//! Per-point elevation lookup
//!
//! An [`ElevationSource`] answers "which elevations are recorded around this
//! coordinate?" with a noisy candidate set (contour crossings, tile-boundary
//! duplicates, sentinel values). [`ElevationSampler`] turns that set into one robust
//! value: candidates outside a plausible range are dropped and the median of the
//! rest is taken. A failing or empty lookup never aborts the caller; it becomes an
//! explicit [`ElevationReading::NoData`] that reads as 0 m.

mod tilequery;

pub use tilequery::{DEFAULT_TILEQUERY_URL, TilequeryElevationSource};

use crate::utils::Coordinate;
use crate::{Result, TrailMapError};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Default search radius around each coordinate, in meters
pub const DEFAULT_SEARCH_RADIUS_M: f64 = 500.0;

/// Default maximum number of candidate features per lookup
pub const DEFAULT_CANDIDATE_LIMIT: usize = 50;

/// Candidates at or below this elevation are treated as sentinel values
pub const DEFAULT_MIN_VALID_ELEVATION_M: f64 = 0.0;

/// Candidates at or above this elevation are treated as errors
pub const DEFAULT_MAX_VALID_ELEVATION_M: f64 = 3000.0;

/// A spatial elevation lookup service
///
/// Given a coordinate and a search radius, returns zero or more candidate
/// elevations in meters. Errors are surfaced as a rejected request.
pub trait ElevationSource: Send + Sync {
    fn candidates(
        &self,
        coordinate: Coordinate,
        radius_m: f64,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<f64>>> + Send;
}

impl<S: ElevationSource> ElevationSource for Arc<S> {
    fn candidates(
        &self,
        coordinate: Coordinate,
        radius_m: f64,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<f64>>> + Send {
        (**self).candidates(coordinate, radius_m, limit)
    }
}

/// Tunables for [`ElevationSampler`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Search radius passed to the source, in meters
    pub radius_m: f64,
    /// Maximum number of candidates requested per lookup
    pub candidate_limit: usize,
    /// Exclusive lower bound of plausible elevations
    pub min_valid_m: f64,
    /// Exclusive upper bound of plausible elevations
    pub max_valid_m: f64,
    /// Optional ceiling for a single lookup; expiry reads as "no data"
    pub request_timeout: Option<Duration>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            radius_m: DEFAULT_SEARCH_RADIUS_M,
            candidate_limit: DEFAULT_CANDIDATE_LIMIT,
            min_valid_m: DEFAULT_MIN_VALID_ELEVATION_M,
            max_valid_m: DEFAULT_MAX_VALID_ELEVATION_M,
            request_timeout: None,
        }
    }
}

/// Why a lookup produced no usable elevation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoDataReason {
    /// The source returned no candidates at all
    NoCandidates,
    /// Every candidate fell outside the plausible range
    AllFiltered,
    /// The request failed (network, HTTP status, malformed body)
    RequestFailed,
    /// The request exceeded the configured timeout
    TimedOut,
    /// The selection the request belonged to was replaced before it was issued
    Superseded,
}

/// Outcome of sampling one coordinate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElevationReading {
    Measured(f64),
    NoData(NoDataReason),
}

impl ElevationReading {
    /// Elevation in meters; every "no data" outcome reads as 0
    #[inline]
    pub fn meters(&self) -> f64 {
        match self {
            Self::Measured(meters) => *meters,
            Self::NoData(_) => 0.0,
        }
    }

    #[inline]
    pub fn is_measured(&self) -> bool {
        matches!(self, Self::Measured(_))
    }
}

/// Median of the candidates strictly inside `(min_valid, max_valid)`.
///
/// For an even number of survivors the upper-middle element is returned, so the
/// result is always one of the observed values. `None` when nothing survives.
pub fn median_of_valid(candidates: &[f64], min_valid: f64, max_valid: f64) -> Option<f64> {
    let mut valid: Vec<f64> = candidates
        .iter()
        .copied()
        .filter(|ele| ele.is_finite() && *ele > min_valid && *ele < max_valid)
        .collect();

    if valid.is_empty() {
        return None;
    }

    valid.sort_by(f64::total_cmp);
    Some(valid[valid.len() / 2])
}

/// Reduces noisy elevation candidates for one coordinate to a single value
#[derive(Debug, Clone)]
pub struct ElevationSampler<S> {
    source: S,
    config: SamplerConfig,
}

impl<S: ElevationSource> ElevationSampler<S> {
    pub fn new(source: S, config: SamplerConfig) -> Self {
        Self { source, config }
    }

    #[inline]
    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    #[inline]
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Look up the elevation at `coordinate`.
    ///
    /// Never fails: service errors, timeouts and empty or implausible candidate
    /// sets are logged and reported as [`ElevationReading::NoData`].
    pub async fn sample(&self, coordinate: Coordinate) -> ElevationReading {
        let request =
            self.source
                .candidates(coordinate, self.config.radius_m, self.config.candidate_limit);

        let response = match self.config.request_timeout {
            Some(limit) => match tokio::time::timeout(limit, request).await {
                Ok(response) => response,
                Err(_) => {
                    tracing::warn!(
                        lon = coordinate.lon,
                        lat = coordinate.lat,
                        timeout_ms = limit.as_millis() as u64,
                        "Elevation query timed out"
                    );
                    return ElevationReading::NoData(NoDataReason::TimedOut);
                }
            },
            None => request.await,
        };

        let candidates = match response {
            Ok(candidates) => candidates,
            Err(err) => {
                log_request_failure(coordinate, &err);
                return ElevationReading::NoData(NoDataReason::RequestFailed);
            }
        };

        if candidates.is_empty() {
            tracing::warn!(
                lon = coordinate.lon,
                lat = coordinate.lat,
                "No elevation features found"
            );
            return ElevationReading::NoData(NoDataReason::NoCandidates);
        }

        match median_of_valid(&candidates, self.config.min_valid_m, self.config.max_valid_m) {
            Some(meters) => ElevationReading::Measured(meters),
            None => {
                tracing::warn!(
                    lon = coordinate.lon,
                    lat = coordinate.lat,
                    raw = ?candidates,
                    "No valid elevations after filtering"
                );
                ElevationReading::NoData(NoDataReason::AllFiltered)
            }
        }
    }
}

fn log_request_failure(coordinate: Coordinate, err: &TrailMapError) {
    match err {
        TrailMapError::HttpStatus(status) => tracing::warn!(
            lon = coordinate.lon,
            lat = coordinate.lat,
            status,
            "Elevation query failed"
        ),
        other => tracing::warn!(
            lon = coordinate.lon,
            lat = coordinate.lat,
            error = %other,
            "Error fetching elevation"
        ),
    }
}
