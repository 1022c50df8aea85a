//! Elevation profile construction
//!
//! [`ProfileBuilder`] turns a raw trail path into the distance-indexed elevation
//! samples a chart needs:
//!
//! 1. densify the path ([`crate::resample`]),
//! 2. look up every resampled coordinate concurrently, recombining results in path order,
//! 3. accumulate great-circle distance from the first coordinate,
//! 4. drop samples that sit closer than a minimum separation to the last kept one.
//!
//! Each profile can be tied to a selection through an [`EpochTicket`]; once the
//! selection changes, outstanding lookups are skipped and the result is discarded.

use crate::elevation::{ElevationReading, ElevationSampler, ElevationSource, NoDataReason, SamplerConfig};
use crate::resample::{DEFAULT_MAX_SEGMENT_KM, resample};
use crate::utils::{Coordinate, haversine_km};
use crate::{Result, TrailMapError};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Samples closer than this to the previously kept sample are dropped (10 m)
pub const DEFAULT_MIN_SEPARATION_KM: f64 = 0.01;

/// Default number of elevation lookups in flight at once
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 32;

/// Configuration for profile construction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// Maximum spacing between resampled points, in kilometers
    pub max_segment_km: f64,
    /// Minimum spacing between retained samples, in kilometers
    pub min_separation_km: f64,
    /// Upper bound on concurrent elevation lookups (at least 1)
    pub max_concurrent_requests: usize,
    /// Per-lookup settings
    pub sampler: SamplerConfig,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            max_segment_km: DEFAULT_MAX_SEGMENT_KM,
            min_separation_km: DEFAULT_MIN_SEPARATION_KM,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            sampler: SamplerConfig::default(),
        }
    }
}

/// One point of an elevation profile
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElevationSample {
    pub coordinates: Coordinate,
    /// Distance from the start of the path
    pub distance_km: f64,
    pub elevation_meters: f64,
}

/// Ordered elevation samples along a trail
///
/// The first sample sits at distance zero and distances never decrease.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElevationProfile {
    samples: Vec<ElevationSample>,
}

impl ElevationProfile {
    pub fn samples(&self) -> &[ElevationSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ElevationSample> {
        self.samples.iter()
    }

    /// Distance of the last sample, zero for an empty profile
    pub fn total_distance_km(&self) -> f64 {
        self.samples.last().map_or(0.0, |s| s.distance_km)
    }

    /// Sample closest to `distance_km` along the trail (chart hover lookup)
    pub fn nearest_to_distance(&self, distance_km: f64) -> Option<&ElevationSample> {
        self.samples.iter().min_by(|a, b| {
            (a.distance_km - distance_km)
                .abs()
                .total_cmp(&(b.distance_km - distance_km).abs())
        })
    }

    pub fn into_samples(self) -> Vec<ElevationSample> {
        self.samples
    }
}

impl From<Vec<ElevationSample>> for ElevationProfile {
    fn from(samples: Vec<ElevationSample>) -> Self {
        Self { samples }
    }
}

impl<'a> IntoIterator for &'a ElevationProfile {
    type Item = &'a ElevationSample;
    type IntoIter = std::slice::Iter<'a, ElevationSample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}

/// Issues selection epochs; a newer epoch supersedes every older ticket
#[derive(Debug, Clone, Default)]
pub struct SelectionEpochs {
    current: Arc<AtomicU64>,
}

/// Marks work as belonging to one selection
#[derive(Debug, Clone)]
pub struct EpochTicket {
    epoch: u64,
    current: Arc<AtomicU64>,
}

impl SelectionEpochs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new selection, superseding all outstanding tickets
    pub fn begin(&self) -> EpochTicket {
        let epoch = self.current.fetch_add(1, Ordering::AcqRel) + 1;
        EpochTicket {
            epoch,
            current: Arc::clone(&self.current),
        }
    }

    /// Supersede all outstanding tickets without starting a selection
    pub fn invalidate(&self) {
        self.current.fetch_add(1, Ordering::AcqRel);
    }

    pub fn current(&self) -> u64 {
        self.current.load(Ordering::Acquire)
    }
}

impl EpochTicket {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Whether no newer selection has started since this ticket was issued
    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::Acquire) == self.epoch
    }
}

/// Cumulative great-circle distance of every point from the first, along the path
pub fn cumulative_distances(path: &[Coordinate]) -> Vec<f64> {
    let mut total = 0.0;
    let mut previous: Option<Coordinate> = None;
    path.iter()
        .map(|&point| {
            if let Some(prev) = previous {
                total += haversine_km(prev, point);
            }
            previous = Some(point);
            total
        })
        .collect()
}

/// Drop samples closer than `min_separation_km` to the last retained sample.
///
/// The first sample is always retained.
pub fn drop_near_duplicates(
    samples: Vec<ElevationSample>,
    min_separation_km: f64,
) -> Vec<ElevationSample> {
    let mut kept: Vec<ElevationSample> = Vec::with_capacity(samples.len());
    for sample in samples {
        match kept.last() {
            Some(last) if haversine_km(last.coordinates, sample.coordinates) < min_separation_km => {}
            _ => kept.push(sample),
        }
    }
    kept
}

/// Builds elevation profiles for trail paths
#[derive(Debug)]
pub struct ProfileBuilder<S> {
    sampler: ElevationSampler<S>,
    config: ProfileConfig,
}

impl<S: ElevationSource> ProfileBuilder<S> {
    pub fn new(source: S, config: ProfileConfig) -> Self {
        Self {
            sampler: ElevationSampler::new(source, config.sampler),
            config,
        }
    }

    #[inline]
    pub fn config(&self) -> &ProfileConfig {
        &self.config
    }

    /// Build the profile of `path`, independent of any selection.
    ///
    /// An empty path yields an empty profile.
    pub async fn build(&self, path: &[Coordinate]) -> ElevationProfile {
        // Without a ticket nothing can supersede the run
        self.run(path, None).await.unwrap_or_default()
    }

    /// Build the profile of `path` on behalf of the selection `ticket` belongs to.
    ///
    /// Returns [`TrailMapError::Superseded`] when a newer selection started before
    /// the profile was complete; lookups not yet issued at that point are skipped.
    pub async fn build_for(&self, path: &[Coordinate], ticket: &EpochTicket) -> Result<ElevationProfile> {
        self.run(path, Some(ticket))
            .await
            .ok_or(TrailMapError::Superseded)
    }

    async fn run(&self, path: &[Coordinate], ticket: Option<&EpochTicket>) -> Option<ElevationProfile> {
        if path.is_empty() {
            tracing::debug!("Empty trail path, returning empty profile");
            return Some(ElevationProfile::default());
        }

        let resampled = resample(path, self.config.max_segment_km);
        let sampler = &self.sampler;

        // Ordered fan-out/fan-in: `buffered` keeps results in input order
        let readings: Vec<ElevationReading> = futures::stream::iter(resampled.iter().copied())
            .map(|coordinate| async move {
                if ticket.is_some_and(|t| !t.is_current()) {
                    return ElevationReading::NoData(NoDataReason::Superseded);
                }
                sampler.sample(coordinate).await
            })
            .buffered(self.config.max_concurrent_requests.max(1))
            .collect()
            .await;

        if let Some(ticket) = ticket
            && !ticket.is_current()
        {
            tracing::debug!(epoch = ticket.epoch(), "Discarding profile of superseded selection");
            return None;
        }

        let degraded = readings.iter().filter(|r| !r.is_measured()).count();
        let distances = cumulative_distances(&resampled);

        let samples: Vec<ElevationSample> = resampled
            .iter()
            .zip(distances)
            .zip(&readings)
            .map(|((&coordinates, distance_km), reading)| ElevationSample {
                coordinates,
                distance_km,
                elevation_meters: reading.meters(),
            })
            .collect();

        let samples = drop_near_duplicates(samples, self.config.min_separation_km);

        tracing::debug!(
            raw_points = path.len(),
            resampled = resampled.len(),
            samples = samples.len(),
            degraded,
            "Elevation profile built"
        );

        Some(ElevationProfile::from(samples))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elevation::testing::{FnSource, constant};
    use crate::utils::path_length_km;
    use std::future::Future;
    use std::time::Duration;

    const ONE_KM_LAT: f64 = 1.0 / 111.194_926_6;

    fn straight_line(km: f64) -> Vec<Coordinate> {
        vec![
            Coordinate::new(-72.81, 44.54),
            Coordinate::new(-72.81, 44.54 + km * ONE_KM_LAT),
        ]
    }

    fn sample_at(lon: f64, lat: f64, distance_km: f64) -> ElevationSample {
        ElevationSample {
            coordinates: Coordinate::new(lon, lat),
            distance_km,
            elevation_meters: 1000.0,
        }
    }

    #[tokio::test]
    async fn test_straight_line_total_distance() {
        let builder = ProfileBuilder::new(constant(vec![1000.0]), ProfileConfig::default());
        let profile = builder.build(&straight_line(2.0)).await;

        assert!(!profile.is_empty());
        assert_eq!(profile.samples()[0].distance_km, 0.0);
        assert!((profile.total_distance_km() - 2.0).abs() < 1e-3);
        assert!(profile.iter().all(|s| s.elevation_meters == 1000.0));
    }

    #[tokio::test]
    async fn test_distances_never_decrease_and_are_separated() {
        let path = vec![
            Coordinate::new(-72.8300, 44.5300),
            Coordinate::new(-72.8146, 44.5438),
            Coordinate::new(-72.8146, 44.54381),
            Coordinate::new(-72.8146, 44.5438),
            Coordinate::new(-72.8000, 44.5200),
        ];
        let builder = ProfileBuilder::new(constant(vec![900.0]), ProfileConfig::default());
        let profile = builder.build(&path).await;

        assert_eq!(profile.samples()[0].coordinates, path[0]);
        for pair in profile.samples().windows(2) {
            assert!(pair[1].distance_km >= pair[0].distance_km);
            assert!(haversine_km(pair[0].coordinates, pair[1].coordinates) >= DEFAULT_MIN_SEPARATION_KM);
        }
        assert!(profile.total_distance_km() <= path_length_km(&path) + 1e-6);
    }

    #[tokio::test]
    async fn test_single_point_profile() {
        let builder = ProfileBuilder::new(constant(vec![1339.0]), ProfileConfig::default());
        let profile = builder.build(&[Coordinate::new(-72.8146, 44.5438)]).await;
        assert_eq!(profile.len(), 1);
        assert_eq!(profile.samples()[0].distance_km, 0.0);
        assert_eq!(profile.samples()[0].elevation_meters, 1339.0);
    }

    #[tokio::test]
    async fn test_empty_path_gives_empty_profile() {
        let builder = ProfileBuilder::new(constant(vec![1000.0]), ProfileConfig::default());
        assert!(builder.build(&[]).await.is_empty());
    }

    #[tokio::test]
    async fn test_failing_source_still_produces_profile() {
        let builder = ProfileBuilder::new(
            FnSource(|_| Err(TrailMapError::HttpStatus(500))),
            ProfileConfig::default(),
        );
        let profile = builder.build(&straight_line(0.3)).await;
        assert!(!profile.is_empty());
        assert!(profile.iter().all(|s| s.elevation_meters == 0.0));
    }

    /// Answers later for points further south, so completion order is reversed
    struct SlowSouth;

    impl ElevationSource for SlowSouth {
        fn candidates(
            &self,
            coordinate: Coordinate,
            _radius_m: f64,
            _limit: usize,
        ) -> impl Future<Output = Result<Vec<f64>>> + Send {
            async move {
                let delay = ((45.0 - coordinate.lat) * 100_000.0) as u64;
                tokio::time::sleep(Duration::from_millis(delay)).await;
                Ok(vec![(coordinate.lat - 44.5) * 10_000.0])
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_results_recombined_in_path_order() {
        let builder = ProfileBuilder::new(SlowSouth, ProfileConfig::default());
        let profile = builder.build(&straight_line(1.0)).await;

        assert!(profile.len() > 2);
        for pair in profile.samples().windows(2) {
            assert!(pair[1].elevation_meters > pair[0].elevation_meters);
        }
    }

    #[tokio::test]
    async fn test_superseded_selection_is_discarded() {
        let epochs = SelectionEpochs::new();
        let ticket = epochs.begin();
        let calls = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&calls);
        let newer = epochs.clone();

        // The very first lookup starts a newer selection
        let source = FnSource(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                newer.begin();
            }
            Ok(vec![1000.0])
        });
        let config = ProfileConfig {
            max_concurrent_requests: 1,
            ..ProfileConfig::default()
        };
        let builder = ProfileBuilder::new(source, config);

        let result = builder.build_for(&straight_line(1.0), &ticket).await;
        assert!(matches!(result, Err(TrailMapError::Superseded)));
        // Lookups after the switch were never issued
        assert!(calls.load(Ordering::SeqCst) < 4);
    }

    #[tokio::test]
    async fn test_current_ticket_completes() {
        let epochs = SelectionEpochs::new();
        let ticket = epochs.begin();
        let builder = ProfileBuilder::new(constant(vec![1000.0]), ProfileConfig::default());
        let profile = builder.build_for(&straight_line(0.2), &ticket).await.unwrap();
        assert!(!profile.is_empty());
    }

    #[test]
    fn test_epochs_supersede() {
        let epochs = SelectionEpochs::new();
        let first = epochs.begin();
        assert!(first.is_current());

        let second = epochs.begin();
        assert!(!first.is_current());
        assert!(second.is_current());

        epochs.invalidate();
        assert!(!second.is_current());
        assert!(second.epoch() < epochs.current());
    }

    #[test]
    fn test_cumulative_distances() {
        let path = straight_line(1.0);
        let distances = cumulative_distances(&path);
        assert_eq!(distances.len(), 2);
        assert_eq!(distances[0], 0.0);
        assert!((distances[1] - 1.0).abs() < 1e-6);
        assert!(cumulative_distances(&[]).is_empty());
    }

    #[test]
    fn test_drop_near_duplicates_compares_with_last_kept() {
        let step = 0.004 * ONE_KM_LAT;
        // Each neighbor is 4 m away; only every third one clears 10 m from the last kept
        let samples: Vec<ElevationSample> = (0..7)
            .map(|i| sample_at(-72.81, 44.54 + i as f64 * step, i as f64 * 0.004))
            .collect();

        let kept = drop_near_duplicates(samples.clone(), DEFAULT_MIN_SEPARATION_KM);
        let kept_distances: Vec<f64> = kept.iter().map(|s| s.distance_km).collect();
        assert_eq!(kept[0], samples[0]);
        assert_eq!(kept_distances.len(), 3);
        assert!((kept_distances[1] - 0.012).abs() < 1e-9);
        assert!((kept_distances[2] - 0.024).abs() < 1e-9);
    }

    #[test]
    fn test_drop_near_duplicates_keeps_first() {
        let only = vec![sample_at(-72.81, 44.54, 0.0)];
        assert_eq!(drop_near_duplicates(only.clone(), 1.0), only);
        assert!(drop_near_duplicates(Vec::new(), 1.0).is_empty());
    }

    #[test]
    fn test_nearest_to_distance() {
        let profile = ElevationProfile::from(vec![
            sample_at(-72.81, 44.540, 0.0),
            sample_at(-72.81, 44.541, 0.1),
            sample_at(-72.81, 44.542, 0.2),
        ]);
        assert_eq!(profile.nearest_to_distance(0.14).map(|s| s.distance_km), Some(0.1));
        assert_eq!(profile.nearest_to_distance(9.0).map(|s| s.distance_km), Some(0.2));
        assert!(ElevationProfile::default().nearest_to_distance(0.0).is_none());
    }
}
