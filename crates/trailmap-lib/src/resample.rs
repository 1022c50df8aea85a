//! Polyline densification
//!
//! Trail geometry is digitized with one vertex per bend, so long straight stretches
//! carry no intermediate points. Elevation sampling needs a bounded spacing, so
//! [`resample`] inserts linearly interpolated points wherever two consecutive
//! vertices are farther apart than the maximum segment length.

use crate::utils::{Coordinate, haversine_km};

/// Default maximum distance between two consecutive resampled points (50 m)
pub const DEFAULT_MAX_SEGMENT_KM: f64 = 0.05;

/// Slack for floating-point noise when comparing a piece against the limit
const LENGTH_TOLERANCE_KM: f64 = 1e-9;

/// Densify `path` so that consecutive points are at most `max_segment_km` apart.
///
/// Points are interpolated in (longitude, latitude) space, distances are measured
/// with the haversine formula. Original vertices are always kept, in order, and
/// no point is ever removed. Paths with fewer than two points, and non-positive or
/// non-finite limits, are returned unchanged.
pub fn resample(path: &[Coordinate], max_segment_km: f64) -> Vec<Coordinate> {
    #[cfg(feature = "profiling")]
    profiling::scope!("resample");

    if path.len() < 2 || !max_segment_km.is_finite() || max_segment_km <= 0.0 {
        return path.to_vec();
    }

    let mut out = Vec::with_capacity(path.len());
    out.push(path[0]);

    for pair in path.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        let distance = haversine_km(prev, next);

        if distance > max_segment_km {
            let steps = steps_for(prev, next, distance, max_segment_km);
            out.extend((1..steps).map(|i| prev.lerp(next, i as f64 / steps as f64)));
        }
        out.push(next);
    }

    out
}

/// Number of equal (lon, lat) steps needed so every piece fits the limit.
///
/// Equal steps in degree space are not exactly equal on the sphere when latitude
/// changes along the segment, so the first guess is bumped until all pieces fit.
fn steps_for(prev: Coordinate, next: Coordinate, distance: f64, max_segment_km: f64) -> usize {
    let mut steps = (distance / max_segment_km).ceil().max(1.0) as usize;
    let limit = steps.saturating_mul(2).max(steps + 1);

    while steps < limit && !pieces_fit(prev, next, steps, max_segment_km) {
        steps += 1;
    }
    steps
}

fn pieces_fit(prev: Coordinate, next: Coordinate, steps: usize, max_segment_km: f64) -> bool {
    let mut last = prev;
    (1..=steps).all(|i| {
        let point = prev.lerp(next, i as f64 / steps as f64);
        let fits = haversine_km(last, point) <= max_segment_km + LENGTH_TOLERANCE_KM;
        last = point;
        fits
    })
}
