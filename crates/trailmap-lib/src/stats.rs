//! Summary statistics of an elevation profile

use crate::profile::ElevationProfile;
use serde::{Deserialize, Serialize};

/// Figures shown next to the elevation chart
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileStats {
    /// Distance of the last sample, in kilometers
    pub total_distance_km: f64,
    pub min_elevation_m: f64,
    pub max_elevation_m: f64,
    /// Sum of all positive elevation changes
    pub total_ascent_m: f64,
    /// Sum of all negative elevation changes, as a positive number
    pub total_descent_m: f64,
    /// At least as many climbing segments as descending ones
    pub predominantly_uphill: bool,
    /// Mean slope angle over the predominant direction, in degrees (negative downhill)
    pub average_slope_deg: f64,
    /// Steepest slope angle in the predominant direction, in degrees (negative downhill)
    pub max_slope_deg: f64,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl ProfileStats {
    /// Compute statistics for `profile`; an empty profile yields all zeros
    pub fn from_profile(profile: &ElevationProfile) -> Self {
        let samples = profile.samples();
        if samples.is_empty() {
            return Self::default();
        }

        let (min_elevation_m, max_elevation_m) = samples.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY),
            |(lo, hi), s| (lo.min(s.elevation_meters), hi.max(s.elevation_meters)),
        );

        let mut total_ascent_m = 0.0;
        let mut total_descent_m = 0.0;
        let mut uphill = Vec::new();
        let mut downhill = Vec::new();

        for pair in samples.windows(2) {
            let rise = pair[1].elevation_meters - pair[0].elevation_meters;
            let run_m = (pair[1].distance_km - pair[0].distance_km) * 1000.0;
            let slope = slope_degrees(rise, run_m);

            if rise > 0.0 {
                total_ascent_m += rise;
                uphill.push(slope);
            } else if rise < 0.0 {
                total_descent_m -= rise;
                downhill.push(slope);
            }
        }

        let predominantly_uphill = uphill.len() >= downhill.len();
        let relevant = if predominantly_uphill { &uphill } else { &downhill };

        let (average_slope_deg, max_slope_deg) = if relevant.is_empty() {
            (0.0, 0.0)
        } else {
            let average = relevant.iter().sum::<f64>() / relevant.len() as f64;
            let steepest = if predominantly_uphill {
                relevant.iter().copied().fold(f64::NEG_INFINITY, f64::max)
            } else {
                relevant.iter().copied().fold(f64::INFINITY, f64::min)
            };
            (average, steepest)
        };

        Self {
            total_distance_km: profile.total_distance_km(),
            min_elevation_m,
            max_elevation_m,
            total_ascent_m,
            total_descent_m,
            predominantly_uphill,
            average_slope_deg,
            max_slope_deg,
        }
    }

    /// Difference between the highest and lowest sample
    #[inline]
    pub fn elevation_range_m(&self) -> f64 {
        self.max_elevation_m - self.min_elevation_m
    }
}

/// Slope angle of one segment in degrees, signed by the elevation change
fn slope_degrees(rise_m: f64, run_m: f64) -> f64 {
    let angle = rise_m.abs().atan2(run_m).to_degrees();
    if rise_m < 0.0 { -angle } else { angle }
}

impl From<&ElevationProfile> for ProfileStats {
    fn from(profile: &ElevationProfile) -> Self {
        Self::from_profile(profile)
    }
}
