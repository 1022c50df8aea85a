//! Great-circle math and the coordinate value type

use geo::{Coord, Point};
use serde::{Deserialize, Serialize};

/// Earth's radius in kilometers used for every distance in this crate
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A WGS84 position in degrees, longitude first
///
/// Serialized as a `[longitude, latitude]` pair, the same layout GeoJSON uses.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Coordinate {
    pub lon: f64,
    pub lat: f64,
}

impl Coordinate {
    #[inline]
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Linear interpolation in (longitude, latitude) space
    ///
    /// `fraction = 0.0` yields `self`, `fraction = 1.0` yields `other`.
    #[inline]
    pub fn lerp(self, other: Coordinate, fraction: f64) -> Coordinate {
        Coordinate {
            lon: self.lon + (other.lon - self.lon) * fraction,
            lat: self.lat + (other.lat - self.lat) * fraction,
        }
    }

    /// Whether both components are finite and within WGS84 bounds
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.lon.is_finite()
            && self.lat.is_finite()
            && (-180.0..=180.0).contains(&self.lon)
            && (-90.0..=90.0).contains(&self.lat)
    }
}

impl From<[f64; 2]> for Coordinate {
    fn from([lon, lat]: [f64; 2]) -> Self {
        Coordinate::new(lon, lat)
    }
}

impl From<Coordinate> for [f64; 2] {
    fn from(c: Coordinate) -> Self {
        [c.lon, c.lat]
    }
}

impl From<Coord<f64>> for Coordinate {
    fn from(c: Coord<f64>) -> Self {
        Coordinate::new(c.x, c.y)
    }
}

impl From<Coordinate> for Coord<f64> {
    fn from(c: Coordinate) -> Self {
        Coord { x: c.lon, y: c.lat }
    }
}

impl From<Point<f64>> for Coordinate {
    fn from(p: Point<f64>) -> Self {
        Coordinate::new(p.x(), p.y())
    }
}

impl From<Coordinate> for Point<f64> {
    fn from(c: Coordinate) -> Self {
        Point::new(c.lon, c.lat)
    }
}

/// Haversine distance between two coordinates in kilometers
#[inline]
pub fn haversine_km(start: Coordinate, end: Coordinate) -> f64 {
    let lat1 = start.lat.to_radians();
    let lat2 = end.lat.to_radians();
    let delta_lat = (end.lat - start.lat).to_radians();
    let delta_lon = (end.lon - start.lon).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Sum of haversine distances between consecutive points, in kilometers
///
/// Empty and single-point paths have length zero.
pub fn path_length_km(path: &[Coordinate]) -> f64 {
    path.windows(2).map(|w| haversine_km(w[0], w[1])).sum()
}
