//! Great-circle geometry for position tracking.
//!
//! This module provides the coordinate type shared by every tracking
//! component and the Haversine distance used to measure drift against an
//! anchor point.
//!
//! # Coordinate System
//!
//! - Latitude: degrees north (-90 to 90)
//! - Longitude: degrees east (-180 to 180)
//! - Distance: meters on a spherical Earth of radius 6,371,000 m
//!
//! Accuracy is bounded by the spherical approximation (~0.5%), which is far
//! below the error of a consumer positioning sensor.

use std::f64::consts::PI;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Degrees to radians conversion factor.
const DEG_TO_RAD: f64 = PI / 180.0;

/// Errors raised when a coordinate is outside the valid range.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeoError {
    /// Latitude or longitude is NaN, infinite, or out of range.
    #[error("Invalid coordinate: lat={lat}, lon={lon}")]
    InvalidCoordinate { lat: f64, lon: f64 },
}

/// A point on the Earth's surface in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    /// Create a validated coordinate.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::InvalidCoordinate`] when either component is not
    /// finite or lies outside `[-90, 90]` / `[-180, 180]`.
    pub fn new(lat: f64, lon: f64) -> Result<Self, GeoError> {
        let coord = Self { lat, lon };
        if coord.is_valid() {
            Ok(coord)
        } else {
            Err(GeoError::InvalidCoordinate { lat, lon })
        }
    }

    /// Check that both components are finite and within range.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }

    /// Distance in meters to another coordinate.
    #[inline]
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        distance_meters(self, other)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6},{:.6}", self.lat, self.lon)
    }
}

/// Great-circle distance between two coordinates in meters (Haversine).
///
/// Pure and symmetric; `distance_meters(p, p)` is exactly zero. Range
/// validation is the caller's responsibility (see [`Coordinate::new`]).
///
/// # Example
///
/// ```
/// use driftwatch::geo::{distance_meters, Coordinate};
///
/// let a = Coordinate { lat: -22.2700, lon: 166.4500 };
/// let b = Coordinate { lat: -22.2702, lon: 166.4502 };
/// let d = distance_meters(&a, &b);
/// assert!(d > 25.0 && d < 32.0);
/// ```
pub fn distance_meters(a: &Coordinate, b: &Coordinate) -> f64 {
    let lat1 = a.lat * DEG_TO_RAD;
    let lat2 = b.lat * DEG_TO_RAD;
    let dlat = (b.lat - a.lat) * DEG_TO_RAD;
    let dlon = (b.lon - a.lon) * DEG_TO_RAD;

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    // Clamp guards against rounding pushing h slightly above 1 for antipodes
    let c = 2.0 * h.sqrt().min(1.0).asin();

    EARTH_RADIUS_M * c
}
