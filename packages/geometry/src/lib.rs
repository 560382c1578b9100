#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Great-circle distance, polygon centroids and region boundary loading.
//!
//! Everything here is pure except [`boundaries::fetch_boundaries`] and
//! [`boundaries::load_boundaries_file`], which read a `GeoJSON`
//! `FeatureCollection` before the mapper runs.

pub mod boundaries;

use geo::{Area, Centroid, MultiPolygon};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use boundaries::{BoundaryFieldMapping, RegionBoundary};

/// Mean Earth radius used by [`distance_km`].
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Errors that can occur while loading boundary data.
#[derive(Debug, Error)]
pub enum GeometryError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Reading a local file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The document is not valid `GeoJSON`.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// Data conversion error.
    #[error("Conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lon: f64,
}

impl LatLon {
    /// Creates a coordinate pair.
    #[must_use]
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Haversine distance to `other` in kilometres.
    #[must_use]
    pub fn distance_km(self, other: Self) -> f64 {
        distance_km(self.lat, self.lon, other.lat, other.lon)
    }
}

/// Great-circle distance between two points using the haversine formula.
///
/// Symmetric in its arguments and zero for identical points.
#[must_use]
pub fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).max(0.0).sqrt());

    EARTH_RADIUS_KM * c
}

/// Area-weighted centroid of a polygon boundary.
///
/// Returns `None` for empty, zero-area or non-finite geometry; callers
/// treat that as "cannot place this region spatially".
#[must_use]
pub fn centroid(polygon: &MultiPolygon<f64>) -> Option<LatLon> {
    if polygon.0.is_empty() {
        return None;
    }

    let all_finite = polygon
        .iter()
        .flat_map(|p| p.exterior().coords())
        .all(|c| c.x.is_finite() && c.y.is_finite());
    if !all_finite {
        return None;
    }

    let area = polygon.unsigned_area();
    if !area.is_finite() || area <= 0.0 {
        return None;
    }

    let point = polygon.centroid()?;
    let (lon, lat) = (point.x(), point.y());
    if lat.is_finite() && lon.is_finite() {
        Some(LatLon::new(lat, lon))
    } else {
        None
    }
}
