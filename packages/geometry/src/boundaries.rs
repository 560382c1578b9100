//! Region boundary loading from `GeoJSON` feature collections.
//!
//! Property keys for the region identifier and display name differ per
//! city, so they come from a [`BoundaryFieldMapping`] rather than being
//! hard-coded. Features are never dropped: a feature without an
//! identifier becomes [`RegionId::Unassigned`], and a feature whose
//! geometry cannot be used keeps `polygon: None` so it can still be
//! resolved from its neighbors.

use std::path::Path;

use aqi_map_region_models::RegionId;
use geo::MultiPolygon;
use geojson::{Feature, GeoJson};
use serde::{Deserialize, Serialize};

use crate::{GeometryError, LatLon, centroid};

/// Which feature properties carry the region identifier and name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundaryFieldMapping {
    /// Property holding the region identifier (string or number).
    pub id: String,
    /// Property holding the display name.
    pub name: String,
}

/// A region polygon with its identifier and precomputed centroid.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionBoundary {
    /// Region identifier.
    pub id: RegionId,
    /// Display name. Falls back to the identifier when the dataset has none.
    pub name: String,
    /// Whether `name` came from the dataset rather than the fallback.
    pub named: bool,
    /// Boundary geometry, `None` when the source geometry was unusable.
    pub polygon: Option<MultiPolygon<f64>>,
    /// Representative point, `None` when the geometry is missing or
    /// degenerate.
    pub centroid: Option<LatLon>,
}

impl RegionBoundary {
    /// Creates a boundary and computes its centroid.
    #[must_use]
    pub fn new(
        id: RegionId,
        name: impl Into<String>,
        polygon: Option<MultiPolygon<f64>>,
    ) -> Self {
        let centroid = polygon.as_ref().and_then(centroid);
        Self {
            id,
            name: name.into(),
            named: true,
            polygon,
            centroid,
        }
    }

    /// Creates a boundary whose dataset carried no display name. The
    /// identifier stands in as the display name.
    #[must_use]
    pub fn unnamed(id: RegionId, polygon: Option<MultiPolygon<f64>>) -> Self {
        let name = id.to_string();
        Self {
            named: false,
            ..Self::new(id, name, polygon)
        }
    }

    /// The dataset-supplied name, if there was one.
    #[must_use]
    pub fn source_name(&self) -> Option<&str> {
        self.named.then_some(self.name.as_str())
    }
}

/// Parses a `GeoJSON` `FeatureCollection` into region boundaries.
///
/// # Errors
///
/// Returns [`GeometryError`] if the document is not valid `GeoJSON` or is
/// not a `FeatureCollection`. Individual malformed features never fail the
/// whole parse.
pub fn parse_boundaries(
    geojson_str: &str,
    fields: &BoundaryFieldMapping,
) -> Result<Vec<RegionBoundary>, GeometryError> {
    let geojson: GeoJson = geojson_str.parse()?;

    let GeoJson::FeatureCollection(collection) = geojson else {
        return Err(GeometryError::Conversion {
            message: "Boundary document is not a FeatureCollection".to_string(),
        });
    };

    let boundaries: Vec<RegionBoundary> = collection
        .features
        .iter()
        .enumerate()
        .map(|(position, feature)| normalize_feature(position, feature, fields))
        .collect();

    let unplaced = boundaries.iter().filter(|b| b.centroid.is_none()).count();
    let unassigned = boundaries.iter().filter(|b| !b.id.is_assigned()).count();
    log::info!(
        "Parsed {} boundaries ({unassigned} without identifier, {unplaced} without usable geometry)",
        boundaries.len()
    );

    Ok(boundaries)
}

/// Reads and parses a boundary file from disk.
///
/// # Errors
///
/// Returns [`GeometryError`] if the file cannot be read or parsed.
pub fn load_boundaries_file(
    path: &Path,
    fields: &BoundaryFieldMapping,
) -> Result<Vec<RegionBoundary>, GeometryError> {
    log::info!("Loading boundaries from {}", path.display());
    let body = std::fs::read_to_string(path)?;
    parse_boundaries(&body, fields)
}

/// Fetches and parses a boundary `FeatureCollection` from a URL.
///
/// # Errors
///
/// Returns [`GeometryError`] if the request fails, returns a non-success
/// status, or the body cannot be parsed.
pub async fn fetch_boundaries(
    client: &reqwest::Client,
    url: &str,
    fields: &BoundaryFieldMapping,
) -> Result<Vec<RegionBoundary>, GeometryError> {
    log::info!("Fetching boundaries from {url}");
    let resp = client.get(url).send().await?;
    if !resp.status().is_success() {
        return Err(GeometryError::Conversion {
            message: format!("Boundary request failed with status {}", resp.status()),
        });
    }
    let body = resp.text().await?;
    parse_boundaries(&body, fields)
}

fn normalize_feature(
    position: usize,
    feature: &Feature,
    fields: &BoundaryFieldMapping,
) -> RegionBoundary {
    let id = feature
        .property(&fields.id)
        .and_then(region_id_from_value)
        .unwrap_or(RegionId::Unassigned(position));

    let name = feature
        .property(&fields.name)
        .and_then(|v| match v {
            serde_json::Value::String(s) => Some(s.trim().to_string()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .filter(|s| !s.is_empty());

    let polygon = feature.geometry.clone().and_then(|geom| {
        let geo_geom: geo::Geometry<f64> = geom.try_into().ok()?;
        match geo_geom {
            geo::Geometry::MultiPolygon(mp) => Some(mp),
            geo::Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
            _ => None,
        }
    });

    let boundary = match name {
        Some(name) => RegionBoundary::new(id, name, polygon),
        None => RegionBoundary::unnamed(id, polygon),
    };
    if boundary.centroid.is_none() {
        log::warn!(
            "Boundary {} ({}) has no usable geometry",
            boundary.id,
            boundary.name
        );
    }
    boundary
}

fn region_id_from_value(value: &serde_json::Value) -> Option<RegionId> {
    match value {
        serde_json::Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| RegionId::Code(trimmed.to_string()))
        }
        serde_json::Value::Number(n) => n.as_i64().map(RegionId::Number).or_else(|| {
            let f = n.as_f64()?;
            #[allow(clippy::cast_possible_truncation)]
            let whole = f as i64;
            #[allow(clippy::cast_precision_loss)]
            let exact = (whole as f64 - f).abs() < f64::EPSILON;
            Some(if exact {
                RegionId::Number(whole)
            } else {
                RegionId::Code(n.to_string())
            })
        }),
        _ => None,
    }
}
