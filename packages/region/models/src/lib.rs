#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Region identifier, per-region estimate and region table types.
//!
//! The [`RegionTable`] is the sole artifact handed to the presentation
//! layer: one [`RegionEstimate`] per resolved region, rebuilt wholesale on
//! every mapping run.

use std::collections::BTreeMap;
use std::fmt;

use aqi_map_aqi_models::{AqiCategory, AqiReading, Concentrations, Pollutant};
use chrono::{DateTime, Utc};
use serde::ser::SerializeMap as _;
use serde::{Serialize, Serializer};
use strum_macros::{Display, EnumString};

/// Identifier of a region in the boundary dataset.
///
/// Boundary datasets carry either string or numeric identifiers. Features
/// with no identifier at all (e.g. a river strip) are tagged with their
/// position in the source collection so they remain addressable.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RegionId {
    /// String identifier as found in the dataset.
    Code(String),
    /// Numeric identifier as found in the dataset.
    Number(i64),
    /// Feature without an identifier, by position in the source collection.
    Unassigned(usize),
}

impl RegionId {
    /// Whether the dataset supplied an identifier for this region.
    #[must_use]
    pub const fn is_assigned(&self) -> bool {
        !matches!(self, Self::Unassigned(_))
    }

    /// Whether a configuration key (always textual) refers to this region.
    ///
    /// Numeric ids match their decimal form, so `"12"` matches
    /// `RegionId::Number(12)` as well as `RegionId::Code("12")`.
    #[must_use]
    pub fn matches_key(&self, key: &str) -> bool {
        let key = key.trim();
        match self {
            Self::Code(code) => code.trim() == key,
            Self::Number(n) => key.parse::<i64>().is_ok_and(|k| k == *n),
            Self::Unassigned(_) => self.to_string() == key,
        }
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(code) => f.write_str(code),
            Self::Number(n) => write!(f, "{n}"),
            Self::Unassigned(position) => write!(f, "unassigned-{position}"),
        }
    }
}

impl Serialize for RegionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Code(code) => serializer.serialize_str(code),
            Self::Number(n) => serializer.serialize_i64(*n),
            Self::Unassigned(_) => serializer.serialize_str(&self.to_string()),
        }
    }
}

/// How an estimate's coverage was obtained.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum CoverageTier {
    /// Stations within the search radius.
    Local,
    /// Stations only within the extended radius.
    Extended,
    /// Averaged from neighboring regions.
    Neighbors,
    /// Carried over from the previous cycle.
    Retained,
}

/// Where the authoritative index value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum IndexSource {
    /// Computed from aggregated concentrations via breakpoint tables.
    Computed,
    /// Pre-computed index reported by the upstream provider.
    Provider,
    /// Averaged from neighboring regions' estimates.
    NeighborAverage,
}

/// Computed air quality estimate for one region.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionEstimate {
    /// Region identifier.
    pub region_id: RegionId,
    /// Display name from the boundary dataset.
    pub region_name: String,
    /// Overall index value.
    pub aqi: u32,
    /// Band for `aqi`.
    pub category: AqiCategory,
    /// Human-readable band label.
    pub category_label: String,
    /// Display color token for the band.
    pub color: String,
    /// Pollutant driving the index, if any pollutant was measured.
    pub dominant_pollutant: Option<Pollutant>,
    /// Aggregated concentrations. Unmeasured pollutants are absent.
    pub concentrations: Concentrations,
    /// Rounded sub-index per aggregated pollutant.
    pub sub_indices: BTreeMap<Pollutant, u32>,
    /// Number of stations (or neighbor regions) that contributed.
    pub station_count: usize,
    /// Closest contributing station id.
    pub nearest_station_id: Option<String>,
    /// Closest contributing station name.
    pub nearest_station_name: Option<String>,
    /// True distance to the closest contributing station.
    pub nearest_station_distance_km: Option<f64>,
    /// Most recent update among contributing readings.
    pub last_updated: Option<DateTime<Utc>>,
    /// `true` for neighbor-interpolated values.
    pub is_estimated: bool,
    /// How coverage was obtained.
    pub coverage: CoverageTier,
    /// Where the index value came from.
    pub index_source: IndexSource,
    /// Distinct attribution strings of contributing stations.
    pub attributions: Vec<String>,
}

impl RegionEstimate {
    /// Creates an estimate from a reading, leaving station metadata empty.
    #[must_use]
    pub fn from_reading(
        region_id: RegionId,
        region_name: impl Into<String>,
        reading: AqiReading,
        concentrations: Concentrations,
        coverage: CoverageTier,
        index_source: IndexSource,
    ) -> Self {
        Self {
            region_id,
            region_name: region_name.into(),
            aqi: reading.value,
            category: reading.category,
            category_label: reading.category.label().to_string(),
            color: reading.category.color().to_string(),
            dominant_pollutant: reading.dominant,
            concentrations,
            sub_indices: reading.sub_indices,
            station_count: 0,
            nearest_station_id: None,
            nearest_station_name: None,
            nearest_station_distance_km: None,
            last_updated: None,
            is_estimated: matches!(coverage, CoverageTier::Neighbors),
            coverage,
            index_source,
            attributions: Vec::new(),
        }
    }
}

/// Region-identifier-keyed table of estimates.
///
/// Serializes as a JSON object keyed by the region id's string form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionTable {
    entries: BTreeMap<RegionId, RegionEstimate>,
}

impl RegionTable {
    /// Creates an empty table.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Inserts an estimate keyed by its own region id, replacing any
    /// previous entry.
    pub fn insert(&mut self, estimate: RegionEstimate) {
        self.entries.insert(estimate.region_id.clone(), estimate);
    }

    /// Looks up the estimate for a region.
    #[must_use]
    pub fn get(&self, id: &RegionId) -> Option<&RegionEstimate> {
        self.entries.get(id)
    }

    /// Whether the region has an estimate.
    #[must_use]
    pub fn contains(&self, id: &RegionId) -> bool {
        self.entries.contains_key(id)
    }

    /// Iterates estimates in region id order.
    pub fn iter(&self) -> impl Iterator<Item = &RegionEstimate> {
        self.entries.values()
    }

    /// Number of regions with an estimate.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no estimates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Summarizes the table for logging and status displays.
    #[must_use]
    pub fn summary(&self) -> TableSummary {
        let mut summary = TableSummary::default();
        let mut total = 0u64;

        for estimate in self.iter() {
            summary.regions += 1;
            match estimate.coverage {
                CoverageTier::Local | CoverageTier::Extended => summary.direct += 1,
                CoverageTier::Neighbors => summary.estimated += 1,
                CoverageTier::Retained => summary.retained += 1,
            }
            *summary.by_category.entry(estimate.category).or_default() += 1;
            total += u64::from(estimate.aqi);

            if summary.worst_aqi.is_none_or(|worst| estimate.aqi > worst) {
                summary.worst_aqi = Some(estimate.aqi);
                summary.worst_region = Some(estimate.region_id.clone());
            }
        }

        if summary.regions > 0 {
            #[allow(clippy::cast_precision_loss)]
            let mean = total as f64 / summary.regions as f64;
            summary.mean_aqi = Some(mean);
        }

        summary
    }
}

impl FromIterator<RegionEstimate> for RegionTable {
    fn from_iter<T: IntoIterator<Item = RegionEstimate>>(iter: T) -> Self {
        let mut table = Self::new();
        for estimate in iter {
            table.insert(estimate);
        }
        table
    }
}

impl Serialize for RegionTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (id, estimate) in &self.entries {
            map.serialize_entry(&id.to_string(), estimate)?;
        }
        map.end()
    }
}

/// Aggregate statistics over a [`RegionTable`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSummary {
    /// Total regions with an estimate.
    pub regions: usize,
    /// Regions resolved from stations directly.
    pub direct: usize,
    /// Regions resolved from neighbors.
    pub estimated: usize,
    /// Regions carried over from a previous cycle.
    pub retained: usize,
    /// Mean index across all regions.
    pub mean_aqi: Option<f64>,
    /// Highest index in the table.
    pub worst_aqi: Option<u32>,
    /// Region with the highest index (first in id order on ties).
    pub worst_region: Option<RegionId>,
    /// Region count per category band.
    pub by_category: BTreeMap<AqiCategory, usize>,
}
