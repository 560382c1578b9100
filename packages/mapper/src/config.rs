//! Deployment and mapper configuration.
//!
//! Everything city-specific lives here as data: boundary property keys,
//! station and boundary sources, tuning constants and the per-region
//! neighbor override table. The mapping algorithm itself stays generic.

use std::path::{Path, PathBuf};
use std::time::Duration;

use aqi_map_geometry::{BoundaryFieldMapping, GeometryError, RegionBoundary, boundaries};
use aqi_map_station::feed::{FileStationFeed, HttpStationFeed, StationFeed};
use aqi_map_station::{DEFAULT_IDW_EPSILON_KM, NameMatchBias, RankedStation};
use aqi_map_station_models::Station;
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// A deployment: one city's boundary dataset, station feed and mapper
/// tuning, deserialized from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentConfig {
    /// Unique deployment identifier (e.g. `"riverside"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Seconds between refresh cycles.
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    /// Where region boundaries come from.
    pub boundaries: BoundarySource,
    /// Which boundary properties carry id and name.
    pub fields: BoundaryFieldMapping,
    /// Where station readings come from.
    pub stations: StationSource,
    /// Mapper tuning and overrides.
    #[serde(default)]
    pub mapper: MapperConfig,
}

const fn default_refresh_interval_secs() -> u64 {
    900
}

impl DeploymentConfig {
    /// Parses and validates a deployment from TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the TOML is malformed or a parameter is
    /// out of range.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::de::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a deployment TOML file from disk.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or is invalid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let body = std::fs::read_to_string(path)?;
        Self::from_toml_str(&body)
    }

    /// Checks every parameter.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.id.trim().is_empty() {
            return Err(ConfigError::invalid("deployment id is empty"));
        }
        if self.refresh_interval_secs == 0 {
            return Err(ConfigError::invalid(format!(
                "{}: refresh_interval_secs must be positive",
                self.id
            )));
        }
        if self.fields.id.is_empty() || self.fields.name.is_empty() {
            return Err(ConfigError::invalid(format!(
                "{}: boundary field mapping has an empty property key",
                self.id
            )));
        }
        self.mapper.validate()
    }

    /// Refresh interval as a [`Duration`].
    #[must_use]
    pub const fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Loads this deployment's region boundaries.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError`] if the source cannot be read or parsed.
    pub async fn load_boundaries(
        &self,
        client: &reqwest::Client,
    ) -> Result<Vec<RegionBoundary>, GeometryError> {
        match &self.boundaries {
            BoundarySource::File { path } => boundaries::load_boundaries_file(path, &self.fields),
            BoundarySource::GeojsonUrl { url } => {
                boundaries::fetch_boundaries(client, url, &self.fields).await
            }
        }
    }

    /// Builds the station feed for this deployment.
    #[must_use]
    pub fn station_feed(&self, client: &reqwest::Client) -> Box<dyn StationFeed> {
        match &self.stations {
            StationSource::File { path } => Box::new(FileStationFeed::new(path.clone())),
            StationSource::Http { url } => Box::new(HttpStationFeed::new(client.clone(), url)),
        }
    }
}

/// How to obtain region boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BoundarySource {
    /// Local `GeoJSON` file, relative paths resolved from the working
    /// directory.
    File {
        /// Path to the `FeatureCollection`.
        path: PathBuf,
    },
    /// URL returning a `GeoJSON` `FeatureCollection`.
    GeojsonUrl {
        /// Full URL.
        url: String,
    },
}

/// How to obtain station readings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StationSource {
    /// Local JSON file, re-read every cycle.
    File {
        /// Path to the station payload.
        path: PathBuf,
    },
    /// HTTP endpoint returning the station payload.
    Http {
        /// Full URL.
        url: String,
    },
}

/// Prefer an upstream provider's pre-computed index over recomputing one.
///
/// Applied uniformly: whenever any contributing station carries a
/// positive provider index, the best-ranked such station's index is the
/// region's authoritative value. Raw concentrations are still aggregated
/// for display and the dominant pollutant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderIndexPriority {
    /// Whether provider indices take precedence.
    pub enabled: bool,
}

impl Default for ProviderIndexPriority {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl ProviderIndexPriority {
    /// Picks the provider index to use for a ranked station list.
    #[must_use]
    pub fn select<'a>(&self, ranked: &[RankedStation<'a>]) -> Option<(u32, &'a Station)> {
        if !self.enabled {
            return None;
        }
        ranked.iter().find_map(|r| {
            r.station
                .provider_index
                .filter(|index| *index > 0)
                .map(|index| (index, r.station))
        })
    }
}

/// Deployment-specific handling for one region.
///
/// Matches a region by identifier or, for regions without one (e.g. a
/// river strip), by display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionOverride {
    /// Region identifier key.
    #[serde(default)]
    pub id: Option<String>,
    /// Region display name, matched case-insensitively.
    #[serde(default)]
    pub name: Option<String>,
    /// Identifier keys of the regions to average in the fallback pass.
    #[serde(default)]
    pub neighbors: Vec<String>,
    /// Skip the direct pass even when a station is in range.
    #[serde(default)]
    pub defer_direct: bool,
}

impl RegionOverride {
    /// Whether this override targets `region`.
    #[must_use]
    pub fn applies_to(&self, region: &RegionBoundary) -> bool {
        let id_match = self
            .id
            .as_deref()
            .is_some_and(|key| region.id.matches_key(key));
        let name_match = self
            .name
            .as_deref()
            .zip(region.source_name())
            .is_some_and(|(name, region_name)| {
                name.trim().eq_ignore_ascii_case(region_name.trim())
            });
        id_match || name_match
    }
}

/// Tuning parameters for the region mapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    /// Radius for the direct pass.
    pub search_radius_km: f64,
    /// Wider radius tried when nothing is within `search_radius_km`.
    pub extended_radius_km: f64,
    /// Additive term in the inverse-distance weight denominator.
    pub idw_epsilon_km: f64,
    /// How many nearest resolved regions to average in the fallback pass.
    pub fallback_neighbor_count: usize,
    /// Station-name ranking bias.
    pub name_match: NameMatchBias,
    /// Provider index precedence.
    pub provider_index: ProviderIndexPriority,
    /// Per-region overrides.
    pub overrides: Vec<RegionOverride>,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            search_radius_km: 5.0,
            extended_radius_km: 15.0,
            idw_epsilon_km: DEFAULT_IDW_EPSILON_KM,
            fallback_neighbor_count: 3,
            name_match: NameMatchBias::default(),
            provider_index: ProviderIndexPriority::default(),
            overrides: Vec::new(),
        }
    }
}

impl MapperConfig {
    /// Checks every parameter.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.search_radius_km.is_finite() && self.search_radius_km > 0.0) {
            return Err(ConfigError::invalid("search_radius_km must be positive"));
        }
        if !(self.extended_radius_km.is_finite()
            && self.extended_radius_km >= self.search_radius_km)
        {
            return Err(ConfigError::invalid(
                "extended_radius_km must be at least search_radius_km",
            ));
        }
        if !(self.idw_epsilon_km.is_finite() && self.idw_epsilon_km > 0.0) {
            return Err(ConfigError::invalid("idw_epsilon_km must be positive"));
        }
        if self.fallback_neighbor_count == 0 {
            return Err(ConfigError::invalid(
                "fallback_neighbor_count must be at least 1",
            ));
        }
        let factor = self.name_match.discount_factor;
        if !(factor.is_finite() && factor > 0.0 && factor <= 1.0) {
            return Err(ConfigError::invalid(
                "name_match.discount_factor must be in (0, 1]",
            ));
        }
        for (i, region) in self.overrides.iter().enumerate() {
            if region.id.is_none() && region.name.is_none() {
                return Err(ConfigError::invalid(format!(
                    "override {i} names neither an id nor a name"
                )));
            }
        }
        Ok(())
    }

    /// First override targeting `region`, if any.
    #[must_use]
    pub fn override_for(&self, region: &RegionBoundary) -> Option<&RegionOverride> {
        self.overrides.iter().find(|o| o.applies_to(region))
    }
}
