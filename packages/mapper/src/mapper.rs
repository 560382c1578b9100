//! The two-pass region mapping run.
//!
//! The direct pass resolves every identified, placeable region with an
//! informative station in range. The fallback pass then fills the rest
//! by averaging already-resolved regions: the three (configurable)
//! nearest direct results by centroid, or an explicit neighbor list from
//! the deployment's override table. Regions neither pass can resolve are
//! reported in [`MappingOutcome::unresolved`] instead of being dropped
//! silently.

use std::collections::BTreeSet;

use aqi_map_aqi::{compute_index, round_index};
use aqi_map_aqi_models::{Concentrations, Pollutant};
use aqi_map_geometry::{LatLon, RegionBoundary};
use aqi_map_region_models::{CoverageTier, IndexSource, RegionEstimate, RegionId, RegionTable};
use aqi_map_station::{RankedStation, StationLocator, aggregate};
use aqi_map_station_models::Station;
use serde::Serialize;
use strum_macros::Display;

use crate::config::{MapperConfig, RegionOverride};

/// Why a region has no estimate this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum UnresolvedReason {
    /// No usable centroid and no explicit neighbor list to fall back on.
    NoPosition,
    /// No resolved region was available to borrow from.
    NoNeighbors,
}

/// A region left out of the output table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnresolvedRegion {
    /// Region identifier.
    pub region_id: RegionId,
    /// Display name.
    pub region_name: String,
    /// Why neither pass could resolve it.
    pub reason: UnresolvedReason,
}

/// Result of one mapping run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappingOutcome {
    /// One estimate per resolved region.
    pub table: RegionTable,
    /// Regions with no estimate, in boundary order.
    pub unresolved: Vec<UnresolvedRegion>,
}

impl MappingOutcome {
    /// Carries forward the previous cycle's sensor-derived value for every
    /// identified region this run could not resolve.
    ///
    /// Carried entries keep their values and are marked
    /// [`CoverageTier::Retained`]. Neighbor-interpolated values are never
    /// carried. Returns the number of regions retained.
    pub fn retain_from(&mut self, previous: &RegionTable) -> usize {
        let table = &mut self.table;
        let mut retained = 0;

        self.unresolved.retain(|region| {
            if !region.region_id.is_assigned() {
                return true;
            }
            let Some(last) = previous.get(&region.region_id) else {
                return true;
            };
            if last.is_estimated {
                return true;
            }

            log::warn!(
                "Retaining previous value {} for unresolved region {} ({})",
                last.aqi,
                region.region_id,
                region.region_name
            );
            let mut carried = last.clone();
            carried.coverage = CoverageTier::Retained;
            table.insert(carried);
            retained += 1;
            false
        });

        retained
    }
}

/// Maps a boundary set and one station snapshot to a region table.
///
/// Holds only configuration; every [`map`](Self::map) call builds a fresh
/// table and never mutates its inputs.
#[derive(Debug, Clone, Default)]
pub struct RegionMapper {
    config: MapperConfig,
}

impl RegionMapper {
    /// Creates a mapper with the given tuning.
    #[must_use]
    pub const fn new(config: MapperConfig) -> Self {
        Self { config }
    }

    /// The mapper's configuration.
    #[must_use]
    pub const fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// Runs the direct and fallback passes over `regions`.
    #[must_use]
    pub fn map(&self, regions: &[RegionBoundary], stations: &[Station]) -> MappingOutcome {
        let locator = StationLocator::new(stations);
        let mut table = RegionTable::new();
        let mut pending = Vec::new();
        let mut anchors: Vec<(LatLon, RegionId)> = Vec::new();

        for region in regions {
            match self.resolve_direct(region, &locator) {
                Some(estimate) => {
                    if table.contains(&estimate.region_id) {
                        log::warn!("Duplicate region id {} in boundary set", region.id);
                    } else if let Some(centroid) = region.centroid {
                        anchors.push((centroid, region.id.clone()));
                    }
                    table.insert(estimate);
                }
                None => pending.push(region),
            }
        }

        let direct = table.len();
        let mut unresolved = Vec::new();
        let mut listed = Vec::new();

        for region in pending {
            // Another feature with the same id already has a sensor value
            if table.contains(&region.id) {
                log::debug!(
                    "Keeping direct estimate for {} ({}) over uncovered part",
                    region.id,
                    region.name
                );
                continue;
            }
            if let Some(explicit) = self
                .config
                .override_for(region)
                .filter(|o| !o.neighbors.is_empty())
            {
                listed.push((region, explicit));
                continue;
            }
            match self.resolve_nearest(region, &anchors, &table) {
                Ok(estimate) => table.insert(estimate),
                Err(reason) => unresolved.push(unresolved_region(region, reason)),
            }
        }

        for region in self.resolve_listed(listed, &mut table) {
            match self.resolve_nearest(region, &anchors, &table) {
                Ok(estimate) => table.insert(estimate),
                Err(reason) => unresolved.push(unresolved_region(region, reason)),
            }
        }

        for region in &unresolved {
            log::warn!(
                "Region {} ({}) unresolved: {}",
                region.region_id,
                region.region_name,
                region.reason
            );
        }
        log::info!(
            "Mapped {} of {} regions from {} stations ({direct} direct, {} estimated, {} unresolved)",
            table.len(),
            regions.len(),
            locator.len(),
            table.len() - direct,
            unresolved.len()
        );

        MappingOutcome { table, unresolved }
    }

    /// Direct pass for one region. `None` defers it to the fallback pass.
    fn resolve_direct(
        &self,
        region: &RegionBoundary,
        locator: &StationLocator<'_>,
    ) -> Option<RegionEstimate> {
        if !region.id.is_assigned() {
            log::debug!("Deferring {}: no identifier", region.name);
            return None;
        }
        if self
            .config
            .override_for(region)
            .is_some_and(|o| o.defer_direct)
        {
            log::debug!("Deferring {} ({}): override", region.id, region.name);
            return None;
        }
        let Some(centroid) = region.centroid else {
            log::debug!("Deferring {} ({}): no centroid", region.id, region.name);
            return None;
        };

        let tiers = [
            (self.config.search_radius_km, CoverageTier::Local),
            (self.config.extended_radius_km, CoverageTier::Extended),
        ];
        let (ranked, coverage) = tiers.into_iter().find_map(|(radius, tier)| {
            let ranked: Vec<RankedStation<'_>> = locator
                .find_nearby(
                    centroid,
                    radius,
                    region.source_name(),
                    &self.config.name_match,
                )
                .into_iter()
                .filter(|r| is_informative(r.station))
                .collect();
            (!ranked.is_empty()).then_some((ranked, tier))
        })?;

        let concentrations = aggregate(&ranked, self.config.idw_epsilon_km);
        let mut reading = compute_index(&concentrations);
        let mut source = IndexSource::Computed;

        if let Some((index, station)) = self.config.provider_index.select(&ranked) {
            log::debug!(
                "{}: provider index {index} from {} replaces computed {}",
                region.id,
                station.id,
                reading.value
            );
            reading = reading.with_value(index);
            source = IndexSource::Provider;
        }

        let mut estimate = RegionEstimate::from_reading(
            region.id.clone(),
            &region.name,
            reading,
            concentrations,
            coverage,
            source,
        );
        estimate.station_count = ranked.len();
        if let Some(nearest) = ranked
            .iter()
            .min_by(|a, b| a.distance_km.total_cmp(&b.distance_km))
        {
            estimate.nearest_station_id = Some(nearest.station.id.clone());
            estimate.nearest_station_name.clone_from(&nearest.station.name);
            estimate.nearest_station_distance_km = Some(nearest.distance_km);
        }
        estimate.last_updated = ranked.iter().filter_map(|r| r.station.last_updated).max();
        estimate.attributions =
            distinct(ranked.iter().filter_map(|r| r.station.attribution.as_deref()));

        Some(estimate)
    }

    /// Averages the nearest direct results by centroid distance.
    fn resolve_nearest(
        &self,
        region: &RegionBoundary,
        anchors: &[(LatLon, RegionId)],
        table: &RegionTable,
    ) -> Result<RegionEstimate, UnresolvedReason> {
        let Some(centroid) = region.centroid else {
            return Err(UnresolvedReason::NoPosition);
        };

        let mut by_distance: Vec<(f64, &RegionId)> = anchors
            .iter()
            .filter(|(_, id)| *id != region.id)
            .map(|(c, id)| (centroid.distance_km(*c), id))
            .collect();
        by_distance.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(b.1)));

        let neighbors: Vec<&RegionEstimate> = by_distance
            .into_iter()
            .take(self.config.fallback_neighbor_count)
            .filter_map(|(_, id)| table.get(id))
            .collect();

        if neighbors.is_empty() {
            return Err(UnresolvedReason::NoNeighbors);
        }
        log::debug!(
            "{} ({}): averaging {} nearest regions",
            region.id,
            region.name,
            neighbors.len()
        );
        Ok(average_neighbors(region, &neighbors))
    }

    /// Resolves regions with an explicit neighbor list, repeating until a
    /// round makes no progress so listed regions can build on each other.
    /// Returns the regions still unresolved.
    fn resolve_listed<'r>(
        &self,
        mut waiting: Vec<(&'r RegionBoundary, &RegionOverride)>,
        table: &mut RegionTable,
    ) -> Vec<&'r RegionBoundary> {
        loop {
            let before = waiting.len();
            let mut blocked = Vec::new();

            for (region, explicit) in waiting {
                let neighbors: Vec<&RegionEstimate> = table
                    .iter()
                    .filter(|e| e.region_id != region.id)
                    .filter(|e| explicit.neighbors.iter().any(|k| e.region_id.matches_key(k)))
                    .collect();

                if neighbors.is_empty() {
                    blocked.push((region, explicit));
                    continue;
                }
                log::debug!(
                    "{} ({}): averaging {} listed neighbors",
                    region.id,
                    region.name,
                    neighbors.len()
                );
                let estimate = average_neighbors(region, &neighbors);
                table.insert(estimate);
            }

            if blocked.is_empty() || blocked.len() == before {
                if !blocked.is_empty() {
                    log::debug!(
                        "{} regions have no resolved listed neighbors",
                        blocked.len()
                    );
                }
                return blocked.into_iter().map(|(region, _)| region).collect();
            }
            waiting = blocked;
        }
    }
}

/// Whether a station can contribute anything to an estimate.
fn is_informative(station: &Station) -> bool {
    !station.concentrations.is_empty() || station.provider_index.is_some()
}

/// Builds a neighbor-interpolated estimate.
///
/// Each pollutant is the plain mean over the neighbors reporting it, and
/// the index is recomputed from that set. When no neighbor carries any
/// concentration (provider-index-only coverage) the index is the mean of
/// the neighbors' index values.
#[allow(clippy::cast_precision_loss)]
fn average_neighbors(region: &RegionBoundary, neighbors: &[&RegionEstimate]) -> RegionEstimate {
    let concentrations: Concentrations = Pollutant::all()
        .iter()
        .filter_map(|&pollutant| {
            let values: Vec<f64> = neighbors
                .iter()
                .filter_map(|n| n.concentrations.get(pollutant))
                .collect();
            (!values.is_empty())
                .then(|| (pollutant, values.iter().sum::<f64>() / values.len() as f64))
        })
        .collect();

    let mut reading = compute_index(&concentrations);
    if concentrations.is_empty() {
        let mean =
            neighbors.iter().map(|n| f64::from(n.aqi)).sum::<f64>() / neighbors.len() as f64;
        reading = reading.with_value(round_index(mean));
    }

    let mut estimate = RegionEstimate::from_reading(
        region.id.clone(),
        &region.name,
        reading,
        concentrations,
        CoverageTier::Neighbors,
        IndexSource::NeighborAverage,
    );
    estimate.station_count = neighbors.len();
    estimate.last_updated = neighbors.iter().filter_map(|n| n.last_updated).max();
    estimate.attributions = distinct(
        neighbors
            .iter()
            .flat_map(|n| n.attributions.iter().map(String::as_str)),
    );
    estimate
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    values
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn unresolved_region(region: &RegionBoundary, reason: UnresolvedReason) -> UnresolvedRegion {
    UnresolvedRegion {
        region_id: region.id.clone(),
        region_name: region.name.clone(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use aqi_map_aqi_models::AqiCategory;
    use aqi_map_geometry::boundaries::parse_boundaries;
    use aqi_map_station::NameMatchBias;
    use aqi_map_station::feed::parse_stations;
    use geo::{MultiPolygon, polygon};

    use super::*;
    use crate::config::ProviderIndexPriority;
    use crate::registry::find_deployment;

    /// Square region of side `size` degrees centred on `(lat, lon)`.
    fn square(id: i64, name: &str, lat: f64, lon: f64, size: f64) -> RegionBoundary {
        let h = size / 2.0;
        let poly = polygon![
            (x: lon - h, y: lat - h),
            (x: lon + h, y: lat - h),
            (x: lon + h, y: lat + h),
            (x: lon - h, y: lat + h),
            (x: lon - h, y: lat - h),
        ];
        RegionBoundary::new(RegionId::Number(id), name, Some(MultiPolygon(vec![poly])))
    }

    fn config(search: f64, extended: f64) -> MapperConfig {
        MapperConfig {
            search_radius_km: search,
            extended_radius_km: extended,
            ..MapperConfig::default()
        }
    }

    /// Regions A, B, C in a line, 0.2 degrees (about 22 km) apart.
    fn line_of_three() -> Vec<RegionBoundary> {
        vec![
            square(1, "A", 28.4, 77.2, 0.02),
            square(2, "B", 28.6, 77.2, 0.02),
            square(3, "C", 28.8, 77.2, 0.02),
        ]
    }

    fn station_at(id: &str, region: &RegionBoundary) -> Station {
        let c = region.centroid.unwrap();
        Station::new(id, c.lat, c.lon)
    }

    #[test]
    fn single_station_resolves_line_of_three() {
        let regions = line_of_three();
        let stations = vec![station_at("s", &regions[1]).with_reading(Pollutant::Pm25, 80.0)];

        let outcome = RegionMapper::new(config(5.0, 10.0)).map(&regions, &stations);
        assert!(outcome.unresolved.is_empty());
        assert_eq!(outcome.table.len(), 3);

        let b = outcome.table.get(&RegionId::Number(2)).unwrap();
        assert_eq!(b.aqi, 167);
        assert_eq!(b.category, AqiCategory::Moderate);
        assert_eq!(b.dominant_pollutant, Some(Pollutant::Pm25));
        assert!(!b.is_estimated);
        assert_eq!(b.coverage, CoverageTier::Local);
        assert_eq!(b.nearest_station_id.as_deref(), Some("s"));
        assert!(b.nearest_station_distance_km.unwrap() < 0.01);

        for id in [1, 3] {
            let estimate = outcome.table.get(&RegionId::Number(id)).unwrap();
            assert!(estimate.is_estimated);
            assert_eq!(estimate.coverage, CoverageTier::Neighbors);
            assert_eq!(estimate.aqi, b.aqi);
            assert_eq!(estimate.concentrations, b.concentrations);
            assert_eq!(estimate.dominant_pollutant, b.dominant_pollutant);
            assert_eq!(estimate.station_count, 1);
            assert_eq!(estimate.nearest_station_id, None);
        }
    }

    #[test]
    fn uncovered_part_keeps_direct_estimate_for_shared_id() {
        let regions = vec![
            square(1, "Ward 1", 28.6, 77.2, 0.01),
            square(2, "Ward 2", 28.6, 77.3, 0.01),
            // Detached part of ward 1, about 33 km away from both
            square(1, "Ward 1", 28.9, 77.2, 0.01),
        ];
        let stations = vec![
            station_at("a", &regions[0]).with_reading(Pollutant::Pm25, 80.0),
            station_at("b", &regions[1]).with_reading(Pollutant::Pm25, 10.0),
        ];

        let outcome = RegionMapper::new(config(1.0, 1.0)).map(&regions, &stations);
        assert!(outcome.unresolved.is_empty());
        assert_eq!(outcome.table.len(), 2);

        let ward = outcome.table.get(&RegionId::Number(1)).unwrap();
        assert_eq!(ward.coverage, CoverageTier::Local);
        assert_eq!(ward.aqi, 167);
        assert!(!ward.is_estimated);
    }

    #[test]
    fn unnamed_region_gets_no_name_discount() {
        let region = RegionBoundary::unnamed(
            RegionId::Number(14),
            square(14, "", 28.7, 77.1, 0.02).polygon,
        );
        let c = region.centroid.unwrap();
        let stations = vec![
            Station::new("closer", c.lat + 0.018, c.lon)
                .with_name("Depot")
                .with_reading(Pollutant::Pm25, 30.0),
            Station::new("numbered", c.lat + 0.027, c.lon)
                .with_name("Sector 14")
                .with_reading(Pollutant::Pm25, 90.0),
        ];

        let outcome = RegionMapper::new(config(5.0, 10.0)).map(&[region], &stations);
        let estimate = outcome.table.get(&RegionId::Number(14)).unwrap();
        assert_eq!(estimate.station_count, 2);
        assert!(estimate.concentrations.get(Pollutant::Pm25).unwrap() < 60.0);
    }

    #[test]
    fn extended_radius_resolves_directly() {
        let regions = line_of_three();
        let c = regions[1].centroid.unwrap();
        // About 8 km north of B
        let stations =
            vec![Station::new("s", c.lat + 0.072, c.lon).with_reading(Pollutant::Pm10, 120.0)];

        let outcome = RegionMapper::new(config(5.0, 10.0)).map(&regions, &stations);
        let b = outcome.table.get(&RegionId::Number(2)).unwrap();
        assert_eq!(b.coverage, CoverageTier::Extended);
        assert!(!b.is_estimated);
    }

    #[test]
    fn no_stations_in_range_leaves_everything_unresolved() {
        let regions = line_of_three();
        let stations = vec![Station::new("far", 10.0, 10.0).with_reading(Pollutant::Pm25, 80.0)];

        let outcome = RegionMapper::new(config(5.0, 10.0)).map(&regions, &stations);
        assert!(outcome.table.is_empty());
        assert_eq!(outcome.unresolved.len(), 3);
        assert!(
            outcome
                .unresolved
                .iter()
                .all(|u| u.reason == UnresolvedReason::NoNeighbors)
        );
    }

    #[test]
    fn stations_without_data_are_ignored() {
        let regions = line_of_three();
        let stations = vec![
            station_at("empty", &regions[0]),
            station_at("s", &regions[1]).with_reading(Pollutant::Pm25, 80.0),
        ];

        let outcome = RegionMapper::new(config(5.0, 10.0)).map(&regions, &stations);
        let a = outcome.table.get(&RegionId::Number(1)).unwrap();
        assert!(a.is_estimated);
        assert_eq!(a.aqi, 167);
    }

    #[test]
    fn provider_index_takes_precedence_when_enabled() {
        let regions = line_of_three();
        let stations = vec![
            station_at("s", &regions[1])
                .with_reading(Pollutant::Pm25, 80.0)
                .with_provider_index(250),
        ];

        let outcome = RegionMapper::new(config(5.0, 10.0)).map(&regions, &stations);
        let b = outcome.table.get(&RegionId::Number(2)).unwrap();
        assert_eq!(b.aqi, 250);
        assert_eq!(b.category, AqiCategory::Poor);
        assert_eq!(b.index_source, IndexSource::Provider);
        assert_eq!(b.concentrations.get(Pollutant::Pm25), Some(80.0));
        assert_eq!(b.dominant_pollutant, Some(Pollutant::Pm25));

        let disabled = MapperConfig {
            provider_index: ProviderIndexPriority { enabled: false },
            ..config(5.0, 10.0)
        };
        let outcome = RegionMapper::new(disabled).map(&regions, &stations);
        let b = outcome.table.get(&RegionId::Number(2)).unwrap();
        assert_eq!(b.aqi, 167);
        assert_eq!(b.index_source, IndexSource::Computed);
    }

    #[test]
    fn provider_only_neighbors_average_index_values() {
        let regions = line_of_three();
        let stations = vec![
            station_at("a", &regions[0]).with_provider_index(100),
            station_at("c", &regions[2]).with_provider_index(200),
        ];

        let outcome = RegionMapper::new(config(5.0, 10.0)).map(&regions, &stations);
        let b = outcome.table.get(&RegionId::Number(2)).unwrap();
        assert!(b.is_estimated);
        assert_eq!(b.aqi, 150);
        assert_eq!(b.dominant_pollutant, None);
        assert_eq!(b.station_count, 2);
    }

    #[test]
    fn name_matched_station_wins_nearest() {
        let region = square(1, "Rohini", 28.7, 77.1, 0.02);
        let c = region.centroid.unwrap();
        let stations = vec![
            Station::new("closer", c.lat + 0.018, c.lon)
                .with_name("Depot")
                .with_reading(Pollutant::Pm25, 30.0),
            Station::new("named", c.lat + 0.027, c.lon)
                .with_name("Rohini Sector 16")
                .with_reading(Pollutant::Pm25, 90.0),
        ];

        let outcome = RegionMapper::new(config(5.0, 10.0)).map(&[region], &stations);
        let estimate = outcome.table.get(&RegionId::Number(1)).unwrap();
        assert_eq!(estimate.station_count, 2);
        assert!(estimate.concentrations.get(Pollutant::Pm25).unwrap() > 60.0);
        // Nearest is reported by true distance
        assert_eq!(estimate.nearest_station_id.as_deref(), Some("closer"));

        let unbiased = MapperConfig {
            name_match: NameMatchBias::disabled(),
            ..config(5.0, 10.0)
        };
        let region = square(1, "Rohini", 28.7, 77.1, 0.02);
        let outcome = RegionMapper::new(unbiased).map(&[region], &stations);
        let estimate = outcome.table.get(&RegionId::Number(1)).unwrap();
        assert!(estimate.concentrations.get(Pollutant::Pm25).unwrap() < 60.0);
    }

    #[test]
    fn deferred_region_ignores_in_range_station() {
        let mut regions = line_of_three();
        regions.push(square(9, "Outlier", 28.6, 77.4, 0.02));
        let outlier = regions[3].centroid.unwrap();
        let stations = vec![
            station_at("b", &regions[1]).with_reading(Pollutant::Pm25, 80.0),
            Station::new("unrelated", outlier.lat, outlier.lon)
                .with_reading(Pollutant::Pm25, 400.0),
        ];

        let mut mapper_config = config(5.0, 10.0);
        mapper_config.overrides.push(RegionOverride {
            id: Some("9".to_string()),
            name: None,
            neighbors: vec!["2".to_string()],
            defer_direct: true,
        });

        let outcome = RegionMapper::new(mapper_config).map(&regions, &stations);
        let estimate = outcome.table.get(&RegionId::Number(9)).unwrap();
        assert!(estimate.is_estimated);
        assert_eq!(estimate.aqi, 167);
        assert_eq!(estimate.index_source, IndexSource::NeighborAverage);
    }

    #[test]
    fn listed_neighbors_can_chain() {
        let mut regions = line_of_three();
        // Listed before its own neighbor so the first round blocks on it
        regions.push(square(9, "Further East", 28.6, 79.5, 0.02));
        regions.push(square(8, "Far East", 28.6, 78.5, 0.02));
        let stations = vec![station_at("b", &regions[1]).with_reading(Pollutant::Pm25, 80.0)];

        let mut mapper_config = config(5.0, 10.0);
        mapper_config.overrides.push(RegionOverride {
            id: Some("9".to_string()),
            name: None,
            neighbors: vec!["8".to_string()],
            defer_direct: false,
        });
        mapper_config.overrides.push(RegionOverride {
            id: Some("8".to_string()),
            name: None,
            neighbors: vec!["2".to_string()],
            defer_direct: false,
        });

        let outcome = RegionMapper::new(mapper_config).map(&regions, &stations);
        assert!(outcome.unresolved.is_empty());
        assert_eq!(outcome.table.get(&RegionId::Number(9)).unwrap().aqi, 167);
    }

    #[test]
    fn malformed_region_does_not_abort_run() {
        let mut regions = line_of_three();
        regions.push(RegionBoundary::new(RegionId::Number(4), "Broken", None));
        let stations = vec![station_at("s", &regions[1]).with_reading(Pollutant::Pm25, 80.0)];

        let outcome = RegionMapper::new(config(5.0, 10.0)).map(&regions, &stations);
        assert_eq!(outcome.table.len(), 3);
        assert_eq!(
            outcome.unresolved,
            vec![UnresolvedRegion {
                region_id: RegionId::Number(4),
                region_name: "Broken".to_string(),
                reason: UnresolvedReason::NoPosition,
            }]
        );
    }

    #[test]
    fn full_coverage_for_grid_with_one_station() {
        let regions: Vec<RegionBoundary> = (0..5)
            .flat_map(|row| {
                (0..5).map(move |col| {
                    square(
                        row * 5 + col,
                        "Grid",
                        f64::from(i32::try_from(row).unwrap()).mul_add(0.03, 28.5),
                        f64::from(i32::try_from(col).unwrap()).mul_add(0.03, 77.1),
                        0.03,
                    )
                })
            })
            .collect();
        let stations = vec![station_at("s", &regions[12]).with_reading(Pollutant::No2, 150.0)];

        let outcome = RegionMapper::new(config(1.0, 2.0)).map(&regions, &stations);
        assert_eq!(outcome.table.len(), regions.len());
        assert!(outcome.unresolved.is_empty());
    }

    #[test]
    fn retain_keeps_last_sensor_value_only() {
        let regions = line_of_three();
        let stations = vec![station_at("s", &regions[1]).with_reading(Pollutant::Pm25, 80.0)];
        let mapper = RegionMapper::new(config(5.0, 10.0));
        let previous = mapper.map(&regions, &stations).table;

        let mut outcome = mapper.map(&regions, &[]);
        assert_eq!(outcome.unresolved.len(), 3);

        let retained = outcome.retain_from(&previous);
        assert_eq!(retained, 1);
        let b = outcome.table.get(&RegionId::Number(2)).unwrap();
        assert_eq!(b.coverage, CoverageTier::Retained);
        assert_eq!(b.aqi, 167);
        assert!(!b.is_estimated);
        // A and C were neighbor estimates last cycle
        assert_eq!(outcome.unresolved.len(), 2);
    }

    #[test]
    fn riverside_demo_resolves_every_ward() {
        let deployment = find_deployment("riverside").unwrap();
        let regions = parse_boundaries(
            include_str!("../deployments/riverside/wards.geojson"),
            &deployment.fields,
        )
        .unwrap();
        let stations =
            parse_stations(include_str!("../deployments/riverside/stations.json")).unwrap();

        let outcome = RegionMapper::new(deployment.mapper).map(&regions, &stations);
        assert!(outcome.unresolved.is_empty(), "{:?}", outcome.unresolved);
        assert_eq!(outcome.table.len(), regions.len());

        let old_town = outcome.table.get(&RegionId::Number(1)).unwrap();
        assert_eq!(old_town.aqi, 167);
        assert_eq!(old_town.coverage, CoverageTier::Local);

        let market = outcome.table.get(&RegionId::Number(2)).unwrap();
        assert_eq!(market.coverage, CoverageTier::Extended);
        assert_eq!(market.index_source, IndexSource::Provider);
        assert_eq!(market.aqi, 180);
        assert_eq!(market.station_count, 2);

        let river = regions.iter().find(|r| !r.id.is_assigned()).unwrap();
        let floodplain = outcome.table.get(&river.id).unwrap();
        assert!(floodplain.is_estimated);
        assert_eq!(floodplain.station_count, 6);

        let fringe = outcome.table.get(&RegionId::Number(7)).unwrap();
        assert!(fringe.is_estimated);
        assert!(fringe.aqi < 200, "estate monitor leaked into ward 7");
        assert_eq!(fringe.concentrations.get(Pollutant::So2), None);
        assert_eq!(
            fringe.attributions,
            vec!["Riverside Pollution Control Board".to_string()]
        );
    }
}
