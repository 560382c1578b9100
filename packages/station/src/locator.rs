//! Radius-bounded station search around a region's representative point.
//!
//! Stations are bulk-loaded into an R-tree keyed on `[lon, lat]`. A query
//! first collects candidates from a bounding box sized to the radius, then
//! applies the exact haversine test and ranks by effective distance.

use aqi_map_geometry::LatLon;
use aqi_map_station_models::Station;
use rstar::{AABB, RTree, RTreeObject};
use serde::{Deserialize, Serialize};

/// Kilometres per degree of latitude on a 6371 km sphere.
const KM_PER_DEGREE: f64 = 111.195;

/// Name-similarity tie-break for station ranking.
///
/// Station naming in provider feeds is sparse and noisy. When a station's
/// name contains the region name (or the reverse, case-insensitively) its
/// distance is multiplied by `discount_factor` for ranking, so a station
/// named after a region outranks a geometrically closer unrelated one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NameMatchBias {
    /// Whether the discount is applied at all.
    pub enabled: bool,
    /// Multiplier applied to the true distance of a name-matched station.
    pub discount_factor: f64,
}

impl Default for NameMatchBias {
    fn default() -> Self {
        Self {
            enabled: true,
            discount_factor: 0.5,
        }
    }
}

impl NameMatchBias {
    /// A bias that never discounts.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            enabled: false,
            discount_factor: 1.0,
        }
    }

    /// Case-insensitive substring match in either direction.
    ///
    /// Blank names never match.
    #[must_use]
    pub fn names_match(station_name: &str, region_name: &str) -> bool {
        let station = normalize_name(station_name);
        let region = normalize_name(region_name);
        if station.is_empty() || region.is_empty() {
            return false;
        }
        station.contains(&region) || region.contains(&station)
    }

    fn effective_distance(&self, distance_km: f64, matched: bool) -> f64 {
        if self.enabled && matched {
            distance_km * self.discount_factor
        } else {
            distance_km
        }
    }
}

fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// A station within range of a query point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedStation<'a> {
    /// The station.
    pub station: &'a Station,
    /// Haversine distance to the query point.
    pub distance_km: f64,
    /// Distance used for ranking and weighting.
    pub effective_distance_km: f64,
    /// Whether the name-match discount applied.
    pub name_matched: bool,
}

struct StationPoint {
    index: usize,
    position: [f64; 2],
}

impl RTreeObject for StationPoint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.position)
    }
}

/// Spatial index over one fetch cycle's station list.
pub struct StationLocator<'a> {
    stations: &'a [Station],
    tree: RTree<StationPoint>,
}

impl<'a> StationLocator<'a> {
    /// Indexes every station with a usable position.
    #[must_use]
    pub fn new(stations: &'a [Station]) -> Self {
        let points: Vec<StationPoint> = stations
            .iter()
            .enumerate()
            .filter(|(_, station)| {
                let valid = station.has_valid_position();
                if !valid {
                    log::warn!(
                        "Skipping station {} with invalid position ({}, {})",
                        station.id,
                        station.latitude,
                        station.longitude
                    );
                }
                valid
            })
            .map(|(index, station)| StationPoint {
                index,
                position: [station.longitude, station.latitude],
            })
            .collect();

        Self {
            stations,
            tree: RTree::bulk_load(points),
        }
    }

    /// Number of indexed stations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Whether no station could be indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Finds stations within `max_radius_km` of `point`, ordered by
    /// ascending effective distance.
    ///
    /// Ties are broken by true distance, then station id. No station in
    /// range yields an empty list.
    #[must_use]
    pub fn find_nearby(
        &self,
        point: LatLon,
        max_radius_km: f64,
        region_name: Option<&str>,
        bias: &NameMatchBias,
    ) -> Vec<RankedStation<'a>> {
        if !(max_radius_km.is_finite() && max_radius_km >= 0.0) {
            return Vec::new();
        }

        let mut ranked: Vec<RankedStation<'a>> = self
            .candidates(point, max_radius_km)
            .into_iter()
            .filter_map(|index| {
                let station = &self.stations[index];
                let distance_km =
                    point.distance_km(LatLon::new(station.latitude, station.longitude));
                if distance_km > max_radius_km {
                    return None;
                }

                let name_matched = match (region_name, station.name.as_deref()) {
                    (Some(region), Some(name)) => NameMatchBias::names_match(name, region),
                    _ => false,
                };

                Some(RankedStation {
                    station,
                    distance_km,
                    effective_distance_km: bias.effective_distance(distance_km, name_matched),
                    name_matched,
                })
            })
            .collect();

        ranked.sort_by(|a, b| {
            a.effective_distance_km
                .total_cmp(&b.effective_distance_km)
                .then_with(|| a.distance_km.total_cmp(&b.distance_km))
                .then_with(|| a.station.id.cmp(&b.station.id))
        });

        ranked
    }

    /// Indices of stations inside the radius-sized bounding box.
    ///
    /// Falls back to every station when the box would cross a pole or the
    /// antimeridian.
    fn candidates(&self, point: LatLon, max_radius_km: f64) -> Vec<usize> {
        let lat_delta = max_radius_km / KM_PER_DEGREE * 1.01;
        let cos_lat = point.lat.to_radians().cos();

        let min_lat = point.lat - lat_delta;
        let max_lat = point.lat + lat_delta;
        let lon_delta = if cos_lat > 1e-6 {
            lat_delta / cos_lat
        } else {
            f64::INFINITY
        };
        let min_lon = point.lon - lon_delta;
        let max_lon = point.lon + lon_delta;

        if min_lat < -90.0 || max_lat > 90.0 || min_lon < -180.0 || max_lon > 180.0 {
            return self.tree.iter().map(|p| p.index).collect();
        }

        let envelope = AABB::from_corners([min_lon, min_lat], [max_lon, max_lat]);
        self.tree
            .locate_in_envelope(&envelope)
            .map(|p| p.index)
            .collect()
    }
}

/// Finds stations within `max_radius_km` of `point`.
///
/// Convenience wrapper that indexes `stations` for a single query; build a
/// [`StationLocator`] once when querying many points.
#[must_use]
pub fn find_nearby<'a>(
    point: LatLon,
    stations: &'a [Station],
    max_radius_km: f64,
    region_name: Option<&str>,
    bias: &NameMatchBias,
) -> Vec<RankedStation<'a>> {
    StationLocator::new(stations).find_nearby(point, max_radius_km, region_name, bias)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CENTER: LatLon = LatLon::new(28.61, 77.21);

    /// Station placed `km` kilometres due north of `CENTER`.
    fn north_of_center(id: &str, km: f64) -> Station {
        Station::new(id, CENTER.lat + km / KM_PER_DEGREE, CENTER.lon)
    }

    #[test]
    fn filters_by_radius_and_sorts_ascending() {
        let stations = vec![
            north_of_center("far", 9.0),
            north_of_center("near", 1.0),
            north_of_center("mid", 4.0),
            north_of_center("outside", 12.0),
        ];

        let ranked = find_nearby(CENTER, &stations, 10.0, None, &NameMatchBias::default());
        let ids: Vec<&str> = ranked.iter().map(|r| r.station.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid", "far"]);
        assert!((ranked[0].distance_km - 1.0).abs() < 0.01);
        assert!(ranked.iter().all(|r| !r.name_matched));
    }

    #[test]
    fn empty_when_nothing_in_range() {
        let stations = vec![north_of_center("far", 30.0)];
        assert!(find_nearby(CENTER, &stations, 5.0, None, &NameMatchBias::default()).is_empty());
        assert!(find_nearby(CENTER, &[], 5.0, None, &NameMatchBias::default()).is_empty());
    }

    #[test]
    fn name_match_outranks_closer_station() {
        let stations = vec![
            north_of_center("closer", 2.0).with_name("Sector 9 Depot"),
            north_of_center("named", 3.0).with_name("R K Puram, Delhi - DPCC"),
        ];

        let ranked = find_nearby(
            CENTER,
            &stations,
            10.0,
            Some("r k puram"),
            &NameMatchBias::default(),
        );
        assert_eq!(ranked[0].station.id, "named");
        assert!(ranked[0].name_matched);
        assert!((ranked[0].effective_distance_km - ranked[0].distance_km * 0.5).abs() < 1e-9);
    }

    #[test]
    fn disabled_bias_uses_true_distance() {
        let stations = vec![
            north_of_center("closer", 2.0),
            north_of_center("named", 3.0).with_name("Rohini"),
        ];

        let ranked = find_nearby(
            CENTER,
            &stations,
            10.0,
            Some("Rohini"),
            &NameMatchBias::disabled(),
        );
        assert_eq!(ranked[0].station.id, "closer");
        assert!((ranked[1].effective_distance_km - ranked[1].distance_km).abs() < f64::EPSILON);
    }

    #[test]
    fn names_match_either_direction() {
        assert!(NameMatchBias::names_match("Anand Vihar, Delhi", "anand  vihar"));
        assert!(NameMatchBias::names_match("Okhla", "Okhla Phase-2"));
        assert!(!NameMatchBias::names_match("Okhla", "Dwarka"));
        assert!(!NameMatchBias::names_match("", "Dwarka"));
        assert!(!NameMatchBias::names_match("Dwarka", "   "));
    }

    #[test]
    fn skips_stations_with_invalid_positions() {
        let stations = vec![
            Station::new("nan", f64::NAN, 77.21),
            north_of_center("ok", 1.0),
        ];
        let locator = StationLocator::new(&stations);
        assert_eq!(locator.len(), 1);

        let ranked = locator.find_nearby(CENTER, 5.0, None, &NameMatchBias::default());
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].station.id, "ok");
    }

    #[test]
    fn envelope_prefilter_agrees_with_exact_test() {
        // Stations east of center where longitude degrees are shorter
        let km_per_lon_degree = KM_PER_DEGREE * CENTER.lat.to_radians().cos();
        let stations: Vec<Station> = (1..=20)
            .map(|i| {
                let km = f64::from(i) * 0.5;
                Station::new(
                    format!("east-{i}"),
                    CENTER.lat,
                    CENTER.lon + km / km_per_lon_degree,
                )
            })
            .collect();

        let ranked = find_nearby(CENTER, &stations, 5.0, None, &NameMatchBias::default());
        let expected = stations
            .iter()
            .filter(|s| CENTER.distance_km(LatLon::new(s.latitude, s.longitude)) <= 5.0)
            .count();
        assert_eq!(ranked.len(), expected);
        assert!(expected >= 9);
    }
}
