//! Inverse-distance-weighted pollutant aggregation.

use aqi_map_aqi_models::{Concentrations, Pollutant};

use crate::RankedStation;

/// Default additive term in the weight denominator, in kilometres.
pub const DEFAULT_IDW_EPSILON_KM: f64 = 0.1;

/// Merges ranked stations' readings into one concentration set.
///
/// * No stations: empty set.
/// * One station: its concentrations unchanged.
/// * Several: for each pollutant, the mean over only the stations that
///   report it, weighted by `1 / (effective_distance + epsilon_km)`.
///
/// A pollutant no contributing station reports stays absent.
#[must_use]
pub fn aggregate(ranked: &[RankedStation<'_>], epsilon_km: f64) -> Concentrations {
    match ranked {
        [] => Concentrations::new(),
        [only] => only.station.concentrations.clone(),
        _ => Pollutant::all()
            .iter()
            .filter_map(|&pollutant| {
                let mut weighted_sum = 0.0;
                let mut weight_total = 0.0;

                for entry in ranked {
                    let Some(value) = entry.station.concentrations.get(pollutant) else {
                        continue;
                    };
                    let weight = 1.0 / (entry.effective_distance_km.max(0.0) + epsilon_km);
                    if !weight.is_finite() {
                        continue;
                    }
                    weighted_sum += value * weight;
                    weight_total += weight;
                }

                (weight_total > 0.0).then(|| (pollutant, weighted_sum / weight_total))
            })
            .collect(),
    }
}
