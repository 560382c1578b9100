#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Air quality index calculator.
//!
//! Converts a partial set of pollutant concentrations into a single index
//! value using per-pollutant breakpoint tables. Each measured pollutant is
//! linearly interpolated within its bracket to a sub-index, and the worst
//! sub-index drives the overall value.

pub mod breakpoints;

use aqi_map_aqi_models::{AqiReading, Concentrations, Pollutant};

pub use breakpoints::{Breakpoint, breakpoints_for};

/// Computes the sub-index for a single pollutant concentration.
///
/// Concentrations outside the table are clamped to the nearest extreme
/// bracket, so a reading above the top of the table yields the table's
/// maximum index and a negative reading yields zero.
#[must_use]
pub fn sub_index(pollutant: Pollutant, concentration: f64) -> f64 {
    let table = breakpoints_for(pollutant);
    let (Some(first), Some(last)) = (table.first(), table.last()) else {
        return 0.0;
    };

    let clamped = concentration.clamp(first.conc_low, last.conc_high);

    let bracket = table
        .iter()
        .find(|bp| clamped <= bp.conc_high)
        .unwrap_or(last);

    bracket.interpolate(clamped)
}

/// Computes the overall index, category and dominant pollutant.
///
/// An empty concentration set yields index 0 in the lowest band with no
/// dominant pollutant. Ties between pollutants resolve to the one declared
/// first in [`Pollutant`].
#[must_use]
pub fn compute_index(concentrations: &Concentrations) -> AqiReading {
    let mut reading = AqiReading::empty();
    let mut worst: Option<(Pollutant, f64)> = None;

    for (pollutant, concentration) in concentrations.iter() {
        let value = sub_index(pollutant, concentration);
        reading.sub_indices.insert(pollutant, round_index(value));

        match worst {
            Some((_, current)) if value <= current => {}
            _ => worst = Some((pollutant, value)),
        }
    }

    let Some((dominant, value)) = worst else {
        return reading;
    };

    log::trace!("Dominant pollutant {dominant} with sub-index {value:.2}");

    reading.dominant = Some(dominant);
    reading.with_value(round_index(value))
}

/// Rounds a fractional index to the nearest integer, clamped at zero.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
#[must_use]
pub fn round_index(value: f64) -> u32 {
    if value.is_nan() || value <= 0.0 {
        0
    } else {
        value.round().min(f64::from(u32::MAX)) as u32
    }
}
