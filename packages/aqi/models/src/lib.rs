#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Pollutant, concentration and air quality category types.
//!
//! These types are shared by the index calculator, the station models and
//! the per-region estimates. They carry no computation beyond the
//! deterministic index-to-category mapping.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// A measured air pollutant.
///
/// Declaration order doubles as the tie-break order when two pollutants
/// produce the same sub-index.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum Pollutant {
    /// Fine particulate matter, µg/m³.
    #[serde(rename = "pm25", alias = "pm2_5", alias = "pm2.5")]
    #[strum(to_string = "pm25", serialize = "pm2_5", serialize = "pm2.5")]
    Pm25,
    /// Coarse particulate matter, µg/m³.
    #[serde(rename = "pm10")]
    #[strum(to_string = "pm10")]
    Pm10,
    /// Nitrogen dioxide, µg/m³.
    #[serde(rename = "no2")]
    #[strum(to_string = "no2")]
    No2,
    /// Ozone, µg/m³.
    #[serde(rename = "o3")]
    #[strum(to_string = "o3")]
    O3,
    /// Sulphur dioxide, µg/m³.
    #[serde(rename = "so2")]
    #[strum(to_string = "so2")]
    So2,
    /// Carbon monoxide, mg/m³.
    #[serde(rename = "co")]
    #[strum(to_string = "co")]
    Co,
}

impl Pollutant {
    /// Returns all variants of this enum in tie-break order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Pm25,
            Self::Pm10,
            Self::No2,
            Self::O3,
            Self::So2,
            Self::Co,
        ]
    }

    /// Human-readable display label (e.g. "PM2.5").
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pm25 => "PM2.5",
            Self::Pm10 => "PM10",
            Self::No2 => "NO2",
            Self::O3 => "O3",
            Self::So2 => "SO2",
            Self::Co => "CO",
        }
    }
}

/// A partial set of pollutant concentrations.
///
/// A pollutant that was not measured is absent from the map. Zero is a
/// real measurement and is stored as such.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Concentrations(BTreeMap<Pollutant, f64>);

impl Concentrations {
    /// Creates an empty concentration set.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Returns the concentration for `pollutant`, if measured.
    #[must_use]
    pub fn get(&self, pollutant: Pollutant) -> Option<f64> {
        self.0.get(&pollutant).copied()
    }

    /// Records a concentration. Non-finite values are ignored.
    pub fn insert(&mut self, pollutant: Pollutant, value: f64) {
        if value.is_finite() {
            self.0.insert(pollutant, value);
        }
    }

    /// Iterates measured pollutants in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (Pollutant, f64)> + '_ {
        self.0.iter().map(|(p, v)| (*p, *v))
    }

    /// Number of measured pollutants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no pollutant was measured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(Pollutant, f64)> for Concentrations {
    fn from_iter<T: IntoIterator<Item = (Pollutant, f64)>>(iter: T) -> Self {
        let mut concentrations = Self::new();
        for (pollutant, value) in iter {
            concentrations.insert(pollutant, value);
        }
        concentrations
    }
}

/// Air quality category band, from best to worst.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AqiCategory {
    /// 0-50
    Good,
    /// 51-100
    Satisfactory,
    /// 101-200
    Moderate,
    /// 201-300
    Poor,
    /// 301-400
    VeryPoor,
    /// 401 and above
    Severe,
}

impl AqiCategory {
    /// Maps an index value to its band. Depends on the value alone.
    #[must_use]
    pub const fn from_index(value: u32) -> Self {
        match value {
            0..=50 => Self::Good,
            51..=100 => Self::Satisfactory,
            101..=200 => Self::Moderate,
            201..=300 => Self::Poor,
            301..=400 => Self::VeryPoor,
            _ => Self::Severe,
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Good => "Good",
            Self::Satisfactory => "Satisfactory",
            Self::Moderate => "Moderate",
            Self::Poor => "Poor",
            Self::VeryPoor => "Very Poor",
            Self::Severe => "Severe",
        }
    }

    /// Display color token for map fills and badges.
    #[must_use]
    pub const fn color(self) -> &'static str {
        match self {
            Self::Good => "#55a84f",
            Self::Satisfactory => "#a3c853",
            Self::Moderate => "#fff833",
            Self::Poor => "#f29c33",
            Self::VeryPoor => "#e93f33",
            Self::Severe => "#af2d24",
        }
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Good,
            Self::Satisfactory,
            Self::Moderate,
            Self::Poor,
            Self::VeryPoor,
            Self::Severe,
        ]
    }
}

/// The result of running the index calculator over a concentration set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AqiReading {
    /// Overall index, the maximum of all sub-indices.
    pub value: u32,
    /// Band for `value`.
    pub category: AqiCategory,
    /// Pollutant with the highest sub-index, `None` when nothing was measured.
    pub dominant: Option<Pollutant>,
    /// Rounded sub-index per measured pollutant.
    pub sub_indices: BTreeMap<Pollutant, u32>,
}

impl AqiReading {
    /// Reading for an empty concentration set.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            value: 0,
            category: AqiCategory::Good,
            dominant: None,
            sub_indices: BTreeMap::new(),
        }
    }

    /// Replaces the overall value (e.g. with a provider-supplied index)
    /// and re-derives the category from it.
    #[must_use]
    pub fn with_value(mut self, value: u32) -> Self {
        self.value = value;
        self.category = AqiCategory::from_index(value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_bands_cover_boundaries() {
        assert_eq!(AqiCategory::from_index(0), AqiCategory::Good);
        assert_eq!(AqiCategory::from_index(50), AqiCategory::Good);
        assert_eq!(AqiCategory::from_index(51), AqiCategory::Satisfactory);
        assert_eq!(AqiCategory::from_index(200), AqiCategory::Moderate);
        assert_eq!(AqiCategory::from_index(201), AqiCategory::Poor);
        assert_eq!(AqiCategory::from_index(400), AqiCategory::VeryPoor);
        assert_eq!(AqiCategory::from_index(401), AqiCategory::Severe);
        assert_eq!(AqiCategory::from_index(u32::MAX), AqiCategory::Severe);
    }

    #[test]
    fn category_order_matches_severity() {
        let all = AqiCategory::all();
        for pair in all.windows(2) {
            assert!(pair[0] < pair[1], "{:?} should sort before {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn pollutant_parses_provider_codes() {
        assert_eq!("pm25".parse::<Pollutant>().unwrap(), Pollutant::Pm25);
        assert_eq!("PM2.5".parse::<Pollutant>().unwrap(), Pollutant::Pm25);
        assert_eq!("pm2_5".parse::<Pollutant>().unwrap(), Pollutant::Pm25);
        assert_eq!("NO2".parse::<Pollutant>().unwrap(), Pollutant::No2);
        assert!("nh3".parse::<Pollutant>().is_err());
        assert_eq!(Pollutant::Pm25.to_string(), "pm25");
    }

    #[test]
    fn concentrations_keep_zero_and_drop_nan() {
        let mut c = Concentrations::new();
        c.insert(Pollutant::So2, 0.0);
        c.insert(Pollutant::Co, f64::NAN);
        assert_eq!(c.get(Pollutant::So2), Some(0.0));
        assert_eq!(c.get(Pollutant::Co), None);
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn concentrations_serialize_as_code_map() {
        let c: Concentrations = [(Pollutant::Pm25, 12.5), (Pollutant::O3, 30.0)]
            .into_iter()
            .collect();
        let json = serde_json::to_string(&c).unwrap();
        assert_eq!(json, r#"{"pm25":12.5,"o3":30.0}"#);
    }

    #[test]
    fn with_value_rederives_category() {
        let reading = AqiReading::empty().with_value(320);
        assert_eq!(reading.category, AqiCategory::VeryPoor);
        assert_eq!(reading.dominant, None);
    }
}
