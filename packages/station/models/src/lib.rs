#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Sensor station reading types.
//!
//! A [`Station`] is one monitoring location with whatever pollutants it
//! reported in the latest fetch. Provider feeds are messy: identifiers may
//! be numeric, pollutant maps contain nulls and unknown codes, and
//! pre-computed indices are sometimes sent as `"-"`. Deserialization here
//! is deliberately lenient and normalizes all of that away.

use std::collections::BTreeMap;

use aqi_map_aqi_models::{Concentrations, Pollutant};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A sensor location and its latest readings.
///
/// Immutable per fetch cycle; the whole list is replaced on refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Station {
    /// Provider station identifier.
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    /// Latitude in decimal degrees.
    #[serde(alias = "lat")]
    pub latitude: f64,
    /// Longitude in decimal degrees.
    #[serde(alias = "lon", alias = "lng")]
    pub longitude: f64,
    /// Human-readable station name.
    #[serde(default)]
    pub name: Option<String>,
    /// Latest concentration per reported pollutant.
    #[serde(
        default,
        alias = "pollutants",
        deserialize_with = "lenient_concentrations"
    )]
    pub concentrations: Concentrations,
    /// When the provider last updated this station.
    #[serde(default, alias = "updatedAt")]
    pub last_updated: Option<DateTime<Utc>>,
    /// Pre-computed index from the upstream provider, when positive.
    #[serde(default, alias = "aqi", deserialize_with = "positive_index")]
    pub provider_index: Option<u32>,
    /// Data attribution text.
    #[serde(default)]
    pub attribution: Option<String>,
}

impl Station {
    /// Creates a station with no readings.
    #[must_use]
    pub fn new(id: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            id: id.into(),
            latitude,
            longitude,
            name: None,
            concentrations: Concentrations::new(),
            last_updated: None,
            provider_index: None,
            attribution: None,
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Records one pollutant concentration.
    #[must_use]
    pub fn with_reading(mut self, pollutant: Pollutant, value: f64) -> Self {
        self.concentrations.insert(pollutant, value);
        self
    }

    /// Sets the provider index. Zero is treated as absent.
    #[must_use]
    pub const fn with_provider_index(mut self, index: u32) -> Self {
        self.provider_index = if index > 0 { Some(index) } else { None };
        self
    }

    /// Sets the last-updated timestamp.
    #[must_use]
    pub const fn with_last_updated(mut self, at: DateTime<Utc>) -> Self {
        self.last_updated = Some(at);
        self
    }

    /// Whether the coordinates are usable for distance computations.
    #[must_use]
    pub fn has_valid_position(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// A JSON scalar that may be a number or a numeric string.
#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl NumberOrText {
    fn as_f64(&self) -> Option<f64> {
        match self {
            #[allow(clippy::cast_precision_loss)]
            Self::Integer(n) => Some(*n as f64),
            Self::Float(f) => Some(*f),
            Self::Text(s) => s.trim().parse().ok(),
        }
        .filter(|v: &f64| v.is_finite())
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Integer(n) => n.to_string(),
        NumberOrText::Float(f) => f.to_string(),
        NumberOrText::Text(s) => s,
    })
}

/// Drops unknown pollutant codes, nulls, unparsable and non-finite values.
fn lenient_concentrations<'de, D>(deserializer: D) -> Result<Concentrations, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, Option<NumberOrText>>> = Option::deserialize(deserializer)?;

    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(code, value)| {
            let pollutant = code.parse::<Pollutant>().ok()?;
            let value = value?.as_f64()?;
            Some((pollutant, value))
        })
        .collect())
}

/// Accepts numbers or numeric strings; anything else, or a value that is
/// not strictly positive, becomes `None`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn positive_index<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<NumberOrText> = Option::deserialize(deserializer)?;

    Ok(raw
        .and_then(|v| v.as_f64())
        .filter(|v| *v > 0.0)
        .map(|v| v.round().min(f64::from(u32::MAX)) as u32)
        .filter(|v| *v > 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_provider_record_leniently() {
        let json = r#"{
            "id": 8129,
            "lat": 28.63,
            "lon": 77.22,
            "name": "Mandir Marg",
            "pollutants": {"pm25": 81.5, "PM10": "140", "no2": null, "nh3": 20, "co": "n/a"},
            "updatedAt": "2026-10-19T06:00:00Z",
            "aqi": "-",
            "attribution": "CPCB"
        }"#;

        let station: Station = serde_json::from_str(json).unwrap();
        assert_eq!(station.id, "8129");
        assert_eq!(station.name.as_deref(), Some("Mandir Marg"));
        assert_eq!(station.concentrations.get(Pollutant::Pm25), Some(81.5));
        assert_eq!(station.concentrations.get(Pollutant::Pm10), Some(140.0));
        assert_eq!(station.concentrations.get(Pollutant::No2), None);
        assert_eq!(station.concentrations.get(Pollutant::Co), None);
        assert_eq!(station.concentrations.len(), 2);
        assert_eq!(station.provider_index, None);
        assert!(station.last_updated.is_some());
    }

    #[test]
    fn provider_index_must_be_positive() {
        let zero: Station =
            serde_json::from_str(r#"{"id": "a", "latitude": 1.0, "longitude": 2.0, "aqi": 0}"#)
                .unwrap();
        assert_eq!(zero.provider_index, None);

        let text: Station = serde_json::from_str(
            r#"{"id": "a", "latitude": 1.0, "longitude": 2.0, "providerIndex": "152"}"#,
        )
        .unwrap();
        assert_eq!(text.provider_index, Some(152));
    }

    #[test]
    fn missing_optional_fields_default() {
        let station: Station =
            serde_json::from_str(r#"{"id": "x", "lat": 10.0, "lng": 20.0}"#).unwrap();
        assert!(station.concentrations.is_empty());
        assert_eq!(station.name, None);
        assert_eq!(station.last_updated, None);
        assert_eq!(station.attribution, None);
    }

    #[test]
    fn rejects_out_of_range_positions() {
        assert!(Station::new("ok", 28.6, 77.2).has_valid_position());
        assert!(!Station::new("lat", 95.0, 77.2).has_valid_position());
        assert!(!Station::new("nan", f64::NAN, 77.2).has_valid_position());
    }
}
