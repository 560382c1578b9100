//! Station list feeds.
//!
//! A feed produces the full station list for one refresh cycle. Provider
//! payloads are either a bare JSON array of station records or an object
//! wrapping that array under `stations` or `data`. Records that fail to
//! deserialize or sit at impossible coordinates are skipped with a
//! warning; only a failure to obtain the payload at all is an error.

use std::path::PathBuf;
use std::time::Duration;

use aqi_map_station_models::Station;
use async_trait::async_trait;

use crate::StationError;

/// Maximum number of retry attempts for transient HTTP errors.
///
/// With exponential backoff (1s, 2s, 4s) the total wait before giving up
/// is 7 seconds, well inside a refresh interval.
const MAX_RETRIES: u32 = 3;

/// Source of the live station list.
#[async_trait]
pub trait StationFeed: Send + Sync {
    /// Fetches the current station list.
    ///
    /// # Errors
    ///
    /// Returns [`StationError`] if the upstream source cannot be read or
    /// its payload is not a station list.
    async fn fetch_stations(&self) -> Result<Vec<Station>, StationError>;

    /// Short description for log messages.
    fn describe(&self) -> String;
}

/// Fetches station JSON from an HTTP endpoint.
pub struct HttpStationFeed {
    client: reqwest::Client,
    url: String,
}

impl HttpStationFeed {
    /// Creates a feed for `url` using a shared client.
    #[must_use]
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    async fn send_with_retry(&self) -> Result<reqwest::Response, StationError> {
        let mut attempt = 0;
        loop {
            let result = self.client.get(&self.url).send().await;
            let retryable = match &result {
                Ok(resp) => {
                    let status = resp.status();
                    status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS
                }
                Err(e) => e.is_timeout() || e.is_connect(),
            };

            if !retryable || attempt >= MAX_RETRIES {
                let resp = result?;
                if !resp.status().is_success() {
                    return Err(StationError::Conversion {
                        message: format!(
                            "Station request to {} failed with status {}",
                            self.url,
                            resp.status()
                        ),
                    });
                }
                return Ok(resp);
            }

            let delay = Duration::from_secs(1u64 << attempt);
            attempt += 1;
            log::warn!(
                "Station request to {} failed (retry {attempt}/{MAX_RETRIES}), retrying in {delay:?}",
                self.url
            );
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl StationFeed for HttpStationFeed {
    async fn fetch_stations(&self) -> Result<Vec<Station>, StationError> {
        let resp = self.send_with_retry().await?;
        let body = resp.text().await?;
        parse_stations(&body)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// Reads station JSON from a local file on every fetch.
pub struct FileStationFeed {
    path: PathBuf,
}

impl FileStationFeed {
    /// Creates a feed reading `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl StationFeed for FileStationFeed {
    async fn fetch_stations(&self) -> Result<Vec<Station>, StationError> {
        let body = tokio::fs::read_to_string(&self.path).await?;
        parse_stations(&body)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Parses a station payload, skipping unusable records.
///
/// # Errors
///
/// Returns [`StationError`] if the body is not JSON or contains no
/// station array.
pub fn parse_stations(body: &str) -> Result<Vec<Station>, StationError> {
    let json: serde_json::Value = serde_json::from_str(body)?;

    let records = match &json {
        serde_json::Value::Array(records) => records,
        serde_json::Value::Object(obj) => obj
            .get("stations")
            .or_else(|| obj.get("data"))
            .and_then(serde_json::Value::as_array)
            .ok_or_else(|| StationError::Conversion {
                message: "No stations array in station payload".to_string(),
            })?,
        _ => {
            return Err(StationError::Conversion {
                message: "Station payload is neither an array nor an object".to_string(),
            });
        }
    };

    let mut stations = Vec::with_capacity(records.len());
    for (i, record) in records.iter().enumerate() {
        match serde_json::from_value::<Station>(record.clone()) {
            Ok(station) if station.has_valid_position() => stations.push(station),
            Ok(station) => {
                log::warn!("Skipping station {} with invalid position", station.id);
            }
            Err(e) => {
                log::warn!("Skipping malformed station record {i}: {e}");
            }
        }
    }

    log::debug!(
        "Parsed {} stations from {} records",
        stations.len(),
        records.len()
    );

    Ok(stations)
}

#[cfg(test)]
mod tests {
    use aqi_map_aqi_models::Pollutant;

    use super::*;

    #[test]
    fn parses_bare_array() {
        let stations = parse_stations(
            r#"[
                {"id": "a", "lat": 28.6, "lon": 77.2, "pollutants": {"pm25": 50}},
                {"id": "b", "lat": 28.7, "lon": 77.3}
            ]"#,
        )
        .unwrap();
        assert_eq!(stations.len(), 2);
        assert_eq!(stations[0].concentrations.get(Pollutant::Pm25), Some(50.0));
    }

    #[test]
    fn parses_wrapped_payloads() {
        let wrapped = r#"{"stations": [{"id": 1, "lat": 28.6, "lon": 77.2}]}"#;
        assert_eq!(parse_stations(wrapped).unwrap().len(), 1);

        let data = r#"{"status": "ok", "data": [{"id": 2, "lat": 28.6, "lon": 77.2}]}"#;
        assert_eq!(parse_stations(data).unwrap()[0].id, "2");
    }

    #[test]
    fn skips_bad_records_but_keeps_good_ones() {
        let stations = parse_stations(
            r#"[
                {"id": "no-coords"},
                {"id": "bad-lat", "lat": 123.0, "lon": 77.2},
                {"id": "good", "lat": 28.6, "lon": 77.2}
            ]"#,
        )
        .unwrap();
        assert_eq!(stations.len(), 1);
        assert_eq!(stations[0].id, "good");
    }

    #[test]
    fn rejects_payload_without_station_list() {
        assert!(parse_stations(r#"{"status": "error"}"#).is_err());
        assert!(parse_stations("42").is_err());
        assert!(parse_stations("{").is_err());
    }

    #[tokio::test]
    async fn file_feed_reads_from_disk() {
        let path = std::env::temp_dir().join(format!(
            "aqi_map_station_feed_{}.json",
            std::process::id()
        ));
        tokio::fs::write(&path, r#"[{"id": "f", "lat": 28.6, "lon": 77.2}]"#)
            .await
            .unwrap();

        let feed = FileStationFeed::new(&path);
        let stations = feed.fetch_stations().await.unwrap();
        assert_eq!(stations.len(), 1);
        assert_eq!(stations[0].id, "f");

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn file_feed_missing_file_is_error() {
        let feed = FileStationFeed::new("/nonexistent/aqi_map/stations.json");
        assert!(matches!(
            feed.fetch_stations().await,
            Err(StationError::Io(_))
        ));
    }
}
