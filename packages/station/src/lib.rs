#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Station search, inverse-distance aggregation and station feeds.
//!
//! [`locator`] finds and ranks stations around a region's representative
//! point, [`aggregate`] merges their readings into one concentration set,
//! and [`feed`] fetches the live station list that both operate on.

pub mod aggregate;
pub mod feed;
pub mod locator;

use thiserror::Error;

pub use aggregate::{DEFAULT_IDW_EPSILON_KM, aggregate};
pub use locator::{NameMatchBias, RankedStation, StationLocator, find_nearby};

/// Errors that can occur while fetching station readings.
#[derive(Debug, Error)]
pub enum StationError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Reading a local file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Data conversion error.
    #[error("Conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}
