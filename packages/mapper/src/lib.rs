#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Region mapping orchestrator, deployment configuration and the periodic
//! refresh service.
//!
//! [`RegionMapper`] turns a boundary set and one station snapshot into a
//! [`RegionTable`](aqi_map_region_models::RegionTable): a direct pass over
//! regions with stations in range, then a fallback pass that averages
//! already-resolved neighbors. [`AqiRefresher`] drives it on an interval
//! and keeps serving the last good table when a fetch fails.

pub mod config;
pub mod mapper;
pub mod refresh;
pub mod registry;

use aqi_map_station::StationError;
use thiserror::Error;

pub use config::{
    BoundarySource, DeploymentConfig, MapperConfig, ProviderIndexPriority, RegionOverride,
    StationSource,
};
pub use mapper::{MappingOutcome, RegionMapper, UnresolvedReason, UnresolvedRegion};
pub use refresh::{AqiRefresher, PublishedTable, TableSnapshot};

/// Errors that can occur while loading deployment configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The TOML document could not be parsed.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Reading a config file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// No deployment with this id is registered.
    #[error("Unknown deployment: {id}")]
    UnknownDeployment {
        /// The requested id.
        id: String,
    },

    /// A parameter is out of range.
    #[error("Invalid configuration: {message}")]
    Invalid {
        /// Description of what went wrong.
        message: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}

/// Errors that can occur during a refresh cycle.
#[derive(Debug, Error)]
pub enum RefreshError {
    /// The station feed could not be read.
    #[error("Station feed error: {0}")]
    Feed(#[from] StationError),

    /// The feed answered but listed no stations.
    #[error("Station feed {feed} returned no stations")]
    NoStations {
        /// Description of the feed.
        feed: String,
    },
}
