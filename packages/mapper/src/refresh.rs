//! Periodic refresh with stale-data fallback.
//!
//! Each cycle fetches a fresh station list, maps it and atomically swaps
//! the published table. A failed cycle leaves the previous table in
//! place and only records the error, so readers always see either the
//! last good table or nothing at all, never a partial one.

use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use aqi_map_geometry::RegionBoundary;
use aqi_map_region_models::RegionTable;
use aqi_map_station::feed::StationFeed;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::MissedTickBehavior;

use crate::{MappingOutcome, RefreshError, RegionMapper, UnresolvedRegion};

/// A completed mapping run as served to readers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedTable {
    /// Region estimates.
    #[serde(rename = "regions")]
    pub table: RegionTable,
    /// Regions with no estimate in this run.
    pub unresolved: Vec<UnresolvedRegion>,
    /// When the run finished.
    pub computed_at: DateTime<Utc>,
    /// Number of stations in the snapshot the run used.
    pub station_count: usize,
}

/// What readers see between refreshes.
#[derive(Debug, Clone)]
pub struct TableSnapshot {
    /// Last successfully computed table, if any cycle has succeeded.
    pub published: Option<Arc<PublishedTable>>,
    /// `true` when the most recent cycle failed and `published` is older.
    pub is_stale: bool,
    /// Message of the most recent failure, cleared on success.
    pub last_error: Option<String>,
}

#[derive(Default)]
struct RefreshState {
    published: Option<Arc<PublishedTable>>,
    last_error: Option<String>,
}

/// Drives [`RegionMapper`] against a live [`StationFeed`].
pub struct AqiRefresher {
    mapper: RegionMapper,
    regions: Vec<RegionBoundary>,
    feed: Box<dyn StationFeed>,
    state: RwLock<RefreshState>,
}

impl AqiRefresher {
    /// Creates a refresher over a fixed boundary set.
    #[must_use]
    pub fn new(
        mapper: RegionMapper,
        regions: Vec<RegionBoundary>,
        feed: Box<dyn StationFeed>,
    ) -> Self {
        Self {
            mapper,
            regions,
            feed,
            state: RwLock::new(RefreshState::default()),
        }
    }

    /// Runs one cycle and publishes the result.
    ///
    /// Regions that drop out of coverage keep their last sensor-derived
    /// value from the previously published table.
    ///
    /// # Errors
    ///
    /// Returns [`RefreshError`] if the feed fails or lists no stations.
    /// The previously published table stays in place.
    pub async fn refresh(&self) -> Result<Arc<PublishedTable>, RefreshError> {
        let result = self.compute().await;

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        match result {
            Ok(published) => {
                let published = Arc::new(published);
                state.published = Some(Arc::clone(&published));
                state.last_error = None;
                Ok(published)
            }
            Err(e) => {
                if let Some(previous) = &state.published {
                    log::warn!(
                        "Refresh from {} failed, serving table from {}: {e}",
                        self.feed.describe(),
                        previous.computed_at
                    );
                } else {
                    log::error!(
                        "Refresh from {} failed and no table has been published: {e}",
                        self.feed.describe()
                    );
                }
                state.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    async fn compute(&self) -> Result<PublishedTable, RefreshError> {
        let stations = self.feed.fetch_stations().await?;
        if stations.is_empty() {
            return Err(RefreshError::NoStations {
                feed: self.feed.describe(),
            });
        }

        let mut outcome: MappingOutcome = self.mapper.map(&self.regions, &stations);
        if let Some(previous) = self.current() {
            let retained = outcome.retain_from(&previous.table);
            if retained > 0 {
                log::warn!("Retained {retained} regions from the previous cycle");
            }
        }

        let summary = outcome.table.summary();
        log::info!(
            "Published {} regions ({} direct, {} estimated, {} retained, {} unresolved)",
            summary.regions,
            summary.direct,
            summary.estimated,
            summary.retained,
            outcome.unresolved.len()
        );

        Ok(PublishedTable {
            table: outcome.table,
            unresolved: outcome.unresolved,
            computed_at: Utc::now(),
            station_count: stations.len(),
        })
    }

    /// The last successfully published table.
    #[must_use]
    pub fn current(&self) -> Option<Arc<PublishedTable>> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .published
            .clone()
    }

    /// The published table plus staleness information.
    #[must_use]
    pub fn snapshot(&self) -> TableSnapshot {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        TableSnapshot {
            published: state.published.clone(),
            is_stale: state.published.is_some() && state.last_error.is_some(),
            last_error: state.last_error.clone(),
        }
    }

    /// Refreshes immediately and then every `interval` until `shutdown`
    /// completes, handing the resulting snapshot to `on_cycle` after each
    /// attempt. Failed cycles are logged and do not stop the loop.
    pub async fn run(
        &self,
        interval: Duration,
        shutdown: impl Future<Output = ()>,
        mut on_cycle: impl FnMut(&TableSnapshot),
    ) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    log::info!("Refresh loop for {} stopped", self.feed.describe());
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.refresh().await {
                        log::debug!("Next attempt in {interval:?} after: {e}");
                    }
                    on_cycle(&self.snapshot());
                }
            }
        }
    }
}
