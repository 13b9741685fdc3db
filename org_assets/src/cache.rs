//! Process-local, per-org snapshot cache.
//!
//! Readers get an `Arc<OrgAssets>` and never lock anything beyond a shard of
//! the entry map. Entries are not expired actively: a lookup older than the
//! TTL is treated as a miss and replaced.
//!
//! Full builds are single-flight per org. The first caller to miss registers
//! a write-once cell in `loading`; callers arriving while it is registered
//! block on the same cell and receive the same `Result`, success or error.
//! Whoever finishes first removes the registration (only if it is still the
//! same cell), so the next miss after a failure builds from scratch.
//!
//! Partial refreshes ([`AssetCache::get_with_refresh`]) are not deduplicated.
//! Two of them may run at once; the last one to finish wins the entry.

use std::{sync::Arc, time::Instant};

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::{
    assets::{
        AssetError, AssetLoader, AssetSources, OrgAssets, Refresh, SqliteFlowLoader, builder,
    },
    clock::{Clock, SystemClock},
    config::AssetsConfig,
    ids::OrgId,
};

type BuildResult = Result<Arc<OrgAssets>, AssetError>;
type InFlight = Arc<OnceCell<BuildResult>>;

/// Snapshot cache for every org served by this process.
pub struct AssetCache {
    sources: AssetSources,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    entries: DashMap<OrgId, Arc<OrgAssets>>,
    loading: DashMap<OrgId, InFlight>,
}

/// Removes an in-flight registration when the registering call returns,
/// whether the build succeeded, failed or panicked.
struct InFlightGuard<'a> {
    loading: &'a DashMap<OrgId, InFlight>,
    org_id: OrgId,
    cell: &'a InFlight,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.loading
            .remove_if(&self.org_id, |_, current| Arc::ptr_eq(current, self.cell));
    }
}

impl AssetCache {
    /// Cache over `sources`, measuring age with `clock`.
    pub fn new(sources: AssetSources, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            sources,
            clock,
            ttl,
            entries: DashMap::new(),
            loading: DashMap::new(),
        }
    }

    /// Cache configured from `config`: flows come from its SQLite database,
    /// categories from `assets`, time from the system clock.
    pub fn from_config(config: &AssetsConfig, assets: Arc<dyn AssetLoader>) -> Self {
        let sources = AssetSources {
            assets,
            flows: Arc::new(SqliteFlowLoader::new(config.database_url.clone())),
            flow_timeout: config.flow_load_timeout(),
        };
        Self::new(sources, Arc::new(SystemClock), config.cache_ttl())
    }

    /// Entry lifetime.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of orgs with an entry, fresh or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of `org_id`, built in full on a miss.
    pub fn get(&self, org_id: OrgId) -> BuildResult {
        if let Some(hit) = self.fresh(org_id) {
            debug!(org_id = org_id.0, "asset cache hit");
            return Ok(hit);
        }
        self.load_full(org_id)
    }

    /// Snapshot of `org_id` with the categories in `refresh` reloaded.
    ///
    /// Without a fresh entry this is a full build whatever the mask. An empty
    /// mask returns the entry as is. Otherwise the entry is rebuilt with the
    /// other categories inherited, and keeps the entry's build time.
    pub fn get_with_refresh(&self, org_id: OrgId, refresh: Refresh) -> BuildResult {
        let Some(prev) = self.fresh(org_id) else {
            return self.load_full(org_id);
        };
        if refresh.is_empty() {
            return Ok(prev);
        }

        let started = Instant::now();
        let built = builder::build(&self.sources, org_id, Some(&prev), refresh, self.clock.now())
            .inspect_err(|err| {
                warn!(org_id = org_id.0, ?refresh, error = %err, "asset refresh failed");
            })?;
        let built = Arc::new(built);
        self.entries.insert(org_id, Arc::clone(&built));
        info!(
            org_id = org_id.0,
            ?refresh,
            elapsed_ms = elapsed_ms(started),
            "org assets refreshed"
        );
        Ok(built)
    }

    /// Drop every entry.
    pub fn flush(&self) {
        self.entries.clear();
        info!("asset cache flushed");
    }

    fn fresh(&self, org_id: OrgId) -> Option<Arc<OrgAssets>> {
        let entry = self.entries.get(&org_id)?;
        let age = self.clock.now().signed_duration_since(entry.built_at());
        (age < self.ttl).then(|| Arc::clone(entry.value()))
    }

    fn is_fresh_at(&self, built_at: DateTime<Utc>) -> bool {
        self.clock.now().signed_duration_since(built_at) < self.ttl
    }

    fn load_full(&self, org_id: OrgId) -> BuildResult {
        // The map guard must be gone before blocking on the cell, or a
        // finishing builder could not remove its registration.
        let cell: InFlight = Arc::clone(
            self.loading
                .entry(org_id)
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .value(),
        );
        let _guard = InFlightGuard {
            loading: &self.loading,
            org_id,
            cell: &cell,
        };

        cell.get_or_init(|| {
            // another caller may have finished a build between our miss and
            // our registration
            if let Some(hit) = self.fresh(org_id) {
                return Ok(hit);
            }

            let started = Instant::now();
            match builder::build(&self.sources, org_id, None, Refresh::all(), self.clock.now()) {
                Ok(assets) => {
                    let assets = Arc::new(assets);
                    if self.is_fresh_at(assets.built_at()) {
                        self.entries.insert(org_id, Arc::clone(&assets));
                    }
                    info!(
                        org_id = org_id.0,
                        elapsed_ms = elapsed_ms(started),
                        "org assets loaded"
                    );
                    Ok(assets)
                }
                Err(err) => {
                    warn!(org_id = org_id.0, error = %err, "org assets load failed");
                    Err(err)
                }
            }
        })
        .clone()
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
