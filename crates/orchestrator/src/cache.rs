//! Time-boxed snapshot of each feature's modules.
//!
//! `get`, `set`, `clear` and `invalidate` only touch memory; `refresh` is the
//! one path that probes the document store.

use chrono::TimeDelta;
use modspec_core::{CachedModuleInfo, ModuleCatalog, ModuleInfo, Result, Time};
use modspec_storage::{DocumentStore, FeatureLayout};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

/// Default entry lifetime.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_millis(300_000);

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Current time.
    fn now(&self) -> Time;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Time {
        chrono::Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    /// Clock stopped at `start`.
    pub fn new(start: Time) -> Self {
        Self {
            millis: AtomicI64::new(start.timestamp_millis()),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        self.millis
            .fetch_add(by.as_millis() as i64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Time {
        Time::from_timestamp_millis(self.millis.load(Ordering::SeqCst)).unwrap_or_default()
    }
}

/// Per-feature module snapshots with expiry.
pub struct ModuleCache<S: DocumentStore + ?Sized> {
    store: Arc<S>,
    layout: FeatureLayout,
    catalog: ModuleCatalog,
    entries: Mutex<HashMap<String, CachedModuleInfo>>,
    clock: Arc<dyn Clock>,
    ttl: TimeDelta,
}

impl<S: DocumentStore + ?Sized> ModuleCache<S> {
    /// Create a cache using the wall clock and the default TTL.
    pub fn new(store: Arc<S>, layout: FeatureLayout, catalog: ModuleCatalog) -> Self {
        Self {
            store,
            layout,
            catalog,
            entries: Mutex::new(HashMap::new()),
            clock: Arc::new(SystemClock),
            ttl: to_delta(DEFAULT_CACHE_TTL),
        }
    }

    /// Use another clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Set the entry lifetime.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = to_delta(ttl);
        self
    }

    /// Snapshot of a feature, or `None` when absent or expired.
    ///
    /// An entry older than the TTL is removed; one exactly TTL old is still
    /// served.
    pub async fn get(&self, feature: &str) -> Option<CachedModuleInfo> {
        let mut entries = self.entries.lock().await;
        let entry = entries.get(feature)?;
        if self.clock.now() - entry.last_updated > self.ttl {
            debug!("Cache entry for {} expired", feature);
            entries.remove(feature);
            return None;
        }
        Some(entry.clone())
    }

    /// Store a snapshot as is.
    pub async fn set(&self, feature: &str, info: CachedModuleInfo) {
        self.entries.lock().await.insert(feature.to_string(), info);
    }

    /// Probe the store for every known module and the legacy document, then
    /// store the result with a fresh timestamp.
    pub async fn refresh(&self, feature: &str) -> Result<CachedModuleInfo> {
        let mut modules = Vec::new();
        for module_type in self.catalog.all_types() {
            let path = self.layout.module(feature, &self.catalog, &module_type)?;
            let file_name = self.catalog.file_name(&module_type);
            let info = match self.store.stat(&path).await {
                Ok(stat) => ModuleInfo {
                    exists: true,
                    last_modified: Some(stat.mtime),
                    file_size: Some(stat.size),
                    ..ModuleInfo::missing(module_type, file_name)
                },
                Err(e) if e.is_not_found() => ModuleInfo::missing(module_type, file_name),
                Err(e) => return Err(e.into()),
            };
            modules.push(info);
        }

        let legacy = self.layout.legacy_design(feature)?;
        let info = CachedModuleInfo {
            modules,
            last_updated: self.clock.now(),
            has_legacy_design: self.store.exists(&legacy).await?,
        };
        debug!(
            "Refreshed cache for {}: {} modules present",
            feature,
            info.existing().count()
        );
        self.set(feature, info.clone()).await;
        Ok(info)
    }

    /// Drop one feature, or every feature when `None`.
    pub async fn clear(&self, feature: Option<&str>) {
        let mut entries = self.entries.lock().await;
        match feature {
            Some(feature) => {
                entries.remove(feature);
            }
            None => entries.clear(),
        }
    }

    /// Drop a feature's snapshot.
    pub async fn invalidate(&self, feature: &str) {
        self.clear(Some(feature)).await;
    }
}

fn to_delta(ttl: Duration) -> TimeDelta {
    TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX)
}
