//! Content-addressed analysis cache with single-flight computation.
//!
//! Each key owns a slot behind its own mutex. The map lock is held only
//! to find or create a slot; the slot lock is held while checking
//! freshness and, on a miss, for the whole computation. Concurrent
//! callers for one key therefore wait for the first caller's result
//! instead of repeating the pipeline, while other keys proceed.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

use chrono::{DateTime, TimeDelta, Utc};
use zone_resource_analysis_models::AnalysisResult;

/// Hours a result stays fresh.
pub const DEFAULT_TTL_HOURS: i64 = 24;

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    #[must_use]
    pub const fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Moves the clock forward by `delta`.
    pub fn advance(&self, delta: TimeDelta) {
        let mut now = lock(&self.now);
        *now += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *lock(&self.now)
    }
}

#[derive(Debug)]
struct CachedEntry {
    result: Arc<AnalysisResult>,
    expires_at: DateTime<Utc>,
}

impl CachedEntry {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

type Slot = Arc<Mutex<Option<CachedEntry>>>;

/// Whether a lookup was served from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

/// Time-expiring map from request hash to analysis result.
pub struct AnalysisCache {
    clock: Arc<dyn Clock>,
    ttl: TimeDelta,
    slots: Mutex<BTreeMap<String, Slot>>,
}

impl Default for AnalysisCache {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock), TimeDelta::hours(DEFAULT_TTL_HOURS))
    }
}

impl std::fmt::Debug for AnalysisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisCache")
            .field("ttl", &self.ttl)
            .field("slots", &lock(&self.slots).len())
            .finish_non_exhaustive()
    }
}

impl AnalysisCache {
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, ttl: TimeDelta) -> Self {
        Self {
            clock,
            ttl,
            slots: Mutex::new(BTreeMap::new()),
        }
    }

    /// The cache clock's current time.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    #[must_use]
    pub const fn ttl(&self) -> TimeDelta {
        self.ttl
    }

    /// Returns the fresh result for `key`, dropping it if it has expired.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Arc<AnalysisResult>> {
        let slot = lock(&self.slots).get(key).cloned()?;
        let mut entry = lock(&slot);
        let now = self.clock.now();
        if entry.as_ref().is_some_and(|e| !e.is_fresh(now)) {
            log::debug!("Cache entry {key} expired");
            *entry = None;
        }
        entry.as_ref().map(|e| Arc::clone(&e.result))
    }

    /// Returns the fresh result for `key`, computing and storing it on a
    /// miss. At most one computation runs per key at a time.
    pub fn get_or_insert_with(
        &self,
        key: &str,
        compute: impl FnOnce() -> AnalysisResult,
    ) -> (Arc<AnalysisResult>, CacheStatus) {
        let slot = self.slot(key);
        let mut entry = lock(&slot);

        let now = self.clock.now();
        if let Some(cached) = entry.as_ref().filter(|e| e.is_fresh(now)) {
            log::debug!("Cache hit for {key}");
            return (Arc::clone(&cached.result), CacheStatus::Hit);
        }

        log::debug!("Cache miss for {key}");
        let result = Arc::new(compute());
        *entry = Some(CachedEntry {
            result: Arc::clone(&result),
            expires_at: self.clock.now() + self.ttl,
        });
        (result, CacheStatus::Miss)
    }

    /// Drops every expired entry. Slots with a computation in flight are
    /// left alone. Returns the number of slots removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut slots = lock(&self.slots);
        let before = slots.len();

        slots.retain(|_, slot| match slot.try_lock() {
            Ok(entry) => entry.as_ref().is_some_and(|e| e.is_fresh(now)),
            Err(TryLockError::WouldBlock) => true,
            Err(TryLockError::Poisoned(poisoned)) => poisoned
                .into_inner()
                .as_ref()
                .is_some_and(|e| e.is_fresh(now)),
        });

        let removed = before - slots.len();
        if removed > 0 {
            log::debug!("Purged {removed} expired cache entries");
        }
        removed
    }

    /// Number of slots held, fresh or not.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.slots).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, key: &str) -> Slot {
        Arc::clone(
            lock(&self.slots)
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(None))),
        )
    }
}

/// Locks `mutex`, recovering the data if a previous holder panicked.
/// Entries are written whole, so a poisoned slot never holds a partial
/// value.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    use chrono::TimeZone;

    use super::*;
    use crate::AnalysisOrchestrator;
    use crate::fixtures::{reference_request, start_time};

    fn cached_result() -> AnalysisResult {
        let orchestrator = AnalysisOrchestrator::new();
        let result = orchestrator.analyze(&reference_request()).unwrap();
        AnalysisResult::clone(&result)
    }

    fn manual_cache() -> (Arc<ManualClock>, AnalysisCache) {
        let clock = Arc::new(ManualClock::new(start_time()));
        let cache = AnalysisCache::new(clock.clone(), TimeDelta::hours(DEFAULT_TTL_HOURS));
        (clock, cache)
    }

    #[test]
    fn entries_expire_after_ttl() {
        let (clock, cache) = manual_cache();
        let result = cached_result();

        let (_, status) = cache.get_or_insert_with("k", || result.clone());
        assert_eq!(status, CacheStatus::Miss);

        clock.advance(TimeDelta::hours(23));
        let (_, status) = cache.get_or_insert_with("k", || result.clone());
        assert_eq!(status, CacheStatus::Hit);
        assert!(cache.get("k").is_some());

        clock.advance(TimeDelta::hours(1));
        assert!(cache.get("k").is_none(), "entry should expire at exactly 24h");
        let (_, status) = cache.get_or_insert_with("k", || result.clone());
        assert_eq!(status, CacheStatus::Miss);
    }

    #[test]
    fn purge_removes_only_expired_slots() {
        let (clock, cache) = manual_cache();
        let result = cached_result();

        let _ = cache.get_or_insert_with("old", || result.clone());
        clock.advance(TimeDelta::hours(12));
        let _ = cache.get_or_insert_with("new", || result.clone());
        assert_eq!(cache.len(), 2);

        clock.advance(TimeDelta::hours(13));
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("new").is_some());
        assert!(cache.get("old").is_none());
    }

    #[test]
    fn concurrent_callers_compute_once() {
        let (_, cache) = manual_cache();
        let result = cached_result();
        let computations = AtomicUsize::new(0);

        let statuses: Vec<CacheStatus> = thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        cache
                            .get_or_insert_with("shared", || {
                                computations.fetch_add(1, Ordering::SeqCst);
                                thread::sleep(Duration::from_millis(50));
                                result.clone()
                            })
                            .1
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(computations.load(Ordering::SeqCst), 1);
        assert_eq!(
            statuses.iter().filter(|s| **s == CacheStatus::Miss).count(),
            1
        );
    }

    #[test]
    fn distinct_keys_compute_independently() {
        let (_, cache) = manual_cache();
        let result = cached_result();
        let computations = AtomicUsize::new(0);

        thread::scope(|scope| {
            for key in ["a", "b", "c"] {
                let cache = &cache;
                let computations = &computations;
                let result = &result;
                scope.spawn(move || {
                    cache.get_or_insert_with(key, || {
                        computations.fetch_add(1, Ordering::SeqCst);
                        result.clone()
                    })
                });
            }
        });

        assert_eq!(computations.load(Ordering::SeqCst), 3);
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn manual_clock_advances() {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        clock.advance(TimeDelta::minutes(90));
        assert_eq!(clock.now(), start + TimeDelta::minutes(90));
    }
}
