//! Time-expiring snapshot of searchable entries.
//!
//! Lookup order: in-memory snapshot (if younger than the refresh interval),
//! then the on-disk JSON snapshot (judged by file modification time), then a
//! full rebuild from the store. The snapshot is replaced whole — readers hold
//! an `Arc` to the collection they obtained and never observe a half-built
//! one. Concurrent refreshes may race and redundantly rebuild; that is
//! harmless (last write wins on the snapshot file).
//!
//! Any failure along the way degrades to an empty collection and an error
//! log. Callers must never crash because the cache is unavailable.

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, Utc};

use super::score::enrich;
use super::SearchEntry;
use crate::clock::Clock;
use crate::db::SearchSource;

pub const REFRESH_INTERVAL_HOURS: i64 = 24;

struct Snapshot {
    entries: Arc<Vec<SearchEntry>>,
    loaded_at: DateTime<Utc>,
}

pub struct SearchCache {
    store: Arc<dyn SearchSource>,
    clock: Arc<dyn Clock>,
    snapshot_path: PathBuf,
    refresh_interval: Duration,
    slot: RwLock<Option<Snapshot>>,
}

impl SearchCache {
    pub fn new(store: Arc<dyn SearchSource>, clock: Arc<dyn Clock>, snapshot_path: PathBuf) -> Self {
        Self {
            store,
            clock,
            snapshot_path,
            refresh_interval: Duration::hours(REFRESH_INTERVAL_HOURS),
            slot: RwLock::new(None),
        }
    }

    /// Override the 24-hour refresh interval.
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Current snapshot, refreshing if stale or forced. Fails soft: on any
    /// store or filesystem error the result is an empty collection and the
    /// failure goes to the error log.
    pub fn get(&self, force_refresh: bool) -> Arc<Vec<SearchEntry>> {
        match self.load(force_refresh) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::error!("search cache load failed: {err:#}");
                Arc::new(Vec::new())
            }
        }
    }

    fn load(&self, force_refresh: bool) -> Result<Arc<Vec<SearchEntry>>> {
        let now = self.clock.now();

        if !force_refresh {
            let slot = self
                .slot
                .read()
                .map_err(|_| anyhow!("search cache lock poisoned"))?;
            if let Some(snap) = slot.as_ref() {
                if now - snap.loaded_at < self.refresh_interval {
                    return Ok(Arc::clone(&snap.entries));
                }
            }
        }

        if !force_refresh {
            if let Some(entries) = self.try_adopt_disk_snapshot(now)? {
                return Ok(entries);
            }
        }

        self.rebuild(now)
    }

    /// Adopt the on-disk snapshot if it exists, is non-empty, and its file
    /// modification time is within the refresh interval. The mtime becomes
    /// the new cache timestamp so a snapshot written by another process
    /// expires on the same schedule.
    fn try_adopt_disk_snapshot(&self, now: DateTime<Utc>) -> Result<Option<Arc<Vec<SearchEntry>>>> {
        let meta = match std::fs::metadata(&self.snapshot_path) {
            Ok(meta) => meta,
            Err(_) => return Ok(None),
        };
        let modified: DateTime<Utc> = meta
            .modified()
            .context("snapshot file has no modification time")?
            .into();

        if now - modified >= self.refresh_interval {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(&self.snapshot_path)
            .context("failed to read snapshot file")?;
        let entries: Vec<SearchEntry> =
            serde_json::from_str(&raw).context("failed to parse snapshot file")?;
        if entries.is_empty() {
            return Ok(None);
        }

        let entries = Arc::new(entries);
        self.adopt(Arc::clone(&entries), modified)?;
        tracing::debug!(count = entries.len(), "adopted disk search snapshot");
        Ok(Some(entries))
    }

    /// Full rebuild: fetch everything, attach normalized fields, persist the
    /// enriched collection, adopt it in memory.
    fn rebuild(&self, now: DateTime<Utc>) -> Result<Arc<Vec<SearchEntry>>> {
        let mut entries = self
            .store
            .fetch_search_entries()
            .context("failed to fetch search entries from store")?;
        for entry in &mut entries {
            enrich(entry);
        }

        if let Some(parent) = self.snapshot_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(&entries)?;
        std::fs::write(&self.snapshot_path, json).context("failed to write snapshot file")?;

        let entries = Arc::new(entries);
        self.adopt(Arc::clone(&entries), now)?;
        tracing::info!(count = entries.len(), "rebuilt search snapshot from store");
        Ok(entries)
    }

    fn adopt(&self, entries: Arc<Vec<SearchEntry>>, loaded_at: DateTime<Utc>) -> Result<()> {
        let mut slot = self
            .slot
            .write()
            .map_err(|_| anyhow!("search cache lock poisoned"))?;
        *slot = Some(Snapshot { entries, loaded_at });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::test_clock::FixedClock;
    use crate::search::score::normalize;
    use crate::search::EntryKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    struct FakeSource {
        entries: Vec<SearchEntry>,
        fetches: AtomicUsize,
        fail: bool,
    }

    impl FakeSource {
        fn new(entries: Vec<SearchEntry>) -> Self {
            Self {
                entries,
                fetches: AtomicUsize::new(0),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                entries: Vec::new(),
                fetches: AtomicUsize::new(0),
                fail: true,
            }
        }
    }

    impl SearchSource for FakeSource {
        fn fetch_search_entries(&self) -> Result<Vec<SearchEntry>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("store unavailable");
            }
            Ok(self.entries.clone())
        }
    }

    fn raw_entry(name: &str, province: &str) -> SearchEntry {
        SearchEntry {
            id: 0,
            name: name.to_string(),
            province: province.to_string(),
            kind: EntryKind::Park,
            parent_park: None,
            keywords: vec!["Camping".to_string()],
            slug: crate::park::to_slug(name),
            name_norm: String::new(),
            province_norm: String::new(),
            keywords_norm: Vec::new(),
        }
    }

    fn cache_at(
        store: Arc<FakeSource>,
        clock: Arc<FixedClock>,
        dir: &std::path::Path,
    ) -> SearchCache {
        SearchCache::new(store, clock, dir.join("parkSearch.json"))
    }

    #[test]
    fn test_rebuild_attaches_normalized_fields() {
        let dir = tempdir().unwrap();
        let store = Arc::new(FakeSource::new(vec![raw_entry("Forillon", "Québec")]));
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let cache = cache_at(store, clock, dir.path());

        let entries = cache.get(true);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name_norm, normalize("Forillon"));
        assert_eq!(entries[0].province_norm, "quebec");
        assert_eq!(entries[0].keywords_norm, vec!["camping".to_string()]);
    }

    #[test]
    fn test_memory_snapshot_reused_until_expiry() {
        let dir = tempdir().unwrap();
        let store = Arc::new(FakeSource::new(vec![raw_entry("Banff", "Alberta")]));
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let cache = cache_at(Arc::clone(&store), Arc::clone(&clock), dir.path());

        cache.get(false);
        cache.get(false);
        assert_eq!(store.fetches.load(Ordering::SeqCst), 1);

        // Past the refresh interval the disk snapshot is also stale (its
        // mtime is "now" minus 25 hours from the clock's view), so the
        // store is hit again.
        clock.advance(Duration::hours(25));
        cache.get(false);
        assert_eq!(store.fetches.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_force_refresh_bypasses_memory_and_disk() {
        let dir = tempdir().unwrap();
        let store = Arc::new(FakeSource::new(vec![raw_entry("Banff", "Alberta")]));
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let cache = cache_at(Arc::clone(&store), clock, dir.path());

        cache.get(false);
        cache.get(true);
        assert_eq!(store.fetches.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_fresh_disk_snapshot_adopted_without_store_hit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("parkSearch.json");

        // A snapshot written by "another process".
        let mut on_disk = raw_entry("Jasper", "Alberta");
        crate::search::score::enrich(&mut on_disk);
        std::fs::write(&path, serde_json::to_string(&vec![on_disk]).unwrap()).unwrap();

        let store = Arc::new(FakeSource::new(vec![raw_entry("Banff", "Alberta")]));
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let cache = SearchCache::new(Arc::clone(&store) as Arc<dyn SearchSource>, clock, path);

        let entries = cache.get(false);
        assert_eq!(entries[0].name, "Jasper");
        assert_eq!(store.fetches.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_empty_disk_snapshot_triggers_rebuild() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("parkSearch.json");
        std::fs::write(&path, "[]").unwrap();

        let store = Arc::new(FakeSource::new(vec![raw_entry("Banff", "Alberta")]));
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let cache = SearchCache::new(Arc::clone(&store) as Arc<dyn SearchSource>, clock, path);

        let entries = cache.get(false);
        assert_eq!(entries[0].name, "Banff");
        assert_eq!(store.fetches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stale_disk_snapshot_ignored() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("parkSearch.json");
        let mut on_disk = raw_entry("Jasper", "Alberta");
        crate::search::score::enrich(&mut on_disk);
        std::fs::write(&path, serde_json::to_string(&vec![on_disk]).unwrap()).unwrap();

        // Clock two days ahead of the file's real mtime.
        let store = Arc::new(FakeSource::new(vec![raw_entry("Banff", "Alberta")]));
        let clock = Arc::new(FixedClock::new(Utc::now() + Duration::hours(48)));
        let cache = SearchCache::new(Arc::clone(&store) as Arc<dyn SearchSource>, clock, path);

        let entries = cache.get(false);
        assert_eq!(entries[0].name, "Banff");
        assert_eq!(store.fetches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_store_failure_fails_soft() {
        let dir = tempdir().unwrap();
        let store = Arc::new(FakeSource::failing());
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let cache = cache_at(store, clock, dir.path());

        let entries = cache.get(true);
        assert!(entries.is_empty());
        // And the next call tries again rather than caching the failure.
        let entries = cache.get(false);
        assert!(entries.is_empty());
    }

    #[test]
    fn test_readers_keep_their_snapshot_across_refresh() {
        let dir = tempdir().unwrap();
        let store = Arc::new(FakeSource::new(vec![raw_entry("Banff", "Alberta")]));
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let cache = cache_at(store, clock, dir.path());

        let first = cache.get(false);
        let second = cache.get(true);
        // The first reader's Arc still points at the collection it got.
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].name, "Banff");
        assert!(!Arc::ptr_eq(&first, &second));
    }
}
