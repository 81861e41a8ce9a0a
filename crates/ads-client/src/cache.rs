//! Region-partitioned in-memory response cache.
//!
//! Successful reads are stored under a key derived from the method, path,
//! sorted query and (for list-style POST reads) the canonical JSON body.
//! Mutations invalidate by resource prefix within their own region only.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::region::Region;
use crate::request::RequestMethod;

const ACTION_SEGMENTS: &[&str] = &["list", "delete", "create", "update"];

/// Build the cache key for a read.
pub fn cache_key(
    method: RequestMethod,
    path: &str,
    query: &[(String, String)],
    body: Option<&serde_json::Value>,
) -> String {
    let mut pairs: Vec<&(String, String)> = query.iter().collect();
    pairs.sort();
    let query = pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    // serde_json maps are ordered, so this serialization is canonical.
    let body = body.map(|b| b.to_string()).unwrap_or_default();

    format!("{} {}?{}#{}", method, strip_query(path), query, body)
}

/// The resource family a path belongs to.
///
/// Trailing action words and identifiers are dropped, so
/// `/sp/campaigns/delete` and `/sp/campaigns/123` both map to `/sp/campaigns`.
pub fn resource_prefix(path: &str) -> String {
    let mut segments: Vec<&str> = strip_query(path)
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();

    while segments.len() > 1 {
        let Some(last) = segments.last() else { break };
        if ACTION_SEGMENTS.contains(&last.to_ascii_lowercase().as_str()) || is_identifier(last) {
            segments.pop();
        } else {
            break;
        }
    }

    format!("/{}", segments.join("/"))
}

fn strip_query(path: &str) -> &str {
    path.split('?').next().unwrap_or(path)
}

fn is_identifier(segment: &str) -> bool {
    if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
        return true;
    }

    // 8-4-4-4-12 hex
    let bytes = segment.as_bytes();
    bytes.len() == 36
        && bytes.iter().enumerate().all(|(i, b)| match i {
            8 | 13 | 18 | 23 => *b == b'-',
            _ => b.is_ascii_hexdigit(),
        })
}

/// True when `path` is `prefix` itself or lies under it.
fn under_prefix(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return true;
    }
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

#[derive(Debug, Clone)]
struct CacheEntry {
    path: String,
    value: Bytes,
    stored_at: DateTime<Utc>,
    ttl: Duration,
}

impl CacheEntry {
    fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        match (now - self.stored_at).to_std() {
            Ok(age) => age < self.ttl,
            // Clock went backwards; treat as fresh.
            Err(_) => true,
        }
    }
}

/// Entries of one region. `generation` is bumped by every invalidation.
#[derive(Debug, Default)]
struct Partition {
    entries: HashMap<String, CacheEntry>,
    generation: u64,
}

/// In-memory cache of successful read responses.
#[derive(Debug)]
pub struct ResponseCache {
    partitions: Mutex<HashMap<Region, Partition>>,
    clock: Arc<dyn Clock>,
    default_ttl: Duration,
    enabled: bool,
}

impl ResponseCache {
    pub fn new(default_ttl: Duration) -> Self {
        Self::with_clock(default_ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(default_ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            partitions: Mutex::new(HashMap::new()),
            clock,
            default_ttl,
            enabled: true,
        }
    }

    /// A cache that stores nothing.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::new(Duration::ZERO)
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Region, Partition>> {
        self.partitions.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Return a live entry. Expired entries are evicted on lookup.
    pub fn get(&self, region: Region, key: &str) -> Option<Bytes> {
        if !self.enabled {
            return None;
        }

        let now = self.clock.now();
        let mut partitions = self.lock();
        let partition = partitions.get_mut(&region)?;

        match partition.entries.get(key) {
            Some(entry) if entry.is_live_at(now) => Some(entry.value.clone()),
            Some(_) => {
                partition.entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store a value. `ttl` defaults to the cache's configured TTL.
    pub fn set(
        &self,
        region: Region,
        key: impl Into<String>,
        path: &str,
        value: Bytes,
        ttl: Option<Duration>,
    ) {
        if !self.enabled {
            return;
        }

        let entry = self.entry(path, value, ttl);
        self.lock()
            .entry(region)
            .or_default()
            .entries
            .insert(key.into(), entry);
    }

    /// Invalidation counter of `region`, read before sending a request.
    pub fn generation(&self, region: Region) -> u64 {
        self.lock().get(&region).map(|p| p.generation).unwrap_or(0)
    }

    /// Store a value only if `region` saw no invalidation since `generation`
    /// was read. Returns whether the value was stored.
    pub fn set_if_generation(
        &self,
        region: Region,
        generation: u64,
        key: impl Into<String>,
        path: &str,
        value: Bytes,
        ttl: Option<Duration>,
    ) -> bool {
        if !self.enabled {
            return false;
        }

        let entry = self.entry(path, value, ttl);
        let mut partitions = self.lock();
        let partition = partitions.entry(region).or_default();
        if partition.generation != generation {
            debug!(region = %region, path, "Cache invalidated in flight, not storing");
            return false;
        }
        partition.entries.insert(key.into(), entry);
        true
    }

    fn entry(&self, path: &str, value: Bytes, ttl: Option<Duration>) -> CacheEntry {
        CacheEntry {
            path: strip_query(path).to_string(),
            value,
            stored_at: self.clock.now(),
            ttl: ttl.unwrap_or(self.default_ttl),
        }
    }

    /// Remove every entry in `region` whose path lies under `prefix`.
    pub fn invalidate(&self, region: Region, prefix: &str) -> usize {
        let mut partitions = self.lock();
        let partition = partitions.entry(region).or_default();
        partition.generation += 1;

        let before = partition.entries.len();
        partition.entries.retain(|_, entry| !under_prefix(&entry.path, prefix));
        let removed = before - partition.entries.len();

        if removed > 0 {
            debug!(region = %region, prefix, removed, "Invalidated cache entries");
        }
        removed
    }

    /// Drop every entry for one region.
    pub fn invalidate_region(&self, region: Region) -> usize {
        let mut partitions = self.lock();
        let partition = partitions.entry(region).or_default();
        partition.generation += 1;
        let removed = partition.entries.len();
        partition.entries.clear();
        removed
    }

    pub fn clear(&self) {
        for partition in self.lock().values_mut() {
            partition.generation += 1;
            partition.entries.clear();
        }
    }

    /// Number of stored entries, including ones that expired but were not yet evicted.
    pub fn len(&self) -> usize {
        self.lock().values().map(|p| p.entries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn cache_with_clock() -> (ResponseCache, ManualClock) {
        let clock = ManualClock::default();
        let cache = ResponseCache::with_clock(Duration::from_secs(300), Arc::new(clock.clone()));
        (cache, clock)
    }

    #[test]
    fn test_key_sorts_query_params() {
        let a = cache_key(
            RequestMethod::Get,
            "/v2/profiles",
            &[("b".into(), "2".into()), ("a".into(), "1".into())],
            None,
        );
        let b = cache_key(
            RequestMethod::Get,
            "/v2/profiles",
            &[("a".into(), "1".into()), ("b".into(), "2".into())],
            None,
        );
        assert_eq!(a, b);
    }

    #[test]
    fn test_key_includes_body_for_list_reads() {
        let filter_a = serde_json::json!({"stateFilter": {"include": ["ENABLED"]}});
        let filter_b = serde_json::json!({"stateFilter": {"include": ["PAUSED"]}});
        let a = cache_key(RequestMethod::Post, "/sp/campaigns/list", &[], Some(&filter_a));
        let b = cache_key(RequestMethod::Post, "/sp/campaigns/list", &[], Some(&filter_b));
        assert_ne!(a, b);
    }

    #[test]
    fn test_resource_prefix() {
        assert_eq!(resource_prefix("/sp/campaigns"), "/sp/campaigns");
        assert_eq!(resource_prefix("/sp/campaigns/list"), "/sp/campaigns");
        assert_eq!(resource_prefix("/sp/campaigns/delete"), "/sp/campaigns");
        assert_eq!(resource_prefix("/sp/campaigns/123456"), "/sp/campaigns");
        assert_eq!(resource_prefix("/v2/profiles?x=1"), "/v2/profiles");
        assert_eq!(
            resource_prefix("/reporting/reports/0b3c6a35-7d3e-4a0b-9a3c-2f1e0d9c8b7a"),
            "/reporting/reports"
        );
        assert_eq!(resource_prefix("/list"), "/list");
    }

    #[test]
    fn test_get_set_roundtrip_and_ttl_expiry() {
        let (cache, clock) = cache_with_clock();
        cache.set(Region::Us, "k", "/sp/campaigns/list", Bytes::from_static(b"[]"), None);

        assert_eq!(cache.get(Region::Us, "k"), Some(Bytes::from_static(b"[]")));

        clock.advance(chrono::Duration::seconds(299));
        assert!(cache.get(Region::Us, "k").is_some());

        clock.advance(chrono::Duration::seconds(1));
        assert!(cache.get(Region::Us, "k").is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_per_entry_ttl() {
        let (cache, clock) = cache_with_clock();
        cache.set(Region::Us, "short", "/a", Bytes::new(), Some(Duration::from_secs(5)));
        clock.advance(chrono::Duration::seconds(5));
        assert!(cache.get(Region::Us, "short").is_none());
    }

    #[test]
    fn test_invalidate_is_segment_aware() {
        let (cache, _) = cache_with_clock();
        cache.set(Region::Us, "list", "/sp/campaigns/list", Bytes::new(), None);
        cache.set(Region::Us, "detail", "/sp/campaigns/42", Bytes::new(), None);
        cache.set(Region::Us, "other", "/sp/campaignsNegativeKeywords/list", Bytes::new(), None);

        let removed = cache.invalidate(Region::Us, "/sp/campaigns");
        assert_eq!(removed, 2);
        assert!(cache.get(Region::Us, "list").is_none());
        assert!(cache.get(Region::Us, "detail").is_none());
        assert!(cache.get(Region::Us, "other").is_some());
    }

    #[test]
    fn test_invalidation_is_region_scoped() {
        let (cache, _) = cache_with_clock();
        cache.set(Region::Us, "k", "/sp/campaigns/list", Bytes::from_static(b"us"), None);
        cache.set(Region::De, "k", "/sp/campaigns/list", Bytes::from_static(b"de"), None);

        cache.invalidate(Region::Us, "/sp/campaigns");
        assert!(cache.get(Region::Us, "k").is_none());
        assert_eq!(cache.get(Region::De, "k"), Some(Bytes::from_static(b"de")));

        assert_eq!(cache.invalidate_region(Region::De), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_disabled_cache_stores_nothing() {
        let cache = ResponseCache::disabled();
        cache.set(Region::Us, "k", "/a", Bytes::from_static(b"x"), None);
        assert!(cache.get(Region::Us, "k").is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_read_racing_an_invalidation_is_not_stored() {
        let (cache, _) = cache_with_clock();
        let before = cache.generation(Region::Us);

        // A mutation lands while the read is in flight.
        cache.invalidate(Region::Us, "/sp/campaigns");

        let stored = cache.set_if_generation(
            Region::Us,
            before,
            "list",
            "/sp/campaigns/list",
            Bytes::from_static(b"stale"),
            None,
        );
        assert!(!stored);
        assert!(cache.get(Region::Us, "list").is_none());

        let current = cache.generation(Region::Us);
        assert!(cache.set_if_generation(
            Region::Us,
            current,
            "list",
            "/sp/campaigns/list",
            Bytes::from_static(b"fresh"),
            None,
        ));
        assert_eq!(cache.get(Region::Us, "list"), Some(Bytes::from_static(b"fresh")));
    }

    #[test]
    fn test_generation_is_region_scoped() {
        let (cache, _) = cache_with_clock();
        let de = cache.generation(Region::De);
        cache.invalidate(Region::Us, "/sp/campaigns");
        assert_eq!(cache.generation(Region::De), de);
        assert!(cache.set_if_generation(Region::De, de, "k", "/sp/campaigns/list", Bytes::new(), None));
    }

    #[test]
    fn test_clear() {
        let (cache, _) = cache_with_clock();
        cache.set(Region::Us, "a", "/a", Bytes::new(), None);
        cache.set(Region::Jp, "b", "/b", Bytes::new(), None);
        assert_eq!(cache.len(), 2);
        cache.clear();
        assert!(cache.is_empty());
    }
}
