//! Decoded image cache and per-URL failure bookkeeping.
//!
//! The cache keeps recently shown images so a node that re-enters the
//! viewport, or a second node sharing the same picture, is served without
//! touching the network. The failure tracker bounds retries per URL.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;

use super::image::ImageData;

/// LRU cache of decoded images keyed by URL.
pub struct ImageCache {
    entries: LruCache<String, Arc<ImageData>>,
    hits: u64,
    misses: u64,
}

impl ImageCache {
    /// Create a cache holding at most `capacity` images.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
            hits: 0,
            misses: 0,
        }
    }

    /// Look up a URL, marking it most recently used.
    pub fn get(&mut self, url: &str) -> Option<Arc<ImageData>> {
        match self.entries.get(url) {
            Some(data) => {
                self.hits += 1;
                log::trace!("image cache HIT: {}", url);
                Some(Arc::clone(data))
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn put(&mut self, url: impl Into<String>, data: Arc<ImageData>) {
        self.entries.put(url.into(), data);
    }

    pub fn contains(&self, url: &str) -> bool {
        self.entries.contains(url)
    }

    /// Number of cached images.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cache hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct FailureEntry {
    count: u32,
    first_at: f64,
}

/// Counts failures per URL inside a cooldown window.
///
/// Once `max_retries` failures land inside one window the URL is
/// suppressed until the window, measured from the first failure, elapses.
#[derive(Debug, Clone)]
pub struct FailureTracker {
    max_retries: u32,
    cooldown: f64,
    entries: HashMap<String, FailureEntry>,
}

impl FailureTracker {
    pub fn new(max_retries: u32, cooldown_secs: f64) -> Self {
        Self {
            max_retries: max_retries.max(1),
            cooldown: cooldown_secs.max(0.0),
            entries: HashMap::new(),
        }
    }

    /// Record one failure at `now` (seconds). Returns true when the URL
    /// just became suppressed.
    pub fn record(&mut self, url: &str, now: f64) -> bool {
        let cooldown = self.cooldown;
        let entry = self.entries.entry(url.to_string()).or_insert(FailureEntry {
            count: 0,
            first_at: now,
        });
        if now - entry.first_at >= cooldown {
            *entry = FailureEntry {
                count: 0,
                first_at: now,
            };
        }
        entry.count += 1;
        entry.count == self.max_retries
    }

    pub fn is_suppressed(&self, url: &str, now: f64) -> bool {
        self.entries
            .get(url)
            .is_some_and(|e| e.count >= self.max_retries && now - e.first_at < self.cooldown)
    }

    pub fn failures(&self, url: &str) -> u32 {
        self.entries.get(url).map_or(0, |e| e.count)
    }

    /// Forget a URL after it loaded successfully.
    pub fn clear(&mut self, url: &str) {
        self.entries.remove(url);
    }

    /// Drop windows that have fully elapsed.
    pub fn prune(&mut self, now: f64) {
        let cooldown = self.cooldown;
        self.entries.retain(|_, e| now - e.first_at < cooldown);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(key: &str) -> Arc<ImageData> {
        Arc::new(ImageData {
            key: key.to_string(),
            width: 1,
            height: 1,
            rgba: vec![0; 4],
        })
    }

    #[test]
    fn evicts_least_recently_used() {
        let mut cache = ImageCache::new(2);
        cache.put("a", data("a"));
        cache.put("b", data("b"));
        assert!(cache.get("a").is_some());
        cache.put("c", data("c"));

        assert!(cache.contains("a"));
        assert!(!cache.contains("b"));
        assert_eq!(cache.len(), 2);
        assert!(cache.get("b").is_none());
        assert!((cache.hit_rate() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn zero_capacity_still_holds_one() {
        let mut cache = ImageCache::new(0);
        cache.put("a", data("a"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn suppression_after_max_retries_within_cooldown() {
        let mut t = FailureTracker::new(3, 30.0);
        assert!(!t.record("u", 0.0));
        assert!(!t.record("u", 1.0));
        assert!(!t.is_suppressed("u", 1.0));
        assert!(t.record("u", 2.0));
        assert!(t.is_suppressed("u", 10.0));
        assert!(!t.is_suppressed("other", 10.0));

        // Window measured from the first failure.
        assert!(!t.is_suppressed("u", 30.0));
        assert!(!t.record("u", 31.0));
        assert_eq!(t.failures("u"), 1);
    }

    #[test]
    fn clear_and_prune_forget_urls() {
        let mut t = FailureTracker::new(1, 5.0);
        t.record("a", 0.0);
        t.record("b", 4.0);
        t.clear("a");
        assert!(!t.is_suppressed("a", 1.0));
        t.prune(6.0);
        assert_eq!(t.failures("b"), 1);
        t.prune(9.5);
        assert_eq!(t.failures("b"), 0);
    }
}
