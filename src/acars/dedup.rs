//! Content-hash deduplication for ACARS/VDL2 ingest.
//!
//! Multiple receivers (and the two demodulators) frequently hear the same
//! transmission; the hash collapses them. Keyed per source so a message
//! legitimately heard on both ACARS and VDL2 is kept on each.

use chrono::{DateTime, Duration, Utc};
use lru::LruCache;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::Mutex;

/// Identity is (whole-second timestamp, ICAO, label, text prefix)
const HASH_TEXT_PREFIX: usize = 50;

/// Compute the content hash used for dedup. Sub-second jitter between
/// receivers must not defeat it, so the timestamp is rounded to the second
/// and only the leading text is significant.
pub fn message_hash(
    timestamp: f64,
    icao_hex: Option<&str>,
    label: Option<&str>,
    text: Option<&str>,
) -> String {
    let text = text.unwrap_or("");
    let prefix_end = text
        .char_indices()
        .nth(HASH_TEXT_PREFIX)
        .map(|(i, _)| i)
        .unwrap_or(text.len());

    let mut hasher = Sha256::new();
    hasher.update((timestamp.floor() as i64).to_le_bytes());
    hasher.update(b"|");
    hasher.update(icao_hex.unwrap_or("").as_bytes());
    hasher.update(b"|");
    hasher.update(label.unwrap_or("").as_bytes());
    hasher.update(b"|");
    hasher.update(text[..prefix_end].as_bytes());
    hex::encode(hasher.finalize())
}

/// LRU of recently seen content hashes with a TTL. Size-bounded so a busy
/// feed cannot grow it without limit; TTL-bounded so a retransmission after
/// the window is treated as new.
pub struct DedupCache {
    entries: Mutex<LruCache<String, DateTime<Utc>>>,
    ttl: Duration,
}

impl DedupCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        DedupCache {
            entries: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).expect("capacity must be non-zero"),
            )),
            ttl,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(10_000, Duration::seconds(30))
    }

    /// Check-and-insert. Returns true when the hash was seen within the TTL.
    pub fn is_duplicate(&self, hash: &str) -> bool {
        self.is_duplicate_at(hash, Utc::now())
    }

    pub fn is_duplicate_at(&self, hash: &str, now: DateTime<Utc>) -> bool {
        let mut entries = self.entries.lock().expect("dedup cache lock poisoned");
        if let Some(seen_at) = entries.get(hash)
            && now.signed_duration_since(*seen_at) < self.ttl
        {
            return true;
        }
        entries.put(hash.to_string(), now);
        false
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("dedup cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_stable_for_identical_messages() {
        let h1 = message_hash(1704067200.0, Some("ABC123"), Some("10"), Some("Test content"));
        let h2 = message_hash(1704067200.0, Some("ABC123"), Some("10"), Some("Test content"));
        assert_eq!(h1, h2);
    }

    #[test]
    fn test_hash_rounds_timestamp_to_second() {
        let h1 = message_hash(1704067200.123, Some("ABC123"), Some("10"), Some("Test"));
        let h2 = message_hash(1704067200.999, Some("ABC123"), Some("10"), Some("Test"));
        assert_eq!(h1, h2);

        let h3 = message_hash(1704067201.0, Some("ABC123"), Some("10"), Some("Test"));
        assert_ne!(h1, h3);
    }

    #[test]
    fn test_hash_varies_by_icao_and_label() {
        let base = message_hash(1704067200.0, Some("ABC123"), Some("10"), Some("Test"));
        assert_ne!(
            base,
            message_hash(1704067200.0, Some("DEF456"), Some("10"), Some("Test"))
        );
        assert_ne!(
            base,
            message_hash(1704067200.0, Some("ABC123"), Some("11"), Some("Test"))
        );
    }

    #[test]
    fn test_hash_truncates_text_to_prefix() {
        let base = "A".repeat(50);
        let h1 = message_hash(
            1704067200.0,
            Some("ABC123"),
            Some("10"),
            Some(&format!("{base}EXTRA_ONE")),
        );
        let h2 = message_hash(
            1704067200.0,
            Some("ABC123"),
            Some("10"),
            Some(&format!("{base}DIFFERENT_TWO")),
        );
        assert_eq!(h1, h2);
    }

    #[test]
    fn test_hash_handles_missing_fields() {
        let h = message_hash(0.0, None, None, None);
        assert_eq!(h.len(), 64);
    }

    #[test]
    fn test_first_sighting_not_duplicate() {
        let cache = DedupCache::with_defaults();
        assert!(!cache.is_duplicate("abc"));
        assert!(cache.is_duplicate("abc"));
    }

    #[test]
    fn test_expired_entry_treated_as_new() {
        let cache = DedupCache::new(100, Duration::seconds(30));
        let t0 = Utc::now();
        assert!(!cache.is_duplicate_at("abc", t0));
        assert!(cache.is_duplicate_at("abc", t0 + Duration::seconds(29)));
        // Past the TTL the same content is new again
        assert!(!cache.is_duplicate_at("abc", t0 + Duration::seconds(61)));
    }

    #[test]
    fn test_capacity_eviction() {
        let cache = DedupCache::new(2, Duration::seconds(30));
        let t0 = Utc::now();
        assert!(!cache.is_duplicate_at("a", t0));
        assert!(!cache.is_duplicate_at("b", t0));
        assert!(!cache.is_duplicate_at("c", t0));
        // "a" was evicted by capacity, so it reads as new
        assert!(!cache.is_duplicate_at("a", t0));
    }
}
