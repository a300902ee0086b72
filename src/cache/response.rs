//! Semantic response cache.
//!
//! [`ResponseCache`] answers "do we already have a response for this
//! request", scoped per caller, with an expiry and a bounded footprint,
//! while tolerating near-duplicate phrasing.
//!
//! # Lookup
//!
//! 1. The query is [normalized](super::normalize) and hashed together with
//!    the owner id into the primary key. A live entry under that key is a
//!    hit.
//! 2. Otherwise the most recent `recency_window` writes are scanned. A
//!    candidate must belong to the same owner (when one is given) and carry
//!    exactly the same 3+ digit numbers as the query, in the same order.
//!    Survivors are scored with [`similarity::ratio`](super::similarity::ratio)
//!    on a blocking thread after the index lock is released, and the best
//!    one at or above `similarity_threshold` wins, newest first on ties.
//!
//! The scan window is what keeps lookup cost flat as the cache grows; it
//! biases fuzzy hits towards recent questions. Queries longer than
//! `max_fuzzy_chars` skip the fuzzy step.
//!
//! # Storage layout
//!
//! One index record (key [`INDEX_KEY`]) plus one payload record per entry,
//! keyed by the entry's hex digest. The index is rewritten in full on every
//! mutation. Payload records are immutable once written and are read
//! outside the index lock; a bounded moka layer keeps hot payloads in
//! memory.
//!
//! # Failure handling
//!
//! Storage problems never fail the caller. An unreadable index at open time
//! yields an empty cache, a corrupt or missing payload is treated as a miss
//! and its entry is dropped, and a failed write reports `false`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use moka::future::Cache;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::index::{CacheIndex, IndexEntry};
use super::normalize::{NormalizedQuery, normalize, numeric_tokens};
use super::similarity;
use super::store::{CacheStore, MemoryStore};
use crate::Result;
use crate::telemetry;

/// Store key of the index record.
pub const INDEX_KEY: &str = "index";

/// Configuration for the response cache.
///
/// ```rust
/// # use muninn::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .max_entries(5_000)
///     .ttl(Duration::from_secs(6 * 3600))
///     .similarity_threshold(0.97);
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Time-to-live for cached entries. Default: 24 hours.
    pub ttl: Duration,
    /// Maximum number of indexed entries. Default: 1,000.
    pub max_entries: usize,
    /// Entries evicted at once when the cache is full. Default: 50.
    pub eviction_batch: usize,
    /// How many recent writes the fuzzy scan looks at. Default: 100.
    pub recency_window: usize,
    /// Minimum similarity ratio for a fuzzy hit. Default: 0.95.
    pub similarity_threshold: f64,
    /// Normalized queries longer than this (in chars) only match exactly.
    /// Default: 512.
    pub max_fuzzy_chars: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(24 * 3600),
            max_entries: 1_000,
            eviction_batch: 50,
            recency_window: 100,
            similarity_threshold: 0.95,
            max_fuzzy_chars: 512,
        }
    }
}

impl CacheConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the time-to-live for cached entries.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the maximum number of cached entries.
    pub fn max_entries(mut self, n: usize) -> Self {
        self.max_entries = n;
        self
    }

    /// Set how many entries are evicted when the cache is full.
    pub fn eviction_batch(mut self, n: usize) -> Self {
        self.eviction_batch = n;
        self
    }

    /// Set the fuzzy-scan window.
    pub fn recency_window(mut self, n: usize) -> Self {
        self.recency_window = n;
        self
    }

    /// Set the fuzzy-match threshold (clamped to `0.0..=1.0`).
    pub fn similarity_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Set the longest normalized query that is still fuzzy matched.
    pub fn max_fuzzy_chars(mut self, n: usize) -> Self {
        self.max_fuzzy_chars = n;
        self
    }
}

/// Cache counters and size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    /// `hits / (hits + misses)`, or 0.0 before the first lookup.
    pub hit_rate: f64,
}

/// Payload record as persisted.
#[derive(Serialize, Deserialize)]
struct PayloadRecord<P> {
    query: String,
    created_at_ms: u64,
    payload: P,
}

/// A fuzzy candidate copied out of the index for scoring.
struct Candidate {
    key: String,
    seq: u64,
    normalized_query: String,
}

/// A candidate picked by the index scan, read outside the lock.
struct Matched {
    key: String,
    seq: u64,
    kind: &'static str,
}

/// Semantic response cache over any [`CacheStore`].
///
/// Generic over the payload type; anything serde can round-trip works.
/// Cheap to share: wrap it in an `Arc` and hand it to every request handler.
pub struct ResponseCache<P> {
    config: CacheConfig,
    store: Arc<dyn CacheStore>,
    index: Mutex<CacheIndex>,
    hot: Cache<String, P>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<P> ResponseCache<P>
where
    P: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Open a cache over `store`, loading its index.
    ///
    /// A missing index starts an empty cache. An unreadable or corrupt one
    /// is discarded (with a warning) and also starts empty.
    pub async fn open(store: Arc<dyn CacheStore>, config: CacheConfig) -> Self {
        let index = match store.read(INDEX_KEY).await {
            Ok(Some(bytes)) => match CacheIndex::from_bytes(&bytes) {
                Ok(index) => index,
                Err(e) => {
                    warn!(store = store.name(), error = %e, "discarding corrupt cache index");
                    if let Err(e) = store.delete(INDEX_KEY).await {
                        warn!(store = store.name(), error = %e, "failed to delete corrupt index");
                    }
                    CacheIndex::default()
                }
            },
            Ok(None) => CacheIndex::default(),
            Err(e) => {
                warn!(store = store.name(), error = %e, "cache index unreadable, starting empty");
                CacheIndex::default()
            }
        };
        debug!(store = store.name(), entries = index.len(), "response cache opened");

        let hot = Cache::builder()
            .max_capacity(config.max_entries.max(1) as u64)
            .time_to_live(config.ttl)
            .build();

        Self {
            config,
            store,
            index: Mutex::new(index),
            hot,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// A cache backed by a fresh [`MemoryStore`].
    pub async fn in_memory(config: CacheConfig) -> Self {
        Self::open(Arc::new(MemoryStore::new()), config).await
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Look up a response for `query`, scoped to `owner_id`.
    ///
    /// Returns `None` on miss. Emits cache hit/miss metrics.
    pub async fn get(&self, query: &str, owner_id: Option<&str>) -> Option<P> {
        let normalized = normalize(query);
        let key = cache_key(owner_id, normalized.as_str());

        let found = match self.find(&key, &normalized, owner_id).await {
            Some(matched) => self.load_payload(matched).await,
            None => None,
        };

        match found {
            Some((payload, kind)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(telemetry::CACHE_HITS_TOTAL, "match" => kind).increment(1);
                debug!(key = %key, kind, "cache hit");
                Some(payload)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
                debug!(key = %key, "cache miss");
                None
            }
        }
    }

    /// Store `payload` as the response for `query`, scoped to `owner_id`.
    ///
    /// Returns whether the entry was written and its index persisted. Once
    /// the payload is stored, the oldest entries are evicted in bulk if the
    /// cache is full.
    pub async fn set(&self, query: &str, payload: P, owner_id: Option<&str>) -> bool {
        let normalized = normalize(query);
        let key = cache_key(owner_id, normalized.as_str());
        let created_at_ms = now_ms();

        let record = PayloadRecord {
            query: query.to_owned(),
            created_at_ms,
            payload,
        };
        let bytes = match serde_json::to_vec(&record) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(key = %key, error = %e, "cache payload not serializable");
                return false;
            }
        };

        let mut index = self.index.lock().await;
        if let Err(e) = self.store.write(&key, &bytes).await {
            warn!(key = %key, error = %e, "failed to write cache payload");
            return false;
        }
        if !index.contains(&key) && index.len() >= self.config.max_entries {
            self.evict_oldest(&mut index).await;
        }
        index.upsert(
            key.clone(),
            normalized.into_string(),
            owner_id.map(str::to_owned),
            created_at_ms,
        );

        if !self.persist(&index).await {
            index.remove(&key);
            self.hot.invalidate(&key).await;
            if let Err(e) = self.store.delete(&key).await {
                warn!(key = %key, error = %e, "failed to delete unindexed cache payload");
            }
            return false;
        }
        self.hot.insert(key.clone(), record.payload).await;
        debug!(key = %key, entries = index.len(), "cache set");
        true
    }

    /// Delete every entry and reset the index.
    pub async fn clear(&self) -> Result<()> {
        let mut index = self.index.lock().await;
        let keys: Vec<String> = index.keys().cloned().collect();
        for key in &keys {
            self.store.delete(key).await?;
        }
        index.clear();
        self.hot.invalidate_all();
        self.store.write(INDEX_KEY, &index.to_bytes()?).await?;
        debug!(removed = keys.len(), "cache cleared");
        Ok(())
    }

    /// Current size and hit/miss counters.
    pub async fn stats(&self) -> CacheStats {
        let entries = self.index.lock().await.len();
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheStats {
            entries,
            hits,
            misses,
            hit_rate: if total == 0 {
                0.0
            } else {
                hits as f64 / total as f64
            },
        }
    }

    /// Number of indexed entries.
    pub async fn len(&self) -> usize {
        self.index.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Delete payload records that no index entry points to.
    ///
    /// Returns the number of records removed.
    pub async fn sweep_orphans(&self) -> Result<usize> {
        let index = self.index.lock().await;
        let mut removed = 0;
        for key in self.store.list().await? {
            if key == INDEX_KEY || index.contains(&key) {
                continue;
            }
            self.store.delete(&key).await?;
            self.hot.invalidate(&key).await;
            removed += 1;
        }
        if removed > 0 {
            debug!(removed, "swept orphaned cache payloads");
        }
        Ok(removed)
    }

    /// Eagerly drop every expired entry instead of waiting for a lookup.
    ///
    /// Returns the number of entries removed.
    pub async fn purge_expired(&self) -> Result<usize> {
        let mut index = self.index.lock().await;
        let now = now_ms();
        let expired: Vec<String> = index
            .most_recent(usize::MAX)
            .filter(|(_, entry)| self.is_expired(entry, now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            index.remove(key);
            self.hot.invalidate(key).await;
            self.store.delete(key).await?;
        }
        if !expired.is_empty() {
            metrics::counter!(telemetry::CACHE_EXPIRATIONS_TOTAL).increment(expired.len() as u64);
            self.store.write(INDEX_KEY, &index.to_bytes()?).await?;
        }
        Ok(expired.len())
    }

    // ------------------------------------------------------------------------
    // internals
    // ------------------------------------------------------------------------

    /// Resolve the entry to serve.
    ///
    /// The exact lookup and the window scan run under the index lock;
    /// similarity scoring does not.
    async fn find(
        &self,
        key: &str,
        normalized: &NormalizedQuery,
        owner_id: Option<&str>,
    ) -> Option<Matched> {
        let candidates = {
            let mut index = self.index.lock().await;
            let now = now_ms();
            let mut expired: Vec<String> = Vec::new();

            let exact = match index.get(key) {
                Some(entry) if !self.is_expired(entry, now) => Some(Matched {
                    key: key.to_owned(),
                    seq: entry.seq,
                    kind: "exact",
                }),
                Some(_) => {
                    expired.push(key.to_owned());
                    None
                }
                None => None,
            };

            let fuzzy = exact.is_none()
                && normalized.as_str().chars().count() <= self.config.max_fuzzy_chars;
            let candidates = if fuzzy {
                self.scan_window(&index, key, normalized, owner_id, now, &mut expired)
            } else {
                Vec::new()
            };

            if !expired.is_empty() {
                self.remove_expired(&mut index, &expired).await;
            }
            if exact.is_some() {
                return exact;
            }
            candidates
        };

        if candidates.is_empty() {
            return None;
        }
        let query = normalized.as_str().to_owned();
        let threshold = self.config.similarity_threshold;
        match tokio::task::spawn_blocking(move || best_candidate(&query, candidates, threshold))
            .await
        {
            Ok(best) => best.map(|(score, candidate)| {
                debug!(key = %candidate.key, score, "fuzzy cache match");
                Matched {
                    key: candidate.key,
                    seq: candidate.seq,
                    kind: "fuzzy",
                }
            }),
            Err(e) => {
                warn!(error = %e, "fuzzy scoring task failed");
                None
            }
        }
    }

    /// Copy out the recent entries that may fuzzy match, newest first.
    ///
    /// Applies every cheap filter: owner, expiry, the numeric guard and the
    /// length bound on the similarity ratio.
    fn scan_window(
        &self,
        index: &CacheIndex,
        key: &str,
        normalized: &NormalizedQuery,
        owner_id: Option<&str>,
        now: u64,
        expired: &mut Vec<String>,
    ) -> Vec<Candidate> {
        let query_len = normalized.as_str().chars().count();
        let mut candidates = Vec::new();
        for (candidate_key, entry) in index.most_recent(self.config.recency_window) {
            if candidate_key == key {
                continue;
            }
            if owner_id.is_some() && entry.owner_id.as_deref() != owner_id {
                continue;
            }
            if self.is_expired(entry, now) {
                expired.push(candidate_key.clone());
                continue;
            }
            if numeric_tokens(&entry.normalized_query) != normalized.numbers() {
                continue;
            }
            let candidate_len = entry.normalized_query.chars().count();
            if similarity::upper_bound(query_len, candidate_len) < self.config.similarity_threshold
            {
                continue;
            }
            candidates.push(Candidate {
                key: candidate_key.clone(),
                seq: entry.seq,
                normalized_query: entry.normalized_query.clone(),
            });
        }
        candidates
    }

    async fn remove_expired(&self, index: &mut CacheIndex, expired: &[String]) {
        for stale in expired {
            index.remove(stale);
            self.hot.invalidate(stale).await;
            if let Err(e) = self.store.delete(stale).await {
                warn!(key = %stale, error = %e, "failed to delete expired cache payload");
            }
        }
        metrics::counter!(telemetry::CACHE_EXPIRATIONS_TOTAL).increment(expired.len() as u64);
        debug!(count = expired.len(), "expired cache entries removed");
        self.persist(index).await;
    }

    /// Fetch a matched payload without holding the index lock.
    async fn load_payload(&self, matched: Matched) -> Option<(P, &'static str)> {
        if let Some(payload) = self.hot.get(&matched.key).await {
            return Some((payload, matched.kind));
        }

        let bytes = match self.store.read(&matched.key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                warn!(key = %matched.key, "cache payload missing, dropping entry");
                self.drop_entry(&matched).await;
                return None;
            }
            Err(e) => {
                // Transient read failure: report a miss but keep the entry.
                warn!(key = %matched.key, error = %e, "cache payload unreadable");
                return None;
            }
        };

        match serde_json::from_slice::<PayloadRecord<P>>(&bytes) {
            Ok(record) => {
                // A set may have replaced the entry while we were reading.
                let index = self.index.lock().await;
                if index
                    .get(&matched.key)
                    .is_some_and(|entry| entry.seq == matched.seq)
                {
                    self.hot
                        .insert(matched.key.clone(), record.payload.clone())
                        .await;
                }
                drop(index);
                Some((record.payload, matched.kind))
            }
            Err(e) => {
                warn!(key = %matched.key, error = %e, "corrupt cache payload, dropping entry");
                self.drop_entry(&matched).await;
                None
            }
        }
    }

    /// Remove an entry whose payload turned out to be unusable, unless it
    /// was rewritten in the meantime.
    async fn drop_entry(&self, matched: &Matched) {
        let mut index = self.index.lock().await;
        if index.remove_if_seq(&matched.key, matched.seq) {
            self.hot.invalidate(&matched.key).await;
            if let Err(e) = self.store.delete(&matched.key).await {
                warn!(key = %matched.key, error = %e, "failed to delete cache payload");
            }
            self.persist(&index).await;
        }
    }

    /// Evict the oldest writes so one more entry fits.
    async fn evict_oldest(&self, index: &mut CacheIndex) {
        let overflow = index.len() + 1 - self.config.max_entries.min(index.len() + 1);
        let count = self.config.eviction_batch.max(overflow).max(1);
        let victims = index.oldest(count);
        for key in &victims {
            index.remove(key);
            self.hot.invalidate(key).await;
            if let Err(e) = self.store.delete(key).await {
                // The payload is now an orphan; `sweep_orphans` collects it.
                warn!(key = %key, error = %e, "failed to delete evicted cache payload");
            }
        }
        metrics::counter!(telemetry::CACHE_EVICTIONS_TOTAL).increment(victims.len() as u64);
        debug!(evicted = victims.len(), "cache full, evicted oldest entries");
    }

    /// Write the full index. Returns `false` (after logging) on failure.
    async fn persist(&self, index: &CacheIndex) -> bool {
        let bytes = match index.to_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "failed to serialize cache index");
                return false;
            }
        };
        match self.store.write(INDEX_KEY, &bytes).await {
            Ok(()) => true,
            Err(e) => {
                warn!(store = self.store.name(), error = %e, "failed to persist cache index");
                false
            }
        }
    }

    fn is_expired(&self, entry: &IndexEntry, now_ms: u64) -> bool {
        // saturating: a wall clock stepping backwards reads as age zero
        Duration::from_millis(now_ms.saturating_sub(entry.created_at_ms)) >= self.config.ttl
    }
}

/// Highest-scoring candidate at or above `threshold`.
///
/// Candidates arrive newest first, so a strict `>` keeps the newest on ties.
fn best_candidate(
    query: &str,
    candidates: Vec<Candidate>,
    threshold: f64,
) -> Option<(f64, Candidate)> {
    let mut best: Option<(f64, Candidate)> = None;
    for candidate in candidates {
        let score = similarity::ratio(&candidate.normalized_query, query);
        if score >= threshold && best.as_ref().is_none_or(|(best_score, _)| score > *best_score) {
            best = Some((score, candidate));
        }
    }
    best
}

/// Primary cache key: SHA-256 of owner id and normalized query.
///
/// A stable digest (not `DefaultHasher`) because keys outlive the process
/// in persistent stores. The unit separator keeps `("ab", "c")` and
/// `("a", "bc")` apart.
pub fn cache_key(owner_id: Option<&str>, normalized_query: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(owner_id.unwrap_or("").as_bytes());
    hasher.update([0x1f]);
    hasher.update(normalized_query.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_deterministic() {
        let k1 = cache_key(Some("u1"), "vendas produto");
        let k2 = cache_key(Some("u1"), "vendas produto");
        assert_eq!(k1, k2);
        assert_eq!(k1.len(), 64);
    }

    #[test]
    fn cache_key_differs_on_owner() {
        assert_ne!(
            cache_key(Some("u1"), "vendas produto"),
            cache_key(Some("u2"), "vendas produto")
        );
        assert_ne!(
            cache_key(None, "vendas produto"),
            cache_key(Some("u1"), "vendas produto")
        );
    }

    #[test]
    fn cache_key_separates_owner_from_query() {
        assert_ne!(cache_key(Some("ab"), "c"), cache_key(Some("a"), "bc"));
    }

    #[test]
    fn absent_owner_hashes_like_empty_owner() {
        assert_eq!(cache_key(None, "q"), cache_key(Some(""), "q"));
    }

    #[test]
    fn config_builder() {
        let config = CacheConfig::new()
            .max_entries(10)
            .eviction_batch(2)
            .recency_window(5)
            .similarity_threshold(1.7)
            .max_fuzzy_chars(64)
            .ttl(Duration::from_secs(60));
        assert_eq!(config.max_entries, 10);
        assert_eq!(config.eviction_batch, 2);
        assert_eq!(config.recency_window, 5);
        assert_eq!(config.similarity_threshold, 1.0);
        assert_eq!(config.max_fuzzy_chars, 64);
        assert_eq!(config.ttl, Duration::from_secs(60));
    }

    fn candidate(key: &str, seq: u64, query: &str) -> Candidate {
        Candidate {
            key: key.into(),
            seq,
            normalized_query: query.into(),
        }
    }

    #[test]
    fn best_candidate_prefers_newest_on_ties() {
        let best = best_candidate(
            "vendas loja x",
            vec![
                candidate("newer", 2, "vendas loja y"),
                candidate("older", 1, "vendas loja z"),
            ],
            0.5,
        );
        assert_eq!(best.map(|(_, c)| c.key).as_deref(), Some("newer"));
    }

    #[test]
    fn best_candidate_respects_threshold() {
        let best = best_candidate("abc", vec![candidate("k", 1, "xyz")], 0.1);
        assert!(best.is_none());
    }

    #[tokio::test]
    async fn eviction_batch_larger_than_needed() {
        let cache: ResponseCache<u32> =
            ResponseCache::in_memory(CacheConfig::new().max_entries(4).eviction_batch(3)).await;
        for (i, q) in ["um 101", "dois 202", "tres 303", "quatro 404", "cinco 505"]
            .iter()
            .enumerate()
        {
            assert!(cache.set(q, i as u32, None).await);
        }
        // 4 entries, full → 3 evicted, 1 kept + the new one
        assert_eq!(cache.len().await, 2);
        assert_eq!(cache.get("quatro 404", None).await, Some(3));
        assert_eq!(cache.get("cinco 505", None).await, Some(4));
        assert!(cache.get("um 101", None).await.is_none());
    }
}
