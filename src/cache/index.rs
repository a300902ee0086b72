//! The cache index: key → entry metadata, plus write-order bookkeeping.
//!
//! The index is the only source of truth for lookup and eviction order.
//! It is persisted in full as a single record after every mutation; the
//! recency map is derived state rebuilt on load.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// Metadata stored for every cached response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct IndexEntry {
    pub normalized_query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    /// Unix epoch millis at write time.
    pub created_at_ms: u64,
    /// Write sequence number; orders entries written in the same millisecond.
    pub seq: u64,
}

#[derive(Serialize, Deserialize)]
struct IndexRecord {
    version: u32,
    entries: HashMap<String, IndexEntry>,
}

const INDEX_VERSION: u32 = 1;

#[derive(Debug, Default)]
pub(crate) struct CacheIndex {
    entries: HashMap<String, IndexEntry>,
    /// seq → key, oldest first.
    recency: BTreeMap<u64, String>,
    next_seq: u64,
}

impl CacheIndex {
    /// Rebuild an index from its persisted form.
    pub fn from_bytes(bytes: &[u8]) -> serde_json::Result<Self> {
        let record: IndexRecord = serde_json::from_slice(bytes)?;
        let mut ordered: Vec<(String, IndexEntry)> = record.entries.into_iter().collect();
        // Re-sequence by (timestamp, old seq) so the recency map stays dense
        // and consistent even if the stored sequence numbers were not.
        ordered.sort_by_key(|(_, e)| (e.created_at_ms, e.seq));

        let mut index = Self::default();
        for (key, mut entry) in ordered {
            entry.seq = index.bump_seq();
            index.recency.insert(entry.seq, key.clone());
            index.entries.insert(key, entry);
        }
        Ok(index)
    }

    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        #[derive(Serialize)]
        struct IndexRecordRef<'a> {
            version: u32,
            entries: &'a HashMap<String, IndexEntry>,
        }
        serde_json::to_vec(&IndexRecordRef {
            version: INDEX_VERSION,
            entries: &self.entries,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&IndexEntry> {
        self.entries.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    /// Insert or replace an entry; it becomes the most recent write.
    pub fn upsert(
        &mut self,
        key: String,
        normalized_query: String,
        owner_id: Option<String>,
        created_at_ms: u64,
    ) {
        self.remove(&key);
        let seq = self.bump_seq();
        self.recency.insert(seq, key.clone());
        self.entries.insert(
            key,
            IndexEntry {
                normalized_query,
                owner_id,
                created_at_ms,
                seq,
            },
        );
    }

    pub fn remove(&mut self, key: &str) -> Option<IndexEntry> {
        let entry = self.entries.remove(key)?;
        self.recency.remove(&entry.seq);
        Some(entry)
    }

    /// Remove `key` only if it still holds the write identified by `seq`.
    pub fn remove_if_seq(&mut self, key: &str, seq: u64) -> bool {
        if self.entries.get(key).is_some_and(|e| e.seq == seq) {
            self.remove(key);
            true
        } else {
            false
        }
    }

    /// Up to `n` entries, most recent write first.
    pub fn most_recent(&self, n: usize) -> impl Iterator<Item = (&String, &IndexEntry)> {
        self.recency
            .values()
            .rev()
            .take(n)
            .filter_map(|key| self.entries.get_key_value(key))
    }

    /// Keys of the `n` oldest writes.
    pub fn oldest(&self, n: usize) -> Vec<String> {
        self.recency.values().take(n).cloned().collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.recency.clear();
    }

    fn bump_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys_of<'a>(it: impl Iterator<Item = (&'a String, &'a IndexEntry)>) -> Vec<String> {
        it.map(|(k, _)| k.clone()).collect()
    }

    #[test]
    fn upsert_moves_entry_to_most_recent() {
        let mut index = CacheIndex::default();
        index.upsert("a".into(), "qa".into(), None, 1);
        index.upsert("b".into(), "qb".into(), None, 2);
        index.upsert("a".into(), "qa".into(), None, 3);

        assert_eq!(index.len(), 2);
        assert_eq!(keys_of(index.most_recent(10)), vec!["a", "b"]);
        assert_eq!(index.oldest(1), vec!["b"]);
    }

    #[test]
    fn same_millisecond_writes_keep_write_order() {
        let mut index = CacheIndex::default();
        for key in ["a", "b", "c"] {
            index.upsert(key.into(), key.into(), None, 42);
        }
        assert_eq!(index.oldest(2), vec!["a", "b"]);
        assert_eq!(keys_of(index.most_recent(1)), vec!["c"]);
    }

    #[test]
    fn remove_if_seq_ignores_newer_write() {
        let mut index = CacheIndex::default();
        index.upsert("a".into(), "q".into(), None, 1);
        let old_seq = index.get("a").unwrap().seq;
        index.upsert("a".into(), "q".into(), None, 2);

        assert!(!index.remove_if_seq("a", old_seq));
        assert!(index.contains("a"));
    }

    #[test]
    fn persisted_form_round_trips_order() {
        let mut index = CacheIndex::default();
        index.upsert("old".into(), "q1".into(), Some("u1".into()), 10);
        index.upsert("new".into(), "q2".into(), None, 20);

        let restored = CacheIndex::from_bytes(&index.to_bytes().unwrap()).unwrap();
        assert_eq!(restored.len(), 2);
        assert_eq!(restored.oldest(1), vec!["old"]);
        assert_eq!(
            restored.get("old").unwrap().owner_id.as_deref(),
            Some("u1")
        );

        let mut restored = restored;
        restored.upsert("newest".into(), "q3".into(), None, 30);
        assert_eq!(keys_of(restored.most_recent(1)), vec!["newest"]);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(CacheIndex::from_bytes(b"{not json").is_err());
    }
}
