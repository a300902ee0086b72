//! Caching subsystem.
//!
//! - [`ResponseCache`]: the semantic response cache: exact lookup on a
//!   hashed `(owner, normalized query)` key, then a bounded fuzzy scan over
//!   recent writes guarded by the critical-number check. See [`response`]
//!   module docs for lookup order and failure handling.
//!
//! - [`CacheStore`]: where records live. [`FileStore`] for a directory on
//!   disk, [`MemoryStore`] for tests and throwaway caches.
//!
//! - [`normalize`] / [`similarity`]: the pure text functions the cache is
//!   built on, exposed for callers that want to predict cache behavior.

mod index;
pub mod normalize;
pub mod response;
pub mod similarity;
pub mod store;

pub use normalize::{NormalizedQuery, normalize, numeric_tokens};
pub use response::{CacheConfig, CacheStats, INDEX_KEY, ResponseCache, cache_key};
pub use store::{CacheStore, FileStore, MemoryStore};
