//! Telemetry metric name constants.
//!
//! Centralised metric names for muninn operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `muninn_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `provider`: provider name as configured in the chain
//! - `status`: outcome: "ok" or "error"
//! - `kind`: failure class (see [`FailureKind::as_str`](crate::FailureKind::as_str))
//! - `match`: how a cache hit was found: "exact" or "fuzzy"

/// Total provider calls dispatched by the chain.
///
/// Labels: `provider`, `status` ("ok" | "error").
pub const REQUESTS_TOTAL: &str = "muninn_requests_total";

/// Provider call duration in seconds.
///
/// Labels: `provider`.
pub const REQUEST_DURATION_SECONDS: &str = "muninn_request_duration_seconds";

/// Provider failures that moved the chain on to the next provider.
///
/// Labels: `provider`, `kind`.
pub const FALLBACKS_TOTAL: &str = "muninn_fallbacks_total";

/// Chains that ran out of providers.
///
/// Labels: `kind` (the sanitized failure class).
pub const CHAIN_EXHAUSTED_TOTAL: &str = "muninn_chain_exhausted_total";

/// Total response cache hits.
///
/// Labels: `match`.
pub const CACHE_HITS_TOTAL: &str = "muninn_cache_hits_total";

/// Total response cache misses.
pub const CACHE_MISSES_TOTAL: &str = "muninn_cache_misses_total";

/// Entries removed to stay under the size bound.
pub const CACHE_EVICTIONS_TOTAL: &str = "muninn_cache_evictions_total";

/// Entries removed because their TTL ran out.
pub const CACHE_EXPIRATIONS_TOTAL: &str = "muninn_cache_expirations_total";
