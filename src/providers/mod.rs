//! Provider fallback chain.
//!
//! - [`ProviderAdapter`]: the trait a vendor integration implements.
//! - [`ProviderChain`]: tries adapters in configured order, compacting the
//!   payload for fallbacks, and turns total failure into a sanitized
//!   [`FailureKind`].
//! - [`classify`]: maps vendor error text to a [`FailureKind`] and its user message.
//! - [`compaction`]: payload budgets for fallback attempts.

pub mod chain;
pub mod classify;
pub mod compaction;
pub mod retry;
pub mod traits;

pub use chain::{ChainConfig, ProviderChain, ProviderChainBuilder, ProviderStatus};
pub use classify::{FailureKind, classify_message, sanitize};
pub use compaction::{CompactionConfig, compact, normalize_roles, truncate};
pub use retry::FallbackDelay;
pub use traits::ProviderAdapter;
