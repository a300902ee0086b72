//! Muninn - response resilience layer for LLM-backed assistants
//!
//! Two independent services, composed by the caller:
//!
//! - [`ResponseCache`]: a semantic cache keyed on a normalized query and an
//!   optional owner id, with TTL expiry, bulk eviction, and a bounded fuzzy
//!   lookup that never matches across differing identifiers.
//! - [`ProviderChain`]: runs a completion against an ordered list of
//!   [`ProviderAdapter`]s, compacting the payload for fallbacks, and reports
//!   total failure as one sanitized [`FailureKind`].
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use muninn::{
//!     CacheConfig, ChainConfig, ChainResponse, FileStore, Message, ProviderChain,
//!     ResponseCache,
//! };
//!
//! #[tokio::main]
//! async fn main() -> muninn::Result<()> {
//!     let cache: ResponseCache<ChainResponse> = ResponseCache::open(
//!         Arc::new(FileStore::new("/var/cache/muninn")),
//!         CacheConfig::default(),
//!     )
//!     .await;
//!     let chain = ProviderChain::builder(ChainConfig::new("groq").fallback("gemini"))
//!         // .adapter(Arc::new(GroqAdapter::new(key)))
//!         .build();
//!
//!     let question = "Vendas do produto 369946 em 2026-01";
//!     let owner = Some("u1");
//!     if let Some(hit) = cache.get(question, owner).await {
//!         println!("{}", hit.content);
//!         return Ok(());
//!     }
//!
//!     let response = chain.complete(&[Message::user(question)], None).await?;
//!     cache.set(question, response.clone(), owner).await;
//!     println!("{} (via {})", response.content, response.provider_used);
//!     Ok(())
//! }
//! ```
//!
//! On error, `to_string()` of the returned [`MuninnError::Exhausted`] is the
//! user-safe message; nothing vendor-specific leaks through it.

pub mod cache;
pub mod config;
pub mod error;
pub mod providers;
pub mod telemetry;
pub mod types;

// Re-export main types at crate root
pub use cache::{CacheConfig, CacheStats, CacheStore, FileStore, MemoryStore, ResponseCache};
pub use config::Config;
pub use error::{AttemptFailure, MuninnError, ProviderError, Result};
pub use providers::{
    ChainConfig, CompactionConfig, FailureKind, FallbackDelay, ProviderAdapter, ProviderChain,
    ProviderChainBuilder, ProviderStatus,
};

// Re-export all types
pub use types::{
    ChainResponse, Completion, Message, MessageContent, ProviderCapabilities, Role, ToolCall,
    ToolDefinition,
};

// Cancellation handle accepted by `ProviderChain::complete_with_cancel`.
pub use tokio_util::sync::CancellationToken;
