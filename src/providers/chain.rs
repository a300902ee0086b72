//! Ordered provider fallback chain.
//!
//! The chain holds one optional adapter per configured provider name, in
//! priority order (primary first, then fallbacks, duplicates removed). A
//! request walks the order until one provider returns a usable completion.
//!
//! # Fallback flow
//!
//! ```text
//! complete(messages, tools)
//!        │
//!        ▼
//!  ┌──────────────┐  unavailable (no adapter) ──► record, skip, no pause
//!  │  position 0  │  raw payload (compacted in fast mode)
//!  └──────┬───────┘
//!         │ error / timeout / empty ──► record {provider, kind}, pause
//!         ▼
//!  ┌──────────────┐
//!  │  position 1+ │  compacted payload
//!  └──────┬───────┘
//!         │ ... out of providers
//!         ▼
//!  sanitize(attempts) ──► MuninnError::Exhausted { kind, attempts }
//! ```
//!
//! Every failure is absorbed and logged with its raw vendor detail; the
//! caller only ever sees a [`FailureKind`] and its fixed user message.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use super::classify::{FailureKind, sanitize};
use super::compaction::{CompactionConfig, compact, normalize_roles};
use super::retry::FallbackDelay;
use super::traits::ProviderAdapter;
use crate::error::AttemptFailure;
use crate::telemetry;
use crate::types::{ChainResponse, Message, ProviderCapabilities, ToolDefinition};
use crate::{MuninnError, Result};

/// Chain configuration.
///
/// ```rust
/// # use muninn::ChainConfig;
/// # use std::time::Duration;
/// let config = ChainConfig::new("groq")
///     .fallbacks(["gemini", "openai", "groq"])
///     .attempt_timeout(Duration::from_secs(30));
/// assert_eq!(config.provider_order(), vec!["groq", "gemini", "openai"]);
/// ```
#[derive(Debug, Clone)]
pub struct ChainConfig {
    /// First provider tried.
    pub primary: String,
    /// Tried in order after the primary.
    pub fallbacks: Vec<String>,
    /// Bound on a single provider call. Default: 60s.
    pub attempt_timeout: Duration,
    /// Bound on the whole chain, pauses included. Default: none.
    pub total_deadline: Option<Duration>,
    /// Compact the payload for the primary too. Default: false.
    pub fast_mode: bool,
    pub compaction: CompactionConfig,
    pub fallback_delay: FallbackDelay,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            primary: String::new(),
            fallbacks: Vec::new(),
            attempt_timeout: Duration::from_secs(60),
            total_deadline: None,
            fast_mode: false,
            compaction: CompactionConfig::default(),
            fallback_delay: FallbackDelay::default(),
        }
    }
}

impl ChainConfig {
    pub fn new(primary: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            ..Self::default()
        }
    }

    /// Replace the fallback list.
    pub fn fallbacks<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fallbacks = names.into_iter().map(Into::into).collect();
        self
    }

    /// Append one fallback.
    pub fn fallback(mut self, name: impl Into<String>) -> Self {
        self.fallbacks.push(name.into());
        self
    }

    pub fn attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn total_deadline(mut self, deadline: Duration) -> Self {
        self.total_deadline = Some(deadline);
        self
    }

    pub fn fast_mode(mut self, enabled: bool) -> Self {
        self.fast_mode = enabled;
        self
    }

    pub fn compaction(mut self, compaction: CompactionConfig) -> Self {
        self.compaction = compaction;
        self
    }

    pub fn fallback_delay(mut self, delay: FallbackDelay) -> Self {
        self.fallback_delay = delay;
        self
    }

    /// Primary then fallbacks, first occurrence wins, blank names dropped.
    pub fn provider_order(&self) -> Vec<&str> {
        let mut order: Vec<&str> = Vec::with_capacity(self.fallbacks.len() + 1);
        for name in std::iter::once(&self.primary).chain(&self.fallbacks) {
            let name = name.trim();
            if !name.is_empty() && !order.contains(&name) {
                order.push(name);
            }
        }
        order
    }
}

/// Availability of one provider in the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderStatus {
    pub name: String,
    /// Whether an adapter was constructed for it.
    pub available: bool,
    /// Declared capabilities; `None` when the provider was never registered.
    pub capabilities: Option<ProviderCapabilities>,
}

struct Registered {
    adapter: Option<Arc<dyn ProviderAdapter>>,
    capabilities: ProviderCapabilities,
}

struct Slot {
    name: String,
    adapter: Option<Arc<dyn ProviderAdapter>>,
    capabilities: Option<ProviderCapabilities>,
}

/// Builder for [`ProviderChain`].
///
/// Adapters are registered by name; the config decides which of them are
/// used and in what order. Registering a name that is not in the order is
/// harmless.
///
/// ```rust,ignore
/// let chain = ProviderChain::builder(ChainConfig::new("groq").fallback("gemini"))
///     .adapter(Arc::new(GroqAdapter::new(key)))
///     .register("gemini", ProviderCapabilities::full(), || {
///         Ok(Arc::new(GeminiAdapter::from_env()?))
///     })
///     .build();
/// ```
pub struct ProviderChainBuilder {
    config: ChainConfig,
    registered: HashMap<String, Registered>,
}

impl ProviderChainBuilder {
    /// Register a ready adapter under its own name.
    pub fn adapter(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        let name = adapter.name().to_owned();
        let capabilities = adapter.capabilities();
        self.registered.insert(
            name,
            Registered {
                adapter: Some(adapter),
                capabilities,
            },
        );
        self
    }

    /// Register a provider through a constructor.
    ///
    /// The constructor runs now. If it fails (missing key, bad endpoint) the
    /// provider stays in the order but is reported unavailable and skipped.
    /// `capabilities` is what the chain reports and dispatches on, whatever
    /// the constructed adapter declares.
    pub fn register<F>(
        mut self,
        name: impl Into<String>,
        capabilities: ProviderCapabilities,
        factory: F,
    ) -> Self
    where
        F: FnOnce() -> Result<Arc<dyn ProviderAdapter>>,
    {
        let name = name.into();
        let adapter = match factory() {
            Ok(adapter) => Some(adapter),
            Err(e) => {
                warn!(provider = %name, error = %e, "provider adapter construction failed");
                None
            }
        };
        self.registered.insert(
            name,
            Registered {
                adapter,
                capabilities,
            },
        );
        self
    }

    pub fn build(mut self) -> ProviderChain {
        let slots: Vec<Slot> = self
            .config
            .provider_order()
            .into_iter()
            .map(|name| match self.registered.remove(name) {
                Some(r) => Slot {
                    name: name.to_owned(),
                    adapter: r.adapter,
                    capabilities: Some(r.capabilities),
                },
                None => Slot {
                    name: name.to_owned(),
                    adapter: None,
                    capabilities: None,
                },
            })
            .collect();

        let available = slots.iter().filter(|s| s.adapter.is_some()).count();
        debug!(providers = slots.len(), available, "provider chain built");
        ProviderChain {
            config: self.config,
            slots,
        }
    }
}

/// Ordered fallback over completion providers.
///
/// Holds no per-request state; share it behind an `Arc`.
pub struct ProviderChain {
    config: ChainConfig,
    slots: Vec<Slot>,
}

impl ProviderChain {
    pub fn builder(config: ChainConfig) -> ProviderChainBuilder {
        ProviderChainBuilder {
            config,
            registered: HashMap::new(),
        }
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// Configured provider names, in the order they are tried.
    pub fn provider_order(&self) -> Vec<&str> {
        self.slots.iter().map(|s| s.name.as_str()).collect()
    }

    /// Availability of every configured provider. Makes no calls.
    pub fn provider_status(&self) -> Vec<ProviderStatus> {
        self.slots
            .iter()
            .map(|s| ProviderStatus {
                name: s.name.clone(),
                available: s.adapter.is_some(),
                capabilities: s.capabilities,
            })
            .collect()
    }

    /// Run the request through the chain.
    ///
    /// Returns the first non-empty completion. When every provider fails,
    /// returns [`MuninnError::Exhausted`] carrying the sanitized failure kind
    /// and one diagnostic per attempt; its display string is safe to show to
    /// end users.
    #[instrument(skip(self, messages, tools), fields(turns = messages.len()))]
    pub async fn complete(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
    ) -> Result<ChainResponse> {
        if self.slots.is_empty() {
            return Err(MuninnError::NoProvider);
        }

        let deadline = self.config.total_deadline.map(|d| Instant::now() + d);
        let prepared = normalize_roles(messages);
        let compacted = compact(&prepared, &self.config.compaction);

        let mut attempts: Vec<AttemptFailure> = Vec::new();
        let mut call_failures: u32 = 0;

        for (position, slot) in self.slots.iter().enumerate() {
            let Some(adapter) = &slot.adapter else {
                debug!(provider = %slot.name, "provider unavailable, skipping");
                attempts.push(AttemptFailure {
                    provider: slot.name.clone(),
                    kind: FailureKind::ProviderUnavailable,
                });
                continue;
            };

            if call_failures > 0 {
                let pause = self
                    .config
                    .fallback_delay
                    .delay_for_attempt(call_failures - 1);
                let pause = remaining(deadline).map_or(pause, |left| pause.min(left));
                if !pause.is_zero() {
                    tokio::time::sleep(pause).await;
                }
            }

            let budget = match remaining(deadline) {
                Some(left) if left.is_zero() => {
                    warn!(provider = %slot.name, "chain deadline reached before attempt");
                    attempts.push(AttemptFailure {
                        provider: slot.name.clone(),
                        kind: FailureKind::Timeout,
                    });
                    break;
                }
                Some(left) => left.min(self.config.attempt_timeout),
                None => self.config.attempt_timeout,
            };

            let payload = if position == 0 && !self.config.fast_mode {
                &prepared
            } else {
                &compacted
            };
            let supports_tools = slot.capabilities.is_some_and(|c| c.supports_tools);
            let tools = tools.filter(|_| supports_tools);

            let start = Instant::now();
            let outcome = tokio::time::timeout(budget, adapter.complete(payload, tools)).await;
            let (kind, detail) = match outcome {
                Ok(Ok(completion)) if !completion.is_empty() => {
                    record_request(&slot.name, start, true);
                    debug!(provider = %slot.name, position, "provider succeeded");
                    return Ok(ChainResponse {
                        content: completion.content,
                        tool_calls: completion.tool_calls,
                        provider_used: slot.name.clone(),
                    });
                }
                Ok(Ok(_)) => (FailureKind::Unknown, "empty completion".to_owned()),
                Ok(Err(e)) => (e.kind(), e.message().to_owned()),
                Err(_) => (
                    FailureKind::Timeout,
                    format!("attempt timed out after {}ms", budget.as_millis()),
                ),
            };

            record_request(&slot.name, start, false);
            metrics::counter!(telemetry::FALLBACKS_TOTAL,
                "provider" => slot.name.clone(),
                "kind" => kind.as_str(),
            )
            .increment(1);
            warn!(
                provider = %slot.name,
                attempt = position + 1,
                kind = %kind,
                error = %detail,
                "provider attempt failed"
            );
            attempts.push(AttemptFailure {
                provider: slot.name.clone(),
                kind,
            });
            call_failures += 1;
        }

        let kind = sanitize(&attempts);
        metrics::counter!(telemetry::CHAIN_EXHAUSTED_TOTAL, "kind" => kind.as_str()).increment(1);
        warn!(kind = %kind, attempts = attempts.len(), "provider chain exhausted");
        Err(MuninnError::Exhausted { kind, attempts })
    }

    /// [`complete`](Self::complete), abandoned as soon as `cancel` fires.
    ///
    /// The in-flight provider call is dropped and
    /// [`MuninnError::Cancelled`] returned.
    pub async fn complete_with_cancel(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
        cancel: &CancellationToken,
    ) -> Result<ChainResponse> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("chain request cancelled");
                Err(MuninnError::Cancelled)
            }
            result = self.complete(messages, tools) => result,
        }
    }
}

fn remaining(deadline: Option<Instant>) -> Option<Duration> {
    deadline.map(|d| d.saturating_duration_since(Instant::now()))
}

fn record_request(provider: &str, start: Instant, ok: bool) {
    let status = if ok { "ok" } else { "error" };
    metrics::counter!(telemetry::REQUESTS_TOTAL,
        "provider" => provider.to_owned(),
        "status" => status,
    )
    .increment(1);
    metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS,
        "provider" => provider.to_owned(),
    )
    .record(start.elapsed().as_secs_f64());
}
