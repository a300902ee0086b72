//! Configuration file loading.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. `--config <path>` (CLI flag)
//! 2. `~/.muninn/config.toml` (user)
//! 3. `/etc/muninn/config.toml` (system)
//!
//! Every field has a default, so an empty file (or none at all, via
//! [`Config::load_or_default`]) is a valid configuration. Durations are
//! given in seconds or milliseconds as the field name says.
//!
//! ```toml
//! [cache]
//! dir = "/var/cache/muninn"
//! ttl_secs = 21600
//! max_entries = 5000
//!
//! [chain]
//! primary = "groq"
//! fallbacks = ["gemini", "openai"]
//! attempt_timeout_secs = 30
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::cache::CacheConfig;
use crate::providers::{ChainConfig, CompactionConfig, FallbackDelay};
use crate::{MuninnError, Result};

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub chain: ChainSection,
}

/// `[cache]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheSection {
    /// Directory for the file-backed store (default: `~/.muninn/cache`).
    pub dir: Option<PathBuf>,
    pub ttl_secs: u64,
    pub max_entries: usize,
    pub eviction_batch: usize,
    pub recency_window: usize,
    pub similarity_threshold: f64,
    pub max_fuzzy_chars: usize,
}

impl Default for CacheSection {
    fn default() -> Self {
        let defaults = CacheConfig::default();
        Self {
            dir: None,
            ttl_secs: defaults.ttl.as_secs(),
            max_entries: defaults.max_entries,
            eviction_batch: defaults.eviction_batch,
            recency_window: defaults.recency_window,
            similarity_threshold: defaults.similarity_threshold,
            max_fuzzy_chars: defaults.max_fuzzy_chars,
        }
    }
}

/// `[chain]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChainSection {
    pub primary: String,
    pub fallbacks: Vec<String>,
    pub attempt_timeout_secs: u64,
    pub total_deadline_secs: Option<u64>,
    pub fast_mode: bool,
    pub max_system_chars: usize,
    pub max_recent_turns: usize,
    pub max_turn_chars: usize,
    /// Pause after the first failure; 0 disables pauses.
    pub fallback_delay_ms: u64,
    pub max_fallback_delay_ms: u64,
}

impl Default for ChainSection {
    fn default() -> Self {
        let chain = ChainConfig::default();
        Self {
            primary: chain.primary,
            fallbacks: chain.fallbacks,
            attempt_timeout_secs: chain.attempt_timeout.as_secs(),
            total_deadline_secs: None,
            fast_mode: chain.fast_mode,
            max_system_chars: chain.compaction.max_system_chars,
            max_recent_turns: chain.compaction.max_recent_turns,
            max_turn_chars: chain.compaction.max_turn_chars,
            fallback_delay_ms: chain.fallback_delay.initial_delay.as_millis() as u64,
            max_fallback_delay_ms: chain.fallback_delay.max_delay.as_millis() as u64,
        }
    }
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided)
    /// 2. `~/.muninn/config.toml`
    /// 3. `/etc/muninn/config.toml`
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_config_path(explicit_path)?;
        Self::load_from_file(&path)
    }

    /// Like [`load`](Self::load), but falls back to defaults when no file
    /// exists in the standard locations. An explicit path must still exist.
    pub fn load_or_default(explicit_path: Option<&Path>) -> Result<Self> {
        match Self::resolve_config_path(explicit_path) {
            Ok(path) => Self::load_from_file(&path),
            Err(_) if explicit_path.is_none() => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| MuninnError::Configuration(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            MuninnError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            MuninnError::Configuration(msg) => {
                MuninnError::Configuration(format!("{path:?}: {msg}"))
            }
            other => other,
        })
    }

    /// Resolve the config file path.
    fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(path.to_path_buf());
            }
            return Err(MuninnError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        // User config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".muninn").join("config.toml");
            if user_config.exists() {
                return Ok(user_config);
            }
        }

        // System config
        let system_config = PathBuf::from("/etc/muninn/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }

        Err(MuninnError::Configuration(
            "No config file found. Create ~/.muninn/config.toml or /etc/muninn/config.toml"
                .to_string(),
        ))
    }

    /// Reject values that parse but make no sense.
    pub fn validate(&self) -> Result<()> {
        let cache = &self.cache;
        if cache.max_entries == 0 {
            return Err(MuninnError::Configuration(
                "cache.max_entries must be at least 1".into(),
            ));
        }
        if cache.ttl_secs == 0 {
            return Err(MuninnError::Configuration(
                "cache.ttl_secs must be at least 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&cache.similarity_threshold) {
            return Err(MuninnError::Configuration(format!(
                "cache.similarity_threshold must be within 0.0..=1.0, got {}",
                cache.similarity_threshold
            )));
        }
        if self.chain.attempt_timeout_secs == 0 {
            return Err(MuninnError::Configuration(
                "chain.attempt_timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Directory for the file-backed cache store.
    pub fn cache_dir(&self) -> PathBuf {
        self.cache.dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .map(|home| home.join(".muninn").join("cache"))
                .unwrap_or_else(|| PathBuf::from(".muninn-cache"))
        })
    }

    pub fn cache_config(&self) -> CacheConfig {
        let c = &self.cache;
        CacheConfig::new()
            .ttl(Duration::from_secs(c.ttl_secs))
            .max_entries(c.max_entries)
            .eviction_batch(c.eviction_batch)
            .recency_window(c.recency_window)
            .similarity_threshold(c.similarity_threshold)
            .max_fuzzy_chars(c.max_fuzzy_chars)
    }

    pub fn chain_config(&self) -> ChainConfig {
        let c = &self.chain;
        let mut config = ChainConfig::new(c.primary.clone())
            .fallbacks(c.fallbacks.iter().cloned())
            .attempt_timeout(Duration::from_secs(c.attempt_timeout_secs))
            .fast_mode(c.fast_mode)
            .compaction(
                CompactionConfig::new()
                    .max_system_chars(c.max_system_chars)
                    .max_recent_turns(c.max_recent_turns)
                    .max_turn_chars(c.max_turn_chars),
            )
            .fallback_delay(
                FallbackDelay::new()
                    .initial_delay(Duration::from_millis(c.fallback_delay_ms))
                    .max_delay(Duration::from_millis(c.max_fallback_delay_ms)),
            );
        if let Some(secs) = c.total_deadline_secs {
            config = config.total_deadline(Duration::from_secs(secs));
        }
        config
    }
}
