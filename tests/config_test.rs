//! Tests for loading configuration files.

use std::io::Write;
use std::time::Duration;

use muninn::{Config, MuninnError};
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn loads_explicit_file() {
    let file = write_config(
        r#"
[cache]
dir = "/tmp/muninn-test"
ttl_secs = 60
max_entries = 10
similarity_threshold = 0.9
max_fuzzy_chars = 256

[chain]
primary = "groq"
fallbacks = ["gemini", "openai"]
total_deadline_secs = 90
fast_mode = true
fallback_delay_ms = 0
"#,
    );

    let config = Config::load(Some(file.path())).unwrap();
    assert_eq!(config.cache_dir().to_str(), Some("/tmp/muninn-test"));

    let cache = config.cache_config();
    assert_eq!(cache.ttl, Duration::from_secs(60));
    assert_eq!(cache.max_entries, 10);
    assert_eq!(cache.similarity_threshold, 0.9);
    assert_eq!(cache.max_fuzzy_chars, 256);

    let chain = config.chain_config();
    assert_eq!(chain.provider_order(), vec!["groq", "gemini", "openai"]);
    assert_eq!(chain.total_deadline, Some(Duration::from_secs(90)));
    assert!(chain.fast_mode);
    assert!(chain.fallback_delay.is_disabled());
}

#[test]
fn empty_file_is_all_defaults() {
    let file = write_config("");
    let config = Config::load(Some(file.path())).unwrap();
    assert_eq!(config.cache_config().max_entries, 1000);
    assert_eq!(config.chain_config().attempt_timeout, Duration::from_secs(60));
}

#[test]
fn missing_explicit_path_is_an_error() {
    let path = std::path::Path::new("/nonexistent/muninn/config.toml");
    let err = Config::load_or_default(Some(path)).unwrap_err();
    assert!(matches!(err, MuninnError::Configuration(_)));
}

#[test]
fn invalid_values_name_the_file() {
    let file = write_config("[cache]\nmax_entries = 0\n");
    let err = Config::load(Some(file.path())).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("max_entries"), "{msg}");
    assert!(msg.contains(&file.path().display().to_string()), "{msg}");
}

#[test]
fn unknown_keys_are_rejected() {
    let file = write_config("[cache]\nmax_entrys = 5\n");
    assert!(Config::load(Some(file.path())).is_err());
}
