//! muninn - operate a file-backed response cache
//!
//! Inspection and maintenance for the cache directory a service writes to.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use muninn::{Config, FileStore, ResponseCache};

/// Muninn cache tool
#[derive(Parser)]
#[command(name = "muninn")]
#[command(version)]
#[command(about = "Muninn response cache tool")]
struct Args {
    /// Config file (default: ~/.muninn/config.toml, then /etc/muninn/config.toml)
    #[arg(short, long, env = "MUNINN_CONFIG")]
    config: Option<PathBuf>,

    /// Cache directory (overrides the config file)
    #[arg(long, env = "MUNINN_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the cache directory and entry count
    Stats,

    /// Look up a query the way the service would
    Lookup {
        /// Query text
        query: String,
        /// Owner id the entry was stored under
        #[arg(short, long)]
        owner: Option<String>,
    },

    /// Delete every entry
    Clear,

    /// Delete payload records no index entry points to
    Sweep,

    /// Delete every expired entry now
    Purge,

    /// Print the configured provider order
    Chain,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing (default: warn for CLI; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = Config::load_or_default(args.config.as_deref())?;

    let dir = args.cache_dir.unwrap_or_else(|| config.cache_dir());

    match args.command {
        Command::Stats => {
            let stats = open_cache(&dir, &config).await.stats().await;
            println!("directory: {}", dir.display());
            println!("entries:   {}", stats.entries);
        }
        Command::Lookup { query, owner } => {
            let normalized = muninn::cache::normalize(&query);
            println!("normalized: {}", normalized.as_str());
            match open_cache(&dir, &config).await.get(&query, owner.as_deref()).await {
                Some(payload) => println!("{}", serde_json::to_string_pretty(&payload)?),
                None => {
                    println!("miss");
                    std::process::exit(1);
                }
            }
        }
        Command::Clear => {
            let cache = open_cache(&dir, &config).await;
            let before = cache.len().await;
            cache.clear().await?;
            println!("removed {before} entries");
        }
        Command::Sweep => {
            let removed = open_cache(&dir, &config).await.sweep_orphans().await?;
            println!("removed {removed} orphaned records");
        }
        Command::Purge => {
            let removed = open_cache(&dir, &config).await.purge_expired().await?;
            println!("removed {removed} expired entries");
        }
        Command::Chain => {
            let chain = config.chain_config();
            let order = chain.provider_order();
            if order.is_empty() {
                println!("no providers configured");
            }
            for (position, name) in order.iter().enumerate() {
                let role = if position == 0 { "primary" } else { "fallback" };
                println!("{position}. {name} ({role})");
            }
        }
    }

    Ok(())
}

async fn open_cache(dir: &Path, config: &Config) -> ResponseCache<serde_json::Value> {
    ResponseCache::open(Arc::new(FileStore::new(dir)), config.cache_config()).await
}
