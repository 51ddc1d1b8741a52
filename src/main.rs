//! Persistent Cache - interactive shell
//!
//! Opens a cache from environment configuration, recovers it, and executes
//! one command per stdin line until EOF, `quit`, or Ctrl+C.

use anyhow::{bail, Context};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use persistent_cache::{CacheConfig, KeyValue, PersistentCache};

const HELP: &str = "\
commands:
  set <key> <value> [ttl]   store a value, optional ttl in seconds
  mset <key>=<value> ...    store several values at once
  get <key>                 print a value
  take <key>                print and remove a value
  del <key>                 remove a value
  ttl <key> <seconds>       reset a ttl (0 = never expire)
  getttl <key>              print the absolute expiry in ms
  keys | stats | compact | help | quit";

/// Main entry point for the cache shell.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Open the cache and recover persisted state
/// 4. Serve stdin commands until EOF or Ctrl+C
/// 5. Close the cache, stopping the maintenance task
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "persistent_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = CacheConfig::from_env();
    info!(
        "Configuration loaded: name={}, check_period={}ms, directory={:?}, fsync={:?}",
        config.name, config.check_period_ms, config.directory, config.fsync
    );

    let cache = PersistentCache::open(config)
        .await
        .context("failed to open cache")?;
    let report = cache.recover().await.context("failed to recover cache")?;
    info!(
        "Recovered {} entries and {} logged commands",
        report.restored_entries, report.replayed_commands
    );

    tokio::select! {
        result = serve(&cache) => result?,
        _ = signal::ctrl_c() => info!("Received Ctrl+C, initiating shutdown..."),
    }

    cache.close().await.context("failed to close cache")?;
    info!("Shutdown complete");
    Ok(())
}

async fn serve(cache: &PersistentCache) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.first() == Some(&"quit") {
            break;
        }
        let output = match execute(cache, &words).await {
            Ok(output) => output,
            Err(e) => {
                warn!("Command failed: {:#}", e);
                format!("error: {e:#}")
            }
        };
        if !output.is_empty() {
            stdout.write_all(output.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }
    }
    Ok(())
}

async fn execute(cache: &PersistentCache, words: &[&str]) -> anyhow::Result<String> {
    let show = |value: Option<String>| value.unwrap_or_else(|| "(nil)".to_string());

    Ok(match words {
        [] => String::new(),
        ["set", key, value] => {
            cache.set(*key, *value, None).await?;
            "OK".to_string()
        }
        ["set", key, value, ttl] => {
            let ttl = ttl.parse().context("ttl must be a number of seconds")?;
            cache.set(*key, *value, Some(ttl)).await?;
            "OK".to_string()
        }
        ["mset", pairs @ ..] if !pairs.is_empty() => {
            let entries = pairs
                .iter()
                .map(|pair| match pair.split_once('=') {
                    Some((key, value)) => Ok(KeyValue::new(key, value, None)),
                    None => bail!("expected key=value, got {pair}"),
                })
                .collect::<anyhow::Result<Vec<_>>>()?;
            cache.mset(entries).await?;
            "OK".to_string()
        }
        ["get", key] => show(cache.get(key).await),
        ["take", key] => show(cache.take(key).await?),
        ["del", key] => {
            cache.del(key).await?;
            "OK".to_string()
        }
        ["ttl", key, ttl] => {
            let ttl = ttl.parse().context("ttl must be a number of seconds")?;
            cache.ttl(key, ttl).await?;
            "OK".to_string()
        }
        ["getttl", key] => show(cache.get_ttl(key).await.map(|ms| ms.to_string())),
        ["keys"] => cache.keys().await.join("\n"),
        ["stats"] => {
            let stats = cache.stats().await;
            format!(
                "{} hit_rate={:.2}",
                serde_json::to_string(&stats)?,
                stats.hit_rate()
            )
        }
        ["compact"] => {
            cache.compact().await?;
            "OK".to_string()
        }
        ["help"] => HELP.to_string(),
        _ => bail!("unknown command, try `help`"),
    })
}
