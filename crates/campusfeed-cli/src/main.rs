//! campusfeed - personalized campus content from the command line.
//!
//! Fetches news, sports news, events, blogs and clubs for a preference
//! profile, and manages the offline asset cache.

use std::io;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::{json, Value};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use campusfeed_core::cache::{CacheSource, DiskCacheStorage, HttpFetcher, Request};
use campusfeed_core::content::{ContentStore, Scope};
use campusfeed_core::models::{Category, UserPreference};
use campusfeed_core::utils::truncate_string;
use campusfeed_core::{Config, ContentClient, FeedSession, OfflineCache};

/// Log file name prefix inside the configured log directory
const LOG_FILE_PREFIX: &str = "campusfeed.log";

/// Width of excerpt previews in cache listings
const PREVIEW_WIDTH: usize = 60;

const USAGE: &str = "\
Usage: campusfeed <command> [args]

Commands:
  feed <preference.json>          Fetch every personalized category for a preference file
  search <category> <terms...>    Search one category
  all <category>                  List every document of a category
  cache install                   Pre-cache the install manifest
  cache activate                  Delete every cache namespace but the live one
  cache get <url>                 Fetch a URL through the offline cache
  cache list                      List entries in the live namespace
  config show                     Print the effective configuration
  config init                     Write the effective configuration to the config file

Categories: news, sportsNews, events, blogs, clubs";

/// Initialize the tracing subscriber for logging.
/// Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug).
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let config = Config::load()?;
    let _log_guard = init_tracing(config.log_dir.as_deref());

    let args: Vec<String> = std::env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    info!(?args, "campusfeed starting");

    match args.as_slice() {
        ["feed", path] => feed(&config, Path::new(path)).await,
        ["search", category, terms @ ..] if !terms.is_empty() => {
            search(&config, parse_category(category)?, &terms.join(" ")).await
        }
        ["all", category] => all(&config, parse_category(category)?).await,
        ["cache", action, rest @ ..] => cache(&config, action, rest).await,
        ["config", "show"] => print_json(&serde_json::to_value(&config)?),
        ["config", "init"] => {
            config.save()?;
            eprintln!("Wrote {}", Config::config_path()?.display());
            Ok(())
        }
        ["help"] | ["--help"] | ["-h"] => {
            println!("{}", USAGE);
            Ok(())
        }
        _ => {
            eprintln!("{}", USAGE);
            anyhow::bail!("invalid arguments")
        }
    }
}

fn parse_category(raw: &str) -> Result<Category> {
    raw.parse::<Category>().map_err(anyhow::Error::msg)
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Fetch every personalized slice for a preference file and print them.
async fn feed(config: &Config, path: &Path) -> Result<()> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read preference file: {}", path.display()))?;
    let preference: UserPreference = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse preference file: {}", path.display()))?;

    let client = ContentClient::from_config(config)?;
    let mut session = FeedSession::new(client);
    session.start();
    session.set_preference(preference);
    session.wait_until_settled(Scope::Personalized).await;

    for (category, reason) in session.store().failures(Scope::Personalized) {
        eprintln!("Warning: {} failed: {}", category, reason);
    }
    print_json(&slices_json(session.store(), Scope::Personalized)?)
}

fn slices_json(store: &ContentStore, scope: Scope) -> Result<Value> {
    let mut out = serde_json::Map::new();
    for category in Category::ALL {
        let slice = store.slice(scope, category);
        let items = serde_json::to_value(&slice.items)?;
        out.insert(
            category.slice_name().to_string(),
            json!({ "status": slice.status.to_string(), "items": items }),
        );
    }
    Ok(Value::Object(out))
}

async fn search(config: &Config, category: Category, terms: &str) -> Result<()> {
    let client = ContentClient::from_config(config)?;
    let items = client.fetch_category(category, terms).await?;
    print_json(&serde_json::to_value(items)?)
}

async fn all(config: &Config, category: Category) -> Result<()> {
    let client = ContentClient::from_config(config)?;
    let items = client.fetch_all(category).await?;
    print_json(&serde_json::to_value(items)?)
}

fn offline_cache(config: &Config) -> Result<OfflineCache> {
    let storage = DiskCacheStorage::new(config.cache_dir()?)?;
    let fetcher = HttpFetcher::new()?;
    // The manifest is only needed for install; other commands work without a base URL
    let manifest = config.manifest_urls().unwrap_or_default();
    Ok(OfflineCache::new(
        Arc::new(storage),
        Arc::new(fetcher),
        config.cache_namespace.clone(),
        manifest,
    ))
}

async fn cache(config: &Config, action: &str, rest: &[&str]) -> Result<()> {
    let cache = offline_cache(config)?;

    match (action, rest) {
        ("install", []) => {
            // Surface a missing base URL instead of installing nothing
            config.manifest_urls()?;
            let stored = cache.install().await?;
            eprintln!("Installed {} assets into {}", stored, cache.namespace());
        }
        ("activate", []) => {
            let deleted = cache.activate()?;
            if deleted.is_empty() {
                eprintln!("No stale namespaces");
            }
            for name in deleted {
                eprintln!("Deleted {}", name);
            }
        }
        ("get", [url]) => {
            let (response, source) = cache.fetch(&Request::get(*url)).await?;
            let label = match source {
                CacheSource::Hit => "cache",
                CacheSource::Miss => "network",
            };
            eprintln!("{} {} ({} bytes, from {})", response.status, url, response.body.len(), label);
            println!("{}", String::from_utf8_lossy(&response.body));
        }
        ("list", []) => {
            for (key, cached) in cache.storage().entries(cache.namespace())? {
                let preview = String::from_utf8_lossy(&cached.data.body).replace('\n', " ");
                println!(
                    "{:<60} {:>4} {:>10}  {}",
                    key.to_string(),
                    cached.data.status,
                    cached.age_display(),
                    truncate_string(&preview, PREVIEW_WIDTH)
                );
            }
        }
        _ => {
            eprintln!("{}", USAGE);
            anyhow::bail!("invalid cache command: {}", action);
        }
    }
    Ok(())
}
