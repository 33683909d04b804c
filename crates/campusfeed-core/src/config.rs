//! Application configuration management.
//!
//! Configuration is stored at `~/.config/campusfeed/config.json` and can be
//! overridden from the environment. The deployed search function name comes
//! from `CAMPUSFEED_FUNCTION_NAME`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "campusfeed";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Name of the live offline cache namespace
pub const DEFAULT_CACHE_NAMESPACE: &str = "appCache";

/// Document table holding every content item
const DEFAULT_TABLE_NAME: &str = "DocumentsTable";

/// Assets pre-cached on install, relative to the asset base URL
const DEFAULT_MANIFEST: &[&str] = &[
    "logo192.png",
    "logo512.png",
    "favicon.ico",
    "assets/img/logo.png",
    "assets/img/logo_inverse.png",
];

pub const ENV_FUNCTION_NAME: &str = "CAMPUSFEED_FUNCTION_NAME";
pub const ENV_SEARCH_ENDPOINT: &str = "CAMPUSFEED_SEARCH_ENDPOINT";
pub const ENV_TABLE_ENDPOINT: &str = "CAMPUSFEED_TABLE_ENDPOINT";
pub const ENV_TABLE_NAME: &str = "CAMPUSFEED_TABLE_NAME";
pub const ENV_ASSET_BASE_URL: &str = "CAMPUSFEED_ASSET_BASE_URL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub function_name: Option<String>,
    pub search_endpoint: Option<String>,
    pub table_endpoint: Option<String>,
    pub table_name: String,
    pub asset_base_url: Option<String>,
    pub cache_namespace: String,
    pub install_manifest: Vec<String>,
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            function_name: None,
            search_endpoint: None,
            table_endpoint: None,
            table_name: DEFAULT_TABLE_NAME.to_string(),
            asset_base_url: None,
            cache_namespace: DEFAULT_CACHE_NAMESPACE.to_string(),
            install_manifest: DEFAULT_MANIFEST.iter().map(|s| s.to_string()).collect(),
            log_dir: None,
        }
    }
}

impl Config {
    /// Load the config file (if any), then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// production). Empty values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ENV_FUNCTION_NAME) {
            self.function_name = Some(v);
        }
        if let Some(v) = get(ENV_SEARCH_ENDPOINT) {
            self.search_endpoint = Some(v);
        }
        if let Some(v) = get(ENV_TABLE_ENDPOINT) {
            self.table_endpoint = Some(v);
        }
        if let Some(v) = get(ENV_TABLE_NAME) {
            self.table_name = v;
        }
        if let Some(v) = get(ENV_ASSET_BASE_URL) {
            self.asset_base_url = Some(v);
        }
    }

    pub fn function_name(&self) -> Result<&str> {
        self.function_name
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("No search function configured (set {})", ENV_FUNCTION_NAME))
    }

    pub fn search_endpoint(&self) -> Result<&str> {
        self.search_endpoint
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("No search endpoint configured (set {})", ENV_SEARCH_ENDPOINT))
    }

    pub fn table_endpoint(&self) -> Result<&str> {
        self.table_endpoint
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("No table endpoint configured (set {})", ENV_TABLE_ENDPOINT))
    }

    /// Root of the on-disk offline cache.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Resolve the install manifest against the asset base URL.
    pub fn manifest_urls(&self) -> Result<Vec<String>> {
        let base = self
            .asset_base_url
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("No asset base URL configured (set {})", ENV_ASSET_BASE_URL))?;
        // A base without a trailing slash would drop its last path segment on join
        let with_slash = if base.ends_with('/') {
            base.to_string()
        } else {
            format!("{}/", base)
        };
        let base = Url::parse(&with_slash)
            .with_context(|| format!("Invalid asset base URL: {}", with_slash))?;

        self.install_manifest
            .iter()
            .map(|path| {
                base.join(path)
                    .map(String::from)
                    .with_context(|| format!("Invalid manifest path: {}", path))
            })
            .collect()
    }
}
