//! Server configuration
//!
//! Defaults can be overridden through `PDF_LOCATOR_*` environment variables.

use crate::error::{Error, Result};
use crate::locator::{
    SearchOptions, DEFAULT_CONTEXT_CHARS, DEFAULT_TIMEOUT_MS, MAX_CONTEXT_CHARS,
};
use std::str::FromStr;
use std::time::Duration;

pub const ENV_RESOURCE_DIRS: &str = "PDF_LOCATOR_RESOURCE_DIRS";
pub const ENV_ALLOW_PRIVATE_URLS: &str = "PDF_LOCATOR_ALLOW_PRIVATE_URLS";
pub const ENV_MAX_DOWNLOAD_BYTES: &str = "PDF_LOCATOR_MAX_DOWNLOAD_BYTES";
pub const ENV_CACHE_MAX_BYTES: &str = "PDF_LOCATOR_CACHE_MAX_BYTES";
pub const ENV_CACHE_MAX_ENTRIES: &str = "PDF_LOCATOR_CACHE_MAX_ENTRIES";
pub const ENV_CONTEXT_CHARS: &str = "PDF_LOCATOR_CONTEXT_CHARS";
pub const ENV_SEARCH_TIMEOUT_MS: &str = "PDF_LOCATOR_SEARCH_TIMEOUT_MS";

/// Defaults applied to `search` calls that leave a setting out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchDefaults {
    /// Characters of context on each side of a match
    pub context_chars: usize,
    /// Per-page scan budget in milliseconds
    pub timeout_ms: u64,
}

impl Default for SearchDefaults {
    fn default() -> Self {
        Self {
            context_chars: DEFAULT_CONTEXT_CHARS,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl SearchDefaults {
    /// Build engine options, letting per-call values override the defaults.
    /// Context is clamped to `MAX_CONTEXT_CHARS`; the timeout is at least 1ms.
    pub fn options(
        &self,
        context_chars: Option<usize>,
        timeout_ms: Option<u64>,
        max_results: Option<usize>,
        max_pages_scanned: Option<usize>,
    ) -> SearchOptions {
        let timeout_ms = timeout_ms.unwrap_or(self.timeout_ms).max(1);
        SearchOptions::new()
            .with_context_chars(context_chars.unwrap_or(self.context_chars))
            .with_timeout(Duration::from_millis(timeout_ms))
            .with_max_results(max_results)
            .with_max_pages_scanned(max_pages_scanned)
    }
}

/// Security, resource and search configuration for the server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Directories `path` sources must live under (empty = unrestricted)
    pub resource_dirs: Vec<String>,
    /// Allow URLs that resolve to private/reserved IPs (default: false)
    pub allow_private_urls: bool,
    /// Maximum download size in bytes for URL sources (default: 100MB)
    pub max_download_bytes: u64,
    /// Maximum total bytes of decoded text in cache (default: 512MB)
    pub cache_max_bytes: usize,
    /// Maximum number of cache entries (default: 100)
    pub cache_max_entries: usize,
    pub search: SearchDefaults,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            resource_dirs: Vec::new(),
            allow_private_urls: false,
            max_download_bytes: 100 * 1024 * 1024, // 100MB
            cache_max_bytes: 512 * 1024 * 1024,    // 512MB
            cache_max_entries: 100,
            search: SearchDefaults::default(),
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by whatever `PDF_LOCATOR_*` variables are set
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ServerConfig::from_env`] with an injectable variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let resource_dirs = match parsed(ENV_RESOURCE_DIRS) {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|dir| !dir.is_empty())
                .map(String::from)
                .collect(),
            None => defaults.resource_dirs,
        };

        let allow_private_urls = match parsed(ENV_ALLOW_PRIVATE_URLS) {
            Some(raw) => parse_bool(ENV_ALLOW_PRIVATE_URLS, &raw)?,
            None => defaults.allow_private_urls,
        };

        let max_download_bytes =
            parse_or(&parsed, ENV_MAX_DOWNLOAD_BYTES, defaults.max_download_bytes)?;
        let cache_max_bytes = parse_or(&parsed, ENV_CACHE_MAX_BYTES, defaults.cache_max_bytes)?;
        let cache_max_entries =
            parse_or(&parsed, ENV_CACHE_MAX_ENTRIES, defaults.cache_max_entries)?;
        let context_chars: usize =
            parse_or(&parsed, ENV_CONTEXT_CHARS, defaults.search.context_chars)?;
        let timeout_ms: u64 =
            parse_or(&parsed, ENV_SEARCH_TIMEOUT_MS, defaults.search.timeout_ms)?;

        Ok(Self {
            resource_dirs,
            allow_private_urls,
            max_download_bytes,
            cache_max_bytes,
            cache_max_entries,
            search: SearchDefaults {
                context_chars: context_chars.min(MAX_CONTEXT_CHARS),
                timeout_ms: timeout_ms.max(1),
            },
        })
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e| Error::Config {
            reason: format!("{}={:?}: {}", key, raw, e),
        }),
        None => Ok(default),
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::Config {
            reason: format!("{}={:?}: expected a boolean", key, other),
        }),
    }
}
