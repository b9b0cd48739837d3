//! Configuration schema for once-again
//!
//! Global configuration lives at `~/.config/once-again/config.toml`; a
//! project-local `.once-again.toml` overrides individual keys.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Cache settings
    pub cache: CacheConfig,
}

impl Config {
    /// Check values serde cannot express
    pub fn validate(&self) -> Result<(), String> {
        if let Some(ttl) = self.cache.ttl_secs {
            if !ttl.is_finite() || ttl < 0.0 {
                return Err(format!(
                    "cache.ttl_secs must be a non-negative number, got {}",
                    ttl
                ));
            }
            if Duration::try_from_secs_f64(ttl).is_err() {
                return Err(format!("cache.ttl_secs is too large, got {}", ttl));
            }
        }
        if self.cache.root.as_os_str().is_empty() {
            return Err("cache.root must not be empty".to_string());
        }
        match self.general.log_format.as_str() {
            "text" | "json" => Ok(()),
            other => Err(format!(
                "general.log_format must be \"text\" or \"json\", got \"{}\"",
                other
            )),
        }
    }
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Report cache hits and misses at info level
    pub verbose: bool,

    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            log_format: "text".to_string(),
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache directory (relative paths resolve against the working directory)
    pub root: PathBuf,

    /// Entries older than this many seconds are recomputed (unset = never expire)
    pub ttl_secs: Option<f64>,
}

impl CacheConfig {
    /// Time-to-live as a duration, `None` when entries never expire
    ///
    /// Values `validate` rejects (negative, non-finite, beyond `Duration`) also give `None`.
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_secs
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("cache"),
            ttl_secs: None,
        }
    }
}
