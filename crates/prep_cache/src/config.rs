//! Cache configuration: where the cache lives and how writers behave.
//!
//! The location normally comes from the `PREP_CACHE` environment variable.
//! Embedders that keep their own settings file can deserialize a
//! [`CacheConfig`] from TOML with [`load_config_from_str`].

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CacheError;

/// Environment variable selecting the cache root.
pub const CACHE_ENV_VAR: &str = "PREP_CACHE";

/// Subdirectory of the platform cache directory used when no root is given.
const DEFAULT_SUBDIR: &str = "prep";

/// Values of [`CACHE_ENV_VAR`] that turn caching off (compared case-insensitively).
const DISABLE_VALUES: &[&str] = &["", "0", "false", "no", "off", "disabled"];

/// Where the cache root lives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheLocation {
    /// The platform cache directory, e.g. `~/.cache/prep` on Linux.
    #[default]
    Default,
    /// An explicit root directory.
    Path(PathBuf),
    /// Caching is turned off for this process.
    Disabled,
}

/// Settings for opening a cache handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Where the cache root lives.
    pub location: CacheLocation,

    /// Never write, even if the root is writable.
    pub read_only: bool,

    /// Leave the temp file of an abandoned write race on disk for inspection.
    pub keep_failed_temps: bool,

    /// How many times a writer re-polls a competing entry whose size differs.
    pub race_retries: u32,

    /// Delay between write-race polls, in milliseconds.
    pub race_interval_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            location: CacheLocation::Default,
            read_only: false,
            keep_failed_temps: false,
            race_retries: 3,
            race_interval_ms: 1000,
        }
    }
}

impl CacheConfig {
    /// Default settings with the location taken from [`CACHE_ENV_VAR`].
    pub fn from_env() -> Self {
        let location = match std::env::var_os(CACHE_ENV_VAR) {
            None => CacheLocation::Default,
            Some(value) => match value.to_str() {
                Some(s) => parse_location(Some(s)),
                None => CacheLocation::Path(PathBuf::from(value)),
            },
        };
        Self {
            location,
            ..Self::default()
        }
    }

    /// Default settings rooted at an explicit directory.
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self {
            location: CacheLocation::Path(root.into()),
            ..Self::default()
        }
    }

    /// Resolves the root directory, or `None` if caching is disabled or the
    /// platform has no cache directory.
    pub fn resolve_root(&self) -> Option<PathBuf> {
        match &self.location {
            CacheLocation::Default => default_root(),
            CacheLocation::Path(path) => Some(path.clone()),
            CacheLocation::Disabled => None,
        }
    }

    /// Delay between write-race polls.
    pub fn race_interval(&self) -> Duration {
        Duration::from_millis(self.race_interval_ms)
    }
}

/// Interprets a value of [`CACHE_ENV_VAR`].
///
/// `None` (unset) selects the platform default, a recognized false value
/// disables caching, and anything else is taken as a root path.
pub fn parse_location(value: Option<&str>) -> CacheLocation {
    let Some(value) = value else {
        return CacheLocation::Default;
    };
    let trimmed = value.trim();
    if DISABLE_VALUES
        .iter()
        .any(|v| v.eq_ignore_ascii_case(trimmed))
    {
        CacheLocation::Disabled
    } else {
        CacheLocation::Path(PathBuf::from(value))
    }
}

/// The platform default cache root.
pub fn default_root() -> Option<PathBuf> {
    dirs::cache_dir().map(|d| d.join(DEFAULT_SUBDIR))
}

/// Parses a [`CacheConfig`] from a TOML document.
///
/// Missing keys take their defaults; unknown keys are rejected.
pub fn load_config_from_str(content: &str) -> Result<CacheConfig, CacheError> {
    toml::from_str(content).map_err(|e| CacheError::Config {
        reason: e.to_string(),
    })
}
