//! Application configuration
//!
//! Defaults, then an optional TOML file, then `STOCKCAST_*` environment
//! variables. A `.env` file is read by the binary before this runs.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::ingest::ImportOptions;
use crate::ingest::batch::{DEFAULT_BATCH_SIZE, DEFAULT_ERROR_CAP};
use crate::ingest::header::DEFAULT_SCAN_ROWS;
use crate::ingest::preview::DEFAULT_SAMPLE_ROWS;

pub const APP_DIR: &str = "stockcast";
pub const CONFIG_FILE: &str = "config.toml";
pub const ENV_DATABASE_PATH: &str = "STOCKCAST_DATABASE_PATH";
pub const ENV_BATCH_SIZE: &str = "STOCKCAST_BATCH_SIZE";

/// Uploads larger than this are refused before parsing
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub import: ImportConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database file
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        let path = dirs::data_dir()
            .map(|d| d.join(APP_DIR))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("stockcast.db");
        Self { path }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    pub batch_size: usize,
    pub error_cap: usize,
    pub header_scan_rows: usize,
    pub max_upload_bytes: u64,
    pub sample_rows: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            error_cap: DEFAULT_ERROR_CAP,
            header_scan_rows: DEFAULT_SCAN_ROWS,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            sample_rows: DEFAULT_SAMPLE_ROWS,
        }
    }
}

impl ImportConfig {
    pub fn options(&self, replace_existing: bool) -> ImportOptions {
        ImportOptions {
            batch_size: self.batch_size,
            error_cap: self.error_cap,
            replace_existing,
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// `<config_dir>/stockcast/config.toml`, when the platform has a config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load from an explicit file, or the default file if it exists, then apply env overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(default) if default.exists() => Self::from_file(&default)?,
                _ => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&text)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Apply `STOCKCAST_*` overrides read through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_DATABASE_PATH).filter(|p| !p.trim().is_empty()) {
            self.database.path = PathBuf::from(path.trim());
        }
        if let Some(size) = lookup(ENV_BATCH_SIZE) {
            self.import.batch_size = size.trim().parse().with_context(|| {
                format!("{} must be a positive integer, got '{}'", ENV_BATCH_SIZE, size)
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.import.batch_size == 0 {
            bail!("import.batch_size must be at least 1");
        }
        if self.import.header_scan_rows == 0 {
            bail!("import.header_scan_rows must be at least 1");
        }
        Ok(())
    }
}

/// Builder for [`Config`]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.database.path = path.into();
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.import.batch_size = size;
        self
    }

    pub fn error_cap(mut self, cap: usize) -> Self {
        self.config.import.error_cap = cap;
        self
    }

    pub fn header_scan_rows(mut self, rows: usize) -> Self {
        self.config.import.header_scan_rows = rows;
        self
    }

    pub fn max_upload_bytes(mut self, bytes: u64) -> Self {
        self.config.import.max_upload_bytes = bytes;
        self
    }

    pub fn sample_rows(mut self, rows: usize) -> Self {
        self.config.import.sample_rows = rows;
        self
    }

    /// Build and validate
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
