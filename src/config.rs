//! Application configuration.
//!
//! One explicit `AppConfig`, loaded from JSON and handed to constructors.
//! Resolution order for the file: `--config`, then `LIENSCAN_CONFIG`, then
//! `<data dir>/lienscan/config.json`. A missing file means defaults.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::mapping::{LiabilityType, SiteMetadata};
use crate::pipeline::verification::VerificationPolicy;
use crate::queue::RetryPolicy;

/// Application-level constants
pub const APP_NAME: &str = "lienscan";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const CONFIG_ENV: &str = "LIENSCAN_CONFIG";
pub const CONFIG_FILE: &str = "config.json";
pub const DATABASE_FILE: &str = "lienscan.db";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot parse config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error("Cannot determine a data directory for this platform")]
    NoDataDir,
}

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    if cfg!(debug_assertions) {
        "info,lienscan_lib=debug"
    } else {
        "info"
    }
}

/// `<platform data dir>/lienscan`
pub fn app_data_dir() -> Result<PathBuf, ConfigError> {
    dirs::data_dir()
        .map(|dir| dir.join(APP_NAME))
        .ok_or(ConfigError::NoDataDir)
}

/// One scrape source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    pub key: String,
    /// Two-digit code written into the Site Id column.
    pub site_id: String,
    pub name: String,
    pub liability_type: LiabilityType,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Where the local executor picks up RawDocument JSON files.
    #[serde(default)]
    pub documents_dir: Option<PathBuf>,
}

fn default_enabled() -> bool {
    true
}

impl SiteConfig {
    pub fn new(key: &str, site_id: &str, name: &str) -> Self {
        Self {
            key: key.to_string(),
            site_id: site_id.to_string(),
            name: name.to_string(),
            liability_type: LiabilityType::Irs,
            enabled: true,
            documents_dir: None,
        }
    }

    pub fn metadata(&self) -> SiteMetadata {
        SiteMetadata::new(&self.key, &self.site_id, self.liability_type)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_path: Option<PathBuf>,
    pub sites: Vec<SiteConfig>,
    pub retry: RetryPolicy,
    pub verification: VerificationPolicy,
    /// Two-digit years below this expand to 20YY, the rest to 19YY.
    pub two_digit_year_pivot: u32,
    /// `recover` treats running tasks untouched for this long as crashed.
    pub stale_running_after_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            sites: vec![
                SiteConfig::new("nyc_acris", "12", "NYC ACRIS"),
                SiteConfig::new("cook_county", "10", "Cook County Recorder"),
                SiteConfig::new("ca_sos", "20", "California Secretary of State"),
            ],
            retry: RetryPolicy::default(),
            verification: VerificationPolicy::default(),
            two_digit_year_pivot: 50,
            stale_running_after_secs: 3600,
        }
    }
}

impl AppConfig {
    /// Load from an explicit path, else the environment, else the data dir.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match std::env::var_os(CONFIG_ENV) {
                Some(value) => PathBuf::from(value),
                None => app_data_dir()?.join(CONFIG_FILE),
            },
        };
        Self::load_from(&path)
    }

    /// Read and validate `path`; a missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;

        tracing::info!(path = %path.display(), sites = config.sites.len(), "Config loaded");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for site in &self.sites {
            if site.site_id.len() != 2 || !site.site_id.chars().all(|c| c.is_ascii_digit()) {
                return Err(ConfigError::Invalid(format!(
                    "site {} has site_id {:?}; expected two digits",
                    site.key, site.site_id
                )));
            }
            if !seen.insert(site.site_id.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate site_id {}", site.site_id)));
            }
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be at least 1".into()));
        }

        let policy = &self.verification;
        for (name, value) in [
            ("auto_process_confidence", policy.auto_process_confidence),
            ("flag_below", policy.flag_below),
            ("min_field_confidence", policy.min_field_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "verification.{name} must be within [0, 1], got {value}"
                )));
            }
        }

        if self.two_digit_year_pivot >= 100 {
            return Err(ConfigError::Invalid(format!(
                "two_digit_year_pivot must be below 100, got {}",
                self.two_digit_year_pivot
            )));
        }
        Ok(())
    }

    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(app_data_dir()?.join(DATABASE_FILE)),
        }
    }

    pub fn site_by_id(&self, site_id: &str) -> Option<&SiteConfig> {
        self.sites.iter().find(|s| s.site_id == site_id)
    }

    pub fn site_by_key(&self, key: &str) -> Option<&SiteConfig> {
        self.sites.iter().find(|s| s.key == key)
    }

    pub fn enabled_sites(&self) -> impl Iterator<Item = &SiteConfig> {
        self.sites.iter().filter(|s| s.enabled)
    }
}
