use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::constants::{
    CURRENT_UK_CODE, DEFAULT_COUNTRIES, DEFAULT_MAX_YEAR, DEFAULT_MIN_YEAR, DEFAULT_VALUE_CEILING,
    LEGACY_UK_CODE,
};
use crate::error::{AnalyticsError, Result};

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub ingest: IngestConfig,
    pub query: QueryConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

/// Admission rules applied by the normalizer.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct IngestConfig {
    pub min_year: i64,
    pub max_year: i64,
    pub value_ceiling: f64,
    pub allowed_countries: Vec<String>,
    /// Retired country codes and their replacements, e.g. `UK = "GB"`.
    pub legacy_country_codes: BTreeMap<String, String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            min_year: DEFAULT_MIN_YEAR,
            max_year: DEFAULT_MAX_YEAR,
            value_ceiling: DEFAULT_VALUE_CEILING,
            allowed_countries: default_countries(),
            legacy_country_codes: BTreeMap::from([(
                LEGACY_UK_CODE.to_string(),
                CURRENT_UK_CODE.to_string(),
            )]),
        }
    }
}

impl IngestConfig {
    /// Allowed countries plus the legacy codes that get remapped after admission.
    pub fn admitted_countries(&self) -> Vec<String> {
        let mut admitted = self.allowed_countries.clone();
        for legacy in self.legacy_country_codes.keys() {
            if !admitted.contains(legacy) {
                admitted.push(legacy.clone());
            }
        }
        admitted
    }
}

/// Default filter for the analytics queries.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct QueryConfig {
    pub min_year: i64,
    pub max_year: i64,
    pub countries: Vec<String>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            min_year: DEFAULT_MIN_YEAR,
            max_year: DEFAULT_MAX_YEAR,
            countries: default_countries(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    pub snapshot_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from("data/store.json"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub directory: PathBuf,
    pub file_name: String,
    pub default_filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("logs"),
            file_name: "ted_insights.log".to_string(),
            default_filter: "ted_insights=info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    /// Prometheus exporter address; no exporter when unset.
    pub listen_addr: Option<String>,
}

fn default_countries() -> Vec<String> {
    DEFAULT_COUNTRIES.iter().map(|code| code.to_string()).collect()
}

impl Config {
    /// Reads a TOML config file. A missing file yields the built-in defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|e| {
            AnalyticsError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.ingest.min_year > self.ingest.max_year {
            return Err(AnalyticsError::Config(format!(
                "ingest.min_year {} is after ingest.max_year {}",
                self.ingest.min_year, self.ingest.max_year
            )));
        }
        if self.query.min_year > self.query.max_year {
            return Err(AnalyticsError::Config(format!(
                "query.min_year {} is after query.max_year {}",
                self.query.min_year, self.query.max_year
            )));
        }
        if self.ingest.value_ceiling.is_nan() || self.ingest.value_ceiling <= 0.0 {
            return Err(AnalyticsError::Config(
                "ingest.value_ceiling must be positive".to_string(),
            ));
        }
        if self.ingest.allowed_countries.is_empty() {
            return Err(AnalyticsError::Config(
                "ingest.allowed_countries must not be empty".to_string(),
            ));
        }
        if let Some(addr) = &self.metrics.listen_addr {
            addr.parse::<std::net::SocketAddr>().map_err(|e| {
                AnalyticsError::Config(format!("Invalid metrics.listen_addr '{}': {}", addr, e))
            })?;
        }
        Ok(())
    }
}
