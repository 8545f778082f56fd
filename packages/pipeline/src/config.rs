//! Run configuration loaded from TOML.
//!
//! The file path comes from `GEOALERT_CONFIG` (default `geoalert.toml`).
//! A missing file is not an error: every field has a default, so an empty
//! or absent file describes the standard run.
//!
//! ```toml
//! points_path = "data/points.geojson"
//! output_path = "output/risk.csv"
//! model = "v2-weather"
//!
//! [windows]
//! policy = "trailing"
//! embargo_days = 2
//!
//! [backend]
//! type = "local"
//! catalog_path = "data/catalog.json"
//!
//! [climate]
//! concurrency = 8
//! ```

use std::path::{Path, PathBuf};

use geoalert_climate::ClimateConfig;
use geoalert_remote::{BackendConfig, DateRangeSelector, RemoteConfig};
use geoalert_risk::{DEFAULT_MODEL_ID, model_by_id};
use geoalert_risk_models::{RiskModel, RiskModelError};
use serde::{Deserialize, Serialize};

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "GEOALERT_CONFIG";

/// Configuration file used when [`CONFIG_ENV`] is unset.
pub const DEFAULT_CONFIG_PATH: &str = "geoalert.toml";

/// Errors from loading or validating the run configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file exists but could not be read.
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for [`RunConfig`].
    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// The configured risk model is unknown or invalid.
    #[error(transparent)]
    Model(#[from] RiskModelError),

    /// A value is out of range.
    #[error("Invalid config: {message}")]
    Invalid { message: String },
}

/// Everything a run needs besides the point set itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// GeoJSON `FeatureCollection` of named points.
    pub points_path: PathBuf,
    /// CSV written at the end of the run.
    pub output_path: PathBuf,
    /// Risk model identifier.
    pub model: String,
    pub windows: DateRangeSelector,
    pub remote: RemoteConfig,
    pub backend: BackendConfig,
    pub climate: ClimateConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            points_path: PathBuf::from("data/points.geojson"),
            output_path: PathBuf::from("output/risk.csv"),
            model: DEFAULT_MODEL_ID.to_string(),
            windows: DateRangeSelector::default(),
            remote: RemoteConfig::default(),
            backend: BackendConfig::default(),
            climate: ClimateConfig::default(),
        }
    }
}

impl RunConfig {
    /// Loads the file named by [`CONFIG_ENV`], or [`DEFAULT_CONFIG_PATH`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file exists but cannot be read,
    /// parsed, or validated.
    pub fn load_from_env() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_ENV)
            .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);

        if !path.exists() {
            log::info!("No config at {}, using defaults", path.display());
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        }

        Self::load(&path)
    }

    /// Loads and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, parsed, or
    /// validated.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;

        log::info!("Loaded config {}", path.display());
        Ok(config)
    }

    /// Resolves the configured [`RiskModel`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Model`] if the identifier is unknown.
    pub fn risk_model(&self) -> Result<RiskModel, ConfigError> {
        Ok(model_by_id(&self.model)?)
    }

    /// Checks values that serde cannot.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on the first invalid value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.risk_model()?;

        let invalid =
            |message: String| -> Result<(), ConfigError> { Err(ConfigError::Invalid { message }) };

        if self.windows.reflectance_days == 0 || self.windows.precipitation_days == 0 {
            return invalid("window lookbacks must be at least one day".to_string());
        }
        if !(self.remote.footprint_buffer_m.is_finite() && self.remote.footprint_buffer_m >= 0.0) {
            return invalid(format!(
                "remote.footprint_buffer_m must be >= 0, got {}",
                self.remote.footprint_buffer_m
            ));
        }
        for (name, scale) in [
            ("reflectance", self.remote.reflectance.scale_m),
            ("temperature", self.remote.temperature.scale_m),
            ("precipitation", self.remote.precipitation.scale_m),
        ] {
            if !(scale.is_finite() && scale > 0.0) {
                return invalid(format!("remote.{name}.scale_m must be > 0, got {scale}"));
            }
        }
        if self.climate.concurrency == 0 {
            return invalid("climate.concurrency must be at least 1".to_string());
        }

        Ok(())
    }
}
