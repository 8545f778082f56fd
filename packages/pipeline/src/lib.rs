#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Batch wildfire risk pipeline.
//!
//! Loads a named point set, pulls remote-sensing indicators for every point
//! in one backend batch, augments them with near-term weather, scores each
//! point under a versioned risk model and writes one CSV row per point.

pub mod batch;
pub mod config;
pub mod points;
pub mod sink;

use geoalert_climate::ClimateError;
use geoalert_remote::RemoteError;
use geoalert_risk_models::RiskModelError;

pub use batch::{BatchPipeline, DEFAULT_PROBE_LIMIT, level_counts, probe};
pub use config::{CONFIG_ENV, ConfigError, RunConfig};
pub use points::{PointSetError, load_points, parse_points};
pub use sink::{COLUMNS, write_csv, write_csv_file};

/// Errors that abort a pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Points(#[from] PointSetError),

    /// The remote batch failed. No partial output is written.
    #[error("Remote evaluation failed: {0}")]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Model(#[from] RiskModelError),

    #[error(transparent)]
    Climate(#[from] ClimateError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
