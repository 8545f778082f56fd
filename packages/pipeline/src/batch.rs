//! Drives a full scoring run across every point.
//!
//! Order of work: resolve date windows, evaluate the remote batch (fatal on
//! failure), fetch weather (point-local failures), score, write the CSV,
//! and log a per-level summary.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use geoalert_climate::WeatherSource;
use geoalert_climate::progress::ProgressCallback;
use geoalert_remote::{ComputeBackend, build_batch, extract_features};
use geoalert_remote_models::BatchResponse;
use geoalert_risk::score_point;
use geoalert_risk_models::{Point, RiskLevel, RiskModel, RiskRecord, WeatherObservation};

use crate::PipelineError;
use crate::config::RunConfig;
use crate::sink;

/// Number of points evaluated by [`probe`] unless told otherwise.
pub const DEFAULT_PROBE_LIMIT: usize = 3;

/// Collaborators and settings for one run.
pub struct BatchPipeline<'a> {
    pub config: &'a RunConfig,
    pub model: &'a RiskModel,
    pub backend: &'a dyn ComputeBackend,
    /// `None` skips weather entirely; every point scores as humid and calm.
    pub weather: Option<&'a dyn WeatherSource>,
    pub progress: Arc<dyn ProgressCallback>,
}

impl BatchPipeline<'_> {
    /// Scores every point against `reference` without writing anything.
    ///
    /// Records come back in the same order as `points`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Remote`] if the remote batch fails.
    pub async fn score(
        &self,
        points: &[Point],
        reference: DateTime<Utc>,
    ) -> Result<Vec<RiskRecord>, PipelineError> {
        let windows = self.config.windows.windows(reference);
        let remote = extract_features(self.backend, points, &windows, &self.config.remote).await?;

        let weather = match self.weather {
            Some(source) => {
                geoalert_climate::augment(
                    source,
                    points,
                    self.config.climate.concurrency,
                    &self.progress,
                )
                .await
            }
            None => {
                log::info!("Weather augmentation disabled");
                vec![WeatherObservation::default(); points.len()]
            }
        };

        Ok(points
            .iter()
            .zip(remote)
            .zip(weather)
            .map(|((point, features), observation)| {
                score_point(point.clone(), features.with_weather(observation), self.model)
            })
            .collect())
    }

    /// Scores every point, writes the CSV and logs the level summary.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if the remote batch or the CSV write
    /// fails.
    pub async fn run(
        &self,
        points: &[Point],
        reference: DateTime<Utc>,
    ) -> Result<Vec<RiskRecord>, PipelineError> {
        log::info!(
            "Scoring {} points with model '{}' ({})",
            points.len(),
            self.model.id,
            self.model.name
        );

        let records = self.score(points, reference).await?;
        sink::write_csv_file(&self.config.output_path, &records)?;
        log_summary(&records);

        Ok(records)
    }
}

/// Number of records at each level, every level present.
#[must_use]
pub fn level_counts(records: &[RiskRecord]) -> BTreeMap<RiskLevel, usize> {
    let mut counts: BTreeMap<RiskLevel, usize> =
        RiskLevel::ALL.iter().map(|level| (*level, 0)).collect();
    for record in records {
        *counts.entry(record.risk_level).or_default() += 1;
    }
    counts
}

fn log_summary(records: &[RiskRecord]) {
    let counts = level_counts(records);
    log::info!("Risk summary ({} points):", records.len());
    for level in RiskLevel::ALL.iter().rev() {
        log::info!("  {level:<8} {}", counts.get(level).copied().unwrap_or(0));
    }
}

/// Evaluates the remote batch for the first `limit` points only.
///
/// No weather, no scoring, no output file.
///
/// # Errors
///
/// Returns [`PipelineError::Remote`] if the backend fails.
pub async fn probe(
    backend: &dyn ComputeBackend,
    config: &RunConfig,
    points: &[Point],
    limit: usize,
    reference: DateTime<Utc>,
) -> Result<BatchResponse, PipelineError> {
    let sample = &points[..limit.min(points.len())];
    let windows = config.windows.windows(reference);

    log::info!(
        "Probing {} of {} points (reflectance {}, temperature {}, precipitation {})",
        sample.len(),
        points.len(),
        windows.reflectance,
        windows.temperature,
        windows.precipitation
    );

    let request = build_batch(sample, &windows, &config.remote);
    Ok(backend.evaluate(&request).await?)
}
