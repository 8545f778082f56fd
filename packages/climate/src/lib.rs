#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Weather augmentation for analysis points.
//!
//! Each point gets one [`WeatherSource::fetch`] call. Calls run with a
//! bounded concurrency and report back over a channel. A failed fetch only
//! affects its own point: the observation is left empty and the run goes
//! on.

pub mod open_meteo;
pub mod progress;

use std::sync::Arc;

use async_trait::async_trait;
use geoalert_risk_models::{Point, WeatherObservation};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::progress::ProgressCallback;

pub use open_meteo::OpenMeteoClient;

/// Errors from a single weather fetch.
#[derive(Debug, thiserror::Error)]
pub enum ClimateError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider answered with an error status.
    #[error("Weather provider returned HTTP {status}")]
    Status { status: u16 },

    /// Provider reported an error in the body.
    #[error("Weather provider error: {reason}")]
    Api { reason: String },

    /// Response did not have the expected shape.
    #[error("Weather response parse error: {message}")]
    Parse { message: String },
}

/// A provider of per-point weather observations.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    /// Short identifier used in logs.
    fn id(&self) -> &str;

    /// Fetches today's observation for `point`.
    ///
    /// # Errors
    ///
    /// Returns [`ClimateError`] on any transport or parsing failure.
    async fn fetch(&self, point: &Point) -> Result<WeatherObservation, ClimateError>;
}

/// Weather augmentation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClimateConfig {
    /// When `false`, every point gets an empty observation.
    pub enabled: bool,
    pub base_url: String,
    /// Maximum number of requests in flight.
    pub concurrency: usize,
    pub timeout_secs: u64,
}

impl Default for ClimateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://api.open-meteo.com/v1/forecast".to_string(),
            concurrency: 4,
            timeout_secs: 30,
        }
    }
}

/// Fetches one observation per point, returned in input order.
///
/// At most `concurrency` fetches run at once (at least one). Failures are
/// logged and yield [`WeatherObservation::default`].
pub async fn augment(
    source: &dyn WeatherSource,
    points: &[Point],
    concurrency: usize,
    progress: &Arc<dyn ProgressCallback>,
) -> Vec<WeatherObservation> {
    use futures::stream::{self, StreamExt as _};

    let limit = concurrency.max(1);
    log::info!(
        "Fetching weather for {} points from {} (concurrency={limit})...",
        points.len(),
        source.id()
    );
    progress.set_total(points.len() as u64);

    let (tx, mut rx) = mpsc::channel::<(usize, WeatherObservation)>(limit);

    let producer = async move {
        stream::iter(points.iter().enumerate())
            .for_each_concurrent(limit, |(index, point)| {
                let tx = tx.clone();
                async move {
                    let observation = match source.fetch(point).await {
                        Ok(observation) => observation,
                        Err(e) => {
                            log::warn!("{}: weather fetch failed: {e}", point.name);
                            WeatherObservation::default()
                        }
                    };
                    if tx.send((index, observation)).await.is_err() {
                        log::debug!("{}: weather result dropped", point.name);
                    }
                }
            })
            .await;
    };

    let consumer = async {
        let mut observations = vec![WeatherObservation::default(); points.len()];
        let mut failed = 0_usize;
        while let Some((index, observation)) = rx.recv().await {
            if observation == WeatherObservation::default() {
                failed += 1;
            }
            observations[index] = observation;
            progress.set_message(points[index].name.clone());
            progress.inc(1);
        }
        (observations, failed)
    };

    let ((), (observations, empty)) = tokio::join!(producer, consumer);

    progress.finish(format!("Weather: {} points", points.len()));
    if empty > 0 {
        log::warn!(
            "{empty}/{} points have no weather observation",
            points.len()
        );
    }

    observations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::null_progress;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeSource {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl FakeSource {
        const fn new() -> Self {
            Self {
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl WeatherSource for FakeSource {
        fn id(&self) -> &str {
            "fake"
        }

        async fn fetch(&self, point: &Point) -> Result<WeatherObservation, ClimateError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            for _ in 0..3 {
                tokio::task::yield_now().await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if point.name.starts_with("bad") {
                return Err(ClimateError::Status { status: 503 });
            }
            Ok(WeatherObservation {
                humidity_min: Some(point.latitude.abs()),
                wind_max_kmh: Some(point.longitude.abs()),
            })
        }
    }

    fn points(names: &[&str]) -> Vec<Point> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                #[allow(clippy::cast_precision_loss)]
                let i = i as f64;
                Point::new(*name, -30.0 - i, -60.0 - i)
            })
            .collect()
    }

    #[tokio::test]
    async fn results_follow_input_order() {
        let source = FakeSource::new();
        let pts = points(&["a", "b", "c", "d", "e", "f", "g"]);
        let obs = augment(&source, &pts, 3, &null_progress()).await;

        assert_eq!(obs.len(), pts.len());
        for (point, o) in pts.iter().zip(&obs) {
            assert_eq!(o.humidity_min, Some(point.latitude.abs()));
            assert_eq!(o.wind_max_kmh, Some(point.longitude.abs()));
        }
    }

    #[tokio::test]
    async fn failures_stay_point_local() {
        let source = FakeSource::new();
        let pts = points(&["a", "bad1", "c", "bad2"]);
        let obs = augment(&source, &pts, 2, &null_progress()).await;

        assert_eq!(obs[1], WeatherObservation::default());
        assert_eq!(obs[3], WeatherObservation::default());
        assert_eq!(obs[0].humidity_min, Some(30.0));
        assert_eq!(obs[2].humidity_min, Some(32.0));
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let source = FakeSource::new();
        let pts = points(&["a", "b", "c", "d", "e", "f", "g", "h", "i", "j"]);
        augment(&source, &pts, 2, &null_progress()).await;

        let max = source.max_in_flight.load(Ordering::SeqCst);
        assert!((1..=2).contains(&max), "max in flight was {max}");
    }

    #[tokio::test]
    async fn zero_concurrency_still_makes_progress() {
        let source = FakeSource::new();
        let pts = points(&["a", "b"]);
        let obs = augment(&source, &pts, 0, &null_progress()).await;
        assert!(obs.iter().all(|o| o.humidity_min.is_some()));
    }

    #[derive(Default)]
    struct CountingProgress {
        total: AtomicUsize,
        done: AtomicUsize,
    }

    impl ProgressCallback for CountingProgress {
        fn set_total(&self, total: u64) {
            self.total.store(usize::try_from(total).unwrap(), Ordering::SeqCst);
        }

        fn inc(&self, delta: u64) {
            self.done
                .fetch_add(usize::try_from(delta).unwrap(), Ordering::SeqCst);
        }

        fn set_message(&self, _msg: String) {}

        fn finish(&self, _msg: String) {}
    }

    #[tokio::test]
    async fn progress_counts_every_point() {
        let source = FakeSource::new();
        let pts = points(&["a", "bad", "c", "d", "e"]);
        let counter = Arc::new(CountingProgress::default());
        let progress: Arc<dyn ProgressCallback> = counter.clone();

        augment(&source, &pts, 2, &progress).await;

        assert_eq!(counter.total.load(Ordering::SeqCst), 5);
        assert_eq!(counter.done.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn empty_point_set_yields_nothing() {
        let source = FakeSource::new();
        assert!(augment(&source, &[], 4, &null_progress()).await.is_empty());
    }

    #[test]
    fn config_defaults_fill_missing_fields() {
        let config: ClimateConfig = serde_json::from_value(serde_json::json!({
            "concurrency": 8
        }))
        .unwrap();
        assert!(config.enabled);
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.base_url, "https://api.open-meteo.com/v1/forecast");
    }
}
