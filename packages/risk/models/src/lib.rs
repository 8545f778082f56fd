#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Core data types for wildfire risk scoring.
//!
//! Defines the analysis [`Point`], the per-point [`FeatureVector`] built up
//! from remote-sensing and weather sources, the versioned [`RiskModel`]
//! configuration, and the terminal [`RiskRecord`] handed to the result sink.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Tolerance used when checking that model weights sum to one.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// Humidity substituted when no observation is available (fail-safe-low).
pub const FALLBACK_HUMIDITY_MIN: f64 = 100.0;

/// Wind speed substituted when no observation is available (fail-safe-low).
pub const FALLBACK_WIND_MAX_KMH: f64 = 0.0;

/// A named analysis location.
///
/// Created once from the input point set and never mutated during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Unique name within a batch.
    pub name: String,
    /// Latitude (WGS84 degrees).
    pub latitude: f64,
    /// Longitude (WGS84 degrees).
    pub longitude: f64,
}

impl Point {
    #[must_use]
    pub fn new(name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            name: name.into(),
            latitude,
            longitude,
        }
    }
}

/// Every scoring input a [`RiskModel`] can reference.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Feature {
    /// Normalized difference vegetation index.
    Ndvi,
    /// Normalized burn ratio.
    Nbr,
    /// Land surface temperature in degrees Celsius.
    LstCelsius,
    /// Precipitation accumulated over the precipitation window, in mm.
    PrecipMm,
    /// Daily minimum relative humidity, in percent.
    HumidityMin,
    /// Daily maximum wind speed, in km/h.
    WindMaxKmh,
}

impl Feature {
    /// All features in output column order.
    pub const ALL: &[Self] = &[
        Self::Ndvi,
        Self::Nbr,
        Self::LstCelsius,
        Self::PrecipMm,
        Self::HumidityMin,
        Self::WindMaxKmh,
    ];

    /// Whether this feature comes from the remote-sensing backend.
    #[must_use]
    pub const fn is_remote(self) -> bool {
        matches!(
            self,
            Self::Ndvi | Self::Nbr | Self::LstCelsius | Self::PrecipMm
        )
    }
}

/// Where a feature value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Derived from source data.
    Source,
    /// Substituted by a fallback default because source data was missing.
    Fallback,
}

/// Weather observation for one point, each field absent when the fetch
/// failed or the provider returned no value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherObservation {
    /// Daily minimum relative humidity (percent).
    pub humidity_min: Option<f64>,
    /// Daily maximum wind speed (km/h).
    pub wind_max_kmh: Option<f64>,
}

/// Merged per-point feature vector.
///
/// Remote fields are always populated: when the backend had no data they
/// hold the fallback default `0.0` and the feature is listed in
/// [`FeatureVector::fallbacks`]. Weather fields stay `None` when absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub ndvi: f64,
    pub nbr: f64,
    pub lst_celsius: f64,
    pub precip_mm: f64,
    pub humidity_min: Option<f64>,
    pub wind_max_kmh: Option<f64>,
    /// Remote features whose value is a no-data fallback.
    #[serde(default)]
    pub fallbacks: BTreeSet<Feature>,
}

impl FeatureVector {
    /// Merges a weather observation into this vector.
    #[must_use]
    pub fn with_weather(mut self, weather: WeatherObservation) -> Self {
        self.humidity_min = weather.humidity_min;
        self.wind_max_kmh = weather.wind_max_kmh;
        self
    }

    /// Raw value of `feature`, `None` for absent weather fields.
    #[must_use]
    pub const fn value(&self, feature: Feature) -> Option<f64> {
        match feature {
            Feature::Ndvi => Some(self.ndvi),
            Feature::Nbr => Some(self.nbr),
            Feature::LstCelsius => Some(self.lst_celsius),
            Feature::PrecipMm => Some(self.precip_mm),
            Feature::HumidityMin => self.humidity_min,
            Feature::WindMaxKmh => self.wind_max_kmh,
        }
    }

    /// Provenance of `feature`.
    #[must_use]
    pub fn provenance(&self, feature: Feature) -> Provenance {
        let missing = if feature.is_remote() {
            self.fallbacks.contains(&feature)
        } else {
            self.value(feature).is_none()
        };
        if missing {
            Provenance::Fallback
        } else {
            Provenance::Source
        }
    }
}

/// Whether risk grows or shrinks as the raw value grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Direction {
    Increasing,
    Decreasing,
}

/// Normalization range, direction and weight for one feature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureWeight {
    pub feature: Feature,
    /// Raw value mapped to `t = 0`.
    pub lo: f64,
    /// Raw value mapped to `t = 1`.
    pub hi: f64,
    pub direction: Direction,
    pub weight: f64,
}

/// Errors from risk model validation.
#[derive(Debug, thiserror::Error)]
pub enum RiskModelError {
    /// Weights do not sum to one.
    #[error("Risk model '{id}' weights sum to {sum}, expected 1.0")]
    WeightSum {
        /// Model identifier.
        id: String,
        /// Actual sum.
        sum: f64,
    },

    /// A normalization range is empty or inverted.
    #[error("Risk model '{id}' has invalid range for {feature}: lo={lo} hi={hi}")]
    InvalidRange {
        /// Model identifier.
        id: String,
        /// Offending feature.
        feature: Feature,
        lo: f64,
        hi: f64,
    },

    /// A weight is negative or not finite.
    #[error("Risk model '{id}' has invalid weight {weight} for {feature}")]
    InvalidWeight {
        /// Model identifier.
        id: String,
        /// Offending feature.
        feature: Feature,
        weight: f64,
    },

    /// The same feature appears twice.
    #[error("Risk model '{id}' lists {feature} more than once")]
    DuplicateFeature {
        /// Model identifier.
        id: String,
        /// Duplicated feature.
        feature: Feature,
    },

    /// No model with the requested identifier exists.
    #[error("Unknown risk model '{id}'")]
    Unknown {
        /// Requested identifier.
        id: String,
    },
}

/// A versioned, immutable scoring configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskModel {
    /// Unique identifier (e.g., `"v2-weather"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub features: Vec<FeatureWeight>,
}

impl RiskModel {
    /// Sum of all feature weights.
    #[must_use]
    pub fn weight_sum(&self) -> f64 {
        self.features.iter().map(|f| f.weight).sum()
    }

    /// Returns the configuration for `feature`, if the model uses it.
    #[must_use]
    pub fn weight_for(&self, feature: Feature) -> Option<&FeatureWeight> {
        self.features.iter().find(|f| f.feature == feature)
    }

    /// Checks the model invariants.
    ///
    /// # Errors
    ///
    /// Returns [`RiskModelError`] if a range is inverted, a weight is
    /// negative, a feature is listed twice, or the weights do not sum to
    /// one within [`WEIGHT_SUM_TOLERANCE`].
    pub fn validate(&self) -> Result<(), RiskModelError> {
        let mut seen = BTreeSet::new();

        for fw in &self.features {
            if !seen.insert(fw.feature) {
                return Err(RiskModelError::DuplicateFeature {
                    id: self.id.clone(),
                    feature: fw.feature,
                });
            }
            if !(fw.lo.is_finite() && fw.hi.is_finite() && fw.lo < fw.hi) {
                return Err(RiskModelError::InvalidRange {
                    id: self.id.clone(),
                    feature: fw.feature,
                    lo: fw.lo,
                    hi: fw.hi,
                });
            }
            if !fw.weight.is_finite() || fw.weight < 0.0 {
                return Err(RiskModelError::InvalidWeight {
                    id: self.id.clone(),
                    feature: fw.feature,
                    weight: fw.weight,
                });
            }
        }

        let sum = self.weight_sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(RiskModelError::WeightSum {
                id: self.id.clone(),
                sum,
            });
        }

        Ok(())
    }
}

/// Discrete risk tier.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    Critical,
}

impl RiskLevel {
    /// All levels from least to most severe.
    pub const ALL: &[Self] = &[Self::Low, Self::Moderate, Self::High, Self::Critical];

    /// Classifies a risk score. Each bound is exclusive: a score of exactly
    /// 50.0 is still [`RiskLevel::Moderate`].
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score > 75.0 {
            Self::Critical
        } else if score > 50.0 {
            Self::High
        } else if score > 25.0 {
            Self::Moderate
        } else {
            Self::Low
        }
    }
}

/// Final scored output for one point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskRecord {
    pub point: Point,
    pub features: FeatureVector,
    /// Score in `[0, 100]`, rounded to one decimal.
    pub risk_score: f64,
    pub risk_level: RiskLevel,
}

/// Rounds `value` to `decimals` places, half away from zero.
#[must_use]
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
