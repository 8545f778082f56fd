//! Feature normalization, weighted scoring and classification.
//!
//! Each feature is mapped to a `[0, 1]` risk contribution through its
//! model range and direction:
//!
//! ```text
//! t = clamp((value - lo) / (hi - lo), 0, 1)
//! contribution = t            (increasing)
//!              = 1 - t        (decreasing)
//! score = round(100 * Σ weight * contribution, 1)
//! ```
//!
//! Absent weather observations are treated as benign: humidity becomes
//! [`FALLBACK_HUMIDITY_MIN`] and wind becomes [`FALLBACK_WIND_MAX_KMH`]
//! before normalization.

use geoalert_risk_models::{
    Direction, FALLBACK_HUMIDITY_MIN, FALLBACK_WIND_MAX_KMH, Feature, FeatureVector,
    FeatureWeight, Point, RiskLevel, RiskModel, RiskRecord, round_to,
};

/// Risk contribution of a single raw value, always within `[0, 1]`.
///
/// A `NaN` value contributes nothing.
#[must_use]
pub fn contribution(weight: &FeatureWeight, value: f64) -> f64 {
    let t = (value - weight.lo) / (weight.hi - weight.lo);
    if t.is_nan() {
        return 0.0;
    }
    let t = t.clamp(0.0, 1.0);

    match weight.direction {
        Direction::Increasing => t,
        Direction::Decreasing => 1.0 - t,
    }
}

/// Value fed into normalization, with fail-safe-low defaults for absent
/// weather fields.
fn scoring_value(features: &FeatureVector, feature: Feature) -> f64 {
    match feature {
        Feature::HumidityMin => features.humidity_min.unwrap_or(FALLBACK_HUMIDITY_MIN),
        Feature::WindMaxKmh => features.wind_max_kmh.unwrap_or(FALLBACK_WIND_MAX_KMH),
        other => features.value(other).unwrap_or(0.0),
    }
}

/// Per-feature contributions (unweighted) in model order.
#[must_use]
pub fn contributions(features: &FeatureVector, model: &RiskModel) -> Vec<(Feature, f64)> {
    model
        .features
        .iter()
        .map(|fw| (fw.feature, contribution(fw, scoring_value(features, fw.feature))))
        .collect()
}

/// Weighted risk score in `[0, 100]`, rounded to one decimal.
#[must_use]
pub fn score(features: &FeatureVector, model: &RiskModel) -> f64 {
    let weighted: f64 = model
        .features
        .iter()
        .map(|fw| fw.weight * contribution(fw, scoring_value(features, fw.feature)))
        .sum();

    round_to(100.0 * weighted, 1).clamp(0.0, 100.0)
}

/// Maps a score onto its [`RiskLevel`].
#[must_use]
pub fn classify(score: f64) -> RiskLevel {
    RiskLevel::from_score(score)
}

/// Scores one point and produces its terminal [`RiskRecord`].
#[must_use]
pub fn score_point(point: Point, features: FeatureVector, model: &RiskModel) -> RiskRecord {
    let risk_score = score(&features, model);
    let risk_level = classify(risk_score);

    log::debug!(
        "{}: score={risk_score} level={risk_level} (model {})",
        point.name,
        model.id
    );

    RiskRecord {
        point,
        features,
        risk_score,
        risk_level,
    }
}
