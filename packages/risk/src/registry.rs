//! Compile-time registry of risk model profiles.
//!
//! Each model version is defined in a TOML file under `profiles/`. The
//! registry embeds these at compile time and exposes them via
//! [`all_models`] and [`model_by_id`].

use geoalert_risk_models::{RiskModel, RiskModelError};

/// Model used when the run configuration does not name one.
pub const DEFAULT_MODEL_ID: &str = "v2-weather";

// ── Compile-time embedded TOML files ────────────────────────────────

const MODEL_TOMLS: &[(&str, &str)] = &[
    ("v1_vegetation", include_str!("../profiles/v1_vegetation.toml")),
    ("v2_weather", include_str!("../profiles/v2_weather.toml")),
];

#[cfg(test)]
const EXPECTED_MODEL_COUNT: usize = 2;

/// Returns every embedded risk model, in declaration order.
///
/// # Panics
///
/// Panics if any embedded profile is malformed or violates the model
/// invariants. The profiles are compiled into the binary, so this is a
/// build defect rather than a runtime condition.
#[must_use]
pub fn all_models() -> Vec<RiskModel> {
    MODEL_TOMLS
        .iter()
        .map(|(name, toml_str)| {
            let model: RiskModel = toml::de::from_str(toml_str)
                .unwrap_or_else(|e| panic!("Failed to parse risk model '{name}': {e}"));
            if let Err(e) = model.validate() {
                panic!("Invalid risk model '{name}': {e}");
            }
            model
        })
        .collect()
}

/// Looks up an embedded model by identifier.
///
/// # Errors
///
/// Returns [`RiskModelError::Unknown`] if no model has the given `id`.
pub fn model_by_id(id: &str) -> Result<RiskModel, RiskModelError> {
    all_models()
        .into_iter()
        .find(|m| m.id == id)
        .ok_or_else(|| RiskModelError::Unknown { id: id.to_string() })
}
