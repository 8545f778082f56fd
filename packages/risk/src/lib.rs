#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Weighted wildfire risk scoring.
//!
//! The [`scorer`] turns a merged [`FeatureVector`] into a bounded score and a
//! [`RiskLevel`] under a given [`RiskModel`]. Models are versioned TOML
//! profiles embedded by the [`registry`], so the scoring formula can be
//! swapped without touching feature extraction.
//!
//! [`FeatureVector`]: geoalert_risk_models::FeatureVector
//! [`RiskLevel`]: geoalert_risk_models::RiskLevel
//! [`RiskModel`]: geoalert_risk_models::RiskModel

pub mod registry;
pub mod scorer;

pub use registry::{DEFAULT_MODEL_ID, all_models, model_by_id};
pub use scorer::{classify, contribution, contributions, score, score_point};
