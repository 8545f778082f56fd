#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Date windows and the remote-sensing batch schema.
//!
//! A run describes every point and every indicator derivation in a single
//! [`BatchRequest`]. The compute backend evaluates it in one round trip and
//! answers with a [`BatchResponse`] holding the raw reduced values, where
//! `None` means the backend found no image or no valid pixels.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Indicator families that share a date window policy.
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
pub enum IndicatorFamily {
    /// Surface reflectance (NDVI, NBR).
    Reflectance,
    /// Land surface temperature.
    Temperature,
    /// Accumulated precipitation.
    Precipitation,
}

/// A calendar date range. `start` is inclusive and `end` exclusive, so a
/// window of N days covers exactly N acquisition dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    /// Creates a window, returning `None` if `start` is after `end`.
    #[must_use]
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// Number of days covered.
    #[must_use]
    pub fn length_days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    /// Whether `date` falls inside the window.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }
}

impl std::fmt::Display for DateWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.start, self.end)
    }
}

/// How a scalar band is derived from an image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Derivation {
    /// A band read directly.
    Band {
        band: String,
    },
    /// `(band_a - band_b) / (band_a + band_b)` per pixel.
    NormalizedDifference {
        band_a: String,
        band_b: String,
    },
}

impl Derivation {
    /// Every source band this derivation reads.
    #[must_use]
    pub fn bands(&self) -> Vec<&str> {
        match self {
            Self::Band { band } => vec![band.as_str()],
            Self::NormalizedDifference { band_a, band_b } => vec![band_a.as_str(), band_b.as_str()],
        }
    }
}

/// How an image is picked from its collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Selection {
    /// The latest image intersecting the footprint inside the window.
    MostRecent,
    /// The per-pixel sum of every image inside the window.
    Accumulated,
}

/// One reduction: which image, which derived band, at what resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReduceQuery {
    /// Collection identifier (e.g., `"MODIS/061/MOD11A1"`).
    pub collection: String,
    pub window: DateWindow,
    pub selection: Selection,
    pub derivation: Derivation,
    /// Working resolution in the source's ground units (metres).
    pub scale_m: f64,
    /// Multiplier applied to the reduced mean.
    pub factor: f64,
}

/// NDVI and NBR computed on one shared reflectance image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexPairQuery {
    pub collection: String,
    pub window: DateWindow,
    pub scale_m: f64,
    pub ndvi: Derivation,
    pub nbr: Derivation,
}

/// The derivations evaluated for every point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorPlan {
    pub reflectance: IndexPairQuery,
    pub temperature: ReduceQuery,
    pub precipitation: ReduceQuery,
}

/// A point to evaluate, with its reduction footprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointQuery {
    pub name: String,
    pub longitude: f64,
    pub latitude: f64,
    /// Footprint radius in metres; `0` reduces over the point itself.
    pub buffer_m: f64,
}

/// A full batch: one plan applied to every point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub plan: IndicatorPlan,
    pub points: Vec<PointQuery>,
}

/// Reduced NDVI and NBR for an image that was found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexPairValues {
    pub ndvi: Option<f64>,
    pub nbr: Option<f64>,
}

/// Raw reduced values for one point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointReduction {
    pub name: String,
    /// `None` when no reflectance image matched the window.
    #[serde(default)]
    pub reflectance: Option<IndexPairValues>,
    /// Scaled temperature in kelvin.
    #[serde(default)]
    pub temperature: Option<f64>,
    /// Accumulated precipitation in millimetres.
    #[serde(default)]
    pub precipitation: Option<f64>,
}

/// Backend answer to a [`BatchRequest`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchResponse {
    pub points: Vec<PointReduction>,
}
