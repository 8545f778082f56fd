//! Remote feature extraction.
//!
//! Builds one [`BatchRequest`] covering every point, hands it to a
//! [`ComputeBackend`], and turns the raw reductions into per-point
//! [`FeatureVector`]s. Fallback substitution, the kelvin guard and the
//! NDVI/NBR pairing all happen here, after the backend answered, so every
//! backend gets the same semantics.

use std::collections::{BTreeSet, HashMap};

use geoalert_remote_models::{
    BatchRequest, BatchResponse, Derivation, IndexPairQuery, IndicatorPlan, PointQuery,
    PointReduction, ReduceQuery, Selection,
};
use geoalert_risk_models::{Feature, FeatureVector, Point};
use serde::{Deserialize, Serialize};

use crate::RemoteError;
use crate::backend::ComputeBackend;
use crate::reducer::NO_DATA_DEFAULT;
use crate::windows::ResolvedWindows;

/// Offset between kelvin and degrees Celsius.
pub const KELVIN_OFFSET: f64 = 273.15;

const fn default_factor() -> f64 {
    1.0
}

/// Surface reflectance source for the vegetation and burn indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReflectanceSource {
    pub collection: String,
    pub red_band: String,
    pub nir_band: String,
    pub swir_band: String,
    pub scale_m: f64,
}

impl Default for ReflectanceSource {
    fn default() -> Self {
        Self {
            collection: "MODIS/061/MOD09GA".to_string(),
            red_band: "sur_refl_b01".to_string(),
            nir_band: "sur_refl_b02".to_string(),
            swir_band: "sur_refl_b07".to_string(),
            scale_m: 1000.0,
        }
    }
}

/// A single-band source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandSource {
    pub collection: String,
    pub band: String,
    pub scale_m: f64,
    #[serde(default = "default_factor")]
    pub factor: f64,
}

/// Source settings for every remote indicator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Footprint radius around each point in metres; `0` samples the
    /// pixel under the point.
    pub footprint_buffer_m: f64,
    pub reflectance: ReflectanceSource,
    pub temperature: BandSource,
    pub precipitation: BandSource,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            footprint_buffer_m: 0.0,
            reflectance: ReflectanceSource::default(),
            temperature: BandSource {
                collection: "MODIS/061/MOD11A1".to_string(),
                band: "LST_Day_1km".to_string(),
                scale_m: 1000.0,
                factor: 0.02,
            },
            precipitation: BandSource {
                collection: "UCSB-CHG/CHIRPS/PENTAD".to_string(),
                band: "precipitation".to_string(),
                scale_m: 5000.0,
                factor: 1.0,
            },
        }
    }
}

impl RemoteConfig {
    /// Derivations for every indicator, bound to `windows`.
    #[must_use]
    pub fn plan(&self, windows: &ResolvedWindows) -> IndicatorPlan {
        let refl = &self.reflectance;
        IndicatorPlan {
            reflectance: IndexPairQuery {
                collection: refl.collection.clone(),
                window: windows.reflectance,
                scale_m: refl.scale_m,
                ndvi: Derivation::NormalizedDifference {
                    band_a: refl.nir_band.clone(),
                    band_b: refl.red_band.clone(),
                },
                nbr: Derivation::NormalizedDifference {
                    band_a: refl.nir_band.clone(),
                    band_b: refl.swir_band.clone(),
                },
            },
            temperature: ReduceQuery {
                collection: self.temperature.collection.clone(),
                window: windows.temperature,
                selection: Selection::MostRecent,
                derivation: Derivation::Band {
                    band: self.temperature.band.clone(),
                },
                scale_m: self.temperature.scale_m,
                factor: self.temperature.factor,
            },
            precipitation: ReduceQuery {
                collection: self.precipitation.collection.clone(),
                window: windows.precipitation,
                selection: Selection::Accumulated,
                derivation: Derivation::Band {
                    band: self.precipitation.band.clone(),
                },
                scale_m: self.precipitation.scale_m,
                factor: self.precipitation.factor,
            },
        }
    }
}

/// Describes every point and derivation as a single batch.
#[must_use]
pub fn build_batch(points: &[Point], windows: &ResolvedWindows, config: &RemoteConfig) -> BatchRequest {
    BatchRequest {
        plan: config.plan(windows),
        points: points
            .iter()
            .map(|p| PointQuery {
                name: p.name.clone(),
                longitude: p.longitude,
                latitude: p.latitude,
                buffer_m: config.footprint_buffer_m,
            })
            .collect(),
    }
}

/// Converts one raw reduction into a remote-only [`FeatureVector`].
///
/// Missing or non-finite values become [`NO_DATA_DEFAULT`] and are listed
/// in [`FeatureVector::fallbacks`]. Temperature is converted from kelvin
/// only when positive, so a missing temperature stays `0.0`.
#[must_use]
pub fn resolve_point(reduction: &PointReduction) -> FeatureVector {
    let mut fallbacks = BTreeSet::new();
    let mut resolve = |feature: Feature, value: Option<f64>| {
        value.filter(|v| v.is_finite()).unwrap_or_else(|| {
            fallbacks.insert(feature);
            NO_DATA_DEFAULT
        })
    };

    let (ndvi, nbr) = reduction
        .reflectance
        .map_or((None, None), |pair| (pair.ndvi, pair.nbr));

    let lst_celsius = reduction
        .temperature
        .filter(|kelvin| *kelvin > 0.0)
        .map(|kelvin| kelvin - KELVIN_OFFSET);

    let ndvi = resolve(Feature::Ndvi, ndvi);
    let nbr = resolve(Feature::Nbr, nbr);
    let lst_celsius = resolve(Feature::LstCelsius, lst_celsius);
    let precip_mm = resolve(Feature::PrecipMm, reduction.precipitation);

    FeatureVector {
        ndvi,
        nbr,
        lst_celsius,
        precip_mm,
        humidity_min: None,
        wind_max_kmh: None,
        fallbacks,
    }
}

/// Matches the backend answer to `points`, preserving input order.
///
/// # Errors
///
/// Returns [`RemoteError::MissingPoint`] if the response has no entry for
/// one of the points.
pub fn interpret(points: &[Point], response: &BatchResponse) -> Result<Vec<FeatureVector>, RemoteError> {
    let by_name: HashMap<&str, &PointReduction> = response
        .points
        .iter()
        .map(|r| (r.name.as_str(), r))
        .collect();

    points
        .iter()
        .map(|point| {
            let reduction = by_name
                .get(point.name.as_str())
                .ok_or_else(|| RemoteError::MissingPoint {
                    name: point.name.clone(),
                })?;
            let features = resolve_point(reduction);

            if !features.fallbacks.is_empty() {
                let names: Vec<&str> = features.fallbacks.iter().map(AsRef::as_ref).collect();
                log::debug!("{}: no data for {}", point.name, names.join(", "));
            }

            Ok(features)
        })
        .collect()
}

/// Evaluates the remote indicators for every point in one backend call.
///
/// # Errors
///
/// Returns [`RemoteError`] if the backend fails or its answer is
/// incomplete.
pub async fn extract_features(
    backend: &dyn ComputeBackend,
    points: &[Point],
    windows: &ResolvedWindows,
    config: &RemoteConfig,
) -> Result<Vec<FeatureVector>, RemoteError> {
    let request = build_batch(points, windows, config);

    log::info!(
        "Extracting remote features for {} points via {} backend (reflectance {}, precipitation {})",
        points.len(),
        backend.id(),
        windows.reflectance,
        windows.precipitation
    );

    let response = backend.evaluate(&request).await?;
    interpret(points, &response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LocalBackend;
    use crate::catalog::{Catalog, Image, Raster};
    use crate::windows::DateRangeSelector;
    use chrono::{TimeZone as _, Utc};
    use geoalert_remote_models::IndexPairValues;
    use std::collections::BTreeMap;

    fn reduction(
        reflectance: Option<IndexPairValues>,
        temperature: Option<f64>,
        precipitation: Option<f64>,
    ) -> PointReduction {
        PointReduction {
            name: "p".to_string(),
            reflectance,
            temperature,
            precipitation,
        }
    }

    #[test]
    fn kelvin_converted_only_when_positive() {
        let fv = resolve_point(&reduction(None, Some(308.15), Some(5.0)));
        assert!((fv.lst_celsius - 35.0).abs() < 1e-9);
        assert!(!fv.fallbacks.contains(&Feature::LstCelsius));

        for raw in [Some(0.0), None, Some(-3.0), Some(f64::NAN)] {
            let fv = resolve_point(&reduction(None, raw, None));
            assert!(fv.lst_celsius.abs() < f64::EPSILON, "{raw:?}");
            assert!(fv.fallbacks.contains(&Feature::LstCelsius));
        }
    }

    #[test]
    fn missing_reflectance_defaults_both_indices() {
        let fv = resolve_point(&reduction(None, Some(300.0), Some(12.0)));
        assert!(fv.ndvi.abs() < f64::EPSILON);
        assert!(fv.nbr.abs() < f64::EPSILON);
        assert!(fv.fallbacks.contains(&Feature::Ndvi));
        assert!(fv.fallbacks.contains(&Feature::Nbr));
        assert!(!fv.fallbacks.contains(&Feature::PrecipMm));
    }

    #[test]
    fn indices_from_one_image_resolve_independently() {
        let pair = IndexPairValues {
            ndvi: Some(0.42),
            nbr: None,
        };
        let fv = resolve_point(&reduction(Some(pair), None, None));
        assert!((fv.ndvi - 0.42).abs() < f64::EPSILON);
        assert!(fv.nbr.abs() < f64::EPSILON);
        assert!(!fv.fallbacks.contains(&Feature::Ndvi));
        assert!(fv.fallbacks.contains(&Feature::Nbr));
    }

    #[test]
    fn genuine_zero_is_not_a_fallback() {
        let pair = IndexPairValues {
            ndvi: Some(0.0),
            nbr: Some(0.0),
        };
        let fv = resolve_point(&reduction(Some(pair), Some(300.0), Some(0.0)));
        assert!(fv.fallbacks.is_empty());
        assert_eq!(fv.humidity_min, None);
    }

    #[test]
    fn interpret_preserves_input_order() {
        let points = vec![Point::new("b", -31.0, -64.0), Point::new("a", -32.0, -65.0)];
        let response = BatchResponse {
            points: vec![
                PointReduction {
                    precipitation: Some(1.0),
                    ..reduction(None, None, None)
                },
                PointReduction {
                    name: "a".to_string(),
                    ..reduction(None, None, Some(2.0))
                },
                PointReduction {
                    name: "b".to_string(),
                    ..reduction(None, None, Some(3.0))
                },
            ],
        };
        let features = interpret(&points, &response).unwrap();
        assert!((features[0].precip_mm - 3.0).abs() < f64::EPSILON);
        assert!((features[1].precip_mm - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn interpret_rejects_incomplete_response() {
        let points = vec![Point::new("ghost", 0.0, 0.0)];
        let err = interpret(&points, &BatchResponse::default()).unwrap_err();
        assert!(matches!(err, RemoteError::MissingPoint { name } if name == "ghost"));
    }

    #[test]
    fn batch_uses_configured_sources_and_windows() {
        let reference = Utc.with_ymd_and_hms(2025, 10, 5, 0, 0, 0).unwrap();
        let windows = DateRangeSelector::default().windows(reference);
        let points = vec![Point::new("p", -31.4, -64.5)];
        let batch = build_batch(&points, &windows, &RemoteConfig::default());

        assert!((batch.points[0].longitude - -64.5).abs() < f64::EPSILON);
        assert!((batch.plan.temperature.factor - 0.02).abs() < f64::EPSILON);
        assert_eq!(batch.plan.temperature.selection, Selection::MostRecent);
        assert_eq!(batch.plan.precipitation.selection, Selection::Accumulated);
        assert!((batch.plan.precipitation.scale_m - 5000.0).abs() < f64::EPSILON);
        assert_eq!(batch.plan.precipitation.window, windows.precipitation);
        assert_eq!(
            batch.plan.reflectance.nbr.bands(),
            vec!["sur_refl_b02", "sur_refl_b07"]
        );
    }

    fn uniform(value: f64) -> Raster {
        Raster {
            west: -65.0,
            north: -31.0,
            cell_deg: 0.01,
            width: 100,
            height: 100,
            values: vec![Some(value); 10_000],
        }
    }

    #[tokio::test]
    async fn extracts_through_local_backend() {
        let reference = Utc.with_ymd_and_hms(2025, 10, 5, 12, 0, 0).unwrap();
        let acquired = Utc.with_ymd_and_hms(2025, 9, 20, 14, 0, 0).unwrap();
        let image = |id: &str, bands: Vec<(&str, Raster)>| Image {
            id: id.to_string(),
            acquired,
            bands: bands
                .into_iter()
                .map(|(b, r)| (b.to_string(), r))
                .collect::<BTreeMap<_, _>>(),
        };

        let catalog = Catalog {
            collections: BTreeMap::from([
                (
                    "MODIS/061/MOD09GA".to_string(),
                    vec![image(
                        "refl",
                        vec![
                            ("sur_refl_b01", uniform(0.1)),
                            ("sur_refl_b02", uniform(0.5)),
                            ("sur_refl_b07", uniform(0.3)),
                        ],
                    )],
                ),
                (
                    "MODIS/061/MOD11A1".to_string(),
                    vec![image("lst", vec![("LST_Day_1km", uniform(15_407.5))])],
                ),
            ]),
        };

        let backend = LocalBackend::new(catalog);
        let windows = DateRangeSelector::default().windows(reference);
        let points = vec![Point::new("Sierras", -31.4, -64.5)];
        let features = extract_features(&backend, &points, &windows, &RemoteConfig::default())
            .await
            .unwrap();

        let fv = &features[0];
        assert!((fv.ndvi - 0.4 / 0.6).abs() < 1e-9);
        assert!((fv.nbr - 0.2 / 0.8).abs() < 1e-9);
        assert!((fv.lst_celsius - 35.0).abs() < 1e-6);
        assert!(fv.precip_mm.abs() < f64::EPSILON);
        assert_eq!(fv.fallbacks, BTreeSet::from([Feature::PrecipMm]));
    }
}
