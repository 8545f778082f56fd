//! Loads the analysis point set from a GeoJSON `FeatureCollection`.
//!
//! Every feature needs a `Point` geometry and a `name` property. The
//! legacy `nombre` property is accepted when `name` is missing.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use geoalert_risk_models::Point;
use geojson::{Feature, GeoJson};

/// Properties checked, in order, for a point's name.
const NAME_PROPERTIES: &[&str] = &["name", "nombre"];

/// Errors that make a point set unusable. All of them abort the run.
#[derive(Debug, thiserror::Error)]
pub enum PointSetError {
    #[error("Point set not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Failed to read point set {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid GeoJSON: {0}")]
    GeoJson(#[from] Box<geojson::Error>),

    #[error("Expected a FeatureCollection, found a {found}")]
    NotFeatureCollection { found: &'static str },

    #[error("Feature #{index}: {message}")]
    InvalidFeature { index: usize, message: String },

    #[error("Duplicate point name '{name}'")]
    DuplicateName { name: String },

    #[error("Point set contains no features")]
    Empty,
}

/// Reads and validates the point set at `path`.
///
/// # Errors
///
/// Returns [`PointSetError`] if the file is missing, unreadable, not a
/// valid `FeatureCollection` of named points, or empty.
pub fn load_points(path: &Path) -> Result<Vec<Point>, PointSetError> {
    if !path.exists() {
        return Err(PointSetError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|source| PointSetError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let points = parse_points(&contents)?;
    log::info!("Loaded {} points from {}", points.len(), path.display());
    Ok(points)
}

/// Parses a GeoJSON document into points, preserving feature order.
///
/// # Errors
///
/// See [`load_points`].
pub fn parse_points(geojson_str: &str) -> Result<Vec<Point>, PointSetError> {
    let geojson: GeoJson = geojson_str.parse().map_err(Box::new)?;

    let collection = match geojson {
        GeoJson::FeatureCollection(collection) => collection,
        GeoJson::Feature(_) => return Err(PointSetError::NotFeatureCollection { found: "Feature" }),
        GeoJson::Geometry(_) => {
            return Err(PointSetError::NotFeatureCollection { found: "Geometry" });
        }
    };

    let mut seen = BTreeSet::new();
    let mut points = Vec::with_capacity(collection.features.len());

    for (index, feature) in collection.features.iter().enumerate() {
        let point = parse_feature(feature)
            .map_err(|message| PointSetError::InvalidFeature { index, message })?;

        if !seen.insert(point.name.clone()) {
            return Err(PointSetError::DuplicateName { name: point.name });
        }
        points.push(point);
    }

    if points.is_empty() {
        return Err(PointSetError::Empty);
    }

    Ok(points)
}

fn parse_feature(feature: &Feature) -> Result<Point, String> {
    let name = NAME_PROPERTIES
        .iter()
        .find_map(|key| {
            feature
                .property(key)
                .and_then(serde_json::Value::as_str)
                .map(str::trim)
                .filter(|name| !name.is_empty())
        })
        .ok_or_else(|| "missing 'name' property".to_string())?;

    let geometry = feature
        .geometry
        .clone()
        .ok_or_else(|| format!("'{name}' has no geometry"))?;
    let geometry: geo::Geometry<f64> = geometry
        .try_into()
        .map_err(|e| format!("'{name}' has an invalid geometry: {e}"))?;

    let geo::Geometry::Point(point) = geometry else {
        return Err(format!("'{name}' is not a Point geometry"));
    };

    let (longitude, latitude) = (point.x(), point.y());
    if !((-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude)) {
        return Err(format!(
            "'{name}' has out-of-range coordinates ({longitude}, {latitude})"
        ));
    }

    Ok(Point::new(name, latitude, longitude))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn collection(features: &serde_json::Value) -> String {
        json!({ "type": "FeatureCollection", "features": features }).to_string()
    }

    fn feature(properties: &serde_json::Value, lon: f64, lat: f64) -> serde_json::Value {
        json!({
            "type": "Feature",
            "properties": properties,
            "geometry": { "type": "Point", "coordinates": [lon, lat] }
        })
    }

    #[test]
    fn parses_named_points_in_order() {
        let doc = collection(&json!([
            feature(&json!({ "name": "Sierras Chicas" }), -64.35, -31.2),
            feature(&json!({ "nombre": "Traslasierra" }), -65.1, -31.9),
        ]));
        let points = parse_points(&doc).unwrap();

        assert_eq!(points.len(), 2);
        assert_eq!(points[0].name, "Sierras Chicas");
        assert!((points[0].longitude - -64.35).abs() < f64::EPSILON);
        assert!((points[0].latitude - -31.2).abs() < f64::EPSILON);
        assert_eq!(points[1].name, "Traslasierra");
    }

    #[test]
    fn name_wins_over_legacy_nombre() {
        let doc = collection(&json!([feature(
            &json!({ "name": "new", "nombre": "old" }),
            -64.0,
            -31.0
        )]));
        assert_eq!(parse_points(&doc).unwrap()[0].name, "new");
    }

    #[test]
    fn blank_name_falls_back_to_nombre() {
        let doc = collection(&json!([feature(
            &json!({ "name": "  ", "nombre": " Traslasierra " }),
            -65.1,
            -31.9
        )]));
        assert_eq!(parse_points(&doc).unwrap()[0].name, "Traslasierra");
    }

    #[test]
    fn empty_collection_is_fatal() {
        let err = parse_points(&collection(&json!([]))).unwrap_err();
        assert!(matches!(err, PointSetError::Empty));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let doc = collection(&json!([
            feature(&json!({ "name": "a" }), -64.0, -31.0),
            feature(&json!({ "name": "a" }), -65.0, -32.0),
        ]));
        assert!(matches!(
            parse_points(&doc),
            Err(PointSetError::DuplicateName { name }) if name == "a"
        ));
    }

    #[test]
    fn non_point_or_unnamed_features_are_rejected() {
        let polygon = json!({
            "type": "Feature",
            "properties": { "name": "area" },
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[-64.0, -31.0], [-63.0, -31.0], [-63.0, -30.0], [-64.0, -31.0]]]
            }
        });
        assert!(matches!(
            parse_points(&collection(&json!([polygon]))),
            Err(PointSetError::InvalidFeature { index: 0, .. })
        ));

        let unnamed = feature(&json!({ "id": 7 }), -64.0, -31.0);
        assert!(matches!(
            parse_points(&collection(&json!([unnamed]))),
            Err(PointSetError::InvalidFeature { .. })
        ));
    }

    #[test]
    fn swapped_coordinates_are_caught() {
        let doc = collection(&json!([feature(&json!({ "name": "x" }), -31.0, -164.0)]));
        assert!(matches!(
            parse_points(&doc),
            Err(PointSetError::InvalidFeature { .. })
        ));
    }

    #[test]
    fn bare_geometry_is_not_a_point_set() {
        let doc = json!({ "type": "Point", "coordinates": [-64.0, -31.0] }).to_string();
        assert!(matches!(
            parse_points(&doc),
            Err(PointSetError::NotFeatureCollection { found: "Geometry" })
        ));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = load_points(Path::new("/nonexistent/geoalert/points.geojson")).unwrap_err();
        assert!(matches!(err, PointSetError::NotFound { .. }));
    }
}
