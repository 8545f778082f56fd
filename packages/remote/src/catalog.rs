//! In-memory image catalog used by the local backend.
//!
//! A [`Catalog`] maps collection identifiers to time-stamped [`Image`]s,
//! each holding one or more georeferenced [`Raster`] bands on a regular
//! latitude/longitude grid. Catalogs are loaded from JSON files.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use geo::{Coord, Rect};
use serde::{Deserialize, Serialize};

use crate::RemoteError;

/// A single band on a regular lat/lon grid.
///
/// Cells are stored row-major starting at the north-west corner. A `None`
/// cell is masked (cloud, fill value, out of swath).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Raster {
    /// Longitude of the western edge.
    pub west: f64,
    /// Latitude of the northern edge.
    pub north: f64,
    /// Cell size in degrees.
    pub cell_deg: f64,
    pub width: usize,
    pub height: usize,
    pub values: Vec<Option<f64>>,
}

impl Raster {
    /// Whether `other` shares this raster's grid.
    #[must_use]
    pub fn same_grid(&self, other: &Self) -> bool {
        self.width == other.width
            && self.height == other.height
            && (self.west - other.west).abs() < f64::EPSILON
            && (self.north - other.north).abs() < f64::EPSILON
            && (self.cell_deg - other.cell_deg).abs() < f64::EPSILON
    }

    /// Whether the value buffer matches the declared dimensions.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.cell_deg > 0.0 && self.values.len() == self.width * self.height
    }

    /// Geographic extent of the whole grid.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn bounds(&self) -> Rect<f64> {
        Rect::new(
            Coord {
                x: self.west,
                y: self.north - self.cell_deg * self.height as f64,
            },
            Coord {
                x: self.west + self.cell_deg * self.width as f64,
                y: self.north,
            },
        )
    }

    /// Centre of cell `(col, row)`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn cell_center(&self, col: usize, row: usize) -> geo::Point<f64> {
        geo::Point::new(
            self.west + self.cell_deg * (col as f64 + 0.5),
            self.north - self.cell_deg * (row as f64 + 0.5),
        )
    }

    /// Cell containing `(lon, lat)`, if inside the grid.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn cell_at(&self, lon: f64, lat: f64) -> Option<(usize, usize)> {
        let col = ((lon - self.west) / self.cell_deg).floor();
        let row = ((self.north - lat) / self.cell_deg).floor();
        if col < 0.0 || row < 0.0 || col >= self.width as f64 || row >= self.height as f64 {
            return None;
        }
        Some((col as usize, row as usize))
    }

    /// Valid (unmasked, finite) value at `(col, row)`.
    #[must_use]
    pub fn get(&self, col: usize, row: usize) -> Option<f64> {
        if col >= self.width || row >= self.height {
            return None;
        }
        self.values
            .get(row * self.width + col)
            .copied()
            .flatten()
            .filter(|v| v.is_finite())
    }
}

/// A time-stamped multi-band image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub id: String,
    /// Acquisition start time.
    pub acquired: DateTime<Utc>,
    pub bands: BTreeMap<String, Raster>,
}

impl Image {
    #[must_use]
    pub fn acquired_date(&self) -> NaiveDate {
        self.acquired.date_naive()
    }

    #[must_use]
    pub fn band(&self, name: &str) -> Option<&Raster> {
        self.bands.get(name)
    }
}

/// Collections of images keyed by collection identifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub collections: BTreeMap<String, Vec<Image>>,
}

impl Catalog {
    /// Images in `collection`, empty if the collection is unknown.
    #[must_use]
    pub fn images(&self, collection: &str) -> &[Image] {
        self.collections
            .get(collection)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Loads a catalog from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] if the file cannot be read, is not valid
    /// catalog JSON, or contains a raster whose value buffer does not
    /// match its dimensions.
    pub fn load(path: &Path) -> Result<Self, RemoteError> {
        let contents = std::fs::read_to_string(path)?;
        let catalog: Self = serde_json::from_str(&contents)?;
        catalog.check()?;

        log::info!(
            "Loaded image catalog {} ({} collections, {} images)",
            path.display(),
            catalog.collections.len(),
            catalog.collections.values().map(Vec::len).sum::<usize>()
        );

        Ok(catalog)
    }

    fn check(&self) -> Result<(), RemoteError> {
        for (collection, images) in &self.collections {
            for image in images {
                for (band, raster) in &image.bands {
                    if !raster.is_well_formed() {
                        return Err(RemoteError::Catalog {
                            message: format!(
                                "{collection}/{}: band '{band}' has {} values for a {}x{} grid",
                                image.id,
                                raster.values.len(),
                                raster.width,
                                raster.height
                            ),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}
