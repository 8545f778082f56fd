//! Null-safe spatial reduction of an image over a point footprint.
//!
//! Every step that can come up empty returns `None`: no image in the
//! window, a missing band, a footprint without valid pixels. Callers turn
//! `None` into [`NO_DATA_DEFAULT`] with [`or_no_data`] only at the very end,
//! so absence stays data rather than control flow.

use geo::{Coord, Intersects as _, Rect};
use geoalert_remote_models::{
    DateWindow, Derivation, IndexPairQuery, IndexPairValues, PointQuery, ReduceQuery, Selection,
};

use crate::catalog::{Catalog, Image, Raster};

/// Value substituted for an indicator with no data.
pub const NO_DATA_DEFAULT: f64 = 0.0;

/// Approximate length of one degree of latitude.
const METRES_PER_DEGREE: f64 = 111_320.0;

/// Square region over which a raster is averaged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Footprint {
    pub center: geo::Point<f64>,
    /// Half the side of the square, in metres.
    pub half_extent_m: f64,
}

impl Footprint {
    /// Footprint for `point`. A point with no buffer has zero extent and
    /// samples only the pixel under it.
    #[must_use]
    pub fn for_point(point: &PointQuery) -> Self {
        Self {
            center: geo::Point::new(point.longitude, point.latitude),
            half_extent_m: point.buffer_m.max(0.0),
        }
    }

    #[must_use]
    pub fn is_point(&self) -> bool {
        self.half_extent_m <= 0.0
    }

    #[must_use]
    pub fn rect(&self) -> Rect<f64> {
        let dlat = self.half_extent_m / METRES_PER_DEGREE;
        let dlon = self.half_extent_m
            / (METRES_PER_DEGREE * self.center.y().to_radians().cos().abs().max(1e-6));
        Rect::new(
            Coord {
                x: self.center.x() - dlon,
                y: self.center.y() - dlat,
            },
            Coord {
                x: self.center.x() + dlon,
                y: self.center.y() + dlat,
            },
        )
    }
}

/// Substitutes [`NO_DATA_DEFAULT`] for a missing value.
#[must_use]
pub fn or_no_data(value: Option<f64>) -> f64 {
    value.unwrap_or(NO_DATA_DEFAULT)
}

fn intersects_footprint(image: &Image, footprint: &Rect<f64>) -> bool {
    image
        .bands
        .values()
        .any(|raster| raster.bounds().intersects(footprint))
}

/// Latest image in `window` that intersects `footprint`.
#[must_use]
pub fn select_most_recent<'a>(
    images: &'a [Image],
    window: &DateWindow,
    footprint: &Footprint,
) -> Option<&'a Image> {
    let rect = footprint.rect();
    images
        .iter()
        .filter(|image| window.contains(image.acquired_date()))
        .filter(|image| intersects_footprint(image, &rect))
        .max_by_key(|image| image.acquired)
}

/// Evaluates `derivation` on `image` into a single-band raster.
#[must_use]
pub fn derive(image: &Image, derivation: &Derivation) -> Option<Raster> {
    match derivation {
        Derivation::Band { band } => image.band(band).cloned(),
        Derivation::NormalizedDifference { band_a, band_b } => {
            let a = image.band(band_a)?;
            let b = image.band(band_b)?;
            if !a.same_grid(b) {
                log::warn!(
                    "{}: bands '{band_a}' and '{band_b}' are on different grids",
                    image.id
                );
                return None;
            }

            let mut values = Vec::with_capacity(a.width * a.height);
            for row in 0..a.height {
                for col in 0..a.width {
                    values.push(normalized_difference(a.get(col, row), b.get(col, row)));
                }
            }

            Some(Raster { values, ..a.clone() })
        }
    }
}

fn normalized_difference(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    let (a, b) = (a?, b?);
    let denominator = a + b;
    if denominator == 0.0 {
        return None;
    }
    Some((a - b) / denominator)
}

/// Per-pixel sum of `derivation` over every image in `window`.
///
/// A pixel is masked only if it is masked in every image. Images on a
/// different grid than the first one are skipped.
#[must_use]
pub fn accumulate(images: &[Image], window: &DateWindow, derivation: &Derivation) -> Option<Raster> {
    let mut total: Option<Raster> = None;

    for image in images.iter().filter(|i| window.contains(i.acquired_date())) {
        let Some(raster) = derive(image, derivation) else {
            continue;
        };

        match total.as_mut() {
            None => total = Some(raster),
            Some(sum) if sum.same_grid(&raster) => {
                for (acc, value) in sum.values.iter_mut().zip(&raster.values) {
                    let value = value.filter(|v| v.is_finite());
                    *acc = match (*acc, value) {
                        (Some(x), Some(y)) => Some(x + y),
                        (x, y) => x.or(y),
                    };
                }
            }
            Some(_) => {
                log::warn!("{}: grid differs from accumulation grid, skipping", image.id);
            }
        }
    }

    total
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn candidate_cells(raster: &Raster, rect: &Rect<f64>) -> impl Iterator<Item = (usize, usize)> {
    let index = |offset: f64, round: fn(f64) -> f64, limit: usize| -> usize {
        (round(offset / raster.cell_deg).max(0.0) as usize).min(limit)
    };
    let col_lo = index(rect.min().x - raster.west, f64::floor, raster.width);
    let col_hi = index(rect.max().x - raster.west, f64::ceil, raster.width);
    let row_lo = index(raster.north - rect.max().y, f64::floor, raster.height);
    let row_hi = index(raster.north - rect.min().y, f64::ceil, raster.height);

    (row_lo..row_hi).flat_map(move |row| (col_lo..col_hi).map(move |col| (col, row)))
}

fn pixel_under(raster: &Raster, footprint: &Footprint) -> Option<f64> {
    raster
        .cell_at(footprint.center.x(), footprint.center.y())
        .and_then(|(col, row)| raster.get(col, row))
}

/// Arithmetic mean of valid pixels whose centre lies in the footprint.
///
/// An unbuffered footprint reads the pixel containing its centre. A buffer
/// smaller than a pixel falls back to the same pixel.
#[must_use]
pub fn mean_over(raster: &Raster, footprint: &Footprint) -> Option<f64> {
    if footprint.is_point() {
        return pixel_under(raster, footprint);
    }

    let rect = footprint.rect();
    let mut sum = 0.0;
    let mut count = 0_u32;

    for (col, row) in candidate_cells(raster, &rect) {
        if !rect.intersects(&raster.cell_center(col, row).0) {
            continue;
        }
        if let Some(value) = raster.get(col, row) {
            sum += value;
            count += 1;
        }
    }

    if count > 0 {
        return Some(sum / f64::from(count));
    }

    pixel_under(raster, footprint)
}

/// Reduces one indicator for one point, scaled by the query factor.
#[must_use]
pub fn reduce(catalog: &Catalog, query: &ReduceQuery, point: &PointQuery) -> Option<f64> {
    let footprint = Footprint::for_point(point);
    let images = catalog.images(&query.collection);

    let raster = match query.selection {
        Selection::MostRecent => {
            derive(select_most_recent(images, &query.window, &footprint)?, &query.derivation)?
        }
        Selection::Accumulated => accumulate(images, &query.window, &query.derivation)?,
    };

    mean_over(&raster, &footprint).map(|value| value * query.factor)
}

/// Reduces NDVI and NBR on one shared reflectance image.
///
/// Returns `None` when no image matches, so both indices fall back
/// together.
#[must_use]
pub fn reduce_pair(
    catalog: &Catalog,
    query: &IndexPairQuery,
    point: &PointQuery,
) -> Option<IndexPairValues> {
    let footprint = Footprint::for_point(point);
    let image = select_most_recent(catalog.images(&query.collection), &query.window, &footprint)?;

    let reduce_index = |derivation: &Derivation| {
        derive(image, derivation).and_then(|raster| mean_over(&raster, &footprint))
    };

    Some(IndexPairValues {
        ndvi: reduce_index(&query.ndvi),
        nbr: reduce_index(&query.nbr),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone as _, Utc};
    use std::collections::BTreeMap;

    const LON: f64 = -64.5;
    const LAT: f64 = -31.4;

    fn grid(values: Vec<Option<f64>>) -> Raster {
        // 3x3 grid of ~1 km cells centred on (LON, LAT).
        let cell = 0.01;
        Raster {
            west: LON - 1.5 * cell,
            north: LAT + 1.5 * cell,
            cell_deg: cell,
            width: 3,
            height: 3,
            values,
        }
    }

    fn uniform(value: f64) -> Raster {
        grid(vec![Some(value); 9])
    }

    fn image(id: &str, day: u32, bands: &[(&str, Raster)]) -> Image {
        Image {
            id: id.to_string(),
            acquired: Utc.with_ymd_and_hms(2025, 9, day, 14, 0, 0).unwrap(),
            bands: bands
                .iter()
                .map(|(name, r)| ((*name).to_string(), r.clone()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    fn window() -> DateWindow {
        DateWindow::new(
            NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 9, 30).unwrap(),
        )
        .unwrap()
    }

    fn point(buffer_m: f64) -> PointQuery {
        PointQuery {
            name: "p".to_string(),
            longitude: LON,
            latitude: LAT,
            buffer_m,
        }
    }

    fn band_query(collection: &str, band: &str, selection: Selection, factor: f64) -> ReduceQuery {
        ReduceQuery {
            collection: collection.to_string(),
            window: window(),
            selection,
            derivation: Derivation::Band {
                band: band.to_string(),
            },
            scale_m: 1000.0,
            factor,
        }
    }

    fn catalog(collection: &str, images: Vec<Image>) -> Catalog {
        Catalog {
            collections: BTreeMap::from([(collection.to_string(), images)]),
        }
    }

    #[test]
    fn most_recent_image_in_window_wins() {
        let images = vec![
            image("early", 3, &[("lst", uniform(14_000.0))]),
            image("late", 20, &[("lst", uniform(15_000.0))]),
            image("mid", 10, &[("lst", uniform(14_500.0))]),
        ];
        let fp = Footprint::for_point(&point(0.0));
        let selected = select_most_recent(&images, &window(), &fp).unwrap();
        assert_eq!(selected.id, "late");
    }

    #[test]
    fn images_outside_window_or_footprint_are_ignored() {
        let mut far = uniform(1.0);
        far.west += 10.0;
        let images = vec![
            image("outside_window", 30, &[("b", uniform(1.0))]),
            image("far_away", 15, &[("b", far)]),
        ];
        let fp = Footprint::for_point(&point(0.0));
        assert!(select_most_recent(&images, &window(), &fp).is_none());
    }

    #[test]
    fn reduce_applies_scale_factor() {
        let c = catalog("lst", vec![image("i", 5, &[("LST", uniform(15_000.0))])]);
        let q = band_query("lst", "LST", Selection::MostRecent, 0.02);
        let value = reduce(&c, &q, &point(0.0)).unwrap();
        assert!((value - 300.0).abs() < 1e-9);
    }

    #[test]
    fn reduce_without_image_is_none() {
        let c = catalog("lst", vec![]);
        let q = band_query("lst", "LST", Selection::MostRecent, 0.02);
        assert_eq!(reduce(&c, &q, &point(0.0)), None);
        assert!(or_no_data(reduce(&c, &q, &point(0.0))).abs() < f64::EPSILON);
    }

    #[test]
    fn reduce_over_fully_masked_footprint_is_none() {
        let c = catalog("lst", vec![image("i", 5, &[("LST", grid(vec![None; 9]))])]);
        let q = band_query("lst", "LST", Selection::MostRecent, 0.02);
        assert_eq!(reduce(&c, &q, &point(0.0)), None);
    }

    #[test]
    fn buffered_footprint_averages_valid_neighbours() {
        let mut values = vec![Some(2.0); 9];
        values[0] = None;
        values[8] = Some(10.0);
        let c = catalog("c", vec![image("i", 5, &[("b", grid(values))])]);
        let q = band_query("c", "b", Selection::MostRecent, 1.0);

        // Unbuffered: only the centre pixel.
        let centre = reduce(&c, &q, &point(0.0)).unwrap();
        assert!((centre - 2.0).abs() < 1e-9);

        // 2 km buffer covers all nine cells; one is masked.
        let mean = reduce(&c, &q, &point(2000.0)).unwrap();
        assert!((mean - (7.0 * 2.0 + 10.0) / 8.0).abs() < 1e-9);
    }

    #[test]
    fn normalized_difference_per_pixel() {
        let img = image(
            "refl",
            5,
            &[("nir", uniform(0.5)), ("red", uniform(0.1)), ("zero", uniform(0.0))],
        );
        let nd = derive(
            &img,
            &Derivation::NormalizedDifference {
                band_a: "nir".to_string(),
                band_b: "red".to_string(),
            },
        )
        .unwrap();
        assert!((nd.get(1, 1).unwrap() - (0.4 / 0.6)).abs() < 1e-12);

        let undefined = derive(
            &img,
            &Derivation::NormalizedDifference {
                band_a: "zero".to_string(),
                band_b: "zero".to_string(),
            },
        )
        .unwrap();
        assert_eq!(undefined.get(1, 1), None);
    }

    #[test]
    fn accumulation_sums_images_in_window() {
        let mut partial = vec![Some(4.0); 9];
        partial[4] = None;
        let images = vec![
            image("p1", 1, &[("precipitation", uniform(3.0))]),
            image("p2", 6, &[("precipitation", grid(partial))]),
            image("p3", 11, &[("precipitation", uniform(5.0))]),
            image("late", 30, &[("precipitation", uniform(100.0))]),
        ];
        let c = catalog("chirps", images);
        let q = band_query("chirps", "precipitation", Selection::Accumulated, 1.0);

        let total = accumulate(c.images("chirps"), &window(), &q.derivation).unwrap();
        assert!((total.get(0, 0).unwrap() - 12.0).abs() < 1e-9);
        assert!((total.get(1, 1).unwrap() - 8.0).abs() < 1e-9);

        let centre = reduce(&c, &q, &point(0.0)).unwrap();
        assert!((centre - 8.0).abs() < 1e-9);

        // 2.5 km buffer covers the whole 3x3 grid.
        let reduced = reduce(&c, &q, &point(2500.0)).unwrap();
        assert!((reduced - (8.0 * 12.0 + 8.0) / 9.0).abs() < 1e-9);
    }

    #[test]
    fn unbuffered_point_near_cell_edge_reads_only_its_pixel() {
        // 0.009 deg cells (~1 km) numbered 1..9 row-major from the north-west.
        let cell = 0.009;
        let raster = Raster {
            west: LON - 1.5 * cell,
            north: LAT + 1.5 * cell,
            cell_deg: cell,
            width: 3,
            height: 3,
            values: (1..=9).map(|v| Some(f64::from(v))).collect(),
        };
        let near_west_edge = PointQuery {
            name: "edge".to_string(),
            longitude: LON - 0.5 * cell + 0.0005,
            latitude: LAT,
            buffer_m: 0.0,
        };
        let c = catalog("c", vec![image("i", 5, &[("b", raster)])]);
        let q = band_query("c", "b", Selection::MostRecent, 1.0);

        let value = reduce(&c, &q, &near_west_edge).unwrap();
        assert!((value - 5.0).abs() < 1e-9);
    }

    #[test]
    fn accumulation_of_empty_window_is_none() {
        let c = catalog("chirps", vec![]);
        let q = band_query("chirps", "precipitation", Selection::Accumulated, 1.0);
        assert_eq!(reduce(&c, &q, &point(0.0)), None);
    }

    #[test]
    fn index_pair_shares_one_image() {
        let refl = image(
            "refl",
            12,
            &[
                ("b1", uniform(0.1)),
                ("b2", uniform(0.5)),
                ("b7", grid(vec![None; 9])),
            ],
        );
        let c = catalog("refl", vec![refl]);
        let q = IndexPairQuery {
            collection: "refl".to_string(),
            window: window(),
            scale_m: 1000.0,
            ndvi: Derivation::NormalizedDifference {
                band_a: "b2".to_string(),
                band_b: "b1".to_string(),
            },
            nbr: Derivation::NormalizedDifference {
                band_a: "b2".to_string(),
                band_b: "b7".to_string(),
            },
        };

        let pair = reduce_pair(&c, &q, &point(0.0)).unwrap();
        assert!((pair.ndvi.unwrap() - (0.4 / 0.6)).abs() < 1e-12);
        assert_eq!(pair.nbr, None);

        let empty = catalog("refl", vec![]);
        assert_eq!(reduce_pair(&empty, &q, &point(0.0)), None);
    }
}
