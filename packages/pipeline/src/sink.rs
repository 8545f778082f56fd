//! CSV result sink.
//!
//! One row per point, in input order. Feature values are rounded for
//! display (indices to three decimals, everything else to one); absent
//! weather observations are written as empty cells.

use std::io::Write;
use std::path::Path;

use geoalert_risk_models::{RiskLevel, RiskRecord, round_to};
use serde::Serialize;

use crate::PipelineError;

/// Output columns, in order.
pub const COLUMNS: [&str; 11] = [
    "name",
    "latitude",
    "longitude",
    "ndvi",
    "nbr",
    "lst_celsius",
    "precip_mm",
    "humidity_min",
    "wind_max_kmh",
    "risk_score",
    "risk_level",
];

#[derive(Serialize)]
struct CsvRow<'a> {
    name: &'a str,
    latitude: f64,
    longitude: f64,
    ndvi: f64,
    nbr: f64,
    lst_celsius: f64,
    precip_mm: f64,
    humidity_min: Option<f64>,
    wind_max_kmh: Option<f64>,
    risk_score: f64,
    risk_level: RiskLevel,
}

impl<'a> From<&'a RiskRecord> for CsvRow<'a> {
    fn from(record: &'a RiskRecord) -> Self {
        let f = &record.features;
        Self {
            name: &record.point.name,
            latitude: record.point.latitude,
            longitude: record.point.longitude,
            ndvi: round_to(f.ndvi, 3),
            nbr: round_to(f.nbr, 3),
            lst_celsius: round_to(f.lst_celsius, 1),
            precip_mm: round_to(f.precip_mm, 1),
            humidity_min: f.humidity_min.map(|v| round_to(v, 1)),
            wind_max_kmh: f.wind_max_kmh.map(|v| round_to(v, 1)),
            risk_score: record.risk_score,
            risk_level: record.risk_level,
        }
    }
}

/// Writes `records` as CSV to `writer`.
///
/// # Errors
///
/// Returns [`PipelineError::Csv`] if serialization or the write fails.
pub fn write_csv<W: Write>(writer: W, records: &[RiskRecord]) -> Result<(), PipelineError> {
    let mut csv = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    csv.write_record(COLUMNS)?;
    for record in records {
        csv.serialize(CsvRow::from(record))?;
    }
    csv.flush()?;
    Ok(())
}

/// Writes `records` to `path`, creating its parent directory if needed.
///
/// # Errors
///
/// Returns [`PipelineError`] if the directory or file cannot be created
/// or written.
pub fn write_csv_file(path: &Path, records: &[RiskRecord]) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let file = std::fs::File::create(path)?;
    write_csv(std::io::BufWriter::new(file), records)?;

    log::info!("Wrote {} records to {}", records.len(), path.display());
    Ok(())
}

/// Ensures a directory exists, creating it if necessary.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.as_os_str().is_empty() && !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}
