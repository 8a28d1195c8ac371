//! CSV export of synthetic market series.

use std::io::Write;
use std::path::Path;

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::error::ZkquantError;
use crate::domain::market::MarketSeries;

#[derive(Serialize)]
struct Row {
    index: usize,
    date: NaiveDate,
    price: f64,
}

/// Write `series` as `index,date,price` rows with a header.
pub fn write_series_to<W: Write>(writer: W, series: &MarketSeries) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);
    for (index, point) in series.points().iter().enumerate() {
        wtr.serialize(Row {
            index,
            date: point.timestamp,
            price: point.price,
        })?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_series(path: &Path, series: &MarketSeries) -> Result<(), ZkquantError> {
    let to_error = |e: csv::Error| ZkquantError::Persistence {
        path: path.display().to_string(),
        reason: e.to_string(),
    };
    let file = std::fs::File::create(path)?;
    write_series_to(file, series).map_err(to_error)?;
    tracing::info!(path = %path.display(), points = series.len(), "series written");
    Ok(())
}
