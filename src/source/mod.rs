use std::fmt;

use crate::error::{Result, RunningAppError};
use crate::models::NormalizedTable;

pub mod factory;
pub mod onmove;

pub use factory::{DataSourceFactory, SourceConstructor, SourceType};
pub use onmove::{OnMoveDataSource, OnMoveFiles, RawRow, RawTable};

/// Read-only view of one ingested session.
///
/// Implementations normalize eagerly at construction, so the table returned
/// by [`DataSource::dataframe`] is always complete.
pub trait DataSource: fmt::Debug {
    /// The normalized table of the session
    fn dataframe(&self) -> &NormalizedTable;

    /// Format this source was read from
    fn source_type(&self) -> SourceType;

    /// Mean latitude and mean longitude over all samples
    fn run_centre(&self) -> Result<(f64, f64)> {
        self.run_geometry().map(|geometry| geometry.centre)
    }

    /// Larger of the latitude extent and the longitude extent, in degrees
    fn run_width(&self) -> Result<f64> {
        self.run_geometry().map(|geometry| geometry.width)
    }

    /// Centre and width in one pass over the table
    fn run_geometry(&self) -> Result<RunGeometry> {
        RunGeometry::from_table(self.dataframe())
    }
}

/// Loading steps every format implements.
///
/// [`SourceLifecycle::normalize`] runs them once each, in order, and only
/// hands back a table when all three succeeded.
pub trait SourceLifecycle {
    /// Intermediate representation between reading and formatting
    type Raw;

    /// Load raw rows from the backing resource
    fn read_data(&self) -> Result<Self::Raw>;

    /// Remove conversion artifacts and duplicate rows
    fn clean_data(&self, raw: Self::Raw) -> Result<Self::Raw>;

    /// Compute every derived field
    fn format_data(&self, cleaned: Self::Raw) -> Result<NormalizedTable>;

    fn normalize(&self) -> Result<NormalizedTable> {
        let raw = self.read_data()?;
        let cleaned = self.clean_data(raw)?;
        self.format_data(cleaned)
    }
}

/// Centre point and spatial extent of a session
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct RunGeometry {
    /// (mean latitude, mean longitude)
    pub centre: (f64, f64),
    /// Larger of the latitude and longitude ranges, in degrees
    pub width: f64,
}

impl RunGeometry {
    pub fn from_table(table: &NormalizedTable) -> Result<Self> {
        let records = table.records();
        let first = records.first().ok_or_else(|| RunningAppError::EmptyDataset {
            context: "run geometry needs at least one position".to_string(),
        })?;

        let mut lat_sum = 0.0;
        let mut lon_sum = 0.0;
        let (mut lat_min, mut lat_max) = (first.latitude, first.latitude);
        let (mut lon_min, mut lon_max) = (first.longitude, first.longitude);

        for record in records {
            lat_sum += record.latitude;
            lon_sum += record.longitude;
            lat_min = lat_min.min(record.latitude);
            lat_max = lat_max.max(record.latitude);
            lon_min = lon_min.min(record.longitude);
            lon_max = lon_max.max(record.longitude);
        }

        let count = records.len() as f64;
        Ok(Self {
            centre: (lat_sum / count, lon_sum / count),
            width: (lat_max - lat_min).max(lon_max - lon_min),
        })
    }

    /// Default map zoom for this run at a given degrees-to-zoom scale factor
    pub fn map_zoom(&self, scale_factor: f64) -> u32 {
        (self.width * scale_factor).ceil().max(0.0) as u32
    }
}
