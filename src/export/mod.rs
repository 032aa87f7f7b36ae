//! Presentation exports of an analysed session

use serde::Serialize;
use std::path::Path;
use std::str::FromStr;

use crate::analyser::{Analyser, Summary};
use crate::error::{Result, RunningAppError};
use crate::source::{RunGeometry, SourceType};

pub mod csv;
pub mod json;

/// Export format types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Normalized table, one line per sample
    Csv,
    /// Session report: geometry and summary
    Json,
}

impl FromStr for ExportFormat {
    type Err = RunningAppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            _ => Err(RunningAppError::Configuration(format!(
                "Unsupported export format: {}",
                s
            ))),
        }
    }
}

/// What the presentation layer needs to lay out a session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionReport<'a> {
    pub source_type: SourceType,
    pub samples: usize,
    pub geometry: RunGeometry,
    pub map_zoom: u32,
    pub summary: &'a Summary,
}

impl<'a> SessionReport<'a> {
    pub fn new(analyser: &'a Analyser<'_>, map_scale_factor: f64) -> Result<Self> {
        let source = analyser.source();
        let geometry = source.run_geometry()?;
        Ok(Self {
            source_type: source.source_type(),
            samples: source.dataframe().len(),
            geometry,
            map_zoom: geometry.map_zoom(map_scale_factor),
            summary: analyser.summary(),
        })
    }
}

/// Write a session in the requested format
pub fn export_session<P: AsRef<Path>>(
    analyser: &Analyser<'_>,
    format: ExportFormat,
    map_scale_factor: f64,
    output_path: P,
) -> Result<()> {
    match format {
        ExportFormat::Csv => csv::export_table(analyser.dataframe(), output_path),
        ExportFormat::Json => {
            let report = SessionReport::new(analyser, map_scale_factor)?;
            json::export_json(&report, output_path)
        }
    }
}

pub(crate) fn export_error(path: &Path, reason: impl ToString) -> RunningAppError {
    RunningAppError::Export {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parsing() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!("json".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert!("pdf".parse::<ExportFormat>().is_err());
    }
}
