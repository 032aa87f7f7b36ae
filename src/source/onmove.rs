//! OnMove activity ingestion
//!
//! OnMove watches record a session as two binary files: an OMD file holding
//! the samples (time, distance, speed, position, roughly every 5 seconds)
//! and an OMH file holding the session header. This source reads the OMD
//! data after it has been converted to delimited text upstream; the OMH
//! file is optional and only checked for presence.

use csv::{ReaderBuilder, Trim};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{Result, RunningAppError};
use crate::models::{
    is_derived_column, CellValue, NormalizedTable, Record, Sample, DISTANCE, LATITUDE, LONGITUDE,
    REQUIRED_COLUMNS, SPEED, TIME,
};
use crate::source::{DataSource, SourceLifecycle, SourceType};

/// Header prefix the binary-to-text converter gives to anonymous columns
const PLACEHOLDER_PREFIX: &str = "Unnamed";

/// One data row as read from the file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    /// Line number in the source file
    pub line: u64,
    pub fields: Vec<String>,
}

/// Header and rows of an activity file before typing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl RawTable {
    fn position(&self, column: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == column)
    }
}

fn is_placeholder_column(name: &str) -> bool {
    let name = name.trim();
    name.is_empty() || name.starts_with(PLACEHOLDER_PREFIX)
}

/// The files making up one OnMove session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnMoveFiles {
    data_file: PathBuf,
    summary_file: Option<PathBuf>,
}

impl OnMoveFiles {
    /// Data file first, optional summary file second
    pub fn from_list(files: &[PathBuf]) -> Result<Self> {
        match files {
            [data] => Ok(Self {
                data_file: data.clone(),
                summary_file: None,
            }),
            [data, summary] => Ok(Self {
                data_file: data.clone(),
                summary_file: Some(summary.clone()),
            }),
            _ => Err(RunningAppError::InvalidFileList { found: files.len() }),
        }
    }

    pub fn data_file(&self) -> &Path {
        &self.data_file
    }

    pub fn summary_file(&self) -> Option<&Path> {
        self.summary_file.as_deref()
    }

    fn read_error(&self, reason: impl Into<String>) -> RunningAppError {
        RunningAppError::SourceRead {
            path: self.data_file.clone(),
            reason: reason.into(),
        }
    }

    fn parse_float(column: &str, row: &RawRow, index: usize) -> Result<f64> {
        let raw = row.fields.get(index).map(String::as_str).unwrap_or("");
        match raw.trim().parse::<f64>() {
            Ok(value) if !value.is_nan() => Ok(value),
            _ => Err(RunningAppError::InvalidRecord {
                line: row.line,
                column: column.to_string(),
                value: raw.to_string(),
            }),
        }
    }

    /// A blank or NaN speed is a sensor dropout and reads as standing still
    fn parse_speed(row: &RawRow, index: usize) -> Result<f64> {
        let raw = row.fields.get(index).map(String::as_str).unwrap_or("").trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case("nan") {
            debug!(line = row.line, "Speed missing, sample has no pace");
            return Ok(0.0);
        }
        Self::parse_float(SPEED, row, index)
    }

    fn parse_time(row: &RawRow, index: usize) -> Result<i64> {
        let raw = row.fields.get(index).map(String::as_str).unwrap_or("").trim();
        if let Ok(seconds) = raw.parse::<i64>() {
            return Ok(seconds);
        }
        // Some converters write whole seconds as "12.0"
        match raw.parse::<f64>() {
            Ok(seconds) if seconds.is_finite() && seconds.fract() == 0.0 => Ok(seconds as i64),
            _ => Err(RunningAppError::InvalidRecord {
                line: row.line,
                column: TIME.to_string(),
                value: raw.to_string(),
            }),
        }
    }
}

impl SourceLifecycle for OnMoveFiles {
    type Raw = RawTable;

    fn read_data(&self) -> Result<RawTable> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(Trim::All)
            .from_path(&self.data_file)
            .map_err(|e| self.read_error(e.to_string()))?;

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| self.read_error(e.to_string()))?
            .iter()
            .map(str::to_string)
            .collect();

        if headers.iter().all(|header| header.is_empty()) {
            return Err(self.read_error("missing header row"));
        }

        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|required| !headers.iter().any(|header| header == required))
            .collect();
        if !missing.is_empty() {
            return Err(self.read_error(format!(
                "header lacks required columns: {}",
                missing.join(", ")
            )));
        }

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result.map_err(|e| self.read_error(e.to_string()))?;
            let line = record.position().map(|pos| pos.line()).unwrap_or(0);
            rows.push(RawRow {
                line,
                fields: record.iter().map(str::to_string).collect(),
            });
        }

        debug!(
            file = %self.data_file.display(),
            columns = headers.len(),
            rows = rows.len(),
            "Read OnMove data file"
        );

        Ok(RawTable { headers, rows })
    }

    fn clean_data(&self, raw: RawTable) -> Result<RawTable> {
        let keep: Vec<usize> = raw
            .headers
            .iter()
            .enumerate()
            .filter(|(_, name)| !is_placeholder_column(name))
            .map(|(index, _)| index)
            .collect();
        let dropped_columns = raw.headers.len() - keep.len();

        let headers = keep.iter().map(|&i| raw.headers[i].clone()).collect();

        let mut seen = HashSet::new();
        let total_rows = raw.rows.len();
        let rows: Vec<RawRow> = raw
            .rows
            .into_iter()
            .map(|row| RawRow {
                line: row.line,
                fields: keep
                    .iter()
                    .map(|&i| row.fields.get(i).cloned().unwrap_or_default())
                    .collect(),
            })
            .filter(|row| seen.insert(row.fields.clone()))
            .collect();

        debug!(
            dropped_columns,
            duplicate_rows = total_rows - rows.len(),
            "Cleaned OnMove data"
        );

        Ok(RawTable { headers, rows })
    }

    fn format_data(&self, cleaned: RawTable) -> Result<NormalizedTable> {
        let index_of = |column: &str| {
            cleaned
                .position(column)
                .ok_or_else(|| self.read_error(format!("missing column {}", column)))
        };
        let time = index_of(TIME)?;
        let distance = index_of(DISTANCE)?;
        let speed = index_of(SPEED)?;
        let latitude = index_of(LATITUDE)?;
        let longitude = index_of(LONGITUDE)?;

        let required = [time, distance, speed, latitude, longitude];
        // Derived columns are recomputed; input columns of the same name are replaced
        let extra_indices: Vec<usize> = (0..cleaned.headers.len())
            .filter(|i| !required.contains(i))
            .filter(|&i| {
                let name = &cleaned.headers[i];
                if is_derived_column(name) {
                    debug!(column = %name, "Input column replaced by derived column");
                    false
                } else {
                    true
                }
            })
            .collect();
        let extra_columns = extra_indices
            .iter()
            .map(|&i| cleaned.headers[i].clone())
            .collect();

        let mut records = Vec::with_capacity(cleaned.rows.len());
        for row in &cleaned.rows {
            let sample = Sample {
                time: Self::parse_time(row, time)?,
                distance: Self::parse_float(DISTANCE, row, distance)?,
                speed: Self::parse_speed(row, speed)?,
                latitude: Self::parse_float(LATITUDE, row, latitude)?,
                longitude: Self::parse_float(LONGITUDE, row, longitude)?,
            };
            let extra = extra_indices
                .iter()
                .map(|&i| CellValue::parse(row.fields.get(i).map(String::as_str).unwrap_or("")))
                .collect();
            records.push(Record::derive(sample, extra));
        }

        let unavailable = records.iter().filter(|r| !r.pace.is_available()).count();
        if unavailable > 0 {
            warn!(
                rows = unavailable,
                "Samples without a positive speed have no pace; marked N/A"
            );
        }

        NormalizedTable::new(extra_columns, records)
    }
}

/// Data source for one OnMove session
#[derive(Debug, Clone)]
pub struct OnMoveDataSource {
    files: OnMoveFiles,
    table: NormalizedTable,
}

impl OnMoveDataSource {
    /// Read, clean and format the session; fails without returning a partial source
    pub fn new(files: &[PathBuf]) -> Result<Self> {
        let files = OnMoveFiles::from_list(files)?;

        if let Some(summary) = files.summary_file() {
            if !summary.is_file() {
                return Err(RunningAppError::SourceRead {
                    path: summary.to_path_buf(),
                    reason: "summary file not found".to_string(),
                });
            }
        }

        let table = files.normalize()?;

        info!(
            file = %files.data_file().display(),
            samples = table.len(),
            extra_columns = table.extra_columns().len(),
            "Loaded OnMove session"
        );

        Ok(Self { files, table })
    }

    pub fn files(&self) -> &OnMoveFiles {
        &self.files
    }

    pub fn data_file(&self) -> &Path {
        self.files.data_file()
    }

    pub fn summary_file(&self) -> Option<&Path> {
        self.files.summary_file()
    }
}

impl DataSource for OnMoveDataSource {
    fn dataframe(&self) -> &NormalizedTable {
        &self.table
    }

    fn source_type(&self) -> SourceType {
        SourceType::OnMove
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Pace;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn files_for(file: &NamedTempFile) -> OnMoveFiles {
        OnMoveFiles::from_list(&[file.path().to_path_buf()]).unwrap()
    }

    const SESSION: &str = "\
Time,Distance,Speed,Latitude,Longitude,Unnamed: 5
0,0,10.0,48.10,2.10,
5,14,10.0,48.11,2.11,
5,14,10.0,48.11,2.11,
10,27,0.0,48.12,2.12,
";

    #[test]
    fn test_file_list_length() {
        assert!(OnMoveFiles::from_list(&[]).is_err());
        let three = vec![PathBuf::from("a"), PathBuf::from("b"), PathBuf::from("c")];
        assert!(matches!(
            OnMoveFiles::from_list(&three),
            Err(RunningAppError::InvalidFileList { found: 3 })
        ));

        let two = OnMoveFiles::from_list(&three[..2]).unwrap();
        assert_eq!(two.summary_file(), Some(Path::new("b")));
    }

    #[test]
    fn test_read_keeps_all_rows() {
        let file = write_csv(SESSION);
        let raw = files_for(&file).read_data().unwrap();

        assert_eq!(raw.headers.len(), 6);
        assert_eq!(raw.rows.len(), 4);
        assert_eq!(raw.rows[0].line, 2);
    }

    #[test]
    fn test_clean_drops_placeholders_and_duplicates() {
        let file = write_csv(SESSION);
        let files = files_for(&file);
        let cleaned = files.clean_data(files.read_data().unwrap()).unwrap();

        assert_eq!(cleaned.headers, REQUIRED_COLUMNS.map(String::from).to_vec());
        assert_eq!(cleaned.rows.len(), 3);
        assert_eq!(cleaned.rows[2].fields[0], "10");
    }

    #[test]
    fn test_clean_is_idempotent() {
        let file = write_csv(SESSION);
        let files = files_for(&file);
        let once = files.clean_data(files.read_data().unwrap()).unwrap();
        let twice = files.clean_data(once.clone()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_missing_header_is_read_error() {
        let file = write_csv("");
        let result = files_for(&file).read_data();
        assert!(matches!(result, Err(RunningAppError::SourceRead { .. })));
    }

    #[test]
    fn test_missing_required_column() {
        let file = write_csv("Time,Distance,Speed\n0,0,10\n");
        let err = files_for(&file).read_data().unwrap_err();
        assert!(err.to_string().contains("Latitude"));
    }

    #[test]
    fn test_unparsable_speed() {
        let file = write_csv("Time,Distance,Speed,Latitude,Longitude\n0,0,fast,48.1,2.1\n");
        let err = files_for(&file).normalize().unwrap_err();
        assert!(matches!(
            err,
            RunningAppError::InvalidRecord { line: 2, ref column, .. } if column == "Speed"
        ));
    }

    #[test]
    fn test_blank_speed_has_no_pace() {
        let file = write_csv(
            "Time,Distance,Speed,Latitude,Longitude\n0,0,10,48.1,2.1\n5,14,,48.1,2.1\n10,27,NaN,48.1,2.1\n",
        );
        let table = files_for(&file).normalize().unwrap();

        assert_eq!(table.len(), 3);
        for record in &table.records()[1..] {
            assert_eq!(record.speed, 0.0);
            assert_eq!(record.pace, Pace::NotAvailable);
            assert_eq!(record.raw_pace, None);
        }
    }

    #[test]
    fn test_blank_distance_is_invalid() {
        let file = write_csv("Time,Distance,Speed,Latitude,Longitude\n0,,10,48.1,2.1\n");
        let err = files_for(&file).normalize().unwrap_err();
        assert!(matches!(
            err,
            RunningAppError::InvalidRecord { line: 2, ref column, .. } if column == "Distance"
        ));
    }

    #[test]
    fn test_float_time_accepted() {
        let file = write_csv("Time,Distance,Speed,Latitude,Longitude\n65.0,0,10,48.1,2.1\n");
        let table = files_for(&file).normalize().unwrap();
        assert_eq!(table.records()[0].time, 65);
        assert_eq!(table.records()[0].minute, 1);
    }

    #[test]
    fn test_extra_columns_pass_through() {
        let file = write_csv(
            "HeartRate,Time,Distance,Speed,Latitude,Longitude\n140,0,0,10,48.1,2.1\n,5,14,10,48.1,2.1\n",
        );
        let table = files_for(&file).normalize().unwrap();

        assert_eq!(table.extra_columns(), ["HeartRate".to_string()]);
        assert_eq!(table.records()[0].extra, vec![CellValue::Number(140.0)]);
        assert_eq!(table.records()[1].extra, vec![CellValue::Missing]);
    }

    #[test]
    fn test_input_pace_column_is_replaced() {
        let file = write_csv(
            "Time,Distance,Speed,Latitude,Longitude,Pace,Minute\n\
             0,0,12,48.1,2.1,abc,7\n\
             65,200,10,48.1,2.1,xyz,7\n",
        );
        let table = files_for(&file).normalize().unwrap();
        let names: Vec<&str> = table.columns().iter().map(|c| table.column_name(*c)).collect();

        assert!(table.extra_columns().is_empty());
        assert_eq!(names.iter().filter(|n| **n == "Pace").count(), 1);
        assert_eq!(names.iter().filter(|n| **n == "Minute").count(), 1);
        assert_eq!(table.records()[0].pace, Pace::MinSec(std::time::Duration::from_secs(300)));
        assert_eq!(table.records()[1].minute, 1);
    }

    #[test]
    fn test_new_normalizes_session() {
        let file = write_csv(SESSION);
        let source = OnMoveDataSource::new(&[file.path().to_path_buf()]).unwrap();
        let records = source.dataframe().records();

        assert_eq!(records.len(), 3);
        assert_eq!(records[2].pace, Pace::NotAvailable);
        assert_eq!(records[2].distance, 27.0);
        assert_eq!(source.source_type(), SourceType::OnMove);
        assert_eq!(source.summary_file(), None);
    }

    #[test]
    fn test_missing_summary_file() {
        let file = write_csv(SESSION);
        let result = OnMoveDataSource::new(&[
            file.path().to_path_buf(),
            PathBuf::from("/nonexistent/ACT_0000.OMH.csv"),
        ]);
        assert!(matches!(result, Err(RunningAppError::SourceRead { .. })));
    }

    #[test]
    fn test_header_only_is_empty_dataset() {
        let file = write_csv("Time,Distance,Speed,Latitude,Longitude\n");
        let result = OnMoveDataSource::new(&[file.path().to_path_buf()]);
        assert!(matches!(result, Err(RunningAppError::EmptyDataset { .. })));
    }
}
