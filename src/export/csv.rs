use csv::Writer;
use std::path::Path;
use tracing::info;

use super::export_error;
use crate::analyser::GroupedTable;
use crate::error::Result;
use crate::models::{CellValue, Column, NormalizedTable};

fn format_number(value: Option<f64>) -> String {
    value.map_or_else(String::new, |v| v.to_string())
}

/// Export the normalized table, derived columns included, to CSV.
///
/// Pace is written as `MM:SS` (or `N/A`), missing cells as empty fields.
pub fn export_table<P: AsRef<Path>>(table: &NormalizedTable, output_path: P) -> Result<()> {
    let path = output_path.as_ref();
    let mut writer = Writer::from_path(path).map_err(|e| export_error(path, e))?;
    let columns = table.columns();

    writer
        .write_record(columns.iter().map(|c| table.column_name(*c)))
        .map_err(|e| export_error(path, e))?;

    for record in table.records() {
        let fields = columns.iter().map(|column| match column {
            Column::Pace => record.pace.to_string(),
            Column::RawPace => format_number(record.raw_pace),
            other => record.cell(*other).to_string(),
        });
        writer
            .write_record(fields)
            .map_err(|e| export_error(path, e))?;
    }

    writer.flush()?;
    info!(path = %path.display(), rows = table.len(), "Exported session table");
    Ok(())
}

/// Export a compressed table to CSV, group key first
pub fn export_grouped<P: AsRef<Path>>(grouped: &GroupedTable, output_path: P) -> Result<()> {
    let path = output_path.as_ref();
    let mut writer = Writer::from_path(path).map_err(|e| export_error(path, e))?;

    let header = std::iter::once(grouped.key.name()).chain(grouped.columns.iter().map(String::as_str));
    writer
        .write_record(header)
        .map_err(|e| export_error(path, e))?;

    for row in &grouped.rows {
        let fields = std::iter::once(row.key.to_string())
            .chain(row.values.iter().map(CellValue::to_string));
        writer
            .write_record(fields)
            .map_err(|e| export_error(path, e))?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Kpi, Record, Sample};
    use tempfile::NamedTempFile;

    fn table() -> NormalizedTable {
        let sample = |time: i64, speed: f64| Sample {
            time,
            distance: time as f64 * 3.0,
            speed,
            latitude: 48.5,
            longitude: 2.25,
        };
        NormalizedTable::new(
            vec!["HeartRate".to_string()],
            vec![
                Record::derive(sample(0, 12.0), vec![CellValue::Number(141.0)]),
                Record::derive(sample(5, 0.0), vec![CellValue::Missing]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_export_table() {
        let temp_file = NamedTempFile::new().unwrap();
        export_table(&table(), temp_file.path()).unwrap();

        let content = std::fs::read_to_string(temp_file.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Time,Distance,Speed,Latitude,Longitude,HeartRate,RawPace,Pace,Minute"));
        assert!(lines[0].ends_with("Half Marathon,Marathon"));
        assert!(lines[1].contains(",141,5,05:00,"));
        assert!(lines[2].contains(",,,N/A,"));
    }

    #[test]
    fn test_export_grouped() {
        let grouped = GroupedTable {
            key: Kpi::Minute,
            columns: vec!["Speed".to_string()],
            rows: vec![crate::analyser::GroupedRow {
                key: 0,
                values: vec![CellValue::Number(15.0)],
            }],
        };
        let temp_file = NamedTempFile::new().unwrap();
        export_grouped(&grouped, temp_file.path()).unwrap();

        let content = std::fs::read_to_string(temp_file.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines, vec!["Minute,Speed", "0,15"]);
    }
}
