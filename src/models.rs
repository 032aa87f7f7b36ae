use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Result, RunningAppError};

/// Raw column names every activity file must provide
pub const TIME: &str = "Time";
pub const DISTANCE: &str = "Distance";
pub const SPEED: &str = "Speed";
pub const LATITUDE: &str = "Latitude";
pub const LONGITUDE: &str = "Longitude";

/// Derived pace column names
pub const RAW_PACE: &str = "RawPace";
pub const PACE: &str = "Pace";

/// Required raw columns, in canonical order
pub const REQUIRED_COLUMNS: [&str; 5] = [TIME, DISTANCE, SPEED, LATITUDE, LONGITUDE];

/// Half marathon distance in meters
pub const HALF_MARATHON_METERS: f64 = 21_097.5;

/// Marathon distance in meters
pub const MARATHON_METERS: f64 = 42_195.0;

/// Bucket columns usable as grouping keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Kpi {
    Minute,
    Hour,
    #[serde(rename = "1km")]
    Km1,
    #[serde(rename = "5km")]
    Km5,
    #[serde(rename = "10km")]
    Km10,
    #[serde(rename = "20km")]
    Km20,
    #[serde(rename = "Half Marathon")]
    HalfMarathon,
    Marathon,
}

impl Kpi {
    /// All KPI columns, in presentation order
    pub const ALL: [Kpi; 8] = [
        Kpi::Minute,
        Kpi::Hour,
        Kpi::Km1,
        Kpi::Km5,
        Kpi::Km10,
        Kpi::Km20,
        Kpi::HalfMarathon,
        Kpi::Marathon,
    ];

    /// Column name as it appears in the normalized table
    pub fn name(&self) -> &'static str {
        match self {
            Kpi::Minute => "Minute",
            Kpi::Hour => "Hour",
            Kpi::Km1 => "1km",
            Kpi::Km5 => "5km",
            Kpi::Km10 => "10km",
            Kpi::Km20 => "20km",
            Kpi::HalfMarathon => "Half Marathon",
            Kpi::Marathon => "Marathon",
        }
    }

    /// Bucket index of a sample: floor of time or distance over the bucket width
    pub fn bucket(&self, time_seconds: i64, distance_meters: f64) -> i64 {
        match self {
            Kpi::Minute => time_seconds.div_euclid(60),
            Kpi::Hour => time_seconds.div_euclid(3600),
            Kpi::Km1 => floor_div(distance_meters, 1_000.0),
            Kpi::Km5 => floor_div(distance_meters, 5_000.0),
            Kpi::Km10 => floor_div(distance_meters, 10_000.0),
            Kpi::Km20 => floor_div(distance_meters, 20_000.0),
            Kpi::HalfMarathon => floor_div(distance_meters, HALF_MARATHON_METERS),
            Kpi::Marathon => floor_div(distance_meters, MARATHON_METERS),
        }
    }
}

/// Whether a column name is computed during normalization
pub fn is_derived_column(name: &str) -> bool {
    name == RAW_PACE || name == PACE || Kpi::ALL.iter().any(|kpi| kpi.name() == name)
}

fn floor_div(value: f64, interval: f64) -> i64 {
    (value / interval).floor() as i64
}

impl fmt::Display for Kpi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Kpi {
    type Err = RunningAppError;

    fn from_str(s: &str) -> Result<Self> {
        Kpi::ALL
            .iter()
            .copied()
            .find(|kpi| kpi.name() == s)
            .ok_or_else(|| RunningAppError::InvalidGroupingColumn {
                column: s.to_string(),
            })
    }
}

/// Pace at a sample, in minutes and whole seconds per kilometer.
///
/// A sample recorded at zero speed has no defined pace; it keeps its row and
/// carries [`Pace::NotAvailable`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Pace {
    MinSec(Duration),
    NotAvailable,
}

impl Pace {
    /// Convert a decimal minutes-per-km pace, truncated to whole seconds
    pub fn from_raw_pace(raw_pace: Option<f64>) -> Self {
        match raw_pace {
            Some(minutes) => {
                // Resolve to microseconds first so 4.35 min gives 261 s, not 260.
                let micros = (minutes * 60_000_000.0).round() as u64;
                Pace::MinSec(Duration::from_secs(micros / 1_000_000))
            }
            None => Pace::NotAvailable,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Pace::MinSec(_))
    }

    pub fn total_seconds(&self) -> Option<u64> {
        match self {
            Pace::MinSec(duration) => Some(duration.as_secs()),
            Pace::NotAvailable => None,
        }
    }

    /// Render a number of seconds the same way a pace is displayed
    pub fn format_seconds(seconds: f64) -> String {
        let whole = seconds.max(0.0).trunc() as u64;
        format!("{:02}:{:02}", whole / 60, whole % 60)
    }
}

impl fmt::Display for Pace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pace::MinSec(duration) => {
                let secs = duration.as_secs();
                write!(f, "{:02}:{:02}", secs / 60, secs % 60)
            }
            Pace::NotAvailable => f.write_str("N/A"),
        }
    }
}

impl Serialize for Pace {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Decimal minutes per kilometer for a speed in km/h, rounded to two decimals.
///
/// Undefined for a zero, negative, or non-finite speed.
pub fn raw_pace(speed_kmh: f64) -> Option<f64> {
    if speed_kmh.is_finite() && speed_kmh > 0.0 {
        Some((60.0 / speed_kmh * 100.0).round() / 100.0)
    } else {
        None
    }
}

/// A single pass-through cell
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Missing,
}

impl CellValue {
    /// Type a raw field: empty is missing, numeric text is a number
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return CellValue::Missing;
        }
        match trimmed.parse::<f64>() {
            Ok(value) if value.is_nan() => CellValue::Missing,
            Ok(value) => CellValue::Number(value),
            Err(_) => CellValue::Text(trimmed.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, CellValue::Text(_))
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Number(value) => write!(f, "{}", value),
            CellValue::Text(text) => f.write_str(text),
            CellValue::Missing => Ok(()),
        }
    }
}

/// Raw measurements of one sample, as recorded by the device
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Seconds since the start of the session
    pub time: i64,
    /// Cumulative distance in meters
    pub distance: f64,
    /// Instantaneous speed in km/h
    pub speed: f64,
    /// Degrees
    pub latitude: f64,
    /// Degrees
    pub longitude: f64,
}

/// One row of the normalized table: raw fields, pass-through cells, and
/// every derived field.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub time: i64,
    pub distance: f64,
    pub speed: f64,
    pub latitude: f64,
    pub longitude: f64,

    /// Pass-through cells, aligned with [`NormalizedTable::extra_columns`]
    pub extra: Vec<CellValue>,

    /// Minutes per kilometer, `None` when speed is zero
    pub raw_pace: Option<f64>,
    pub pace: Pace,

    pub minute: i64,
    pub hour: i64,
    pub km_1: i64,
    pub km_5: i64,
    pub km_10: i64,
    pub km_20: i64,
    pub half_marathon: i64,
    pub marathon: i64,
}

impl Record {
    /// Build a row with all derived fields computed from the sample
    pub fn derive(sample: Sample, extra: Vec<CellValue>) -> Self {
        let raw_pace = raw_pace(sample.speed);
        let bucket = |kpi: Kpi| kpi.bucket(sample.time, sample.distance);

        Self {
            time: sample.time,
            distance: sample.distance,
            speed: sample.speed,
            latitude: sample.latitude,
            longitude: sample.longitude,
            extra,
            raw_pace,
            pace: Pace::from_raw_pace(raw_pace),
            minute: bucket(Kpi::Minute),
            hour: bucket(Kpi::Hour),
            km_1: bucket(Kpi::Km1),
            km_5: bucket(Kpi::Km5),
            km_10: bucket(Kpi::Km10),
            km_20: bucket(Kpi::Km20),
            half_marathon: bucket(Kpi::HalfMarathon),
            marathon: bucket(Kpi::Marathon),
        }
    }

    pub fn bucket(&self, kpi: Kpi) -> i64 {
        match kpi {
            Kpi::Minute => self.minute,
            Kpi::Hour => self.hour,
            Kpi::Km1 => self.km_1,
            Kpi::Km5 => self.km_5,
            Kpi::Km10 => self.km_10,
            Kpi::Km20 => self.km_20,
            Kpi::HalfMarathon => self.half_marathon,
            Kpi::Marathon => self.marathon,
        }
    }

    /// Value of a column as a cell; pace is projected to total seconds
    pub fn cell(&self, column: Column) -> CellValue {
        match column {
            Column::Time => CellValue::Number(self.time as f64),
            Column::Distance => CellValue::Number(self.distance),
            Column::Speed => CellValue::Number(self.speed),
            Column::Latitude => CellValue::Number(self.latitude),
            Column::Longitude => CellValue::Number(self.longitude),
            Column::Extra(index) => self.extra.get(index).cloned().unwrap_or(CellValue::Missing),
            Column::RawPace => self.raw_pace.map_or(CellValue::Missing, CellValue::Number),
            Column::Pace => self
                .pace
                .total_seconds()
                .map_or(CellValue::Missing, |secs| CellValue::Number(secs as f64)),
            Column::Bucket(kpi) => CellValue::Number(self.bucket(kpi) as f64),
        }
    }
}

/// Column of the normalized table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Time,
    Distance,
    Speed,
    Latitude,
    Longitude,
    /// Pass-through column, by position in [`NormalizedTable::extra_columns`]
    Extra(usize),
    RawPace,
    Pace,
    Bucket(Kpi),
}

/// Ordered, fully derived rows of one session plus pass-through column names.
///
/// Never empty: construction rejects a table with no rows.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTable {
    extra_columns: Vec<String>,
    records: Vec<Record>,
}

impl NormalizedTable {
    pub fn new(extra_columns: Vec<String>, records: Vec<Record>) -> Result<Self> {
        if records.is_empty() {
            return Err(RunningAppError::EmptyDataset {
                context: "no samples left after cleaning".to_string(),
            });
        }
        Ok(Self {
            extra_columns,
            records,
        })
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn extra_columns(&self) -> &[String] {
        &self.extra_columns
    }

    /// Recognized bucket columns
    pub fn kpi_columns(&self) -> &'static [Kpi] {
        &Kpi::ALL
    }

    /// Every column, in output order: raw, pass-through, pace, buckets
    pub fn columns(&self) -> Vec<Column> {
        let mut columns = vec![
            Column::Time,
            Column::Distance,
            Column::Speed,
            Column::Latitude,
            Column::Longitude,
        ];
        columns.extend((0..self.extra_columns.len()).map(Column::Extra));
        columns.push(Column::RawPace);
        columns.push(Column::Pace);
        columns.extend(Kpi::ALL.iter().copied().map(Column::Bucket));
        columns
    }

    pub fn column_name(&self, column: Column) -> &str {
        match column {
            Column::Time => TIME,
            Column::Distance => DISTANCE,
            Column::Speed => SPEED,
            Column::Latitude => LATITUDE,
            Column::Longitude => LONGITUDE,
            Column::Extra(index) => self
                .extra_columns
                .get(index)
                .map(String::as_str)
                .unwrap_or(""),
            Column::RawPace => RAW_PACE,
            Column::Pace => PACE,
            Column::Bucket(kpi) => kpi.name(),
        }
    }

    /// Look a column up by name
    pub fn column(&self, name: &str) -> Option<Column> {
        self.columns()
            .into_iter()
            .find(|column| self.column_name(*column) == name)
    }

    /// A pass-through column holding any text is not numeric
    pub fn is_numeric(&self, column: Column) -> bool {
        match column {
            Column::Extra(index) => !self
                .records
                .iter()
                .any(|record| record.extra.get(index).is_some_and(CellValue::is_text)),
            _ => true,
        }
    }
}
