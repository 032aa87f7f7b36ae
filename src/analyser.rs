//! Session statistics and bucketed views
//!
//! The [`Analyser`] reads the normalized table of a [`DataSource`], builds the
//! speed and pace summary once, and answers grouping requests on the KPI
//! bucket columns.

use serde::Serialize;
use statrs::statistics::{Data, Median, Statistics};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info};

use crate::error::Result;
use crate::models::{CellValue, Column, Kpi, NormalizedTable, Pace, Record, PACE, SPEED};
use crate::source::DataSource;

/// Metrics covered by the session summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Metric {
    Speed,
    Pace,
}

impl Metric {
    pub const ALL: [Metric; 2] = [Metric::Speed, Metric::Pace];

    pub fn name(&self) -> &'static str {
        match self {
            Metric::Speed => SPEED,
            Metric::Pace => PACE,
        }
    }
}

/// Statistics computed for each metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Statistic {
    Mean,
    Std,
    Median,
    Min,
    Max,
}

impl Statistic {
    pub const ALL: [Statistic; 5] = [
        Statistic::Mean,
        Statistic::Std,
        Statistic::Median,
        Statistic::Min,
        Statistic::Max,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Statistic::Mean => "mean",
            Statistic::Std => "std",
            Statistic::Median => "median",
            Statistic::Min => "min",
            Statistic::Max => "max",
        }
    }
}

/// Descriptive statistics of one metric; `None` where a statistic is undefined
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MetricStats {
    pub mean: Option<f64>,
    /// Sample standard deviation, needs at least two values
    pub std: Option<f64>,
    pub median: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl MetricStats {
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }

        Self {
            mean: Some(Statistics::mean(values.iter())),
            std: (values.len() > 1).then(|| Statistics::std_dev(values.iter())),
            median: Some(Data::new(values.to_vec()).median()),
            min: Some(Statistics::min(values.iter())),
            max: Some(Statistics::max(values.iter())),
        }
    }

    pub fn get(&self, statistic: Statistic) -> Option<f64> {
        match statistic {
            Statistic::Mean => self.mean,
            Statistic::Std => self.std,
            Statistic::Median => self.median,
            Statistic::Min => self.min,
            Statistic::Max => self.max,
        }
    }
}

/// Speed (km/h) and pace (seconds per km) statistics of a session.
///
/// Pace statistics skip samples whose pace is not available.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    #[serde(rename = "Speed")]
    pub speed: MetricStats,
    #[serde(rename = "Pace")]
    pub pace: MetricStats,
    /// Samples left out of the pace statistics
    pub pace_unavailable: usize,
}

impl Summary {
    pub fn from_table(table: &NormalizedTable) -> Self {
        let speeds: Vec<f64> = table.records().iter().map(|r| r.speed).collect();
        let paces: Vec<f64> = table
            .records()
            .iter()
            .filter_map(|r| r.pace.total_seconds())
            .map(|secs| secs as f64)
            .collect();

        Self {
            speed: MetricStats::from_values(&speeds),
            pace: MetricStats::from_values(&paces),
            pace_unavailable: speeds.len() - paces.len(),
        }
    }

    pub fn metric(&self, metric: Metric) -> &MetricStats {
        match metric {
            Metric::Speed => &self.speed,
            Metric::Pace => &self.pace,
        }
    }

    /// Look a value up by metric and statistic name, e.g. `("Speed", "mean")`
    pub fn get(&self, metric: &str, statistic: &str) -> Option<f64> {
        let metric = Metric::ALL.iter().find(|m| m.name() == metric)?;
        let statistic = Statistic::ALL.iter().find(|s| s.name() == statistic)?;
        self.metric(*metric).get(*statistic)
    }

    /// Nested metric -> statistic -> value mapping of the defined statistics
    pub fn to_map(&self) -> BTreeMap<&'static str, BTreeMap<&'static str, f64>> {
        Metric::ALL
            .iter()
            .map(|metric| {
                let stats = self.metric(*metric);
                let values: BTreeMap<&'static str, f64> = Statistic::ALL
                    .iter()
                    .filter_map(|s| stats.get(*s).map(|value| (s.name(), value)))
                    .collect();
                (metric.name(), values)
            })
            .collect()
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |value: Option<f64>, pace: bool| match value {
            Some(v) if pace => Pace::format_seconds(v),
            Some(v) => format!("{:.2}", v),
            None => "-".to_string(),
        };
        for metric in Metric::ALL {
            let stats = self.metric(metric);
            let pace = metric == Metric::Pace;
            write!(f, "{}:", metric.name())?;
            for statistic in Statistic::ALL {
                write!(f, " {}={}", statistic.name(), show(stats.get(statistic), pace))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// One group of a compressed table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupedRow {
    /// Bucket index shared by every sample of the group
    pub key: i64,
    /// Aggregates, aligned with [`GroupedTable::columns`]
    pub values: Vec<CellValue>,
}

/// Per-bucket means of a session, ordered by ascending bucket
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupedTable {
    pub key: Kpi,
    pub columns: Vec<String>,
    pub rows: Vec<GroupedRow>,
}

impl GroupedTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn keys(&self) -> Vec<i64> {
        self.rows.iter().map(|row| row.key).collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    /// Numeric values of one column, one entry per group
    pub fn column_values(&self, name: &str) -> Option<Vec<Option<f64>>> {
        let index = self.column_index(name)?;
        Some(
            self.rows
                .iter()
                .map(|row| row.values.get(index).and_then(CellValue::as_f64))
                .collect(),
        )
    }

    pub fn value(&self, row: usize, name: &str) -> Option<&CellValue> {
        let index = self.column_index(name)?;
        self.rows.get(row)?.values.get(index)
    }
}

fn aggregate(records: &[&Record], column: Column, numeric: bool) -> CellValue {
    if numeric {
        let values: Vec<f64> = records
            .iter()
            .filter_map(|r| r.cell(column).as_f64())
            .collect();
        if values.is_empty() {
            CellValue::Missing
        } else {
            CellValue::Number(Statistics::mean(values.iter()))
        }
    } else {
        // A text column survives only where the whole group agrees
        let mut cells = records.iter().map(|r| r.cell(column));
        let first = cells.next().unwrap_or(CellValue::Missing);
        if cells.all(|cell| cell == first) {
            first
        } else {
            CellValue::Missing
        }
    }
}

/// Summary and grouping over one data source
#[derive(Debug)]
pub struct Analyser<'a> {
    source: &'a dyn DataSource,
    summary: Summary,
}

impl<'a> Analyser<'a> {
    /// Computes the summary immediately
    pub fn new(source: &'a dyn DataSource) -> Self {
        let summary = Summary::from_table(source.dataframe());
        info!(
            source_type = %source.source_type(),
            samples = source.dataframe().len(),
            mean_speed = ?summary.speed.mean,
            "Session summary computed"
        );
        Self { source, summary }
    }

    pub fn summary(&self) -> &Summary {
        &self.summary
    }

    pub fn source(&self) -> &dyn DataSource {
        self.source
    }

    pub fn dataframe(&self) -> &NormalizedTable {
        self.source.dataframe()
    }

    /// Columns that can be passed to [`Analyser::compress_by`]
    pub fn kpi() -> &'static [Kpi] {
        &Kpi::ALL
    }

    /// Mean of every column per distinct value of a KPI column.
    ///
    /// Fails with `InvalidGroupingColumn` for any other column name.
    pub fn compress_by(&self, column: &str) -> Result<GroupedTable> {
        let kpi = column.parse::<Kpi>()?;
        Ok(self.compress_by_kpi(kpi))
    }

    pub fn compress_by_kpi(&self, kpi: Kpi) -> GroupedTable {
        let table = self.dataframe();
        let columns: Vec<Column> = table
            .columns()
            .into_iter()
            .filter(|column| *column != Column::Bucket(kpi))
            .collect();
        let numeric: Vec<bool> = columns.iter().map(|c| table.is_numeric(*c)).collect();

        let mut groups: BTreeMap<i64, Vec<&Record>> = BTreeMap::new();
        for record in table.records() {
            groups.entry(record.bucket(kpi)).or_default().push(record);
        }

        let rows: Vec<GroupedRow> = groups
            .into_iter()
            .map(|(key, members)| GroupedRow {
                key,
                values: columns
                    .iter()
                    .zip(&numeric)
                    .map(|(column, numeric)| aggregate(&members, *column, *numeric))
                    .collect(),
            })
            .collect();

        debug!(kpi = %kpi, groups = rows.len(), "Compressed session");

        GroupedTable {
            key: kpi,
            columns: columns
                .iter()
                .map(|column| table.column_name(*column).to_string())
                .collect(),
            rows,
        }
    }
}

/// Builds analysers; kept as the single construction point for callers
pub struct AnalyserFactory;

impl AnalyserFactory {
    pub fn create(data_source: &dyn DataSource) -> Analyser<'_> {
        Analyser::new(data_source)
    }
}
