// Library interface for RunningApp modules
// The binary and the integration tests both go through these exports

pub mod analyser;
pub mod config;
pub mod error;
pub mod export;
pub mod logging;
pub mod models;
pub mod source;

// Re-export commonly used types for convenience
pub use analyser::{Analyser, AnalyserFactory, GroupedTable, MetricStats, Summary};
pub use config::AppConfig;
pub use error::{Result, RunningAppError};
pub use logging::{LogConfig, LogFormat, LogLevel};
pub use models::{CellValue, Kpi, NormalizedTable, Pace, Record};
pub use source::{DataSource, DataSourceFactory, OnMoveDataSource, RunGeometry, SourceType};
