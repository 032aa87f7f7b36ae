//! Unified error hierarchy for RunningApp
//!
//! Every construction-time failure of the ingestion pipeline and every
//! rejected analysis request is reported through [`RunningAppError`].
//! Per-row numeric anomalies are never errors; they are carried in the
//! table as [`crate::models::Pace::NotAvailable`].

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for all RunningApp operations
#[derive(Debug, Error)]
pub enum RunningAppError {
    /// Backing file missing, unreadable, or with a malformed header
    #[error("Cannot read source {path}: {reason}")]
    SourceRead { path: PathBuf, reason: String },

    /// No rows survived reading and cleaning, or geometry was requested on no rows
    #[error("Empty dataset: {context}")]
    EmptyDataset { context: String },

    /// Factory given an unknown or not yet implemented source type
    #[error("Unsupported source type: {tag}")]
    UnsupportedSourceType { tag: String },

    /// Grouping requested on a column that is not a KPI
    #[error("Invalid grouping column: {column}")]
    InvalidGroupingColumn { column: String },

    /// A required numeric cell could not be parsed
    #[error("Invalid value {value:?} for column {column} at line {line}")]
    InvalidRecord {
        line: u64,
        column: String,
        value: String,
    },

    /// A source was given the wrong number of files
    #[error("Expected one or two source files, got {found}")]
    InvalidFileList { found: usize },

    /// Writing an export failed
    #[error("Export failed to {path}: {reason}")]
    Export { path: PathBuf, reason: String },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for RunningApp operations
pub type Result<T> = std::result::Result<T, RunningAppError>;

impl RunningAppError {
    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            RunningAppError::InvalidGroupingColumn { .. } => ErrorSeverity::Warning,
            RunningAppError::UnsupportedSourceType { .. } => ErrorSeverity::Warning,
            RunningAppError::Configuration(_) => ErrorSeverity::Warning,
            RunningAppError::Io(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            RunningAppError::SourceRead { path, .. } => {
                format!("Could not read activity file: {}", path.display())
            }
            RunningAppError::EmptyDataset { .. } => {
                "The activity file contains no samples.".to_string()
            }
            RunningAppError::UnsupportedSourceType { tag } => {
                format!("Activity format '{}' is not supported yet.", tag)
            }
            RunningAppError::InvalidGroupingColumn { column } => {
                format!(
                    "Cannot group by '{}'. Use one of: Minute, Hour, 1km, 5km, 10km, 20km, Half Marathon, Marathon.",
                    column
                )
            }
            _ => self.to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Critical system error requiring immediate attention
    Critical,
    /// Error that prevents the operation
    Error,
    /// Rejected request, nothing was built
    Warning,
}

impl ErrorSeverity {
    /// Convert to tracing level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            ErrorSeverity::Critical => tracing::Level::ERROR,
            ErrorSeverity::Error => tracing::Level::ERROR,
            ErrorSeverity::Warning => tracing::Level::WARN,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_severity() {
        let err = RunningAppError::InvalidGroupingColumn {
            column: "Speed".to_string(),
        };
        assert_eq!(err.severity(), ErrorSeverity::Warning);
        assert_eq!(err.severity().to_tracing_level(), tracing::Level::WARN);

        let err = RunningAppError::EmptyDataset {
            context: "after cleaning".to_string(),
        };
        assert_eq!(err.severity(), ErrorSeverity::Error);
    }

    #[test]
    fn test_user_messages() {
        let err = RunningAppError::SourceRead {
            path: PathBuf::from("ACT_0000DATA1.csv"),
            reason: "not found".to_string(),
        };
        assert!(err.user_message().contains("Could not read"));
        assert!(err.user_message().contains("ACT_0000DATA1.csv"));

        let err = RunningAppError::UnsupportedSourceType {
            tag: "GPX".to_string(),
        };
        assert!(err.user_message().contains("GPX"));
    }

    #[test]
    fn test_display_includes_details() {
        let err = RunningAppError::InvalidRecord {
            line: 4,
            column: "Speed".to_string(),
            value: "fast".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("line 4"));
        assert!(text.contains("Speed"));
        assert!(text.contains("\"fast\""));
    }
}
