use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::info;

use crate::error::{Result, RunningAppError};
use crate::source::{DataSource, OnMoveDataSource};

/// Activity formats known to the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceType {
    /// Decathlon OnMove watch export
    #[serde(rename = "OnMove")]
    OnMove,
    /// GPS track; reserved, no source registered yet
    #[serde(rename = "GPX")]
    Gpx,
}

impl SourceType {
    pub const ALL: [SourceType; 2] = [SourceType::OnMove, SourceType::Gpx];

    pub fn tag(&self) -> &'static str {
        match self {
            SourceType::OnMove => "OnMove",
            SourceType::Gpx => "GPX",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for SourceType {
    type Err = RunningAppError;

    fn from_str(s: &str) -> Result<Self> {
        SourceType::ALL
            .iter()
            .copied()
            .find(|source_type| source_type.tag().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| RunningAppError::UnsupportedSourceType { tag: s.to_string() })
    }
}

/// Builds a data source from its file list
pub type SourceConstructor = fn(&[PathBuf]) -> Result<Box<dyn DataSource>>;

fn create_onmove(files: &[PathBuf]) -> Result<Box<dyn DataSource>> {
    Ok(Box::new(OnMoveDataSource::new(files)?))
}

/// Registry of data source constructors keyed by format
pub struct DataSourceFactory {
    constructors: HashMap<SourceType, SourceConstructor>,
}

impl DataSourceFactory {
    /// Create a factory with every implemented format registered
    pub fn new() -> Self {
        let mut factory = Self {
            constructors: HashMap::new(),
        };
        factory.register(SourceType::OnMove, create_onmove);
        factory
    }

    /// Register or replace the constructor for a format
    pub fn register(&mut self, source_type: SourceType, constructor: SourceConstructor) {
        self.constructors.insert(source_type, constructor);
    }

    pub fn is_supported(&self, source_type: SourceType) -> bool {
        self.constructors.contains_key(&source_type)
    }

    /// Build a data source from a type tag such as `"OnMove"`
    pub fn create(&self, tag: &str, files: &[PathBuf]) -> Result<Box<dyn DataSource>> {
        let source_type = tag.parse::<SourceType>()?;
        self.create_source(source_type, files)
    }

    pub fn create_source(
        &self,
        source_type: SourceType,
        files: &[PathBuf],
    ) -> Result<Box<dyn DataSource>> {
        let constructor = self.constructors.get(&source_type).ok_or_else(|| {
            RunningAppError::UnsupportedSourceType {
                tag: source_type.tag().to_string(),
            }
        })?;

        info!(source_type = %source_type, files = files.len(), "Creating data source");
        constructor(files)
    }
}

impl Default for DataSourceFactory {
    fn default() -> Self {
        Self::new()
    }
}
