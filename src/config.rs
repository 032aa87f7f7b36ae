use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::RunningAppError;
use crate::logging::LogConfig;
use crate::models::Kpi;
use crate::source::SourceType;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Configuration metadata
    pub metadata: ConfigMetadata,

    /// Session to load
    pub source: SourceSettings,

    /// Analysis preferences
    pub analysis: AnalysisSettings,

    /// Logging setup
    pub logging: LogConfig,
}

/// Configuration metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigMetadata {
    /// Configuration format version
    pub version: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

/// Which files to ingest and how
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    /// Format tag, e.g. "OnMove"
    pub source_type: String,

    /// Data file, optionally followed by the summary file
    pub files: Vec<PathBuf>,
}

/// Analysis preferences
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    /// KPI column used when none is given
    pub default_kpi: String,

    /// Degrees-to-zoom factor for the default map zoom
    pub map_scale_factor: f64,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            metadata: ConfigMetadata::default(),
            source: SourceSettings::default(),
            analysis: AnalysisSettings::default(),
            logging: LogConfig::default(),
        }
    }
}

impl Default for ConfigMetadata {
    fn default() -> Self {
        let now = Utc::now();
        ConfigMetadata {
            version: "1.0".to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl Default for SourceSettings {
    fn default() -> Self {
        SourceSettings {
            source_type: SourceType::OnMove.tag().to_string(),
            files: Vec::new(),
        }
    }
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        AnalysisSettings {
            default_kpi: Kpi::Minute.name().to_string(),
            map_scale_factor: 160.0,
        }
    }
}

impl AppConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: AppConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML configuration")?;

        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.metadata.updated_at = Utc::now();

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml_content = toml::to_string_pretty(self)
            .with_context(|| "Failed to serialize configuration to TOML")?;

        fs::write(&path, toml_content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".runningapp")
            .join("config.toml")
    }

    pub fn load_or_default() -> Self {
        let config_path = Self::default_config_path();

        match Self::load_from_file(&config_path) {
            Ok(config) => config,
            Err(_) => {
                tracing::debug!(path = %config_path.display(), "No config file, using defaults");
                Self::default()
            }
        }
    }

    /// Check the values the pipeline cannot recover from
    pub fn validate(&self) -> std::result::Result<(), RunningAppError> {
        self.source_type()?;
        self.default_kpi()?;

        if self.source.files.len() > 2 {
            return Err(RunningAppError::InvalidFileList {
                found: self.source.files.len(),
            });
        }

        if !(self.analysis.map_scale_factor.is_finite() && self.analysis.map_scale_factor > 0.0) {
            return Err(RunningAppError::Configuration(format!(
                "map_scale_factor must be positive, got {}",
                self.analysis.map_scale_factor
            )));
        }

        Ok(())
    }

    pub fn source_type(&self) -> std::result::Result<SourceType, RunningAppError> {
        self.source.source_type.parse()
    }

    pub fn default_kpi(&self) -> std::result::Result<Kpi, RunningAppError> {
        self.analysis.default_kpi.parse()
    }
}
