//! Run configuration files.
//!
//! A run file names the option values a program's option-constructed tags
//! consume, plus the settings of the driving loop:
//!
//! ```yaml
//! apiVersion: databox/v1
//! kind: RunConfig
//! metadata:
//!   name: circular-orbit
//! options:
//!   Worldtube.Charge: 0.5
//!   Worldtube.SelfForce.Mass: 0.1
//! driver:
//!   steps: 100
//!   dt: 0.01
//!   elements: 8
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::options::{OptionTable, OptionValue};
use crate::registry::Registry;

const API_VERSION: &str = "databox/v1";
const KIND: &str = "RunConfig";

/// Errors that can occur when loading or validating a run file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the run file.
    #[error("failed to read run file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse the run file YAML.
    #[error("failed to parse run file YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("invalid apiVersion: expected 'databox/v1', got '{0}'")]
    InvalidApiVersion(String),

    #[error("invalid kind: expected 'RunConfig', got '{0}'")]
    InvalidKind(String),

    #[error("missing required field: {0}")]
    MissingField(String),

    /// An option is not consumed by any registered tag.
    #[error("option '{option}' is not used by any registered tag")]
    UnknownOption { option: String },

    #[error("invalid driver setting {field}: {reason}")]
    InvalidDriver { field: String, reason: String },
}

/// Result type for run file operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// A run configuration loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfig {
    /// API version for compatibility checking.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Kind must be "RunConfig".
    #[serde(default = "default_kind")]
    pub kind: String,

    #[serde(default)]
    pub metadata: RunMetadata,

    /// Option values keyed by dotted option name.
    #[serde(default)]
    pub options: OptionTable,

    #[serde(default)]
    pub driver: DriverSettings,
}

fn default_api_version() -> String {
    API_VERSION.to_string()
}

fn default_kind() -> String {
    KIND.to_string()
}

/// Metadata for a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Machine identifier for this run (lowercase, no spaces).
    pub name: String,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub description: Option<String>,
}

/// Settings of the time-stepping loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverSettings {
    /// Number of time steps.
    pub steps: u64,
    /// Step size.
    pub dt: f64,
    /// Number of element boxes.
    pub elements: usize,
    /// Where to write a snapshot of the singleton box after the last step.
    pub checkpoint: Option<PathBuf>,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            steps: 10,
            dt: 0.01,
            elements: 4,
            checkpoint: None,
        }
    }
}

impl RunConfig {
    /// Create an empty run configuration with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            api_version: default_api_version(),
            kind: default_kind(),
            metadata: RunMetadata {
                name: name.into(),
                title: None,
                description: None,
            },
            options: OptionTable::new(),
            driver: DriverSettings::default(),
        }
    }

    /// Load a run configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse a run configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> ConfigResult<Self> {
        let config: RunConfig = serde_yaml::from_str(yaml)?;
        config.validate_schema()?;
        Ok(config)
    }

    /// Validate the schema (API version, kind, driver settings).
    fn validate_schema(&self) -> ConfigResult<()> {
        if self.api_version != API_VERSION {
            return Err(ConfigError::InvalidApiVersion(self.api_version.clone()));
        }
        if self.kind != KIND {
            return Err(ConfigError::InvalidKind(self.kind.clone()));
        }
        if self.metadata.name.is_empty() {
            return Err(ConfigError::MissingField("metadata.name".to_string()));
        }
        if !(self.driver.dt.is_finite() && self.driver.dt > 0.0) {
            return Err(ConfigError::InvalidDriver {
                field: "dt".to_string(),
                reason: format!("must be a positive number, got {}", self.driver.dt),
            });
        }
        Ok(())
    }

    /// Check that every option in the file is consumed by a registered tag.
    ///
    /// Options listed in `extra` are accepted as well; drivers use them for
    /// settings they read themselves.
    pub fn validate_against_registry(
        &self,
        registry: &Registry,
        extra: &[&str],
    ) -> ConfigResult<()> {
        for (name, _) in self.options.iter() {
            let declared = registry
                .iter()
                .any(|decl| decl.options().iter().any(|option| option.name() == name));
            if !declared && !extra.contains(&name) {
                return Err(ConfigError::UnknownOption {
                    option: name.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Builder method: set an option value.
    pub fn with_option(mut self, name: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.options.insert(name, value);
        self
    }

    /// Builder method: set the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.metadata.title = Some(title.into());
        self
    }
}
