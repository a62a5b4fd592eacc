use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::error::ConfigError;
use super::instruments::basis::Reflection;
use super::instruments::InstrumentKind;

/// Structure representing the application configuration. Contains pathing and instrument selection
/// Configs are seralizable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub output_path: PathBuf,
    pub instruments: Vec<InstrumentKind>,
    pub vulcan_survey_path: Option<PathBuf>,
    pub basis_nexus_111: Option<PathBuf>,
    pub basis_nexus_311: Option<PathBuf>,
    /// Fixed last-modified stamp. The current time is used when null
    pub last_modified: Option<String>,
}

impl Default for Config {
    /// Generate a new Config object. Every instrument is selected, input paths are empty
    fn default() -> Self {
        Self {
            output_path: PathBuf::from("None"),
            instruments: InstrumentKind::all().to_vec(),
            vulcan_survey_path: None,
            basis_nexus_111: None,
            basis_nexus_311: None,
            last_modified: None,
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    /// Get the path of an output file, checking that the output directory exists
    pub fn get_output_file_name(&self, file_name: &str) -> Result<PathBuf, ConfigError> {
        if self.output_path.exists() {
            Ok(self.output_path.join(file_name))
        } else {
            Err(ConfigError::BadFilePath(self.output_path.clone()))
        }
    }

    pub fn get_vulcan_survey_path(&self) -> Result<&Path, ConfigError> {
        self.vulcan_survey_path
            .as_deref()
            .ok_or(ConfigError::MissingInput("vulcan_survey_path"))
    }

    /// Get the NeXus calibration file of a BASIS reflection
    pub fn get_basis_nexus_path(&self, reflection: &Reflection) -> Result<&Path, ConfigError> {
        if reflection.uses_311_run {
            self.basis_nexus_311
                .as_deref()
                .ok_or(ConfigError::MissingInput("basis_nexus_311"))
        } else {
            self.basis_nexus_111
                .as_deref()
                .ok_or(ConfigError::MissingInput("basis_nexus_111"))
        }
    }

    pub fn last_modified(&self) -> Option<&str> {
        self.last_modified.as_deref()
    }
}
