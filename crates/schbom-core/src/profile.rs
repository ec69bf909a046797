//! BOM profiles loaded from YAML.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::bom::ColumnMapping;

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("Failed to read profile file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),
    #[error("Profile validation error: {0}")]
    ValidationError(String),
}

/// BOM settings stored in a YAML file.
///
/// ```yaml
/// columns:
///   Part Number: [Part Number, PART]
///   Manufacturer: [Manufacturer, MANUFACTURER]
///   Designator: Designator
/// group_by: [Part Number]
/// variant: Lite
/// combine_multi_part: true
/// design_reuse: [../shared-sheets]
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BomProfile {
    pub columns: ColumnMapping,
    #[serde(default)]
    pub group_by: Vec<String>,
    #[serde(default)]
    pub variant: Option<String>,
    #[serde(default)]
    pub combine_multi_part: bool,
    #[serde(default = "default_remove_non_bom")]
    pub remove_non_bom_components: bool,
    /// Auxiliary repository locations, relative to the profile file.
    #[serde(default)]
    pub design_reuse: Vec<PathBuf>,
}

fn default_remove_non_bom() -> bool {
    true
}

impl BomProfile {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ProfileError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let mut profile = Self::from_yaml(&content)?;

        let base = path.parent().unwrap_or(Path::new(""));
        for location in &mut profile.design_reuse {
            if location.is_relative() {
                *location = base.join(&*location);
            }
        }
        Ok(profile)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ProfileError> {
        let profile: BomProfile = serde_yaml::from_str(content)?;
        profile.validate()?;
        Ok(profile)
    }

    fn validate(&self) -> Result<(), ProfileError> {
        if self.columns.is_empty() {
            return Err(ProfileError::ValidationError(
                "Profile must declare at least one column".to_string(),
            ));
        }

        for column in self.columns.columns() {
            if self.columns.candidates(column).is_none_or(<[String]>::is_empty) {
                return Err(ProfileError::ValidationError(format!(
                    "Column '{column}' has no attribute names"
                )));
            }
        }

        for column in &self.group_by {
            if !self.columns.contains(column) {
                return Err(ProfileError::ValidationError(format!(
                    "group_by column '{column}' is not a declared column"
                )));
            }
        }

        Ok(())
    }
}
