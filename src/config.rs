//! Category table configuration.
//!
//! The category table is loaded from a TOML file. Categories are listed as an
//! array of tables so that their order, which decides classification when
//! extensions overlap, survives parsing:
//!
//! ```toml
//! [[categories]]
//! name = "图片"
//! extensions = [".jpg", ".jpeg", ".png"]
//!
//! [[categories]]
//! name = "文档"
//! extensions = [".pdf", ".txt"]
//! ```

use crate::category::{Category, CategoryMap};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the per-directory configuration file.
pub const LOCAL_CONFIG_FILE: &str = ".dirsortrc.toml";

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    #[error("configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),
    /// Invalid TOML syntax or structure.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),
    /// IO error while reading configuration.
    #[error("IO error reading configuration: {0}")]
    IoError(String),
    /// A category name that cannot be used as a folder name.
    #[error("invalid category name '{0}': must be a single folder name")]
    InvalidCategoryName(String),
    /// The same category name appears twice.
    #[error("duplicate category '{0}'")]
    DuplicateCategory(String),
}

/// On-disk shape of the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizerConfig {
    /// Categories in classification order.
    #[serde(default)]
    pub categories: Vec<CategoryEntry>,
}

/// One `[[categories]]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryEntry {
    pub name: String,
    #[serde(default)]
    pub extensions: Vec<String>,
}

impl OrganizerConfig {
    /// Load configuration from a file, with fallback to defaults.
    ///
    /// Lookup order:
    /// 1. `config_path`, if provided
    /// 2. `.dirsortrc.toml` in the current directory
    /// 3. `~/.config/dirsort/config.toml`
    /// 4. the built-in category table
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file is explicitly provided but cannot be read,
    /// or if any file found cannot be parsed.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Ok(home) = std::env::var("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("dirsort")
                .join("config.toml");
            if home_config.exists() {
                return Self::load_from_file(&home_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))
    }

    /// Serialize this configuration back to TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))
    }

    /// Validate and convert into a [`CategoryMap`].
    ///
    /// # Errors
    ///
    /// Returns an error for invalid or duplicate category names.
    pub fn into_category_map(self) -> Result<CategoryMap, ConfigError> {
        let categories = self
            .categories
            .into_iter()
            .map(|entry| Category::new(&entry.name, entry.extensions))
            .collect::<Result<Vec<_>, _>>()?;
        CategoryMap::new(categories)
    }
}

impl Default for OrganizerConfig {
    fn default() -> Self {
        Self::from(&CategoryMap::default())
    }
}

impl From<&CategoryMap> for OrganizerConfig {
    fn from(map: &CategoryMap) -> Self {
        Self {
            categories: map
                .iter()
                .map(|c| CategoryEntry {
                    name: c.name().to_string(),
                    extensions: c.extensions().map(str::to_string).collect(),
                })
                .collect(),
        }
    }
}

/// Convenience: load the configuration and build the category table in one step.
pub fn load_category_map(config_path: Option<&Path>) -> Result<CategoryMap, ConfigError> {
    OrganizerConfig::load(config_path)?.into_category_map()
}
