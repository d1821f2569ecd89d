//! Persistence configuration for database readers and writers.
//!
//! Defines the YAML-serializable settings that control how database files
//! are created and how they are loaded. Every field has a default, so an
//! empty file or a partial one is valid.
//!
//! # Example YAML
//!
//! ```yaml
//! writer:
//!   replace_existing: false
//! reader:
//!   backup_before_upgrade: true
//!   unresolved_references: warn
//! ```

use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// How a database writer treats its target path.
///
/// # Examples
///
/// ```
/// # use cim_store_db::WriterConfig;
/// let config = WriterConfig::default();
/// assert!(!config.replace_existing);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Delete an existing file at the target path instead of failing.
    pub replace_existing: bool,
}

/// What a database reader does with references it cannot resolve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferencePolicy {
    /// Record a warning and keep loading. Identifiers may legitimately name
    /// objects held in another database.
    #[default]
    Warn,
    /// Fail the read.
    Error,
}

/// How a database reader loads and upgrades a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Copy the file to `<file>.v<version>.bak` before applying upgrades.
    pub backup_before_upgrade: bool,
    pub unresolved_references: ReferencePolicy,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            backup_before_upgrade: true,
            unresolved_references: ReferencePolicy::Warn,
        }
    }
}

/// Top-level persistence configuration.
///
/// # Examples
///
/// ```no_run
/// use cim_store_db::PersistenceConfig;
///
/// let config = PersistenceConfig::load("cim-store.yml").unwrap();
/// if config.writer.replace_existing {
///     println!("existing databases will be overwritten");
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub writer: WriterConfig,
    pub reader: ReaderConfig,
}

impl PersistenceConfig {
    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::DbError::IoError) if the file cannot be
    /// read, or [`YamlError`](crate::DbError::YamlError) if parsing fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config = serde_yaml::from_reader(reader)?;
        Ok(config)
    }

    /// Loads configuration from `path` when given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Saves the configuration as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::DbError::IoError) if the file cannot be
    /// written, or [`YamlError`](crate::DbError::YamlError) if serialization
    /// fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }
}
