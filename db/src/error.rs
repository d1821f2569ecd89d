//! Error types for configuration and snapshot operations.
//!
//! Provides a unified error type covering I/O, serialization, and object
//! graph failures raised while importing a snapshot.

use cim_store_core::{MetadataError, ServiceError};
use thiserror::Error;

/// Errors that can occur while loading or saving configuration and snapshots.
#[derive(Debug, Error)]
pub enum DbError {
    /// File I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON parsing or serialization failure.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// A snapshot object could not be added to the service.
    #[error("invalid snapshot: {0}")]
    Service(#[from] ServiceError),

    /// A snapshot data source could not be added to the metadata.
    #[error("invalid snapshot metadata: {0}")]
    Metadata(#[from] MetadataError),
}

/// Convenience alias for results with [`DbError`].
pub type Result<T> = std::result::Result<T, DbError>;
