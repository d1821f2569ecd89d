//! Error types for SQLite persistence.
//!
//! Each stage of persistence has its own error type: table definitions
//! ([`ConfigurationError`]), schema upgrades ([`MigrationError`]), writing
//! ([`WriteError`]) and reading ([`ReadError`]). [`SqliteError`] wraps them
//! all for the public API. Unresolved references found while reading are
//! not errors; they are reported as [`ReadWarning`]s.

use std::path::PathBuf;

use cim_store_core::{GraphIssue, MetadataError, ObjectKind, ServiceError};
use thiserror::Error;

/// A malformed table definition or table lookup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("table name cannot be empty")]
    EmptyTableName,

    #[error("duplicate column '{column}' in table {table}")]
    DuplicateColumn { table: String, column: String },

    #[error("column '{column}' in table {table} has ordinal {found}, expected {expected}")]
    OutOfOrderOrdinal {
        table: String,
        column: String,
        expected: usize,
        found: usize,
    },

    #[error("index on table {table} references unknown column '{column}'")]
    UnknownIndexColumn { table: String, column: String },

    #[error("index on table {0} has no columns")]
    EmptyIndex(String),

    #[error("table {table} has no column '{column}'")]
    UnknownColumn { table: String, column: String },

    #[error("no table named '{0}'")]
    MissingTable(String),

    #[error("no mapping for table '{0}'")]
    UnmappedTable(String),

    #[error("change set {found} must come after change set {previous}")]
    ChangeSetOrder { previous: u32, found: u32 },
}

/// A failure while bringing a database up to the current schema version.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("change set {version} failed at '{description}': {source}")]
    ChangeSetFailed {
        version: u32,
        description: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("database is at version {found}, newer than the supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("no change set targets version {0}")]
    UnknownTarget(u32),

    #[error("stored schema version {0} is not a valid version number")]
    InvalidVersion(i64),
}

/// A failure while writing a database file. The partial file is removed.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("refusing to overwrite existing database {0}")]
    TargetExists(PathBuf),

    #[error("invalid value for {table}.{column} in row '{row}': {reason}")]
    InvalidValue {
        table: String,
        row: String,
        column: String,
        reason: String,
    },

    #[error("failed to insert row '{row}' into {table}: {source}")]
    Insert {
        table: String,
        row: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("failed to create indexes for {table}: {source}")]
    Index {
        table: String,
        #[source]
        source: rusqlite::Error,
    },
}

/// A fatal failure while reading a database file.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("database {0} does not exist")]
    NotFound(PathBuf),

    #[error("{table} row '{mrid}' has no value for required column {column}")]
    MissingValue {
        table: String,
        mrid: String,
        column: String,
    },

    #[error("{table} row '{mrid}' has an invalid {column}: {reason}")]
    InvalidValue {
        table: String,
        mrid: String,
        column: String,
        reason: String,
    },

    #[error("mRID '{mrid}' is used by both a {existing} and a {found}")]
    ConflictingIdentifier {
        mrid: String,
        existing: ObjectKind,
        found: ObjectKind,
    },

    #[error("{} unresolved references", .0.len())]
    UnresolvedReferences(Vec<ReadWarning>),
}

/// A problem found while reading that does not stop the read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadWarning {
    /// A reference that does not resolve, or resolves to the wrong kind.
    #[error(transparent)]
    Reference(GraphIssue),

    /// An association or child row whose owning object was not loaded.
    #[error("{table} row links '{member}' to '{owner}', which was not loaded")]
    OrphanRow {
        table: String,
        owner: String,
        member: String,
    },
}

impl ReadWarning {
    /// The identifier that could not be resolved.
    pub fn target(&self) -> Option<&str> {
        match self {
            ReadWarning::Reference(issue) => issue.target(),
            ReadWarning::OrphanRow { owner, .. } => Some(owner),
        }
    }
}

/// Errors that can occur during SQLite persistence operations.
#[derive(Debug, Error)]
pub enum SqliteError {
    /// SQLite database operation failure.
    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    /// File system failure outside SQLite (backups, removing partial files).
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("migration error: {0}")]
    Migration(#[from] MigrationError),

    #[error("write error: {0}")]
    Write(#[from] WriteError),

    #[error("read error: {0}")]
    Read(#[from] ReadError),

    /// The loaded rows could not be placed in the network service.
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

/// Convenience alias for results with [`SqliteError`].
pub type Result<T> = std::result::Result<T, SqliteError>;
