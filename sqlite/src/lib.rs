//! SQLite persistence for CIM network models.
//!
//! This crate stores a [`NetworkService`](cim_store_core::NetworkService)
//! and its [`MetadataCollection`](cim_store_core::MetadataCollection) in a
//! single SQLite file with a versioned schema, and loads it back.
//!
//! # Architecture
//!
//! - **`schema`** declarative column and table definitions, SQL generation
//! - **`tables`** the registry of every table at the current version
//! - **`changesets`** the frozen schema history, one change set per version
//! - **`migration`** [`UpgradeRunner`], applying pending change sets
//! - **`convert`** entity and row conversion in both directions
//! - **`writer`** / **`reader`** [`DatabaseWriter`] and [`DatabaseReader`]
//!
//! # Quick start
//!
//! ```no_run
//! use cim_store_core::{Breaker, MetadataCollection, NetworkService};
//! use cim_store_sqlite::{DatabaseReader, DatabaseWriter};
//!
//! let mut service = NetworkService::new();
//! service.add(Breaker::new("b1")).unwrap();
//! DatabaseWriter::new("network.sqlite")
//!     .unwrap()
//!     .save(&MetadataCollection::new(), &service)
//!     .unwrap();
//!
//! let mut metadata = MetadataCollection::new();
//! let mut loaded = NetworkService::new();
//! let report = DatabaseReader::new("network.sqlite")
//!     .unwrap()
//!     .load(&mut metadata, &mut loaded)
//!     .unwrap();
//! assert_eq!(report.objects_read, 1);
//! ```
//!
//! Older files are upgraded in place when read. Use [`UpgradeRunner`]
//! directly to upgrade without loading.

mod changesets;
mod convert;
mod error;
mod migration;
mod reader;
pub mod schema;
mod tables;
mod writer;

pub use changesets::CURRENT_VERSION;
pub use error::{
    ConfigurationError, MigrationError, ReadError, ReadWarning, Result, SqliteError, WriteError,
};
pub use migration::{Change, ChangeSet, DatabaseStatus, UpgradeReport, UpgradeRunner, status};
pub use reader::{DatabaseReader, ReadReport, backup_if_pending, backup_path};
pub use schema::{Column, ColumnSpec, ColumnType, Nullable, Row, TableBuilder, TableDef};
pub use tables::DatabaseTables;
pub use writer::{DatabaseWriter, WriteReport};
