//! Configuration and JSON snapshots for CIM persistence.
//!
//! This crate provides the file-level pieces around the SQLite store:
//! the YAML [`PersistenceConfig`] read by tools that create and load
//! databases, and the JSON [`Snapshot`] format used to move object graphs
//! in and out of them.
//!
//! # Quick start
//!
//! ```no_run
//! use cim_store_db::{PersistenceConfig, Snapshot};
//!
//! let config = PersistenceConfig::load("cim-store.yml").unwrap();
//! let snapshot = Snapshot::load("network.json").unwrap();
//! let (metadata, service) = snapshot.into_parts().unwrap();
//! println!(
//!     "{} objects from {} sources (replace: {})",
//!     service.len(),
//!     metadata.len(),
//!     config.writer.replace_existing
//! );
//! ```

mod config;
mod error;
mod snapshot;

pub use config::{PersistenceConfig, ReaderConfig, ReferencePolicy, WriterConfig};
pub use error::{DbError, Result};
pub use snapshot::Snapshot;
