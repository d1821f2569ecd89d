//! JSON snapshots of an object graph and its metadata.
//!
//! A snapshot is the file-level interchange format used by import and
//! export. Objects are written in mRID order, each tagged with its type.
//!
//! # Example JSON
//!
//! ```json
//! {
//!   "metadata": {
//!     "gis": { "source": "gis", "version": "2.1", "timestamp": "2024-01-15T10:30:00Z" }
//!   },
//!   "objects": [
//!     { "type": "BaseVoltage", "base": { "mrid": "bv1", "name": "11kV" }, "nominal_voltage": 11000 }
//!   ]
//! }
//! ```

use std::io::{BufReader, BufWriter};
use std::path::Path;

use cim_store_core::{CimObject, MetadataCollection, NetworkService};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Serializable copy of a metadata collection and an object graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub metadata: MetadataCollection,
    #[serde(default)]
    pub objects: Vec<CimObject>,
}

impl Snapshot {
    /// Copies the contents of `service` and `metadata` into a snapshot.
    pub fn capture(metadata: &MetadataCollection, service: &NetworkService) -> Self {
        Self {
            metadata: metadata.clone(),
            objects: service.objects().cloned().collect(),
        }
    }

    /// Loads a snapshot from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::DbError::IoError) if the file cannot be
    /// read, or [`JsonError`](crate::DbError::JsonError) if parsing fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let snapshot = serde_json::from_reader(reader)?;
        Ok(snapshot)
    }

    /// Saves the snapshot as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Builds the service and metadata described by this snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`Service`](crate::DbError::Service) if two objects share an
    /// mRID.
    pub fn into_parts(self) -> Result<(MetadataCollection, NetworkService)> {
        let mut service = NetworkService::new();
        for object in self.objects {
            service.add(object)?;
        }
        Ok((self.metadata, service))
    }
}
