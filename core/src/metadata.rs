//! Provenance of the data held in a service.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MetadataError;

/// One upstream system that contributed data, with its version and ingest time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSource {
    pub source: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}

impl DataSource {
    pub fn new(source: impl Into<String>, version: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            source: source.into(),
            version: version.into(),
            timestamp,
        }
    }
}

/// Data sources keyed by their `source` name.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use cim_store_core::{DataSource, MetadataCollection};
///
/// let mut metadata = MetadataCollection::new();
/// metadata.add(DataSource::new("gis", "2.1", Utc::now())).unwrap();
/// assert!(metadata.add(DataSource::new("gis", "2.2", Utc::now())).is_err());
/// assert_eq!(metadata.get("gis").unwrap().version, "2.1");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataCollection {
    sources: BTreeMap<String, DataSource>,
}

impl MetadataCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, source: DataSource) -> Result<(), MetadataError> {
        if self.sources.contains_key(&source.source) {
            return Err(MetadataError::DuplicateSource(source.source));
        }
        self.sources.insert(source.source.clone(), source);
        Ok(())
    }

    /// Inserts `source`, replacing any source with the same name.
    ///
    /// Returns the replaced source.
    pub fn upsert(&mut self, source: DataSource) -> Option<DataSource> {
        self.sources.insert(source.source.clone(), source)
    }

    pub fn get(&self, source: &str) -> Option<&DataSource> {
        self.sources.get(source)
    }

    /// Data sources in name order.
    pub fn iter(&self) -> impl Iterator<Item = &DataSource> {
        self.sources.values()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
