//! Writing a network service to a new database file.
//!
//! [`DatabaseWriter`] always produces a database at [`CURRENT_VERSION`]. The
//! whole file is written in one transaction: tables, then rows in registry
//! order, then indexes, then the version marker. If anything fails the
//! partially written file is removed, so a file at the target path is
//! either complete or absent.
//!
//! # Example
//!
//! ```no_run
//! use cim_store_core::{Breaker, MetadataCollection, NetworkService};
//! use cim_store_sqlite::DatabaseWriter;
//!
//! let mut service = NetworkService::new();
//! service.add(Breaker::new("b1")).unwrap();
//!
//! let report = DatabaseWriter::new("network.sqlite")
//!     .unwrap()
//!     .save(&MetadataCollection::new(), &service)
//!     .unwrap();
//! println!("wrote {} rows", report.total_rows());
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use cim_store_core::{
    AcLineSegment, Analog, AssetOwner, BaseVoltage, Breaker, CimType, ConnectivityNode, Customer,
    CustomerAgreement, Feeder, Location, MetadataCollection, Meter, NetworkService, Organisation,
    PowerTransformer, Terminal, UsagePoint,
};
use cim_store_db::WriterConfig;
use rusqlite::{Connection, Transaction, params_from_iter};
use tracing::{debug, error, info, warn};

use crate::changesets::CURRENT_VERSION;
use crate::convert;
use crate::error::{ConfigurationError, Result, SqliteError, WriteError};
use crate::schema::{Row, TableDef};
use crate::tables::DatabaseTables;

/// Rows for one table, each labelled for error messages.
type LabelledRows<'t> = Vec<(String, Row<'t>)>;

/// Summary of a completed write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReport {
    /// Schema version of the written file.
    pub version: u32,
    /// Rows written, keyed by table name. Every table is present.
    pub rows_per_table: BTreeMap<String, usize>,
}

impl WriteReport {
    pub fn total_rows(&self) -> usize {
        self.rows_per_table.values().sum()
    }
}

/// Writes a metadata collection and network service to a database file.
///
/// A writer is consumed by [`save`](DatabaseWriter::save).
#[derive(Debug)]
pub struct DatabaseWriter {
    path: PathBuf,
    config: WriterConfig,
    tables: DatabaseTables,
}

impl DatabaseWriter {
    /// Creates a writer for `path` with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::Configuration`] if the table registry is
    /// malformed.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            path: path.into(),
            config: WriterConfig::default(),
            tables: DatabaseTables::new()?,
        })
    }

    pub fn with_config(mut self, config: WriterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes `metadata` and every object of `service` to the target file.
    ///
    /// # Errors
    ///
    /// - [`WriteError::TargetExists`] if the file exists and
    ///   `replace_existing` is off.
    /// - [`WriteError::InvalidValue`] if a value breaks its column's
    ///   nullability or type, such as a NaN coordinate.
    /// - [`WriteError::Insert`] or [`WriteError::Index`] if SQLite rejects a
    ///   row or index, such as a duplicated association.
    ///
    /// On error no file is left at the target path.
    pub fn save(self, metadata: &MetadataCollection, service: &NetworkService) -> Result<WriteReport> {
        if self.path.exists() {
            if !self.config.replace_existing {
                return Err(WriteError::TargetExists(self.path.clone()).into());
            }
            info!(path = %self.path.display(), "Replacing existing database");
            fs::remove_file(&self.path)?;
        }

        // The connection must be closed before a failed file can be removed.
        let result = Connection::open(&self.path)
            .map_err(SqliteError::from)
            .and_then(|mut conn| self.write(&mut conn, metadata, service));

        match result {
            Ok(report) => {
                info!(
                    path = %self.path.display(),
                    version = report.version,
                    rows = report.total_rows(),
                    "Database written"
                );
                Ok(report)
            }
            Err(err) => {
                error!(path = %self.path.display(), error = %err, "Database write failed");
                if let Err(remove) = fs::remove_file(&self.path) {
                    warn!(path = %self.path.display(), error = %remove, "Could not remove partial database");
                }
                Err(err)
            }
        }
    }

    fn write(
        &self,
        conn: &mut Connection,
        metadata: &MetadataCollection,
        service: &NetworkService,
    ) -> Result<WriteReport> {
        let tx = conn.transaction()?;

        for table in self.tables.iter() {
            tx.execute(&table.create_table_sql(), [])?;
        }

        let mut rows_per_table = BTreeMap::new();
        for table in self.tables.iter().filter(|t| t.name() != "version") {
            let rows = rows_for(table, metadata, service)?;
            insert_rows(&tx, table, &rows)?;
            debug!(table = table.name(), rows = rows.len(), "Table written");
            rows_per_table.insert(table.name().to_string(), rows.len());
        }

        for table in self.tables.iter() {
            for sql in table.create_indexes_sql() {
                tx.execute(&sql, []).map_err(|source| WriteError::Index {
                    table: table.name().to_string(),
                    source,
                })?;
            }
        }

        let version = self.tables.get("version")?;
        let marker = vec![("version".to_string(), convert::version_row(version, CURRENT_VERSION)?)];
        insert_rows(&tx, version, &marker)?;
        rows_per_table.insert(version.name().to_string(), marker.len());

        tx.commit()?;
        Ok(WriteReport {
            version: CURRENT_VERSION,
            rows_per_table,
        })
    }
}

fn insert_rows(tx: &Transaction<'_>, table: &TableDef, rows: &[(String, Row<'_>)]) -> Result<()> {
    let mut stmt = tx.prepare(&table.insert_sql())?;
    for (label, row) in rows {
        table.check_row(row, label)?;
        stmt.execute(params_from_iter(row.values()))
            .map_err(|source| WriteError::Insert {
                table: table.name().to_string(),
                row: label.clone(),
                source,
            })?;
    }
    Ok(())
}

fn entity_rows<'t, T, F>(service: &NetworkService, to_row: F) -> Result<LabelledRows<'t>>
where
    T: CimType,
    F: Fn(&T) -> Result<Row<'t>>,
{
    service
        .objects_of::<T>()
        .map(|object| Ok((object.mrid().to_string(), to_row(object)?)))
        .collect()
}

fn association_rows<'t>(
    table: &'t TableDef,
    pairs: impl Iterator<Item = (&'t str, &'t str)>,
) -> Result<LabelledRows<'t>> {
    pairs
        .map(|(first, second)| {
            Ok((
                format!("{first}/{second}"),
                convert::association_row(table, first, second)?,
            ))
        })
        .collect()
}

/// Builds the rows of `table`. Associations come from their owning side:
/// equipment for containers, usage points for their equipment and asset
/// owners for their assets.
fn rows_for<'t>(
    table: &'t TableDef,
    metadata: &MetadataCollection,
    service: &'t NetworkService,
) -> Result<LabelledRows<'t>> {
    match table.name() {
        "metadata_data_sources" => metadata
            .iter()
            .map(|source| Ok((source.source.clone(), convert::data_source_row(table, source)?)))
            .collect(),
        "organisations" => {
            entity_rows(service, |o: &Organisation| convert::identified_row(table, &o.base))
        }
        "locations" => entity_rows(service, |l: &Location| convert::identified_row(table, &l.base)),
        "position_points" => {
            let mut rows = Vec::new();
            for location in service.objects_of::<Location>() {
                for (sequence, point) in location.points.iter().enumerate() {
                    rows.push((
                        format!("{}/{sequence}", location.mrid()),
                        convert::position_point_row(table, location.mrid(), sequence, point)?,
                    ));
                }
            }
            Ok(rows)
        }
        "base_voltages" => {
            entity_rows(service, |bv: &BaseVoltage| convert::base_voltage_row(table, bv))
        }
        "connectivity_nodes" => {
            entity_rows(service, |n: &ConnectivityNode| convert::identified_row(table, &n.base))
        }
        "breakers" => entity_rows(service, |b: &Breaker| convert::breaker_row(table, b)),
        "ac_line_segments" => {
            entity_rows(service, |l: &AcLineSegment| convert::ac_line_segment_row(table, l))
        }
        "power_transformers" => entity_rows(service, |t: &PowerTransformer| {
            convert::power_transformer_row(table, t)
        }),
        "terminals" => entity_rows(service, |t: &Terminal| convert::terminal_row(table, t)),
        "feeders" => entity_rows(service, |f: &Feeder| convert::feeder_row(table, f)),
        "equipment_equipment_containers" => association_rows(
            table,
            service.objects().flat_map(|object| {
                object.equipment().into_iter().flat_map(move |eq| {
                    eq.containers
                        .iter()
                        .map(move |container| (object.mrid(), container.as_str()))
                })
            }),
        ),
        "usage_points" => {
            entity_rows(service, |up: &UsagePoint| convert::usage_point_row(table, up))
        }
        "equipment_usage_points" => association_rows(
            table,
            service.objects_of::<UsagePoint>().flat_map(|up| {
                up.equipment
                    .iter()
                    .map(move |equipment| (equipment.as_str(), up.mrid()))
            }),
        ),
        "asset_owners" => {
            entity_rows(service, |o: &AssetOwner| convert::asset_owner_row(table, o))
        }
        "asset_organisation_roles_assets" => association_rows(
            table,
            service.objects_of::<AssetOwner>().flat_map(|owner| {
                owner
                    .assets
                    .iter()
                    .map(move |asset| (owner.mrid(), asset.as_str()))
            }),
        ),
        "customers" => entity_rows(service, |c: &Customer| convert::customer_row(table, c)),
        "customer_agreements" => entity_rows(service, |a: &CustomerAgreement| {
            convert::customer_agreement_row(table, a)
        }),
        "meters" => entity_rows(service, |m: &Meter| convert::meter_row(table, m)),
        "analogs" => entity_rows(service, |a: &Analog| convert::analog_row(table, a)),
        other => Err(ConfigurationError::UnmappedTable(other.to_string()).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cim_store_core::PositionPoint;
    use tempfile::TempDir;

    #[test]
    fn test_every_registered_table_is_mapped() {
        let tables = DatabaseTables::new().unwrap();
        let metadata = MetadataCollection::new();
        let service = NetworkService::new();
        for table in tables.iter().filter(|t| t.name() != "version") {
            let rows = rows_for(table, &metadata, &service).unwrap();
            assert!(rows.is_empty(), "{} produced rows from an empty service", table.name());
        }
    }

    #[test]
    fn test_associations_written_from_owning_side() {
        let tables = DatabaseTables::new().unwrap();
        let mut service = NetworkService::new();
        service.add(Breaker::new("b1")).unwrap();
        service.add(Feeder::new("f1")).unwrap();
        service.assign_to_container("b1", "f1").unwrap();
        let mut up = UsagePoint::new("up1");
        up.equipment.push("b1".into());
        service.add(up).unwrap();

        let containers = tables.get("equipment_equipment_containers").unwrap();
        let rows = rows_for(containers, &MetadataCollection::new(), &service).unwrap();
        let labels: Vec<_> = rows.iter().map(|(label, _)| label.as_str()).collect();
        assert_eq!(labels, ["b1/f1"]);

        let usage = tables.get("equipment_usage_points").unwrap();
        let rows = rows_for(usage, &MetadataCollection::new(), &service).unwrap();
        let labels: Vec<_> = rows.iter().map(|(label, _)| label.as_str()).collect();
        assert_eq!(labels, ["b1/up1"]);
    }

    #[test]
    fn test_position_points_numbered_in_order() {
        let tables = DatabaseTables::new().unwrap();
        let mut service = NetworkService::new();
        let mut location = Location::new("loc1");
        location.points.push(PositionPoint::new(1.0, 2.0));
        location.points.push(PositionPoint::new(3.0, 4.0));
        service.add(location).unwrap();

        let table = tables.get("position_points").unwrap();
        let rows = rows_for(table, &MetadataCollection::new(), &service).unwrap();
        let labels: Vec<_> = rows.iter().map(|(label, _)| label.as_str()).collect();
        assert_eq!(labels, ["loc1/0", "loc1/1"]);
    }

    #[test]
    fn test_failed_write_leaves_no_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.sqlite");

        let mut service = NetworkService::new();
        let mut location = Location::new("loc1");
        location.points.push(PositionPoint::new(f64::NAN, 0.0));
        service.add(location).unwrap();

        let err = DatabaseWriter::new(&path)
            .unwrap()
            .save(&MetadataCollection::new(), &service)
            .unwrap_err();
        assert!(matches!(
            err,
            SqliteError::Write(WriteError::InvalidValue { ref column, .. }) if column == "x_position"
        ));
        assert!(!path.exists());
    }
}
