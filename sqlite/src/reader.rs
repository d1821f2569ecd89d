//! Loading a database file into a network service.
//!
//! [`DatabaseReader`] first brings the file up to [`CURRENT_VERSION`],
//! optionally copying it to `{file}.v{n}.bak` beforehand. It then reads in
//! two passes. Pass one reads every entity table in registry order and
//! collects child rows and association rows. Pass two attaches those to
//! their owners and checks the references held by the objects the file
//! contributed.
//!
//! References that do not resolve are reported as [`ReadWarning`]s rather
//! than failing the read, unless the reader is configured with
//! [`ReferencePolicy::Error`].
//!
//! [`CURRENT_VERSION`]: crate::CURRENT_VERSION
//!
//! # Example
//!
//! ```no_run
//! use cim_store_core::{MetadataCollection, NetworkService};
//! use cim_store_sqlite::DatabaseReader;
//!
//! let mut metadata = MetadataCollection::new();
//! let mut service = NetworkService::new();
//! let report = DatabaseReader::new("network.sqlite")
//!     .unwrap()
//!     .load(&mut metadata, &mut service)
//!     .unwrap();
//!
//! for warning in &report.warnings {
//!     eprintln!("warning: {warning}");
//! }
//! ```

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use cim_store_core::{
    AssetOwner, CimObject, GraphIssue, Location, MetadataCollection, NetworkService, PositionPoint,
    ServiceError, UsagePoint, validate_objects,
};
use cim_store_db::{ReaderConfig, ReferencePolicy};
use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::convert::{self, Fields};
use crate::error::{ConfigurationError, ReadError, ReadWarning, Result};
use crate::migration::{UpgradeReport, UpgradeRunner};
use crate::schema::{Row, TableDef};
use crate::tables::DatabaseTables;

/// Summary of a completed read.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadReport {
    /// Schema version of the file after upgrading.
    pub version: u32,
    pub upgrade: UpgradeReport,
    /// Entity rows read, not counting metadata, points or associations.
    pub objects_read: usize,
    pub warnings: Vec<ReadWarning>,
}

/// Rows that link objects together, attached once every entity is loaded.
#[derive(Debug, Default)]
struct Links {
    /// mRIDs of the entities read from the file.
    loaded: BTreeSet<String>,
    points: Vec<(String, i64, PositionPoint)>,
    containers: Vec<(String, String)>,
    usage_point_equipment: Vec<(String, String)>,
    owned_assets: Vec<(String, String)>,
}

/// Reads a database file into a metadata collection and network service.
#[derive(Debug)]
pub struct DatabaseReader {
    path: PathBuf,
    config: ReaderConfig,
    tables: DatabaseTables,
    runner: UpgradeRunner,
}

impl DatabaseReader {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            path: path.into(),
            config: ReaderConfig::default(),
            tables: DatabaseTables::new()?,
            runner: UpgradeRunner::default(),
        })
    }

    pub fn with_config(mut self, config: ReaderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Upgrades the file if needed and loads it into `metadata` and `service`.
    ///
    /// Objects already in `service` with the same mRID and kind as a stored
    /// row are replaced, as are data sources with the same name. Only the
    /// references of objects read from the file are checked. On error `metadata` and `service` are left unchanged,
    /// although an upgrade that completed before the error stays applied to
    /// the file.
    ///
    /// # Errors
    ///
    /// - [`ReadError::NotFound`] if the file does not exist.
    /// - [`MigrationError`](crate::MigrationError) if the upgrade fails.
    /// - [`ReadError::MissingValue`] or [`ReadError::InvalidValue`] for rows
    ///   that cannot be converted.
    /// - [`ReadError::ConflictingIdentifier`] if an mRID is used by two kinds.
    /// - [`ReadError::UnresolvedReferences`] under [`ReferencePolicy::Error`].
    pub fn load(
        &self,
        metadata: &mut MetadataCollection,
        service: &mut NetworkService,
    ) -> Result<ReadReport> {
        if !self.path.exists() {
            return Err(ReadError::NotFound(self.path.clone()).into());
        }

        let mut conn = Connection::open(&self.path)?;
        if self.config.backup_before_upgrade {
            backup_if_pending(&self.path, &conn, &self.runner)?;
        }
        let upgrade = self.runner.run(&mut conn)?;

        let mut loaded_metadata = metadata.clone();
        let mut loaded = service.clone();
        let mut links = Links::default();
        let mut objects_read = 0;

        for table in self.tables.iter() {
            objects_read += self.read_table(&conn, table, &mut loaded_metadata, &mut loaded, &mut links)?;
        }

        let read_mrids = std::mem::take(&mut links.loaded);
        let mut warnings = attach_links(&mut loaded, links)?;
        warnings.extend(
            validate_objects(&loaded, read_mrids.iter().map(String::as_str))
                .into_iter()
                .filter(|issue| !matches!(issue, GraphIssue::EmptyMrid { .. }))
                .map(ReadWarning::Reference),
        );

        if self.config.unresolved_references == ReferencePolicy::Error && !warnings.is_empty() {
            return Err(ReadError::UnresolvedReferences(warnings).into());
        }
        for warning in &warnings {
            warn!(target_mrid = warning.target().unwrap_or_default(), "{warning}");
        }

        *metadata = loaded_metadata;
        *service = loaded;
        info!(
            path = %self.path.display(),
            version = upgrade.to,
            objects = objects_read,
            warnings = warnings.len(),
            "Database loaded"
        );
        Ok(ReadReport {
            version: upgrade.to,
            upgrade,
            objects_read,
            warnings,
        })
    }

    /// Reads one table, returning the number of entities it added.
    fn read_table(
        &self,
        conn: &Connection,
        table: &TableDef,
        metadata: &mut MetadataCollection,
        service: &mut NetworkService,
        links: &mut Links,
    ) -> Result<usize> {
        let rows = read_rows(conn, table)?;
        debug!(table = table.name(), rows = rows.len(), "Reading table");

        let entities = |read: fn(&Fields<'_>) -> Result<CimObject>,
                        service: &mut NetworkService,
                        links: &mut Links| {
            for row in &rows {
                let object = read(&Fields::new(row, "mrid"))?;
                links.loaded.insert(object.mrid().to_string());
                insert(service, object)?;
            }
            Ok::<_, crate::SqliteError>(rows.len())
        };

        match table.name() {
            "version" => Ok(0),
            "metadata_data_sources" => {
                for row in &rows {
                    metadata.upsert(convert::read_data_source(&Fields::new(row, "source"))?);
                }
                Ok(0)
            }
            "position_points" => {
                for row in &rows {
                    links
                        .points
                        .push(convert::read_position_point(&Fields::new(row, "location_mrid"))?);
                }
                Ok(0)
            }
            "equipment_equipment_containers" => {
                links.containers.extend(read_pairs(&rows)?);
                Ok(0)
            }
            "equipment_usage_points" => {
                links.usage_point_equipment.extend(read_pairs(&rows)?);
                Ok(0)
            }
            "asset_organisation_roles_assets" => {
                links.owned_assets.extend(read_pairs(&rows)?);
                Ok(0)
            }
            "organisations" => entities(|f| convert::read_organisation(f).map(Into::into), service, links),
            "locations" => entities(|f| convert::read_location(f).map(Into::into), service, links),
            "base_voltages" => entities(|f| convert::read_base_voltage(f).map(Into::into), service, links),
            "connectivity_nodes" => {
                entities(|f| convert::read_connectivity_node(f).map(Into::into), service, links)
            }
            "breakers" => entities(|f| convert::read_breaker(f).map(Into::into), service, links),
            "ac_line_segments" => {
                entities(|f| convert::read_ac_line_segment(f).map(Into::into), service, links)
            }
            "power_transformers" => {
                entities(|f| convert::read_power_transformer(f).map(Into::into), service, links)
            }
            "terminals" => entities(|f| convert::read_terminal(f).map(Into::into), service, links),
            "feeders" => entities(|f| convert::read_feeder(f).map(Into::into), service, links),
            "usage_points" => entities(|f| convert::read_usage_point(f).map(Into::into), service, links),
            "asset_owners" => entities(|f| convert::read_asset_owner(f).map(Into::into), service, links),
            "customers" => entities(|f| convert::read_customer(f).map(Into::into), service, links),
            "customer_agreements" => {
                entities(|f| convert::read_customer_agreement(f).map(Into::into), service, links)
            }
            "meters" => entities(|f| convert::read_meter(f).map(Into::into), service, links),
            "analogs" => entities(|f| convert::read_analog(f).map(Into::into), service, links),
            other => Err(ConfigurationError::UnmappedTable(other.to_string()).into()),
        }
    }
}

/// Copies the file at `path` to [`backup_path`] if `runner` has upgrades
/// pending for it.
///
/// Returns the backup location, or `None` when the file is current.
pub fn backup_if_pending(
    path: &Path,
    conn: &Connection,
    runner: &UpgradeRunner,
) -> Result<Option<PathBuf>> {
    if runner.pending(conn)?.is_empty() {
        return Ok(None);
    }
    let stored = runner.stored_version(conn)?.unwrap_or(0);
    let backup = backup_path(path, stored);
    info!(from = %path.display(), to = %backup.display(), "Backing up before upgrade");
    fs::copy(path, &backup)?;
    Ok(Some(backup))
}

/// Where a database at `version` is copied before upgrading:
/// `{path}.v{version}.bak`, next to the database. Unversioned files use 0.
pub fn backup_path(path: &Path, version: u32) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".v{version}.bak"));
    PathBuf::from(name)
}

fn read_rows<'t>(conn: &Connection, table: &'t TableDef) -> Result<Vec<Row<'t>>> {
    let mut stmt = conn.prepare(&format!("{} ORDER BY rowid", table.select_sql()))?;
    let rows = stmt
        .query_map([], |row| Row::from_sql(table, row))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

fn read_pairs(rows: &[Row<'_>]) -> Result<Vec<(String, String)>> {
    rows.iter()
        .map(|row| {
            let key = row.table().columns().first().map_or("", |c| c.name.as_str());
            convert::read_association(&Fields::new(row, key))
        })
        .collect()
}

fn insert(service: &mut NetworkService, object: CimObject) -> Result<()> {
    match service.upsert(object) {
        Ok(Some(previous)) => {
            debug!(mrid = previous.mrid(), kind = %previous.kind(), "Replaced existing object");
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(ServiceError::KindMismatch {
            mrid,
            existing,
            incoming,
        }) => Err(ReadError::ConflictingIdentifier {
            mrid,
            existing,
            found: incoming,
        }
        .into()),
        Err(other) => Err(other.into()),
    }
}

/// Attaches child and association rows to their owners.
///
/// Rows whose owner was not loaded become [`ReadWarning::OrphanRow`]s.
/// Targets that do not resolve are left for reference validation.
fn attach_links(service: &mut NetworkService, mut links: Links) -> Result<Vec<ReadWarning>> {
    let mut warnings = Vec::new();
    let orphan = |table: &str, owner: String, member: String| ReadWarning::OrphanRow {
        table: table.to_string(),
        owner,
        member,
    };

    links
        .points
        .sort_by(|a, b| (a.0.as_str(), a.1).cmp(&(b.0.as_str(), b.1)));
    for (location, sequence, point) in links.points {
        match service.get_mut::<Location>(&location) {
            Some(loc) => loc.points.push(point),
            None => warnings.push(orphan("position_points", location, format!("point {sequence}"))),
        }
    }

    for (equipment, container) in links.containers {
        match service.assign_to_container(&equipment, &container) {
            Ok(()) => {}
            Err(ServiceError::NotFound(_)) => {
                warnings.push(orphan("equipment_equipment_containers", equipment, container))
            }
            Err(err) => return Err(err.into()),
        }
    }

    for (equipment, usage_point) in links.usage_point_equipment {
        match service.get_mut::<UsagePoint>(&usage_point) {
            Some(up) => {
                if !up.equipment.contains(&equipment) {
                    up.equipment.push(equipment);
                }
            }
            None => warnings.push(orphan("equipment_usage_points", usage_point, equipment)),
        }
    }

    for (owner, asset) in links.owned_assets {
        match service.get_mut::<AssetOwner>(&owner) {
            Some(o) => {
                if !o.assets.contains(&asset) {
                    o.assets.push(asset);
                }
            }
            None => warnings.push(orphan("asset_organisation_roles_assets", owner, asset)),
        }
    }

    Ok(warnings)
}
