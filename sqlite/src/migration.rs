//! Versioned schema upgrades.
//!
//! A database records the version of the last change set applied to it in
//! the single-row `version` table. [`UpgradeRunner`] compares that with its
//! change sets and applies every newer one in ascending order. Each change
//! set runs in its own transaction together with the version update, so a
//! failure leaves the file at the last version that fully applied.
//!
//! # Example
//!
//! ```no_run
//! use cim_store_sqlite::UpgradeRunner;
//! use rusqlite::Connection;
//!
//! let mut conn = Connection::open("network.sqlite").unwrap();
//! let runner = UpgradeRunner::default();
//!
//! println!("pending: {:?}", runner.pending(&conn).unwrap());
//! let report = runner.run(&mut conn).unwrap();
//! println!("upgraded {:?} -> {}", report.from, report.to);
//! ```

use rusqlite::{Connection, OptionalExtension, Transaction};
use tracing::{debug, error, info};

use crate::changesets;
use crate::error::{ConfigurationError, MigrationError, Result};

/// One described step of a change set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub description: String,
    pub statements: Vec<String>,
}

/// The statements that move a database to `version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSet {
    pub version: u32,
    pub changes: Vec<Change>,
}

impl ChangeSet {
    pub fn new(version: u32) -> Self {
        Self {
            version,
            changes: Vec::new(),
        }
    }

    /// Appends a change made of `statements`, executed in order.
    pub fn change<S: Into<String>>(
        mut self,
        description: impl Into<String>,
        statements: impl IntoIterator<Item = S>,
    ) -> Self {
        self.changes.push(Change {
            description: description.into(),
            statements: statements.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn statement_count(&self) -> usize {
        self.changes.iter().map(|c| c.statements.len()).sum()
    }
}

/// Outcome of an upgrade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeReport {
    /// Version found before upgrading, `None` for an unversioned database.
    pub from: Option<u32>,
    /// Version after upgrading.
    pub to: u32,
    /// Versions applied, in order.
    pub applied: Vec<u32>,
}

impl UpgradeReport {
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Applies pending change sets to a database.
#[derive(Debug, Clone)]
pub struct UpgradeRunner {
    change_sets: Vec<ChangeSet>,
}

impl Default for UpgradeRunner {
    /// A runner over the released schema history.
    fn default() -> Self {
        Self {
            change_sets: changesets::all(),
        }
    }
}

impl UpgradeRunner {
    /// Creates a runner over custom change sets.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::ChangeSetOrder`] unless versions are
    /// unique and strictly ascending, starting above zero.
    pub fn new(change_sets: Vec<ChangeSet>) -> std::result::Result<Self, ConfigurationError> {
        let mut previous = 0;
        for cs in &change_sets {
            if cs.version <= previous {
                return Err(ConfigurationError::ChangeSetOrder {
                    previous,
                    found: cs.version,
                });
            }
            previous = cs.version;
        }
        Ok(Self { change_sets })
    }

    pub fn change_sets(&self) -> &[ChangeSet] {
        &self.change_sets
    }

    /// Highest version this runner can reach, 0 when it has no change sets.
    pub fn latest_version(&self) -> u32 {
        self.change_sets.last().map_or(0, |cs| cs.version)
    }

    /// Reads the stored schema version.
    ///
    /// Returns `None` when the database has no `version` table or the table
    /// is empty.
    pub fn stored_version(&self, conn: &Connection) -> Result<Option<u32>> {
        read_version(conn)
    }

    /// Versions that [`run`](Self::run) would apply, in order.
    pub fn pending(&self, conn: &Connection) -> Result<Vec<u32>> {
        let stored = self.check_supported(conn)?;
        Ok(self
            .change_sets
            .iter()
            .filter(|cs| stored.is_none_or(|v| cs.version > v))
            .map(|cs| cs.version)
            .collect())
    }

    /// Upgrades the database to the latest version.
    pub fn run(&self, conn: &mut Connection) -> Result<UpgradeReport> {
        let stored = self.check_supported(conn)?;
        self.apply(conn, stored, self.latest_version())
    }

    /// Upgrades the database to `target`, which must be one of the change set
    /// versions. A database already at or past `target` is left unchanged.
    pub fn upgrade_to(&self, conn: &mut Connection, target: u32) -> Result<UpgradeReport> {
        if !self.change_sets.iter().any(|cs| cs.version == target) {
            return Err(MigrationError::UnknownTarget(target).into());
        }
        let stored = self.check_supported(conn)?;
        self.apply(conn, stored, target)
    }

    fn check_supported(&self, conn: &Connection) -> Result<Option<u32>> {
        let stored = read_version(conn)?;
        match stored {
            Some(found) if found > self.latest_version() => Err(MigrationError::UnsupportedVersion {
                found,
                supported: self.latest_version(),
            }
            .into()),
            _ => Ok(stored),
        }
    }

    fn apply(
        &self,
        conn: &mut Connection,
        stored: Option<u32>,
        target: u32,
    ) -> Result<UpgradeReport> {
        let mut applied = Vec::new();

        for cs in self
            .change_sets
            .iter()
            .filter(|cs| stored.is_none_or(|v| cs.version > v) && cs.version <= target)
        {
            info!(
                version = cs.version,
                statements = cs.statement_count(),
                "Applying change set"
            );
            let tx = conn.transaction()?;
            if let Err(err) = apply_change_set(&tx, cs) {
                error!(version = cs.version, error = %err, "Change set failed, rolling back");
                return Err(err.into());
            }
            tx.commit()?;
            applied.push(cs.version);
        }

        let to = applied.last().copied().or(stored).unwrap_or(0);
        if applied.is_empty() {
            debug!(version = to, "Database schema is up to date");
        } else {
            info!(from = ?stored, to, "Database schema upgraded");
        }

        Ok(UpgradeReport {
            from: stored,
            to,
            applied,
        })
    }
}

fn apply_change_set(tx: &Transaction<'_>, cs: &ChangeSet) -> std::result::Result<(), MigrationError> {
    let failed = |description: &str, source| MigrationError::ChangeSetFailed {
        version: cs.version,
        description: description.to_string(),
        source,
    };

    for change in &cs.changes {
        debug!(version = cs.version, change = %change.description, "Applying change");
        for statement in &change.statements {
            tx.execute_batch(statement)
                .map_err(|e| failed(&change.description, e))?;
        }
    }

    write_version(tx, cs.version).map_err(|e| failed("update version marker", e))
}

fn write_version(tx: &Transaction<'_>, version: u32) -> rusqlite::Result<()> {
    tx.execute_batch("CREATE TABLE IF NOT EXISTS version (version INTEGER NOT NULL)")?;
    tx.execute("DELETE FROM version", [])?;
    tx.execute("INSERT INTO version (version) VALUES (?1)", [version])?;
    Ok(())
}

fn read_version(conn: &Connection) -> Result<Option<u32>> {
    let has_table: bool = conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'version')",
        [],
        |row| row.get(0),
    )?;
    if !has_table {
        return Ok(None);
    }

    let version: Option<i64> = conn
        .query_row("SELECT MAX(version) FROM version", [], |row| row.get(0))
        .optional()?
        .flatten();
    match version {
        None => Ok(None),
        Some(v) => u32::try_from(v)
            .map(Some)
            .map_err(|_| MigrationError::InvalidVersion(v).into()),
    }
}

/// Snapshot of a database's schema version and row counts.
///
/// Returned by [`status`], for reporting without modifying the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseStatus {
    /// Stored schema version, `None` when unversioned.
    pub version: Option<u32>,
    /// Versions an upgrade would apply.
    pub pending: Vec<u32>,
    /// Row count of each table present, in name order.
    pub row_counts: Vec<(String, usize)>,
}

/// Reports the schema version, pending upgrades and table sizes of `conn`.
pub fn status(conn: &Connection, runner: &UpgradeRunner) -> Result<DatabaseStatus> {
    let version = runner.stored_version(conn)?;
    let pending = runner.pending(conn)?;

    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )?;
    let tables = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut row_counts = Vec::with_capacity(tables.len());
    for table in tables {
        let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM \"{table}\""), [], |row| {
            row.get(0)
        })?;
        row_counts.push((table, count as usize));
    }

    Ok(DatabaseStatus {
        version,
        pending,
        row_counts,
    })
}
