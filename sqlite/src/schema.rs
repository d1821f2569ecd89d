//! Declarative table definitions and SQL generation.
//!
//! A [`TableDef`] is an ordered list of [`Column`]s plus unique and
//! non-unique index column groups. Tables are assembled with a
//! [`TableBuilder`] from shared base column lists (such as
//! [`identified_object_columns`]) followed by table-specific columns, and
//! the builder assigns ordinals `1..=n` in that order.
//!
//! Every definition error (empty names, duplicate columns, bad ordinals,
//! indexes over unknown columns) is reported when the table is built, never
//! when it is used.
//!
//! # Example
//!
//! ```
//! use cim_store_sqlite::schema::{ColumnSpec, Nullable, TableBuilder, identified_object_columns};
//!
//! let table = TableBuilder::new("base_voltages")
//!     .columns(identified_object_columns())
//!     .column(ColumnSpec::integer("nominal_voltage", Nullable::NotNull))
//!     .mrid_indexes()
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(table.column("nominal_voltage").unwrap().ordinal, 5);
//! assert_eq!(
//!     table.create_indexes_sql(),
//!     [
//!         "CREATE UNIQUE INDEX base_voltages_mrid ON base_voltages (mrid)",
//!         "CREATE INDEX base_voltages_name ON base_voltages (name)",
//!     ]
//! );
//! ```

use std::collections::HashSet;
use std::fmt;

use rusqlite::types::Value;

use crate::error::{ConfigurationError, WriteError};

/// Declared SQL type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Integer,
    /// Real or integer numeric value.
    Number,
    /// Stored as 0 or 1.
    Boolean,
}

impl ColumnType {
    pub fn sql_name(&self) -> &'static str {
        match self {
            ColumnType::Text => "TEXT",
            ColumnType::Integer => "INTEGER",
            ColumnType::Number => "NUMBER",
            ColumnType::Boolean => "BOOLEAN",
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (ColumnType::Text, Value::Text(_)) => true,
            (ColumnType::Integer | ColumnType::Boolean, Value::Integer(_)) => true,
            (ColumnType::Number, Value::Integer(_) | Value::Real(_)) => true,
            _ => false,
        }
    }
}

/// Nullability clause of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nullable {
    /// No clause. SQLite treats the column as nullable.
    None,
    Null,
    NotNull,
}

impl Nullable {
    fn allows_null(&self) -> bool {
        !matches!(self, Nullable::NotNull)
    }
}

/// A column before it has been given a position in a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: Nullable,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, column_type: ColumnType, nullable: Nullable) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable,
        }
    }

    pub fn text(name: impl Into<String>, nullable: Nullable) -> Self {
        Self::new(name, ColumnType::Text, nullable)
    }

    pub fn integer(name: impl Into<String>, nullable: Nullable) -> Self {
        Self::new(name, ColumnType::Integer, nullable)
    }

    pub fn number(name: impl Into<String>, nullable: Nullable) -> Self {
        Self::new(name, ColumnType::Number, nullable)
    }

    /// A boolean column without a nullability clause.
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Boolean, Nullable::None)
    }

    fn at(self, ordinal: usize) -> Column {
        Column {
            ordinal,
            name: self.name,
            column_type: self.column_type,
            nullable: self.nullable,
        }
    }
}

/// One column of a table, at a 1-based position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub ordinal: usize,
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: Nullable,
}

impl Column {
    pub fn new(
        ordinal: usize,
        name: impl Into<String>,
        column_type: ColumnType,
        nullable: Nullable,
    ) -> Self {
        ColumnSpec::new(name, column_type, nullable).at(ordinal)
    }

    /// Column definition as used in `CREATE TABLE` and `ALTER TABLE`.
    pub fn sql(&self) -> String {
        match self.nullable {
            Nullable::None => format!("{} {}", self.name, self.column_type.sql_name()),
            Nullable::Null => format!("{} {} NULL", self.name, self.column_type.sql_name()),
            Nullable::NotNull => format!("{} {} NOT NULL", self.name, self.column_type.sql_name()),
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql())
    }
}

/// Base columns of every identified object.
pub fn identified_object_columns() -> Vec<ColumnSpec> {
    vec![
        ColumnSpec::text("mrid", Nullable::NotNull),
        ColumnSpec::text("name", Nullable::NotNull),
        ColumnSpec::text("description", Nullable::NotNull),
        ColumnSpec::integer("num_diagram_objects", Nullable::NotNull),
    ]
}

pub fn power_system_resource_columns() -> Vec<ColumnSpec> {
    let mut columns = identified_object_columns();
    columns.extend([
        ColumnSpec::text("location_mrid", Nullable::Null),
        ColumnSpec::integer("num_controls", Nullable::NotNull),
    ]);
    columns
}

pub fn equipment_columns() -> Vec<ColumnSpec> {
    let mut columns = power_system_resource_columns();
    columns.extend([
        ColumnSpec::boolean("normally_in_service"),
        ColumnSpec::boolean("in_service"),
        ColumnSpec::text("commissioned_date", Nullable::Null),
    ]);
    columns
}

pub fn conducting_equipment_columns() -> Vec<ColumnSpec> {
    let mut columns = equipment_columns();
    columns.push(ColumnSpec::text("base_voltage_mrid", Nullable::Null));
    columns
}

pub fn asset_organisation_role_columns() -> Vec<ColumnSpec> {
    let mut columns = identified_object_columns();
    columns.push(ColumnSpec::text("organisation_mrid", Nullable::Null));
    columns
}

pub fn document_columns() -> Vec<ColumnSpec> {
    let mut columns = identified_object_columns();
    columns.extend([
        ColumnSpec::text("title", Nullable::NotNull),
        ColumnSpec::text("created_date_time", Nullable::Null),
        ColumnSpec::text("author_name", Nullable::NotNull),
        ColumnSpec::text("type", Nullable::NotNull),
        ColumnSpec::text("status", Nullable::NotNull),
        ColumnSpec::text("comment", Nullable::NotNull),
    ]);
    columns
}

/// The two identifier columns of a many-to-many association table.
pub fn association_columns(first: &str, second: &str) -> Vec<ColumnSpec> {
    vec![
        ColumnSpec::text(first, Nullable::NotNull),
        ColumnSpec::text(second, Nullable::NotNull),
    ]
}

/// Assembles a [`TableDef`] from ordered column specs.
///
/// Ordinals are assigned in the order columns are added, starting at 1, so
/// columns appended after a base list always follow the inherited ones.
#[derive(Debug, Clone)]
pub struct TableBuilder {
    name: String,
    columns: Vec<ColumnSpec>,
    unique: Vec<Vec<String>>,
    non_unique: Vec<Vec<String>>,
}

impl TableBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            unique: Vec::new(),
            non_unique: Vec::new(),
        }
    }

    pub fn column(mut self, column: ColumnSpec) -> Self {
        self.columns.push(column);
        self
    }

    pub fn columns(mut self, columns: impl IntoIterator<Item = ColumnSpec>) -> Self {
        self.columns.extend(columns);
        self
    }

    pub fn unique_index(mut self, columns: &[&str]) -> Self {
        self.unique.push(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    pub fn non_unique_index(mut self, columns: &[&str]) -> Self {
        self.non_unique.push(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    /// Unique index on `mrid` and non-unique index on `name`.
    pub fn mrid_indexes(self) -> Self {
        self.unique_index(&["mrid"]).non_unique_index(&["name"])
    }

    /// Composite unique index on both columns and one index on each.
    pub fn association_indexes(self, first: &str, second: &str) -> Self {
        self.unique_index(&[first, second])
            .non_unique_index(&[first])
            .non_unique_index(&[second])
    }

    pub fn build(self) -> Result<TableDef, ConfigurationError> {
        let columns = self
            .columns
            .into_iter()
            .enumerate()
            .map(|(i, spec)| spec.at(i + 1))
            .collect();
        TableDef::from_columns(self.name, columns, self.unique, self.non_unique)
    }
}

/// A validated table definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDef {
    name: String,
    columns: Vec<Column>,
    unique: Vec<Vec<String>>,
    non_unique: Vec<Vec<String>>,
}

impl TableDef {
    /// Builds a table from already numbered columns.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] if the name is empty, a column name
    /// repeats, ordinals are not exactly `1..=n` in order, or an index group
    /// is empty or names a column the table does not have.
    pub fn from_columns(
        name: impl Into<String>,
        columns: Vec<Column>,
        unique: Vec<Vec<String>>,
        non_unique: Vec<Vec<String>>,
    ) -> Result<Self, ConfigurationError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ConfigurationError::EmptyTableName);
        }

        let mut seen = HashSet::new();
        for (i, column) in columns.iter().enumerate() {
            if !seen.insert(column.name.as_str()) {
                return Err(ConfigurationError::DuplicateColumn {
                    table: name,
                    column: column.name.clone(),
                });
            }
            if column.ordinal != i + 1 {
                return Err(ConfigurationError::OutOfOrderOrdinal {
                    table: name,
                    column: column.name.clone(),
                    expected: i + 1,
                    found: column.ordinal,
                });
            }
        }

        for group in unique.iter().chain(&non_unique) {
            if group.is_empty() {
                return Err(ConfigurationError::EmptyIndex(name));
            }
            if let Some(unknown) = group.iter().find(|c| !seen.contains(c.as_str())) {
                return Err(ConfigurationError::UnknownIndexColumn {
                    table: name,
                    column: unknown.clone(),
                });
            }
        }

        Ok(Self {
            name,
            columns,
            unique,
            non_unique,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn unique_indexes(&self) -> &[Vec<String>] {
        &self.unique
    }

    pub fn non_unique_indexes(&self) -> &[Vec<String>] {
        &self.non_unique
    }

    /// Names of every index, unique ones first.
    pub fn index_names(&self) -> Vec<String> {
        self.unique
            .iter()
            .chain(&self.non_unique)
            .map(|group| self.index_name(group))
            .collect()
    }

    pub fn create_table_sql(&self) -> String {
        let columns: Vec<String> = self.columns.iter().map(Column::sql).collect();
        format!("CREATE TABLE {} ({})", self.name, columns.join(", "))
    }

    pub fn create_indexes_sql(&self) -> Vec<String> {
        let unique = self.unique.iter().map(|group| {
            format!(
                "CREATE UNIQUE INDEX {} ON {} ({})",
                self.index_name(group),
                self.name,
                group.join(", ")
            )
        });
        let non_unique = self.non_unique.iter().map(|group| {
            format!(
                "CREATE INDEX {} ON {} ({})",
                self.index_name(group),
                self.name,
                group.join(", ")
            )
        });
        unique.chain(non_unique).collect()
    }

    pub fn insert_sql(&self) -> String {
        let placeholders: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("?{}", c.ordinal))
            .collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.name,
            self.column_list(),
            placeholders.join(", ")
        )
    }

    pub fn select_sql(&self) -> String {
        format!("SELECT {} FROM {}", self.column_list(), self.name)
    }

    /// An empty row for this table, every value NULL.
    pub fn row(&self) -> Row<'_> {
        Row {
            table: self,
            values: vec![Value::Null; self.columns.len()],
        }
    }

    /// Checks every value of `row` against its column's nullability and type.
    ///
    /// `label` identifies the row in the error, usually its mRID.
    pub fn check_row(&self, row: &Row<'_>, label: &str) -> Result<(), WriteError> {
        for (column, value) in self.columns.iter().zip(&row.values) {
            let reason = if matches!(value, Value::Null) && !column.nullable.allows_null() {
                "null value in NOT NULL column".to_string()
            } else if !column.column_type.accepts(value) {
                format!(
                    "{} value in {} column",
                    value.data_type(),
                    column.column_type.sql_name()
                )
            } else {
                continue;
            };
            return Err(WriteError::InvalidValue {
                table: self.name.clone(),
                row: label.to_string(),
                column: column.name.clone(),
                reason,
            });
        }
        Ok(())
    }

    fn column_list(&self) -> String {
        let names: Vec<&str> = self.columns.iter().map(|c| c.name.as_str()).collect();
        names.join(", ")
    }

    fn index_name(&self, group: &[String]) -> String {
        format!("{}_{}", self.name, group.join("_"))
    }

    fn position(&self, column: &str) -> Result<usize, ConfigurationError> {
        self.columns
            .iter()
            .position(|c| c.name == column)
            .ok_or_else(|| ConfigurationError::UnknownColumn {
                table: self.name.clone(),
                column: column.to_string(),
            })
    }
}

/// Values for one row of a table, bound by column name.
#[derive(Debug, Clone, PartialEq)]
pub struct Row<'t> {
    table: &'t TableDef,
    values: Vec<Value>,
}

impl<'t> Row<'t> {
    /// Reads a row selected with [`TableDef::select_sql`].
    pub(crate) fn from_sql(table: &'t TableDef, row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        let values = (0..table.columns.len())
            .map(|i| row.get::<_, Value>(i))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Self { table, values })
    }

    /// Sets the value of `column`. NaN reals are stored as NULL.
    pub fn set(
        &mut self,
        column: &str,
        value: impl Into<Value>,
    ) -> Result<&mut Self, ConfigurationError> {
        let index = self.table.position(column)?;
        self.values[index] = match value.into() {
            Value::Real(r) if r.is_nan() => Value::Null,
            other => other,
        };
        Ok(self)
    }

    pub fn get(&self, column: &str) -> Result<&Value, ConfigurationError> {
        let index = self.table.position(column)?;
        Ok(&self.values[index])
    }

    pub fn table(&self) -> &'t TableDef {
        self.table
    }

    /// Values in ordinal order, ready to bind to [`TableDef::insert_sql`].
    pub fn values(&self) -> &[Value] {
        &self.values
    }
}
