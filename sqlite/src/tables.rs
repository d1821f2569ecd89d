//! The table definitions of a current-version database.
//!
//! [`DatabaseTables`] lists every table in dependency order: leaf tables
//! before the tables that reference them, and association tables after both
//! of their sides. Writers create and fill tables in this order and readers
//! load them in it.

use crate::error::ConfigurationError;
use crate::schema::{
    ColumnSpec, ColumnType, Nullable, TableBuilder, TableDef, association_columns,
    asset_organisation_role_columns, conducting_equipment_columns, document_columns,
    identified_object_columns, power_system_resource_columns,
};

/// Every table of the current schema, in dependency order.
#[derive(Debug, Clone)]
pub struct DatabaseTables {
    tables: Vec<TableDef>,
}

impl DatabaseTables {
    pub fn new() -> Result<Self, ConfigurationError> {
        let tables = vec![
            version()?,
            metadata_data_sources()?,
            organisations()?,
            locations()?,
            position_points()?,
            base_voltages()?,
            connectivity_nodes()?,
            breakers()?,
            ac_line_segments()?,
            power_transformers()?,
            terminals()?,
            feeders()?,
            association(
                "equipment_equipment_containers",
                "equipment_mrid",
                "equipment_container_mrid",
            )?,
            usage_points()?,
            association("equipment_usage_points", "equipment_mrid", "usage_point_mrid")?,
            asset_owners()?,
            association(
                "asset_organisation_roles_assets",
                "asset_organisation_role_mrid",
                "asset_mrid",
            )?,
            customers()?,
            customer_agreements()?,
            meters()?,
            analogs()?,
        ];
        Ok(Self { tables })
    }

    /// Looks up a table by name.
    pub fn get(&self, name: &str) -> Result<&TableDef, ConfigurationError> {
        self.tables
            .iter()
            .find(|t| t.name() == name)
            .ok_or_else(|| ConfigurationError::MissingTable(name.to_string()))
    }

    /// Tables in dependency order.
    pub fn iter(&self) -> impl Iterator<Item = &TableDef> {
        self.tables.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(TableDef::name)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

fn version() -> Result<TableDef, ConfigurationError> {
    TableBuilder::new("version")
        .column(ColumnSpec::integer("version", Nullable::NotNull))
        .build()
}

fn metadata_data_sources() -> Result<TableDef, ConfigurationError> {
    TableBuilder::new("metadata_data_sources")
        .column(ColumnSpec::text("source", Nullable::NotNull))
        .column(ColumnSpec::text("version", Nullable::NotNull))
        .column(ColumnSpec::text("timestamp", Nullable::NotNull))
        .unique_index(&["source"])
        .build()
}

fn organisations() -> Result<TableDef, ConfigurationError> {
    TableBuilder::new("organisations")
        .columns(identified_object_columns())
        .mrid_indexes()
        .build()
}

fn locations() -> Result<TableDef, ConfigurationError> {
    TableBuilder::new("locations")
        .columns(identified_object_columns())
        .mrid_indexes()
        .build()
}

fn position_points() -> Result<TableDef, ConfigurationError> {
    TableBuilder::new("position_points")
        .column(ColumnSpec::text("location_mrid", Nullable::NotNull))
        .column(ColumnSpec::integer("sequence_number", Nullable::NotNull))
        .column(ColumnSpec::number("x_position", Nullable::NotNull))
        .column(ColumnSpec::number("y_position", Nullable::NotNull))
        .unique_index(&["location_mrid", "sequence_number"])
        .non_unique_index(&["location_mrid"])
        .build()
}

fn base_voltages() -> Result<TableDef, ConfigurationError> {
    TableBuilder::new("base_voltages")
        .columns(identified_object_columns())
        .column(ColumnSpec::integer("nominal_voltage", Nullable::NotNull))
        .mrid_indexes()
        .build()
}

fn connectivity_nodes() -> Result<TableDef, ConfigurationError> {
    TableBuilder::new("connectivity_nodes")
        .columns(identified_object_columns())
        .mrid_indexes()
        .build()
}

fn breakers() -> Result<TableDef, ConfigurationError> {
    TableBuilder::new("breakers")
        .columns(conducting_equipment_columns())
        .column(ColumnSpec::integer("normal_open", Nullable::NotNull))
        .column(ColumnSpec::integer("open", Nullable::NotNull))
        .column(ColumnSpec::integer("breaking_capacity", Nullable::Null))
        .column(ColumnSpec::integer("rated_current", Nullable::Null))
        .mrid_indexes()
        .build()
}

fn ac_line_segments() -> Result<TableDef, ConfigurationError> {
    TableBuilder::new("ac_line_segments")
        .columns(conducting_equipment_columns())
        .column(ColumnSpec::number("length", Nullable::Null))
        .mrid_indexes()
        .build()
}

fn power_transformers() -> Result<TableDef, ConfigurationError> {
    TableBuilder::new("power_transformers")
        .columns(conducting_equipment_columns())
        .column(ColumnSpec::text("vector_group", Nullable::NotNull))
        .column(ColumnSpec::number("transformer_utilisation", Nullable::Null))
        .mrid_indexes()
        .build()
}

fn terminals() -> Result<TableDef, ConfigurationError> {
    TableBuilder::new("terminals")
        .columns(identified_object_columns())
        .column(ColumnSpec::text("conducting_equipment_mrid", Nullable::Null))
        .column(ColumnSpec::integer("sequence_number", Nullable::NotNull))
        .column(ColumnSpec::text("connectivity_node_mrid", Nullable::Null))
        .column(ColumnSpec::text("phases", Nullable::NotNull))
        .mrid_indexes()
        .non_unique_index(&["conducting_equipment_mrid"])
        .non_unique_index(&["connectivity_node_mrid"])
        .build()
}

fn feeders() -> Result<TableDef, ConfigurationError> {
    TableBuilder::new("feeders")
        .columns(power_system_resource_columns())
        .column(ColumnSpec::text("normal_head_terminal_mrid", Nullable::Null))
        .mrid_indexes()
        .build()
}

fn usage_points() -> Result<TableDef, ConfigurationError> {
    TableBuilder::new("usage_points")
        .columns(identified_object_columns())
        .column(ColumnSpec::text("location_mrid", Nullable::Null))
        .column(ColumnSpec::new("is_virtual", ColumnType::Boolean, Nullable::Null))
        .column(ColumnSpec::text("connection_category", Nullable::Null))
        .mrid_indexes()
        .build()
}

fn asset_owners() -> Result<TableDef, ConfigurationError> {
    TableBuilder::new("asset_owners")
        .columns(asset_organisation_role_columns())
        .mrid_indexes()
        .build()
}

fn customers() -> Result<TableDef, ConfigurationError> {
    TableBuilder::new("customers")
        .columns(asset_organisation_role_columns())
        .column(ColumnSpec::text("kind", Nullable::NotNull))
        .column(ColumnSpec::integer("num_end_devices", Nullable::NotNull))
        .mrid_indexes()
        .build()
}

fn customer_agreements() -> Result<TableDef, ConfigurationError> {
    TableBuilder::new("customer_agreements")
        .columns(document_columns())
        .column(ColumnSpec::text("customer_mrid", Nullable::Null))
        .mrid_indexes()
        .build()
}

fn meters() -> Result<TableDef, ConfigurationError> {
    TableBuilder::new("meters")
        .columns(identified_object_columns())
        .column(ColumnSpec::text("location_mrid", Nullable::Null))
        .column(ColumnSpec::text("customer_mrid", Nullable::Null))
        .column(ColumnSpec::text("service_location_mrid", Nullable::Null))
        .mrid_indexes()
        .build()
}

fn analogs() -> Result<TableDef, ConfigurationError> {
    TableBuilder::new("analogs")
        .columns(identified_object_columns())
        .column(ColumnSpec::text("power_system_resource_mrid", Nullable::Null))
        .column(ColumnSpec::text("terminal_mrid", Nullable::Null))
        .column(ColumnSpec::text("phases", Nullable::NotNull))
        .column(ColumnSpec::text("unit_symbol", Nullable::NotNull))
        .column(ColumnSpec::boolean("positive_flow_in"))
        .mrid_indexes()
        .build()
}

fn association(name: &str, first: &str, second: &str) -> Result<TableDef, ConfigurationError> {
    TableBuilder::new(name)
        .columns(association_columns(first, second))
        .association_indexes(first, second)
        .build()
}
