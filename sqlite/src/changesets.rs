//! The schema history, one change set per version.
//!
//! Change sets are frozen once released. They are written as literal SQL
//! rather than generated from the live table definitions, so later edits to
//! a table never rewrite history. Applying every change set to an empty
//! database must produce exactly the schema [`DatabaseWriter`] creates.
//!
//! [`DatabaseWriter`]: crate::DatabaseWriter

use crate::migration::ChangeSet;

/// Schema version written by [`DatabaseWriter`](crate::DatabaseWriter) and
/// reached by a full upgrade.
pub const CURRENT_VERSION: u32 = 7;

const IDENTIFIED_OBJECT: &str =
    "mrid TEXT NOT NULL, name TEXT NOT NULL, description TEXT NOT NULL, num_diagram_objects INTEGER NOT NULL";

const POWER_SYSTEM_RESOURCE: &str = "location_mrid TEXT NULL, num_controls INTEGER NOT NULL";

const CONDUCTING_EQUIPMENT: &str = "normally_in_service BOOLEAN, in_service BOOLEAN, \
     commissioned_date TEXT NULL, base_voltage_mrid TEXT NULL";

/// Every released change set, in version order.
pub fn all() -> Vec<ChangeSet> {
    vec![
        change_set_1(),
        change_set_2(),
        change_set_3(),
        change_set_4(),
        change_set_5(),
        change_set_6(),
        change_set_7(),
    ]
}

fn identified_table(table: &str, extra: &str) -> String {
    if extra.is_empty() {
        format!("CREATE TABLE {table} ({IDENTIFIED_OBJECT})")
    } else {
        format!("CREATE TABLE {table} ({IDENTIFIED_OBJECT}, {extra})")
    }
}

fn conducting_equipment_table(table: &str, extra: &str) -> String {
    identified_table(
        table,
        &format!("{POWER_SYSTEM_RESOURCE}, {CONDUCTING_EQUIPMENT}, {extra}"),
    )
}

fn mrid_indexes(table: &str) -> [String; 2] {
    [
        format!("CREATE UNIQUE INDEX {table}_mrid ON {table} (mrid)"),
        format!("CREATE INDEX {table}_name ON {table} (name)"),
    ]
}

fn association_table(table: &str, first: &str, second: &str) -> Vec<String> {
    vec![
        format!("CREATE TABLE {table} ({first} TEXT NOT NULL, {second} TEXT NOT NULL)"),
        format!("CREATE UNIQUE INDEX {table}_{first}_{second} ON {table} ({first}, {second})"),
        format!("CREATE INDEX {table}_{first} ON {table} ({first})"),
        format!("CREATE INDEX {table}_{second} ON {table} ({second})"),
    ]
}

fn with_mrid_indexes(create: String, table: &str) -> Vec<String> {
    let mut statements = vec![create];
    statements.extend(mrid_indexes(table));
    statements
}

fn change_set_1() -> ChangeSet {
    ChangeSet::new(1)
        .change(
            "create metadata_data_sources",
            [
                "CREATE TABLE metadata_data_sources (source TEXT NOT NULL, version TEXT NOT NULL, timestamp TEXT NOT NULL)".to_string(),
                "CREATE UNIQUE INDEX metadata_data_sources_source ON metadata_data_sources (source)".to_string(),
            ],
        )
        .change(
            "create organisations",
            with_mrid_indexes(identified_table("organisations", ""), "organisations"),
        )
        .change(
            "create locations",
            with_mrid_indexes(identified_table("locations", ""), "locations"),
        )
        .change(
            "create position_points",
            [
                "CREATE TABLE position_points (location_mrid TEXT NOT NULL, sequence_number INTEGER NOT NULL, \
                 x_position NUMBER NULL, y_position NUMBER NULL)"
                    .to_string(),
                "CREATE INDEX position_points_location_mrid ON position_points (location_mrid)".to_string(),
            ],
        )
        .change(
            "create base_voltages",
            with_mrid_indexes(
                identified_table("base_voltages", "nominal_voltage INTEGER NOT NULL"),
                "base_voltages",
            ),
        )
        .change(
            "create connectivity_nodes",
            with_mrid_indexes(identified_table("connectivity_nodes", ""), "connectivity_nodes"),
        )
        .change(
            "create breakers",
            with_mrid_indexes(
                conducting_equipment_table(
                    "breakers",
                    "normal_open INTEGER NOT NULL, open INTEGER NOT NULL",
                ),
                "breakers",
            ),
        )
        .change(
            "create ac_line_segments",
            with_mrid_indexes(
                conducting_equipment_table("ac_line_segments", "length NUMBER NULL"),
                "ac_line_segments",
            ),
        )
        .change(
            "create power_transformers",
            with_mrid_indexes(
                conducting_equipment_table("power_transformers", "vector_group TEXT NOT NULL"),
                "power_transformers",
            ),
        )
        .change("create terminals", {
            let mut statements = with_mrid_indexes(
                identified_table(
                    "terminals",
                    "conducting_equipment_mrid TEXT NULL, sequence_number INTEGER NOT NULL, \
                     connectivity_node_mrid TEXT NULL, phases TEXT NOT NULL",
                ),
                "terminals",
            );
            statements.push(
                "CREATE INDEX terminals_conducting_equipment_mrid ON terminals (conducting_equipment_mrid)".to_string(),
            );
            statements.push(
                "CREATE INDEX terminals_connectivity_node_mrid ON terminals (connectivity_node_mrid)".to_string(),
            );
            statements
        })
        .change(
            "create remote_sources",
            with_mrid_indexes(
                identified_table("remote_sources", "measurement_mrid TEXT NULL"),
                "remote_sources",
            ),
        )
}

fn change_set_2() -> ChangeSet {
    ChangeSet::new(2)
        .change(
            "create asset_owners",
            with_mrid_indexes(
                identified_table("asset_owners", "organisation_mrid TEXT NULL"),
                "asset_owners",
            ),
        )
        .change(
            "create asset_organisation_roles_assets",
            association_table(
                "asset_organisation_roles_assets",
                "asset_organisation_role_mrid",
                "asset_mrid",
            ),
        )
}

fn change_set_3() -> ChangeSet {
    ChangeSet::new(3)
        .change(
            "create usage_points",
            with_mrid_indexes(
                identified_table(
                    "usage_points",
                    "location_mrid TEXT NULL, is_virtual BOOLEAN NULL, connection_category TEXT NULL",
                ),
                "usage_points",
            ),
        )
        .change(
            "create equipment_usage_points",
            association_table("equipment_usage_points", "equipment_mrid", "usage_point_mrid"),
        )
        .change(
            "create meters",
            with_mrid_indexes(
                identified_table(
                    "meters",
                    "location_mrid TEXT NULL, customer_mrid TEXT NULL, service_location_mrid TEXT NULL",
                ),
                "meters",
            ),
        )
}

fn change_set_4() -> ChangeSet {
    ChangeSet::new(4)
        .change(
            "add breaker ratings",
            [
                "ALTER TABLE breakers ADD COLUMN breaking_capacity INTEGER NULL",
                "ALTER TABLE breakers ADD COLUMN rated_current INTEGER NULL",
            ],
        )
        .change(
            "add transformer utilisation",
            ["ALTER TABLE power_transformers ADD COLUMN transformer_utilisation NUMBER NULL"],
        )
}

fn change_set_5() -> ChangeSet {
    ChangeSet::new(5)
        .change(
            "create feeders",
            with_mrid_indexes(
                identified_table(
                    "feeders",
                    &format!("{POWER_SYSTEM_RESOURCE}, normal_head_terminal_mrid TEXT NULL"),
                ),
                "feeders",
            ),
        )
        .change(
            "create equipment_equipment_containers",
            association_table(
                "equipment_equipment_containers",
                "equipment_mrid",
                "equipment_container_mrid",
            ),
        )
}

fn change_set_6() -> ChangeSet {
    ChangeSet::new(6)
        .change(
            "create customers",
            with_mrid_indexes(
                identified_table(
                    "customers",
                    "organisation_mrid TEXT NULL, kind TEXT NOT NULL, num_end_devices INTEGER NOT NULL",
                ),
                "customers",
            ),
        )
        .change(
            "create customer_agreements",
            with_mrid_indexes(
                identified_table(
                    "customer_agreements",
                    "title TEXT NOT NULL, created_date_time TEXT NULL, author_name TEXT NOT NULL, \
                     type TEXT NOT NULL, status TEXT NOT NULL, comment TEXT NOT NULL, customer_mrid TEXT NULL",
                ),
                "customer_agreements",
            ),
        )
        .change(
            "create analogs",
            with_mrid_indexes(
                identified_table(
                    "analogs",
                    "power_system_resource_mrid TEXT NULL, terminal_mrid TEXT NULL, phases TEXT NOT NULL, \
                     unit_symbol TEXT NOT NULL, positive_flow_in BOOLEAN",
                ),
                "analogs",
            ),
        )
        // Coordinates become required and each point's sequence unique. SQLite
        // cannot alter a column constraint, so the table is rebuilt. Rows with
        // missing coordinates are dropped and duplicate sequence numbers keep
        // the first row.
        .change(
            "rebuild position_points",
            [
                "CREATE TABLE position_points_new (location_mrid TEXT NOT NULL, sequence_number INTEGER NOT NULL, \
                 x_position NUMBER NOT NULL, y_position NUMBER NOT NULL)",
                "CREATE UNIQUE INDEX position_points_location_mrid_sequence_number \
                 ON position_points_new (location_mrid, sequence_number)",
                "INSERT OR IGNORE INTO position_points_new (location_mrid, sequence_number, x_position, y_position) \
                 SELECT location_mrid, sequence_number, x_position, y_position FROM position_points \
                 WHERE x_position IS NOT NULL AND y_position IS NOT NULL \
                 ORDER BY location_mrid, sequence_number, rowid",
                "DROP TABLE position_points",
                "ALTER TABLE position_points_new RENAME TO position_points",
                "CREATE INDEX position_points_location_mrid ON position_points (location_mrid)",
            ],
        )
}

fn change_set_7() -> ChangeSet {
    ChangeSet::new(7).change(
        "drop remote_sources",
        [
            "DROP INDEX IF EXISTS remote_sources_mrid",
            "DROP INDEX IF EXISTS remote_sources_name",
            "DROP TABLE IF EXISTS remote_sources",
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_ends_at_current_version() {
        let versions: Vec<_> = all().iter().map(|cs| cs.version).collect();
        assert_eq!(versions, (1..=CURRENT_VERSION).collect::<Vec<_>>());
    }

    #[test]
    fn test_every_change_set_has_statements() {
        for cs in all() {
            assert!(!cs.changes.is_empty(), "change set {} is empty", cs.version);
            for change in &cs.changes {
                assert!(
                    !change.statements.is_empty(),
                    "change '{}' in {} is empty",
                    change.description,
                    cs.version
                );
            }
        }
    }

    #[test]
    fn test_conducting_equipment_table_sql() {
        assert_eq!(
            conducting_equipment_table("ac_line_segments", "length NUMBER NULL"),
            "CREATE TABLE ac_line_segments (mrid TEXT NOT NULL, name TEXT NOT NULL, \
             description TEXT NOT NULL, num_diagram_objects INTEGER NOT NULL, \
             location_mrid TEXT NULL, num_controls INTEGER NOT NULL, \
             normally_in_service BOOLEAN, in_service BOOLEAN, commissioned_date TEXT NULL, \
             base_voltage_mrid TEXT NULL, length NUMBER NULL)"
        );
    }
}
