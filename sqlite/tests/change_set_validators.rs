//! Per-version checks of the upgrade history.
//!
//! Each validator stages data before its change set runs, populates rows the
//! new schema allows, then checks what the change set did to both. Every
//! database is finally upgraded to the current version to show that later
//! change sets cope with the data left behind.

mod common;

use cim_store_sqlite::{CURRENT_VERSION, UpgradeRunner};
use rusqlite::Connection;

use common::{count, execute_all};

trait ChangeSetValidator {
    fn version(&self) -> u32;

    /// Run against the previous version, before the change set.
    fn set_up_statements(&self) -> Vec<&'static str> {
        Vec::new()
    }

    /// Run after the change set.
    fn populate_statements(&self) -> Vec<&'static str> {
        Vec::new()
    }

    fn validate(&self, conn: &Connection);

    fn tear_down_statements(&self) -> Vec<&'static str> {
        Vec::new()
    }
}

fn run_validator(validator: &dyn ChangeSetValidator) {
    let runner = UpgradeRunner::default();
    let version = validator.version();
    let mut conn = Connection::open_in_memory().unwrap();

    if version > 1 {
        runner.upgrade_to(&mut conn, version - 1).unwrap();
    }
    execute_all(&conn, &validator.set_up_statements());

    let report = runner.upgrade_to(&mut conn, version).unwrap();
    assert_eq!(report.applied, [version]);

    execute_all(&conn, &validator.populate_statements());
    validator.validate(&conn);
    execute_all(&conn, &validator.tear_down_statements());

    let report = runner.run(&mut conn).unwrap();
    assert_eq!(report.to, CURRENT_VERSION);
}

fn index_names(conn: &Connection, table: &str) -> Vec<String> {
    let mut stmt = conn
        .prepare("SELECT name FROM pragma_index_list(?1) ORDER BY name")
        .unwrap();
    stmt.query_map([table], |row| row.get(0))
        .unwrap()
        .collect::<rusqlite::Result<Vec<String>>>()
        .unwrap()
}

fn table_exists(conn: &Connection, table: &str) -> bool {
    conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
        [table],
        |row| row.get(0),
    )
    .unwrap()
}

// =============================================================================
// Validators
// =============================================================================

struct InitialNetwork;

impl ChangeSetValidator for InitialNetwork {
    fn version(&self) -> u32 {
        1
    }

    fn populate_statements(&self) -> Vec<&'static str> {
        vec![
            "INSERT INTO metadata_data_sources VALUES ('scada', '1.0', '2020-01-01T00:00:00Z')",
            "INSERT INTO base_voltages VALUES ('bv1', '', '', 0, 11000)",
            "INSERT INTO breakers VALUES ('b1', '', '', 0, NULL, 0, 1, 1, NULL, 'bv1', 0, 0)",
            "INSERT INTO terminals VALUES ('t1', '', '', 0, 'b1', 1, NULL, 'ABC')",
            "INSERT INTO position_points VALUES ('loc1', 0, NULL, NULL)",
        ]
    }

    fn validate(&self, conn: &Connection) {
        assert_eq!(count(conn, "breakers"), 1);
        assert_eq!(count(conn, "position_points"), 1);
        assert!(table_exists(conn, "remote_sources"));
        assert_eq!(
            index_names(conn, "terminals"),
            [
                "terminals_conducting_equipment_mrid",
                "terminals_connectivity_node_mrid",
                "terminals_mrid",
                "terminals_name",
            ]
        );
        // Data source names are unique.
        assert!(conn
            .execute_batch("INSERT INTO metadata_data_sources VALUES ('scada', '2.0', '2021-01-01T00:00:00Z')")
            .is_err());
    }
}

struct AssetOwners;

impl ChangeSetValidator for AssetOwners {
    fn version(&self) -> u32 {
        2
    }

    fn populate_statements(&self) -> Vec<&'static str> {
        vec![
            "INSERT INTO asset_owners VALUES ('ao1', '', '', 0, 'org1')",
            "INSERT INTO asset_organisation_roles_assets VALUES ('ao1', 'b1')",
        ]
    }

    fn validate(&self, conn: &Connection) {
        assert_eq!(count(conn, "asset_owners"), 1);
        assert!(conn
            .execute_batch("INSERT INTO asset_organisation_roles_assets VALUES ('ao1', 'b1')")
            .is_err());
        assert!(conn
            .execute_batch("INSERT INTO asset_owners VALUES ('ao1', 'dupe', '', 0, NULL)")
            .is_err());
    }
}

struct UsagePointsAndMeters;

impl ChangeSetValidator for UsagePointsAndMeters {
    fn version(&self) -> u32 {
        3
    }

    fn populate_statements(&self) -> Vec<&'static str> {
        vec![
            "INSERT INTO usage_points VALUES ('up1', '', '', 0, NULL, NULL, NULL)",
            "INSERT INTO equipment_usage_points VALUES ('tx1', 'up1')",
            "INSERT INTO meters VALUES ('m1', '', '', 0, NULL, 'c1', NULL)",
        ]
    }

    fn validate(&self, conn: &Connection) {
        assert_eq!(count(conn, "usage_points"), 1);
        assert_eq!(count(conn, "equipment_usage_points"), 1);
        let customer: String = conn
            .query_row("SELECT customer_mrid FROM meters WHERE mrid = 'm1'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(customer, "c1");
    }
}

struct EquipmentRatings;

impl ChangeSetValidator for EquipmentRatings {
    fn version(&self) -> u32 {
        4
    }

    fn set_up_statements(&self) -> Vec<&'static str> {
        vec![
            "INSERT INTO breakers VALUES ('b10', '', '', 0, NULL, 0, 1, 1, NULL, NULL, 0, 0)",
            "INSERT INTO power_transformers VALUES ('tx10', '', '', 0, NULL, 0, 1, 1, NULL, NULL, 'DYN11')",
        ]
    }

    fn populate_statements(&self) -> Vec<&'static str> {
        vec![
            "INSERT INTO breakers VALUES ('b2', '', '', 0, NULL, 0, 1, 1, NULL, NULL, 0, 0, 25000, 630)",
        ]
    }

    fn validate(&self, conn: &Connection) {
        let existing: (Option<i64>, Option<i64>) = conn
            .query_row(
                "SELECT breaking_capacity, rated_current FROM breakers WHERE mrid = 'b10'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(existing, (None, None));

        let rated: i64 = conn
            .query_row("SELECT rated_current FROM breakers WHERE mrid = 'b2'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(rated, 630);

        let utilisation: Option<f64> = conn
            .query_row(
                "SELECT transformer_utilisation FROM power_transformers WHERE mrid = 'tx10'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(utilisation, None);
    }
}

struct FeedersAndContainment;

impl ChangeSetValidator for FeedersAndContainment {
    fn version(&self) -> u32 {
        5
    }

    fn populate_statements(&self) -> Vec<&'static str> {
        vec![
            "INSERT INTO feeders VALUES ('f1', '', '', 0, NULL, 0, 't1')",
            "INSERT INTO equipment_equipment_containers VALUES ('b1', 'f1')",
            "INSERT INTO equipment_equipment_containers VALUES ('b2', 'f1')",
        ]
    }

    fn validate(&self, conn: &Connection) {
        assert_eq!(count(conn, "feeders"), 1);
        assert_eq!(count(conn, "equipment_equipment_containers"), 2);
        assert_eq!(
            index_names(conn, "equipment_equipment_containers"),
            [
                "equipment_equipment_containers_equipment_container_mrid",
                "equipment_equipment_containers_equipment_mrid",
                "equipment_equipment_containers_equipment_mrid_equipment_container_mrid",
            ]
        );
    }
}

struct PositionPointRebuild;

impl ChangeSetValidator for PositionPointRebuild {
    fn version(&self) -> u32 {
        6
    }

    fn set_up_statements(&self) -> Vec<&'static str> {
        vec![
            "INSERT INTO position_points VALUES ('loc1', 0, 1.5, 2.5)",
            "INSERT INTO position_points VALUES ('loc1', 1, NULL, 3.0)",
            "INSERT INTO position_points VALUES ('loc1', 0, 9.0, 9.0)",
            "INSERT INTO position_points VALUES ('loc1', 2, 4.0, NULL)",
            "INSERT INTO position_points VALUES ('loc2', 0, 7.0, 8.0)",
        ]
    }

    fn populate_statements(&self) -> Vec<&'static str> {
        vec![
            "INSERT INTO customers VALUES ('c1', '', '', 0, NULL, 'residential', 2)",
            "INSERT INTO customer_agreements VALUES ('ca1', '', '', 0, 'Supply', NULL, '', '', '', '', 'c1')",
            "INSERT INTO analogs VALUES ('a1', '', '', 0, NULL, NULL, 'ABC', 'A', NULL)",
        ]
    }

    fn validate(&self, conn: &Connection) {
        // Rows missing a coordinate are gone and the first of two duplicate
        // sequence numbers wins.
        let mut stmt = conn
            .prepare(
                "SELECT location_mrid, sequence_number, x_position, y_position FROM position_points \
                 ORDER BY location_mrid, sequence_number",
            )
            .unwrap();
        let points: Vec<(String, i64, f64, f64)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap();
        assert_eq!(
            points,
            [
                ("loc1".to_string(), 0, 1.5, 2.5),
                ("loc2".to_string(), 0, 7.0, 8.0),
            ]
        );

        assert!(conn
            .execute_batch("INSERT INTO position_points VALUES ('loc3', 0, NULL, 1.0)")
            .is_err());
        assert!(conn
            .execute_batch("INSERT INTO position_points VALUES ('loc1', 0, 1.0, 1.0)")
            .is_err());
        assert!(!table_exists(conn, "position_points_new"));
        assert_eq!(
            index_names(conn, "position_points"),
            [
                "position_points_location_mrid",
                "position_points_location_mrid_sequence_number",
            ]
        );

        assert_eq!(count(conn, "customers"), 1);
        assert_eq!(count(conn, "customer_agreements"), 1);
        assert_eq!(count(conn, "analogs"), 1);
    }
}

struct RetireRemoteSources;

impl ChangeSetValidator for RetireRemoteSources {
    fn version(&self) -> u32 {
        7
    }

    fn set_up_statements(&self) -> Vec<&'static str> {
        vec!["INSERT INTO remote_sources VALUES ('rs1', '', '', 0, 'a1')"]
    }

    fn validate(&self, conn: &Connection) {
        assert!(!table_exists(conn, "remote_sources"));
        assert!(index_names(conn, "remote_sources").is_empty());
        let leftover: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE name LIKE 'remote_sources%'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(leftover, 0);
    }
}

// =============================================================================
// Tests
// =============================================================================

fn validators() -> Vec<Box<dyn ChangeSetValidator>> {
    vec![
        Box::new(InitialNetwork),
        Box::new(AssetOwners),
        Box::new(UsagePointsAndMeters),
        Box::new(EquipmentRatings),
        Box::new(FeedersAndContainment),
        Box::new(PositionPointRebuild),
        Box::new(RetireRemoteSources),
    ]
}

#[test]
fn test_every_change_set_has_a_validator() {
    let versions: Vec<u32> = validators().iter().map(|v| v.version()).collect();
    assert_eq!(versions, (1..=CURRENT_VERSION).collect::<Vec<_>>());
}

#[test]
fn test_change_set_1_initial_network() {
    run_validator(&InitialNetwork);
}

#[test]
fn test_change_set_2_asset_owners() {
    run_validator(&AssetOwners);
}

#[test]
fn test_change_set_3_usage_points_and_meters() {
    run_validator(&UsagePointsAndMeters);
}

#[test]
fn test_change_set_4_equipment_ratings() {
    run_validator(&EquipmentRatings);
}

#[test]
fn test_change_set_5_feeders_and_containment() {
    run_validator(&FeedersAndContainment);
}

#[test]
fn test_change_set_6_position_point_rebuild() {
    run_validator(&PositionPointRebuild);
}

#[test]
fn test_change_set_7_retire_remote_sources() {
    run_validator(&RetireRemoteSources);
}

#[test]
fn test_all_validators_in_one_database() {
    let runner = UpgradeRunner::default();
    let mut conn = Connection::open_in_memory().unwrap();
    for validator in validators() {
        let version = validator.version();
        if version > 1 {
            runner.upgrade_to(&mut conn, version - 1).unwrap();
        }
        execute_all(&conn, &validator.set_up_statements());
        runner.upgrade_to(&mut conn, version).unwrap();
        execute_all(&conn, &validator.populate_statements());
        validator.validate(&conn);
        execute_all(&conn, &validator.tear_down_statements());
    }
    assert_eq!(runner.stored_version(&conn).unwrap(), Some(CURRENT_VERSION));
}
