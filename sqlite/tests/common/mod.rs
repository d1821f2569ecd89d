//! Shared fixtures for the sqlite integration tests.

#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use cim_store_core::*;
use rusqlite::Connection;

/// A small network holding at least one object of every kind, with every
/// association populated.
pub fn sample_network() -> (MetadataCollection, NetworkService) {
    let mut metadata = MetadataCollection::new();
    metadata
        .add(DataSource::new(
            "network-export",
            "1.4.0",
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap(),
        ))
        .unwrap();
    metadata
        .add(DataSource::new(
            "customer-export",
            "2.0.1",
            Utc.with_ymd_and_hms(2024, 3, 2, 8, 0, 0).unwrap(),
        ))
        .unwrap();

    let mut service = NetworkService::new();

    service.add(Organisation::new("org1")).unwrap();

    let mut location = Location::new("loc1");
    location.base.name = "Zone substation".into();
    location.points = vec![
        PositionPoint::new(149.125, -35.25),
        PositionPoint::new(149.0, -35.0),
        PositionPoint::new(150.5, -34.75),
    ];
    service.add(location).unwrap();

    service.add(BaseVoltage::new("bv11", 11000)).unwrap();
    service.add(ConnectivityNode::new("cn1")).unwrap();

    let mut breaker = Breaker::new("b1");
    breaker.base.name = "Feeder breaker".into();
    breaker.base.description = "CB 1".into();
    breaker.base.num_diagram_objects = 2;
    breaker.equipment.location = Some("loc1".into());
    breaker.equipment.base_voltage = Some("bv11".into());
    breaker.equipment.num_controls = 1;
    breaker.equipment.in_service = false;
    breaker.equipment.commissioned_date = Some(Utc.with_ymd_and_hms(2019, 7, 15, 0, 0, 0).unwrap());
    breaker.normal_open = 0;
    breaker.open = 1;
    breaker.rated_current = Some(630);
    service.add(breaker).unwrap();

    let mut line = AcLineSegment::new("l1");
    line.equipment.base_voltage = Some("bv11".into());
    line.length = Some(1250.5);
    service.add(line).unwrap();

    let mut transformer = PowerTransformer::new("tx1");
    transformer.vector_group = VectorGroup::Dyn11;
    transformer.transformer_utilisation = Some(0.75);
    service.add(transformer).unwrap();

    let mut t1 = Terminal::new("t1", 1);
    t1.conducting_equipment = Some("b1".into());
    t1.connectivity_node = Some("cn1".into());
    service.add(t1).unwrap();

    let mut t2 = Terminal::new("t2", 1);
    t2.conducting_equipment = Some("l1".into());
    t2.connectivity_node = Some("cn1".into());
    t2.phases = PhaseCode::AB;
    service.add(t2).unwrap();

    let mut feeder = Feeder::new("f1");
    feeder.location = Some("loc1".into());
    feeder.normal_head_terminal = Some("t1".into());
    service.add(feeder).unwrap();
    service.assign_to_container("b1", "f1").unwrap();
    service.assign_to_container("l1", "f1").unwrap();

    let mut usage_point = UsagePoint::new("up1");
    usage_point.location = Some("loc1".into());
    usage_point.is_virtual = Some(false);
    usage_point.equipment.push("tx1".into());
    service.add(usage_point).unwrap();

    let mut owner = AssetOwner::new("ao1");
    owner.organisation = Some("org1".into());
    owner.assets = vec!["b1".into(), "tx1".into()];
    service.add(owner).unwrap();

    let mut customer = Customer::new("c1");
    customer.organisation = Some("org1".into());
    customer.kind = CustomerKind::Residential;
    customer.num_end_devices = 3;
    service.add(customer).unwrap();

    let mut agreement = CustomerAgreement::new("ca1");
    agreement.title = "Supply agreement".into();
    agreement.created_date_time = Some(Utc.with_ymd_and_hms(2020, 1, 31, 9, 15, 0).unwrap());
    agreement.customer = Some("c1".into());
    service.add(agreement).unwrap();

    let mut meter = Meter::new("m1");
    meter.location = Some("loc1".into());
    meter.customer = Some("c1".into());
    meter.service_location = Some("loc1".into());
    service.add(meter).unwrap();

    let mut analog = Analog::new("a1");
    analog.power_system_resource = Some("b1".into());
    analog.terminal = Some("t1".into());
    analog.phases = PhaseCode::ABC;
    analog.unit_symbol = UnitSymbol::A;
    analog.positive_flow_in = Some(true);
    service.add(analog).unwrap();

    (metadata, service)
}

/// One column as SQLite reports it: name, declared type, NOT NULL.
pub type ColumnShape = (String, String, bool);

/// One index: name, unique, columns in order.
pub type IndexShape = (String, bool, Vec<String>);

/// The shape of one table: sorted columns and sorted indexes.
#[derive(Debug, PartialEq, Eq)]
pub struct TableShape {
    pub name: String,
    pub columns: Vec<ColumnShape>,
    pub indexes: Vec<IndexShape>,
}

pub fn table_names(conn: &Connection) -> Vec<String> {
    let mut stmt = conn
        .prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .unwrap();
    stmt.query_map([], |row| row.get(0))
        .unwrap()
        .collect::<rusqlite::Result<Vec<String>>>()
        .unwrap()
}

/// Describes every table of `conn`, independent of column order and of how
/// the SQL that created it was written.
pub fn schema_of(conn: &Connection) -> Vec<TableShape> {
    table_names(conn)
        .into_iter()
        .map(|name| {
            let mut columns: Vec<ColumnShape> = conn
                .prepare("SELECT name, type, \"notnull\" FROM pragma_table_info(?1)")
                .unwrap()
                .query_map([&name], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
                .unwrap()
                .collect::<rusqlite::Result<_>>()
                .unwrap();
            columns.sort();

            let index_list: Vec<(String, bool)> = conn
                .prepare("SELECT name, \"unique\" FROM pragma_index_list(?1)")
                .unwrap()
                .query_map([&name], |row| Ok((row.get(0)?, row.get(1)?)))
                .unwrap()
                .collect::<rusqlite::Result<_>>()
                .unwrap();

            let mut indexes: Vec<IndexShape> = index_list
                .into_iter()
                .map(|(index, unique)| {
                    let columns = conn
                        .prepare("SELECT name FROM pragma_index_info(?1) ORDER BY seqno")
                        .unwrap()
                        .query_map([&index], |row| row.get(0))
                        .unwrap()
                        .collect::<rusqlite::Result<Vec<String>>>()
                        .unwrap();
                    (index, unique, columns)
                })
                .collect();
            indexes.sort();

            TableShape {
                name,
                columns,
                indexes,
            }
        })
        .collect()
}

pub fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
        .unwrap()
}

pub fn execute_all(conn: &Connection, statements: &[&str]) {
    for statement in statements {
        conn.execute_batch(statement)
            .unwrap_or_else(|e| panic!("{statement}: {e}"));
    }
}
