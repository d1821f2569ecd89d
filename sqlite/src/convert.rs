//! Conversion between CIM entities and table rows.
//!
//! Writing fills a [`Row`] per entity from the entity's attributes, shared
//! attribute blocks first (identified object, equipment) and then its own.
//! Reading reverses this through [`Fields`], which turns NULLs in required
//! columns and unparsable values into [`ReadError`]s naming the row.
//!
//! Associations and child rows (position points, containers, usage point
//! equipment, owned assets) are not part of an entity's row. They have
//! their own tables and are linked by the reader after all entities load.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use cim_store_core::*;
use rusqlite::types::Value;

use crate::error::{ConfigurationError, ReadError, Result};
use crate::schema::{Row, TableDef};

fn opt<T: Into<Value>>(value: Option<T>) -> Value {
    value.map_or(Value::Null, Into::into)
}

fn timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

// ---------------------------------------------------------------------------
// Entity -> row
// ---------------------------------------------------------------------------

fn set_identified(row: &mut Row<'_>, io: &IdentifiedObject) -> std::result::Result<(), ConfigurationError> {
    row.set("mrid", io.mrid().to_string())?
        .set("name", io.name.clone())?
        .set("description", io.description.clone())?
        .set("num_diagram_objects", io.num_diagram_objects)?;
    Ok(())
}

fn set_equipment(row: &mut Row<'_>, eq: &Equipment) -> std::result::Result<(), ConfigurationError> {
    row.set("location_mrid", opt(eq.location.clone()))?
        .set("num_controls", eq.num_controls)?
        .set("normally_in_service", eq.normally_in_service)?
        .set("in_service", eq.in_service)?
        .set("commissioned_date", opt(eq.commissioned_date.as_ref().map(timestamp)))?
        .set("base_voltage_mrid", opt(eq.base_voltage.clone()))?;
    Ok(())
}

pub(crate) fn data_source_row<'t>(table: &'t TableDef, source: &DataSource) -> Result<Row<'t>> {
    let mut row = table.row();
    row.set("source", source.source.clone())?
        .set("version", source.version.clone())?
        .set("timestamp", timestamp(&source.timestamp))?;
    Ok(row)
}

pub(crate) fn version_row(table: &TableDef, version: u32) -> Result<Row<'_>> {
    let mut row = table.row();
    row.set("version", version)?;
    Ok(row)
}

/// Row for a table holding nothing but identified object columns.
pub(crate) fn identified_row<'t>(table: &'t TableDef, io: &IdentifiedObject) -> Result<Row<'t>> {
    let mut row = table.row();
    set_identified(&mut row, io)?;
    Ok(row)
}

pub(crate) fn position_point_row<'t>(
    table: &'t TableDef,
    location: &str,
    sequence_number: usize,
    point: &PositionPoint,
) -> Result<Row<'t>> {
    let mut row = table.row();
    row.set("location_mrid", location.to_string())?
        .set("sequence_number", sequence_number as i64)?
        .set("x_position", point.x_position)?
        .set("y_position", point.y_position)?;
    Ok(row)
}

pub(crate) fn association_row<'t>(table: &'t TableDef, first: &str, second: &str) -> Result<Row<'t>> {
    let mut row = table.row();
    let columns = table.columns();
    if columns.len() != 2 {
        return Err(ConfigurationError::UnmappedTable(table.name().to_string()).into());
    }
    row.set(&columns[0].name, first.to_string())?
        .set(&columns[1].name, second.to_string())?;
    Ok(row)
}

pub(crate) fn base_voltage_row<'t>(table: &'t TableDef, bv: &BaseVoltage) -> Result<Row<'t>> {
    let mut row = identified_row(table, &bv.base)?;
    row.set("nominal_voltage", bv.nominal_voltage)?;
    Ok(row)
}

pub(crate) fn breaker_row<'t>(table: &'t TableDef, breaker: &Breaker) -> Result<Row<'t>> {
    let mut row = identified_row(table, &breaker.base)?;
    set_equipment(&mut row, &breaker.equipment)?;
    row.set("normal_open", breaker.normal_open)?
        .set("open", breaker.open)?
        .set("breaking_capacity", opt(breaker.breaking_capacity))?
        .set("rated_current", opt(breaker.rated_current))?;
    Ok(row)
}

pub(crate) fn ac_line_segment_row<'t>(table: &'t TableDef, line: &AcLineSegment) -> Result<Row<'t>> {
    let mut row = identified_row(table, &line.base)?;
    set_equipment(&mut row, &line.equipment)?;
    row.set("length", opt(line.length))?;
    Ok(row)
}

pub(crate) fn power_transformer_row<'t>(
    table: &'t TableDef,
    transformer: &PowerTransformer,
) -> Result<Row<'t>> {
    let mut row = identified_row(table, &transformer.base)?;
    set_equipment(&mut row, &transformer.equipment)?;
    row.set("vector_group", transformer.vector_group.as_str().to_string())?
        .set(
            "transformer_utilisation",
            opt(transformer.transformer_utilisation),
        )?;
    Ok(row)
}

pub(crate) fn terminal_row<'t>(table: &'t TableDef, terminal: &Terminal) -> Result<Row<'t>> {
    let mut row = identified_row(table, &terminal.base)?;
    row.set(
        "conducting_equipment_mrid",
        opt(terminal.conducting_equipment.clone()),
    )?
    .set("sequence_number", terminal.sequence_number)?
    .set("connectivity_node_mrid", opt(terminal.connectivity_node.clone()))?
    .set("phases", terminal.phases.as_str().to_string())?;
    Ok(row)
}

pub(crate) fn feeder_row<'t>(table: &'t TableDef, feeder: &Feeder) -> Result<Row<'t>> {
    let mut row = identified_row(table, &feeder.base)?;
    row.set("location_mrid", opt(feeder.location.clone()))?
        .set("num_controls", feeder.num_controls)?
        .set(
            "normal_head_terminal_mrid",
            opt(feeder.normal_head_terminal.clone()),
        )?;
    Ok(row)
}

pub(crate) fn usage_point_row<'t>(table: &'t TableDef, up: &UsagePoint) -> Result<Row<'t>> {
    let mut row = identified_row(table, &up.base)?;
    row.set("location_mrid", opt(up.location.clone()))?
        .set("is_virtual", opt(up.is_virtual))?
        .set("connection_category", opt(up.connection_category.clone()))?;
    Ok(row)
}

pub(crate) fn asset_owner_row<'t>(table: &'t TableDef, owner: &AssetOwner) -> Result<Row<'t>> {
    let mut row = identified_row(table, &owner.base)?;
    row.set("organisation_mrid", opt(owner.organisation.clone()))?;
    Ok(row)
}

pub(crate) fn customer_row<'t>(table: &'t TableDef, customer: &Customer) -> Result<Row<'t>> {
    let mut row = identified_row(table, &customer.base)?;
    row.set("organisation_mrid", opt(customer.organisation.clone()))?
        .set("kind", customer.kind.as_str().to_string())?
        .set("num_end_devices", customer.num_end_devices)?;
    Ok(row)
}

pub(crate) fn customer_agreement_row<'t>(
    table: &'t TableDef,
    agreement: &CustomerAgreement,
) -> Result<Row<'t>> {
    let mut row = identified_row(table, &agreement.base)?;
    row.set("title", agreement.title.clone())?
        .set(
            "created_date_time",
            opt(agreement.created_date_time.as_ref().map(timestamp)),
        )?
        .set("author_name", agreement.author_name.clone())?
        .set("type", agreement.document_type.clone())?
        .set("status", agreement.status.clone())?
        .set("comment", agreement.comment.clone())?
        .set("customer_mrid", opt(agreement.customer.clone()))?;
    Ok(row)
}

pub(crate) fn meter_row<'t>(table: &'t TableDef, meter: &Meter) -> Result<Row<'t>> {
    let mut row = identified_row(table, &meter.base)?;
    row.set("location_mrid", opt(meter.location.clone()))?
        .set("customer_mrid", opt(meter.customer.clone()))?
        .set("service_location_mrid", opt(meter.service_location.clone()))?;
    Ok(row)
}

pub(crate) fn analog_row<'t>(table: &'t TableDef, analog: &Analog) -> Result<Row<'t>> {
    let mut row = identified_row(table, &analog.base)?;
    row.set(
        "power_system_resource_mrid",
        opt(analog.power_system_resource.clone()),
    )?
    .set("terminal_mrid", opt(analog.terminal.clone()))?
    .set("phases", analog.phases.as_str().to_string())?
    .set("unit_symbol", analog.unit_symbol.as_str().to_string())?
    .set("positive_flow_in", opt(analog.positive_flow_in))?;
    Ok(row)
}

// ---------------------------------------------------------------------------
// Row -> entity
// ---------------------------------------------------------------------------

/// Typed access to the values of a row read back from a table.
pub(crate) struct Fields<'r> {
    row: &'r Row<'r>,
    key: String,
}

impl<'r> Fields<'r> {
    /// Wraps `row`, naming it in errors by the value of `key_column`.
    pub(crate) fn new(row: &'r Row<'r>, key_column: &str) -> Self {
        let key = match row.get(key_column) {
            Ok(Value::Text(text)) => text.clone(),
            Ok(Value::Integer(i)) => i.to_string(),
            _ => String::new(),
        };
        Self { row, key }
    }

    fn table(&self) -> &str {
        self.row.table().name()
    }

    fn missing(&self, column: &str) -> ReadError {
        ReadError::MissingValue {
            table: self.table().to_string(),
            mrid: self.key.clone(),
            column: column.to_string(),
        }
    }

    fn invalid(&self, column: &str, reason: impl Into<String>) -> ReadError {
        ReadError::InvalidValue {
            table: self.table().to_string(),
            mrid: self.key.clone(),
            column: column.to_string(),
            reason: reason.into(),
        }
    }

    fn value(&self, column: &str) -> Result<Option<&Value>> {
        match self.row.get(column)? {
            Value::Null => Ok(None),
            value => Ok(Some(value)),
        }
    }

    pub(crate) fn opt_text(&self, column: &str) -> Result<Option<String>> {
        match self.value(column)? {
            None => Ok(None),
            Some(Value::Text(text)) => Ok(Some(text.clone())),
            Some(other) => Err(self
                .invalid(column, format!("expected text, found {}", other.data_type()))
                .into()),
        }
    }

    pub(crate) fn text(&self, column: &str) -> Result<String> {
        self.opt_text(column)?
            .ok_or_else(|| self.missing(column).into())
    }

    pub(crate) fn opt_i64(&self, column: &str) -> Result<Option<i64>> {
        match self.value(column)? {
            None => Ok(None),
            Some(Value::Integer(i)) => Ok(Some(*i)),
            Some(other) => Err(self
                .invalid(column, format!("expected integer, found {}", other.data_type()))
                .into()),
        }
    }

    pub(crate) fn opt_i32(&self, column: &str) -> Result<Option<i32>> {
        match self.opt_i64(column)? {
            None => Ok(None),
            Some(i) => i32::try_from(i)
                .map(Some)
                .map_err(|_| self.invalid(column, format!("{i} is out of range")).into()),
        }
    }

    pub(crate) fn i32(&self, column: &str) -> Result<i32> {
        self.opt_i32(column)?
            .ok_or_else(|| self.missing(column).into())
    }

    pub(crate) fn opt_f64(&self, column: &str) -> Result<Option<f64>> {
        match self.value(column)? {
            None => Ok(None),
            Some(Value::Real(r)) => Ok(Some(*r)),
            Some(Value::Integer(i)) => Ok(Some(*i as f64)),
            Some(other) => Err(self
                .invalid(column, format!("expected number, found {}", other.data_type()))
                .into()),
        }
    }

    pub(crate) fn f64(&self, column: &str) -> Result<f64> {
        self.opt_f64(column)?
            .ok_or_else(|| self.missing(column).into())
    }

    pub(crate) fn opt_bool(&self, column: &str) -> Result<Option<bool>> {
        Ok(self.opt_i64(column)?.map(|i| i != 0))
    }

    pub(crate) fn parsed<T>(&self, column: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let text = self.text(column)?;
        text.parse()
            .map_err(|e: T::Err| self.invalid(column, e.to_string()).into())
    }

    pub(crate) fn opt_datetime(&self, column: &str) -> Result<Option<DateTime<Utc>>> {
        match self.opt_text(column)? {
            None => Ok(None),
            Some(text) => DateTime::parse_from_rfc3339(&text)
                .map(|dt| Some(dt.with_timezone(&Utc)))
                .map_err(|e| self.invalid(column, e.to_string()).into()),
        }
    }

    pub(crate) fn datetime(&self, column: &str) -> Result<DateTime<Utc>> {
        self.opt_datetime(column)?
            .ok_or_else(|| self.missing(column).into())
    }
}

pub(crate) fn read_data_source(f: &Fields<'_>) -> Result<DataSource> {
    Ok(DataSource::new(
        f.text("source")?,
        f.text("version")?,
        f.datetime("timestamp")?,
    ))
}

pub(crate) fn read_identified(f: &Fields<'_>) -> Result<IdentifiedObject> {
    let mut io = IdentifiedObject::with_mrid(f.text("mrid")?);
    io.name = f.text("name")?;
    io.description = f.text("description")?;
    io.num_diagram_objects = f.i32("num_diagram_objects")?;
    Ok(io)
}

fn read_equipment(f: &Fields<'_>) -> Result<Equipment> {
    let defaults = Equipment::default();
    Ok(Equipment {
        location: f.opt_text("location_mrid")?,
        num_controls: f.i32("num_controls")?,
        normally_in_service: f
            .opt_bool("normally_in_service")?
            .unwrap_or(defaults.normally_in_service),
        in_service: f.opt_bool("in_service")?.unwrap_or(defaults.in_service),
        commissioned_date: f.opt_datetime("commissioned_date")?,
        base_voltage: f.opt_text("base_voltage_mrid")?,
        containers: Vec::new(),
    })
}

/// Position point columns: location, sequence number and the point.
pub(crate) fn read_position_point(f: &Fields<'_>) -> Result<(String, i64, PositionPoint)> {
    let location = f.text("location_mrid")?;
    let sequence = f
        .opt_i64("sequence_number")?
        .ok_or_else(|| f.missing("sequence_number"))?;
    let point = PositionPoint::new(f.f64("x_position")?, f.f64("y_position")?);
    Ok((location, sequence, point))
}

/// Both identifiers of an association row, in column order.
pub(crate) fn read_association(f: &Fields<'_>) -> Result<(String, String)> {
    let columns = f.row.table().columns();
    if columns.len() != 2 {
        return Err(ConfigurationError::UnmappedTable(f.table().to_string()).into());
    }
    Ok((f.text(&columns[0].name)?, f.text(&columns[1].name)?))
}

pub(crate) fn read_organisation(f: &Fields<'_>) -> Result<Organisation> {
    Ok(Organisation {
        base: read_identified(f)?,
    })
}

/// Locations are read without points; those come from `position_points`.
pub(crate) fn read_location(f: &Fields<'_>) -> Result<Location> {
    Ok(Location {
        base: read_identified(f)?,
        points: Vec::new(),
    })
}

pub(crate) fn read_connectivity_node(f: &Fields<'_>) -> Result<ConnectivityNode> {
    Ok(ConnectivityNode {
        base: read_identified(f)?,
    })
}

pub(crate) fn read_base_voltage(f: &Fields<'_>) -> Result<BaseVoltage> {
    Ok(BaseVoltage {
        base: read_identified(f)?,
        nominal_voltage: f.i32("nominal_voltage")?,
    })
}

pub(crate) fn read_breaker(f: &Fields<'_>) -> Result<Breaker> {
    Ok(Breaker {
        base: read_identified(f)?,
        equipment: read_equipment(f)?,
        normal_open: f.i32("normal_open")?,
        open: f.i32("open")?,
        breaking_capacity: f.opt_i32("breaking_capacity")?,
        rated_current: f.opt_i32("rated_current")?,
    })
}

pub(crate) fn read_ac_line_segment(f: &Fields<'_>) -> Result<AcLineSegment> {
    Ok(AcLineSegment {
        base: read_identified(f)?,
        equipment: read_equipment(f)?,
        length: f.opt_f64("length")?,
    })
}

pub(crate) fn read_power_transformer(f: &Fields<'_>) -> Result<PowerTransformer> {
    Ok(PowerTransformer {
        base: read_identified(f)?,
        equipment: read_equipment(f)?,
        vector_group: f.parsed("vector_group")?,
        transformer_utilisation: f.opt_f64("transformer_utilisation")?,
    })
}

pub(crate) fn read_terminal(f: &Fields<'_>) -> Result<Terminal> {
    Ok(Terminal {
        base: read_identified(f)?,
        conducting_equipment: f.opt_text("conducting_equipment_mrid")?,
        sequence_number: f.i32("sequence_number")?,
        connectivity_node: f.opt_text("connectivity_node_mrid")?,
        phases: f.parsed("phases")?,
    })
}

pub(crate) fn read_feeder(f: &Fields<'_>) -> Result<Feeder> {
    Ok(Feeder {
        base: read_identified(f)?,
        location: f.opt_text("location_mrid")?,
        num_controls: f.i32("num_controls")?,
        normal_head_terminal: f.opt_text("normal_head_terminal_mrid")?,
    })
}

pub(crate) fn read_usage_point(f: &Fields<'_>) -> Result<UsagePoint> {
    Ok(UsagePoint {
        base: read_identified(f)?,
        location: f.opt_text("location_mrid")?,
        is_virtual: f.opt_bool("is_virtual")?,
        connection_category: f.opt_text("connection_category")?,
        equipment: Vec::new(),
    })
}

pub(crate) fn read_asset_owner(f: &Fields<'_>) -> Result<AssetOwner> {
    Ok(AssetOwner {
        base: read_identified(f)?,
        organisation: f.opt_text("organisation_mrid")?,
        assets: Vec::new(),
    })
}

pub(crate) fn read_customer(f: &Fields<'_>) -> Result<Customer> {
    Ok(Customer {
        base: read_identified(f)?,
        organisation: f.opt_text("organisation_mrid")?,
        kind: f.parsed("kind")?,
        num_end_devices: f.i32("num_end_devices")?,
    })
}

pub(crate) fn read_customer_agreement(f: &Fields<'_>) -> Result<CustomerAgreement> {
    Ok(CustomerAgreement {
        base: read_identified(f)?,
        title: f.text("title")?,
        created_date_time: f.opt_datetime("created_date_time")?,
        author_name: f.text("author_name")?,
        document_type: f.text("type")?,
        status: f.text("status")?,
        comment: f.text("comment")?,
        customer: f.opt_text("customer_mrid")?,
    })
}

pub(crate) fn read_meter(f: &Fields<'_>) -> Result<Meter> {
    Ok(Meter {
        base: read_identified(f)?,
        location: f.opt_text("location_mrid")?,
        customer: f.opt_text("customer_mrid")?,
        service_location: f.opt_text("service_location_mrid")?,
    })
}

pub(crate) fn read_analog(f: &Fields<'_>) -> Result<Analog> {
    Ok(Analog {
        base: read_identified(f)?,
        power_system_resource: f.opt_text("power_system_resource_mrid")?,
        terminal: f.opt_text("terminal_mrid")?,
        phases: f.parsed("phases")?,
        unit_symbol: f.parsed("unit_symbol")?,
        positive_flow_in: f.opt_bool("positive_flow_in")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::DatabaseTables;
    use chrono::TimeZone;

    #[test]
    fn test_breaker_row_binds_every_column() {
        let tables = DatabaseTables::new().unwrap();
        let table = tables.get("breakers").unwrap();

        let mut breaker = Breaker::new("b1");
        breaker.base.name = "Main".into();
        breaker.equipment.commissioned_date = Some(Utc.with_ymd_and_hms(2020, 5, 1, 0, 0, 0).unwrap());
        breaker.rated_current = Some(630);

        let row = breaker_row(table, &breaker).unwrap();
        assert!(table.check_row(&row, "b1").is_ok());
        assert_eq!(row.get("rated_current").unwrap(), &Value::Integer(630));
        assert_eq!(row.get("breaking_capacity").unwrap(), &Value::Null);
        assert_eq!(row.get("in_service").unwrap(), &Value::Integer(1));
        assert_eq!(
            row.get("commissioned_date").unwrap(),
            &Value::Text("2020-05-01T00:00:00Z".into())
        );
    }

    #[test]
    fn test_read_back_breaker() {
        let tables = DatabaseTables::new().unwrap();
        let table = tables.get("breakers").unwrap();

        let mut breaker = Breaker::new("b1");
        breaker.equipment.containers.push("f1".into());
        breaker.open = 7;
        let row = breaker_row(table, &breaker).unwrap();

        let read = read_breaker(&Fields::new(&row, "mrid")).unwrap();
        assert_eq!(read.open, 7);
        assert_eq!(read.base, breaker.base);
        // Containers live in their own table.
        assert!(read.equipment.containers.is_empty());
    }

    #[test]
    fn test_missing_required_value() {
        let tables = DatabaseTables::new().unwrap();
        let table = tables.get("base_voltages").unwrap();
        let mut row = table.row();
        row.set("mrid", "bv1".to_string()).unwrap();

        let err = read_base_voltage(&Fields::new(&row, "mrid")).unwrap_err();
        match err {
            crate::SqliteError::Read(ReadError::MissingValue { table, mrid, column }) => {
                assert_eq!(table, "base_voltages");
                assert_eq!(mrid, "bv1");
                assert_eq!(column, "name");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_enum_text() {
        let tables = DatabaseTables::new().unwrap();
        let table = tables.get("terminals").unwrap();
        let mut terminal = Terminal::new("t1", 1);
        terminal.phases = PhaseCode::AB;
        let mut row = terminal_row(table, &terminal).unwrap();
        row.set("phases", "QQ".to_string()).unwrap();

        let err = read_terminal(&Fields::new(&row, "mrid")).unwrap_err();
        assert!(matches!(
            err,
            crate::SqliteError::Read(ReadError::InvalidValue { ref column, .. }) if column == "phases"
        ));
    }

    #[test]
    fn test_association_row_uses_column_order() {
        let tables = DatabaseTables::new().unwrap();
        let table = tables.get("equipment_usage_points").unwrap();
        let row = association_row(table, "b1", "up1").unwrap();
        assert_eq!(row.get("equipment_mrid").unwrap(), &Value::Text("b1".into()));

        let (first, second) = read_association(&Fields::new(&row, "equipment_mrid")).unwrap();
        assert_eq!((first.as_str(), second.as_str()), ("b1", "up1"));
    }
}
