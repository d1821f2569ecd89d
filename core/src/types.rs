//! CIM entity type definitions.
//!
//! This module defines the subset of the IEC 61970/61968 Common Information
//! Model carried by this crate. Every entity embeds an [`IdentifiedObject`]
//! by composition, and equipment shares an [`Equipment`] block rather than
//! inheriting from a common base. References to other entities are plain
//! mRID strings; they are resolved against a
//! [`NetworkService`](crate::NetworkService), never owned.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ParseEnumError;

/// Declares a CIM enumeration stored by its variant name.
///
/// Generates `as_str`, [`Display`](fmt::Display), [`FromStr`] and serde
/// support so the stored text, the JSON text and the in-memory value agree.
macro_rules! cim_enum {
    (
        $(#[$meta:meta])*
        $name:ident default $default:ident {
            $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Returns the stored name of this variant.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::$default
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(ParseEnumError {
                        enum_name: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

cim_enum! {
    /// Phases present on a terminal or measured by a measurement.
    PhaseCode default None {
        None => "NONE",
        A => "A",
        B => "B",
        C => "C",
        N => "N",
        AB => "AB",
        AC => "AC",
        AN => "AN",
        BC => "BC",
        BN => "BN",
        CN => "CN",
        ABC => "ABC",
        ABN => "ABN",
        ACN => "ACN",
        BCN => "BCN",
        ABCN => "ABCN",
        X => "X",
        Y => "Y",
        XY => "XY",
        XN => "XN",
        YN => "YN",
        XYN => "XYN",
    }
}

cim_enum! {
    /// Unit of measure for a measurement value.
    UnitSymbol default None {
        None => "NONE",
        V => "V",
        A => "A",
        W => "W",
        VA => "VA",
        VAr => "VAr",
        Wh => "Wh",
        Hz => "Hz",
        Deg => "deg",
        Ohm => "ohm",
        DegC => "degC",
    }
}

cim_enum! {
    /// Winding connection and phase displacement of a power transformer.
    VectorGroup default Unknown {
        Unknown => "UNKNOWN",
        Dd0 => "DD0",
        Dyn1 => "DYN1",
        Dyn11 => "DYN11",
        Yy0 => "YY0",
        Yyn0 => "YYN0",
        Ynyn0 => "YNYN0",
        Yd1 => "YD1",
        Yd11 => "YD11",
        Dz0 => "DZ0",
    }
}

cim_enum! {
    /// Classification of a customer.
    CustomerKind default Unknown {
        Unknown => "UNKNOWN",
        CommercialIndustrial => "commercialIndustrial",
        Energy => "energy",
        EnergyServiceScheduler => "energyServiceScheduler",
        EnergyServiceSupplier => "energyServiceSupplier",
        Internal => "internalUse",
        Other => "other",
        Pumping => "pumpingLoad",
        Residential => "residential",
        ResidentialAndCommercial => "residentialAndCommercial",
        ResidentialAndStreetlight => "residentialAndStreetlight",
        ResidentialFarmService => "residentialFarmService",
        ResidentialStreetlightOthers => "residentialStreetlightOthers",
        WindMachine => "windMachine",
    }
}

/// Root of every CIM entity: a unique identifier and descriptive text.
///
/// The mRID is fixed at construction. [`IdentifiedObject::new`] generates a
/// random UUID; [`IdentifiedObject::with_mrid`] takes an existing one.
///
/// # Examples
///
/// ```
/// use cim_store_core::IdentifiedObject;
///
/// let io = IdentifiedObject::with_mrid("brk-1").with_name("Main breaker");
/// assert_eq!(io.mrid(), "brk-1");
/// assert_eq!(io.name, "Main breaker");
///
/// let generated = IdentifiedObject::new();
/// assert_eq!(generated.mrid().len(), 36);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentifiedObject {
    mrid: String,
    /// Human readable name, empty when unset.
    #[serde(default)]
    pub name: String,
    /// Free text description, empty when unset.
    #[serde(default)]
    pub description: String,
    /// Number of diagram objects drawn for this entity.
    #[serde(default)]
    pub num_diagram_objects: i32,
}

impl IdentifiedObject {
    /// Creates an object with a freshly generated UUID identifier.
    pub fn new() -> Self {
        Self::with_mrid(Uuid::new_v4().to_string())
    }

    /// Creates an object with the given identifier.
    pub fn with_mrid(mrid: impl Into<String>) -> Self {
        Self {
            mrid: mrid.into(),
            name: String::new(),
            description: String::new(),
            num_diagram_objects: 0,
        }
    }

    /// Sets the name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Returns the identifier.
    pub fn mrid(&self) -> &str {
        &self.mrid
    }
}

impl Default for IdentifiedObject {
    fn default() -> Self {
        Self::new()
    }
}

/// Attributes shared by all conducting equipment.
///
/// Stands in for the PowerSystemResource → Equipment → ConductingEquipment
/// chain of the CIM class hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Equipment {
    /// Where the equipment is installed.
    pub location: Option<String>,
    /// Number of controls attached to this resource.
    pub num_controls: i32,
    pub normally_in_service: bool,
    pub in_service: bool,
    pub commissioned_date: Option<DateTime<Utc>>,
    pub base_voltage: Option<String>,
    /// Containers (feeders) this equipment belongs to.
    pub containers: Vec<String>,
}

impl Default for Equipment {
    fn default() -> Self {
        Self {
            location: None,
            num_controls: 0,
            normally_in_service: true,
            in_service: true,
            commissioned_date: None,
            base_voltage: None,
            containers: Vec::new(),
        }
    }
}

/// A company or party, referenced by asset roles and customers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organisation {
    pub base: IdentifiedObject,
}

impl Organisation {
    pub fn new(mrid: impl Into<String>) -> Self {
        Self {
            base: IdentifiedObject::with_mrid(mrid),
        }
    }
}

/// Role of an organisation as the owner of a set of assets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetOwner {
    pub base: IdentifiedObject,
    #[serde(default)]
    pub organisation: Option<String>,
    /// Assets (equipment or meters) owned through this role.
    #[serde(default)]
    pub assets: Vec<String>,
}

impl AssetOwner {
    pub fn new(mrid: impl Into<String>) -> Self {
        Self {
            base: IdentifiedObject::with_mrid(mrid),
            organisation: None,
            assets: Vec::new(),
        }
    }
}

/// One coordinate of a [`Location`], in sequence order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionPoint {
    pub x_position: f64,
    pub y_position: f64,
}

impl PositionPoint {
    pub fn new(x_position: f64, y_position: f64) -> Self {
        Self {
            x_position,
            y_position,
        }
    }
}

/// A geographical location described by an ordered list of points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub base: IdentifiedObject,
    #[serde(default)]
    pub points: Vec<PositionPoint>,
}

impl Location {
    pub fn new(mrid: impl Into<String>) -> Self {
        Self {
            base: IdentifiedObject::with_mrid(mrid),
            points: Vec::new(),
        }
    }
}

/// A nominal voltage level shared by equipment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseVoltage {
    pub base: IdentifiedObject,
    /// Nominal voltage in volts.
    pub nominal_voltage: i32,
}

impl BaseVoltage {
    pub fn new(mrid: impl Into<String>, nominal_voltage: i32) -> Self {
        Self {
            base: IdentifiedObject::with_mrid(mrid),
            nominal_voltage,
        }
    }
}

/// A point where terminals are connected with zero impedance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectivityNode {
    pub base: IdentifiedObject,
}

impl ConnectivityNode {
    pub fn new(mrid: impl Into<String>) -> Self {
        Self {
            base: IdentifiedObject::with_mrid(mrid),
        }
    }
}

/// An electrical connection point of a piece of conducting equipment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Terminal {
    pub base: IdentifiedObject,
    #[serde(default)]
    pub conducting_equipment: Option<String>,
    /// 1-based position of this terminal on its equipment.
    pub sequence_number: i32,
    #[serde(default)]
    pub connectivity_node: Option<String>,
    #[serde(default)]
    pub phases: PhaseCode,
}

impl Terminal {
    pub fn new(mrid: impl Into<String>, sequence_number: i32) -> Self {
        Self {
            base: IdentifiedObject::with_mrid(mrid),
            conducting_equipment: None,
            sequence_number,
            connectivity_node: None,
            phases: PhaseCode::ABC,
        }
    }
}

/// A mechanical switching device able to interrupt fault current.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breaker {
    pub base: IdentifiedObject,
    #[serde(default)]
    pub equipment: Equipment,
    /// Open state of each phase bit when the network is in its normal state.
    #[serde(default)]
    pub normal_open: i32,
    /// Current open state of each phase bit.
    #[serde(default)]
    pub open: i32,
    #[serde(default)]
    pub breaking_capacity: Option<i32>,
    #[serde(default)]
    pub rated_current: Option<i32>,
}

impl Breaker {
    pub fn new(mrid: impl Into<String>) -> Self {
        Self {
            base: IdentifiedObject::with_mrid(mrid),
            equipment: Equipment::default(),
            normal_open: 0,
            open: 0,
            breaking_capacity: None,
            rated_current: None,
        }
    }
}

/// An overhead line or cable section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcLineSegment {
    pub base: IdentifiedObject,
    #[serde(default)]
    pub equipment: Equipment,
    /// Segment length in metres.
    #[serde(default)]
    pub length: Option<f64>,
}

impl AcLineSegment {
    pub fn new(mrid: impl Into<String>) -> Self {
        Self {
            base: IdentifiedObject::with_mrid(mrid),
            equipment: Equipment::default(),
            length: None,
        }
    }
}

/// A multi-winding transformer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerTransformer {
    pub base: IdentifiedObject,
    #[serde(default)]
    pub equipment: Equipment,
    #[serde(default)]
    pub vector_group: VectorGroup,
    #[serde(default)]
    pub transformer_utilisation: Option<f64>,
}

impl PowerTransformer {
    pub fn new(mrid: impl Into<String>) -> Self {
        Self {
            base: IdentifiedObject::with_mrid(mrid),
            equipment: Equipment::default(),
            vector_group: VectorGroup::Unknown,
            transformer_utilisation: None,
        }
    }
}

/// A collection of equipment supplied from a single head terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feeder {
    pub base: IdentifiedObject,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub num_controls: i32,
    #[serde(default)]
    pub normal_head_terminal: Option<String>,
}

impl Feeder {
    pub fn new(mrid: impl Into<String>) -> Self {
        Self {
            base: IdentifiedObject::with_mrid(mrid),
            location: None,
            num_controls: 0,
            normal_head_terminal: None,
        }
    }
}

/// A physical metering device installed for a customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meter {
    pub base: IdentifiedObject,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub service_location: Option<String>,
}

impl Meter {
    pub fn new(mrid: impl Into<String>) -> Self {
        Self {
            base: IdentifiedObject::with_mrid(mrid),
            location: None,
            customer: None,
            service_location: None,
        }
    }
}

/// Logical point on the network where consumption is measured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsagePoint {
    pub base: IdentifiedObject,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub is_virtual: Option<bool>,
    #[serde(default)]
    pub connection_category: Option<String>,
    /// Equipment supplying this usage point.
    #[serde(default)]
    pub equipment: Vec<String>,
}

impl UsagePoint {
    pub fn new(mrid: impl Into<String>) -> Self {
        Self {
            base: IdentifiedObject::with_mrid(mrid),
            location: None,
            is_virtual: None,
            connection_category: None,
            equipment: Vec::new(),
        }
    }
}

/// An analog measurement taken on a resource or terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analog {
    pub base: IdentifiedObject,
    #[serde(default)]
    pub power_system_resource: Option<String>,
    #[serde(default)]
    pub terminal: Option<String>,
    #[serde(default)]
    pub phases: PhaseCode,
    #[serde(default)]
    pub unit_symbol: UnitSymbol,
    #[serde(default)]
    pub positive_flow_in: Option<bool>,
}

impl Analog {
    pub fn new(mrid: impl Into<String>) -> Self {
        Self {
            base: IdentifiedObject::with_mrid(mrid),
            power_system_resource: None,
            terminal: None,
            phases: PhaseCode::ABC,
            unit_symbol: UnitSymbol::None,
            positive_flow_in: None,
        }
    }
}

/// A party receiving services, optionally backed by an organisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub base: IdentifiedObject,
    #[serde(default)]
    pub organisation: Option<String>,
    #[serde(default)]
    pub kind: CustomerKind,
    #[serde(default)]
    pub num_end_devices: i32,
}

impl Customer {
    pub fn new(mrid: impl Into<String>) -> Self {
        Self {
            base: IdentifiedObject::with_mrid(mrid),
            organisation: None,
            kind: CustomerKind::Unknown,
            num_end_devices: 0,
        }
    }
}

/// A service agreement document held by a customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerAgreement {
    pub base: IdentifiedObject,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub created_date_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub author_name: String,
    #[serde(default)]
    pub document_type: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub customer: Option<String>,
}

impl CustomerAgreement {
    pub fn new(mrid: impl Into<String>) -> Self {
        Self {
            base: IdentifiedObject::with_mrid(mrid),
            title: String::new(),
            created_date_time: None,
            author_name: String::new(),
            document_type: String::new(),
            status: String::new(),
            comment: String::new(),
            customer: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_text_round_trip() {
        for phase in PhaseCode::ALL {
            assert_eq!(phase.as_str().parse::<PhaseCode>().unwrap(), *phase);
        }
        for kind in CustomerKind::ALL {
            assert_eq!(kind.as_str().parse::<CustomerKind>().unwrap(), *kind);
        }
    }

    #[test]
    fn test_unknown_enum_text() {
        let err = "ABCD".parse::<PhaseCode>().unwrap_err();
        assert_eq!(err.enum_name, "PhaseCode");
        assert_eq!(err.value, "ABCD");
    }

    #[test]
    fn test_enum_serde_uses_stored_names() {
        let json = serde_json::to_string(&UnitSymbol::Deg).unwrap();
        assert_eq!(json, "\"deg\"");
        let kind: CustomerKind = serde_json::from_str("\"residential\"").unwrap();
        assert_eq!(kind, CustomerKind::Residential);
    }

    #[test]
    fn test_generated_mrids_are_unique() {
        let a = IdentifiedObject::new();
        let b = IdentifiedObject::new();
        assert_ne!(a.mrid(), b.mrid());
    }

    #[test]
    fn test_equipment_defaults_in_service() {
        let eq = Equipment::default();
        assert!(eq.normally_in_service);
        assert!(eq.in_service);
        assert!(eq.containers.is_empty());
    }
}
