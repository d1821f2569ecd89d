//! The closed set of storable entities and their outgoing references.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::*;

/// Typed access to one entity variant of [`CimObject`].
///
/// Implemented for every entity struct so a service can hand out
/// `&Breaker` instead of a `&CimObject` the caller has to match on.
///
/// # Examples
///
/// ```
/// use cim_store_core::{Breaker, CimObject, CimType, ObjectKind};
///
/// let object: CimObject = Breaker::new("b1").into();
/// assert_eq!(object.kind(), ObjectKind::Breaker);
/// assert_eq!(Breaker::from_object(&object).unwrap().mrid(), "b1");
/// ```
pub trait CimType: Sized {
    const KIND: ObjectKind;

    fn identified_object(&self) -> &IdentifiedObject;

    fn from_object(object: &CimObject) -> Option<&Self>;

    fn from_object_mut(object: &mut CimObject) -> Option<&mut Self>;

    fn into_object(self) -> CimObject;

    fn mrid(&self) -> &str {
        self.identified_object().mrid()
    }
}

macro_rules! cim_objects {
    ($($variant:ident),+ $(,)?) => {
        /// Any entity that can live in a [`NetworkService`](crate::NetworkService).
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        #[serde(tag = "type")]
        pub enum CimObject {
            $($variant($variant),)+
        }

        /// Field-less discriminant of [`CimObject`].
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum ObjectKind {
            $($variant,)+
        }

        impl ObjectKind {
            pub const ALL: &'static [ObjectKind] = &[$(ObjectKind::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(ObjectKind::$variant => stringify!($variant),)+
                }
            }
        }

        impl CimObject {
            pub fn kind(&self) -> ObjectKind {
                match self {
                    $(CimObject::$variant(_) => ObjectKind::$variant,)+
                }
            }

            pub fn identified_object(&self) -> &IdentifiedObject {
                match self {
                    $(CimObject::$variant(o) => &o.base,)+
                }
            }

            pub fn identified_object_mut(&mut self) -> &mut IdentifiedObject {
                match self {
                    $(CimObject::$variant(o) => &mut o.base,)+
                }
            }
        }

        $(
            impl CimType for $variant {
                const KIND: ObjectKind = ObjectKind::$variant;

                fn identified_object(&self) -> &IdentifiedObject {
                    &self.base
                }

                fn from_object(object: &CimObject) -> Option<&Self> {
                    match object {
                        CimObject::$variant(o) => Some(o),
                        #[allow(unreachable_patterns)]
                        _ => None,
                    }
                }

                fn from_object_mut(object: &mut CimObject) -> Option<&mut Self> {
                    match object {
                        CimObject::$variant(o) => Some(o),
                        #[allow(unreachable_patterns)]
                        _ => None,
                    }
                }

                fn into_object(self) -> CimObject {
                    CimObject::$variant(self)
                }
            }

            impl From<$variant> for CimObject {
                fn from(value: $variant) -> Self {
                    CimObject::$variant(value)
                }
            }
        )+
    };
}

cim_objects! {
    Organisation,
    AssetOwner,
    Location,
    BaseVoltage,
    ConnectivityNode,
    Terminal,
    Breaker,
    AcLineSegment,
    PowerTransformer,
    Feeder,
    Meter,
    UsagePoint,
    Analog,
    Customer,
    CustomerAgreement,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kinds that carry an [`Equipment`] block.
pub const EQUIPMENT_KINDS: &[ObjectKind] = &[
    ObjectKind::Breaker,
    ObjectKind::AcLineSegment,
    ObjectKind::PowerTransformer,
];

const ASSET_KINDS: &[ObjectKind] = &[
    ObjectKind::Breaker,
    ObjectKind::AcLineSegment,
    ObjectKind::PowerTransformer,
    ObjectKind::Meter,
];

const RESOURCE_KINDS: &[ObjectKind] = &[
    ObjectKind::Breaker,
    ObjectKind::AcLineSegment,
    ObjectKind::PowerTransformer,
    ObjectKind::Feeder,
];

/// One outgoing reference held by an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference<'a> {
    /// Attribute holding the reference, e.g. `"base_voltage"`.
    pub attribute: &'static str,
    /// Identifier of the referenced entity.
    pub target: &'a str,
    /// Kinds the target is allowed to be.
    pub expected: &'static [ObjectKind],
}

impl ObjectKind {
    pub fn is_equipment(&self) -> bool {
        EQUIPMENT_KINDS.contains(self)
    }
}

impl CimObject {
    pub fn mrid(&self) -> &str {
        self.identified_object().mrid()
    }

    /// Returns the shared equipment block, if this entity has one.
    pub fn equipment(&self) -> Option<&Equipment> {
        match self {
            CimObject::Breaker(o) => Some(&o.equipment),
            CimObject::AcLineSegment(o) => Some(&o.equipment),
            CimObject::PowerTransformer(o) => Some(&o.equipment),
            _ => None,
        }
    }

    pub fn equipment_mut(&mut self) -> Option<&mut Equipment> {
        match self {
            CimObject::Breaker(o) => Some(&mut o.equipment),
            CimObject::AcLineSegment(o) => Some(&mut o.equipment),
            CimObject::PowerTransformer(o) => Some(&mut o.equipment),
            _ => None,
        }
    }

    /// Lists every identifier this entity refers to.
    ///
    /// Only forward references are returned. Derived back-references are
    /// answered by the service indexes instead.
    pub fn references(&self) -> Vec<Reference<'_>> {
        let mut refs = Vec::new();
        match self {
            CimObject::AssetOwner(o) => {
                push_optional(&mut refs, "organisation", &o.organisation, &[ObjectKind::Organisation]);
            }
            CimObject::Terminal(o) => {
                push_optional(&mut refs, "conducting_equipment", &o.conducting_equipment, EQUIPMENT_KINDS);
                push_optional(&mut refs, "connectivity_node", &o.connectivity_node, &[ObjectKind::ConnectivityNode]);
            }
            CimObject::Feeder(o) => {
                push_optional(&mut refs, "location", &o.location, &[ObjectKind::Location]);
                push_optional(&mut refs, "normal_head_terminal", &o.normal_head_terminal, &[ObjectKind::Terminal]);
            }
            CimObject::Meter(o) => {
                push_optional(&mut refs, "location", &o.location, &[ObjectKind::Location]);
                push_optional(&mut refs, "customer", &o.customer, &[ObjectKind::Customer]);
                push_optional(&mut refs, "service_location", &o.service_location, &[ObjectKind::Location]);
            }
            CimObject::UsagePoint(o) => {
                push_optional(&mut refs, "location", &o.location, &[ObjectKind::Location]);
            }
            CimObject::Analog(o) => {
                push_optional(&mut refs, "power_system_resource", &o.power_system_resource, RESOURCE_KINDS);
                push_optional(&mut refs, "terminal", &o.terminal, &[ObjectKind::Terminal]);
            }
            CimObject::Customer(o) => {
                push_optional(&mut refs, "organisation", &o.organisation, &[ObjectKind::Organisation]);
            }
            CimObject::CustomerAgreement(o) => {
                push_optional(&mut refs, "customer", &o.customer, &[ObjectKind::Customer]);
            }
            _ => {}
        }

        if let Some(eq) = self.equipment() {
            push_optional(&mut refs, "location", &eq.location, &[ObjectKind::Location]);
            push_optional(&mut refs, "base_voltage", &eq.base_voltage, &[ObjectKind::BaseVoltage]);
        }

        match self {
            CimObject::AssetOwner(o) => {
                refs.extend(o.assets.iter().map(|target| Reference {
                    attribute: "assets",
                    target,
                    expected: ASSET_KINDS,
                }));
            }
            CimObject::UsagePoint(o) => {
                refs.extend(o.equipment.iter().map(|target| Reference {
                    attribute: "equipment",
                    target,
                    expected: EQUIPMENT_KINDS,
                }));
            }
            _ => {}
        }

        if let Some(eq) = self.equipment() {
            refs.extend(eq.containers.iter().map(|target| Reference {
                attribute: "containers",
                target,
                expected: &[ObjectKind::Feeder],
            }));
        }

        refs
    }
}

fn push_optional<'a>(
    refs: &mut Vec<Reference<'a>>,
    attribute: &'static str,
    target: &'a Option<String>,
    expected: &'static [ObjectKind],
) {
    if let Some(target) = target.as_deref() {
        refs.push(Reference {
            attribute,
            target,
            expected,
        });
    }
}
