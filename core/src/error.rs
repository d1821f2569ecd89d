use thiserror::Error;

use crate::object::ObjectKind;

/// Text that does not name any variant of a CIM enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {enum_name} value '{value}'")]
pub struct ParseEnumError {
    pub enum_name: &'static str,
    pub value: String,
}

/// Errors raised while mutating a [`NetworkService`](crate::NetworkService).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("an object with mRID '{0}' already exists")]
    DuplicateMrid(String),

    #[error("mRID '{mrid}' belongs to a {existing}, cannot store a {incoming}")]
    KindMismatch {
        mrid: String,
        existing: ObjectKind,
        incoming: ObjectKind,
    },

    #[error("no object with mRID '{0}'")]
    NotFound(String),

    #[error("'{mrid}' is a {kind}, which is not equipment")]
    NotEquipment { mrid: String, kind: ObjectKind },
}

/// Errors raised by [`MetadataCollection`](crate::MetadataCollection).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetadataError {
    #[error("data source '{0}' has already been added")]
    DuplicateSource(String),
}
