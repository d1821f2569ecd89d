//! CIM entity types and in-memory object graphs.
//!
//! This crate defines the data side of the CIM store:
//!
//! - [`IdentifiedObject`] and the entity structs in [`types`] (breakers,
//!   line segments, transformers, terminals, feeders, meters, customers and
//!   so on), composed rather than inherited.
//! - [`CimObject`]: the closed enum of storable entities, with
//!   [`ObjectKind`] as its discriminant and [`CimType`] for typed access.
//! - [`NetworkService`]: the object graph keyed by mRID, with indexes by
//!   kind and by containing feeder.
//! - [`MetadataCollection`]: provenance of the data in a service.
//!
//! Reference checking ([`validate_service`]) reports identifiers that do not
//! resolve within a service.
//!
//! # Example
//!
//! ```
//! use cim_store_core::*;
//!
//! let mut service = NetworkService::new();
//! service.add(ConnectivityNode::new("cn1")).unwrap();
//! service.add(Breaker::new("b1")).unwrap();
//!
//! let mut terminal = Terminal::new("t1", 1);
//! terminal.conducting_equipment = Some("b1".into());
//! terminal.connectivity_node = Some("cn1".into());
//! service.add(terminal).unwrap();
//!
//! assert_eq!(service.terminals_of("b1").len(), 1);
//! assert!(validate_service(&service).is_empty());
//! ```

mod error;
mod metadata;
mod object;
mod service;
pub mod types;
mod validate;

pub use error::{MetadataError, ParseEnumError, ServiceError};
pub use metadata::{DataSource, MetadataCollection};
pub use object::{CimObject, CimType, EQUIPMENT_KINDS, ObjectKind, Reference};
pub use service::NetworkService;
pub use types::*;
pub use validate::{GraphIssue, validate_objects, validate_service};
