//! Reference validation for object graphs.
//!
//! Checks that every identifier an entity holds points at an entity of an
//! acceptable kind within the same service. References to identifiers the
//! service does not contain are reported, not rejected, since they may name
//! objects held by another service.
//!
//! # Examples
//!
//! ```
//! use cim_store_core::*;
//!
//! let mut service = NetworkService::new();
//! service.add(BaseVoltage::new("bv1", 11000)).unwrap();
//! let mut breaker = Breaker::new("b1");
//! breaker.equipment.base_voltage = Some("bv1".into());
//! service.add(breaker).unwrap();
//! assert!(validate_service(&service).is_empty());
//!
//! // Points at something that is not there
//! let mut line = AcLineSegment::new("l1");
//! line.equipment.base_voltage = Some("bv9".into());
//! service.add(line).unwrap();
//! assert_eq!(validate_service(&service).len(), 1);
//! ```

use thiserror::Error;

use crate::{CimObject, NetworkService, ObjectKind};

/// A reference problem found in an object graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphIssue {
    /// An object has an empty mRID.
    #[error("{kind} has an empty mRID")]
    EmptyMrid { kind: ObjectKind },
    /// The referenced identifier is not in the service.
    #[error("{kind} '{mrid}' references unknown '{target}' via {attribute}")]
    DanglingReference {
        kind: ObjectKind,
        mrid: String,
        attribute: &'static str,
        target: String,
    },
    /// The referenced identifier belongs to an object of the wrong kind.
    #[error("{kind} '{mrid}' references {found} '{target}' via {attribute}")]
    WrongKind {
        kind: ObjectKind,
        mrid: String,
        attribute: &'static str,
        target: String,
        found: ObjectKind,
    },
}

impl GraphIssue {
    /// The identifier the issue is about, if any.
    pub fn target(&self) -> Option<&str> {
        match self {
            GraphIssue::EmptyMrid { .. } => None,
            GraphIssue::DanglingReference { target, .. } | GraphIssue::WrongKind { target, .. } => {
                Some(target)
            }
        }
    }
}

/// Validates every reference held by every object in `service`.
///
/// Issues are returned in mRID order of the referring object.
pub fn validate_service(service: &NetworkService) -> Vec<GraphIssue> {
    let mut issues = Vec::new();
    for object in service.objects() {
        check_object(service, object, &mut issues);
    }
    issues
}

/// Validates the references held by the objects named in `mrids`.
///
/// Targets are still resolved against the whole service. Identifiers not
/// present in the service are skipped.
pub fn validate_objects<'a>(
    service: &NetworkService,
    mrids: impl IntoIterator<Item = &'a str>,
) -> Vec<GraphIssue> {
    let mut issues = Vec::new();
    for mrid in mrids {
        if let Some(object) = service.get_object(mrid) {
            check_object(service, object, &mut issues);
        }
    }
    issues
}

fn check_object(service: &NetworkService, object: &CimObject, issues: &mut Vec<GraphIssue>) {
    let kind = object.kind();
    if object.mrid().trim().is_empty() {
        issues.push(GraphIssue::EmptyMrid { kind });
    }

    for reference in object.references() {
        match service.resolve(reference.target) {
            None => issues.push(GraphIssue::DanglingReference {
                kind,
                mrid: object.mrid().to_string(),
                attribute: reference.attribute,
                target: reference.target.to_string(),
            }),
            Some(found) if !reference.expected.contains(&found.kind()) => {
                issues.push(GraphIssue::WrongKind {
                    kind,
                    mrid: object.mrid().to_string(),
                    attribute: reference.attribute,
                    target: reference.target.to_string(),
                    found: found.kind(),
                })
            }
            Some(_) => {}
        }
    }
}
