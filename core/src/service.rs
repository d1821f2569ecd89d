//! In-memory object graph keyed by mRID.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::ServiceError;
use crate::object::{CimObject, CimType, ObjectKind};
use crate::types::{CustomerAgreement, Terminal, UsagePoint};

/// An object graph of CIM entities with typed traversal indexes.
///
/// Objects are stored once, keyed by mRID. The `by_kind` and `by_container`
/// indexes are maintained on every mutation that goes through the service.
/// Mutations made through [`NetworkService::get_mut`] that change
/// containment must be followed by [`NetworkService::reindex_containers`].
///
/// # Examples
///
/// ```
/// use cim_store_core::{Breaker, Feeder, NetworkService};
///
/// let mut service = NetworkService::new();
/// service.add(Feeder::new("f1")).unwrap();
/// service.add(Breaker::new("b1")).unwrap();
/// service.assign_to_container("b1", "f1").unwrap();
///
/// assert_eq!(service.get::<Breaker>("b1").unwrap().equipment.containers, ["f1"]);
/// assert_eq!(service.contained_in("f1").collect::<Vec<_>>(), ["b1"]);
/// assert!(service.add(Breaker::new("b1")).is_err());
/// ```
#[derive(Debug, Default, Clone)]
pub struct NetworkService {
    objects: BTreeMap<String, CimObject>,
    by_kind: BTreeMap<ObjectKind, BTreeSet<String>>,
    by_container: BTreeMap<String, BTreeSet<String>>,
}

impl NetworkService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a new object. Fails if the mRID is already in use.
    pub fn add(&mut self, object: impl Into<CimObject>) -> Result<(), ServiceError> {
        let object = object.into();
        if self.objects.contains_key(object.mrid()) {
            return Err(ServiceError::DuplicateMrid(object.mrid().to_string()));
        }
        self.insert_indexed(object);
        Ok(())
    }

    /// Inserts an object, replacing an existing one of the same kind.
    ///
    /// Returns the replaced object. Replacing an object of a different kind
    /// fails with [`ServiceError::KindMismatch`] and leaves the service
    /// unchanged.
    pub fn upsert(
        &mut self,
        object: impl Into<CimObject>,
    ) -> Result<Option<CimObject>, ServiceError> {
        let object = object.into();
        if let Some(existing) = self.objects.get(object.mrid()) {
            if existing.kind() != object.kind() {
                return Err(ServiceError::KindMismatch {
                    mrid: object.mrid().to_string(),
                    existing: existing.kind(),
                    incoming: object.kind(),
                });
            }
        }
        let previous = self.remove(object.mrid());
        self.insert_indexed(object);
        Ok(previous)
    }

    /// Returns the object with `mrid` if it exists and is a `T`.
    pub fn get<T: CimType>(&self, mrid: &str) -> Option<&T> {
        self.objects.get(mrid).and_then(T::from_object)
    }

    pub fn get_mut<T: CimType>(&mut self, mrid: &str) -> Option<&mut T> {
        self.objects.get_mut(mrid).and_then(T::from_object_mut)
    }

    pub fn get_object(&self, mrid: &str) -> Option<&CimObject> {
        self.objects.get(mrid)
    }

    /// Looks up the target of a reference, whatever its kind.
    ///
    /// The returned borrow points at the single stored instance, so two
    /// references to the same mRID resolve to the same object.
    pub fn resolve(&self, mrid: &str) -> Option<&CimObject> {
        self.objects.get(mrid)
    }

    pub fn remove(&mut self, mrid: &str) -> Option<CimObject> {
        let object = self.objects.remove(mrid)?;
        if let Some(ids) = self.by_kind.get_mut(&object.kind()) {
            ids.remove(mrid);
        }
        if let Some(eq) = object.equipment() {
            for container in &eq.containers {
                if let Some(members) = self.by_container.get_mut(container) {
                    members.remove(mrid);
                }
            }
        }
        Some(object)
    }

    pub fn contains(&self, mrid: &str) -> bool {
        self.objects.contains_key(mrid)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Iterates over every object in mRID order.
    pub fn objects(&self) -> impl Iterator<Item = &CimObject> {
        self.objects.values()
    }

    /// Iterates over every object of type `T` in mRID order.
    pub fn objects_of<'a, T: CimType + 'a>(&'a self) -> impl Iterator<Item = &'a T> {
        self.by_kind
            .get(&T::KIND)
            .into_iter()
            .flatten()
            .filter_map(|mrid| self.get::<T>(mrid))
    }

    pub fn count_of(&self, kind: ObjectKind) -> usize {
        self.by_kind.get(&kind).map_or(0, BTreeSet::len)
    }

    /// mRIDs of the equipment assigned to `container`.
    pub fn contained_in<'a>(&'a self, container: &str) -> impl Iterator<Item = &'a str> + use<'a> {
        self.by_container
            .get(container)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// Records that `equipment` belongs to `container`.
    ///
    /// The container itself does not need to be present, since it may live
    /// in another service.
    pub fn assign_to_container(
        &mut self,
        equipment: &str,
        container: &str,
    ) -> Result<(), ServiceError> {
        let object = self
            .objects
            .get_mut(equipment)
            .ok_or_else(|| ServiceError::NotFound(equipment.to_string()))?;
        let kind = object.kind();
        let block = object.equipment_mut().ok_or_else(|| ServiceError::NotEquipment {
            mrid: equipment.to_string(),
            kind,
        })?;
        if !block.containers.iter().any(|c| c == container) {
            block.containers.push(container.to_string());
        }
        self.by_container
            .entry(container.to_string())
            .or_default()
            .insert(equipment.to_string());
        Ok(())
    }

    /// Rebuilds the container index from the equipment blocks.
    pub fn reindex_containers(&mut self) {
        self.by_container.clear();
        for object in self.objects.values() {
            if let Some(eq) = object.equipment() {
                for container in &eq.containers {
                    self.by_container
                        .entry(container.clone())
                        .or_default()
                        .insert(object.mrid().to_string());
                }
            }
        }
    }

    /// Terminals attached to a piece of conducting equipment, by sequence number.
    pub fn terminals_of(&self, equipment: &str) -> Vec<&Terminal> {
        let mut terminals: Vec<&Terminal> = self
            .objects_of::<Terminal>()
            .filter(|t| t.conducting_equipment.as_deref() == Some(equipment))
            .collect();
        terminals.sort_by_key(|t| t.sequence_number);
        terminals
    }

    /// Terminals connected at a connectivity node.
    pub fn terminals_at(&self, node: &str) -> Vec<&Terminal> {
        self.objects_of::<Terminal>()
            .filter(|t| t.connectivity_node.as_deref() == Some(node))
            .collect()
    }

    /// Usage points supplied by a piece of equipment.
    pub fn usage_points_of(&self, equipment: &str) -> Vec<&UsagePoint> {
        self.objects_of::<UsagePoint>()
            .filter(|up| up.equipment.iter().any(|e| e == equipment))
            .collect()
    }

    /// Agreements held by a customer.
    pub fn agreements_of(&self, customer: &str) -> Vec<&CustomerAgreement> {
        self.objects_of::<CustomerAgreement>()
            .filter(|a| a.customer.as_deref() == Some(customer))
            .collect()
    }

    fn insert_indexed(&mut self, object: CimObject) {
        let mrid = object.mrid().to_string();
        self.by_kind
            .entry(object.kind())
            .or_default()
            .insert(mrid.clone());
        if let Some(eq) = object.equipment() {
            for container in &eq.containers {
                self.by_container
                    .entry(container.clone())
                    .or_default()
                    .insert(mrid.clone());
            }
        }
        self.objects.insert(mrid, object);
    }
}
