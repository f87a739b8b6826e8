//! Namespace / object-type / tracking-type registry.
//!
//! All entities are owned by per-dataset arenas and referred to through
//! index handles; cross-references are indices resolved through the owning
//! registry, never back-pointers. Every handle carries the tag of the
//! registry that minted it, so using a handle against a different dataset
//! (or another open container) fails with [`Error::WrongDataset`] instead of
//! silently mixing datasets.
//!
//! Ids are normalized to uppercase; uniqueness is case-insensitive and
//! shared between object types and their companion groups.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::util::{Error, Result};

static NEXT_REGISTRY_TAG: AtomicU64 = AtomicU64::new(1);

/// Identity of one registry instance (one open dataset).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct RegistryTag(u64);

impl RegistryTag {
    fn mint() -> Self {
        Self(NEXT_REGISTRY_TAG.fetch_add(1, Ordering::Relaxed))
    }
}

/// Handle to an [`ObjectNamespace`] within its owning registry.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct NamespaceHandle {
    tag: RegistryTag,
    pub(crate) index: u32,
}

/// Handle to an object type within its owning registry.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ObjectTypeHandle {
    tag: RegistryTag,
    pub(crate) index: u32,
}

/// Handle to a tracking type within its owning registry.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct TrackingTypeHandle {
    tag: RegistryTag,
    pub(crate) index: u32,
}

/// A named grouping of object types, scoped to one dataset.
#[derive(Debug)]
pub struct ObjectNamespace {
    id: String,
    types: Vec<u32>,
    /// Object count per coordinate name; first write wins.
    object_counts: HashMap<String, usize>,
}

impl ObjectNamespace {
    pub fn id(&self) -> &str {
        &self.id
    }
}

/// A named category of segmented objects, belonging to exactly one namespace.
#[derive(Debug)]
pub struct ObjectType {
    id: String,
    namespace: u32,
    companion_groups: Vec<String>,
}

impl ObjectType {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn companion_groups(&self) -> &[String] {
        &self.companion_groups
    }
}

/// A directed relation descriptor between (parent namespace, parent sequence
/// index) and (child namespace, child sequence index).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ObjectTrackingType {
    pub(crate) parent_namespace: u32,
    pub parent_sequence_index: u32,
    pub(crate) child_namespace: u32,
    pub child_sequence_index: u32,
}

#[derive(Debug)]
enum IdSlot {
    Namespace(u32),
    ObjectType(u32),
    CompanionGroup,
}

/// Arena-owned registry of namespaces, object types, and tracking types for
/// one dataset within one container.
#[derive(Debug)]
pub struct ObjectTypeStore {
    tag: RegistryTag,
    dataset_code: String,
    namespaces: Vec<ObjectNamespace>,
    types: Vec<ObjectType>,
    /// Uppercased id -> slot; enforces case-insensitive uniqueness across
    /// namespaces and across the shared type/companion-group space.
    ids: HashMap<String, IdSlot>,
    /// Sort key -> arena index; doubles as the deduplication set.
    tracking_types: BTreeMap<(String, u32, String, u32), u32>,
    tracking_arena: Vec<ObjectTrackingType>,
}

impl ObjectTypeStore {
    /// Create an empty registry for the given dataset.
    pub fn new(dataset_code: impl Into<String>) -> Self {
        Self {
            tag: RegistryTag::mint(),
            dataset_code: dataset_code.into(),
            namespaces: Vec::new(),
            types: Vec::new(),
            ids: HashMap::new(),
            tracking_types: BTreeMap::new(),
            tracking_arena: Vec::new(),
        }
    }

    pub fn dataset_code(&self) -> &str {
        &self.dataset_code
    }

    // --- namespaces ---

    /// Register a namespace. Fails with [`Error::UniqueViolation`] if a
    /// namespace with the same id (case-insensitive) exists.
    pub fn add_namespace(&mut self, id: &str) -> Result<NamespaceHandle> {
        let normalized = id.to_uppercase();
        if self.ids.contains_key(&normalized) {
            return Err(Error::UniqueViolation(normalized));
        }
        let index = self.namespaces.len() as u32;
        self.namespaces.push(ObjectNamespace {
            id: normalized.clone(),
            types: Vec::new(),
            object_counts: HashMap::new(),
        });
        self.ids.insert(normalized, IdSlot::Namespace(index));
        Ok(NamespaceHandle { tag: self.tag, index })
    }

    /// Look up a namespace by id.
    pub fn namespace_by_id(&self, id: &str) -> Option<NamespaceHandle> {
        match self.ids.get(&id.to_uppercase()) {
            Some(IdSlot::Namespace(index)) => {
                Some(NamespaceHandle { tag: self.tag, index: *index })
            }
            _ => None,
        }
    }

    /// Resolve a namespace handle, checking it belongs to this registry.
    pub fn namespace(&self, handle: NamespaceHandle) -> Result<&ObjectNamespace> {
        let index = self.check_namespace(handle)?;
        Ok(&self.namespaces[index as usize])
    }

    /// All namespaces in registration order (the persisted enumerated
    /// encoding refers to namespaces by this ordinal).
    pub fn namespaces(&self) -> impl Iterator<Item = (NamespaceHandle, &ObjectNamespace)> {
        let tag = self.tag;
        self.namespaces
            .iter()
            .enumerate()
            .map(move |(i, ns)| (NamespaceHandle { tag, index: i as u32 }, ns))
    }

    // --- object types ---

    /// Register an object type under `namespace`. Fails with
    /// [`Error::UniqueViolation`] on a case-insensitive id clash.
    pub fn add_object_type(
        &mut self,
        id: &str,
        namespace: NamespaceHandle,
    ) -> Result<ObjectTypeHandle> {
        let ns = self.check_namespace(namespace)?;
        let normalized = id.to_uppercase();
        if self.ids.contains_key(&normalized) {
            return Err(Error::UniqueViolation(normalized));
        }
        let index = self.types.len() as u32;
        self.types.push(ObjectType {
            id: normalized.clone(),
            namespace: ns,
            companion_groups: Vec::new(),
        });
        self.namespaces[ns as usize].types.push(index);
        self.ids.insert(normalized, IdSlot::ObjectType(index));
        Ok(ObjectTypeHandle { tag: self.tag, index })
    }

    /// Register a companion group name for an object type. Companion groups
    /// share the uniqueness-checked id space with object types.
    pub fn add_object_type_companion_group(
        &mut self,
        id: &str,
        object_type: ObjectTypeHandle,
    ) -> Result<()> {
        let ty = self.check_object_type(object_type)?;
        let normalized = id.to_uppercase();
        if self.ids.contains_key(&normalized) {
            return Err(Error::UniqueViolation(normalized));
        }
        self.types[ty as usize].companion_groups.push(normalized.clone());
        self.ids.insert(normalized, IdSlot::CompanionGroup);
        Ok(())
    }

    /// Look up an object type by id.
    pub fn object_type_by_id(&self, id: &str) -> Option<ObjectTypeHandle> {
        match self.ids.get(&id.to_uppercase()) {
            Some(IdSlot::ObjectType(index)) => {
                Some(ObjectTypeHandle { tag: self.tag, index: *index })
            }
            _ => None,
        }
    }

    /// Resolve an object type handle, checking it belongs to this registry.
    pub fn object_type(&self, handle: ObjectTypeHandle) -> Result<&ObjectType> {
        let index = self.check_object_type(handle)?;
        Ok(&self.types[index as usize])
    }

    /// The namespace an object type belongs to.
    pub fn namespace_of(&self, handle: ObjectTypeHandle) -> Result<NamespaceHandle> {
        let index = self.check_object_type(handle)?;
        Ok(NamespaceHandle { tag: self.tag, index: self.types[index as usize].namespace })
    }

    /// All object types of a namespace.
    pub fn types_of(&self, namespace: NamespaceHandle) -> Result<Vec<ObjectTypeHandle>> {
        let ns = self.check_namespace(namespace)?;
        Ok(self.namespaces[ns as usize]
            .types
            .iter()
            .map(|&index| ObjectTypeHandle { tag: self.tag, index })
            .collect())
    }

    // --- object counts ---

    /// Establish or verify the object count of a namespace at a coordinate.
    /// The first call fixes the count; later calls with a different count
    /// fail with [`Error::WrongNumberOfSegmentedObjects`].
    pub fn set_or_check_object_count(
        &mut self,
        namespace: NamespaceHandle,
        coordinate: &str,
        count: usize,
    ) -> Result<()> {
        let ns = self.check_namespace(namespace)?;
        let entry = &mut self.namespaces[ns as usize];
        match entry.object_counts.get(coordinate) {
            None => {
                entry.object_counts.insert(coordinate.to_string(), count);
                Ok(())
            }
            Some(&expected) if expected == count => Ok(()),
            Some(&expected) => Err(Error::WrongNumberOfSegmentedObjects {
                namespace: entry.id.clone(),
                coordinate: coordinate.to_string(),
                expected,
                actual: count,
            }),
        }
    }

    /// The established object count of a namespace at a coordinate, if any.
    pub fn object_count(&self, namespace: NamespaceHandle, coordinate: &str) -> Result<Option<usize>> {
        let ns = self.check_namespace(namespace)?;
        Ok(self.namespaces[ns as usize].object_counts.get(coordinate).copied())
    }

    // --- tracking types ---

    /// Register a tracking type, deduplicating equal descriptors: adding the
    /// same (parent namespace, parent seq, child namespace, child seq) twice
    /// returns the existing handle.
    pub fn add_tracking_type(
        &mut self,
        parent_namespace: NamespaceHandle,
        parent_sequence_index: u32,
        child_namespace: NamespaceHandle,
        child_sequence_index: u32,
    ) -> Result<TrackingTypeHandle> {
        let parent = self.check_namespace(parent_namespace)?;
        let child = self.check_namespace(child_namespace)?;
        let key = (
            self.namespaces[parent as usize].id.clone(),
            parent_sequence_index,
            self.namespaces[child as usize].id.clone(),
            child_sequence_index,
        );
        let index = match self.tracking_types.entry(key) {
            Entry::Occupied(slot) => *slot.get(),
            Entry::Vacant(slot) => {
                let index = self.tracking_arena.len() as u32;
                self.tracking_arena.push(ObjectTrackingType {
                    parent_namespace: parent,
                    parent_sequence_index,
                    child_namespace: child,
                    child_sequence_index,
                });
                slot.insert(index);
                index
            }
        };
        Ok(TrackingTypeHandle { tag: self.tag, index })
    }

    /// Resolve a tracking type handle, checking it belongs to this registry.
    pub fn tracking_type(&self, handle: TrackingTypeHandle) -> Result<&ObjectTrackingType> {
        self.check_tag(handle.tag, "tracking type", handle.index)?;
        self.tracking_arena
            .get(handle.index as usize)
            .ok_or_else(|| Error::illegal("stale tracking type handle"))
    }

    /// The parent/child namespace handles of a tracking type.
    pub fn tracking_namespaces(
        &self,
        handle: TrackingTypeHandle,
    ) -> Result<(NamespaceHandle, NamespaceHandle)> {
        let t = self.tracking_type(handle)?;
        Ok((
            NamespaceHandle { tag: self.tag, index: t.parent_namespace },
            NamespaceHandle { tag: self.tag, index: t.child_namespace },
        ))
    }

    /// All tracking types in their natural order: (parent namespace id,
    /// parent seq index, child namespace id, child seq index). This is the
    /// persisted order.
    pub fn tracking_types_sorted(
        &self,
    ) -> impl Iterator<Item = (TrackingTypeHandle, &ObjectTrackingType)> {
        let tag = self.tag;
        self.tracking_types.values().map(move |&index| {
            (
                TrackingTypeHandle { tag, index },
                &self.tracking_arena[index as usize],
            )
        })
    }

    // --- tag checks ---

    fn check_namespace(&self, handle: NamespaceHandle) -> Result<u32> {
        self.check_tag(handle.tag, "object namespace", handle.index)?;
        if handle.index as usize >= self.namespaces.len() {
            return Err(Error::illegal("stale namespace handle"));
        }
        Ok(handle.index)
    }

    fn check_object_type(&self, handle: ObjectTypeHandle) -> Result<u32> {
        self.check_tag(handle.tag, "object type", handle.index)?;
        if handle.index as usize >= self.types.len() {
            return Err(Error::illegal("stale object type handle"));
        }
        Ok(handle.index)
    }

    fn check_tag(&self, tag: RegistryTag, entity: &'static str, index: u32) -> Result<()> {
        if tag == self.tag {
            return Ok(());
        }
        Err(Error::WrongDataset {
            entity,
            id: format!("#{index}"),
            owner: self.dataset_code.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_uniqueness() {
        let mut reg = ObjectTypeStore::new("d1");
        let ns = reg.add_namespace("cells").unwrap();
        assert_eq!(reg.namespace(ns).unwrap().id(), "CELLS");

        // Differs only in case: rejected.
        assert!(matches!(
            reg.add_namespace("Cells"),
            Err(Error::UniqueViolation(_))
        ));
        // Genuinely distinct id: accepted.
        assert!(reg.add_namespace("nuclei").is_ok());

        let ty = reg.add_object_type("nucleus", ns).unwrap();
        assert!(matches!(
            reg.add_object_type("NUCLEUS", ns),
            Err(Error::UniqueViolation(_))
        ));
        // Companion groups share the id space with object types.
        assert!(matches!(
            reg.add_object_type_companion_group("Nucleus", ty),
            Err(Error::UniqueViolation(_))
        ));
        reg.add_object_type_companion_group("NUCLEUS_SHAPE", ty).unwrap();
        assert_eq!(
            reg.object_type(ty).unwrap().companion_groups(),
            &["NUCLEUS_SHAPE".to_string()]
        );
    }

    #[test]
    fn test_wrong_dataset_rejected() {
        let mut reg_a = ObjectTypeStore::new("a");
        let mut reg_b = ObjectTypeStore::new("b");
        let ns_a = reg_a.add_namespace("CELLS").unwrap();
        let ns_b = reg_b.add_namespace("CELLS").unwrap();

        assert!(reg_a.namespace(ns_a).is_ok());
        assert!(matches!(
            reg_b.namespace(ns_a),
            Err(Error::WrongDataset { .. })
        ));
        assert!(matches!(
            reg_a.add_object_type("NUCLEUS", ns_b),
            Err(Error::WrongDataset { .. })
        ));
    }

    #[test]
    fn test_object_count_first_write_wins() {
        let mut reg = ObjectTypeStore::new("d1");
        let ns = reg.add_namespace("CELLS").unwrap();

        assert_eq!(reg.object_count(ns, "R0_C0_F0_S0").unwrap(), None);
        reg.set_or_check_object_count(ns, "R0_C0_F0_S0", 5).unwrap();
        reg.set_or_check_object_count(ns, "R0_C0_F0_S0", 5).unwrap();
        // Independent coordinate, independent count.
        reg.set_or_check_object_count(ns, "R0_C1_F0_S0", 9).unwrap();

        let err = reg.set_or_check_object_count(ns, "R0_C0_F0_S0", 6).unwrap_err();
        assert!(matches!(
            err,
            Error::WrongNumberOfSegmentedObjects { expected: 5, actual: 6, .. }
        ));
    }

    #[test]
    fn test_tracking_type_dedup_and_order() {
        let mut reg = ObjectTypeStore::new("d1");
        let cells = reg.add_namespace("CELLS").unwrap();
        let nuclei = reg.add_namespace("ANAPHASE").unwrap();

        let t1 = reg.add_tracking_type(cells, 0, cells, 1).unwrap();
        let t2 = reg.add_tracking_type(cells, 0, cells, 1).unwrap();
        assert_eq!(t1, t2);

        reg.add_tracking_type(nuclei, 0, cells, 1).unwrap();
        reg.add_tracking_type(cells, 0, nuclei, 0).unwrap();

        let order: Vec<(String, u32, String, u32)> = reg
            .tracking_types_sorted()
            .map(|(_, t)| {
                (
                    reg.namespaces[t.parent_namespace as usize].id.clone(),
                    t.parent_sequence_index,
                    reg.namespaces[t.child_namespace as usize].id.clone(),
                    t.child_sequence_index,
                )
            })
            .collect();
        assert_eq!(
            order,
            vec![
                ("ANAPHASE".into(), 0, "CELLS".into(), 1),
                ("CELLS".into(), 0, "ANAPHASE".into(), 0),
                ("CELLS".into(), 0, "CELLS".into(), 1),
            ]
        );
    }
}
