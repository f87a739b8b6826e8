//! Tracking datasets: parent/child linking graphs between segmented objects
//! across sequence steps.
//!
//! A tracking type names a directed relation between (parent namespace,
//! parent sequence index) and (child namespace, child sequence index). Per
//! image coordinate and tracking type, one flat two-column linking table is
//! stored at a path spelling out the relation:
//!
//! ```text
//! DataSet_{code}/
//!     R{r}_C{c}_F{f}_S{s}/
//!         ParentNS/{parent id}/ParentSID/{n}/ChildNS/{child id}/ChildSID/{m}/
//!             Linking      int array, narrowest width, deflated when large
//! ```
//!
//! Registered tracking types are deduplicated and persisted in their natural
//! sort order on [`TrackingDatasetWriter::finish`].

use tracing::trace;

use crate::coords::{Geometry, ImageId};
use crate::linking::{LinkingBuilder, ObjectLinking};
use crate::registry::{ObjectTypeStore, TrackingTypeHandle};
use crate::store::{ArrayValue, Group, IntArray};
use crate::util::{Error, Result};

use super::{
    create_image_scaffold, load_registry, persist_registry, Annotations, AnnotationsMut,
    CellLevelDatasetType, DatasetCore, FormatDescriptor,
};

/// Format type of tracking datasets.
pub const TRACKING_FORMAT_TYPE: &str = "ObjectTracking";
/// Current format version of tracking datasets.
pub const TRACKING_FORMAT_VERSION: i32 = 1;

const LINKING_ARRAY: &str = "Linking";
const LINKING_COLUMNS: usize = 2;

/// Storage path of one linking table below its coordinate group.
fn linking_path(
    parent_namespace: &str,
    parent_sequence_index: u32,
    child_namespace: &str,
    child_sequence_index: u32,
) -> String {
    format!(
        "ParentNS/{parent_namespace}/ParentSID/{parent_sequence_index}/ChildNS/\
         {child_namespace}/ChildSID/{child_sequence_index}"
    )
}

fn resolve_path(registry: &ObjectTypeStore, handle: TrackingTypeHandle) -> Result<String> {
    let descriptor = *registry.tracking_type(handle)?;
    let (parent, child) = registry.tracking_namespaces(handle)?;
    Ok(linking_path(
        registry.namespace(parent)?.id(),
        descriptor.parent_sequence_index,
        registry.namespace(child)?.id(),
        descriptor.child_sequence_index,
    ))
}

/// Write handle for one tracking dataset within an open container.
pub struct TrackingDatasetWriter<'a> {
    group: &'a mut Group,
    core: DatasetCore,
    registry: ObjectTypeStore,
}

impl<'a> TrackingDatasetWriter<'a> {
    pub(crate) fn create(group: &'a mut Group, core: DatasetCore) -> Result<Self> {
        FormatDescriptor::new(
            CellLevelDatasetType::Tracking,
            TRACKING_FORMAT_TYPE,
            TRACKING_FORMAT_VERSION,
        )?
        .write_into(group);
        core.write_into(group);
        create_image_scaffold(group, &core.geometry, core.sequence_length);
        let registry = ObjectTypeStore::new(core.code.clone());
        Ok(Self { group, core, registry })
    }

    pub fn code(&self) -> &str {
        &self.core.code
    }

    pub fn geometry(&self) -> Geometry {
        self.core.geometry
    }

    pub fn sequence_length(&self) -> u32 {
        self.core.sequence_length
    }

    /// The namespace/tracking-type registry of this dataset.
    pub fn registry(&self) -> &ObjectTypeStore {
        &self.registry
    }

    /// The registry, mutable, for registering namespaces and tracking types.
    pub fn registry_mut(&mut self) -> &mut ObjectTypeStore {
        &mut self.registry
    }

    /// Write the linking table of one (image, tracking type). The storage
    /// width is the narrowest holding every id; large tables are deflated.
    /// Write-once per (image, tracking type).
    pub fn write_object_tracking(
        &mut self,
        id: &ImageId,
        tracking_type: TrackingTypeHandle,
        links: &LinkingBuilder,
    ) -> Result<()> {
        self.core.geometry.check_image(id);
        let path = resolve_path(&self.registry, tracking_type)?;
        trace!(
            dataset = %self.core.code,
            image = %id,
            path = %path,
            links = links.len(),
            "writing object tracking"
        );
        let leaf = self
            .group
            .child_mut(&id.object_name())?
            .descend_or_create(&path);
        if leaf.has_array(LINKING_ARRAY) {
            return Err(Error::illegal(format!(
                "tracking data at {id} for '{path}' is already written"
            )));
        }
        let array =
            IntArray::new(links.storage_width(), links.should_deflate(), links.sorted_flat())?;
        leaf.set_array(LINKING_ARRAY, ArrayValue::Int(array));
        Ok(())
    }

    /// Persist the registered tracking types, in their natural sort order.
    /// Must be called after the last write.
    pub fn finish(&mut self) -> Result<()> {
        persist_registry(self.group, &self.registry)
    }

    /// The dataset annotations, writable.
    pub fn annotations(&mut self) -> AnnotationsMut<'_> {
        AnnotationsMut::new(self.group)
    }
}

/// Read handle for one tracking dataset.
#[derive(Debug)]
pub struct TrackingDatasetReader<'a> {
    group: &'a Group,
    core: DatasetCore,
    registry: ObjectTypeStore,
}

impl<'a> TrackingDatasetReader<'a> {
    pub(crate) fn open(code: &str, group: &'a Group, type_options: &[String]) -> Result<Self> {
        FormatDescriptor::read_from(group, type_options, code)?.check(
            CellLevelDatasetType::Tracking,
            TRACKING_FORMAT_TYPE,
            TRACKING_FORMAT_VERSION,
            code,
        )?;
        let core = DatasetCore::read_from(code, group)?;
        let registry = load_registry(code, group)?;
        Ok(Self { group, core, registry })
    }

    pub fn code(&self) -> &str {
        &self.core.code
    }

    pub fn geometry(&self) -> Geometry {
        self.core.geometry
    }

    pub fn sequence_length(&self) -> u32 {
        self.core.sequence_length
    }

    /// The namespace/tracking-type registry of this dataset.
    pub fn registry(&self) -> &ObjectTypeStore {
        &self.registry
    }

    /// All registered tracking types, in their natural sort order.
    pub fn tracking_types(&self) -> Vec<TrackingTypeHandle> {
        self.registry.tracking_types_sorted().map(|(handle, _)| handle).collect()
    }

    /// Look up a tracking type by its descriptor.
    pub fn find_tracking_type(
        &self,
        parent_namespace: &str,
        parent_sequence_index: u32,
        child_namespace: &str,
        child_sequence_index: u32,
    ) -> Option<TrackingTypeHandle> {
        let parent = self.registry.namespace_by_id(parent_namespace)?;
        let child = self.registry.namespace_by_id(child_namespace)?;
        self.registry.tracking_types_sorted().find_map(|(handle, descriptor)| {
            let (p, c) = self.registry.tracking_namespaces(handle).ok()?;
            (p == parent
                && c == child
                && descriptor.parent_sequence_index == parent_sequence_index
                && descriptor.child_sequence_index == child_sequence_index)
                .then_some(handle)
        })
    }

    /// The linking table of one (image, tracking type). Absent data is an
    /// illegal argument with a descriptive message, not a raw storage error.
    pub fn get_object_linking(
        &self,
        id: &ImageId,
        tracking_type: TrackingTypeHandle,
    ) -> Result<ObjectLinking> {
        self.core.geometry.check_image(id);
        let path = resolve_path(&self.registry, tracking_type)?;
        let flat = self
            .group
            .child(&id.object_name())
            .and_then(|coordinate| coordinate.descend(&path))
            .and_then(|leaf| leaf.array(LINKING_ARRAY))
            .map_err(|_| {
                Error::illegal(format!(
                    "no tracking data for image {id} and relation '{path}' in dataset '{}'",
                    self.core.code
                ))
            })?
            .as_int(LINKING_ARRAY)?;
        ObjectLinking::new(LINKING_COLUMNS, &flat.data)
    }

    /// The dataset annotations.
    pub fn annotations(&self) -> Annotations<'_> {
        Annotations::new(self.group)
    }
}
