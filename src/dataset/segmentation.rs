//! Segmentation datasets: per-image object bounding boxes and pixel masks.
//!
//! Storage layout per image coordinate, all at the dataset root:
//!
//! ```text
//! DataSet_{code}/
//!     Index_R{r}_C{c}_F{f}_S{s}       compound array: box + offset per object
//!     Masks_R{r}_C{c}_F{f}_S{s}       one packed bit-vector for all masks
//!     EdgeMasks_R{r}_C{c}_F{f}_S{s}   packed edge masks (optional)
//! ```
//!
//! The write is two-pass: a first pass assigns each object its word-aligned
//! bit offset by a cumulative sum over the input order, a second pass copies
//! every mask into one shared bit-vector. Each artifact is stored with a
//! single write call. Reading a whole field is one bit-vector read plus
//! in-memory window slicing; point queries test the shared vector directly
//! after a cheap bounding-box rejection.

use tracing::trace;

use crate::coords::{Geometry, ImageId};
use crate::object::{EdgeDetector, FourNeighborEdgeDetector, SegmentedObject, SegmentedObjectBox};
use crate::registry::{ObjectTypeHandle, ObjectTypeStore};
use crate::store::{
    ArrayValue, CompoundArray, CompoundSchema, FieldDef, FieldType, FieldValue, Group, Record,
};
use crate::util::{BitVec, Error, Result, WORD_BITS};

use super::{
    create_image_scaffold, load_registry, persist_registry, Annotations, AnnotationsMut,
    CellLevelDatasetType, DatasetCore, FormatDescriptor,
};

use smallvec::smallvec;

/// Format type of segmentation datasets.
pub const SEGMENTATION_FORMAT_TYPE: &str = "ImageSegmentation";
/// Current format version of segmentation datasets.
pub const SEGMENTATION_FORMAT_VERSION: i32 = 1;

const INDEX_PREFIX: &str = "Index";
const MASKS_PREFIX: &str = "Masks";
const EDGE_MASKS_PREFIX: &str = "EdgeMasks";

fn index_schema() -> CompoundSchema {
    CompoundSchema::new(vec![
        FieldDef::new("MinX", FieldType::Int32),
        FieldDef::new("MinY", FieldType::Int32),
        FieldDef::new("MaxX", FieldType::Int32),
        FieldDef::new("MaxY", FieldType::Int32),
        FieldDef::new("Offset", FieldType::Int64),
        FieldDef::new("NumBits", FieldType::Int32),
    ])
}

fn index_record(object: &SegmentedObject) -> Result<Record> {
    let bbox = object.bbox();
    Ok(smallvec![
        FieldValue::Int(bbox.min_x as i64),
        FieldValue::Int(bbox.min_y as i64),
        FieldValue::Int(bbox.max_x as i64),
        FieldValue::Int(bbox.max_y as i64),
        FieldValue::Int(bbox.offset()? as i64),
        FieldValue::Int(bbox.num_bits() as i64),
    ])
}

/// Decode one index record into a box with its offset assigned.
fn box_from_record(record: &Record) -> Result<SegmentedObjectBox> {
    let int = |index: usize| -> Result<i64> {
        match record.get(index) {
            Some(FieldValue::Int(v)) => Ok(*v),
            _ => Err(Error::format("malformed segmentation index record".to_string())),
        }
    };
    let mut bbox = SegmentedObjectBox::new(
        int(0)? as u16,
        int(1)? as u16,
        int(2)? as u16,
        int(3)? as u16,
    )?;
    bbox.assign_offset(int(4)? as u64);
    Ok(bbox)
}

/// Write handle for one segmentation dataset within an open container.
pub struct SegmentationDatasetWriter<'a> {
    group: &'a mut Group,
    core: DatasetCore,
    registry: ObjectTypeStore,
    store_edge_masks: bool,
    edge_detector: Box<dyn EdgeDetector>,
}

impl<'a> SegmentationDatasetWriter<'a> {
    pub(crate) fn create(
        group: &'a mut Group,
        core: DatasetCore,
        store_edge_masks: bool,
    ) -> Result<Self> {
        FormatDescriptor::new(
            CellLevelDatasetType::Segmentation,
            SEGMENTATION_FORMAT_TYPE,
            SEGMENTATION_FORMAT_VERSION,
        )?
        .write_into(group);
        core.write_into(group);
        create_image_scaffold(group, &core.geometry, core.sequence_length);
        let registry = ObjectTypeStore::new(core.code.clone());
        Ok(Self {
            group,
            core,
            registry,
            store_edge_masks,
            edge_detector: Box::new(FourNeighborEdgeDetector),
        })
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

    /// Replace the edge detector used when edge masks are stored but not
    /// supplied by the caller.
    pub fn with_edge_detector(mut self, detector: Box<dyn EdgeDetector>) -> Self {
        self.edge_detector = detector;
        self
    }

    /// The namespace/object-type registry of this dataset.
    pub fn registry(&self) -> &ObjectTypeStore {
        &self.registry
    }

    /// The registry, mutable, for registering namespaces and object types.
    pub fn registry_mut(&mut self) -> &mut ObjectTypeStore {
        &mut self.registry
    }

    /// Write the segmentation of one image. Assigns each object its bit
    /// offset in input order, so `objects` is mutable; the offsets remain
    /// valid on the caller's side afterwards. Write-once per image. The
    /// object count is checked against the count the namespace has
    /// established at this coordinate, if any.
    pub fn write_image_segmentation(
        &mut self,
        id: &ImageId,
        object_type: ObjectTypeHandle,
        objects: &mut [SegmentedObject],
    ) -> Result<()> {
        self.core.geometry.check_image(id);
        let namespace = self.registry.namespace_of(object_type)?;
        let index_name = id.object_name_with_prefix(INDEX_PREFIX);
        if self.group.has_array(&index_name) {
            return Err(Error::illegal(format!("segmentation at {id} is already written")));
        }
        self.registry
            .set_or_check_object_count(namespace, &id.object_name(), objects.len())?;

        // Pass 1: word-aligned offsets by cumulative sum over input order.
        let mut total_words = 0usize;
        for object in objects.iter_mut() {
            object.bbox_mut().assign_offset((total_words * WORD_BITS) as u64);
            total_words += object.bbox().size_in_words();
        }

        // Pass 2: pack every mask into one shared vector.
        let mut masks = BitVec::zeroed(total_words * WORD_BITS);
        let mut edge_masks =
            self.store_edge_masks.then(|| BitVec::zeroed(total_words * WORD_BITS));
        let mut index = CompoundArray::new(index_schema(), 0, true);
        for object in objects.iter() {
            let offset = object.bbox().offset()? as usize;
            let num_bits = object.bbox().num_bits();
            masks.copy_bits(object.mask(), 0, offset, num_bits);
            if let Some(edge_masks) = &mut edge_masks {
                let edge = object.edge_mask(self.edge_detector.as_ref());
                edge_masks.copy_bits(&edge, 0, offset, num_bits);
            }
            index.append(&[index_record(object)?])?;
        }

        trace!(
            dataset = %self.core.code,
            image = %id,
            objects = objects.len(),
            bits = masks.len(),
            "writing image segmentation"
        );
        self.group.set_array(&index_name, ArrayValue::Compound(index));
        self.group
            .set_array(&id.object_name_with_prefix(MASKS_PREFIX), ArrayValue::Bits(masks));
        if let Some(edge_masks) = edge_masks {
            self.group.set_array(
                &id.object_name_with_prefix(EDGE_MASKS_PREFIX),
                ArrayValue::Bits(edge_masks),
            );
        }
        Ok(())
    }

    /// Persist the registry. Must be called after the last write.
    pub fn finish(&mut self) -> Result<()> {
        persist_registry(self.group, &self.registry)
    }

    /// The dataset annotations, writable.
    pub fn annotations(&mut self) -> AnnotationsMut<'_> {
        AnnotationsMut::new(self.group)
    }
}

/// Read handle for one segmentation dataset.
pub struct SegmentationDatasetReader<'a> {
    group: &'a Group,
    core: DatasetCore,
    registry: ObjectTypeStore,
    edge_detector: Box<dyn EdgeDetector>,
}

impl<'a> SegmentationDatasetReader<'a> {
    pub(crate) fn open(code: &str, group: &'a Group, type_options: &[String]) -> Result<Self> {
        FormatDescriptor::read_from(group, type_options, code)?.check(
            CellLevelDatasetType::Segmentation,
            SEGMENTATION_FORMAT_TYPE,
            SEGMENTATION_FORMAT_VERSION,
            code,
        )?;
        let core = DatasetCore::read_from(code, group)?;
        let registry = load_registry(code, group)?;
        Ok(Self { group, core, registry, edge_detector: Box::new(FourNeighborEdgeDetector) })
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

    /// The namespace/object-type registry of this dataset.
    pub fn registry(&self) -> &ObjectTypeStore {
        &self.registry
    }

    /// Whether a segmentation was written for `id`.
    pub fn has_segmentation(&self, id: &ImageId) -> bool {
        self.core.geometry.check_image(id);
        self.group.has_array(&id.object_name_with_prefix(INDEX_PREFIX))
    }

    /// Number of segmented objects at `id`.
    pub fn object_count(&self, id: &ImageId) -> Result<usize> {
        Ok(self.index(id)?.records.len())
    }

    /// All objects of one image. One bit-vector read per artifact; the
    /// per-object masks are sliced out in memory.
    pub fn get_objects(&self, id: &ImageId, with_edge_masks: bool) -> Result<Vec<SegmentedObject>> {
        let index = self.index(id)?;
        let masks = self.masks(id)?;
        let stored_edges = if with_edge_masks { self.try_edge_masks(id)? } else { None };

        let mut objects = Vec::with_capacity(index.records.len());
        for record in &index.records {
            let bbox = box_from_record(record)?;
            let offset = bbox.offset()? as usize;
            let object = SegmentedObject::new(bbox, masks.window(offset, bbox.num_bits()))?;
            let object = if with_edge_masks {
                let edge = match stored_edges {
                    Some(edges) => edges.window(offset, bbox.num_bits()),
                    None => object.edge_mask(self.edge_detector.as_ref()),
                };
                object.with_edge_mask(edge)?
            } else {
                object
            };
            objects.push(object);
        }
        Ok(objects)
    }

    /// One object of one image by index, reading only its window of the
    /// shared mask vector.
    pub fn get_object(
        &self,
        id: &ImageId,
        object_index: usize,
        with_edge_mask: bool,
    ) -> Result<SegmentedObject> {
        let index = self.index(id)?;
        let record = index.records.get(object_index).ok_or_else(|| {
            Error::illegal(format!(
                "object index {object_index} out of range at {id} ({} objects)",
                index.records.len()
            ))
        })?;
        let bbox = box_from_record(record)?;
        let offset = bbox.offset()? as usize;
        let masks = self.masks(id)?;
        let object = SegmentedObject::new(bbox, masks.window(offset, bbox.num_bits()))?;
        if !with_edge_mask {
            return Ok(object);
        }
        let edge = match self.try_edge_masks(id)? {
            Some(edges) => edges.window(offset, bbox.num_bits()),
            None => object.edge_mask(self.edge_detector.as_ref()),
        };
        object.with_edge_mask(edge)
    }

    /// Find the object covering pixel (x, y), if any. Scans the box index
    /// with cheap bounds rejection; only candidate boxes cost a bit test in
    /// the shared mask vector. Returns the object index and the object.
    pub fn try_find_object(
        &self,
        id: &ImageId,
        x: u16,
        y: u16,
    ) -> Result<Option<(usize, SegmentedObject)>> {
        let index = self.index(id)?;
        let masks = self.masks(id)?;
        for (i, record) in index.records.iter().enumerate() {
            let bbox = box_from_record(record)?;
            if !bbox.in_box(x, y) {
                continue;
            }
            if masks.get(bbox.absolute_bit_index(x, y)? as usize) {
                let offset = bbox.offset()? as usize;
                let object = SegmentedObject::new(bbox, masks.window(offset, bbox.num_bits()))?;
                return Ok(Some((i, object)));
            }
        }
        Ok(None)
    }

    /// The dataset annotations.
    pub fn annotations(&self) -> Annotations<'_> {
        Annotations::new(self.group)
    }

    fn index(&self, id: &ImageId) -> Result<&CompoundArray> {
        self.core.geometry.check_image(id);
        let name = id.object_name_with_prefix(INDEX_PREFIX);
        self.group
            .array(&name)
            .map_err(|_| {
                Error::illegal(format!(
                    "no segmentation for image {id} in dataset '{}'",
                    self.core.code
                ))
            })?
            .as_compound(&name)
    }

    fn masks(&self, id: &ImageId) -> Result<&BitVec> {
        let name = id.object_name_with_prefix(MASKS_PREFIX);
        self.group.array(&name)?.as_bits(&name)
    }

    fn try_edge_masks(&self, id: &ImageId) -> Result<Option<&BitVec>> {
        let name = id.object_name_with_prefix(EDGE_MASKS_PREFIX);
        if !self.group.has_array(&name) {
            return Ok(None);
        }
        Ok(Some(self.group.array(&name)?.as_bits(&name)?))
    }
}
