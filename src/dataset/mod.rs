//! Dataset abstraction shared by the four dataset variants.
//!
//! A dataset is a named, typed subtree `DataSet_{code}` within a container,
//! covering one [`Geometry`]. This module holds what all variants share:
//! the persisted format descriptor (type tag, format type, format version),
//! the geometry attributes, the per-coordinate scaffold, annotations, and
//! the sum type over the four read variants with checked conversions.

pub mod classification;
pub mod feature;
pub mod segmentation;
pub mod tracking;

pub use classification::{CategoryEnum, ClassificationDatasetReader, ClassificationDatasetWriter};
pub use feature::{FeatureBlock, FeatureDatasetReader, FeatureDatasetWriter, FeatureGroupDefinition};
pub use segmentation::{SegmentationDatasetReader, SegmentationDatasetWriter};
pub use tracking::{TrackingDatasetReader, TrackingDatasetWriter};

use std::collections::BTreeMap;

use smallvec::smallvec;

use crate::coords::{Geometry, ImageId, WellFieldId};
use crate::registry::{NamespaceHandle, ObjectTypeStore};
use crate::store::{
    ArrayValue, AttrValue, CompoundArray, CompoundSchema, FieldDef, FieldType, FieldValue,
    Group, Record,
};
use crate::util::{Error, Result};

/// Longest allowed format-type string in a dataset descriptor.
pub const MAX_FORMAT_TYPE_LEN: usize = 50;

/// Name of the compound descriptor attribute on a dataset group.
pub(crate) const DESCRIPTOR_ATTR: &str = "DatasetDescriptor";

pub(crate) const ROWS_ATTR: &str = "NumberOfRows";
pub(crate) const COLUMNS_ATTR: &str = "NumberOfColumns";
pub(crate) const FIELDS_ATTR: &str = "NumberOfFields";
pub(crate) const SEQUENCE_LENGTH_ATTR: &str = "SequenceLength";

const PLATE_BARCODE_ATTR: &str = "PlateBarcode";
const PARENT_DATASET_ATTR: &str = "ParentDatasetCode";
const TIME_SERIES_ARRAY: &str = "TimeSeriesDurations";
const DEPTH_SCAN_ARRAY: &str = "DepthScanValues";
const CUSTOM_SEQUENCE_ARRAY: &str = "SequenceDescriptions";
const ANNOTATIONS_GROUP: &str = "Annotations";

/// The kind tag of a dataset, persisted as an enumerated value.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum CellLevelDatasetType {
    Features,
    Classification,
    Segmentation,
    Tracking,
}

impl CellLevelDatasetType {
    /// The persisted option labels, in ordinal order.
    pub const OPTIONS: [&'static str; 4] =
        ["FEATURES", "CLASSIFICATION", "SEGMENTATION", "TRACKING"];

    pub const fn ordinal(&self) -> u8 {
        match self {
            CellLevelDatasetType::Features => 0,
            CellLevelDatasetType::Classification => 1,
            CellLevelDatasetType::Segmentation => 2,
            CellLevelDatasetType::Tracking => 3,
        }
    }

    pub const fn label(&self) -> &'static str {
        Self::OPTIONS[self.ordinal() as usize]
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "FEATURES" => Some(CellLevelDatasetType::Features),
            "CLASSIFICATION" => Some(CellLevelDatasetType::Classification),
            "SEGMENTATION" => Some(CellLevelDatasetType::Segmentation),
            "TRACKING" => Some(CellLevelDatasetType::Tracking),
            _ => None,
        }
    }
}

/// Storage path of a dataset subtree.
pub fn dataset_path(code: &str) -> String {
    format!("DataSet_{code}")
}

/// The per-dataset format descriptor persisted as one compound attribute.
#[derive(Clone, PartialEq, Debug)]
pub struct FormatDescriptor {
    pub dataset_type: CellLevelDatasetType,
    pub format_type: String,
    pub format_version: i32,
}

impl FormatDescriptor {
    pub fn new(
        dataset_type: CellLevelDatasetType,
        format_type: &str,
        format_version: i32,
    ) -> Result<Self> {
        if format_type.len() > MAX_FORMAT_TYPE_LEN {
            return Err(Error::illegal(format!(
                "format type '{format_type}' exceeds {MAX_FORMAT_TYPE_LEN} characters"
            )));
        }
        Ok(Self { dataset_type, format_type: format_type.to_string(), format_version })
    }

    pub(crate) fn write_into(&self, group: &mut Group) {
        group.set_attr(
            DESCRIPTOR_ATTR,
            AttrValue::Compound(vec![
                ("DatasetType".into(), AttrValue::Int(self.dataset_type.ordinal() as i64)),
                ("FormatType".into(), AttrValue::Str(self.format_type.clone())),
                ("FormatVersionNumber".into(), AttrValue::Int(self.format_version as i64)),
            ]),
        );
    }

    /// Read a descriptor, mapping the persisted type ordinal through the
    /// container-level option labels. An unknown ordinal or label is a
    /// fatal format error.
    pub(crate) fn read_from(group: &Group, type_options: &[String], code: &str) -> Result<Self> {
        let attr = group.attr(DESCRIPTOR_ATTR).map_err(|_| {
            Error::format(format!("dataset '{code}' has no format descriptor"))
        })?;
        let fields = attr.as_compound(DESCRIPTOR_ATTR)?;
        fn lookup<'f>(
            fields: &'f [(String, AttrValue)],
            name: &str,
            code: &str,
        ) -> Result<&'f AttrValue> {
            fields
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v)
                .ok_or_else(|| {
                    Error::format(format!("descriptor of '{code}' lacks field '{name}'"))
                })
        }

        let ordinal = lookup(fields, "DatasetType", code)?.as_int(DESCRIPTOR_ATTR)?;
        let label = type_options
            .get(ordinal as usize)
            .ok_or_else(|| {
                Error::format(format!("unknown dataset type ordinal {ordinal} in '{code}'"))
            })?;
        let dataset_type = CellLevelDatasetType::from_label(label).ok_or_else(|| {
            Error::format(format!("unknown dataset type label '{label}' in '{code}'"))
        })?;
        let format_type = lookup(fields, "FormatType", code)?.as_str(DESCRIPTOR_ATTR)?.to_string();
        let format_version =
            lookup(fields, "FormatVersionNumber", code)?.as_int(DESCRIPTOR_ATTR)? as i32;
        Ok(Self { dataset_type, format_type, format_version })
    }

    /// Compare against a variant's expected constants. A mismatch is fatal
    /// at open time, not deferred to first read.
    pub(crate) fn check(
        &self,
        expected_type: CellLevelDatasetType,
        expected_format_type: &str,
        expected_version: i32,
        code: &str,
    ) -> Result<()> {
        if self.dataset_type != expected_type {
            return Err(Error::WrongDatasetType {
                actual: self.dataset_type,
                requested: expected_type,
                dataset_code: code.to_string(),
            });
        }
        if self.format_type != expected_format_type {
            return Err(Error::format(format!(
                "dataset '{code}' has format type '{}', expected '{expected_format_type}'",
                self.format_type
            )));
        }
        if self.format_version != expected_version {
            return Err(Error::format(format!(
                "dataset '{code}' has format version {}, expected {expected_version}",
                self.format_version
            )));
        }
        Ok(())
    }
}

/// State shared by every dataset variant: code, geometry, sequence length.
#[derive(Clone, PartialEq, Debug)]
pub(crate) struct DatasetCore {
    pub code: String,
    pub geometry: Geometry,
    pub sequence_length: u32,
}

impl DatasetCore {
    pub fn new(code: impl Into<String>, geometry: Geometry, sequence_length: u32) -> Self {
        Self { code: code.into(), geometry, sequence_length }
    }

    pub fn write_into(&self, group: &mut Group) {
        group.set_attr(ROWS_ATTR, AttrValue::Int(self.geometry.rows as i64));
        group.set_attr(COLUMNS_ATTR, AttrValue::Int(self.geometry.columns as i64));
        group.set_attr(FIELDS_ATTR, AttrValue::Int(self.geometry.fields as i64));
        group.set_attr(SEQUENCE_LENGTH_ATTR, AttrValue::Int(self.sequence_length as i64));
    }

    pub fn read_from(code: &str, group: &Group) -> Result<Self> {
        let int_attr = |name: &str| -> Result<u32> {
            Ok(group.attr(name)?.as_int(name)? as u32)
        };
        Ok(Self {
            code: code.to_string(),
            geometry: Geometry::new(
                int_attr(ROWS_ATTR)?,
                int_attr(COLUMNS_ATTR)?,
                int_attr(FIELDS_ATTR)?,
            ),
            sequence_length: int_attr(SEQUENCE_LENGTH_ATTR)?,
        })
    }
}

/// Create the per-coordinate scaffold for a well-field addressed dataset,
/// storing the decoding attributes next to each coordinate.
pub(crate) fn create_well_field_scaffold(group: &mut Group, geometry: &Geometry) {
    for id in geometry.iter() {
        let g = group.ensure_child(&id.object_name());
        g.set_attr("Row", AttrValue::Int(id.row as i64));
        g.set_attr("Column", AttrValue::Int(id.column as i64));
        g.set_attr("Field", AttrValue::Int(id.field as i64));
    }
}

/// Create the per-coordinate scaffold for an image addressed dataset.
pub(crate) fn create_image_scaffold(group: &mut Group, geometry: &Geometry, sequence_length: u32) {
    for sequence in 0..sequence_length {
        for wf in geometry.iter() {
            let id = ImageId::new(wf.row, wf.column, wf.field, sequence);
            let g = group.ensure_child(&id.object_name());
            g.set_attr("Row", AttrValue::Int(id.row as i64));
            g.set_attr("Column", AttrValue::Int(id.column as i64));
            g.set_attr("Field", AttrValue::Int(id.field as i64));
            g.set_attr("SequenceIndex", AttrValue::Int(id.sequence as i64));
        }
    }
}

/// Re-derive an image id from the attributes stored on its coordinate group.
pub fn read_image_id(group: &Group) -> Result<ImageId> {
    let int_attr = |name: &str| -> Result<u32> {
        Ok(group.attr(name)?.as_int(name)? as u32)
    };
    Ok(ImageId::new(
        int_attr("Row")?,
        int_attr("Column")?,
        int_attr("Field")?,
        if group.has_attr("SequenceIndex") { int_attr("SequenceIndex")? } else { 0 },
    ))
}

/// Re-derive a well-field id from the attributes stored on its coordinate group.
pub fn read_well_field_id(group: &Group) -> Result<WellFieldId> {
    let id = read_image_id(group)?;
    Ok(id.well_field())
}

const NAMESPACES_ARRAY: &str = "Namespaces";
const OBJECT_TYPES_ARRAY: &str = "ObjectTypes";
const COMPANION_GROUPS_ARRAY: &str = "CompanionGroups";
const TRACKING_TYPES_ARRAY: &str = "TrackingTypes";

/// Longest allowed namespace/object-type id in the persisted registry tables.
const MAX_REGISTRY_ID_LEN: u32 = 50;

fn object_type_schema() -> CompoundSchema {
    CompoundSchema::new(vec![
        FieldDef::new("Name", FieldType::Str(MAX_REGISTRY_ID_LEN)),
        FieldDef::new("Namespace", FieldType::Int32),
    ])
}

fn companion_group_schema() -> CompoundSchema {
    CompoundSchema::new(vec![
        FieldDef::new("Name", FieldType::Str(MAX_REGISTRY_ID_LEN)),
        FieldDef::new("ObjectType", FieldType::Str(MAX_REGISTRY_ID_LEN)),
    ])
}

fn tracking_type_schema() -> CompoundSchema {
    CompoundSchema::new(vec![
        FieldDef::new("ParentNamespace", FieldType::Int32),
        FieldDef::new("ParentSequenceIndex", FieldType::Int32),
        FieldDef::new("ChildNamespace", FieldType::Int32),
        FieldDef::new("ChildSequenceIndex", FieldType::Int32),
    ])
}

/// Persist a dataset's registry under its group, using the enumerated
/// namespace encoding: namespaces are a string array in registration order
/// and every other table refers to them by ordinal. Tracking types are
/// written in their natural sort order.
pub(crate) fn persist_registry(group: &mut Group, registry: &ObjectTypeStore) -> Result<()> {
    let namespace_ids: Vec<String> =
        registry.namespaces().map(|(_, ns)| ns.id().to_string()).collect();
    if namespace_ids.is_empty() {
        return Ok(());
    }
    group.set_array(NAMESPACES_ARRAY, ArrayValue::Strings(namespace_ids));

    let mut types = CompoundArray::new(object_type_schema(), 0, false);
    let mut companions = CompoundArray::new(companion_group_schema(), 0, false);
    for (ordinal, (ns_handle, _)) in registry.namespaces().enumerate() {
        for ty_handle in registry.types_of(ns_handle)? {
            let ty = registry.object_type(ty_handle)?;
            types.append(&[smallvec![
                FieldValue::Str(ty.id().to_string()),
                FieldValue::Int(ordinal as i64),
            ]])?;
            for companion in ty.companion_groups() {
                companions.append(&[smallvec![
                    FieldValue::Str(companion.clone()),
                    FieldValue::Str(ty.id().to_string()),
                ]])?;
            }
        }
    }
    if !types.records.is_empty() {
        group.set_array(OBJECT_TYPES_ARRAY, ArrayValue::Compound(types));
    }
    if !companions.records.is_empty() {
        group.set_array(COMPANION_GROUPS_ARRAY, ArrayValue::Compound(companions));
    }

    let mut tracking = CompoundArray::new(tracking_type_schema(), 0, false);
    for (_, t) in registry.tracking_types_sorted() {
        tracking.append(&[smallvec![
            FieldValue::Int(t.parent_namespace as i64),
            FieldValue::Int(t.parent_sequence_index as i64),
            FieldValue::Int(t.child_namespace as i64),
            FieldValue::Int(t.child_sequence_index as i64),
        ]])?;
    }
    if !tracking.records.is_empty() {
        group.set_array(TRACKING_TYPES_ARRAY, ArrayValue::Compound(tracking));
    }
    Ok(())
}

fn record_str(record: &Record, index: usize, table: &str) -> Result<String> {
    match record.get(index) {
        Some(FieldValue::Str(s)) => Ok(s.clone()),
        _ => Err(Error::format(format!("malformed record in registry table '{table}'"))),
    }
}

fn record_int(record: &Record, index: usize, table: &str) -> Result<i64> {
    match record.get(index) {
        Some(FieldValue::Int(v)) => Ok(*v),
        _ => Err(Error::format(format!("malformed record in registry table '{table}'"))),
    }
}

/// Rebuild a dataset's registry from its persisted tables. A dataset with no
/// persisted namespaces yields an empty registry.
pub(crate) fn load_registry(code: &str, group: &Group) -> Result<ObjectTypeStore> {
    let mut registry = ObjectTypeStore::new(code);
    if !group.has_array(NAMESPACES_ARRAY) {
        return Ok(registry);
    }

    let namespace_ids = match group.array(NAMESPACES_ARRAY)? {
        ArrayValue::Strings(ids) => ids,
        other => {
            return Err(Error::StoreTypeMismatch {
                path: NAMESPACES_ARRAY.to_string(),
                expected: "string array",
                actual: other.kind(),
            })
        }
    };
    let mut handles: Vec<NamespaceHandle> = Vec::with_capacity(namespace_ids.len());
    for id in namespace_ids {
        handles.push(registry.add_namespace(id)?);
    }
    let namespace_at = |ordinal: i64| -> Result<NamespaceHandle> {
        handles
            .get(ordinal as usize)
            .copied()
            .ok_or_else(|| {
                Error::format(format!("namespace ordinal {ordinal} out of range in '{code}'"))
            })
    };

    if group.has_array(OBJECT_TYPES_ARRAY) {
        let types = group.array(OBJECT_TYPES_ARRAY)?.as_compound(OBJECT_TYPES_ARRAY)?;
        for record in &types.records {
            let name = record_str(record, 0, OBJECT_TYPES_ARRAY)?;
            let ns = namespace_at(record_int(record, 1, OBJECT_TYPES_ARRAY)?)?;
            registry.add_object_type(&name, ns)?;
        }
    }
    if group.has_array(COMPANION_GROUPS_ARRAY) {
        let companions =
            group.array(COMPANION_GROUPS_ARRAY)?.as_compound(COMPANION_GROUPS_ARRAY)?;
        for record in &companions.records {
            let name = record_str(record, 0, COMPANION_GROUPS_ARRAY)?;
            let type_id = record_str(record, 1, COMPANION_GROUPS_ARRAY)?;
            let ty = registry.object_type_by_id(&type_id).ok_or_else(|| {
                Error::format(format!("companion group '{name}' refers to unknown type '{type_id}'"))
            })?;
            registry.add_object_type_companion_group(&name, ty)?;
        }
    }
    if group.has_array(TRACKING_TYPES_ARRAY) {
        let tracking =
            group.array(TRACKING_TYPES_ARRAY)?.as_compound(TRACKING_TYPES_ARRAY)?;
        for record in &tracking.records {
            let parent = namespace_at(record_int(record, 0, TRACKING_TYPES_ARRAY)?)?;
            let parent_seq = record_int(record, 1, TRACKING_TYPES_ARRAY)? as u32;
            let child = namespace_at(record_int(record, 2, TRACKING_TYPES_ARRAY)?)?;
            let child_seq = record_int(record, 3, TRACKING_TYPES_ARRAY)? as u32;
            registry.add_tracking_type(parent, parent_seq, child, child_seq)?;
        }
    }
    Ok(registry)
}

/// The sequence annotation of a dataset. At most one of the three forms is
/// set; they are mutually exclusive.
#[derive(Clone, PartialEq, Debug)]
pub enum SequenceAnnotation {
    /// Time-series durations, one per sequence step.
    TimeSeries(Vec<f32>),
    /// Depth-scan z-values, one per sequence step.
    DepthScan(Vec<f32>),
    /// Free-form per-step descriptions.
    Custom(Vec<String>),
}

/// Write access to the optional dataset annotations. Annotations are
/// write-once: entities are immutable for the container's lifetime.
pub struct AnnotationsMut<'g> {
    group: &'g mut Group,
}

impl<'g> AnnotationsMut<'g> {
    pub(crate) fn new(group: &'g mut Group) -> Self {
        Self { group }
    }

    /// Set the sequence annotation. Fails if one is already set; the three
    /// forms are mutually exclusive.
    pub fn set_sequence_annotation(&mut self, annotation: SequenceAnnotation) -> Result<()> {
        let already = self.group.has_array(TIME_SERIES_ARRAY)
            || self.group.has_array(DEPTH_SCAN_ARRAY)
            || self.group.has_array(CUSTOM_SEQUENCE_ARRAY);
        if already {
            return Err(Error::illegal("sequence annotation is already set"));
        }
        match annotation {
            SequenceAnnotation::TimeSeries(durations) => {
                self.group.set_array(TIME_SERIES_ARRAY, ArrayValue::Float32(durations));
            }
            SequenceAnnotation::DepthScan(values) => {
                self.group.set_array(DEPTH_SCAN_ARRAY, ArrayValue::Float32(values));
            }
            SequenceAnnotation::Custom(descriptions) => {
                self.group.set_array(CUSTOM_SEQUENCE_ARRAY, ArrayValue::Strings(descriptions));
            }
        }
        Ok(())
    }

    /// Set the plate barcode. Fails if already set.
    pub fn set_plate_barcode(&mut self, barcode: &str) -> Result<()> {
        if self.group.has_attr(PLATE_BARCODE_ATTR) {
            return Err(Error::illegal("plate barcode is already set"));
        }
        self.group.set_attr(PLATE_BARCODE_ATTR, AttrValue::Str(barcode.to_string()));
        Ok(())
    }

    /// Set the parent dataset code, a lineage pointer by code. Resolution
    /// against the parent dataset is the caller's concern.
    pub fn set_parent_dataset_code(&mut self, code: &str) -> Result<()> {
        if self.group.has_attr(PARENT_DATASET_ATTR) {
            return Err(Error::illegal("parent dataset code is already set"));
        }
        self.group.set_attr(PARENT_DATASET_ATTR, AttrValue::Str(code.to_string()));
        Ok(())
    }

    /// Set a free-form string annotation. Fails on a duplicate key.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let annotations = self.group.ensure_child(ANNOTATIONS_GROUP);
        if annotations.has_attr(key) {
            return Err(Error::illegal(format!("annotation '{key}' is already set")));
        }
        annotations.set_attr(key, AttrValue::Str(value.to_string()));
        Ok(())
    }
}

/// Read access to the optional dataset annotations.
pub struct Annotations<'g> {
    group: &'g Group,
}

impl<'g> Annotations<'g> {
    pub(crate) fn new(group: &'g Group) -> Self {
        Self { group }
    }

    /// The sequence annotation, if one was written.
    pub fn sequence_annotation(&self) -> Result<Option<SequenceAnnotation>> {
        if let Ok(array) = self.group.array(TIME_SERIES_ARRAY) {
            if let ArrayValue::Float32(values) = array {
                return Ok(Some(SequenceAnnotation::TimeSeries(values.clone())));
            }
        }
        if let Ok(array) = self.group.array(DEPTH_SCAN_ARRAY) {
            if let ArrayValue::Float32(values) = array {
                return Ok(Some(SequenceAnnotation::DepthScan(values.clone())));
            }
        }
        if let Ok(array) = self.group.array(CUSTOM_SEQUENCE_ARRAY) {
            if let ArrayValue::Strings(values) = array {
                return Ok(Some(SequenceAnnotation::Custom(values.clone())));
            }
        }
        Ok(None)
    }

    /// The plate barcode, if one was written.
    pub fn try_plate_barcode(&self) -> Option<&str> {
        match self.group.try_attr(PLATE_BARCODE_ATTR) {
            Some(AttrValue::Str(s)) => Some(s),
            _ => None,
        }
    }

    /// The parent dataset code, if one was written.
    pub fn try_parent_dataset_code(&self) -> Option<&str> {
        match self.group.try_attr(PARENT_DATASET_ATTR) {
            Some(AttrValue::Str(s)) => Some(s),
            _ => None,
        }
    }

    /// One free-form annotation by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        let annotations = self.group.child(ANNOTATIONS_GROUP).ok()?;
        match annotations.try_attr(key) {
            Some(AttrValue::Str(s)) => Some(s),
            _ => None,
        }
    }

    /// All free-form annotations.
    pub fn all(&self) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        if let Ok(annotations) = self.group.child(ANNOTATIONS_GROUP) {
            for name in annotations.attr_names() {
                if let Some(AttrValue::Str(s)) = annotations.try_attr(name) {
                    out.insert(name.to_string(), s.clone());
                }
            }
        }
        out
    }
}

/// One dataset of a container, as a tagged union over the four read
/// variants. The `as_*` conversions replace unchecked down-casts: asking a
/// segmentation dataset for its feature view fails with a typed error
/// carrying both kinds and the dataset code.
pub enum CellLevelDataset<'a> {
    Features(FeatureDatasetReader<'a>),
    Classification(ClassificationDatasetReader<'a>),
    Segmentation(SegmentationDatasetReader<'a>),
    Tracking(TrackingDatasetReader<'a>),
}

impl<'a> CellLevelDataset<'a> {
    /// The kind tag of this dataset.
    pub fn dataset_type(&self) -> CellLevelDatasetType {
        match self {
            CellLevelDataset::Features(_) => CellLevelDatasetType::Features,
            CellLevelDataset::Classification(_) => CellLevelDatasetType::Classification,
            CellLevelDataset::Segmentation(_) => CellLevelDatasetType::Segmentation,
            CellLevelDataset::Tracking(_) => CellLevelDatasetType::Tracking,
        }
    }

    /// The dataset code.
    pub fn code(&self) -> &str {
        match self {
            CellLevelDataset::Features(d) => d.code(),
            CellLevelDataset::Classification(d) => d.code(),
            CellLevelDataset::Segmentation(d) => d.code(),
            CellLevelDataset::Tracking(d) => d.code(),
        }
    }

    /// The dataset geometry.
    pub fn geometry(&self) -> Geometry {
        match self {
            CellLevelDataset::Features(d) => d.geometry(),
            CellLevelDataset::Classification(d) => d.geometry(),
            CellLevelDataset::Segmentation(d) => d.geometry(),
            CellLevelDataset::Tracking(d) => d.geometry(),
        }
    }

    fn wrong_type(&self, requested: CellLevelDatasetType) -> Error {
        Error::WrongDatasetType {
            actual: self.dataset_type(),
            requested,
            dataset_code: self.code().to_string(),
        }
    }

    pub fn as_feature(&self) -> Result<&FeatureDatasetReader<'a>> {
        match self {
            CellLevelDataset::Features(d) => Ok(d),
            other => Err(other.wrong_type(CellLevelDatasetType::Features)),
        }
    }

    pub fn as_classification(&self) -> Result<&ClassificationDatasetReader<'a>> {
        match self {
            CellLevelDataset::Classification(d) => Ok(d),
            other => Err(other.wrong_type(CellLevelDatasetType::Classification)),
        }
    }

    pub fn as_segmentation(&self) -> Result<&SegmentationDatasetReader<'a>> {
        match self {
            CellLevelDataset::Segmentation(d) => Ok(d),
            other => Err(other.wrong_type(CellLevelDatasetType::Segmentation)),
        }
    }

    pub fn as_tracking(&self) -> Result<&TrackingDatasetReader<'a>> {
        match self {
            CellLevelDataset::Tracking(d) => Ok(d),
            other => Err(other.wrong_type(CellLevelDatasetType::Tracking)),
        }
    }
}
