//! Container façade: format stamping, dataset creation, typed dispatch.
//!
//! A container is one store file tagged at the root:
//!
//! ```text
//! /
//! ├── Format              "HCS_CELL_LEVEL_DATA"
//! ├── FormatVersionMajor  1
//! ├── FormatVersionMinor  0
//! ├── DatasetTypeOptions  dataset-type labels, in ordinal order
//! ├── DataSet_{code}/     one subtree per dataset
//! └── ...
//! ```
//!
//! [`CellLevelDataWriter`] stamps an empty tree once (idempotent on reopen),
//! refuses any other content, and hands out per-dataset write handles.
//! [`CellLevelDataReader`] validates the tag and version, reads the
//! dataset-type enumeration once, and dispatches each dataset to its read
//! variant by the persisted type.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::coords::Geometry;
use crate::dataset::{
    dataset_path, CellLevelDataset, CellLevelDatasetType, ClassificationDatasetReader,
    ClassificationDatasetWriter, DatasetCore, FeatureDatasetReader, FeatureDatasetWriter,
    FormatDescriptor, SegmentationDatasetReader, SegmentationDatasetWriter,
    TrackingDatasetReader, TrackingDatasetWriter,
};
use crate::store::{ArrayValue, AttrValue, Store};
use crate::util::{Error, Result};

/// The container format tag.
pub const CONTAINER_FORMAT: &str = "HCS_CELL_LEVEL_DATA";
/// Major container format version. A mismatch is fatal at open.
pub const CONTAINER_VERSION_MAJOR: i64 = 1;
/// Minor container format version. Readers accept any minor version.
pub const CONTAINER_VERSION_MINOR: i64 = 0;

const FORMAT_ATTR: &str = "Format";
const VERSION_MAJOR_ATTR: &str = "FormatVersionMajor";
const VERSION_MINOR_ATTR: &str = "FormatVersionMinor";
const TYPE_OPTIONS_ARRAY: &str = "DatasetTypeOptions";

const DATASET_PREFIX: &str = "DataSet_";

/// Verify the format tag and major version of an opened store.
fn check_format(store: &Store) -> Result<()> {
    let root = store.root();
    let format = root
        .try_attr(FORMAT_ATTR)
        .ok_or_else(|| Error::format("store carries no container format tag"))?;
    let format = format.as_str(FORMAT_ATTR)?;
    if format != CONTAINER_FORMAT {
        return Err(Error::format(format!(
            "store has format '{format}', expected '{CONTAINER_FORMAT}'"
        )));
    }
    let major = root.attr(VERSION_MAJOR_ATTR)?.as_int(VERSION_MAJOR_ATTR)?;
    if major != CONTAINER_VERSION_MAJOR {
        return Err(Error::format(format!(
            "container format version {major} is not supported (expected \
             {CONTAINER_VERSION_MAJOR})"
        )));
    }
    Ok(())
}

fn read_type_options(store: &Store) -> Result<Vec<String>> {
    match store.root().array(TYPE_OPTIONS_ARRAY)? {
        ArrayValue::Strings(options) => Ok(options.clone()),
        other => Err(Error::StoreTypeMismatch {
            path: TYPE_OPTIONS_ARRAY.to_string(),
            expected: "string array",
            actual: other.kind(),
        }),
    }
}

/// Write handle for one container. Owns the backing store; when created
/// from a path the store is managed and saved on [`CellLevelDataWriter::close`],
/// when created from an existing [`Store`] it is unmanaged and handed back
/// unsaved by [`CellLevelDataWriter::into_store`].
#[derive(Debug)]
pub struct CellLevelDataWriter {
    store: Store,
    /// Save target; `None` for an unmanaged store.
    path: Option<PathBuf>,
}

impl CellLevelDataWriter {
    /// Open or create a managed container file. An existing file must be a
    /// container of a supported version; a fresh or empty one is stamped.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let store = if path.exists() { Store::open(path)? } else { Store::new() };
        let mut writer = Self::stamp(store)?;
        writer.path = Some(path.to_path_buf());
        debug!(path = %path.display(), "opened container for writing");
        Ok(writer)
    }

    /// Wrap an existing store without taking over its persistence. The
    /// store is stamped if empty; [`CellLevelDataWriter::close`] will not
    /// save it.
    pub fn from_store(store: Store) -> Result<Self> {
        Self::stamp(store)
    }

    /// Stamp an empty tree, or verify the tag of a non-empty one. A
    /// non-empty tree that is not a container is rejected with nothing
    /// written.
    fn stamp(mut store: Store) -> Result<Self> {
        if store.root().has_attr(FORMAT_ATTR) {
            check_format(&store)?;
        } else if !store.root().is_empty() {
            return Err(Error::format(
                "store is neither empty nor a cell-level data container",
            ));
        } else {
            debug!(format = CONTAINER_FORMAT, "stamping empty container");
            let root = store.root_mut();
            root.set_attr(FORMAT_ATTR, AttrValue::Str(CONTAINER_FORMAT.to_string()));
            root.set_attr(VERSION_MAJOR_ATTR, AttrValue::Int(CONTAINER_VERSION_MAJOR));
            root.set_attr(VERSION_MINOR_ATTR, AttrValue::Int(CONTAINER_VERSION_MINOR));
            root.set_array(
                TYPE_OPTIONS_ARRAY,
                ArrayValue::Strings(
                    CellLevelDatasetType::OPTIONS.iter().map(|s| s.to_string()).collect(),
                ),
            );
        }
        Ok(Self { store, path: None })
    }

    /// Codes of all datasets in this container, in sorted order.
    pub fn data_set_codes(&self) -> Vec<String> {
        data_set_codes(&self.store)
    }

    fn new_dataset_group(&mut self, code: &str) -> Result<&mut crate::store::Group> {
        let path = dataset_path(code);
        if self.store.root().has_child(&path) {
            return Err(Error::UniqueViolation(code.to_string()));
        }
        debug!(code, "adding dataset");
        Ok(self.store.root_mut().ensure_child(&path))
    }

    /// Add a feature dataset covering `geometry`.
    pub fn add_feature_dataset(
        &mut self,
        code: &str,
        geometry: Geometry,
    ) -> Result<FeatureDatasetWriter<'_>> {
        let core = DatasetCore::new(code, geometry, 1);
        let group = self.new_dataset_group(code)?;
        FeatureDatasetWriter::create(group, core)
    }

    /// Add a classification dataset with the given option list.
    pub fn add_classification_dataset(
        &mut self,
        code: &str,
        geometry: Geometry,
        options: &[&str],
    ) -> Result<ClassificationDatasetWriter<'_>> {
        let core = DatasetCore::new(code, geometry, 1);
        let group = self.new_dataset_group(code)?;
        ClassificationDatasetWriter::create(group, core, options)
    }

    /// Add a segmentation dataset. `store_edge_masks` selects whether edge
    /// masks are persisted alongside the object masks or re-derived on read.
    pub fn add_segmentation_dataset(
        &mut self,
        code: &str,
        geometry: Geometry,
        sequence_length: u32,
        store_edge_masks: bool,
    ) -> Result<SegmentationDatasetWriter<'_>> {
        let core = DatasetCore::new(code, geometry, sequence_length);
        let group = self.new_dataset_group(code)?;
        SegmentationDatasetWriter::create(group, core, store_edge_masks)
    }

    /// Add a tracking dataset spanning `sequence_length` steps.
    pub fn add_tracking_dataset(
        &mut self,
        code: &str,
        geometry: Geometry,
        sequence_length: u32,
    ) -> Result<TrackingDatasetWriter<'_>> {
        let core = DatasetCore::new(code, geometry, sequence_length);
        let group = self.new_dataset_group(code)?;
        TrackingDatasetWriter::create(group, core)
    }

    /// Save the container if the store is managed, then drop the handle.
    /// An unmanaged store is discarded; use
    /// [`CellLevelDataWriter::into_store`] to keep it.
    pub fn close(self) -> Result<()> {
        if let Some(path) = &self.path {
            debug!(path = %path.display(), "saving container");
            self.store.save(path)?;
        }
        Ok(())
    }

    /// Hand back the underlying store without saving.
    pub fn into_store(self) -> Store {
        self.store
    }
}

fn data_set_codes(store: &Store) -> Vec<String> {
    store
        .root()
        .child_names()
        .filter_map(|name| name.strip_prefix(DATASET_PREFIX))
        .map(str::to_string)
        .collect()
}

/// Read handle for one container.
pub struct CellLevelDataReader {
    store: Store,
    /// Dataset-type labels, read once at open.
    type_options: Vec<String>,
}

impl CellLevelDataReader {
    /// Open a container file, validating its format tag and version.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "opening container for reading");
        Self::from_store(Store::open(path)?)
    }

    /// Wrap an existing store, validating its format tag and version.
    pub fn from_store(store: Store) -> Result<Self> {
        check_format(&store)?;
        let type_options = read_type_options(&store)?;
        Ok(Self { store, type_options })
    }

    /// Codes of all datasets in this container, in sorted order.
    pub fn data_set_codes(&self) -> Vec<String> {
        data_set_codes(&self.store)
    }

    /// One dataset by code, dispatched to its read variant by the persisted
    /// dataset type.
    pub fn data_set(&self, code: &str) -> Result<CellLevelDataset<'_>> {
        let group = self
            .store
            .root()
            .child(&dataset_path(code))
            .map_err(|_| Error::illegal(format!("no dataset '{code}' in this container")))?;
        let descriptor = FormatDescriptor::read_from(group, &self.type_options, code)?;
        Ok(match descriptor.dataset_type {
            CellLevelDatasetType::Features => CellLevelDataset::Features(
                FeatureDatasetReader::open(code, group, &self.type_options)?,
            ),
            CellLevelDatasetType::Classification => CellLevelDataset::Classification(
                ClassificationDatasetReader::open(code, group, &self.type_options)?,
            ),
            CellLevelDatasetType::Segmentation => CellLevelDataset::Segmentation(
                SegmentationDatasetReader::open(code, group, &self.type_options)?,
            ),
            CellLevelDatasetType::Tracking => CellLevelDataset::Tracking(
                TrackingDatasetReader::open(code, group, &self.type_options)?,
            ),
        })
    }

    /// All datasets of this container.
    pub fn data_sets(&self) -> Result<Vec<CellLevelDataset<'_>>> {
        self.data_set_codes()
            .iter()
            .map(|code| self.data_set(code))
            .collect()
    }

    /// Hand back the underlying store.
    pub fn into_store(self) -> Store {
        self.store
    }
}
