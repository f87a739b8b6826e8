//! Cell-level data (CLD) containers for high-content screening.
//!
//! A CLD container is a single-file, typed, hierarchical store holding the
//! cell-level results of a screening experiment, indexed by well, field and
//! sequence coordinates:
//!
//! - **feature datasets** — per-cell numeric measurements in named groups
//! - **classification datasets** — one category label per cell
//! - **segmentation datasets** — per-image bounding boxes and packed pixel
//!   masks of the segmented objects
//! - **tracking datasets** — parent/child linking graphs between objects
//!   across sequence steps
//!
//! # Modules
//!
//! - [`container`] — container façade: format stamping, dataset creation,
//!   typed dispatch
//! - [`dataset`] — the four dataset variants and their shared core
//! - [`coords`] — image and well-field coordinates, geometry iteration
//! - [`object`] — segmented-object boxes, masks, edge detection
//! - [`registry`] — namespace / object-type / tracking-type registry
//! - [`linking`] — parent/child adjacency tables
//! - [`store`] — the hierarchical typed-group storage backend
//! - [`util`] — errors and the packed bit vector
//!
//! The engine is single-threaded and synchronous: one writer handle or one
//! reader handle per container, no retries, no rollback.
//!
//! # Example
//!
//! ```
//! use hcscld::object::SegmentedObject;
//! use hcscld::{CellLevelDataReader, CellLevelDataWriter, Geometry, ImageId, Store};
//!
//! let mut writer = CellLevelDataWriter::from_store(Store::new())?;
//! {
//!     let mut seg = writer.add_segmentation_dataset("seg1", Geometry::new(2, 2, 1), 1, false)?;
//!     let cells = seg.registry_mut().add_namespace("CELLS")?;
//!     let nucleus = seg.registry_mut().add_object_type("NUCLEUS", cells)?;
//!
//!     let mut objects =
//!         vec![SegmentedObject::from_pixels(&[(0, 0), (1, 0), (0, 1), (1, 1)])?];
//!     seg.write_image_segmentation(&ImageId::new(0, 0, 0, 0), nucleus, &mut objects)?;
//!     seg.finish()?;
//! }
//!
//! let reader = CellLevelDataReader::from_store(writer.into_store())?;
//! let dataset = reader.data_set("seg1")?;
//! let seg = dataset.as_segmentation()?;
//! assert_eq!(seg.object_count(&ImageId::new(0, 0, 0, 0))?, 1);
//! # Ok::<(), hcscld::Error>(())
//! ```

pub mod container;
pub mod coords;
pub mod dataset;
pub mod linking;
pub mod object;
pub mod registry;
pub mod store;
pub mod util;

pub use container::{
    CellLevelDataReader, CellLevelDataWriter, CONTAINER_FORMAT, CONTAINER_VERSION_MAJOR,
    CONTAINER_VERSION_MINOR,
};
pub use coords::{Geometry, ImageId, WellFieldId};
pub use dataset::{CellLevelDataset, CellLevelDatasetType, SequenceAnnotation};
pub use store::Store;
pub use util::{Error, Result};
