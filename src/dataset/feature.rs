//! Feature datasets: per-cell numeric measurements in named feature groups.
//!
//! A feature group is a registered compound record schema (one record per
//! segmented object) with one growable record array per well-field
//! coordinate. Groups declared with a block size are pre-allocated as
//! chunked, deflated arrays at every coordinate up front, so the storage
//! layout is fixed before the first record arrives and readers can walk the
//! arrays along their natural chunk boundaries.

use std::collections::HashMap;

use tracing::trace;

use crate::coords::{Geometry, WellFieldId};
use crate::store::{ArrayValue, AttrValue, CompoundArray, CompoundSchema, Group, Record};
use crate::util::{Error, Result};

use super::{
    create_well_field_scaffold, Annotations, AnnotationsMut, CellLevelDatasetType, DatasetCore,
    FormatDescriptor,
};

/// Format type of feature datasets.
pub const FEATURES_FORMAT_TYPE: &str = "CellFeatures";
/// Current format version of feature datasets.
pub const FEATURES_FORMAT_VERSION: i32 = 1;

const DEFINITIONS_GROUP: &str = "FeatureGroupDefinitions";

/// The registered shape of one feature group.
#[derive(Clone, PartialEq, Debug)]
pub struct FeatureGroupDefinition {
    /// Uppercase-normalized group name.
    pub name: String,
    pub schema: CompoundSchema,
    /// Declared number of records per coordinate; 0 means unbounded.
    pub size: usize,
    /// Chunk size in records; 0 means unchunked and uncompressed.
    pub block_size: usize,
}

/// One natural block of a per-coordinate feature array.
///
/// Offsets are given both in records and in packed bytes; records are
/// fixed-size, so `byte_offset == record_offset * record_bytes`.
pub struct FeatureBlock<'a> {
    pub block_index: usize,
    pub record_offset: usize,
    pub byte_offset: usize,
    pub records: &'a [Record],
}

fn definition_attr(size: usize, block_size: usize) -> AttrValue {
    AttrValue::Compound(vec![
        ("Size".into(), AttrValue::Int(size as i64)),
        ("BlockSize".into(), AttrValue::Int(block_size as i64)),
    ])
}

fn read_definition_attr(attr: &AttrValue, name: &str) -> Result<(usize, usize)> {
    let fields = attr.as_compound(name)?;
    let lookup = |field: &str| -> Result<i64> {
        fields
            .iter()
            .find(|(n, _)| n == field)
            .map(|(_, v)| v.as_int(name))
            .ok_or_else(|| {
                Error::format(format!("feature group definition '{name}' lacks '{field}'"))
            })?
    };
    Ok((lookup("Size")? as usize, lookup("BlockSize")? as usize))
}

/// Write handle for one feature dataset within an open container.
pub struct FeatureDatasetWriter<'a> {
    group: &'a mut Group,
    core: DatasetCore,
    definitions: HashMap<String, FeatureGroupDefinition>,
}

impl<'a> FeatureDatasetWriter<'a> {
    pub(crate) fn create(group: &'a mut Group, core: DatasetCore) -> Result<Self> {
        FormatDescriptor::new(
            CellLevelDatasetType::Features,
            FEATURES_FORMAT_TYPE,
            FEATURES_FORMAT_VERSION,
        )?
        .write_into(group);
        core.write_into(group);
        create_well_field_scaffold(group, &core.geometry);
        Ok(Self { group, core, definitions: HashMap::new() })
    }

    pub fn code(&self) -> &str {
        &self.core.code
    }

    pub fn geometry(&self) -> Geometry {
        self.core.geometry
    }

    /// Register a feature group and pre-allocate its per-coordinate arrays.
    /// The name is uppercase-normalized; duplicates fail with
    /// [`Error::UniqueViolation`].
    pub fn add_feature_group(
        &mut self,
        name: &str,
        schema: CompoundSchema,
        size: usize,
        block_size: usize,
    ) -> Result<()> {
        let normalized = name.to_uppercase();
        if self.definitions.contains_key(&normalized) {
            return Err(Error::UniqueViolation(normalized));
        }
        trace!(
            dataset = %self.core.code,
            group = %normalized,
            size,
            block_size,
            "registering feature group"
        );
        self.group
            .ensure_child(DEFINITIONS_GROUP)
            .set_attr(&normalized, definition_attr(size, block_size));
        for id in self.core.geometry.iter() {
            let coordinate = self.group.ensure_child(&id.object_name());
            coordinate.set_array(
                &normalized,
                ArrayValue::Compound(CompoundArray::new(schema.clone(), block_size, block_size > 0)),
            );
        }
        self.definitions.insert(
            normalized.clone(),
            FeatureGroupDefinition { name: normalized, schema, size, block_size },
        );
        Ok(())
    }

    /// Append feature records for one coordinate. The coordinate must lie in
    /// the dataset geometry; each record must match the group's schema, and
    /// the per-coordinate total must stay within the declared size.
    pub fn write_features(
        &mut self,
        id: &WellFieldId,
        group_name: &str,
        records: &[Record],
    ) -> Result<()> {
        self.core.geometry.check(id);
        let normalized = group_name.to_uppercase();
        let definition = self.definitions.get(&normalized).ok_or_else(|| {
            Error::illegal(format!(
                "no feature group '{normalized}' registered in dataset '{}'",
                self.core.code
            ))
        })?;
        trace!(
            dataset = %self.core.code,
            group = %normalized,
            coordinate = %id,
            records = records.len(),
            "writing feature records"
        );
        let array = self
            .group
            .child_mut(&id.object_name())?
            .array_mut(&normalized)?
            .as_compound_mut(&normalized)?;
        if definition.size > 0 && array.records.len() + records.len() > definition.size {
            return Err(Error::illegal(format!(
                "feature group '{normalized}' at {id} would exceed its declared size {}",
                definition.size
            )));
        }
        array.append(records)
    }

    /// The dataset annotations, writable.
    pub fn annotations(&mut self) -> AnnotationsMut<'_> {
        AnnotationsMut::new(self.group)
    }
}

/// Read handle for one feature dataset.
pub struct FeatureDatasetReader<'a> {
    group: &'a Group,
    core: DatasetCore,
}

impl<'a> FeatureDatasetReader<'a> {
    pub(crate) fn open(code: &str, group: &'a Group, type_options: &[String]) -> Result<Self> {
        FormatDescriptor::read_from(group, type_options, code)?.check(
            CellLevelDatasetType::Features,
            FEATURES_FORMAT_TYPE,
            FEATURES_FORMAT_VERSION,
            code,
        )?;
        let core = DatasetCore::read_from(code, group)?;
        Ok(Self { group, core })
    }

    pub fn code(&self) -> &str {
        &self.core.code
    }

    pub fn geometry(&self) -> Geometry {
        self.core.geometry
    }

    /// Names of all registered feature groups, in sorted order.
    pub fn feature_group_names(&self) -> Vec<String> {
        match self.group.child(DEFINITIONS_GROUP) {
            Ok(definitions) => definitions.attr_names().map(str::to_string).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// The registered definition of one feature group. The schema is taken
    /// from the pre-allocated array, so it is available before any record
    /// was written.
    pub fn feature_group_definition(&self, name: &str) -> Result<FeatureGroupDefinition> {
        let normalized = name.to_uppercase();
        let definitions = self.group.child(DEFINITIONS_GROUP).map_err(|_| {
            self.unknown_group(&normalized)
        })?;
        let attr = definitions.attr(&normalized).map_err(|_| self.unknown_group(&normalized))?;
        let (size, block_size) = read_definition_attr(attr, &normalized)?;
        // Any coordinate carries the schema; take the first.
        let first = self
            .core
            .geometry
            .iter()
            .next()
            .ok_or_else(|| Error::illegal("dataset geometry is empty"))?;
        let schema = self.array(&first, &normalized)?.schema.clone();
        Ok(FeatureGroupDefinition { name: normalized, schema, size, block_size })
    }

    /// All feature records of one group at one coordinate.
    pub fn get_features(&self, id: &WellFieldId, group_name: &str) -> Result<&[Record]> {
        self.core.geometry.check(id);
        Ok(&self.array(id, &group_name.to_uppercase())?.records)
    }

    /// Iterate one group's records at one coordinate along its natural
    /// chunk boundaries.
    pub fn feature_blocks(
        &self,
        id: &WellFieldId,
        group_name: &str,
    ) -> Result<impl Iterator<Item = FeatureBlock<'_>>> {
        self.core.geometry.check(id);
        let array = self.array(id, &group_name.to_uppercase())?;
        let record_bytes = array.schema.record_bytes();
        Ok(array.natural_blocks().map(move |(block_index, record_offset, records)| {
            FeatureBlock {
                block_index,
                record_offset,
                byte_offset: record_offset * record_bytes,
                records,
            }
        }))
    }

    /// The dataset annotations.
    pub fn annotations(&self) -> Annotations<'_> {
        Annotations::new(self.group)
    }

    fn array(&self, id: &WellFieldId, normalized: &str) -> Result<&CompoundArray> {
        let coordinate = self
            .group
            .child(&id.object_name())
            .map_err(|_| Error::illegal(format!("no data at coordinate {id}")))?;
        coordinate
            .array(normalized)
            .map_err(|_| self.unknown_group(normalized))?
            .as_compound(normalized)
    }

    fn unknown_group(&self, normalized: &str) -> Error {
        Error::illegal(format!(
            "no feature group '{normalized}' in dataset '{}'",
            self.core.code
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FieldDef, FieldType, FieldValue};
    use smallvec::smallvec;

    fn schema() -> CompoundSchema {
        CompoundSchema::new(vec![
            FieldDef::new("Area", FieldType::Float32),
            FieldDef::new("Intensity", FieldType::Float64),
        ])
    }

    fn record(area: f64, intensity: f64) -> Record {
        smallvec![FieldValue::Float(area), FieldValue::Float(intensity)]
    }

    fn sample_core() -> DatasetCore {
        DatasetCore::new("feat1", Geometry::new(1, 2, 1), 1)
    }

    #[test]
    fn test_write_read_roundtrip() {
        let mut root = Group::new();
        {
            let mut writer = FeatureDatasetWriter::create(&mut root, sample_core()).unwrap();
            writer.add_feature_group("Morphology", schema(), 0, 2).unwrap();
            let id = WellFieldId::new(0, 1, 0);
            writer
                .write_features(&id, "morphology", &[record(10.0, 0.5), record(20.0, 0.7)])
                .unwrap();
            writer.write_features(&id, "MORPHOLOGY", &[record(30.0, 0.9)]).unwrap();
        }

        let options: Vec<String> =
            CellLevelDatasetType::OPTIONS.iter().map(|s| s.to_string()).collect();
        let reader = FeatureDatasetReader::open("feat1", &root, &options).unwrap();
        assert_eq!(reader.feature_group_names(), vec!["MORPHOLOGY".to_string()]);

        let definition = reader.feature_group_definition("Morphology").unwrap();
        assert_eq!(definition.block_size, 2);
        assert_eq!(definition.schema, schema());

        let id = WellFieldId::new(0, 1, 0);
        let records = reader.get_features(&id, "Morphology").unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[2], record(30.0, 0.9));

        // Pre-allocated but never written: present and empty, not an error.
        let empty = reader.get_features(&WellFieldId::new(0, 0, 0), "Morphology").unwrap();
        assert!(empty.is_empty());

        // Records pack to 4 + 8 bytes each.
        let blocks: Vec<(usize, usize, usize, usize)> = reader
            .feature_blocks(&id, "Morphology")
            .unwrap()
            .map(|b| (b.block_index, b.record_offset, b.byte_offset, b.records.len()))
            .collect();
        assert_eq!(blocks, vec![(0, 0, 0, 2), (1, 2, 24, 1)]);
    }

    #[test]
    fn test_duplicate_group_rejected() {
        let mut root = Group::new();
        let mut writer = FeatureDatasetWriter::create(&mut root, sample_core()).unwrap();
        writer.add_feature_group("Morphology", schema(), 0, 0).unwrap();
        assert!(matches!(
            writer.add_feature_group("MORPHOLOGY", schema(), 0, 0),
            Err(Error::UniqueViolation(_))
        ));
    }

    #[test]
    fn test_unregistered_group_rejected() {
        let mut root = Group::new();
        let mut writer = FeatureDatasetWriter::create(&mut root, sample_core()).unwrap();
        let err = writer
            .write_features(&WellFieldId::new(0, 0, 0), "TEXTURE", &[record(1.0, 1.0)])
            .unwrap_err();
        assert!(matches!(err, Error::IllegalArgument(_)));
    }

    #[test]
    fn test_declared_size_enforced() {
        let mut root = Group::new();
        let mut writer = FeatureDatasetWriter::create(&mut root, sample_core()).unwrap();
        writer.add_feature_group("Morphology", schema(), 2, 0).unwrap();
        let id = WellFieldId::new(0, 0, 0);
        writer.write_features(&id, "Morphology", &[record(1.0, 1.0), record(2.0, 2.0)]).unwrap();
        assert!(writer.write_features(&id, "Morphology", &[record(3.0, 3.0)]).is_err());
    }

    #[test]
    #[should_panic(expected = "outside geometry")]
    fn test_out_of_geometry_write_panics() {
        let mut root = Group::new();
        let mut writer = FeatureDatasetWriter::create(&mut root, sample_core()).unwrap();
        writer.add_feature_group("Morphology", schema(), 0, 0).unwrap();
        let _ = writer.write_features(&WellFieldId::new(5, 0, 0), "Morphology", &[]);
    }
}
