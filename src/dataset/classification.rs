//! Classification datasets: one category label per segmented object.
//!
//! The option list is fixed per dataset; per-coordinate results are stored
//! as enumeration arrays (ordinals against that list). Callers can work in
//! ordinals, in labels, or through their own Rust enum via [`CategoryEnum`].
//! The enum mapping is checked eagerly: the type's label list must equal the
//! stored options exactly, order included, or the accessor fails before any
//! element is touched.

use std::collections::HashMap;

use tracing::trace;

use crate::coords::{Geometry, WellFieldId};
use crate::store::{ArrayValue, EnumArray, Group};
use crate::util::{Error, Result};

use super::{
    create_well_field_scaffold, Annotations, AnnotationsMut, CellLevelDatasetType, DatasetCore,
    FormatDescriptor,
};

/// Format type of classification datasets.
pub const CLASSIFICATION_FORMAT_TYPE: &str = "CellClassifications";
/// Current format version of classification datasets.
pub const CLASSIFICATION_FORMAT_VERSION: i32 = 1;

const CLASSIFICATIONS_ARRAY: &str = "Classifications";
const OPTIONS_ARRAY: &str = "ClassificationOptions";

/// A caller-side category enum mappable onto a dataset's option list.
pub trait CategoryEnum: Sized {
    /// The labels of this type, in ordinal order.
    fn labels() -> &'static [&'static str];

    /// The variant for a given ordinal, if in range.
    fn from_ordinal(ordinal: u32) -> Option<Self>;

    /// The ordinal of this variant.
    fn ordinal(&self) -> u32;
}

/// The labels of `E` must equal `options` exactly, order included.
fn check_labels<E: CategoryEnum>(options: &[String], dataset_code: &str) -> Result<()> {
    let labels = E::labels();
    let matches =
        labels.len() == options.len() && labels.iter().zip(options).all(|(l, o)| l == o);
    if !matches {
        return Err(Error::illegal(format!(
            "category enum labels {labels:?} do not match the options {options:?} of dataset \
             '{dataset_code}'"
        )));
    }
    Ok(())
}

/// Write handle for one classification dataset within an open container.
pub struct ClassificationDatasetWriter<'a> {
    group: &'a mut Group,
    core: DatasetCore,
    options: Vec<String>,
    ordinals_by_label: HashMap<String, u32>,
}

impl<'a> ClassificationDatasetWriter<'a> {
    pub(crate) fn create(
        group: &'a mut Group,
        core: DatasetCore,
        options: &[&str],
    ) -> Result<Self> {
        if options.is_empty() {
            return Err(Error::illegal("classification option list must not be empty"));
        }
        let mut ordinals_by_label = HashMap::with_capacity(options.len());
        for (ordinal, label) in options.iter().enumerate() {
            if ordinals_by_label.insert(label.to_string(), ordinal as u32).is_some() {
                return Err(Error::illegal(format!("duplicate classification option '{label}'")));
            }
        }
        FormatDescriptor::new(
            CellLevelDatasetType::Classification,
            CLASSIFICATION_FORMAT_TYPE,
            CLASSIFICATION_FORMAT_VERSION,
        )?
        .write_into(group);
        core.write_into(group);
        create_well_field_scaffold(group, &core.geometry);
        let options: Vec<String> = options.iter().map(|s| s.to_string()).collect();
        group.set_array(OPTIONS_ARRAY, ArrayValue::Strings(options.clone()));
        Ok(Self { group, core, options, ordinals_by_label })
    }

    pub fn code(&self) -> &str {
        &self.core.code
    }

    pub fn geometry(&self) -> Geometry {
        self.core.geometry
    }

    /// The dataset option list, in ordinal order.
    pub fn options(&self) -> &[String] {
        &self.options
    }

    /// Write the classifications of all objects at one coordinate, as
    /// ordinals into the option list. Write-once per coordinate.
    pub fn write_classifications(&mut self, id: &WellFieldId, ordinals: &[u32]) -> Result<()> {
        self.core.geometry.check(id);
        trace!(
            dataset = %self.core.code,
            coordinate = %id,
            objects = ordinals.len(),
            "writing classifications"
        );
        let coordinate = self.group.child_mut(&id.object_name())?;
        if coordinate.has_array(CLASSIFICATIONS_ARRAY) {
            return Err(Error::illegal(format!("classifications at {id} are already written")));
        }
        let array = EnumArray::new(self.options.clone(), ordinals.to_vec())?;
        coordinate.set_array(CLASSIFICATIONS_ARRAY, ArrayValue::Enum(array));
        Ok(())
    }

    /// Write classifications given as labels from the option list.
    pub fn write_classification_labels(
        &mut self,
        id: &WellFieldId,
        labels: &[&str],
    ) -> Result<()> {
        let ordinals = labels
            .iter()
            .map(|label| {
                self.ordinals_by_label.get(*label).copied().ok_or_else(|| {
                    Error::illegal(format!(
                        "'{label}' is not an option of dataset '{}'",
                        self.core.code
                    ))
                })
            })
            .collect::<Result<Vec<u32>>>()?;
        self.write_classifications(id, &ordinals)
    }

    /// Write classifications given as caller enum values. Fails fast when
    /// the enum's labels differ from the dataset options.
    pub fn write_classification_enums<E: CategoryEnum>(
        &mut self,
        id: &WellFieldId,
        values: &[E],
    ) -> Result<()> {
        check_labels::<E>(&self.options, &self.core.code)?;
        let ordinals: Vec<u32> = values.iter().map(CategoryEnum::ordinal).collect();
        self.write_classifications(id, &ordinals)
    }

    /// The dataset annotations, writable.
    pub fn annotations(&mut self) -> AnnotationsMut<'_> {
        AnnotationsMut::new(self.group)
    }
}

/// Read handle for one classification dataset.
pub struct ClassificationDatasetReader<'a> {
    group: &'a Group,
    core: DatasetCore,
    options: Vec<String>,
}

impl<'a> ClassificationDatasetReader<'a> {
    pub(crate) fn open(code: &str, group: &'a Group, type_options: &[String]) -> Result<Self> {
        FormatDescriptor::read_from(group, type_options, code)?.check(
            CellLevelDatasetType::Classification,
            CLASSIFICATION_FORMAT_TYPE,
            CLASSIFICATION_FORMAT_VERSION,
            code,
        )?;
        let core = DatasetCore::read_from(code, group)?;
        let options = match group.array(OPTIONS_ARRAY)? {
            ArrayValue::Strings(options) => options.clone(),
            other => {
                return Err(Error::StoreTypeMismatch {
                    path: OPTIONS_ARRAY.to_string(),
                    expected: "string array",
                    actual: other.kind(),
                })
            }
        };
        Ok(Self { group, core, options })
    }

    pub fn code(&self) -> &str {
        &self.core.code
    }

    pub fn geometry(&self) -> Geometry {
        self.core.geometry
    }

    /// The dataset option list, in ordinal order.
    pub fn options(&self) -> &[String] {
        &self.options
    }

    /// The classification ordinals of all objects at one coordinate.
    pub fn get_classifications(&self, id: &WellFieldId) -> Result<Vec<u32>> {
        Ok(self.array(id)?.ordinals.clone())
    }

    /// The classification ordinal of a single object. Single-element read;
    /// the array is not materialized.
    pub fn get_classification(&self, id: &WellFieldId, object_index: usize) -> Result<u32> {
        self.array(id)?.ordinal(object_index)
    }

    /// The classification label of a single object.
    pub fn get_classification_label(
        &self,
        id: &WellFieldId,
        object_index: usize,
    ) -> Result<&str> {
        let ordinal = self.get_classification(id, object_index)?;
        // The per-coordinate array and the dataset option list can diverge in
        // a corrupt file.
        self.options.get(ordinal as usize).map(String::as_str).ok_or_else(|| {
            Error::format(format!(
                "stored ordinal {ordinal} exceeds the {} options of dataset '{}'",
                self.options.len(),
                self.core.code
            ))
        })
    }

    /// The classification of a single object as a caller enum value. Fails
    /// fast when the enum's labels differ from the dataset options.
    pub fn get_classification_enum<E: CategoryEnum>(
        &self,
        id: &WellFieldId,
        object_index: usize,
    ) -> Result<E> {
        check_labels::<E>(&self.options, &self.core.code)?;
        let ordinal = self.get_classification(id, object_index)?;
        // Labels match the options, so every stored ordinal maps to a variant.
        E::from_ordinal(ordinal)
            .ok_or_else(|| Error::illegal(format!("ordinal {ordinal} has no enum variant")))
    }

    /// The dataset annotations.
    pub fn annotations(&self) -> Annotations<'_> {
        Annotations::new(self.group)
    }

    fn array(&self, id: &WellFieldId) -> Result<&EnumArray> {
        self.core.geometry.check(id);
        self.group
            .child(&id.object_name())
            .and_then(|coordinate| coordinate.array(CLASSIFICATIONS_ARRAY))
            .map_err(|_| {
                Error::illegal(format!(
                    "no classifications at {id} in dataset '{}'",
                    self.core.code
                ))
            })?
            .as_enum(CLASSIFICATIONS_ARRAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    enum CellCyclePhase {
        Interphase,
        Mitosis,
        Apoptosis,
    }

    impl CategoryEnum for CellCyclePhase {
        fn labels() -> &'static [&'static str] {
            &["INTERPHASE", "MITOSIS", "APOPTOSIS"]
        }

        fn from_ordinal(ordinal: u32) -> Option<Self> {
            match ordinal {
                0 => Some(CellCyclePhase::Interphase),
                1 => Some(CellCyclePhase::Mitosis),
                2 => Some(CellCyclePhase::Apoptosis),
                _ => None,
            }
        }

        fn ordinal(&self) -> u32 {
            *self as u32
        }
    }

    // Same labels, different order.
    #[derive(Clone, Copy, Debug)]
    enum ShuffledPhase {
        Mitosis,
    }

    impl CategoryEnum for ShuffledPhase {
        fn labels() -> &'static [&'static str] {
            &["MITOSIS", "INTERPHASE", "APOPTOSIS"]
        }

        fn from_ordinal(ordinal: u32) -> Option<Self> {
            (ordinal == 0).then_some(ShuffledPhase::Mitosis)
        }

        fn ordinal(&self) -> u32 {
            0
        }
    }

    fn sample_core() -> DatasetCore {
        DatasetCore::new("cls1", Geometry::new(1, 1, 2), 1)
    }

    fn type_options() -> Vec<String> {
        CellLevelDatasetType::OPTIONS.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_three_write_styles_roundtrip() {
        let mut root = Group::new();
        {
            let mut writer = ClassificationDatasetWriter::create(
                &mut root,
                sample_core(),
                CellCyclePhase::labels(),
            )
            .unwrap();
            writer.write_classifications(&WellFieldId::new(0, 0, 0), &[0, 2, 1]).unwrap();
            writer
                .write_classification_labels(
                    &WellFieldId::new(0, 0, 1),
                    &["MITOSIS", "INTERPHASE"],
                )
                .unwrap();
        }

        let reader = ClassificationDatasetReader::open("cls1", &root, &type_options()).unwrap();
        assert_eq!(reader.options(), CellCyclePhase::labels());

        let id = WellFieldId::new(0, 0, 0);
        assert_eq!(reader.get_classifications(&id).unwrap(), vec![0, 2, 1]);
        assert_eq!(reader.get_classification(&id, 1).unwrap(), 2);
        assert_eq!(reader.get_classification_label(&id, 2).unwrap(), "MITOSIS");
        assert_eq!(
            reader.get_classification_enum::<CellCyclePhase>(&id, 1).unwrap(),
            CellCyclePhase::Apoptosis
        );

        let id = WellFieldId::new(0, 0, 1);
        assert_eq!(reader.get_classifications(&id).unwrap(), vec![1, 0]);
    }

    #[test]
    fn test_label_order_mismatch_fails_fast() {
        let mut root = Group::new();
        {
            let mut writer = ClassificationDatasetWriter::create(
                &mut root,
                sample_core(),
                CellCyclePhase::labels(),
            )
            .unwrap();
            writer.write_classifications(&WellFieldId::new(0, 0, 0), &[0]).unwrap();
            // Same label set in a different order: rejected at the call, not
            // silently remapped.
            assert!(writer
                .write_classification_enums(&WellFieldId::new(0, 0, 1), &[ShuffledPhase::Mitosis])
                .is_err());
        }

        let reader = ClassificationDatasetReader::open("cls1", &root, &type_options()).unwrap();
        assert!(reader
            .get_classification_enum::<ShuffledPhase>(&WellFieldId::new(0, 0, 0), 0)
            .is_err());
    }

    #[test]
    fn test_invalid_writes_rejected() {
        let mut root = Group::new();
        let mut writer =
            ClassificationDatasetWriter::create(&mut root, sample_core(), &["A", "B"]).unwrap();
        let id = WellFieldId::new(0, 0, 0);

        // Out-of-range ordinal.
        assert!(writer.write_classifications(&id, &[2]).is_err());
        // Unknown label.
        assert!(writer.write_classification_labels(&id, &["C"]).is_err());
        // Write-once per coordinate.
        writer.write_classifications(&id, &[1, 0]).unwrap();
        assert!(writer.write_classifications(&id, &[0]).is_err());
    }

    #[test]
    fn test_duplicate_options_rejected() {
        let mut root = Group::new();
        assert!(
            ClassificationDatasetWriter::create(&mut root, sample_core(), &["A", "A"]).is_err()
        );
    }

    #[test]
    fn test_diverged_option_list_is_a_format_error() {
        let mut root = Group::new();
        {
            let mut writer =
                ClassificationDatasetWriter::create(&mut root, sample_core(), &["A", "B", "C"])
                    .unwrap();
            writer.write_classifications(&WellFieldId::new(0, 0, 0), &[2]).unwrap();
        }
        // Corrupt file: the dataset option list lost entries the
        // per-coordinate arrays were written against.
        root.set_array(OPTIONS_ARRAY, ArrayValue::Strings(vec!["A".into()]));

        let reader = ClassificationDatasetReader::open("cls1", &root, &type_options()).unwrap();
        assert!(matches!(
            reader.get_classification_label(&WellFieldId::new(0, 0, 0), 0),
            Err(Error::UnsupportedFileFormat(_))
        ));
    }

    #[test]
    fn test_missing_coordinate_is_illegal_argument() {
        let mut root = Group::new();
        {
            let _writer =
                ClassificationDatasetWriter::create(&mut root, sample_core(), &["A"]).unwrap();
        }
        let reader = ClassificationDatasetReader::open("cls1", &root, &type_options()).unwrap();
        assert!(matches!(
            reader.get_classifications(&WellFieldId::new(0, 0, 0)),
            Err(Error::IllegalArgument(_))
        ));
    }
}
