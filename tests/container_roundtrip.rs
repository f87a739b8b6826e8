//! End-to-end container round-trips through real files.

use hcscld::dataset::{CategoryEnum, SequenceAnnotation};
use hcscld::linking::LinkingBuilder;
use hcscld::object::SegmentedObject;
use hcscld::store::{CompoundSchema, FieldDef, FieldType, FieldValue, Record};
use hcscld::{
    CellLevelDataReader, CellLevelDataWriter, CellLevelDatasetType, Error, Geometry, ImageId,
    WellFieldId,
};

use smallvec::smallvec;
use tempfile::TempDir;

fn square_16() -> SegmentedObject {
    let pixels: Vec<(u16, u16)> = (0..4).flat_map(|y| (0..4).map(move |x| (x, y))).collect();
    SegmentedObject::from_pixels(&pixels).unwrap()
}

#[test]
fn segmentation_survives_close_and_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("screen.cld");
    let geometry = Geometry::new(2, 2, 1);
    let image = ImageId::new(1, 0, 0, 0);

    let mut writer = CellLevelDataWriter::create(&path).unwrap();
    {
        let mut seg = writer.add_segmentation_dataset("seg1", geometry, 1, false).unwrap();
        let cells = seg.registry_mut().add_namespace("CELLS").unwrap();
        let nucleus = seg.registry_mut().add_object_type("NUCLEUS", cells).unwrap();

        let mut objects = vec![square_16()];
        seg.write_image_segmentation(&image, nucleus, &mut objects).unwrap();
        seg.finish().unwrap();
    }
    writer.close().unwrap();

    let reader = CellLevelDataReader::open(&path).unwrap();
    assert_eq!(reader.data_set_codes(), vec!["seg1".to_string()]);

    let dataset = reader.data_set("seg1").unwrap();
    assert_eq!(dataset.dataset_type(), CellLevelDatasetType::Segmentation);
    assert_eq!(dataset.code(), "seg1");
    assert_eq!(dataset.geometry(), geometry);

    let seg = dataset.as_segmentation().unwrap();
    assert_eq!(seg.object_count(&image).unwrap(), 1);
    let objects = seg.get_objects(&image, false).unwrap();
    assert_eq!(objects.len(), 1);
    let bbox = objects[0].bbox();
    assert_eq!((bbox.min_x, bbox.min_y, bbox.max_x, bbox.max_y), (0, 0, 3, 3));
    assert_eq!(objects[0].mask().count_ones(), 16);
    assert!(seg.registry().object_type_by_id("NUCLEUS").is_some());

    // Sibling images of the geometry carry no segmentation.
    assert!(!seg.has_segmentation(&ImageId::new(0, 0, 0, 0)));
}

#[test]
fn reopening_a_container_for_writing_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("screen.cld");

    let mut writer = CellLevelDataWriter::create(&path).unwrap();
    writer.add_feature_dataset("feat1", Geometry::new(1, 1, 1)).unwrap();
    writer.close().unwrap();

    // Second open: the stamp is verified, not rewritten, and existing
    // datasets are still there.
    let mut writer = CellLevelDataWriter::create(&path).unwrap();
    assert_eq!(writer.data_set_codes(), vec!["feat1".to_string()]);
    assert!(matches!(
        writer.add_feature_dataset("feat1", Geometry::new(1, 1, 1)),
        Err(Error::UniqueViolation(_))
    ));
    writer.add_tracking_dataset("trk1", Geometry::new(1, 1, 1), 2).unwrap();
    writer.close().unwrap();

    let reader = CellLevelDataReader::open(&path).unwrap();
    assert_eq!(reader.data_set_codes(), vec!["feat1".to_string(), "trk1".to_string()]);
}

#[test]
fn foreign_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("not_a_container.bin");
    std::fs::write(&path, b"something else entirely").unwrap();

    assert!(CellLevelDataReader::open(&path).is_err());
    assert!(CellLevelDataWriter::create(&path).is_err());
    // Missing file: reported as such, not as a format error.
    assert!(matches!(
        CellLevelDataReader::open(dir.path().join("absent.cld")),
        Err(Error::FileNotFound(_))
    ));
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Phase {
    Interphase,
    Mitosis,
}

impl CategoryEnum for Phase {
    fn labels() -> &'static [&'static str] {
        &["INTERPHASE", "MITOSIS"]
    }

    fn from_ordinal(ordinal: u32) -> Option<Self> {
        match ordinal {
            0 => Some(Phase::Interphase),
            1 => Some(Phase::Mitosis),
            _ => None,
        }
    }

    fn ordinal(&self) -> u32 {
        *self as u32
    }
}

#[test]
fn features_and_classifications_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("screen.cld");
    let geometry = Geometry::new(1, 2, 1);
    let well = WellFieldId::new(0, 1, 0);

    let schema = CompoundSchema::new(vec![
        FieldDef::new("Area", FieldType::Float32),
        FieldDef::new("Label", FieldType::Str(8)),
    ]);
    let records: Vec<Record> = vec![
        smallvec![FieldValue::Float(12.5), FieldValue::Str("edge".into())],
        smallvec![FieldValue::Float(7.25), FieldValue::Str("center".into())],
    ];

    let mut writer = CellLevelDataWriter::create(&path).unwrap();
    {
        let mut feat = writer.add_feature_dataset("feat1", geometry).unwrap();
        feat.add_feature_group("Morphology", schema.clone(), 0, 16).unwrap();
        feat.write_features(&well, "Morphology", &records).unwrap();
    }
    {
        let mut cls = writer
            .add_classification_dataset("cls1", geometry, Phase::labels())
            .unwrap();
        cls.write_classification_enums(&well, &[Phase::Mitosis, Phase::Interphase]).unwrap();
    }
    writer.close().unwrap();

    let reader = CellLevelDataReader::open(&path).unwrap();

    let dataset = reader.data_set("feat1").unwrap();
    let feat = dataset.as_feature().unwrap();
    assert_eq!(feat.feature_group_names(), vec!["MORPHOLOGY".to_string()]);
    assert_eq!(feat.feature_group_definition("Morphology").unwrap().schema, schema);
    assert_eq!(feat.get_features(&well, "Morphology").unwrap(), &records[..]);

    let dataset = reader.data_set("cls1").unwrap();
    let cls = dataset.as_classification().unwrap();
    assert_eq!(cls.options(), Phase::labels());
    assert_eq!(cls.get_classification_enum::<Phase>(&well, 0).unwrap(), Phase::Mitosis);
    assert_eq!(cls.get_classification_label(&well, 1).unwrap(), "INTERPHASE");

    // Cross-kind conversion carries both kinds in the error.
    assert!(matches!(
        dataset.as_feature(),
        Err(Error::WrongDatasetType {
            actual: CellLevelDatasetType::Classification,
            requested: CellLevelDatasetType::Features,
            ..
        })
    ));
}

#[test]
fn field_less_feature_records_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("screen.cld");
    let well = WellFieldId::new(0, 0, 0);

    let mut writer = CellLevelDataWriter::create(&path).unwrap();
    {
        let mut feat = writer.add_feature_dataset("feat1", Geometry::new(1, 1, 1)).unwrap();
        feat.add_feature_group("Counts", CompoundSchema::new(vec![]), 0, 0).unwrap();
        // Three records with no fields: the count is the data.
        let records: Vec<Record> = vec![Record::new(); 3];
        feat.write_features(&well, "Counts", &records).unwrap();
    }
    writer.close().unwrap();

    let reader = CellLevelDataReader::open(&path).unwrap();
    let dataset = reader.data_set("feat1").unwrap();
    let records = dataset.as_feature().unwrap().get_features(&well, "Counts").unwrap();
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.is_empty()));
}

#[test]
fn tracking_and_annotations_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("screen.cld");
    let geometry = Geometry::new(1, 1, 1);

    let mut writer = CellLevelDataWriter::create(&path).unwrap();
    {
        let mut trk = writer.add_tracking_dataset("trk1", geometry, 3).unwrap();
        let cells = trk.registry_mut().add_namespace("CELLS").unwrap();
        let succession = trk.registry_mut().add_tracking_type(cells, 0, cells, 1).unwrap();

        let mut links = LinkingBuilder::new();
        links.add_links(7, &[70, 71]);
        trk.write_object_tracking(&ImageId::sequence_only(0), succession, &links).unwrap();
        trk.finish().unwrap();

        let mut annotations = trk.annotations();
        annotations.set_plate_barcode("PLATE-0042").unwrap();
        annotations.set_parent_dataset_code("seg1").unwrap();
        annotations
            .set_sequence_annotation(SequenceAnnotation::TimeSeries(vec![0.0, 30.0, 60.0]))
            .unwrap();
    }
    writer.close().unwrap();

    let reader = CellLevelDataReader::open(&path).unwrap();
    let dataset = reader.data_set("trk1").unwrap();
    let trk = dataset.as_tracking().unwrap();
    assert_eq!(trk.sequence_length(), 3);

    let succession = trk.find_tracking_type("CELLS", 0, "CELLS", 1).unwrap();
    let linking = trk.get_object_linking(&ImageId::sequence_only(0), succession).unwrap();
    assert_eq!(linking.child_ids(7).to_vec(), vec![70, 71]);
    assert!(linking.child_ids(8).is_empty());
    assert_eq!(linking.parent_ids(71).to_vec(), vec![7]);

    // No data at a later sequence step: descriptive illegal argument.
    assert!(matches!(
        trk.get_object_linking(&ImageId::sequence_only(2), succession),
        Err(Error::IllegalArgument(_))
    ));

    let annotations = trk.annotations();
    assert_eq!(annotations.try_plate_barcode(), Some("PLATE-0042"));
    assert_eq!(annotations.try_parent_dataset_code(), Some("seg1"));
    assert_eq!(
        annotations.sequence_annotation().unwrap(),
        Some(SequenceAnnotation::TimeSeries(vec![0.0, 30.0, 60.0]))
    );
}
