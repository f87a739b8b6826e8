//! The underlying hierarchical typed-group store.
//!
//! The CLD layer depends on exactly this contract and nothing more: named
//! groups/subtrees, typed scalar and compound attributes on groups, compound
//! record arrays with named+typed fields (including nested enumerations),
//! fixed-width integer arrays with a selectable storage width and a
//! compressed-storage flag, raw bit-field arrays with block-offset access,
//! block-wise natural-chunk iteration over large arrays, and
//! existence/attribute-presence queries.
//!
//! Persistence is a single little-endian file:
//!
//! ```text
//! +--------------------+
//! | Magic: "CLDSTORE"  |  8 bytes
//! +--------------------+
//! | Version            |  2 bytes (u16 LE)
//! +--------------------+
//! | Root group         |  recursive: attrs, arrays, children
//! +--------------------+
//! ```
//!
//! The reader materializes the whole tree; arrays flagged for deflate are
//! zlib-compressed in the file.

mod compress;
mod format;
mod group;
mod reader;
mod value;
mod writer;

pub use format::{CURRENT_VERSION, STORE_MAGIC};
pub use group::{Group, Store};
pub use value::{
    ArrayValue, AttrValue, CompoundArray, CompoundSchema, EnumArray, FieldDef, FieldType,
    FieldValue, IntArray, IntWidth, Record,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::BitVec;
    use smallvec::smallvec;
    use tempfile::NamedTempFile;

    fn sample_store() -> Store {
        let mut store = Store::new();
        let root = store.root_mut();
        root.set_attr("Format", AttrValue::Str("HCS_CELL_LEVEL_DATA".into()));
        root.set_attr("FormatVersionMajor", AttrValue::Int(1));
        root.set_attr(
            "Descriptor",
            AttrValue::Compound(vec![
                ("DatasetType".into(), AttrValue::Int(2)),
                ("FormatType".into(), AttrValue::Str("ImageSegmentation".into())),
            ]),
        );

        let g = root.descend_or_create("DataSet_d1/R0_C0_F0_S0");
        let mut mask = BitVec::zeroed(100);
        for i in (0..100).step_by(7) {
            mask.set(i, true);
        }
        g.set_array("Masks", ArrayValue::Bits(mask));
        g.set_array(
            "Linking",
            ArrayValue::Int(
                IntArray::new(IntWidth::U16, true, vec![1, 300, 1, 301, 2, 400]).unwrap(),
            ),
        );

        let schema = CompoundSchema::new(vec![
            FieldDef::new("area", FieldType::Float64),
            FieldDef::new("valid", FieldType::Bool),
            FieldDef::new("name", FieldType::Str(6)),
            FieldDef::new("class", FieldType::Enum(vec!["A".into(), "B".into()])),
        ]);
        let mut array = CompoundArray::new(schema, 2, true);
        let records: Vec<Record> = vec![
            smallvec![
                FieldValue::Float(10.5),
                FieldValue::Bool(true),
                FieldValue::Str("cell".into()),
                FieldValue::Enum(0),
            ],
            smallvec![
                FieldValue::Float(-3.25),
                FieldValue::Bool(false),
                FieldValue::Str("debris".into()),
                FieldValue::Enum(1),
            ],
        ];
        array.append(&records).unwrap();
        g.set_array("FEATURES", ArrayValue::Compound(array));

        g.set_array(
            "Classes",
            ArrayValue::Enum(
                EnumArray::new(vec!["G1".into(), "S".into(), "G2".into()], vec![0, 2, 1, 1])
                    .unwrap(),
            ),
        );
        g.set_array("Durations", ArrayValue::Float32(vec![0.5, 1.5]));
        g.set_array("Labels", ArrayValue::Strings(vec!["t0".into(), "t1".into()]));
        store
    }

    #[test]
    fn test_store_file_roundtrip() {
        let store = sample_store();
        let temp = NamedTempFile::new().unwrap();
        store.save(temp.path()).unwrap();

        let loaded = Store::open(temp.path()).unwrap();
        assert_eq!(loaded, store);
    }

    #[test]
    fn test_field_less_records_keep_their_count() {
        let mut store = Store::new();
        let mut array = CompoundArray::new(CompoundSchema::new(vec![]), 0, false);
        let records: Vec<Record> = vec![Record::new(); 3];
        array.append(&records).unwrap();
        store.root_mut().set_array("Counts", ArrayValue::Compound(array));

        let temp = NamedTempFile::new().unwrap();
        store.save(temp.path()).unwrap();

        let loaded = Store::open(temp.path()).unwrap();
        let counts = loaded.root().array("Counts").unwrap().as_compound("Counts").unwrap();
        assert_eq!(counts.records.len(), 3);
        assert!(counts.records.iter().all(|r| r.is_empty()));
    }

    #[test]
    fn test_open_rejects_bad_magic() {
        let temp = NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), b"definitely not a store file").unwrap();
        assert!(matches!(
            Store::open(temp.path()),
            Err(crate::util::Error::InvalidMagic)
        ));
    }

    #[test]
    fn test_open_missing_file() {
        assert!(matches!(
            Store::open("/nonexistent/cld/store.cld"),
            Err(crate::util::Error::FileNotFound(_))
        ));
    }
}
