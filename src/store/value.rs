//! Typed attribute and array values stored on groups.

use smallvec::SmallVec;

use crate::util::{BitVec, Error, Result};

/// A typed scalar (or compound-of-scalars) attribute on a group.
#[derive(Clone, PartialEq, Debug)]
pub enum AttrValue {
    Str(String),
    Int(i64),
    Float(f64),
    /// A named-field compound attribute, e.g. a dataset descriptor.
    Compound(Vec<(String, AttrValue)>),
}

impl AttrValue {
    pub fn kind(&self) -> &'static str {
        match self {
            AttrValue::Str(_) => "string",
            AttrValue::Int(_) => "int",
            AttrValue::Float(_) => "float",
            AttrValue::Compound(_) => "compound",
        }
    }

    pub fn as_str(&self, path: &str) -> Result<&str> {
        match self {
            AttrValue::Str(s) => Ok(s),
            other => Err(type_mismatch(path, "string", other.kind())),
        }
    }

    pub fn as_int(&self, path: &str) -> Result<i64> {
        match self {
            AttrValue::Int(v) => Ok(*v),
            other => Err(type_mismatch(path, "int", other.kind())),
        }
    }

    pub fn as_compound(&self, path: &str) -> Result<&[(String, AttrValue)]> {
        match self {
            AttrValue::Compound(fields) => Ok(fields),
            other => Err(type_mismatch(path, "compound", other.kind())),
        }
    }
}

fn type_mismatch(path: &str, expected: &'static str, actual: &'static str) -> Error {
    Error::StoreTypeMismatch { path: path.to_string(), expected, actual }
}

/// Storage width of a fixed-width unsigned integer array.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum IntWidth {
    U8,
    U16,
    U32,
}

impl IntWidth {
    /// Bytes per element at this width.
    pub const fn num_bytes(&self) -> usize {
        match self {
            IntWidth::U8 => 1,
            IntWidth::U16 => 2,
            IntWidth::U32 => 4,
        }
    }

    /// The narrowest width able to hold `max_value`.
    pub const fn narrowest_for(max_value: u32) -> Self {
        if max_value <= u8::MAX as u32 {
            IntWidth::U8
        } else if max_value <= u16::MAX as u32 {
            IntWidth::U16
        } else {
            IntWidth::U32
        }
    }

    /// The maximum value representable at this width.
    pub const fn max_value(&self) -> u32 {
        match self {
            IntWidth::U8 => u8::MAX as u32,
            IntWidth::U16 => u16::MAX as u32,
            IntWidth::U32 => u32::MAX,
        }
    }
}

/// Fixed-width unsigned integer array with a per-array deflate flag.
#[derive(Clone, PartialEq, Debug)]
pub struct IntArray {
    pub width: IntWidth,
    pub deflate: bool,
    pub data: Vec<u32>,
}

impl IntArray {
    pub fn new(width: IntWidth, deflate: bool, data: Vec<u32>) -> Result<Self> {
        if let Some(&v) = data.iter().find(|&&v| v > width.max_value()) {
            return Err(Error::illegal(format!(
                "value {v} does not fit {}-byte storage width",
                width.num_bytes()
            )));
        }
        Ok(Self { width, deflate, data })
    }
}

/// Field type of one column of a compound record schema.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum FieldType {
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Bool,
    /// Fixed-length UTF-8 string, zero-padded in storage.
    Str(u32),
    /// Enumeration with a fixed option set, stored as ordinals.
    Enum(Vec<String>),
}

impl FieldType {
    /// Bytes one value of this type occupies in a packed record.
    pub fn num_bytes(&self) -> usize {
        match self {
            FieldType::Int8 | FieldType::Bool => 1,
            FieldType::Int16 => 2,
            FieldType::Int32 | FieldType::Float32 | FieldType::Enum(_) => 4,
            FieldType::Int64 | FieldType::Float64 => 8,
            FieldType::Str(len) => *len as usize,
        }
    }
}

/// One named, typed field of a compound record schema.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct FieldDef {
    pub name: String,
    pub ty: FieldType,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self { name: name.into(), ty }
    }
}

/// A fixed ordered list of typed fields shared by all records of one array.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct CompoundSchema {
    pub fields: Vec<FieldDef>,
}

impl CompoundSchema {
    pub fn new(fields: Vec<FieldDef>) -> Self {
        Self { fields }
    }

    /// Bytes one packed record occupies.
    pub fn record_bytes(&self) -> usize {
        self.fields.iter().map(|f| f.ty.num_bytes()).sum()
    }

    /// Validate that `record` matches this schema field-for-field.
    pub fn check_record(&self, record: &Record) -> Result<()> {
        if record.len() != self.fields.len() {
            return Err(Error::illegal(format!(
                "record has {} fields, schema declares {}",
                record.len(),
                self.fields.len()
            )));
        }
        for (value, field) in record.iter().zip(&self.fields) {
            let ok = match (&field.ty, value) {
                (FieldType::Int8, FieldValue::Int(v)) => i8::try_from(*v).is_ok(),
                (FieldType::Int16, FieldValue::Int(v)) => i16::try_from(*v).is_ok(),
                (FieldType::Int32, FieldValue::Int(v)) => i32::try_from(*v).is_ok(),
                (FieldType::Int64, FieldValue::Int(_)) => true,
                (FieldType::Float32 | FieldType::Float64, FieldValue::Float(_)) => true,
                (FieldType::Bool, FieldValue::Bool(_)) => true,
                (FieldType::Str(len), FieldValue::Str(s)) => s.len() <= *len as usize,
                (FieldType::Enum(options), FieldValue::Enum(ord)) => {
                    (*ord as usize) < options.len()
                }
                _ => false,
            };
            if !ok {
                return Err(Error::illegal(format!(
                    "value {value:?} does not match field '{}' of type {:?}",
                    field.name, field.ty
                )));
            }
        }
        Ok(())
    }
}

/// One field value of a compound record.
#[derive(Clone, PartialEq, Debug)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Enum(u32),
}

/// One compound record. Most schemas have a handful of fields.
pub type Record = SmallVec<[FieldValue; 8]>;

/// Growable compound record array with a chunk size for block iteration.
#[derive(Clone, PartialEq, Debug)]
pub struct CompoundArray {
    pub schema: CompoundSchema,
    pub records: Vec<Record>,
    /// Natural chunk boundary in records; 0 means unchunked.
    pub chunk_size: usize,
    pub deflate: bool,
}

impl CompoundArray {
    pub fn new(schema: CompoundSchema, chunk_size: usize, deflate: bool) -> Self {
        Self { schema, records: Vec::new(), chunk_size, deflate }
    }

    /// Append records, validating each against the schema.
    pub fn append(&mut self, records: &[Record]) -> Result<()> {
        for record in records {
            self.schema.check_record(record)?;
        }
        self.records.extend_from_slice(records);
        Ok(())
    }

    /// Iterate the array along its natural chunk boundaries, yielding
    /// (block index, record offset, block records).
    pub fn natural_blocks(&self) -> impl Iterator<Item = (usize, usize, &[Record])> {
        let chunk = if self.chunk_size == 0 {
            self.records.len().max(1)
        } else {
            self.chunk_size
        };
        self.records
            .chunks(chunk)
            .enumerate()
            .map(move |(i, block)| (i, i * chunk, block))
    }
}

/// Enumeration array: a fixed option set plus per-element ordinals.
#[derive(Clone, PartialEq, Debug)]
pub struct EnumArray {
    pub options: Vec<String>,
    pub ordinals: Vec<u32>,
}

impl EnumArray {
    pub fn new(options: Vec<String>, ordinals: Vec<u32>) -> Result<Self> {
        if let Some(&ord) = ordinals.iter().find(|&&o| o as usize >= options.len()) {
            return Err(Error::illegal(format!(
                "ordinal {ord} out of range for {} options",
                options.len()
            )));
        }
        Ok(Self { options, ordinals })
    }

    /// Read one ordinal without materializing the array.
    pub fn ordinal(&self, index: usize) -> Result<u32> {
        self.ordinals
            .get(index)
            .copied()
            .ok_or_else(|| Error::illegal(format!("element index {index} out of range")))
    }
}

/// A typed array stored under a group.
#[derive(Clone, PartialEq, Debug)]
pub enum ArrayValue {
    Int(IntArray),
    Bits(BitVec),
    Compound(CompoundArray),
    Enum(EnumArray),
    Float32(Vec<f32>),
    Strings(Vec<String>),
}

impl ArrayValue {
    pub fn kind(&self) -> &'static str {
        match self {
            ArrayValue::Int(_) => "int array",
            ArrayValue::Bits(_) => "bit field",
            ArrayValue::Compound(_) => "compound array",
            ArrayValue::Enum(_) => "enum array",
            ArrayValue::Float32(_) => "float32 array",
            ArrayValue::Strings(_) => "string array",
        }
    }

    pub fn as_int(&self, path: &str) -> Result<&IntArray> {
        match self {
            ArrayValue::Int(a) => Ok(a),
            other => Err(type_mismatch(path, "int array", other.kind())),
        }
    }

    pub fn as_bits(&self, path: &str) -> Result<&BitVec> {
        match self {
            ArrayValue::Bits(b) => Ok(b),
            other => Err(type_mismatch(path, "bit field", other.kind())),
        }
    }

    pub fn as_compound(&self, path: &str) -> Result<&CompoundArray> {
        match self {
            ArrayValue::Compound(c) => Ok(c),
            other => Err(type_mismatch(path, "compound array", other.kind())),
        }
    }

    pub fn as_compound_mut(&mut self, path: &str) -> Result<&mut CompoundArray> {
        match self {
            ArrayValue::Compound(c) => Ok(c),
            other => Err(type_mismatch(path, "compound array", other.kind())),
        }
    }

    pub fn as_enum(&self, path: &str) -> Result<&EnumArray> {
        match self {
            ArrayValue::Enum(e) => Ok(e),
            other => Err(type_mismatch(path, "enum array", other.kind())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn test_narrowest_width() {
        assert_eq!(IntWidth::narrowest_for(0), IntWidth::U8);
        assert_eq!(IntWidth::narrowest_for(255), IntWidth::U8);
        assert_eq!(IntWidth::narrowest_for(256), IntWidth::U16);
        assert_eq!(IntWidth::narrowest_for(65535), IntWidth::U16);
        assert_eq!(IntWidth::narrowest_for(65536), IntWidth::U32);
    }

    #[test]
    fn test_int_array_width_check() {
        assert!(IntArray::new(IntWidth::U8, false, vec![1, 255]).is_ok());
        assert!(IntArray::new(IntWidth::U8, false, vec![256]).is_err());
    }

    #[test]
    fn test_schema_check() {
        let schema = CompoundSchema::new(vec![
            FieldDef::new("intensity", FieldType::Float32),
            FieldDef::new("label", FieldType::Str(8)),
            FieldDef::new("phase", FieldType::Enum(vec!["G1".into(), "S".into()])),
        ]);
        assert_eq!(schema.record_bytes(), 4 + 8 + 4);

        let good: Record = smallvec![
            FieldValue::Float(1.5),
            FieldValue::Str("mitotic".into()),
            FieldValue::Enum(1),
        ];
        schema.check_record(&good).unwrap();

        let bad_enum: Record = smallvec![
            FieldValue::Float(1.5),
            FieldValue::Str("x".into()),
            FieldValue::Enum(2),
        ];
        assert!(schema.check_record(&bad_enum).is_err());

        let too_long: Record = smallvec![
            FieldValue::Float(1.5),
            FieldValue::Str("way too long for 8".into()),
            FieldValue::Enum(0),
        ];
        assert!(schema.check_record(&too_long).is_err());
    }

    #[test]
    fn test_natural_blocks() {
        let schema = CompoundSchema::new(vec![FieldDef::new("v", FieldType::Int32)]);
        let mut array = CompoundArray::new(schema, 3, false);
        let records: Vec<Record> =
            (0..8).map(|i| smallvec![FieldValue::Int(i)] as Record).collect();
        array.append(&records).unwrap();

        let blocks: Vec<(usize, usize, usize)> = array
            .natural_blocks()
            .map(|(i, off, recs)| (i, off, recs.len()))
            .collect();
        assert_eq!(blocks, vec![(0, 0, 3), (1, 3, 3), (2, 6, 2)]);
    }
}
