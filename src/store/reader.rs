//! Store file parsing.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::util::{BitVec, Error, Result};

use super::compress::decompress;
use super::format::*;
use super::group::{Group, Store};
use super::value::{
    ArrayValue, AttrValue, CompoundArray, CompoundSchema, EnumArray, FieldDef, FieldType,
    FieldValue, IntArray, IntWidth, Record,
};

/// Parse a store file, validating the header and loading the full tree.
pub fn read_store(path: &Path) -> Result<Store> {
    let file = File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::FileNotFound(path.to_path_buf())
        } else {
            Error::Io(e)
        }
    })?;
    let mut r = BufReader::with_capacity(1024 * 1024, file);

    let mut magic = [0u8; 8];
    r.read_exact(&mut magic).map_err(|_| Error::InvalidMagic)?;
    if &magic != STORE_MAGIC {
        return Err(Error::InvalidMagic);
    }
    let version = r.read_u16::<LittleEndian>()?;
    if version != CURRENT_VERSION {
        return Err(Error::UnsupportedVersion(version));
    }

    let root = read_group(&mut r)?;
    Ok(Store::from_root(root))
}

fn read_group<R: Read>(r: &mut R) -> Result<Group> {
    let mut group = Group::new();

    let num_attrs = r.read_u32::<LittleEndian>()?;
    for _ in 0..num_attrs {
        let name = read_str(r)?;
        let value = read_attr(r)?;
        group.set_attr(&name, value);
    }

    let num_arrays = r.read_u32::<LittleEndian>()?;
    for _ in 0..num_arrays {
        let name = read_str(r)?;
        let value = read_array(r)?;
        group.set_array(&name, value);
    }

    let num_children = r.read_u32::<LittleEndian>()?;
    for _ in 0..num_children {
        let name = read_str(r)?;
        let child = read_group(r)?;
        group.children.insert(name, child);
    }
    Ok(group)
}

fn read_str<R: Read>(r: &mut R) -> Result<String> {
    let len = r.read_u32::<LittleEndian>()? as usize;
    let mut bytes = vec![0u8; len];
    r.read_exact(&mut bytes)?;
    Ok(String::from_utf8(bytes)?)
}

fn read_attr<R: Read>(r: &mut R) -> Result<AttrValue> {
    let tag = r.read_u8()?;
    Ok(match tag {
        ATTR_TAG_STR => AttrValue::Str(read_str(r)?),
        ATTR_TAG_INT => AttrValue::Int(r.read_i64::<LittleEndian>()?),
        ATTR_TAG_FLOAT => AttrValue::Float(r.read_f64::<LittleEndian>()?),
        ATTR_TAG_COMPOUND => {
            let count = r.read_u32::<LittleEndian>()?;
            let mut fields = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let name = read_str(r)?;
                let value = read_attr(r)?;
                fields.push((name, value));
            }
            AttrValue::Compound(fields)
        }
        other => {
            return Err(Error::format(format!("unknown attribute tag {other}")));
        }
    })
}

fn read_array<R: Read>(r: &mut R) -> Result<ArrayValue> {
    let tag = r.read_u8()?;
    Ok(match tag {
        ARRAY_TAG_INT => {
            let width = read_width(r)?;
            let deflate = r.read_u8()? != 0;
            let count = r.read_u32::<LittleEndian>()? as usize;
            let payload = read_payload(r, deflate)?;
            let data = unpack_ints(width, count, &payload)?;
            ArrayValue::Int(IntArray { width, deflate, data })
        }
        ARRAY_TAG_BITS => {
            let len = r.read_u64::<LittleEndian>()? as usize;
            let num_words = r.read_u32::<LittleEndian>()? as usize;
            let mut words = Vec::with_capacity(num_words);
            for _ in 0..num_words {
                words.push(r.read_u64::<LittleEndian>()?);
            }
            ArrayValue::Bits(BitVec::from_words(words, len))
        }
        ARRAY_TAG_COMPOUND => {
            let schema = read_schema(r)?;
            let chunk_size = r.read_u32::<LittleEndian>()? as usize;
            let deflate = r.read_u8()? != 0;
            let count = r.read_u32::<LittleEndian>()? as usize;
            let payload = read_payload(r, deflate)?;
            let records = unpack_records(&schema, count, &payload)?;
            ArrayValue::Compound(CompoundArray { schema, records, chunk_size, deflate })
        }
        ARRAY_TAG_ENUM => {
            let num_options = r.read_u32::<LittleEndian>()? as usize;
            let mut options = Vec::with_capacity(num_options);
            for _ in 0..num_options {
                options.push(read_str(r)?);
            }
            let width = read_width(r)?;
            let count = r.read_u32::<LittleEndian>()? as usize;
            let mut payload = vec![0u8; count * width.num_bytes()];
            r.read_exact(&mut payload)?;
            let ordinals = unpack_ints(width, count, &payload)?;
            ArrayValue::Enum(EnumArray::new(options, ordinals)?)
        }
        ARRAY_TAG_FLOAT32 => {
            let count = r.read_u32::<LittleEndian>()? as usize;
            let mut values = Vec::with_capacity(count);
            for _ in 0..count {
                values.push(r.read_f32::<LittleEndian>()?);
            }
            ArrayValue::Float32(values)
        }
        ARRAY_TAG_STRINGS => {
            let count = r.read_u32::<LittleEndian>()? as usize;
            let mut values = Vec::with_capacity(count);
            for _ in 0..count {
                values.push(read_str(r)?);
            }
            ArrayValue::Strings(values)
        }
        other => {
            return Err(Error::format(format!("unknown array tag {other}")));
        }
    })
}

fn read_width<R: Read>(r: &mut R) -> Result<IntWidth> {
    match r.read_u8()? {
        0 => Ok(IntWidth::U8),
        1 => Ok(IntWidth::U16),
        2 => Ok(IntWidth::U32),
        other => Err(Error::format(format!("unknown integer width tag {other}"))),
    }
}

fn read_payload<R: Read>(r: &mut R, deflate: bool) -> Result<Vec<u8>> {
    let len = r.read_u32::<LittleEndian>()? as usize;
    let mut bytes = vec![0u8; len];
    r.read_exact(&mut bytes)?;
    if deflate {
        decompress(&bytes)
    } else {
        Ok(bytes)
    }
}

fn read_schema<R: Read>(r: &mut R) -> Result<CompoundSchema> {
    let num_fields = r.read_u32::<LittleEndian>()? as usize;
    let mut fields = Vec::with_capacity(num_fields);
    for _ in 0..num_fields {
        let name = read_str(r)?;
        let ty = match r.read_u8()? {
            FIELD_TAG_INT8 => FieldType::Int8,
            FIELD_TAG_INT16 => FieldType::Int16,
            FIELD_TAG_INT32 => FieldType::Int32,
            FIELD_TAG_INT64 => FieldType::Int64,
            FIELD_TAG_FLOAT32 => FieldType::Float32,
            FIELD_TAG_FLOAT64 => FieldType::Float64,
            FIELD_TAG_BOOL => FieldType::Bool,
            FIELD_TAG_STR => FieldType::Str(r.read_u32::<LittleEndian>()?),
            FIELD_TAG_ENUM => {
                let count = r.read_u32::<LittleEndian>()? as usize;
                let mut options = Vec::with_capacity(count);
                for _ in 0..count {
                    options.push(read_str(r)?);
                }
                FieldType::Enum(options)
            }
            other => {
                return Err(Error::format(format!("unknown field type tag {other}")));
            }
        };
        fields.push(FieldDef::new(name, ty));
    }
    Ok(CompoundSchema::new(fields))
}

fn unpack_ints(width: IntWidth, count: usize, payload: &[u8]) -> Result<Vec<u32>> {
    let expected = count * width.num_bytes();
    if payload.len() != expected {
        return Err(Error::UnexpectedEof(payload.len() as u64));
    }
    let mut out = Vec::with_capacity(count);
    for chunk in payload.chunks_exact(width.num_bytes()) {
        out.push(match width {
            IntWidth::U8 => chunk[0] as u32,
            IntWidth::U16 => u16::from_le_bytes([chunk[0], chunk[1]]) as u32,
            IntWidth::U32 => u32::from_le_bytes(chunk.try_into().unwrap()),
        });
    }
    Ok(out)
}

fn unpack_records(schema: &CompoundSchema, count: usize, payload: &[u8]) -> Result<Vec<Record>> {
    let record_bytes = schema.record_bytes();
    if payload.len() != count * record_bytes {
        return Err(Error::UnexpectedEof(payload.len() as u64));
    }
    // A field-less schema packs to an empty payload; only the count survives.
    if record_bytes == 0 {
        return Ok(vec![Record::new(); count]);
    }
    let mut records = Vec::with_capacity(count);
    for raw in payload.chunks_exact(record_bytes) {
        let mut record = Record::new();
        let mut pos = 0usize;
        for field in &schema.fields {
            let size = field.ty.num_bytes();
            let bytes = &raw[pos..pos + size];
            pos += size;
            record.push(unpack_field(&field.ty, bytes)?);
        }
        records.push(record);
    }
    Ok(records)
}

fn unpack_field(ty: &FieldType, bytes: &[u8]) -> Result<FieldValue> {
    Ok(match ty {
        FieldType::Int8 => FieldValue::Int(bytes[0] as i8 as i64),
        FieldType::Int16 => {
            FieldValue::Int(i16::from_le_bytes(bytes.try_into().unwrap()) as i64)
        }
        FieldType::Int32 => {
            FieldValue::Int(i32::from_le_bytes(bytes.try_into().unwrap()) as i64)
        }
        FieldType::Int64 => FieldValue::Int(i64::from_le_bytes(bytes.try_into().unwrap())),
        FieldType::Float32 => {
            FieldValue::Float(f32::from_le_bytes(bytes.try_into().unwrap()) as f64)
        }
        FieldType::Float64 => FieldValue::Float(f64::from_le_bytes(bytes.try_into().unwrap())),
        FieldType::Bool => FieldValue::Bool(bytes[0] != 0),
        FieldType::Str(_) => {
            let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
            FieldValue::Str(String::from_utf8(bytes[..end].to_vec())?)
        }
        FieldType::Enum(_) => FieldValue::Enum(u32::from_le_bytes(bytes.try_into().unwrap())),
    })
}
