//! Store file serialization.

use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};

use crate::util::Result;

use super::compress::compress;
use super::format::*;
use super::group::{Group, Store};
use super::value::{ArrayValue, AttrValue, CompoundSchema, FieldType, FieldValue, IntWidth, Record};

/// Serialize a store to a file, truncating any existing content.
pub fn write_store(store: &Store, path: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    let mut w = BufWriter::with_capacity(1024 * 1024, file);

    w.write_all(STORE_MAGIC)?;
    w.write_u16::<LittleEndian>(CURRENT_VERSION)?;
    write_group(&mut w, store.root())?;
    w.flush()?;
    Ok(())
}

fn write_group<W: Write>(w: &mut W, group: &Group) -> Result<()> {
    w.write_u32::<LittleEndian>(group.attrs.len() as u32)?;
    for (name, value) in &group.attrs {
        write_str(w, name)?;
        write_attr(w, value)?;
    }

    w.write_u32::<LittleEndian>(group.arrays.len() as u32)?;
    for (name, value) in &group.arrays {
        write_str(w, name)?;
        write_array(w, value)?;
    }

    w.write_u32::<LittleEndian>(group.children.len() as u32)?;
    for (name, child) in &group.children {
        write_str(w, name)?;
        write_group(w, child)?;
    }
    Ok(())
}

fn write_str<W: Write>(w: &mut W, s: &str) -> Result<()> {
    w.write_u32::<LittleEndian>(s.len() as u32)?;
    w.write_all(s.as_bytes())?;
    Ok(())
}

fn write_attr<W: Write>(w: &mut W, value: &AttrValue) -> Result<()> {
    match value {
        AttrValue::Str(s) => {
            w.write_u8(ATTR_TAG_STR)?;
            write_str(w, s)?;
        }
        AttrValue::Int(v) => {
            w.write_u8(ATTR_TAG_INT)?;
            w.write_i64::<LittleEndian>(*v)?;
        }
        AttrValue::Float(v) => {
            w.write_u8(ATTR_TAG_FLOAT)?;
            w.write_f64::<LittleEndian>(*v)?;
        }
        AttrValue::Compound(fields) => {
            w.write_u8(ATTR_TAG_COMPOUND)?;
            w.write_u32::<LittleEndian>(fields.len() as u32)?;
            for (name, field) in fields {
                write_str(w, name)?;
                write_attr(w, field)?;
            }
        }
    }
    Ok(())
}

fn write_array<W: Write>(w: &mut W, value: &ArrayValue) -> Result<()> {
    match value {
        ArrayValue::Int(a) => {
            w.write_u8(ARRAY_TAG_INT)?;
            w.write_u8(width_tag(a.width))?;
            w.write_u8(a.deflate as u8)?;
            w.write_u32::<LittleEndian>(a.data.len() as u32)?;
            let payload = pack_ints(a.width, &a.data);
            write_payload(w, &payload, a.deflate)?;
        }
        ArrayValue::Bits(bits) => {
            w.write_u8(ARRAY_TAG_BITS)?;
            w.write_u64::<LittleEndian>(bits.len() as u64)?;
            w.write_u32::<LittleEndian>(bits.num_words() as u32)?;
            for &word in bits.words() {
                w.write_u64::<LittleEndian>(word)?;
            }
        }
        ArrayValue::Compound(c) => {
            w.write_u8(ARRAY_TAG_COMPOUND)?;
            write_schema(w, &c.schema)?;
            w.write_u32::<LittleEndian>(c.chunk_size as u32)?;
            w.write_u8(c.deflate as u8)?;
            w.write_u32::<LittleEndian>(c.records.len() as u32)?;
            let payload = pack_records(&c.schema, &c.records);
            write_payload(w, &payload, c.deflate)?;
        }
        ArrayValue::Enum(e) => {
            w.write_u8(ARRAY_TAG_ENUM)?;
            w.write_u32::<LittleEndian>(e.options.len() as u32)?;
            for option in &e.options {
                write_str(w, option)?;
            }
            // Ordinals are packed at the narrowest width the option count allows.
            let width = IntWidth::narrowest_for(e.options.len().saturating_sub(1) as u32);
            w.write_u8(width_tag(width))?;
            w.write_u32::<LittleEndian>(e.ordinals.len() as u32)?;
            w.write_all(&pack_ints(width, &e.ordinals))?;
        }
        ArrayValue::Float32(values) => {
            w.write_u8(ARRAY_TAG_FLOAT32)?;
            w.write_u32::<LittleEndian>(values.len() as u32)?;
            for &v in values {
                w.write_f32::<LittleEndian>(v)?;
            }
        }
        ArrayValue::Strings(values) => {
            w.write_u8(ARRAY_TAG_STRINGS)?;
            w.write_u32::<LittleEndian>(values.len() as u32)?;
            for v in values {
                write_str(w, v)?;
            }
        }
    }
    Ok(())
}

fn write_payload<W: Write>(w: &mut W, payload: &[u8], deflate: bool) -> Result<()> {
    let bytes = if deflate { compress(payload)? } else { payload.to_vec() };
    w.write_u32::<LittleEndian>(bytes.len() as u32)?;
    w.write_all(&bytes)?;
    Ok(())
}

fn write_schema<W: Write>(w: &mut W, schema: &CompoundSchema) -> Result<()> {
    w.write_u32::<LittleEndian>(schema.fields.len() as u32)?;
    for field in &schema.fields {
        write_str(w, &field.name)?;
        match &field.ty {
            FieldType::Int8 => w.write_u8(FIELD_TAG_INT8)?,
            FieldType::Int16 => w.write_u8(FIELD_TAG_INT16)?,
            FieldType::Int32 => w.write_u8(FIELD_TAG_INT32)?,
            FieldType::Int64 => w.write_u8(FIELD_TAG_INT64)?,
            FieldType::Float32 => w.write_u8(FIELD_TAG_FLOAT32)?,
            FieldType::Float64 => w.write_u8(FIELD_TAG_FLOAT64)?,
            FieldType::Bool => w.write_u8(FIELD_TAG_BOOL)?,
            FieldType::Str(len) => {
                w.write_u8(FIELD_TAG_STR)?;
                w.write_u32::<LittleEndian>(*len)?;
            }
            FieldType::Enum(options) => {
                w.write_u8(FIELD_TAG_ENUM)?;
                w.write_u32::<LittleEndian>(options.len() as u32)?;
                for option in options {
                    write_str(w, option)?;
                }
            }
        }
    }
    Ok(())
}

pub(super) fn width_tag(width: IntWidth) -> u8 {
    match width {
        IntWidth::U8 => 0,
        IntWidth::U16 => 1,
        IntWidth::U32 => 2,
    }
}

pub(super) fn pack_ints(width: IntWidth, data: &[u32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() * width.num_bytes());
    for &v in data {
        match width {
            IntWidth::U8 => out.push(v as u8),
            IntWidth::U16 => out.extend_from_slice(&(v as u16).to_le_bytes()),
            IntWidth::U32 => out.extend_from_slice(&v.to_le_bytes()),
        }
    }
    out
}

pub(super) fn pack_records(schema: &CompoundSchema, records: &[Record]) -> Vec<u8> {
    let mut out = Vec::with_capacity(records.len() * schema.record_bytes());
    for record in records {
        for (value, field) in record.iter().zip(&schema.fields) {
            pack_field(&mut out, &field.ty, value);
        }
    }
    out
}

fn pack_field(out: &mut Vec<u8>, ty: &FieldType, value: &FieldValue) {
    match (ty, value) {
        (FieldType::Int8, FieldValue::Int(v)) => out.push(*v as i8 as u8),
        (FieldType::Int16, FieldValue::Int(v)) => {
            out.extend_from_slice(&(*v as i16).to_le_bytes())
        }
        (FieldType::Int32, FieldValue::Int(v)) => {
            out.extend_from_slice(&(*v as i32).to_le_bytes())
        }
        (FieldType::Int64, FieldValue::Int(v)) => out.extend_from_slice(&v.to_le_bytes()),
        (FieldType::Float32, FieldValue::Float(v)) => {
            out.extend_from_slice(&(*v as f32).to_le_bytes())
        }
        (FieldType::Float64, FieldValue::Float(v)) => out.extend_from_slice(&v.to_le_bytes()),
        (FieldType::Bool, FieldValue::Bool(v)) => out.push(*v as u8),
        (FieldType::Str(len), FieldValue::Str(s)) => {
            let mut bytes = s.as_bytes().to_vec();
            bytes.resize(*len as usize, 0);
            out.extend_from_slice(&bytes);
        }
        (FieldType::Enum(_), FieldValue::Enum(ord)) => out.extend_from_slice(&ord.to_le_bytes()),
        // Records are schema-checked before they reach the array.
        _ => unreachable!("record does not match schema"),
    }
}
