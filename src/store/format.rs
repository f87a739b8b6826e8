//! Store file constants.

/// Magic bytes at the start of a store file.
pub const STORE_MAGIC: &[u8; 8] = b"CLDSTORE";

/// Current store file version.
pub const CURRENT_VERSION: u16 = 1;

// Type tags for serialized attribute values.
pub const ATTR_TAG_STR: u8 = 0;
pub const ATTR_TAG_INT: u8 = 1;
pub const ATTR_TAG_FLOAT: u8 = 2;
pub const ATTR_TAG_COMPOUND: u8 = 3;

// Type tags for serialized arrays.
pub const ARRAY_TAG_INT: u8 = 0;
pub const ARRAY_TAG_BITS: u8 = 1;
pub const ARRAY_TAG_COMPOUND: u8 = 2;
pub const ARRAY_TAG_ENUM: u8 = 3;
pub const ARRAY_TAG_FLOAT32: u8 = 4;
pub const ARRAY_TAG_STRINGS: u8 = 5;

// Type tags for compound-schema field types.
pub const FIELD_TAG_INT8: u8 = 0;
pub const FIELD_TAG_INT16: u8 = 1;
pub const FIELD_TAG_INT32: u8 = 2;
pub const FIELD_TAG_INT64: u8 = 3;
pub const FIELD_TAG_FLOAT32: u8 = 4;
pub const FIELD_TAG_FLOAT64: u8 = 5;
pub const FIELD_TAG_BOOL: u8 = 6;
pub const FIELD_TAG_STR: u8 = 7;
pub const FIELD_TAG_ENUM: u8 = 8;
