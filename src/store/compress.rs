//! Zlib wrapping for deflate-flagged array payloads.
//!
//! Unlike a heuristic scheme, the deflate flag is persisted next to each
//! array, so these helpers always do what they are told.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::util::Result;

/// Compress a payload. Format: `[raw_len: u64 LE][zlib bytes]`.
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    let compressed = encoder.finish()?;

    let mut out = Vec::with_capacity(8 + compressed.len());
    out.extend_from_slice(&(data.len() as u64).to_le_bytes());
    out.extend_from_slice(&compressed);
    Ok(out)
}

/// Decompress a payload produced by [`compress`].
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < 8 {
        return Err(crate::util::Error::UnexpectedEof(data.len() as u64));
    }
    let raw_len = u64::from_le_bytes(data[..8].try_into().unwrap()) as usize;
    let mut decoder = ZlibDecoder::new(&data[8..]);
    let mut out = Vec::with_capacity(raw_len);
    decoder.read_to_end(&mut out)?;
    Ok(out)
}
