//! Basic utilities: error types and the packed bit-vector primitive.

mod bitvec;
mod error;

pub use bitvec::{BitVec, WORD_BITS};
pub use error::{Error, Result};
