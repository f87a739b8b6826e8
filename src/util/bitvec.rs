//! Word-packed bit vector used for segmentation masks.
//!
//! Bits are stored LSB-first inside 64-bit words; bit `i` lives in word
//! `i / 64` at position `i % 64`. Masks for all objects of one field are
//! concatenated into one such vector, so the windowing operations here work
//! on arbitrary bit offsets, not only word boundaries.

/// Number of bits per storage word.
pub const WORD_BITS: usize = 64;

/// A growable, word-packed sequence of single-bit flags.
#[derive(Clone, PartialEq, Eq)]
pub struct BitVec {
    words: Vec<u64>,
    len: usize,
}

impl BitVec {
    /// Create a zeroed bit vector of the given length in bits.
    pub fn zeroed(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(WORD_BITS)],
            len,
        }
    }

    /// Wrap existing storage words, keeping the first `len` bits.
    pub fn from_words(words: Vec<u64>, len: usize) -> Self {
        debug_assert!(words.len() * WORD_BITS >= len);
        Self { words, len }
    }

    /// Length in bits.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if no bits are stored.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Length in storage words.
    #[inline]
    pub fn num_words(&self) -> usize {
        self.words.len()
    }

    /// The backing words.
    #[inline]
    pub fn words(&self) -> &[u64] {
        &self.words
    }

    /// Consume into the backing words.
    pub fn into_words(self) -> Vec<u64> {
        self.words
    }

    /// Test bit `index`.
    #[inline]
    pub fn get(&self, index: usize) -> bool {
        debug_assert!(index < self.len, "bit index {index} out of range {}", self.len);
        (self.words[index / WORD_BITS] >> (index % WORD_BITS)) & 1 == 1
    }

    /// Set bit `index` to `value`.
    #[inline]
    pub fn set(&mut self, index: usize, value: bool) {
        debug_assert!(index < self.len, "bit index {index} out of range {}", self.len);
        let mask = 1u64 << (index % WORD_BITS);
        if value {
            self.words[index / WORD_BITS] |= mask;
        } else {
            self.words[index / WORD_BITS] &= !mask;
        }
    }

    /// Number of set bits.
    pub fn count_ones(&self) -> usize {
        // Trailing padding bits are kept zero by the mutating operations.
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Copy `len` bits from `src` starting at `src_off` into `self` starting
    /// at `dst_off`. Ranges must lie within the respective vectors.
    pub fn copy_bits(&mut self, src: &BitVec, src_off: usize, dst_off: usize, len: usize) {
        debug_assert!(src_off + len <= src.len);
        debug_assert!(dst_off + len <= self.len);
        for i in 0..len {
            if src.get(src_off + i) {
                self.set(dst_off + i, true);
            }
        }
    }

    /// Extract a window of `len` bits starting at `offset` as a fresh vector.
    pub fn window(&self, offset: usize, len: usize) -> BitVec {
        debug_assert!(offset + len <= self.len);
        let mut out = BitVec::zeroed(len);
        out.copy_bits(self, offset, 0, len);
        out
    }
}

impl std::fmt::Debug for BitVec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BitVec({} bits, {} set)", self.len, self.count_ones())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get() {
        let mut bv = BitVec::zeroed(130);
        bv.set(0, true);
        bv.set(63, true);
        bv.set(64, true);
        bv.set(129, true);
        assert!(bv.get(0));
        assert!(bv.get(63));
        assert!(bv.get(64));
        assert!(bv.get(129));
        assert!(!bv.get(1));
        assert!(!bv.get(128));
        assert_eq!(bv.count_ones(), 4);

        bv.set(63, false);
        assert!(!bv.get(63));
        assert_eq!(bv.count_ones(), 3);
    }

    #[test]
    fn test_copy_bits_unaligned() {
        let mut src = BitVec::zeroed(40);
        for i in (0..40).step_by(3) {
            src.set(i, true);
        }
        let mut dst = BitVec::zeroed(200);
        dst.copy_bits(&src, 5, 71, 30);
        for i in 0..30 {
            assert_eq!(dst.get(71 + i), src.get(5 + i), "bit {i}");
        }
        assert_eq!(dst.count_ones(), src.window(5, 30).count_ones());
    }

    #[test]
    fn test_window_roundtrip() {
        let mut bv = BitVec::zeroed(128);
        for i in [3, 17, 64, 65, 100] {
            bv.set(i, true);
        }
        let w = bv.window(60, 50);
        assert_eq!(w.len(), 50);
        assert!(w.get(4)); // original bit 64
        assert!(w.get(5)); // original bit 65
        assert!(w.get(40)); // original bit 100
        assert_eq!(w.count_ones(), 3);
    }
}
