//! Segmented-object geometry: bounding boxes and packed pixel masks.
//!
//! A [`SegmentedObject`] is one detected object within a field: an inclusive
//! bounding box, a per-pixel bitmask relative to that box (bit
//! `(y - min_y) * width + (x - min_x)`), and an optional edge-pixel mask.
//! The masks of all objects of one field are packed back to back into a
//! single shared bit-vector; each box carries its bit offset into that
//! vector, assigned during the write pass and word-aligned to 64-bit
//! boundaries.

mod edge;

pub use edge::{EdgeDetector, FourNeighborEdgeDetector};

use crate::util::{BitVec, Error, Result, WORD_BITS};

/// Inclusive bounding box of a segmented object, with bit-offset bookkeeping
/// for the shared packed-mask vector. Coordinates are 16-bit.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SegmentedObjectBox {
    pub min_x: u16,
    pub min_y: u16,
    pub max_x: u16,
    pub max_y: u16,
    offset: Option<u64>,
}

impl SegmentedObjectBox {
    /// Create a box from inclusive bounds. The box extent must be known at
    /// construction; offset assignment happens later, during the write pass.
    pub fn new(min_x: u16, min_y: u16, max_x: u16, max_y: u16) -> Result<Self> {
        if min_x > max_x || min_y > max_y {
            return Err(Error::illegal(format!(
                "degenerate box ({min_x},{min_y})-({max_x},{max_y})"
            )));
        }
        Ok(Self { min_x, min_y, max_x, max_y, offset: None })
    }

    /// Compute the tight bounding box of a non-empty pixel set.
    pub fn of_pixels(pixels: &[(u16, u16)]) -> Result<Self> {
        let first = pixels
            .first()
            .ok_or_else(|| Error::illegal("cannot compute a box of zero pixels"))?;
        let (mut min_x, mut min_y) = *first;
        let (mut max_x, mut max_y) = *first;
        for &(x, y) in &pixels[1..] {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        Self::new(min_x, min_y, max_x, max_y)
    }

    #[inline]
    pub fn width(&self) -> usize {
        (self.max_x - self.min_x) as usize + 1
    }

    #[inline]
    pub fn height(&self) -> usize {
        (self.max_y - self.min_y) as usize + 1
    }

    /// Mask size in bits (width x height).
    #[inline]
    pub fn num_bits(&self) -> usize {
        self.width() * self.height()
    }

    /// Mask size rounded up to the next 64-bit storage word.
    #[inline]
    pub fn size_in_words(&self) -> usize {
        self.num_bits().div_ceil(WORD_BITS)
    }

    /// Cheap bounds test, run before any bit test.
    #[inline]
    pub fn in_box(&self, x: u16, y: u16) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Bit index of (x, y) relative to the box. Requires `in_box(x, y)`.
    #[inline]
    pub fn relative_bit_index(&self, x: u16, y: u16) -> usize {
        debug_assert!(self.in_box(x, y));
        (y - self.min_y) as usize * self.width() + (x - self.min_x) as usize
    }

    /// Bit index of (x, y) in the shared mask vector.
    pub fn absolute_bit_index(&self, x: u16, y: u16) -> Result<u64> {
        Ok(self.offset()? + self.relative_bit_index(x, y) as u64)
    }

    /// Assign this box's bit offset in the shared mask vector. Offsets are a
    /// cumulative sum of prior objects' word counts, so they are always
    /// word-aligned.
    pub fn assign_offset(&mut self, offset: u64) {
        debug_assert_eq!(offset % WORD_BITS as u64, 0, "offset must be word-aligned");
        self.offset = Some(offset);
    }

    /// This box's bit offset, or an error if none was assigned yet.
    pub fn offset(&self) -> Result<u64> {
        self.offset
            .ok_or_else(|| Error::illegal("box has no offset assigned yet"))
    }
}

/// One segmented object: box, pixel mask, optional edge mask.
#[derive(Clone, PartialEq, Debug)]
pub struct SegmentedObject {
    bbox: SegmentedObjectBox,
    mask: BitVec,
    edge_mask: Option<BitVec>,
}

impl SegmentedObject {
    /// Create an object from a box and a mask of matching shape.
    pub fn new(bbox: SegmentedObjectBox, mask: BitVec) -> Result<Self> {
        if mask.len() != bbox.num_bits() {
            return Err(Error::illegal(format!(
                "mask has {} bits, box needs {}",
                mask.len(),
                bbox.num_bits()
            )));
        }
        Ok(Self { bbox, mask, edge_mask: None })
    }

    /// Create an object from its absolute pixel coordinates.
    pub fn from_pixels(pixels: &[(u16, u16)]) -> Result<Self> {
        let bbox = SegmentedObjectBox::of_pixels(pixels)?;
        let mut mask = BitVec::zeroed(bbox.num_bits());
        for &(x, y) in pixels {
            mask.set(bbox.relative_bit_index(x, y), true);
        }
        Self::new(bbox, mask)
    }

    /// Attach an explicitly supplied edge mask of matching shape.
    pub fn with_edge_mask(mut self, edge_mask: BitVec) -> Result<Self> {
        if edge_mask.len() != self.bbox.num_bits() {
            return Err(Error::illegal(format!(
                "edge mask has {} bits, box needs {}",
                edge_mask.len(),
                self.bbox.num_bits()
            )));
        }
        self.edge_mask = Some(edge_mask);
        Ok(self)
    }

    #[inline]
    pub fn bbox(&self) -> &SegmentedObjectBox {
        &self.bbox
    }

    #[inline]
    pub(crate) fn bbox_mut(&mut self) -> &mut SegmentedObjectBox {
        &mut self.bbox
    }

    #[inline]
    pub fn mask(&self) -> &BitVec {
        &self.mask
    }

    /// The stored edge mask, if one was supplied or read from storage.
    #[inline]
    pub fn stored_edge_mask(&self) -> Option<&BitVec> {
        self.edge_mask.as_ref()
    }

    /// The edge mask, deriving it through `detector` when none is stored.
    /// The computed mask is returned, not written back to this object.
    pub fn edge_mask(&self, detector: &dyn EdgeDetector) -> BitVec {
        match &self.edge_mask {
            Some(edge) => edge.clone(),
            None => detector.detect(&self.mask, self.bbox.width(), self.bbox.height()),
        }
    }

    /// Whether pixel (x, y), in absolute coordinates, belongs to the object.
    pub fn contains_pixel(&self, x: u16, y: u16) -> bool {
        self.bbox.in_box(x, y) && self.mask.get(self.bbox.relative_bit_index(x, y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_geometry() {
        let b = SegmentedObjectBox::new(2, 3, 5, 4).unwrap();
        assert_eq!(b.width(), 4);
        assert_eq!(b.height(), 2);
        assert_eq!(b.num_bits(), 8);
        assert_eq!(b.size_in_words(), 1);

        assert!(b.in_box(2, 3));
        assert!(b.in_box(5, 4));
        assert!(!b.in_box(6, 4));
        assert!(!b.in_box(2, 2));

        assert_eq!(b.relative_bit_index(2, 3), 0);
        assert_eq!(b.relative_bit_index(5, 3), 3);
        assert_eq!(b.relative_bit_index(2, 4), 4);
    }

    #[test]
    fn test_degenerate_box_rejected() {
        assert!(SegmentedObjectBox::new(5, 0, 4, 0).is_err());
    }

    #[test]
    fn test_offset_bookkeeping() {
        let mut b = SegmentedObjectBox::new(0, 0, 9, 9).unwrap();
        assert!(b.offset().is_err());
        assert!(b.absolute_bit_index(3, 3).is_err());

        b.assign_offset(128);
        assert_eq!(b.offset().unwrap(), 128);
        assert_eq!(
            b.absolute_bit_index(3, 3).unwrap(),
            128 + b.relative_bit_index(3, 3) as u64
        );
        assert_eq!(b.size_in_words(), 2); // 100 bits
    }

    #[test]
    fn test_from_pixels() {
        let obj =
            SegmentedObject::from_pixels(&[(4, 4), (5, 4), (4, 5), (5, 5), (6, 4)]).unwrap();
        let b = obj.bbox();
        assert_eq!((b.min_x, b.min_y, b.max_x, b.max_y), (4, 4, 6, 5));
        assert_eq!(obj.mask().count_ones(), 5);
        assert!(obj.contains_pixel(5, 5));
        assert!(!obj.contains_pixel(6, 5));
        assert!(!obj.contains_pixel(100, 100));
    }

    #[test]
    fn test_edge_mask_on_demand() {
        let pixels: Vec<(u16, u16)> =
            (0..4).flat_map(|y| (0..4).map(move |x| (x, y))).collect();
        let obj = SegmentedObject::from_pixels(&pixels).unwrap();
        assert!(obj.stored_edge_mask().is_none());

        let edge = obj.edge_mask(&FourNeighborEdgeDetector);
        assert_eq!(edge.count_ones(), 12);
        // Still not stored after computation.
        assert!(obj.stored_edge_mask().is_none());

        let explicit = BitVec::zeroed(16);
        let obj = obj.with_edge_mask(explicit.clone()).unwrap();
        assert_eq!(obj.stored_edge_mask(), Some(&explicit));
        assert_eq!(obj.edge_mask(&FourNeighborEdgeDetector), explicit);
    }
}
