//! Pluggable edge detection over packed masks.

use crate::util::BitVec;

/// Edge-detection operation over a packed pixel mask.
///
/// Given a mask of `width * height` bits (bit `y * width + x` set when the
/// pixel belongs to the object), an implementation returns a mask of the same
/// shape with only the edge pixels set. The operation is injected where edge
/// masks are derived on demand; the library never persists a computed edge
/// mask behind the caller's back.
pub trait EdgeDetector {
    fn detect(&self, mask: &BitVec, width: usize, height: usize) -> BitVec;
}

/// Default detector: a set pixel is an edge pixel when any of its
/// 4-neighbors is unset or lies outside the bounding box.
#[derive(Clone, Copy, Debug, Default)]
pub struct FourNeighborEdgeDetector;

impl EdgeDetector for FourNeighborEdgeDetector {
    fn detect(&self, mask: &BitVec, width: usize, height: usize) -> BitVec {
        debug_assert_eq!(mask.len(), width * height);
        let at = |x: isize, y: isize| -> bool {
            if x < 0 || y < 0 || x >= width as isize || y >= height as isize {
                return false;
            }
            mask.get(y as usize * width + x as usize)
        };

        let mut edge = BitVec::zeroed(mask.len());
        for y in 0..height as isize {
            for x in 0..width as isize {
                if !at(x, y) {
                    continue;
                }
                if !(at(x - 1, y) && at(x + 1, y) && at(x, y - 1) && at(x, y + 1)) {
                    edge.set(y as usize * width as usize + x as usize, true);
                }
            }
        }
        edge
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solid_square_edge() {
        // 4x4 all-set: edge is the 12-pixel ring.
        let mask = {
            let mut m = BitVec::zeroed(16);
            for i in 0..16 {
                m.set(i, true);
            }
            m
        };
        let edge = FourNeighborEdgeDetector.detect(&mask, 4, 4);
        assert_eq!(edge.count_ones(), 12);
        assert!(!edge.get(1 * 4 + 1));
        assert!(!edge.get(2 * 4 + 2));
        assert!(edge.get(0));
        assert!(edge.get(15));
    }

    #[test]
    fn test_single_pixel_is_edge() {
        let mut mask = BitVec::zeroed(9);
        mask.set(4, true);
        let edge = FourNeighborEdgeDetector.detect(&mask, 3, 3);
        assert_eq!(edge.count_ones(), 1);
        assert!(edge.get(4));
    }
}
