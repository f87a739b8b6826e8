//! Coordinate value types addressing acquired images and well-fields.
//!
//! An [`ImageId`] identifies one image acquisition within a screening
//! geometry as (row, column, field, sequence index), all 0-based. A
//! [`WellFieldId`] is the sequence-free form. Both produce canonical path
//! segments used to derive storage paths; the encodings are part of the
//! on-disk format and must not change:
//!
//! - image: `R{row}_C{col}_F{field}_S{seq}`
//! - well-field: `Row{row}_col{col}_field{field}` or, with a prefix,
//!   `{prefix}_row{row}_col{col}_field{field}`
//!
//! A [`Geometry`] bounds the valid coordinate space of a dataset and
//! enumerates it in row-major order.

use std::fmt;

/// Identifies one image/field acquisition: (row, column, field, sequence).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ImageId {
    pub row: u32,
    pub column: u32,
    pub field: u32,
    pub sequence: u32,
}

impl ImageId {
    /// Create an image id for a screening acquisition.
    pub const fn new(row: u32, column: u32, field: u32, sequence: u32) -> Self {
        Self { row, column, field, sequence }
    }

    /// Degenerate id for non-screening sequences: row, column and field
    /// are all 0 and only the sequence index varies.
    pub const fn sequence_only(sequence: u32) -> Self {
        Self::new(0, 0, 0, sequence)
    }

    /// The well-field part of this id, dropping the sequence index.
    pub const fn well_field(&self) -> WellFieldId {
        WellFieldId::new(self.row, self.column, self.field)
    }

    /// Canonical path segment for this id.
    pub fn object_name(&self) -> String {
        format!("R{}_C{}_F{}_S{}", self.row, self.column, self.field, self.sequence)
    }

    /// Canonical path segment with a namespacing prefix, e.g. `Masks_R0_C1_F0_S0`.
    pub fn object_name_with_prefix(&self, prefix: &str) -> String {
        format!("{}_{}", prefix, self.object_name())
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.object_name())
    }
}

/// Identifies one well-field: (row, column, field), all 0-based.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct WellFieldId {
    pub row: u32,
    pub column: u32,
    pub field: u32,
}

impl WellFieldId {
    /// Create a well-field id.
    pub const fn new(row: u32, column: u32, field: u32) -> Self {
        Self { row, column, field }
    }

    /// The image id at sequence index 0 for this well-field.
    pub const fn image(&self) -> ImageId {
        ImageId::new(self.row, self.column, self.field, 0)
    }

    /// Canonical path segment for this id.
    pub fn object_name(&self) -> String {
        format!("Row{}_col{}_field{}", self.row, self.column, self.field)
    }

    /// Canonical path segment with a namespacing prefix. Note the lowercase
    /// `row` in the prefixed form; this matches the persisted layout.
    pub fn object_name_with_prefix(&self, prefix: &str) -> String {
        format!("{}_row{}_col{}_field{}", prefix, self.row, self.column, self.field)
    }
}

impl fmt::Display for WellFieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.object_name())
    }
}

/// The enumerable space of valid well-field coordinates for a dataset.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Geometry {
    pub rows: u32,
    pub columns: u32,
    pub fields: u32,
}

impl Geometry {
    /// Create a geometry with the given counts.
    pub const fn new(rows: u32, columns: u32, fields: u32) -> Self {
        Self { rows, columns, fields }
    }

    /// Number of well-field coordinates in this geometry.
    pub const fn len(&self) -> usize {
        self.rows as usize * self.columns as usize * self.fields as usize
    }

    /// True if the geometry contains no coordinates.
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `id` lies within this geometry.
    pub const fn contains(&self, id: &WellFieldId) -> bool {
        id.row < self.rows && id.column < self.columns && id.field < self.fields
    }

    /// Assert that `id` lies within this geometry.
    ///
    /// An out-of-bounds coordinate is a programming error, not a recoverable
    /// condition, so this panics rather than returning a `Result`.
    #[track_caller]
    pub fn check(&self, id: &WellFieldId) {
        assert!(
            self.contains(id),
            "coordinate {} outside geometry {}x{}x{}",
            id, self.rows, self.columns, self.fields
        );
    }

    /// Assert that the well-field part of `id` lies within this geometry.
    #[track_caller]
    pub fn check_image(&self, id: &ImageId) {
        self.check(&id.well_field());
    }

    /// Iterate all well-field coordinates in row-major order
    /// (row, then column, then field). Finite and restartable: each call
    /// returns a fresh iterator.
    pub fn iter(&self) -> GeometryIter {
        GeometryIter { geometry: *self, next: 0 }
    }

    /// Iterate coordinates for which `exists` returns true, in row-major
    /// order. The predicate is evaluated exactly once per coordinate; the
    /// iterator pre-fetches the next accepted element so that a
    /// side-effecting existence check is never run twice.
    pub fn iter_existing<F>(&self, exists: F) -> ExistingIter<F>
    where
        F: FnMut(&WellFieldId) -> bool,
    {
        ExistingIter { inner: self.iter(), exists, lookahead: None, primed: false }
    }
}

/// Row-major iterator over all coordinates of a [`Geometry`].
pub struct GeometryIter {
    geometry: Geometry,
    next: usize,
}

impl Iterator for GeometryIter {
    type Item = WellFieldId;

    fn next(&mut self) -> Option<WellFieldId> {
        if self.next >= self.geometry.len() {
            return None;
        }
        let fields = self.geometry.fields as usize;
        let columns = self.geometry.columns as usize;
        let i = self.next;
        self.next += 1;
        Some(WellFieldId::new(
            (i / (fields * columns)) as u32,
            (i / fields % columns) as u32,
            (i % fields) as u32,
        ))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.geometry.len() - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for GeometryIter {}

/// Existence-filtered coordinate iterator with one-element lookahead.
pub struct ExistingIter<F> {
    inner: GeometryIter,
    exists: F,
    lookahead: Option<WellFieldId>,
    primed: bool,
}

impl<F> ExistingIter<F>
where
    F: FnMut(&WellFieldId) -> bool,
{
    fn advance(&mut self) -> Option<WellFieldId> {
        for id in self.inner.by_ref() {
            if (self.exists)(&id) {
                return Some(id);
            }
        }
        None
    }
}

impl<F> Iterator for ExistingIter<F>
where
    F: FnMut(&WellFieldId) -> bool,
{
    type Item = WellFieldId;

    fn next(&mut self) -> Option<WellFieldId> {
        if !self.primed {
            self.primed = true;
            self.lookahead = self.advance();
        }
        let current = self.lookahead.take()?;
        self.lookahead = self.advance();
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_object_names() {
        let id = ImageId::new(2, 5, 1, 3);
        assert_eq!(id.object_name(), "R2_C5_F1_S3");
        assert_eq!(id.object_name_with_prefix("Masks"), "Masks_R2_C5_F1_S3");

        let wf = WellFieldId::new(0, 7, 2);
        assert_eq!(wf.object_name(), "Row0_col7_field2");
        assert_eq!(wf.object_name_with_prefix("FEATURES"), "FEATURES_row0_col7_field2");
    }

    #[test]
    fn test_sequence_only() {
        let id = ImageId::sequence_only(9);
        assert_eq!(id, ImageId::new(0, 0, 0, 9));
        assert_eq!(id.object_name(), "R0_C0_F0_S9");
    }

    #[test]
    fn test_iteration_completeness_and_order() {
        let g = Geometry::new(2, 3, 2);
        let all: Vec<WellFieldId> = g.iter().collect();
        assert_eq!(all.len(), 12);
        assert_eq!(all.len(), g.len());

        // Row-major: row varies slowest, field fastest.
        assert_eq!(all[0], WellFieldId::new(0, 0, 0));
        assert_eq!(all[1], WellFieldId::new(0, 0, 1));
        assert_eq!(all[2], WellFieldId::new(0, 1, 0));
        assert_eq!(all[6], WellFieldId::new(1, 0, 0));
        assert_eq!(all[11], WellFieldId::new(1, 2, 1));

        let unique: HashSet<_> = all.iter().copied().collect();
        assert_eq!(unique.len(), all.len());
    }

    #[test]
    fn test_iteration_restartable() {
        let g = Geometry::new(2, 2, 1);
        assert_eq!(g.iter().count(), 4);
        assert_eq!(g.iter().count(), 4);
    }

    #[test]
    fn test_existence_filtered_iteration() {
        let g = Geometry::new(2, 3, 2);
        let mut toggle = false;
        let mut evaluations = 0;
        let accepted: Vec<WellFieldId> = g
            .iter_existing(|_| {
                evaluations += 1;
                toggle = !toggle;
                toggle
            })
            .collect();

        // Every other coordinate accepted, relative order preserved.
        assert_eq!(accepted.len(), 6);
        assert_eq!(evaluations, 12);
        let all: Vec<WellFieldId> = g.iter().collect();
        let expected: Vec<WellFieldId> = all.iter().step_by(2).copied().collect();
        assert_eq!(accepted, expected);
    }

    #[test]
    #[should_panic(expected = "outside geometry")]
    fn test_out_of_bounds_panics() {
        Geometry::new(2, 2, 1).check(&WellFieldId::new(2, 0, 0));
    }
}
