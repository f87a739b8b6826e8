//! Parent/child adjacency tables for object tracking.
//!
//! An [`ObjectLinking`] is a two-column (parent id, child id) table sorted
//! primarily by parent. Children-of queries binary-search the forward table;
//! parents-of queries use a reverse-sorted copy that is built at most once
//! per instance and memoized. The memoized build is not safe to race from
//! multiple threads; callers sharing one instance must synchronize
//! externally (the whole engine is single-threaded by contract).

use once_cell::unsync::OnceCell;

use crate::store::IntWidth;
use crate::util::{Error, Result};

/// Payload size above which linking tables are stored deflated.
const DEFLATE_THRESHOLD_BYTES: usize = 4096;

/// Sorted two-column adjacency table with range queries in both directions.
#[derive(Debug)]
pub struct ObjectLinking {
    /// Sorted by (parent, child).
    forward: Vec<(u32, u32)>,
    /// Sorted by (child, parent); built lazily, at most once.
    reverse: OnceCell<Vec<(u32, u32)>>,
}

impl ObjectLinking {
    /// Build a linking from a flat row-major table. Exactly 2 columns are
    /// required; anything else is an illegal argument.
    pub fn new(num_columns: usize, flat: &[u32]) -> Result<Self> {
        if num_columns != 2 {
            return Err(Error::illegal(format!(
                "linking table must have exactly 2 columns, got {num_columns}"
            )));
        }
        if flat.len() % 2 != 0 {
            return Err(Error::illegal(format!(
                "linking table length {} is not a multiple of 2",
                flat.len()
            )));
        }
        let mut forward: Vec<(u32, u32)> =
            flat.chunks_exact(2).map(|row| (row[0], row[1])).collect();
        forward.sort_unstable();
        Ok(Self { forward, reverse: OnceCell::new() })
    }

    /// Number of (parent, child) links.
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// The child ids linked to `parent_id`, as a read-only range view.
    /// `O(log n + k)`; an unknown parent yields an empty view.
    pub fn child_ids(&self, parent_id: u32) -> IdView<'_> {
        let rows = range_by_key(&self.forward, parent_id);
        IdView { rows, second_column: true }
    }

    /// The parent ids linking to `child_id`. Forces construction of the
    /// reverse-sorted table on first use. `O(log n + k)` afterwards.
    pub fn parent_ids(&self, child_id: u32) -> IdView<'_> {
        let reverse = self.reverse.get_or_init(|| {
            let mut rows: Vec<(u32, u32)> =
                self.forward.iter().map(|&(p, c)| (c, p)).collect();
            rows.sort_unstable();
            rows
        });
        let rows = range_by_key(reverse, child_id);
        IdView { rows, second_column: true }
    }

    /// The flat row-major (parent, child) table, in forward sort order.
    pub fn to_flat(&self) -> Vec<u32> {
        self.forward.iter().flat_map(|&(p, c)| [p, c]).collect()
    }
}

/// Binary search the first row keyed by `key`, then scan forward to the end
/// of the matching run.
fn range_by_key(rows: &[(u32, u32)], key: u32) -> &[(u32, u32)] {
    let start = rows.partition_point(|&(k, _)| k < key);
    let mut end = start;
    while end < rows.len() && rows[end].0 == key {
        end += 1;
    }
    &rows[start..end]
}

/// A read-only, lazily-iterable view over one column of a row range.
/// No copy is made unless [`IdView::to_vec`] is called.
pub struct IdView<'a> {
    rows: &'a [(u32, u32)],
    second_column: bool,
}

impl<'a> IdView<'a> {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + 'a {
        let second = self.second_column;
        self.rows.iter().map(move |&(a, b)| if second { b } else { a })
    }

    pub fn to_vec(&self) -> Vec<u32> {
        self.iter().collect()
    }
}

/// Accumulates (parent, child) links for one (sequence, tracking type) and
/// reports the value range used to pick the storage codec.
#[derive(Default)]
pub struct LinkingBuilder {
    pairs: Vec<(u32, u32)>,
    max_value: u32,
}

impl LinkingBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one parent -> child link.
    pub fn add_link(&mut self, parent_id: u32, child_id: u32) {
        self.max_value = self.max_value.max(parent_id).max(child_id);
        self.pairs.push((parent_id, child_id));
    }

    /// Add links from one parent to many children.
    pub fn add_links(&mut self, parent_id: u32, child_ids: &[u32]) {
        for &child in child_ids {
            self.add_link(parent_id, child);
        }
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Largest id value seen; drives storage-width selection.
    pub fn max_value(&self) -> u32 {
        self.max_value
    }

    /// The narrowest unsigned storage width able to hold every id.
    pub fn storage_width(&self) -> IntWidth {
        IntWidth::narrowest_for(self.max_value)
    }

    /// Size-driven codec selection: deflate once the packed table exceeds a
    /// fixed threshold, store compact otherwise.
    pub fn should_deflate(&self) -> bool {
        self.pairs.len() * 2 * self.storage_width().num_bytes() >= DEFLATE_THRESHOLD_BYTES
    }

    /// The flat row-major table, sorted by (parent, child).
    pub fn sorted_flat(&self) -> Vec<u32> {
        let mut pairs = self.pairs.clone();
        pairs.sort_unstable();
        pairs.into_iter().flat_map(|(p, c)| [p, c]).collect()
    }

    /// Finish into a queryable linking table.
    pub fn build(&self) -> Result<ObjectLinking> {
        ObjectLinking::new(2, &self.sorted_flat())
    }
}
