//! The in-memory group tree and path-addressed store handle.

use std::collections::BTreeMap;
use std::path::Path;

use crate::util::{Error, Result};

use super::value::{ArrayValue, AttrValue};

/// A named hierarchical group holding typed attributes, typed arrays, and
/// child groups.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Group {
    pub(crate) attrs: BTreeMap<String, AttrValue>,
    pub(crate) arrays: BTreeMap<String, ArrayValue>,
    pub(crate) children: BTreeMap<String, Group>,
}

impl Group {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if the group has no attributes, arrays, or children.
    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty() && self.arrays.is_empty() && self.children.is_empty()
    }

    // --- children ---

    pub fn has_child(&self, name: &str) -> bool {
        self.children.contains_key(name)
    }

    pub fn child(&self, name: &str) -> Result<&Group> {
        self.children
            .get(name)
            .ok_or_else(|| Error::NotFound(format!("group '{name}'")))
    }

    pub fn child_mut(&mut self, name: &str) -> Result<&mut Group> {
        self.children
            .get_mut(name)
            .ok_or_else(|| Error::NotFound(format!("group '{name}'")))
    }

    /// Get or create a direct child group.
    pub fn ensure_child(&mut self, name: &str) -> &mut Group {
        self.children.entry(name.to_string()).or_default()
    }

    /// Names of all direct child groups, in sorted order.
    pub fn child_names(&self) -> impl Iterator<Item = &str> {
        self.children.keys().map(String::as_str)
    }

    // --- attributes ---

    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.contains_key(name)
    }

    pub fn attr(&self, name: &str) -> Result<&AttrValue> {
        self.attrs
            .get(name)
            .ok_or_else(|| Error::NotFound(format!("attribute '{name}'")))
    }

    pub fn try_attr(&self, name: &str) -> Option<&AttrValue> {
        self.attrs.get(name)
    }

    pub fn set_attr(&mut self, name: &str, value: AttrValue) {
        self.attrs.insert(name.to_string(), value);
    }

    /// Names of all attributes, in sorted order.
    pub fn attr_names(&self) -> impl Iterator<Item = &str> {
        self.attrs.keys().map(String::as_str)
    }

    // --- arrays ---

    pub fn has_array(&self, name: &str) -> bool {
        self.arrays.contains_key(name)
    }

    pub fn array(&self, name: &str) -> Result<&ArrayValue> {
        self.arrays
            .get(name)
            .ok_or_else(|| Error::NotFound(format!("array '{name}'")))
    }

    pub fn array_mut(&mut self, name: &str) -> Result<&mut ArrayValue> {
        self.arrays
            .get_mut(name)
            .ok_or_else(|| Error::NotFound(format!("array '{name}'")))
    }

    pub fn set_array(&mut self, name: &str, value: ArrayValue) {
        self.arrays.insert(name.to_string(), value);
    }

    /// Resolve a slash-separated descendant path.
    pub fn descend(&self, path: &str) -> Result<&Group> {
        let mut group = self;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            group = group.child(segment)?;
        }
        Ok(group)
    }

    /// Resolve a slash-separated descendant path mutably, creating missing
    /// groups along the way.
    pub fn descend_or_create(&mut self, path: &str) -> &mut Group {
        let mut group = self;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            group = group.ensure_child(segment);
        }
        group
    }

    /// Whether a slash-separated descendant path exists.
    pub fn exists(&self, path: &str) -> bool {
        self.descend(path).is_ok()
    }
}

/// A hierarchical, typed, group-oriented store with one-file persistence.
///
/// The whole tree is materialized in memory: [`Store::open`] parses the file
/// eagerly and [`Store::save`] serializes it back. One writer handle or one
/// reader handle per file, single-threaded; see the crate docs for the
/// concurrency contract.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Store {
    root: Group,
}

impl Store {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a store from a file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        super::reader::read_store(path.as_ref())
    }

    /// Serialize the store to a file, replacing any existing content.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        super::writer::write_store(self, path.as_ref())
    }

    pub fn root(&self) -> &Group {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Group {
        &mut self.root
    }

    pub(crate) fn from_root(root: Group) -> Self {
        Self { root }
    }
}
