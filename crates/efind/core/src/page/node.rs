// eFIND
// Copyright (C) 2025 FESTIval contributors

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

use std::cmp::Ordering;
use std::fmt;
use std::mem;

use crate::page::entry::{EntryKey, NodeEntry};

/// Unique identifier of a node page. Page ids are dense, non-negative
/// integers assigned by the tree's free-list and serve as the primary key of
/// every cache in the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageId(pub i32);

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Height of a node in its tree; 0 is a leaf.
pub type Height = i32;

/// The in-memory image of one node page: an ordered sequence of entries.
/// Empty pages stand both for freshly created nodes and for never-written
/// storage regions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodePage {
    entries: Vec<NodeEntry>,
}

impl NodePage {
    pub fn new(entries: Vec<NodeEntry>) -> Self {
        Self { entries }
    }

    pub fn empty() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[NodeEntry] {
        &self.entries
    }

    pub fn push(&mut self, entry: NodeEntry) {
        self.entries.push(entry);
    }

    /// In-memory footprint of this page, used by the variable-size read
    /// buffer accounting.
    pub fn byte_size(&self) -> usize {
        mem::size_of::<Self>() + self.entries.len() * mem::size_of::<NodeEntry>()
    }

    /// Replaces the entry with the same identity in place, or appends the
    /// entry when no such identity exists. This is the application step of
    /// merge-on-read.
    pub fn replace_or_append(&mut self, entry: NodeEntry) {
        let key: EntryKey = entry.key();
        match self.entries.iter_mut().find(|e| e.key() == key) {
            Some(slot) => *slot = entry,
            None => self.entries.push(entry),
        }
    }

    /// Overwrites this page's content with `other`'s, keeping the allocation.
    pub fn copy_from(&mut self, other: &NodePage) {
        self.entries.clear();
        self.entries.extend_from_slice(other.entries());
    }

    /// Re-sorts the entries by a tree-provided natural order. Only trees that
    /// keep their nodes ordered (the Hilbert R-tree) need this after a merge.
    pub fn sort_entries<F>(&mut self, mut cmp: F)
    where
        F: FnMut(&NodeEntry, &NodeEntry) -> Ordering,
    {
        self.entries.sort_by(|a, b| cmp(a, b));
    }
}
