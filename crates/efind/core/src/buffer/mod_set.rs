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

use std::collections::BTreeMap;
use std::mem;

use crate::page::bbox::{BBox, overlapping_area};
use crate::page::entry::{EntryKey, NodeEntry};

/// Fixed bookkeeping cost of one buffered modification, on top of the entry
/// payload itself.
pub const MOD_ENTRY_OVERHEAD: usize = mem::size_of::<EntryKey>() + 2 * mem::size_of::<usize>();

/// The ordered set of buffered modifications of one page. Modifications are
/// full replacement entries keyed by the tree-defined entry identity; a
/// repeated key supersedes the earlier entry. Iteration is in key order,
/// which makes merge-on-read deterministic.
#[derive(Debug, Clone, Default)]
pub struct ModSet {
    mods: BTreeMap<EntryKey, NodeEntry>,
}

impl ModSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.mods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mods.is_empty()
    }

    fn cost_of(entry: &NodeEntry) -> usize {
        MOD_ENTRY_OVERHEAD + entry.serialized_size()
    }

    /// Inserts a modification, superseding any earlier one with the same
    /// identity. Returns the net change of accounted bytes (negative when a
    /// larger payload was superseded by a smaller one).
    pub fn insert(&mut self, entry: NodeEntry) -> isize {
        let new_cost = Self::cost_of(&entry) as isize;
        match self.mods.insert(entry.key(), entry) {
            Some(old) => new_cost - Self::cost_of(&old) as isize,
            None => new_cost,
        }
    }

    /// Drops every modification, returning the accounted bytes freed.
    pub fn clear(&mut self) -> usize {
        let freed = self.bytes();
        self.mods.clear();
        freed
    }

    /// Accounted byte size of the whole set.
    pub fn bytes(&self) -> usize {
        self.mods.values().map(Self::cost_of).sum()
    }

    /// Modifications in key order.
    pub fn iter(&self) -> impl Iterator<Item = &NodeEntry> {
        self.mods.values()
    }

    /// Union of the bounding boxes of the modifications; `None` when no
    /// modification carries a box.
    pub fn union_bbox(&self) -> Option<BBox> {
        let mut union: Option<BBox> = None;
        for entry in self.mods.values() {
            if let Some(b) = entry.bbox() {
                match union.as_mut() {
                    Some(u) => u.expand(b),
                    None => union = Some(*b),
                }
            }
        }
        union
    }

    /// Self-overlap of the modified region: the summed pairwise intersection
    /// area of the modifications' bounding boxes.
    pub fn overlap_area(&self) -> f64 {
        let boxes: Vec<BBox> = self.mods.values().filter_map(|e| e.bbox().copied()).collect();
        overlapping_area(&boxes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::bbox::BBox;

    #[test]
    fn test_insert_and_key_order_iteration() {
        let mut set = ModSet::new();
        set.insert(NodeEntry::spatial(30, None));
        set.insert(NodeEntry::spatial(10, None));
        set.insert(NodeEntry::spatial(20, None));

        let keys: Vec<i32> = set.iter().map(|e| e.key()).collect();
        assert_eq!(keys, vec![10, 20, 30]);
    }

    #[test]
    fn test_repeat_key_supersedes() {
        let mut set = ModSet::new();
        let first = set.insert(NodeEntry::spatial(5, Some(BBox::new([0.0, 0.0], [1.0, 1.0]))));
        assert!(first > 0);

        // smaller payload replaces the earlier one and refunds the difference
        let delta = set.insert(NodeEntry::spatial(5, None));
        assert_eq!(delta, -32);
        assert_eq!(set.len(), 1);
        assert!(set.iter().next().unwrap().bbox().is_none());
    }

    #[test]
    fn test_byte_accounting_matches_clear() {
        let mut set = ModSet::new();
        let mut total: isize = 0;
        total += set.insert(NodeEntry::spatial(1, Some(BBox::new([0.0, 0.0], [1.0, 1.0]))));
        total += set.insert(NodeEntry::spatial(2, None));
        total += set.insert(NodeEntry::spatial(1, None));

        assert_eq!(total as usize, set.bytes());
        assert_eq!(set.clear(), total as usize);
        assert!(set.is_empty());
    }

    #[test]
    fn test_union_and_overlap() {
        let mut set = ModSet::new();
        set.insert(NodeEntry::spatial(1, Some(BBox::new([0.0, 0.0], [2.0, 2.0]))));
        set.insert(NodeEntry::spatial(2, Some(BBox::new([1.0, 1.0], [3.0, 3.0]))));
        set.insert(NodeEntry::spatial(3, None));

        let union = set.union_bbox().unwrap();
        assert_eq!(union.min, [0.0, 0.0]);
        assert_eq!(union.max, [3.0, 3.0]);
        assert_eq!(set.overlap_area(), 1.0);

        let empty = ModSet::new();
        assert!(empty.union_bbox().is_none());
        assert_eq!(empty.overlap_area(), 0.0);
    }
}
