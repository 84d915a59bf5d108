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

// Write buffer
// Per-page modification log of the index. Instead of dirty page images the
// buffer stores variable-sized replacement entries per page, and rebuilds
// the current logical image of a page on demand by merging them onto the
// last flushed image.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::mem;
use std::time::Instant;

use crate::buffer::lib::{EfindError, EfindResult, NodeStatus};
use crate::buffer::mod_set::{MOD_ENTRY_OVERHEAD, ModSet};
use crate::page::entry::NodeEntry;
use crate::page::node::{Height, NodePage, PageId};

/// Fixed bookkeeping cost of one buffered page: key, status, modification
/// counter, height, timestamp and the modification-set root.
pub const WRITE_ENTRY_OVERHEAD: usize =
    mem::size_of::<PageId>() + 1 + 4 + mem::size_of::<Height>() + 8 + mem::size_of::<ModSet>();

/// One buffered page.
#[derive(Debug, Clone)]
pub struct WriteEntry {
    pub status: NodeStatus,
    /// Mutations applied to this entry since it was created; reset by flush
    /// (the entry leaves the buffer).
    pub modify_count: u32,
    pub height: Height,
    /// Monotonic timestamp of the last mutation, in milliseconds.
    pub last_modified_ms: i64,
    pub mods: ModSet,
}

/// The write buffer: an id-ordered map of buffered pages with byte-budget
/// accounting. All operations are pure state transitions; capacity
/// enforcement and durability logging belong to the index, which also shares
/// these transitions with log replay.
pub struct WriteBuffer {
    entries: BTreeMap<PageId, WriteEntry>,
    current_bytes: usize,
    capacity_bytes: usize,
    epoch: Instant,
}

impl WriteBuffer {
    pub fn new(capacity_bytes: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            current_bytes: 0,
            capacity_bytes,
            epoch: Instant::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn current_bytes(&self) -> usize {
        self.current_bytes
    }

    pub fn capacity_bytes(&self) -> usize {
        self.capacity_bytes
    }

    pub fn contains(&self, page: PageId) -> bool {
        self.entries.contains_key(&page)
    }

    pub fn status(&self, page: PageId) -> Option<NodeStatus> {
        self.entries.get(&page).map(|e| e.status)
    }

    pub fn get(&self, page: PageId) -> Option<&WriteEntry> {
        self.entries.get(&page)
    }

    /// Buffered pages in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (&PageId, &WriteEntry)> {
        self.entries.iter()
    }

    fn now_ms(&self) -> i64 {
        self.epoch.elapsed().as_millis() as i64
    }

    /// Whether `required` additional bytes fit in the budget.
    pub fn fits(&self, required: usize) -> bool {
        self.current_bytes + required <= self.capacity_bytes
    }

    /// Bytes a `create` of this page would add.
    pub fn required_for_create(&self, page: PageId) -> usize {
        if self.entries.contains_key(&page) { 0 } else { WRITE_ENTRY_OVERHEAD }
    }

    /// Upper bound of the bytes a `modify` with `entry` would add. The bound
    /// ignores a possible refund from superseding an earlier modification of
    /// the same identity.
    pub fn required_for_modify(&self, page: PageId, entry: &NodeEntry) -> usize {
        let base = if self.entries.contains_key(&page) { 0 } else { WRITE_ENTRY_OVERHEAD };
        base + MOD_ENTRY_OVERHEAD + entry.serialized_size()
    }

    /// Bytes a `delete` of this page would add (deletions only cost the
    /// bookkeeping of a previously unknown page).
    pub fn required_for_delete(&self, page: PageId) -> usize {
        if self.entries.contains_key(&page) { 0 } else { WRITE_ENTRY_OVERHEAD }
    }

    /// Registers a newly created node. The page must be absent or deleted; a
    /// deleted page is resurrected with an empty modification set.
    pub fn apply_create(&mut self, page: PageId, height: Height) -> EfindResult<()> {
        let now = self.now_ms();
        match self.entries.get_mut(&page) {
            Some(entry) if entry.status != NodeStatus::Deleted => {
                return Err(EfindError::InvalidOperation(format!(
                    "node {page} already exists in the write buffer"
                )));
            }
            Some(entry) => {
                entry.status = NodeStatus::New;
                entry.height = height;
                entry.last_modified_ms = now;
                entry.modify_count += 1;
            }
            None => {
                self.entries.insert(
                    page,
                    WriteEntry {
                        status: NodeStatus::New,
                        modify_count: 1,
                        height,
                        last_modified_ms: now,
                        mods: ModSet::new(),
                    },
                );
                self.current_bytes += WRITE_ENTRY_OVERHEAD;
            }
        }
        Ok(())
    }

    /// Registers one entry modification. A deleted page cannot be modified
    /// without an intervening create; a page seen for the first time becomes
    /// `Modified` (it exists on storage).
    pub fn apply_modify(&mut self, page: PageId, entry: NodeEntry, height: Height) -> EfindResult<()> {
        let now = self.now_ms();
        let delta = match self.entries.entry(page) {
            Entry::Occupied(mut occupied) => {
                let slot = occupied.get_mut();
                if slot.status == NodeStatus::Deleted {
                    return Err(EfindError::InvalidOperation(format!(
                        "node {page} was deleted; modifying it requires recreating it first"
                    )));
                }
                let delta = slot.mods.insert(entry);
                slot.last_modified_ms = now;
                slot.modify_count += 1;
                delta
            }
            Entry::Vacant(vacant) => {
                let mut slot = WriteEntry {
                    status: NodeStatus::Modified,
                    modify_count: 1,
                    height,
                    last_modified_ms: now,
                    mods: ModSet::new(),
                };
                let delta = slot.mods.insert(entry) + WRITE_ENTRY_OVERHEAD as isize;
                vacant.insert(slot);
                delta
            }
        };
        self.current_bytes = (self.current_bytes as isize + delta) as usize;
        Ok(())
    }

    /// Registers a node deletion, dropping any buffered modifications.
    pub fn apply_delete(&mut self, page: PageId, height: Height) -> EfindResult<()> {
        let now = self.now_ms();
        match self.entries.get_mut(&page) {
            Some(entry) => {
                let freed = entry.mods.clear();
                self.current_bytes -= freed;
                entry.status = NodeStatus::Deleted;
                entry.last_modified_ms = now;
                entry.modify_count += 1;
            }
            None => {
                self.entries.insert(
                    page,
                    WriteEntry {
                        status: NodeStatus::Deleted,
                        modify_count: 1,
                        height,
                        last_modified_ms: now,
                        mods: ModSet::new(),
                    },
                );
                self.current_bytes += WRITE_ENTRY_OVERHEAD;
            }
        }
        Ok(())
    }

    /// Releases a flushed page. Returns false when the page was not buffered
    /// (an unnecessary flush).
    pub fn remove(&mut self, page: PageId) -> bool {
        match self.entries.remove(&page) {
            Some(mut entry) => {
                self.current_bytes -= WRITE_ENTRY_OVERHEAD + entry.mods.clear();
                true
            }
            None => false,
        }
    }

    /// Drops every buffered page.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.current_bytes = 0;
    }

    /// Builds the current logical image of a buffered page by applying its
    /// modifications onto `base` in key order. `New` pages start from an
    /// empty base regardless of `base`; deleted pages have no image. The
    /// caller re-sorts the result when the tree requires a natural order.
    pub fn merged_page(&self, page: PageId, base: Option<NodePage>) -> Option<NodePage> {
        let entry = self.entries.get(&page)?;
        match entry.status {
            NodeStatus::Deleted => None,
            NodeStatus::New => {
                let mut merged = NodePage::empty();
                for m in entry.mods.iter() {
                    merged.replace_or_append(*m);
                }
                Some(merged)
            }
            NodeStatus::Modified => {
                let mut merged = base.unwrap_or_else(NodePage::empty);
                for m in entry.mods.iter() {
                    merged.replace_or_append(*m);
                }
                Some(merged)
            }
        }
    }
}
