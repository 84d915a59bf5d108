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

// Hierarchical LRU read buffer
// LRU with height-aware eviction: pages high in the tree are only displaced
// by pages at the same level or higher, so the root and upper levels stay
// resident under leaf-heavy workloads. Entries above the current tree height
// are stale roots and lose their protection.

use std::collections::{HashMap, VecDeque};
use std::mem;

use crate::page::node::{Height, NodePage, PageId};
use crate::statistics::collector::Metrics;

/// Accounted cost of one cached page: image, key and stored height.
fn entry_cost(page: &NodePage) -> usize {
    page.byte_size() + mem::size_of::<PageId>() + mem::size_of::<Height>()
}

struct HlruEntry {
    image: NodePage,
    height: Height,
}

pub struct HlruBuffer {
    capacity: usize,
    current: usize,
    pages: HashMap<PageId, HlruEntry>,
    order: VecDeque<PageId>,
    tree_height: Height,
}

impl HlruBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            current: 0,
            pages: HashMap::new(),
            order: VecDeque::new(),
            tree_height: 0,
        }
    }

    /// Must track the tree: called whenever the index grows or shrinks.
    pub fn set_tree_height(&mut self, height: Height) {
        self.tree_height = height;
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn bytes(&self) -> usize {
        self.current
    }

    pub fn contains(&self, page: PageId) -> bool {
        self.pages.contains_key(&page)
    }

    /// An entry may be displaced by a candidate at `candidate_height` iff the
    /// candidate sits at the same level or above it, or the entry is a stale
    /// root from before the tree shrank.
    fn evictable(&self, entry_height: Height, candidate_height: Height) -> bool {
        candidate_height >= entry_height || entry_height > self.tree_height
    }

    fn touch(&mut self, page: PageId) {
        self.order.retain(|p| *p != page);
        self.order.push_back(page);
    }

    fn remove(&mut self, page: PageId) {
        if let Some(entry) = self.pages.remove(&page) {
            self.current -= entry_cost(&entry.image);
            self.order.retain(|p| *p != page);
        }
    }

    /// Bytes reclaimable for a candidate at `candidate_height`.
    fn evictable_bytes(&self, candidate_height: Height, skip: Option<PageId>) -> usize {
        self.pages
            .iter()
            .filter(|(id, e)| Some(**id) != skip && self.evictable(e.height, candidate_height))
            .map(|(_, e)| entry_cost(&e.image))
            .sum()
    }

    /// Evicts evictable pages in recency order until `required` more bytes
    /// fit. Non-evictable pages are skipped, never displaced.
    fn evict_until_fits(&mut self, candidate_height: Height, required: usize, skip: Option<PageId>) {
        while self.current + required > self.capacity {
            let victim = self.order.iter().copied().find(|p| {
                Some(*p) != skip
                    && self
                        .pages
                        .get(p)
                        .is_some_and(|e| self.evictable(e.height, candidate_height))
            });
            match victim {
                Some(v) => self.remove(v),
                None => break,
            }
        }
    }

    pub fn lookup(&mut self, page: PageId) -> Option<NodePage> {
        let image = self.pages.get(&page).map(|e| e.image.clone())?;
        self.touch(page);
        Some(image)
    }

    pub fn put(&mut self, page: PageId, image: &NodePage, height: Height, force: bool, metrics: &mut Metrics) {
        let required = entry_cost(image);
        if required > self.capacity {
            metrics.read_buffer_refused += 1;
            return;
        }

        if let Some(existing) = self.pages.get(&page) {
            if !force {
                return;
            }
            let old_cost = entry_cost(&existing.image);
            if self.current - old_cost + required <= self.capacity {
                self.touch(page);
                if let Some(existing) = self.pages.get_mut(&page) {
                    existing.image.copy_from(image);
                    existing.height = height;
                }
                self.current = self.current - old_cost + required;
            } else if self.current - self.evictable_bytes(height, None) + required <= self.capacity {
                self.remove(page);
                self.evict_until_fits(height, required, None);
                self.insert(page, image.clone(), height);
            }
            // not enough evictable space: the old image stays
            return;
        }

        if self.current + required <= self.capacity {
            self.insert(page, image.clone(), height);
        } else if self.current - self.evictable_bytes(height, None) + required <= self.capacity {
            self.evict_until_fits(height, required, None);
            self.insert(page, image.clone(), height);
        } else {
            metrics.read_buffer_refused += 1;
        }
    }

    fn insert(&mut self, page: PageId, image: NodePage, height: Height) {
        self.current += entry_cost(&image);
        self.pages.insert(page, HlruEntry { image, height });
        self.order.push_back(page);
    }

    /// Flush-time refresh of a resident copy, keeping its recency position.
    /// Room for a grown image is made from pages evictable for the flushed
    /// page's height only.
    pub fn update_if_needed(&mut self, page: PageId, height: Height, flushed: &NodePage) {
        let Some(existing) = self.pages.get(&page) else { return };
        let old_cost = entry_cost(&existing.image);
        let new_cost = entry_cost(flushed);
        if new_cost > old_cost {
            self.evict_until_fits(height, new_cost - old_cost, Some(page));
        }
        if let Some(existing) = self.pages.get_mut(&page) {
            existing.image.copy_from(flushed);
            existing.height = height;
        }
        self.current = self.current - old_cost + new_cost;
    }

    pub fn invalidate(&mut self, page: PageId) {
        self.remove(page);
    }
}
