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

// LRU read buffer
// The baseline replacement policy: a recency-ordered region of page images
// with variable-size byte accounting. The region mechanics are shared with
// the 2Q-family policies, which manage their own regions with the same
// machinery.

use std::collections::{HashMap, VecDeque};
use std::mem;

use crate::page::node::{NodePage, PageId};
use crate::statistics::collector::Metrics;

/// Accounted cost of caching one page image.
pub(crate) fn entry_cost(page: &NodePage) -> usize {
    page.byte_size() + mem::size_of::<PageId>()
}

/// One recency-ordered cache region. The queue front is the eviction victim;
/// a `touch` moves a page to the back. FIFO behavior falls out of never
/// touching on access.
pub(crate) struct LruRegion {
    capacity: usize,
    current: usize,
    pages: HashMap<PageId, NodePage>,
    order: VecDeque<PageId>,
}

impl LruRegion {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            current: 0,
            pages: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
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

    pub fn get_clone(&self, page: PageId) -> Option<NodePage> {
        self.pages.get(&page).cloned()
    }

    /// Moves a resident page to the most-recent end.
    pub fn touch(&mut self, page: PageId) {
        if self.pages.contains_key(&page) {
            self.order.retain(|p| *p != page);
            self.order.push_back(page);
        }
    }

    /// Inserts at the most-recent end. The caller has made room.
    pub fn insert(&mut self, page: PageId, image: NodePage) {
        self.current += entry_cost(&image);
        self.pages.insert(page, image);
        self.order.push_back(page);
    }

    pub fn remove(&mut self, page: PageId) -> bool {
        match self.pages.remove(&page) {
            Some(image) => {
                self.current -= entry_cost(&image);
                self.order.retain(|p| *p != page);
                true
            }
            None => false,
        }
    }

    /// Evicts from the least-recent end until `required` more bytes fit.
    /// Returns the evicted page ids (the 2Q recent region ghosts them).
    pub fn evict_until_fits(&mut self, required: usize) -> Vec<PageId> {
        let mut evicted = Vec::new();
        while self.current + required > self.capacity {
            let Some(victim) = self.order.front().copied() else { break };
            self.remove(victim);
            evicted.push(victim);
        }
        evicted
    }

    /// Evicts pages other than `keep` until `extra` more bytes fit, in
    /// recency order. Used by flush-time refreshes, which must not drop the
    /// page being refreshed.
    pub fn evict_others_until_fits(&mut self, keep: PageId, extra: usize) {
        while self.current + extra > self.capacity {
            let Some(victim) = self.order.iter().find(|p| **p != keep).copied() else {
                break;
            };
            self.remove(victim);
        }
    }

    /// Refreshes a resident page's content. When the new image fits in place
    /// the content is swapped (optionally touching recency); otherwise the
    /// old image is dropped, room is made, and the new image is inserted at
    /// the most-recent end. Returns false when the page is not resident.
    pub fn refresh(&mut self, page: PageId, image: &NodePage, reorder: bool) -> bool {
        let Some(existing) = self.pages.get(&page) else {
            return false;
        };
        let old_cost = entry_cost(existing);
        let new_cost = entry_cost(image);

        if self.current - old_cost + new_cost <= self.capacity {
            if reorder {
                self.touch(page);
            }
            if let Some(existing) = self.pages.get_mut(&page) {
                existing.copy_from(image);
            }
            self.current = self.current - old_cost + new_cost;
        } else {
            self.remove(page);
            self.evict_until_fits(new_cost);
            self.insert(page, image.clone());
        }
        true
    }

    /// Refreshes a resident page without changing its recency position,
    /// evicting other pages when the image grew. Returns false when the page
    /// is not resident.
    pub fn update_in_place(&mut self, page: PageId, image: &NodePage) -> bool {
        let Some(existing) = self.pages.get(&page) else {
            return false;
        };
        let old_cost = entry_cost(existing);
        let new_cost = entry_cost(image);
        if new_cost > old_cost {
            self.evict_others_until_fits(page, new_cost - old_cost);
        }
        if let Some(existing) = self.pages.get_mut(&page) {
            existing.copy_from(image);
        }
        self.current = self.current - old_cost + new_cost;
        true
    }
}

/// The plain LRU read buffer.
pub struct LruBuffer {
    region: LruRegion,
}

impl LruBuffer {
    pub fn new(capacity: usize) -> Self {
        Self { region: LruRegion::new(capacity) }
    }

    pub fn len(&self) -> usize {
        self.region.len()
    }

    pub fn bytes(&self) -> usize {
        self.region.bytes()
    }

    pub fn contains(&self, page: PageId) -> bool {
        self.region.contains(page)
    }

    /// Returns a clone of a resident image and promotes it.
    pub fn lookup(&mut self, page: PageId) -> Option<NodePage> {
        let image = self.region.get_clone(page)?;
        self.region.touch(page);
        Some(image)
    }

    /// Installs or refreshes a page image. A resident page is only updated
    /// when `force` is set (a temporal-control-driven install); a best-effort
    /// re-put of resident content is a no-op. Oversized pages are refused.
    pub fn put(&mut self, page: PageId, image: &NodePage, force: bool, metrics: &mut Metrics) {
        let required = entry_cost(image);
        if required > self.region.capacity() {
            metrics.read_buffer_refused += 1;
            return;
        }
        if self.region.contains(page) {
            if force {
                self.region.refresh(page, image, true);
            }
        } else {
            self.region.evict_until_fits(required);
            self.region.insert(page, image.clone());
        }
    }

    /// Flush-time refresh of a resident stale copy; absent pages stay absent.
    pub fn update_if_needed(&mut self, page: PageId, flushed: &NodePage) {
        self.region.update_in_place(page, flushed);
    }

    pub fn invalidate(&mut self, page: PageId) {
        self.region.remove(page);
    }
}
