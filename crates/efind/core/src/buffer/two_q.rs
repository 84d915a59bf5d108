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

// Full 2Q read buffer
// Two regions share the byte budget: A1in, a FIFO of first-time pages, and
// Am, an LRU of proven-hot pages. Pages aging out of A1in leave only their
// id behind in the ghost list (the read temporal-control list, playing
// A1out); a miss whose id is still ghosted is admitted straight into Am.

use std::mem;

use crate::buffer::lru::{LruRegion, entry_cost};
use crate::buffer::temporal_control::TemporalControl;
use crate::page::node::{NodePage, PageId};
use crate::statistics::collector::Metrics;

pub struct TwoQueueBuffer {
    a1in: LruRegion,
    am: LruRegion,
}

impl TwoQueueBuffer {
    /// Splits `capacity` between the regions: `a1in_perc` percent go to
    /// A1in, floored at one page plus key overhead, the rest to Am.
    pub fn new(capacity: usize, a1in_perc: f64, page_size: usize) -> Self {
        let min_a1in = page_size + mem::size_of::<PageId>();
        let a1in_capacity = ((capacity as f64 * a1in_perc / 100.0) as usize).max(min_a1in);
        let am_capacity = capacity.saturating_sub(a1in_capacity);
        Self {
            a1in: LruRegion::new(a1in_capacity),
            am: LruRegion::new(am_capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.a1in.len() + self.am.len()
    }

    pub fn bytes(&self) -> usize {
        self.a1in.bytes() + self.am.bytes()
    }

    pub fn contains(&self, page: PageId) -> bool {
        self.a1in.contains(page) || self.am.contains(page)
    }

    /// A1in hits return without reordering (the region is a FIFO); Am hits
    /// are LRU-promoted.
    pub fn lookup(&mut self, page: PageId) -> Option<NodePage> {
        if let Some(image) = self.a1in.get_clone(page) {
            return Some(image);
        }
        let image = self.am.get_clone(page)?;
        self.am.touch(page);
        Some(image)
    }

    pub fn put(
        &mut self,
        page: PageId,
        image: &NodePage,
        force: bool,
        tc: &mut TemporalControl,
        buffered_total: usize,
        metrics: &mut Metrics,
    ) {
        let required = entry_cost(image);

        if self.am.contains(page) {
            if force {
                if required > self.am.capacity() {
                    metrics.read_buffer_refused += 1;
                    return;
                }
                self.am.refresh(page, image, true);
            }
            return;
        }
        if self.a1in.contains(page) {
            if force {
                if required > self.a1in.capacity() {
                    metrics.read_buffer_refused += 1;
                    return;
                }
                self.a1in.refresh(page, image, false);
            }
            return;
        }

        if tc.contains_read(page) {
            // proven hot: promote from the ghost region into Am
            if required > self.am.capacity() {
                metrics.read_buffer_refused += 1;
                return;
            }
            self.am.evict_until_fits(required);
            tc.remove_read(page);
            self.am.insert(page, image.clone());
        } else {
            // first sighting: enter the FIFO region, ghosting what falls out
            if required > self.a1in.capacity() {
                metrics.read_buffer_refused += 1;
                return;
            }
            for evicted in self.a1in.evict_until_fits(required) {
                tc.add_read(evicted, buffered_total);
            }
            self.a1in.insert(page, image.clone());
        }
    }

    pub fn update_if_needed(&mut self, page: PageId, flushed: &NodePage) {
        if !self.am.update_in_place(page, flushed) {
            self.a1in.update_in_place(page, flushed);
        }
    }

    pub fn invalidate(&mut self, page: PageId) {
        if !self.am.remove(page) {
            self.a1in.remove(page);
        }
    }
}
