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

// Simplified 2Q read buffer
// A single LRU region (Am) guarded by a ghost list: a page is only admitted
// once its id has been seen before. The ghost role is played by the read
// temporal-control list, so this policy requires the read temporal control
// to be enabled.

use crate::buffer::lru::{LruRegion, entry_cost};
use crate::buffer::temporal_control::TemporalControl;
use crate::page::node::{NodePage, PageId};
use crate::statistics::collector::Metrics;

pub struct S2qBuffer {
    am: LruRegion,
}

impl S2qBuffer {
    pub fn new(capacity: usize) -> Self {
        Self { am: LruRegion::new(capacity) }
    }

    pub fn len(&self) -> usize {
        self.am.len()
    }

    pub fn bytes(&self) -> usize {
        self.am.bytes()
    }

    pub fn contains(&self, page: PageId) -> bool {
        self.am.contains(page)
    }

    pub fn lookup(&mut self, page: PageId) -> Option<NodePage> {
        let image = self.am.get_clone(page)?;
        self.am.touch(page);
        Some(image)
    }

    /// Admission control: a missing page is admitted only when its id sits
    /// in the ghost list (and leaves it on promotion); otherwise the id is
    /// ghosted for the next miss. `buffered_total` feeds the dynamic ghost
    /// bound.
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
        if required > self.am.capacity() {
            metrics.read_buffer_refused += 1;
            return;
        }

        if self.am.contains(page) {
            if force {
                self.am.refresh(page, image, true);
            }
            return;
        }

        if tc.contains_read(page) {
            self.am.evict_until_fits(required);
            tc.remove_read(page);
            self.am.insert(page, image.clone());
        } else {
            tc.add_read(page, buffered_total);
        }
    }

    pub fn update_if_needed(&mut self, page: PageId, flushed: &NodePage) {
        self.am.update_in_place(page, flushed);
    }

    pub fn invalidate(&mut self, page: PageId) {
        self.am.remove(page);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::lib::{EfindConfig, TemporalControlPolicy};
    use crate::page::entry::NodeEntry;

    fn tc() -> TemporalControl {
        TemporalControl::new(&EfindConfig {
            temporal_control_policy: TemporalControlPolicy::Read,
            ..Default::default()
        })
    }

    fn page_with(n: usize) -> NodePage {
        let mut p = NodePage::empty();
        for i in 0..n {
            p.push(NodeEntry::spatial(i as i32, None));
        }
        p
    }

    #[test]
    fn test_first_miss_ghosts_second_admits() {
        let mut buf = S2qBuffer::new(4 * entry_cost(&page_with(1)));
        let mut tc = tc();
        let mut metrics = Metrics::new();
        let image = page_with(1);

        buf.put(PageId(5), &image, false, &mut tc, 0, &mut metrics);
        assert!(!buf.contains(PageId(5)));
        assert!(tc.contains_read(PageId(5)));

        buf.put(PageId(5), &image, false, &mut tc, 0, &mut metrics);
        assert!(buf.contains(PageId(5)));
        // promotion removes the ghost
        assert!(!tc.contains_read(PageId(5)));
    }

    #[test]
    fn test_admitted_pages_evict_lru() {
        let cost = entry_cost(&page_with(1));
        let mut buf = S2qBuffer::new(2 * cost);
        let mut tc = tc();
        let mut metrics = Metrics::new();
        let image = page_with(1);

        for id in [1, 2, 3] {
            buf.put(PageId(id), &image, false, &mut tc, 0, &mut metrics);
            buf.put(PageId(id), &image, false, &mut tc, 0, &mut metrics);
        }
        assert!(!buf.contains(PageId(1)));
        assert!(buf.contains(PageId(2)));
        assert!(buf.contains(PageId(3)));
    }

    #[test]
    fn test_forced_put_refreshes_resident_content() {
        let mut buf = S2qBuffer::new(8 * entry_cost(&page_with(4)));
        let mut tc = tc();
        let mut metrics = Metrics::new();

        buf.put(PageId(1), &page_with(1), false, &mut tc, 0, &mut metrics);
        buf.put(PageId(1), &page_with(1), false, &mut tc, 0, &mut metrics);
        assert_eq!(buf.lookup(PageId(1)).unwrap().len(), 1);

        buf.put(PageId(1), &page_with(3), true, &mut tc, 0, &mut metrics);
        assert_eq!(buf.lookup(PageId(1)).unwrap().len(), 3);
    }
}
