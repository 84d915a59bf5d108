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

// Read buffer dispatcher
// One variable-size page cache with a replacement policy chosen at index
// creation. Lookups return clones of the cached images; installs come in
// two flavors, best-effort (a storage miss) and forced (the read temporal
// control pinning a just-flushed page).

use crate::buffer::hlru::HlruBuffer;
use crate::buffer::lib::{EfindConfig, ReadBufferPolicy};
use crate::buffer::lru::LruBuffer;
use crate::buffer::s2q::S2qBuffer;
use crate::buffer::temporal_control::TemporalControl;
use crate::buffer::two_q::TwoQueueBuffer;
use crate::page::node::{Height, NodePage, PageId};
use crate::statistics::collector::Metrics;

pub enum ReadBuffer {
    /// No caching; every read goes to storage.
    Disabled,
    Lru(LruBuffer),
    Hlru(HlruBuffer),
    S2q(S2qBuffer),
    Full2q(TwoQueueBuffer),
}

impl ReadBuffer {
    pub fn new(config: &EfindConfig, page_size: usize) -> Self {
        if config.read_buffer_size == 0 {
            return ReadBuffer::Disabled;
        }
        match config.read_buffer_policy {
            ReadBufferPolicy::None => ReadBuffer::Disabled,
            ReadBufferPolicy::Lru => ReadBuffer::Lru(LruBuffer::new(config.read_buffer_size)),
            ReadBufferPolicy::Hlru => ReadBuffer::Hlru(HlruBuffer::new(config.read_buffer_size)),
            ReadBufferPolicy::S2q => ReadBuffer::S2q(S2qBuffer::new(config.read_buffer_size)),
            ReadBufferPolicy::Full2q => ReadBuffer::Full2q(TwoQueueBuffer::new(
                config.read_buffer_size,
                config.a1in_perc_size,
                page_size,
            )),
        }
    }

    pub fn is_disabled(&self) -> bool {
        matches!(self, ReadBuffer::Disabled)
    }

    /// Whether the ghost list is fed by `put` (the 2Q family) rather than by
    /// the storage-miss path.
    pub fn ghost_fed_by_put(&self) -> bool {
        matches!(self, ReadBuffer::S2q(_) | ReadBuffer::Full2q(_))
    }

    pub fn len(&self) -> usize {
        match self {
            ReadBuffer::Disabled => 0,
            ReadBuffer::Lru(b) => b.len(),
            ReadBuffer::Hlru(b) => b.len(),
            ReadBuffer::S2q(b) => b.len(),
            ReadBuffer::Full2q(b) => b.len(),
        }
    }

    pub fn contains(&self, page: PageId) -> bool {
        match self {
            ReadBuffer::Disabled => false,
            ReadBuffer::Lru(b) => b.contains(page),
            ReadBuffer::Hlru(b) => b.contains(page),
            ReadBuffer::S2q(b) => b.contains(page),
            ReadBuffer::Full2q(b) => b.contains(page),
        }
    }

    /// Cache-only lookup; hits and misses are counted here.
    pub fn lookup(&mut self, page: PageId, metrics: &mut Metrics) -> Option<NodePage> {
        let found = match self {
            ReadBuffer::Disabled => return None,
            ReadBuffer::Lru(b) => b.lookup(page),
            ReadBuffer::Hlru(b) => b.lookup(page),
            ReadBuffer::S2q(b) => b.lookup(page),
            ReadBuffer::Full2q(b) => b.lookup(page),
        };
        if found.is_some() {
            metrics.read_buffer_hits += 1;
        } else {
            metrics.read_buffer_misses += 1;
        }
        found
    }

    pub fn put(
        &mut self,
        page: PageId,
        image: &NodePage,
        height: Height,
        force: bool,
        tc: &mut TemporalControl,
        buffered_total: usize,
        metrics: &mut Metrics,
    ) {
        match self {
            ReadBuffer::Disabled => {}
            ReadBuffer::Lru(b) => b.put(page, image, force, metrics),
            ReadBuffer::Hlru(b) => b.put(page, image, height, force, metrics),
            ReadBuffer::S2q(b) => b.put(page, image, force, tc, buffered_total, metrics),
            ReadBuffer::Full2q(b) => b.put(page, image, force, tc, buffered_total, metrics),
        }
    }

    /// Refreshes a resident stale copy after a flush, keeping its recency.
    pub fn update_if_needed(&mut self, page: PageId, height: Height, flushed: &NodePage) {
        match self {
            ReadBuffer::Disabled => {}
            ReadBuffer::Lru(b) => b.update_if_needed(page, flushed),
            ReadBuffer::Hlru(b) => b.update_if_needed(page, height, flushed),
            ReadBuffer::S2q(b) => b.update_if_needed(page, flushed),
            ReadBuffer::Full2q(b) => b.update_if_needed(page, flushed),
        }
    }

    /// Drops a resident copy (a deleted page was flushed).
    pub fn invalidate(&mut self, page: PageId) {
        match self {
            ReadBuffer::Disabled => {}
            ReadBuffer::Lru(b) => b.invalidate(page),
            ReadBuffer::Hlru(b) => b.invalidate(page),
            ReadBuffer::S2q(b) => b.invalidate(page),
            ReadBuffer::Full2q(b) => b.invalidate(page),
        }
    }

    /// Propagates tree growth/shrink to height-aware policies.
    pub fn set_tree_height(&mut self, height: Height) {
        if let ReadBuffer::Hlru(b) = self {
            b.set_tree_height(height);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::lib::TemporalControlPolicy;
    use crate::page::entry::NodeEntry;

    #[test]
    fn test_zero_capacity_disables_caching() {
        let config = EfindConfig {
            read_buffer_size: 0,
            read_buffer_policy: ReadBufferPolicy::Lru,
            ..Default::default()
        };
        let rb = ReadBuffer::new(&config, 4096);
        assert!(rb.is_disabled());
    }

    #[test]
    fn test_lookup_counts_hits_and_misses() {
        let config = EfindConfig {
            read_buffer_size: 64 * 1024,
            read_buffer_policy: ReadBufferPolicy::Lru,
            ..Default::default()
        };
        let mut rb = ReadBuffer::new(&config, 4096);
        let mut tc = TemporalControl::new(&config);
        let mut metrics = Metrics::new();

        let mut image = NodePage::empty();
        image.push(NodeEntry::spatial(1, None));

        assert!(rb.lookup(PageId(1), &mut metrics).is_none());
        rb.put(PageId(1), &image, 0, false, &mut tc, 0, &mut metrics);
        assert!(rb.lookup(PageId(1), &mut metrics).is_some());

        assert_eq!(metrics.read_buffer_misses, 1);
        assert_eq!(metrics.read_buffer_hits, 1);
    }

    #[test]
    fn test_ghost_feeding_classification() {
        let base = EfindConfig {
            read_buffer_size: 64 * 1024,
            temporal_control_policy: TemporalControlPolicy::Read,
            ..Default::default()
        };
        for (policy, by_put) in [
            (ReadBufferPolicy::Lru, false),
            (ReadBufferPolicy::Hlru, false),
            (ReadBufferPolicy::S2q, true),
            (ReadBufferPolicy::Full2q, true),
        ] {
            let config = EfindConfig { read_buffer_policy: policy, ..base.clone() };
            assert_eq!(ReadBuffer::new(&config, 4096).ghost_fed_by_put(), by_put);
        }
    }
}
