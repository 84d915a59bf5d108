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

// Temporal control
// Two bounded FIFO lists that bias the core toward flash-friendly access
// patterns: the read ghost list pins frequently read pages back into the
// read buffer after a flush (and doubles as the ghost region of the 2Q
// policies), and the write recency list steers flushing-unit selection
// toward sequential and stride writes.

use std::collections::{HashSet, VecDeque};

use crate::buffer::flushing_manager::ChosenPage;
use crate::buffer::lib::{EfindConfig, TemporalControlPolicy};
use crate::page::node::PageId;
use crate::statistics::collector::Metrics;

/// Lower bound of the read ghost list, regardless of buffer occupancy.
pub const MIN_READ_TEMPORAL_CONTROL: usize = 10;

pub struct TemporalControl {
    policy: TemporalControlPolicy,
    read_perc: f64,

    read_list: VecDeque<PageId>,
    read_members: HashSet<PageId>,

    write_list: VecDeque<PageId>,
    write_capacity: usize,

    minimum_distance: i32,
    stride: i32,
    flushing_unit_size: usize,
}

impl TemporalControl {
    pub fn new(config: &EfindConfig) -> Self {
        let unit = config.flushing_unit_size.max(1) as usize;
        Self {
            policy: config.temporal_control_policy,
            read_perc: config.read_temporal_control_perc,
            read_list: VecDeque::new(),
            read_members: HashSet::new(),
            write_list: VecDeque::new(),
            write_capacity: unit * config.write_temporal_control_size.max(0) as usize,
            minimum_distance: config.write_tc_minimum_distance,
            stride: config.write_tc_stride,
            flushing_unit_size: unit,
        }
    }

    pub fn policy(&self) -> TemporalControlPolicy {
        self.policy
    }

    pub fn read_len(&self) -> usize {
        self.read_list.len()
    }

    pub fn write_len(&self) -> usize {
        self.write_list.len()
    }

    /// Current bound of the ghost list, derived from the total number of
    /// elements held by the two page caches.
    fn read_bound(&self, buffered_total: usize) -> usize {
        let dynamic = (buffered_total as f64 * self.read_perc / 100.0).ceil() as usize;
        dynamic.max(MIN_READ_TEMPORAL_CONTROL)
    }

    /// Records a page read in the ghost list (FIFO, duplicate-free).
    /// `buffered_total` is the combined element count of the write and read
    /// buffers at call time; the list bound is recomputed from it on every
    /// add.
    pub fn add_read(&mut self, page: PageId, buffered_total: usize) {
        if !self.policy.reads_enabled() || self.read_members.contains(&page) {
            return;
        }
        let bound = self.read_bound(buffered_total);
        while self.read_list.len() >= bound {
            if let Some(evicted) = self.read_list.pop_front() {
                self.read_members.remove(&evicted);
            } else {
                break;
            }
        }
        self.read_list.push_back(page);
        self.read_members.insert(page);
    }

    pub fn contains_read(&self, page: PageId) -> bool {
        self.policy.reads_enabled() && self.read_members.contains(&page)
    }

    /// Unlinks a page from the ghost list without FIFO eviction. Used by the
    /// 2Q policies when a ghosted page is promoted into the frequent region.
    pub fn remove_read(&mut self, page: PageId) {
        if self.read_members.remove(&page) {
            self.read_list.retain(|p| *p != page);
        }
    }

    /// Records a flushed page in the write recency list (FIFO, bounded).
    pub fn add_write(&mut self, page: PageId) {
        if !self.policy.writes_enabled() || self.write_capacity == 0 {
            return;
        }
        self.write_list.push_back(page);
        while self.write_list.len() > self.write_capacity {
            self.write_list.pop_front();
        }
    }

    /// Filters the raw flushing candidates against the recent writes.
    ///
    /// Each candidate is classified against every recent write with a
    /// different id: sequential when some write lies within
    /// `minimum_distance`, stride when (not sequential and) some write lies
    /// at least `stride` away. The sequential set wins when it is the larger
    /// one and fills a flushing unit; otherwise the stride set, then their
    /// union; when none fills a unit the raw list passes through unchanged.
    pub fn filter_candidates(&self, raw: &[ChosenPage], metrics: &mut Metrics) -> Vec<ChosenPage> {
        if !self.policy.writes_enabled() || self.write_list.is_empty() {
            return raw.to_vec();
        }

        let mut seq: Vec<ChosenPage> = Vec::new();
        let mut stride: Vec<ChosenPage> = Vec::new();
        for candidate in raw {
            let mut is_seq = false;
            let mut is_stride = false;
            for written in &self.write_list {
                if written.0 == candidate.page.0 {
                    continue;
                }
                let distance = (written.0 - candidate.page.0).abs();
                if distance <= self.minimum_distance {
                    is_seq = true;
                } else if distance >= self.stride {
                    is_stride = true;
                }
            }
            if is_seq {
                seq.push(*candidate);
            } else if is_stride {
                stride.push(*candidate);
            }
        }

        if seq.len() > stride.len() && seq.len() >= self.flushing_unit_size {
            metrics.tc_sequential += 1;
            seq
        } else if stride.len() >= self.flushing_unit_size {
            metrics.tc_stride += 1;
            stride
        } else if seq.len() + stride.len() >= self.flushing_unit_size {
            metrics.tc_mixed += 1;
            seq.extend(stride);
            seq
        } else {
            metrics.tc_filled += 1;
            raw.to_vec()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::lib::EfindConfig;

    fn config(policy: TemporalControlPolicy) -> EfindConfig {
        EfindConfig {
            temporal_control_policy: policy,
            read_temporal_control_perc: 10.0,
            write_temporal_control_size: 2,
            write_tc_minimum_distance: 2,
            write_tc_stride: 100,
            flushing_unit_size: 2,
            ..Default::default()
        }
    }

    fn candidate(id: i32) -> ChosenPage {
        ChosenPage { page: PageId(id), height: 0, nofmod: 1, area: 0.0, ov_area: 0.0 }
    }

    #[test]
    fn test_read_list_is_fifo_and_duplicate_free() {
        let mut tc = TemporalControl::new(&config(TemporalControlPolicy::Read));
        for i in 0..5 {
            tc.add_read(PageId(i), 0);
        }
        tc.add_read(PageId(0), 0); // duplicate, ignored
        assert_eq!(tc.read_len(), 5);
        assert!(tc.contains_read(PageId(0)));

        tc.remove_read(PageId(2));
        assert!(!tc.contains_read(PageId(2)));
        assert_eq!(tc.read_len(), 4);
    }

    #[test]
    fn test_read_list_bound_evicts_oldest() {
        let mut tc = TemporalControl::new(&config(TemporalControlPolicy::Read));
        // buffered_total small enough that the minimum bound applies
        for i in 0..(MIN_READ_TEMPORAL_CONTROL as i32 + 3) {
            tc.add_read(PageId(i), 0);
        }
        assert_eq!(tc.read_len(), MIN_READ_TEMPORAL_CONTROL);
        assert!(!tc.contains_read(PageId(0)));
        assert!(tc.contains_read(PageId(MIN_READ_TEMPORAL_CONTROL as i32 + 2)));
    }

    #[test]
    fn test_read_list_disabled_policies() {
        let mut tc = TemporalControl::new(&config(TemporalControlPolicy::Write));
        tc.add_read(PageId(1), 0);
        assert_eq!(tc.read_len(), 0);
        assert!(!tc.contains_read(PageId(1)));
    }

    #[test]
    fn test_write_list_bound() {
        let mut tc = TemporalControl::new(&config(TemporalControlPolicy::Write));
        // capacity = flushing_unit_size (2) * write_temporal_control_size (2)
        for i in 0..10 {
            tc.add_write(PageId(i));
        }
        assert_eq!(tc.write_len(), 4);
    }

    #[test]
    fn test_filter_passthrough_without_history() {
        let tc = TemporalControl::new(&config(TemporalControlPolicy::Write));
        let raw = [candidate(1), candidate(2)];
        let mut metrics = Metrics::new();
        let out = tc.filter_candidates(&raw, &mut metrics);
        assert_eq!(out.len(), 2);
        assert_eq!(metrics.tc_filled, 0);
    }

    #[test]
    fn test_filter_prefers_sequential_set() {
        let mut tc = TemporalControl::new(&config(TemporalControlPolicy::Write));
        tc.add_write(PageId(10));

        let raw = [candidate(9), candidate(11), candidate(500)];
        let mut metrics = Metrics::new();
        let out = tc.filter_candidates(&raw, &mut metrics);
        let ids: Vec<i32> = out.iter().map(|c| c.page.0).collect();
        assert_eq!(ids, vec![9, 11]);
        assert_eq!(metrics.tc_sequential, 1);
    }

    #[test]
    fn test_filter_falls_back_to_stride_set() {
        let mut tc = TemporalControl::new(&config(TemporalControlPolicy::Write));
        tc.add_write(PageId(10));

        let raw = [candidate(9), candidate(200), candidate(300)];
        let mut metrics = Metrics::new();
        let out = tc.filter_candidates(&raw, &mut metrics);
        let ids: Vec<i32> = out.iter().map(|c| c.page.0).collect();
        assert_eq!(ids, vec![200, 300]);
        assert_eq!(metrics.tc_stride, 1);
    }

    #[test]
    fn test_filter_union_and_raw_fallback() {
        let mut tc = TemporalControl::new(&config(TemporalControlPolicy::Write));
        tc.add_write(PageId(10));

        // one sequential + one stride page: the union fills a unit
        let raw = [candidate(9), candidate(200), candidate(40)];
        let mut metrics = Metrics::new();
        let out = tc.filter_candidates(&raw, &mut metrics);
        let ids: Vec<i32> = out.iter().map(|c| c.page.0).collect();
        assert_eq!(ids, vec![9, 200]);
        assert_eq!(metrics.tc_mixed, 1);

        // neither class fills a unit: the raw list passes through
        let raw = [candidate(9), candidate(40)];
        let out = tc.filter_candidates(&raw, &mut metrics);
        assert_eq!(out.len(), 2);
        assert_eq!(metrics.tc_filled, 1);
    }
}
