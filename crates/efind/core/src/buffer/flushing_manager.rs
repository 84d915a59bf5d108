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

// Flushing manager
// Selects one flushing unit of buffered pages, rebuilds their current
// images, writes them in batched sequential runs, reconciles the read
// buffer, logs the flush and releases the write-buffer entries. Candidate
// selection biases toward old, heavily modified, high, small-area pages
// depending on the configured policy, and defers to the write temporal
// control for device-friendly orderings.

use std::mem;

use tracing::debug;

use crate::buffer::lib::{EfindResult, FlushingPolicy, NodeStatus};
use crate::buffer::log_manager::LogRecord;
use crate::buffer::write_buffer::WriteEntry;
use crate::index::adapter::TreeAdapter;
use crate::index::EfindIndex;
use crate::io::direct_io::{AlignedBlock, IoAccess};
use crate::io::storage::PageStore;
use crate::page::node::{Height, PageId};

/// One flushing candidate with the metrics its scoring needs. Area terms
/// are normalized against the cross-buffer maxima and clamped to [0, 1].
#[derive(Debug, Clone, Copy)]
pub struct ChosenPage {
    pub page: PageId,
    pub height: Height,
    pub nofmod: u32,
    pub area: f64,
    pub ov_area: f64,
}

/// Area of the modified region of a buffered page: the union of its
/// modifications' bounding boxes. Deleted pages score a full weight; pages
/// whose modifications carry no boxes contribute nothing.
fn modified_area(entry: &WriteEntry) -> f64 {
    if entry.status == NodeStatus::Deleted {
        1.0
    } else {
        entry.mods.union_bbox().map(|b| b.area()).unwrap_or(0.0)
    }
}

/// Self-overlap of the modified region, with the same deleted-page rule.
fn modified_overlap_area(entry: &WriteEntry) -> f64 {
    if entry.status == NodeStatus::Deleted { 1.0 } else { entry.mods.overlap_area() }
}

/// Score `v` of one flushing unit.
fn unit_score(policy: FlushingPolicy, unit: &[ChosenPage]) -> f64 {
    unit.iter()
        .map(|c| {
            let nofmod = c.nofmod as f64;
            let height_weight = (c.height + 1) as f64;
            match policy {
                FlushingPolicy::M | FlushingPolicy::MT => nofmod,
                FlushingPolicy::MTH => nofmod * height_weight,
                FlushingPolicy::MTHA => nofmod * height_weight * c.area,
                FlushingPolicy::MTHAO => nofmod * height_weight * c.area * c.ov_area,
            }
        })
        .sum()
}

impl<A: TreeAdapter, S: PageStore> EfindIndex<A, S> {
    /// Flushes exactly one flushing unit (or less, on a nearly empty
    /// buffer). A no-op on an empty buffer.
    pub fn flush(&mut self) -> EfindResult<()> {
        if self.write_buffer.is_empty() {
            return Ok(());
        }
        self.metrics.flushes += 1;
        let unit = self.choose_unit();
        debug!(pages = unit.len(), first = %unit[0].0, "flushing unit chosen");
        self.write_unit(&unit)
    }

    /// Drains the whole write buffer in ascending page-id order, writing
    /// maximal contiguous runs. The only flushing operation permitted during
    /// shutdown and checkpointing; idempotent on an empty buffer.
    pub fn flush_all(&mut self) -> EfindResult<()> {
        if self.write_buffer.is_empty() {
            return Ok(());
        }
        self.metrics.flushes += 1;
        let all: Vec<(PageId, Height)> =
            self.write_buffer.iter().map(|(page, e)| (*page, e.height)).collect();
        self.write_unit(&all)
    }

    /// Steps 1–5 of a flush: candidate slice, per-candidate metrics,
    /// write-control filter, ascending-id grouping, highest-score pick.
    fn choose_unit(&mut self) -> Vec<(PageId, Height)> {
        let policy = self.config.flushing_policy;
        let unit_size = self.config.flushing_unit_size.max(1) as usize;
        let total = self.write_buffer.len();
        // a degenerate timestamp percentage degrades to plain M
        let use_timestamp = policy.uses_timestamp() && self.config.timestamp_perc > 0.0;

        // cross-buffer maxima for the normalization of the area terms
        let mut max_area = 1.0f64;
        let mut max_overlap = 1.0f64;
        if policy.uses_area() {
            for (_, entry) in self.write_buffer.iter() {
                max_area = max_area.max(modified_area(entry));
                if policy.uses_overlap() {
                    max_overlap = max_overlap.max(modified_overlap_area(entry));
                }
            }
        }

        let mut ordered: Vec<(PageId, &WriteEntry)> =
            self.write_buffer.iter().map(|(page, e)| (*page, e)).collect();
        let count = if use_timestamp {
            ordered.sort_by_key(|(_, e)| e.last_modified_ms);
            let slice = ((total as f64) * self.config.timestamp_perc / 100.0).ceil() as usize;
            slice.max(unit_size).min(total)
        } else {
            total
        };

        let candidates: Vec<ChosenPage> = ordered
            .into_iter()
            .take(count)
            .map(|(page, entry)| ChosenPage {
                page,
                height: entry.height,
                nofmod: entry.modify_count,
                area: if policy.uses_area() {
                    (modified_area(entry) / max_area).min(1.0)
                } else {
                    0.0
                },
                ov_area: if policy.uses_overlap() {
                    (modified_overlap_area(entry) / max_overlap).min(1.0)
                } else {
                    0.0
                },
            })
            .collect();

        let mut filtered = self.temporal.filter_candidates(&candidates, &mut self.metrics);
        filtered.sort_by_key(|c| c.page);

        let mut best_start = 0;
        let mut best_score = 0.0f64;
        for (i, group) in filtered.chunks(unit_size).enumerate() {
            let score = unit_score(policy, group);
            if score > best_score {
                best_score = score;
                best_start = i;
            }
        }
        filtered
            .chunks(unit_size)
            .nth(best_start)
            .map(|group| group.iter().map(|c| (c.page, c.height)).collect())
            .unwrap_or_default()
    }

    /// Steps 6–8: materialize the images, reconcile the read buffer, write
    /// the batch in contiguous runs, log the flush and release the entries.
    /// A storage failure surfaces before any entry is released or logged.
    fn write_unit(&mut self, unit: &[(PageId, Height)]) -> EfindResult<()> {
        let page_size = self.store.page_size();
        let alignment = match self.store.io_access() {
            IoAccess::Direct => page_size,
            IoAccess::Normal => mem::align_of::<u64>(),
        };
        let mut batch = AlignedBlock::zeroed(unit.len() * page_size, alignment)?;

        for (i, (page, height)) in unit.iter().enumerate() {
            match self.retrieve_node(*page, *height)? {
                Some(image) => {
                    if self.temporal.contains_read(*page) {
                        // a frequently read page goes straight back into the
                        // read buffer with its just-flushed image
                        let buffered_total = self.write_buffer.len() + self.read_buffer.len();
                        self.read_buffer.put(
                            *page,
                            &image,
                            *height,
                            true,
                            &mut self.temporal,
                            buffered_total,
                            &mut self.metrics,
                        );
                        self.metrics.forced_read_installs += 1;
                    } else {
                        self.read_buffer.update_if_needed(*page, *height, &image);
                    }
                    self.adapter
                        .serialize_page(&image, &mut batch[i * page_size..(i + 1) * page_size])?;
                }
                None => {
                    // deleted page: a zeroed image goes out and any stale
                    // cached copy is dropped
                    self.read_buffer.invalidate(*page);
                }
            }
            self.temporal.add_write(*page);
        }

        let mut start = 0;
        while start < unit.len() {
            let mut end = start + 1;
            while end < unit.len() && unit[end].0.0 == unit[end - 1].0.0 + 1 {
                end += 1;
            }
            self.store
                .write_pages(unit[start].0, &batch[start * page_size..end * page_size], end - start)?;
            start = end;
        }

        let pages: Vec<PageId> = unit.iter().map(|(page, _)| *page).collect();
        self.log.append(&LogRecord::Flush { pages }, &mut self.metrics)?;

        for (page, _) in unit {
            if !self.write_buffer.remove(*page) {
                self.metrics.unnecessary_flushed += 1;
            }
        }
        self.metrics.flushed_pages += unit.len() as u64;
        Ok(())
    }
}
