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

// Index module
// The eFIND index handle: it owns the write buffer, the read buffer, the
// temporal control, the durability log and the metrics, and exposes the
// node operations the enclosing tree calls. Every mutation updates the
// in-memory state first and then appends to the log; every overflow runs
// exactly one synchronous flushing pass.

pub mod adapter;

pub use adapter::{IndexKind, TreeAdapter};

use tracing::debug;

use crate::buffer::lib::{EfindConfig, EfindError, EfindResult, NodeStatus};
use crate::buffer::log_manager::{DurabilityLog, LogRecord};
use crate::buffer::read_buffer::ReadBuffer;
use crate::buffer::temporal_control::TemporalControl;
use crate::buffer::write_buffer::WriteBuffer;
use crate::io::storage::PageStore;
use crate::page::entry::NodeEntry;
use crate::page::node::{Height, NodePage, PageId};
use crate::statistics::collector::Metrics;

pub struct EfindIndex<A: TreeAdapter, S: PageStore> {
    pub(crate) adapter: A,
    pub(crate) store: S,
    pub(crate) config: EfindConfig,
    pub(crate) write_buffer: WriteBuffer,
    pub(crate) read_buffer: ReadBuffer,
    pub(crate) temporal: TemporalControl,
    pub(crate) log: DurabilityLog,
    pub(crate) metrics: Metrics,
}

impl<A: TreeAdapter, S: PageStore> EfindIndex<A, S> {
    /// Creates a fresh index state with an empty durability log, persisting
    /// the configuration as a side-car header next to it.
    pub fn create(adapter: A, store: S, config: EfindConfig) -> EfindResult<Self> {
        config.validate()?;
        config.save_to(config.log_file.with_extension("header"))?;
        let log = DurabilityLog::create(&config.log_file, config.log_size)?;
        Ok(Self::assemble(adapter, store, config, log))
    }

    /// Reopens an index after a shutdown or crash: the write buffer is
    /// rebuilt by replaying the non-obsolete log records in order. Replay
    /// applies the recorded state transitions verbatim; it neither re-logs
    /// nor enforces the capacity budget mid-replay.
    pub fn recover(adapter: A, store: S, config: EfindConfig) -> EfindResult<Self> {
        config.validate()?;
        let log = DurabilityLog::open(&config.log_file, config.log_size)?;
        let mut index = Self::assemble(adapter, store, config, log);
        let wb = &mut index.write_buffer;
        index.log.replay(|record| {
            match record {
                LogRecord::Create { page, height } => wb.apply_create(page, height)?,
                LogRecord::Mod { page, height, entry } => wb.apply_modify(page, entry, height)?,
                LogRecord::Del { page, height } => wb.apply_delete(page, height)?,
                LogRecord::Flush { pages } => {
                    for page in pages {
                        wb.remove(page);
                    }
                }
            }
            Ok(())
        })?;
        debug!(buffered = index.write_buffer.len(), "write buffer recovered from log");
        Ok(index)
    }

    fn assemble(adapter: A, store: S, config: EfindConfig, log: DurabilityLog) -> Self {
        let page_size = store.page_size();
        Self {
            write_buffer: WriteBuffer::new(config.write_buffer_size),
            read_buffer: ReadBuffer::new(&config, page_size),
            temporal: TemporalControl::new(&config),
            metrics: Metrics::new(),
            adapter,
            store,
            config,
            log,
        }
    }

    pub fn config(&self) -> &EfindConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn write_buffer_len(&self) -> usize {
        self.write_buffer.len()
    }

    pub fn write_buffer_bytes(&self) -> usize {
        self.write_buffer.current_bytes()
    }

    pub fn read_buffer_len(&self) -> usize {
        self.read_buffer.len()
    }

    pub fn buffered_page_status(&self, page: PageId) -> Option<NodeStatus> {
        self.write_buffer.status(page)
    }

    pub fn read_buffer_contains(&self, page: PageId) -> bool {
        self.read_buffer.contains(page)
    }

    /// Propagates tree growth/shrink to the height-aware read buffer.
    pub fn set_tree_height(&mut self, height: Height) {
        self.read_buffer.set_tree_height(height);
    }

    /// Registers a newly created node.
    pub fn create_node(&mut self, page: PageId, height: Height) -> EfindResult<()> {
        if let Some(status) = self.write_buffer.status(page) {
            if status != NodeStatus::Deleted {
                return Err(EfindError::InvalidOperation(format!(
                    "node {page} already exists in the write buffer"
                )));
            }
        }
        self.make_room(|wb| wb.required_for_create(page))?;
        self.write_buffer.apply_create(page, height)?;
        self.log.append(&LogRecord::Create { page, height }, &mut self.metrics)?;
        self.metrics.new_nodes_buffered += 1;
        Ok(())
    }

    /// Registers one entry modification of a node.
    pub fn modify_node(&mut self, page: PageId, entry: NodeEntry, height: Height) -> EfindResult<()> {
        if self.write_buffer.status(page) == Some(NodeStatus::Deleted) {
            return Err(EfindError::InvalidOperation(format!(
                "node {page} was deleted; modifying it requires recreating it first"
            )));
        }
        self.make_room(|wb| wb.required_for_modify(page, &entry))?;
        self.write_buffer.apply_modify(page, entry, height)?;
        self.log.append(&LogRecord::Mod { page, height, entry }, &mut self.metrics)?;
        self.metrics.mod_nodes_buffered += 1;
        Ok(())
    }

    /// Registers a node deletion.
    pub fn delete_node(&mut self, page: PageId, height: Height) -> EfindResult<()> {
        self.make_room(|wb| wb.required_for_delete(page))?;
        self.write_buffer.apply_delete(page, height)?;
        self.log.append(&LogRecord::Del { page, height }, &mut self.metrics)?;
        self.metrics.del_nodes_buffered += 1;
        Ok(())
    }

    /// Returns the current logical image of a node: the last flushed image
    /// with any buffered modifications merged in. `None` iff the node is
    /// buffered as deleted.
    pub fn retrieve_node(&mut self, page: PageId, height: Height) -> EfindResult<Option<NodePage>> {
        let merged = match self.write_buffer.status(page) {
            None => Some(self.read_page(page, height)?),
            Some(NodeStatus::Deleted) => None,
            Some(NodeStatus::New) => self.write_buffer.merged_page(page, None),
            Some(NodeStatus::Modified) => {
                let base = self.read_page(page, height)?;
                self.write_buffer.merged_page(page, Some(base))
            }
        };
        Ok(merged.map(|mut image| {
            if self.adapter.requires_sort() {
                let adapter = &self.adapter;
                image.sort_entries(|a, b| adapter.compare_entries(a, b));
            }
            image
        }))
    }

    /// Ensures `probe` bytes fit in the write buffer, running at most one
    /// flushing pass. A mutation that cannot fit even in an empty buffer is
    /// a usage error; a budget still violated after the flush aborts the
    /// operation.
    fn make_room<F>(&mut self, probe: F) -> EfindResult<()>
    where
        F: Fn(&WriteBuffer) -> usize,
    {
        let required = probe(&self.write_buffer);
        if required == 0 || self.write_buffer.fits(required) {
            return Ok(());
        }
        if required > self.write_buffer.capacity_bytes() {
            return Err(EfindError::InvalidOperation(format!(
                "a single mutation of {required} bytes exceeds the write buffer capacity"
            )));
        }
        self.flush()?;
        // the flush may have evicted the page, changing what is required
        let required = probe(&self.write_buffer);
        if !self.write_buffer.fits(required) {
            return Err(EfindError::BufferOverflow);
        }
        Ok(())
    }

    /// Reads a page image through the read buffer; a miss falls through to
    /// the storage interface and installs the result best-effort.
    pub(crate) fn read_page(&mut self, page: PageId, height: Height) -> EfindResult<NodePage> {
        if self.read_buffer.is_disabled() {
            return self.adapter.read_node(&mut self.store, page, height);
        }
        if let Some(image) = self.read_buffer.lookup(page, &mut self.metrics) {
            return Ok(image);
        }
        let image = self.adapter.read_node(&mut self.store, page, height)?;
        let buffered_total = self.write_buffer.len() + self.read_buffer.len();
        if !self.read_buffer.ghost_fed_by_put() {
            self.temporal.add_read(page, buffered_total);
        }
        self.read_buffer.put(
            page,
            &image,
            height,
            false,
            &mut self.temporal,
            buffered_total,
            &mut self.metrics,
        );
        Ok(image)
    }

    /// Tears the index down without flushing (a checkpoint is an explicit
    /// `flush_all`), returning the final metrics snapshot.
    pub fn destroy(self) -> Metrics {
        self.metrics
    }
}
