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

/// Counters collected while an index runs. All entry points of the core are
/// synchronous and single-threaded, so plain integers suffice.
#[derive(Debug, Clone, Default)]
pub struct Metrics {
    /// Nodes registered as newly created in the write buffer.
    pub new_nodes_buffered: u64,
    /// Entry modifications registered in the write buffer.
    pub mod_nodes_buffered: u64,
    /// Node deletions registered in the write buffer.
    pub del_nodes_buffered: u64,

    /// Read buffer lookups that found the page resident.
    pub read_buffer_hits: u64,
    /// Read buffer lookups that fell through to storage.
    pub read_buffer_misses: u64,
    /// Installs declined because the page exceeds the buffer capacity.
    pub read_buffer_refused: u64,
    /// Pages force-installed in the read buffer by the read temporal control.
    pub forced_read_installs: u64,

    /// Flushing operations performed (both single-unit and full).
    pub flushes: u64,
    /// Pages written out by flushing operations.
    pub flushed_pages: u64,
    /// Flushed pages that were no longer present in the write buffer.
    pub unnecessary_flushed: u64,

    /// Write temporal control outcomes: sequential set chosen.
    pub tc_sequential: u64,
    /// Stride set chosen.
    pub tc_stride: u64,
    /// Union of both sets chosen.
    pub tc_mixed: u64,
    /// Filter could not improve the candidate list.
    pub tc_filled: u64,

    /// Records appended to the durability log.
    pub log_appends: u64,
    /// Log compactions performed.
    pub log_compactions: u64,
    /// Total wall time spent compacting, in milliseconds.
    pub log_compaction_time_ms: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fraction of read buffer lookups served from memory.
    pub fn read_hit_ratio(&self) -> f64 {
        let total = self.read_buffer_hits + self.read_buffer_misses;
        if total == 0 { 0.0 } else { self.read_buffer_hits as f64 / total as f64 }
    }
}
