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

// Common types for the buffer subsystem: errors, node status, the policy
// enumerations and the index configuration with its side-car persistence.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Error types of the core. Everything but compaction failures is fatal to
/// the operation that raised it and surfaces synchronously.
#[derive(Debug, thiserror::Error)]
pub enum EfindError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("write buffer still over capacity after a flushing pass")]
    BufferOverflow,

    #[error("corrupted log: {0}")]
    CorruptLog(String),

    #[error("page {0} not found")]
    PageNotFound(i32),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Result type for core operations
pub type EfindResult<T> = std::result::Result<T, EfindError>;

/// State of a page inside the write buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    /// Created since the last flush; the on-storage image is irrelevant.
    New,
    /// Exists on storage and carries buffered entry modifications.
    Modified,
    /// Deleted; carries no modifications and yields no image.
    Deleted,
}

/// How flushing units are scored. Each policy adds one more term to the
/// previous one: modification count, timestamp ordering, height weight,
/// modified-area weight, overlap-area weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlushingPolicy {
    M,
    MT,
    MTH,
    MTHA,
    MTHAO,
}

impl FlushingPolicy {
    pub fn uses_timestamp(&self) -> bool {
        !matches!(self, FlushingPolicy::M)
    }

    pub fn uses_area(&self) -> bool {
        matches!(self, FlushingPolicy::MTHA | FlushingPolicy::MTHAO)
    }

    pub fn uses_overlap(&self) -> bool {
        matches!(self, FlushingPolicy::MTHAO)
    }
}

/// Which of the two temporal-control lists are maintained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemporalControlPolicy {
    None,
    Read,
    Write,
    ReadWrite,
}

impl TemporalControlPolicy {
    pub fn reads_enabled(&self) -> bool {
        matches!(self, TemporalControlPolicy::Read | TemporalControlPolicy::ReadWrite)
    }

    pub fn writes_enabled(&self) -> bool {
        matches!(self, TemporalControlPolicy::Write | TemporalControlPolicy::ReadWrite)
    }
}

/// Replacement policy of the read buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadBufferPolicy {
    None,
    Lru,
    Hlru,
    S2q,
    Full2q,
}

/// Configuration of one eFIND index. All parameters are fixed at index
/// creation and persisted next to the index in a side-car header so that a
/// reopened index runs with the exact same buffers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EfindConfig {
    /// Capacity of the write buffer, in bytes.
    pub write_buffer_size: usize,
    /// Capacity of the read buffer, in bytes. 0 disables caching even when a
    /// replacement policy is configured.
    pub read_buffer_size: usize,
    pub read_buffer_policy: ReadBufferPolicy,
    /// Share of the read buffer assigned to the A1in region (Full2q only),
    /// as a percentage.
    pub a1in_perc_size: f64,

    pub temporal_control_policy: TemporalControlPolicy,
    /// Percentage used to derive the dynamic bound of the read ghost list.
    pub read_temporal_control_perc: f64,
    /// Multiplier of the flushing unit size bounding the write recency list.
    pub write_temporal_control_size: i32,
    /// Distance at or under which two page ids count as a sequential write.
    pub write_tc_minimum_distance: i32,
    /// Distance at or over which two page ids count as a stride write.
    pub write_tc_stride: i32,

    /// Percentage of the oldest buffered pages considered as flushing
    /// candidates under timestamp-aware policies. Values <= 0 degrade the
    /// candidate selection to policy M.
    pub timestamp_perc: f64,
    /// Pages per flushing unit.
    pub flushing_unit_size: i32,
    pub flushing_policy: FlushingPolicy,

    /// Size threshold that triggers log compaction, in bytes.
    pub log_size: usize,
    /// Path of the durability log.
    pub log_file: PathBuf,
}

impl Default for EfindConfig {
    fn default() -> Self {
        Self {
            write_buffer_size: 512 * 1024,
            read_buffer_size: 256 * 1024,
            read_buffer_policy: ReadBufferPolicy::Lru,
            a1in_perc_size: 25.0,
            temporal_control_policy: TemporalControlPolicy::None,
            read_temporal_control_perc: 10.0,
            write_temporal_control_size: 3,
            write_tc_minimum_distance: 2,
            write_tc_stride: 100,
            timestamp_perc: 60.0,
            flushing_unit_size: 5,
            flushing_policy: FlushingPolicy::MT,
            log_size: 1024 * 1024,
            log_file: PathBuf::from("./efind.log"),
        }
    }
}

impl EfindConfig {
    /// Rejects parameter combinations the buffers cannot operate under.
    pub fn validate(&self) -> EfindResult<()> {
        if self.flushing_unit_size <= 0 {
            return Err(EfindError::InvalidConfiguration(
                "flushing_unit_size must be positive".into(),
            ));
        }
        if self.write_buffer_size == 0 {
            return Err(EfindError::InvalidConfiguration(
                "write_buffer_size must be positive".into(),
            ));
        }
        if matches!(self.read_buffer_policy, ReadBufferPolicy::S2q | ReadBufferPolicy::Full2q)
            && !self.temporal_control_policy.reads_enabled()
        {
            return Err(EfindError::InvalidConfiguration(
                "2Q-family read buffers require the read temporal control as their ghost list".into(),
            ));
        }
        if self.read_buffer_policy == ReadBufferPolicy::Full2q
            && !(self.a1in_perc_size > 0.0 && self.a1in_perc_size < 100.0)
        {
            return Err(EfindError::InvalidConfiguration(
                "a1in_perc_size must lie in (0, 100)".into(),
            ));
        }
        if self.temporal_control_policy.writes_enabled() && self.write_temporal_control_size <= 0 {
            return Err(EfindError::InvalidConfiguration(
                "write_temporal_control_size must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Persists this configuration as the side-car header of an index.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> EfindResult<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| EfindError::InvalidConfiguration(e.to_string()))?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> EfindResult<Self> {
        let json = fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(|e| EfindError::InvalidConfiguration(e.to_string()))
    }
}
