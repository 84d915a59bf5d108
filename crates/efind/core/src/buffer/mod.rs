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

// Buffer module
// The flash-aware buffer subsystem: a write buffer of per-page modification
// logs, a read buffer with pluggable replacement policies, the temporal
// control lists biasing both, the flushing manager batching writes, and the
// durability log that makes it all recoverable.

pub mod flushing_manager;
pub mod hlru;
pub mod lib;
pub mod log_manager;
pub mod lru;
pub mod mod_set;
pub mod read_buffer;
pub mod s2q;
pub mod temporal_control;
pub mod two_q;
pub mod write_buffer;

// Public exports
pub use flushing_manager::ChosenPage;
pub use hlru::HlruBuffer;
pub use lib::{
    EfindConfig, EfindError, EfindResult, FlushingPolicy, NodeStatus, ReadBufferPolicy,
    TemporalControlPolicy,
};
pub use log_manager::{DurabilityLog, LogRecord};
pub use lru::LruBuffer;
pub use mod_set::{MOD_ENTRY_OVERHEAD, ModSet};
pub use read_buffer::ReadBuffer;
pub use s2q::S2qBuffer;
pub use temporal_control::{MIN_READ_TEMPORAL_CONTROL, TemporalControl};
pub use two_q::TwoQueueBuffer;
pub use write_buffer::{WRITE_ENTRY_OVERHEAD, WriteBuffer, WriteEntry};
