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

//! eFIND: a flash-aware buffer and flushing core for spatial indices.
//!
//! The core sits between the tree logic of an R-tree variant and a
//! page-addressable block store. Tree mutations land as variable-sized
//! per-entry modifications in a write buffer; reads merge those
//! modifications onto the last flushed image on demand; a flushing manager
//! periodically picks a unit of pages scored for device friendliness and
//! writes it in one batched sequential operation; an append-only log makes
//! the buffered state recoverable. The tree supplies its node codec and
//! ordering through [`index::TreeAdapter`], and its storage through
//! [`io::PageStore`].

pub mod buffer;
pub mod index;
pub mod io;
pub mod page;
pub mod statistics;

pub use buffer::{
    EfindConfig, EfindError, EfindResult, FlushingPolicy, NodeStatus, ReadBufferPolicy,
    TemporalControlPolicy,
};
pub use index::{EfindIndex, IndexKind, TreeAdapter};
pub use io::{IoAccess, PageStore, StorageFile};
pub use page::{BBox, EntryKey, Height, NodeEntry, NodePage, PageId};
pub use statistics::Metrics;
