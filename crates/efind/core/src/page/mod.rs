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

// Page module
// In-memory representation of index nodes: bounding boxes, node entries
// (one variant per entry kind) and the node page container used by the
// buffers. Node payloads are opaque to the rest of the core except for the
// entry identity, the entry sizes, and the bounding boxes used by the
// flushing scores.

pub mod bbox;
pub mod entry;
pub mod node;

pub use bbox::{BBox, overlapping_area};
pub use entry::{EntryKey, NodeEntry};
pub use node::{Height, NodePage, PageId};
