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

use std::cmp::Ordering;
use std::mem;

use crate::buffer::lib::EfindResult;
use crate::io::direct_io::{AlignedBlock, IoAccess};
use crate::io::storage::PageStore;
use crate::page::entry::NodeEntry;
use crate::page::node::{Height, NodePage, PageId};

/// The index family sitting on top of the core. Only used to decide how
/// entry kinds are interpreted (Hilbert internal nodes carry their own
/// entry kind and keep their entries ordered).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    RTree,
    RStarTree,
    HilbertRTree,
}

/// Everything the core needs from the enclosing tree: the node codec and
/// the node ordering. The buffers and the flushing manager stay oblivious
/// to tree-algorithmic logic behind this seam.
pub trait TreeAdapter {
    fn index_kind(&self) -> IndexKind;

    /// Encodes a node image into one page-sized buffer.
    fn serialize_page(&self, page: &NodePage, buf: &mut [u8]) -> EfindResult<()>;

    /// Decodes a page-sized buffer back into a node image. A zeroed buffer
    /// decodes to an empty node.
    fn deserialize_page(&self, buf: &[u8], height: Height) -> EfindResult<NodePage>;

    /// Reads one node through the storage interface. The default reads the
    /// page bytes (from an aligned scratch buffer under direct I/O) and
    /// decodes them.
    fn read_node(
        &mut self,
        store: &mut dyn PageStore,
        page: PageId,
        height: Height,
    ) -> EfindResult<NodePage> {
        let page_size = store.page_size();
        let alignment = match store.io_access() {
            IoAccess::Direct => page_size,
            IoAccess::Normal => mem::align_of::<u64>(),
        };
        let mut scratch = AlignedBlock::zeroed(page_size, alignment)?;
        store.read_one_page(page, &mut scratch)?;
        self.deserialize_page(&scratch, height)
    }

    /// Whether merge-on-read must re-sort a node into the tree's natural
    /// order. Only trees that keep ordered nodes need it.
    fn requires_sort(&self) -> bool {
        matches!(self.index_kind(), IndexKind::HilbertRTree)
    }

    /// The tree's natural entry order, applied after a merge when
    /// `requires_sort` holds. The default orders Hilbert internal entries by
    /// largest Hilbert value and everything else by entry identity.
    fn compare_entries(&self, a: &NodeEntry, b: &NodeEntry) -> Ordering {
        match (a.lhv(), b.lhv()) {
            (Some(la), Some(lb)) => la.cmp(&lb).then_with(|| a.key().cmp(&b.key())),
            _ => a.key().cmp(&b.key()),
        }
    }
}
