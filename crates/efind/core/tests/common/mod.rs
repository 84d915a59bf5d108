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

// Shared fixture for the integration tests: a minimal tree adapter with a
// little-endian node codec, and index builders over temp-dir storage.

#![allow(dead_code)]

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use tempfile::TempDir;

use efind_core::{
    BBox, EfindConfig, EfindError, EfindIndex, EfindResult, Height, IndexKind, IoAccess,
    NodeEntry, NodePage, StorageFile, TreeAdapter,
};

pub const PAGE_SIZE: usize = 1024;

/// Codec-only adapter standing in for the tree: pages serialize as an entry
/// count followed by the entries.
pub struct TestAdapter {
    kind: IndexKind,
}

impl TestAdapter {
    pub fn new(kind: IndexKind) -> Self {
        Self { kind }
    }
}

impl TreeAdapter for TestAdapter {
    fn index_kind(&self) -> IndexKind {
        self.kind
    }

    fn serialize_page(&self, page: &NodePage, buf: &mut [u8]) -> EfindResult<()> {
        buf.fill(0);
        let needed: usize = 4 + page.entries().iter().map(|e| e.serialized_size()).sum::<usize>();
        if needed > buf.len() {
            return Err(EfindError::InvalidOperation(format!(
                "node of {needed} bytes does not fit a {} byte page",
                buf.len()
            )));
        }
        let mut w = &mut buf[..];
        w.write_u32::<LittleEndian>(page.len() as u32)
            .map_err(EfindError::Io)?;
        for entry in page.entries() {
            entry.write_to(&mut w).map_err(EfindError::Io)?;
        }
        Ok(())
    }

    fn deserialize_page(&self, buf: &[u8], _height: Height) -> EfindResult<NodePage> {
        let mut r = buf;
        let count = r.read_u32::<LittleEndian>().map_err(EfindError::Io)?;
        let mut page = NodePage::empty();
        for _ in 0..count {
            page.push(NodeEntry::read_from(&mut r).map_err(EfindError::Io)?);
        }
        Ok(page)
    }
}

pub struct Fixture {
    /// Keeps the temp dir (storage, log, header) alive for the test.
    pub dir: TempDir,
    pub index: EfindIndex<TestAdapter, StorageFile>,
}

/// Builds a fresh index over temp-dir storage. `tweak` adjusts the default
/// configuration before the index is created.
pub fn fixture_with<F>(kind: IndexKind, tweak: F) -> Fixture
where
    F: FnOnce(&mut EfindConfig),
{
    let dir = tempfile::tempdir().unwrap();
    let mut config = EfindConfig {
        log_file: dir.path().join("efind.log"),
        ..Default::default()
    };
    tweak(&mut config);
    let store = StorageFile::open(dir.path().join("pages.bin"), PAGE_SIZE, IoAccess::Normal).unwrap();
    let index = EfindIndex::create(TestAdapter::new(kind), store, config).unwrap();
    Fixture { dir, index }
}

/// Reopens the index of an existing fixture, replaying its log.
pub fn recover(fixture: &Fixture) -> EfindIndex<TestAdapter, StorageFile> {
    let kind = IndexKind::RTree;
    let store = StorageFile::open(
        fixture.dir.path().join("pages.bin"),
        PAGE_SIZE,
        IoAccess::Normal,
    )
    .unwrap();
    EfindIndex::recover(TestAdapter::new(kind), store, fixture.index.config().clone()).unwrap()
}

/// A spatial entry with a unit box anchored at its key.
pub fn entry(key: i32) -> NodeEntry {
    let at = key as f64;
    NodeEntry::spatial(key, Some(BBox::new([at, at], [at + 1.0, at + 1.0])))
}

/// A spatial entry with no bounding box (smallest payload).
pub fn bare_entry(key: i32) -> NodeEntry {
    NodeEntry::spatial(key, None)
}

/// Keys of a node image, in stored order.
pub fn keys_of(page: &NodePage) -> Vec<i32> {
    page.entries().iter().map(|e| e.key()).collect()
}
