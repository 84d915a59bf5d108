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

mod common;

use common::{entry, fixture_with, keys_of, recover};
use efind_core::{EfindConfig, IndexKind, NodeStatus, PageId};

/// Unflushed mutations survive a crash through log replay: the rebuilt
/// write buffer holds the same entries with the same statuses and
/// modifications.
#[test]
fn test_recovery_rebuilds_the_write_buffer() {
    let f = {
        let mut f = fixture_with(IndexKind::RTree, |_| {});
        f.index.create_node(PageId(1), 0).unwrap();
        f.index.modify_node(PageId(1), entry(100), 0).unwrap();
        f.index.modify_node(PageId(2), entry(200), 0).unwrap();
        // no flush: the index goes away with its buffer full
        f
    };

    // the side-car header describes the index the log belongs to
    let header = f.index.config().log_file.with_extension("header");
    let persisted = EfindConfig::load_from(header).unwrap();
    assert_eq!(persisted.write_buffer_size, f.index.config().write_buffer_size);

    let mut recovered = recover(&f);
    assert_eq!(recovered.write_buffer_len(), 2);
    assert_eq!(recovered.buffered_page_status(PageId(1)), Some(NodeStatus::New));
    assert_eq!(recovered.buffered_page_status(PageId(2)), Some(NodeStatus::Modified));

    let page1 = recovered.retrieve_node(PageId(1), 0).unwrap().unwrap();
    assert_eq!(keys_of(&page1), vec![100]);
    let page2 = recovered.retrieve_node(PageId(2), 0).unwrap().unwrap();
    assert_eq!(keys_of(&page2), vec![200]);
}

/// Replaying the same log twice yields the identical state.
#[test]
fn test_recovery_is_deterministic() {
    let f = {
        let mut f = fixture_with(IndexKind::RTree, |_| {});
        f.index.create_node(PageId(3), 1).unwrap();
        f.index.modify_node(PageId(3), entry(31), 1).unwrap();
        f.index.modify_node(PageId(3), entry(30), 1).unwrap();
        f.index.delete_node(PageId(4), 0).unwrap();
        f
    };

    let mut first = recover(&f);
    let mut second = recover(&f);

    assert_eq!(first.write_buffer_len(), second.write_buffer_len());
    assert_eq!(first.write_buffer_bytes(), second.write_buffer_bytes());
    for id in [3, 4] {
        assert_eq!(
            first.buffered_page_status(PageId(id)),
            second.buffered_page_status(PageId(id))
        );
    }
    let a = first.retrieve_node(PageId(3), 1).unwrap().unwrap();
    let b = second.retrieve_node(PageId(3), 1).unwrap().unwrap();
    assert_eq!(keys_of(&a), keys_of(&b));
    assert_eq!(keys_of(&a), vec![30, 31]);
}

/// A flush obsoletes the records of its pages: recovery after a flush
/// rebuilds only what was mutated afterwards.
#[test]
fn test_flush_records_obsolete_earlier_mutations() {
    let f = {
        let mut f = fixture_with(IndexKind::RTree, |_| {});
        f.index.create_node(PageId(1), 0).unwrap();
        f.index.modify_node(PageId(1), entry(10), 0).unwrap();
        f.index.modify_node(PageId(2), entry(20), 0).unwrap();
        f.index.flush_all().unwrap();
        f.index.modify_node(PageId(3), entry(33), 0).unwrap();
        f
    };

    let mut recovered = recover(&f);
    assert_eq!(recovered.write_buffer_len(), 1);
    assert_eq!(recovered.buffered_page_status(PageId(3)), Some(NodeStatus::Modified));
    assert_eq!(recovered.buffered_page_status(PageId(1)), None);

    // the flushed pages come back from storage, not from the buffer
    let page1 = recovered.retrieve_node(PageId(1), 0).unwrap().unwrap();
    assert_eq!(keys_of(&page1), vec![10]);
}

/// Compaction rewrites the log without the records of flushed pages, and
/// recovery from the compacted log equals recovery from the uncompacted one.
#[test]
fn test_compaction_preserves_recovery() {
    let run = |log_size: usize| {
        let mut f = fixture_with(IndexKind::RTree, move |c| {
            c.log_size = log_size;
        });
        f.index.create_node(PageId(1), 0).unwrap();
        f.index.modify_node(PageId(1), entry(10), 0).unwrap();
        f.index.modify_node(PageId(2), entry(20), 0).unwrap();
        f.index.flush_all().unwrap();
        f.index.modify_node(PageId(3), entry(33), 0).unwrap();
        f
    };

    // a tiny threshold compacts eagerly, a huge one never
    let compacted = run(64);
    let uncompacted = run(1 << 20);
    assert!(compacted.index.metrics().log_compactions >= 1);
    assert_eq!(uncompacted.index.metrics().log_compactions, 0);

    let mut a = recover(&compacted);
    let mut b = recover(&uncompacted);

    assert_eq!(a.write_buffer_len(), 1);
    assert_eq!(a.write_buffer_len(), b.write_buffer_len());
    for id in 1..=3 {
        assert_eq!(a.buffered_page_status(PageId(id)), b.buffered_page_status(PageId(id)));
        let ia = a.retrieve_node(PageId(id), 0).unwrap().unwrap();
        let ib = b.retrieve_node(PageId(id), 0).unwrap().unwrap();
        assert_eq!(keys_of(&ia), keys_of(&ib));
    }
}

/// Deletions replay too: a page logged as deleted is still deleted after
/// recovery and yields no image.
#[test]
fn test_recovered_deletion_yields_no_image() {
    let f = {
        let mut f = fixture_with(IndexKind::RTree, |_| {});
        f.index.create_node(PageId(8), 0).unwrap();
        f.index.modify_node(PageId(8), entry(80), 0).unwrap();
        f.index.delete_node(PageId(8), 0).unwrap();
        f
    };

    let mut recovered = recover(&f);
    assert_eq!(recovered.buffered_page_status(PageId(8)), Some(NodeStatus::Deleted));
    assert_eq!(recovered.retrieve_node(PageId(8), 0).unwrap(), None);
}
