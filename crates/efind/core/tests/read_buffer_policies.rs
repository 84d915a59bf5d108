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

use common::{entry, fixture_with, keys_of};
use efind_core::{IndexKind, PageId, ReadBufferPolicy, TemporalControlPolicy};

/// Temporal-read pinning: a page whose id sits in the read ghost list is
/// force-installed with its just-flushed image, so the read after the flush
/// hits the cache and sees the flushed content.
#[test]
fn test_read_pinning_across_a_flush() {
    let mut f = fixture_with(IndexKind::RTree, |c| {
        c.read_buffer_policy = ReadBufferPolicy::Lru;
        c.temporal_control_policy = TemporalControlPolicy::Read;
    });

    // first read misses, ghosts the id and installs the (empty) image
    assert!(f.index.retrieve_node(PageId(5), 0).unwrap().unwrap().is_empty());
    assert_eq!(f.index.metrics().read_buffer_misses, 1);
    assert!(f.index.read_buffer_contains(PageId(5)));

    // second read hits
    f.index.retrieve_node(PageId(5), 0).unwrap();
    assert_eq!(f.index.metrics().read_buffer_hits, 1);

    f.index.modify_node(PageId(5), entry(50), 0).unwrap();
    f.index.modify_node(PageId(6), entry(60), 0).unwrap();
    f.index.flush_all().unwrap();

    // both pages were ghosted by the time their images went out (page 6's
    // id entered the ghost list when the merge read its base image)
    assert_eq!(f.index.metrics().forced_read_installs, 2);
    assert!(f.index.read_buffer_contains(PageId(5)));

    // the cached image is the flushed one, not the pre-flush one
    let image = f.index.retrieve_node(PageId(5), 0).unwrap().unwrap();
    assert_eq!(keys_of(&image), vec![50]);
    assert_eq!(f.index.metrics().read_buffer_hits, 3);
}

/// HLRU keeps the root resident through a long leaf scan.
#[test]
fn test_hlru_retains_the_root() {
    // capacity for three cached (empty) pages
    let mut f = fixture_with(IndexKind::RTree, |c| {
        c.read_buffer_policy = ReadBufferPolicy::Hlru;
        c.read_buffer_size = 3 * 40;
    });
    f.index.set_tree_height(3);

    // the root comes in first
    f.index.retrieve_node(PageId(0), 3).unwrap();
    assert!(f.index.read_buffer_contains(PageId(0)));

    // twenty leaf reads churn the rest of the buffer
    for id in 1..=20 {
        f.index.retrieve_node(PageId(id), 0).unwrap();
    }
    assert!(f.index.read_buffer_contains(PageId(0)));
    assert!(f.index.read_buffer_len() <= 3);
}

/// S2Q admission: the first miss only ghosts the id, the second admits the
/// page, the third hits.
#[test]
fn test_s2q_admits_on_second_sight() {
    let mut f = fixture_with(IndexKind::RTree, |c| {
        c.read_buffer_policy = ReadBufferPolicy::S2q;
        c.temporal_control_policy = TemporalControlPolicy::Read;
    });

    f.index.retrieve_node(PageId(7), 0).unwrap();
    assert!(!f.index.read_buffer_contains(PageId(7)));

    f.index.retrieve_node(PageId(7), 0).unwrap();
    assert!(f.index.read_buffer_contains(PageId(7)));

    f.index.retrieve_node(PageId(7), 0).unwrap();
    assert_eq!(f.index.metrics().read_buffer_misses, 2);
    assert_eq!(f.index.metrics().read_buffer_hits, 1);
}

/// Full 2Q smoke: first sightings are admitted into the FIFO region and hit
/// on re-read. (Region aging and ghost promotion are covered by the policy's
/// unit tests, where the region split is controlled exactly.)
#[test]
fn test_full_2q_admits_and_hits() {
    let mut f = fixture_with(IndexKind::RTree, |c| {
        c.read_buffer_policy = ReadBufferPolicy::Full2q;
        c.temporal_control_policy = TemporalControlPolicy::Read;
        c.read_buffer_size = 8192;
        c.a1in_perc_size = 25.0;
    });

    f.index.retrieve_node(PageId(1), 0).unwrap();
    assert!(f.index.read_buffer_contains(PageId(1)));
    assert_eq!(f.index.metrics().read_buffer_misses, 1);

    f.index.retrieve_node(PageId(1), 0).unwrap();
    assert_eq!(f.index.metrics().read_buffer_hits, 1);
}

/// With no read buffer configured every retrieve goes to storage.
#[test]
fn test_disabled_read_buffer_reads_through() {
    let mut f = fixture_with(IndexKind::RTree, |c| {
        c.read_buffer_policy = ReadBufferPolicy::None;
    });

    f.index.modify_node(PageId(2), entry(20), 0).unwrap();
    f.index.flush_all().unwrap();

    let image = f.index.retrieve_node(PageId(2), 0).unwrap().unwrap();
    assert_eq!(keys_of(&image), vec![20]);
    assert_eq!(f.index.read_buffer_len(), 0);
    assert_eq!(f.index.metrics().read_buffer_hits, 0);
    assert_eq!(f.index.metrics().read_buffer_misses, 0);
}
