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

use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::page::bbox::BBox;

/// Tree-defined identity of an entry inside a node. For spatial entries this
/// is the external object pointer, for Hilbert internal entries the child
/// page id. Modifications with the same key supersede each other.
pub type EntryKey = i32;

const ENTRY_TAG_SPATIAL: u8 = 1;
const ENTRY_TAG_HILBERT_INTERNAL: u8 = 2;

/// One entry of an index node. Two kinds exist: the single entry type shared
/// by R-tree/R*-tree nodes and Hilbert leaves, and the Hilbert internal
/// entry that additionally carries the largest Hilbert value of its subtree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeEntry {
    Spatial {
        /// External object id (leaf) or child page id (internal).
        pointer: i32,
        bbox: Option<BBox>,
    },
    HilbertInternal {
        /// Child page id.
        child: i32,
        /// Largest Hilbert value in the subtree rooted at `child`.
        lhv: u64,
        bbox: Option<BBox>,
    },
}

impl NodeEntry {
    pub fn spatial(pointer: i32, bbox: Option<BBox>) -> Self {
        NodeEntry::Spatial { pointer, bbox }
    }

    pub fn hilbert_internal(child: i32, lhv: u64, bbox: Option<BBox>) -> Self {
        NodeEntry::HilbertInternal { child, lhv, bbox }
    }

    /// The identity this entry is keyed by inside a modification set.
    pub fn key(&self) -> EntryKey {
        match self {
            NodeEntry::Spatial { pointer, .. } => *pointer,
            NodeEntry::HilbertInternal { child, .. } => *child,
        }
    }

    pub fn bbox(&self) -> Option<&BBox> {
        match self {
            NodeEntry::Spatial { bbox, .. } => bbox.as_ref(),
            NodeEntry::HilbertInternal { bbox, .. } => bbox.as_ref(),
        }
    }

    /// Largest Hilbert value, when this entry kind carries one.
    pub fn lhv(&self) -> Option<u64> {
        match self {
            NodeEntry::Spatial { .. } => None,
            NodeEntry::HilbertInternal { lhv, .. } => Some(*lhv),
        }
    }

    /// Number of bytes `write_to` produces for this entry.
    pub fn serialized_size(&self) -> usize {
        let bbox_len = |b: &Option<BBox>| if b.is_some() { 32 } else { 0 };
        match self {
            NodeEntry::Spatial { bbox, .. } => 1 + 4 + 1 + bbox_len(bbox),
            NodeEntry::HilbertInternal { bbox, .. } => 1 + 4 + 8 + 1 + bbox_len(bbox),
        }
    }

    /// Little-endian encoding: a kind tag, the identity fields, then an
    /// optional bounding box (presence byte + 4 doubles).
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        match self {
            NodeEntry::Spatial { pointer, bbox } => {
                w.write_u8(ENTRY_TAG_SPATIAL)?;
                w.write_i32::<LittleEndian>(*pointer)?;
                write_bbox(w, bbox)?;
            }
            NodeEntry::HilbertInternal { child, lhv, bbox } => {
                w.write_u8(ENTRY_TAG_HILBERT_INTERNAL)?;
                w.write_i32::<LittleEndian>(*child)?;
                w.write_u64::<LittleEndian>(*lhv)?;
                write_bbox(w, bbox)?;
            }
        }
        Ok(())
    }

    pub fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let tag = r.read_u8()?;
        match tag {
            ENTRY_TAG_SPATIAL => {
                let pointer = r.read_i32::<LittleEndian>()?;
                let bbox = read_bbox(r)?;
                Ok(NodeEntry::Spatial { pointer, bbox })
            }
            ENTRY_TAG_HILBERT_INTERNAL => {
                let child = r.read_i32::<LittleEndian>()?;
                let lhv = r.read_u64::<LittleEndian>()?;
                let bbox = read_bbox(r)?;
                Ok(NodeEntry::HilbertInternal { child, lhv, bbox })
            }
            other => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unknown entry tag: {other}"),
            )),
        }
    }
}

fn write_bbox<W: Write>(w: &mut W, bbox: &Option<BBox>) -> io::Result<()> {
    match bbox {
        Some(b) => {
            w.write_u8(1)?;
            w.write_f64::<LittleEndian>(b.min[0])?;
            w.write_f64::<LittleEndian>(b.min[1])?;
            w.write_f64::<LittleEndian>(b.max[0])?;
            w.write_f64::<LittleEndian>(b.max[1])?;
        }
        None => w.write_u8(0)?,
    }
    Ok(())
}

fn read_bbox<R: Read>(r: &mut R) -> io::Result<Option<BBox>> {
    match r.read_u8()? {
        0 => Ok(None),
        1 => {
            let min = [r.read_f64::<LittleEndian>()?, r.read_f64::<LittleEndian>()?];
            let max = [r.read_f64::<LittleEndian>()?, r.read_f64::<LittleEndian>()?];
            Ok(Some(BBox::new(min, max)))
        }
        other => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("invalid bbox presence byte: {other}"),
        )),
    }
}
