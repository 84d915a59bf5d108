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

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::buffer::lib::{EfindError, EfindResult};
use crate::io::direct_io::{self, IoAccess, is_power_of_two};
use crate::page::node::PageId;

/// The page-addressable block store the core writes flushing units to and
/// reads node images from. Offsets are `page_id * page_size`. Under direct
/// access both read and write buffers must be page-aligned; callers obtain
/// them from [`AlignedBlock`].
pub trait PageStore {
    fn page_size(&self) -> usize;

    fn io_access(&self) -> IoAccess;

    fn read_one_page(&mut self, page: PageId, buf: &mut [u8]) -> EfindResult<()>;

    fn write_one_page(&mut self, page: PageId, buf: &[u8]) -> EfindResult<()>;

    /// Writes `count` consecutive pages starting at `first` in one sequential
    /// operation. `buf` holds the page images back to back.
    fn write_pages(&mut self, first: PageId, buf: &[u8], count: usize) -> EfindResult<()>;
}

/// File-backed page store. Reads past the end of the file yield zeroed pages
/// so that freshly allocated nodes deserialize as empty.
pub struct StorageFile {
    file: File,
    page_size: usize,
    io_access: IoAccess,
}

impl StorageFile {
    pub fn open<P: AsRef<Path>>(path: P, page_size: usize, io_access: IoAccess) -> EfindResult<Self> {
        if io_access == IoAccess::Direct && !is_power_of_two(page_size) {
            return Err(EfindError::InvalidConfiguration(format!(
                "direct I/O requires a power-of-two page size, got {page_size}"
            )));
        }
        let file = direct_io::open_page_file(path, io_access)?;
        Ok(Self { file, page_size, io_access })
    }

    fn offset_of(&self, page: PageId) -> EfindResult<u64> {
        if page.0 < 0 {
            return Err(EfindError::PageNotFound(page.0));
        }
        Ok(page.0 as u64 * self.page_size as u64)
    }

    fn read_range(&mut self, offset: u64, buf: &mut [u8]) -> EfindResult<()> {
        let file_len = self.file.metadata()?.len();
        if offset >= file_len {
            buf.fill(0);
            return Ok(());
        }
        self.file.seek(SeekFrom::Start(offset))?;
        let available = ((file_len - offset) as usize).min(buf.len());
        self.file.read_exact(&mut buf[..available])?;
        buf[available..].fill(0);
        Ok(())
    }
}

impl PageStore for StorageFile {
    fn page_size(&self) -> usize {
        self.page_size
    }

    fn io_access(&self) -> IoAccess {
        self.io_access
    }

    fn read_one_page(&mut self, page: PageId, buf: &mut [u8]) -> EfindResult<()> {
        debug_assert_eq!(buf.len(), self.page_size);
        let offset = self.offset_of(page)?;
        self.read_range(offset, buf)
    }

    fn write_one_page(&mut self, page: PageId, buf: &[u8]) -> EfindResult<()> {
        self.write_pages(page, buf, 1)
    }

    fn write_pages(&mut self, first: PageId, buf: &[u8], count: usize) -> EfindResult<()> {
        debug_assert_eq!(buf.len(), count * self.page_size);
        let offset = self.offset_of(first)?;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&buf[..count * self.page_size])?;
        Ok(())
    }
}
