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

// I/O module
// Page-granular storage access. Provides the storage interface consumed by
// the core, a file-backed implementation with optional direct I/O, and the
// aligned buffers direct I/O requires.

pub mod direct_io;
pub mod storage;

pub use direct_io::{AlignedBlock, IoAccess, align_to, is_power_of_two};
pub use storage::{PageStore, StorageFile};
