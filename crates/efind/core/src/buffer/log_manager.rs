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

// Durability log
// Append-only record of write-buffer mutations. Every create/modify/delete
// appends one record after the in-memory state changed; every flush appends
// a FLUSH record that obsoletes the earlier records of the flushed pages.
// Replaying the non-obsolete records rebuilds the write buffer exactly.
//
// On-disk layout, little-endian, no file header:
//   1 byte kind (1=CREATE, 2=MOD, 3=DEL, 4=FLUSH)
//   4 bytes payload length (u32)
//   payload

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use tracing::{debug, warn};

use crate::buffer::lib::{EfindError, EfindResult};
use crate::page::entry::NodeEntry;
use crate::page::node::{Height, PageId};
use crate::statistics::collector::Metrics;

const KIND_CREATE: u8 = 1;
const KIND_MOD: u8 = 2;
const KIND_DEL: u8 = 3;
const KIND_FLUSH: u8 = 4;

/// One durability record.
#[derive(Debug, Clone, PartialEq)]
pub enum LogRecord {
    Create { page: PageId, height: Height },
    Mod { page: PageId, height: Height, entry: NodeEntry },
    Del { page: PageId, height: Height },
    Flush { pages: Vec<PageId> },
}

impl LogRecord {
    fn kind(&self) -> u8 {
        match self {
            LogRecord::Create { .. } => KIND_CREATE,
            LogRecord::Mod { .. } => KIND_MOD,
            LogRecord::Del { .. } => KIND_DEL,
            LogRecord::Flush { .. } => KIND_FLUSH,
        }
    }

    fn payload(&self) -> EfindResult<Vec<u8>> {
        let mut buf = Vec::new();
        match self {
            LogRecord::Create { page, height } | LogRecord::Del { page, height } => {
                buf.write_i32::<LittleEndian>(page.0)?;
                buf.write_i32::<LittleEndian>(*height)?;
            }
            LogRecord::Mod { page, height, entry } => {
                buf.write_i32::<LittleEndian>(page.0)?;
                buf.write_i32::<LittleEndian>(*height)?;
                entry.write_to(&mut buf)?;
            }
            LogRecord::Flush { pages } => {
                buf.write_i32::<LittleEndian>(pages.len() as i32)?;
                for page in pages {
                    buf.write_i32::<LittleEndian>(page.0)?;
                }
            }
        }
        Ok(buf)
    }

    /// Encodes kind, length prefix and payload.
    fn encode(&self) -> EfindResult<Vec<u8>> {
        let payload = self.payload()?;
        let mut buf = Vec::with_capacity(5 + payload.len());
        buf.write_u8(self.kind())?;
        buf.write_u32::<LittleEndian>(payload.len() as u32)?;
        buf.extend_from_slice(&payload);
        Ok(buf)
    }

    fn decode(kind: u8, payload: &[u8]) -> EfindResult<Self> {
        let mut r = payload;
        let record = match kind {
            KIND_CREATE | KIND_DEL => {
                let page = PageId(r.read_i32::<LittleEndian>().map_err(corrupt)?);
                let height = r.read_i32::<LittleEndian>().map_err(corrupt)?;
                if kind == KIND_CREATE {
                    LogRecord::Create { page, height }
                } else {
                    LogRecord::Del { page, height }
                }
            }
            KIND_MOD => {
                let page = PageId(r.read_i32::<LittleEndian>().map_err(corrupt)?);
                let height = r.read_i32::<LittleEndian>().map_err(corrupt)?;
                let entry = NodeEntry::read_from(&mut r).map_err(corrupt)?;
                LogRecord::Mod { page, height, entry }
            }
            KIND_FLUSH => {
                let n = r.read_i32::<LittleEndian>().map_err(corrupt)?;
                if n < 0 {
                    return Err(EfindError::CorruptLog("negative page count in FLUSH".into()));
                }
                let mut pages = Vec::with_capacity(n as usize);
                for _ in 0..n {
                    pages.push(PageId(r.read_i32::<LittleEndian>().map_err(corrupt)?));
                }
                LogRecord::Flush { pages }
            }
            other => {
                return Err(EfindError::CorruptLog(format!("unknown record kind: {other}")));
            }
        };
        if !r.is_empty() {
            return Err(EfindError::CorruptLog("trailing bytes in record payload".into()));
        }
        Ok(record)
    }

    /// The pages an applied record refers to.
    fn page(&self) -> Option<PageId> {
        match self {
            LogRecord::Create { page, .. }
            | LogRecord::Mod { page, .. }
            | LogRecord::Del { page, .. } => Some(*page),
            LogRecord::Flush { .. } => None,
        }
    }
}

fn corrupt(e: std::io::Error) -> EfindError {
    EfindError::CorruptLog(e.to_string())
}

/// The append-only log file and its bookkeeping.
pub struct DurabilityLog {
    path: PathBuf,
    file: File,
    /// Compaction threshold, in bytes.
    max_size: usize,
    cur_log_size: u64,
    offset_last_elem: u64,
    size_last_elem: u64,
    compaction_num: u32,
    compaction_time_ms: u64,
}

impl DurabilityLog {
    /// Creates a fresh, empty log, truncating any previous file.
    pub fn create<P: AsRef<Path>>(path: P, max_size: usize) -> EfindResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path.as_ref())?;
        Ok(Self {
            path: path.as_ref().to_path_buf(),
            file,
            max_size,
            cur_log_size: 0,
            offset_last_elem: 0,
            size_last_elem: 0,
            compaction_num: 0,
            compaction_time_ms: 0,
        })
    }

    /// Opens an existing log for appending, keeping its content for replay.
    pub fn open<P: AsRef<Path>>(path: P, max_size: usize) -> EfindResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.as_ref())?;
        let cur_log_size = file.metadata()?.len();
        Ok(Self {
            path: path.as_ref().to_path_buf(),
            file,
            max_size,
            cur_log_size,
            offset_last_elem: cur_log_size,
            size_last_elem: 0,
            compaction_num: 0,
            compaction_time_ms: 0,
        })
    }

    pub fn cur_size(&self) -> u64 {
        self.cur_log_size
    }

    pub fn offset_last_elem(&self) -> u64 {
        self.offset_last_elem
    }

    pub fn size_last_elem(&self) -> u64 {
        self.size_last_elem
    }

    pub fn compaction_num(&self) -> u32 {
        self.compaction_num
    }

    pub fn compaction_time_ms(&self) -> u64 {
        self.compaction_time_ms
    }

    /// Appends one record. A failed write is fatal and surfaces to the
    /// caller; a failed compaction afterwards is recoverable and only logged.
    pub fn append(&mut self, record: &LogRecord, metrics: &mut Metrics) -> EfindResult<()> {
        let encoded = record.encode()?;
        self.file.seek(SeekFrom::End(0))?;
        self.file.write_all(&encoded)?;

        self.offset_last_elem = self.cur_log_size;
        self.size_last_elem = encoded.len() as u64;
        self.cur_log_size += encoded.len() as u64;
        metrics.log_appends += 1;

        if self.cur_log_size > self.max_size as u64 {
            if let Err(e) = self.compact(metrics) {
                warn!("log compaction failed, keeping the previous log: {e}");
            }
        }
        Ok(())
    }

    /// Reads all records in append order, invoking `visit` for each.
    pub fn replay<F>(&mut self, mut visit: F) -> EfindResult<()>
    where
        F: FnMut(LogRecord) -> EfindResult<()>,
    {
        for record in self.read_all()? {
            visit(record)?;
        }
        Ok(())
    }

    fn read_all(&mut self) -> EfindResult<Vec<LogRecord>> {
        self.file.seek(SeekFrom::Start(0))?;
        let mut bytes = Vec::new();
        self.file.read_to_end(&mut bytes)?;

        let mut records = Vec::new();
        let mut offset = 0usize;
        while offset < bytes.len() {
            if offset + 5 > bytes.len() {
                return Err(EfindError::CorruptLog("truncated record header".into()));
            }
            let kind = bytes[offset];
            let mut len_bytes = &bytes[offset + 1..offset + 5];
            let len = len_bytes.read_u32::<LittleEndian>().map_err(corrupt)? as usize;
            let start = offset + 5;
            let end = start + len;
            if end > bytes.len() {
                return Err(EfindError::CorruptLog(
                    "record length exceeds the log file".into(),
                ));
            }
            records.push(LogRecord::decode(kind, &bytes[start..end])?);
            offset = end;
        }
        Ok(records)
    }

    /// Rewrites the log so that it only holds records not superseded by a
    /// later FLUSH of the same page, preserving per-page order. The rewrite
    /// goes to a temporary file that atomically replaces the log; on any
    /// failure the previous log stays in place.
    pub fn compact(&mut self, metrics: &mut Metrics) -> EfindResult<()> {
        let started = Instant::now();
        let records = self.read_all()?;

        // position of the last FLUSH covering each page
        let mut last_flush: HashMap<PageId, usize> = HashMap::new();
        for (i, record) in records.iter().enumerate() {
            if let LogRecord::Flush { pages } = record {
                for page in pages {
                    last_flush.insert(*page, i);
                }
            }
        }

        let mut kept = Vec::new();
        for (i, record) in records.iter().enumerate() {
            let Some(page) = record.page() else {
                // FLUSH records are materialized away by the rewrite
                continue;
            };
            match last_flush.get(&page) {
                Some(flush_pos) if i < *flush_pos => {}
                _ => kept.push(record),
            }
        }

        let tmp_path = self.path.with_extension("log.tmp");
        {
            let mut tmp = File::create(&tmp_path)?;
            let mut last_offset = 0u64;
            let mut last_size = 0u64;
            let mut total = 0u64;
            for record in &kept {
                let encoded = record.encode()?;
                tmp.write_all(&encoded)?;
                last_offset = total;
                last_size = encoded.len() as u64;
                total += encoded.len() as u64;
            }
            tmp.sync_all()?;
            fs::rename(&tmp_path, &self.path)?;

            self.file = OpenOptions::new().read(true).write(true).open(&self.path)?;
            self.cur_log_size = total;
            self.offset_last_elem = last_offset;
            self.size_last_elem = last_size;
        }

        self.compaction_num += 1;
        let elapsed = started.elapsed().as_millis() as u64;
        self.compaction_time_ms += elapsed;
        metrics.log_compactions += 1;
        metrics.log_compaction_time_ms += elapsed;
        debug!(
            kept = kept.len(),
            size = self.cur_log_size,
            "log compacted"
        );
        Ok(())
    }
}
