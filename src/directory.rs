//! The on-disk directory: a signature, a record count, and a flat run of
//! variable-length filename/extent records packed into the first
//! [`DIR_BLOCKS`] blocks of the partition.

use log::{debug, warn};

use crate::block_io::BlockIo;
use crate::device::BlockDevice;
use crate::error::FsError;
use crate::{DIR_BLOCKS, DIR_CAPACITY, DIR_SIGNATURE, MAX_FILENAME};

/// One file's directory entry: its name and the extent of blocks holding its
/// data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub filename: String,
    pub start_block: u32,
    pub num_blocks: u32,
    pub size: u32,
    /// Byte offset of this record within the directory buffer. Used to
    /// re-encode it in place on update.
    pub(crate) dir_offset: usize,
    /// Whether a descriptor currently references this record. Not persisted
    /// to disk; every record reloads as closed.
    pub(crate) opened: bool,
}

impl FileRecord {
    fn new_empty(filename: String, dir_offset: usize) -> Self {
        Self {
            filename,
            start_block: 0,
            num_blocks: 0,
            size: 0,
            dir_offset,
            opened: false,
        }
    }

    /// Bytes a record for this filename occupies in the directory buffer:
    /// 2 (length prefix) + filename + 1 (NUL) + 4 + 4 + 4 (start/num/size).
    fn encoded_len(&self) -> usize {
        2 + self.filename.len() + 1 + 4 + 4 + 4
    }
}

/// The directory buffer plus the in-memory list of records parsed from it.
pub struct Directory {
    buffer: Box<[u8; DIR_CAPACITY]>,
    /// Offset one past the last valid byte written so far; where the next
    /// appended record goes.
    write_ptr: usize,
    records: Vec<FileRecord>,
}

impl Directory {
    /// Loads the directory from the first [`DIR_BLOCKS`] blocks of `io`. If
    /// the signature is missing (a fresh partition), initializes an empty
    /// directory and flushes it immediately.
    pub fn load<D: BlockDevice>(io: &mut BlockIo<D>) -> Result<Self, FsError> {
        let raw = io.read_blocks(0, DIR_BLOCKS)?;
        let mut buffer = Box::new([0u8; DIR_CAPACITY]);
        buffer.copy_from_slice(&raw);

        if buffer[0..4] != DIR_SIGNATURE[..] {
            debug!("no directory signature found, formatting a fresh directory");
            buffer[0..4].copy_from_slice(&DIR_SIGNATURE);
            buffer[4..6].copy_from_slice(&0u16.to_le_bytes());
            let mut dir = Directory {
                buffer,
                write_ptr: 6,
                records: Vec::new(),
            };
            dir.flush(io)?;
            return Ok(dir);
        }

        let num_files = u16::from_le_bytes([buffer[4], buffer[5]]);
        let mut records = Vec::with_capacity(num_files as usize);
        let mut ptr = 6usize;
        for _ in 0..num_files {
            match Self::decode_at(&buffer, ptr) {
                Some((record, consumed)) => {
                    ptr += consumed;
                    records.push(record);
                }
                None => {
                    warn!("directory record at offset {ptr} is truncated or invalid, stopping parse");
                    break;
                }
            }
        }

        Ok(Directory {
            buffer,
            write_ptr: ptr,
            records,
        })
    }

    pub fn records(&self) -> &[FileRecord] {
        &self.records
    }

    pub fn find_by_name(&self, filename: &str) -> Option<usize> {
        self.records.iter().position(|r| r.filename == filename)
    }

    pub fn record(&self, idx: usize) -> FileRecord {
        self.records[idx].clone()
    }

    /// All records except the one at `idx`, for allocator neighbor checks.
    pub fn other_records(&self, idx: usize) -> Vec<FileRecord> {
        self.records
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != idx)
            .map(|(_, r)| r.clone())
            .collect()
    }

    pub(crate) fn set_record(&mut self, idx: usize, record: FileRecord) {
        self.records[idx] = record;
    }

    pub(crate) fn set_opened(&mut self, idx: usize, opened: bool) {
        self.records[idx].opened = opened;
    }

    /// Appends a new, empty (zero blocks, zero size) record for `filename`
    /// and flushes the directory. On success, returns its index.
    pub fn append_new<D: BlockDevice>(&mut self, io: &mut BlockIo<D>, filename: &str) -> Result<usize, FsError> {
        if filename.len() > MAX_FILENAME {
            return Err(FsError::FilenameTooLong(MAX_FILENAME));
        }
        let record = FileRecord::new_empty(filename.to_string(), self.write_ptr);
        let needed = record.encoded_len();
        if self.write_ptr + needed > DIR_CAPACITY {
            return Err(FsError::DirectoryFull);
        }
        Self::encode_at(&mut self.buffer, self.write_ptr, &record);
        self.write_ptr += needed;

        let count = u16::from_le_bytes([self.buffer[4], self.buffer[5]]);
        self.buffer[4..6].copy_from_slice(&(count + 1).to_le_bytes());

        self.records.push(record);
        self.flush(io)?;
        Ok(self.records.len() - 1)
    }

    /// Re-encodes `record` in place at its existing offset. Does not flush;
    /// callers persist explicitly once they're done mutating.
    pub fn update_record(&mut self, record: &FileRecord) -> Result<(), FsError> {
        if record.filename.len() > MAX_FILENAME {
            return Err(FsError::FilenameTooLong(MAX_FILENAME));
        }
        if record.dir_offset + record.encoded_len() > DIR_CAPACITY {
            return Err(FsError::DirectoryFull);
        }
        Self::encode_at(&mut self.buffer, record.dir_offset, record);
        Ok(())
    }

    /// Writes the directory buffer back to blocks `0..DIR_BLOCKS`.
    pub fn flush<D: BlockDevice>(&mut self, io: &mut BlockIo<D>) -> Result<(), FsError> {
        io.write_blocks(0, DIR_BLOCKS, self.buffer.as_ref())?;
        Ok(())
    }

    fn encode_at(buffer: &mut [u8; DIR_CAPACITY], offset: usize, record: &FileRecord) {
        let name = record.filename.as_bytes();
        let mut p = offset;
        buffer[p..p + 2].copy_from_slice(&(name.len() as u16).to_le_bytes());
        p += 2;
        buffer[p..p + name.len()].copy_from_slice(name);
        p += name.len();
        buffer[p] = 0;
        p += 1;
        buffer[p..p + 4].copy_from_slice(&record.start_block.to_le_bytes());
        p += 4;
        buffer[p..p + 4].copy_from_slice(&record.num_blocks.to_le_bytes());
        p += 4;
        buffer[p..p + 4].copy_from_slice(&record.size.to_le_bytes());
    }

    fn decode_at(buffer: &[u8; DIR_CAPACITY], offset: usize) -> Option<(FileRecord, usize)> {
        if offset + 2 > DIR_CAPACITY {
            return None;
        }
        let filename_len = u16::from_le_bytes([buffer[offset], buffer[offset + 1]]) as usize;
        if filename_len > MAX_FILENAME {
            return None;
        }
        let total = 2 + filename_len + 1 + 4 + 4 + 4;
        if offset + total > DIR_CAPACITY {
            return None;
        }

        let name_start = offset + 2;
        let filename = String::from_utf8_lossy(&buffer[name_start..name_start + filename_len]).into_owned();
        let mut p = name_start + filename_len + 1;
        let start_block = u32::from_le_bytes(buffer[p..p + 4].try_into().unwrap());
        p += 4;
        let num_blocks = u32::from_le_bytes(buffer[p..p + 4].try_into().unwrap());
        p += 4;
        let size = u32::from_le_bytes(buffer[p..p + 4].try_into().unwrap());

        Some((
            FileRecord {
                filename,
                start_block,
                num_blocks,
                size,
                dir_offset: offset,
                opened: false,
            },
            total,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MemoryBlockDevice;

    #[test]
    fn fresh_partition_formats_empty_directory() {
        let mut io = BlockIo::new(MemoryBlockDevice::new());
        let dir = Directory::load(&mut io).unwrap();
        assert!(dir.records().is_empty());
    }

    #[test]
    fn append_then_reload_round_trips() {
        let mut io = BlockIo::new(MemoryBlockDevice::new());
        {
            let mut dir = Directory::load(&mut io).unwrap();
            dir.append_new(&mut io, "hello").unwrap();
            dir.append_new(&mut io, "world").unwrap();
        }
        let dir = Directory::load(&mut io).unwrap();
        assert_eq!(dir.records().len(), 2);
        assert_eq!(dir.records()[0].filename, "hello");
        assert_eq!(dir.records()[1].filename, "world");
    }

    #[test]
    fn update_record_persists_after_flush() {
        let mut io = BlockIo::new(MemoryBlockDevice::new());
        let mut dir = Directory::load(&mut io).unwrap();
        let idx = dir.append_new(&mut io, "hello").unwrap();
        let mut record = dir.record(idx);
        record.start_block = 2;
        record.num_blocks = 3;
        record.size = 100;
        dir.update_record(&record).unwrap();
        dir.flush(&mut io).unwrap();
        dir.set_record(idx, record.clone());

        let reloaded = Directory::load(&mut io).unwrap();
        assert_eq!(reloaded.record(idx), record);
    }

    #[test]
    fn filename_too_long_is_rejected() {
        let mut io = BlockIo::new(MemoryBlockDevice::new());
        let mut dir = Directory::load(&mut io).unwrap();
        let name = "a".repeat(MAX_FILENAME + 1);
        let err = dir.append_new(&mut io, &name).unwrap_err();
        assert_eq!(err.code(), crate::CODE_INVALID);
    }
}
