//! The public file system API: open/read/write/close plus lifecycle.

use log::{info, warn};

use crate::allocator::Allocator;
use crate::block_io::BlockIo;
use crate::device::BlockDevice;
use crate::directory::Directory;
use crate::error::FsError;
use crate::file_table::FileTable;
use crate::BLOCK_SIZE;

/// Whether [`FileSystem::open`] should create the file if it doesn't exist,
/// or fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Fail if the file does not already exist.
    Open,
    /// Create a new, empty file if one by this name doesn't already exist.
    Create,
}

/// A mounted file system: a directory, an allocator, and a table of
/// currently open descriptors, all layered on one [`BlockDevice`].
pub struct FileSystem<D> {
    block_io: BlockIo<D>,
    directory: Directory,
    allocator: Allocator,
    file_table: FileTable,
}

impl<D: BlockDevice> FileSystem<D> {
    /// Mounts the file system, loading (or formatting) its directory from
    /// `device`. `partition_blocks` bounds how many blocks the allocator may
    /// ever hand out; it is not re-validated against whatever the directory
    /// says about already-allocated extents.
    pub fn initialize(device: D, partition_blocks: u32) -> Result<Self, FsError> {
        let mut block_io = BlockIo::new(device);
        let directory = Directory::load(&mut block_io)?;
        let file_table = FileTable::new()?;
        info!(
            "file system initialized: {} files on record, {partition_blocks} blocks in partition",
            directory.records().len()
        );
        Ok(Self {
            block_io,
            directory,
            allocator: Allocator::new(partition_blocks),
            file_table,
        })
    }

    /// Opens `filename`, creating it if `mode` is [`OpenMode::Create`] and it
    /// doesn't already exist. Returns a nonzero descriptor on success, or `0`
    /// if the file doesn't exist (under [`OpenMode::Open`]), is already open,
    /// or no descriptor slot is free.
    pub fn open(&mut self, filename: &str, mode: OpenMode) -> u32 {
        match self.try_open(filename, mode) {
            Ok(fd) => fd,
            Err(e) => {
                warn!("open({filename:?}) failed: {e}");
                0
            }
        }
    }

    fn try_open(&mut self, filename: &str, mode: OpenMode) -> Result<u32, FsError> {
        let idx = match self.directory.find_by_name(filename) {
            Some(idx) => idx,
            None if mode == OpenMode::Create => self.directory.append_new(&mut self.block_io, filename)?,
            None => return Err(FsError::FileNotFound),
        };

        if self.directory.record(idx).opened {
            return Err(FsError::AlreadyOpen);
        }

        let fd = self.file_table.allocate(idx).ok_or(FsError::DescriptorTableFull)?;
        self.directory.set_opened(idx, true);
        Ok(fd)
    }

    /// Writes `data` to the file referenced by `fd` at `offset`, growing the
    /// file (and allocating blocks) as needed. Returns the number of bytes
    /// actually written; `0` on any failure, including an invalid
    /// descriptor, an offset past the current end of file, or exhausted
    /// partition space.
    pub fn write(&mut self, fd: u32, data: &[u8], offset: u32) -> u32 {
        match self.try_write(fd, data, offset) {
            Ok(n) => n as u32,
            Err(e) => {
                warn!("write(fd={fd}) failed: {e}");
                0
            }
        }
    }

    fn try_write(&mut self, fd: u32, data: &[u8], offset: u32) -> Result<usize, FsError> {
        let idx = self.open_record_index(fd)?;

        let record = self.directory.record(idx);
        if offset > record.size {
            return Err(FsError::OffsetBeyondEnd);
        }

        let needed_end = offset
            .checked_add(data.len() as u32)
            .ok_or(FsError::OffsetBeyondEnd)?;
        if needed_end > record.size {
            // A failed expansion isn't fatal to the write: whatever capacity
            // the file already has is still written to, clamped below.
            if let Err(e) = self.allocator.expand_to(&mut self.block_io, &mut self.directory, idx, needed_end) {
                warn!("write(fd={fd}) could not grow file to {needed_end} bytes: {e}");
            }
        }

        let record = self.directory.record(idx);
        let available = record.size.saturating_sub(offset) as usize;
        let to_write = data.len().min(available);
        if to_write == 0 {
            return Ok(0);
        }

        self.transfer_write(record.start_block, offset as usize, &data[..to_write])
    }

    /// Reads up to `buf.len()` bytes from the file referenced by `fd`
    /// starting at `offset`. Returns the number of bytes actually read; `0`
    /// on an invalid descriptor, an offset at or past the end of file, or a
    /// zero-length buffer.
    pub fn read(&mut self, fd: u32, buf: &mut [u8], offset: u32) -> u32 {
        match self.try_read(fd, buf, offset) {
            Ok(n) => n as u32,
            Err(e) => {
                warn!("read(fd={fd}) failed: {e}");
                0
            }
        }
    }

    fn try_read(&mut self, fd: u32, buf: &mut [u8], offset: u32) -> Result<usize, FsError> {
        let idx = self.open_record_index(fd)?;
        let record = self.directory.record(idx);
        if offset >= record.size {
            return Err(FsError::OffsetBeyondEnd);
        }

        let available = (record.size - offset) as usize;
        let to_read = buf.len().min(available);
        if to_read == 0 {
            return Ok(0);
        }

        self.transfer_read(record.start_block, offset as usize, &mut buf[..to_read])
    }

    /// Closes `fd`. Returns `0` on success, `INVALID` if `fd` wasn't open.
    pub fn close(&mut self, fd: u32) -> i32 {
        match self.try_close(fd) {
            Ok(()) => 0,
            Err(e) => {
                warn!("close(fd={fd}) failed: {e}");
                e.code()
            }
        }
    }

    fn try_close(&mut self, fd: u32) -> Result<(), FsError> {
        let idx = self.file_table.lookup(fd).ok_or(FsError::InvalidDescriptor(fd))?;
        self.file_table.release(fd)?;
        self.directory.set_opened(idx, false);
        Ok(())
    }

    /// Flushes the directory to the device. The reference system this is
    /// modeled on flushes on every directory mutation already, so shutdown
    /// has nothing left to do beyond one last flush for safety.
    pub fn shutdown(&mut self) -> Result<(), FsError> {
        self.directory.flush(&mut self.block_io)
    }

    fn open_record_index(&self, fd: u32) -> Result<usize, FsError> {
        self.file_table.lookup(fd).ok_or(FsError::InvalidDescriptor(fd))
    }

    fn transfer_write(&mut self, start_block: u32, offset: usize, data: &[u8]) -> Result<usize, FsError> {
        let mut block_num = start_block + (offset / BLOCK_SIZE) as u32;
        let mut block_offset = offset % BLOCK_SIZE;
        let mut written = 0usize;
        let mut remaining = data.len();

        while remaining > 0 {
            let chunk_len = remaining.min(BLOCK_SIZE - block_offset);
            let chunk = &data[written..written + chunk_len];
            let n = self.block_io.write_to_block(block_num, block_offset, chunk)?;
            written += n;
            if n != chunk_len {
                break;
            }
            remaining -= chunk_len;
            block_num += 1;
            block_offset = 0;
        }
        Ok(written)
    }

    fn transfer_read(&mut self, start_block: u32, offset: usize, buf: &mut [u8]) -> Result<usize, FsError> {
        let mut block_num = start_block + (offset / BLOCK_SIZE) as u32;
        let mut block_offset = offset % BLOCK_SIZE;
        let mut read = 0usize;
        let mut remaining = buf.len();

        while remaining > 0 {
            let chunk_len = remaining.min(BLOCK_SIZE - block_offset);
            let n = self.block_io.read_from_block(block_num, block_offset, &mut buf[read..read + chunk_len])?;
            read += n;
            if n != chunk_len {
                break;
            }
            remaining -= chunk_len;
            block_num += 1;
            block_offset = 0;
        }
        Ok(read)
    }
}
