//! The storage abstraction the rest of the crate is built on.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::BLOCK_SIZE;

/// A block-addressable storage backend.
///
/// Implementations are free to represent "this block was never written" any
/// way they like; they report it back to [`BlockIo`](crate::block_io::BlockIo)
/// as `Ok(None)` rather than an error, since a never-written block is a
/// normal, expected state for a fresh partition.
pub trait BlockDevice {
    /// Reads the block at `index`. Returns `Ok(None)` if the block has never
    /// been written. A `Some` payload is always exactly [`BLOCK_SIZE`] bytes.
    fn read_block(&mut self, index: u32) -> io::Result<Option<Vec<u8>>>;

    /// Writes `data` (exactly [`BLOCK_SIZE`] bytes) to the block at `index`,
    /// returning the number of bytes actually written.
    fn write_block(&mut self, index: u32, data: &[u8]) -> io::Result<usize>;
}

/// Reference [`BlockDevice`] backed by one file per block, named
/// `block<index>.txt`, under a base directory.
///
/// This mirrors the block-per-file storage convention of the system this
/// crate reimplements: each block is an independent file, so a block that
/// was never written is simply a file that does not exist yet.
pub struct FileBlockDevice {
    base_dir: PathBuf,
}

impl FileBlockDevice {
    /// Opens (and creates, if needed) a block device rooted at `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>) -> io::Result<Self> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    fn block_path(&self, index: u32) -> PathBuf {
        self.base_dir.join(format!("block{index}.txt"))
    }

    /// Base directory this device stores its block files under.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

impl BlockDevice for FileBlockDevice {
    fn read_block(&mut self, index: u32) -> io::Result<Option<Vec<u8>>> {
        match fs::read(self.block_path(index)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write_block(&mut self, index: u32, data: &[u8]) -> io::Result<usize> {
        debug_assert_eq!(data.len(), BLOCK_SIZE);
        fs::write(self.block_path(index), data)?;
        Ok(data.len())
    }
}
