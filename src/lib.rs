//! A minimal contiguous-allocation file system for a single boot partition.
//!
//! The partition is a flat array of fixed-size blocks exposed through a
//! [`BlockDevice`]. The first [`DIR_BLOCKS`] blocks hold a directory of
//! filename -> extent records; every other block belongs to at most one
//! file's contiguous extent. There is no free list: blocks are only ever
//! claimed past the current high-water mark, and closing a file never
//! releases its blocks.
//!
//! See [`FileSystem`] for the entry point.

mod allocator;
mod block_io;
mod device;
mod directory;
mod error;
mod file_table;
mod fs;

pub use device::{BlockDevice, FileBlockDevice};
pub use error::{FsError, CODE_EXIST, CODE_INVALID, CODE_MEMORY, CODE_NO_SPACE};
pub use fs::{FileSystem, OpenMode};

/// Size in bytes of one block on the underlying device.
pub const BLOCK_SIZE: usize = 512;
/// Number of blocks reserved at the front of the partition for the directory.
pub const DIR_BLOCKS: u32 = 2;
/// Total capacity in bytes of the directory buffer.
pub const DIR_CAPACITY: usize = BLOCK_SIZE * DIR_BLOCKS as usize;
/// Maximum number of simultaneously open file descriptors.
pub const MAX_FD: usize = 64;
/// Longest filename (in bytes) a directory record can hold.
pub const MAX_FILENAME: usize = 256;

const DIR_SIGNATURE: [u8; 4] = *b"$%^&";
