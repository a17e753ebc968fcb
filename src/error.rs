//! Crate-wide error type.
//!
//! Every internal helper (`Directory`, `Allocator`, `BlockIo`) returns
//! `Result<T, FsError>` so the failure can be logged with context before the
//! public API collapses it down to the legacy numeric contract from the
//! reference implementation (a short byte count, `0`, or `INVALID`).

use std::io;

use thiserror::Error;

/// `INVALID` from the reference implementation's error codes.
pub const CODE_INVALID: i32 = -2;
/// `EXIST` from the reference implementation's error codes.
pub const CODE_EXIST: i32 = -5;
/// `MEMORY` from the reference implementation's error codes.
pub const CODE_MEMORY: i32 = -6;
/// `NO_SPACE` from the reference implementation's error codes.
pub const CODE_NO_SPACE: i32 = -7;

#[derive(Debug, Error)]
pub enum FsError {
    #[error("descriptor {0} is out of range or does not refer to an open file")]
    InvalidDescriptor(u32),

    #[error("file is not open")]
    NotOpen,

    #[error("no file with this name exists")]
    FileNotFound,

    #[error("a file with this name is already open")]
    AlreadyOpen,

    #[error("filename exceeds the {0}-byte limit")]
    FilenameTooLong(usize),

    #[error("offset lies beyond the end of the file")]
    OffsetBeyondEnd,

    #[error("no free file descriptor is available")]
    DescriptorTableFull,

    #[error("the directory buffer has no room left for another record")]
    DirectoryFull,

    #[error("not enough contiguous blocks are available")]
    NoSpace,

    #[error("MAX_FD must be a multiple of 8, got {0}")]
    InvalidFdTableSize(usize),

    #[error("block device I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("block device returned a short read/write for block {block}: expected {expected} bytes, got {actual}")]
    ShortTransfer {
        block: u32,
        expected: usize,
        actual: usize,
    },
}

impl FsError {
    /// Maps this error onto the reference implementation's numeric error
    /// codes, for callers that need wire compatibility with it. Errors with
    /// no equivalent reference code (I/O failures, short transfers) are
    /// reported as `INVALID`.
    pub fn code(&self) -> i32 {
        match self {
            FsError::AlreadyOpen | FsError::DescriptorTableFull => CODE_EXIST,
            FsError::DirectoryFull => CODE_MEMORY,
            FsError::NoSpace => CODE_NO_SPACE,
            FsError::InvalidDescriptor(_)
            | FsError::NotOpen
            | FsError::FileNotFound
            | FsError::FilenameTooLong(_)
            | FsError::OffsetBeyondEnd
            | FsError::InvalidFdTableSize(_)
            | FsError::Io(_)
            | FsError::ShortTransfer { .. } => CODE_INVALID,
        }
    }
}
