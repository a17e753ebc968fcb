//! Contiguous block allocation.
//!
//! There is no free list. A file's data lives in one contiguous run of
//! blocks; growing a file either extends that run in place (if nothing else
//! starts within the blocks it would grow into) or abandons it and claims a
//! fresh run past the highest block any file currently reaches.

use log::debug;

use crate::block_io::BlockIo;
use crate::device::BlockDevice;
use crate::directory::{Directory, FileRecord};
use crate::error::FsError;
use crate::{BLOCK_SIZE, DIR_BLOCKS};

pub struct Allocator {
    partition_blocks: u32,
}

impl Allocator {
    pub fn new(partition_blocks: u32) -> Self {
        Self { partition_blocks }
    }

    /// Grows `directory.records()[idx]` so its file can hold `new_size`
    /// bytes, allocating blocks if the existing extent isn't big enough,
    /// then persists the updated record.
    ///
    /// If allocation succeeds but the directory update or flush fails, the
    /// record in `directory` is left untouched: the already-zeroed blocks
    /// written during allocation become unreferenced but harmless, rather
    /// than leaving the file's recorded extent out of sync with what was
    /// actually claimed.
    pub fn expand_to<D: BlockDevice>(
        &self,
        io: &mut BlockIo<D>,
        directory: &mut Directory,
        idx: usize,
        new_size: u32,
    ) -> Result<(), FsError> {
        let mut record = directory.record(idx);
        if new_size <= record.size {
            return Ok(());
        }

        let capacity = record.num_blocks as u64 * BLOCK_SIZE as u64;
        if (new_size as u64) > capacity {
            let needed_bytes = new_size as u64 - record.size as u64;
            let leftover_in_last_block = if record.num_blocks == 0 {
                0
            } else {
                capacity - record.size as u64
            };
            if leftover_in_last_block < needed_bytes {
                let still_needed = needed_bytes - leftover_in_last_block;
                let needed_blocks = ((still_needed + BLOCK_SIZE as u64 - 1) / BLOCK_SIZE as u64) as u32;
                let others = directory.other_records(idx);
                if record.num_blocks == 0 {
                    self.allocate_empty(io, &others, &mut record, needed_blocks)?;
                } else {
                    self.expand_existing(io, &others, &mut record, needed_blocks)?;
                }
            }
        }

        record.size = new_size;
        directory.update_record(&record)?;
        directory.flush(io)?;
        directory.set_record(idx, record);
        Ok(())
    }

    /// Claims `needed_blocks` fresh blocks past the highest block any other
    /// file currently occupies, zero-filling them.
    fn allocate_empty<D: BlockDevice>(
        &self,
        io: &mut BlockIo<D>,
        others: &[FileRecord],
        record: &mut FileRecord,
        needed_blocks: u32,
    ) -> Result<(), FsError> {
        let mut start_block = DIR_BLOCKS;
        for other in others {
            let end = other.start_block + other.num_blocks;
            if end > start_block {
                start_block = end;
            }
        }

        if start_block + needed_blocks >= self.partition_blocks {
            return Err(FsError::NoSpace);
        }

        debug!("allocating {needed_blocks} fresh blocks at {start_block} for {:?}", record.filename);
        io.write_blocks(start_block, needed_blocks, &vec![0u8; needed_blocks as usize * BLOCK_SIZE])?;
        record.start_block = start_block;
        record.num_blocks = needed_blocks;
        Ok(())
    }

    /// Extends `record`'s existing extent by `needed_blocks`, provided no
    /// other file's extent starts inside the blocks it would grow into.
    fn expand_existing<D: BlockDevice>(
        &self,
        io: &mut BlockIo<D>,
        others: &[FileRecord],
        record: &mut FileRecord,
        needed_blocks: u32,
    ) -> Result<(), FsError> {
        let tail_start = record.start_block + record.num_blocks;
        let tail_end = tail_start + needed_blocks;

        for other in others {
            if other.start_block >= tail_start && other.start_block < tail_end {
                return Err(FsError::NoSpace);
            }
        }
        if tail_end >= self.partition_blocks {
            return Err(FsError::NoSpace);
        }

        debug!("extending {:?} by {needed_blocks} blocks at {tail_start}", record.filename);
        io.write_blocks(tail_start, needed_blocks, &vec![0u8; needed_blocks as usize * BLOCK_SIZE])?;
        record.num_blocks += needed_blocks;
        Ok(())
    }
}
