//! Whole-block and partial-block transfer helpers sitting on top of a
//! [`BlockDevice`].

use log::trace;

use crate::device::BlockDevice;
use crate::error::FsError;
use crate::BLOCK_SIZE;

/// Wraps a [`BlockDevice`] with the read/write helpers every higher layer
/// (directory, allocator, file data path) is built on.
pub struct BlockIo<D> {
    device: D,
}

impl<D: BlockDevice> BlockIo<D> {
    pub fn new(device: D) -> Self {
        Self { device }
    }

    pub fn into_device(self) -> D {
        self.device
    }

    /// Reads `count` whole blocks starting at `start`. A block that was
    /// never written is materialized as zeros and that zero block is
    /// persisted back to the device, so the next read of the same block
    /// finds real content instead of hitting the "no content" path again.
    pub fn read_blocks(&mut self, start: u32, count: u32) -> Result<Vec<u8>, FsError> {
        let mut out = Vec::with_capacity(count as usize * BLOCK_SIZE);
        for i in 0..count {
            let index = start + i;
            let block = match self.device.read_block(index)? {
                Some(block) if block.len() == BLOCK_SIZE => block,
                Some(short) => {
                    return Err(FsError::ShortTransfer {
                        block: index,
                        expected: BLOCK_SIZE,
                        actual: short.len(),
                    })
                }
                None => {
                    trace!("block {index} has no content yet, zero-filling");
                    let zero = vec![0u8; BLOCK_SIZE];
                    let written = self.device.write_block(index, &zero)?;
                    if written != BLOCK_SIZE {
                        return Err(FsError::ShortTransfer {
                            block: index,
                            expected: BLOCK_SIZE,
                            actual: written,
                        });
                    }
                    zero
                }
            };
            out.extend_from_slice(&block);
        }
        Ok(out)
    }

    /// Writes `count` whole blocks starting at `start` from `data` (which
    /// must hold exactly `count * BLOCK_SIZE` bytes). Returns the number of
    /// bytes actually transferred; stops at the first short write.
    pub fn write_blocks(&mut self, start: u32, count: u32, data: &[u8]) -> Result<usize, FsError> {
        debug_assert_eq!(data.len(), count as usize * BLOCK_SIZE);
        let mut written = 0usize;
        for i in 0..count {
            let index = start + i;
            let chunk = &data[i as usize * BLOCK_SIZE..(i as usize + 1) * BLOCK_SIZE];
            let n = self.device.write_block(index, chunk)?;
            written += n;
            if n != BLOCK_SIZE {
                break;
            }
        }
        Ok(written)
    }

    /// Reads `buf.len()` bytes from `block` starting at `offset`. Fails with
    /// `Ok(0)` (not an error) if `offset + buf.len()` overruns the block, or
    /// if the underlying whole-block read came back short.
    pub fn read_from_block(&mut self, block: u32, offset: usize, buf: &mut [u8]) -> Result<usize, FsError> {
        let len = buf.len();
        if offset + len > BLOCK_SIZE {
            return Ok(0);
        }
        let data = self.read_blocks(block, 1)?;
        if data.len() != BLOCK_SIZE {
            return Ok(0);
        }
        buf.copy_from_slice(&data[offset..offset + len]);
        Ok(len)
    }

    /// Writes `data` into `block` at `offset` via read-modify-write, unless
    /// `data` spans the whole block, in which case the read is skipped.
    /// Fails with `Ok(0)` if `offset + data.len()` overruns the block.
    ///
    /// Mirrors the reference device's return convention: the result is
    /// `data.len()` on a full success, otherwise however many bytes the
    /// underlying block write reported, even if that count doesn't line up
    /// with the requested offset window.
    pub fn write_to_block(&mut self, block: u32, offset: usize, data: &[u8]) -> Result<usize, FsError> {
        if offset + data.len() > BLOCK_SIZE {
            return Ok(0);
        }
        let mut scratch = if offset == 0 && data.len() == BLOCK_SIZE {
            vec![0u8; BLOCK_SIZE]
        } else {
            self.read_blocks(block, 1)?
        };
        scratch[offset..offset + data.len()].copy_from_slice(data);
        let n = self.device.write_block(block, &scratch)?;
        Ok(n.min(data.len()))
    }
}
