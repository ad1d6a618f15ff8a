//! The superblock: free-list cache, free-inode cache, and the handful of
//! bookkeeping fields that describe the image as a whole.

use crate::block::BlockDevice;
use crate::layout::{BLOCK_SIZE, SUPERBLOCK_BLOCK, block_offset};
use std::mem::{self, size_of};
use std::slice;

/// Capacity of the in-core free block cache.
pub const NFREE: usize = 150;
/// Capacity of the in-core free inode cache.
pub const NINODE: usize = 100;

/// The on-disk superblock, written and read as a flat byte blob.
#[repr(C, packed)]
pub struct Superblock {
    /// Number of blocks occupied by the inode table.
    pub isize_: u32,
    /// Total number of blocks in the image, including the boot/superblock/inode blocks.
    pub fsize_: u32,
    /// Number of valid entries in `free`.
    pub nfree: u32,
    /// Cached free block numbers; `free[nfree - 1]` is the next block handed out.
    pub free: [u32; NFREE],
    /// Number of valid entries in `inode`.
    pub ninode: u32,
    /// Cached free inode numbers; `inode[ninode - 1]` is the next inode handed out.
    pub inode: [u32; NINODE],
    /// Reserved; free block list lock. Unused by this single-threaded implementation.
    pub flock: u8,
    /// Reserved; free inode list lock. Unused by this single-threaded implementation.
    pub ilock: u8,
    /// Set whenever in-core state diverges from the on-disk image; cleared on flush.
    pub fmod: u8,
    /// Last-modified timestamp, low/high halves.
    pub time: [u16; 2],
}

impl Superblock {
    /// Reads the superblock from block [`SUPERBLOCK_BLOCK`].
    pub fn read(dev: &mut BlockDevice) -> std::io::Result<Self> {
        let mut sb: Self = unsafe { mem::zeroed() };
        let slice = unsafe {
            slice::from_raw_parts_mut(&mut sb as *mut _ as *mut u8, size_of::<Self>())
        };
        dev.read_raw(block_offset(SUPERBLOCK_BLOCK), slice)?;
        Ok(sb)
    }

    /// Writes the superblock to block [`SUPERBLOCK_BLOCK`].
    pub fn write(&self, dev: &mut BlockDevice) -> std::io::Result<()> {
        let slice =
            unsafe { slice::from_raw_parts(self as *const _ as *const u8, size_of::<Self>()) };
        dev.write_raw(block_offset(SUPERBLOCK_BLOCK), slice)
    }
}

const _: () = assert!(size_of::<Superblock>() <= BLOCK_SIZE);
