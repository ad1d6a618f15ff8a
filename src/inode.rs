//! Inodes and the block-indirection engine that maps a file's logical
//! block index to a physical block number.

use crate::error::{Error, Result};
use crate::fs::FileSystem;
use crate::layout::{PTRS_PER_INDIRECT, inode_offset};
use std::mem::{self, size_of};
use std::slice;

/// Inode is allocated (in use).
pub const FLAG_ALLOCATED: u16 = 1 << 15;
/// Inode denotes a directory rather than a plain file.
pub const FLAG_DIR: u16 = 1 << 14;
/// Inode uses the large-file (indirect) addressing scheme.
pub const FLAG_LARGE: u16 = 1 << 12;
/// Owner read permission.
pub const FLAG_READ: u16 = 1 << 8;
/// Owner write permission.
pub const FLAG_WRITE: u16 = 1 << 7;
/// Owner execute permission.
pub const FLAG_EXEC: u16 = 1 << 6;

/// Number of address slots in an inode: 10 direct/single-indirect slots
/// plus one triple-indirect slot.
const NADDR: usize = 11;
/// Index of the triple-indirect slot within `addr` once an inode is large.
const TRIPLE_INDIRECT_SLOT: usize = 10;
/// Number of direct block pointers a small (non-large) file may hold.
const SMALL_MAX_BLOCKS: usize = NADDR;
/// Number of `addr` slots used for single-indirect blocks once a file is large.
const SINGLE_INDIRECT_SLOTS: usize = 10;
/// Logical block count addressable through the 10 single-indirect slots.
const LARGE_SINGLE_CAPACITY: usize = SINGLE_INDIRECT_SLOTS * PTRS_PER_INDIRECT;

/// The on-disk inode. 61 live bytes, padded out to a 64-byte disk slot by
/// the caller.
#[repr(C, packed)]
#[derive(Clone, Copy)]
pub struct Inode {
    pub flags: u16,
    pub nlinks: u8,
    pub uid: u8,
    pub gid: u8,
    pub size0: u16,
    pub size1: u16,
    pub addr: [u32; NADDR],
    pub acttime: [u16; 2],
    pub modtime: [u16; 2],
}

impl Default for Inode {
    fn default() -> Self {
        unsafe { mem::zeroed() }
    }
}

impl Inode {
    pub fn is_allocated(&self) -> bool {
        self.flags & FLAG_ALLOCATED != 0
    }

    pub fn is_dir(&self) -> bool {
        self.flags & FLAG_DIR != 0
    }

    pub fn is_large(&self) -> bool {
        self.flags & FLAG_LARGE != 0
    }

    /// File size in bytes, reassembled from the split `size0`/`size1` fields.
    pub fn size(&self) -> u32 {
        ((self.size0 as u32) << 16) | self.size1 as u32
    }

    pub fn set_size(&mut self, size: u32) {
        self.size0 = (size >> 16) as u16;
        self.size1 = (size & 0xffff) as u16;
    }
}

/// A 1024-byte block of 256 `u32` block pointers, used for both single- and
/// multi-level indirect addressing.
pub type IndirectBlock = [u32; PTRS_PER_INDIRECT];

impl FileSystem {
    /// Reads inode `ino` from the inode table.
    pub fn read_inode(&mut self, ino: u32) -> Result<Inode> {
        let mut inode: Inode = unsafe { mem::zeroed() };
        let slice = unsafe {
            slice::from_raw_parts_mut(&mut inode as *mut _ as *mut u8, size_of::<Inode>())
        };
        self.device.read_raw(inode_offset(ino), slice)?;
        Ok(inode)
    }

    /// Writes inode `ino` back to the inode table.
    pub fn write_inode(&mut self, ino: u32, inode: &Inode) -> Result<()> {
        let slice = unsafe {
            slice::from_raw_parts(inode as *const _ as *const u8, size_of::<Inode>())
        };
        self.device.write_raw(inode_offset(ino), slice)?;
        Ok(())
    }

    fn read_indirect(&mut self, block_no: u32) -> Result<IndirectBlock> {
        let mut buf = [0u8; crate::layout::BLOCK_SIZE];
        self.device.read_block(block_no, &mut buf)?;
        let mut ptrs: IndirectBlock = [0; PTRS_PER_INDIRECT];
        for (i, chunk) in buf.chunks_exact(4).enumerate() {
            ptrs[i] = u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Ok(ptrs)
    }

    fn write_indirect(&mut self, block_no: u32, ptrs: &IndirectBlock) -> Result<()> {
        let mut buf = [0u8; crate::layout::BLOCK_SIZE];
        for (i, ptr) in ptrs.iter().enumerate() {
            buf[i * 4..i * 4 + 4].copy_from_slice(&ptr.to_ne_bytes());
        }
        self.device.write_block(block_no, &buf)?;
        Ok(())
    }

    /// Returns the physical block number backing the block that contains
    /// `byte_offset` in `ino`'s data, or `0` if no block is allocated there
    /// (a hole, or an offset past the end of the addressed range).
    pub fn block_for_offset(&mut self, ino: u32, byte_offset: u32) -> Result<u32> {
        let inode = self.read_inode(ino)?;
        let logical = (byte_offset / crate::layout::BLOCK_SIZE as u32) as usize;
        if !inode.is_large() {
            if logical >= SMALL_MAX_BLOCKS {
                return Ok(0);
            }
            return Ok(inode.addr[logical]);
        }
        if logical < LARGE_SINGLE_CAPACITY {
            let slot = logical / PTRS_PER_INDIRECT;
            let idx = logical % PTRS_PER_INDIRECT;
            let indirect = inode.addr[slot];
            if indirect == 0 {
                return Ok(0);
            }
            let ptrs = self.read_indirect(indirect)?;
            return Ok(ptrs[idx]);
        }
        let root = inode.addr[TRIPLE_INDIRECT_SLOT];
        if root == 0 {
            return Ok(0);
        }
        let r = logical - LARGE_SINGLE_CAPACITY;
        let l1 = r / (PTRS_PER_INDIRECT * PTRS_PER_INDIRECT);
        let l2 = (r / PTRS_PER_INDIRECT) % PTRS_PER_INDIRECT;
        let l3 = r % PTRS_PER_INDIRECT;
        if l1 >= PTRS_PER_INDIRECT {
            return Ok(0);
        }
        let lvl1 = self.read_indirect(root)?;
        let b2 = lvl1[l1];
        if b2 == 0 {
            return Ok(0);
        }
        let lvl2 = self.read_indirect(b2)?;
        let b3 = lvl2[l2];
        if b3 == 0 {
            return Ok(0);
        }
        let lvl3 = self.read_indirect(b3)?;
        Ok(lvl3[l3])
    }

    /// Appends `block_no` as the next logical data block of `ino`,
    /// allocating and wiring up any indirect blocks needed along the way,
    /// promoting the inode from small to large addressing if this is the
    /// 12th block.
    pub fn append_block(&mut self, ino: u32, block_no: u32) -> Result<()> {
        let mut inode = self.read_inode(ino)?;
        let logical = (inode.size() / crate::layout::BLOCK_SIZE as u32) as usize;
        if !inode.is_large() {
            if logical < SMALL_MAX_BLOCKS {
                inode.addr[logical] = block_no;
                self.write_inode(ino, &inode)?;
                return Ok(());
            }
            // Promote: move the 11 direct pointers into a freshly allocated
            // single-indirect block, then fall through to the large path.
            let indirect_no = self.alloc_block()?;
            let mut ptrs: IndirectBlock = [0; PTRS_PER_INDIRECT];
            ptrs[..SMALL_MAX_BLOCKS].copy_from_slice(&inode.addr[..SMALL_MAX_BLOCKS]);
            self.write_indirect(indirect_no, &ptrs)?;
            inode.addr = [0; NADDR];
            inode.addr[0] = indirect_no;
            inode.flags |= FLAG_LARGE;
            self.write_inode(ino, &inode)?;
        }

        let mut inode = self.read_inode(ino)?;
        if logical < LARGE_SINGLE_CAPACITY {
            let slot = logical / PTRS_PER_INDIRECT;
            let idx = logical % PTRS_PER_INDIRECT;
            if inode.addr[slot] == 0 {
                let new_indirect = self.alloc_block()?;
                self.write_indirect(new_indirect, &[0; PTRS_PER_INDIRECT])?;
                inode.addr[slot] = new_indirect;
                self.write_inode(ino, &inode)?;
            }
            let mut ptrs = self.read_indirect(inode.addr[slot])?;
            ptrs[idx] = block_no;
            self.write_indirect(inode.addr[slot], &ptrs)?;
            return Ok(());
        }

        if inode.addr[TRIPLE_INDIRECT_SLOT] == 0 {
            let new_root = self.alloc_block()?;
            self.write_indirect(new_root, &[0; PTRS_PER_INDIRECT])?;
            inode.addr[TRIPLE_INDIRECT_SLOT] = new_root;
            self.write_inode(ino, &inode)?;
        }
        let root = inode.addr[TRIPLE_INDIRECT_SLOT];
        let r = logical - LARGE_SINGLE_CAPACITY;
        let l1 = r / (PTRS_PER_INDIRECT * PTRS_PER_INDIRECT);
        let l2 = (r / PTRS_PER_INDIRECT) % PTRS_PER_INDIRECT;
        let l3 = r % PTRS_PER_INDIRECT;
        if l1 >= PTRS_PER_INDIRECT {
            return Err(Error::MaxFileSizeReached);
        }
        let mut lvl1 = self.read_indirect(root)?;
        if lvl1[l1] == 0 {
            let b = self.alloc_block()?;
            self.write_indirect(b, &[0; PTRS_PER_INDIRECT])?;
            lvl1[l1] = b;
            self.write_indirect(root, &lvl1)?;
        }
        let b2 = lvl1[l1];
        let mut lvl2 = self.read_indirect(b2)?;
        if lvl2[l2] == 0 {
            let b = self.alloc_block()?;
            self.write_indirect(b, &[0; PTRS_PER_INDIRECT])?;
            lvl2[l2] = b;
            self.write_indirect(b2, &lvl2)?;
        }
        let b3 = lvl2[l2];
        let mut lvl3 = self.read_indirect(b3)?;
        lvl3[l3] = block_no;
        self.write_indirect(b3, &lvl3)?;
        Ok(())
    }

    /// Returns every data block (and, for large files, every indirect
    /// block) owned by `ino` to the free list, then zeroes its size and
    /// address fields. Flags are left untouched; callers that are deleting
    /// the inode outright clear them separately.
    pub fn truncate_and_free(&mut self, ino: u32) -> Result<()> {
        let inode = self.read_inode(ino)?;
        if !inode.is_large() {
            for &b in inode.addr.iter() {
                if b != 0 {
                    self.free_block(b)?;
                }
            }
        } else {
            for i in 0..SINGLE_INDIRECT_SLOTS {
                let indirect = inode.addr[i];
                if indirect == 0 {
                    continue;
                }
                let ptrs = self.read_indirect(indirect)?;
                for &b in ptrs.iter() {
                    if b != 0 {
                        self.free_block(b)?;
                    }
                }
                self.free_block(indirect)?;
            }
            let root = inode.addr[TRIPLE_INDIRECT_SLOT];
            if root != 0 {
                let lvl1 = self.read_indirect(root)?;
                for &b2 in lvl1.iter() {
                    if b2 == 0 {
                        continue;
                    }
                    let lvl2 = self.read_indirect(b2)?;
                    for &b3 in lvl2.iter() {
                        if b3 == 0 {
                            continue;
                        }
                        let lvl3 = self.read_indirect(b3)?;
                        for &leaf in lvl3.iter() {
                            if leaf != 0 {
                                self.free_block(leaf)?;
                            }
                        }
                        self.free_block(b3)?;
                    }
                    self.free_block(b2)?;
                }
                self.free_block(root)?;
            }
        }
        let mut inode = inode;
        inode.addr = [0; NADDR];
        inode.set_size(0);
        self.write_inode(ino, &inode)?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn size_split_roundtrip() {
        let mut inode = Inode::default();
        inode.set_size(0x0001_2345);
        assert_eq!(inode.size(), 0x0001_2345);
    }

    #[test]
    fn flags_predicates() {
        let mut inode = Inode::default();
        assert!(!inode.is_allocated());
        inode.flags |= FLAG_ALLOCATED | FLAG_DIR;
        assert!(inode.is_allocated());
        assert!(inode.is_dir());
        assert!(!inode.is_large());
    }

    #[test]
    fn inode_disk_size_fits_stride() {
        assert!(size_of::<Inode>() <= crate::layout::INODE_DISK_SIZE as usize);
    }
}
