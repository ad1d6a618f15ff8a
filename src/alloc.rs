//! Free block and free inode allocators. Both operate on the in-core
//! superblock cache first, refilling it from the image only when it runs
//! dry.

use crate::error::{Error, Result};
use crate::fs::FileSystem;
use crate::layout::{BLOCK_SIZE, INODE_TABLE_BLOCK};
use crate::superblock::NINODE;

impl FileSystem {
    /// Hands out the block at the top of the free list, refilling the
    /// cache from the link block it points to when it would otherwise
    /// become empty.
    pub fn alloc_block(&mut self) -> Result<u32> {
        if self.sb.nfree == 0 {
            return Err(Error::OutOfBlocks);
        }
        self.sb.nfree -= 1;
        let block_no = self.sb.free[self.sb.nfree as usize];
        if block_no == 0 {
            self.sb.nfree += 1;
            return Err(Error::OutOfBlocks);
        }
        if self.sb.nfree == 0 {
            // This block doubles as a link block: its first word is the
            // count of the next batch, followed by up to 149 block numbers.
            let mut buf = [0u8; BLOCK_SIZE];
            self.device.read_block(block_no, &mut buf)?;
            let mut words = [0u32; crate::superblock::NFREE];
            for (i, w) in words.iter_mut().enumerate() {
                let off = i * 4;
                *w = u32::from_ne_bytes([
                    buf[off],
                    buf[off + 1],
                    buf[off + 2],
                    buf[off + 3],
                ]);
            }
            self.sb.nfree = words[0].min(crate::superblock::NFREE as u32);
            self.sb.free = [0; crate::superblock::NFREE];
            self.sb.free[..self.sb.nfree as usize]
                .copy_from_slice(&words[1..1 + self.sb.nfree as usize]);
        }
        self.sb.fmod = 1;
        Ok(block_no)
    }

    /// Returns `block_no` to the free list, spilling the current cache into
    /// a link block at `block_no` when the cache is full.
    pub fn free_block(&mut self, block_no: u32) -> Result<()> {
        if self.sb.nfree as usize == crate::superblock::NFREE {
            let mut buf = [0u8; BLOCK_SIZE];
            buf[0..4].copy_from_slice(&self.sb.nfree.to_ne_bytes());
            for (i, &b) in self.sb.free.iter().enumerate() {
                let off = (i + 1) * 4;
                buf[off..off + 4].copy_from_slice(&b.to_ne_bytes());
            }
            self.device.write_block(block_no, &buf)?;
            self.sb.nfree = 0;
            self.sb.free = [0; crate::superblock::NFREE];
        }
        self.sb.free[self.sb.nfree as usize] = block_no;
        self.sb.nfree += 1;
        self.sb.fmod = 1;
        Ok(())
    }

    /// Hands out the next inode from the in-core cache, rescanning the
    /// inode table to refill it when the cache runs dry.
    pub fn alloc_inode(&mut self) -> Result<u32> {
        if self.sb.ninode == 0 {
            self.refill_inode_cache()?;
        }
        if self.sb.ninode == 0 {
            return Err(Error::OutOfInodes);
        }
        self.sb.ninode -= 1;
        let ino = self.sb.inode[self.sb.ninode as usize];
        self.sb.fmod = 1;
        Ok(ino)
    }

    /// Pushes `ino` back onto the free inode cache if there is room.
    /// Matching the original v6 design, a cache that is already full simply
    /// drops the entry; the inode is still recoverable by the next table
    /// scan because its allocated bit was cleared by the caller.
    pub fn free_inode(&mut self, ino: u32) {
        if (self.sb.ninode as usize) < NINODE {
            self.sb.inode[self.sb.ninode as usize] = ino;
            self.sb.ninode += 1;
        }
        self.sb.fmod = 1;
    }

    /// Scans the inode table from inode 2 upward (inode 1 is reserved for
    /// root and is never a candidate), collecting up to [`NINODE`]
    /// unallocated inode numbers into the cache.
    fn refill_inode_cache(&mut self) -> Result<()> {
        let mut found = [0u32; NINODE];
        let mut count = 0usize;
        let mut ino = 2u32;
        while count < NINODE && ino <= self.ninodes {
            let inode = self.read_inode(ino)?;
            if !inode.is_allocated() {
                found[count] = ino;
                count += 1;
            }
            ino += 1;
        }
        self.sb.inode = found;
        self.sb.ninode = count as u32;
        Ok(())
    }
}

/// Number of blocks the inode table occupies for `ninodes` inodes.
pub fn inode_table_blocks(ninodes: u32) -> u32 {
    let bytes = ninodes as u64 * crate::layout::INODE_DISK_SIZE;
    ((bytes + BLOCK_SIZE as u64 - 1) / BLOCK_SIZE as u64) as u32
}

/// First data block available after the boot block, superblock, and inode
/// table.
pub fn first_data_block(ninodes: u32) -> u32 {
    INODE_TABLE_BLOCK + inode_table_blocks(ninodes)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fs::FileSystem;
    use std::env;
    use std::fs;

    fn temp_path(name: &str) -> std::path::PathBuf {
        let mut p = env::temp_dir();
        p.push(format!("v6fs-alloc-test-{name}-{}", std::process::id()));
        p
    }

    #[test]
    fn alloc_free_block_round_trips() {
        let path = temp_path("blockrt");
        let mut fs = FileSystem::format(&path, 64, 16).unwrap();
        let a = fs.alloc_block().unwrap();
        let b = fs.alloc_block().unwrap();
        assert_ne!(a, b);
        fs.free_block(a).unwrap();
        fs.free_block(b).unwrap();
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn alloc_inode_round_trips() {
        let path = temp_path("inodert");
        let mut fs = FileSystem::format(&path, 64, 16).unwrap();
        let before = fs.sb.ninode;
        let ino = fs.alloc_inode().unwrap();
        assert!(ino >= 1);
        let inode = fs.read_inode(ino).unwrap();
        assert!(!inode.is_allocated());
        fs.free_inode(ino);
        assert!(fs.sb.ninode <= before + 1);
        let _ = fs::remove_file(&path);
    }
}
