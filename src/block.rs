//! The block device: a flat host file addressed in fixed-size blocks.

use crate::layout::{BLOCK_SIZE, block_offset};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// A host file backing a v6 image, addressed in [`BLOCK_SIZE`]-byte blocks.
///
/// Bounds on `n` are a programmer responsibility: every caller already knows
/// `fsize` (from the mounted superblock) before issuing a read or write, the
/// same way the on-disk struct helpers elsewhere in this crate trust their
/// caller rather than re-validating.
pub struct BlockDevice {
    file: File,
    /// Total number of blocks the backing file is sized for.
    fsize: u32,
}

impl BlockDevice {
    /// Opens an existing image file for reading and writing.
    pub fn open(path: &Path, fsize: u32) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Self { file, fsize })
    }

    /// Creates a fresh image file of exactly `fsize` blocks, zero-filled.
    pub fn create(path: &Path, fsize: u32) -> io::Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(fsize as u64 * BLOCK_SIZE as u64)?;
        Ok(Self { file, fsize })
    }

    /// Number of blocks in the image.
    pub fn fsize(&self) -> u32 {
        self.fsize
    }

    /// Updates the known block count, used once the superblock has been
    /// read back and the true `fsize` is known.
    pub fn set_fsize(&mut self, fsize: u32) {
        self.fsize = fsize;
    }

    /// Reads block `n` in full.
    pub fn read_block(&mut self, n: u32, buf: &mut [u8; BLOCK_SIZE]) -> io::Result<()> {
        debug_assert!(n < self.fsize);
        self.file.seek(SeekFrom::Start(block_offset(n)))?;
        self.file.read_exact(buf)
    }

    /// Writes block `n` in full.
    pub fn write_block(&mut self, n: u32, buf: &[u8; BLOCK_SIZE]) -> io::Result<()> {
        debug_assert!(n < self.fsize);
        self.file.seek(SeekFrom::Start(block_offset(n)))?;
        self.file.write_all(buf)
    }

    /// Reads `buf.len()` bytes starting at byte `within` inside block `n`.
    pub fn read_at(&mut self, n: u32, within: usize, buf: &mut [u8]) -> io::Result<()> {
        debug_assert!(n < self.fsize);
        debug_assert!(within + buf.len() <= BLOCK_SIZE);
        self.file
            .seek(SeekFrom::Start(block_offset(n) + within as u64))?;
        self.file.read_exact(buf)
    }

    /// Writes `buf` starting at byte `within` inside block `n`.
    pub fn write_at(&mut self, n: u32, within: usize, buf: &[u8]) -> io::Result<()> {
        debug_assert!(n < self.fsize);
        debug_assert!(within + buf.len() <= BLOCK_SIZE);
        self.file
            .seek(SeekFrom::Start(block_offset(n) + within as u64))?;
        self.file.write_all(buf)
    }

    /// Generic byte-range read/write at an arbitrary absolute offset, used
    /// by the on-disk struct helpers (superblock, inode) that live outside
    /// the block-indexed address space.
    pub fn read_raw(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buf)
    }

    pub fn write_raw(&mut self, offset: u64, buf: &[u8]) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(buf)
    }
}
