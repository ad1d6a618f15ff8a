//! Import (`cpin`) and export (`cpout`) between host files and the v6
//! image.

use crate::error::{Error, Result};
use crate::fs::FileSystem;
use crate::inode::{FLAG_ALLOCATED, Inode};
use crate::layout::BLOCK_SIZE;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

impl FileSystem {
    /// Copies `host_path` into the image at `v6_path`. Intermediate path
    /// components must already exist; the final component, if it already
    /// names a file, is unlinked and its storage freed before the new
    /// content is written (overwriting a directory is rejected). A failure
    /// partway through the copy leaves a partially populated inode behind;
    /// there is no rollback.
    pub fn cpin(&mut self, host_path: &Path, v6_path: &str) -> Result<()> {
        let mut host_file = File::open(host_path)?;
        let (parent_ino, name) = self.resolve_parent(v6_path)?;
        if let Some(existing) = self.lookup(parent_ino, &name)? {
            let inode = self.read_inode(existing)?;
            if inode.is_dir() {
                return Err(Error::DirectoryExists(name));
            }
            self.unlink_entry(parent_ino, existing)?;
            self.remove_file(existing)?;
        }

        let new_ino = self.alloc_inode()?;
        // The freshly allocated inode slot may still hold a prior tenant's
        // bytes; zero it out before setting any flags.
        let mut inode = Inode::default();
        inode.flags |= FLAG_ALLOCATED;
        inode.nlinks = 1;
        let now = self.timestamp();
        inode.acttime = now;
        inode.modtime = now;
        self.write_inode(new_ino, &inode)?;

        let mut size = 0u32;
        let mut buf = [0u8; BLOCK_SIZE];
        loop {
            let n = host_file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            let block_no = self.alloc_block()?;
            if n < BLOCK_SIZE {
                buf[n..].fill(0);
            }
            self.device.write_block(block_no, &buf)?;
            self.append_block(new_ino, block_no)?;
            size += n as u32;
            let mut inode = self.read_inode(new_ino)?;
            inode.set_size(size);
            self.write_inode(new_ino, &inode)?;
        }

        self.insert_entry(parent_ino, &name, new_ino)?;
        Ok(())
    }

    /// Copies the file at `v6_path` out to `host_path`, streaming block by
    /// block until the logical size is reached.
    pub fn cpout(&mut self, v6_path: &str, host_path: &Path) -> Result<()> {
        let ino = self.resolve_existing(v6_path)?;
        let inode = self.read_inode(ino)?;
        if inode.is_dir() {
            return Err(Error::NotAFile(v6_path.to_string()));
        }
        let mut host_file = File::create(host_path)?;
        let size = inode.size();
        let mut remaining = size;
        let mut offset = 0u32;
        let mut buf = [0u8; BLOCK_SIZE];
        while remaining > 0 {
            let block = self.block_for_offset(ino, offset)?;
            let to_read = remaining.min(BLOCK_SIZE as u32);
            if block == 0 {
                break;
            }
            self.device
                .read_at(block, 0, &mut buf[..to_read as usize])?;
            host_file.write_all(&buf[..to_read as usize])?;
            offset += to_read;
            remaining -= to_read;
        }
        Ok(())
    }
}
