//! Directories: fixed-size entries stored as ordinary file data, addressed
//! through the same block-indirection engine as regular files.

use crate::error::{Error, Result};
use crate::fs::FileSystem;
use crate::inode::{FLAG_ALLOCATED, FLAG_DIR, FLAG_EXEC, FLAG_READ, FLAG_WRITE, Inode};
use crate::layout::BLOCK_SIZE;

/// Maximum length of a directory entry's name, not counting a NUL terminator.
pub const NAME_MAX: usize = 28;
/// On-disk size of one directory entry.
pub const DIRENT_SIZE: usize = 32;

/// A directory entry: an inode number plus a fixed-width name. `inode == 0`
/// marks a tombstone left behind by a deletion; such slots are never reused.
#[repr(C, packed)]
#[derive(Clone, Copy)]
pub struct DirEntry {
    pub inode: u32,
    pub name: [u8; NAME_MAX],
}

impl DirEntry {
    pub fn new(inode: u32, name: &str) -> Self {
        let mut buf = [0u8; NAME_MAX];
        let bytes = name.as_bytes();
        let len = bytes.len().min(NAME_MAX);
        buf[..len].copy_from_slice(&bytes[..len]);
        Self { inode, name: buf }
    }

    pub fn name_str(&self) -> String {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(NAME_MAX);
        String::from_utf8_lossy(&self.name[..end]).into_owned()
    }

    pub(crate) fn from_bytes(buf: &[u8; DIRENT_SIZE]) -> Self {
        let inode = u32::from_ne_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let mut name = [0u8; NAME_MAX];
        name.copy_from_slice(&buf[4..4 + NAME_MAX]);
        Self { inode, name }
    }

    pub(crate) fn to_bytes(self) -> [u8; DIRENT_SIZE] {
        let mut buf = [0u8; DIRENT_SIZE];
        buf[0..4].copy_from_slice(&self.inode.to_ne_bytes());
        buf[4..4 + NAME_MAX].copy_from_slice(&self.name);
        buf
    }
}

const _: () = assert!(DIRENT_SIZE == 4 + NAME_MAX);

/// One live listing row: name, inode number, whether it is a directory, and
/// its logical size in bytes.
pub struct DirListing {
    pub name: String,
    pub inode: u32,
    pub is_dir: bool,
    pub size: u32,
}

impl FileSystem {
    /// Lists the live (non-tombstoned) entries of directory `dir_ino`.
    pub fn list(&mut self, dir_ino: u32) -> Result<Vec<DirListing>> {
        let dir_inode = self.read_inode(dir_ino)?;
        let size = dir_inode.size();
        let mut out = Vec::new();
        let mut offset = 0u32;
        while offset < size {
            let block = self.block_for_offset(dir_ino, offset)?;
            if block == 0 {
                break;
            }
            let mut buf = [0u8; DIRENT_SIZE];
            self.device
                .read_at(block, (offset % BLOCK_SIZE as u32) as usize, &mut buf)?;
            let entry = DirEntry::from_bytes(&buf);
            if entry.inode != 0 {
                let child = self.read_inode(entry.inode)?;
                out.push(DirListing {
                    name: entry.name_str(),
                    inode: entry.inode,
                    is_dir: child.is_dir(),
                    size: child.size(),
                });
            }
            offset += DIRENT_SIZE as u32;
        }
        Ok(out)
    }

    /// Looks up `name` in `dir_ino`; the first matching live entry wins.
    pub fn lookup(&mut self, dir_ino: u32, name: &str) -> Result<Option<u32>> {
        Ok(self
            .list(dir_ino)?
            .into_iter()
            .find(|e| e.name == name)
            .map(|e| e.inode))
    }

    /// Appends a new entry to `dir_ino`, growing the directory by one
    /// 32-byte slot. Directory size stays a multiple of 32 by construction.
    pub fn insert_entry(&mut self, dir_ino: u32, name: &str, ino: u32) -> Result<()> {
        let mut dir_inode = self.read_inode(dir_ino)?;
        let offset = dir_inode.size();
        let mut block = self.block_for_offset(dir_ino, offset)?;
        if block == 0 {
            block = self.alloc_block()?;
            self.append_block(dir_ino, block)?;
        }
        let entry = DirEntry::new(ino, name);
        self.device
            .write_at(block, (offset % BLOCK_SIZE as u32) as usize, &entry.to_bytes())?;
        dir_inode.set_size(offset + DIRENT_SIZE as u32);
        self.write_inode(dir_ino, &dir_inode)?;
        Ok(())
    }

    /// Rewrites the first live entry pointing at `target_ino` as a
    /// tombstone. A no-op if no such entry exists.
    pub fn unlink_entry(&mut self, dir_ino: u32, target_ino: u32) -> Result<()> {
        let dir_inode = self.read_inode(dir_ino)?;
        let size = dir_inode.size();
        let mut offset = 0u32;
        while offset < size {
            let block = self.block_for_offset(dir_ino, offset)?;
            if block == 0 {
                break;
            }
            let within = (offset % BLOCK_SIZE as u32) as usize;
            let mut buf = [0u8; DIRENT_SIZE];
            self.device.read_at(block, within, &mut buf)?;
            let entry = DirEntry::from_bytes(&buf);
            if entry.inode == target_ino {
                let tomb = DirEntry { inode: 0, name: entry.name };
                self.device.write_at(block, within, &tomb.to_bytes())?;
                return Ok(());
            }
            offset += DIRENT_SIZE as u32;
        }
        Ok(())
    }

    /// Creates a new, empty directory named `name` inside `parent_ino`,
    /// seeded with `.` and `..` entries, and links it into the parent.
    pub fn make_dir(&mut self, parent_ino: u32, name: &str) -> Result<u32> {
        let new_ino = self.alloc_inode()?;
        let block = self.alloc_block()?;
        let mut buf = [0u8; BLOCK_SIZE];
        buf[0..DIRENT_SIZE].copy_from_slice(&DirEntry::new(new_ino, ".").to_bytes());
        buf[DIRENT_SIZE..2 * DIRENT_SIZE]
            .copy_from_slice(&DirEntry::new(parent_ino, "..").to_bytes());
        self.device.write_block(block, &buf)?;

        let mut inode = Inode::default();
        inode.flags |= FLAG_ALLOCATED | FLAG_DIR | FLAG_READ | FLAG_WRITE | FLAG_EXEC;
        inode.nlinks = 1;
        inode.addr[0] = block;
        inode.set_size(2 * DIRENT_SIZE as u32);
        let now = self.timestamp();
        inode.acttime = now;
        inode.modtime = now;
        self.write_inode(new_ino, &inode)?;

        self.insert_entry(parent_ino, name, new_ino)?;
        Ok(new_ino)
    }

    /// Frees a plain file's storage and returns its inode to the cache.
    pub fn remove_file(&mut self, ino: u32) -> Result<()> {
        self.truncate_and_free(ino)?;
        let mut inode = self.read_inode(ino)?;
        inode.flags = 0;
        self.write_inode(ino, &inode)?;
        self.free_inode(ino);
        Ok(())
    }

    /// Recursively removes directory `ino`: every child file is unlinked
    /// and freed, every child subdirectory is removed the same way, then
    /// this directory unlinks itself from its own parent (recovered via its
    /// `..` entry, never passed down by the caller) and frees its own
    /// storage and inode.
    pub fn remove_tree(&mut self, ino: u32) -> Result<()> {
        let entries = self.list(ino)?;
        let mut parent_ino = ino;
        for entry in entries {
            match entry.name.as_str() {
                "." => continue,
                ".." => parent_ino = entry.inode,
                _ => {
                    if entry.is_dir {
                        self.remove_tree(entry.inode)?;
                    } else {
                        self.unlink_entry(ino, entry.inode)?;
                        self.remove_file(entry.inode)?;
                    }
                }
            }
        }
        self.unlink_entry(parent_ino, ino)?;
        self.remove_file(ino)?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fs::FileSystem;
    use std::env;
    use std::fs;

    fn temp_path(name: &str) -> std::path::PathBuf {
        let mut p = env::temp_dir();
        p.push(format!("v6fs-dirent-test-{name}-{}", std::process::id()));
        p
    }

    #[test]
    fn root_has_dot_and_dotdot() {
        let path = temp_path("root-dots");
        let mut fs = FileSystem::format(&path, 64, 16).unwrap();
        let entries = fs.list(crate::layout::ROOT_INODE).unwrap();
        assert!(entries.iter().any(|e| e.name == "."));
        assert!(entries.iter().any(|e| e.name == ".."));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn make_dir_then_lookup() {
        let path = temp_path("mkdir-lookup");
        let mut fs = FileSystem::format(&path, 64, 16).unwrap();
        let child = fs.make_dir(crate::layout::ROOT_INODE, "sub").unwrap();
        let found = fs.lookup(crate::layout::ROOT_INODE, "sub").unwrap();
        assert_eq!(found, Some(child));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn unlink_then_lookup_misses() {
        let path = temp_path("unlink-miss");
        let mut fs = FileSystem::format(&path, 64, 16).unwrap();
        let child = fs.make_dir(crate::layout::ROOT_INODE, "sub").unwrap();
        fs.unlink_entry(crate::layout::ROOT_INODE, child).unwrap();
        let found = fs.lookup(crate::layout::ROOT_INODE, "sub").unwrap();
        assert_eq!(found, None);
        let _ = fs::remove_file(&path);
    }
}
