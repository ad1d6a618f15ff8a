//! The mounted file system: the single value that owns the block device,
//! the in-core superblock, and the shell's current-directory cursor.

use crate::alloc::{first_data_block, inode_table_blocks};
use crate::block::BlockDevice;
use crate::error::{Error, Result};
use crate::inode::{FLAG_ALLOCATED, FLAG_DIR, FLAG_EXEC, FLAG_READ, FLAG_WRITE, Inode};
use crate::layout::{BLOCK_SIZE, ROOT_INODE};
use crate::path::Cursor;
use crate::superblock::{NFREE, Superblock};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// A mounted v6 image: the single piece of global mutable state the shell
/// operates on. There is a defined lifecycle (`format`/`mount` to create
/// one, `flush`/`quit` to persist and release it) rather than any ambient
/// global.
pub struct FileSystem {
    pub(crate) device: BlockDevice,
    pub(crate) sb: Superblock,
    pub(crate) ninodes: u32,
    pub(crate) cursor: Cursor,
    image_path: PathBuf,
}

impl FileSystem {
    /// Formats a brand-new image at `path`: `fsize` total blocks, `ninodes`
    /// total inode slots. Every inode is written out as unallocated, the
    /// free list is seeded in reverse (so the lowest data blocks are handed
    /// out first), and the root directory is created as inode 1.
    pub fn format(path: &Path, fsize: u32, ninodes: u32) -> Result<Self> {
        if fsize < 4 {
            return Err(Error::BadArgument("fsize < 4".to_string()));
        }
        let mut device = BlockDevice::create(path, fsize)?;
        let isize_ = inode_table_blocks(ninodes);
        let first_data = first_data_block(ninodes);
        if first_data >= fsize {
            return Err(Error::BadArgument(
                "image too small to hold its own inode table".to_string(),
            ));
        }

        // Every inode starts zeroed (unallocated).
        let zero_inode = Inode::default();
        let mut fs = Self {
            device,
            sb: Superblock {
                isize_,
                fsize_: fsize,
                nfree: 0,
                free: [0; NFREE],
                ninode: 0,
                inode: [0; crate::superblock::NINODE],
                flock: 0,
                ilock: 0,
                fmod: 1,
                time: [0, 0],
            },
            ninodes,
            cursor: Cursor::root(),
            image_path: path.to_path_buf(),
        };
        for ino in 1..=ninodes {
            fs.write_inode(ino, &zero_inode)?;
        }

        // Seed the free list in reverse: the highest data block goes in
        // first (and ends up at the bottom of the stack), so the lowest
        // blocks are handed out first by `alloc_block`.
        for block in (first_data..fsize).rev() {
            fs.free_block(block)?;
        }

        // Root directory, inode 1, is its own parent.
        let root_block = fs.alloc_block()?;
        let mut buf = [0u8; BLOCK_SIZE];
        buf[0..crate::dirent::DIRENT_SIZE]
            .copy_from_slice(&crate::dirent::DirEntry::new(ROOT_INODE, ".").to_bytes());
        buf[crate::dirent::DIRENT_SIZE..2 * crate::dirent::DIRENT_SIZE]
            .copy_from_slice(&crate::dirent::DirEntry::new(ROOT_INODE, "..").to_bytes());
        fs.device.write_block(root_block, &buf)?;

        let root_ino = fs.alloc_inode()?;
        debug_assert_eq!(root_ino, ROOT_INODE);
        let mut root_inode = Inode::default();
        root_inode.flags |= FLAG_ALLOCATED | FLAG_DIR | FLAG_READ | FLAG_WRITE | FLAG_EXEC;
        root_inode.nlinks = 1;
        root_inode.addr[0] = root_block;
        root_inode.set_size(2 * crate::dirent::DIRENT_SIZE as u32);
        let now = fs.timestamp();
        root_inode.acttime = now;
        root_inode.modtime = now;
        fs.write_inode(ROOT_INODE, &root_inode)?;

        fs.flush()?;
        Ok(fs)
    }

    /// Mounts an existing image, reading its superblock back in.
    pub fn mount(path: &Path) -> Result<Self> {
        let metadata = std::fs::metadata(path)?;
        let probe_fsize = (metadata.len() / BLOCK_SIZE as u64) as u32;
        let mut device = BlockDevice::open(path, probe_fsize.max(1))?;
        let sb = Superblock::read(&mut device)?;
        let ninodes =
            (sb.isize_ as u64 * BLOCK_SIZE as u64 / crate::layout::INODE_DISK_SIZE) as u32;
        device.set_fsize(sb.fsize_);
        Ok(Self {
            device,
            sb,
            ninodes,
            cursor: Cursor::root(),
            image_path: path.to_path_buf(),
        })
    }

    /// Writes the in-core superblock back to the image if it has been
    /// modified since the last flush.
    pub fn flush(&mut self) -> Result<()> {
        if self.sb.fmod != 0 {
            self.sb.time = self.timestamp();
            self.sb.write(&mut self.device)?;
            self.sb.fmod = 0;
        }
        Ok(())
    }

    /// Flushes and releases the mounted image.
    pub fn quit(mut self) -> Result<()> {
        self.flush()
    }

    /// Total block count of the mounted image.
    pub fn fsize(&self) -> u32 {
        self.sb.fsize_
    }

    /// Current number of cached free blocks (not the true total free count,
    /// which also includes every block reachable through on-disk link
    /// blocks).
    pub fn cached_free_blocks(&self) -> u32 {
        self.sb.nfree
    }

    /// The shell's current path, e.g. `/` or `/a/b`, for display in the prompt.
    pub fn cwd(&self) -> String {
        self.cursor.path_string()
    }

    /// Path of the backing host file, for display and confirmation prompts.
    pub fn image_path(&self) -> &Path {
        &self.image_path
    }

    /// Current wall-clock time as a split `[u16; 2]` pair, matching the
    /// on-disk `acttime`/`modtime`/superblock `time` field shape.
    pub(crate) fn timestamp(&self) -> [u16; 2] {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        [(secs >> 16) as u16, (secs & 0xffff) as u16]
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::env;
    use std::fs;

    fn temp_path(name: &str) -> PathBuf {
        let mut p = env::temp_dir();
        p.push(format!("v6fs-fs-test-{name}-{}", std::process::id()));
        p
    }

    /// Scenario 1: format, then mkdir a nested path and confirm it's
    /// reachable and idempotent.
    #[test]
    fn format_then_mkdir_is_idempotent() {
        let path = temp_path("mkdir-idem");
        let mut fs = FileSystem::format(&path, 128, 32).unwrap();
        fs.mkdir("/a/b/c").unwrap();
        fs.mkdir("/a/b/c").unwrap();
        let a = fs.lookup(ROOT_INODE, "a").unwrap().unwrap();
        let b = fs.lookup(a, "b").unwrap().unwrap();
        assert!(fs.lookup(b, "c").unwrap().is_some());
        let _ = fs::remove_file(&path);
    }

    /// Scenario: cpin a host file then cpout it back, byte for byte.
    #[test]
    fn cpin_cpout_round_trip() {
        let path = temp_path("cpin-cpout");
        let mut fs = FileSystem::format(&path, 256, 32).unwrap();

        let src_path = temp_path("cpin-src");
        let payload = vec![0x5au8; 3000];
        fs::write(&src_path, &payload).unwrap();

        fs.cpin(&src_path, "/greeting").unwrap();
        let dst_path = temp_path("cpout-dst");
        fs.cpout("/greeting", &dst_path).unwrap();
        let roundtrip = fs::read(&dst_path).unwrap();
        assert_eq!(roundtrip, payload);

        let _ = fs::remove_file(&path);
        let _ = fs::remove_file(&src_path);
        let _ = fs::remove_file(&dst_path);
    }

    /// Scenario: rm on a populated subtree frees every descendant's blocks,
    /// restoring the free-block cache count.
    #[test]
    fn rm_restores_free_block_count() {
        let path = temp_path("rm-restores");
        let mut fs = FileSystem::format(&path, 256, 32).unwrap();
        let before = fs.cached_free_blocks();

        fs.mkdir("/a/b").unwrap();
        let src_path = temp_path("rm-restores-src");
        fs::write(&src_path, vec![0x11u8; 5000]).unwrap();
        fs.cpin(&src_path, "/a/b/data").unwrap();
        fs.cpin(&src_path, "/a/file2").unwrap();

        fs.rm("/a").unwrap();
        assert_eq!(fs.cached_free_blocks(), before);

        let _ = fs::remove_file(&path);
        let _ = fs::remove_file(&src_path);
    }

    /// `rm` on the root directory is rejected.
    #[test]
    fn rm_root_is_rejected() {
        let path = temp_path("rm-root");
        let mut fs = FileSystem::format(&path, 128, 32).unwrap();
        assert!(matches!(fs.rm("/"), Err(Error::CannotRemoveRoot)));
        let _ = fs::remove_file(&path);
    }

    /// `cd ..` from a nested directory walks back up and trims the
    /// printable path; `cd` into a file is rejected.
    #[test]
    fn cd_updates_cursor_and_rejects_files() {
        let path = temp_path("cd-cursor");
        let mut fs = FileSystem::format(&path, 128, 32).unwrap();
        fs.mkdir("/a/b").unwrap();
        fs.cd("/a/b").unwrap();
        assert_eq!(fs.cwd(), "/a/b");
        fs.cd("..").unwrap();
        assert_eq!(fs.cwd(), "/a");

        let src_path = temp_path("cd-cursor-src");
        fs::write(&src_path, b"x").unwrap();
        fs.cpin(&src_path, "/a/f").unwrap();
        assert!(matches!(fs.cd("f"), Err(Error::NotADirectory(_))));

        let _ = fs::remove_file(&path);
        let _ = fs::remove_file(&src_path);
    }

    /// A fresh directory always has exactly `.` and `..`.
    #[test]
    fn fresh_directory_has_dot_and_dotdot_only() {
        let path = temp_path("fresh-dir");
        let mut fs = FileSystem::format(&path, 128, 32).unwrap();
        fs.mkdir("/a").unwrap();
        let a = fs.lookup(ROOT_INODE, "a").unwrap().unwrap();
        let entries = fs.list(a).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().any(|e| e.name == "."));
        assert!(entries.iter().any(|e| e.name == ".."));
        let _ = fs::remove_file(&path);
    }

    /// mkdir over an existing plain file is rejected.
    #[test]
    fn mkdir_over_existing_file_is_rejected() {
        let path = temp_path("mkdir-over-file");
        let mut fs = FileSystem::format(&path, 128, 32).unwrap();
        let src_path = temp_path("mkdir-over-file-src");
        fs::write(&src_path, b"x").unwrap();
        fs.cpin(&src_path, "/f").unwrap();
        assert!(matches!(fs.mkdir("/f"), Err(Error::FileExists(_))));
        let _ = fs::remove_file(&path);
        let _ = fs::remove_file(&src_path);
    }

    /// A large file (more than 11 blocks) round-trips through cpin/cpout,
    /// exercising the small-to-large promotion and single-indirect path.
    #[test]
    fn large_file_round_trip() {
        let path = temp_path("large-file");
        let mut fs = FileSystem::format(&path, 4096, 64).unwrap();
        let src_path = temp_path("large-file-src");
        let payload: Vec<u8> = (0..40_000u32).map(|i| (i % 251) as u8).collect();
        fs::write(&src_path, &payload).unwrap();

        fs.cpin(&src_path, "/big").unwrap();
        let dst_path = temp_path("large-file-dst");
        fs.cpout("/big", &dst_path).unwrap();
        let roundtrip = fs::read(&dst_path).unwrap();
        assert_eq!(roundtrip, payload);

        let _ = fs::remove_file(&path);
        let _ = fs::remove_file(&src_path);
        let _ = fs::remove_file(&dst_path);
    }
}
