//! Path resolution and the working-directory cursor.
//!
//! Three distinct existence policies are needed by different verbs:
//! `mkdir` creates every missing intermediate directory as it walks;
//! `cpin` requires every intermediate to already exist but allows the
//! final component to be absent (it is the file being created); `cd`,
//! `rm`, and `cpout` require every component, including the last, to
//! already exist.

use crate::error::{Error, Result};
use crate::fs::FileSystem;
use crate::layout::ROOT_INODE;

/// The shell's current position: the inode it is "in", and the printable
/// path used for the prompt.
pub struct Cursor {
    pub inode: u32,
    components: Vec<String>,
}

impl Cursor {
    pub fn root() -> Self {
        Self {
            inode: ROOT_INODE,
            components: Vec::new(),
        }
    }

    /// The printable absolute path, e.g. `/` or `/a/b`.
    pub fn path_string(&self) -> String {
        if self.components.is_empty() {
            "/".to_string()
        } else {
            format!("/{}", self.components.join("/"))
        }
    }
}

fn split(path: &str) -> (bool, Vec<&str>) {
    let absolute = path.starts_with('/');
    let segs = path.split('/').filter(|s| !s.is_empty()).collect();
    (absolute, segs)
}

impl FileSystem {
    /// Resolves every component but the last, requiring each to exist and
    /// be a directory. Returns the directory inode that should contain the
    /// final component, plus that component's name.
    pub fn resolve_parent(&mut self, path: &str) -> Result<(u32, String)> {
        let (absolute, mut segs) = split(path);
        let name = segs
            .pop()
            .ok_or_else(|| Error::BadArgument("empty path".to_string()))?
            .to_string();
        let mut ino = if absolute { ROOT_INODE } else { self.cursor.inode };
        for seg in segs {
            let child = self
                .lookup(ino, seg)?
                .ok_or_else(|| Error::NoSuchPath(path.to_string()))?;
            let inode = self.read_inode(child)?;
            if !inode.is_dir() {
                return Err(Error::NotADirectory(seg.to_string()));
            }
            ino = child;
        }
        Ok((ino, name))
    }

    /// Resolves a path end to end; every component, including the last,
    /// must exist.
    pub fn resolve_existing(&mut self, path: &str) -> Result<u32> {
        let (parent_ino, name) = self.resolve_parent(path)?;
        self.lookup(parent_ino, &name)?
            .ok_or_else(|| Error::NoSuchPath(path.to_string()))
    }

    /// Walks `path`, creating any missing directory along the way. An
    /// existing non-directory entry with the same name as a path component
    /// is an error; an existing directory is simply descended into, making
    /// `mkdir` idempotent.
    pub fn mkdir(&mut self, path: &str) -> Result<()> {
        let (absolute, segs) = split(path);
        if segs.is_empty() {
            return Err(Error::BadArgument("empty path".to_string()));
        }
        let mut ino = if absolute { ROOT_INODE } else { self.cursor.inode };
        for seg in segs {
            match self.lookup(ino, seg)? {
                Some(child) => {
                    let inode = self.read_inode(child)?;
                    if !inode.is_dir() {
                        return Err(Error::FileExists(seg.to_string()));
                    }
                    ino = child;
                }
                None => {
                    ino = self.make_dir(ino, seg)?;
                }
            }
        }
        Ok(())
    }

    /// Removes the file or directory tree at `path`. Every component must
    /// exist; removing the root directory is rejected.
    pub fn rm(&mut self, path: &str) -> Result<()> {
        let (absolute, segs) = split(path);
        if segs.is_empty() {
            if absolute {
                return Err(Error::CannotRemoveRoot);
            }
            return Err(Error::BadArgument("empty path".to_string()));
        }
        let (parent_ino, name) = self.resolve_parent(path)?;
        let target_ino = self
            .lookup(parent_ino, &name)?
            .ok_or_else(|| Error::NoSuchPath(path.to_string()))?;
        if target_ino == ROOT_INODE {
            return Err(Error::CannotRemoveRoot);
        }
        let inode = self.read_inode(target_ino)?;
        if inode.is_dir() {
            self.remove_tree(target_ino)?;
        } else {
            self.unlink_entry(parent_ino, target_ino)?;
            self.remove_file(target_ino)?;
        }
        Ok(())
    }

    /// Changes the cursor's current directory. `.` is a no-op; `..` walks
    /// to the parent by following the directory's own `..` entry, trimming
    /// one component from the printable path; a named segment must exist
    /// and be a directory.
    pub fn cd(&mut self, path: &str) -> Result<()> {
        let (absolute, segs) = split(path);
        let mut ino = if absolute { ROOT_INODE } else { self.cursor.inode };
        let mut components = if absolute {
            Vec::new()
        } else {
            self.cursor.components.clone()
        };
        for seg in segs {
            if seg == "." {
                continue;
            }
            if seg == ".." {
                let parent = self
                    .lookup(ino, "..")?
                    .ok_or_else(|| Error::NoSuchPath(path.to_string()))?;
                ino = parent;
                components.pop();
                continue;
            }
            let child = self
                .lookup(ino, seg)?
                .ok_or_else(|| Error::NoSuchPath(path.to_string()))?;
            let inode = self.read_inode(child)?;
            if !inode.is_dir() {
                return Err(Error::NotADirectory(seg.to_string()));
            }
            ino = child;
            components.push(seg.to_string());
        }
        self.cursor.inode = ino;
        self.cursor.components = components;
        Ok(())
    }

    /// Lists the cursor's current directory.
    pub fn ls(&mut self) -> Result<Vec<crate::dirent::DirListing>> {
        self.list(self.cursor.inode)
    }
}
