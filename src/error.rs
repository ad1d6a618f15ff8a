//! Crate-wide error type.
//!
//! Mirrors the hand-written, no-dependency error style used throughout the
//! rest of this codebase: a single enum, a manual `Display` impl, and a
//! `From<io::Error>` so `?` composes with host I/O.

use std::fmt;
use std::io;

/// An error produced by a [`crate::fs::FileSystem`] operation.
#[derive(Debug)]
pub enum Error {
    /// A command was given a malformed or missing argument.
    BadArgument(String),
    /// A verb other than `initfs`/`load` was used before a filesystem was mounted.
    NotMounted,
    /// No entry exists at the given v6 path.
    NoSuchPath(String),
    /// A path component exists but is not a directory.
    NotADirectory(String),
    /// A path component exists but is not a regular file.
    NotAFile(String),
    /// `cpin` found an existing directory where a file was expected.
    DirectoryExists(String),
    /// `mkdir` found an existing, non-directory entry with the same name.
    FileExists(String),
    /// An attempt was made to remove the root directory.
    CannotRemoveRoot,
    /// The free block list is empty.
    OutOfBlocks,
    /// The free inode cache and the inode table are both exhausted.
    OutOfInodes,
    /// A file grew past the largest offset the triple-indirect scheme can address.
    MaxFileSizeReached,
    /// A host I/O operation failed.
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadArgument(msg) => write!(f, "bad argument: {msg}"),
            Self::NotMounted => write!(f, "no file system is currently mounted"),
            Self::NoSuchPath(path) => write!(f, "no such path: {path}"),
            Self::NotADirectory(name) => write!(f, "not a directory: {name}"),
            Self::NotAFile(name) => write!(f, "not a file: {name}"),
            Self::DirectoryExists(name) => write!(f, "directory exists with same name: {name}"),
            Self::FileExists(name) => write!(f, "file exists with same name: {name}"),
            Self::CannotRemoveRoot => write!(f, "cannot remove the root directory"),
            Self::OutOfBlocks => write!(f, "no more blocks"),
            Self::OutOfInodes => write!(f, "no more inodes"),
            Self::MaxFileSizeReached => write!(f, "max file size reached"),
            Self::Io(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
