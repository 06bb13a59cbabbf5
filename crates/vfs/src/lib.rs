#![cfg_attr(not(any(test, feature = "std")), no_std)]

//! TEAM_465: Virtual filesystem layer.
//!
//! Paths are normalized by [`path`], matched against the [`mount`] table by
//! longest prefix, and the selected backend's [`ops::Filesystem`] entry runs.
//! Backend failures come back as [`VfsError`].

extern crate alloc;

#[cfg(feature = "verbose")]
#[macro_export]
macro_rules! verbose {
    ($($arg:tt)*) => { log::debug!($($arg)*) };
}

#[cfg(not(feature = "verbose"))]
#[macro_export]
macro_rules! verbose {
    ($($arg:tt)*) => {};
}

pub mod dispatch;
pub mod error;
pub mod fd;
pub mod file;
pub mod ioctl;
pub mod mode;
pub mod mount;
pub mod ops;
pub mod path;

pub use dispatch::{Vfs, VFS};
pub use error::{VfsError, VfsResult};
pub use fd::{FdTable, MAX_FDS};
pub use file::{DirHandle, FileHandle};
pub use ioctl::{IoctlRequest, ModeFlags, ReadMode, SerialConfig};
pub use mount::{Mount, MountTable};
pub use ops::{DirEntry, DirOps, FileOps, FileType, Filesystem, OpenFlags, SeekWhence, Stat};
pub use path::{PathList, Segment};
