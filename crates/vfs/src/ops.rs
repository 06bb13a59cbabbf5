//! TEAM_467: Backend capability traits
//!
//! A backend implements [`Filesystem`] for path operations, hands out
//! [`FileOps`] for open files and [`DirOps`] for open directories. Every
//! method has a default returning `VfsError::NotSupported`, so a backend
//! only writes the entries it actually has.
//!
//! Paths given to a backend are relative to its mount point, segments joined
//! by `/`, with `""` naming the mount root.

use alloc::boxed::Box;
use alloc::string::String;

use crate::error::{VfsError, VfsResult};
use crate::ioctl::IoctlRequest;
use crate::mode;

/// Open file flags
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpenFlags(u32);

/// Decoded access mode of an [`OpenFlags`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    Write,
    ReadWrite,
}

impl OpenFlags {
    // Access modes (mutually exclusive)
    pub const O_RDONLY: u32 = 0;
    pub const O_WRONLY: u32 = 1;
    pub const O_RDWR: u32 = 2;
    pub const O_ACCMODE: u32 = 3;

    // File creation flags
    pub const O_CREAT: u32 = 0o100;
    pub const O_EXCL: u32 = 0o200;
    pub const O_TRUNC: u32 = 0o1000;

    // File status flags
    pub const O_APPEND: u32 = 0o2000;

    pub const fn new(flags: u32) -> Self {
        Self(flags)
    }

    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// Both read and write bits set is rejected.
    pub fn access(&self) -> VfsResult<AccessMode> {
        match self.0 & Self::O_ACCMODE {
            Self::O_RDONLY => Ok(AccessMode::Read),
            Self::O_WRONLY => Ok(AccessMode::Write),
            Self::O_RDWR => Ok(AccessMode::ReadWrite),
            _ => Err(VfsError::InvalidArgument),
        }
    }

    pub fn is_readable(&self) -> bool {
        matches!(self.access(), Ok(AccessMode::Read | AccessMode::ReadWrite))
    }

    pub fn is_writable(&self) -> bool {
        matches!(self.access(), Ok(AccessMode::Write | AccessMode::ReadWrite))
    }

    pub fn is_create(&self) -> bool {
        self.0 & Self::O_CREAT != 0
    }

    pub fn is_exclusive(&self) -> bool {
        self.0 & Self::O_EXCL != 0
    }

    pub fn is_truncate(&self) -> bool {
        self.0 & Self::O_TRUNC != 0
    }

    pub fn is_append(&self) -> bool {
        self.0 & Self::O_APPEND != 0
    }
}

impl core::ops::BitOr<u32> for OpenFlags {
    type Output = OpenFlags;
    fn bitor(self, rhs: u32) -> OpenFlags {
        OpenFlags(self.0 | rhs)
    }
}

/// Seek origin
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SeekWhence {
    /// Seek from beginning of file
    Set = 0,
    /// Seek from current position
    Cur = 1,
    /// Seek from end of file
    End = 2,
}

impl SeekWhence {
    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            0 => Some(SeekWhence::Set),
            1 => Some(SeekWhence::Cur),
            2 => Some(SeekWhence::End),
            _ => None,
        }
    }
}

/// New absolute offset for a seek, rejecting positions before the start.
pub fn resolve_seek(current: u64, size: u64, offset: i64, whence: SeekWhence) -> VfsResult<u64> {
    let base = match whence {
        SeekWhence::Set => 0,
        SeekWhence::Cur => current,
        SeekWhence::End => size,
    };
    base.checked_add_signed(offset)
        .ok_or(VfsError::InvalidArgument)
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FileType {
    Regular,
    Directory,
    CharDevice,
}

impl FileType {
    pub const fn mode_bits(self) -> u32 {
        match self {
            FileType::Regular => mode::S_IFREG,
            FileType::Directory => mode::S_IFDIR,
            FileType::CharDevice => mode::S_IFCHR,
        }
    }
}

/// Subset of `struct stat` the backends can fill in.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Stat {
    pub size: u64,
    pub mode: u32,
    pub nlink: u32,
    /// Seconds since the Unix epoch, 0 when unknown
    pub mtime: u64,
}

impl Stat {
    /// Fixed `rwx` for everyone, one link.
    pub fn new(file_type: FileType, size: u64) -> Self {
        Self {
            size,
            mode: file_type.mode_bits() | mode::S_IRWXUGO,
            nlink: 1,
            mtime: 0,
        }
    }

    pub fn is_dir(&self) -> bool {
        mode::is_dir(self.mode)
    }
}

/// Directory entry returned by readdir
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DirEntry {
    pub name: String,
    pub file_type: FileType,
    pub size: u64,
}

impl DirEntry {
    pub fn new(name: String, file_type: FileType, size: u64) -> Self {
        Self {
            name,
            file_type,
            size,
        }
    }
}

/// Path operations of a mounted backend.
pub trait Filesystem: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    fn open(&self, _path: &str, _flags: OpenFlags) -> VfsResult<Box<dyn FileOps>> {
        Err(VfsError::NotSupported)
    }

    fn stat(&self, _path: &str) -> VfsResult<Stat> {
        Err(VfsError::NotSupported)
    }

    fn rename(&self, _from: &str, _to: &str) -> VfsResult<()> {
        Err(VfsError::NotSupported)
    }

    fn delete(&self, _path: &str) -> VfsResult<()> {
        Err(VfsError::NotSupported)
    }

    /// `mode` holds the caller's permission bits. Backends without
    /// permissions ignore it.
    fn mkdir(&self, _path: &str, _mode: u32) -> VfsResult<()> {
        Err(VfsError::NotSupported)
    }

    fn rmdir(&self, _path: &str) -> VfsResult<()> {
        Err(VfsError::NotSupported)
    }

    fn opendir(&self, _path: &str) -> VfsResult<Box<dyn DirOps>> {
        Err(VfsError::NotSupported)
    }

    fn chmod(&self, _path: &str, _mode: u32) -> VfsResult<()> {
        Err(VfsError::NotSupported)
    }
}

/// Operations on an open file.
pub trait FileOps: Send {
    fn read(&mut self, _buf: &mut [u8]) -> VfsResult<usize> {
        Err(VfsError::NotSupported)
    }

    fn write(&mut self, _buf: &[u8]) -> VfsResult<usize> {
        Err(VfsError::NotSupported)
    }

    fn seek(&mut self, _offset: i64, _whence: SeekWhence) -> VfsResult<u64> {
        Err(VfsError::NotSupported)
    }

    fn fstat(&mut self) -> VfsResult<Stat> {
        Err(VfsError::NotSupported)
    }

    fn isatty(&self) -> bool {
        false
    }

    /// Returns a request-specific value (count, achieved baud) or 0.
    fn ioctl(&mut self, _request: IoctlRequest) -> VfsResult<usize> {
        Err(VfsError::NotSupported)
    }

    /// Release backend resources. Called exactly once.
    fn close(&mut self) -> VfsResult<()> {
        Ok(())
    }
}

/// Operations on an open directory.
pub trait DirOps: Send {
    /// Next entry, `None` once exhausted.
    fn readdir(&mut self) -> VfsResult<Option<DirEntry>>;

    fn closedir(&mut self) -> VfsResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_modes_are_exclusive() {
        assert_eq!(OpenFlags::new(OpenFlags::O_RDONLY).access(), Ok(AccessMode::Read));
        assert_eq!(OpenFlags::new(OpenFlags::O_RDWR).access(), Ok(AccessMode::ReadWrite));
        assert_eq!(
            OpenFlags::new(OpenFlags::O_WRONLY | OpenFlags::O_RDWR).access(),
            Err(VfsError::InvalidArgument)
        );
        let f = OpenFlags::new(OpenFlags::O_WRONLY) | OpenFlags::O_CREAT | OpenFlags::O_TRUNC;
        assert!(f.is_writable() && !f.is_readable());
        assert!(f.is_create() && f.is_truncate() && !f.is_append());
    }

    #[test]
    fn test_resolve_seek() {
        assert_eq!(resolve_seek(5, 10, 3, SeekWhence::Set), Ok(3));
        assert_eq!(resolve_seek(5, 10, -2, SeekWhence::Cur), Ok(3));
        assert_eq!(resolve_seek(5, 10, 0, SeekWhence::End), Ok(10));
        assert_eq!(
            resolve_seek(5, 10, -11, SeekWhence::End),
            Err(VfsError::InvalidArgument)
        );
    }

    #[test]
    fn test_stat_fixed_mode() {
        let st = Stat::new(FileType::Directory, 0);
        assert!(st.is_dir());
        assert_eq!(st.mode & mode::S_IRWXUGO, 0o777);
        assert_eq!(st.nlink, 1);
    }

    struct Empty;
    impl Filesystem for Empty {
        fn name(&self) -> &'static str {
            "empty"
        }
    }

    #[test]
    fn test_unset_entries_are_not_supported() {
        let fs = Empty;
        assert_eq!(fs.mkdir("x", 0o755), Err(VfsError::NotSupported));
        assert_eq!(fs.chmod("x", 0), Err(VfsError::NotSupported));
        assert!(matches!(fs.open("x", OpenFlags::new(0)), Err(VfsError::NotSupported)));
    }
}
