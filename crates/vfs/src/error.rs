//! TEAM_465: VFS Error Types
//!
//! Every backend failure is normalized into [`VfsError`] before it reaches
//! the caller. The errno table feeds the last-error mirror kept by
//! [`crate::Vfs`].

use core::fmt;

use pfs_error::errno;

/// These map to standard POSIX errno values for newlib compatibility.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum VfsError {
    /// Allocation failed (ENOMEM)
    OutOfMemory,
    /// Invalid argument (EINVAL)
    InvalidArgument,
    /// No mount point covers the path (ENODEV)
    NoSuchMount,
    /// No such file or directory (ENOENT)
    NotFound,
    /// Backend leaves this operation unimplemented (EOPNOTSUPP)
    NotSupported,
    /// Media absent or not initialized (EAGAIN)
    NotReady,
    /// Media or backend I/O failure (EIO)
    IoError,
    /// Device or resource busy (EBUSY)
    Busy,
    /// File exists (EEXIST)
    AlreadyExists,
    /// Not a directory (ENOTDIR)
    NotADirectory,
    /// Is a directory (EISDIR)
    IsADirectory,
    /// Directory not empty (ENOTEMPTY)
    DirectoryNotEmpty,
    /// No space left on device (ENOSPC)
    NoSpace,
    /// Bad file descriptor (EBADF)
    BadFd,
    /// Permission denied (EACCES)
    AccessDenied,
    /// Rename across mounts (EXDEV)
    CrossDevice,
    /// Descriptor table full (EMFILE)
    TooManyOpenFiles,
    /// Name too long (ENAMETOOLONG)
    NameTooLong,
    /// File too large (EFBIG)
    FileTooLarge,
    /// Something is already mounted there (EBUSY)
    AlreadyMounted,
    /// No such device (ENXIO)
    NoDevice,
    /// Descriptor is not a terminal (ENOTTY)
    NotATerminal,
}

impl VfsError {
    /// Positive POSIX errno value.
    pub const fn errno(self) -> i32 {
        match self {
            VfsError::OutOfMemory => errno::ENOMEM,
            VfsError::InvalidArgument => errno::EINVAL,
            VfsError::NoSuchMount => errno::ENODEV,
            VfsError::NotFound => errno::ENOENT,
            VfsError::NotSupported => errno::EOPNOTSUPP,
            VfsError::NotReady => errno::EAGAIN,
            VfsError::IoError => errno::EIO,
            VfsError::Busy | VfsError::AlreadyMounted => errno::EBUSY,
            VfsError::AlreadyExists => errno::EEXIST,
            VfsError::NotADirectory => errno::ENOTDIR,
            VfsError::IsADirectory => errno::EISDIR,
            VfsError::DirectoryNotEmpty => errno::ENOTEMPTY,
            VfsError::NoSpace => errno::ENOSPC,
            VfsError::BadFd => errno::EBADF,
            VfsError::AccessDenied => errno::EACCES,
            VfsError::CrossDevice => errno::EXDEV,
            VfsError::TooManyOpenFiles => errno::EMFILE,
            VfsError::NameTooLong => errno::ENAMETOOLONG,
            VfsError::FileTooLarge => errno::EFBIG,
            VfsError::NoDevice => errno::ENXIO,
            VfsError::NotATerminal => errno::ENOTTY,
        }
    }

    /// Convert to POSIX errno value (negative)
    pub const fn to_errno(self) -> i32 {
        -self.errno()
    }

    pub fn name(&self) -> &'static str {
        match self {
            VfsError::OutOfMemory => "ENOMEM",
            VfsError::InvalidArgument => "EINVAL",
            VfsError::NoSuchMount => "ENODEV",
            VfsError::NotFound => "ENOENT",
            VfsError::NotSupported => "EOPNOTSUPP",
            VfsError::NotReady => "EAGAIN",
            VfsError::IoError => "EIO",
            VfsError::Busy | VfsError::AlreadyMounted => "EBUSY",
            VfsError::AlreadyExists => "EEXIST",
            VfsError::NotADirectory => "ENOTDIR",
            VfsError::IsADirectory => "EISDIR",
            VfsError::DirectoryNotEmpty => "ENOTEMPTY",
            VfsError::NoSpace => "ENOSPC",
            VfsError::BadFd => "EBADF",
            VfsError::AccessDenied => "EACCES",
            VfsError::CrossDevice => "EXDEV",
            VfsError::TooManyOpenFiles => "EMFILE",
            VfsError::NameTooLong => "ENAMETOOLONG",
            VfsError::FileTooLarge => "EFBIG",
            VfsError::NoDevice => "ENXIO",
            VfsError::NotATerminal => "ENOTTY",
        }
    }
}

impl fmt::Display for VfsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            VfsError::OutOfMemory => "Out of memory",
            VfsError::InvalidArgument => "Invalid argument",
            VfsError::NoSuchMount => "No such mount point",
            VfsError::NotFound => "No such file or directory",
            VfsError::NotSupported => "Operation not supported",
            VfsError::NotReady => "Media not ready",
            VfsError::IoError => "I/O error",
            VfsError::Busy => "Device or resource busy",
            VfsError::AlreadyExists => "File exists",
            VfsError::NotADirectory => "Not a directory",
            VfsError::IsADirectory => "Is a directory",
            VfsError::DirectoryNotEmpty => "Directory not empty",
            VfsError::NoSpace => "No space left on device",
            VfsError::BadFd => "Bad file descriptor",
            VfsError::AccessDenied => "Permission denied",
            VfsError::CrossDevice => "Invalid cross-device link",
            VfsError::TooManyOpenFiles => "Too many open files",
            VfsError::NameTooLong => "File name too long",
            VfsError::FileTooLarge => "File too large",
            VfsError::AlreadyMounted => "Already mounted",
            VfsError::NoDevice => "No such device",
            VfsError::NotATerminal => "Not a terminal",
        };
        write!(f, "{} ({})", msg, self.name())
    }
}

impl core::error::Error for VfsError {}

impl From<alloc::collections::TryReserveError> for VfsError {
    fn from(_: alloc::collections::TryReserveError) -> Self {
        VfsError::OutOfMemory
    }
}

/// Result type for VFS operations
pub type VfsResult<T> = Result<T, VfsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_is_negative_posix() {
        assert_eq!(VfsError::NotFound.to_errno(), -2);
        assert_eq!(VfsError::OutOfMemory.to_errno(), -12);
        assert_eq!(VfsError::NoDevice.to_errno(), -6);
        assert_eq!(VfsError::NotSupported.to_errno(), -95);
        assert_eq!(VfsError::Busy.errno(), VfsError::AlreadyMounted.errno());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            format!("{}", VfsError::CrossDevice),
            "Invalid cross-device link (EXDEV)"
        );
    }
}
