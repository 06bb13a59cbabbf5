// TEAM_480: littlefs error codes. `raw()` is the negative number the C
// library returns, `errno()` the positive POSIX value.

use pfs_error::define_fs_error;
use pfs_vfs::VfsError;

define_fs_error! {
    pub enum LfsError(0x20) {
        Io = 0x01, EIO => "Error during device operation",
        Corrupt = 0x02, EIO => "Corrupted",
        NoEnt = 0x03, ENOENT => "No directory entry",
        Exist = 0x04, EEXIST => "Entry already exists",
        NotDir = 0x05, ENOTDIR => "Entry is not a dir",
        IsDir = 0x06, EISDIR => "Entry is a dir",
        NotEmpty = 0x07, ENOTEMPTY => "Dir is not empty",
        BadF = 0x08, EBADF => "Bad file number",
        FBig = 0x09, EFBIG => "File too large",
        Inval = 0x0A, EINVAL => "Invalid parameter",
        NoSpc = 0x0B, ENOSPC => "No space left on device",
        NoMem = 0x0C, ENOMEM => "No more memory available",
        NoAttr = 0x0D, ENODATA => "No data/attr available",
        NameTooLong = 0x0E, ENAMETOOLONG => "File name too long",
    }
}

impl LfsError {
    pub const fn raw(&self) -> i32 {
        match self {
            LfsError::Io => -5,
            LfsError::Corrupt => -84,
            LfsError::NoEnt => -2,
            LfsError::Exist => -17,
            LfsError::NotDir => -20,
            LfsError::IsDir => -21,
            LfsError::NotEmpty => -39,
            LfsError::BadF => -9,
            LfsError::FBig => -27,
            LfsError::Inval => -22,
            LfsError::NoSpc => -28,
            LfsError::NoMem => -12,
            LfsError::NoAttr => -61,
            LfsError::NameTooLong => -36,
        }
    }

    /// Decode a negative littlefs return value.
    pub fn from_raw(code: i32) -> Option<Self> {
        const ALL: [LfsError; 14] = [
            LfsError::Io,
            LfsError::Corrupt,
            LfsError::NoEnt,
            LfsError::Exist,
            LfsError::NotDir,
            LfsError::IsDir,
            LfsError::NotEmpty,
            LfsError::BadF,
            LfsError::FBig,
            LfsError::Inval,
            LfsError::NoSpc,
            LfsError::NoMem,
            LfsError::NoAttr,
            LfsError::NameTooLong,
        ];
        ALL.into_iter().find(|e| e.raw() == code)
    }
}

impl From<LfsError> for VfsError {
    fn from(e: LfsError) -> Self {
        match e {
            LfsError::Io | LfsError::Corrupt => VfsError::IoError,
            LfsError::NoEnt | LfsError::NoAttr => VfsError::NotFound,
            LfsError::Exist => VfsError::AlreadyExists,
            LfsError::NotDir => VfsError::NotADirectory,
            LfsError::IsDir => VfsError::IsADirectory,
            LfsError::NotEmpty => VfsError::DirectoryNotEmpty,
            LfsError::BadF => VfsError::BadFd,
            LfsError::FBig => VfsError::FileTooLarge,
            LfsError::Inval => VfsError::InvalidArgument,
            LfsError::NoSpc => VfsError::NoSpace,
            LfsError::NoMem => VfsError::OutOfMemory,
            LfsError::NameTooLong => VfsError::NameTooLong,
        }
    }
}
