//! TEAM_483: newlib syscall shapes.
//!
//! Each call returns `-1` (or a negative offset) on failure and leaves the
//! positive errno in [`errno`]. Descriptors are plain `i32` as the C library
//! passes them; negative ones fail with `EBADF`.

use alloc::string::String;

use pfs_vfs::{OpenFlags, SeekWhence, Stat, VFS, VfsError, VfsResult};

/// Positive errno of the most recent failure.
pub fn errno() -> i32 {
    VFS.last_error()
}

fn fd_of(fd: i32) -> VfsResult<usize> {
    usize::try_from(fd).map_err(|_| VfsError::BadFd)
}

/// Record errors raised here, before the dispatch layer saw the call.
fn checked<T>(r: VfsResult<T>) -> VfsResult<T> {
    if let Err(e) = &r {
        VFS.set_error(*e);
    }
    r
}

fn status(r: VfsResult<()>) -> i32 {
    match r {
        Ok(()) => 0,
        Err(_) => -1,
    }
}

fn length(r: VfsResult<usize>) -> isize {
    match r {
        Ok(n) => isize::try_from(n).unwrap_or(isize::MAX),
        Err(_) => -1,
    }
}

pub fn open(path: &str, oflag: u32) -> i32 {
    match VFS.open_fd(path, OpenFlags::new(oflag)) {
        Ok(fd) => fd as i32,
        Err(_) => -1,
    }
}

pub fn close(fd: i32) -> i32 {
    status(checked(fd_of(fd)).and_then(|fd| VFS.close_fd(fd)))
}

pub fn read(fd: i32, buf: &mut [u8]) -> isize {
    length(checked(fd_of(fd)).and_then(|fd| VFS.read_fd(fd, buf)))
}

pub fn write(fd: i32, buf: &[u8]) -> isize {
    length(checked(fd_of(fd)).and_then(|fd| VFS.write_fd(fd, buf)))
}

pub fn lseek(fd: i32, offset: i64, whence: u32) -> i64 {
    let r = checked(fd_of(fd).and_then(|fd| {
        let whence = SeekWhence::from_u32(whence).ok_or(VfsError::InvalidArgument)?;
        Ok((fd, whence))
    }))
    .and_then(|(fd, whence)| VFS.seek_fd(fd, offset, whence))
    .and_then(|pos| checked(i64::try_from(pos).map_err(|_| VfsError::FileTooLarge)));
    r.unwrap_or(-1)
}

pub fn fstat(fd: i32, st: &mut Stat) -> i32 {
    status(checked(fd_of(fd)).and_then(|fd| VFS.fstat_fd(fd)).map(|s| *st = s))
}

pub fn stat(path: &str, st: &mut Stat) -> i32 {
    status(VFS.stat(path).map(|s| *st = s))
}

/// 1 for a terminal. Otherwise 0 with `ENOTTY`, or `EBADF` for a closed
/// descriptor.
pub fn isatty(fd: i32) -> i32 {
    i32::from(checked(fd_of(fd)).and_then(|fd| VFS.tty_fd(fd)).is_ok())
}

pub fn unlink(path: &str) -> i32 {
    status(VFS.delete(path))
}

pub fn mkdir(path: &str, mode: u32) -> i32 {
    status(VFS.mkdir(path, mode))
}

pub fn rmdir(path: &str) -> i32 {
    status(VFS.rmdir(path))
}

pub fn rename(from: &str, to: &str) -> i32 {
    status(VFS.rename(from, to))
}

pub fn chmod(path: &str, mode: u32) -> i32 {
    status(VFS.chmod(path, mode))
}

pub fn chdir(path: &str) -> i32 {
    status(VFS.chdir(path))
}

pub fn getcwd() -> String {
    VFS.getcwd()
}
