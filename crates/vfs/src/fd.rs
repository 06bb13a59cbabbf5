//! TEAM_470: File descriptor table.
//!
//! Integer descriptors for the newlib-style entry points. Slots 0, 1 and 2
//! are reserved for stdin, stdout and stderr and are only filled by
//! [`FdTable::install`].

use alloc::sync::Arc;
use alloc::vec::Vec;

use pfs_utils::Mutex;

use crate::error::{VfsError, VfsResult};
use crate::file::FileHandle;

/// Maximum number of open file descriptors.
pub const MAX_FDS: usize = 16;

/// First descriptor handed out by [`FdTable::alloc`].
pub const FIRST_FREE_FD: usize = 3;

pub const STDIN: usize = 0;
pub const STDOUT: usize = 1;
pub const STDERR: usize = 2;

/// TEAM_484: A descriptor's handle. Callers clone it out of the table and lock only
/// the handle, so a blocking read on one descriptor leaves the others free.
pub type SharedHandle = Arc<Mutex<FileHandle>>;

pub struct FdTable {
    /// Sparse array of handles (None = unused slot)
    entries: Vec<Option<SharedHandle>>,
}

impl FdTable {
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Store `handle` in the lowest free slot at or above [`FIRST_FREE_FD`].
    pub fn alloc(&mut self, handle: FileHandle) -> VfsResult<usize> {
        for (i, slot) in self.entries.iter_mut().enumerate().skip(FIRST_FREE_FD) {
            if slot.is_none() {
                *slot = Some(Arc::new(Mutex::new(handle)));
                return Ok(i);
            }
        }
        let fd = self.entries.len().max(FIRST_FREE_FD);
        if fd >= MAX_FDS {
            return Err(VfsError::TooManyOpenFiles);
        }
        self.grow_to(fd)?;
        self.entries[fd] = Some(Arc::new(Mutex::new(handle)));
        Ok(fd)
    }

    /// Put `handle` at `fd`. Returns the displaced handle, which the caller
    /// closes with [`release`] after dropping the table lock.
    pub fn install(&mut self, fd: usize, handle: FileHandle) -> VfsResult<Option<SharedHandle>> {
        if fd >= MAX_FDS {
            return Err(VfsError::BadFd);
        }
        self.grow_to(fd)?;
        Ok(self.entries[fd].replace(Arc::new(Mutex::new(handle))))
    }

    fn grow_to(&mut self, fd: usize) -> VfsResult<()> {
        if self.entries.len() <= fd {
            self.entries.try_reserve(fd + 1 - self.entries.len())?;
            self.entries.resize_with(fd + 1, || None);
        }
        Ok(())
    }

    pub fn get(&self, fd: usize) -> VfsResult<SharedHandle> {
        self.entries
            .get(fd)
            .and_then(Option::as_ref)
            .cloned()
            .ok_or(VfsError::BadFd)
    }

    /// Empty the slot so the caller can close it outside the table lock.
    pub fn take(&mut self, fd: usize) -> VfsResult<SharedHandle> {
        self.entries
            .get_mut(fd)
            .and_then(Option::take)
            .ok_or(VfsError::BadFd)
    }

    pub fn is_valid(&self, fd: usize) -> bool {
        self.entries.get(fd).is_some_and(Option::is_some)
    }

    pub fn open_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }
}

/// Close a handle removed from the table. If a call on another descriptor
/// copy is still running, the handle closes itself when that call drops it.
pub fn release(handle: SharedHandle) -> VfsResult<()> {
    match Arc::try_unwrap(handle) {
        Ok(handle) => handle.into_inner().close(),
        Err(_) => Ok(()),
    }
}

impl Default for FdTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::FileOps;
    use alloc::boxed::Box;

    struct Null;
    impl FileOps for Null {}

    fn handle() -> FileHandle {
        FileHandle::detached(Box::new(Null))
    }

    #[test]
    fn test_alloc_lowest_free_above_stdio() {
        let mut t = FdTable::new();
        assert_eq!(t.alloc(handle()).unwrap(), 3);
        assert_eq!(t.alloc(handle()).unwrap(), 4);
        assert_eq!(t.alloc(handle()).unwrap(), 5);
        release(t.take(4).unwrap()).unwrap();
        assert_eq!(t.alloc(handle()).unwrap(), 4);
    }

    #[test]
    fn test_table_full() {
        let mut t = FdTable::new();
        for _ in FIRST_FREE_FD..MAX_FDS {
            t.alloc(handle()).unwrap();
        }
        assert_eq!(t.alloc(handle()).err(), Some(VfsError::TooManyOpenFiles));
        assert_eq!(t.open_count(), MAX_FDS - FIRST_FREE_FD);
    }

    #[test]
    fn test_closed_fd_is_bad() {
        let mut t = FdTable::new();
        let fd = t.alloc(handle()).unwrap();
        release(t.take(fd).unwrap()).unwrap();
        assert_eq!(t.take(fd).err(), Some(VfsError::BadFd));
        assert!(t.get(fd).is_err());
        assert!(t.get(99).is_err());
    }

    #[test]
    fn test_install_stdio() {
        let mut t = FdTable::new();
        assert!(t.install(STDOUT, handle()).unwrap().is_none());
        assert!(t.is_valid(STDOUT));
        assert!(!t.is_valid(STDIN));
        let old = t.install(STDOUT, handle()).unwrap();
        release(old.unwrap()).unwrap();
        assert_eq!(t.open_count(), 1);
        assert_eq!(t.alloc(handle()).unwrap(), 3);
        assert_eq!(t.install(MAX_FDS, handle()).err(), Some(VfsError::BadFd));
    }

    #[test]
    fn test_release_defers_to_last_holder() {
        let mut t = FdTable::new();
        let fd = t.alloc(handle()).unwrap();
        let in_flight = t.get(fd).unwrap();
        release(t.take(fd).unwrap()).unwrap();
        assert!(!t.is_valid(fd));
        // Still usable by the call that cloned it
        assert!(!in_flight.lock().isatty());
    }
}
