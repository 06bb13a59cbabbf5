//! TEAM_469: Open file and directory handles
//!
//! A handle owns the backend's per-open state plus an `Arc` to its mount,
//! which keeps the mount from being removed underneath it. Closing consumes
//! the handle; a handle dropped without `close` is closed quietly.

use alloc::boxed::Box;
use alloc::collections::VecDeque;
use alloc::string::String;
use alloc::sync::Arc;

use crate::error::{VfsError, VfsResult};
use crate::ioctl::IoctlRequest;
use crate::mount::Mount;
use crate::ops::{DirEntry, DirOps, FileOps, FileType, SeekWhence, Stat};

pub struct FileHandle {
    ops: Option<Box<dyn FileOps>>,
    mount: Option<Arc<Mount>>,
}

impl FileHandle {
    pub fn new(ops: Box<dyn FileOps>, mount: Arc<Mount>) -> Self {
        Self {
            ops: Some(ops),
            mount: Some(mount),
        }
    }

    /// Handle that does not pin any mount, e.g. a console bound to stdio.
    pub fn detached(ops: Box<dyn FileOps>) -> Self {
        Self {
            ops: Some(ops),
            mount: None,
        }
    }

    fn ops(&mut self) -> VfsResult<&mut Box<dyn FileOps>> {
        self.ops.as_mut().ok_or(VfsError::BadFd)
    }

    pub fn mountpoint(&self) -> Option<&str> {
        self.mount.as_deref().map(|m| m.mountpoint.as_str())
    }

    /// Short reads are not errors.
    pub fn read(&mut self, buf: &mut [u8]) -> VfsResult<usize> {
        self.ops()?.read(buf)
    }

    pub fn write(&mut self, buf: &[u8]) -> VfsResult<usize> {
        self.ops()?.write(buf)
    }

    pub fn seek(&mut self, offset: i64, whence: SeekWhence) -> VfsResult<u64> {
        self.ops()?.seek(offset, whence)
    }

    pub fn fstat(&mut self) -> VfsResult<Stat> {
        self.ops()?.fstat()
    }

    pub fn ioctl(&mut self, request: IoctlRequest) -> VfsResult<usize> {
        self.ops()?.ioctl(request)
    }

    pub fn isatty(&self) -> bool {
        self.ops.as_ref().is_some_and(|o| o.isatty())
    }

    /// Release the backend state and the mount reference.
    pub fn close(mut self) -> VfsResult<()> {
        self.release()
    }

    fn release(&mut self) -> VfsResult<()> {
        let result = match self.ops.take() {
            Some(mut ops) => ops.close(),
            None => Ok(()),
        };
        self.mount = None;
        result
    }
}

impl Drop for FileHandle {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            log::warn!("implicit close failed: {}", e);
        }
    }
}

/// Open directory. For `/` it also carries the names of the mount points,
/// delivered after the root backend's own entries.
pub struct DirHandle {
    ops: Option<Box<dyn DirOps>>,
    mounts: VecDeque<String>,
    exhausted: bool,
    _mount: Option<Arc<Mount>>,
}

impl DirHandle {
    pub fn new(ops: Box<dyn DirOps>, mount: Arc<Mount>) -> Self {
        Self {
            ops: Some(ops),
            mounts: VecDeque::new(),
            exhausted: false,
            _mount: Some(mount),
        }
    }

    /// Root listing: backend entries (if any root backend) then mount names.
    pub fn root(
        ops: Option<Box<dyn DirOps>>,
        mount: Option<Arc<Mount>>,
        mounts: VecDeque<String>,
    ) -> Self {
        Self {
            ops,
            mounts,
            exhausted: false,
            _mount: mount,
        }
    }

    /// One entry per call. After the first `None`, always `None`.
    pub fn readdir(&mut self) -> VfsResult<Option<DirEntry>> {
        if self.exhausted {
            return Ok(None);
        }
        while let Some(ops) = self.ops.as_mut() {
            match ops.readdir()? {
                // Mount points hide same-named root entries
                Some(entry) if self.mounts.contains(&entry.name) => {}
                Some(entry) => return Ok(Some(entry)),
                None => {
                    if let Some(mut ops) = self.ops.take() {
                        ops.closedir()?;
                    }
                }
            }
        }
        match self.mounts.pop_front() {
            Some(name) => Ok(Some(DirEntry::new(name, FileType::Directory, 0))),
            None => {
                self.exhausted = true;
                Ok(None)
            }
        }
    }

    pub fn closedir(mut self) -> VfsResult<()> {
        self.release()
    }

    fn release(&mut self) -> VfsResult<()> {
        self.exhausted = true;
        self.mounts.clear();
        match self.ops.take() {
            Some(mut ops) => ops.closedir(),
            None => Ok(()),
        }
    }
}

impl Drop for DirHandle {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            log::warn!("implicit closedir failed: {}", e);
        }
    }
}
