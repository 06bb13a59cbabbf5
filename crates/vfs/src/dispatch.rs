//! TEAM_471: VFS Dispatch Layer
//!
//! High-level operations for the C-library shim. These join the path onto
//! the current directory, pick the mount by longest prefix and forward to the
//! backend. Every failure is returned as `Err` and also recorded as the last
//! error, which is what a newlib `errno` hook reads.

use alloc::collections::VecDeque;
use alloc::string::String;
use alloc::sync::Arc;
use core::sync::atomic::{AtomicI32, Ordering};

use pfs_utils::{Lazy, Mutex, RwLock, RwLockReadGuard};

use crate::error::{VfsError, VfsResult};
use crate::fd::{self, FdTable};
use crate::file::{DirHandle, FileHandle};
use crate::ioctl::IoctlRequest;
use crate::mount::{Mount, MountTable};
use crate::ops::{FileType, Filesystem, OpenFlags, SeekWhence, Stat};
use crate::path::PathList;
use crate::verbose;

pub struct Vfs {
    mounts: RwLock<MountTable>,
    fds: Mutex<FdTable>,
    /// Canonical current directory
    cwd: Mutex<String>,
    /// Positive errno of the most recent failure, 0 if none
    last_error: AtomicI32,
}

/// Global instance used by the C-library hooks.
pub static VFS: Lazy<Vfs> = Lazy::new(Vfs::new);

impl Vfs {
    pub fn new() -> Self {
        Self {
            mounts: RwLock::new(MountTable::new()),
            fds: Mutex::new(FdTable::new()),
            cwd: Mutex::new(String::from("/")),
            last_error: AtomicI32::new(0),
        }
    }

    fn record<T>(&self, result: VfsResult<T>) -> VfsResult<T> {
        if let Err(e) = &result {
            self.set_error(*e);
        }
        result
    }

    /// Record a failure detected before reaching the dispatch layer.
    pub fn set_error(&self, err: VfsError) {
        self.last_error.store(err.errno(), Ordering::Relaxed);
    }

    /// Errno of the most recent failed call.
    pub fn last_error(&self) -> i32 {
        self.last_error.load(Ordering::Relaxed)
    }

    pub fn clear_error(&self) {
        self.last_error.store(0, Ordering::Relaxed);
    }

    /// Join `path` onto the current directory.
    pub fn canonical(&self, path: &str) -> VfsResult<PathList> {
        let mut list = PathList::parse(self.cwd.lock().as_str())?;
        list.join(PathList::parse(path)?)?;
        Ok(list)
    }

    fn resolve_list(&self, list: &PathList) -> VfsResult<(Arc<Mount>, String)> {
        let (mount, rest) = self.mounts.read().resolve(list)?;
        verbose!("resolve {} -> {} [{}]", list, mount.mountpoint, rest);
        Ok((mount, rest))
    }

    /// Mount and backend-relative remainder for `path`.
    pub fn resolve(&self, path: &str) -> VfsResult<(Arc<Mount>, String)> {
        let r = self.canonical(path).and_then(|l| self.resolve_list(&l));
        self.record(r)
    }

    pub fn mounts(&self) -> RwLockReadGuard<'_, MountTable> {
        self.mounts.read()
    }

    // ========================================================================
    // Mounting
    // ========================================================================

    pub fn mount(&self, mountpoint: &str, fs: Arc<dyn Filesystem>) -> VfsResult<()> {
        let name = fs.name();
        let r = self.mounts.write().mount(mountpoint, fs);
        match &r {
            Ok(m) => log::info!("[VFS] mounted {} at {}", name, m.mountpoint),
            Err(e) => log::warn!("[VFS] mount {} at {} failed: {}", name, mountpoint, e),
        }
        self.record(r.map(|_| ()))
    }

    pub fn unmount(&self, mountpoint: &str) -> VfsResult<()> {
        let r = self.mounts.write().unmount(mountpoint);
        if let Ok(m) = &r {
            log::info!("[VFS] unmounted {}", m.mountpoint);
        }
        self.record(r.map(|_| ()))
    }

    // ========================================================================
    // Path operations
    // ========================================================================

    pub fn open(&self, path: &str, flags: OpenFlags) -> VfsResult<FileHandle> {
        self.record(self.try_open(path, flags))
    }

    fn try_open(&self, path: &str, flags: OpenFlags) -> VfsResult<FileHandle> {
        flags.access()?;
        let list = self.canonical(path)?;
        let (mount, rest) = self.resolve_list(&list)?;
        let ops = mount.fs.open(&rest, flags)?;
        verbose!("open {} on {}", list, mount.mountpoint);
        Ok(FileHandle::new(ops, mount))
    }

    pub fn stat(&self, path: &str) -> VfsResult<Stat> {
        self.record(self.try_stat(path))
    }

    fn try_stat(&self, path: &str) -> VfsResult<Stat> {
        let list = self.canonical(path)?;
        if list.is_root() && self.mounts.read().get("/").is_none() {
            // Synthetic root holding only mount points
            return Ok(Stat::new(FileType::Directory, 0));
        }
        let (mount, rest) = self.resolve_list(&list)?;
        mount.fs.stat(&rest)
    }

    pub fn opendir(&self, path: &str) -> VfsResult<DirHandle> {
        self.record(self.try_opendir(path))
    }

    fn try_opendir(&self, path: &str) -> VfsResult<DirHandle> {
        let list = self.canonical(path)?;
        if list.is_root() {
            return self.open_root_dir();
        }
        let (mount, rest) = self.resolve_list(&list)?;
        let ops = mount.fs.opendir(&rest)?;
        Ok(DirHandle::new(ops, mount))
    }

    /// Root listing: the root backend's entries followed by every top-level
    /// mount point, whether or not anything is mounted at `/`.
    fn open_root_dir(&self) -> VfsResult<DirHandle> {
        let (root, names) = {
            let table = self.mounts.read();
            (table.get("/").cloned(), table.top_level_names())
        };
        let mut mounts = VecDeque::new();
        mounts.try_reserve(names.len())?;
        mounts.extend(names);
        let ops = match &root {
            Some(m) => Some(m.fs.opendir("")?),
            None => None,
        };
        Ok(DirHandle::root(ops, root, mounts))
    }

    pub fn readdir(&self, dir: &mut DirHandle) -> VfsResult<Option<crate::ops::DirEntry>> {
        self.record(dir.readdir())
    }

    pub fn closedir(&self, dir: DirHandle) -> VfsResult<()> {
        self.record(dir.closedir())
    }

    fn with_backend<T>(&self, path: &str, f: impl FnOnce(&dyn Filesystem, &str) -> VfsResult<T>) -> VfsResult<T> {
        let r = self.resolve(path).and_then(|(mount, rest)| f(mount.fs.as_ref(), &rest));
        self.record(r)
    }

    pub fn mkdir(&self, path: &str, mode: u32) -> VfsResult<()> {
        self.with_backend(path, |fs, rest| fs.mkdir(rest, mode))
    }

    pub fn rmdir(&self, path: &str) -> VfsResult<()> {
        self.with_backend(path, |fs, rest| fs.rmdir(rest))
    }

    pub fn delete(&self, path: &str) -> VfsResult<()> {
        self.with_backend(path, |fs, rest| fs.delete(rest))
    }

    pub fn chmod(&self, path: &str, mode: u32) -> VfsResult<()> {
        self.with_backend(path, |fs, rest| fs.chmod(rest, mode))
    }

    /// Both names must live on the same mount.
    pub fn rename(&self, from: &str, to: &str) -> VfsResult<()> {
        self.record(self.try_rename(from, to))
    }

    fn try_rename(&self, from: &str, to: &str) -> VfsResult<()> {
        let (src, src_rest) = self.resolve_list(&self.canonical(from)?)?;
        let (dst, dst_rest) = self.resolve_list(&self.canonical(to)?)?;
        if !Arc::ptr_eq(&src, &dst) {
            return Err(VfsError::CrossDevice);
        }
        src.fs.rename(&src_rest, &dst_rest)
    }

    // ========================================================================
    // Current directory
    // ========================================================================

    pub fn chdir(&self, path: &str) -> VfsResult<()> {
        self.record(self.try_chdir(path))
    }

    fn try_chdir(&self, path: &str) -> VfsResult<()> {
        let target = self.canonical(path)?.render()?;
        if !self.try_stat(&target)?.is_dir() {
            return Err(VfsError::NotADirectory);
        }
        *self.cwd.lock() = target;
        Ok(())
    }

    pub fn getcwd(&self) -> String {
        self.cwd.lock().clone()
    }

    // ========================================================================
    // Descriptor interface
    // ========================================================================

    pub fn open_fd(&self, path: &str, flags: OpenFlags) -> VfsResult<usize> {
        let handle = self.open(path, flags)?;
        let r = self.fds.lock().alloc(handle);
        self.record(r)
    }

    /// Bind an already open handle to a fixed descriptor (stdio).
    pub fn install_fd(&self, fd: usize, handle: FileHandle) -> VfsResult<()> {
        let displaced = self.fds.lock().install(fd, handle);
        let r = displaced.and_then(|old| old.map_or(Ok(()), fd::release));
        self.record(r)
    }

    /// The table lock covers the lookup only; the backend call runs under
    /// the descriptor's own lock.
    fn with_fd<T>(&self, fd: usize, f: impl FnOnce(&mut FileHandle) -> VfsResult<T>) -> VfsResult<T> {
        let shared = self.fds.lock().get(fd);
        let r = shared.and_then(|h| f(&mut h.lock()));
        self.record(r)
    }

    pub fn read_fd(&self, fd: usize, buf: &mut [u8]) -> VfsResult<usize> {
        self.with_fd(fd, |h| h.read(buf))
    }

    pub fn write_fd(&self, fd: usize, buf: &[u8]) -> VfsResult<usize> {
        self.with_fd(fd, |h| h.write(buf))
    }

    pub fn seek_fd(&self, fd: usize, offset: i64, whence: SeekWhence) -> VfsResult<u64> {
        self.with_fd(fd, |h| h.seek(offset, whence))
    }

    pub fn fstat_fd(&self, fd: usize) -> VfsResult<Stat> {
        self.with_fd(fd, FileHandle::fstat)
    }

    pub fn ioctl_fd(&self, fd: usize, request: IoctlRequest) -> VfsResult<usize> {
        self.with_fd(fd, |h| h.ioctl(request))
    }

    /// False for closed descriptors as well as non-terminals.
    pub fn isatty_fd(&self, fd: usize) -> bool {
        self.with_fd(fd, |h| Ok(h.isatty())).unwrap_or(false)
    }

    /// Like [`Self::isatty_fd`] but reports why: `BadFd` or `NotATerminal`.
    pub fn tty_fd(&self, fd: usize) -> VfsResult<()> {
        self.with_fd(fd, |h| {
            if h.isatty() {
                Ok(())
            } else {
                Err(VfsError::NotATerminal)
            }
        })
    }

    pub fn close_fd(&self, fd: usize) -> VfsResult<()> {
        let taken = self.fds.lock().take(fd);
        self.record(taken.and_then(fd::release))
    }
}

impl Default for Vfs {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fd::STDIN;
    use crate::ops::{DirEntry, DirOps, FileOps};
    use alloc::boxed::Box;
    use core::sync::atomic::AtomicU32;
    use alloc::vec::Vec;
    use pfs_error::errno;

    /// Flat in-memory backend: a set of directories and files holding bytes.
    #[derive(Default)]
    struct MemFs {
        tag: &'static str,
        dirs: Mutex<Vec<String>>,
        /// Mode passed to the last mkdir
        last_mode: AtomicU32,
        files: Mutex<Vec<(String, Arc<Mutex<Vec<u8>>>)>>,
    }

    impl MemFs {
        fn new(tag: &'static str) -> Arc<Self> {
            let fs = Self {
                tag,
                ..Default::default()
            };
            fs.dirs.lock().push(String::new());
            Arc::new(fs)
        }

        fn put(&self, path: &str, data: &[u8]) {
            self.files
                .lock()
                .push((path.into(), Arc::new(Mutex::new(data.to_vec()))));
        }
    }

    struct MemFile {
        data: Arc<Mutex<Vec<u8>>>,
        pos: usize,
    }

    impl FileOps for MemFile {
        fn read(&mut self, buf: &mut [u8]) -> VfsResult<usize> {
            let data = self.data.lock();
            let n = buf.len().min(data.len().saturating_sub(self.pos));
            buf[..n].copy_from_slice(&data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }

        fn write(&mut self, buf: &[u8]) -> VfsResult<usize> {
            self.data.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn seek(&mut self, offset: i64, whence: SeekWhence) -> VfsResult<u64> {
            let size = self.data.lock().len() as u64;
            let pos = crate::ops::resolve_seek(self.pos as u64, size, offset, whence)?;
            self.pos = pos as usize;
            Ok(pos)
        }
    }

    struct MemDir(Vec<DirEntry>);

    impl DirOps for MemDir {
        fn readdir(&mut self) -> VfsResult<Option<DirEntry>> {
            Ok(if self.0.is_empty() { None } else { Some(self.0.remove(0)) })
        }
    }

    impl Filesystem for MemFs {
        fn name(&self) -> &'static str {
            self.tag
        }

        fn open(&self, path: &str, flags: OpenFlags) -> VfsResult<Box<dyn FileOps>> {
            let files = self.files.lock();
            let data = files.iter().find(|(p, _)| p == path).map(|(_, d)| d.clone());
            drop(files);
            let data = match data {
                Some(d) => d,
                None if flags.is_create() => {
                    let d = Arc::new(Mutex::new(Vec::new()));
                    self.files.lock().push((path.into(), d.clone()));
                    d
                }
                None => return Err(VfsError::NotFound),
            };
            Ok(Box::new(MemFile { data, pos: 0 }))
        }

        fn stat(&self, path: &str) -> VfsResult<Stat> {
            if self.dirs.lock().iter().any(|d| d == path) {
                return Ok(Stat::new(FileType::Directory, 0));
            }
            self.files
                .lock()
                .iter()
                .find(|(p, _)| p == path)
                .map(|(_, d)| Stat::new(FileType::Regular, d.lock().len() as u64))
                .ok_or(VfsError::NotFound)
        }

        fn mkdir(&self, path: &str, mode: u32) -> VfsResult<()> {
            self.last_mode.store(mode, Ordering::Relaxed);
            self.dirs.lock().push(path.into());
            Ok(())
        }

        fn rename(&self, from: &str, to: &str) -> VfsResult<()> {
            let mut files = self.files.lock();
            let entry = files.iter_mut().find(|(p, _)| p == from).ok_or(VfsError::NotFound)?;
            entry.0 = to.into();
            Ok(())
        }

        fn opendir(&self, path: &str) -> VfsResult<Box<dyn DirOps>> {
            if !self.dirs.lock().iter().any(|d| d == path) {
                return Err(VfsError::NotFound);
            }
            let entries = self
                .files
                .lock()
                .iter()
                .filter(|(p, _)| !p.contains('/'))
                .map(|(p, d)| DirEntry::new(p.clone(), FileType::Regular, d.lock().len() as u64))
                .collect();
            Ok(Box::new(MemDir(entries)))
        }
    }

    fn rd(h: &mut FileHandle) -> Vec<u8> {
        let mut buf = [0u8; 64];
        let n = h.read(&mut buf).unwrap();
        buf[..n].to_vec()
    }

    #[test]
    fn test_open_routes_by_longest_prefix() {
        let vfs = Vfs::new();
        let root = MemFs::new("root");
        let data = MemFs::new("data");
        root.put("x", b"from root");
        data.put("x", b"from data");
        vfs.mount("/", root).unwrap();
        vfs.mount("/data", data).unwrap();

        let mut h = vfs.open("/data/x", OpenFlags::new(OpenFlags::O_RDONLY)).unwrap();
        assert_eq!(rd(&mut h), b"from data");
        assert_eq!(h.mountpoint(), Some("/data"));
        h.close().unwrap();

        let mut h = vfs.open("/x", OpenFlags::new(0)).unwrap();
        assert_eq!(rd(&mut h), b"from root");
    }

    #[test]
    fn test_no_mount_is_reported() {
        let vfs = Vfs::new();
        vfs.mount("/sd", MemFs::new("sd")).unwrap();
        let err = vfs.open("/flash/x", OpenFlags::new(0)).err();
        assert_eq!(err, Some(VfsError::NoSuchMount));
        assert_eq!(vfs.last_error(), errno::ENODEV);
    }

    #[test]
    fn test_backend_error_sets_last_error() {
        let vfs = Vfs::new();
        vfs.mount("/", MemFs::new("root")).unwrap();
        assert_eq!(vfs.open("/missing", OpenFlags::new(0)).err(), Some(VfsError::NotFound));
        assert_eq!(vfs.last_error(), errno::ENOENT);
        assert_eq!(vfs.rmdir("/x"), Err(VfsError::NotSupported));
        assert_eq!(vfs.last_error(), errno::EOPNOTSUPP);
        vfs.clear_error();
        assert_eq!(vfs.last_error(), 0);
    }

    #[test]
    fn test_conflicting_access_mode_rejected() {
        let vfs = Vfs::new();
        vfs.mount("/", MemFs::new("root")).unwrap();
        let flags = OpenFlags::new(OpenFlags::O_WRONLY | OpenFlags::O_RDWR);
        assert_eq!(vfs.open("/x", flags).err(), Some(VfsError::InvalidArgument));
    }

    #[test]
    fn test_unmount_busy_with_open_handle() {
        let vfs = Vfs::new();
        let sd = MemFs::new("sd");
        sd.put("f", b"1");
        vfs.mount("sd", sd).unwrap();
        let h = vfs.open("/sd/f", OpenFlags::new(0)).unwrap();
        assert_eq!(vfs.unmount("/sd"), Err(VfsError::Busy));
        h.close().unwrap();
        vfs.unmount("/sd").unwrap();
        assert_eq!(vfs.unmount("/sd"), Err(VfsError::NoSuchMount));
    }

    #[test]
    fn test_root_listing_without_root_mount() {
        let vfs = Vfs::new();
        vfs.mount("/sd", MemFs::new("sd")).unwrap();
        vfs.mount("/flash", MemFs::new("flash")).unwrap();
        vfs.mount("/flash/deep", MemFs::new("deep")).unwrap();

        assert!(vfs.stat("/").unwrap().is_dir());
        let mut dir = vfs.opendir("/").unwrap();
        let mut names = Vec::new();
        while let Some(e) = vfs.readdir(&mut dir).unwrap() {
            assert_eq!(e.file_type, FileType::Directory);
            names.push(e.name);
        }
        assert_eq!(names, ["flash", "sd"]);
        assert_eq!(vfs.readdir(&mut dir).unwrap(), None);
        vfs.closedir(dir).unwrap();
    }

    #[test]
    fn test_root_listing_merges_root_backend() {
        let vfs = Vfs::new();
        let root = MemFs::new("root");
        root.put("readme", b"hi");
        vfs.mount("/", root).unwrap();
        vfs.mount("/dev", MemFs::new("dev")).unwrap();
        let mut dir = vfs.opendir("/").unwrap();
        let first = vfs.readdir(&mut dir).unwrap().unwrap();
        assert_eq!((first.name.as_str(), first.file_type), ("readme", FileType::Regular));
        assert_eq!(vfs.readdir(&mut dir).unwrap().unwrap().name, "dev");
        assert!(vfs.readdir(&mut dir).unwrap().is_none());
    }

    #[test]
    fn test_rename_across_mounts() {
        let vfs = Vfs::new();
        let a = MemFs::new("a");
        a.put("f", b"");
        vfs.mount("/a", a).unwrap();
        vfs.mount("/b", MemFs::new("b")).unwrap();
        assert_eq!(vfs.rename("/a/f", "/b/f"), Err(VfsError::CrossDevice));
        assert_eq!(vfs.last_error(), errno::EXDEV);
        vfs.rename("/a/f", "/a/g").unwrap();
        assert!(vfs.stat("/a/g").is_ok());
    }

    #[test]
    fn test_chdir_and_relative_paths() {
        let vfs = Vfs::new();
        let sd = MemFs::new("sd");
        sd.mkdir("logs", 0o755).unwrap();
        sd.put("logs/today", b"ok");
        sd.put("top", b"");
        vfs.mount("/sd", sd).unwrap();

        vfs.chdir("/sd/logs").unwrap();
        assert_eq!(vfs.getcwd(), "/sd/logs");
        let mut h = vfs.open("today", OpenFlags::new(0)).unwrap();
        assert_eq!(rd(&mut h), b"ok");
        assert!(vfs.stat("../top").is_ok());
        assert_eq!(vfs.chdir("../top"), Err(VfsError::NotADirectory));
        assert_eq!(vfs.getcwd(), "/sd/logs");
        vfs.chdir("..\\..").unwrap();
        assert_eq!(vfs.getcwd(), "/");
    }

    #[test]
    fn test_descriptor_round_trip() {
        let vfs = Vfs::new();
        vfs.mount("/", MemFs::new("root")).unwrap();
        let flags = OpenFlags::new(OpenFlags::O_RDWR) | OpenFlags::O_CREAT;
        let fd = vfs.open_fd("/log", flags).unwrap();
        assert_eq!(fd, 3);
        assert_eq!(vfs.write_fd(fd, b"hello").unwrap(), 5);
        assert_eq!(vfs.seek_fd(fd, 1, SeekWhence::Set).unwrap(), 1);
        let mut buf = [0u8; 8];
        assert_eq!(vfs.read_fd(fd, &mut buf).unwrap(), 4);
        assert_eq!(&buf[..4], b"ello");
        assert!(!vfs.isatty_fd(fd));
        assert_eq!(vfs.ioctl_fd(fd, IoctlRequest::Purge), Err(VfsError::NotSupported));
        vfs.close_fd(fd).unwrap();
        assert_eq!(vfs.read_fd(fd, &mut buf), Err(VfsError::BadFd));
        assert_eq!(vfs.close_fd(fd), Err(VfsError::BadFd));
        assert_eq!(vfs.last_error(), errno::EBADF);
    }

    #[test]
    fn test_mkdir_passes_mode_to_backend() {
        let vfs = Vfs::new();
        let sd = MemFs::new("sd");
        vfs.mount("/sd", sd.clone()).unwrap();
        vfs.mkdir("/sd/logs", 0o750).unwrap();
        assert_eq!(sd.last_mode.load(Ordering::Relaxed), 0o750);
        assert!(vfs.stat("/sd/logs").unwrap().is_dir());
    }

    /// Writes to another descriptor from inside its own read, as a console
    /// whose backpressure warning is logged to stdout does.
    struct Relay {
        vfs: Arc<Vfs>,
        to: usize,
    }

    impl FileOps for Relay {
        fn read(&mut self, _buf: &mut [u8]) -> VfsResult<usize> {
            self.vfs.write_fd(self.to, b"warn")?;
            Ok(0)
        }
    }

    #[test]
    fn test_descriptor_call_inside_blocking_read() {
        let vfs = Arc::new(Vfs::new());
        vfs.mount("/", MemFs::new("root")).unwrap();
        let flags = OpenFlags::new(OpenFlags::O_RDWR) | OpenFlags::O_CREAT;
        let out = vfs.open_fd("/out", flags).unwrap();
        let relay = Relay {
            vfs: vfs.clone(),
            to: out,
        };
        vfs.install_fd(STDIN, FileHandle::detached(Box::new(relay))).unwrap();

        assert_eq!(vfs.read_fd(STDIN, &mut [0u8; 8]), Ok(0));
        vfs.seek_fd(out, 0, SeekWhence::Set).unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(vfs.read_fd(out, &mut buf), Ok(4));
        assert_eq!(&buf[..4], b"warn");

        // Drops the relay's reference back to the table
        vfs.close_fd(STDIN).unwrap();
    }
}
