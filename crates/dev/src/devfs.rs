//! TEAM_472: Device filesystem
//!
//! A flat namespace of character devices. A registered name ending in `*`
//! matches any name with that prefix, and the driver receives the full name
//! so it can parse settings out of it (`uart0:115200` style).
//!
//! Listing order is most recently registered first.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use pfs_utils::{Lazy, RwLock};
use pfs_vfs::ops::{DirEntry, DirOps, FileOps, FileType, Filesystem, OpenFlags, Stat};
use pfs_vfs::{VfsError, VfsResult};

/// A driver that can be attached with [`DeviceFs::mknod`].
pub trait Device: Send + Sync {
    /// `name` is the full name used to open the node.
    fn open(self: Arc<Self>, name: &str, flags: OpenFlags) -> VfsResult<Box<dyn FileOps>>;
}

struct Node {
    /// As registered, including any trailing `*`
    name: String,
    /// Length of the part that must match
    prefix_len: usize,
    device: Arc<dyn Device>,
}

impl Node {
    fn matches(&self, name: &str) -> bool {
        let wildcard = self.prefix_len < self.name.len();
        let prefix = &self.name[..self.prefix_len];
        if wildcard {
            name.starts_with(prefix)
        } else {
            name == prefix
        }
    }
}

#[derive(Default)]
pub struct DeviceFs {
    nodes: RwLock<Vec<Node>>,
}

static DEVFS: Lazy<Arc<DeviceFs>> = Lazy::new(|| Arc::new(DeviceFs::new()));

/// The single device filesystem instance, ready to mount.
pub fn fetch() -> Arc<DeviceFs> {
    DEVFS.clone()
}

fn strip(name: &str) -> &str {
    name.strip_prefix('/').unwrap_or(name)
}

impl DeviceFs {
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(Vec::new()),
        }
    }

    /// Attach `device` under `name`. There is no permission model, so `mode`
    /// is accepted and ignored.
    pub fn mknod(&self, name: &str, _mode: u32, device: Arc<dyn Device>) -> VfsResult<()> {
        let name = strip(name);
        if name.is_empty() {
            return Err(VfsError::InvalidArgument);
        }
        let prefix_len = name.strip_suffix('*').map_or(name.len(), str::len);
        let mut owned = String::new();
        owned.try_reserve(name.len())?;
        owned.push_str(name);

        let mut nodes = self.nodes.write();
        nodes.try_reserve(1)?;
        nodes.insert(
            0,
            Node {
                name: owned,
                prefix_len,
                device,
            },
        );
        log::info!("[DEV] registered /dev/{}", name);
        Ok(())
    }

    fn find(&self, name: &str) -> Option<Arc<dyn Device>> {
        self.nodes
            .read()
            .iter()
            .find(|n| n.matches(name))
            .map(|n| n.device.clone())
    }

    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }
}

struct DevDir {
    names: Vec<String>,
}

impl DirOps for DevDir {
    fn readdir(&mut self) -> VfsResult<Option<DirEntry>> {
        if self.names.is_empty() {
            return Ok(None);
        }
        let name = self.names.remove(0);
        Ok(Some(DirEntry::new(name, FileType::CharDevice, 0)))
    }
}

impl Filesystem for DeviceFs {
    fn name(&self) -> &'static str {
        "devfs"
    }

    fn open(&self, path: &str, flags: OpenFlags) -> VfsResult<Box<dyn FileOps>> {
        let name = strip(path);
        let device = self.find(name).ok_or(VfsError::NoDevice)?;
        device.open(name, flags)
    }

    fn stat(&self, path: &str) -> VfsResult<Stat> {
        let name = strip(path);
        if name.is_empty() {
            return Ok(Stat::new(FileType::Directory, 0));
        }
        self.find(name)
            .map(|_| Stat::new(FileType::CharDevice, 0))
            .ok_or(VfsError::NoDevice)
    }

    fn opendir(&self, path: &str) -> VfsResult<Box<dyn DirOps>> {
        if !strip(path).is_empty() {
            return Err(VfsError::NotADirectory);
        }
        let nodes = self.nodes.read();
        let mut names = Vec::new();
        names.try_reserve(nodes.len())?;
        names.extend(nodes.iter().map(|n| n.name.clone()));
        Ok(Box::new(DevDir { names }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pfs_utils::Mutex;

    /// Records every name it is opened with.
    #[derive(Default)]
    struct StubDevice {
        opened: Mutex<Vec<String>>,
    }

    struct StubFile;
    impl FileOps for StubFile {}

    impl Device for StubDevice {
        fn open(self: Arc<Self>, name: &str, _flags: OpenFlags) -> VfsResult<Box<dyn FileOps>> {
            self.opened.lock().push(name.into());
            Ok(Box::new(StubFile))
        }
    }

    fn rdonly() -> OpenFlags {
        OpenFlags::new(OpenFlags::O_RDONLY)
    }

    #[test]
    fn test_exact_and_wildcard_names() {
        let fs = DeviceFs::new();
        let uart = Arc::new(StubDevice::default());
        let led = Arc::new(StubDevice::default());
        fs.mknod("uart*", 0, uart.clone()).unwrap();
        fs.mknod("led", 0, led.clone()).unwrap();

        assert!(fs.open("uart0:9600", rdonly()).is_ok());
        assert!(fs.open("/uart", rdonly()).is_ok());
        assert!(fs.open("led", rdonly()).is_ok());
        assert!(matches!(fs.open("led1", rdonly()), Err(VfsError::NoDevice)));
        assert!(matches!(fs.open("ua", rdonly()), Err(VfsError::NoDevice)));

        assert_eq!(*uart.opened.lock(), ["uart0:9600", "uart"]);
        assert_eq!(*led.opened.lock(), ["led"]);
    }

    #[test]
    fn test_stat() {
        let fs = DeviceFs::new();
        fs.mknod("tty", 0, Arc::new(StubDevice::default())).unwrap();
        assert!(fs.stat("").unwrap().is_dir());
        assert!(fs.stat("/").unwrap().is_dir());
        let st = fs.stat("tty").unwrap();
        assert!(pfs_vfs::mode::is_chr(st.mode));
        assert_eq!(st.nlink, 1);
        assert_eq!(fs.stat("nope"), Err(VfsError::NoDevice));
    }

    #[test]
    fn test_listing_newest_first() {
        let fs = DeviceFs::new();
        for name in ["tty", "uart0", "gpio*"] {
            fs.mknod(name, 0, Arc::new(StubDevice::default())).unwrap();
        }
        let mut dir = fs.opendir("").unwrap();
        let mut names = Vec::new();
        while let Some(e) = dir.readdir().unwrap() {
            assert_eq!(e.file_type, FileType::CharDevice);
            names.push(e.name);
        }
        assert_eq!(names, ["gpio*", "uart0", "tty"]);
        assert!(dir.readdir().unwrap().is_none());
        assert!(matches!(fs.opendir("tty"), Err(VfsError::NotADirectory)));
    }

    #[test]
    fn test_newer_registration_shadows_older() {
        let fs = DeviceFs::new();
        let old = Arc::new(StubDevice::default());
        let new = Arc::new(StubDevice::default());
        fs.mknod("con", 0, old.clone()).unwrap();
        fs.mknod("con", 0, new.clone()).unwrap();
        fs.open("con", rdonly()).unwrap();
        assert!(old.opened.lock().is_empty());
        assert_eq!(new.opened.lock().len(), 1);
    }

    #[test]
    fn test_empty_name_rejected() {
        let fs = DeviceFs::new();
        assert_eq!(
            fs.mknod("", 0, Arc::new(StubDevice::default())),
            Err(VfsError::InvalidArgument)
        );
        assert!(fs.is_empty());
    }

    #[test]
    fn test_unset_slots() {
        let fs = DeviceFs::new();
        assert_eq!(fs.mkdir("x", 0o755), Err(VfsError::NotSupported));
        assert_eq!(fs.delete("x"), Err(VfsError::NotSupported));
        assert_eq!(fs.rename("x", "y"), Err(VfsError::NotSupported));
        assert_eq!(fs.chmod("x", 0), Err(VfsError::NotSupported));
    }
}
