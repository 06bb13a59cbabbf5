//! TEAM_482: littlefs region as a VFS backend
//!
//! Paths below the mount point go to the engine unchanged. Every engine call
//! is made under one `spin::Mutex`; open files and directory listings hold a
//! clone of it and their engine handle.

use alloc::boxed::Box;
use alloc::sync::Arc;

use pfs_utils::Mutex;
use pfs_vfs::{
    DirEntry, DirOps, FileOps, FileType, Filesystem, OpenFlags, SeekWhence, Stat, VfsError,
    VfsResult,
};

use crate::lfs::{FlashConfig, Lfs, LfsInfo, LfsOpenFlags, LfsType};

fn stat_of(info: &LfsInfo) -> Stat {
    match info.kind {
        LfsType::Dir => Stat::new(FileType::Directory, u64::from(info.size)),
        LfsType::Reg => Stat::new(FileType::Regular, u64::from(info.size)),
    }
}

pub struct FlashFs<L: Lfs> {
    lfs: Arc<Mutex<L>>,
    cfg: FlashConfig,
}

impl<L: Lfs> FlashFs<L> {
    /// Mount the region, formatting it first if it holds no valid
    /// filesystem.
    pub fn create(mut lfs: L, cfg: FlashConfig) -> VfsResult<Self> {
        if let Err(e) = lfs.mount(&cfg) {
            log::warn!("[FLASH] mount at {:#x} failed ({}), formatting", cfg.offset, e);
            lfs.format(&cfg)?;
            lfs.mount(&cfg)?;
        }
        log::info!(
            "[FLASH] {} blocks of {} bytes at {:#x}",
            cfg.block_count,
            cfg.block_size,
            cfg.offset
        );
        Ok(Self {
            lfs: Arc::new(Mutex::new(lfs)),
            cfg,
        })
    }

    pub fn config(&self) -> &FlashConfig {
        &self.cfg
    }

    /// Run `f` with exclusive access to the engine.
    pub fn with_engine<R>(&self, f: impl FnOnce(&mut L) -> R) -> R {
        f(&mut self.lfs.lock())
    }
}

impl<L: Lfs + 'static> Filesystem for FlashFs<L> {
    fn name(&self) -> &'static str {
        "flash"
    }

    fn open(&self, path: &str, flags: OpenFlags) -> VfsResult<Box<dyn FileOps>> {
        let lfs_flags = LfsOpenFlags::from_vfs(flags)?;
        let file = self.lfs.lock().file_open(path, lfs_flags)?;
        pfs_vfs::verbose!("[FLASH] open {} flags {:#x}", path, lfs_flags.bits());
        Ok(Box::new(FlashFile {
            lfs: self.lfs.clone(),
            file: Some(file),
        }))
    }

    fn stat(&self, path: &str) -> VfsResult<Stat> {
        let info = self.lfs.lock().stat(path)?;
        Ok(stat_of(&info))
    }

    fn rename(&self, from: &str, to: &str) -> VfsResult<()> {
        Ok(self.lfs.lock().rename(from, to)?)
    }

    fn delete(&self, path: &str) -> VfsResult<()> {
        Ok(self.lfs.lock().remove(path)?)
    }

    fn mkdir(&self, path: &str, _mode: u32) -> VfsResult<()> {
        Ok(self.lfs.lock().mkdir(path)?)
    }

    fn rmdir(&self, path: &str) -> VfsResult<()> {
        let mut lfs = self.lfs.lock();
        if lfs.stat(path)?.kind != LfsType::Dir {
            return Err(VfsError::NotADirectory);
        }
        Ok(lfs.remove(path)?)
    }

    fn opendir(&self, path: &str) -> VfsResult<Box<dyn DirOps>> {
        let dir = self.lfs.lock().dir_open(path)?;
        Ok(Box::new(FlashDir {
            lfs: self.lfs.clone(),
            dir: Some(dir),
        }))
    }

    /// Permission bits are fixed on this backend.
    fn chmod(&self, _path: &str, _mode: u32) -> VfsResult<()> {
        Err(VfsError::InvalidArgument)
    }
}

struct FlashFile<L: Lfs> {
    lfs: Arc<Mutex<L>>,
    file: Option<L::File>,
}

impl<L: Lfs> FlashFile<L> {
    fn with_file<T>(
        &mut self,
        f: impl FnOnce(&mut L, &mut L::File) -> crate::LfsResult<T>,
    ) -> VfsResult<T> {
        let file = self.file.as_mut().ok_or(VfsError::BadFd)?;
        Ok(f(&mut self.lfs.lock(), file)?)
    }
}

impl<L: Lfs + 'static> FileOps for FlashFile<L> {
    fn read(&mut self, buf: &mut [u8]) -> VfsResult<usize> {
        self.with_file(|lfs, file| lfs.file_read(file, buf))
    }

    fn write(&mut self, buf: &[u8]) -> VfsResult<usize> {
        self.with_file(|lfs, file| lfs.file_write(file, buf))
    }

    fn seek(&mut self, offset: i64, whence: SeekWhence) -> VfsResult<u64> {
        let offset = i32::try_from(offset).map_err(|_| VfsError::InvalidArgument)?;
        let pos = self.with_file(|lfs, file| lfs.file_seek(file, offset, whence.into()))?;
        Ok(u64::from(pos))
    }

    fn fstat(&mut self) -> VfsResult<Stat> {
        let size = self.with_file(|lfs, file| lfs.file_size(file))?;
        Ok(Stat::new(FileType::Regular, u64::from(size)))
    }

    fn close(&mut self) -> VfsResult<()> {
        match self.file.take() {
            Some(file) => Ok(self.lfs.lock().file_close(file)?),
            None => Ok(()),
        }
    }
}

impl<L: Lfs> Drop for FlashFile<L> {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = self.lfs.lock().file_close(file);
        }
    }
}

struct FlashDir<L: Lfs> {
    lfs: Arc<Mutex<L>>,
    dir: Option<L::Dir>,
}

impl<L: Lfs + 'static> DirOps for FlashDir<L> {
    fn readdir(&mut self) -> VfsResult<Option<DirEntry>> {
        let Some(dir) = self.dir.as_mut() else {
            return Ok(None);
        };
        let mut lfs = self.lfs.lock();
        while let Some(info) = lfs.dir_read(dir)? {
            if info.name == "." || info.name == ".." {
                continue;
            }
            let kind = match info.kind {
                LfsType::Dir => FileType::Directory,
                LfsType::Reg => FileType::Regular,
            };
            return Ok(Some(DirEntry::new(info.name, kind, u64::from(info.size))));
        }
        Ok(None)
    }

    fn closedir(&mut self) -> VfsResult<()> {
        match self.dir.take() {
            Some(dir) => Ok(self.lfs.lock().dir_close(dir)?),
            None => Ok(()),
        }
    }
}

impl<L: Lfs> Drop for FlashDir<L> {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            let _ = self.lfs.lock().dir_close(dir);
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ram::RamLfs;
    use pfs_vfs::mode;
    use std::string::String;
    use std::vec::Vec;

    fn cfg() -> FlashConfig {
        FlashConfig::new(0x10_0000, 16 * 4096).unwrap()
    }

    fn fresh() -> FlashFs<RamLfs> {
        FlashFs::create(RamLfs::new(), cfg()).unwrap()
    }

    fn flags(bits: u32) -> OpenFlags {
        OpenFlags::new(bits)
    }

    fn list(fs: &FlashFs<RamLfs>, path: &str) -> Vec<String> {
        let mut dir = fs.opendir(path).unwrap();
        let mut out = Vec::new();
        while let Some(e) = dir.readdir().unwrap() {
            out.push(e.name);
        }
        dir.closedir().unwrap();
        out
    }

    #[test]
    fn test_blank_flash_is_formatted_once() {
        let fs = fresh();
        fs.with_engine(|lfs| {
            assert_eq!(lfs.format_count, 1);
            assert_eq!(lfs.mount_count, 1);
            lfs.unmount().unwrap();
        });

        let mut lfs = RamLfs::new();
        lfs.format(&cfg()).unwrap();
        let fs = FlashFs::create(lfs, cfg()).unwrap();
        fs.with_engine(|lfs| assert_eq!(lfs.format_count, 1));
    }

    #[test]
    fn test_file_round_trip() {
        let fs = fresh();
        let mut f = fs
            .open("/notes.txt", flags(OpenFlags::O_RDWR | OpenFlags::O_CREAT))
            .unwrap();
        assert_eq!(f.write(b"flash data").unwrap(), 10);
        assert_eq!(f.seek(6, SeekWhence::Set).unwrap(), 6);
        let mut buf = [0u8; 16];
        assert_eq!(f.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf[..4], b"data");
        assert_eq!(f.fstat().unwrap().size, 10);
        f.close().unwrap();
        assert_eq!(f.read(&mut buf), Err(VfsError::BadFd));
    }

    #[test]
    fn test_stat_modes() {
        let fs = fresh();
        fs.mkdir("logs", 0o755).unwrap();
        fs.open("logs/a", flags(OpenFlags::O_WRONLY | OpenFlags::O_CREAT))
            .unwrap()
            .write(b"abc")
            .unwrap();

        let dir = fs.stat("logs").unwrap();
        assert!(mode::is_dir(dir.mode));
        assert_eq!(dir.mode & 0o777, mode::S_IRWXUGO);

        let file = fs.stat("logs/a").unwrap();
        assert!(mode::is_reg(file.mode));
        assert_eq!(file.size, 3);
        assert_eq!(file.nlink, 1);
        assert_eq!(fs.stat("missing"), Err(VfsError::NotFound));
    }

    #[test]
    fn test_open_flags_reach_engine() {
        let fs = fresh();
        let excl = flags(OpenFlags::O_WRONLY | OpenFlags::O_CREAT | OpenFlags::O_EXCL);
        fs.open("x", excl).unwrap().close().unwrap();
        assert_eq!(fs.open("x", excl).err(), Some(VfsError::AlreadyExists));
        assert_eq!(
            fs.open("nope", flags(OpenFlags::O_RDONLY)).err(),
            Some(VfsError::NotFound)
        );

        let mut f = fs.open("x", flags(OpenFlags::O_WRONLY | OpenFlags::O_APPEND)).unwrap();
        f.write(b"12").unwrap();
        f.write(b"34").unwrap();
        assert_eq!(fs.stat("x").unwrap().size, 4);
        assert_eq!(f.read(&mut [0u8; 4]), Err(VfsError::BadFd));

        fs.open("x", flags(OpenFlags::O_WRONLY | OpenFlags::O_TRUNC)).unwrap();
        assert_eq!(fs.stat("x").unwrap().size, 0);
    }

    #[test]
    fn test_directory_listing_skips_dot_entries() {
        let fs = fresh();
        fs.mkdir("d", 0o755).unwrap();
        fs.open("d/one", flags(OpenFlags::O_WRONLY | OpenFlags::O_CREAT)).unwrap();
        fs.open("top", flags(OpenFlags::O_WRONLY | OpenFlags::O_CREAT)).unwrap();
        assert_eq!(list(&fs, ""), ["d", "top"]);
        assert_eq!(list(&fs, "d"), ["one"]);
        assert_eq!(fs.opendir("top").err(), Some(VfsError::NotADirectory));
    }

    #[test]
    fn test_rename_remove_rmdir() {
        let fs = fresh();
        fs.mkdir("d", 0o755).unwrap();
        fs.open("d/f", flags(OpenFlags::O_WRONLY | OpenFlags::O_CREAT)).unwrap();
        assert_eq!(fs.rmdir("d"), Err(VfsError::DirectoryNotEmpty));
        assert_eq!(fs.rmdir("d/f"), Err(VfsError::NotADirectory));

        fs.rename("d/f", "g").unwrap();
        assert_eq!(fs.stat("d/f"), Err(VfsError::NotFound));
        fs.rmdir("d").unwrap();
        fs.delete("g").unwrap();
        assert!(list(&fs, "").is_empty());
    }

    #[test]
    fn test_chmod_is_rejected() {
        let fs = fresh();
        assert_eq!(fs.chmod("anything", 0o644), Err(VfsError::InvalidArgument));
    }

    #[test]
    fn test_region_fills_up() {
        let fs = FlashFs::create(RamLfs::new(), FlashConfig::new(0, 2 * 4096).unwrap()).unwrap();
        let mut f = fs
            .open("big", flags(OpenFlags::O_WRONLY | OpenFlags::O_CREAT))
            .unwrap();
        f.write(&[0xA5; 8192]).unwrap();
        assert_eq!(f.write(&[0]), Err(VfsError::NoSpace));
    }

    #[test]
    fn test_seek_range() {
        let fs = fresh();
        let mut f = fs
            .open("s", flags(OpenFlags::O_RDWR | OpenFlags::O_CREAT))
            .unwrap();
        assert_eq!(f.seek(i64::from(i32::MAX) + 1, SeekWhence::Set), Err(VfsError::InvalidArgument));
        assert_eq!(f.seek(-1, SeekWhence::Set), Err(VfsError::InvalidArgument));
        assert!(!f.isatty());
    }
}
