//! TEAM_479: FAT volume as a VFS backend
//!
//! All engine calls go through one `spin::Mutex` around the
//! `embedded-sdmmc` volume manager; open files keep a clone of that lock.
//! Names are 8.3. Directories are walked one component at a time and closed
//! again before the call returns, so only open files hold engine handles.

use alloc::boxed::Box;
use alloc::collections::VecDeque;
use alloc::string::ToString;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt::Debug;

use embedded_sdmmc::{self as sdmmc, Mode, RawDirectory, RawFile, RawVolume, VolumeIdx, VolumeManager};
use pfs_utils::Mutex;
use pfs_vfs::ops::resolve_seek;
use pfs_vfs::{
    DirEntry, DirOps, FileOps, FileType, Filesystem, OpenFlags, SeekWhence, Stat, VfsError,
    VfsResult,
};

use crate::media::{BlockMedia, PartitionedMedia};
use crate::rtc::{Rtc, RtcTimeSource};
use crate::sdmmc::SdmmcDevice;

type Manager<M, R> = VolumeManager<SdmmcDevice<M>, RtcTimeSource<R>, 4, 4, 1>;

fn fat_error<E: Debug + Into<VfsError>>(err: sdmmc::Error<E>) -> VfsError {
    use sdmmc::Error;
    match err {
        Error::DeviceError(e) => e.into(),
        Error::NotFound => VfsError::NotFound,
        Error::FileAlreadyExists | Error::DirAlreadyExists => VfsError::AlreadyExists,
        Error::FilenameError(_) | Error::InvalidOffset => VfsError::InvalidArgument,
        Error::TooManyOpenFiles | Error::TooManyOpenDirs => VfsError::TooManyOpenFiles,
        Error::NotEnoughSpace => VfsError::NoSpace,
        Error::OpenedDirAsFile | Error::DeleteDirAsFile => VfsError::IsADirectory,
        Error::OpenedFileAsDir => VfsError::NotADirectory,
        Error::ReadOnly => VfsError::AccessDenied,
        Error::FileAlreadyOpen | Error::DirAlreadyOpen => VfsError::Busy,
        Error::Unsupported => VfsError::NotSupported,
        other => {
            log::warn!("[FAT] engine error {:?}", other);
            VfsError::IoError
        }
    }
}

/// Engine mode for a set of open flags. Exclusive creation is checked by the
/// caller.
fn engine_mode(flags: OpenFlags) -> Mode {
    if !flags.is_writable() {
        return Mode::ReadOnly;
    }
    match (flags.is_create(), flags.is_truncate()) {
        (true, true) => Mode::ReadWriteCreateOrTruncate,
        (true, false) => Mode::ReadWriteCreateOrAppend,
        (false, true) => Mode::ReadWriteTruncate,
        (false, false) => Mode::ReadWriteAppend,
    }
}

fn components(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

struct Volume<M: BlockMedia, R: Rtc> {
    mgr: Manager<M, R>,
    raw: RawVolume,
}

impl<M: BlockMedia, R: Rtc> Volume<M, R> {
    /// Open the directory named by `names`, starting at the root.
    fn walk(&self, names: &[&str]) -> VfsResult<RawDirectory> {
        let mut dir = self.mgr.open_root_dir(self.raw).map_err(fat_error)?;
        for name in names {
            let next = self.mgr.open_dir(dir, *name).map_err(fat_error);
            self.release(dir);
            dir = next?;
        }
        Ok(dir)
    }

    fn release(&self, dir: RawDirectory) {
        if let Err(e) = self.mgr.close_dir(dir) {
            log::warn!("[FAT] close_dir failed: {:?}", e);
        }
    }

    /// Run `f` on the parent directory of `path` and its last component.
    fn in_parent<T>(
        &self,
        path: &str,
        f: impl FnOnce(&Manager<M, R>, RawDirectory, &str) -> VfsResult<T>,
    ) -> VfsResult<T> {
        let names = components(path);
        let Some((leaf, parents)) = names.split_last() else {
            return Err(VfsError::InvalidArgument);
        };
        let dir = self.walk(parents)?;
        let result = f(&self.mgr, dir, *leaf);
        self.release(dir);
        result
    }
}

pub struct FatFs<M: BlockMedia, R: Rtc> {
    volume: Arc<Mutex<Volume<M, R>>>,
}

impl<M: BlockMedia, R: Rtc> FatFs<M, R> {
    /// Initialize `media`, find its partition and open the FAT volume on it.
    pub fn mount(media: M, rtc: R) -> VfsResult<Self> {
        let mut media = PartitionedMedia::new(media);
        media.initialize()?;
        let mgr = VolumeManager::new(SdmmcDevice::new(media), RtcTimeSource::new(rtc));
        let raw = mgr.open_raw_volume(VolumeIdx(0)).map_err(fat_error)?;
        log::info!("[FAT] volume opened");
        Ok(Self {
            volume: Arc::new(Mutex::new(Volume { mgr, raw })),
        })
    }

    /// Close the volume. Fails with `Busy` while files are open.
    pub fn unmount(self) -> VfsResult<()> {
        let volume = Arc::try_unwrap(self.volume).map_err(|_| VfsError::Busy)?;
        let Volume { mgr, raw } = volume.into_inner();
        mgr.close_volume(raw).map_err(fat_error)?;
        Ok(())
    }

    fn open_in(
        mgr: &Manager<M, R>,
        dir: RawDirectory,
        leaf: &str,
        flags: OpenFlags,
    ) -> VfsResult<RawFile> {
        if flags.is_create() && flags.is_exclusive() && mgr.find_directory_entry(dir, leaf).is_ok()
        {
            return Err(VfsError::AlreadyExists);
        }
        let file = mgr
            .open_file_in_dir(dir, leaf, engine_mode(flags))
            .map_err(fat_error)?;
        // The append modes leave the cursor at the end
        if flags.is_writable() && !flags.is_append() {
            if let Err(e) = mgr.file_seek_from_start(file, 0) {
                let _ = mgr.close_file(file);
                return Err(fat_error(e));
            }
        }
        Ok(file)
    }
}

impl<M, R> Filesystem for FatFs<M, R>
where
    M: BlockMedia + 'static,
    R: Rtc + 'static,
{
    fn name(&self) -> &'static str {
        "fat"
    }

    fn open(&self, path: &str, flags: OpenFlags) -> VfsResult<Box<dyn FileOps>> {
        flags.access()?;
        if components(path).is_empty() {
            return Err(VfsError::IsADirectory);
        }
        let vol = self.volume.lock();
        let file = vol.in_parent(path, |mgr, dir, leaf| Self::open_in(mgr, dir, leaf, flags))?;
        pfs_vfs::verbose!("[FAT] open {} flags {:#o}", path, flags.bits());
        Ok(Box::new(FatFile {
            volume: self.volume.clone(),
            file: Some(file),
            append: flags.is_append(),
        }))
    }

    fn stat(&self, path: &str) -> VfsResult<Stat> {
        if components(path).is_empty() {
            return Ok(Stat::new(FileType::Directory, 0));
        }
        let vol = self.volume.lock();
        let entry = vol.in_parent(path, |mgr, dir, leaf| {
            mgr.find_directory_entry(dir, leaf).map_err(fat_error)
        })?;
        let kind = if entry.attributes.is_directory() {
            FileType::Directory
        } else {
            FileType::Regular
        };
        Ok(Stat::new(kind, u64::from(entry.size)))
    }

    fn delete(&self, path: &str) -> VfsResult<()> {
        let vol = self.volume.lock();
        vol.in_parent(path, |mgr, dir, leaf| {
            mgr.delete_file_in_dir(dir, leaf).map_err(fat_error)
        })
    }

    fn mkdir(&self, path: &str, _mode: u32) -> VfsResult<()> {
        let vol = self.volume.lock();
        vol.in_parent(path, |mgr, dir, leaf| {
            mgr.make_dir_in_dir(dir, leaf).map_err(fat_error)
        })
    }

    fn opendir(&self, path: &str) -> VfsResult<Box<dyn DirOps>> {
        let vol = self.volume.lock();
        let dir = vol.walk(&components(path))?;
        let mut entries = VecDeque::new();
        let listed = vol.mgr.iterate_dir(dir, |entry| {
            if entry.attributes.is_volume() {
                return;
            }
            let name = entry.name.to_string();
            if name == "." || name == ".." {
                return;
            }
            let kind = if entry.attributes.is_directory() {
                FileType::Directory
            } else {
                FileType::Regular
            };
            entries.push_back(DirEntry::new(name, kind, u64::from(entry.size)));
        });
        vol.release(dir);
        listed.map_err(fat_error)?;
        Ok(Box::new(FatDir { entries }))
    }
}

/// Listing taken when the directory was opened.
struct FatDir {
    entries: VecDeque<DirEntry>,
}

impl DirOps for FatDir {
    fn readdir(&mut self) -> VfsResult<Option<DirEntry>> {
        Ok(self.entries.pop_front())
    }
}

struct FatFile<M: BlockMedia, R: Rtc> {
    volume: Arc<Mutex<Volume<M, R>>>,
    file: Option<RawFile>,
    append: bool,
}

impl<M: BlockMedia, R: Rtc> FatFile<M, R> {
    fn handle(&self) -> VfsResult<RawFile> {
        self.file.ok_or(VfsError::BadFd)
    }
}

impl<M, R> FileOps for FatFile<M, R>
where
    M: BlockMedia + 'static,
    R: Rtc + 'static,
{
    fn read(&mut self, buf: &mut [u8]) -> VfsResult<usize> {
        let file = self.handle()?;
        self.volume.lock().mgr.read(file, buf).map_err(fat_error)
    }

    fn write(&mut self, buf: &[u8]) -> VfsResult<usize> {
        let file = self.handle()?;
        let vol = self.volume.lock();
        if self.append {
            let end = vol.mgr.file_length(file).map_err(fat_error)?;
            vol.mgr.file_seek_from_start(file, end).map_err(fat_error)?;
        }
        vol.mgr.write(file, buf).map_err(fat_error)?;
        Ok(buf.len())
    }

    fn seek(&mut self, offset: i64, whence: SeekWhence) -> VfsResult<u64> {
        let file = self.handle()?;
        let vol = self.volume.lock();
        let current = vol.mgr.file_offset(file).map_err(fat_error)?;
        let size = vol.mgr.file_length(file).map_err(fat_error)?;
        let pos = resolve_seek(u64::from(current), u64::from(size), offset, whence)?;
        let pos32 = u32::try_from(pos).map_err(|_| VfsError::FileTooLarge)?;
        vol.mgr.file_seek_from_start(file, pos32).map_err(fat_error)?;
        Ok(pos)
    }

    fn fstat(&mut self) -> VfsResult<Stat> {
        let file = self.handle()?;
        let size = self.volume.lock().mgr.file_length(file).map_err(fat_error)?;
        Ok(Stat::new(FileType::Regular, u64::from(size)))
    }

    fn close(&mut self) -> VfsResult<()> {
        match self.file.take() {
            Some(file) => self.volume.lock().mgr.close_file(file).map_err(fat_error),
            None => Ok(()),
        }
    }
}

impl<M: BlockMedia, R: Rtc> Drop for FatFile<M, R> {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = self.volume.lock().mgr.close_file(file);
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
