//! TEAM_476: Sector media and partition lookup
//!
//! A card driver implements [`BlockMedia`] with absolute sector numbers.
//! [`PartitionedMedia`] reads sector 0 on initialize, picks the FAT32 LBA
//! partition if there is one and from then on addresses sectors relative to
//! its start. A card without a partition table (super-floppy) is used from
//! sector 0.

use bitflags::bitflags;
use pfs_error::define_fs_error;
use pfs_vfs::VfsError;

pub const SECTOR_SIZE: usize = 512;

/// First partition table entry in the MBR.
const PARTITION_TABLE: usize = 0x1BE;
const PARTITION_ENTRY_LEN: usize = 16;
/// FAT32 with LBA addressing.
const PARTITION_TYPE_FAT32_LBA: u8 = 0x0C;
const BOOT_SIGNATURE: [u8; 2] = [0x55, 0xAA];

define_fs_error! {
    /// Sector-level failures reported by a [`BlockMedia`].
    pub enum MediaError(0x10) {
        /// Not initialized or no card
        NotReady = 0x01, EAGAIN => "Media not ready",
        /// Transfer failed on the bus or the card
        Io = 0x02, EIO => "Sector transfer failed",
        /// Empty or misaligned buffer
        Parameter = 0x03, EINVAL => "Bad sector request",
        WriteProtected = 0x04, EACCES => "Media write protected",
        OutOfRange = 0x05, EINVAL => "Sector beyond end of media",
    }
}

impl From<MediaError> for VfsError {
    fn from(e: MediaError) -> Self {
        match e {
            MediaError::NotReady => VfsError::NotReady,
            MediaError::Io => VfsError::IoError,
            MediaError::Parameter | MediaError::OutOfRange => VfsError::InvalidArgument,
            MediaError::WriteProtected => VfsError::AccessDenied,
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MediaStatus: u8 {
        const NOINIT  = 0x01;
        const NODISK  = 0x02;
        const PROTECT = 0x04;
    }
}

/// Sector-addressed storage, 512-byte sectors.
pub trait BlockMedia: Send {
    fn status(&self) -> MediaStatus;

    fn initialize(&mut self) -> Result<(), MediaError>;

    /// Read `buf.len() / SECTOR_SIZE` sectors starting at `sector`.
    fn read(&mut self, sector: u32, buf: &mut [u8]) -> Result<(), MediaError>;

    fn write(&mut self, sector: u32, buf: &[u8]) -> Result<(), MediaError>;

    fn sector_count(&self) -> u32;

    /// Flush write caches.
    fn sync(&mut self) -> Result<(), MediaError> {
        Ok(())
    }
}

/// Start sector of the first FAT32 LBA partition in `mbr`, if the sector
/// carries a boot signature and such an entry.
pub fn find_partition(mbr: &[u8; SECTOR_SIZE]) -> Option<u32> {
    if mbr[510..] != BOOT_SIGNATURE {
        return None;
    }
    (0..4)
        .map(|i| PARTITION_TABLE + i * PARTITION_ENTRY_LEN)
        .find(|&e| mbr[e + 4] == PARTITION_TYPE_FAT32_LBA)
        .map(|e| u32::from_le_bytes([mbr[e + 8], mbr[e + 9], mbr[e + 10], mbr[e + 11]]))
}

pub struct PartitionedMedia<M> {
    inner: M,
    base: u32,
    ready: bool,
}

impl<M: BlockMedia> PartitionedMedia<M> {
    pub fn new(inner: M) -> Self {
        Self {
            inner,
            base: 0,
            ready: false,
        }
    }

    /// First sector of the partition on the underlying media.
    pub fn base(&self) -> u32 {
        self.base
    }

    /// Sectors from the partition start to the end of the media.
    pub fn sectors(&self) -> u32 {
        self.inner.sector_count().saturating_sub(self.base)
    }

    pub fn into_inner(self) -> M {
        self.inner
    }

    fn check(&self, sector: u32, len: usize) -> Result<u32, MediaError> {
        if !self.ready {
            return Err(MediaError::NotReady);
        }
        if len == 0 || len % SECTOR_SIZE != 0 {
            return Err(MediaError::Parameter);
        }
        let count = u32::try_from(len / SECTOR_SIZE).map_err(|_| MediaError::Parameter)?;
        match sector.checked_add(count) {
            Some(end) if end <= self.sectors() => Ok(self.base + sector),
            _ => Err(MediaError::OutOfRange),
        }
    }
}

impl<M: BlockMedia> BlockMedia for PartitionedMedia<M> {
    fn status(&self) -> MediaStatus {
        if self.ready {
            self.inner.status()
        } else {
            self.inner.status() | MediaStatus::NOINIT
        }
    }

    fn initialize(&mut self) -> Result<(), MediaError> {
        self.ready = false;
        self.base = 0;
        self.inner.initialize()?;

        let mut mbr = [0u8; SECTOR_SIZE];
        self.inner.read(0, &mut mbr)?;
        match find_partition(&mbr) {
            Some(base) => {
                log::info!("[MEDIA] FAT32 partition at LBA {:#x}", base);
                self.base = base;
            }
            None => log::info!("[MEDIA] no FAT32 partition entry, using whole media"),
        }
        self.ready = true;
        Ok(())
    }

    fn read(&mut self, sector: u32, buf: &mut [u8]) -> Result<(), MediaError> {
        let abs = self.check(sector, buf.len())?;
        self.inner.read(abs, buf)
    }

    fn write(&mut self, sector: u32, buf: &[u8]) -> Result<(), MediaError> {
        let abs = self.check(sector, buf.len())?;
        self.inner.write(abs, buf)
    }

    fn sector_count(&self) -> u32 {
        self.sectors()
    }

    fn sync(&mut self) -> Result<(), MediaError> {
        self.inner.sync()
    }
}
