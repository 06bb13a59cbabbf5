//! TEAM_480: littlefs engine surface
//!
//! [`Lfs`] follows the littlefs C API call for call, with owned file and
//! directory handles instead of caller-allocated structs. The flag and
//! whence translations from VFS values live here too.

use alloc::string::String;

use bitflags::bitflags;
use pfs_vfs::{OpenFlags, SeekWhence, VfsError, VfsResult};

use crate::error::LfsError;

pub type LfsResult<T> = Result<T, LfsError>;

/// Smallest programmable unit of the on-chip flash.
pub const FLASH_PAGE_SIZE: u32 = 256;
/// Smallest erasable unit, used as the littlefs block size.
pub const FLASH_SECTOR_SIZE: u32 = 4096;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LfsOpenFlags: u32 {
        const RDONLY = 1;
        const WRONLY = 2;
        const RDWR   = 3;
        const CREAT  = 0x0100;
        const EXCL   = 0x0200;
        const TRUNC  = 0x0400;
        const APPEND = 0x0800;
    }
}

impl LfsOpenFlags {
    pub fn from_vfs(flags: OpenFlags) -> VfsResult<Self> {
        let mut lfs = match flags.access()? {
            pfs_vfs::ops::AccessMode::Read => Self::RDONLY,
            pfs_vfs::ops::AccessMode::Write => Self::WRONLY,
            pfs_vfs::ops::AccessMode::ReadWrite => Self::RDWR,
        };
        if flags.is_append() {
            lfs |= Self::APPEND;
        }
        if flags.is_create() {
            lfs |= Self::CREAT;
        }
        if flags.is_exclusive() {
            lfs |= Self::EXCL;
        }
        if flags.is_truncate() {
            lfs |= Self::TRUNC;
        }
        Ok(lfs)
    }

    pub fn readable(&self) -> bool {
        self.contains(Self::RDONLY)
    }

    pub fn writable(&self) -> bool {
        self.contains(Self::WRONLY)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LfsWhence {
    Set = 0,
    Cur = 1,
    End = 2,
}

impl From<SeekWhence> for LfsWhence {
    fn from(w: SeekWhence) -> Self {
        match w {
            SeekWhence::Set => LfsWhence::Set,
            SeekWhence::Cur => LfsWhence::Cur,
            SeekWhence::End => LfsWhence::End,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LfsType {
    Reg,
    Dir,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LfsInfo {
    pub kind: LfsType,
    pub size: u32,
    pub name: String,
}

/// Geometry of the flash region handed to littlefs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashConfig {
    /// Byte offset of the region from the start of flash
    pub offset: u32,
    pub read_size: u32,
    pub prog_size: u32,
    pub block_size: u32,
    pub block_count: u32,
    pub cache_size: u32,
    pub lookahead_size: u32,
    /// Erase cycles before littlefs moves metadata, -1 disables wear levelling
    pub block_cycles: i32,
}

impl FlashConfig {
    /// Region of `size` bytes at `offset`. The offset must sit on a page
    /// boundary and the region must hold at least two erase blocks.
    pub fn new(offset: u32, size: u32) -> VfsResult<Self> {
        if size == 0 || offset % FLASH_PAGE_SIZE != 0 {
            return Err(VfsError::InvalidArgument);
        }
        let block_count = size / FLASH_SECTOR_SIZE;
        if block_count < 2 {
            return Err(VfsError::InvalidArgument);
        }
        Ok(Self {
            offset,
            read_size: 1,
            prog_size: FLASH_PAGE_SIZE,
            block_size: FLASH_SECTOR_SIZE,
            block_count,
            cache_size: FLASH_PAGE_SIZE,
            lookahead_size: 32,
            block_cycles: 500,
        })
    }

    pub fn capacity(&self) -> u64 {
        u64::from(self.block_size) * u64::from(self.block_count)
    }
}

/// A littlefs instance bound to one flash region.
pub trait Lfs: Send {
    type File: Send;
    type Dir: Send;

    fn mount(&mut self, cfg: &FlashConfig) -> LfsResult<()>;
    fn format(&mut self, cfg: &FlashConfig) -> LfsResult<()>;
    fn unmount(&mut self) -> LfsResult<()>;

    fn file_open(&mut self, path: &str, flags: LfsOpenFlags) -> LfsResult<Self::File>;
    fn file_close(&mut self, file: Self::File) -> LfsResult<()>;
    fn file_read(&mut self, file: &mut Self::File, buf: &mut [u8]) -> LfsResult<usize>;
    fn file_write(&mut self, file: &mut Self::File, buf: &[u8]) -> LfsResult<usize>;
    /// Returns the new position.
    fn file_seek(&mut self, file: &mut Self::File, offset: i32, whence: LfsWhence) -> LfsResult<u32>;
    fn file_size(&mut self, file: &mut Self::File) -> LfsResult<u32>;

    fn stat(&mut self, path: &str) -> LfsResult<LfsInfo>;
    fn rename(&mut self, from: &str, to: &str) -> LfsResult<()>;
    /// Removes a file or an empty directory.
    fn remove(&mut self, path: &str) -> LfsResult<()>;
    fn mkdir(&mut self, path: &str) -> LfsResult<()>;

    fn dir_open(&mut self, path: &str) -> LfsResult<Self::Dir>;
    /// `None` once the listing is exhausted.
    fn dir_read(&mut self, dir: &mut Self::Dir) -> LfsResult<Option<LfsInfo>>;
    fn dir_close(&mut self, dir: Self::Dir) -> LfsResult<()>;
}
