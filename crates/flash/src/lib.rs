#![cfg_attr(not(any(test, feature = "std")), no_std)]

//! TEAM_480: Internal-flash filesystem backend.
//!
//! A littlefs engine, reached through the [`Lfs`] trait, is mounted on a
//! region of on-chip flash described by [`FlashConfig`]. [`FlashFs`] turns
//! the engine into a VFS [`Filesystem`](pfs_vfs::Filesystem), formatting the
//! region the first time it does not mount.

extern crate alloc;

pub mod error;
pub mod fs;
pub mod lfs;
#[cfg(any(test, feature = "std"))]
pub mod ram;

pub use error::LfsError;
pub use fs::FlashFs;
pub use lfs::{
    FLASH_PAGE_SIZE, FLASH_SECTOR_SIZE, FlashConfig, Lfs, LfsInfo, LfsOpenFlags, LfsResult,
    LfsType, LfsWhence,
};
