#![cfg_attr(not(any(test, feature = "std")), no_std)]

//! TEAM_476: FAT backend for SD cards and other sector media.
//!
//! [`media`] adapts a raw card driver and locates the FAT partition,
//! [`sdmmc`] feeds it to `embedded-sdmmc`, and [`FatFs`] exposes the volume
//! through the VFS [`Filesystem`](pfs_vfs::Filesystem) trait.

extern crate alloc;

pub mod fs;
pub mod media;
#[cfg(any(test, feature = "std"))]
pub mod ram;
pub mod rtc;
pub mod sdmmc;

pub use fs::FatFs;
pub use media::{BlockMedia, MediaError, MediaStatus, PartitionedMedia, SECTOR_SIZE};
pub use rtc::{DateTime, NoRtc, Rtc, RtcTimeSource};
pub use sdmmc::SdmmcDevice;
