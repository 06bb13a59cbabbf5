//! TEAM_478: RAM-backed card and a FAT16 formatter for host tests.

use alloc::sync::Arc;
use alloc::vec::Vec;

use pfs_utils::Mutex;

use crate::media::{BlockMedia, MediaError, MediaStatus, SECTOR_SIZE};

/// RAM-backed card. Clones share the sectors, so a test can remount the
/// same image.
#[derive(Clone)]
pub struct RamDisk {
    data: Arc<Mutex<Vec<u8>>>,
    ready: bool,
}

impl RamDisk {
    pub fn new(sectors: u32) -> Self {
        Self {
            data: Arc::new(Mutex::new(vec![0; sectors as usize * SECTOR_SIZE])),
            ready: false,
        }
    }

    /// Write raw bytes at the start of `sector`.
    pub fn poke(&self, sector: u32, bytes: &[u8]) {
        let at = sector as usize * SECTOR_SIZE;
        self.data.lock()[at..at + bytes.len()].copy_from_slice(bytes);
    }

    pub fn peek(&self, sector: u32) -> Vec<u8> {
        let at = sector as usize * SECTOR_SIZE;
        self.data.lock()[at..at + SECTOR_SIZE].to_vec()
    }

    fn range(&self, sector: u32, len: usize) -> Result<core::ops::Range<usize>, MediaError> {
        let start = sector as usize * SECTOR_SIZE;
        if start + len > self.data.lock().len() {
            return Err(MediaError::OutOfRange);
        }
        Ok(start..start + len)
    }
}

impl BlockMedia for RamDisk {
    fn status(&self) -> MediaStatus {
        if self.ready {
            MediaStatus::empty()
        } else {
            MediaStatus::NOINIT
        }
    }

    fn initialize(&mut self) -> Result<(), MediaError> {
        self.ready = true;
        Ok(())
    }

    fn read(&mut self, sector: u32, buf: &mut [u8]) -> Result<(), MediaError> {
        let range = self.range(sector, buf.len())?;
        buf.copy_from_slice(&self.data.lock()[range]);
        Ok(())
    }

    fn write(&mut self, sector: u32, buf: &[u8]) -> Result<(), MediaError> {
        let range = self.range(sector, buf.len())?;
        self.data.lock()[range].copy_from_slice(buf);
        Ok(())
    }

    fn sector_count(&self) -> u32 {
        (self.data.lock().len() / SECTOR_SIZE) as u32
    }
}

/// Sectors in a test volume: enough clusters to be FAT16 at one sector
/// per cluster.
pub const FAT16_SECTORS: u32 = 4200;
const FAT_SECTORS: u16 = 17;

/// Lay down an empty FAT16 volume of [`FAT16_SECTORS`] at `base`.
pub fn format_fat16(disk: &RamDisk, base: u32) {
    let mut bpb = [0u8; SECTOR_SIZE];
    bpb[0..3].copy_from_slice(&[0xEB, 0x3C, 0x90]);
    bpb[3..11].copy_from_slice(b"PFSTEST ");
    bpb[11..13].copy_from_slice(&512u16.to_le_bytes());
    bpb[13] = 1; // sectors per cluster
    bpb[14..16].copy_from_slice(&1u16.to_le_bytes()); // reserved
    bpb[16] = 2; // FAT copies
    bpb[17..19].copy_from_slice(&512u16.to_le_bytes()); // root entries
    bpb[19..21].copy_from_slice(&(FAT16_SECTORS as u16).to_le_bytes());
    bpb[21] = 0xF8;
    bpb[22..24].copy_from_slice(&FAT_SECTORS.to_le_bytes());
    bpb[24..26].copy_from_slice(&32u16.to_le_bytes());
    bpb[26..28].copy_from_slice(&2u16.to_le_bytes());
    bpb[28..32].copy_from_slice(&base.to_le_bytes());
    bpb[36] = 0x80;
    bpb[38] = 0x29;
    bpb[39..43].copy_from_slice(&0x1234_5678u32.to_le_bytes());
    bpb[43..54].copy_from_slice(b"PFS TEST   ");
    bpb[54..62].copy_from_slice(b"FAT16   ");
    bpb[510] = 0x55;
    bpb[511] = 0xAA;
    disk.poke(base, &bpb);

    let media_entries = [0xF8, 0xFF, 0xFF, 0xFF];
    disk.poke(base + 1, &media_entries);
    disk.poke(base + 1 + u32::from(FAT_SECTORS), &media_entries);
}

/// Disk with an MBR whose first entry is a FAT32 LBA partition at
/// `base`, holding a fresh FAT16 volume.
pub fn partitioned_fat16(base: u32) -> RamDisk {
    let disk = RamDisk::new(base + FAT16_SECTORS);
    let mut mbr = [0u8; SECTOR_SIZE];
    mbr[0x1BE + 4] = 0x0C;
    mbr[0x1BE + 8..0x1BE + 12].copy_from_slice(&base.to_le_bytes());
    mbr[0x1BE + 12..0x1BE + 16].copy_from_slice(&FAT16_SECTORS.to_le_bytes());
    mbr[510] = 0x55;
    mbr[511] = 0xAA;
    disk.poke(0, &mbr);
    format_fat16(&disk, base);
    disk
}
