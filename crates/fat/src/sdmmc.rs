// TEAM_478: Adapter presenting a partitioned media to embedded-sdmmc.
//
// embedded-sdmmc only opens volumes listed in an MBR, while cards formatted
// without a partition table are common. The device therefore shows the
// engine a fixed layout: block 0 is a generated MBR with one FAT32 LBA entry,
// and the partition found by `PartitionedMedia` follows from block 1.

use embedded_sdmmc::{Block, BlockCount, BlockDevice, BlockIdx};
use pfs_utils::Mutex;

use crate::media::{BlockMedia, MediaError, PartitionedMedia};

/// Block where the volume starts in the engine's view.
const VOLUME_START: u32 = 1;

pub struct SdmmcDevice<M> {
    media: Mutex<PartitionedMedia<M>>,
}

impl<M: BlockMedia> SdmmcDevice<M> {
    /// `media` must already be initialized.
    pub fn new(media: PartitionedMedia<M>) -> Self {
        Self {
            media: Mutex::new(media),
        }
    }

    pub fn sync(&self) -> Result<(), MediaError> {
        self.media.lock().sync()
    }

    fn boot_record(sectors: u32) -> Block {
        let mut block = Block::new();
        let entry = &mut block.contents[0x1BE..0x1CE];
        entry[4] = 0x0C;
        entry[8..12].copy_from_slice(&VOLUME_START.to_le_bytes());
        entry[12..16].copy_from_slice(&sectors.to_le_bytes());
        block.contents[510] = 0x55;
        block.contents[511] = 0xAA;
        block
    }
}

impl<M: BlockMedia> BlockDevice for SdmmcDevice<M> {
    type Error = MediaError;

    fn read(&self, blocks: &mut [Block], start_block_idx: BlockIdx) -> Result<(), Self::Error> {
        let mut media = self.media.lock();
        for (i, block) in blocks.iter_mut().enumerate() {
            let idx = start_block_idx.0 + i as u32;
            if idx < VOLUME_START {
                *block = Self::boot_record(media.sectors());
            } else {
                media.read(idx - VOLUME_START, &mut block.contents)?;
            }
        }
        Ok(())
    }

    fn write(&self, blocks: &[Block], start_block_idx: BlockIdx) -> Result<(), Self::Error> {
        let mut media = self.media.lock();
        for (i, block) in blocks.iter().enumerate() {
            let idx = start_block_idx.0 + i as u32;
            if idx < VOLUME_START {
                log::warn!("[FAT] refusing write to generated boot record");
                return Err(MediaError::WriteProtected);
            }
            media.write(idx - VOLUME_START, &block.contents)?;
        }
        Ok(())
    }

    fn num_blocks(&self) -> Result<BlockCount, Self::Error> {
        Ok(BlockCount(self.media.lock().sectors() + VOLUME_START))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ram::RamDisk;

    fn device(disk: &RamDisk) -> SdmmcDevice<RamDisk> {
        let mut media = PartitionedMedia::new(disk.clone());
        media.initialize().unwrap();
        SdmmcDevice::new(media)
    }

    #[test]
    fn test_engine_sees_single_partition() {
        let disk = RamDisk::new(32);
        let dev = device(&disk);
        let mut blocks = [Block::new()];
        dev.read(&mut blocks, BlockIdx(0)).unwrap();
        let mbr = &blocks[0].contents;
        assert_eq!(mbr[0x1BE + 4], 0x0C);
        assert_eq!(&mbr[0x1BE + 8..0x1BE + 12], &1u32.to_le_bytes());
        assert_eq!(&mbr[0x1BE + 12..0x1BE + 16], &32u32.to_le_bytes());
        assert_eq!(&mbr[510..], &[0x55, 0xAA]);
        assert_eq!(dev.num_blocks().unwrap(), BlockCount(33));
    }

    #[test]
    fn test_blocks_shift_by_one() {
        let disk = RamDisk::new(8);
        disk.poke(0, b"volume boot sector");
        let dev = device(&disk);

        let mut blocks = [Block::new(), Block::new()];
        dev.read(&mut blocks, BlockIdx(0)).unwrap();
        assert_eq!(&blocks[1].contents[..18], b"volume boot sector");

        let mut out = Block::new();
        out.contents[0] = 0x5A;
        dev.write(&[out], BlockIdx(3)).unwrap();
        assert_eq!(disk.peek(2)[0], 0x5A);

        assert_eq!(dev.write(&[Block::new()], BlockIdx(0)), Err(MediaError::WriteProtected));
        let mut past_end = [Block::new()];
        assert_eq!(dev.read(&mut past_end, BlockIdx(9)), Err(MediaError::OutOfRange));
    }
}
