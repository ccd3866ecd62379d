use super::block_core::{BlockOp, BlockSector, BLOCK_SECTOR_SIZE};
use super::block_error::BlockError;
use alloc::{vec, vec::Vec};

/// A block device backed by kernel memory. Useful as a swap device on machines
/// without a spare disk, and as the device under test.
pub struct RamDisk {
    sects: Vec<[u8; BLOCK_SECTOR_SIZE]>,
}

impl RamDisk {
    pub fn new(sectors: usize) -> RamDisk {
        RamDisk {
            sects: vec![[0; BLOCK_SECTOR_SIZE]; sectors],
        }
    }

    /// A disk whose contents start out as `image`, zero padded to a whole sector.
    pub fn from_image(image: &[u8]) -> RamDisk {
        let mut disk = RamDisk::new(image.len().div_ceil(BLOCK_SECTOR_SIZE));
        for (sect, chunk) in disk.sects.iter_mut().zip(image.chunks(BLOCK_SECTOR_SIZE)) {
            sect[..chunk.len()].copy_from_slice(chunk);
        }
        disk
    }

    pub fn sectors(&self) -> BlockSector {
        BlockSector::try_from(self.sects.len()).unwrap_or(BlockSector::MAX)
    }

    fn sector(&self, sector: BlockSector) -> Result<&[u8; BLOCK_SECTOR_SIZE], BlockError> {
        self.sects
            .get(sector as usize)
            .ok_or(BlockError::SectorOutOfBounds)
    }
}

impl BlockOp for RamDisk {
    fn read(&mut self, sector: BlockSector, buf: &mut [u8]) -> Result<(), BlockError> {
        let sect = self.sector(sector)?;
        if buf.len() != BLOCK_SECTOR_SIZE {
            return Err(BlockError::BufferInvalid);
        }
        buf.copy_from_slice(sect);
        Ok(())
    }

    fn write(&mut self, sector: BlockSector, buf: &[u8]) -> Result<(), BlockError> {
        let sect = self
            .sects
            .get_mut(sector as usize)
            .ok_or(BlockError::SectorOutOfBounds)?;
        if buf.len() != BLOCK_SECTOR_SIZE {
            return Err(BlockError::BufferInvalid);
        }
        sect.copy_from_slice(buf);
        Ok(())
    }
}
