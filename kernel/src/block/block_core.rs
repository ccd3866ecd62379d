use crate::block::block_error::BlockError;
use alloc::{boxed::Box, string::String, vec::Vec};
use bitbybit::bitfield;
use core::fmt;
use kswap_shared::println;

/// Size of a block device in bytes.
///
/// All IDE disks use this sector size, as do most USB and SCSI disks.
pub const BLOCK_SECTOR_SIZE: usize = 512;

/// Index of a block device sector.
///
/// Good enough for devices up to 2 TB.
pub type BlockSector = u32;

/// A major/minor device number, packed the way the original Unix `dev_t` is.
#[bitfield(u16, default = 0)]
pub struct DeviceNumber {
    #[bits(8..=15, rw)]
    major: u8,
    #[bits(0..=7, rw)]
    minor: u8,
}

impl DeviceNumber {
    pub fn from_raw(raw: u16) -> Self {
        Self::new_with_raw_value(raw)
    }

    pub fn same_as(&self, other: DeviceNumber) -> bool {
        self.raw_value() == other.raw_value()
    }
}

impl fmt::Display for DeviceNumber {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.major(), self.minor())
    }
}

/// Types of blocks
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub enum BlockType {
    /// File system
    FileSystem,
    /// Swap
    Swap,
    /// "Raw" device with unidentified contents
    Raw,
    /// Owned by another operating system
    Foreign,
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BlockType::FileSystem => write!(f, "File System"),
            BlockType::Swap => write!(f, "Swap"),
            BlockType::Raw => write!(f, "Raw"),
            BlockType::Foreign => write!(f, "Foreign"),
        }
    }
}

/// Lower-level interface to block device drivers
pub trait BlockOp {
    /// Read a block sector
    fn read(&mut self, sector: BlockSector, buf: &mut [u8]) -> Result<(), BlockError>;
    /// Write a block sector
    fn write(&mut self, sector: BlockSector, buf: &[u8]) -> Result<(), BlockError>;
}

/// A block device
pub struct Block {
    /// Device number the block was registered under
    device: DeviceNumber,
    /// Tha name of the block device
    block_name: String,

    /// The type of block
    block_type: BlockType,
    /// The block driver
    driver: Box<dyn BlockOp + Send>,

    /// The size of the block device in sectors
    block_size: BlockSector,

    /// The read count
    read_count: u32,
    /// The write count
    write_count: u32,
}

impl Block {
    pub fn new(
        device: DeviceNumber,
        block_type: BlockType,
        block_name: &str,
        block_size: BlockSector,
        driver: Box<dyn BlockOp + Send>,
    ) -> Self {
        Self {
            device,
            block_name: String::from(block_name),
            block_type,
            driver,
            block_size,
            read_count: 0,
            write_count: 0,
        }
    }

    /// Verifies that `buf` is a valid buffer for reading or writing a block sector.
    fn verify_buffer(buf: &[u8]) -> Result<(), BlockError> {
        if buf.len() != BLOCK_SECTOR_SIZE {
            return Err(BlockError::BufferInvalid);
        }
        Ok(())
    }

    /// Verifies that `sector` is a valid offset within the block device.
    fn check_sector(&self, sector: BlockSector) -> Result<(), BlockError> {
        if sector >= self.block_size {
            return Err(BlockError::SectorOutOfBounds);
        }
        Ok(())
    }

    /// Reads sector `sector` from the block device into `buf`, which must have room for
    /// `BLOCK_SECTOR_SIZE` bytes.
    pub fn read(&mut self, sector: BlockSector, buf: &mut [u8]) -> Result<(), BlockError> {
        self.check_sector(sector)?;
        Self::verify_buffer(buf)?;

        self.driver.read(sector, buf)?;
        self.read_count += 1;
        Ok(())
    }

    /// Writes sector `sector` from `buf`, which must contain `BLOCK_SECTOR_SIZE` bytes. Returns
    /// after the block device has acknowledged receiving the data.
    pub fn write(&mut self, sector: BlockSector, buf: &[u8]) -> Result<(), BlockError> {
        self.check_sector(sector)?;
        Self::verify_buffer(buf)?;

        if self.block_type == BlockType::Foreign {
            return Err(BlockError::ForeignBlock);
        }

        self.driver.write(sector, buf)?;
        self.write_count += 1;
        Ok(())
    }

    // Block getters -----------------------------------------------------------

    pub fn get_type(&self) -> BlockType {
        self.block_type
    }
    pub fn get_size(&self) -> BlockSector {
        self.block_size
    }
    pub fn get_name(&self) -> &str {
        &self.block_name
    }
    pub fn get_device(&self) -> DeviceNumber {
        self.device
    }
    pub fn read_count(&self) -> u32 {
        self.read_count
    }
    pub fn write_count(&self) -> u32 {
        self.write_count
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "    {} | \"{}\" ({}): {:04} sectors, {:04} read, {:04} write",
            self.device,
            self.block_name,
            self.block_type,
            self.block_size,
            self.read_count,
            self.write_count
        )
    }
}

/// Maintain a list of blocks
#[derive(Default)]
pub struct BlockManager {
    /// All the block devices
    all_blocks: Vec<Block>,
}

impl BlockManager {
    /// Create a new block manager
    pub fn new() -> Self {
        BlockManager::with_capacity(10)
    }

    /// Create a new block manager with a given capacity
    pub fn with_capacity(cap: usize) -> Self {
        BlockManager {
            all_blocks: Vec::with_capacity(cap),
        }
    }

    /// Register a block device under `device`. Registering the same device number twice
    /// replaces the earlier block.
    pub fn register_block(&mut self, block: Block) {
        println!(
            "Registered block device \"{}\" ({} type, dev {}) with {} sectors",
            block.block_name, block.block_type, block.device, block.block_size,
        );

        self.all_blocks.retain(|b| !b.device.same_as(block.device));
        self.all_blocks.push(block);
    }

    /// Get the block device registered under `device`.
    ///
    /// If no such device exists, returns `None`.
    pub fn by_device(&mut self, device: DeviceNumber) -> Option<&mut Block> {
        self.all_blocks.iter_mut().find(|b| b.device.same_as(device))
    }

    /// Remove the block device registered under `device` and hand it to the caller, which
    /// becomes its only user.
    pub fn claim(&mut self, device: DeviceNumber) -> Option<Block> {
        let idx = self
            .all_blocks
            .iter()
            .position(|b| b.device.same_as(device))?;
        Some(self.all_blocks.swap_remove(idx))
    }

    pub fn len(&self) -> usize {
        self.all_blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all_blocks.is_empty()
    }
}

impl fmt::Display for BlockManager {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Block Devices:")?;
        for block in self.all_blocks.iter() {
            writeln!(f, "{}", block)?;
        }
        Ok(())
    }
}

#[cfg(test)]
pub mod test {
    use super::*;
    use std::io::{Read, Seek, SeekFrom, Write};

    struct FileDriver<F>(F);

    impl<F: Read + Write + Seek> BlockOp for FileDriver<F> {
        fn read(&mut self, sector: BlockSector, buf: &mut [u8]) -> Result<(), BlockError> {
            let offset = u64::from(sector) * BLOCK_SECTOR_SIZE as u64;
            self.0
                .seek(SeekFrom::Start(offset))
                .map_err(|_| BlockError::ReadError)?;
            self.0.read_exact(buf).map_err(|_| BlockError::ReadError)
        }

        fn write(&mut self, sector: BlockSector, buf: &[u8]) -> Result<(), BlockError> {
            let offset = u64::from(sector) * BLOCK_SECTOR_SIZE as u64;
            self.0
                .seek(SeekFrom::Start(offset))
                .map_err(|_| BlockError::WriteError)?;
            self.0.write_all(buf).map_err(|_| BlockError::WriteError)
        }
    }

    /// Wraps a seekable image (typically a `Cursor<Vec<u8>>`) as a swap block.
    pub fn block_from_file<F: Read + Write + Seek + Send + 'static>(
        device: DeviceNumber,
        mut file: F,
    ) -> Block {
        let len = file.seek(SeekFrom::End(0)).unwrap();
        let sectors = BlockSector::try_from(len / BLOCK_SECTOR_SIZE as u64).unwrap();
        Block::new(
            device,
            BlockType::Swap,
            "image",
            sectors,
            Box::new(FileDriver(file)),
        )
    }

    struct Failing;

    impl BlockOp for Failing {
        fn read(&mut self, _sector: BlockSector, _buf: &mut [u8]) -> Result<(), BlockError> {
            Err(BlockError::ReadError)
        }
        fn write(&mut self, _sector: BlockSector, _buf: &[u8]) -> Result<(), BlockError> {
            Err(BlockError::WriteError)
        }
    }

    /// A block whose driver fails every transfer.
    pub fn failing_block(device: DeviceNumber, sectors: BlockSector) -> Block {
        Block::new(device, BlockType::Swap, "failing", sectors, Box::new(Failing))
    }

    #[test]
    fn block_checks_bounds_and_buffers() {
        let mut block = block_from_file(
            DeviceNumber::from_raw(0x301),
            std::io::Cursor::new(vec![0u8; 4 * BLOCK_SECTOR_SIZE]),
        );
        assert_eq!(block.get_size(), 4);

        let mut buf = [0u8; BLOCK_SECTOR_SIZE];
        assert_eq!(block.read(4, &mut buf), Err(BlockError::SectorOutOfBounds));
        assert_eq!(block.read(0, &mut buf[..10]), Err(BlockError::BufferInvalid));

        buf[0] = 0xAB;
        block.write(3, &buf).unwrap();
        let mut back = [0u8; BLOCK_SECTOR_SIZE];
        block.read(3, &mut back).unwrap();
        assert_eq!(back[0], 0xAB);
        assert_eq!((block.read_count(), block.write_count()), (1, 1));
    }

    #[test]
    fn foreign_blocks_are_read_only() {
        let mut block = Block::new(
            DeviceNumber::from_raw(0x302),
            BlockType::Foreign,
            "foreign",
            1,
            Box::new(FileDriver(std::io::Cursor::new(vec![0u8; BLOCK_SECTOR_SIZE]))),
        );
        let buf = [0u8; BLOCK_SECTOR_SIZE];
        assert_eq!(block.write(0, &buf), Err(BlockError::ForeignBlock));
    }

    #[test]
    fn manager_claims_by_device_number() {
        let swap_dev = DeviceNumber::from_raw(0x306);
        let mut manager = BlockManager::new();
        manager.register_block(failing_block(DeviceNumber::from_raw(0x300), 8));
        manager.register_block(failing_block(swap_dev, 16));
        assert_eq!(manager.len(), 2);
        assert_eq!(manager.by_device(swap_dev).map(|b| b.get_size()), Some(16));

        let claimed = manager.claim(swap_dev).unwrap();
        assert_eq!(claimed.get_device().major(), 3);
        assert_eq!(claimed.get_device().minor(), 6);
        assert!(manager.claim(swap_dev).is_none());
        assert_eq!(manager.len(), 1);
    }
}
