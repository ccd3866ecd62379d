use core::error::Error;
use core::fmt::{Debug, Display, Formatter};

/// Error type for block operations
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum BlockError {
    /// The sector is out of bounds (greater than the block size)
    SectorOutOfBounds,
    /// The buffer has an invalid size (not `BLOCK_SECTOR_SIZE`)
    BufferInvalid,
    /// Error reading from the disk
    ReadError,
    /// Error writing to the disk
    WriteError,
    /// Writes to blocks owned by another operating system are refused
    ForeignBlock,
}

impl Debug for BlockError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            BlockError::SectorOutOfBounds => write!(f, "SectorOutOfBounds"),
            BlockError::BufferInvalid => write!(f, "BufferInvalid"),
            BlockError::ReadError => write!(f, "ReadError"),
            BlockError::WriteError => write!(f, "WriteError"),
            BlockError::ForeignBlock => write!(f, "ForeignBlock"),
        }
    }
}

impl BlockError {
    fn message(&self) -> &'static str {
        match self {
            BlockError::SectorOutOfBounds => "sector out of bounds",
            BlockError::BufferInvalid => "buffer is not one sector long",
            BlockError::ReadError => "error reading from the block device",
            BlockError::WriteError => "error writing to the block device",
            BlockError::ForeignBlock => "block belongs to another operating system",
        }
    }
}

impl Display for BlockError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.message())
    }
}

impl Error for BlockError {}
