pub mod block_core;
pub mod block_error;
pub mod ram_disk;

pub use block_core::{Block, BlockManager, BlockOp, BlockSector, BlockType, DeviceNumber};
pub use block_error::BlockError;
