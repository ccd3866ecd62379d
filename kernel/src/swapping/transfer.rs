use super::{SwapError, SwapSlot};
use crate::block::block_core::{Block, BlockSector, BLOCK_SECTOR_SIZE};
use crate::block::block_error::BlockError;
use core::ops::Range;
use kswap_shared::mem::PAGE_FRAME_SIZE;

/// Sectors making up one swap page.
#[allow(clippy::cast_possible_truncation)]
pub const SECTORS_PER_PAGE: BlockSector = (PAGE_FRAME_SIZE / BLOCK_SECTOR_SIZE) as BlockSector;

fn page_sectors(page: u32) -> Result<Range<BlockSector>, BlockError> {
    let first = page
        .checked_mul(SECTORS_PER_PAGE)
        .ok_or(BlockError::SectorOutOfBounds)?;
    let end = first
        .checked_add(SECTORS_PER_PAGE)
        .ok_or(BlockError::SectorOutOfBounds)?;
    Ok(first..end)
}

/// Read swap page `page` (sectors `page * 8 .. page * 8 + 8`) into `buf`.
pub fn read_page(
    block: &mut Block,
    page: u32,
    buf: &mut [u8; PAGE_FRAME_SIZE],
) -> Result<(), BlockError> {
    for (sector, chunk) in page_sectors(page)?.zip(buf.chunks_exact_mut(BLOCK_SECTOR_SIZE)) {
        block.read(sector, chunk)?;
    }
    Ok(())
}

/// Write `buf` to swap page `page`.
pub fn write_page(
    block: &mut Block,
    page: u32,
    buf: &[u8; PAGE_FRAME_SIZE],
) -> Result<(), BlockError> {
    for (sector, chunk) in page_sectors(page)?.zip(buf.chunks_exact(BLOCK_SECTOR_SIZE)) {
        block.write(sector, chunk)?;
    }
    Ok(())
}

pub fn read_slot(
    block: &mut Block,
    slot: SwapSlot,
    buf: &mut [u8; PAGE_FRAME_SIZE],
) -> Result<(), SwapError> {
    Ok(read_page(block, slot.get(), buf)?)
}

pub fn write_slot(
    block: &mut Block,
    slot: SwapSlot,
    buf: &[u8; PAGE_FRAME_SIZE],
) -> Result<(), SwapError> {
    Ok(write_page(block, slot.get(), buf)?)
}
