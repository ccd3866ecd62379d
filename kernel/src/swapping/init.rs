use super::page_replacement::PageReplacementPolicy;
use super::swap_map::{SwapMap, SWAP_MAP_BYTES, SWAP_SIGNATURE};
use super::transfer::{self, SECTORS_PER_PAGE};
use super::{SwapArea, SwapConfig, SwapError, SwapManager};
use crate::block::block_core::{Block, BlockManager};
use kswap_shared::mem::PAGE_FRAME_SIZE;
use kswap_shared::sizes::SWAP_BITS;
use kswap_shared::{eprintln, println};
use nom::bytes::complete::{tag, take};
use nom::IResult;
use zerocopy::AsBytes;

/// Everything before the signature, then the signature itself.
fn swap_signature(page: &[u8]) -> IResult<&[u8], &[u8]> {
    let (rest, _bitmap) = take(SWAP_MAP_BYTES)(page)?;
    tag(SWAP_SIGNATURE.as_slice())(rest)
}

/// Pages the swap map can track on `block`.
fn usable_pages(block: &Block) -> usize {
    (block.get_size() / SECTORS_PER_PAGE) as usize
}

impl<P: PageReplacementPolicy> SwapManager<P> {
    /// Enable swapping on the device named by `config`, taking it out of
    /// `blocks`. Returns the number of free swap pages.
    ///
    /// Any failure leaves swapping disabled and the device where it was.
    pub fn init_swapping(
        &mut self,
        config: &SwapConfig,
        blocks: &mut BlockManager,
    ) -> Result<usize, SwapError> {
        if self.swap.is_some() {
            return Err(SwapError::AlreadyEnabled);
        }
        let Some(dev) = config.device else {
            return Err(SwapError::NoSwapDevice);
        };
        let Some(block) = blocks.by_device(dev) else {
            eprintln!("Unable to get size of swap device");
            return Err(SwapError::NoSwapDevice);
        };

        let sectors = block.get_size();
        if sectors == 0 {
            return Err(SwapError::NoSwapDevice);
        }
        if sectors < config.min_sectors {
            eprintln!("Swap device too small ({} sectors)", sectors);
            return Err(SwapError::DeviceTooSmall(sectors));
        }
        let usable = usable_pages(block).min(SWAP_BITS);

        let mut image = [0u8; PAGE_FRAME_SIZE];
        transfer::read_page(block, 0, &mut image)?;
        if swap_signature(&image).is_err() {
            eprintln!("Unable to find swap-space signature");
            return Err(SwapError::MissingSignature);
        }

        let map = SwapMap::from_image(&image, usable).inspect_err(|err| match err {
            SwapError::BadSwapMap => eprintln!("Bad swap-space bit-map"),
            _ => eprintln!("Swap device has no free pages"),
        })?;
        let free = map.free_slots();

        let device = blocks.claim(dev).ok_or(SwapError::NoSwapDevice)?;
        self.swap = Some(SwapArea { device, map });
        println!(
            "Swap device ok: {} pages ({} bytes) swap-space",
            free,
            free * PAGE_FRAME_SIZE
        );
        Ok(free)
    }
}

/// Write an empty swap map (`mkswap`) to `block`: every page on the device
/// except the map itself is marked free. Returns the number of free pages.
pub fn format_swap_device(block: &mut Block) -> Result<usize, SwapError> {
    let usable = usable_pages(block).min(SWAP_BITS);
    if usable < 2 {
        return Err(SwapError::DeviceTooSmall(block.get_size()));
    }

    let mut image = [0u8; PAGE_FRAME_SIZE];
    image.copy_from_slice(SwapMap::format(usable).as_bytes());
    transfer::write_page(block, 0, &image)?;
    println!("Formatted swap device {} with {} pages", block.get_device(), usable);

    Ok(SwapMap::from_image(&image, usable)?.free_slots())
}
