use super::SwapSlot;
use crate::block::block_core::BlockSector;
use crate::block::block_error::BlockError;
use crate::mem::frame_table::FrameError;
use core::error::Error;
use core::fmt::{Debug, Display, Formatter};
use kswap_shared::paging::VirtualAddress;

/// Error type for swapping operations
#[derive(Clone, Copy)]
pub enum SwapError {
    /// No swap device is configured, or it is not registered
    NoSwapDevice,
    /// The swap device has fewer sectors than the configured minimum
    DeviceTooSmall(BlockSector),
    /// The last bytes of the first page are not the swap signature
    MissingSignature,
    /// The on-disk bitmap marks the sentinel slot or a slot past the device end as free
    BadSwapMap,
    /// The on-disk bitmap has no free slots at all
    NoSwapSpace,
    /// Swapping was initialized already
    AlreadyEnabled,
    /// Swapping is not enabled
    SwappingDisabled,
    /// The page is already in memory
    AlreadyPresent(VirtualAddress),
    /// The entry does not name a swap slot
    NotSwapped(VirtualAddress),
    /// The page has no page table
    NoPageTable(VirtualAddress),
    /// A slot number past the end of the bitmap
    SlotOutOfRange(u32),
    /// The slot was freed while already free
    DoubleFree(SwapSlot),
    /// No page in the user range could be evicted
    OutOfSwapMemory,
    /// Every frame is in use and nothing could be evicted
    OutOfMemory,
    /// The system state has not been set up
    Uninitialized,
    /// The frame table refused an operation
    Frame(FrameError),
    /// The swap device failed a transfer
    Io(BlockError),
}

impl From<BlockError> for SwapError {
    fn from(err: BlockError) -> Self {
        SwapError::Io(err)
    }
}

impl From<FrameError> for SwapError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::OutOfMemory => SwapError::OutOfMemory,
            err => SwapError::Frame(err),
        }
    }
}

impl Debug for SwapError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            SwapError::NoSwapDevice => write!(f, "NoSwapDevice"),
            SwapError::DeviceTooSmall(sectors) => write!(f, "DeviceTooSmall({sectors})"),
            SwapError::MissingSignature => write!(f, "MissingSignature"),
            SwapError::BadSwapMap => write!(f, "BadSwapMap"),
            SwapError::NoSwapSpace => write!(f, "NoSwapSpace"),
            SwapError::AlreadyEnabled => write!(f, "AlreadyEnabled"),
            SwapError::SwappingDisabled => write!(f, "SwappingDisabled"),
            SwapError::AlreadyPresent(page) => write!(f, "AlreadyPresent({page})"),
            SwapError::NotSwapped(page) => write!(f, "NotSwapped({page})"),
            SwapError::NoPageTable(page) => write!(f, "NoPageTable({page})"),
            SwapError::SlotOutOfRange(nr) => write!(f, "SlotOutOfRange({nr})"),
            SwapError::DoubleFree(slot) => write!(f, "DoubleFree({slot})"),
            SwapError::OutOfSwapMemory => write!(f, "OutOfSwapMemory"),
            SwapError::OutOfMemory => write!(f, "OutOfMemory"),
            SwapError::Uninitialized => write!(f, "Uninitialized"),
            SwapError::Frame(err) => write!(f, "Frame({err:?})"),
            SwapError::Io(err) => write!(f, "Io({err:?})"),
        }
    }
}

impl Display for SwapError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            SwapError::NoSwapDevice => write!(f, "no swap device"),
            SwapError::DeviceTooSmall(sectors) => {
                write!(f, "swap device too small ({sectors} sectors)")
            }
            SwapError::MissingSignature => write!(f, "unable to find swap-space signature"),
            SwapError::BadSwapMap => write!(f, "bad swap-space bit-map"),
            SwapError::NoSwapSpace => write!(f, "swap device has no free pages"),
            SwapError::AlreadyEnabled => write!(f, "swapping is already enabled"),
            SwapError::SwappingDisabled => write!(f, "swapping is disabled"),
            SwapError::AlreadyPresent(page) => write!(f, "page {page} is already present"),
            SwapError::NotSwapped(page) => write!(f, "no swap page for {page}"),
            SwapError::NoPageTable(page) => write!(f, "no page table for {page}"),
            SwapError::SlotOutOfRange(nr) => write!(f, "swap slot {nr} out of range"),
            SwapError::DoubleFree(slot) => write!(f, "swap slot {slot} already free"),
            SwapError::OutOfSwapMemory => write!(f, "out of swap-memory"),
            SwapError::OutOfMemory => write!(f, "out of memory"),
            SwapError::Uninitialized => write!(f, "system not initialized"),
            SwapError::Frame(err) => Display::fmt(err, f),
            SwapError::Io(err) => write!(f, "swap device error: {err}"),
        }
    }
}

impl Error for SwapError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SwapError::Frame(err) => Some(err),
            SwapError::Io(err) => Some(err),
            _ => None,
        }
    }
}
