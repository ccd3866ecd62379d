use crate::block::block_core::BlockManager;
use crate::mem::address_space::PageManager;
use crate::mem::PhysFrame;
use crate::swapping::{SwapConfig, SwapError, SwapManager};
use crate::sync::{Mutex, MutexGuard};
use alloc::boxed::Box;
use kswap_shared::paging::VirtualAddress;
use once_cell::race::OnceBox;

/// Everything the swapper touches, behind one lock. Page faults and
/// allocations from any CPU serialize here.
pub struct SystemState {
    pub block_manager: BlockManager,
    pub page_manager: PageManager,
    pub swap: SwapManager,
}

static SYSTEM: OnceBox<Mutex<SystemState>> = OnceBox::new();

/// Install the global state. If it was installed already, `state` is handed back.
pub fn init_system(state: SystemState) -> Result<(), SystemState> {
    SYSTEM
        .set(Box::new(Mutex::new(state)))
        .map_err(|mutex| (*mutex).into_inner())
}

pub fn lock_system() -> Result<MutexGuard<'static, SystemState>, SwapError> {
    SYSTEM
        .get()
        .map(|system| system.lock())
        .ok_or(SwapError::Uninitialized)
}

/// Enable swapping on the configured device. Returns the number of free swap pages.
pub fn init_swapping(config: &SwapConfig) -> Result<usize, SwapError> {
    let mut system = lock_system()?;
    let SystemState {
        block_manager,
        swap,
        ..
    } = &mut *system;
    swap.init_swapping(config, block_manager)
}

/// Page fault handler for a non-present user page whose entry names a swap slot.
pub fn handle_swap_fault(addr: VirtualAddress) -> Result<(), SwapError> {
    let mut system = lock_system()?;
    let SystemState {
        page_manager, swap, ..
    } = &mut *system;
    swap.swap_in(page_manager, addr)
}

/// A zeroed frame for the kernel or a process, evicting user pages if memory is full.
pub fn get_free_page() -> Result<PhysFrame, SwapError> {
    let mut system = lock_system()?;
    let SystemState {
        page_manager, swap, ..
    } = &mut *system;
    swap.get_free_page(page_manager)
}
