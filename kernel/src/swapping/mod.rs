//! Paging pages out to a swap device and back.
//!
//! When the frame table runs dry, [`SwapManager::get_free_page`] asks the
//! replacement policy for user pages to evict. A dirty page that no one else
//! maps is written to a free swap slot and its page table entry rewritten to
//! name that slot; any other page is simply dropped, since it can be rebuilt
//! from wherever it came from. The page fault handler brings swapped pages
//! back with [`SwapManager::swap_in`].

mod init;
pub mod page_replacement;
mod swap_error;
pub mod swap_map;
pub mod transfer;

pub use init::format_swap_device;
pub use swap_error::SwapError;

use crate::block::block_core::{Block, BlockSector, DeviceNumber};
use crate::mem::address_space::AddressSpace;
use crate::mem::frame_table::{FrameError, FrameTable};
use crate::mem::page_entry::{self, PagePermissions, PageState};
use crate::mem::PhysFrame;
use core::fmt::{self, Display, Formatter};
use core::num::NonZeroU32;
use kswap_shared::paging::{PageTableEntry, VirtualAddress};
use kswap_shared::mem::PAGE_FRAME_SIZE;
use kswap_shared::sizes::MIN_SWAP_SECTORS;
use kswap_shared::{eprintln, println};
use page_replacement::{PageReplacementPolicy, RoundRobin};
use swap_map::SwapMap;
use zerocopy::AsBytes;

/// Device number of the swap partition unless configured otherwise (`/dev/hd6`).
pub const SWAP_DEV: u16 = 0x306;

/// A page-sized slot on the swap device. Slot 0 holds the bitmap and is never
/// a valid slot, and slot numbers must fit in the 31 spare bits of a
/// non-present page table entry.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct SwapSlot(NonZeroU32);

impl SwapSlot {
    pub const MAX: u32 = (1 << 31) - 1;

    pub fn new(nr: u32) -> Option<Self> {
        if nr > Self::MAX {
            return None;
        }
        NonZeroU32::new(nr).map(Self)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }

    /// Bit index in the swap bitmap.
    pub fn index(self) -> usize {
        self.0.get() as usize
    }
}

impl Display for SwapSlot {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub struct SwapConfig {
    /// Block device to swap to. `None` disables swapping.
    pub device: Option<DeviceNumber>,
    /// Smallest device, in sectors, worth swapping to.
    pub min_sectors: BlockSector,
}

impl Default for SwapConfig {
    fn default() -> Self {
        Self {
            device: Some(DeviceNumber::from_raw(SWAP_DEV)),
            min_sectors: MIN_SWAP_SECTORS,
        }
    }
}

/// An enabled swap device and its bitmap.
struct SwapArea {
    device: Block,
    map: SwapMap,
}

/// Counters for the swapper's activity.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct SwapStats {
    pub swapped_out: usize,
    pub discarded: usize,
    pub swapped_in: usize,
}

/// Owns the frame table and the swap device, and moves pages between them.
pub struct SwapManager<P = RoundRobin> {
    frames: FrameTable,
    swap: Option<SwapArea>,
    policy: P,
    stats: SwapStats,
}

impl<P: PageReplacementPolicy + Default> SwapManager<P> {
    pub fn new(frames: FrameTable) -> Self {
        Self::with_policy(frames, P::default())
    }
}

impl<P: PageReplacementPolicy> SwapManager<P> {
    pub fn with_policy(frames: FrameTable, policy: P) -> Self {
        Self {
            frames,
            swap: None,
            policy,
            stats: SwapStats::default(),
        }
    }

    pub fn frames(&self) -> &FrameTable {
        &self.frames
    }

    pub fn frames_mut(&mut self) -> &mut FrameTable {
        &mut self.frames
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn stats(&self) -> SwapStats {
        self.stats
    }

    pub fn is_swapping_enabled(&self) -> bool {
        self.swap.is_some()
    }

    pub fn swap_map(&self) -> Option<&SwapMap> {
        self.swap.as_ref().map(|swap| &swap.map)
    }

    /// Free swap slots, or `None` while swapping is disabled.
    pub fn free_slots(&self) -> Option<usize> {
        self.swap_map().map(SwapMap::free_slots)
    }

    pub fn swap_device_mut(&mut self) -> Option<&mut Block> {
        self.swap.as_mut().map(|swap| &mut swap.device)
    }

    /// Stop swapping and hand back the device, with the bitmap written back to
    /// page 0. Pages already on it stay there, so this is only safe once no page
    /// table entry names a slot.
    pub fn disable_swapping(&mut self) -> Option<Block> {
        let SwapArea { mut device, map } = self.swap.take()?;
        let mut image = [0u8; PAGE_FRAME_SIZE];
        image.copy_from_slice(map.to_page().as_bytes());
        if let Err(err) = transfer::write_page(&mut device, 0, &image) {
            eprintln!("Unable to write back swap-space bit-map: {}", err);
        }
        println!("Swapping disabled on dev {}", device.get_device());
        Some(device)
    }

    /// Take a free swap slot, or `None` if there is none or swapping is off.
    pub fn get_swap_page(&mut self) -> Option<SwapSlot> {
        self.swap.as_mut()?.map.allocate_slot()
    }

    /// Give slot `nr` back. Slot 0 means "no slot" and is ignored.
    pub fn swap_free(&mut self, nr: u32) -> Result<(), SwapError> {
        let Some(slot) = SwapSlot::new(nr) else {
            if nr == 0 {
                return Ok(());
            }
            eprintln!("Swap-space bad (swap_free())");
            return Err(SwapError::SlotOutOfRange(nr));
        };
        let Some(swap) = self.swap.as_mut() else {
            eprintln!("Swap-space bad (swap_free())");
            return Err(SwapError::SwappingDisabled);
        };
        swap.map
            .free_slot(slot)
            .inspect_err(|err| eprintln!("Swap-space bad (swap_free()): {}", err))
    }

    /// Try to evict the page mapped at `page`. `Ok(false)` means the page is not
    /// an eviction candidate (absent, already swapped, outside the frame table,
    /// pinned, or dirty with no swap slot to put it in).
    pub fn try_to_swap_out<S: AddressSpace + ?Sized>(
        &mut self,
        space: &mut S,
        page: VirtualAddress,
    ) -> Result<bool, SwapError> {
        let Some(entry) = space.entry(page) else {
            return Ok(false);
        };
        let PageState::Present { frame, dirty, .. } = PageState::decode(entry) else {
            return Ok(false);
        };
        if !self.frames.contains(frame) || self.frames.is_pinned(frame) {
            return Ok(false);
        }

        if dirty && self.frames.ref_count(frame) == 1 {
            let Some(slot) = self.get_swap_page() else {
                return Ok(false);
            };
            set_entry(space, page, page_entry::make_swapped(slot))?;
            space.invalidate(page);

            if let Err(err) = self.write_out(frame, slot) {
                // Leave the page resident and the slot free.
                set_entry(space, page, entry)?;
                space.invalidate(page);
                self.swap_free(slot.get())?;
                return Err(err);
            }
            self.frames.release(frame)?;
            self.stats.swapped_out += 1;
            return Ok(true);
        }

        set_entry(space, page, page_entry::make_absent())?;
        space.invalidate(page);
        self.frames.release(frame)?;
        self.stats.discarded += 1;
        Ok(true)
    }

    fn write_out(&mut self, frame: PhysFrame, slot: SwapSlot) -> Result<(), SwapError> {
        let swap = self.swap.as_mut().ok_or(SwapError::SwappingDisabled)?;
        transfer::write_slot(&mut swap.device, slot, self.frames.frame(frame)?)
    }

    /// Evict one user page, scanning from where the last eviction stopped.
    /// Returns the page evicted.
    pub fn swap_out<S: AddressSpace + ?Sized>(
        &mut self,
        space: &mut S,
    ) -> Result<VirtualAddress, SwapError> {
        let mut budget = self.policy.scan_budget();
        while let Some(page) = self.policy.next_candidate(space, &mut budget) {
            if self.try_to_swap_out(space, page)? {
                #[cfg(feature = "swap_trace")]
                println!("swap: evicted page {}", page);
                return Ok(page);
            }
        }
        eprintln!("Out of swap-memory");
        Err(SwapError::OutOfSwapMemory)
    }

    /// Allocate a zeroed frame with a single reference, evicting pages until
    /// one is free.
    pub fn get_free_page<S: AddressSpace + ?Sized>(
        &mut self,
        space: &mut S,
    ) -> Result<PhysFrame, SwapError> {
        loop {
            match self.frames.find_free() {
                Ok(frame) => return Ok(frame),
                Err(FrameError::OutOfMemory) => {}
                Err(err) => return Err(err.into()),
            }
            match self.swap_out(space) {
                Ok(_) => continue,
                Err(SwapError::OutOfSwapMemory) => return Err(SwapError::OutOfMemory),
                Err(err) => return Err(err),
            }
        }
    }

    /// Bring the page named by the swapped entry at `page` back into memory.
    /// The page comes back dirty, since its slot is freed.
    pub fn swap_in<S: AddressSpace + ?Sized>(
        &mut self,
        space: &mut S,
        page: VirtualAddress,
    ) -> Result<(), SwapError> {
        if self.swap.is_none() {
            eprintln!("Trying to swap in without swap bit-map");
            return Err(SwapError::SwappingDisabled);
        }
        let Some(entry) = space.entry(page) else {
            eprintln!("No page table for swap_in at {}", page);
            return Err(SwapError::NoPageTable(page));
        };
        let slot = match PageState::decode(entry) {
            PageState::Swapped { slot } => slot,
            PageState::Present { .. } => {
                eprintln!("trying to swap in present page");
                return Err(SwapError::AlreadyPresent(page));
            }
            PageState::Absent => {
                eprintln!("No swap page in swap_in");
                return Err(SwapError::NotSwapped(page));
            }
        };
        if !self.swap_map().is_some_and(|map| map.contains(slot)) {
            eprintln!("Swap-space bad (swap_in): slot {}", slot);
            return Err(SwapError::SlotOutOfRange(slot.get()));
        }

        let frame = self.get_free_page(space)?;
        if let Err(err) = self.read_in(frame, slot) {
            self.frames.release(frame)?;
            return Err(err);
        }
        if let Some(swap) = self.swap.as_mut() {
            if swap.map.free_slot(slot).is_err() {
                eprintln!("swapping in multiply from same page");
            }
        }

        let present = page_entry::make_present(frame, true, PagePermissions::USER_RW);
        if let Err(err) = set_entry(space, page, present) {
            self.frames.release(frame)?;
            return Err(err);
        }
        self.stats.swapped_in += 1;
        Ok(())
    }

    fn read_in(&mut self, frame: PhysFrame, slot: SwapSlot) -> Result<(), SwapError> {
        let swap = self.swap.as_mut().ok_or(SwapError::SwappingDisabled)?;
        transfer::read_slot(&mut swap.device, slot, self.frames.frame_mut(frame)?)
    }

    /// Unmap `page` for good, dropping its frame reference or freeing its swap slot.
    pub fn release_page<S: AddressSpace + ?Sized>(
        &mut self,
        space: &mut S,
        page: VirtualAddress,
    ) -> Result<(), SwapError> {
        let Some(entry) = space.entry(page) else {
            return Ok(());
        };
        match PageState::decode(entry) {
            PageState::Absent => Ok(()),
            PageState::Present { frame, .. } => {
                set_entry(space, page, page_entry::make_absent())?;
                space.invalidate(page);
                if self.frames.contains(frame) {
                    self.frames.release(frame)?;
                }
                Ok(())
            }
            PageState::Swapped { slot } => {
                set_entry(space, page, page_entry::make_absent())?;
                self.swap_free(slot.get())
            }
        }
    }
}

fn set_entry<S: AddressSpace + ?Sized>(
    space: &mut S,
    page: VirtualAddress,
    entry: PageTableEntry,
) -> Result<(), SwapError> {
    *space.entry_mut(page).ok_or(SwapError::NoPageTable(page))? = entry;
    Ok(())
}

impl<P> Display for SwapManager<P> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        writeln!(f, "{}", self.frames)?;
        match &self.swap {
            Some(swap) => writeln!(f, "swap on dev {}: {}", swap.device.get_device(), swap.map)?,
            None => writeln!(f, "swap disabled")?,
        }
        write!(
            f,
            "{} swapped out, {} discarded, {} swapped in",
            self.stats.swapped_out, self.stats.discarded, self.stats.swapped_in
        )
    }
}

#[cfg(test)]
pub mod test {
    use super::*;
    use crate::block::block_core::test::failing_block;
    use crate::block::block_core::{BlockManager, BlockType};
    use crate::block::block_error::BlockError;
    use crate::block::ram_disk::RamDisk;
    use crate::mem::address_space::PageManager;
    use crate::mem::frame_table::test::{frame, frame_table};
    use alloc::boxed::Box;
    use transfer::SECTORS_PER_PAGE;

    pub fn swap_dev() -> DeviceNumber {
        DeviceNumber::from_raw(SWAP_DEV)
    }

    /// A formatted RAM swap device with room for `pages` pages, the bitmap page included.
    pub fn swap_block(pages: usize) -> Block {
        let sectors = pages * SECTORS_PER_PAGE as usize;
        let mut block = Block::new(
            swap_dev(),
            BlockType::Swap,
            "ramswap",
            sectors as BlockSector,
            Box::new(RamDisk::new(sectors)),
        );
        format_swap_device(&mut block).unwrap();
        block
    }

    /// The default swap device, with no lower bound on its size.
    pub fn any_size() -> SwapConfig {
        SwapConfig {
            min_sectors: 0,
            ..SwapConfig::default()
        }
    }

    /// A swapper over `frames` frames with a `swap_pages`-page swap device.
    pub fn swap_manager(frames: usize, swap_pages: usize) -> SwapManager {
        let mut blocks = BlockManager::new();
        blocks.register_block(swap_block(swap_pages));
        let mut swap = SwapManager::new(frame_table(frames));
        swap.init_swapping(&any_size(), &mut blocks).unwrap();
        assert!(blocks.is_empty());
        swap
    }

    fn page(dir: usize, entry: usize) -> VirtualAddress {
        VirtualAddress::from_indices(dir, entry)
    }

    /// Map a fresh frame at `at`, filled with `fill`.
    fn map_page(
        swap: &mut SwapManager,
        pm: &mut PageManager,
        at: VirtualAddress,
        dirty: bool,
        fill: u8,
    ) -> PhysFrame {
        let frame = swap.frames_mut().find_free().unwrap();
        swap.frames_mut().frame_mut(frame).unwrap().fill(fill);
        pm.set_entry(
            at,
            page_entry::make_present(frame, dirty, PagePermissions::USER_RW),
        );
        frame
    }

    fn state(pm: &mut PageManager, at: VirtualAddress) -> PageState {
        PageState::decode(pm.entry(at).unwrap())
    }

    fn slot(n: u32) -> SwapSlot {
        SwapSlot::new(n).unwrap()
    }

    #[test]
    fn swap_slot_range() {
        assert!(SwapSlot::new(0).is_none());
        assert!(SwapSlot::new(1 << 31).is_none());
        assert_eq!(SwapSlot::new(SwapSlot::MAX).map(SwapSlot::get), Some(SwapSlot::MAX));
    }

    #[test]
    fn dirty_private_page_goes_to_swap() {
        let mut swap = swap_manager(4, 16);
        let mut pm = PageManager::new();
        let at = page(16, 0);
        let frame = map_page(&mut swap, &mut pm, at, true, 0x5A);
        let free_before = swap.free_slots().unwrap();

        assert_eq!(swap.swap_out(&mut pm).unwrap().raw_value(), at.raw_value());
        assert_eq!(state(&mut pm, at), PageState::Swapped { slot: slot(1) });
        assert_eq!(pm.entry(at).unwrap().raw_value(), 1 << 1);
        assert_eq!(swap.frames().ref_count(frame), 0);
        assert_eq!(swap.free_slots(), Some(free_before - 1));
        assert_eq!(pm.invalidations(), 1);

        let mut back = [0u8; PAGE_FRAME_SIZE];
        transfer::read_slot(swap.swap_device_mut().unwrap(), slot(1), &mut back).unwrap();
        assert!(back.iter().all(|&b| b == 0x5A));
        assert_eq!(swap.stats().swapped_out, 1);
    }

    #[test]
    fn clean_page_is_discarded_without_io() {
        let mut swap = swap_manager(4, 16);
        let mut pm = PageManager::new();
        let at = page(16, 5);
        let frame = map_page(&mut swap, &mut pm, at, false, 1);
        let writes = swap.swap_device_mut().unwrap().write_count();

        assert!(swap.try_to_swap_out(&mut pm, at).unwrap());
        assert_eq!(state(&mut pm, at), PageState::Absent);
        assert_eq!(swap.frames().ref_count(frame), 0);
        assert_eq!(swap.swap_device_mut().unwrap().write_count(), writes);
        assert_eq!(swap.free_slots(), Some(15));
    }

    #[test]
    fn shared_dirty_page_loses_one_reference() {
        let mut swap = swap_manager(4, 16);
        let mut pm = PageManager::new();
        let at = page(17, 0);
        let frame = map_page(&mut swap, &mut pm, at, true, 1);
        swap.frames_mut().share(frame).unwrap();
        let writes = swap.swap_device_mut().unwrap().write_count();

        assert!(swap.try_to_swap_out(&mut pm, at).unwrap());
        assert_eq!(state(&mut pm, at), PageState::Absent);
        assert_eq!(swap.frames().ref_count(frame), 1);
        assert_eq!(swap.swap_device_mut().unwrap().write_count(), writes);
        assert_eq!(swap.free_slots(), Some(15));
        assert_eq!(swap.stats().discarded, 1);
    }

    #[test]
    fn non_candidates_are_left_alone() {
        let mut swap = swap_manager(4, 16);
        let mut pm = PageManager::new();

        // No page table, absent entry, swapped entry.
        assert!(!swap.try_to_swap_out(&mut pm, page(30, 0)).unwrap());
        pm.map_page_table(30);
        assert!(!swap.try_to_swap_out(&mut pm, page(30, 0)).unwrap());
        pm.set_entry(page(30, 1), page_entry::make_swapped(slot(9)));
        assert!(!swap.try_to_swap_out(&mut pm, page(30, 1)).unwrap());

        // Below the frame table.
        let low = PhysFrame::containing(0x9000);
        pm.set_entry(page(30, 2), page_entry::make_present(low, true, PagePermissions::USER_RW));
        assert!(!swap.try_to_swap_out(&mut pm, page(30, 2)).unwrap());

        // Pinned.
        let pinned = map_page(&mut swap, &mut pm, page(30, 3), true, 0);
        swap.frames_mut().pin(pinned).unwrap();
        assert!(!swap.try_to_swap_out(&mut pm, page(30, 3)).unwrap());

        assert_eq!(pm.invalidations(), 0);
        assert!(matches!(swap.swap_out(&mut pm), Err(SwapError::OutOfSwapMemory)));
    }

    #[test]
    fn dirty_page_stays_without_swap_space() {
        let mut swap: SwapManager = SwapManager::new(frame_table(2));
        let mut pm = PageManager::new();
        let at = page(16, 0);
        let frame = map_page(&mut swap, &mut pm, at, true, 3);

        assert!(!swap.try_to_swap_out(&mut pm, at).unwrap());
        let resident = page_entry::make_present(frame, true, PagePermissions::USER_RW);
        assert_eq!(pm.entry(at).map(|e| e.raw_value()), Some(resident.raw_value()));
        assert_eq!(swap.frames().ref_count(frame), 1);
    }

    #[test]
    fn eviction_is_round_robin() {
        let mut swap = swap_manager(8, 16);
        let mut pm = PageManager::new();
        for at in [page(16, 3), page(16, 9), page(40, 0)] {
            map_page(&mut swap, &mut pm, at, false, 0);
        }
        // Kernel pages are never evicted.
        map_page(&mut swap, &mut pm, page(3, 0), false, 0);

        let order: alloc::vec::Vec<_> = (0..3)
            .map(|_| swap.swap_out(&mut pm).unwrap())
            .map(|p| (p.directory(), p.table()))
            .collect();
        assert_eq!(order, [(16, 3), (16, 9), (40, 0)]);
        assert!(matches!(swap.swap_out(&mut pm), Err(SwapError::OutOfSwapMemory)));

        // The failed scan went all the way round, so the next one resumes past (40, 0).
        map_page(&mut swap, &mut pm, page(16, 1), false, 0);
        map_page(&mut swap, &mut pm, page(40, 7), false, 0);
        let next = swap.swap_out(&mut pm).unwrap();
        assert_eq!((next.directory(), next.table()), (40, 7));
        let next = swap.swap_out(&mut pm).unwrap();
        assert_eq!((next.directory(), next.table()), (16, 1));
    }

    #[test]
    fn swap_in_restores_contents() {
        let mut swap = swap_manager(4, 16);
        let mut pm = PageManager::new();
        let at = page(16, 0);
        map_page(&mut swap, &mut pm, at, true, 0x77);
        swap.swap_out(&mut pm).unwrap();
        let free = swap.free_slots().unwrap();

        swap.swap_in(&mut pm, at).unwrap();
        let PageState::Present { frame, dirty, perms } = state(&mut pm, at) else {
            panic!("page not present after swap_in");
        };
        assert!(dirty);
        assert_eq!(perms, PagePermissions::USER_RW);
        assert_eq!(swap.frames().ref_count(frame), 1);
        assert!(swap.frames().frame(frame).unwrap().iter().all(|&b| b == 0x77));
        assert_eq!(swap.free_slots(), Some(free + 1));
        assert!(swap.swap_map().unwrap().is_free(slot(1)));
    }

    #[test]
    fn swap_in_rejects_bad_entries() {
        let mut pm = PageManager::new();
        let at = page(16, 0);

        let mut off: SwapManager = SwapManager::new(frame_table(2));
        pm.set_entry(at, page_entry::make_swapped(slot(1)));
        assert!(matches!(off.swap_in(&mut pm, at), Err(SwapError::SwappingDisabled)));

        let mut swap = swap_manager(4, 16);
        assert!(matches!(swap.swap_in(&mut pm, page(99, 0)), Err(SwapError::NoPageTable(_))));

        pm.set_entry(at, page_entry::make_absent());
        assert!(matches!(swap.swap_in(&mut pm, at), Err(SwapError::NotSwapped(_))));

        map_page(&mut swap, &mut pm, at, true, 0);
        assert!(matches!(swap.swap_in(&mut pm, at), Err(SwapError::AlreadyPresent(_))));

        // Slot 16 is one past the end of the 16-page device.
        pm.set_entry(at, page_entry::make_swapped(slot(16)));
        assert!(matches!(swap.swap_in(&mut pm, at), Err(SwapError::SlotOutOfRange(16))));
        assert_eq!(swap.frames().free_frames(), 3);
    }

    #[test]
    fn swap_in_from_a_free_slot_still_succeeds() {
        let mut swap = swap_manager(4, 16);
        let mut pm = PageManager::new();
        let at = page(20, 4);
        pm.set_entry(at, page_entry::make_swapped(slot(5)));

        swap.swap_in(&mut pm, at).unwrap();
        assert!(matches!(state(&mut pm, at), PageState::Present { dirty: true, .. }));
        assert!(swap.swap_map().unwrap().is_free(slot(5)));
    }

    #[test]
    fn get_free_page_evicts_when_memory_is_full() {
        let mut swap = swap_manager(2, 16);
        let mut pm = PageManager::new();
        let a = map_page(&mut swap, &mut pm, page(16, 0), true, 0xAA);
        map_page(&mut swap, &mut pm, page(16, 1), true, 0xBB);
        assert_eq!(swap.frames().free_frames(), 0);

        let frame = swap.get_free_page(&mut pm).unwrap();
        assert_eq!(frame, a);
        assert_eq!(swap.frames().ref_count(frame), 1);
        assert!(swap.frames().frame(frame).unwrap().iter().all(|&b| b == 0));
        assert_eq!(state(&mut pm, page(16, 0)), PageState::Swapped { slot: slot(1) });
    }

    #[test]
    fn get_free_page_fails_when_nothing_is_evictable() {
        let mut swap = swap_manager(2, 16);
        let mut pm = PageManager::new();
        for n in 0..2 {
            let f = swap.frames_mut().find_free().unwrap();
            swap.frames_mut().pin(f).unwrap();
            assert_eq!(f, frame(1 - n));
        }
        assert!(matches!(swap.get_free_page(&mut pm), Err(SwapError::OutOfMemory)));
    }

    #[test]
    fn swap_in_evicts_to_make_room() {
        let mut swap = swap_manager(1, 16);
        let mut pm = PageManager::new();
        let a = page(16, 0);
        let b = page(16, 1);
        map_page(&mut swap, &mut pm, a, true, 0x11);
        swap.swap_out(&mut pm).unwrap();
        map_page(&mut swap, &mut pm, b, true, 0x22);

        swap.swap_in(&mut pm, a).unwrap();
        assert!(matches!(state(&mut pm, a), PageState::Present { .. }));
        assert!(matches!(state(&mut pm, b), PageState::Swapped { .. }));
        assert!(swap.frames().frame(frame(0)).unwrap().iter().all(|&b| b == 0x11));
    }

    #[test]
    fn write_failure_leaves_the_page_resident() {
        let mut swap = swap_manager(2, 16);
        let mut pm = PageManager::new();
        let at = page(16, 0);
        let frame = map_page(&mut swap, &mut pm, at, true, 9);
        swap.swap.as_mut().unwrap().device = failing_block(swap_dev(), 128);

        assert!(matches!(
            swap.try_to_swap_out(&mut pm, at),
            Err(SwapError::Io(BlockError::WriteError))
        ));
        assert!(matches!(state(&mut pm, at), PageState::Present { dirty: true, .. }));
        assert_eq!(swap.frames().ref_count(frame), 1);
        assert!(swap.swap_map().unwrap().is_free(slot(1)));
        assert_eq!(swap.stats(), SwapStats::default());
    }

    #[test]
    fn read_failure_releases_the_new_frame() {
        let mut swap = swap_manager(2, 16);
        let mut pm = PageManager::new();
        let at = page(16, 0);
        pm.set_entry(at, page_entry::make_swapped(slot(2)));
        swap.swap.as_mut().unwrap().device = failing_block(swap_dev(), 128);

        assert!(matches!(
            swap.swap_in(&mut pm, at),
            Err(SwapError::Io(BlockError::ReadError))
        ));
        assert_eq!(swap.frames().free_frames(), 2);
        assert_eq!(state(&mut pm, at), PageState::Swapped { slot: slot(2) });
    }

    #[test]
    fn release_page_frees_frames_and_slots() {
        let mut swap = swap_manager(4, 16);
        let mut pm = PageManager::new();
        let a = page(16, 0);
        let b = page(16, 1);
        let frame = map_page(&mut swap, &mut pm, a, false, 0);
        map_page(&mut swap, &mut pm, b, true, 0);
        swap.try_to_swap_out(&mut pm, b).unwrap();
        assert_eq!(swap.free_slots(), Some(14));

        swap.release_page(&mut pm, a).unwrap();
        swap.release_page(&mut pm, b).unwrap();
        assert_eq!(swap.frames().ref_count(frame), 0);
        assert_eq!(swap.free_slots(), Some(15));
        assert_eq!(state(&mut pm, b), PageState::Absent);
    }

    #[test]
    fn disabling_hands_the_device_back() {
        let mut swap = swap_manager(2, 16);
        assert_eq!(swap.get_swap_page(), Some(slot(1)));
        let dev = swap.disable_swapping().unwrap();
        assert!(!swap.is_swapping_enabled());
        assert!(swap.disable_swapping().is_none());
        assert_eq!(swap.get_swap_page(), None);

        // The bitmap went back to disk: slot 1 is still taken.
        let mut blocks = BlockManager::new();
        blocks.register_block(dev);
        assert_eq!(swap.init_swapping(&any_size(), &mut blocks).unwrap(), 14);
        assert_eq!(swap.get_swap_page(), Some(slot(2)));
    }

    #[test]
    fn slots_past_the_device_stay_out_of_the_pool() {
        let mut swap = swap_manager(4, 16);
        let mut pm = PageManager::new();
        assert!(matches!(swap.swap_free(40), Err(SwapError::SlotOutOfRange(40))));
        assert_eq!(swap.free_slots(), Some(15));

        for n in 1..16 {
            assert_eq!(swap.get_swap_page(), Some(slot(n)));
        }
        assert_eq!(swap.get_swap_page(), None);

        // With the device full, a dirty page stays resident instead of failing the write.
        let at = page(16, 0);
        map_page(&mut swap, &mut pm, at, true, 0);
        assert!(!swap.try_to_swap_out(&mut pm, at).unwrap());
        assert!(matches!(state(&mut pm, at), PageState::Present { .. }));
    }

    #[test]
    fn swap_free_reports_bad_slots() {
        let mut swap = swap_manager(2, 16);
        assert!(swap.swap_free(0).is_ok());
        assert!(matches!(swap.swap_free(3), Err(SwapError::DoubleFree(_))));
        assert!(matches!(swap.swap_free(u32::MAX), Err(SwapError::SlotOutOfRange(_))));
        assert_eq!(swap.get_swap_page(), Some(slot(1)));
        assert!(swap.swap_free(1).is_ok());

        let mut off: SwapManager = SwapManager::new(frame_table(1));
        assert!(matches!(off.swap_free(1), Err(SwapError::SwappingDisabled)));
        assert_eq!(off.get_swap_page(), None);
    }
}
