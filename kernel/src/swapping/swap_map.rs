//! The swap-space bitmap.
//!
//! Page 0 of the swap device holds one bit per swap page, set when the page is
//! free. The last [`SWAP_SIGNATURE_LEN`] bytes of that page carry the signature
//! instead; once a device is accepted they are zeroed, which marks the slots
//! they overlap as in use. Slot 0 is the bitmap itself and is never handed out.

use super::{SwapError, SwapSlot};
use alloc::boxed::Box;
use core::fmt::{self, Display, Formatter};
use kswap_shared::bit_array::{self, BitArray};
use kswap_shared::mem::PAGE_FRAME_SIZE;
use kswap_shared::sizes::{SWAP_BITS, SWAP_SIGNATURE_LEN};
use zerocopy::{AsBytes, FromBytes, FromZeroes};

pub const SWAP_SIGNATURE: &[u8; SWAP_SIGNATURE_LEN] = b"SWAP";
pub const SWAP_MAP_BYTES: usize = PAGE_FRAME_SIZE - SWAP_SIGNATURE_LEN;

/// Layout of page 0 of a swap device.
#[repr(C)]
#[derive(FromZeroes, FromBytes, AsBytes)]
pub struct SwapMapPage {
    pub bits: [u8; SWAP_MAP_BYTES],
    pub signature: [u8; SWAP_SIGNATURE_LEN],
}

/// The in-memory copy of a validated swap bitmap.
pub struct SwapMap {
    page: Box<SwapMapPage>,
    /// Pages the device actually has room for.
    usable: usize,
}

impl SwapMap {
    /// Accept the bitmap in `image` for a device holding `usable` pages.
    ///
    /// The signature is assumed checked. The sentinel bit and every bit at or
    /// past `usable` must be clear, and at least one slot must be free.
    pub fn from_image(image: &[u8; PAGE_FRAME_SIZE], usable: usize) -> Result<Self, SwapError> {
        let mut page = SwapMapPage::new_box_zeroed();
        page.as_bytes_mut().copy_from_slice(image);
        page.signature = [0; SWAP_SIGNATURE_LEN];

        let bits = page.as_bytes();
        if bit_array::get(bits, 0) || (usable..SWAP_BITS).any(|nr| bit_array::get(bits, nr)) {
            return Err(SwapError::BadSwapMap);
        }

        let map = SwapMap { page, usable };
        if map.free_slots() == 0 {
            return Err(SwapError::NoSwapSpace);
        }
        Ok(map)
    }

    /// A fresh bitmap for a device with `usable` pages: every slot but the
    /// sentinel free, signature in place.
    pub fn format(usable: usize) -> Box<SwapMapPage> {
        let mut page = SwapMapPage::new_box_zeroed();
        let mut bits = BitArray(page.as_bytes_mut());
        for nr in 1..usable.min(SWAP_BITS) {
            bits.test_and_set(nr);
        }
        page.signature = *SWAP_SIGNATURE;
        page
    }

    fn bits(&mut self) -> BitArray<'_> {
        BitArray(self.page.as_bytes_mut())
    }

    /// Take the lowest free slot (`get_swap_page`).
    pub fn allocate_slot(&mut self) -> Option<SwapSlot> {
        let mut bits = self.bits();
        let nr = (1..SWAP_BITS).find(|&nr| bits.test_and_clear(nr))?;
        SwapSlot::new(u32::try_from(nr).ok()?)
    }

    /// Whether `slot` names a page the device actually has.
    pub fn contains(&self, slot: SwapSlot) -> bool {
        slot.index() < self.usable
    }

    /// Return `slot` to the free pool. The bit is set either way; a slot that
    /// was already free is reported as [`SwapError::DoubleFree`]. Slots past
    /// the end of the device are refused and stay in use.
    pub fn free_slot(&mut self, slot: SwapSlot) -> Result<(), SwapError> {
        if !self.contains(slot) {
            return Err(SwapError::SlotOutOfRange(slot.get()));
        }
        if self.bits().test_and_set(slot.index()) {
            return Err(SwapError::DoubleFree(slot));
        }
        Ok(())
    }

    pub fn is_free(&self, slot: SwapSlot) -> bool {
        self.contains(slot) && bit_array::get(self.page.as_bytes(), slot.index())
    }

    pub fn free_slots(&self) -> usize {
        let bits = self.page.as_bytes();
        (1..self.usable).filter(|&nr| bit_array::get(bits, nr)).count()
    }

    /// Pages on the device, the sentinel included.
    pub fn usable_slots(&self) -> usize {
        self.usable
    }

    /// The bitmap as it goes back to page 0 of the device, signature restored.
    pub fn to_page(&self) -> Box<SwapMapPage> {
        let mut page = SwapMapPage::new_box_zeroed();
        page.bits = self.page.bits;
        page.signature = *SWAP_SIGNATURE;
        page
    }
}

impl Display for SwapMap {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(
            f,
            "{} of {} swap pages free",
            self.free_slots(),
            self.usable.saturating_sub(1)
        )
    }
}
