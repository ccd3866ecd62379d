//! Interpretation of page table entries.
//!
//! The processor only looks at a page table entry whose present bit is set. The
//! kernel reuses the other 31 bits of a non-present entry to remember the swap
//! slot holding the page, so an entry is in exactly one of three states:
//!
//! * present: bits 12..=31 are the frame address, the low bits are flags;
//! * absent: the whole word is zero;
//! * swapped: bit 0 is clear and bits 1..=31 are a non-zero slot number.
//!
//! Nothing outside this module looks at the raw bits.

use super::PhysFrame;
use crate::swapping::SwapSlot;
use arbitrary_int::u31;
use bitbybit::bitfield;
use kswap_shared::paging::PageTableEntry;

#[bitfield(u32, default = 0)]
struct SwappedEntry {
    #[bit(0, rw)]
    present: bool,
    #[bits(1..=31, rw)]
    slot: u31,
}

/// Access rights of a present page.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct PagePermissions {
    pub writable: bool,
    pub user: bool,
}

impl PagePermissions {
    /// Full access for user code.
    pub const USER_RW: Self = Self {
        writable: true,
        user: true,
    };
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PageState {
    Absent,
    Present {
        frame: PhysFrame,
        dirty: bool,
        perms: PagePermissions,
    },
    Swapped {
        slot: SwapSlot,
    },
}

impl PageState {
    pub fn decode(entry: PageTableEntry) -> Self {
        if entry.present() {
            return PageState::Present {
                frame: PhysFrame::from_number(entry.page_frame_address()),
                dirty: entry.dirty(),
                perms: PagePermissions {
                    writable: entry.read_write(),
                    user: entry.user_supervisor(),
                },
            };
        }

        let swapped = SwappedEntry::new_with_raw_value(entry.raw_value());
        match SwapSlot::new(swapped.slot().value()) {
            Some(slot) => PageState::Swapped { slot },
            None => PageState::Absent,
        }
    }

    pub fn encode(self) -> PageTableEntry {
        match self {
            PageState::Absent => PageTableEntry::DEFAULT,
            PageState::Present {
                frame,
                dirty,
                perms,
            } => PageTableEntry::DEFAULT
                .with_present(true)
                .with_read_write(perms.writable)
                .with_user_supervisor(perms.user)
                .with_dirty(dirty)
                .with_page_frame_address(frame.number()),
            PageState::Swapped { slot } => PageTableEntry::new_with_raw_value(
                SwappedEntry::DEFAULT
                    .with_present(false)
                    .with_slot(u31::new(slot.get()))
                    .raw_value(),
            ),
        }
    }
}

pub fn is_present(entry: PageTableEntry) -> bool {
    entry.present()
}

pub fn is_dirty(entry: PageTableEntry) -> bool {
    matches!(PageState::decode(entry), PageState::Present { dirty: true, .. })
}

pub fn frame_address(entry: PageTableEntry) -> Option<PhysFrame> {
    match PageState::decode(entry) {
        PageState::Present { frame, .. } => Some(frame),
        _ => None,
    }
}

/// The swap slot named by a non-present entry, or `None` if the entry is present or absent.
pub fn slot_number(entry: PageTableEntry) -> Option<SwapSlot> {
    match PageState::decode(entry) {
        PageState::Swapped { slot } => Some(slot),
        _ => None,
    }
}

pub fn make_present(frame: PhysFrame, dirty: bool, perms: PagePermissions) -> PageTableEntry {
    PageState::Present {
        frame,
        dirty,
        perms,
    }
    .encode()
}

pub fn make_swapped(slot: SwapSlot) -> PageTableEntry {
    PageState::Swapped { slot }.encode()
}

pub fn make_absent() -> PageTableEntry {
    PageState::Absent.encode()
}
