pub mod address_space;
pub mod frame_table;
pub mod page_entry;

use arbitrary_int::u20;
use core::fmt;
use kswap_shared::mem::{PAGE_FRAME_SIZE, PAGE_SHIFT};

/// Physical address of a page frame. Always page aligned.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct PhysFrame(usize);

impl PhysFrame {
    /// The frame holding physical address `addr`.
    pub const fn containing(addr: usize) -> Self {
        Self(addr & !(PAGE_FRAME_SIZE - 1))
    }

    /// The frame whose number (address divided by the page size) is `number`.
    pub fn from_number(number: u20) -> Self {
        Self((number.value() as usize) << PAGE_SHIFT)
    }

    pub const fn address(&self) -> usize {
        self.0
    }

    /// Frame number as stored in a page table entry. Only the low 32 bits of the
    /// physical address space are reachable through 32-bit page tables.
    #[allow(clippy::cast_possible_truncation)]
    pub fn number(&self) -> u20 {
        u20::new(((self.0 >> PAGE_SHIFT) & 0xF_FFFF) as u32)
    }
}

impl fmt::Display for PhysFrame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}
