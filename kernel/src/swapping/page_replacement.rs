use crate::mem::address_space::AddressSpace;
use kswap_shared::mem::{FIRST_VM_PAGE, VM_PAGES};
use kswap_shared::paging::{VirtualAddress, PAGE_DIRECTORY_LEN, PAGE_TABLE_LEN};

/// Picks the pages the swapper tries to evict.
pub trait PageReplacementPolicy {
    /// The next page to try, or `None` once `budget` is used up. Every candidate
    /// costs one unit of budget and every skipped directory costs a whole
    /// table's worth, so a scan with [`scan_budget`](Self::scan_budget) visits
    /// each user page at most once.
    fn next_candidate<S: AddressSpace + ?Sized>(
        &mut self,
        space: &S,
        budget: &mut usize,
    ) -> Option<VirtualAddress>;

    /// Budget for one eviction attempt.
    fn scan_budget(&self) -> usize {
        VM_PAGES
    }
}

const FIRST_DIRECTORY: usize = FIRST_VM_PAGE / PAGE_TABLE_LEN;

/// Clock-style scan over the user half of the address space. The position
/// survives between scans so eviction pressure spreads over all of memory.
pub struct RoundRobin {
    directory: usize,
    entry: usize,
}

impl Default for RoundRobin {
    fn default() -> Self {
        Self {
            directory: FIRST_DIRECTORY,
            entry: 0,
        }
    }
}

impl RoundRobin {
    /// Where the next scan starts, as (directory index, table index).
    pub fn position(&self) -> (usize, usize) {
        (self.directory, self.entry)
    }

    fn next_directory(&mut self) {
        self.directory += 1;
        if self.directory >= PAGE_DIRECTORY_LEN {
            self.directory = FIRST_DIRECTORY;
        }
        self.entry = 0;
    }
}

impl PageReplacementPolicy for RoundRobin {
    fn next_candidate<S: AddressSpace + ?Sized>(
        &mut self,
        space: &S,
        budget: &mut usize,
    ) -> Option<VirtualAddress> {
        loop {
            if self.entry >= PAGE_TABLE_LEN {
                self.next_directory();
            }
            if space.has_page_table(self.directory) {
                break;
            }
            *budget = budget.checked_sub(PAGE_TABLE_LEN)?;
            self.next_directory();
        }

        *budget = budget.checked_sub(1)?;
        let page = VirtualAddress::from_indices(self.directory, self.entry);
        self.entry += 1;
        Some(page)
    }
}
