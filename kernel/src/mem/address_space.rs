use alloc::{boxed::Box, vec::Vec};
use kswap_shared::paging::{
    PageDirectory, PageDirectoryEntry, PageTable, PageTableEntry, VirtualAddress,
    PAGE_DIRECTORY_LEN,
};

/// The page tables the swapper walks and rewrites. Creating and destroying
/// page tables is up to the owner; the swapper only touches individual entries.
pub trait AddressSpace {
    /// Whether the directory entry at `directory` points at a page table.
    fn has_page_table(&self, directory: usize) -> bool;

    /// The page table entry mapping `page`, if its page table exists.
    fn entry_mut(&mut self, page: VirtualAddress) -> Option<&mut PageTableEntry>;

    /// Drop any cached translation for `page` after its entry changed.
    fn invalidate(&mut self, page: VirtualAddress);

    fn entry(&mut self, page: VirtualAddress) -> Option<PageTableEntry> {
        self.entry_mut(page).map(|entry| *entry)
    }
}

/// A page directory together with the page tables it points at.
pub struct PageManager {
    directory: Box<PageDirectory>,
    tables: Vec<Option<Box<PageTable>>>,
    invalidations: usize,
}

impl Default for PageManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PageManager {
    pub fn new() -> Self {
        let mut tables = Vec::with_capacity(PAGE_DIRECTORY_LEN);
        tables.resize_with(PAGE_DIRECTORY_LEN, || None);
        Self {
            directory: Box::default(),
            tables,
            invalidations: 0,
        }
    }

    /// Install an empty page table at `directory`, user accessible and writable. An
    /// existing table is kept.
    pub fn map_page_table(&mut self, directory: usize) -> &mut PageTable {
        self.directory[directory] = PageDirectoryEntry::DEFAULT
            .with_present(true)
            .with_read_write(true)
            .with_user_supervisor(true);
        self.tables[directory].get_or_insert_with(Box::default)
    }

    /// Remove the page table at `directory` and hand it back to the caller, which is
    /// responsible for whatever its entries still refer to.
    pub fn unmap_page_table(&mut self, directory: usize) -> Option<Box<PageTable>> {
        self.directory[directory] = PageDirectoryEntry::DEFAULT;
        self.tables[directory].take()
    }

    pub fn set_entry(&mut self, page: VirtualAddress, entry: PageTableEntry) {
        self.map_page_table(page.directory())[page.table()] = entry;
    }

    /// Number of translation cache invalidations requested so far.
    pub fn invalidations(&self) -> usize {
        self.invalidations
    }
}

impl AddressSpace for PageManager {
    fn has_page_table(&self, directory: usize) -> bool {
        self.directory[directory].present()
    }

    fn entry_mut(&mut self, page: VirtualAddress) -> Option<&mut PageTableEntry> {
        if !self.has_page_table(page.directory()) {
            return None;
        }
        let table = self.tables[page.directory()].as_mut()?;
        Some(&mut table[page.table()])
    }

    fn invalidate(&mut self, page: VirtualAddress) {
        self.invalidations += 1;

        // SAFETY: invlpg only drops a TLB entry.
        #[cfg(all(target_os = "none", target_arch = "x86"))]
        unsafe {
            core::arch::asm!("invlpg [{}]", in(reg) page.raw_value(), options(nostack));
        }
        #[cfg(not(all(target_os = "none", target_arch = "x86")))]
        let _ = page;
    }
}
