use crate::sizes::{KB, MB};

// Page size is 4KB. This is a property of x86 processors.
pub const PAGE_FRAME_SIZE: usize = 4 * KB;
pub const PAGE_SHIFT: usize = 12;

// Physical memory below LOW_MEM holds the kernel image and buffers and is
// never handed out as a page frame.
pub const LOW_MEM: usize = MB;

// Every task owns a TASK_SIZE slice of the linear address space. Task 0's
// slice is kernel memory and is never paged.
pub const TASK_SIZE: usize = 64 * MB;

pub const FIRST_VM_PAGE: usize = TASK_SIZE >> PAGE_SHIFT;
pub const LAST_VM_PAGE: usize = 1024 * 1024;
pub const VM_PAGES: usize = LAST_VM_PAGE - FIRST_VM_PAGE;
