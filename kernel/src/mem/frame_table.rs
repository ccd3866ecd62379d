use super::PhysFrame;
use alloc::boxed::Box;
use arbitrary_int::u7;
use bitbybit::bitfield;
use core::error::Error;
use core::fmt::{self, Debug, Display, Formatter};
use core::ptr::NonNull;
use kswap_shared::mem::PAGE_FRAME_SIZE;

/// Largest count the 7-bit `ref_count` field holds.
const MAX_REF_COUNT: u8 = 127;

#[bitfield(u8, default = 0)]
pub struct CoreMapEntry {
    /// Number of page table entries (or kernel owners) referring to the frame.
    #[bits(0..=6, rw)]
    ref_count: u7,
    /// Pinned frames belong to the kernel and never return to the free pool.
    #[bit(7, rw)]
    pinned: bool,
}

impl CoreMapEntry {
    fn is_free(&self) -> bool {
        !self.pinned() && self.ref_count().value() == 0
    }
}

/// Misuse of the frame table. Every one of these points at a bookkeeping bug in the caller.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// The address is not a frame managed by the table
    OutOfRange(PhysFrame),
    /// The frame was released while already free
    NotAllocated(PhysFrame),
    /// The frame is pinned and cannot be shared or released
    Pinned(PhysFrame),
    /// The frame is already referenced by as many owners as the core map can count
    RefCountOverflow(PhysFrame),
    /// The frame was expected to be free
    AlreadyUsed(PhysFrame),
    /// Every frame is in use
    OutOfMemory,
}

impl Debug for FrameError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::OutOfRange(frame) => write!(f, "OutOfRange({frame})"),
            FrameError::NotAllocated(frame) => write!(f, "NotAllocated({frame})"),
            FrameError::Pinned(frame) => write!(f, "Pinned({frame})"),
            FrameError::RefCountOverflow(frame) => write!(f, "RefCountOverflow({frame})"),
            FrameError::AlreadyUsed(frame) => write!(f, "AlreadyUsed({frame})"),
            FrameError::OutOfMemory => write!(f, "OutOfMemory"),
        }
    }
}

impl Display for FrameError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::OutOfRange(frame) => write!(f, "trying to use nonexistent page {frame}"),
            FrameError::NotAllocated(frame) => write!(f, "trying to free free page {frame}"),
            FrameError::Pinned(frame) => write!(f, "page {frame} is pinned"),
            FrameError::RefCountOverflow(frame) => {
                write!(f, "too many references to page {frame}")
            }
            FrameError::AlreadyUsed(frame) => write!(f, "page {frame} is already in use"),
            FrameError::OutOfMemory => write!(f, "out of memory"),
        }
    }
}

impl Error for FrameError {}

/// The physical frame table (`mem_map`): one reference count per frame of
/// pageable memory, plus access to the frames' contents.
pub struct FrameTable {
    /// Kernel mapping of the first managed frame.
    start: NonNull<u8>,
    /// Physical address of the first managed frame.
    low_mem: usize,
    core_map: Box<[CoreMapEntry]>,
}

// SAFETY: The table is the only owner of the frames behind `start` (see
// `new_in`), so moving it to another thread moves that ownership with it.
unsafe impl Send for FrameTable {}

impl FrameTable {
    /// Create a table managing `frames` frames, the first of which has physical
    /// address `low_mem` and is mapped by the kernel at `start`.
    ///
    /// # Safety
    ///
    /// `start` must be page aligned and valid for reads and writes of
    /// `frames * PAGE_FRAME_SIZE` bytes for the lifetime of the table, and
    /// nothing else may access that memory except through the table.
    pub unsafe fn new_in(start: NonNull<u8>, low_mem: usize, frames: usize) -> Self {
        debug_assert_eq!(start.as_ptr() as usize % PAGE_FRAME_SIZE, 0);
        debug_assert_eq!(low_mem % PAGE_FRAME_SIZE, 0);

        Self {
            start,
            low_mem,
            core_map: alloc::vec![CoreMapEntry::DEFAULT; frames].into_boxed_slice(),
        }
    }

    /// Number of frames managed by the table.
    pub fn len(&self) -> usize {
        self.core_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.core_map.is_empty()
    }

    /// Physical address one past the last managed frame.
    pub fn high_mem(&self) -> usize {
        self.low_mem + self.core_map.len() * PAGE_FRAME_SIZE
    }

    /// Whether `frame` lies in the pageable arena.
    pub fn contains(&self, frame: PhysFrame) -> bool {
        self.index(frame).is_ok()
    }

    fn index(&self, frame: PhysFrame) -> Result<usize, FrameError> {
        let addr = frame.address();
        if addr < self.low_mem || addr >= self.high_mem() {
            return Err(FrameError::OutOfRange(frame));
        }
        Ok((addr - self.low_mem) / PAGE_FRAME_SIZE)
    }

    fn frame_at(&self, index: usize) -> PhysFrame {
        PhysFrame::containing(self.low_mem + index * PAGE_FRAME_SIZE)
    }

    /// Reference count of `frame`; zero for frames outside the arena.
    pub fn ref_count(&self, frame: PhysFrame) -> u8 {
        self.index(frame)
            .map(|i| self.core_map[i].ref_count().value())
            .unwrap_or(0)
    }

    pub fn is_pinned(&self, frame: PhysFrame) -> bool {
        self.index(frame)
            .map(|i| self.core_map[i].pinned())
            .unwrap_or(false)
    }

    /// Number of frames that `find_free` could still hand out.
    pub fn free_frames(&self) -> usize {
        self.core_map.iter().filter(|e| e.is_free()).count()
    }

    /// Take the highest-addressed free frame, zero it and give it a single reference.
    pub fn find_free(&mut self) -> Result<PhysFrame, FrameError> {
        let index = (0..self.core_map.len())
            .rev()
            .find(|&i| self.core_map[i].is_free())
            .ok_or(FrameError::OutOfMemory)?;

        self.core_map[index] = self.core_map[index].with_ref_count(u7::new(1));
        let frame = self.frame_at(index);
        self.frame_mut(frame)?.fill(0);
        Ok(frame)
    }

    /// Mark a free frame as referenced once, without touching its contents.
    pub fn mark_used(&mut self, frame: PhysFrame) -> Result<(), FrameError> {
        let i = self.index(frame)?;
        let entry = self.core_map[i];
        if entry.pinned() {
            return Err(FrameError::Pinned(frame));
        }
        if entry.ref_count().value() != 0 {
            return Err(FrameError::AlreadyUsed(frame));
        }
        self.core_map[i] = entry.with_ref_count(u7::new(1));
        Ok(())
    }

    /// Add a reference to an allocated frame, e.g. when a copy-on-write mapping is duplicated.
    pub fn share(&mut self, frame: PhysFrame) -> Result<(), FrameError> {
        let i = self.index(frame)?;
        let entry = self.core_map[i];
        if entry.pinned() {
            return Err(FrameError::Pinned(frame));
        }
        let count = entry.ref_count().value();
        if count == 0 {
            return Err(FrameError::NotAllocated(frame));
        }
        if count == MAX_REF_COUNT {
            return Err(FrameError::RefCountOverflow(frame));
        }
        self.core_map[i] = entry.with_ref_count(u7::new(count + 1));
        Ok(())
    }

    /// Drop one reference to `frame` (`free_page`). The frame returns to the free pool
    /// once no references remain.
    pub fn release(&mut self, frame: PhysFrame) -> Result<(), FrameError> {
        let i = self.index(frame)?;
        let entry = self.core_map[i];
        if entry.pinned() {
            return Err(FrameError::Pinned(frame));
        }
        let count = entry.ref_count().value();
        if count == 0 {
            return Err(FrameError::NotAllocated(frame));
        }
        self.core_map[i] = entry.with_ref_count(u7::new(count - 1));
        Ok(())
    }

    /// Reserve `frame` for the kernel. A pinned frame is never allocated, shared, released
    /// or evicted.
    pub fn pin(&mut self, frame: PhysFrame) -> Result<(), FrameError> {
        let i = self.index(frame)?;
        self.core_map[i] = self.core_map[i].with_pinned(true);
        Ok(())
    }

    pub fn frame(&self, frame: PhysFrame) -> Result<&[u8; PAGE_FRAME_SIZE], FrameError> {
        let i = self.index(frame)?;
        // SAFETY: `i` is in bounds, and `new_in`'s contract makes the memory ours.
        unsafe {
            Ok(&*self
                .start
                .as_ptr()
                .add(i * PAGE_FRAME_SIZE)
                .cast::<[u8; PAGE_FRAME_SIZE]>())
        }
    }

    pub fn frame_mut(&mut self, frame: PhysFrame) -> Result<&mut [u8; PAGE_FRAME_SIZE], FrameError> {
        let i = self.index(frame)?;
        // SAFETY: As in `frame`; `&mut self` guarantees exclusivity.
        unsafe {
            Ok(&mut *self
                .start
                .as_ptr()
                .add(i * PAGE_FRAME_SIZE)
                .cast::<[u8; PAGE_FRAME_SIZE]>())
        }
    }
}

impl Display for FrameTable {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let pinned = self.core_map.iter().filter(|e| e.pinned()).count();
        write!(
            f,
            "{} frames at {:#x}..{:#x}: {} free, {} pinned",
            self.len(),
            self.low_mem,
            self.high_mem(),
            self.free_frames(),
            pinned
        )
    }
}
