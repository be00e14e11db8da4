//! A software-emulated MMU and platform.
//!
//! This is a scale model of the real machine: guest physical memory is one
//! flat byte buffer and a "physical address" is an offset into it. The
//! emulated [`Mmu`] resolves virtual addresses by performing the same
//! two-level walk the hardware would, decoding real entry encodings with the
//! active layout. The table-window arithmetic, fork, and fault paths
//! therefore run for real in tests instead of being stubbed out.

use alloc::alloc::{Layout, alloc_zeroed, dealloc, handle_alloc_error};
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::ptr::NonNull;

use crate::address::{PhysicalAddress, VirtualAddress};
use crate::heap::{HeapBlock, KernelHeap};
use crate::layout;
use crate::pmm::FrameAllocator;
use crate::table::{Directory, PageTable};

/// Emulated guest-physical memory.
///
/// Held as a raw buffer so that pointers into different guest frames can
/// coexist; the MMU and the kernel under test both write through them.
pub struct EmulatedMemory {
    base: *mut u8,
    size: usize,
}

impl EmulatedMemory {
    /// Creates `size` bytes of zeroed guest-physical memory. `size` must be
    /// a whole, non-zero number of pages.
    pub fn new(size: usize) -> Self {
        assert!(
            size != 0 && size % layout::PAGE_SIZE == 0,
            "emulated memory must be page-sized"
        );
        let host_layout = Self::host_layout(size);
        // SAFETY: the layout size was checked to be non-zero above.
        let base = unsafe { alloc_zeroed(host_layout) };
        if base.is_null() {
            handle_alloc_error(host_layout);
        }
        Self { base, size }
    }

    /// The layout of the host allocation backing `size` bytes of guest
    /// memory. Guest frames are referenced as `Directory` and `PageTable`
    /// values, so the allocation carries their page alignment.
    fn host_layout(size: usize) -> Layout {
        Layout::from_size_align(size, layout::PAGE_SIZE).expect("emulated memory layout")
    }

    /// Translates a guest-physical address to a host pointer.
    ///
    /// Panics if the address lies outside the emulated memory.
    pub fn translate(&self, paddr: PhysicalAddress) -> *mut u8 {
        assert!(
            paddr.as_usize() < self.size,
            "emulated physical address out of range"
        );
        // SAFETY: the offset was bounds-checked above.
        unsafe { self.base.add(paddr.as_usize()) }
    }

    /// Returns the size of the emulated memory, in bytes.
    pub fn size(&self) -> usize {
        self.size
    }
}

impl Drop for EmulatedMemory {
    fn drop(&mut self) {
        // SAFETY: `base` came out of `alloc_zeroed` in `new` with this same
        // layout and is freed exactly once.
        unsafe { dealloc(self.base, Self::host_layout(self.size)) };
    }
}

/// The emulated MMU: holds the active translation root and walks the paging
/// structures in guest memory.
pub struct Mmu {
    memory: Arc<EmulatedMemory>,
    table_base: Option<PhysicalAddress>,
}

impl Mmu {
    /// Creates an MMU with no translation root installed yet.
    pub fn new(memory: Arc<EmulatedMemory>) -> Self {
        Self {
            memory,
            table_base: None,
        }
    }

    /// Translates a physical address in the early-boot kernel region to a
    /// pointer the kernel can dereference.
    pub fn phys_to_virt(&self, paddr: PhysicalAddress) -> *mut u8 {
        self.memory.translate(paddr)
    }

    /// Installs `root` as the active translation root.
    pub fn set_table_base(&mut self, root: PhysicalAddress) {
        self.table_base = Some(root);
    }

    /// Resolves `vaddr` to a host pointer by walking the active paging
    /// structures, exactly like the hardware table walk.
    ///
    /// Panics when the walk hits an absent entry; on the real machine that
    /// access would be an unrecoverable kernel fault. Protection bits are
    /// not checked, matching a ring-0 access with supervisor write checks
    /// disabled.
    pub fn page_ptr(&self, vaddr: VirtualAddress) -> *mut u8 {
        let Some(root) = self.table_base else {
            panic!("emulated mmu: access to {vaddr} before a translation root was set");
        };
        // SAFETY: the root was installed by the VMM and points at a
        // directory-initialized frame inside the emulated memory.
        let directory = unsafe { &*(self.memory.translate(root) as *const Directory) };
        let table_desc = directory.entry(vaddr.directory_index());
        if !table_desc.is_present() {
            panic!("emulated mmu: no page table covers {vaddr}");
        }
        // SAFETY: a present directory entry points at a table frame.
        let table =
            unsafe { &*(self.memory.translate(table_desc.frame().start()) as *const PageTable) };
        let page_desc = table.entry(vaddr.table_index());
        if !page_desc.is_present() {
            panic!("emulated mmu: no page mapped at {vaddr}");
        }
        self.memory.translate(page_desc.frame().start() + vaddr.page_offset())
    }

    /// TLB maintenance is a no-op: the emulated walk never caches.
    pub fn flush_tlb_all(&self) {}

    /// TLB maintenance is a no-op: the emulated walk never caches.
    pub fn flush_tlb_entry(&self, _vaddr: VirtualAddress) {}
}

/// An interrupt mask holder. The emulated machine has no interrupts to
/// mask, so this only preserves the scoped acquire/release discipline.
#[must_use]
pub struct InterruptGuard;

impl InterruptGuard {
    /// Masks interrupts until the guard is dropped.
    pub fn acquire() -> Self {
        Self
    }
}

/// An emulated frame allocator and kernel heap, backed by the same guest
/// memory the MMU walks.
///
/// Frames are handed out from a bump cursor starting above the reserved
/// boot structures, with a free list for recycling. Heap blocks are carved
/// from the top of memory downward; the two cursors never meet in tests.
pub struct EmulatedPlatform {
    memory: Arc<EmulatedMemory>,
    next_frame: PhysicalAddress,
    free_frames: Vec<PhysicalAddress>,
    heap_cursor: PhysicalAddress,
}

impl EmulatedPlatform {
    /// Creates a platform handing out frames from `first_frame` upward.
    pub fn new(memory: Arc<EmulatedMemory>, first_frame: PhysicalAddress) -> Self {
        assert!(first_frame.is_aligned(layout::PAGE_SIZE));
        let top = PhysicalAddress::new(memory.size());
        Self {
            memory,
            next_frame: first_frame,
            free_frames: Vec::new(),
            heap_cursor: top,
        }
    }

    /// Returns how many frames the bump cursor has handed out so far.
    pub fn frames_allocated(&self, first_frame: PhysicalAddress) -> usize {
        (self.next_frame - first_frame) / layout::PAGE_SIZE
    }
}

impl FrameAllocator for EmulatedPlatform {
    fn alloc_frame(&mut self) -> Option<PhysicalAddress> {
        if let Some(frame) = self.free_frames.pop() {
            return Some(frame);
        }
        if self.next_frame.as_usize() + layout::PAGE_SIZE > self.heap_cursor.as_usize() {
            return None;
        }
        let frame = self.next_frame;
        self.next_frame = frame + layout::PAGE_SIZE;
        Some(frame)
    }

    fn free_frame(&mut self, frame: PhysicalAddress) {
        self.free_frames.push(frame);
    }
}

impl KernelHeap for EmulatedPlatform {
    fn allocate(&mut self, size: usize) -> Option<HeapBlock> {
        let size = (size + layout::PAGE_SIZE - 1) & !(layout::PAGE_SIZE - 1);
        let lowered = self.heap_cursor.as_usize().checked_sub(size)?;
        if lowered < self.next_frame.as_usize() {
            return None;
        }
        self.heap_cursor = PhysicalAddress::new(lowered);
        let ptr = NonNull::new(self.memory.translate(self.heap_cursor))?;
        Some(HeapBlock::new(ptr, self.heap_cursor))
    }

    fn release(&mut self, _block: HeapBlock, _size: usize) {
        // Bump heap; released blocks are not recycled.
    }
}
