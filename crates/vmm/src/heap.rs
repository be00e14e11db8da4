//! The kernel heap seam.

use core::ptr::NonNull;

use crate::address::PhysicalAddress;
use crate::layout;

/// A page-aligned block handed out by the kernel heap.
///
/// Carries both the pointer the kernel dereferences and the physical address
/// of the same memory. The VMM needs both: a heap-allocated directory is
/// written through the pointer but installed as a translation root by its
/// physical address.
#[derive(Debug)]
pub struct HeapBlock {
    ptr: NonNull<u8>,
    phys: PhysicalAddress,
}

impl HeapBlock {
    /// Creates a block from its two views. `ptr` must address the same
    /// page-aligned memory that `phys` names.
    pub fn new(ptr: NonNull<u8>, phys: PhysicalAddress) -> Self {
        assert!(phys.is_aligned(layout::PAGE_SIZE));
        Self { ptr, phys }
    }

    /// Returns the pointer the kernel dereferences.
    pub fn ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    /// Returns the physical address of the block.
    pub fn phys(&self) -> PhysicalAddress {
        self.phys
    }
}

/// The kernel heap as the VMM sees it.
pub trait KernelHeap {
    /// Allocates a page-aligned block of at least `size` bytes, or `None`
    /// when the heap is exhausted.
    fn allocate(&mut self, size: usize) -> Option<HeapBlock>;

    /// Returns a block obtained from [`KernelHeap::allocate`]. `size` must
    /// match the original request.
    fn release(&mut self, block: HeapBlock, size: usize);

    /// One-time setup, called while the VMM boots and right after the
    /// kernel address space becomes active. The heap may claim kernel
    /// virtual space and write into it immediately; pages materialize
    /// through the kernel fault path.
    fn bootstrap(&mut self) {}
}
