//! The physical frame allocator seam.

use crate::address::PhysicalAddress;

/// The physical memory manager as the VMM sees it.
///
/// Frames are page-sized and page-aligned. The VMM treats exhaustion on its
/// internal paths (table allocation, fault resolution) as fatal; callers of
/// the mapping API get it reported as an error instead.
pub trait FrameAllocator {
    /// Allocates one frame, or `None` when physical memory is exhausted.
    fn alloc_frame(&mut self) -> Option<PhysicalAddress>;

    /// Returns `frame` to the allocator.
    fn free_frame(&mut self, frame: PhysicalAddress);
}
