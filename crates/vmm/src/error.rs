//! Errors reported by virtual-memory operations.

/// An error arising from a virtual-memory operation.
///
/// These cover the recoverable failures. Internal consistency violations,
/// such as a missing kernel table during early setup, halt the kernel
/// instead of being reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmmError {
    /// No address space has been activated yet.
    NoActiveSpace,
    /// The physical frame allocator is exhausted.
    NoPhysicalSpace,
    /// An address that must be page-aligned was not.
    BadAlignment,
    /// The virtual address is not covered by a page table, so there is
    /// nothing to unmap.
    NotMapped,
    /// The address space is still active on this CPU and cannot be freed.
    StillActive,
    /// The kernel address space can never be freed.
    IsKernelSpace,
}

/// A `Result` with a [`VmmError`] error type.
pub type Result<T> = core::result::Result<T, VmmError>;
