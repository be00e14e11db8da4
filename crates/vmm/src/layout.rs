//! The fixed geometry of two-level paging and the kernel's virtual layout.
//!
//! Both supported translation schemes (i686 two-level paging and ARMv7
//! short-descriptor translation) share the same shape: a 1024-entry directory
//! of 1024-entry page tables mapping 4 KiB pages, so one directory entry
//! covers 4 MiB of virtual space. The constants here are the single source of
//! truth for that shape and for where the kernel lives inside every address
//! space.

/// The size, in bytes, of a single page.
pub const PAGE_SIZE: usize = 4096;

/// The number of entries in a page directory.
pub const DIRECTORY_ENTRIES: usize = 1024;

/// The number of entries in a page table.
pub const TABLE_ENTRIES: usize = 1024;

/// The span of virtual space covered by one directory entry (4 MiB).
pub const TABLE_COVERAGE: usize = TABLE_ENTRIES * PAGE_SIZE;

/// The lowest virtual address owned by the kernel. Everything below it is
/// process-private user space.
pub const KERNEL_BASE: usize = 0xC000_0000;

/// The directory index of the first kernel table.
pub const KERNEL_TABLES_START: usize = KERNEL_BASE / TABLE_COVERAGE;

/// The number of directory entries shared by every address space.
pub const KERNEL_TABLE_COUNT: usize = DIRECTORY_ENTRIES - KERNEL_TABLES_START;

/// The physical address the kernel image is loaded at. The 4 MiB starting
/// here are always visible at [`KERNEL_BASE`].
pub const KERNEL_PHYS_BASE: usize = 0x0010_0000;

/// The base of the table-window region: a 4 MiB span in which page `n` is a
/// window onto page table `n` of the active address space.
pub const PSPACE_BASE: usize = 0xC040_0000;

/// The directory index whose page table backs the window region itself.
pub const PSPACE_INDEX: usize = PSPACE_BASE / TABLE_COVERAGE;

/// A transient single-page mapping slot, used when a frame that is not
/// reachable through the active space has to be read or copied.
pub const SCRATCH_BASE: usize = 0xC080_0000;

/// The top 4 MiB of virtual space mirror the first 4 MiB of physical memory.
pub const LOW_PHYS_WINDOW: usize = 0xFFC0_0000;

/// The number of meaningful bits in a virtual or physical address.
pub const ADDRESS_BITS: u32 = 32;

/// Returns the directory index covering `vaddr`.
pub const fn directory_index(vaddr: usize) -> usize {
    (vaddr / TABLE_COVERAGE) % DIRECTORY_ENTRIES
}

/// Returns the index of the entry covering `vaddr` within its page table.
pub const fn table_index(vaddr: usize) -> usize {
    (vaddr / PAGE_SIZE) % TABLE_ENTRIES
}

/// Returns `true` when `vaddr` falls in the process-private half of the
/// address space.
pub const fn is_user_address(vaddr: usize) -> bool {
    vaddr < KERNEL_BASE
}
