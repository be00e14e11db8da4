//! Flag vocabularies shared by both entry layouts.
//!
//! Callers describe mappings with [`MapFlags`]; the paging structures store
//! [`TableAttrs`] and [`PageAttrs`], which each entry layout encodes in its
//! own bit positions. [`FaultFlags`] is the normalized page-fault syndrome
//! delivered by the trap glue.

use bitflags::bitflags;

use crate::address::VirtualAddress;

bitflags! {
    /// Architecture-neutral attributes of a directory entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TableAttrs: u32 {
        const PRESENT = 1 << 0;
        const WRITABLE = 1 << 1;
        const USER = 1 << 2;
        const COPY_ON_WRITE = 1 << 3;
        const ZERO_ON_DEMAND = 1 << 4;
    }
}

bitflags! {
    /// Architecture-neutral attributes of a page entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PageAttrs: u32 {
        const PRESENT = 1 << 0;
        const WRITABLE = 1 << 1;
        const USER = 1 << 2;
        const NOT_CACHEABLE = 1 << 3;
        const COPY_ON_WRITE = 1 << 4;
        const ZERO_ON_DEMAND = 1 << 5;
    }
}

bitflags! {
    /// Protection and behavior flags for mapping requests.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MapFlags: u32 {
        const READABLE = 1 << 0;
        const WRITABLE = 1 << 1;
        const EXECUTABLE = 1 << 2;
        const NOT_CACHEABLE = 1 << 3;
        const COPY_ON_WRITE = 1 << 4;
        const ZERO_ON_DEMAND = 1 << 5;
        const USER = 1 << 6;

        /// A full-access mapping of kernel-owned memory.
        const RWX = Self::READABLE.bits() | Self::WRITABLE.bits() | Self::EXECUTABLE.bits();
    }
}

impl MapFlags {
    /// Returns [`MapFlags::USER`] when `vaddr` lies in user space, so the
    /// mapping is accessible to whichever side of the split owns the address.
    pub fn owner_of(vaddr: VirtualAddress) -> MapFlags {
        if vaddr.is_user() {
            MapFlags::USER
        } else {
            MapFlags::empty()
        }
    }
}

impl PageAttrs {
    /// Returns the page attributes a mapping request translates to: the entry
    /// becomes present, plus writable, user and uncacheable as requested.
    ///
    /// Copy-on-write and zero-on-demand are not mapped in directly; they are
    /// applied by the fork and zeroing paths.
    pub fn from_map_flags(flags: MapFlags) -> Self {
        let mut attrs = PageAttrs::PRESENT;
        if flags.contains(MapFlags::WRITABLE) {
            attrs |= PageAttrs::WRITABLE;
        }
        if flags.contains(MapFlags::USER) {
            attrs |= PageAttrs::USER;
        }
        if flags.contains(MapFlags::NOT_CACHEABLE) {
            attrs |= PageAttrs::NOT_CACHEABLE;
        }
        attrs
    }
}

bitflags! {
    /// The decoded cause of a page fault.
    ///
    /// Uses the x86 error-code bit assignment; the ARM data-abort glue
    /// derives the same bits from DFSR before handing the fault over.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FaultFlags: u32 {
        /// The translation was present and the access violated its
        /// protection. Clear when the translation was absent.
        const PRESENT = 1 << 0;
        /// The faulting access was a write.
        const WRITE = 1 << 1;
        /// The access came from user mode.
        const USER_MODE = 1 << 2;
    }
}
