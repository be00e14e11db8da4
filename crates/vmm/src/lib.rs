//! Virtual memory management for a 32-bit monolithic kernel.
//!
//! * Two-level paging (a directory of 1024 page tables, 4 KiB pages) on
//!   i686 and on ARMv7 short-descriptor, behind one descriptor API.
//! * Per-space window ("pspace") tables: the VMM edits page tables through
//!   a dedicated 4 MiB region instead of ad-hoc temporary mappings.
//! * Address spaces with fork-time copy-on-write at table granularity and
//!   exec-time zero-on-demand arming.
//! * A page-fault service path that materializes anonymous and file-backed
//!   zones on first touch.
//!
//! On 32-bit hardware the MMU glue drives CR3 and `invlpg`, or the CP15
//! system-control registers. Everywhere else, and always under test, a
//! software-emulated MMU performs the same two-level walk over a guest
//! memory buffer, so the whole manager runs off-target.

#![cfg_attr(not(any(test, feature = "software-emulation")), no_std)]

extern crate alloc;

mod address;
pub mod arch;
mod error;
mod fault;
mod flags;
#[cfg(test)]
mod harness;
mod heap;
pub mod hw;
pub mod layout;
mod numbers;
mod pmm;
mod space;
mod table;
mod vmm;
mod zone;

pub use address::{PhysicalAddress, VirtualAddress};
pub use arch::{PageDesc, TableDesc};
pub use error::{Result, VmmError};
pub use fault::FaultOutcome;
pub use flags::{FaultFlags, MapFlags, PageAttrs, TableAttrs};
pub use heap::{HeapBlock, KernelHeap};
pub use layout::PAGE_SIZE;
pub use numbers::FrameNumber;
pub use pmm::FrameAllocator;
pub use space::AddressSpace;
pub use table::{Directory, PageTable};
pub use vmm::{Vmm, VmmConfig};
pub use zone::{BackingStore, Zone, ZoneBacking, ZoneSource};
