//! The page-fault service path.
//!
//! The trap handler decodes the hardware fault report into [`FaultFlags`]
//! and hands it here together with the faulting address. The outcome tells
//! the handler whether to retry the instruction or kill the process.

use crate::address::VirtualAddress;
use crate::flags::{FaultFlags, MapFlags};
use crate::heap::KernelHeap;
use crate::layout;
use crate::pmm::FrameAllocator;
use crate::vmm::Vmm;
use crate::zone::{BackingStore, ZoneBacking, ZoneSource};

/// What the trap handler should do once the VMM has looked at a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultOutcome {
    /// The fault was resolved; re-run the faulting instruction.
    Handled,
    /// The access cannot be satisfied; the faulting process must go.
    ShouldTerminateProcess,
}

impl<P: FrameAllocator + KernelHeap> Vmm<P> {
    /// Services a page fault against the active space.
    ///
    /// A write to a present page resolves copy-on-write and zero-on-demand
    /// markings; both are checked, since a forked-then-zeroed table carries
    /// the two at once. A fault on an absent user page while a user space
    /// is active consults `zones` and materializes the page, pulling
    /// file-backed contents through `files`. Any other absent page is
    /// kernel memory and is materialized directly. Everything else is a
    /// violation.
    pub fn resolve_page_fault<Z: ZoneSource, B: BackingStore>(
        &mut self,
        flags: FaultFlags,
        vaddr: VirtualAddress,
        zones: &Z,
        files: &mut B,
    ) -> FaultOutcome {
        if flags.contains(FaultFlags::PRESENT | FaultFlags::WRITE) {
            let mut resolved = false;
            if self.is_copy_on_write(vaddr) {
                self.resolve_copy_on_write(vaddr);
                resolved = true;
            }
            if self.is_zero_on_demand(vaddr) {
                self.resolve_zero_on_demand(vaddr);
                resolved = true;
            }
            if !resolved {
                log::error!("vmm: write to a read-only page at {vaddr} ({flags:?})");
                return FaultOutcome::ShouldTerminateProcess;
            }
            return FaultOutcome::Handled;
        }

        if !flags.contains(FaultFlags::PRESENT) {
            if vaddr.is_user() && self.active_root() != self.kernel_space().root() {
                return self.resolve_absent_user_page(vaddr, zones, files);
            }
            self.load_page(vaddr, MapFlags::RWX);
            return FaultOutcome::Handled;
        }

        log::error!("vmm: unresolvable fault at {vaddr} ({flags:?})");
        FaultOutcome::ShouldTerminateProcess
    }

    /// Materializes an absent user page from the zone that claims it.
    /// No claiming zone means the process touched memory it never mapped.
    fn resolve_absent_user_page<Z: ZoneSource, B: BackingStore>(
        &mut self,
        vaddr: VirtualAddress,
        zones: &Z,
        files: &mut B,
    ) -> FaultOutcome {
        let Some(zone) = zones.find_zone(vaddr) else {
            log::error!("vmm: user fault at {vaddr} outside any zone");
            return FaultOutcome::ShouldTerminateProcess;
        };
        log::trace!("vmm: demand-load {vaddr} from zone at {}", zone.start);
        self.load_page(vaddr, zone.flags);
        if let ZoneBacking::PrivateFile { fd, offset } = zone.backing {
            let page = vaddr.page_start();
            let file_offset = offset + (page - zone.start);
            // SAFETY: load_page just mapped and zeroed this page.
            let dest = unsafe {
                core::slice::from_raw_parts_mut(self.mmu().page_ptr(page), layout::PAGE_SIZE)
            };
            files.read(fd, file_offset, dest);
        }
        FaultOutcome::Handled
    }
}
