//! MMU control for ARMv7: TTBR0, TLB maintenance by CP15, and CPSR-based
//! interrupt masking.

use core::arch::asm;

use crate::address::{PhysicalAddress, VirtualAddress};
use crate::layout;

/// The ARMv7 MMU interface.
pub struct Mmu;

impl Mmu {
    pub const fn new() -> Self {
        Self
    }

    /// Translates a physical address inside the early-boot kernel region to
    /// a dereferenceable pointer, through the fixed kernel window. The boot
    /// stage maps that window before the VMM runs.
    pub fn phys_to_virt(&self, paddr: PhysicalAddress) -> *mut u8 {
        (paddr.as_usize() - layout::KERNEL_PHYS_BASE + layout::KERNEL_BASE) as *mut u8
    }

    /// Loads `root` into TTBR0, making its translation active.
    ///
    /// The caller must hand over a fully formed directory and follow up with
    /// the TLB maintenance its change requires.
    pub fn set_table_base(&mut self, root: PhysicalAddress) {
        // SAFETY: writing TTBR0 is safe once the directory is fully formed,
        // which the caller guarantees.
        unsafe {
            asm!(
                "dsb",
                "mcr p15, 0, {0}, c2, c0, 0",
                "isb",
                in(reg) root.as_usize(),
                options(nostack, preserves_flags),
            );
        }
    }

    /// Invalidates the entire unified TLB.
    pub fn flush_tlb_all(&self) {
        // SAFETY: TLBIALL only drops TLB state.
        unsafe {
            asm!(
                "dsb",
                "mcr p15, 0, {0}, c8, c7, 0",
                "dsb",
                "isb",
                in(reg) 0usize,
                options(nostack, preserves_flags),
            );
        }
    }

    /// Invalidates the TLB entry covering `vaddr`.
    pub fn flush_tlb_entry(&self, vaddr: VirtualAddress) {
        // SAFETY: TLBIMVA only drops TLB state.
        unsafe {
            asm!(
                "mcr p15, 0, {0}, c8, c7, 1",
                "dsb",
                "isb",
                in(reg) vaddr.page_start().as_usize(),
                options(nostack, preserves_flags),
            );
        }
    }

    /// Returns the pointer backing `vaddr` in the active space. On hardware
    /// the kernel dereferences the virtual address itself.
    pub fn page_ptr(&self, vaddr: VirtualAddress) -> *mut u8 {
        vaddr.as_mut_ptr()
    }
}

/// Masks IRQs for its lifetime and restores the previous state when
/// dropped.
#[must_use]
pub struct InterruptGuard {
    irqs_were_enabled: bool,
}

impl InterruptGuard {
    /// Masks IRQs until the guard is dropped.
    pub fn acquire() -> Self {
        let cpsr: u32;
        // SAFETY: saves CPSR and masks IRQs; drop restores the saved state.
        unsafe {
            asm!("mrs {}, cpsr", "cpsid i", out(reg) cpsr, options(nostack));
        }
        Self {
            // The I bit reads as one while IRQs are masked.
            irqs_were_enabled: cpsr & (1 << 7) == 0,
        }
    }
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        if self.irqs_were_enabled {
            // SAFETY: re-enables IRQs that were enabled when the guard was
            // acquired.
            unsafe {
                asm!("cpsie i", options(nostack));
            }
        }
    }
}
