//! MMU control for i686: CR3, `invlpg` and EFLAGS-based interrupt masking.

use core::arch::asm;

use crate::address::{PhysicalAddress, VirtualAddress};
use crate::layout;

/// The i686 MMU interface.
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

    /// Loads `root` into CR3, making its translation active. Implicitly
    /// flushes all non-global TLB entries.
    ///
    /// The caller must hand over a fully formed directory.
    pub fn set_table_base(&mut self, root: PhysicalAddress) {
        // SAFETY: writing CR3 is safe once the directory is fully formed,
        // which the caller guarantees.
        unsafe {
            asm!("mov cr3, {}", in(reg) root.as_usize(), options(nostack));
        }
    }

    /// Flushes the entire TLB by reloading CR3.
    pub fn flush_tlb_all(&self) {
        // SAFETY: reloading CR3 with its current value only drops TLB state.
        unsafe {
            asm!(
                "mov {tmp}, cr3",
                "mov cr3, {tmp}",
                tmp = out(reg) _,
                options(nostack),
            );
        }
    }

    /// Flushes the TLB entry covering `vaddr`.
    pub fn flush_tlb_entry(&self, vaddr: VirtualAddress) {
        // SAFETY: invlpg only drops TLB state.
        unsafe {
            asm!("invlpg [{}]", in(reg) vaddr.as_usize(), options(nostack, preserves_flags));
        }
    }

    /// Returns the pointer backing `vaddr` in the active space. On hardware
    /// the kernel dereferences the virtual address itself.
    pub fn page_ptr(&self, vaddr: VirtualAddress) -> *mut u8 {
        vaddr.as_mut_ptr()
    }
}

/// Masks maskable interrupts for its lifetime and restores the previous
/// state when dropped.
#[must_use]
pub struct InterruptGuard {
    interrupts_were_enabled: bool,
}

impl InterruptGuard {
    /// Masks interrupts until the guard is dropped.
    pub fn acquire() -> Self {
        let flags: u32;
        // SAFETY: saves EFLAGS and masks interrupts; drop restores the
        // saved state.
        unsafe {
            asm!("pushfd", "pop {}", "cli", out(reg) flags);
        }
        Self {
            interrupts_were_enabled: flags & (1 << 9) != 0,
        }
    }
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        if self.interrupts_were_enabled {
            // SAFETY: re-enables interrupts that were enabled when the guard
            // was acquired.
            unsafe {
                asm!("sti", options(nostack));
            }
        }
    }
}
