//! The MMU and interrupt-control surface the VMM drives.
//!
//! Exactly one backend is active per build:
//!
//! - `x86`: real i686 hardware (CR3, `invlpg`, EFLAGS masking).
//! - `armv7`: real ARMv7 hardware (TTBR0, CP15 TLB ops, CPSR masking).
//! - `emulated`: a software MMU over a buffer of guest memory, used by the
//!   test suite, by any build with the `software-emulation` feature, and by
//!   builds for architectures without a hardware backend.
//!
//! All backends expose the same shape: `Mmu` with `phys_to_virt`,
//! `set_table_base`, `page_ptr` and the two TLB flushes, plus a scoped
//! `InterruptGuard`.

#[cfg(all(target_arch = "x86", not(test), not(feature = "software-emulation")))]
mod x86;
#[cfg(all(target_arch = "x86", not(test), not(feature = "software-emulation")))]
pub use x86::{InterruptGuard, Mmu};

#[cfg(all(target_arch = "arm", not(test), not(feature = "software-emulation")))]
mod armv7;
#[cfg(all(target_arch = "arm", not(test), not(feature = "software-emulation")))]
pub use armv7::{InterruptGuard, Mmu};

#[cfg(any(
    test,
    feature = "software-emulation",
    not(any(target_arch = "x86", target_arch = "arm"))
))]
mod emulated;
#[cfg(any(
    test,
    feature = "software-emulation",
    not(any(target_arch = "x86", target_arch = "arm"))
))]
pub use emulated::{EmulatedMemory, EmulatedPlatform, InterruptGuard, Mmu};
