//! Shared fixtures for the in-crate tests: a booted VMM on a small emulated
//! machine, plus canned zone and file sources for the fault path.

use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::address::{PhysicalAddress, VirtualAddress};
use crate::hw::{EmulatedMemory, EmulatedPlatform, Mmu};
use crate::vmm::{Vmm, VmmConfig};
use crate::zone::{BackingStore, Zone, ZoneSource};

/// Guest-physical memory of the test machine.
pub const MEMORY_SIZE: usize = 16 * 1024 * 1024;

/// Where the boot directory lives.
pub const KERNEL_DIRECTORY: usize = 0x0021_F000;

/// Where the 256 kernel tables start, one page each.
pub const KERNEL_TABLES_BASE: usize = 0x0022_0000;

/// The first frame the emulated allocator hands out, directly above the
/// kernel tables.
pub const FIRST_FREE_FRAME: usize = 0x0032_0000;

/// Builds a booted VMM: the full setup sequence has run, the self-test has
/// passed and the kernel space is active.
pub fn machine() -> Vmm<EmulatedPlatform> {
    let memory = Arc::new(EmulatedMemory::new(MEMORY_SIZE));
    let mmu = Mmu::new(Arc::clone(&memory));
    let platform = EmulatedPlatform::new(memory, PhysicalAddress::new(FIRST_FREE_FRAME));
    let config = VmmConfig {
        kernel_directory: PhysicalAddress::new(KERNEL_DIRECTORY),
        kernel_tables_base: PhysicalAddress::new(KERNEL_TABLES_BASE),
    };
    Vmm::setup(platform, mmu, config).unwrap()
}

/// Writes one byte at `vaddr` through the active space, the way kernel code
/// would dereference it.
pub fn poke(vmm: &Vmm<EmulatedPlatform>, vaddr: usize, value: u8) {
    // SAFETY: tests only poke addresses they have mapped.
    unsafe { *vmm.mmu().page_ptr(VirtualAddress::new(vaddr)) = value };
}

/// Reads one byte at `vaddr` through the active space.
pub fn peek(vmm: &Vmm<EmulatedPlatform>, vaddr: usize) -> u8 {
    // SAFETY: tests only peek addresses they have mapped.
    unsafe { *vmm.mmu().page_ptr(VirtualAddress::new(vaddr)) }
}

/// A fixed zone list.
pub struct FixedZones(pub Vec<Zone>);

impl ZoneSource for FixedZones {
    fn find_zone(&self, vaddr: VirtualAddress) -> Option<Zone> {
        self.0.iter().copied().find(|zone| zone.contains(vaddr))
    }
}

/// A zone source with nothing in it.
pub struct NoZones;

impl ZoneSource for NoZones {
    fn find_zone(&self, _vaddr: VirtualAddress) -> Option<Zone> {
        None
    }
}

/// A backing store serving every descriptor from one byte buffer.
pub struct SliceFile {
    pub data: Vec<u8>,
    pub reads: usize,
}

impl SliceFile {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data, reads: 0 }
    }
}

impl BackingStore for SliceFile {
    fn read(&mut self, _fd: u32, offset: usize, dest: &mut [u8]) {
        self.reads += 1;
        if offset >= self.data.len() {
            return;
        }
        let count = dest.len().min(self.data.len() - offset);
        dest[..count].copy_from_slice(&self.data[offset..offset + count]);
    }
}

/// A backing store that must never be consulted.
pub struct NoFiles;

impl BackingStore for NoFiles {
    fn read(&mut self, _fd: u32, _offset: usize, _dest: &mut [u8]) {
        panic!("unexpected file read");
    }
}
