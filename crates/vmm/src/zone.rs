//! Memory zones: what the process layout tells the fault handler.
//!
//! The VMM does not keep per-process zone lists itself; the tasking layer
//! owns them and hands the fault handler a [`ZoneSource`] to consult, plus a
//! [`BackingStore`] to fill pages of privately mapped files.

use crate::address::VirtualAddress;
use crate::flags::MapFlags;

/// What backs a zone's pages before they materialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneBacking {
    /// Pages start out zeroed.
    Anonymous,
    /// Pages are filled from a privately mapped file.
    PrivateFile {
        /// The open file the zone maps.
        fd: u32,
        /// The offset of the zone's first byte within the file.
        offset: usize,
    },
}

/// One contiguous region of a process's virtual layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Zone {
    pub start: VirtualAddress,
    pub length: usize,
    /// The flags pages of this zone are mapped with.
    pub flags: MapFlags,
    pub backing: ZoneBacking,
}

impl Zone {
    /// Returns `true` when `vaddr` falls inside the zone.
    pub fn contains(&self, vaddr: VirtualAddress) -> bool {
        self.start <= vaddr && vaddr - self.start < self.length
    }
}

/// Looks up the zone covering a user address. Implemented by the tasking
/// layer over the faulting process's zone list.
pub trait ZoneSource {
    fn find_zone(&self, vaddr: VirtualAddress) -> Option<Zone>;
}

/// Reads file content for privately mapped zones. Implemented by the VFS.
pub trait BackingStore {
    /// Reads from `fd` at byte `offset` into `dest`. A short read leaves
    /// the tail of `dest` untouched; the fault path hands over a pre-zeroed
    /// page.
    fn read(&mut self, fd: u32, offset: usize, dest: &mut [u8]);
}
