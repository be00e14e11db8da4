//! In-memory views of the paging structures.

use crate::arch::{PageDesc, TableDesc};
use crate::layout;

/// A page directory: the root structure of one address space.
///
/// Exactly one page large, and always placed in a page-aligned frame so the
/// MMU can walk it.
#[repr(C, align(4096))]
pub struct Directory {
    entries: [TableDesc; layout::DIRECTORY_ENTRIES],
}

const _: () = assert!(core::mem::size_of::<Directory>() == layout::PAGE_SIZE);

impl Directory {
    /// Creates a directory with every entry absent.
    pub const fn empty() -> Self {
        Self {
            entries: [TableDesc::new(); layout::DIRECTORY_ENTRIES],
        }
    }

    /// Returns the entry at `index`.
    ///
    /// Panics if `index` is beyond the end of the directory.
    pub fn entry(&self, index: usize) -> TableDesc {
        assert!(
            index < layout::DIRECTORY_ENTRIES,
            "directory index out of bounds"
        );
        self.entries[index]
    }

    /// Returns a mutable reference to the entry at `index`.
    ///
    /// Panics if `index` is beyond the end of the directory.
    pub fn entry_mut(&mut self, index: usize) -> &mut TableDesc {
        assert!(
            index < layout::DIRECTORY_ENTRIES,
            "directory index out of bounds"
        );
        &mut self.entries[index]
    }
}

impl Default for Directory {
    fn default() -> Self {
        Self::empty()
    }
}

/// A page table: 1024 page entries covering 4 MiB of virtual space.
///
/// Exactly one page large, and always placed in a page-aligned frame so the
/// MMU can walk it.
#[repr(C, align(4096))]
pub struct PageTable {
    entries: [PageDesc; layout::TABLE_ENTRIES],
}

const _: () = assert!(core::mem::size_of::<PageTable>() == layout::PAGE_SIZE);

impl PageTable {
    /// Returns the entry at `index`.
    ///
    /// Panics if `index` is beyond the end of the table.
    pub fn entry(&self, index: usize) -> PageDesc {
        assert!(index < layout::TABLE_ENTRIES, "page table index out of bounds");
        self.entries[index]
    }

    /// Returns a mutable reference to the entry at `index`.
    ///
    /// Panics if `index` is beyond the end of the table.
    pub fn entry_mut(&mut self, index: usize) -> &mut PageDesc {
        assert!(index < layout::TABLE_ENTRIES, "page table index out of bounds");
        &mut self.entries[index]
    }
}
