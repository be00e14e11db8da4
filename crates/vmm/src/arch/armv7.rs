//! The ARMv7 short-descriptor entry layout.
//!
//! Directory entries are coarse page-table descriptors (type `0b01`, table
//! base in bits 10..32) and page entries are small-page descriptors (type
//! `0b1x`, page base in bits 12..32). The kernel runs with two fixed
//! translation settings that this layout relies on:
//!
//! - DACR grants client access to every domain, so the 4-bit domain field of
//!   a table descriptor is free for software use. Writable, user and
//!   zero-on-demand live there; copy-on-write sits in the
//!   implementation-defined bit 9.
//! - TEX remap is enabled (`SCTLR.TRE = 1`), which architecturally hands
//!   `TEX[2:1]` of a page descriptor to the operating system. Copy-on-write
//!   and zero-on-demand live there.
//!
//! Unlike the i686 layout, "writable" and "cacheable" are inverted in
//! hardware: a page is writable while `AP[2]` is clear and cacheable while
//! `C` is set. The accessors below hide that inversion behind the shared
//! contract.

use crate::flags::{MapFlags, PageAttrs, TableAttrs};
use crate::numbers::FrameNumber;

const TABLE_VALID: u32 = 1 << 0;
const TABLE_WRITABLE: u32 = 1 << 6;
const TABLE_USER: u32 = 1 << 5;
const TABLE_ZERO_ON_DEMAND: u32 = 1 << 7;
const TABLE_COPY_ON_WRITE: u32 = 1 << 9;
const TABLE_FRAME_MASK: u32 = 0xFFFF_FC00;

const PAGE_VALID: u32 = 1 << 1;
const PAGE_BUFFERABLE: u32 = 1 << 2;
const PAGE_CACHEABLE: u32 = 1 << 3;
const PAGE_AP0: u32 = 1 << 4;
const PAGE_USER: u32 = 1 << 5;
const PAGE_COPY_ON_WRITE: u32 = 1 << 7;
const PAGE_ZERO_ON_DEMAND: u32 = 1 << 8;
const PAGE_READ_ONLY: u32 = 1 << 9;
const PAGE_FRAME_MASK: u32 = 0xFFFF_F000;

/// A directory entry in the short-descriptor encoding: a coarse page-table
/// descriptor.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TableDesc(u32);

impl TableDesc {
    /// Creates an empty, absent entry.
    pub const fn new() -> Self {
        Self(0)
    }

    /// Sets every attribute named in `attrs`, leaving the rest untouched.
    pub fn set_attrs(&mut self, attrs: TableAttrs) {
        if attrs.contains(TableAttrs::PRESENT) {
            self.0 |= TABLE_VALID;
        }
        if attrs.contains(TableAttrs::WRITABLE) {
            self.0 |= TABLE_WRITABLE;
        }
        if attrs.contains(TableAttrs::USER) {
            self.0 |= TABLE_USER;
        }
        if attrs.contains(TableAttrs::COPY_ON_WRITE) {
            self.0 |= TABLE_COPY_ON_WRITE;
        }
        if attrs.contains(TableAttrs::ZERO_ON_DEMAND) {
            self.0 |= TABLE_ZERO_ON_DEMAND;
        }
    }

    /// Clears every attribute named in `attrs`, leaving the rest untouched.
    pub fn del_attrs(&mut self, attrs: TableAttrs) {
        if attrs.contains(TableAttrs::PRESENT) {
            self.0 &= !TABLE_VALID;
        }
        if attrs.contains(TableAttrs::WRITABLE) {
            self.0 &= !TABLE_WRITABLE;
        }
        if attrs.contains(TableAttrs::USER) {
            self.0 &= !TABLE_USER;
        }
        if attrs.contains(TableAttrs::COPY_ON_WRITE) {
            self.0 &= !TABLE_COPY_ON_WRITE;
        }
        if attrs.contains(TableAttrs::ZERO_ON_DEMAND) {
            self.0 &= !TABLE_ZERO_ON_DEMAND;
        }
    }

    /// Returns `true` only when every attribute named in `attrs` is set.
    pub fn has_attrs(self, attrs: TableAttrs) -> bool {
        if attrs.contains(TableAttrs::PRESENT) && !self.is_present() {
            return false;
        }
        if attrs.contains(TableAttrs::WRITABLE) && !self.is_writable() {
            return false;
        }
        if attrs.contains(TableAttrs::USER) && self.0 & TABLE_USER == 0 {
            return false;
        }
        if attrs.contains(TableAttrs::COPY_ON_WRITE) && !self.is_copy_on_write() {
            return false;
        }
        if attrs.contains(TableAttrs::ZERO_ON_DEMAND) && !self.is_zero_on_demand() {
            return false;
        }
        true
    }

    /// Installs `frame` as the entry's table frame, replacing any previous
    /// one. Tables are page-sized, so the coarse base is always 4 KiB
    /// aligned.
    pub fn set_frame(&mut self, frame: FrameNumber) {
        self.del_frame();
        self.0 |= (frame.as_usize() as u32) << 12;
    }

    /// Clears the frame bits, leaving the attributes in place.
    pub fn del_frame(&mut self) {
        self.0 &= !TABLE_FRAME_MASK;
    }

    /// Returns the frame of the page table this entry points at.
    pub fn frame(self) -> FrameNumber {
        FrameNumber::new(((self.0 & TABLE_FRAME_MASK) >> 12) as usize)
    }

    pub fn is_present(self) -> bool {
        self.0 & TABLE_VALID != 0
    }

    pub fn is_writable(self) -> bool {
        self.0 & TABLE_WRITABLE != 0
    }

    pub fn is_copy_on_write(self) -> bool {
        self.0 & TABLE_COPY_ON_WRITE != 0
    }

    pub fn is_zero_on_demand(self) -> bool {
        self.0 & TABLE_ZERO_ON_DEMAND != 0
    }

    /// Returns the raw 32-bit encoding.
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Reconstructs an entry from its raw 32-bit encoding.
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }
}

impl Default for TableDesc {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for TableDesc {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "TableDesc({:#010x})", self.0)
    }
}

/// A page entry in the short-descriptor encoding: a small-page descriptor.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PageDesc(u32);

impl PageDesc {
    /// Creates an empty, absent entry.
    ///
    /// The entry starts out cacheable, bufferable, kernel-only and read-only
    /// (`C | B | AP0 | AP2`), so a freshly initialized descriptor answers the
    /// attribute queries the same way the i686 zero entry does.
    pub const fn new() -> Self {
        Self(PAGE_CACHEABLE | PAGE_BUFFERABLE | PAGE_AP0 | PAGE_READ_ONLY)
    }

    /// Sets every attribute named in `attrs`, leaving the rest untouched.
    pub fn set_attrs(&mut self, attrs: PageAttrs) {
        if attrs.contains(PageAttrs::PRESENT) {
            self.0 |= PAGE_VALID;
        }
        if attrs.contains(PageAttrs::WRITABLE) {
            self.0 &= !PAGE_READ_ONLY;
        }
        if attrs.contains(PageAttrs::USER) {
            self.0 |= PAGE_USER;
        }
        if attrs.contains(PageAttrs::NOT_CACHEABLE) {
            self.0 &= !(PAGE_CACHEABLE | PAGE_BUFFERABLE);
        }
        if attrs.contains(PageAttrs::COPY_ON_WRITE) {
            self.0 |= PAGE_COPY_ON_WRITE;
        }
        if attrs.contains(PageAttrs::ZERO_ON_DEMAND) {
            self.0 |= PAGE_ZERO_ON_DEMAND;
        }
    }

    /// Clears every attribute named in `attrs`, leaving the rest untouched.
    pub fn del_attrs(&mut self, attrs: PageAttrs) {
        if attrs.contains(PageAttrs::PRESENT) {
            self.0 &= !PAGE_VALID;
        }
        if attrs.contains(PageAttrs::WRITABLE) {
            self.0 |= PAGE_READ_ONLY;
        }
        if attrs.contains(PageAttrs::USER) {
            self.0 &= !PAGE_USER;
        }
        if attrs.contains(PageAttrs::NOT_CACHEABLE) {
            self.0 |= PAGE_CACHEABLE | PAGE_BUFFERABLE;
        }
        if attrs.contains(PageAttrs::COPY_ON_WRITE) {
            self.0 &= !PAGE_COPY_ON_WRITE;
        }
        if attrs.contains(PageAttrs::ZERO_ON_DEMAND) {
            self.0 &= !PAGE_ZERO_ON_DEMAND;
        }
    }

    /// Returns `true` only when every attribute named in `attrs` is set.
    pub fn has_attrs(self, attrs: PageAttrs) -> bool {
        if attrs.contains(PageAttrs::PRESENT) && !self.is_present() {
            return false;
        }
        if attrs.contains(PageAttrs::WRITABLE) && !self.is_writable() {
            return false;
        }
        if attrs.contains(PageAttrs::USER) && !self.is_user() {
            return false;
        }
        if attrs.contains(PageAttrs::NOT_CACHEABLE) && !self.is_not_cacheable() {
            return false;
        }
        if attrs.contains(PageAttrs::COPY_ON_WRITE) && !self.is_copy_on_write() {
            return false;
        }
        if attrs.contains(PageAttrs::ZERO_ON_DEMAND) && !self.is_zero_on_demand() {
            return false;
        }
        true
    }

    /// Installs `frame` as the entry's page frame, replacing any previous
    /// one.
    pub fn set_frame(&mut self, frame: FrameNumber) {
        self.del_frame();
        self.0 |= (frame.as_usize() as u32) << 12;
    }

    /// Clears the frame bits, leaving the attributes in place.
    pub fn del_frame(&mut self) {
        self.0 &= !PAGE_FRAME_MASK;
    }

    /// Returns the frame of the page this entry maps.
    pub fn frame(self) -> FrameNumber {
        FrameNumber::new(((self.0 & PAGE_FRAME_MASK) >> 12) as usize)
    }

    pub fn is_present(self) -> bool {
        self.0 & PAGE_VALID != 0
    }

    pub fn is_writable(self) -> bool {
        self.0 & PAGE_READ_ONLY == 0
    }

    pub fn is_user(self) -> bool {
        self.0 & PAGE_USER != 0
    }

    pub fn is_not_cacheable(self) -> bool {
        self.0 & PAGE_CACHEABLE == 0
    }

    pub fn is_copy_on_write(self) -> bool {
        self.0 & PAGE_COPY_ON_WRITE != 0
    }

    pub fn is_zero_on_demand(self) -> bool {
        self.0 & PAGE_ZERO_ON_DEMAND != 0
    }

    /// Reconstructs the mapping request this entry corresponds to.
    pub fn map_flags(self) -> MapFlags {
        let mut flags = MapFlags::READABLE | MapFlags::EXECUTABLE;
        if self.is_writable() {
            flags |= MapFlags::WRITABLE;
        }
        if self.is_user() {
            flags |= MapFlags::USER;
        }
        if self.is_not_cacheable() {
            flags |= MapFlags::NOT_CACHEABLE;
        }
        if self.is_copy_on_write() {
            flags |= MapFlags::COPY_ON_WRITE;
        }
        if self.is_zero_on_demand() {
            flags |= MapFlags::ZERO_ON_DEMAND;
        }
        flags
    }

    /// Like [`PageDesc::map_flags`], minus copy-on-write. Used when an entry
    /// is re-created from a snapshot while copy-on-write is being resolved.
    pub fn map_flags_without_cow(self) -> MapFlags {
        self.map_flags() - MapFlags::COPY_ON_WRITE
    }

    /// Returns the raw 32-bit encoding.
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Reconstructs an entry from its raw 32-bit encoding.
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }
}

impl Default for PageDesc {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for PageDesc {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "PageDesc({:#010x})", self.0)
    }
}
