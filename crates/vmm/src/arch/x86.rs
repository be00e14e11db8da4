//! The i686 two-level paging entry layout.
//!
//! Directory and page entries share the classic encoding: the frame base in
//! bits 12..32 and attribute bits below it. Copy-on-write and zero-on-demand
//! are stored in two of the ignored bits (10 and 11), which the MMU never
//! interprets.

use crate::flags::{MapFlags, PageAttrs, TableAttrs};
use crate::numbers::FrameNumber;

const PRESENT: u32 = 1 << 0;
const WRITABLE: u32 = 1 << 1;
const USER: u32 = 1 << 2;
const NOT_CACHEABLE: u32 = 1 << 4;
const COPY_ON_WRITE: u32 = 1 << 10;
const ZERO_ON_DEMAND: u32 = 1 << 11;

const FRAME_OFFSET: u32 = 12;
const FRAME_MASK: u32 = 0xFFFF_F000;

/// A directory entry in the i686 encoding: points at a page table.
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
            self.0 |= PRESENT;
        }
        if attrs.contains(TableAttrs::WRITABLE) {
            self.0 |= WRITABLE;
        }
        if attrs.contains(TableAttrs::USER) {
            self.0 |= USER;
        }
        if attrs.contains(TableAttrs::COPY_ON_WRITE) {
            self.0 |= COPY_ON_WRITE;
        }
        if attrs.contains(TableAttrs::ZERO_ON_DEMAND) {
            self.0 |= ZERO_ON_DEMAND;
        }
    }

    /// Clears every attribute named in `attrs`, leaving the rest untouched.
    pub fn del_attrs(&mut self, attrs: TableAttrs) {
        if attrs.contains(TableAttrs::PRESENT) {
            self.0 &= !PRESENT;
        }
        if attrs.contains(TableAttrs::WRITABLE) {
            self.0 &= !WRITABLE;
        }
        if attrs.contains(TableAttrs::USER) {
            self.0 &= !USER;
        }
        if attrs.contains(TableAttrs::COPY_ON_WRITE) {
            self.0 &= !COPY_ON_WRITE;
        }
        if attrs.contains(TableAttrs::ZERO_ON_DEMAND) {
            self.0 &= !ZERO_ON_DEMAND;
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
        if attrs.contains(TableAttrs::USER) && self.0 & USER == 0 {
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
    /// one.
    pub fn set_frame(&mut self, frame: FrameNumber) {
        self.del_frame();
        self.0 |= (frame.as_usize() as u32) << FRAME_OFFSET;
    }

    /// Clears the frame bits, leaving the attributes in place.
    pub fn del_frame(&mut self) {
        self.0 &= !FRAME_MASK;
    }

    /// Returns the frame of the page table this entry points at.
    pub fn frame(self) -> FrameNumber {
        FrameNumber::new(((self.0 & FRAME_MASK) >> FRAME_OFFSET) as usize)
    }

    pub fn is_present(self) -> bool {
        self.0 & PRESENT != 0
    }

    pub fn is_writable(self) -> bool {
        self.0 & WRITABLE != 0
    }

    pub fn is_copy_on_write(self) -> bool {
        self.0 & COPY_ON_WRITE != 0
    }

    pub fn is_zero_on_demand(self) -> bool {
        self.0 & ZERO_ON_DEMAND != 0
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

/// A page entry in the i686 encoding: maps one 4 KiB page.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PageDesc(u32);

impl PageDesc {
    /// Creates an empty, absent entry.
    pub const fn new() -> Self {
        Self(0)
    }

    /// Sets every attribute named in `attrs`, leaving the rest untouched.
    pub fn set_attrs(&mut self, attrs: PageAttrs) {
        if attrs.contains(PageAttrs::PRESENT) {
            self.0 |= PRESENT;
        }
        if attrs.contains(PageAttrs::WRITABLE) {
            self.0 |= WRITABLE;
        }
        if attrs.contains(PageAttrs::USER) {
            self.0 |= USER;
        }
        if attrs.contains(PageAttrs::NOT_CACHEABLE) {
            self.0 |= NOT_CACHEABLE;
        }
        if attrs.contains(PageAttrs::COPY_ON_WRITE) {
            self.0 |= COPY_ON_WRITE;
        }
        if attrs.contains(PageAttrs::ZERO_ON_DEMAND) {
            self.0 |= ZERO_ON_DEMAND;
        }
    }

    /// Clears every attribute named in `attrs`, leaving the rest untouched.
    pub fn del_attrs(&mut self, attrs: PageAttrs) {
        if attrs.contains(PageAttrs::PRESENT) {
            self.0 &= !PRESENT;
        }
        if attrs.contains(PageAttrs::WRITABLE) {
            self.0 &= !WRITABLE;
        }
        if attrs.contains(PageAttrs::USER) {
            self.0 &= !USER;
        }
        if attrs.contains(PageAttrs::NOT_CACHEABLE) {
            self.0 &= !NOT_CACHEABLE;
        }
        if attrs.contains(PageAttrs::COPY_ON_WRITE) {
            self.0 &= !COPY_ON_WRITE;
        }
        if attrs.contains(PageAttrs::ZERO_ON_DEMAND) {
            self.0 &= !ZERO_ON_DEMAND;
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
        self.0 |= (frame.as_usize() as u32) << FRAME_OFFSET;
    }

    /// Clears the frame bits, leaving the attributes in place.
    pub fn del_frame(&mut self) {
        self.0 &= !FRAME_MASK;
    }

    /// Returns the frame of the page this entry maps.
    pub fn frame(self) -> FrameNumber {
        FrameNumber::new(((self.0 & FRAME_MASK) >> FRAME_OFFSET) as usize)
    }

    pub fn is_present(self) -> bool {
        self.0 & PRESENT != 0
    }

    pub fn is_writable(self) -> bool {
        self.0 & WRITABLE != 0
    }

    pub fn is_user(self) -> bool {
        self.0 & USER != 0
    }

    pub fn is_not_cacheable(self) -> bool {
        self.0 & NOT_CACHEABLE != 0
    }

    pub fn is_copy_on_write(self) -> bool {
        self.0 & COPY_ON_WRITE != 0
    }

    pub fn is_zero_on_demand(self) -> bool {
        self.0 & ZERO_ON_DEMAND != 0
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
