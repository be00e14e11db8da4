//! Strongly-typed wrappers for physical and virtual addresses.

use crate::layout;
use crate::numbers::FrameNumber;

macro_rules! impl_address_common {
    ($name:ident) => {
        impl $name {
            /// Returns the address as a raw `usize`.
            #[inline]
            pub const fn as_usize(self) -> usize {
                self.0
            }

            /// Returns `true` if the address is aligned to `alignment`, which
            /// must be a power of two.
            #[inline]
            pub const fn is_aligned(self, alignment: usize) -> bool {
                assert!(
                    alignment.is_power_of_two(),
                    "alignment must be a power of two"
                );
                self.0 & (alignment - 1) == 0
            }

            /// Aligns the address down to the nearest multiple of `alignment`,
            /// which must be a power of two.
            #[inline]
            pub const fn align_down(self, alignment: usize) -> Self {
                assert!(
                    alignment.is_power_of_two(),
                    "alignment must be a power of two"
                );
                Self(self.0 & !(alignment - 1))
            }

            /// Aligns the address up to the nearest multiple of `alignment`,
            /// which must be a power of two.
            #[inline]
            pub const fn align_up(self, alignment: usize) -> Self {
                assert!(
                    alignment.is_power_of_two(),
                    "alignment must be a power of two"
                );
                Self((self.0 + alignment - 1) & !(alignment - 1))
            }

            /// Returns the offset of the address within its page.
            #[inline]
            pub const fn page_offset(self) -> usize {
                self.0 % layout::PAGE_SIZE
            }

            /// Rounds the address down to the start of its page.
            #[inline]
            pub const fn page_start(self) -> Self {
                self.align_down(layout::PAGE_SIZE)
            }
        }

        impl core::fmt::Pointer for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{:#010x}", self.0)
            }
        }

        impl core::fmt::Debug for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, concat!(stringify!($name), "({:#010x})"), self.0)
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{:#010x}", self.0)
            }
        }

        impl From<u32> for $name {
            #[inline]
            fn from(value: u32) -> Self {
                Self::new(value as usize)
            }
        }

        impl From<usize> for $name {
            #[inline]
            fn from(value: usize) -> Self {
                Self::new(value)
            }
        }

        impl core::ops::Add<usize> for $name {
            type Output = $name;

            #[inline]
            fn add(self, rhs: usize) -> Self::Output {
                Self::new(self.0 + rhs)
            }
        }

        impl core::ops::Sub<usize> for $name {
            type Output = $name;

            #[inline]
            fn sub(self, rhs: usize) -> Self::Output {
                Self::new(self.0 - rhs)
            }
        }

        impl core::ops::Sub<$name> for $name {
            type Output = usize;

            #[inline]
            fn sub(self, rhs: $name) -> Self::Output {
                self.0 - rhs.0
            }
        }
    };
}

/// A physical memory address.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct PhysicalAddress(usize);

impl_address_common!(PhysicalAddress);

impl PhysicalAddress {
    /// Creates a new [`PhysicalAddress`] from the given value, asserting that
    /// it fits the platform's address width.
    #[inline]
    pub const fn new(address: usize) -> Self {
        assert!(
            (address as u64) >> layout::ADDRESS_BITS == 0,
            "physical address exceeds the platform address width"
        );
        Self(address)
    }

    /// Returns the number of the frame containing this address.
    #[inline]
    pub const fn frame_number(self) -> FrameNumber {
        FrameNumber::new(self.0 / layout::PAGE_SIZE)
    }
}

/// A virtual memory address.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct VirtualAddress(usize);

impl_address_common!(VirtualAddress);

impl VirtualAddress {
    /// Creates a new [`VirtualAddress`] from the given value, asserting that
    /// it fits the platform's address width.
    #[inline]
    pub const fn new(address: usize) -> Self {
        assert!(
            (address as u64) >> layout::ADDRESS_BITS == 0,
            "virtual address exceeds the platform address width"
        );
        Self(address)
    }

    /// Interprets the address as a raw pointer.
    ///
    /// Only meaningful where the code runs inside the address space that the
    /// address belongs to, i.e. on a real MMU.
    #[inline]
    pub const fn as_ptr<T>(self) -> *const T {
        self.0 as *const T
    }

    /// Interprets the address as a raw mutable pointer.
    ///
    /// Only meaningful where the code runs inside the address space that the
    /// address belongs to, i.e. on a real MMU.
    #[inline]
    pub const fn as_mut_ptr<T>(self) -> *mut T {
        self.0 as *mut T
    }

    /// Returns the directory index covering this address.
    #[inline]
    pub const fn directory_index(self) -> usize {
        layout::directory_index(self.0)
    }

    /// Returns the index of the entry covering this address within its page
    /// table.
    #[inline]
    pub const fn table_index(self) -> usize {
        layout::table_index(self.0)
    }

    /// Returns `true` when the address lies in process-private user space.
    #[inline]
    pub const fn is_user(self) -> bool {
        layout::is_user_address(self.0)
    }
}
