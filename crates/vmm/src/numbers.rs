//! Numbered physical page frames.

use crate::address::PhysicalAddress;
use crate::layout;

/// The number of a physical page frame.
///
/// Frame `n` covers physical addresses `n * PAGE_SIZE` up to, but excluding,
/// `(n + 1) * PAGE_SIZE`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct FrameNumber(usize);

impl FrameNumber {
    /// Creates a new [`FrameNumber`] from the given value, asserting that the
    /// frame lies within the platform's address width.
    #[inline]
    pub const fn new(number: usize) -> Self {
        assert!(
            (number as u64) < (1u64 << layout::ADDRESS_BITS) / layout::PAGE_SIZE as u64,
            "frame number exceeds the platform address width"
        );
        Self(number)
    }

    /// Returns the frame number as a raw `usize`.
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0
    }

    /// Returns the physical address of the first byte of the frame.
    #[inline]
    pub const fn start(self) -> PhysicalAddress {
        PhysicalAddress::new(self.0 * layout::PAGE_SIZE)
    }
}

impl From<PhysicalAddress> for FrameNumber {
    #[inline]
    fn from(address: PhysicalAddress) -> Self {
        address.frame_number()
    }
}

impl core::ops::Add<usize> for FrameNumber {
    type Output = FrameNumber;

    #[inline]
    fn add(self, rhs: usize) -> Self::Output {
        Self::new(self.0 + rhs)
    }
}

impl core::fmt::Debug for FrameNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "FrameNumber({:#x})", self.0)
    }
}

impl core::fmt::Display for FrameNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}
