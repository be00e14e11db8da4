//! Owned address spaces.

use core::ptr::NonNull;

use crate::address::PhysicalAddress;
use crate::table::Directory;

/// One address space: a page directory and the physical root the MMU loads.
///
/// The kernel space is built during setup and lives inside the VMM. User
/// spaces come from [`crate::Vmm::new_address_space`] and
/// [`crate::Vmm::fork_address_space`]; the scheduler owns them until
/// [`crate::Vmm::free_address_space`] consumes them. A space must stay
/// alive for as long as it is the active one.
#[derive(Debug)]
pub struct AddressSpace {
    directory: NonNull<Directory>,
    root: PhysicalAddress,
}

impl AddressSpace {
    pub(crate) fn new(directory: NonNull<Directory>, root: PhysicalAddress) -> Self {
        Self { directory, root }
    }

    /// Returns the physical address the MMU loads to activate this space.
    pub fn root(&self) -> PhysicalAddress {
        self.root
    }

    pub(crate) fn directory_ptr(&self) -> NonNull<Directory> {
        self.directory
    }

    pub(crate) fn directory(&self) -> &Directory {
        // SAFETY: the directory stays allocated for the space's lifetime.
        unsafe { self.directory.as_ref() }
    }

    pub(crate) fn directory_mut(&mut self) -> &mut Directory {
        // SAFETY: as above, and `&mut self` makes the access exclusive.
        unsafe { self.directory.as_mut() }
    }
}

// The directory pointer targets kernel-heap memory that every address space
// shares a view of; sending the space to another CPU moves only ownership.
unsafe impl Send for AddressSpace {}
