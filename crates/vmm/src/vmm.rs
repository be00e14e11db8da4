//! The core virtual memory manager.
//!
//! Every address space dedicates directory entry [`layout::PSPACE_INDEX`] to
//! a window table wired back onto the paging structures themselves: window
//! page `n` maps page table `n` of whichever space is active. The VMM reads
//! and writes tables through that window, so table access needs no temporary
//! mappings and the walk arithmetic is identical on both architectures. In
//! exchange, every space carries a private window table whose self-slot
//! points at its own frame, regenerated whenever a space is created.

use core::ptr::{self, NonNull};

use crate::address::{PhysicalAddress, VirtualAddress};
use crate::arch::{PageDesc, TableDesc};
use crate::error::{Result, VmmError};
use crate::flags::{MapFlags, PageAttrs, TableAttrs};
use crate::heap::{HeapBlock, KernelHeap};
use crate::hw;
use crate::layout;
use crate::pmm::FrameAllocator;
use crate::space::AddressSpace;
use crate::table::{Directory, PageTable};

/// Physical placement handed to [`Vmm::setup`] by the boot stage.
#[derive(Debug, Clone, Copy)]
pub struct VmmConfig {
    /// The frame the kernel directory lives in. Must be page-aligned and
    /// inside the early-boot kernel region.
    pub kernel_directory: PhysicalAddress,
    /// The first frame of the contiguous region holding the 256 kernel page
    /// tables. Must be page-aligned and inside the early-boot kernel region.
    pub kernel_tables_base: PhysicalAddress,
}

/// The active translation root, paired with a pointer to its directory so
/// the VMM can reach the active space without borrowing it from its owner.
#[derive(Clone, Copy)]
struct ActiveRoot {
    directory: NonNull<Directory>,
    root: PhysicalAddress,
}

/// The virtual memory manager.
///
/// Owns the MMU handle, the platform services (frame allocator and kernel
/// heap) and the kernel address space. Mapping operations always act on the
/// active space.
pub struct Vmm<P: FrameAllocator + KernelHeap> {
    platform: P,
    mmu: hw::Mmu,
    kernel: AddressSpace,
    active: ActiveRoot,
    kernel_tables_base: PhysicalAddress,
}

/// Returns the window page at which table `index` of the active space
/// appears.
fn window_page(index: usize) -> VirtualAddress {
    VirtualAddress::new(layout::PSPACE_BASE + index * layout::PAGE_SIZE)
}

impl<P: FrameAllocator + KernelHeap> Vmm<P> {
    /// Builds the kernel address space and switches to it.
    ///
    /// On success the kernel half is mapped in, the first 4 MiB are identity
    /// mapped, the window table is live, the heap has bootstrapped, and the
    /// translation self-test has passed. A self-test mismatch panics.
    pub fn setup(platform: P, mmu: hw::Mmu, config: VmmConfig) -> Result<Self> {
        assert!(
            config.kernel_directory.is_aligned(layout::PAGE_SIZE),
            "kernel directory must be page-aligned"
        );
        assert!(
            config.kernel_tables_base.is_aligned(layout::PAGE_SIZE),
            "kernel tables must be page-aligned"
        );

        let Some(directory) =
            NonNull::new(mmu.phys_to_virt(config.kernel_directory) as *mut Directory)
        else {
            panic!("vmm: kernel directory translates to a null pointer");
        };
        let mut vmm = Self {
            platform,
            mmu,
            kernel: AddressSpace::new(directory, config.kernel_directory),
            active: ActiveRoot {
                directory,
                root: config.kernel_directory,
            },
            kernel_tables_base: config.kernel_tables_base,
        };

        vmm.create_kernel_tables();
        vmm.init_window_table();
        {
            let _guard = hw::InterruptGuard::acquire();
            vmm.mmu.set_table_base(config.kernel_directory);
        }
        vmm.map_range(
            VirtualAddress::new(0),
            PhysicalAddress::new(0),
            layout::TABLE_ENTRIES,
            MapFlags::RWX,
        )?;
        vmm.platform.bootstrap();
        vmm.self_test();
        log::info!(
            "vmm: kernel space active, root {} tables {}",
            config.kernel_directory,
            config.kernel_tables_base
        );
        Ok(vmm)
    }

    /// Builds the kernel directory: 256 present tables in the configured
    /// contiguous region, the kernel image window and the low-physical
    /// mirror. Runs before the directory goes live, so every structure is
    /// reached through its physical address.
    fn create_kernel_tables(&mut self) {
        // SAFETY: the boot stage reserved the directory frame for us.
        unsafe {
            ptr::write_bytes(self.mmu.phys_to_virt(self.kernel.root()), 0, layout::PAGE_SIZE);
        }

        for index in layout::KERNEL_TABLES_START..layout::DIRECTORY_ENTRIES {
            let table_paddr = self.kernel_table_paddr(index);
            // SAFETY: the boot stage reserved the table region for us.
            unsafe {
                ptr::write_bytes(self.mmu.phys_to_virt(table_paddr), 0, layout::PAGE_SIZE);
            }
            let desc = self.kernel.directory_mut().entry_mut(index);
            *desc = TableDesc::new();
            desc.set_attrs(TableAttrs::PRESENT | TableAttrs::WRITABLE);
            desc.set_frame(table_paddr.frame_number());
        }

        self.fill_kernel_table(
            VirtualAddress::new(layout::KERNEL_BASE),
            PhysicalAddress::new(layout::KERNEL_PHYS_BASE),
        );
        self.fill_kernel_table(
            VirtualAddress::new(layout::LOW_PHYS_WINDOW),
            PhysicalAddress::new(0),
        );
    }

    /// Fills the kernel table covering `vaddr` with a straight run of
    /// present, writable pages starting at `paddr`. Setup-time only.
    fn fill_kernel_table(&mut self, vaddr: VirtualAddress, paddr: PhysicalAddress) {
        let table_paddr = self.kernel_table_paddr(vaddr.directory_index());
        // SAFETY: setup owns the freshly zeroed table frame.
        let table = unsafe { &mut *(self.mmu.phys_to_virt(table_paddr) as *mut PageTable) };
        for n in 0..layout::TABLE_ENTRIES {
            let entry = table.entry_mut(n);
            *entry = PageDesc::new();
            entry.set_attrs(PageAttrs::PRESENT | PageAttrs::WRITABLE);
            entry.set_frame(paddr.frame_number() + n);
        }
    }

    /// Fills the window table: window page `n` maps kernel table `n`, and
    /// the slot for [`layout::PSPACE_INDEX`] maps the window table's own
    /// frame. User slots stay absent until their tables exist. Setup-time
    /// only.
    fn init_window_table(&mut self) {
        let window_table_paddr = self.kernel_table_paddr(layout::PSPACE_INDEX);
        // SAFETY: setup owns the table region built by create_kernel_tables.
        let table = unsafe { &mut *(self.mmu.phys_to_virt(window_table_paddr) as *mut PageTable) };
        for index in layout::KERNEL_TABLES_START..layout::DIRECTORY_ENTRIES {
            let window = window_page(index);
            assert!(
                self.kernel.directory().entry(window.directory_index()).is_present(),
                "window table absent during setup"
            );
            let entry = table.entry_mut(window.table_index());
            *entry = PageDesc::new();
            entry.set_attrs(PageAttrs::PRESENT | PageAttrs::WRITABLE);
            entry.set_frame(self.kernel_table_paddr(index).frame_number());
        }
    }

    fn kernel_table_paddr(&self, index: usize) -> PhysicalAddress {
        debug_assert!(index >= layout::KERNEL_TABLES_START);
        self.kernel_tables_base + (index - layout::KERNEL_TABLES_START) * layout::PAGE_SIZE
    }

    /// Maps a probe page, then checks four fixed translations plus the two
    /// window pages of the kernel tables. Panics on any mismatch.
    fn self_test(&mut self) {
        if let Err(error) = self.map_range(
            VirtualAddress::new(0x8F00_0000),
            PhysicalAddress::new(0x000F_0000),
            1,
            MapFlags::RWX,
        ) {
            panic!("vmm self-test: probe mapping failed: {error:?}");
        }
        let checks = [
            (layout::KERNEL_BASE, layout::KERNEL_PHYS_BASE),
            (layout::LOW_PHYS_WINDOW, 0),
            (0x100, 0x100),
            (0x8F00_0000, 0x000F_0000),
            (
                window_page(layout::KERNEL_TABLES_START).as_usize(),
                self.kernel_tables_base.as_usize(),
            ),
            (
                window_page(layout::PSPACE_INDEX).as_usize(),
                (self.kernel_tables_base + layout::PAGE_SIZE).as_usize(),
            ),
        ];
        for (vaddr, expected) in checks {
            let vaddr = VirtualAddress::new(vaddr);
            match self.translate(vaddr) {
                Some(paddr) if paddr.as_usize() == expected => {}
                other => {
                    panic!("vmm self-test: {vaddr} translated to {other:?}, expected {expected:#010x}")
                }
            }
        }
    }

    fn active_directory(&self) -> &Directory {
        // SAFETY: the active space is alive; switching requires it to
        // outlive its activation.
        unsafe { self.active.directory.as_ref() }
    }

    fn active_directory_mut(&mut self) -> &mut Directory {
        // SAFETY: as above, and `&mut self` makes the access exclusive.
        unsafe { self.active.directory.as_mut() }
    }

    /// Returns a pointer to table `index` of the active space, through its
    /// window page.
    fn active_table_ptr(&self, index: usize) -> *mut PageTable {
        self.mmu.page_ptr(window_page(index)) as *mut PageTable
    }

    pub(crate) fn mmu(&self) -> &hw::Mmu {
        &self.mmu
    }

    /// Returns the kernel address space.
    pub fn kernel_space(&self) -> &AddressSpace {
        &self.kernel
    }

    /// Returns the root of the active space. The scheduler compares this
    /// against its processes to find who a fault belongs to.
    pub fn active_root(&self) -> PhysicalAddress {
        self.active.root
    }

    /// Returns `true` when `space` is the active one.
    pub fn is_active(&self, space: &AddressSpace) -> bool {
        space.root() == self.active.root
    }

    /// Translates `vaddr` through the active space.
    pub fn translate(&self, vaddr: VirtualAddress) -> Option<PhysicalAddress> {
        let desc = self.active_directory().entry(vaddr.directory_index());
        if !desc.is_present() {
            return None;
        }
        // SAFETY: present tables are visible through their window page.
        let table = unsafe { &*self.active_table_ptr(vaddr.directory_index()) };
        let entry = table.entry(vaddr.table_index());
        if !entry.is_present() {
            return None;
        }
        Some(entry.frame().start() + vaddr.page_offset())
    }

    /// Creates the page table covering `vaddr` in the active space: a
    /// present, writable, user directory entry, the matching window
    /// mapping, and a zeroed table.
    pub fn allocate_table(&mut self, vaddr: VirtualAddress) -> Result<()> {
        let Some(frame) = self.platform.alloc_frame() else {
            log::error!("vmm: out of physical frames allocating a table for {vaddr}");
            return Err(VmmError::NoPhysicalSpace);
        };
        let index = vaddr.directory_index();
        {
            let desc = self.active_directory_mut().entry_mut(index);
            *desc = TableDesc::new();
            desc.set_attrs(TableAttrs::PRESENT | TableAttrs::WRITABLE | TableAttrs::USER);
            desc.set_frame(frame.frame_number());
        }
        let window = window_page(index);
        self.map_page(window, frame, MapFlags::RWX | MapFlags::owner_of(vaddr))?;
        // SAFETY: the window page now maps the new table's frame.
        unsafe {
            ptr::write_bytes(self.mmu.page_ptr(window), 0, layout::PAGE_SIZE);
        }
        Ok(())
    }

    /// Maps `vaddr` to `paddr` in the active space, creating the covering
    /// table on demand. The entry is rebuilt from scratch: the last write
    /// wins and earlier attributes do not bleed through.
    pub fn map_page(
        &mut self,
        vaddr: VirtualAddress,
        paddr: PhysicalAddress,
        flags: MapFlags,
    ) -> Result<()> {
        if !self.active_directory().entry(vaddr.directory_index()).is_present() {
            self.allocate_table(vaddr)?;
        }
        // SAFETY: the table is present and visible through its window page.
        let table = unsafe { &mut *self.active_table_ptr(vaddr.directory_index()) };
        let entry = table.entry_mut(vaddr.table_index());
        *entry = PageDesc::new();
        entry.set_attrs(PageAttrs::from_map_flags(flags));
        entry.set_frame(paddr.frame_number());
        log::trace!("vmm: map {vaddr} -> {paddr} ({flags:?})");
        self.mmu.flush_tlb_entry(vaddr);
        Ok(())
    }

    /// Unmaps `vaddr` in the active space. The frame is not freed; it
    /// belongs to whoever mapped it.
    pub fn unmap_page(&mut self, vaddr: VirtualAddress) -> Result<()> {
        if !self.active_directory().entry(vaddr.directory_index()).is_present() {
            return Err(VmmError::NotMapped);
        }
        // SAFETY: the table is present and visible through its window page.
        let table = unsafe { &mut *self.active_table_ptr(vaddr.directory_index()) };
        let entry = table.entry_mut(vaddr.table_index());
        entry.del_attrs(PageAttrs::PRESENT | PageAttrs::WRITABLE);
        entry.del_frame();
        log::trace!("vmm: unmap {vaddr}");
        self.mmu.flush_tlb_entry(vaddr);
        Ok(())
    }

    /// Maps `count` consecutive pages starting at the page-aligned pair
    /// `vaddr`/`paddr`.
    ///
    /// Fails fast: pages mapped before the first error stay mapped.
    pub fn map_range(
        &mut self,
        vaddr: VirtualAddress,
        paddr: PhysicalAddress,
        count: usize,
        flags: MapFlags,
    ) -> Result<()> {
        if !vaddr.is_aligned(layout::PAGE_SIZE) || !paddr.is_aligned(layout::PAGE_SIZE) {
            return Err(VmmError::BadAlignment);
        }
        for page in 0..count {
            self.map_page(
                vaddr + page * layout::PAGE_SIZE,
                paddr + page * layout::PAGE_SIZE,
                flags,
            )?;
        }
        Ok(())
    }

    /// Makes `space` the active translation. The space must stay alive
    /// while it is active; [`Vmm::free_address_space`] refuses the active
    /// one.
    pub fn switch_active(&mut self, space: &AddressSpace) {
        self.activate(space.directory_ptr(), space.root());
    }

    /// Switches back to the kernel address space.
    pub fn switch_to_kernel(&mut self) {
        self.activate(self.kernel.directory_ptr(), self.kernel.root());
    }

    fn activate(&mut self, directory: NonNull<Directory>, root: PhysicalAddress) {
        // A fault between the marker update and the hardware switch would
        // walk the wrong structures.
        let _guard = hw::InterruptGuard::acquire();
        if self.active.root == root {
            return;
        }
        self.active = ActiveRoot { directory, root };
        self.mmu.set_table_base(root);
    }

    /// Creates a fresh user address space: empty user half, shared kernel
    /// half, private window table.
    ///
    /// Panics when the kernel heap or the frame allocator is exhausted.
    pub fn new_address_space(&mut self) -> AddressSpace {
        let block = match self.platform.allocate(layout::PAGE_SIZE) {
            Some(block) => block,
            None => panic!("vmm: kernel heap exhausted creating an address space"),
        };
        let root = block.phys();
        let directory = block.ptr().cast::<Directory>();
        // SAFETY: the heap handed over an exclusive page-sized block.
        unsafe {
            ptr::write_bytes(block.ptr().as_ptr(), 0, layout::PAGE_SIZE);
        }
        {
            // SAFETY: the new directory is exclusively ours until returned.
            let dir = unsafe { &mut *directory.as_ptr() };
            for index in layout::KERNEL_TABLES_START..layout::DIRECTORY_ENTRIES {
                *dir.entry_mut(index) = self.kernel.directory().entry(index);
            }
        }
        let window_desc = self.generate_window_table();
        // SAFETY: as above.
        let dir = unsafe { &mut *directory.as_ptr() };
        *dir.entry_mut(layout::PSPACE_INDEX) = window_desc;
        log::debug!("vmm: new address space, root {root}");
        AddressSpace::new(directory, root)
    }

    /// Forks the active space. The child shares every present user table
    /// with the parent and both sides are downgraded to read-only,
    /// copy-on-write.
    ///
    /// Panics when the kernel heap or the frame allocator is exhausted.
    pub fn fork_address_space(&mut self) -> AddressSpace {
        let block = match self.platform.allocate(layout::PAGE_SIZE) {
            Some(block) => block,
            None => panic!("vmm: kernel heap exhausted forking an address space"),
        };
        let root = block.phys();
        let directory = block.ptr().cast::<Directory>();
        {
            // SAFETY: the new directory is exclusively ours until returned.
            let dir = unsafe { &mut *directory.as_ptr() };
            for index in 0..layout::DIRECTORY_ENTRIES {
                *dir.entry_mut(index) = self.active_directory().entry(index);
            }
        }
        let window_desc = self.generate_window_table();
        // SAFETY: as above.
        let dir = unsafe { &mut *directory.as_ptr() };
        *dir.entry_mut(layout::PSPACE_INDEX) = window_desc;

        for index in 0..layout::KERNEL_TABLES_START {
            if !self.active_directory().entry(index).is_present() {
                continue;
            }
            {
                let desc = self.active_directory_mut().entry_mut(index);
                desc.del_attrs(TableAttrs::WRITABLE);
                desc.set_attrs(TableAttrs::COPY_ON_WRITE);
            }
            let desc = dir.entry_mut(index);
            desc.del_attrs(TableAttrs::WRITABLE);
            desc.set_attrs(TableAttrs::COPY_ON_WRITE);
        }
        self.mmu.flush_tlb_all();
        log::debug!("vmm: forked {} into {root}", self.active.root);
        AddressSpace::new(directory, root)
    }

    /// Frees a user address space: every frame owned by a present,
    /// non-copy-on-write user table goes back to the allocator, along with
    /// the window table frame and the directory block.
    ///
    /// Refuses the kernel space and the active one.
    pub fn free_address_space(&mut self, space: AddressSpace) -> Result<()> {
        if space.root() == self.kernel.root() {
            return Err(VmmError::IsKernelSpace);
        }
        if space.root() == self.active.root {
            return Err(VmmError::StillActive);
        }
        for index in 0..layout::KERNEL_TABLES_START {
            let desc = space.directory().entry(index);
            if desc.is_present() && !desc.is_copy_on_write() {
                self.platform.free_frame(desc.frame().start());
            }
        }
        let window_desc = space.directory().entry(layout::PSPACE_INDEX);
        if window_desc.is_present() {
            self.platform.free_frame(window_desc.frame().start());
        }
        log::debug!("vmm: freed address space {}", space.root());
        let block = HeapBlock::new(space.directory_ptr().cast(), space.root());
        self.platform.release(block, layout::PAGE_SIZE);
        Ok(())
    }

    /// Builds a private window table for a new space: a copy of the active
    /// one with the self-slot switched to the new frame.
    ///
    /// Panics when the frame allocator is exhausted.
    fn generate_window_table(&mut self) -> TableDesc {
        // The scratch slot is shared with the fault path; keep the copy
        // atomic with respect to interrupts.
        let _guard = hw::InterruptGuard::acquire();
        let Some(frame) = self.platform.alloc_frame() else {
            panic!("vmm: out of physical frames for a window table");
        };
        let scratch = VirtualAddress::new(layout::SCRATCH_BASE);
        if let Err(error) = self.map_page(scratch, frame, MapFlags::RWX) {
            panic!("vmm: scratch mapping failed: {error:?}");
        }
        {
            // SAFETY: the active window table is visible through its own
            // window page; the new frame was just mapped at the scratch
            // slot. Distinct frames.
            let source = unsafe { &*self.active_table_ptr(layout::PSPACE_INDEX) };
            let table = unsafe { &mut *(self.mmu.page_ptr(scratch) as *mut PageTable) };
            for n in 0..layout::TABLE_ENTRIES {
                *table.entry_mut(n) = source.entry(n);
            }
            let own = table.entry_mut(layout::PSPACE_INDEX);
            *own = PageDesc::new();
            own.set_attrs(PageAttrs::PRESENT | PageAttrs::WRITABLE);
            own.set_frame(frame.frame_number());
        }
        if let Err(error) = self.unmap_page(scratch) {
            panic!("vmm: scratch unmapping failed: {error:?}");
        }
        let mut desc = TableDesc::new();
        desc.set_attrs(TableAttrs::PRESENT | TableAttrs::WRITABLE);
        desc.set_frame(frame.frame_number());
        desc
    }

    /// Materializes a zeroed page at `vaddr` with `flags`.
    ///
    /// This is the demand-paging primitive; exhaustion here is fatal.
    pub fn load_page(&mut self, vaddr: VirtualAddress, flags: MapFlags) {
        let Some(frame) = self.platform.alloc_frame() else {
            panic!("vmm: no physical space loading {vaddr}");
        };
        if let Err(error) = self.map_page(vaddr.page_start(), frame, flags) {
            panic!("vmm: loading {vaddr} failed: {error:?}");
        }
        // SAFETY: the page was just mapped; kernel writes ignore the
        // protection bits.
        unsafe {
            ptr::write_bytes(self.mmu.page_ptr(vaddr.page_start()), 0, layout::PAGE_SIZE);
        }
    }

    /// Adjusts the user, writable and cacheable attributes of the page at
    /// `vaddr`, or materializes it with `flags` when absent.
    pub fn tune_page(&mut self, vaddr: VirtualAddress, flags: MapFlags) {
        let vaddr = vaddr.page_start();
        let covered = self.active_directory().entry(vaddr.directory_index()).is_present();
        let present = covered && {
            // SAFETY: present tables are visible through their window page.
            let table = unsafe { &*self.active_table_ptr(vaddr.directory_index()) };
            table.entry(vaddr.table_index()).is_present()
        };
        if present {
            // SAFETY: as above.
            let table = unsafe { &mut *self.active_table_ptr(vaddr.directory_index()) };
            let entry = table.entry_mut(vaddr.table_index());
            if flags.contains(MapFlags::USER) {
                entry.set_attrs(PageAttrs::USER);
            } else {
                entry.del_attrs(PageAttrs::USER);
            }
            if flags.contains(MapFlags::WRITABLE) {
                entry.set_attrs(PageAttrs::WRITABLE);
            } else {
                entry.del_attrs(PageAttrs::WRITABLE);
            }
            if flags.contains(MapFlags::NOT_CACHEABLE) {
                entry.set_attrs(PageAttrs::NOT_CACHEABLE);
            } else {
                entry.del_attrs(PageAttrs::NOT_CACHEABLE);
            }
        } else {
            self.load_page(vaddr, flags);
        }
        self.mmu.flush_tlb_entry(vaddr);
    }

    /// Arms every user table of `space` for zero-on-demand: writable drops
    /// away and the flag spreads to the pages at the first write fault.
    pub fn zero_user_pages(&mut self, space: &mut AddressSpace) {
        for index in 0..layout::KERNEL_TABLES_START {
            let desc = space.directory_mut().entry_mut(index);
            desc.del_attrs(TableAttrs::WRITABLE);
            desc.set_attrs(TableAttrs::ZERO_ON_DEMAND);
        }
        if space.root() == self.active.root {
            self.mmu.flush_tlb_all();
        }
    }

    /// Returns `true` when a write to `vaddr` must first resolve
    /// copy-on-write, at either table or page granularity.
    pub fn is_copy_on_write(&self, vaddr: VirtualAddress) -> bool {
        let desc = self.active_directory().entry(vaddr.directory_index());
        if desc.is_copy_on_write() {
            return true;
        }
        if !desc.is_present() {
            return false;
        }
        // SAFETY: present tables are visible through their window page.
        let table = unsafe { &*self.active_table_ptr(vaddr.directory_index()) };
        table.entry(vaddr.table_index()).is_copy_on_write()
    }

    /// Returns `true` when a write to `vaddr` must first resolve
    /// zero-on-demand, at either table or page granularity.
    pub fn is_zero_on_demand(&self, vaddr: VirtualAddress) -> bool {
        let desc = self.active_directory().entry(vaddr.directory_index());
        if desc.is_zero_on_demand() {
            return true;
        }
        if !desc.is_present() {
            return false;
        }
        // SAFETY: present tables are visible through their window page.
        let table = unsafe { &*self.active_table_ptr(vaddr.directory_index()) };
        table.entry(vaddr.table_index()).is_zero_on_demand()
    }

    /// Resolves copy-on-write at `vaddr`: the active space gets a private
    /// copy of the shared table (or of the single shared page) before the
    /// write proceeds.
    ///
    /// Panics when physical memory or the kernel heap is exhausted.
    pub fn resolve_copy_on_write(&mut self, vaddr: VirtualAddress) {
        if self.active_directory().entry(vaddr.directory_index()).is_copy_on_write() {
            self.resolve_table_copy_on_write(vaddr);
        } else {
            let old = {
                // SAFETY: present tables are visible through their window
                // page.
                let table = unsafe { &*self.active_table_ptr(vaddr.directory_index()) };
                table.entry(vaddr.table_index())
            };
            self.copy_page_from(vaddr.page_start(), old);
        }
    }

    /// Duplicates a whole copy-on-write table: snapshot the shared table to
    /// the heap, install a fresh private table, then re-create every
    /// non-empty entry from the snapshot.
    fn resolve_table_copy_on_write(&mut self, vaddr: VirtualAddress) {
        let _guard = hw::InterruptGuard::acquire();
        let Some(snapshot_block) = self.platform.allocate(layout::PAGE_SIZE) else {
            panic!("vmm: kernel heap exhausted resolving copy-on-write at {vaddr}");
        };
        {
            // SAFETY: the shared table is visible through its window page;
            // the snapshot block is exclusively ours.
            let source = unsafe { &*self.active_table_ptr(vaddr.directory_index()) };
            let snapshot = unsafe { &mut *(snapshot_block.ptr().as_ptr() as *mut PageTable) };
            for n in 0..layout::TABLE_ENTRIES {
                *snapshot.entry_mut(n) = source.entry(n);
            }
        }
        if let Err(error) = self.allocate_table(vaddr) {
            panic!("vmm: re-allocating a table for {vaddr} failed: {error:?}");
        }
        let table_base = vaddr.align_down(layout::TABLE_COVERAGE);
        for n in 0..layout::TABLE_ENTRIES {
            let old = {
                // SAFETY: the snapshot block stays ours for the whole loop.
                let snapshot = unsafe { &*(snapshot_block.ptr().as_ptr() as *const PageTable) };
                snapshot.entry(n)
            };
            if old.raw() != 0 {
                self.copy_page_from(table_base + n * layout::PAGE_SIZE, old);
            }
        }
        self.platform.release(snapshot_block, layout::PAGE_SIZE);
        log::debug!("vmm: copy-on-write resolved for table {}", vaddr.directory_index());
    }

    /// Re-creates `vaddr` from a snapshot entry: a fresh frame mapped with
    /// the old attributes minus copy-on-write, filled with a byte copy of
    /// the old frame through the scratch slot.
    fn copy_page_from(&mut self, vaddr: VirtualAddress, old: PageDesc) {
        let _guard = hw::InterruptGuard::acquire();
        self.load_page(vaddr, old.map_flags_without_cow());

        let scratch = VirtualAddress::new(layout::SCRATCH_BASE);
        if let Err(error) = self.map_page(scratch, old.frame().start(), MapFlags::RWX) {
            panic!("vmm: scratch mapping failed: {error:?}");
        }
        // SAFETY: both pages are mapped and they are distinct frames.
        unsafe {
            ptr::copy_nonoverlapping(
                self.mmu.page_ptr(scratch),
                self.mmu.page_ptr(vaddr),
                layout::PAGE_SIZE,
            );
        }
        if let Err(error) = self.unmap_page(scratch) {
            panic!("vmm: scratch unmapping failed: {error:?}");
        }
    }

    /// Resolves zero-on-demand at `vaddr`. On the first fault against an
    /// armed table the marking spreads from the table to all of its pages;
    /// the faulting page is then zeroed and made writable again.
    pub fn resolve_zero_on_demand(&mut self, vaddr: VirtualAddress) {
        let index = vaddr.directory_index();
        if self.active_directory().entry(index).is_zero_on_demand() {
            {
                // SAFETY: present tables are visible through their window
                // page.
                let table = unsafe { &mut *self.active_table_ptr(index) };
                for n in 0..layout::TABLE_ENTRIES {
                    let entry = table.entry_mut(n);
                    entry.set_attrs(PageAttrs::ZERO_ON_DEMAND);
                    entry.del_attrs(PageAttrs::WRITABLE);
                }
            }
            self.active_directory_mut()
                .entry_mut(index)
                .del_attrs(TableAttrs::ZERO_ON_DEMAND);
        }
        let page = vaddr.page_start();
        // SAFETY: the faulting page is present; kernel writes ignore the
        // read-only marking.
        unsafe {
            ptr::write_bytes(self.mmu.page_ptr(page), 0, layout::PAGE_SIZE);
        }
        {
            // SAFETY: as above.
            let table = unsafe { &mut *self.active_table_ptr(index) };
            let entry = table.entry_mut(vaddr.table_index());
            entry.del_attrs(PageAttrs::ZERO_ON_DEMAND);
            entry.set_attrs(PageAttrs::PRESENT | PageAttrs::WRITABLE);
        }
        self.mmu.flush_tlb_entry(page);
    }
}

#[cfg(test)]
mod tests {
    use alloc::sync::Arc;

    use super::*;
    use crate::harness::{self, machine, peek, poke};
    use crate::hw::{EmulatedMemory, EmulatedPlatform};
    use crate::space::AddressSpace;

    fn addr(value: usize) -> VirtualAddress {
        VirtualAddress::new(value)
    }

    fn phys(value: usize) -> PhysicalAddress {
        PhysicalAddress::new(value)
    }

    mod setup {
        use super::*;

        #[test]
        fn boots_with_kernel_translations() {
            let vmm = machine();
            assert_eq!(
                vmm.translate(addr(layout::KERNEL_BASE)),
                Some(phys(layout::KERNEL_PHYS_BASE))
            );
            assert_eq!(
                vmm.translate(addr(layout::KERNEL_BASE + 0x5123)),
                Some(phys(layout::KERNEL_PHYS_BASE + 0x5123))
            );
            assert_eq!(
                vmm.translate(addr(layout::LOW_PHYS_WINDOW + layout::PAGE_SIZE)),
                Some(phys(layout::PAGE_SIZE))
            );
            assert_eq!(vmm.translate(addr(0x1000)), Some(phys(0x1000)));
            assert_eq!(vmm.translate(addr(0x5000_0000)), None);
        }

        #[test]
        fn window_pages_reach_the_kernel_tables() {
            let vmm = machine();
            let first = layout::PSPACE_BASE + layout::KERNEL_TABLES_START * layout::PAGE_SIZE;
            assert_eq!(
                vmm.translate(addr(first)),
                Some(phys(harness::KERNEL_TABLES_BASE))
            );
            let own = layout::PSPACE_BASE + layout::PSPACE_INDEX * layout::PAGE_SIZE;
            assert_eq!(
                vmm.translate(addr(own)),
                Some(phys(harness::KERNEL_TABLES_BASE + layout::PAGE_SIZE))
            );
        }

        #[test]
        #[should_panic(expected = "page-aligned")]
        fn rejects_an_unaligned_directory() {
            let memory = Arc::new(EmulatedMemory::new(harness::MEMORY_SIZE));
            let mmu = hw::Mmu::new(Arc::clone(&memory));
            let platform =
                EmulatedPlatform::new(memory, phys(harness::FIRST_FREE_FRAME));
            let _ = Vmm::setup(
                platform,
                mmu,
                VmmConfig {
                    kernel_directory: phys(harness::KERNEL_DIRECTORY + 0x800),
                    kernel_tables_base: phys(harness::KERNEL_TABLES_BASE),
                },
            );
        }
    }

    mod mapping {
        use super::*;

        #[test]
        fn mapped_pages_share_their_frame() {
            let mut vmm = machine();
            vmm.map_page(addr(0x2000_0000), phys(0x0060_0000), MapFlags::RWX)
                .unwrap();
            vmm.map_page(addr(0x2001_0000), phys(0x0060_0000), MapFlags::RWX)
                .unwrap();
            poke(&vmm, 0x2000_0123, 0xAB);
            assert_eq!(peek(&vmm, 0x2001_0123), 0xAB);
        }

        #[test]
        fn remapping_builds_a_fresh_entry() {
            let mut vmm = machine();
            let vaddr = addr(0x2000_0000);
            vmm.map_page(vaddr, phys(0x0060_0000), MapFlags::RWX | MapFlags::USER)
                .unwrap();
            vmm.map_page(vaddr, phys(0x0060_1000), MapFlags::READABLE)
                .unwrap();
            assert_eq!(vmm.translate(vaddr), Some(phys(0x0060_1000)));
            // SAFETY: the covering table was just created.
            let entry =
                unsafe { &*vmm.active_table_ptr(vaddr.directory_index()) }.entry(vaddr.table_index());
            assert!(entry.is_present());
            assert!(!entry.is_writable());
            assert!(!entry.is_user());
        }

        #[test]
        fn unmapping_drops_the_translation() {
            let mut vmm = machine();
            vmm.map_page(addr(0x2000_0000), phys(0x0060_0000), MapFlags::RWX)
                .unwrap();
            vmm.unmap_page(addr(0x2000_0000)).unwrap();
            assert_eq!(vmm.translate(addr(0x2000_0000)), None);
        }

        #[test]
        fn unmapping_without_a_table_is_an_error() {
            let mut vmm = machine();
            assert_eq!(
                vmm.unmap_page(addr(0x3000_0000)),
                Err(VmmError::NotMapped)
            );
        }

        #[test]
        fn unmapping_twice_leaves_the_page_absent() {
            let mut vmm = machine();
            vmm.map_page(addr(0x2000_0000), phys(0x0060_0000), MapFlags::RWX)
                .unwrap();
            vmm.unmap_page(addr(0x2000_0000)).unwrap();
            // The covering table survives the first unmap, so a repeat
            // succeeds and the page stays absent.
            vmm.unmap_page(addr(0x2000_0000)).unwrap();
            assert_eq!(vmm.translate(addr(0x2000_0000)), None);

            // Without a covering table both attempts report the same error.
            assert_eq!(vmm.unmap_page(addr(0x3000_0000)), Err(VmmError::NotMapped));
            assert_eq!(vmm.unmap_page(addr(0x3000_0000)), Err(VmmError::NotMapped));
        }

        #[test]
        fn ranges_must_be_page_aligned() {
            let mut vmm = machine();
            assert_eq!(
                vmm.map_range(addr(0x2000_0001), phys(0x0060_0000), 1, MapFlags::RWX),
                Err(VmmError::BadAlignment)
            );
            assert_eq!(
                vmm.map_range(addr(0x2000_0000), phys(0x0060_0100), 1, MapFlags::RWX),
                Err(VmmError::BadAlignment)
            );
        }

        #[test]
        fn a_range_spans_table_boundaries() {
            let mut vmm = machine();
            // Crosses from directory entry 129 into 130.
            vmm.map_range(addr(0x207F_E000), phys(0x0070_0000), 4, MapFlags::RWX)
                .unwrap();
            for page in 0..4 {
                assert_eq!(
                    vmm.translate(addr(0x207F_E000 + page * layout::PAGE_SIZE)),
                    Some(phys(0x0070_0000 + page * layout::PAGE_SIZE))
                );
            }
        }

        #[test]
        fn load_page_hands_out_zeroed_memory() {
            let mut vmm = machine();
            vmm.load_page(addr(0x0080_0000), MapFlags::RWX | MapFlags::USER);
            assert!(vmm.translate(addr(0x0080_0000)).is_some());
            assert_eq!(peek(&vmm, 0x0080_0000), 0);
            assert_eq!(peek(&vmm, 0x0080_0FFF), 0);
        }

        #[test]
        fn tune_page_toggles_protection_in_place() {
            let mut vmm = machine();
            let vaddr = addr(0x0090_0000);
            vmm.map_page(vaddr, phys(0x0060_0000), MapFlags::RWX | MapFlags::USER)
                .unwrap();
            let before = vmm.translate(vaddr);

            vmm.tune_page(vaddr, MapFlags::READABLE);
            assert_eq!(vmm.translate(vaddr), before);
            // SAFETY: the covering table exists.
            let entry =
                unsafe { &*vmm.active_table_ptr(vaddr.directory_index()) }.entry(vaddr.table_index());
            assert!(entry.is_present());
            assert!(!entry.is_writable());
            assert!(!entry.is_user());

            vmm.tune_page(vaddr, MapFlags::RWX | MapFlags::USER);
            // SAFETY: as above.
            let entry =
                unsafe { &*vmm.active_table_ptr(vaddr.directory_index()) }.entry(vaddr.table_index());
            assert!(entry.is_writable());
            assert!(entry.is_user());
        }

        #[test]
        fn tune_page_materializes_absent_pages() {
            let mut vmm = machine();
            vmm.tune_page(addr(0x00A0_0000), MapFlags::RWX | MapFlags::USER);
            assert!(vmm.translate(addr(0x00A0_0000)).is_some());
            assert_eq!(peek(&vmm, 0x00A0_0000), 0);
        }
    }

    mod spaces {
        use super::*;

        #[test]
        fn a_new_space_shares_the_kernel_half_only() {
            let mut vmm = machine();
            vmm.map_page(addr(0x1000_0000), phys(0x0060_0000), MapFlags::RWX | MapFlags::USER)
                .unwrap();
            let space = vmm.new_address_space();
            vmm.switch_active(&space);

            assert_eq!(
                vmm.translate(addr(layout::KERNEL_BASE)),
                Some(phys(layout::KERNEL_PHYS_BASE))
            );
            assert_eq!(vmm.translate(addr(0x1000_0000)), None);
            assert_eq!(vmm.translate(addr(0x1000)), None);

            vmm.switch_to_kernel();
            assert_eq!(vmm.translate(addr(0x1000_0000)), Some(phys(0x0060_0000)));
        }

        #[test]
        fn each_space_carries_its_own_window_table() {
            let mut vmm = machine();
            let space = vmm.new_address_space();
            vmm.switch_active(&space);
            let own = layout::PSPACE_BASE + layout::PSPACE_INDEX * layout::PAGE_SIZE;
            let self_frame = vmm.translate(addr(own)).unwrap();
            assert_eq!(
                self_frame,
                space.directory().entry(layout::PSPACE_INDEX).frame().start()
            );
            assert_ne!(
                self_frame,
                phys(harness::KERNEL_TABLES_BASE + layout::PAGE_SIZE)
            );
            vmm.switch_to_kernel();
        }

        #[test]
        fn spaces_are_isolated_through_the_window() {
            let mut vmm = machine();
            let first = vmm.new_address_space();
            let second = vmm.new_address_space();

            vmm.switch_active(&first);
            vmm.map_page(addr(0x0040_0000), phys(0x0060_0000), MapFlags::RWX | MapFlags::USER)
                .unwrap();
            poke(&vmm, 0x0040_0000, 0x11);

            vmm.switch_active(&second);
            assert_eq!(vmm.translate(addr(0x0040_0000)), None);
            vmm.map_page(addr(0x0040_0000), phys(0x0060_1000), MapFlags::RWX | MapFlags::USER)
                .unwrap();
            poke(&vmm, 0x0040_0000, 0x22);

            vmm.switch_active(&first);
            assert_eq!(peek(&vmm, 0x0040_0000), 0x11);
            vmm.switch_active(&second);
            assert_eq!(peek(&vmm, 0x0040_0000), 0x22);
            vmm.switch_to_kernel();
        }

        #[test]
        fn switching_to_the_active_space_is_a_no_op() {
            let mut vmm = machine();
            let space = vmm.new_address_space();
            vmm.switch_active(&space);
            let root = vmm.active_root();
            vmm.switch_active(&space);
            assert_eq!(vmm.active_root(), root);
            vmm.switch_to_kernel();
        }

        #[test]
        fn freeing_refuses_the_kernel_space() {
            let mut vmm = machine();
            let kernel =
                AddressSpace::new(vmm.kernel_space().directory_ptr(), vmm.kernel_space().root());
            assert_eq!(
                vmm.free_address_space(kernel),
                Err(VmmError::IsKernelSpace)
            );
        }

        #[test]
        fn freeing_refuses_the_active_space() {
            let mut vmm = machine();
            let space = vmm.new_address_space();
            vmm.switch_active(&space);
            let doomed = AddressSpace::new(space.directory_ptr(), space.root());
            assert_eq!(vmm.free_address_space(doomed), Err(VmmError::StillActive));
            vmm.switch_to_kernel();
        }

        #[test]
        fn freeing_returns_private_table_frames() {
            let mut vmm = machine();
            let space = vmm.new_address_space();
            vmm.switch_active(&space);
            vmm.map_page(addr(0x0040_0000), phys(0x0060_0000), MapFlags::RWX | MapFlags::USER)
                .unwrap();
            let window_frame = space.directory().entry(layout::PSPACE_INDEX).frame().start();
            vmm.switch_to_kernel();
            vmm.free_address_space(space).unwrap();

            // The window table frame was freed last, so the next table
            // allocation recycles it.
            vmm.map_page(addr(0x0100_0000), phys(0x0060_1000), MapFlags::RWX | MapFlags::USER)
                .unwrap();
            let recycled = vmm
                .active_directory()
                .entry(addr(0x0100_0000).directory_index())
                .frame()
                .start();
            assert_eq!(recycled, window_frame);
        }
    }

    mod forking {
        use super::*;

        #[test]
        fn a_fork_shares_pages_until_either_side_writes() {
            let mut vmm = machine();
            let parent = vmm.new_address_space();
            vmm.switch_active(&parent);
            vmm.map_page(addr(0x0050_0000), phys(0x0060_0000), MapFlags::RWX | MapFlags::USER)
                .unwrap();
            poke(&vmm, 0x0050_0000, 7);

            let child = vmm.fork_address_space();
            vmm.switch_active(&child);
            assert_eq!(vmm.translate(addr(0x0050_0000)), Some(phys(0x0060_0000)));
            assert!(vmm.is_copy_on_write(addr(0x0050_0000)));

            vmm.resolve_copy_on_write(addr(0x0050_0000));
            let private = vmm.translate(addr(0x0050_0000)).unwrap();
            assert_ne!(private, phys(0x0060_0000));
            assert!(!vmm.is_copy_on_write(addr(0x0050_0000)));
            assert_eq!(peek(&vmm, 0x0050_0000), 7);

            poke(&vmm, 0x0050_0000, 9);
            vmm.switch_active(&parent);
            assert_eq!(vmm.translate(addr(0x0050_0000)), Some(phys(0x0060_0000)));
            assert_eq!(peek(&vmm, 0x0050_0000), 7);
            vmm.switch_to_kernel();
        }

        #[test]
        fn the_parent_resolves_its_own_side_too() {
            let mut vmm = machine();
            let parent = vmm.new_address_space();
            vmm.switch_active(&parent);
            vmm.map_page(addr(0x0050_0000), phys(0x0060_0000), MapFlags::RWX | MapFlags::USER)
                .unwrap();
            poke(&vmm, 0x0050_0000, 42);
            let _child = vmm.fork_address_space();

            assert!(vmm.is_copy_on_write(addr(0x0050_0000)));
            vmm.resolve_copy_on_write(addr(0x0050_0000));
            assert_ne!(vmm.translate(addr(0x0050_0000)), Some(phys(0x0060_0000)));
            assert_eq!(peek(&vmm, 0x0050_0000), 42);
            vmm.switch_to_kernel();
        }

        #[test]
        fn resolution_copies_every_touched_entry_of_the_table() {
            let mut vmm = machine();
            let parent = vmm.new_address_space();
            vmm.switch_active(&parent);
            for page in 0..3 {
                let vaddr = addr(0x0050_0000 + page * layout::PAGE_SIZE);
                vmm.map_page(vaddr, phys(0x0060_0000 + page * layout::PAGE_SIZE), MapFlags::RWX | MapFlags::USER)
                    .unwrap();
                poke(&vmm, vaddr.as_usize(), page as u8 + 1);
            }
            let child = vmm.fork_address_space();
            vmm.switch_active(&child);
            vmm.resolve_copy_on_write(addr(0x0050_1000));
            for page in 0..3 {
                let vaddr = 0x0050_0000 + page * layout::PAGE_SIZE;
                assert_ne!(
                    vmm.translate(addr(vaddr)),
                    Some(phys(0x0060_0000 + page * layout::PAGE_SIZE))
                );
                assert_eq!(peek(&vmm, vaddr), page as u8 + 1);
            }
            vmm.switch_to_kernel();
        }

        #[test]
        fn a_page_granular_marking_copies_one_page() {
            let mut vmm = machine();
            let space = vmm.new_address_space();
            vmm.switch_active(&space);
            vmm.map_page(addr(0x0050_0000), phys(0x0060_0000), MapFlags::RWX | MapFlags::USER)
                .unwrap();
            vmm.map_page(addr(0x0050_1000), phys(0x0060_1000), MapFlags::RWX | MapFlags::USER)
                .unwrap();
            poke(&vmm, 0x0050_0000, 0xAA);
            poke(&vmm, 0x0050_1000, 0xBB);
            {
                // SAFETY: the covering table exists.
                let table = unsafe { &mut *vmm.active_table_ptr(1) };
                let entry = table.entry_mut(addr(0x0050_0000).table_index());
                entry.set_attrs(PageAttrs::COPY_ON_WRITE);
                entry.del_attrs(PageAttrs::WRITABLE);
            }
            assert!(vmm.is_copy_on_write(addr(0x0050_0000)));
            assert!(!vmm.is_copy_on_write(addr(0x0050_1000)));

            vmm.resolve_copy_on_write(addr(0x0050_0000));
            assert_ne!(vmm.translate(addr(0x0050_0000)), Some(phys(0x0060_0000)));
            assert_eq!(vmm.translate(addr(0x0050_1000)), Some(phys(0x0060_1000)));
            assert_eq!(peek(&vmm, 0x0050_0000), 0xAA);
            assert_eq!(peek(&vmm, 0x0050_1000), 0xBB);
            vmm.switch_to_kernel();
        }

        #[test]
        fn freeing_a_forked_space_keeps_shared_tables() {
            let mut vmm = machine();
            let parent = vmm.new_address_space();
            vmm.switch_active(&parent);
            vmm.map_page(addr(0x0050_0000), phys(0x0060_0000), MapFlags::RWX | MapFlags::USER)
                .unwrap();
            poke(&vmm, 0x0050_0000, 7);
            let shared_table = parent.directory().entry(1).frame().start();

            let child = vmm.fork_address_space();
            vmm.switch_to_kernel();
            vmm.free_address_space(child).unwrap();

            // The shared table must not be recycled into the next two
            // allocations (only the child's window frame was freed).
            vmm.map_page(addr(0x0100_0000), phys(0x0060_1000), MapFlags::RWX | MapFlags::USER)
                .unwrap();
            vmm.map_page(addr(0x0140_0000), phys(0x0060_2000), MapFlags::RWX | MapFlags::USER)
                .unwrap();
            for index in [0x0100_0000usize, 0x0140_0000] {
                let frame = vmm
                    .active_directory()
                    .entry(addr(index).directory_index())
                    .frame()
                    .start();
                assert_ne!(frame, shared_table);
            }

            vmm.switch_active(&parent);
            assert_eq!(peek(&vmm, 0x0050_0000), 7);
            vmm.switch_to_kernel();
        }
    }

    mod zeroing {
        use super::*;

        #[test]
        fn armed_tables_spread_the_marking_and_zero_on_first_write() {
            let mut vmm = machine();
            let mut space = vmm.new_address_space();
            vmm.switch_active(&space);
            vmm.load_page(addr(0x0060_0000), MapFlags::RWX | MapFlags::USER);
            poke(&vmm, 0x0060_0000, 0xCD);

            vmm.zero_user_pages(&mut space);
            assert!(vmm.is_zero_on_demand(addr(0x0060_0000)));

            vmm.resolve_zero_on_demand(addr(0x0060_0000));
            assert_eq!(peek(&vmm, 0x0060_0000), 0);
            assert!(!vmm.is_zero_on_demand(addr(0x0060_0000)));
            // The marking moved from the table to its other pages.
            assert!(!vmm.active_directory().entry(1).is_zero_on_demand());
            assert!(vmm.is_zero_on_demand(addr(0x0060_1000)));
            vmm.switch_to_kernel();
        }

        #[test]
        fn arming_covers_tables_that_do_not_exist_yet() {
            let mut vmm = machine();
            let mut space = vmm.new_address_space();
            vmm.switch_active(&space);
            vmm.zero_user_pages(&mut space);

            let desc = space.directory().entry(5);
            assert!(!desc.is_present());
            assert!(desc.is_zero_on_demand());

            // Creating the table later rebuilds the entry from scratch.
            vmm.allocate_table(addr(5 * layout::TABLE_COVERAGE)).unwrap();
            let desc = space.directory().entry(5);
            assert!(desc.is_present());
            assert!(!desc.is_zero_on_demand());
            vmm.switch_to_kernel();
        }
    }

    mod exhaustion {
        use super::*;

        fn tiny_machine() -> Vmm<EmulatedPlatform> {
            // 30 free frames between the kernel tables and the memory top.
            let memory = Arc::new(EmulatedMemory::new(0x0034_0000));
            let mmu = hw::Mmu::new(Arc::clone(&memory));
            let platform =
                EmulatedPlatform::new(memory, phys(harness::FIRST_FREE_FRAME));
            Vmm::setup(
                platform,
                mmu,
                VmmConfig {
                    kernel_directory: phys(harness::KERNEL_DIRECTORY),
                    kernel_tables_base: phys(harness::KERNEL_TABLES_BASE),
                },
            )
            .unwrap()
        }

        #[test]
        fn table_allocation_reports_exhaustion() {
            let mut vmm = tiny_machine();
            let mut result = Ok(());
            for table in 0..40 {
                result = vmm.allocate_table(addr(table * layout::TABLE_COVERAGE));
                if result.is_err() {
                    break;
                }
            }
            assert_eq!(result, Err(VmmError::NoPhysicalSpace));
        }

        #[test]
        #[should_panic(expected = "no physical space")]
        fn demand_loading_without_frames_is_fatal() {
            let mut vmm = tiny_machine();
            // Stays inside the identity table so only page frames are
            // consumed.
            for page in 0..40 {
                vmm.load_page(addr(0x0001_0000 + page * layout::PAGE_SIZE), MapFlags::RWX);
            }
        }

        #[test]
        #[should_panic(expected = "kernel heap exhausted")]
        fn space_creation_without_heap_is_fatal() {
            let mut vmm = tiny_machine();
            for page in 0..30 {
                vmm.load_page(addr(0x0001_0000 + page * layout::PAGE_SIZE), MapFlags::RWX);
            }
            let _ = vmm.new_address_space();
        }
    }
}
