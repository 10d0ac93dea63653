use crate::guest_memory::usize_is_multiple_of_host_page_size;
use std::ops::Range;
use std::ptr::NonNull;
use std::{ptr, slice};
use rustix::mm::MprotectFlags;

/// A raw virtual-memory mapping, reserved up front and incrementally made
/// accessible page-by-page. This is the mechanism behind `MemoryInstance`'s
/// promise that `grow` never moves or invalidates previously handed-out
/// pointers (SPEC_FULL.md §4.2): the reservation is made once with `PROT_NONE`,
/// and `make_accessible` only ever `mprotect`s additional pages within it.
#[derive(Debug)]
pub struct Mmap {
    memory: NonNull<[u8]>,
}

// SAFETY: `Mmap` owns its mapping exclusively; sharing a `&Mmap` across
// threads is sound because all mutation goes through `&mut self` methods.
unsafe impl Send for Mmap {}
unsafe impl Sync for Mmap {}

impl Mmap {
    pub fn new_empty() -> Self {
        Self {
            memory: NonNull::from(&mut [] as &mut [u8]),
        }
    }

    /// Maps `size` bytes, all immediately accessible.
    pub fn new(size: usize) -> crate::Result<Self> {
        if size == 0 {
            return Ok(Self::new_empty());
        }
        assert!(usize_is_multiple_of_host_page_size(size));
        let ptr = unsafe {
            rustix::mm::mmap_anonymous(
                ptr::null_mut(),
                size,
                rustix::mm::ProtFlags::READ | rustix::mm::ProtFlags::WRITE,
                rustix::mm::MapFlags::PRIVATE,
            )
            .map_err(|_| crate::errors::Error::ResourceLimitExceeded("mmap failed".into()))?
        };
        let memory = unsafe { slice::from_raw_parts_mut(ptr.cast(), size) };
        let memory = NonNull::new(memory).unwrap();
        Ok(Mmap { memory })
    }

    /// Reserves `size` bytes of address space with no access permissions;
    /// callers make ranges accessible incrementally via `make_accessible`.
    pub fn with_reserve(size: usize) -> crate::Result<Self> {
        if size == 0 {
            return Ok(Self::new_empty());
        }
        assert!(usize_is_multiple_of_host_page_size(size));
        let ptr = unsafe {
            rustix::mm::mmap_anonymous(
                ptr::null_mut(),
                size,
                rustix::mm::ProtFlags::empty(),
                rustix::mm::MapFlags::PRIVATE,
            )
            .map_err(|_| crate::errors::Error::ResourceLimitExceeded("mmap reservation failed".into()))?
        };

        let memory = unsafe { slice::from_raw_parts_mut(ptr.cast(), size) };
        let memory = NonNull::new(memory).unwrap();
        Ok(Mmap { memory })
    }

    #[inline]
    pub unsafe fn slice(&self, range: Range<usize>) -> &[u8] {
        assert!(range.start <= range.end);
        assert!(range.end <= self.len());
        slice::from_raw_parts(self.as_ptr().add(range.start), range.end - range.start)
    }

    #[inline]
    pub unsafe fn slice_mut(&mut self, range: Range<usize>) -> &mut [u8] {
        assert!(range.start <= range.end);
        assert!(range.end <= self.len());
        slice::from_raw_parts_mut(self.as_mut_ptr().add(range.start), range.end - range.start)
    }

    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.memory.as_ptr().cast()
    }

    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.memory.as_ptr().cast()
    }

    #[inline]
    pub fn len(&self) -> usize {
        // SAFETY: `memory` always points at a valid (possibly zero-length)
        // slice allocated by `new`/`with_reserve`/`new_empty`.
        unsafe { (*self.memory.as_ptr()).len() }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Makes `[start, start+len)` readable and writable. `start` and `len`
    /// must already be page-aligned multiples; callers (`MemoryInstance::grow`)
    /// are responsible for rounding up first.
    pub fn make_accessible(&mut self, start: usize, len: usize) -> crate::Result<()> {
        if len == 0 {
            return Ok(());
        }
        let ptr = self.memory.as_ptr().cast::<u8>();
        unsafe {
            rustix::mm::mprotect(
                ptr.byte_add(start).cast(),
                len,
                MprotectFlags::READ | MprotectFlags::WRITE,
            )
            .map_err(|_| crate::errors::Error::ResourceLimitExceeded("mprotect failed".into()))?;
        }

        Ok(())
    }
}

impl Drop for Mmap {
    fn drop(&mut self) {
        if self.is_empty() {
            return;
        }
        unsafe {
            let ptr = self.memory.as_ptr().cast();
            let len = self.len();
            rustix::mm::munmap(ptr, len).expect("munmap failed");
        }
    }
}
