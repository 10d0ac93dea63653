//! `MemoryInstance` (SPEC_FULL.md §4.2): linear memory, bounds-checked
//! load/store, bulk `fill`/`copy`/`init`, and the raw pointer view atomics
//! build on.
//!
//! A reserve-then-commit mmap backs the linear memory: the reservation is
//! made once (bounded by `MEMORY_MAX` plus a guard region) and `grow` only
//! ever `mprotect`s more of it, so a raw pointer handed out before a `grow`
//! stays valid after -- this is what lets a shared memory's waiters observe
//! a consistent view across threads.

use crate::data::DataInstance;
use crate::errors::Error;
use crate::guest_memory::{round_usize_up_to_host_pages, Mmap};
use crate::trap::Trap;
use crate::{DEFAULT_OFFSET_GUARD_SIZE, MEMORY_MAX, WASM_PAGE_SIZE};

#[derive(Debug, Clone, Copy)]
pub struct MemoryType {
    pub minimum: u64,
    pub maximum: Option<u64>,
    pub shared: bool,
    /// `true` for `i64`-addressed (memory64) memories.
    pub memory64: bool,
}

#[derive(Debug)]
pub struct MemoryInstance {
    mmap: Mmap,
    len: usize,
    maximum_bytes: Option<usize>,
    ty: MemoryType,
}

impl MemoryInstance {
    pub fn new(ty: MemoryType) -> crate::Result<Self> {
        let page_size = u64::from(WASM_PAGE_SIZE);
        let minimum_bytes = usize::try_from(ty.minimum.saturating_mul(page_size)).map_err(|_| Error::SizeOverflow)?;
        let maximum_bytes = ty
            .maximum
            .map(|m| usize::try_from(m.saturating_mul(page_size)).map_err(|_| Error::SizeOverflow))
            .transpose()?;

        let guard_bytes = round_usize_up_to_host_pages(usize::try_from(DEFAULT_OFFSET_GUARD_SIZE).unwrap());
        let reservation = maximum_bytes.unwrap_or(MEMORY_MAX).min(MEMORY_MAX);
        let request_bytes = round_usize_up_to_host_pages(reservation)
            .checked_add(guard_bytes)
            .ok_or(Error::SizeOverflow)?;

        let mut mmap = Mmap::with_reserve(request_bytes)?;
        if minimum_bytes > 0 {
            mmap.make_accessible(0, round_usize_up_to_host_pages(minimum_bytes))?;
        }

        Ok(Self {
            mmap,
            len: minimum_bytes,
            maximum_bytes,
            ty,
        })
    }

    pub fn ty(&self) -> MemoryType {
        self.ty
    }

    pub fn byte_size(&self) -> usize {
        self.len
    }

    pub fn page_count(&self) -> u64 {
        self.len as u64 / u64::from(WASM_PAGE_SIZE)
    }

    pub fn as_slice(&self) -> &[u8] {
        unsafe { self.mmap.slice(0..self.len) }
    }

    pub fn as_slice_mut(&mut self) -> &mut [u8] {
        unsafe { self.mmap.slice_mut(0..self.len) }
    }

    /// Raw, unchecked pointer to `addr`; callers (atomic primitives) must
    /// have already range-checked.
    pub unsafe fn get_pointer(&mut self, addr: usize) -> *mut u8 {
        unsafe { self.mmap.as_mut_ptr().add(addr) }
    }

    /// `delta_pages` additional 64 KiB pages. Returns the previous page
    /// count, or `None` if the grow would exceed the declared maximum or the
    /// runtime ceiling; existing bytes are always preserved (the mapping is
    /// never moved).
    pub fn grow(&mut self, delta_pages: u64) -> Option<u64> {
        let old_pages = self.page_count();
        let new_pages = old_pages.checked_add(delta_pages)?;
        if let Some(max) = self.ty.maximum {
            if new_pages > max {
                return None;
            }
        }
        let new_len = usize::try_from(new_pages.checked_mul(u64::from(WASM_PAGE_SIZE))?).ok()?;
        if let Some(max_bytes) = self.maximum_bytes {
            if new_len > max_bytes {
                return None;
            }
        }
        if new_len > MEMORY_MAX {
            return None;
        }

        let old_accessible = round_usize_up_to_host_pages(self.len);
        let new_accessible = round_usize_up_to_host_pages(new_len);
        if new_accessible > old_accessible {
            self.mmap
                .make_accessible(old_accessible, new_accessible - old_accessible)
                .ok()?;
        }
        self.len = new_len;
        Some(old_pages)
    }

    /// Dispatch-site-agnostic bounds check: returns a bare `Trap` so the
    /// interpreter loop can attach its own opcode/offset context via
    /// `Trap::at`.
    fn bounds_check(&self, addr: u64, len: u64) -> Result<usize, Trap> {
        let end = addr.checked_add(len).ok_or(Trap::MemoryOutOfBounds)?;
        if end > self.len as u64 {
            return Err(Trap::MemoryOutOfBounds);
        }
        Ok(addr as usize)
    }

    pub fn load(&self, addr: u64, len: u32) -> Result<&[u8], Trap> {
        let start = self.bounds_check(addr, u64::from(len))?;
        Ok(&self.as_slice()[start..start + len as usize])
    }

    pub fn store(&mut self, addr: u64, bytes: &[u8]) -> Result<(), Trap> {
        let start = self.bounds_check(addr, bytes.len() as u64)?;
        self.as_slice_mut()[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    pub fn fill(&mut self, offset: u64, val: u8, len: u64) -> Result<(), Trap> {
        let start = self.bounds_check(offset, len)?;
        self.as_slice_mut()[start..start + len as usize].fill(val);
        Ok(())
    }

    /// Copies within this memory (`memory.copy` with identical src/dst
    /// memory), correct on overlap.
    pub fn copy_within(&mut self, dst: u64, src: u64, len: u64) -> Result<(), Trap> {
        let dst_start = self.bounds_check(dst, len)?;
        let src_start = self.bounds_check(src, len)?;
        self.as_slice_mut().copy_within(src_start..src_start + len as usize, dst_start);
        Ok(())
    }

    pub fn copy_from(&mut self, dst: u64, src_mem: &MemoryInstance, src: u64, len: u64) -> Result<(), Trap> {
        let dst_start = self.bounds_check(dst, len)?;
        let src_bytes = src_mem.load(src, len as u32)?.to_vec();
        self.as_slice_mut()[dst_start..dst_start + len as usize].copy_from_slice(&src_bytes);
        Ok(())
    }

    pub fn init(&mut self, dst: u64, data: &DataInstance, src_offset: u32, len: u32) -> Result<(), Trap> {
        let dst_start = self.bounds_check(dst, u64::from(len))?;
        let src_bytes = data.read(src_offset, len).ok_or(Trap::DataSegDoesNotFit)?;
        self.as_slice_mut()[dst_start..dst_start + len as usize].copy_from_slice(src_bytes);
        Ok(())
    }
}
