//! `TableInstance` (SPEC_FULL.md §4.3): a growable vector of references.
//!
//! Backed by a plain `Vec<Ref>` grown via `resize`, not the reserve-then-commit
//! `Mmap` scheme `MemoryInstance` uses: `Ref` carries real Rust payloads
//! (`Arc<[Val]>` for `Ref::Exn`, and the GC-proposal variants), so treating
//! freshly `mprotect`'d, zero-filled pages as live `Ref` values before they've
//! been written would be unsound the way it isn't for `Memory`'s plain bytes.
//! `grow`/`set`/`fill` reallocating is an acceptable cost here -- tables are
//! orders of magnitude smaller than linear memories in practice, and nothing
//! hands out raw pointers into a table the way `Memory` does.

use crate::trap::Trap;
use crate::types::WasmRefType;
use crate::values::Ref;
use crate::TABLE_MAX;

#[derive(Debug, Clone)]
pub struct TableType {
    pub element_type: WasmRefType,
    pub minimum: u64,
    pub maximum: Option<u64>,
}

#[derive(Debug)]
pub struct TableInstance {
    elements: Vec<Ref>,
    ty: TableType,
}

impl TableInstance {
    pub fn new(ty: TableType) -> Self {
        let initial = usize::try_from(ty.minimum).unwrap_or(usize::MAX).min(TABLE_MAX);
        let elements = vec![Ref::null(&ty.element_type); initial];
        Self { elements, ty }
    }

    pub fn ty(&self) -> &TableType {
        &self.ty
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn get(&self, index: u64) -> Result<&Ref, Trap> {
        let index = usize::try_from(index).map_err(|_| Trap::TableOutOfBounds)?;
        self.elements.get(index).ok_or(Trap::TableOutOfBounds)
    }

    /// Caller (interpreter dispatch) is responsible for checking `val`'s type
    /// is a subtype of the table's declared element type -- validation's
    /// job, asserted rather than enforced here per SPEC_FULL.md §4.3.
    pub fn set(&mut self, index: u64, val: Ref) -> Result<(), Trap> {
        let index = usize::try_from(index).map_err(|_| Trap::TableOutOfBounds)?;
        let slot = self.elements.get_mut(index).ok_or(Trap::TableOutOfBounds)?;
        *slot = val;
        Ok(())
    }

    pub fn fill(&mut self, offset: u64, val: Ref, len: u64) -> Result<(), Trap> {
        let offset = usize::try_from(offset).map_err(|_| Trap::TableOutOfBounds)?;
        let len = usize::try_from(len).map_err(|_| Trap::TableOutOfBounds)?;
        let end = offset.checked_add(len).ok_or(Trap::TableOutOfBounds)?;
        let slice = self.elements.get_mut(offset..end).ok_or(Trap::TableOutOfBounds)?;
        slice.fill(val);
        Ok(())
    }

    pub fn copy_within(&mut self, dst: u64, src: u64, len: u64) -> Result<(), Trap> {
        let dst = usize::try_from(dst).map_err(|_| Trap::TableOutOfBounds)?;
        let src = usize::try_from(src).map_err(|_| Trap::TableOutOfBounds)?;
        let len = usize::try_from(len).map_err(|_| Trap::TableOutOfBounds)?;
        let in_bounds = |start: usize| start.checked_add(len).map(|e| e <= self.elements.len()).unwrap_or(false);
        if !in_bounds(src) || !in_bounds(dst) {
            return Err(Trap::TableOutOfBounds);
        }
        if dst <= src {
            for i in 0..len {
                self.elements[dst + i] = self.elements[src + i].clone();
            }
        } else {
            for i in (0..len).rev() {
                self.elements[dst + i] = self.elements[src + i].clone();
            }
        }
        Ok(())
    }

    pub fn copy_from(&mut self, dst: u64, src_table: &TableInstance, src: u64, len: u64) -> Result<(), Trap> {
        let dst = usize::try_from(dst).map_err(|_| Trap::TableOutOfBounds)?;
        let src = usize::try_from(src).map_err(|_| Trap::TableOutOfBounds)?;
        let len = usize::try_from(len).map_err(|_| Trap::TableOutOfBounds)?;
        let src_slice = src_table
            .elements
            .get(src..src.checked_add(len).ok_or(Trap::TableOutOfBounds)?)
            .ok_or(Trap::TableOutOfBounds)?;
        let dst_slice = self
            .elements
            .get_mut(dst..dst.checked_add(len).ok_or(Trap::TableOutOfBounds)?)
            .ok_or(Trap::TableOutOfBounds)?;
        dst_slice.clone_from_slice(src_slice);
        Ok(())
    }

    pub fn init(&mut self, dst: u64, elem: &[Ref], src_offset: u32, len: u32) -> Result<(), Trap> {
        let dst = usize::try_from(dst).map_err(|_| Trap::TableOutOfBounds)?;
        let src_offset = src_offset as usize;
        let len = len as usize;
        let src_slice = elem
            .get(src_offset..src_offset.checked_add(len).ok_or(Trap::TableOutOfBounds)?)
            .ok_or(Trap::TableOutOfBounds)?;
        let dst_slice = self
            .elements
            .get_mut(dst..dst.checked_add(len).ok_or(Trap::TableOutOfBounds)?)
            .ok_or(Trap::TableOutOfBounds)?;
        dst_slice.clone_from_slice(src_slice);
        Ok(())
    }

    /// `delta` additional slots, newly created ones holding `init`. Returns
    /// the previous size, or `None` if the grow would exceed the declared
    /// maximum or the runtime ceiling.
    pub fn grow(&mut self, delta: u64, init: Ref) -> Option<u64> {
        let old_size = self.elements.len() as u64;
        let new_size = old_size.checked_add(delta)?;
        if let Some(max) = self.ty.maximum {
            if new_size > max {
                return None;
            }
        }
        if new_size > TABLE_MAX as u64 {
            return None;
        }
        self.elements.resize(usize::try_from(new_size).ok()?, init);
        Some(old_size)
    }
}
