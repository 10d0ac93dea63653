//! `DataInstance` (SPEC_FULL.md §3.3): a passive data segment's bytes,
//! droppable exactly once via `data.drop`.

#[derive(Debug, Default)]
pub struct DataInstance {
    bytes: Box<[u8]>,
    /// Set by `data.drop`; a dropped segment reads as empty rather than
    /// freeing the allocation, matching the core spec's "subsequent
    /// `memory.init` from this segment copies zero bytes, trapping only if
    /// asked to copy bytes past a zero-length view" semantics.
    dropped: bool,
}

impl DataInstance {
    pub fn new(bytes: Box<[u8]>) -> Self {
        Self { bytes, dropped: false }
    }

    pub fn read(&self, offset: u32, len: u32) -> Option<&[u8]> {
        if self.dropped {
            return if len == 0 { Some(&[]) } else { None };
        }
        let start = usize::try_from(offset).ok()?;
        let len = usize::try_from(len).ok()?;
        let end = start.checked_add(len)?;
        self.bytes.get(start..end)
    }

    pub fn drop_segment(&mut self) {
        self.dropped = true;
    }

    pub fn len(&self) -> usize {
        if self.dropped {
            0
        } else {
            self.bytes.len()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
