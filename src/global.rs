//! `GlobalInstance` (SPEC_FULL.md §3.3): a mutable-or-immutable value cell,
//! initialized from a constant expression at instantiation time.

use crate::types::WasmValType;
use crate::values::Val;

#[derive(Debug, Clone)]
pub struct GlobalType {
    pub content_type: WasmValType,
    pub mutable: bool,
}

#[derive(Debug)]
pub struct GlobalInstance {
    ty: GlobalType,
    value: Val,
}

impl GlobalInstance {
    pub fn new(ty: GlobalType, value: Val) -> Self {
        Self { ty, value }
    }

    pub fn ty(&self) -> &GlobalType {
        &self.ty
    }

    pub fn get(&self) -> &Val {
        &self.value
    }

    /// Caller is responsible for only calling this on a `mutable` global and
    /// for `val`'s type matching `content_type`; both are invariants the
    /// validator establishes, so they are asserted rather than checked here.
    pub fn set(&mut self, val: Val) {
        debug_assert!(self.ty.mutable, "global.set on an immutable global");
        self.value = val;
    }
}

/// `ElementInstance` (SPEC_FULL.md §3.3): a passive element segment's
/// reference array, droppable exactly once via `elem.drop`.
#[derive(Debug, Default)]
pub struct ElementInstance {
    elems: Box<[crate::values::Ref]>,
    dropped: bool,
}

impl ElementInstance {
    pub fn new(elems: Box<[crate::values::Ref]>) -> Self {
        Self { elems, dropped: false }
    }

    pub fn elems(&self) -> &[crate::values::Ref] {
        if self.dropped {
            &[]
        } else {
            &self.elems
        }
    }

    pub fn drop_segment(&mut self) {
        self.dropped = true;
    }
}
