//! `GcAllocator` (SPEC_FULL.md §4.4): owns `struct`/`array` heap objects
//! allocated by `struct.new*`/`array.new*` and their field storage.
//!
//! Per the arena-indices redesign flag (SPEC_FULL.md §9), allocation returns a
//! `GcRef` -- an index into a per-module arena -- rather than a raw pointer.
//! `auto_collect` is a stub: observable behavior only needs to match a real
//! collector absent finalizers, and this crate exposes none.

use crate::indices::ModuleInternedTypeIndex;
use crate::module::ModuleInstance;
use crate::values::Val;
use std::sync::{Arc, Weak};

/// Index into a module's `GcAllocator` arena, plus the module instance that
/// arena belongs to. A bare index isn't enough: a struct/array ref can escape
/// its defining module through a shared global, table, or call argument, and
/// whatever module instance is executing when the ref is later read is not
/// necessarily the one that allocated it. GC ops must resolve through `module`
/// here, not whichever instance happens to be current, or they'd index into
/// the wrong arena (or the right arena under the wrong interned type table).
///
/// Holds a `Weak` rather than a strong `Arc<ModuleInstance>`: a global
/// initializer's `struct.new`/`array.new_fixed` runs before the
/// `ModuleInstance` it belongs to exists (it's still being assembled), so no
/// strong handle to it is available yet at the point the very first `GcRef`
/// in that arena is minted. A `Weak` also sidesteps a struct field that
/// points back into its own module's arena keeping that module alive forever
/// through an `Arc` cycle. Resolving a `GcRef` after every strong handle to
/// its defining module has been dropped is a use-after-instance-death bug in
/// the embedder (holding a GC value alive without keeping its originating
/// instance alive), not a case this crate tries to recover from gracefully.
#[derive(Debug, Clone)]
pub struct GcRef {
    module: Weak<ModuleInstance>,
    index: u32,
}

impl GcRef {
    fn index(&self) -> usize {
        self.index as usize
    }

    /// The module instance this reference's backing object was allocated in.
    pub fn module(&self) -> Arc<ModuleInstance> {
        self.module.upgrade().expect("GcRef outlived its defining module instance")
    }
}

impl PartialEq for GcRef {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && Weak::ptr_eq(&self.module, &other.module)
    }
}

impl Eq for GcRef {}

impl std::hash::Hash for GcRef {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.module.as_ptr().hash(state);
    }
}

#[derive(Debug)]
pub struct StructInstance {
    pub ty: ModuleInternedTypeIndex,
    pub fields: Box<[Val]>,
}

#[derive(Debug)]
pub struct ArrayInstance {
    pub ty: ModuleInternedTypeIndex,
    pub elems: Vec<Val>,
}

#[derive(Debug)]
pub enum GcObject {
    Struct(StructInstance),
    Array(ArrayInstance),
}

impl GcObject {
    pub fn ty(&self) -> ModuleInternedTypeIndex {
        match self {
            GcObject::Struct(s) => s.ty,
            GcObject::Array(a) => a.ty,
        }
    }
}

/// Heap of GC objects belonging to one module instance. Freed wholesale when
/// the owning `ModuleInstance` is dropped (SPEC_FULL.md §4.6 edge case on GC
/// object ownership).
#[derive(Debug, Default)]
pub struct GcAllocator {
    objects: Vec<GcObject>,
}

impl GcAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc_struct(&mut self, module: &Weak<ModuleInstance>, ty: ModuleInternedTypeIndex, fields: Box<[Val]>) -> GcRef {
        let idx = self.objects.len();
        self.objects.push(GcObject::Struct(StructInstance { ty, fields }));
        GcRef { module: module.clone(), index: idx as u32 }
    }

    pub fn alloc_array(&mut self, module: &Weak<ModuleInstance>, ty: ModuleInternedTypeIndex, elems: Vec<Val>) -> GcRef {
        let idx = self.objects.len();
        self.objects.push(GcObject::Array(ArrayInstance { ty, elems }));
        GcRef { module: module.clone(), index: idx as u32 }
    }

    pub fn get(&self, r: GcRef) -> &GcObject {
        &self.objects[r.index()]
    }

    pub fn get_mut(&mut self, r: GcRef) -> &mut GcObject {
        &mut self.objects[r.index()]
    }

    pub fn get_struct(&self, r: GcRef) -> &StructInstance {
        match self.get(r) {
            GcObject::Struct(s) => s,
            GcObject::Array(_) => panic!("GcRef does not refer to a struct"),
        }
    }

    pub fn get_struct_mut(&mut self, r: GcRef) -> &mut StructInstance {
        match self.get_mut(r) {
            GcObject::Struct(s) => s,
            GcObject::Array(_) => panic!("GcRef does not refer to a struct"),
        }
    }

    pub fn get_array(&self, r: GcRef) -> &ArrayInstance {
        match self.get(r) {
            GcObject::Array(a) => a,
            GcObject::Struct(_) => panic!("GcRef does not refer to an array"),
        }
    }

    pub fn get_array_mut(&mut self, r: GcRef) -> &mut ArrayInstance {
        match self.get_mut(r) {
            GcObject::Array(a) => a,
            GcObject::Struct(_) => panic!("GcRef does not refer to an array"),
        }
    }

    /// Invoked after a reference field of an object is mutated in place
    /// (e.g. `struct.set`/`array.set` of a reference-typed field). A no-op
    /// here; kept as an explicit call site so a generational collector could
    /// be dropped in without touching callers.
    pub fn write_barrier(&mut self, _obj: GcRef) {}

    /// Stubbed: this crate exposes no finalizers, so a no-op collector is
    /// observationally identical to a real mark-sweep pass.
    pub fn auto_collect(&mut self) {}

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
