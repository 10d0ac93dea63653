//! Reference and GC instruction evaluation (SPEC_FULL.md §4.4/§4.7):
//! null checks and casts over the abstract reference hierarchy, plus
//! `struct`/`array`/`i31` heap object construction and field access.

use crate::gc::{GcAllocator, GcRef};
use crate::indices::ModuleInternedTypeIndex;
use crate::module::ModuleInstance;
use crate::trap::Trap;
use crate::types::{is_subtype, TypeTable, WasmHeapType, WasmRefType, WasmStorageType};
use crate::values::{Ref, Val};
use std::sync::Arc;

pub fn ref_as_non_null(r: Ref) -> Result<Ref, Trap> {
    if r.is_null() {
        Err(null_trap(&r))
    } else {
        Ok(r)
    }
}

fn null_trap(r: &Ref) -> Trap {
    use crate::types::WasmHeapTopTypeInner as T;
    match r.top() {
        T::Func => Trap::AccessNullFunc,
        T::Exn => Trap::AccessNullException,
        T::Any | T::Extern | T::Cont => Trap::AccessNullStruct,
    }
}

/// Builds the `WasmRefType` a runtime `Ref` currently inhabits, for feeding
/// into `is_subtype` from `ref.test`/`ref.cast`/`br_on_cast*`. Concrete
/// struct/array refs report their non-nullable ref type at the dynamic type
/// recorded on the heap object, not the static declared type of the slot
/// they came from -- exactly what `ref.test`'s "matches the dynamic type"
/// semantics needs.
pub fn dynamic_ref_type(r: &Ref, gc: &GcAllocator) -> WasmRefType {
    use crate::types::WasmHeapTypeInner as H;
    let heap_type = match r {
        Ref::Null(rt) => return rt.clone(),
        Ref::Func(_) => WasmHeapType::new(false, H::Func),
        Ref::Extern(_) => WasmHeapType::new(false, H::Extern),
        Ref::I31(_) => WasmHeapType::new(false, H::I31),
        Ref::Struct(r) => WasmHeapType::new(false, H::ConcreteStruct(gc.get_struct(r.clone()).ty)),
        Ref::Array(r) => WasmHeapType::new(false, H::ConcreteArray(gc.get_array(r.clone()).ty)),
        Ref::Exn(..) => WasmHeapType::new(false, H::Exn),
    };
    WasmRefType {
        nullable: false,
        heap_type,
    }
}

/// `dst`/`dst_types` describe the statically-known cast target, interned in
/// the currently executing module's type table; `got_types` must be the type
/// table of the module that actually allocated `r` (`GcRef::module`), not the
/// executing module's -- they can differ once a struct/array ref has crossed
/// a module boundary via a shared global, table, or call argument, and a
/// `ModuleInternedTypeIndex` is only meaningful against the table that
/// interned it.
pub fn ref_test_or_cast(
    r: &Ref,
    nullable: bool,
    dst: &crate::types::WasmHeapType,
    dst_types: &TypeTable,
    got_types: &TypeTable,
    gc: &GcAllocator,
) -> bool {
    if r.is_null() {
        return nullable;
    }
    let dst_rt = WasmRefType {
        nullable,
        heap_type: dst.clone(),
    };
    is_subtype(dst_types, &dst_rt, got_types, &dynamic_ref_type(r, gc))
}

pub fn struct_new(gc: &mut GcAllocator, module: &Arc<ModuleInstance>, ty: ModuleInternedTypeIndex, fields: Vec<Val>) -> Ref {
    Ref::Struct(gc.alloc_struct(&Arc::downgrade(module), ty, fields.into_boxed_slice()))
}

pub fn struct_new_default(gc: &mut GcAllocator, module: &Arc<ModuleInstance>, types: &TypeTable, ty: ModuleInternedTypeIndex) -> Ref {
    let sub = types.get(ty);
    let fields: Box<[Val]> = sub
        .unwrap_struct()
        .fields
        .iter()
        .map(|f| default_for_storage(&f.element_type))
        .collect();
    Ref::Struct(gc.alloc_struct(&Arc::downgrade(module), ty, fields))
}

pub fn struct_get(gc: &GcAllocator, types: &TypeTable, r: GcRef, field: u32, signedness: Option<crate::ast::Signedness>) -> Val {
    let obj = gc.get_struct(r);
    let storage = &types.get(obj.ty).unwrap_struct().fields[field as usize].element_type;
    extend_packed(&obj.fields[field as usize], storage, signedness)
}

pub fn struct_set(gc: &mut GcAllocator, r: GcRef, field: u32, v: Val) {
    gc.get_struct_mut(r).fields[field as usize] = v;
}

pub fn array_new(gc: &mut GcAllocator, module: &Arc<ModuleInstance>, ty: ModuleInternedTypeIndex, init: Val, len: u32) -> Ref {
    Ref::Array(gc.alloc_array(&Arc::downgrade(module), ty, vec![init; len as usize]))
}

pub fn array_new_default(gc: &mut GcAllocator, module: &Arc<ModuleInstance>, types: &TypeTable, ty: ModuleInternedTypeIndex, len: u32) -> Ref {
    let storage = &types.get(ty).unwrap_array().0.element_type;
    let init = default_for_storage(storage);
    Ref::Array(gc.alloc_array(&Arc::downgrade(module), ty, vec![init; len as usize]))
}

pub fn array_new_fixed(gc: &mut GcAllocator, module: &Arc<ModuleInstance>, ty: ModuleInternedTypeIndex, elems: Vec<Val>) -> Ref {
    Ref::Array(gc.alloc_array(&Arc::downgrade(module), ty, elems))
}

pub fn array_get(
    gc: &GcAllocator,
    types: &TypeTable,
    r: GcRef,
    idx: u32,
    signedness: Option<crate::ast::Signedness>,
) -> Result<Val, Trap> {
    let obj = gc.get_array(r);
    let storage = &types.get(obj.ty).unwrap_array().0.element_type;
    let v = obj.elems.get(idx as usize).ok_or(Trap::ArrayOutOfBounds)?;
    Ok(extend_packed(v, storage, signedness))
}

pub fn array_set(gc: &mut GcAllocator, r: GcRef, idx: u32, v: Val) -> Result<(), Trap> {
    let elems = &mut gc.get_array_mut(r).elems;
    let slot = elems.get_mut(idx as usize).ok_or(Trap::ArrayOutOfBounds)?;
    *slot = v;
    Ok(())
}

pub fn array_len(gc: &GcAllocator, r: GcRef) -> u32 {
    gc.get_array(r).elems.len() as u32
}

pub fn array_fill(gc: &mut GcAllocator, r: GcRef, offset: u32, v: Val, len: u32) -> Result<(), Trap> {
    let elems = &mut gc.get_array_mut(r).elems;
    let end = (offset as usize).checked_add(len as usize).ok_or(Trap::ArrayOutOfBounds)?;
    let slice = elems.get_mut(offset as usize..end).ok_or(Trap::ArrayOutOfBounds)?;
    slice.fill(v);
    Ok(())
}

/// `array.copy` when both operands were allocated in the same module, so one
/// locked `GcAllocator` covers both.
pub fn array_copy(gc: &mut GcAllocator, dst: GcRef, dst_off: u32, src: GcRef, src_off: u32, len: u32) -> Result<(), Trap> {
    let src_vals = array_read_range(gc, src, src_off, len)?;
    array_write_range(gc, dst, dst_off, &src_vals)
}

/// Reads a `len`-element range out of an array, for the cross-module
/// `array.copy` path where source and destination live in different module
/// instances and so can't share one locked `GcAllocator`.
pub fn array_read_range(gc: &GcAllocator, r: GcRef, off: u32, len: u32) -> Result<Vec<Val>, Trap> {
    let elems = &gc.get_array(r).elems;
    let end = (off as usize).checked_add(len as usize).ok_or(Trap::ArrayOutOfBounds)?;
    Ok(elems.get(off as usize..end).ok_or(Trap::ArrayOutOfBounds)?.to_vec())
}

pub fn array_write_range(gc: &mut GcAllocator, r: GcRef, off: u32, vals: &[Val]) -> Result<(), Trap> {
    let elems = &mut gc.get_array_mut(r).elems;
    let end = (off as usize).checked_add(vals.len()).ok_or(Trap::ArrayOutOfBounds)?;
    let slice = elems.get_mut(off as usize..end).ok_or(Trap::ArrayOutOfBounds)?;
    slice.clone_from_slice(vals);
    Ok(())
}

/// Struct/array fields declared `i8`/`i16` store a full `Val::I32` slot but
/// read back sign- or zero-extended per the accompanying `signedness`
/// (`None` for a field that isn't packed, where the value is returned as-is).
fn extend_packed(v: &Val, storage: &WasmStorageType, signedness: Option<crate::ast::Signedness>) -> Val {
    let bits = match storage {
        WasmStorageType::I8 => 8,
        WasmStorageType::I16 => 16,
        WasmStorageType::Val(_) => return v.clone(),
    };
    let x = v.unwrap_i32();
    Val::I32(match signedness.expect("packed field access must specify signedness") {
        crate::ast::Signedness::Signed => (x << (32 - bits)) >> (32 - bits),
        crate::ast::Signedness::Unsigned => x & ((1i32 << bits) - 1),
    })
}

fn default_for_storage(ty: &WasmStorageType) -> Val {
    match ty {
        WasmStorageType::I8 | WasmStorageType::I16 => Val::I32(0),
        WasmStorageType::Val(v) => Val::default_for_type(v),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Signedness;
    use crate::indices::TypeIndex;
    use crate::types::{WasmArrayType, WasmCompositeType, WasmFieldType, WasmStructType, WasmSubType, WasmValType};
    use std::sync::Mutex;

    fn dummy_module() -> Arc<ModuleInstance> {
        Arc::new(ModuleInstance {
            module: crate::module::Module::for_test(crate::module::ModuleData {
                types: TypeTable::default(),
                imports: Vec::new(),
                func_types: Default::default(),
                func_bodies: Default::default(),
                num_imported_funcs: 0,
                tables: Default::default(),
                num_imported_tables: 0,
                memories: Default::default(),
                num_imported_memories: 0,
                globals: Default::default(),
                num_imported_globals: 0,
                tags: Default::default(),
                num_imported_tags: 0,
                elements: Vec::new(),
                datas: Vec::new(),
                exports: Vec::new(),
                start: None,
            }),
            memories: Vec::new(),
            tables: Vec::new(),
            globals: Vec::new(),
            tags: Vec::new(),
            elements: Vec::new(),
            datas: Vec::new(),
            gc: Mutex::new(GcAllocator::new()),
            waiters: crate::waiter::WaiterRegistry::new(),
            resolved_funcs: Vec::new(),
        })
    }

    fn i8_field_struct_type(types: &mut TypeTable) -> ModuleInternedTypeIndex {
        types.push(
            TypeIndex::new(0),
            WasmSubType {
                is_final: true,
                supertype: None,
                composite_type: WasmCompositeType::new_struct(
                    false,
                    WasmStructType {
                        fields: Box::new([WasmFieldType {
                            mutable: true,
                            element_type: WasmStorageType::I8,
                        }]),
                    },
                ),
            },
        )
    }

    #[test]
    fn struct_new_get_set_round_trip() {
        let module = dummy_module();
        let mut types = TypeTable::default();
        let ty = i8_field_struct_type(&mut types);

        let mut gc = GcAllocator::new();
        let r = struct_new(&mut gc, &module, ty, vec![Val::I32(5)]);
        let Ref::Struct(s) = r else { panic!("expected a struct ref") };

        assert_eq!(struct_get(&gc, &types, s.clone(), 0, Some(Signedness::Unsigned)), Val::I32(5));

        struct_set(&mut gc, s.clone(), 0, Val::I32(0xff));
        // field is i8-packed: unsigned read zero-extends, signed read sign-extends
        assert_eq!(struct_get(&gc, &types, s.clone(), 0, Some(Signedness::Unsigned)), Val::I32(0xff));
        assert_eq!(struct_get(&gc, &types, s, 0, Some(Signedness::Signed)), Val::I32(-1));
    }

    #[test]
    fn array_new_get_set_and_oob_traps() {
        let module = dummy_module();
        let mut types = TypeTable::default();
        let ty = types.push(
            TypeIndex::new(0),
            WasmSubType {
                is_final: true,
                supertype: None,
                composite_type: WasmCompositeType::new_array(
                    false,
                    WasmArrayType(WasmFieldType {
                        mutable: true,
                        element_type: WasmStorageType::Val(WasmValType::I32),
                    }),
                ),
            },
        );

        let mut gc = GcAllocator::new();
        let r = array_new(&mut gc, &module, ty, Val::I32(0), 3);
        let Ref::Array(a) = r else { panic!("expected an array ref") };

        assert_eq!(array_len(&gc, a.clone()), 3);
        array_set(&mut gc, a.clone(), 1, Val::I32(42)).unwrap();
        assert_eq!(array_get(&gc, &types, a.clone(), 1, None).unwrap(), Val::I32(42));
        assert!(matches!(array_get(&gc, &types, a.clone(), 3, None), Err(Trap::ArrayOutOfBounds)));
        assert!(matches!(array_set(&mut gc, a, 3, Val::I32(0)), Err(Trap::ArrayOutOfBounds)));
    }

    /// `array.copy` with source and destination allocated by two distinct
    /// module instances (and so two distinct `GcAllocator`s): each side must
    /// be read/written through its own allocator rather than one shared lock.
    #[test]
    fn array_copy_across_module_instances() {
        let module_a = dummy_module();
        let module_b = dummy_module();

        let mut types = TypeTable::default();
        let ty = types.push(
            TypeIndex::new(0),
            WasmSubType {
                is_final: true,
                supertype: None,
                composite_type: WasmCompositeType::new_array(
                    false,
                    WasmArrayType(WasmFieldType {
                        mutable: true,
                        element_type: WasmStorageType::Val(WasmValType::I32),
                    }),
                ),
            },
        );

        let mut gc_a = GcAllocator::new();
        let src = array_new_fixed(&mut gc_a, &module_a, ty, vec![Val::I32(1), Val::I32(2), Val::I32(3)]);
        let Ref::Array(src) = src else { panic!("expected an array ref") };

        let mut gc_b = GcAllocator::new();
        let dst = array_new(&mut gc_b, &module_b, ty, Val::I32(0), 3);
        let Ref::Array(dst) = dst else { panic!("expected an array ref") };

        let copied = array_read_range(&gc_a, src, 0, 3).unwrap();
        array_write_range(&mut gc_b, dst.clone(), 0, &copied).unwrap();

        assert_eq!(array_get(&gc_b, &types, dst, 2, None).unwrap(), Val::I32(3));
    }
}
