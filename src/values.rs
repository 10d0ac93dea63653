//! `ValueRepr` (SPEC_FULL.md §4.1): the tagged value every operand-stack slot,
//! local, global, and function argument/result carries.
//!
//! The source this crate is modeled on stores scalars in an untagged union
//! and tracks the dynamic type only for diagnostics; here the type tag is
//! folded into the enum discriminant itself; see SPEC_FULL.md §4.1's
//! "Implementation note" for why that's a safe, equivalent representation at
//! interpreter dispatch speeds.

use crate::enum_accessors;
use crate::gc::GcRef;
use crate::indices::FuncIndex;
use crate::types::{WasmHeapTopTypeInner, WasmHeapType, WasmHeapTypeInner, WasmRefType, WasmValType};

/// Any Wasm value: a scalar or a reference.
///
/// Not `Copy`: an `exnref` carries its payload behind an `Arc`, so cloning a
/// caught exception value is cheap but not free. Everywhere else (locals,
/// stack slots, globals) this is still a shallow, single-word-ish clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Val {
    I32(i32),
    I64(i64),
    /// Bit pattern of an f32, so that NaN payloads round-trip exactly.
    F32(u32),
    /// Bit pattern of an f64, so that NaN payloads round-trip exactly.
    F64(u64),
    V128(u128),
    Ref(Ref),
}

impl Val {
    pub fn default_for_type(ty: &WasmValType) -> Self {
        match ty {
            WasmValType::I32 => Val::I32(0),
            WasmValType::I64 => Val::I64(0),
            WasmValType::F32 => Val::F32(0),
            WasmValType::F64 => Val::F64(0),
            WasmValType::V128 => Val::V128(0),
            WasmValType::Ref(rt) => Val::Ref(Ref::null(rt)),
        }
    }

    pub fn ty(&self) -> &'static str {
        match self {
            Val::I32(_) => "i32",
            Val::I64(_) => "i64",
            Val::F32(_) => "f32",
            Val::F64(_) => "f64",
            Val::V128(_) => "v128",
            Val::Ref(_) => "ref",
        }
    }

    enum_accessors! {
        e
        (I32(i32) is_i32 i32 unwrap_i32 *e)
        (I64(i64) is_i64 i64 unwrap_i64 *e)
        (F32(f32) is_f32 f32 unwrap_f32 f32::from_bits(*e))
        (F64(f64) is_f64 f64 unwrap_f64 f64::from_bits(*e))
        (V128(u128) is_v128 v128 unwrap_v128 *e)
        (Ref(Ref) is_ref as_ref unwrap_ref e.clone())
    }
}

impl From<i32> for Val {
    fn from(v: i32) -> Val {
        Val::I32(v)
    }
}
impl From<i64> for Val {
    fn from(v: i64) -> Val {
        Val::I64(v)
    }
}
impl From<f32> for Val {
    fn from(v: f32) -> Val {
        Val::F32(v.to_bits())
    }
}
impl From<f64> for Val {
    fn from(v: f64) -> Val {
        Val::F64(v.to_bits())
    }
}
impl From<Ref> for Val {
    fn from(v: Ref) -> Val {
        Val::Ref(v)
    }
}

/// A reference: either a null of some bottom type, a function index, or a
/// GC/external/i31 payload. Per SPEC_FULL.md §4.1 the address is pointer-sized;
/// here it is an arena index (`GcRef`/`FuncIndex`) rather than a raw pointer,
/// per the arena-indices redesign flag in SPEC_FULL.md §9.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ref {
    Null(WasmRefType),
    Func(FuncIndex),
    Extern(u32),
    /// The low 31 bits of an i31ref's payload (sign-extended on read by
    /// `i31.get_s`/zero-extended by `i31.get_u`).
    I31(i32),
    Struct(GcRef),
    Array(GcRef),
    /// An exception reference thrown by `throw`/`throw_ref`, carrying the tag
    /// index and the (already-popped) payload values.
    Exn(crate::indices::TagIndex, std::sync::Arc<[Val]>),
}

impl Ref {
    pub fn null(ty: &WasmRefType) -> Self {
        Ref::Null(ty.bottom())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Ref::Null(_))
    }

    /// The dynamic heap-type top this reference belongs to; used by
    /// `ref.test`/`ref.cast` and by the null-access trap dispatch (which
    /// trap kind to raise depends on which bottom the null carries).
    pub fn top(&self) -> WasmHeapTopTypeInner {
        match self {
            Ref::Null(rt) => rt.heap_type.top().inner,
            Ref::Func(_) => WasmHeapTopTypeInner::Func,
            Ref::Extern(_) => WasmHeapTopTypeInner::Extern,
            Ref::I31(_) | Ref::Struct(_) | Ref::Array(_) => WasmHeapTopTypeInner::Any,
            Ref::Exn(..) => WasmHeapTopTypeInner::Exn,
        }
    }

    pub fn heap_type(&self) -> WasmHeapType {
        match self {
            Ref::Null(rt) => rt.heap_type.clone(),
            Ref::Func(_) => WasmHeapType::new(false, WasmHeapTypeInner::Func),
            Ref::Extern(_) => WasmHeapType::new(false, WasmHeapTypeInner::Extern),
            Ref::I31(_) => WasmHeapType::new(false, WasmHeapTypeInner::I31),
            Ref::Struct(_) => WasmHeapType::new(false, WasmHeapTypeInner::Struct),
            Ref::Array(_) => WasmHeapType::new(false, WasmHeapTypeInner::Array),
            Ref::Exn(..) => WasmHeapType::new(false, WasmHeapTypeInner::Exn),
        }
    }
}
