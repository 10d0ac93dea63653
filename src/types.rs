//! The type universe shared by core modules: value types, the reference-type
//! hierarchy (with its abstract heap types and bottoms), and the composite
//! (func/array/struct) types introduced by the function-references and GC
//! proposals.
//!
//! Concrete composite types are interned per-module into a `TypeTable` keyed
//! by `ModuleInternedTypeIndex`; subtyping between two refs that each carry
//! their own type table (e.g. a GC object escaping to another module, or an
//! imported function's declared type vs. the exporter's) is resolved by
//! `is_subtype`, which takes both tables explicitly rather than assuming a
//! shared registry.

use crate::enum_accessors;
use crate::indices::{ModuleInternedRecGroupIndex, ModuleInternedTypeIndex, TypeIndex};
use cranelift_entity::PrimaryMap;
use hashbrown::HashMap;
use std::fmt;
use std::ops::Range;

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum WasmValType {
    I32,
    I64,
    F32,
    F64,
    V128,
    Ref(WasmRefType),
}

impl fmt::Display for WasmValType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WasmValType::I32 => write!(f, "i32"),
            WasmValType::I64 => write!(f, "i64"),
            WasmValType::F32 => write!(f, "f32"),
            WasmValType::F64 => write!(f, "f64"),
            WasmValType::V128 => write!(f, "v128"),
            WasmValType::Ref(rt) => write!(f, "{rt}"),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct WasmRefType {
    pub nullable: bool,
    pub heap_type: WasmHeapType,
}

impl WasmRefType {
    pub const EXTERNREF: WasmRefType = WasmRefType {
        nullable: true,
        heap_type: WasmHeapType::new(false, WasmHeapTypeInner::Extern),
    };
    pub const FUNCREF: WasmRefType = WasmRefType {
        nullable: true,
        heap_type: WasmHeapType::new(false, WasmHeapTypeInner::Func),
    };
    pub const NOFUNC: WasmRefType = WasmRefType {
        nullable: true,
        heap_type: WasmHeapType::new(false, WasmHeapTypeInner::NoFunc),
    };
    pub const NONE: WasmRefType = WasmRefType {
        nullable: true,
        heap_type: WasmHeapType::new(false, WasmHeapTypeInner::None),
    };
    pub const NOEXTERN: WasmRefType = WasmRefType {
        nullable: true,
        heap_type: WasmHeapType::new(false, WasmHeapTypeInner::NoExtern),
    };

    /// The bottom (bottommost/null) type of the hierarchy `self` belongs to,
    /// per SPEC_FULL.md §3.2: `ref.null func` -> `nofunc`, `ref.null extern`
    /// -> `noextern`, `ref.null any` -> `none`.
    pub fn bottom(&self) -> WasmRefType {
        let top = self.heap_type.top();
        let inner = match top.inner {
            WasmHeapTopTypeInner::Extern => WasmHeapTypeInner::NoExtern,
            WasmHeapTopTypeInner::Any => WasmHeapTypeInner::None,
            WasmHeapTopTypeInner::Func => WasmHeapTypeInner::NoFunc,
            WasmHeapTopTypeInner::Exn => WasmHeapTypeInner::NoExn,
            WasmHeapTopTypeInner::Cont => WasmHeapTypeInner::NoCont,
        };
        WasmRefType {
            nullable: true,
            heap_type: WasmHeapType::new(top.shared, inner),
        }
    }
}

impl fmt::Display for WasmRefType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::FUNCREF => write!(f, "funcref"),
            Self::EXTERNREF => write!(f, "externref"),
            _ => {
                if self.nullable {
                    write!(f, "(ref null {})", self.heap_type)
                } else {
                    write!(f, "(ref {})", self.heap_type)
                }
            }
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct WasmHeapType {
    pub shared: bool,
    pub ty: WasmHeapTypeInner,
}

impl WasmHeapType {
    pub const fn new(shared: bool, ty: WasmHeapTypeInner) -> Self {
        Self { shared, ty }
    }

    pub fn top(&self) -> WasmHeapTopType {
        let inner = match self.ty {
            WasmHeapTypeInner::Extern | WasmHeapTypeInner::NoExtern => WasmHeapTopTypeInner::Extern,
            WasmHeapTypeInner::Func
            | WasmHeapTypeInner::ConcreteFunc(_)
            | WasmHeapTypeInner::NoFunc => WasmHeapTopTypeInner::Func,
            WasmHeapTypeInner::Any
            | WasmHeapTypeInner::Eq
            | WasmHeapTypeInner::I31
            | WasmHeapTypeInner::Array
            | WasmHeapTypeInner::ConcreteArray(_)
            | WasmHeapTypeInner::Struct
            | WasmHeapTypeInner::ConcreteStruct(_)
            | WasmHeapTypeInner::None => WasmHeapTopTypeInner::Any,
            WasmHeapTypeInner::Exn | WasmHeapTypeInner::NoExn => WasmHeapTopTypeInner::Exn,
            WasmHeapTypeInner::Cont | WasmHeapTypeInner::NoCont => WasmHeapTopTypeInner::Cont,
        };
        WasmHeapTopType {
            shared: self.shared,
            inner,
        }
    }

    /// Rank within its hierarchy used to decide structural subtyping among
    /// the abstract (non-concrete) heap types, per SPEC_FULL.md §4.7:
    /// `func <= any` is false (func and any are different top types), but
    /// within the `any` hierarchy: `struct <= eq <= any`, `i31 <= eq`, and
    /// `none` is bottom everywhere it appears.
    fn abstract_rank(&self) -> Option<u8> {
        Some(match self.ty {
            WasmHeapTypeInner::Any => 3,
            WasmHeapTypeInner::Eq => 2,
            WasmHeapTypeInner::Struct | WasmHeapTypeInner::I31 | WasmHeapTypeInner::Array => 1,
            WasmHeapTypeInner::None => 0,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum WasmHeapTypeInner {
    Extern,
    NoExtern,

    Func,
    ConcreteFunc(ModuleInternedTypeIndex),
    NoFunc,

    Any,
    Eq,
    I31,
    Array,
    ConcreteArray(ModuleInternedTypeIndex),
    Struct,
    ConcreteStruct(ModuleInternedTypeIndex),
    None,

    Exn,
    NoExn,

    Cont,
    NoCont,
}

impl fmt::Display for WasmHeapType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.shared {
            write!(f, "shared ")?;
        }
        match &self.ty {
            WasmHeapTypeInner::Extern => write!(f, "extern"),
            WasmHeapTypeInner::NoExtern => write!(f, "noextern"),
            WasmHeapTypeInner::Func => write!(f, "func"),
            WasmHeapTypeInner::ConcreteFunc(i) => write!(f, "func {i:?}"),
            WasmHeapTypeInner::NoFunc => write!(f, "nofunc"),
            WasmHeapTypeInner::Any => write!(f, "any"),
            WasmHeapTypeInner::Eq => write!(f, "eq"),
            WasmHeapTypeInner::I31 => write!(f, "i31"),
            WasmHeapTypeInner::Array => write!(f, "array"),
            WasmHeapTypeInner::ConcreteArray(i) => write!(f, "array {i:?}"),
            WasmHeapTypeInner::Struct => write!(f, "struct"),
            WasmHeapTypeInner::ConcreteStruct(i) => write!(f, "struct {i:?}"),
            WasmHeapTypeInner::None => write!(f, "none"),
            WasmHeapTypeInner::Exn => write!(f, "exn"),
            WasmHeapTypeInner::NoExn => write!(f, "noexn"),
            WasmHeapTypeInner::Cont => write!(f, "cont"),
            WasmHeapTypeInner::NoCont => write!(f, "nocont"),
        }
    }
}

pub struct WasmHeapTopType {
    pub shared: bool,
    pub inner: WasmHeapTopTypeInner,
}

#[derive(PartialEq, Eq)]
pub enum WasmHeapTopTypeInner {
    Extern,
    Any,
    Func,
    Exn,
    Cont,
}

/// A concrete, user-defined Wasm type (function, array, or struct), keyed
/// into a module's `TypeTable` by `ModuleInternedTypeIndex`.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct WasmSubType {
    pub is_final: bool,
    pub supertype: Option<ModuleInternedTypeIndex>,
    pub composite_type: WasmCompositeType,
}

impl WasmSubType {
    #[inline]
    pub fn as_func(&self) -> Option<&WasmFuncType> {
        self.composite_type.as_func()
    }
    #[inline]
    pub fn unwrap_func(&self) -> &WasmFuncType {
        self.composite_type.unwrap_func()
    }
    #[inline]
    pub fn as_array(&self) -> Option<&WasmArrayType> {
        self.composite_type.as_array()
    }
    #[inline]
    pub fn unwrap_array(&self) -> &WasmArrayType {
        self.composite_type.unwrap_array()
    }
    #[inline]
    pub fn as_struct(&self) -> Option<&WasmStructType> {
        self.composite_type.as_struct()
    }
    #[inline]
    pub fn unwrap_struct(&self) -> &WasmStructType {
        self.composite_type.unwrap_struct()
    }
}

impl fmt::Display for WasmSubType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_final && self.supertype.is_none() {
            fmt::Display::fmt(&self.composite_type, f)
        } else {
            write!(f, "(sub")?;
            if self.is_final {
                write!(f, " final")?;
            }
            if let Some(sup) = self.supertype {
                write!(f, " {sup:?}")?;
            }
            write!(f, " {})", self.composite_type)
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct WasmCompositeType {
    pub inner: WasmCompositeTypeInner,
    pub shared: bool,
}

impl WasmCompositeType {
    pub fn new_func(shared: bool, ty: WasmFuncType) -> WasmCompositeType {
        Self {
            shared,
            inner: WasmCompositeTypeInner::Func(ty),
        }
    }
    pub fn new_array(shared: bool, ty: WasmArrayType) -> WasmCompositeType {
        Self {
            shared,
            inner: WasmCompositeTypeInner::Array(ty),
        }
    }
    pub fn new_struct(shared: bool, ty: WasmStructType) -> WasmCompositeType {
        Self {
            shared,
            inner: WasmCompositeTypeInner::Struct(ty),
        }
    }
    #[inline]
    pub fn as_func(&self) -> Option<&WasmFuncType> {
        self.inner.as_func()
    }
    #[inline]
    pub fn unwrap_func(&self) -> &WasmFuncType {
        self.inner.unwrap_func()
    }
    #[inline]
    pub fn as_array(&self) -> Option<&WasmArrayType> {
        self.inner.as_array()
    }
    #[inline]
    pub fn unwrap_array(&self) -> &WasmArrayType {
        self.inner.unwrap_array()
    }
    #[inline]
    pub fn as_struct(&self) -> Option<&WasmStructType> {
        self.inner.as_struct()
    }
    #[inline]
    pub fn unwrap_struct(&self) -> &WasmStructType {
        self.inner.unwrap_struct()
    }
}

impl fmt::Display for WasmCompositeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.shared {
            write!(f, "shared ")?;
        }
        match &self.inner {
            WasmCompositeTypeInner::Func(ty) => fmt::Display::fmt(ty, f),
            WasmCompositeTypeInner::Array(ty) => fmt::Display::fmt(ty, f),
            WasmCompositeTypeInner::Struct(ty) => fmt::Display::fmt(ty, f),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum WasmCompositeTypeInner {
    Func(WasmFuncType),
    Array(WasmArrayType),
    Struct(WasmStructType),
}

impl WasmCompositeTypeInner {
    enum_accessors! {
        c
        (Func(&WasmFuncType) is_func as_func unwrap_func c)
        (Array(&WasmArrayType) is_array as_array unwrap_array c)
        (Struct(&WasmStructType) is_struct as_struct unwrap_struct c)
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct WasmFuncType {
    pub params: Box<[WasmValType]>,
    pub results: Box<[WasmValType]>,
}

impl fmt::Display for WasmFuncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(func")?;
        if !self.params.is_empty() {
            write!(f, " (param")?;
            for p in self.params.iter() {
                write!(f, " {p}")?;
            }
            write!(f, ")")?;
        }
        if !self.results.is_empty() {
            write!(f, " (result")?;
            for r in self.results.iter() {
                write!(f, " {r}")?;
            }
            write!(f, ")")?;
        }
        write!(f, ")")
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct WasmArrayType(pub WasmFieldType);

impl fmt::Display for WasmArrayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(array {})", self.0)
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct WasmStructType {
    pub fields: Box<[WasmFieldType]>,
}

impl fmt::Display for WasmStructType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(struct")?;
        for ty in self.fields.iter() {
            write!(f, " {ty}")?;
        }
        write!(f, ")")
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct WasmFieldType {
    pub mutable: bool,
    pub element_type: WasmStorageType,
}

impl fmt::Display for WasmFieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.mutable {
            write!(f, "(mut {})", self.element_type)
        } else {
            fmt::Display::fmt(&self.element_type, f)
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum WasmStorageType {
    I8,
    I16,
    Val(WasmValType),
}

impl fmt::Display for WasmStorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WasmStorageType::I8 => write!(f, "i8"),
            WasmStorageType::I16 => write!(f, "i16"),
            WasmStorageType::Val(v) => fmt::Display::fmt(v, f),
        }
    }
}

/// Types defined within a single module, interned so that structural
/// equality of concrete type indices can be checked cheaply and recursion
/// groups (GC proposal) can express cycles via index ranges rather than
/// owning pointers.
#[derive(Debug, Default)]
pub struct TypeTable {
    types: PrimaryMap<ModuleInternedTypeIndex, WasmSubType>,
    rec_groups: PrimaryMap<ModuleInternedRecGroupIndex, Range<ModuleInternedTypeIndex>>,
    by_type_index: HashMap<TypeIndex, ModuleInternedTypeIndex>,
}

impl TypeTable {
    pub fn push(&mut self, type_index: TypeIndex, ty: WasmSubType) -> ModuleInternedTypeIndex {
        let interned = self.types.push(ty);
        self.by_type_index.insert(type_index, interned);
        interned
    }

    pub fn push_rec_group(&mut self, range: Range<ModuleInternedTypeIndex>) -> ModuleInternedRecGroupIndex {
        self.rec_groups.push(range)
    }

    pub fn get(&self, index: ModuleInternedTypeIndex) -> &WasmSubType {
        &self.types[index]
    }

    pub fn by_type_index(&self, index: TypeIndex) -> ModuleInternedTypeIndex {
        self.by_type_index[&index]
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Checks that `got` (from `got_table`) is a subtype of `dst` (from
/// `dst_table`), per SPEC_FULL.md §4.7: abstract heap types match per their
/// hierarchy, and concrete type indices match iff the underlying composite
/// types are structurally equal after resolving through each table (cross-
/// module references participate via their own table).
pub fn is_subtype(
    dst_table: &TypeTable,
    dst: &WasmRefType,
    got_table: &TypeTable,
    got: &WasmRefType,
) -> bool {
    if got.nullable && !dst.nullable {
        return false;
    }
    is_heap_subtype(dst_table, &dst.heap_type, got_table, &got.heap_type)
}

fn is_heap_subtype(
    dst_table: &TypeTable,
    dst: &WasmHeapType,
    got_table: &TypeTable,
    got: &WasmHeapType,
) -> bool {
    if dst.shared != got.shared {
        return false;
    }
    if dst.top().inner != got.top().inner {
        return false;
    }

    match (&dst.ty, &got.ty) {
        (a, b) if a == b => true,
        (WasmHeapTypeInner::ConcreteFunc(d), WasmHeapTypeInner::ConcreteFunc(g))
        | (WasmHeapTypeInner::ConcreteArray(d), WasmHeapTypeInner::ConcreteArray(g))
        | (WasmHeapTypeInner::ConcreteStruct(d), WasmHeapTypeInner::ConcreteStruct(g)) => {
            dst_table.get(*d).composite_type == got_table.get(*g).composite_type
        }
        (WasmHeapTypeInner::Func, WasmHeapTypeInner::ConcreteFunc(_))
        | (WasmHeapTypeInner::Array, WasmHeapTypeInner::ConcreteArray(_))
        | (WasmHeapTypeInner::Struct, WasmHeapTypeInner::ConcreteStruct(_)) => true,
        (WasmHeapTypeInner::NoFunc, _) | (WasmHeapTypeInner::None, _) | (WasmHeapTypeInner::NoExtern, _) => {
            // bottom types only match themselves, handled by the `a == b` arm,
            // or are the source of a `got` that must itself be bottom.
            false
        }
        _ => match (dst.abstract_rank(), got.abstract_rank()) {
            (Some(d), Some(g)) => g <= d,
            _ => false,
        },
    }
}

impl fmt::Display for WasmHeapTopTypeInner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WasmHeapTopTypeInner::Extern => write!(f, "extern"),
            WasmHeapTopTypeInner::Any => write!(f, "any"),
            WasmHeapTopTypeInner::Func => write!(f, "func"),
            WasmHeapTopTypeInner::Exn => write!(f, "exn"),
            WasmHeapTopTypeInner::Cont => write!(f, "cont"),
        }
    }
}

impl PartialEq for WasmHeapTopTypeInner {
    fn eq(&self, other: &Self) -> bool {
        core::mem::discriminant(self) == core::mem::discriminant(other)
    }
}
impl Eq for WasmHeapTopTypeInner {}
