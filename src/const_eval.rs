//! Constant-expression evaluation (SPEC_FULL.md §4.6): the restricted
//! instruction subset legal in global initializers, element segment offsets,
//! and data segment offsets.
//!
//! A tiny operand-stack machine kept separate from the main dispatch loop,
//! operating directly on this crate's `Val`, extended with the reference-
//! and GC-producing opcodes (`ref.func`, `ref.null`, `ref.i31`, `struct.new`,
//! `array.new_fixed`) the function-references and GC proposals add to the
//! constant-expression grammar.

use crate::ast::{ConstExpr, ConstOp};
use crate::gc::GcAllocator;
use crate::global::GlobalInstance;
use crate::module::ModuleInstance;
use crate::types::TypeTable;
use crate::values::{Ref, Val};
use smallvec::SmallVec;
use std::sync::{Arc, Mutex, Weak};

#[derive(Debug, Default)]
pub struct ConstExprEvaluator {
    stack: SmallVec<[Val; 4]>,
}

impl ConstExprEvaluator {
    /// `globals` are the module's globals defined strictly before the one
    /// being initialized (forward references are not legal in a const expr);
    /// `gc`/`types` back `struct.new`/`array.new_fixed`. `module` is the
    /// instance under construction -- not yet a strong `Arc` at this point,
    /// since this runs while that very instance is still being assembled.
    pub fn eval(
        &mut self,
        expr: &ConstExpr,
        globals: &[Arc<Mutex<GlobalInstance>>],
        gc: &mut GcAllocator,
        types: &TypeTable,
        module: &Weak<ModuleInstance>,
    ) -> crate::Result<Val> {
        for op in expr.ops() {
            match op {
                ConstOp::I32Const(v) => self.push(Val::I32(*v)),
                ConstOp::I64Const(v) => self.push(Val::I64(*v)),
                ConstOp::F32Const(v) => self.push(Val::F32(*v)),
                ConstOp::F64Const(v) => self.push(Val::F64(*v)),
                ConstOp::V128Const(bytes) => self.push(Val::V128(u128::from_le_bytes(*bytes))),
                ConstOp::GlobalGet(idx) => {
                    let g = globals[idx.index()].lock().unwrap();
                    self.push(g.get().clone());
                }
                ConstOp::RefNull(ty) => self.push(Val::Ref(Ref::null(&crate::types::WasmRefType {
                    nullable: true,
                    heap_type: ty.clone(),
                }))),
                ConstOp::RefFunc(idx) => self.push(Val::Ref(Ref::Func(*idx))),
                ConstOp::RefI31 => {
                    let v = self.pop().unwrap_i32();
                    self.push(Val::Ref(Ref::I31(v & 0x7fff_ffff)));
                }
                ConstOp::I32Add => self.binop_i32(i32::wrapping_add),
                ConstOp::I32Sub => self.binop_i32(i32::wrapping_sub),
                ConstOp::I32Mul => self.binop_i32(i32::wrapping_mul),
                ConstOp::I64Add => self.binop_i64(i64::wrapping_add),
                ConstOp::I64Sub => self.binop_i64(i64::wrapping_sub),
                ConstOp::I64Mul => self.binop_i64(i64::wrapping_mul),
                ConstOp::StructNew(ty_idx) => {
                    let sub_ty = types.get(*ty_idx);
                    let field_count = sub_ty.unwrap_struct().fields.len();
                    let fields = self.pop_n(field_count);
                    let r = gc.alloc_struct(module, *ty_idx, fields.into_boxed_slice());
                    self.push(Val::Ref(Ref::Struct(r)));
                }
                ConstOp::StructNewDefault(ty_idx) => {
                    let sub_ty = types.get(*ty_idx);
                    let fields: Box<[Val]> = sub_ty
                        .unwrap_struct()
                        .fields
                        .iter()
                        .map(|f| default_for_storage(&f.element_type))
                        .collect();
                    let r = gc.alloc_struct(module, *ty_idx, fields);
                    self.push(Val::Ref(Ref::Struct(r)));
                }
                ConstOp::ArrayNewFixed(ty_idx, len) => {
                    let elems = self.pop_n(*len as usize);
                    let r = gc.alloc_array(module, *ty_idx, elems);
                    self.push(Val::Ref(Ref::Array(r)));
                }
            }
        }

        assert_eq!(self.stack.len(), 1, "constant expression must leave exactly one value");
        Ok(self.stack.pop().expect("empty stack"))
    }

    fn push(&mut self, val: Val) {
        self.stack.push(val);
    }

    fn pop(&mut self) -> Val {
        self.stack.pop().expect("constant expression stack underflow")
    }

    fn pop_n(&mut self, n: usize) -> Vec<Val> {
        let start = self.stack.len() - n;
        self.stack.drain(start..).collect()
    }

    fn binop_i32(&mut self, f: impl Fn(i32, i32) -> i32) {
        let b = self.pop().unwrap_i32();
        let a = self.pop().unwrap_i32();
        self.push(Val::I32(f(a, b)));
    }

    fn binop_i64(&mut self, f: impl Fn(i64, i64) -> i64) {
        let b = self.pop().unwrap_i64();
        let a = self.pop().unwrap_i64();
        self.push(Val::I64(f(a, b)));
    }
}

fn default_for_storage(ty: &crate::types::WasmStorageType) -> Val {
    match ty {
        crate::types::WasmStorageType::I8 | crate::types::WasmStorageType::I16 => Val::I32(0),
        crate::types::WasmStorageType::Val(v) => Val::default_for_type(v),
    }
}
