//! `Func` (SPEC_FULL.md §3.3, §4.6): a callable value, either a wasm-defined
//! function dispatched through the interpreter or a host callable wired in
//! by a `Linker`.
//!
//! There is no native calling convention here, so `call` hands the callee's
//! body straight to `interp::run_function` (for a wasm function) or invokes
//! the stored closure directly (for a host function), behind the same
//! two-step `call`/`call_unchecked` split and params/results arity check a
//! JIT-backed runtime would use ahead of a native trampoline.

use crate::indices::FuncIndex;
use crate::module::{ModuleInstance, ResolvedFunc};
use crate::store::Store;
use crate::types::WasmFuncType;
use crate::values::Val;
use std::fmt;
use std::sync::Arc;

type HostFn = dyn Fn(&mut Store, &[Val]) -> crate::Result<Vec<Val>> + Send + Sync;

#[derive(Clone)]
pub enum Func {
    Wasm {
        instance: Arc<ModuleInstance>,
        index: FuncIndex,
    },
    Host {
        ty: WasmFuncType,
        func: Arc<HostFn>,
    },
}

impl fmt::Debug for Func {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Func::Wasm { index, .. } => f.debug_struct("Func::Wasm").field("index", index).finish(),
            Func::Host { ty, .. } => f.debug_struct("Func::Host").field("ty", ty).finish(),
        }
    }
}

impl Func {
    pub fn wrap<F>(ty: WasmFuncType, func: F) -> Func
    where
        F: Fn(&mut Store, &[Val]) -> crate::Result<Vec<Val>> + Send + Sync + 'static,
    {
        Func::Host {
            ty,
            func: Arc::new(func),
        }
    }

    pub(crate) fn from_module(
        _store: &Store,
        instance: Arc<ModuleInstance>,
        index: FuncIndex,
    ) -> crate::Result<Func> {
        Ok(Func::Wasm { instance, index })
    }

    pub fn ty(&self) -> WasmFuncType {
        match self {
            Func::Wasm { instance, index } => {
                let type_idx = instance.module.data().func_types[*index];
                instance.type_table().get(type_idx).unwrap_func().clone()
            }
            Func::Host { ty, .. } => ty.clone(),
        }
    }

    pub fn call(&self, store: &mut Store, params: &[Val]) -> crate::Result<Vec<Val>> {
        let ty = self.ty();
        if params.len() != ty.params.len() {
            return Err(crate::wasm_unsupported!(
                "call arity mismatch: expected {} params, got {}",
                ty.params.len(),
                params.len()
            ));
        }
        self.call_unchecked(store, params)
    }

    fn call_unchecked(&self, store: &mut Store, params: &[Val]) -> crate::Result<Vec<Val>> {
        match self {
            Func::Wasm { instance, index } => crate::interp::call_exported(store, instance, *index, params),
            Func::Host { func, .. } => func(store, params),
        }
    }

    /// The defined-function slot this resolves to, following `ResolvedFunc`
    /// chains through re-exported imports until a wasm body or host callable
    /// is reached; used by `call_indirect`/`call_ref` to invoke a table
    /// element without knowing in advance whether it is local or imported.
    pub(crate) fn resolve(instance: &Arc<ModuleInstance>, index: FuncIndex) -> Func {
        match &instance.resolved_funcs[index.index()] {
            ResolvedFunc::Local(idx) => Func::Wasm {
                instance: instance.clone(),
                index: *idx,
            },
            ResolvedFunc::Imported(f) => (**f).clone(),
        }
    }
}
