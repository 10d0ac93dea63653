//! `Linker` (SPEC_FULL.md §4.9): the host-side import namespace a module is
//! instantiated against.
//!
//! Owns the `module.name -> Extern` namespace embedders populate before
//! instantiating, since SPEC_FULL.md's instantiation algorithm needs real
//! import resolution (host functions, module-to-module wiring) to run the
//! canonical-ABI and multi-module test scenarios.

use crate::func::Func;
use crate::global::GlobalInstance;
use crate::memory::MemoryInstance;
use crate::module::Module;
use crate::store::Store;
use crate::table::TableInstance;
use crate::instantiate::Instantiator;
use crate::module::ModuleInstance;
use std::collections::HashMap;
use std::sync::Arc;

/// A host-provided or re-exported definition, matched against a module's
/// import list by name during instantiation.
#[derive(Clone)]
pub enum Extern {
    Func(Func),
    Table(Arc<std::sync::Mutex<TableInstance>>),
    Memory(Arc<std::sync::Mutex<MemoryInstance>>),
    Global(Arc<std::sync::Mutex<GlobalInstance>>),
}

#[derive(Default)]
pub struct Linker {
    definitions: HashMap<(String, String), Extern>,
}

impl Linker {
    pub fn define(&mut self, module: &str, name: &str, item: Extern) -> &mut Self {
        self.definitions.insert((module.to_string(), name.to_string()), item);
        self
    }

    pub fn func_wrap<F>(&mut self, module: &str, name: &str, ty: crate::types::WasmFuncType, func: F) -> &mut Self
    where
        F: Fn(&mut Store, &[crate::values::Val]) -> crate::Result<Vec<crate::values::Val>> + Send + Sync + 'static,
    {
        self.define(module, name, Extern::Func(Func::wrap(ty, func)))
    }

    pub(crate) fn get(&self, module: &str, name: &str) -> Option<&Extern> {
        self.definitions.get(&(module.to_string(), name.to_string()))
    }

    /// Instantiates `module` against this linker's definitions, with `extra`
    /// overlaid on top (and taking priority) without mutating `self` --
    /// lets one `Linker` serve as a shared base namespace for several
    /// instantiations that each need a few module-specific imports.
    pub fn instantiate(
        &self,
        store: &mut Store,
        module: &Module,
        extra: &[(&str, &str, Extern)],
    ) -> crate::Result<Arc<ModuleInstance>> {
        if extra.is_empty() {
            return Instantiator::new(self).instantiate(store, module);
        }
        let mut overlay = Linker {
            definitions: self.definitions.clone(),
        };
        for (m, n, item) in extra {
            overlay.define(m, n, item.clone());
        }
        Instantiator::new(&overlay).instantiate(store, module)
    }
}
