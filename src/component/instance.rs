//! `ComponentInstance` (SPEC_FULL.md §3.3, §5): owns the core module
//! instances and subcomponent instances a component wires together, plus the
//! adapter closures canonical lifting/lowering produced for its exports, and
//! the host-owned resource table the resource proposal's `own`/`borrow`
//! handles are backed by (SPEC_FULL.md §9's decision).
//!
//! Full component-graph instantiation (resolving `instance`/`alias`/`canon`
//! sections against a linker) is a distinct, much larger concern than the
//! canonical ABI bridge this crate's core scopes; `instantiate` reports that
//! gap explicitly with `ComponentNotImplInstantiate` rather than silently
//! only handling a subset, matching the aggregate-deferral allowance this
//! spec permits for out-of-scope component-graph features.

use crate::component::canon::ComponentFunc;
use crate::module::ModuleInstance;
use crate::trap::Trap;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub enum ComponentExport {
    Func(Arc<ComponentFunc>),
    Module(Arc<ModuleInstance>),
    Instance(Arc<ComponentInstance>),
}

/// A component's runtime state: the core/component instances it owns, its
/// export table, and its resource handle table.
///
/// Resource handles (`own`/`borrow`) are represented as slots in a flat
/// table rather than typed wrapper objects -- the minimal mechanism the
/// resource proposal requires without a destructor calling convention, which
/// this spec leaves unspecified (SPEC_FULL.md §9).
pub struct ComponentInstance {
    module_instances: Vec<Arc<ModuleInstance>>,
    sub_instances: Vec<Arc<ComponentInstance>>,
    exports: HashMap<String, ComponentExport>,
    resources: Mutex<Vec<Option<u32>>>,
}

impl ComponentInstance {
    /// Full component-graph instantiation is out of scope for this core;
    /// every call reports the gap rather than attempting a partial subset.
    pub fn instantiate() -> crate::Result<Arc<ComponentInstance>> {
        Err(Trap::ComponentNotImplInstantiate.at("component.instantiate", 0).into())
    }

    pub fn module_instances(&self) -> &[Arc<ModuleInstance>] {
        &self.module_instances
    }

    pub fn sub_instances(&self) -> &[Arc<ComponentInstance>] {
        &self.sub_instances
    }

    pub fn get_export(&self, name: &str) -> Option<&ComponentExport> {
        self.exports.get(name)
    }

    /// `resource.new`: allocates a handle slot carrying the opaque
    /// representation value `rep` (typically a core pointer or index),
    /// returning the handle.
    pub fn resource_new(&self, rep: u32) -> u32 {
        let mut resources = self.resources.lock().unwrap();
        resources.push(Some(rep));
        (resources.len() - 1) as u32
    }

    /// `resource.rep`: reads back the representation value behind `handle`.
    pub fn resource_rep(&self, handle: u32) -> crate::Result<u32> {
        let resources = self.resources.lock().unwrap();
        resources
            .get(handle as usize)
            .and_then(|s| *s)
            .ok_or_else(|| Trap::InvalidCanonOption.at("resource.rep", 0).into())
    }

    /// `resource.drop`: clears the slot. No destructor calling convention is
    /// specified by this spec, so dropping an owned handle never invokes
    /// one -- a documented gap, not a silent one.
    pub fn resource_drop(&self, handle: u32) -> crate::Result<()> {
        let mut resources = self.resources.lock().unwrap();
        let slot = resources
            .get_mut(handle as usize)
            .ok_or_else(|| Trap::InvalidCanonOption.at("resource.drop", 0))?;
        *slot = None;
        Ok(())
    }
}

impl Default for ComponentInstance {
    fn default() -> Self {
        Self {
            module_instances: Vec::new(),
            sub_instances: Vec::new(),
            exports: HashMap::new(),
            resources: Mutex::new(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_table_round_trip() {
        let instance = ComponentInstance::default();
        let handle = instance.resource_new(42);
        assert_eq!(instance.resource_rep(handle).unwrap(), 42);
        instance.resource_drop(handle).unwrap();
        assert!(instance.resource_rep(handle).is_err());
    }

    #[test]
    fn resource_rep_rejects_unknown_handle() {
        let instance = ComponentInstance::default();
        assert!(instance.resource_rep(0).is_err());
    }
}
