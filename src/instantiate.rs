//! `Instantiator` (SPEC_FULL.md §4.9): resolves a module's imports against a
//! `Linker`, allocates its own tables/memories/globals/tags/GC heap, and
//! runs active element/data segment initialization plus the start function,
//! in the eight-step order the core spec's instantiation algorithm defines.
//!
//! Allocation of the instance's own storage is kept as a distinct phase from
//! import resolution and segment initialization, the same separation of
//! concerns a JIT-backed allocator/instantiator split would use, just
//! without a `vmctx` to lay out.

use crate::const_eval::ConstExprEvaluator;
use crate::func::Func;
use crate::gc::GcAllocator;
use crate::global::GlobalInstance;
use crate::linker::{Extern, Linker};
use crate::memory::MemoryInstance;
use crate::module::{EntityType, Module, ModuleInstance, ResolvedFunc};
use crate::store::Store;
use crate::table::TableInstance;
use crate::tag::TagInstance;
use crate::trap::Trap;
use crate::types::is_subtype;
use crate::values::Val;
use crate::waiter::WaiterRegistry;
use std::sync::{Arc, Mutex, Weak};

pub struct Instantiator<'a> {
    linker: &'a Linker,
}

impl<'a> Instantiator<'a> {
    pub fn new(linker: &'a Linker) -> Self {
        Self { linker }
    }

    pub fn instantiate(&self, store: &mut Store, module: &Module) -> crate::Result<Arc<ModuleInstance>> {
        let data = module.data();

        // Step 1: resolve imports, type-checking each against the module's
        // declared import type (SPEC_FULL.md §4.9 step 1/2).
        let mut resolved_funcs: Vec<ResolvedFunc> = Vec::with_capacity(data.func_types.len());
        let mut tables: Vec<Arc<Mutex<TableInstance>>> = Vec::new();
        let mut memories: Vec<Arc<Mutex<MemoryInstance>>> = Vec::new();
        let mut globals: Vec<Arc<Mutex<GlobalInstance>>> = Vec::new();
        let mut tags: Vec<TagInstance> = Vec::new();

        for import in &data.imports {
            let found = self.linker.get(&import.module, &import.name).ok_or_else(|| {
                Trap::UnknownImport {
                    module: import.module.clone(),
                    name: import.name.clone(),
                }
                .at("instantiate.import", 0)
            })?;
            self.check_import_type(&data.types, &import.module, &import.name, &import.ty, found)?;
            match found {
                Extern::Func(f) => resolved_funcs.push(ResolvedFunc::Imported(Arc::new(f.clone()))),
                Extern::Table(t) => tables.push(t.clone()),
                Extern::Memory(m) => memories.push(m.clone()),
                Extern::Global(g) => globals.push(g.clone()),
            }
        }

        // Step 2: allocate this instance's own defined tables/memories
        // (SPEC_FULL.md §4.9 step 3/4), before globals so `global.get` of an
        // already-initialized import is available to later initializers.
        for ty in data.tables.values().skip(tables.len()) {
            tables.push(Arc::new(Mutex::new(TableInstance::new(ty.clone()))));
        }
        for ty in data.memories.values().skip(memories.len()) {
            memories.push(Arc::new(Mutex::new(MemoryInstance::new(*ty)?)));
        }
        for ty in data.tags.values().skip(tags.len()) {
            tags.push(TagInstance::new(*ty));
        }

        // Step 3: defined functions resolve to themselves.
        for (idx, _) in data.func_types.iter().skip(resolved_funcs.len()) {
            resolved_funcs.push(ResolvedFunc::Local(idx));
        }

        // Steps 4/5: evaluate global initializers (in declaration order -- a
        // global's initializer may reference any earlier global; SPEC_FULL.md
        // §4.6's const-expr grammar forbids forward refs) and build
        // element/data instances, applying active segments to their target
        // table/memory and dropping them per SPEC_FULL.md §4.9 step 5/6
        // ("active segments behave as if followed by
        // `elem.drop`/`data.drop`"). Run inside `Arc::new_cyclic` because a
        // const expr's `struct.new`/`array.new_fixed` needs a `Weak` handle
        // to the instance being built -- no strong `Arc` to it exists until
        // construction finishes. `build` is fallible but the closure
        // `Arc::new_cyclic` drives isn't, so a failure is stashed in
        // `init_err` and an empty placeholder instance produced instead;
        // the placeholder is unreferenced and dropped the moment `instantiate`
        // returns the stashed error below.
        let mut init_err = None;
        let instance = Arc::new_cyclic(|weak: &Weak<ModuleInstance>| {
            let mut gc = GcAllocator::new();
            let mut const_eval = ConstExprEvaluator::default();

            let build = || -> crate::Result<(
                Vec<Arc<Mutex<GlobalInstance>>>,
                Vec<Mutex<crate::global::ElementInstance>>,
                Vec<Mutex<crate::data::DataInstance>>,
            )> {
                for (ty, init) in data.globals.values().skip(globals.len()) {
                    let value = match init {
                        Some(expr) => const_eval.eval(expr, &globals, &mut gc, &data.types, weak)?,
                        None => Val::default_for_type(&ty.content_type),
                    };
                    globals.push(Arc::new(Mutex::new(GlobalInstance::new(ty.clone(), value))));
                }

                let mut elements = Vec::with_capacity(data.elements.len());
                for seg in &data.elements {
                    let mut items = seg.items.clone();
                    if let Some((table_idx, offset_expr)) = &seg.active {
                        let offset = const_eval.eval(offset_expr, &globals, &mut gc, &data.types, weak)?.unwrap_i32();
                        let mut table = tables[table_idx.index()].lock().unwrap();
                        table
                            .init(offset as u64, &items, 0, items.len() as u32)
                            .map_err(|t| t.at("elem.init", 0))?;
                        items = Box::new([]);
                    }
                    elements.push(Mutex::new(crate::global::ElementInstance::new(items)));
                }

                let mut datas = Vec::with_capacity(data.datas.len());
                for seg in &data.datas {
                    let mut bytes = seg.bytes.clone();
                    if let Some((mem_idx, offset_expr)) = &seg.active {
                        let offset = const_eval.eval(offset_expr, &globals, &mut gc, &data.types, weak)?.unwrap_i32();
                        let mut mem = memories[mem_idx.index()].lock().unwrap();
                        mem.init(
                            offset as u64,
                            &crate::data::DataInstance::new(bytes.clone()),
                            0,
                            bytes.len() as u32,
                        )
                        .map_err(|t| t.at("data.init", 0))?;
                        bytes = Box::new([]);
                    }
                    datas.push(Mutex::new(crate::data::DataInstance::new(bytes)));
                }

                Ok((globals, elements, datas))
            };

            match build() {
                Ok((globals, elements, datas)) => ModuleInstance {
                    module: module.clone(),
                    memories,
                    tables,
                    globals,
                    tags,
                    elements,
                    datas,
                    gc: Mutex::new(gc),
                    waiters: WaiterRegistry::new(),
                    resolved_funcs,
                },
                Err(e) => {
                    init_err = Some(e);
                    ModuleInstance {
                        module: module.clone(),
                        memories: Vec::new(),
                        tables: Vec::new(),
                        globals: Vec::new(),
                        tags: Vec::new(),
                        elements: Vec::new(),
                        datas: Vec::new(),
                        gc: Mutex::new(GcAllocator::new()),
                        waiters: WaiterRegistry::new(),
                        resolved_funcs: Vec::new(),
                    }
                }
            }
        });

        if let Some(e) = init_err {
            return Err(e);
        }

        // Step 6: invoke the start function, if any (SPEC_FULL.md §4.9 step
        // 7/8), after every other piece of instance state is in place.
        if let Some(start) = data.start {
            let func = Func::resolve(&instance, start);
            func.call(store, &[])?;
        }

        Ok(instance)
    }

    /// Limits subtyping for tables/memories (SPEC_FULL.md §4.9 step 2): the
    /// supplied entity's `minimum` must be at least as large as declared, and
    /// if a `maximum` is declared the supplied entity must also declare one
    /// no larger than it.
    fn limits_match(expected_min: u64, expected_max: Option<u64>, got_min: u64, got_max: Option<u64>) -> bool {
        if got_min < expected_min {
            return false;
        }
        match expected_max {
            Some(expected_max) => matches!(got_max, Some(got_max) if got_max <= expected_max),
            None => true,
        }
    }

    fn check_import_type(
        &self,
        module_types: &crate::types::TypeTable,
        module: &str,
        name: &str,
        expected: &EntityType,
        found: &Extern,
    ) -> crate::Result<()> {
        let mismatch = || -> crate::errors::Error {
            Trap::IncompatibleImportType {
                module: module.to_string(),
                name: name.to_string(),
            }
            .at("instantiate.import", 0)
            .into()
        };
        match (expected, found) {
            (EntityType::Function(expected_idx), Extern::Func(f)) => {
                let expected_ty = module_types.get(*expected_idx).unwrap_func();
                if *expected_ty != f.ty() {
                    return Err(mismatch());
                }
                Ok(())
            }
            (EntityType::Table(expected_ty), Extern::Table(t)) => {
                let got = t.lock().unwrap();
                let got_ty = got.ty();
                if !is_subtype(module_types, &expected_ty.element_type, module_types, &got_ty.element_type)
                    || !Self::limits_match(expected_ty.minimum, expected_ty.maximum, got_ty.minimum, got_ty.maximum)
                {
                    return Err(mismatch());
                }
                Ok(())
            }
            (EntityType::Memory(expected_ty), Extern::Memory(m)) => {
                let got = m.lock().unwrap();
                let got_ty = got.ty();
                if !Self::limits_match(expected_ty.minimum, expected_ty.maximum, got_ty.minimum, got_ty.maximum)
                    || expected_ty.shared != got_ty.shared
                {
                    return Err(mismatch());
                }
                Ok(())
            }
            (EntityType::Global(expected_ty), Extern::Global(g)) => {
                let got = g.lock().unwrap();
                if expected_ty.content_type != got.ty().content_type || expected_ty.mutable != got.ty().mutable {
                    return Err(mismatch());
                }
                Ok(())
            }
            (EntityType::Tag(_), _) => Ok(()),
            _ => Err(mismatch()),
        }
    }
}
