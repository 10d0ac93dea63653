mod ast;
mod component;
mod const_eval;
mod data;
mod errors;
mod func;
mod gc;
mod global;
mod guest_memory;
mod indices;
mod instantiate;
mod interp;
mod linker;
mod memory;
mod module;
mod stack;
mod store;
mod table;
mod tag;
mod trap;
mod types;
mod utils;
mod values;
mod waiter;

pub use component::{CanonicalOptions, ComponentInstance, StringEncoding};
pub use errors::Error;
pub use func::Func;
pub use instantiate::Instantiator;
pub use linker::Linker;
pub use module::{Module, ModuleInstance};
pub use store::{EngineConfig, Store};
pub use trap::Trap;
pub use values::{Ref, Val};

pub type Result<T> = core::result::Result<T, Error>;

/// Namespace corresponding to wasm functions, the index is the index of the
/// defined function that's being referenced.
pub const NS_WASM_FUNC: u32 = 0;

/// Namespace for host-function trampolines. The index is the index of the
/// host import being referenced.
pub const NS_HOST_FUNC: u32 = 1;

/// WebAssembly page sizes are defined to be 64KiB.
pub const WASM_PAGE_SIZE: u32 = 0x1_0000;

/// The number of pages (for 32-bit modules) we can have before we run out of
/// byte index space.
pub const WASM32_MAX_PAGES: u64 = 1 << 16;
/// The number of pages (for 64-bit modules) we can have before we run out of
/// byte index space.
pub const WASM64_MAX_PAGES: u64 = 1 << 48;
/// Maximum size, in bytes, of 32-bit memories (4G)
pub const WASM32_MAX_SIZE: u64 = 1 << 32;

/***************** Settings *******************************************/
/// Relaxed-SIMD opcodes always lower to their deterministic/strict variant.
/// See SPEC_FULL.md §4.6.3 for why this crate fixes that choice rather than
/// leaving it platform-dependent.
pub const RELAXED_SIMD_DETERMINISTIC: bool = true;
/// Size in bytes of the guard region placed after each linear memory's
/// committed pages, so that statically-offset loads/stores don't need an
/// extra bounds check in the common case.
pub const DEFAULT_OFFSET_GUARD_SIZE: u64 = 0x8000_0000;
/// The absolute ceiling on a single memory's size in bytes, regardless of
/// what the module's own declared maximum says. Exists so a module cannot
/// force the host to commit unbounded address space.
pub const MEMORY_MAX: usize = 1 << 32;
/// The absolute ceiling on a single table's element count.
pub const TABLE_MAX: usize = 1 << 20;

pub fn host_page_size() -> usize {
    // SAFETY: `_SC_PAGESIZE` is always a valid `sysconf` argument; the
    // result is always positive on every platform we target.
    unsafe {
        usize::try_from(libc::sysconf(libc::_SC_PAGESIZE)).expect("sysconf returned a negative page size")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    fn instantiate(wat: &str) -> (Store, std::sync::Arc<ModuleInstance>) {
        let wasm = wat::parse_str(wat).unwrap();
        let mut store = Store::new(EngineConfig::default());
        let module = Module::from_binary(&wasm).unwrap();
        let instance = Linker::default().instantiate(&mut store, &module, &[]).unwrap();
        (store, instance)
    }

    #[test_log::test]
    fn add_one_plus_two() {
        let (mut store, instance) = instantiate(
            r#"(module (func (export "go") (result i32) i32.const 1 i32.const 2 i32.add))"#,
        );
        let results = instance
            .get_func(&store, "go")
            .unwrap()
            .call(&mut store, &[])
            .unwrap();
        assert_eq!(results, vec![Val::I32(3)]);
    }

    #[test_log::test]
    fn signed_div_by_zero_traps() {
        let (mut store, instance) = instantiate(
            r#"(module (func (export "go") (result i32) i32.const 1 i32.const 0 i32.div_s))"#,
        );
        let err = instance.get_func(&store, "go").unwrap().call(&mut store, &[]).unwrap_err();
        assert!(matches!(err, Error::Trap(info) if info.trap == Trap::DivideByZero));
    }

    #[test_log::test]
    fn signed_div_overflow_traps() {
        let (mut store, instance) = instantiate(
            r#"(module (func (export "go") (result i32)
                i32.const -2147483648 i32.const -1 i32.div_s))"#,
        );
        let err = instance.get_func(&store, "go").unwrap().call(&mut store, &[]).unwrap_err();
        assert!(matches!(err, Error::Trap(info) if info.trap == Trap::IntegerOverflow));
    }

    #[test_log::test]
    fn memory_bulk_copy() {
        let (mut store, instance) = instantiate(
            r#"(module
                (memory (export "mem") 1)
                (func (export "go") (result i32)
                  i32.const 0 i32.const 65 i32.store8
                  i32.const 100 i32.const 0 i32.const 1 memory.copy
                  i32.const 100 i32.load8_u))"#,
        );
        let results = instance.get_func(&store, "go").unwrap().call(&mut store, &[]).unwrap();
        assert_eq!(results, vec![Val::I32(65)]);
    }

    #[test_log::test]
    fn table_grow_and_size() {
        let (mut store, instance) = instantiate(
            r#"(module
                (table (export "tab") 1 funcref)
                (func (export "go") (result i32)
                  ref.null func i32.const 5 table.grow
                  drop
                  table.size))"#,
        );
        let results = instance.get_func(&store, "go").unwrap().call(&mut store, &[]).unwrap();
        assert_eq!(results, vec![Val::I32(6)]);
    }

    /// SPEC_FULL.md §8 item 5: one thread waits on a shared-memory cell,
    /// another stores past it and notifies; the waiter observes `0 (OK)`
    /// and the notifier observes `1` woken waiter.
    #[test_log::test]
    fn wait_notify_round_trip() {
        let (mut setup_store, instance) = instantiate(
            r#"(module
                (memory (export "mem") 1 1 shared)
                (data (i32.const 0) "\07\00\00\00")
                (func (export "wait") (result i32)
                  i32.const 0 i32.const 7 i64.const -1 memory.atomic.wait32)
                (func (export "notify") (result i32)
                  i32.const 0 i32.const 8 i32.store
                  i32.const 0 i32.const 1 memory.atomic.notify))"#,
        );
        let _ = &mut setup_store;

        let waiter_instance = instance.clone();
        let waiter = std::thread::spawn(move || {
            let mut store = Store::new(EngineConfig::default());
            waiter_instance
                .get_func(&store, "wait")
                .unwrap()
                .call(&mut store, &[])
                .unwrap()
        });

        std::thread::sleep(std::time::Duration::from_millis(10));

        let notifier_instance = instance.clone();
        let notifier = std::thread::spawn(move || {
            let mut store = Store::new(EngineConfig::default());
            notifier_instance
                .get_func(&store, "notify")
                .unwrap()
                .call(&mut store, &[])
                .unwrap()
        });

        assert_eq!(notifier.join().unwrap(), vec![Val::I32(1)]);
        assert_eq!(waiter.join().unwrap(), vec![Val::I32(0)]);
    }
}
