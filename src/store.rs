//! `Store`/`EngineConfig` (SPEC_FULL.md §3.1, §7): engine-wide configuration
//! and the minimal per-store bookkeeping an embedder needs to call into
//! instantiated modules.
//!
//! A JIT-backed runtime would have this own a `vmctx -> instance` lookup for
//! trampolines to recover `self` from a bare `VMContext` pointer; that
//! doesn't apply to a tree-walking interpreter, where every `ModuleInstance`
//! is plain `Arc`-owned Rust data reachable directly from its
//! `Func`/`ModuleInstance` handles. What's kept is the `EngineConfig`/
//! resource-limit pattern and a reusable scratch buffer for marshalling call
//! arguments/results across calls.

use crate::values::Val;

/// Engine-wide tunables (SPEC_FULL.md §4.5's "Resource limits" edge cases).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum number of `Val`s a single call chain's value stack may hold
    /// before a `Trap::CostLimitExceeded`-style resource error is raised.
    pub max_value_stack_depth: usize,
    /// Maximum control-stack depth (nested blocks/loops/ifs/try_tables/calls).
    pub max_control_stack_depth: usize,
    /// Whether relaxed-SIMD opcodes lower to their deterministic variant.
    /// Mirrors `RELAXED_SIMD_DETERMINISTIC`; kept per-engine so embedders can
    /// see the choice reflected back rather than having to know the constant.
    pub relaxed_simd_deterministic: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_value_stack_depth: 1 << 20,
            max_control_stack_depth: 1 << 16,
            relaxed_simd_deterministic: crate::RELAXED_SIMD_DETERMINISTIC,
        }
    }
}

/// The embedder-facing handle threaded through every call. Holds engine
/// configuration and a reusable scratch buffer for marshalling call
/// arguments/results across calls, avoiding a `Vec` allocation per
/// invocation.
#[derive(Default)]
pub struct Store {
    config: EngineConfig,
    scratch: Vec<Val>,
}

impl Store {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            scratch: Vec::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn take_scratch(&mut self) -> Vec<Val> {
        std::mem::take(&mut self.scratch)
    }

    pub(crate) fn return_scratch(&mut self, mut v: Vec<Val>) {
        v.clear();
        self.scratch = v;
    }
}
