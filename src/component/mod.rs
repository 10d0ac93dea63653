//! Component Model support (SPEC_FULL.md §4.10): the canonical ABI bridge
//! between core wasm's numeric value universe and component interface
//! types, plus the `ComponentInstance` that owns the core module instances
//! and adapter closures a component wires together.
//!
//! This crate otherwise has no component layer to build from, so this module
//! is grounded on the Component Model's own canonical-ABI description,
//! following this codebase's own conventions (an `Arc`-shared instance
//! struct, `Mutex`-guarded mutable state, `crate::Result` everywhere).

mod canon;
mod instance;

pub use canon::{lift_function, lower_function, CanonicalOptions, ComponentFunc, ComponentValType, ComponentVal, StringEncoding};
pub use instance::ComponentInstance;
