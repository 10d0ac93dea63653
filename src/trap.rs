use std::fmt;

/// One enumerator per condition the dispatcher can raise. Every variant here
/// corresponds to an entry in the error taxonomy the core is required to
/// surface; the `Display` impl is what the diagnostic sink prints alongside
/// the opcode and byte offset that triggered it (see `TrapInfo`).
#[derive(onlyerror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trap {
    #[error("unreachable code executed")]
    Unreachable,
    #[error("integer divide by zero")]
    DivideByZero,
    #[error("integer overflow")]
    IntegerOverflow,
    #[error("invalid conversion to integer")]
    InvalidConvToInt,

    #[error("out of bounds memory access")]
    MemoryOutOfBounds,
    #[error("out of bounds table access")]
    TableOutOfBounds,
    #[error("out of bounds array access")]
    ArrayOutOfBounds,

    #[error("unaligned atomic operation")]
    UnalignedAtomicAccess,
    #[error("expected shared memory for atomic wait")]
    ExpectSharedMemory,

    #[error("accessed null function reference")]
    AccessNullFunc,
    #[error("accessed null struct reference")]
    AccessNullStruct,
    #[error("accessed null array reference")]
    AccessNullArray,
    #[error("accessed null i31 reference")]
    AccessNullI31,
    #[error("accessed null exception reference")]
    AccessNullException,
    #[error("cast of null reference to non-null type")]
    CastNullToNonNull,

    #[error("undefined element")]
    UndefinedElement,
    #[error("uninitialized element")]
    UninitializedElement,
    #[error("indirect call type mismatch")]
    IndirectCallTypeMismatch,

    #[error("cast failed")]
    CastFailed,

    #[error("uncaught exception propagated past the top of the call stack")]
    UnhandledException,

    #[error("data segment does not fit")]
    DataSegDoesNotFit,
    #[error("element segment does not fit")]
    ElemSegDoesNotFit,

    #[error("cost limit exceeded")]
    CostLimitExceeded,
    #[error("interrupted")]
    Interrupted,
    #[error("terminated")]
    Terminated,

    #[error("unknown import {module}::{name}")]
    UnknownImport { module: String, name: String },
    #[error("incompatible import type for {module}::{name}")]
    IncompatibleImportType { module: String, name: String },

    #[error("invalid core sort")]
    InvalidCoreSort,
    #[error("invalid canonical option")]
    InvalidCanonOption,
    #[error("component instantiation feature not implemented")]
    ComponentNotImplInstantiate,
}

/// The instruction offset and opcode name accompanying a trap, attached at
/// the point the trap is raised so the diagnostic sink (`tracing`) and the
/// host-visible error both carry the same context.
#[derive(Debug, Clone)]
pub struct TrapInfo {
    pub trap: Trap,
    pub opcode: &'static str,
    pub offset: u32,
}

impl fmt::Display for TrapInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "wasm trap: {} (at offset {:#x}, executing `{}`)",
            self.trap, self.offset, self.opcode
        )
    }
}

impl std::error::Error for TrapInfo {}

impl Trap {
    /// Attaches dispatch-site context and logs the trap through the
    /// diagnostic sink before returning it to the caller.
    pub fn at(self, opcode: &'static str, offset: u32) -> TrapInfo {
        let info = TrapInfo {
            trap: self,
            opcode,
            offset,
        };
        tracing::error!(trap = %info.trap, opcode, offset, "wasm trap raised");
        info
    }
}
