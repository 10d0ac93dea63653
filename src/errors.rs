use crate::trap::TrapInfo;
use std::fmt;

/// The crate-wide error type. `Trap` carries its own dispatch-site context;
/// everything else here is a linking/instantiation/parsing failure that
/// occurs before or around dispatch rather than during it.
#[derive(Debug, onlyerror::Error)]
pub enum Error {
    #[error("{0}")]
    Trap(#[from] TrapInfo),

    #[error("invalid WebAssembly input at offset {offset}: {message}")]
    InvalidInput { message: String, offset: usize },

    #[error("a feature used by this module is not supported: {0}")]
    Unsupported(String),

    #[error("size overflow calculating memory or table size")]
    SizeOverflow,

    #[error("resource limit exceeded: {0}")]
    ResourceLimitExceeded(String),

    #[error("export {name} not found")]
    ExportNotFound { name: String },

    #[error("export {name} has the wrong kind: expected {expected}, found {found}")]
    WrongExportKind {
        name: String,
        expected: &'static str,
        found: &'static str,
    },
}

impl From<wasmparser::BinaryReaderError> for Error {
    fn from(e: wasmparser::BinaryReaderError) -> Self {
        Self::InvalidInput {
            message: e.message().into(),
            offset: e.offset(),
        }
    }
}

#[macro_export]
macro_rules! wasm_unsupported {
    ($($arg:tt)*) => { $crate::errors::Error::Unsupported(format!($($arg)*)) }
}

/// Distinct from `Error` because it's infallible to construct and doesn't
/// need the full `onlyerror` machinery; kept as its own tiny type since
/// `MemoryPlan`/`TablePlan` byte-size arithmetic is the only place that
/// raises it and it never needs dispatch-site context.
#[derive(Copy, Clone, Debug)]
pub struct SizeOverflow;

impl fmt::Display for SizeOverflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("size overflow calculating memory size")
    }
}

impl std::error::Error for SizeOverflow {}

impl From<SizeOverflow> for Error {
    fn from(_: SizeOverflow) -> Self {
        Error::SizeOverflow
    }
}
