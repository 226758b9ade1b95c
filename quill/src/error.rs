use crate::{Operand, Value};

/// Errors raised by the engine. Script-level exceptions map onto
/// `TypeError`, `RangeError` and `Throw`. A bad operand aborts the call;
/// see [`Error::is_fatal`] for the ones that abort the engine.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("TypeError: {0}")]
    TypeError(&'static str),
    #[error("RangeError: {0}")]
    RangeError(&'static str),
    #[error("out of memory")]
    OutOfMemory,
    #[error("maximum call stack size exceeded")]
    StackOverflow,
    #[error("uncaught exception: {0}")]
    Throw(Value),
    #[error("invalid operand {0:?}")]
    InvalidOperand(Operand),
    #[error("internal error: {0}")]
    Internal(&'static str),
}

impl Error {
    /// Errors that never become script values: resource exhaustion and
    /// engine faults.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::OutOfMemory | Self::StackOverflow | Self::Internal(_))
    }
}
