//! Operator abort input trait

use crate::error::Result;

/// Digital input for the operator abort button.
///
/// Polled by the foreground loop roughly every 100 ms while a primitive
/// is executing.
pub trait AbortInput: Send {
    /// Returns `true` once the operator has requested an abort.
    fn is_aborted(&mut self) -> Result<bool>;
}
