//! The boundary between a module and whatever invoked it.

pub mod arguments;
pub mod stdio_host;

use crate::core::domain::model::envelope::ResultEnvelope;
use serde_json::{Map, Value};
use std::io;

/// What a module sees of its invoker.
///
/// A module reads its parameters and check-mode flag, may emit warnings, and
/// ends by handing exactly one envelope to [`ModuleHost::exit`] or
/// [`ModuleHost::fail`].
pub trait ModuleHost {
    fn params(&self) -> &Map<String, Value>;

    fn check_mode(&self) -> bool;

    fn warn(&mut self, msg: &str);

    /// Emits a successful result.
    ///
    /// # Errors
    /// Returns an error if the result cannot be written or a result was
    /// already emitted.
    fn exit(&mut self, result: ResultEnvelope) -> io::Result<()>;

    /// Emits a failed result. `result.failed` is forced to `true`.
    ///
    /// # Errors
    /// Same as [`ModuleHost::exit`].
    fn fail(&mut self, result: ResultEnvelope) -> io::Result<()>;
}
