//! In-process reference engine.
//!
//! Implements the native module traits over a [`crate::Repository`]. Each
//! module instance keeps its own handles and exception state; repositories are
//! shared through the database URL.

mod config;
mod diagnostic;

pub use config::MemoryConfigModule;
pub use diagnostic::MemoryDiagnosticModule;

use crate::error::{EngineError, EngineResult};

/// Default maximum number of handles a module keeps open at once.
pub const DEFAULT_HANDLE_LIMIT: usize = 1024;

/// Returns the initialized state or `NotInitialized`.
fn ready<S>(state: &mut Option<S>) -> EngineResult<&mut S> {
    state.as_mut().ok_or(EngineError::NotInitialized)
}
