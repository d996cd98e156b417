//! # erbind FFI
//!
//! Stable C ABI over the erbind binding.
//!
//! Conventions:
//! - every function returns an [`ErResult`]; details of the most recent
//!   failure on the calling thread are available from `erbind_get_last_error`
//! - services are opaque pointers created by `*_new` and released by `*_free`
//! - handles cross the boundary as `u64` tokens; zero is never valid
//! - strings returned to the caller are [`ErString`] buffers released with
//!   `erbind_free_string`
//! - each service also keeps its own last-exception slot, readable through
//!   `erbind_config_last_exception` / `erbind_diagnostic_last_exception`

#![warn(missing_docs)]

pub mod buffer;
pub mod config;
pub mod diagnostic;
pub mod error;
pub mod types;

pub use buffer::{erbind_free_string, ErString};
pub use error::{
    clear_last_error, erbind_clear_error, erbind_get_last_error, set_last_error, ErResult,
};
pub use types::{ErConfig, ErConfigHandle, ErDiagnostic, ErEntityListHandle};
