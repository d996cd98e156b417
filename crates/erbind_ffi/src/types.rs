//! Type definitions for FFI.

use crate::error::{set_last_error, ErResult};
use erbind_core::{ConfigService, DiagnosticService};

/// An opaque configuration service.
///
/// Created by `erbind_config_new`, released by `erbind_config_free`.
#[repr(C)]
pub struct ErConfig {
    _private: [u8; 0],
}

/// An opaque diagnostic service.
///
/// Created by `erbind_diagnostic_new`, released by `erbind_diagnostic_free`.
#[repr(C)]
pub struct ErDiagnostic {
    _private: [u8; 0],
}

/// A configuration handle token. Zero is never a valid token.
pub type ErConfigHandle = u64;

/// An entity list handle token. Zero is never a valid token.
pub type ErEntityListHandle = u64;

/// Resolves an opaque config pointer.
///
/// # Safety
///
/// `ptr` must be null or a live pointer from `erbind_config_new`.
pub(crate) unsafe fn config_ref<'a>(ptr: *const ErConfig) -> Result<&'a ConfigService, ErResult> {
    (ptr as *const ConfigService).as_ref().ok_or_else(|| {
        set_last_error("null pointer argument: config");
        ErResult::NullPointer
    })
}

/// Resolves an opaque diagnostic pointer.
///
/// # Safety
///
/// `ptr` must be null or a live pointer from `erbind_diagnostic_new`.
pub(crate) unsafe fn diagnostic_ref<'a>(
    ptr: *const ErDiagnostic,
) -> Result<&'a DiagnosticService, ErResult> {
    (ptr as *const DiagnosticService).as_ref().ok_or_else(|| {
        set_last_error("null pointer argument: diagnostic");
        ErResult::NullPointer
    })
}
