//! Result codes and the thread-local last error.

use erbind_core::{BindError, BindResult, ErrorKind};
use std::cell::RefCell;
use std::ffi::{c_char, CString};

/// Result code for FFI functions.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErResult {
    /// Operation succeeded.
    Ok = 0,
    /// Session not initialized or destroyed.
    NotInitialized = 1,
    /// Session already initialized.
    AlreadyInitialized = 2,
    /// Engine settings rejected.
    InvalidConfig = 3,
    /// Argument or input document rejected.
    InvalidInput = 4,
    /// Handle unknown, closed or exhausted.
    InvalidHandle = 5,
    /// Engine resource limit reached.
    ResourceExhausted = 6,
    /// Engine failed to initialize.
    NativeInitFailure = 7,
    /// Engine call failed.
    NativeQueryFailure = 8,
    /// Configuration switch failed.
    ReinitFailure = 9,
    /// Session cancelled.
    Cancelled = 10,
    /// Null pointer argument.
    NullPointer = 11,
    /// String argument is not valid UTF-8.
    InvalidUtf8 = 12,
    /// Result could not be returned (e.g. interior NUL byte).
    Error = 13,
}

impl ErResult {
    /// Returns true if the result indicates success.
    pub fn is_ok(self) -> bool {
        self == ErResult::Ok
    }

    /// Returns true if the result indicates an error.
    pub fn is_err(self) -> bool {
        self != ErResult::Ok
    }
}

impl From<ErrorKind> for ErResult {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::NotInitialized => ErResult::NotInitialized,
            ErrorKind::AlreadyInitialized => ErResult::AlreadyInitialized,
            ErrorKind::InvalidConfig => ErResult::InvalidConfig,
            ErrorKind::InvalidInput => ErResult::InvalidInput,
            ErrorKind::InvalidHandle => ErResult::InvalidHandle,
            ErrorKind::ResourceExhausted => ErResult::ResourceExhausted,
            ErrorKind::NativeInitFailure => ErResult::NativeInitFailure,
            ErrorKind::NativeQueryFailure => ErResult::NativeQueryFailure,
            ErrorKind::ReinitFailure => ErResult::ReinitFailure,
            ErrorKind::Cancelled => ErResult::Cancelled,
        }
    }
}

// Thread-local storage for last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Sets the last error message.
pub fn set_last_error(message: impl Into<String>) {
    let msg = message.into();
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clears the last error.
pub fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Records a binding error as the last error and returns its code.
pub(crate) fn fail(err: &BindError) -> ErResult {
    set_last_error(err.to_string());
    err.kind.into()
}

/// Unwraps a binding result, recording the error on failure.
pub(crate) fn check<T>(result: BindResult<T>) -> Result<T, ErResult> {
    result.map_err(|e| fail(&e))
}

/// Runs an FFI body with the last error cleared first.
pub(crate) fn ffi_call(body: impl FnOnce() -> Result<(), ErResult>) -> ErResult {
    clear_last_error();
    match body() {
        Ok(()) => ErResult::Ok,
        Err(code) => code,
    }
}

/// Gets the last error message as a C string.
///
/// Returns null if no error is set.
///
/// # Safety
///
/// The returned pointer is valid until the next FFI call on this thread.
#[no_mangle]
pub extern "C" fn erbind_get_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match e.borrow().as_ref() {
        Some(cstr) => cstr.as_ptr(),
        None => std::ptr::null(),
    })
}

/// Clears the last error message.
#[no_mangle]
pub extern "C" fn erbind_clear_error() {
    clear_last_error();
}
