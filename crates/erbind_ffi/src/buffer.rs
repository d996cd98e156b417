//! Owned strings and argument conversion for FFI.

use crate::error::{set_last_error, ErResult};
use std::ffi::{c_char, CStr, CString};

/// A string for FFI.
///
/// Null-terminated UTF-8 string. Memory owned by Rust.
/// Call `erbind_free_string` to release.
#[repr(C)]
#[derive(Debug)]
pub struct ErString {
    /// Pointer to null-terminated string, null for "no value".
    pub ptr: *mut c_char,
    /// Length (not including null terminator).
    pub len: usize,
}

impl ErString {
    /// Creates a new FFI string from a Rust string.
    ///
    /// Returns `None` if `s` contains a NUL byte.
    pub fn from_str(s: &str) -> Option<Self> {
        let cstring = CString::new(s).ok()?;
        let len = cstring.as_bytes().len();
        let ptr = cstring.into_raw();

        Some(Self { ptr, len })
    }

    /// Creates a null string.
    pub fn empty() -> Self {
        Self {
            ptr: std::ptr::null_mut(),
            len: 0,
        }
    }

    /// Returns true if the string is null.
    pub fn is_null(&self) -> bool {
        self.ptr.is_null()
    }

    /// Converts to a Rust string slice.
    ///
    /// # Safety
    ///
    /// The pointer must be valid.
    pub unsafe fn as_str(&self) -> Option<&str> {
        if self.ptr.is_null() {
            return None;
        }
        CStr::from_ptr(self.ptr).to_str().ok()
    }
}

/// Frees a string allocated by erbind.
///
/// # Safety
///
/// The string must have been returned by an erbind FFI function and not
/// freed before.
#[no_mangle]
pub unsafe extern "C" fn erbind_free_string(string: ErString) {
    if !string.ptr.is_null() {
        drop(CString::from_raw(string.ptr));
    }
}

/// Reads a required UTF-8 string argument.
///
/// # Safety
///
/// `ptr` must be null or a valid null-terminated string that outlives `'a`.
pub(crate) unsafe fn read_str<'a>(ptr: *const c_char, name: &str) -> Result<&'a str, ErResult> {
    if ptr.is_null() {
        set_last_error(format!("null pointer argument: {name}"));
        return Err(ErResult::NullPointer);
    }
    CStr::from_ptr(ptr).to_str().map_err(|_| {
        set_last_error(format!("invalid UTF-8 in {name}"));
        ErResult::InvalidUtf8
    })
}

/// Borrows a required output slot.
///
/// # Safety
///
/// `ptr` must be null or valid for writes for `'a`.
pub(crate) unsafe fn out_ref<'a, T>(ptr: *mut T, name: &str) -> Result<&'a mut T, ErResult> {
    ptr.as_mut().ok_or_else(|| {
        set_last_error(format!("null pointer argument: {name}"));
        ErResult::NullPointer
    })
}

/// Converts a Rust string for an output slot.
pub(crate) fn to_er_string(s: &str) -> Result<ErString, ErResult> {
    ErString::from_str(s).ok_or_else(|| {
        set_last_error("result contains an interior NUL byte");
        ErResult::Error
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_from_str() {
        let string = ErString::from_str("hello").unwrap();
        assert!(!string.is_null());
        assert_eq!(string.len, 5);

        // Safety: we just created it
        let s = unsafe { string.as_str() };
        assert_eq!(s, Some("hello"));

        unsafe { erbind_free_string(string) };
    }

    #[test]
    fn string_empty() {
        let string = ErString::empty();
        assert!(string.is_null());
        unsafe { erbind_free_string(string) };
    }

    #[test]
    fn string_with_null_byte_fails() {
        assert!(ErString::from_str("hello\0world").is_none());
        assert_eq!(to_er_string("a\0b").unwrap_err(), ErResult::Error);
    }

    #[test]
    fn read_str_checks_pointer_and_utf8() {
        let err = unsafe { read_str(std::ptr::null(), "json") }.unwrap_err();
        assert_eq!(err, ErResult::NullPointer);

        let bad = [0xffu8, 0xfe, 0];
        let err = unsafe { read_str(bad.as_ptr().cast(), "json") }.unwrap_err();
        assert_eq!(err, ErResult::InvalidUtf8);

        let good = CString::new("{}").unwrap();
        assert_eq!(unsafe { read_str(good.as_ptr(), "json") }.unwrap(), "{}");
    }
}
