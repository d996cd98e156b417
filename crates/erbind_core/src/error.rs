//! Error types for the erbind binding.

use erbind_native::{codes, ReturnCode};
use std::fmt;
use thiserror::Error;

/// Result type for binding operations.
pub type BindResult<T> = Result<T, BindError>;

/// Classification of a binding failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The session has not been initialized, or was destroyed.
    NotInitialized,
    /// `init` was called on a session that is already ready.
    AlreadyInitialized,
    /// The engine settings were rejected.
    InvalidConfig,
    /// An argument or input document was rejected.
    InvalidInput,
    /// The handle is unknown, closed, exhausted or from a destroyed session.
    InvalidHandle,
    /// The engine could not allocate another resource.
    ResourceExhausted,
    /// The engine failed to initialize for a reason other than its settings.
    NativeInitFailure,
    /// An engine call failed.
    NativeQueryFailure,
    /// Switching the active configuration failed; the previous one is kept.
    ReinitFailure,
    /// The session's cancel token was triggered before the call started.
    Cancelled,
}

impl ErrorKind {
    /// Returns the code recorded for failures the binding detects itself.
    pub const fn default_code(self) -> ReturnCode {
        match self {
            Self::NotInitialized => codes::NOT_INITIALIZED,
            Self::AlreadyInitialized => 49,
            Self::InvalidConfig => codes::INVALID_CONFIG,
            Self::InvalidInput => codes::INVALID_ARGUMENT,
            Self::InvalidHandle => codes::INVALID_HANDLE,
            Self::ResourceExhausted => codes::RESOURCE_LIMIT,
            Self::Cancelled => 125,
            Self::NativeInitFailure | Self::NativeQueryFailure | Self::ReinitFailure => {
                codes::INTERNAL
            }
        }
    }

    /// Classifies a native failure code returned by a query or handle call.
    pub const fn from_query_code(code: ReturnCode) -> Self {
        match code {
            codes::NOT_INITIALIZED => Self::NotInitialized,
            codes::INVALID_JSON
            | codes::INVALID_ARGUMENT
            | codes::UNKNOWN_RESOURCE
            | codes::DUPLICATE_DATA_SOURCE => Self::InvalidInput,
            codes::INVALID_HANDLE => Self::InvalidHandle,
            codes::RESOURCE_LIMIT => Self::ResourceExhausted,
            _ => Self::NativeQueryFailure,
        }
    }

    /// Classifies a native failure code returned by `init`.
    pub const fn from_init_code(code: ReturnCode) -> Self {
        match code {
            codes::INVALID_CONFIG | codes::INVALID_JSON | codes::UNKNOWN_CONFIG_ID => {
                Self::InvalidConfig
            }
            _ => Self::NativeInitFailure,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotInitialized => "not initialized",
            Self::AlreadyInitialized => "already initialized",
            Self::InvalidConfig => "invalid config",
            Self::InvalidInput => "invalid input",
            Self::InvalidHandle => "invalid handle",
            Self::ResourceExhausted => "resource exhausted",
            Self::NativeInitFailure => "native init failure",
            Self::NativeQueryFailure => "native query failure",
            Self::ReinitFailure => "reinit failure",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// A failed binding operation.
///
/// Carries the classification, the numeric code (the native exception code
/// for engine failures) and the message also recorded in the session's
/// last-exception slot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} ({code}): {message}")]
pub struct BindError {
    /// Failure classification.
    pub kind: ErrorKind,
    /// Numeric code.
    pub code: ReturnCode,
    /// Human-readable message.
    pub message: String,
}

impl BindError {
    /// Creates an error with an explicit code.
    pub fn new(kind: ErrorKind, code: ReturnCode, message: impl Into<String>) -> Self {
        Self {
            kind,
            code,
            message: message.into(),
        }
    }

    /// Creates an error detected by the binding itself.
    pub fn binding(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, kind.default_code(), message)
    }

    /// The session is not ready.
    pub fn not_initialized() -> Self {
        Self::binding(ErrorKind::NotInitialized, "session is not initialized")
    }

    /// The handle token does not name a live resource.
    pub fn invalid_handle(token: u64) -> Self {
        Self::binding(
            ErrorKind::InvalidHandle,
            format!("handle {token:#x} is unknown, closed or exhausted"),
        )
    }

    /// An argument was rejected before reaching the engine.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::binding(ErrorKind::InvalidInput, message)
    }

    /// The engine returned a response the binding could not interpret.
    pub fn malformed_response(op: &str, detail: impl fmt::Display) -> Self {
        Self::binding(
            ErrorKind::NativeQueryFailure,
            format!("{op}: malformed engine response: {detail}"),
        )
    }

    /// Returns true if this error has the given kind.
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_codes_are_classified() {
        assert_eq!(
            ErrorKind::from_query_code(codes::INVALID_HANDLE),
            ErrorKind::InvalidHandle
        );
        assert_eq!(
            ErrorKind::from_query_code(codes::DUPLICATE_DATA_SOURCE),
            ErrorKind::InvalidInput
        );
        assert_eq!(
            ErrorKind::from_query_code(codes::RESOURCE_LIMIT),
            ErrorKind::ResourceExhausted
        );
        assert_eq!(ErrorKind::from_query_code(4242), ErrorKind::NativeQueryFailure);
    }

    #[test]
    fn init_codes_are_classified() {
        assert_eq!(
            ErrorKind::from_init_code(codes::INVALID_CONFIG),
            ErrorKind::InvalidConfig
        );
        assert_eq!(
            ErrorKind::from_init_code(codes::INTERNAL),
            ErrorKind::NativeInitFailure
        );
    }

    #[test]
    fn display_includes_kind_code_and_message() {
        let err = BindError::invalid_handle(0x1_0000_0002);
        assert!(err.is(ErrorKind::InvalidHandle));
        assert_eq!(err.code, codes::INVALID_HANDLE);
        let text = err.to_string();
        assert!(text.starts_with("invalid handle (95): handle 0x100000002"));
    }

    #[test]
    fn binding_codes_are_nonzero() {
        for kind in [
            ErrorKind::NotInitialized,
            ErrorKind::AlreadyInitialized,
            ErrorKind::InvalidConfig,
            ErrorKind::InvalidInput,
            ErrorKind::InvalidHandle,
            ErrorKind::ResourceExhausted,
            ErrorKind::NativeInitFailure,
            ErrorKind::NativeQueryFailure,
            ErrorKind::ReinitFailure,
            ErrorKind::Cancelled,
        ] {
            assert_ne!(kind.default_code(), 0, "{kind}");
        }
    }
}
