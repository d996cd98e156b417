//! Native return codes and the engine-side exception state.

use thiserror::Error;

/// Bare status returned by a failing native call.
///
/// The value is the exception code of the failure. Zero is never returned
/// as an error.
pub type ReturnCode = i64;

/// Result of a native call. The error carries no message.
pub type NativeResult<T> = Result<T, ReturnCode>;

/// Result type for engine internals.
pub type EngineResult<T> = Result<T, EngineError>;

/// Well-known native exception codes.
pub mod codes {
    use super::ReturnCode;

    /// Input was not valid JSON.
    pub const INVALID_JSON: ReturnCode = 7;
    /// An argument was out of range or malformed.
    pub const INVALID_ARGUMENT: ReturnCode = 23;
    /// An entity, feature or relationship does not exist.
    pub const UNKNOWN_RESOURCE: ReturnCode = 37;
    /// The module has not been initialized.
    pub const NOT_INITIALIZED: ReturnCode = 48;
    /// The engine settings are malformed or incomplete.
    pub const INVALID_CONFIG: ReturnCode = 53;
    /// The configuration ID is not registered in the repository.
    pub const UNKNOWN_CONFIG_ID: ReturnCode = 61;
    /// The handle is unknown, closed or exhausted.
    pub const INVALID_HANDLE: ReturnCode = 95;
    /// The module cannot allocate another resource.
    pub const RESOURCE_LIMIT: ReturnCode = 104;
    /// The data source code already exists in the document.
    pub const DUPLICATE_DATA_SOURCE: ReturnCode = 7220;
    /// Unexpected engine failure.
    pub const INTERNAL: ReturnCode = 9999;
}

/// Errors raised inside the reference engine.
///
/// These never cross the native boundary directly: [`ExceptionState::capture`]
/// turns them into a [`ReturnCode`] plus a stored message.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The module is not initialized.
    #[error("module is not initialized")]
    NotInitialized,

    /// The input could not be parsed as JSON.
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The engine settings are not usable.
    #[error("invalid engine settings: {0}")]
    InvalidSettings(String),

    /// The configuration ID is not registered.
    #[error("unknown configuration ID {0}")]
    UnknownConfigId(i64),

    /// An argument is out of range or malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A repository resource does not exist.
    #[error("{kind} {id} not found")]
    UnknownResource {
        /// The kind of resource (entity, feature, relationship).
        kind: &'static str,
        /// The requested identifier.
        id: i64,
    },

    /// The handle is unknown or no longer usable.
    #[error("invalid handle {handle}: {reason}")]
    InvalidHandle {
        /// The native handle value.
        handle: u64,
        /// Why the handle was rejected.
        reason: &'static str,
    },

    /// The data source code already exists.
    #[error("data source code '{0}' already exists")]
    DuplicateDataSource(String),

    /// A per-module resource limit was reached.
    #[error("resource limit reached: {0}")]
    ResourceLimit(String),

    /// Repository file I/O failed.
    #[error("repository I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Unexpected internal failure.
    #[error("internal engine error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Creates an invalid settings error.
    pub fn invalid_settings(message: impl Into<String>) -> Self {
        Self::InvalidSettings(message.into())
    }

    /// Creates an unknown resource error.
    pub fn unknown(kind: &'static str, id: i64) -> Self {
        Self::UnknownResource { kind, id }
    }

    /// Returns the native exception code for this error.
    pub fn code(&self) -> ReturnCode {
        match self {
            Self::NotInitialized => codes::NOT_INITIALIZED,
            Self::InvalidJson(_) => codes::INVALID_JSON,
            Self::InvalidSettings(_) => codes::INVALID_CONFIG,
            Self::UnknownConfigId(_) => codes::UNKNOWN_CONFIG_ID,
            Self::InvalidArgument(_) => codes::INVALID_ARGUMENT,
            Self::UnknownResource { .. } => codes::UNKNOWN_RESOURCE,
            Self::InvalidHandle { .. } => codes::INVALID_HANDLE,
            Self::DuplicateDataSource(_) => codes::DUPLICATE_DATA_SOURCE,
            Self::ResourceLimit(_) => codes::RESOURCE_LIMIT,
            Self::Io(_) | Self::Internal(_) => codes::INTERNAL,
        }
    }
}

/// The last-exception state every native module keeps.
///
/// A failing call stores its message and code here and returns only the code.
/// The state stays until the next failure overwrites it or it is cleared.
#[derive(Debug, Default)]
pub struct ExceptionState {
    code: ReturnCode,
    message: String,
}

impl ExceptionState {
    /// Creates an empty exception state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the error of a failed engine call and lowers it to a return code.
    pub fn capture<T>(&mut self, result: EngineResult<T>) -> NativeResult<T> {
        result.map_err(|err| {
            let code = err.code();
            self.code = code;
            self.message = format!("{code:04}E|{err}");
            code
        })
    }

    /// Returns the stored message, empty if none.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the stored code, zero if none.
    pub fn code(&self) -> ReturnCode {
        self.code
    }

    /// Resets the state.
    pub fn clear(&mut self) {
        self.code = 0;
        self.message.clear();
    }
}
