//! Session lifecycle around a native module.
//!
//! A [`Session`] owns one native module behind a mutex, the handle table for
//! the resources it issued, and the last-exception slot. Every public
//! operation of the services goes through [`Session::call`] or one of the
//! lifecycle methods, which apply the same protocol:
//!
//! 1. clear the last-exception slot (and the module's own state)
//! 2. fail with `Cancelled` if the cancel token fired
//! 3. fail with `NotInitialized` unless the session is ready
//! 4. run the native call under the lock
//! 5. on failure, read the native message, classify it, record it, return it

use crate::error::{BindError, BindResult, ErrorKind};
use crate::exception::LastException;
use crate::handle::HandleTable;
use erbind_native::{NativeModule, NativeResult, ReturnCode};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Module name used when none is configured.
pub const DEFAULT_MODULE_NAME: &str = "erbind";

/// Settings for initializing a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Name the engine uses for this module in its own logs.
    pub module_name: String,

    /// Engine settings JSON (see `SystemConfiguration`).
    pub ini_params: String,

    /// Whether the engine logs each call.
    pub verbose_logging: bool,

    /// Persisted configuration to bind to instead of the default.
    ///
    /// Only diagnostic sessions use this.
    pub config_id: Option<i64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            module_name: DEFAULT_MODULE_NAME.to_string(),
            ini_params: String::new(),
            verbose_logging: false,
            config_id: None,
        }
    }
}

impl SessionConfig {
    /// Creates a configuration for the given engine settings.
    #[must_use]
    pub fn new(ini_params: impl Into<String>) -> Self {
        Self {
            ini_params: ini_params.into(),
            ..Self::default()
        }
    }

    /// Sets the module name.
    #[must_use]
    pub fn module_name(mut self, name: impl Into<String>) -> Self {
        self.module_name = name.into();
        self
    }

    /// Sets verbose engine logging.
    #[must_use]
    pub const fn verbose_logging(mut self, value: bool) -> Self {
        self.verbose_logging = value;
        self
    }

    /// Binds the session to a persisted configuration ID.
    #[must_use]
    pub const fn config_id(mut self, id: i64) -> Self {
        self.config_id = Some(id);
        self
    }
}

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// `init` has never succeeded.
    Uninitialized,
    /// Calls are accepted.
    Ready,
    /// `destroy` succeeded; `init` may be called again.
    Destroyed,
}

/// A cancellation flag shared between a session and its callers.
///
/// Cancelling prevents new calls from starting. A call already inside the
/// engine runs to completion. `destroy` and the last-exception accessors keep
/// working so resources can still be released.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates an untriggered token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Triggers the token.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns true once the token has been triggered.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Mutable session state, guarded by the session mutex.
#[derive(Debug)]
struct Inner<M, V> {
    module: M,
    state: SessionState,
    config: Option<SessionConfig>,
    handles: HandleTable<V>,
}

/// What an operation sees while it holds the session lock.
pub(crate) struct Ready<'a, M, V> {
    op: &'static str,
    module: &'a mut M,
    handles: &'a mut HandleTable<V>,
    config: &'a mut Option<SessionConfig>,
}

impl<M: NativeModule, V> Ready<'_, M, V> {
    /// Runs a native call, turning a bare return code into a classified error.
    pub(crate) fn native<T>(
        &mut self,
        f: impl FnOnce(&mut M) -> NativeResult<T>,
    ) -> BindResult<T> {
        self.native_as(ErrorKind::from_query_code, f)
    }

    /// Like [`Ready::native`] with an explicit classifier.
    pub(crate) fn native_as<T>(
        &mut self,
        classify: impl FnOnce(ReturnCode) -> ErrorKind,
        f: impl FnOnce(&mut M) -> NativeResult<T>,
    ) -> BindResult<T> {
        f(self.module).map_err(|code| native_error(self.op, &*self.module, classify(code), code))
    }

    pub(crate) fn handles(&mut self) -> &mut HandleTable<V> {
        self.handles
    }

    pub(crate) fn config(&mut self) -> &mut Option<SessionConfig> {
        self.config
    }
}

/// Builds the error for a failed native call from the module's exception state.
fn native_error<M: NativeModule>(
    op: &str,
    module: &M,
    kind: ErrorKind,
    code: ReturnCode,
) -> BindError {
    let mut message = module.last_exception();
    if message.is_empty() {
        message = format!("{op} failed with native code {code}");
    }
    let code = match module.last_exception_code() {
        0 => code,
        recorded => recorded,
    };
    BindError::new(kind, code, message)
}

/// A native module plus the binding state around it.
///
/// `V` is what the handle table stores per issued token.
#[derive(Debug)]
pub struct Session<M, V> {
    inner: Mutex<Inner<M, V>>,
    exception: LastException,
    cancel: CancelToken,
}

impl<M: NativeModule, V> Session<M, V> {
    /// Wraps an uninitialized native module.
    pub fn new(module: M) -> Self {
        Self {
            inner: Mutex::new(Inner {
                module,
                state: SessionState::Uninitialized,
                config: None,
                handles: HandleTable::new(),
            }),
            exception: LastException::new(),
            cancel: CancelToken::new(),
        }
    }

    /// Returns the lifecycle state.
    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    /// Returns a clone of the session's cancel token.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Returns the configuration the session was initialized with.
    pub fn config(&self) -> Option<SessionConfig> {
        self.inner.lock().config.clone()
    }

    /// Returns the number of live handle tokens.
    pub fn open_handles(&self) -> usize {
        self.inner.lock().handles.len()
    }

    /// Initializes the session with a native init call.
    pub(crate) fn open(
        &self,
        op: &'static str,
        config: &SessionConfig,
        init: impl FnOnce(&mut M, &SessionConfig) -> NativeResult<()>,
    ) -> BindResult<()> {
        self.exception.clear();
        let mut inner = self.inner.lock();
        inner.module.clear_last_exception();

        let result = if self.cancel.is_cancelled() {
            Err(cancelled())
        } else if inner.state == SessionState::Ready {
            Err(BindError::binding(
                ErrorKind::AlreadyInitialized,
                "session is already initialized; destroy it first",
            ))
        } else {
            init(&mut inner.module, config).map_err(|code| {
                native_error(op, &inner.module, ErrorKind::from_init_code(code), code)
            })
        };

        match result {
            Ok(()) => {
                inner.state = SessionState::Ready;
                inner.config = Some(config.clone());
                debug!(op, module = %config.module_name, "session initialized");
                Ok(())
            }
            Err(err) => Err(self.fail(op, err)),
        }
    }

    /// Destroys the session and invalidates every outstanding handle.
    pub fn destroy(&self) -> BindResult<()> {
        const OP: &str = "destroy";
        self.exception.clear();
        let mut inner = self.inner.lock();
        inner.module.clear_last_exception();

        if inner.state != SessionState::Ready {
            return Err(self.fail(OP, BindError::not_initialized()));
        }
        if let Err(code) = inner.module.destroy() {
            let err = native_error(OP, &inner.module, ErrorKind::from_query_code(code), code);
            return Err(self.fail(OP, err));
        }

        let released = inner.handles.drain().len();
        inner.state = SessionState::Destroyed;
        inner.config = None;
        debug!(op = OP, released, "session destroyed");
        Ok(())
    }

    /// Runs an operation on a ready session.
    pub(crate) fn call<T>(
        &self,
        op: &'static str,
        f: impl FnOnce(&mut Ready<'_, M, V>) -> BindResult<T>,
    ) -> BindResult<T> {
        self.exception.clear();
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        inner.module.clear_last_exception();

        if self.cancel.is_cancelled() {
            return Err(self.fail(op, cancelled()));
        }
        if inner.state != SessionState::Ready {
            return Err(self.fail(op, BindError::not_initialized()));
        }

        debug!(op, "binding call");
        let mut ready = Ready {
            op,
            module: &mut inner.module,
            handles: &mut inner.handles,
            config: &mut inner.config,
        };
        f(&mut ready).map_err(|err| self.fail(op, err))
    }

    /// Runs an operation without touching the last-exception slot.
    ///
    /// Used for cleanup on drop, where a failure has no caller to report to.
    pub(crate) fn call_quiet(&self, f: impl FnOnce(&mut Ready<'_, M, V>) -> BindResult<()>) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        if inner.state != SessionState::Ready {
            return;
        }
        let mut ready = Ready {
            op: "cleanup",
            module: &mut inner.module,
            handles: &mut inner.handles,
            config: &mut inner.config,
        };
        if let Err(err) = f(&mut ready) {
            debug!(error = %err, "cleanup failed");
        }
    }

    /// Returns the last failure message, empty if none.
    pub fn last_exception(&self) -> String {
        self.exception.message()
    }

    /// Returns the last failure code, zero if none.
    pub fn last_exception_code(&self) -> ReturnCode {
        self.exception.code()
    }

    /// Clears the last failure.
    pub fn clear_last_exception(&self) {
        self.exception.clear();
        self.inner.lock().module.clear_last_exception();
    }

    fn fail(&self, op: &str, err: BindError) -> BindError {
        warn!(op, kind = %err.kind, code = err.code, message = %err.message, "binding call failed");
        self.exception.record(&err);
        err
    }
}

fn cancelled() -> BindError {
    BindError::binding(ErrorKind::Cancelled, "session was cancelled")
}

#[cfg(test)]
mod tests {
    use super::*;
    use erbind_native::{codes, ConfigModule, MemoryConfigModule};

    const SETTINGS: &str = r#"{"PIPELINE":{},"SQL":{"CONNECTION":"memory://session-tests"}}"#;

    type TestSession = Session<MemoryConfigModule, u64>;

    fn init(session: &TestSession, config: &SessionConfig) -> BindResult<()> {
        session.open("init", config, |m, c| {
            m.init(&c.module_name, &c.ini_params, c.verbose_logging)
        })
    }

    #[test]
    fn config_builder() {
        let config = SessionConfig::new(SETTINGS)
            .module_name("tests")
            .verbose_logging(true)
            .config_id(3);
        assert_eq!(config.module_name, "tests");
        assert!(config.verbose_logging);
        assert_eq!(config.config_id, Some(3));
        assert_eq!(SessionConfig::default().module_name, DEFAULT_MODULE_NAME);
    }

    #[test]
    fn lifecycle_states() {
        let session = TestSession::new(MemoryConfigModule::new());
        assert_eq!(session.state(), SessionState::Uninitialized);

        init(&session, &SessionConfig::new(SETTINGS)).unwrap();
        assert_eq!(session.state(), SessionState::Ready);

        let err = init(&session, &SessionConfig::new(SETTINGS)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::AlreadyInitialized);

        session.destroy().unwrap();
        assert_eq!(session.state(), SessionState::Destroyed);
        assert_eq!(session.destroy().unwrap_err().kind, ErrorKind::NotInitialized);

        init(&session, &SessionConfig::new(SETTINGS)).unwrap();
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[test]
    fn bad_settings_are_invalid_config() {
        let session = TestSession::new(MemoryConfigModule::new());
        let err = init(&session, &SessionConfig::new("{not json")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidConfig);
        assert_eq!(err.code, codes::INVALID_CONFIG);
        assert_eq!(session.last_exception(), err.message);
        assert_eq!(session.state(), SessionState::Uninitialized);
    }

    #[test]
    fn call_requires_ready_session() {
        let session = TestSession::new(MemoryConfigModule::new());
        let err = session
            .call("create", |r| r.native(|m| m.create()))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotInitialized);
        assert_eq!(session.last_exception_code(), codes::NOT_INITIALIZED);
    }

    #[test]
    fn native_failures_carry_engine_message() {
        let session = TestSession::new(MemoryConfigModule::new());
        init(&session, &SessionConfig::new(SETTINGS)).unwrap();

        let err = session
            .call("save", |r| r.native(|m| m.save(4242)))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidHandle);
        assert!(err.message.contains("invalid handle 4242"));
        assert_eq!(session.last_exception(), err.message);
    }

    #[test]
    fn each_call_clears_the_slot() {
        let session = TestSession::new(MemoryConfigModule::new());
        init(&session, &SessionConfig::new(SETTINGS)).unwrap();
        session
            .call("save", |r| r.native(|m| m.save(1)))
            .unwrap_err();
        assert_ne!(session.last_exception_code(), 0);

        session.call("create", |r| r.native(|m| m.create())).unwrap();
        assert_eq!(session.last_exception_code(), 0);
        assert_eq!(session.last_exception(), "");
    }

    #[test]
    fn cancelled_session_rejects_calls_but_destroys() {
        let session = TestSession::new(MemoryConfigModule::new());
        init(&session, &SessionConfig::new(SETTINGS)).unwrap();
        session.cancel_token().cancel();

        let err = session
            .call("create", |r| r.native(|m| m.create()))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Cancelled);
        session.destroy().unwrap();
    }

    #[test]
    fn destroy_drains_handles() {
        let session = TestSession::new(MemoryConfigModule::new());
        init(&session, &SessionConfig::new(SETTINGS)).unwrap();
        let token = session
            .call("create", |r| {
                let native = r.native(|m| m.create())?;
                Ok(r.handles().insert(native))
            })
            .unwrap();
        assert_eq!(session.open_handles(), 1);

        session.destroy().unwrap();
        assert_eq!(session.open_handles(), 0);
        init(&session, &SessionConfig::new(SETTINGS)).unwrap();
        let found = session.call("lookup", |r| Ok(r.handles().get(token).copied())).unwrap();
        assert_eq!(found, None);
    }
}
