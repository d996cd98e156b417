//! Configuration document service.

use crate::error::{BindError, BindResult};
use crate::handle::{ConfigHandle, HandleTable};
use crate::session::{CancelToken, Session, SessionConfig, SessionState};
use erbind_native::{ConfigModule, MemoryConfigModule, NativeHandle, ReturnCode};
use serde::Deserialize;

/// Manages in-memory configuration documents through a native config module.
///
/// Each [`ConfigHandle`] names an independent document. Handles stay valid
/// until closed or until the service is destroyed.
///
/// # Example
///
/// ```rust
/// use erbind_core::{ConfigService, SessionConfig, SystemConfiguration};
///
/// let service = ConfigService::new();
/// service
///     .init(&SessionConfig::new(SystemConfiguration::simple("memory://config-doc")))
///     .unwrap();
///
/// let handle = service.create().unwrap();
/// service.add_data_source(handle, r#"{"DSRC_CODE": "GO_TEST"}"#).unwrap();
/// assert!(service.data_source_codes(handle).unwrap().contains(&"GO_TEST".to_string()));
/// service.close(handle).unwrap();
/// service.destroy().unwrap();
/// ```
#[derive(Debug)]
pub struct ConfigService<M = MemoryConfigModule> {
    session: Session<M, NativeHandle>,
}

#[derive(Deserialize)]
struct DataSourceList {
    #[serde(rename = "DATA_SOURCES")]
    data_sources: Vec<DataSourceEntry>,
}

#[derive(Deserialize)]
struct DataSourceEntry {
    #[serde(rename = "DSRC_CODE")]
    code: String,
}

impl ConfigService<MemoryConfigModule> {
    /// Creates a service over the in-process reference engine.
    pub fn new() -> Self {
        Self::with_module(MemoryConfigModule::new())
    }
}

impl Default for ConfigService<MemoryConfigModule> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: ConfigModule> ConfigService<M> {
    /// Creates a service over an uninitialized native module.
    pub fn with_module(module: M) -> Self {
        Self {
            session: Session::new(module),
        }
    }

    /// Initializes the session.
    ///
    /// # Errors
    ///
    /// `AlreadyInitialized` on a ready session, `InvalidConfig` for rejected
    /// settings, `NativeInitFailure` otherwise.
    pub fn init(&self, config: &SessionConfig) -> BindResult<()> {
        self.session.open("config.init", config, |m, c| {
            m.init(&c.module_name, &c.ini_params, c.verbose_logging)
        })
    }

    /// Destroys the session; every open handle becomes invalid.
    pub fn destroy(&self) -> BindResult<()> {
        self.session.destroy()
    }

    /// Creates a document from the default template.
    pub fn create(&self) -> BindResult<ConfigHandle> {
        self.session.call("config.create", |r| {
            let native = r.native(|m| m.create())?;
            Ok(ConfigHandle::from_raw(r.handles().insert(native)))
        })
    }

    /// Adds a data source described by `{"DSRC_CODE": ...}` and returns the
    /// engine's acknowledgment (`{"DSRC_ID": n}`).
    ///
    /// # Errors
    ///
    /// `InvalidHandle` for a closed handle, `InvalidInput` for a missing,
    /// malformed or duplicate code.
    pub fn add_data_source(&self, handle: ConfigHandle, input_json: &str) -> BindResult<String> {
        self.session.call("config.add_data_source", |r| {
            let native = lookup(r.handles(), handle)?;
            r.native(|m| m.add_data_source(native, input_json))
        })
    }

    /// Deletes a data source; an absent code is not an error.
    pub fn delete_data_source(&self, handle: ConfigHandle, input_json: &str) -> BindResult<()> {
        self.session.call("config.delete_data_source", |r| {
            let native = lookup(r.handles(), handle)?;
            r.native(|m| m.delete_data_source(native, input_json))
        })
    }

    /// Lists the data sources of a document as the engine's JSON.
    pub fn list_data_sources(&self, handle: ConfigHandle) -> BindResult<String> {
        self.session.call("config.list_data_sources", |r| {
            let native = lookup(r.handles(), handle)?;
            r.native(|m| m.list_data_sources(native))
        })
    }

    /// Returns the data source codes of a document in list order.
    pub fn data_source_codes(&self, handle: ConfigHandle) -> BindResult<Vec<String>> {
        self.session.call("config.data_source_codes", |r| {
            let native = lookup(r.handles(), handle)?;
            let json = r.native(|m| m.list_data_sources(native))?;
            let list: DataSourceList = serde_json::from_str(&json)
                .map_err(|e| BindError::malformed_response("list_data_sources", e))?;
            Ok(list.data_sources.into_iter().map(|d| d.code).collect())
        })
    }

    /// Serializes a document.
    pub fn save(&self, handle: ConfigHandle) -> BindResult<String> {
        self.session.call("config.save", |r| {
            let native = lookup(r.handles(), handle)?;
            r.native(|m| m.save(native))
        })
    }

    /// Opens a new handle on a document previously returned by [`save`](Self::save).
    pub fn load(&self, config_json: &str) -> BindResult<ConfigHandle> {
        self.session.call("config.load", |r| {
            let native = r.native(|m| m.load(config_json))?;
            Ok(ConfigHandle::from_raw(r.handles().insert(native)))
        })
    }

    /// Releases a document. Any later use of `handle` is `InvalidHandle`.
    pub fn close(&self, handle: ConfigHandle) -> BindResult<()> {
        self.session.call("config.close", |r| {
            let native = r
                .handles()
                .remove(handle.as_raw())
                .ok_or_else(|| BindError::invalid_handle(handle.as_raw()))?;
            r.native(|m| m.close(native))
        })
    }

    /// Returns the session state.
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Returns the session's cancel token.
    pub fn cancel_token(&self) -> CancelToken {
        self.session.cancel_token()
    }

    /// Returns the number of open handles.
    pub fn open_handles(&self) -> usize {
        self.session.open_handles()
    }

    /// Returns the last failure message, empty if none.
    pub fn last_exception(&self) -> String {
        self.session.last_exception()
    }

    /// Returns the last failure code, zero if none.
    pub fn last_exception_code(&self) -> ReturnCode {
        self.session.last_exception_code()
    }

    /// Clears the last failure.
    pub fn clear_last_exception(&self) {
        self.session.clear_last_exception();
    }
}

fn lookup(
    handles: &mut HandleTable<NativeHandle>,
    handle: ConfigHandle,
) -> BindResult<NativeHandle> {
    handles
        .get(handle.as_raw())
        .copied()
        .ok_or_else(|| BindError::invalid_handle(handle.as_raw()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::settings::SystemConfiguration;

    fn service() -> ConfigService {
        let service = ConfigService::new();
        service
            .init(&SessionConfig::new(SystemConfiguration::simple(
                "memory://config-service-tests",
            )))
            .unwrap();
        service
    }

    #[test]
    fn uninitialized_service_rejects_calls() {
        let service = ConfigService::new();
        assert_eq!(service.create().unwrap_err().kind, ErrorKind::NotInitialized);
        assert_eq!(service.load("{}").unwrap_err().kind, ErrorKind::NotInitialized);
        assert_eq!(
            service
                .list_data_sources(ConfigHandle::from_raw(1))
                .unwrap_err()
                .kind,
            ErrorKind::NotInitialized
        );
    }

    #[test]
    fn add_then_delete_go_test() {
        let service = service();
        let handle = service.create().unwrap();

        let ack = service
            .add_data_source(handle, r#"{"DSRC_CODE": "GO_TEST"}"#)
            .unwrap();
        assert!(ack.contains("DSRC_ID"));
        assert!(service.list_data_sources(handle).unwrap().contains("GO_TEST"));

        service
            .delete_data_source(handle, r#"{"DSRC_CODE": "GO_TEST"}"#)
            .unwrap();
        assert!(!service
            .data_source_codes(handle)
            .unwrap()
            .contains(&"GO_TEST".to_string()));
        service.close(handle).unwrap();
    }

    #[test]
    fn duplicate_and_malformed_input() {
        let service = service();
        let handle = service.create().unwrap();
        let err = service
            .add_data_source(handle, r#"{"DSRC_CODE":"TEST"}"#)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidInput);
        assert!(service.last_exception().contains("already exists"));

        let err = service.add_data_source(handle, r#"{"NOPE":1}"#).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidInput);
    }

    #[test]
    fn delete_absent_code_succeeds() {
        let service = service();
        let handle = service.create().unwrap();
        let before = service.list_data_sources(handle).unwrap();
        service
            .delete_data_source(handle, r#"{"DSRC_CODE":"NEVER_ADDED"}"#)
            .unwrap();
        assert_eq!(service.list_data_sources(handle).unwrap(), before);
    }

    #[test]
    fn closed_handle_is_invalid_everywhere() {
        let service = service();
        let handle = service.create().unwrap();
        service.close(handle).unwrap();

        let kinds = [
            service.add_data_source(handle, r#"{"DSRC_CODE":"X"}"#).unwrap_err().kind,
            service.delete_data_source(handle, r#"{"DSRC_CODE":"X"}"#).unwrap_err().kind,
            service.list_data_sources(handle).unwrap_err().kind,
            service.save(handle).unwrap_err().kind,
            service.close(handle).unwrap_err().kind,
        ];
        assert!(kinds.iter().all(|k| *k == ErrorKind::InvalidHandle));
        assert_eq!(service.last_exception_code(), ErrorKind::InvalidHandle.default_code());
    }

    #[test]
    fn save_is_stable_and_loads_back() {
        let service = service();
        let handle = service.create().unwrap();
        service
            .add_data_source(handle, r#"{"DSRC_CODE":"CUSTOMERS"}"#)
            .unwrap();

        let first = service.save(handle).unwrap();
        assert_eq!(service.save(handle).unwrap(), first);

        let copy = service.load(&first).unwrap();
        assert_ne!(copy, handle);
        assert_eq!(
            service.data_source_codes(copy).unwrap(),
            service.data_source_codes(handle).unwrap()
        );
    }

    #[test]
    fn destroy_invalidates_handles() {
        let service = service();
        let handle = service.create().unwrap();
        service.destroy().unwrap();
        assert_eq!(service.open_handles(), 0);

        service
            .init(&SessionConfig::new(SystemConfiguration::simple(
                "memory://config-service-tests",
            )))
            .unwrap();
        assert_eq!(service.save(handle).unwrap_err().kind, ErrorKind::InvalidHandle);
    }

    #[test]
    fn clear_last_exception_resets_slot() {
        let service = service();
        service.save(ConfigHandle::from_raw(77)).unwrap_err();
        assert_ne!(service.last_exception(), "");
        service.clear_last_exception();
        assert_eq!(service.last_exception(), "");
        assert_eq!(service.last_exception_code(), 0);
    }
}
