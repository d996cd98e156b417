//! In-memory configuration module.

use super::{ready, DEFAULT_HANDLE_LIMIT};
use crate::document::ConfigDocument;
use crate::error::{EngineError, EngineResult, ExceptionState, NativeResult, ReturnCode};
use crate::module::{ConfigModule, NativeHandle, NativeModule};
use crate::settings::EngineSettings;
use serde_json::json;
use std::collections::HashMap;
use tracing::debug;

/// Configuration module keeping documents in memory.
///
/// Handles are allocated from a counter and never reused, so a closed handle
/// can never alias a newer document.
///
/// # Example
///
/// ```rust
/// use erbind_native::{ConfigModule, MemoryConfigModule, NativeModule};
///
/// let mut module = MemoryConfigModule::new();
/// module
///     .init("docs", r#"{"PIPELINE":{},"SQL":{"CONNECTION":"memory://docs"}}"#, false)
///     .unwrap();
/// let handle = module.create().unwrap();
/// let saved = module.save(handle).unwrap();
/// let copy = module.load(&saved).unwrap();
/// assert_eq!(module.save(copy).unwrap(), saved);
/// ```
#[derive(Debug)]
pub struct MemoryConfigModule {
    exception: ExceptionState,
    state: Option<ConfigState>,
    handle_limit: usize,
}

#[derive(Debug)]
struct ConfigState {
    module_name: String,
    verbose: bool,
    documents: HashMap<NativeHandle, ConfigDocument>,
    next_handle: NativeHandle,
}

impl ConfigState {
    fn document(&mut self, handle: NativeHandle) -> EngineResult<&mut ConfigDocument> {
        self.documents
            .get_mut(&handle)
            .ok_or(EngineError::InvalidHandle {
                handle,
                reason: "unknown or closed configuration handle",
            })
    }

    fn insert(&mut self, doc: ConfigDocument, limit: usize) -> EngineResult<NativeHandle> {
        if self.documents.len() >= limit {
            return Err(EngineError::ResourceLimit(format!(
                "{limit} configuration handles already open"
            )));
        }
        self.next_handle += 1;
        let handle = self.next_handle;
        self.documents.insert(handle, doc);
        if self.verbose {
            debug!(module = %self.module_name, handle, "configuration handle opened");
        }
        Ok(handle)
    }
}

impl MemoryConfigModule {
    /// Creates an uninitialized module.
    pub fn new() -> Self {
        Self {
            exception: ExceptionState::new(),
            state: None,
            handle_limit: DEFAULT_HANDLE_LIMIT,
        }
    }

    /// Sets the maximum number of open configuration handles.
    #[must_use]
    pub fn with_handle_limit(mut self, limit: usize) -> Self {
        self.handle_limit = limit;
        self
    }

    /// Returns the number of open configuration handles.
    pub fn open_handles(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.documents.len())
    }

    fn with_state<T>(
        &mut self,
        op: impl FnOnce(&mut ConfigState) -> EngineResult<T>,
    ) -> NativeResult<T> {
        let result = ready(&mut self.state).and_then(op);
        self.exception.capture(result)
    }
}

impl Default for MemoryConfigModule {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeModule for MemoryConfigModule {
    fn init(&mut self, module_name: &str, ini_params: &str, verbose: bool) -> NativeResult<()> {
        let result = EngineSettings::parse(ini_params).map(|_| ConfigState {
            module_name: module_name.to_string(),
            verbose,
            documents: HashMap::new(),
            next_handle: 0,
        });
        let state = self.exception.capture(result)?;
        if verbose {
            debug!(module = %module_name, "configuration module initialized");
        }
        self.state = Some(state);
        Ok(())
    }

    fn destroy(&mut self) -> NativeResult<()> {
        let result = self.state.take().ok_or(EngineError::NotInitialized);
        let state = self.exception.capture(result)?;
        if state.verbose {
            debug!(
                module = %state.module_name,
                released = state.documents.len(),
                "configuration module destroyed"
            );
        }
        Ok(())
    }

    fn last_exception(&self) -> String {
        self.exception.message().to_string()
    }

    fn last_exception_code(&self) -> ReturnCode {
        self.exception.code()
    }

    fn clear_last_exception(&mut self) {
        self.exception.clear();
    }
}

impl ConfigModule for MemoryConfigModule {
    fn create(&mut self) -> NativeResult<NativeHandle> {
        let limit = self.handle_limit;
        self.with_state(|s| s.insert(ConfigDocument::template(), limit))
    }

    fn add_data_source(&mut self, handle: NativeHandle, input_json: &str) -> NativeResult<String> {
        self.with_state(|s| {
            let id = s.document(handle)?.add_data_source(input_json)?;
            Ok(json!({ "DSRC_ID": id }).to_string())
        })
    }

    fn delete_data_source(&mut self, handle: NativeHandle, input_json: &str) -> NativeResult<()> {
        self.with_state(|s| {
            s.document(handle)?.delete_data_source(input_json)?;
            Ok(())
        })
    }

    fn list_data_sources(&mut self, handle: NativeHandle) -> NativeResult<String> {
        self.with_state(|s| Ok(s.document(handle)?.list_json()))
    }

    fn save(&mut self, handle: NativeHandle) -> NativeResult<String> {
        self.with_state(|s| s.document(handle)?.to_json())
    }

    fn load(&mut self, config_json: &str) -> NativeResult<NativeHandle> {
        let limit = self.handle_limit;
        self.with_state(|s| {
            let doc = ConfigDocument::from_json(config_json)?;
            s.insert(doc, limit)
        })
    }

    fn close(&mut self, handle: NativeHandle) -> NativeResult<()> {
        self.with_state(|s| {
            s.documents
                .remove(&handle)
                .map(|_| ())
                .ok_or(EngineError::InvalidHandle {
                    handle,
                    reason: "unknown or closed configuration handle",
                })
        })
    }
}
