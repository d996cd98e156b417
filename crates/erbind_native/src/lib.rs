//! # erbind native
//!
//! The boundary between the erbind binding and the entity resolution engine.
//!
//! The engine is a closed native library. The binding never sees its internals:
//! every call returns either a value or a bare [`ReturnCode`], and the reason for
//! a failure is read afterwards from the module's last-exception state. This
//! crate models that contract as traits and ships an in-process reference engine
//! that honors it.
//!
//! ## Modules
//!
//! - [`ConfigModule`] - in-memory configuration documents behind native handles
//! - [`DiagnosticModule`] - read-only introspection of a resolution repository
//!
//! ## Reference engine
//!
//! - [`MemoryConfigModule`] and [`MemoryDiagnosticModule`] operate on a
//!   [`Repository`] selected by the `SQL.CONNECTION` setting
//!   (`memory://<name>` or `file://<path>`).
//!
//! ## Example
//!
//! ```rust
//! use erbind_native::{ConfigModule, MemoryConfigModule, NativeModule};
//!
//! let settings = r#"{"PIPELINE":{},"SQL":{"CONNECTION":"memory://doc"}}"#;
//! let mut module = MemoryConfigModule::new();
//! module.init("example", settings, false).unwrap();
//!
//! let handle = module.create().unwrap();
//! module.add_data_source(handle, r#"{"DSRC_CODE":"CUSTOMERS"}"#).unwrap();
//! assert!(module.list_data_sources(handle).unwrap().contains("CUSTOMERS"));
//! module.close(handle).unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod document;
mod error;
mod memory;
mod module;
mod repository;
mod settings;
mod system;

pub use document::{ConfigDocument, DataSource, MAX_CODE_LEN};
pub use error::{codes, EngineError, EngineResult, ExceptionState, NativeResult, ReturnCode};
pub use memory::{MemoryConfigModule, MemoryDiagnosticModule, DEFAULT_HANDLE_LIMIT};
pub use module::{ConfigModule, DiagnosticModule, NativeHandle, NativeModule};
pub use repository::{
    drop_memory_repository, memory_repository, Feature, Record, Relationship, Repository,
    SharedRepository,
};
pub use settings::{DatabaseUrl, EngineSettings, PipelineSettings, SqlSettings};
pub use system::SystemInfo;
