//! # erbind core
//!
//! Binding layer over an entity resolution engine.
//!
//! The engine is reached through the module traits of [`erbind_native`]. This
//! crate adds what callers need on top of that bare interface:
//!
//! - [`ConfigService`] and [`DiagnosticService`], each owning one native
//!   module behind a mutex
//! - an explicit session lifecycle (`init`, `destroy`, `reinit`)
//! - typed, generational handle tokens ([`ConfigHandle`], [`EntityListHandle`])
//!   that never expose native handle values
//! - structured errors ([`BindError`]) on every call, mirrored into a
//!   last-exception slot for callers that poll after a failure
//!
//! ## Example
//!
//! ```rust
//! use erbind_core::{ConfigService, ErrorKind, SessionConfig, SystemConfiguration};
//!
//! let service = ConfigService::new();
//! assert_eq!(service.create().unwrap_err().kind, ErrorKind::NotInitialized);
//!
//! let settings = SystemConfiguration::simple("memory://crate-doc");
//! service.init(&SessionConfig::new(settings).module_name("docs")).unwrap();
//!
//! let handle = service.create().unwrap();
//! service.close(handle).unwrap();
//! let err = service.save(handle).unwrap_err();
//! assert_eq!(err.kind, ErrorKind::InvalidHandle);
//! assert_eq!(service.last_exception(), err.message);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod diagnostic;
mod entity_list;
mod error;
mod exception;
mod handle;
mod session;
mod settings;

pub use config::ConfigService;
pub use diagnostic::DiagnosticService;
pub use entity_list::{EntitiesBySize, EntityRow};
pub use error::{BindError, BindResult, ErrorKind};
pub use exception::LastException;
pub use handle::{ConfigHandle, EntityListHandle, HandleTable};
pub use session::{CancelToken, Session, SessionConfig, SessionState, DEFAULT_MODULE_NAME};
pub use settings::{
    resolve_database_url, SystemConfiguration, DATABASE_URL_ENV, DEFAULT_DATABASE_URL,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
