//! # erbind testkit
//!
//! Test utilities for erbind.
//!
//! This crate provides:
//! - Uniquely named repositories (in-memory or snapshot files) with cleanup
//! - Services initialized against them
//! - Property-based generators for data source codes and config operations
//! - Multi-threaded stress helpers for shared services
//!
//! Cross-crate integration tests live in this crate's `tests/` directory.
//!
//! ## Usage
//!
//! ```rust
//! use erbind_testkit::prelude::*;
//!
//! with_diagnostic_service(|service| {
//!     let rows: Vec<_> = service.entities_by_size(10).unwrap().collect();
//!     assert_eq!(rows.len(), 2);
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use stress::*;
