//! Native module traits.

use crate::error::{NativeResult, ReturnCode};

/// A handle issued by a native module.
///
/// Handle values are opaque. They are never reused within a module instance,
/// but carry no meaning outside of it.
pub type NativeHandle = u64;

/// Lifecycle and error reporting shared by every native module.
///
/// # Invariants
///
/// - Every call other than `init` fails with `NOT_INITIALIZED` before a
///   successful `init`
/// - A failing call stores a message and code readable through
///   `last_exception` and `last_exception_code`
/// - A successful call leaves the exception state untouched
///
/// # Implementors
///
/// - [`crate::MemoryConfigModule`]
/// - [`crate::MemoryDiagnosticModule`]
pub trait NativeModule: Send {
    /// Initializes the module from an engine settings JSON document.
    ///
    /// `verbose` enables engine-side logging.
    fn init(&mut self, module_name: &str, ini_params: &str, verbose: bool) -> NativeResult<()>;

    /// Releases every resource held by the module.
    fn destroy(&mut self) -> NativeResult<()>;

    /// Returns the message of the last failure, empty if none.
    fn last_exception(&self) -> String;

    /// Returns the code of the last failure, zero if none.
    fn last_exception_code(&self) -> ReturnCode;

    /// Clears the stored failure.
    fn clear_last_exception(&mut self);
}

/// Configuration document management.
///
/// Each handle owns an independent in-memory configuration document.
pub trait ConfigModule: NativeModule {
    /// Creates a document from the default template.
    fn create(&mut self) -> NativeResult<NativeHandle>;

    /// Adds a data source described by `{"DSRC_CODE": ...}`.
    ///
    /// Returns `{"DSRC_ID": n}` for the new data source.
    fn add_data_source(&mut self, handle: NativeHandle, input_json: &str) -> NativeResult<String>;

    /// Deletes the data source named by `{"DSRC_CODE": ...}`.
    ///
    /// Deleting an absent code succeeds.
    fn delete_data_source(&mut self, handle: NativeHandle, input_json: &str) -> NativeResult<()>;

    /// Lists the data sources of a document.
    fn list_data_sources(&mut self, handle: NativeHandle) -> NativeResult<String>;

    /// Serializes a document.
    fn save(&mut self, handle: NativeHandle) -> NativeResult<String>;

    /// Creates a document from a serialized one.
    fn load(&mut self, config_json: &str) -> NativeResult<NativeHandle>;

    /// Releases a document.
    fn close(&mut self, handle: NativeHandle) -> NativeResult<()>;
}

/// Read-only introspection of a resolution repository.
pub trait DiagnosticModule: NativeModule {
    /// Initializes the module bound to a specific persisted configuration.
    fn init_with_config_id(
        &mut self,
        module_name: &str,
        ini_params: &str,
        config_id: i64,
        verbose: bool,
    ) -> NativeResult<()>;

    /// Switches the active configuration.
    ///
    /// On failure the previous configuration stays active.
    fn reinit(&mut self, config_id: i64) -> NativeResult<()>;

    /// Measures repository insert throughput for `seconds_to_run` seconds.
    fn check_db_perf(&mut self, seconds_to_run: i32) -> NativeResult<String>;

    /// Returns the available system memory in bytes.
    fn get_available_memory(&mut self) -> NativeResult<i64>;

    /// Returns the total system memory in bytes.
    fn get_total_system_memory(&mut self) -> NativeResult<i64>;

    /// Returns the number of physical CPU cores.
    fn get_physical_cores(&mut self) -> NativeResult<i32>;

    /// Returns the number of logical CPU cores.
    fn get_logical_cores(&mut self) -> NativeResult<i32>;

    /// Describes the repository database.
    fn get_db_info(&mut self) -> NativeResult<String>;

    /// Counts records and entities per data source.
    fn get_data_source_counts(&mut self) -> NativeResult<String>;

    /// Describes a resolved entity.
    fn get_entity_details(
        &mut self,
        entity_id: i64,
        include_internal_features: bool,
    ) -> NativeResult<String>;

    /// Summarizes an entity and the records of its related entities.
    fn get_entity_resume(&mut self, entity_id: i64) -> NativeResult<String>;

    /// Describes a relationship between two entities.
    fn get_relationship_details(
        &mut self,
        relationship_id: i64,
        include_internal_features: bool,
    ) -> NativeResult<String>;

    /// Counts entities per size, for sizes of at least `minimum_entity_size`.
    fn get_entity_size_breakdown(
        &mut self,
        minimum_entity_size: i32,
        include_internal_features: bool,
    ) -> NativeResult<String>;

    /// Describes a library feature.
    fn get_feature(&mut self, lib_feat_id: i64) -> NativeResult<String>;

    /// Lists features of a type shared by more than `maximum_estimated_count` entities.
    fn get_generic_features(
        &mut self,
        feature_type: &str,
        maximum_estimated_count: i32,
    ) -> NativeResult<String>;

    /// Counts records and features per data source and feature type.
    fn get_mapping_statistics(&mut self, include_internal_features: bool) -> NativeResult<String>;

    /// Summarizes resolution outcomes.
    fn get_resolution_statistics(&mut self) -> NativeResult<String>;

    /// Finds entities sharing any of the listed features with an entity.
    fn find_entities_by_feature_ids(&mut self, features: &str) -> NativeResult<String>;

    /// Opens a cursor over entities with at least `entity_size` records.
    fn get_entity_list_by_size(&mut self, entity_size: i32) -> NativeResult<NativeHandle>;

    /// Advances a cursor.
    ///
    /// Returns `Ok(None)` once when the cursor is exhausted. Fetching again
    /// after that fails with `INVALID_HANDLE`.
    fn fetch_next_entity_by_size(&mut self, handle: NativeHandle) -> NativeResult<Option<String>>;

    /// Releases a cursor.
    fn close_entity_list_by_size(&mut self, handle: NativeHandle) -> NativeResult<()>;
}
