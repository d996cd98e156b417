//! Diagnostic service FFI functions.

use crate::buffer::{out_ref, read_str, to_er_string, ErString};
use crate::error::{check, clear_last_error, ffi_call, set_last_error, ErResult};
use crate::types::{diagnostic_ref, ErDiagnostic, ErEntityListHandle};
use erbind_core::{BindResult, DiagnosticService, EntityListHandle, SessionConfig, SessionState};
use std::ffi::c_char;

/// Runs a JSON-returning query and writes the result to `out_result`.
unsafe fn json_query(
    diagnostic: *const ErDiagnostic,
    out_result: *mut ErString,
    query: impl FnOnce(&DiagnosticService) -> BindResult<String>,
) -> ErResult {
    ffi_call(|| {
        let service = diagnostic_ref(diagnostic)?;
        let out = out_ref(out_result, "out_result")?;
        let json = check(query(service))?;
        *out = to_er_string(&json)?;
        Ok(())
    })
}

/// Runs a scalar query and writes the result to `out_value`.
unsafe fn scalar_query<T>(
    diagnostic: *const ErDiagnostic,
    out_value: *mut T,
    query: impl FnOnce(&DiagnosticService) -> BindResult<T>,
) -> ErResult {
    ffi_call(|| {
        let service = diagnostic_ref(diagnostic)?;
        let out = out_ref(out_value, "out_value")?;
        *out = check(query(service))?;
        Ok(())
    })
}

/// Creates an uninitialized diagnostic service.
///
/// # Safety
///
/// `out_diagnostic` must be a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn erbind_diagnostic_new(
    out_diagnostic: *mut *mut ErDiagnostic,
) -> ErResult {
    ffi_call(|| {
        let out = out_ref(out_diagnostic, "out_diagnostic")?;
        *out = Box::into_raw(Box::new(DiagnosticService::new())) as *mut ErDiagnostic;
        Ok(())
    })
}

/// Frees a diagnostic service. A ready session is destroyed first.
///
/// # Safety
///
/// `diagnostic` must be null or a pointer from `erbind_diagnostic_new` that
/// has not been freed.
#[no_mangle]
pub unsafe extern "C" fn erbind_diagnostic_free(diagnostic: *mut ErDiagnostic) {
    clear_last_error();
    if diagnostic.is_null() {
        return;
    }
    let service = Box::from_raw(diagnostic as *mut DiagnosticService);
    if service.state() == SessionState::Ready {
        let _ = service.destroy();
    }
}

/// Initializes the session bound to the repository's default configuration.
///
/// # Safety
///
/// `diagnostic` must be a live service; `module_name` and `ini_params` must
/// be valid null-terminated UTF-8 strings.
#[no_mangle]
pub unsafe extern "C" fn erbind_diagnostic_init(
    diagnostic: *const ErDiagnostic,
    module_name: *const c_char,
    ini_params: *const c_char,
    verbose_logging: bool,
) -> ErResult {
    ffi_call(|| {
        let service = diagnostic_ref(diagnostic)?;
        let session = SessionConfig::new(read_str(ini_params, "ini_params")?)
            .module_name(read_str(module_name, "module_name")?)
            .verbose_logging(verbose_logging);
        check(service.init(&session))
    })
}

/// Initializes the session bound to a persisted configuration.
///
/// # Safety
///
/// Same as `erbind_diagnostic_init`.
#[no_mangle]
pub unsafe extern "C" fn erbind_diagnostic_init_with_config_id(
    diagnostic: *const ErDiagnostic,
    module_name: *const c_char,
    ini_params: *const c_char,
    config_id: i64,
    verbose_logging: bool,
) -> ErResult {
    ffi_call(|| {
        let service = diagnostic_ref(diagnostic)?;
        let session = SessionConfig::new(read_str(ini_params, "ini_params")?)
            .module_name(read_str(module_name, "module_name")?)
            .verbose_logging(verbose_logging);
        check(service.init_with_config_id(&session, config_id))
    })
}

/// Switches the active configuration.
///
/// # Safety
///
/// `diagnostic` must be a live service.
#[no_mangle]
pub unsafe extern "C" fn erbind_diagnostic_reinit(
    diagnostic: *const ErDiagnostic,
    config_id: i64,
) -> ErResult {
    ffi_call(|| check(diagnostic_ref(diagnostic)?.reinit(config_id)))
}

/// Destroys the session; every open entity list becomes invalid.
///
/// # Safety
///
/// `diagnostic` must be a live service.
#[no_mangle]
pub unsafe extern "C" fn erbind_diagnostic_destroy(diagnostic: *const ErDiagnostic) -> ErResult {
    ffi_call(|| check(diagnostic_ref(diagnostic)?.destroy()))
}

/// Runs a write benchmark.
///
/// # Safety
///
/// `diagnostic` must be a live service; `out_result` a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn erbind_diagnostic_check_db_perf(
    diagnostic: *const ErDiagnostic,
    seconds_to_run: i32,
    out_result: *mut ErString,
) -> ErResult {
    json_query(diagnostic, out_result, |s| s.check_db_perf(seconds_to_run))
}

/// Returns the available memory in bytes.
///
/// # Safety
///
/// `diagnostic` must be a live service; `out_value` a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn erbind_diagnostic_get_available_memory(
    diagnostic: *const ErDiagnostic,
    out_value: *mut i64,
) -> ErResult {
    scalar_query(diagnostic, out_value, DiagnosticService::get_available_memory)
}

/// Returns the total system memory in bytes.
///
/// # Safety
///
/// `diagnostic` must be a live service; `out_value` a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn erbind_diagnostic_get_total_system_memory(
    diagnostic: *const ErDiagnostic,
    out_value: *mut i64,
) -> ErResult {
    scalar_query(diagnostic, out_value, DiagnosticService::get_total_system_memory)
}

/// Returns the number of physical cores.
///
/// # Safety
///
/// `diagnostic` must be a live service; `out_value` a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn erbind_diagnostic_get_physical_cores(
    diagnostic: *const ErDiagnostic,
    out_value: *mut i32,
) -> ErResult {
    scalar_query(diagnostic, out_value, DiagnosticService::get_physical_cores)
}

/// Returns the number of logical cores.
///
/// # Safety
///
/// `diagnostic` must be a live service; `out_value` a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn erbind_diagnostic_get_logical_cores(
    diagnostic: *const ErDiagnostic,
    out_value: *mut i32,
) -> ErResult {
    scalar_query(diagnostic, out_value, DiagnosticService::get_logical_cores)
}

/// Describes the repository database.
///
/// # Safety
///
/// `diagnostic` must be a live service; `out_result` a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn erbind_diagnostic_get_db_info(
    diagnostic: *const ErDiagnostic,
    out_result: *mut ErString,
) -> ErResult {
    json_query(diagnostic, out_result, DiagnosticService::get_db_info)
}

/// Returns record and entity counts per data source.
///
/// # Safety
///
/// `diagnostic` must be a live service; `out_result` a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn erbind_diagnostic_get_data_source_counts(
    diagnostic: *const ErDiagnostic,
    out_result: *mut ErString,
) -> ErResult {
    json_query(diagnostic, out_result, DiagnosticService::get_data_source_counts)
}

/// Describes an entity.
///
/// # Safety
///
/// `diagnostic` must be a live service; `out_result` a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn erbind_diagnostic_get_entity_details(
    diagnostic: *const ErDiagnostic,
    entity_id: i64,
    include_internal_features: bool,
    out_result: *mut ErString,
) -> ErResult {
    json_query(diagnostic, out_result, |s| {
        s.get_entity_details(entity_id, include_internal_features)
    })
}

/// Summarizes an entity and its related entities.
///
/// # Safety
///
/// `diagnostic` must be a live service; `out_result` a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn erbind_diagnostic_get_entity_resume(
    diagnostic: *const ErDiagnostic,
    entity_id: i64,
    out_result: *mut ErString,
) -> ErResult {
    json_query(diagnostic, out_result, |s| s.get_entity_resume(entity_id))
}

/// Describes a relationship.
///
/// # Safety
///
/// `diagnostic` must be a live service; `out_result` a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn erbind_diagnostic_get_relationship_details(
    diagnostic: *const ErDiagnostic,
    relationship_id: i64,
    include_internal_features: bool,
    out_result: *mut ErString,
) -> ErResult {
    json_query(diagnostic, out_result, |s| {
        s.get_relationship_details(relationship_id, include_internal_features)
    })
}

/// Returns the entity size histogram.
///
/// # Safety
///
/// `diagnostic` must be a live service; `out_result` a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn erbind_diagnostic_get_entity_size_breakdown(
    diagnostic: *const ErDiagnostic,
    minimum_entity_size: i32,
    include_internal_features: bool,
    out_result: *mut ErString,
) -> ErResult {
    json_query(diagnostic, out_result, |s| {
        s.get_entity_size_breakdown(minimum_entity_size, include_internal_features)
    })
}

/// Describes a library feature.
///
/// # Safety
///
/// `diagnostic` must be a live service; `out_result` a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn erbind_diagnostic_get_feature(
    diagnostic: *const ErDiagnostic,
    lib_feat_id: i64,
    out_result: *mut ErString,
) -> ErResult {
    json_query(diagnostic, out_result, |s| s.get_feature(lib_feat_id))
}

/// Lists widely shared features of a type.
///
/// # Safety
///
/// `diagnostic` must be a live service; `feature_type` a valid string;
/// `out_result` a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn erbind_diagnostic_get_generic_features(
    diagnostic: *const ErDiagnostic,
    feature_type: *const c_char,
    maximum_estimated_count: i32,
    out_result: *mut ErString,
) -> ErResult {
    let feature_type = match read_str(feature_type, "feature_type") {
        Ok(s) => s,
        Err(code) => return code,
    };
    json_query(diagnostic, out_result, |s| {
        s.get_generic_features(feature_type, maximum_estimated_count)
    })
}

/// Returns mapping statistics.
///
/// # Safety
///
/// `diagnostic` must be a live service; `out_result` a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn erbind_diagnostic_get_mapping_statistics(
    diagnostic: *const ErDiagnostic,
    include_internal_features: bool,
    out_result: *mut ErString,
) -> ErResult {
    json_query(diagnostic, out_result, |s| {
        s.get_mapping_statistics(include_internal_features)
    })
}

/// Returns resolution statistics.
///
/// # Safety
///
/// `diagnostic` must be a live service; `out_result` a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn erbind_diagnostic_get_resolution_statistics(
    diagnostic: *const ErDiagnostic,
    out_result: *mut ErString,
) -> ErResult {
    json_query(diagnostic, out_result, DiagnosticService::get_resolution_statistics)
}

/// Finds entities sharing features with an entity.
///
/// # Safety
///
/// `diagnostic` must be a live service; `features` a valid string;
/// `out_result` a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn erbind_diagnostic_find_entities_by_feature_ids(
    diagnostic: *const ErDiagnostic,
    features: *const c_char,
    out_result: *mut ErString,
) -> ErResult {
    let features = match read_str(features, "features") {
        Ok(s) => s,
        Err(code) => return code,
    };
    json_query(diagnostic, out_result, |s| s.find_entities_by_feature_ids(features))
}

/// Opens an entity list cursor.
///
/// # Safety
///
/// `diagnostic` must be a live service; `out_handle` a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn erbind_diagnostic_get_entity_list_by_size(
    diagnostic: *const ErDiagnostic,
    entity_size: i32,
    out_handle: *mut ErEntityListHandle,
) -> ErResult {
    scalar_query(diagnostic, out_handle, |s| {
        s.get_entity_list_by_size(entity_size).map(EntityListHandle::as_raw)
    })
}

/// Fetches the next entity row.
///
/// On exhaustion returns `Ok` and writes a null string; fetching again after
/// that is `InvalidHandle`.
///
/// # Safety
///
/// `diagnostic` must be a live service; `out_row` a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn erbind_diagnostic_fetch_next_entity_by_size(
    diagnostic: *const ErDiagnostic,
    handle: ErEntityListHandle,
    out_row: *mut ErString,
) -> ErResult {
    ffi_call(|| {
        let service = diagnostic_ref(diagnostic)?;
        let out = out_ref(out_row, "out_row")?;
        let next = service.fetch_next_entity_by_size(EntityListHandle::from_raw(handle));
        *out = match check(next)? {
            Some(row) => to_er_string(&row)?,
            None => ErString::empty(),
        };
        Ok(())
    })
}

/// Closes an entity list cursor.
///
/// # Safety
///
/// `diagnostic` must be a live service.
#[no_mangle]
pub unsafe extern "C" fn erbind_diagnostic_close_entity_list_by_size(
    diagnostic: *const ErDiagnostic,
    handle: ErEntityListHandle,
) -> ErResult {
    ffi_call(|| {
        let service = diagnostic_ref(diagnostic)?;
        check(service.close_entity_list_by_size(EntityListHandle::from_raw(handle)))
    })
}

/// Returns the session's last failure message (empty string if none).
///
/// # Safety
///
/// `diagnostic` must be a live service; `out_message` a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn erbind_diagnostic_last_exception(
    diagnostic: *const ErDiagnostic,
    out_message: *mut ErString,
) -> ErResult {
    ffi_call(|| {
        let service = diagnostic_ref(diagnostic)?;
        let out = out_ref(out_message, "out_message")?;
        *out = to_er_string(&service.last_exception())?;
        Ok(())
    })
}

/// Returns the session's last failure code, zero if none or if `diagnostic`
/// is null.
///
/// # Safety
///
/// `diagnostic` must be null or a live service.
#[no_mangle]
pub unsafe extern "C" fn erbind_diagnostic_last_exception_code(
    diagnostic: *const ErDiagnostic,
) -> i64 {
    match (diagnostic as *const DiagnosticService).as_ref() {
        Some(service) => service.last_exception_code(),
        None => {
            set_last_error("null pointer argument: diagnostic");
            0
        }
    }
}

/// Clears the session's last failure.
///
/// # Safety
///
/// `diagnostic` must be a live service.
#[no_mangle]
pub unsafe extern "C" fn erbind_diagnostic_clear_last_exception(
    diagnostic: *const ErDiagnostic,
) -> ErResult {
    ffi_call(|| {
        diagnostic_ref(diagnostic)?.clear_last_exception();
        Ok(())
    })
}
