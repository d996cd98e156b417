//! Configuration service FFI functions.

use crate::buffer::{out_ref, read_str, to_er_string, ErString};
use crate::error::{check, clear_last_error, ffi_call, set_last_error, ErResult};
use crate::types::{config_ref, ErConfig, ErConfigHandle};
use erbind_core::{ConfigHandle, ConfigService, SessionConfig};
use std::ffi::c_char;

/// Creates an uninitialized configuration service.
///
/// # Safety
///
/// `out_config` must be a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn erbind_config_new(out_config: *mut *mut ErConfig) -> ErResult {
    ffi_call(|| {
        let out = out_ref(out_config, "out_config")?;
        *out = Box::into_raw(Box::new(ConfigService::new())) as *mut ErConfig;
        Ok(())
    })
}

/// Frees a configuration service. A ready session is destroyed first.
///
/// # Safety
///
/// `config` must be null or a pointer from `erbind_config_new` that has not
/// been freed.
#[no_mangle]
pub unsafe extern "C" fn erbind_config_free(config: *mut ErConfig) {
    clear_last_error();
    if config.is_null() {
        return;
    }
    let service = Box::from_raw(config as *mut ConfigService);
    if service.state() == erbind_core::SessionState::Ready {
        let _ = service.destroy();
    }
}

/// Initializes the session.
///
/// # Safety
///
/// `config` must be a live service; `module_name` and `ini_params` must be
/// valid null-terminated UTF-8 strings.
#[no_mangle]
pub unsafe extern "C" fn erbind_config_init(
    config: *const ErConfig,
    module_name: *const c_char,
    ini_params: *const c_char,
    verbose_logging: bool,
) -> ErResult {
    ffi_call(|| {
        let service = config_ref(config)?;
        let session = SessionConfig::new(read_str(ini_params, "ini_params")?)
            .module_name(read_str(module_name, "module_name")?)
            .verbose_logging(verbose_logging);
        check(service.init(&session))
    })
}

/// Destroys the session; every open handle becomes invalid.
///
/// # Safety
///
/// `config` must be a live service.
#[no_mangle]
pub unsafe extern "C" fn erbind_config_destroy(config: *const ErConfig) -> ErResult {
    ffi_call(|| check(config_ref(config)?.destroy()))
}

/// Creates a document from the default template.
///
/// # Safety
///
/// `config` must be a live service; `out_handle` must be a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn erbind_config_create(
    config: *const ErConfig,
    out_handle: *mut ErConfigHandle,
) -> ErResult {
    ffi_call(|| {
        let service = config_ref(config)?;
        let out = out_ref(out_handle, "out_handle")?;
        *out = check(service.create())?.as_raw();
        Ok(())
    })
}

/// Adds a data source and returns the engine acknowledgment.
///
/// # Safety
///
/// `config` must be a live service; `input_json` a valid string; `out_result`
/// a valid pointer. The returned string must be freed with `erbind_free_string`.
#[no_mangle]
pub unsafe extern "C" fn erbind_config_add_data_source(
    config: *const ErConfig,
    handle: ErConfigHandle,
    input_json: *const c_char,
    out_result: *mut ErString,
) -> ErResult {
    ffi_call(|| {
        let service = config_ref(config)?;
        let input = read_str(input_json, "input_json")?;
        let out = out_ref(out_result, "out_result")?;
        let ack = check(service.add_data_source(ConfigHandle::from_raw(handle), input))?;
        *out = to_er_string(&ack)?;
        Ok(())
    })
}

/// Deletes a data source; an absent code is not an error.
///
/// # Safety
///
/// `config` must be a live service; `input_json` a valid string.
#[no_mangle]
pub unsafe extern "C" fn erbind_config_delete_data_source(
    config: *const ErConfig,
    handle: ErConfigHandle,
    input_json: *const c_char,
) -> ErResult {
    ffi_call(|| {
        let service = config_ref(config)?;
        let input = read_str(input_json, "input_json")?;
        check(service.delete_data_source(ConfigHandle::from_raw(handle), input))
    })
}

/// Lists the data sources of a document.
///
/// # Safety
///
/// `config` must be a live service; `out_result` a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn erbind_config_list_data_sources(
    config: *const ErConfig,
    handle: ErConfigHandle,
    out_result: *mut ErString,
) -> ErResult {
    ffi_call(|| {
        let service = config_ref(config)?;
        let out = out_ref(out_result, "out_result")?;
        let list = check(service.list_data_sources(ConfigHandle::from_raw(handle)))?;
        *out = to_er_string(&list)?;
        Ok(())
    })
}

/// Serializes a document.
///
/// # Safety
///
/// `config` must be a live service; `out_result` a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn erbind_config_save(
    config: *const ErConfig,
    handle: ErConfigHandle,
    out_result: *mut ErString,
) -> ErResult {
    ffi_call(|| {
        let service = config_ref(config)?;
        let out = out_ref(out_result, "out_result")?;
        let saved = check(service.save(ConfigHandle::from_raw(handle)))?;
        *out = to_er_string(&saved)?;
        Ok(())
    })
}

/// Opens a handle on a saved document.
///
/// # Safety
///
/// `config` must be a live service; `config_json` a valid string;
/// `out_handle` a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn erbind_config_load(
    config: *const ErConfig,
    config_json: *const c_char,
    out_handle: *mut ErConfigHandle,
) -> ErResult {
    ffi_call(|| {
        let service = config_ref(config)?;
        let json = read_str(config_json, "config_json")?;
        let out = out_ref(out_handle, "out_handle")?;
        *out = check(service.load(json))?.as_raw();
        Ok(())
    })
}

/// Releases a document.
///
/// # Safety
///
/// `config` must be a live service.
#[no_mangle]
pub unsafe extern "C" fn erbind_config_close(
    config: *const ErConfig,
    handle: ErConfigHandle,
) -> ErResult {
    ffi_call(|| check(config_ref(config)?.close(ConfigHandle::from_raw(handle))))
}

/// Returns the session's last failure message (empty string if none).
///
/// # Safety
///
/// `config` must be a live service; `out_message` a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn erbind_config_last_exception(
    config: *const ErConfig,
    out_message: *mut ErString,
) -> ErResult {
    ffi_call(|| {
        let service = config_ref(config)?;
        let out = out_ref(out_message, "out_message")?;
        *out = to_er_string(&service.last_exception())?;
        Ok(())
    })
}

/// Returns the session's last failure code, zero if none or if `config` is
/// null.
///
/// # Safety
///
/// `config` must be null or a live service.
#[no_mangle]
pub unsafe extern "C" fn erbind_config_last_exception_code(config: *const ErConfig) -> i64 {
    match (config as *const ConfigService).as_ref() {
        Some(service) => service.last_exception_code(),
        None => {
            set_last_error("null pointer argument: config");
            0
        }
    }
}

/// Clears the session's last failure.
///
/// # Safety
///
/// `config` must be a live service.
#[no_mangle]
pub unsafe extern "C" fn erbind_config_clear_last_exception(config: *const ErConfig) -> ErResult {
    ffi_call(|| {
        config_ref(config)?.clear_last_exception();
        Ok(())
    })
}
