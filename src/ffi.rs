//! FFI bindings for Viewtime
//!
//! C-compatible functions for driving the view metrics processor from other
//! languages. All functions take null-terminated UTF-8 strings and return
//! allocated memory that must be freed by the caller with
//! `viewtime_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use chrono::{DateTime, Utc};

use crate::config::MetricsConfig;
use crate::pipeline::{replay_to_json, ViewMetricsProcessor};
use crate::report::reports_to_json;
use crate::schema::ViewEvent;
use crate::types::ViewId;

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Convert a Rust string to an owned C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => {
            set_last_error("Output contains an interior NUL byte");
            ptr::null_mut()
        }
    }
}

/// Config from an optional JSON string; NULL selects the defaults
unsafe fn config_from_ptr(config_json: *const c_char) -> Result<MetricsConfig, String> {
    if config_json.is_null() {
        return Ok(MetricsConfig::default());
    }
    let json = cstr_to_string(config_json).ok_or("Invalid config string pointer")?;
    MetricsConfig::from_json(&json).map_err(|e| e.to_string())
}

// ============================================================================
// Stateless API
// ============================================================================

/// Replay recorded events (NDJSON or JSON array) and return a JSON array of
/// view reports.
///
/// # Safety
/// - `events` must be a valid null-terminated C string.
/// - `config_json` must be NULL or a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `viewtime_free_string`.
/// - Returns NULL on error; call `viewtime_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn viewtime_replay(
    events: *const c_char,
    config_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let Some(input) = cstr_to_string(events) else {
        set_last_error("Invalid events string pointer");
        return ptr::null_mut();
    };
    let config = match config_from_ptr(config_json) {
        Ok(config) => config,
        Err(e) => {
            set_last_error(&e);
            return ptr::null_mut();
        }
    };

    match replay_to_json(&input, &config) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateful Processor API
// ============================================================================

/// Opaque handle to a ViewMetricsProcessor
pub struct ViewtimeProcessorHandle {
    processor: ViewMetricsProcessor,
}

/// Create a new processor.
///
/// # Safety
/// - `config_json` must be NULL (default configuration) or a valid
///   null-terminated C string.
/// - Must be freed with `viewtime_processor_free`.
/// - Returns NULL on error; call `viewtime_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn viewtime_processor_new(
    config_json: *const c_char,
) -> *mut ViewtimeProcessorHandle {
    clear_last_error();

    let processor = match config_from_ptr(config_json)
        .and_then(|config| ViewMetricsProcessor::with_config(config).map_err(|e| e.to_string()))
    {
        Ok(processor) => processor,
        Err(e) => {
            set_last_error(&e);
            return ptr::null_mut();
        }
    };

    Box::into_raw(Box::new(ViewtimeProcessorHandle { processor }))
}

/// Free a processor.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `viewtime_processor_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn viewtime_processor_free(processor: *mut ViewtimeProcessorHandle) {
    if !processor.is_null() {
        drop(Box::from_raw(processor));
    }
}

/// Push one event into the processor.
///
/// Returns a JSON array holding the report emitted by the event (a view
/// stop), or an empty array.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `viewtime_processor_new`.
/// - `event_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `viewtime_free_string`.
/// - Returns NULL on error; call `viewtime_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn viewtime_processor_push(
    processor: *mut ViewtimeProcessorHandle,
    event_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }
    let handle = &mut *processor;

    let Some(json) = cstr_to_string(event_json) else {
        set_last_error("Invalid event string pointer");
        return ptr::null_mut();
    };

    let event: ViewEvent = match serde_json::from_str(&json) {
        Ok(event) => event,
        Err(e) => {
            set_last_error(&format!("Invalid event: {e}"));
            return ptr::null_mut();
        }
    };
    if let Err(e) = event.validate() {
        set_last_error(&format!("Invalid event: {e}"));
        return ptr::null_mut();
    }

    let reports: Vec<_> = handle.processor.process(event).into_iter().collect();
    match reports_to_json(&reports, false) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Report the current metrics of a live view without stopping it.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `viewtime_processor_new`.
/// - `view_id` must be a valid null-terminated C string holding a UUID.
/// - `now_rfc3339` must be a valid null-terminated C string holding an RFC 3339 timestamp.
/// - Returns a newly allocated string that must be freed with `viewtime_free_string`.
/// - Returns NULL on error or for an unknown view; call `viewtime_last_error`
///   to get the error message.
#[no_mangle]
pub unsafe extern "C" fn viewtime_processor_report(
    processor: *mut ViewtimeProcessorHandle,
    view_id: *const c_char,
    now_rfc3339: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }
    let handle = &mut *processor;

    let view_id = match cstr_to_string(view_id).map(|s| s.parse::<uuid::Uuid>()) {
        Some(Ok(uuid)) => ViewId(uuid),
        _ => {
            set_last_error("Invalid view id");
            return ptr::null_mut();
        }
    };
    let now = match cstr_to_string(now_rfc3339).map(|s| DateTime::parse_from_rfc3339(&s)) {
        Some(Ok(date)) => date.with_timezone(&Utc),
        _ => {
            set_last_error("Invalid RFC 3339 timestamp");
            return ptr::null_mut();
        }
    };

    let Some(report) = handle.processor.report_for(view_id, now) else {
        set_last_error(&format!("Unknown view: {view_id}"));
        return ptr::null_mut();
    };
    match report.to_json() {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Viewtime functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Viewtime function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn viewtime_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next Viewtime function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn viewtime_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

/// Get the Viewtime library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn viewtime_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
