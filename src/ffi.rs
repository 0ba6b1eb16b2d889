//! FFI bindings for microsim-snapshot
//!
//! C-compatible place-id lookup for simulation engines that keep their own
//! snapshot loader. An indexer handle is built from configuration JSON and
//! queried per (category, local id). Strings returned by this module must be
//! freed with `snapshot_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::ptr;

use crate::config::SnapshotConfig;
use crate::indexer::GlobalIdIndexer;
use crate::types::GlobalPlaceId;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message
fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clear the last error message
fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Opaque handle to a GlobalIdIndexer
pub struct SnapshotIndexerHandle {
    indexer: GlobalIdIndexer,
}

/// Build an indexer from snapshot configuration JSON.
///
/// # Safety
/// - `config_json` must be a valid null-terminated C string.
/// - Returns a pointer that must be freed with `snapshot_indexer_free`.
/// - Returns NULL on error; call `snapshot_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn snapshot_indexer_new(config_json: *const c_char) -> *mut SnapshotIndexerHandle {
    clear_last_error();

    let json = match cstr_to_string(config_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid config string pointer");
            return ptr::null_mut();
        }
    };

    let indexer = match SnapshotConfig::from_json(&json).and_then(|c| c.build_indexer()) {
        Ok(indexer) => indexer,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    Box::into_raw(Box::new(SnapshotIndexerHandle { indexer }))
}

/// Free an indexer handle.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `snapshot_indexer_new`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn snapshot_indexer_free(handle: *mut SnapshotIndexerHandle) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

/// Look up the global place id of a category-local location.
///
/// Writes the id to `out_global_id` and returns 0 on success, -1 on error.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `snapshot_indexer_new`.
/// - `category` must be a valid null-terminated C string.
/// - `out_global_id` must be a valid pointer to writable memory.
#[no_mangle]
pub unsafe extern "C" fn snapshot_get_global_place_id(
    handle: *const SnapshotIndexerHandle,
    category: *const c_char,
    local_id: i64,
    out_global_id: *mut GlobalPlaceId,
) -> c_int {
    clear_last_error();

    if handle.is_null() || out_global_id.is_null() {
        set_last_error("Null handle or output pointer");
        return -1;
    }

    let category = match cstr_to_string(category) {
        Some(s) => s,
        None => {
            set_last_error("Invalid category string pointer");
            return -1;
        }
    };

    match (*handle).indexer.get_global_id(&category, local_id) {
        Ok(global_id) => {
            *out_global_id = global_id;
            0
        }
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Total number of places across all categories, or -1 for a null handle.
///
/// # Safety
/// - `handle` must be NULL or a valid pointer returned by `snapshot_indexer_new`.
#[no_mangle]
pub unsafe extern "C" fn snapshot_total_places(handle: *const SnapshotIndexerHandle) -> i64 {
    if handle.is_null() {
        return -1;
    }
    (*handle).indexer.total_places() as i64
}

/// Get the last error message.
///
/// # Safety
/// - Returns a newly allocated string that must be freed with `snapshot_free_string`,
///   or NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn snapshot_last_error() -> *mut c_char {
    LAST_ERROR.with(|e| match e.borrow().as_ref() {
        Some(msg) => msg.clone().into_raw(),
        None => ptr::null_mut(),
    })
}

/// Free a string returned by this module.
///
/// # Safety
/// - `s` must be a pointer returned by a function in this module, or NULL.
#[no_mangle]
pub unsafe extern "C" fn snapshot_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_cstring() -> CString {
        CString::new(
            r#"{"categories": [
                {"name": "Home", "location_count": 3},
                {"name": "Retail", "location_count": 5}
            ]}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_lookup_through_handle() {
        unsafe {
            let config = config_cstring();
            let handle = snapshot_indexer_new(config.as_ptr());
            assert!(!handle.is_null());
            assert_eq!(snapshot_total_places(handle), 8);

            let category = CString::new("Retail").unwrap();
            let mut global_id: GlobalPlaceId = 0;
            let status = snapshot_get_global_place_id(handle, category.as_ptr(), 2, &mut global_id);
            assert_eq!(status, 0);
            assert_eq!(global_id, 5);

            snapshot_indexer_free(handle);
        }
    }

    #[test]
    fn test_lookup_error_sets_last_error() {
        unsafe {
            let config = config_cstring();
            let handle = snapshot_indexer_new(config.as_ptr());

            let category = CString::new("Work").unwrap();
            let mut global_id: GlobalPlaceId = 0;
            let status = snapshot_get_global_place_id(handle, category.as_ptr(), 0, &mut global_id);
            assert_eq!(status, -1);

            let err = snapshot_last_error();
            assert!(!err.is_null());
            let message = CStr::from_ptr(err).to_str().unwrap().to_string();
            assert!(message.contains("Work"));
            snapshot_free_string(err);

            snapshot_indexer_free(handle);
        }
    }

    #[test]
    fn test_invalid_config_returns_null() {
        unsafe {
            let config = CString::new("not json").unwrap();
            let handle = snapshot_indexer_new(config.as_ptr());
            assert!(handle.is_null());

            let err = snapshot_last_error();
            assert!(!err.is_null());
            snapshot_free_string(err);
        }
    }
}
