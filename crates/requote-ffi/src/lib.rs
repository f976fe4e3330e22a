//! C FFI bindings for requote-core
//!
//! Exposes in-memory and file transcoding to C/C++ hosts. Options live behind
//! an opaque handle built from defaults or from the same JSON profile the CLI
//! accepts. Failed calls return null (or a non-zero status) and leave a
//! message for `rq_last_error` on the calling thread.

use requote_core::{transcode_file, transcode_str, TranscodeOptions};
use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::ptr;

/// Status returned by `rq_transcode_file` on success
pub const RQ_OK: c_int = 0;
/// The input data could not be transcoded
pub const RQ_DATA_ERROR: c_int = 1;
/// I/O, configuration or argument failure
pub const RQ_ENV_ERROR: c_int = 2;

thread_local! {
    static LAST_ERROR: RefCell<Option<String>> = const { RefCell::new(None) };
}

fn set_last_error(message: impl Into<String>) {
    LAST_ERROR.with(|e| *e.borrow_mut() = Some(message.into()));
}

fn clear_last_error() {
    LAST_ERROR.with(|e| *e.borrow_mut() = None);
}

/// Opaque handle to transcode options
pub struct FfiOptions {
    inner: TranscodeOptions,
}

/// Read a C string argument, recording an error if it is null or not UTF-8
unsafe fn str_arg<'a>(s: *const c_char, name: &str) -> Option<&'a str> {
    if s.is_null() {
        set_last_error(format!("{} is null", name));
        return None;
    }
    match CStr::from_ptr(s).to_str() {
        Ok(s) => Some(s),
        Err(_) => {
            set_last_error(format!("{} is not valid UTF-8", name));
            None
        }
    }
}

/// Options pointer or defaults when null
unsafe fn options_arg<'a>(options: *const FfiOptions, default: &'a TranscodeOptions) -> &'a TranscodeOptions {
    if options.is_null() {
        default
    } else {
        &(*options).inner
    }
}

/// Create default options (comma, double quote, UTF-8, minimal quoting)
#[no_mangle]
pub extern "C" fn rq_options_new() -> *mut FfiOptions {
    Box::into_raw(Box::new(FfiOptions {
        inner: TranscodeOptions::default(),
    }))
}

/// Create options from a JSON profile
///
/// # Safety
/// - `json` must be a valid C string
/// - Returns null on error; see `rq_last_error`
#[no_mangle]
pub unsafe extern "C" fn rq_options_from_json(json: *const c_char) -> *mut FfiOptions {
    let Some(json) = str_arg(json, "json") else {
        return ptr::null_mut();
    };

    let parsed = serde_json::from_str::<TranscodeOptions>(json)
        .map_err(|e| e.to_string())
        .and_then(|o| o.validate().map(|_| o).map_err(|e| e.to_string()));

    match parsed {
        Ok(inner) => {
            clear_last_error();
            Box::into_raw(Box::new(FfiOptions { inner }))
        }
        Err(message) => {
            set_last_error(message);
            ptr::null_mut()
        }
    }
}

/// Free options
///
/// # Safety
/// - `options` must be a valid pointer returned by `rq_options_new` /
///   `rq_options_from_json`, or null
#[no_mangle]
pub unsafe extern "C" fn rq_free_options(options: *mut FfiOptions) {
    if !options.is_null() {
        drop(Box::from_raw(options));
    }
}

/// Transcode a UTF-8 string
///
/// # Safety
/// - `input` must be a valid C string
/// - `options` must be a valid options pointer or null for defaults
/// - Returns null on error; see `rq_last_error`
/// - Caller must free the returned string with `rq_free_string`
#[no_mangle]
pub unsafe extern "C" fn rq_transcode(input: *const c_char, options: *const FfiOptions) -> *mut c_char {
    let Some(input) = str_arg(input, "input") else {
        return ptr::null_mut();
    };
    let default = TranscodeOptions::default();
    let options = options_arg(options, &default);

    let output = match transcode_str(input, options) {
        Ok(output) => output,
        Err(e) => {
            set_last_error(e.to_string());
            return ptr::null_mut();
        }
    };

    match CString::new(output) {
        Ok(s) => {
            clear_last_error();
            s.into_raw()
        }
        Err(_) => {
            set_last_error("output contains a NUL byte");
            ptr::null_mut()
        }
    }
}

/// Transcode a file into another (or the same) path
///
/// # Safety
/// - `input_path` and `output_path` must be valid C strings
/// - `options` must be a valid options pointer or null for defaults
/// - Returns `RQ_OK`, `RQ_DATA_ERROR` or `RQ_ENV_ERROR`
#[no_mangle]
pub unsafe extern "C" fn rq_transcode_file(
    input_path: *const c_char,
    output_path: *const c_char,
    options: *const FfiOptions,
) -> c_int {
    let (Some(input), Some(output)) = (
        str_arg(input_path, "input_path"),
        str_arg(output_path, "output_path"),
    ) else {
        return RQ_ENV_ERROR;
    };
    let default = TranscodeOptions::default();
    let options = options_arg(options, &default);

    match transcode_file(input, output, options) {
        Ok(_) => {
            clear_last_error();
            RQ_OK
        }
        Err(e) => {
            let status = if e.is_data_error() {
                RQ_DATA_ERROR
            } else {
                RQ_ENV_ERROR
            };
            set_last_error(e.to_string());
            status
        }
    }
}

/// Message describing the last failure on this thread, or null
///
/// Caller must free the returned string with `rq_free_string`.
#[no_mangle]
pub extern "C" fn rq_last_error() -> *mut c_char {
    LAST_ERROR.with(|e| {
        e.borrow()
            .as_deref()
            .and_then(|m| CString::new(m).ok())
            .map(|s| s.into_raw())
            .unwrap_or(ptr::null_mut())
    })
}

/// Free a string returned by other FFI functions
///
/// # Safety
/// - `s` must be a valid pointer returned by an rq_* function or null
#[no_mangle]
pub unsafe extern "C" fn rq_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    unsafe fn take_string(s: *mut c_char) -> String {
        assert!(!s.is_null());
        let owned = CStr::from_ptr(s).to_str().unwrap().to_string();
        rq_free_string(s);
        owned
    }

    #[test]
    fn test_transcode_with_defaults() {
        let input = CString::new("a,b\n\"1\",\"x,y\"\n").unwrap();
        unsafe {
            let out = rq_transcode(input.as_ptr(), ptr::null());
            assert_eq!(take_string(out), "a,b\n1,\"x,y\"\n");
        }
    }

    #[test]
    fn test_transcode_with_json_options() {
        let json = CString::new(r#"{"quoting": "all", "parse": {"has_header": false}}"#).unwrap();
        let input = CString::new("x\n").unwrap();
        unsafe {
            let options = rq_options_from_json(json.as_ptr());
            assert!(!options.is_null());
            let out = rq_transcode(input.as_ptr(), options);
            assert_eq!(take_string(out), "\"x\"\n");
            rq_free_options(options);
        }
    }

    #[test]
    fn test_error_is_reported() {
        let input = CString::new("\"open").unwrap();
        unsafe {
            let out = rq_transcode(input.as_ptr(), ptr::null());
            assert!(out.is_null());
            let message = take_string(rq_last_error());
            assert!(message.contains("unterminated quoted field"));
        }
    }

    #[test]
    fn test_bad_json_options() {
        let json = CString::new(r#"{"quoting": "sometimes"}"#).unwrap();
        unsafe {
            assert!(rq_options_from_json(json.as_ptr()).is_null());
            assert!(take_string(rq_last_error()).contains("sometimes"));
            assert!(rq_options_from_json(ptr::null()).is_null());
        }
    }

    #[test]
    fn test_transcode_file_status() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path();
        let input = dir.join("in.csv");
        let output = dir.join("out.csv");
        std::fs::write(&input, "a\n\"1\"\n").unwrap();

        let input_c = CString::new(input.to_str().unwrap()).unwrap();
        let output_c = CString::new(output.to_str().unwrap()).unwrap();
        let missing_c = CString::new(dir.join("missing.csv").to_str().unwrap()).unwrap();

        unsafe {
            let options = rq_options_new();
            assert_eq!(rq_transcode_file(input_c.as_ptr(), output_c.as_ptr(), options), RQ_OK);
            assert_eq!(
                rq_transcode_file(missing_c.as_ptr(), output_c.as_ptr(), options),
                RQ_ENV_ERROR
            );
            rq_free_options(options);
        }

        assert_eq!(std::fs::read_to_string(&output).unwrap(), "a\n1\n");
    }
}
