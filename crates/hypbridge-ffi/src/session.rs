//! Exports over the one process-wide session.
//!
//! The C API has no handle argument, so every export locks [`SESSION`] for the
//! whole send and receive. The session is built from the environment on the
//! first call of any export.

use std::os::raw::{c_char, c_ulong};
use std::sync::{Mutex, PoisonError};

use hypbridge_session::{connect_from_env, FifoConnector, Session, SessionError, SessionState};

use crate::args;
use crate::error;
use crate::types::HbResult;

static SESSION: Mutex<Option<Session<FifoConnector>>> = Mutex::new(None);

fn with_session<T>(f: impl FnOnce(&mut Session<FifoConnector>) -> T) -> T {
    let mut slot = SESSION.lock().unwrap_or_else(PoisonError::into_inner);
    f(slot.get_or_insert_with(connect_from_env))
}

fn status(result: Result<(), SessionError>) -> HbResult {
    match result {
        Ok(()) => HbResult::Ok,
        Err(err) => error::map_session_error(&err),
    }
}

/// Mark the session active. Performs no I/O.
#[no_mangle]
pub extern "C" fn hb_init() -> HbResult {
    crate::ffi_boundary(HbResult::Internal, || {
        error::clear_error_state();
        status(with_session(Session::init))
    })
}

/// Request a random value and store it in `out`.
///
/// # Safety
/// `out` must be a non-null pointer valid for a `uint32_t` write.
#[no_mangle]
pub unsafe extern "C" fn hb_get_rand(out: *mut u32) -> HbResult {
    crate::ffi_boundary(HbResult::Internal, || {
        error::clear_error_state();

        let out = {
            // SAFETY: We validate null in helper.
            match unsafe { args::out_arg(out, "out") } {
                Some(v) => v,
                None => return HbResult::InvalidArgument,
            }
        };

        match with_session(Session::request_random) {
            Ok(value) => {
                *out = value;
                HbResult::Ok
            }
            Err(err) => error::map_session_error(&err),
        }
    })
}

/// Open an example labelled `label`.
///
/// # Safety
/// `label` must be a non-null pointer to a valid UTF-8, NUL-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn hb_start_example(label: *const c_char) -> HbResult {
    crate::ffi_boundary(HbResult::Internal, || {
        error::clear_error_state();

        let label = {
            // SAFETY: We validate null and UTF-8 in helper.
            match unsafe { args::required_str_arg(label, "label") } {
                Some(v) => v,
                None => return HbResult::InvalidArgument,
            }
        };

        status(with_session(|session| session.start_example(label)))
    })
}

/// Close the innermost open example.
#[no_mangle]
pub extern "C" fn hb_end_example() -> HbResult {
    crate::ffi_boundary(HbResult::Internal, || {
        error::clear_error_state();
        status(with_session(Session::end_example))
    })
}

/// Send `TERMINATE` and close both pipes. A second call is a no-op.
#[no_mangle]
pub extern "C" fn hb_terminate() -> HbResult {
    crate::ffi_boundary(HbResult::Internal, || {
        error::clear_error_state();
        status(with_session(Session::terminate))
    })
}

fn or_abort<T>(operation: &str, result: Result<T, SessionError>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => {
            eprintln!("hypbridge: {operation} failed: {err}");
            std::process::abort()
        }
    }
}

fn with_active_or_abort<T>(
    operation: &str,
    f: impl FnOnce(&mut Session<FifoConnector>) -> Result<T, SessionError>,
) -> T {
    with_session(|session| {
        if session.state() == SessionState::Uninitialized {
            or_abort("init", session.init());
        }
        or_abort(operation, f(session))
    })
}

/// Like [`hb_init`], aborting the process on failure.
#[export_name = "hypothesisInitConnection"]
pub extern "C" fn hypothesis_init_connection() {
    crate::ffi_boundary((), || with_active_or_abort("init", |_| Ok(())));
}

/// Like [`hb_get_rand`], aborting the process on failure.
#[export_name = "hypothesisGetRand"]
pub extern "C" fn hypothesis_get_rand() -> c_ulong {
    crate::ffi_boundary(0, || {
        c_ulong::from(with_active_or_abort("RAND", Session::request_random))
    })
}

/// Like [`hb_start_example`], aborting the process on failure.
///
/// # Safety
/// `label` must be a non-null pointer to a valid UTF-8, NUL-terminated C string.
#[export_name = "hypothesisStartExample"]
pub unsafe extern "C" fn hypothesis_start_example(label: *const c_char) {
    crate::ffi_boundary((), || {
        let label = {
            // SAFETY: We validate null and UTF-8 in helper.
            match unsafe { args::required_str_arg(label, "label") } {
                Some(v) => v,
                None => {
                    eprintln!("hypbridge: START failed: label must be a non-null UTF-8 string");
                    std::process::abort()
                }
            }
        };
        with_active_or_abort("START", |session| session.start_example(label));
    });
}

/// Like [`hb_end_example`], aborting the process on failure.
#[export_name = "hypothesisEndExample"]
pub extern "C" fn hypothesis_end_example() {
    crate::ffi_boundary((), || with_active_or_abort("END", Session::end_example));
}

/// Like [`hb_terminate`], aborting the process on failure.
#[export_name = "hypothesisTerminateConnection"]
pub extern "C" fn hypothesis_terminate_connection() {
    crate::ffi_boundary((), || with_active_or_abort("TERMINATE", Session::terminate));
}
