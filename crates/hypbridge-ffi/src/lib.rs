//! hypbridge-ffi: C-ABI exports for the hypbridge client session.
//!
//! Two families of functions share one process-wide session:
//! `hb_*` return an [`HbResult`] and leave a message for [`hb_last_error`],
//! while `hypothesis_*` print a diagnostic and abort on any failure. The
//! latter are exported under the C names `hypothesisInitConnection`,
//! `hypothesisGetRand`, `hypothesisStartExample`, `hypothesisEndExample` and
//! `hypothesisTerminateConnection`.

mod args;
mod error;
#[cfg(unix)]
mod session;
mod types;

use std::panic::AssertUnwindSafe;

#[cfg(unix)]
pub use session::{
    hb_end_example, hb_get_rand, hb_init, hb_start_example, hb_terminate,
    hypothesis_end_example, hypothesis_get_rand, hypothesis_init_connection,
    hypothesis_start_example, hypothesis_terminate_connection,
};
pub use types::{
    HbResult, HB_ERR_DISCONNECTED, HB_ERR_FRAME, HB_ERR_INTERNAL, HB_ERR_INVALID_ARGUMENT,
    HB_ERR_NOT_ACTIVE, HB_ERR_PROTOCOL_VIOLATION, HB_ERR_TIMEOUT, HB_ERR_TRANSPORT,
    HB_ERR_UNCONFIGURED, HB_OK,
};

fn ffi_boundary<T>(on_panic: T, f: impl FnOnce() -> T) -> T {
    match std::panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(_) => {
            error::set_panic_error();
            on_panic
        }
    }
}

/// Message for the last failed call on this thread, or an empty string.
///
/// The pointer stays valid until the next `hb_*` call on the same thread.
#[no_mangle]
pub extern "C" fn hb_last_error() -> *const std::os::raw::c_char {
    ffi_boundary(std::ptr::null(), error::last_error_ptr)
}

#[cfg(test)]
mod tests {
    use std::ffi::CStr;

    use super::*;

    #[test]
    fn last_error_returns_non_null_pointer() {
        error::clear_error_state();
        let ptr = hb_last_error();
        assert!(!ptr.is_null());

        // SAFETY: hb_last_error returns a pointer to a thread-local CString.
        let text = unsafe { CStr::from_ptr(ptr).to_str().unwrap() };
        assert!(text.is_empty());
    }

    #[test]
    fn panics_become_internal_errors() {
        let result = ffi_boundary(HbResult::Internal, || panic!("boom"));
        assert_eq!(result, HbResult::Internal);

        // SAFETY: As above.
        let text = unsafe { CStr::from_ptr(hb_last_error()) };
        assert_eq!(text.to_str().unwrap(), "panic across FFI boundary");
    }
}
