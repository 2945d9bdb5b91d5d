use std::cell::RefCell;
use std::ffi::CString;
use std::os::raw::c_char;

use hypbridge_session::SessionError;

use crate::types::HbResult;

thread_local! {
    static LAST_ERROR: RefCell<CString> = RefCell::new(CString::default());
}

pub(crate) fn clear_error_state() {
    LAST_ERROR.with(|state| {
        *state.borrow_mut() = CString::default();
    });
}

pub(crate) fn set_error_message(message: impl Into<String>) {
    let sanitized = message.into().replace('\0', "?");
    LAST_ERROR.with(|state| {
        *state.borrow_mut() = CString::new(sanitized).unwrap_or_default();
    });
}

pub(crate) fn set_invalid_argument(message: impl Into<String>) -> HbResult {
    set_error_message(message);
    HbResult::InvalidArgument
}

pub(crate) fn set_panic_error() {
    set_error_message("panic across FFI boundary");
}

pub(crate) fn map_session_error(err: &SessionError) -> HbResult {
    set_error_message(err.to_string());
    result_code(err)
}

pub(crate) fn result_code(err: &SessionError) -> HbResult {
    match err {
        SessionError::Unconfigured { .. } => HbResult::Unconfigured,
        SessionError::Transport(_) => HbResult::TransportError,
        SessionError::Frame(_) => HbResult::FrameError,
        SessionError::Violation(_) => HbResult::ProtocolViolation,
        SessionError::Timeout(_) => HbResult::Timeout,
        SessionError::NotActive { .. } => HbResult::NotActive,
        SessionError::Disconnected(_) => HbResult::Disconnected,
    }
}

pub(crate) fn last_error_ptr() -> *const c_char {
    LAST_ERROR.with(|state| state.borrow().as_ptr())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use hypbridge_session::{ProtocolViolation, SessionState};

    use super::*;

    #[test]
    fn session_errors_map_to_codes() {
        let cases = [
            (
                SessionError::Unconfigured {
                    channel: "commands",
                    var: "COMMANDS_PIPE_PATH",
                },
                HbResult::Unconfigured,
            ),
            (
                ProtocolViolation::NotAcknowledged {
                    command: "END",
                    code: 1,
                }
                .into(),
                HbResult::ProtocolViolation,
            ),
            (
                SessionError::Timeout(Duration::from_millis(5)),
                HbResult::Timeout,
            ),
            (
                SessionError::NotActive {
                    state: SessionState::Failed,
                },
                HbResult::NotActive,
            ),
        ];

        for (err, code) in cases {
            assert_eq!(result_code(&err), code, "{err}");
        }
    }

    #[test]
    fn messages_with_nul_are_sanitized() {
        set_error_message("bad\0label");
        // SAFETY: last_error_ptr points at the thread-local CString.
        let text = unsafe { std::ffi::CStr::from_ptr(last_error_ptr()) };
        assert_eq!(text.to_str().unwrap(), "bad?label");
        clear_error_state();
    }
}
