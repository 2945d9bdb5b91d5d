use crate::error::{Result, SessionError};
use crate::session::SessionState;

/// A pipe endpoint that is opened on first use and never reopened.
pub(crate) enum Handle<T> {
    Unopened,
    Open(T),
    Closed,
}

impl<T> Handle<T> {
    /// Return the open endpoint, opening it first if this is the first use.
    ///
    /// A closed handle stays closed: `open` is not called again.
    pub(crate) fn get_or_try_open(
        &mut self,
        open: impl FnOnce() -> Result<T>,
    ) -> Result<&mut T> {
        if matches!(self, Handle::Unopened) {
            *self = Handle::Open(open()?);
        }

        match self {
            Handle::Open(inner) => Ok(inner),
            Handle::Unopened | Handle::Closed => Err(SessionError::NotActive {
                state: SessionState::Terminated,
            }),
        }
    }

    /// Close the endpoint, returning it if it was open.
    pub(crate) fn close(&mut self) -> Option<T> {
        match std::mem::replace(self, Handle::Closed) {
            Handle::Open(inner) => Some(inner),
            Handle::Unopened | Handle::Closed => None,
        }
    }

    pub(crate) fn is_open(&self) -> bool {
        matches!(self, Handle::Open(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_once() {
        let mut handle = Handle::Unopened;
        let mut opens = 0;

        for _ in 0..3 {
            let value = handle
                .get_or_try_open(|| {
                    opens += 1;
                    Ok(7)
                })
                .unwrap();
            assert_eq!(*value, 7);
        }
        assert_eq!(opens, 1);
        assert!(handle.is_open());
    }

    #[test]
    fn failed_open_stays_unopened() {
        let mut handle: Handle<u8> = Handle::Unopened;
        let err = handle
            .get_or_try_open(|| {
                Err(SessionError::Unconfigured {
                    channel: "commands",
                    var: "X",
                })
            })
            .unwrap_err();
        assert!(matches!(err, SessionError::Unconfigured { .. }));
        assert!(!handle.is_open());
    }

    #[test]
    fn closed_is_never_reopened() {
        let mut handle = Handle::Open(1u8);
        assert_eq!(handle.close(), Some(1));
        assert_eq!(handle.close(), None);

        let err = handle
            .get_or_try_open(|| panic!("closed handle must not reopen"))
            .unwrap_err();
        assert!(matches!(err, SessionError::NotActive { .. }));
    }
}
