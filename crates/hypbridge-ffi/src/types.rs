/// Status code returned by every `hb_*` function.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HbResult {
    Ok = 0,
    InvalidArgument = 1,
    Unconfigured = 2,
    TransportError = 3,
    FrameError = 4,
    ProtocolViolation = 5,
    Timeout = 6,
    NotActive = 7,
    Disconnected = 8,
    Internal = 99,
}

#[allow(dead_code)]
pub const HB_OK: HbResult = HbResult::Ok;
#[allow(dead_code)]
pub const HB_ERR_INVALID_ARGUMENT: HbResult = HbResult::InvalidArgument;
#[allow(dead_code)]
pub const HB_ERR_UNCONFIGURED: HbResult = HbResult::Unconfigured;
#[allow(dead_code)]
pub const HB_ERR_TRANSPORT: HbResult = HbResult::TransportError;
#[allow(dead_code)]
pub const HB_ERR_FRAME: HbResult = HbResult::FrameError;
#[allow(dead_code)]
pub const HB_ERR_PROTOCOL_VIOLATION: HbResult = HbResult::ProtocolViolation;
#[allow(dead_code)]
pub const HB_ERR_TIMEOUT: HbResult = HbResult::Timeout;
#[allow(dead_code)]
pub const HB_ERR_NOT_ACTIVE: HbResult = HbResult::NotActive;
#[allow(dead_code)]
pub const HB_ERR_DISCONNECTED: HbResult = HbResult::Disconnected;
#[allow(dead_code)]
pub const HB_ERR_INTERNAL: HbResult = HbResult::Internal;
