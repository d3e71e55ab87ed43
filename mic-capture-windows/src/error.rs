//! Backend errors and their mapping onto hardware status codes.

use mic_capture_core::{UnitKind, UnitStatus};
use thiserror::Error;

/// `E_ACCESSDENIED`
pub const E_ACCESS_DENIED: i32 = 0x8007_0005_u32 as i32;
/// `AUDCLNT_E_DEVICE_IN_USE`
pub const AUDCLNT_DEVICE_IN_USE: i32 = 0x8889_000A_u32 as i32;
/// `AUDCLNT_E_UNSUPPORTED_FORMAT`
pub const AUDCLNT_UNSUPPORTED_FORMAT: i32 = 0x8889_0008_u32 as i32;

#[derive(Debug, Error)]
pub enum WasapiError {
    #[error("COM initialization failed: {0:#010x}")]
    ComInit(i32),
    #[error("no capture endpoint for {0:?}")]
    NoEndpoint(UnitKind),
    #[error("microphone access is disabled in privacy settings")]
    AccessDenied,
    #[error("{call} failed: {code:#010x}")]
    Call { call: &'static str, code: i32 },
    #[error("capture thread unavailable: {0}")]
    Thread(String),
}

impl WasapiError {
    pub fn call(call: &'static str, code: i32) -> Self {
        Self::Call { call, code }
    }

    /// Status reported to the session for this error.
    pub fn status(&self) -> UnitStatus {
        match self {
            Self::ComInit(code) | Self::Call { code, .. } => UnitStatus(*code),
            Self::NoEndpoint(_) => UnitStatus::INVALID_UNIT,
            Self::AccessDenied => UnitStatus(E_ACCESS_DENIED),
            Self::Thread(_) => UnitStatus::FAILED,
        }
    }
}

impl From<WasapiError> for UnitStatus {
    fn from(err: WasapiError) -> Self {
        err.status()
    }
}

/// Whether an activation failure means the user switched microphone access
/// off (or another app holds the device exclusively).
pub fn is_access_denied(code: i32) -> bool {
    code == E_ACCESS_DENIED || code == AUDCLNT_DEVICE_IN_USE
}
