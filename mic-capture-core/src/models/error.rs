use thiserror::Error;

/// Status code reported by the audio hardware layer.
///
/// Zero is success on every platform this crate targets, so only failure
/// codes ever appear inside a `UnitStatus`.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash)]
#[error("audio unit status {0}")]
pub struct UnitStatus(pub i32);

impl UnitStatus {
    /// Generic failure for backends with no native status code.
    pub const FAILED: Self = Self(-1);

    /// The unit was asked to render more frames than its slice maximum.
    pub const TOO_MANY_FRAMES: Self = Self(-10874);

    /// The requested stream format is not supported by the unit.
    pub const FORMAT_NOT_SUPPORTED: Self = Self(-10868);

    /// The unit handle does not refer to a live instance.
    pub const INVALID_UNIT: Self = Self(-10879);

    /// The unit has not been initialized.
    pub const UNINITIALIZED: Self = Self(-10867);

    pub fn code(&self) -> i32 {
        self.0
    }
}

/// Errors raised while configuring an audio device session.
///
/// One variant per configuration step, in the order the steps run.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no matching audio input component")]
    ComponentNotFound,

    #[error("failed to create audio unit instance: {0}")]
    InstanceCreationFailed(UnitStatus),

    #[error("failed to enable audio unit input: {0}")]
    InputEnableFailed(UnitStatus),

    #[error("stream format rejected: {0}")]
    StreamFormatRejected(UnitStatus),

    #[error("failed to register render callback: {0}")]
    CallbackRegistrationFailed(UnitStatus),

    #[error("failed to start audio unit: {0}")]
    StartFailed(UnitStatus),
}

impl ConfigError {
    /// The hardware status behind this error, if the step reported one.
    pub fn status(&self) -> Option<UnitStatus> {
        match self {
            Self::ComponentNotFound => None,
            Self::InstanceCreationFailed(status)
            | Self::InputEnableFailed(status)
            | Self::StreamFormatRejected(status)
            | Self::CallbackRegistrationFailed(status)
            | Self::StartFailed(status) => Some(*status),
        }
    }
}
