use serde::{Deserialize, Serialize};

use super::error::{ConfigError, UnitStatus};
use super::format::StreamFormatDescriptor;

/// Configuration for an audio device session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Requested capture sample rate in Hz (default: 48000).
    pub sample_rate: f64,

    /// Open the echo-cancelling (voice processing) unit instead of the raw
    /// input unit (default: true).
    pub echo_cancellation: bool,
}

impl SessionConfig {
    pub fn new(sample_rate: f64, echo_cancellation: bool) -> Self {
        Self {
            sample_rate,
            echo_cancellation,
        }
    }

    /// Reject sample rates no hardware could accept before touching the unit.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            log::debug!("rejecting sample rate {}", self.sample_rate);
            return Err(ConfigError::StreamFormatRejected(
                UnitStatus::FORMAT_NOT_SUPPORTED,
            ));
        }
        Ok(())
    }

    /// The stream format this configuration requests from the input unit.
    pub fn stream_format(&self) -> StreamFormatDescriptor {
        StreamFormatDescriptor::linear_pcm(self.sample_rate)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000.0,
            echo_cancellation: true,
        }
    }
}
